use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use hustleflow_types::error::{BoardError, BoardResult};
use hustleflow_types::models::{
    ExchangeKind, ExchangeRequest, Identity, MatchState, OfferStatus, RequestTerms,
    TransactionOffer, Urgency,
};
use hustleflow_types::store::{
    AppendOutcome, RequestStore, TransitionOutcome, WriteOutcome,
};

/// The authoritative owner of the request collection. Enforces validation,
/// authorization, read-time expiry, ordering and the offer state machine
/// over an injected store; the store owns atomicity.
pub struct Repository<S> {
    store: S,
    currency: String,
    admin_token: Option<String>,
}

impl<S: RequestStore> Repository<S> {
    pub fn new(store: S, currency: impl Into<String>, admin_token: Option<String>) -> Self {
        Self {
            store,
            currency: currency.into(),
            admin_token,
        }
    }

    pub fn is_admin(&self, token: &str) -> bool {
        self.admin_token.as_deref() == Some(token)
    }

    /// Non-expired requests, urgent before flexible, newest first within
    /// each group; optionally narrowed to one exchange kind.
    pub fn list_active(
        &self,
        filter: Option<ExchangeKind>,
        now: DateTime<Utc>,
    ) -> BoardResult<Vec<ExchangeRequest>> {
        let mut requests: Vec<ExchangeRequest> = self
            .store
            .list()?
            .into_iter()
            .filter(|r| !r.is_expired(now))
            .filter(|r| filter.is_none_or(|kind| r.kind == kind))
            .collect();
        sort_board(&mut requests);
        Ok(requests)
    }

    /// Non-expired requests the caller owns or has offered on.
    pub fn list_activity(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> BoardResult<Vec<ExchangeRequest>> {
        if token.is_empty() {
            return Err(BoardError::IdentityRequired);
        }
        let mut requests: Vec<ExchangeRequest> = self
            .store
            .list()?
            .into_iter()
            .filter(|r| !r.is_expired(now))
            .filter(|r| r.owner.token == token || r.has_offer_from(token))
            .collect();
        sort_board(&mut requests);
        Ok(requests)
    }

    /// The moderation view: every active request, admin token required.
    /// Disclosure is the caller's concern; this only gates access.
    pub fn list_all_for_admin(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> BoardResult<Vec<ExchangeRequest>> {
        if !self.is_admin(token) {
            return Err(BoardError::Unauthorized);
        }
        self.list_active(None, now)
    }

    pub fn create(
        &self,
        terms: &RequestTerms,
        identity: &Identity,
        now: DateTime<Utc>,
    ) -> BoardResult<ExchangeRequest> {
        self.check_identity(identity, now)?;
        validate_terms(terms)?;

        let request = ExchangeRequest {
            id: Uuid::new_v4(),
            amount: terms.amount,
            currency: self.currency.clone(),
            kind: terms.kind,
            urgency: terms.urgency,
            duration_days: terms.duration_days,
            match_state: MatchState::Open,
            created_at: now,
            owner: identity.snapshot(),
            offers: Vec::new(),
        };
        self.store.insert(&request)?;
        info!(id = %request.id, urgency = %request.urgency.as_str(), "request created");
        Ok(request)
    }

    /// Replace the owner-mutable terms. Creation time, owner snapshot,
    /// match state and offers are untouched.
    pub fn update(
        &self,
        id: Uuid,
        terms: &RequestTerms,
        token: &str,
        now: DateTime<Utc>,
    ) -> BoardResult<ExchangeRequest> {
        validate_terms(terms)?;
        let request = self.load_visible(id, now)?;
        self.authorize_owner(&request, token)?;

        match self.store.update_terms(id, terms)? {
            WriteOutcome::Applied => self.reload(id),
            WriteOutcome::RequestMissing => Err(BoardError::NotFound(id)),
        }
    }

    /// Permanently remove a request and all its offers.
    pub fn delete(&self, id: Uuid, token: &str, now: DateTime<Utc>) -> BoardResult<()> {
        let request = self.load_visible(id, now)?;
        self.authorize_owner(&request, token)?;

        match self.store.remove(id)? {
            WriteOutcome::Applied => {
                info!(id = %id, "request deleted");
                Ok(())
            }
            WriteOutcome::RequestMissing => Err(BoardError::NotFound(id)),
        }
    }

    pub fn make_offer(
        &self,
        request_id: Uuid,
        amount: i64,
        identity: &Identity,
        now: DateTime<Utc>,
    ) -> BoardResult<ExchangeRequest> {
        self.check_identity(identity, now)?;
        if amount <= 0 {
            return Err(BoardError::invalid_input("offer amount must be positive"));
        }

        let request = self.load_visible(request_id, now)?;
        if request.owner.token == identity.token {
            return Err(BoardError::SelfOfferForbidden);
        }
        // Friendly-path check; the store's unique guard closes the race.
        if request.has_offer_from(&identity.token) {
            return Err(BoardError::DuplicateOffer);
        }

        let offer = TransactionOffer {
            id: Uuid::new_v4(),
            offerer: identity.snapshot(),
            amount,
            status: OfferStatus::Pending,
            created_at: now,
        };
        match self.store.append_offer(request_id, &offer)? {
            AppendOutcome::Appended => {
                info!(request = %request_id, offer = %offer.id, "offer made");
                self.reload(request_id)
            }
            AppendOutcome::RequestMissing => Err(BoardError::NotFound(request_id)),
            AppendOutcome::Duplicate => Err(BoardError::DuplicateOffer),
        }
    }

    /// Accept one offer: the target goes to accepted, every other pending
    /// offer to rejected, and the request to fully matched, atomically.
    /// Of two concurrent accepts on one request, exactly one succeeds.
    pub fn accept_offer(
        &self,
        request_id: Uuid,
        offer_id: Uuid,
        token: &str,
        now: DateTime<Utc>,
    ) -> BoardResult<ExchangeRequest> {
        let request = self.load_visible(request_id, now)?;
        // Only the owner picks the winning offer; the admin override does
        // not extend to offer transitions.
        if request.owner.token != token {
            return Err(BoardError::Unauthorized);
        }
        if request.offer(offer_id).is_none() {
            return Err(BoardError::OfferNotFound(offer_id));
        }

        match self.store.accept_offer(request_id, offer_id)? {
            TransitionOutcome::Applied => {
                info!(request = %request_id, offer = %offer_id, "offer accepted, request matched");
                self.reload(request_id)
            }
            TransitionOutcome::RequestMissing => Err(BoardError::NotFound(request_id)),
            TransitionOutcome::OfferMissing => Err(BoardError::OfferNotFound(offer_id)),
            TransitionOutcome::NotPending => Err(BoardError::AlreadyActioned),
        }
    }

    /// Decline one pending offer; the request stays on the board.
    pub fn reject_offer(
        &self,
        request_id: Uuid,
        offer_id: Uuid,
        token: &str,
        now: DateTime<Utc>,
    ) -> BoardResult<ExchangeRequest> {
        let request = self.load_visible(request_id, now)?;
        if request.owner.token != token {
            return Err(BoardError::Unauthorized);
        }
        if request.offer(offer_id).is_none() {
            return Err(BoardError::OfferNotFound(offer_id));
        }

        match self.store.reject_offer(request_id, offer_id)? {
            TransitionOutcome::Applied => {
                info!(request = %request_id, offer = %offer_id, "offer rejected");
                self.reload(request_id)
            }
            TransitionOutcome::RequestMissing => Err(BoardError::NotFound(request_id)),
            TransitionOutcome::OfferMissing => Err(BoardError::OfferNotFound(offer_id)),
            TransitionOutcome::NotPending => Err(BoardError::AlreadyActioned),
        }
    }

    /// Physically drop expired, unmatched requests (they are already
    /// invisible to every read path).
    pub fn prune_expired(&self, now: DateTime<Utc>) -> BoardResult<usize> {
        Ok(self.store.prune_expired(now)?)
    }

    /// An expired, unmatched request is indistinguishable from a deleted
    /// one on every path: reads, writes and offers all see `NotFound`.
    fn load_visible(&self, id: Uuid, now: DateTime<Utc>) -> BoardResult<ExchangeRequest> {
        match self.store.get(id)? {
            Some(request) if !request.is_expired(now) => Ok(request),
            _ => Err(BoardError::NotFound(id)),
        }
    }

    fn reload(&self, id: Uuid) -> BoardResult<ExchangeRequest> {
        self.store.get(id)?.ok_or(BoardError::NotFound(id))
    }

    fn authorize_owner(&self, request: &ExchangeRequest, token: &str) -> BoardResult<()> {
        if request.owner.token == token || self.is_admin(token) {
            Ok(())
        } else {
            Err(BoardError::Unauthorized)
        }
    }

    fn check_identity(&self, identity: &Identity, now: DateTime<Utc>) -> BoardResult<()> {
        if identity.token.is_empty() || identity.is_expired(now) {
            return Err(BoardError::IdentityRequired);
        }
        Ok(())
    }
}

fn validate_terms(terms: &RequestTerms) -> BoardResult<()> {
    if terms.amount <= 0 {
        return Err(BoardError::invalid_input("amount must be positive"));
    }
    Ok(())
}

fn sort_board(requests: &mut [ExchangeRequest]) {
    requests.sort_by(|a, b| {
        urgency_rank(a.urgency)
            .cmp(&urgency_rank(b.urgency))
            .then(b.created_at.cmp(&a.created_at))
    });
}

fn urgency_rank(urgency: Urgency) -> u8 {
    match urgency {
        Urgency::Urgent => 0,
        Urgency::Flexible => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use hustleflow_types::models::DurationDays;

    fn request_at(urgency: Urgency, created_at: DateTime<Utc>) -> ExchangeRequest {
        ExchangeRequest {
            id: Uuid::new_v4(),
            amount: 100,
            currency: "INR".to_string(),
            kind: ExchangeKind::Cash,
            urgency,
            duration_days: DurationDays::Seven,
            match_state: MatchState::Open,
            created_at,
            owner: Identity {
                token: "tok".to_string(),
                display_alias: "Panda".to_string(),
                real_name: "A".to_string(),
                room: "1".to_string(),
                contact: None,
                expires_at: created_at + Duration::hours(24),
            }
            .snapshot(),
            offers: vec![],
        }
    }

    #[test]
    fn board_order_is_urgent_first_then_newest() {
        let t0 = Utc::now();
        let mut requests = vec![
            request_at(Urgency::Flexible, t0 + Duration::minutes(3)),
            request_at(Urgency::Urgent, t0),
            request_at(Urgency::Urgent, t0 + Duration::minutes(2)),
            request_at(Urgency::Flexible, t0 + Duration::minutes(1)),
        ];
        sort_board(&mut requests);

        let order: Vec<(Urgency, DateTime<Utc>)> =
            requests.iter().map(|r| (r.urgency, r.created_at)).collect();
        assert_eq!(
            order,
            vec![
                (Urgency::Urgent, t0 + Duration::minutes(2)),
                (Urgency::Urgent, t0),
                (Urgency::Flexible, t0 + Duration::minutes(3)),
                (Urgency::Flexible, t0 + Duration::minutes(1)),
            ]
        );
    }

    #[test]
    fn terms_require_a_positive_amount() {
        let terms = RequestTerms {
            amount: 0,
            kind: ExchangeKind::Digital,
            urgency: Urgency::Flexible,
            duration_days: DurationDays::One,
        };
        assert!(matches!(
            validate_terms(&terms),
            Err(BoardError::InvalidInput { .. })
        ));
    }
}
