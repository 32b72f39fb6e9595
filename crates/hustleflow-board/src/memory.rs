use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::Result;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use hustleflow_types::models::{
    ExchangeRequest, MatchState, OfferStatus, RequestTerms, TransactionOffer,
};
use hustleflow_types::store::{
    AppendOutcome, RequestStore, TransitionOutcome, WriteOutcome,
};

/// In-memory `RequestStore`. The single write lock gives every mutation the
/// required per-request atomicity for free; suitable for tests and
/// single-process deployments without durability needs.
#[derive(Default)]
pub struct MemoryStore {
    requests: RwLock<HashMap<Uuid, ExchangeRequest>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, HashMap<Uuid, ExchangeRequest>>> {
        self.requests
            .read()
            .map_err(|e| anyhow::anyhow!("store lock poisoned: {}", e))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<Uuid, ExchangeRequest>>> {
        self.requests
            .write()
            .map_err(|e| anyhow::anyhow!("store lock poisoned: {}", e))
    }
}

impl RequestStore for MemoryStore {
    fn insert(&self, request: &ExchangeRequest) -> Result<()> {
        self.write()?.insert(request.id, request.clone());
        Ok(())
    }

    fn get(&self, id: Uuid) -> Result<Option<ExchangeRequest>> {
        Ok(self.read()?.get(&id).cloned())
    }

    fn list(&self) -> Result<Vec<ExchangeRequest>> {
        Ok(self.read()?.values().cloned().collect())
    }

    fn update_terms(&self, id: Uuid, terms: &RequestTerms) -> Result<WriteOutcome> {
        let mut requests = self.write()?;
        match requests.get_mut(&id) {
            Some(request) => {
                request.amount = terms.amount;
                request.kind = terms.kind;
                request.urgency = terms.urgency;
                request.duration_days = terms.duration_days;
                Ok(WriteOutcome::Applied)
            }
            None => Ok(WriteOutcome::RequestMissing),
        }
    }

    fn remove(&self, id: Uuid) -> Result<WriteOutcome> {
        Ok(match self.write()?.remove(&id) {
            Some(_) => WriteOutcome::Applied,
            None => WriteOutcome::RequestMissing,
        })
    }

    fn append_offer(&self, request_id: Uuid, offer: &TransactionOffer) -> Result<AppendOutcome> {
        let mut requests = self.write()?;
        let Some(request) = requests.get_mut(&request_id) else {
            return Ok(AppendOutcome::RequestMissing);
        };
        if request.has_offer_from(&offer.offerer.token) {
            return Ok(AppendOutcome::Duplicate);
        }
        request.offers.push(offer.clone());
        Ok(AppendOutcome::Appended)
    }

    fn accept_offer(&self, request_id: Uuid, offer_id: Uuid) -> Result<TransitionOutcome> {
        let mut requests = self.write()?;
        let Some(request) = requests.get_mut(&request_id) else {
            return Ok(TransitionOutcome::RequestMissing);
        };
        let Some(target) = request.offers.iter().position(|o| o.id == offer_id) else {
            return Ok(TransitionOutcome::OfferMissing);
        };
        if request.offers[target].status != OfferStatus::Pending {
            return Ok(TransitionOutcome::NotPending);
        }

        for (i, offer) in request.offers.iter_mut().enumerate() {
            if i == target {
                offer.status = OfferStatus::Accepted;
            } else if offer.status == OfferStatus::Pending {
                offer.status = OfferStatus::Rejected;
            }
        }
        request.match_state = MatchState::FullyMatched;
        Ok(TransitionOutcome::Applied)
    }

    fn reject_offer(&self, request_id: Uuid, offer_id: Uuid) -> Result<TransitionOutcome> {
        let mut requests = self.write()?;
        let Some(request) = requests.get_mut(&request_id) else {
            return Ok(TransitionOutcome::RequestMissing);
        };
        let Some(offer) = request.offers.iter_mut().find(|o| o.id == offer_id) else {
            return Ok(TransitionOutcome::OfferMissing);
        };
        if offer.status != OfferStatus::Pending {
            return Ok(TransitionOutcome::NotPending);
        }
        offer.status = OfferStatus::Rejected;
        Ok(TransitionOutcome::Applied)
    }

    fn prune_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut requests = self.write()?;
        let before = requests.len();
        requests.retain(|_, r| !r.is_expired(now));
        Ok(before - requests.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use hustleflow_types::models::{DurationDays, ExchangeKind, PartySnapshot, Urgency};

    fn request(created_at: DateTime<Utc>) -> ExchangeRequest {
        ExchangeRequest {
            id: Uuid::new_v4(),
            amount: 750,
            currency: "INR".to_string(),
            kind: ExchangeKind::Cash,
            urgency: Urgency::Urgent,
            duration_days: DurationDays::One,
            match_state: MatchState::Open,
            created_at,
            owner: PartySnapshot {
                token: "tok-owner".to_string(),
                display_alias: "Koala".to_string(),
                real_name: "O".to_string(),
                room: "A-1".to_string(),
                contact: None,
            },
            offers: vec![],
        }
    }

    fn offer(token: &str, at: DateTime<Utc>) -> TransactionOffer {
        TransactionOffer {
            id: Uuid::new_v4(),
            offerer: PartySnapshot {
                token: token.to_string(),
                display_alias: "Otter".to_string(),
                real_name: "X".to_string(),
                room: "A-2".to_string(),
                contact: None,
            },
            amount: 750,
            status: OfferStatus::Pending,
            created_at: at,
        }
    }

    #[test]
    fn append_enforces_one_offer_per_identity() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let r = request(now);
        store.insert(&r).unwrap();

        assert_eq!(
            store.append_offer(r.id, &offer("tok-a", now)).unwrap(),
            AppendOutcome::Appended
        );
        assert_eq!(
            store.append_offer(r.id, &offer("tok-a", now)).unwrap(),
            AppendOutcome::Duplicate
        );
    }

    #[test]
    fn accept_settles_every_pending_offer_in_one_step() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let r = request(now);
        store.insert(&r).unwrap();
        let o1 = offer("tok-a", now);
        let o2 = offer("tok-b", now);
        store.append_offer(r.id, &o1).unwrap();
        store.append_offer(r.id, &o2).unwrap();

        assert_eq!(
            store.accept_offer(r.id, o1.id).unwrap(),
            TransitionOutcome::Applied
        );
        let stored = store.get(r.id).unwrap().unwrap();
        assert_eq!(stored.match_state, MatchState::FullyMatched);
        assert_eq!(stored.offer(o1.id).unwrap().status, OfferStatus::Accepted);
        assert_eq!(stored.offer(o2.id).unwrap().status, OfferStatus::Rejected);

        // The losing accept sees a settled offer, not a pending one.
        assert_eq!(
            store.accept_offer(r.id, o2.id).unwrap(),
            TransitionOutcome::NotPending
        );
    }

    #[test]
    fn prune_drops_expired_unmatched_only() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let old = request(now - Duration::days(2));
        let mut old_matched = request(now - Duration::days(2));
        old_matched.match_state = MatchState::FullyMatched;
        let fresh = request(now);
        store.insert(&old).unwrap();
        store.insert(&old_matched).unwrap();
        store.insert(&fresh).unwrap();

        assert_eq!(store.prune_expired(now).unwrap(), 1);
        assert!(store.get(old.id).unwrap().is_none());
        assert!(store.get(old_matched.id).unwrap().is_some());
        assert!(store.get(fresh.id).unwrap().is_some());
    }
}
