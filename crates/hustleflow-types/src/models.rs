use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Validity window of a saved identity. Renewal on every explicit save
/// preserves token and alias but resets this window.
pub const IDENTITY_TTL_HOURS: i64 = 24;

/// A caller's pseudonymous session identity. Created client-side by the
/// session manager and presented as a credential with every write; the
/// board never mints one itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub token: String,
    pub display_alias: String,
    pub real_name: String,
    pub room: String,
    pub contact: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl Identity {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Value copy embedded into requests and offers at creation time.
    /// Later renewals of the identity never touch existing snapshots.
    pub fn snapshot(&self) -> PartySnapshot {
        PartySnapshot {
            token: self.token.clone(),
            display_alias: self.display_alias.clone(),
            real_name: self.real_name.clone(),
            room: self.room.clone(),
            contact: self.contact.clone(),
        }
    }
}

/// Frozen identity fields of a request owner or offerer. The token is the
/// authorization anchor and is immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartySnapshot {
    pub token: String,
    pub display_alias: String,
    pub real_name: String,
    pub room: String,
    pub contact: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeKind {
    Cash,
    Digital,
}

impl ExchangeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cash => "cash",
            Self::Digital => "digital",
        }
    }
}

impl std::str::FromStr for ExchangeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cash" => Ok(Self::Cash),
            "digital" => Ok(Self::Digital),
            other => Err(format!("unknown exchange kind: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Urgent,
    Flexible,
}

impl Urgency {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Urgent => "urgent",
            Self::Flexible => "flexible",
        }
    }
}

impl std::str::FromStr for Urgency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "urgent" => Ok(Self::Urgent),
            "flexible" => Ok(Self::Flexible),
            other => Err(format!("unknown urgency: {other}")),
        }
    }
}

/// How long a request stays on the board. Only 1, 3 and 7 days are offered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum DurationDays {
    One,
    Three,
    Seven,
}

impl DurationDays {
    pub fn as_days(self) -> i64 {
        match self {
            Self::One => 1,
            Self::Three => 3,
            Self::Seven => 7,
        }
    }
}

impl TryFrom<u8> for DurationDays {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::One),
            3 => Ok(Self::Three),
            7 => Ok(Self::Seven),
            other => Err(format!("duration must be 1, 3 or 7 days, got {other}")),
        }
    }
}

impl From<DurationDays> for u8 {
    fn from(value: DurationDays) -> Self {
        match value {
            DurationDays::One => 1,
            DurationDays::Three => 3,
            DurationDays::Seven => 7,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OfferStatus {
    Pending,
    Accepted,
    Rejected,
}

impl OfferStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }
}

impl std::str::FromStr for OfferStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "rejected" => Ok(Self::Rejected),
            other => Err(format!("unknown offer status: {other}")),
        }
    }
}

/// Persisted match state. The three-state display status is derived from
/// this plus the offer list, so stored and displayed state cannot disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchState {
    Open,
    FullyMatched,
}

/// Display status of a request as shown on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestStatus {
    Open,
    #[serde(rename = "Partially Matched")]
    PartiallyMatched,
    #[serde(rename = "Fully Matched")]
    FullyMatched,
}

/// The owner-mutable terms of a request. Everything else on a request
/// (id, owner, creation time, match state, offers) is fixed at creation
/// or driven by the offer lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestTerms {
    pub amount: i64,
    pub kind: ExchangeKind,
    pub urgency: Urgency,
    pub duration_days: DurationDays,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeRequest {
    pub id: Uuid,
    pub amount: i64,
    pub currency: String,
    pub kind: ExchangeKind,
    pub urgency: Urgency,
    pub duration_days: DurationDays,
    pub match_state: MatchState,
    pub created_at: DateTime<Utc>,
    pub owner: PartySnapshot,
    pub offers: Vec<TransactionOffer>,
}

impl ExchangeRequest {
    /// Board status: `PartiallyMatched` is never stored, only derived.
    pub fn status(&self) -> RequestStatus {
        match self.match_state {
            MatchState::FullyMatched => RequestStatus::FullyMatched,
            MatchState::Open if !self.offers.is_empty() => RequestStatus::PartiallyMatched,
            MatchState::Open => RequestStatus::Open,
        }
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.created_at + Duration::days(self.duration_days.as_days())
    }

    /// Matched requests never expire; everything else leaves the board once
    /// its active window has passed.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.match_state != MatchState::FullyMatched && now >= self.expires_at()
    }

    pub fn offer(&self, offer_id: Uuid) -> Option<&TransactionOffer> {
        self.offers.iter().find(|o| o.id == offer_id)
    }

    pub fn has_offer_from(&self, token: &str) -> bool {
        self.offers.iter().any(|o| o.offerer.token == token)
    }

    pub fn accepted_offer(&self) -> Option<&TransactionOffer> {
        self.offers.iter().find(|o| o.status == OfferStatus::Accepted)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionOffer {
    pub id: Uuid,
    pub offerer: PartySnapshot,
    pub amount: i64,
    pub status: OfferStatus,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn party(token: &str) -> PartySnapshot {
        PartySnapshot {
            token: token.to_string(),
            display_alias: "Panda".to_string(),
            real_name: "Asha".to_string(),
            room: "B-204".to_string(),
            contact: None,
        }
    }

    fn request(duration: DurationDays, created_at: DateTime<Utc>) -> ExchangeRequest {
        ExchangeRequest {
            id: Uuid::new_v4(),
            amount: 500,
            currency: "INR".to_string(),
            kind: ExchangeKind::Cash,
            urgency: Urgency::Urgent,
            duration_days: duration,
            match_state: MatchState::Open,
            created_at,
            owner: party("tok-owner"),
            offers: vec![],
        }
    }

    fn offer(token: &str, status: OfferStatus, at: DateTime<Utc>) -> TransactionOffer {
        TransactionOffer {
            id: Uuid::new_v4(),
            offerer: party(token),
            amount: 500,
            status,
            created_at: at,
        }
    }

    #[test]
    fn status_is_derived_from_match_state_and_offers() {
        let now = Utc::now();
        let mut r = request(DurationDays::Three, now);
        assert_eq!(r.status(), RequestStatus::Open);

        r.offers.push(offer("tok-a", OfferStatus::Pending, now));
        assert_eq!(r.status(), RequestStatus::PartiallyMatched);

        r.match_state = MatchState::FullyMatched;
        assert_eq!(r.status(), RequestStatus::FullyMatched);
    }

    #[test]
    fn expiry_boundary_is_inclusive() {
        let created = Utc::now();
        let r = request(DurationDays::One, created);
        assert!(!r.is_expired(created + Duration::hours(23)));
        assert!(r.is_expired(created + Duration::days(1)));
        assert!(r.is_expired(created + Duration::hours(25)));
    }

    #[test]
    fn matched_requests_never_expire() {
        let created = Utc::now();
        let mut r = request(DurationDays::One, created);
        r.match_state = MatchState::FullyMatched;
        assert!(!r.is_expired(created + Duration::days(30)));
    }

    #[test]
    fn duration_serde_accepts_only_the_offered_windows() {
        assert_eq!(
            serde_json::from_str::<DurationDays>("3").unwrap(),
            DurationDays::Three
        );
        assert!(serde_json::from_str::<DurationDays>("2").is_err());
        assert_eq!(serde_json::to_string(&DurationDays::Seven).unwrap(), "7");
    }

    #[test]
    fn status_serializes_with_display_names() {
        assert_eq!(
            serde_json::to_string(&RequestStatus::PartiallyMatched).unwrap(),
            "\"Partially Matched\""
        );
    }

    #[test]
    fn snapshot_is_a_value_copy() {
        let now = Utc::now();
        let mut identity = Identity {
            token: "hstl_abc".to_string(),
            display_alias: "Otter".to_string(),
            real_name: "Ravi".to_string(),
            room: "C-110".to_string(),
            contact: Some("98765".to_string()),
            expires_at: now + Duration::hours(24),
        };
        let snapshot = identity.snapshot();
        identity.real_name = "Renamed".to_string();
        assert_eq!(snapshot.real_name, "Ravi");
        assert_eq!(snapshot.token, identity.token);
    }
}
