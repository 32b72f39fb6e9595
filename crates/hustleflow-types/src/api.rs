use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{
    DurationDays, ExchangeKind, Identity, RequestStatus, Urgency,
};

// -- Identity credential --

/// The identity record a client presents with a write. Same shape the
/// session manager persists under its storage key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IdentityPayload {
    pub token: String,
    pub display_alias: String,
    pub real_name: String,
    pub room: String,
    #[serde(default)]
    pub contact: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl From<IdentityPayload> for Identity {
    fn from(p: IdentityPayload) -> Self {
        Identity {
            token: p.token,
            display_alias: p.display_alias,
            real_name: p.real_name,
            room: p.room,
            contact: p.contact,
            expires_at: p.expires_at,
        }
    }
}

impl From<Identity> for IdentityPayload {
    fn from(i: Identity) -> Self {
        IdentityPayload {
            token: i.token,
            display_alias: i.display_alias,
            real_name: i.real_name,
            room: i.room,
            contact: i.contact,
            expires_at: i.expires_at,
        }
    }
}

// -- Requests --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateRequestRequest {
    pub amount: i64,
    pub kind: ExchangeKind,
    pub urgency: Urgency,
    pub duration_days: DurationDays,
    /// Free-text hints forwarded to the advisory match narrator.
    #[serde(default)]
    pub preferences: Option<String>,
    pub identity: IdentityPayload,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateRequestRequest {
    pub amount: i64,
    pub kind: ExchangeKind,
    pub urgency: Urgency,
    pub duration_days: DurationDays,
}

// -- Offers --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MakeOfferRequest {
    pub amount: i64,
    pub identity: IdentityPayload,
}

// -- Views --

/// A party as one particular viewer is allowed to see it. Private fields
/// are populated only when the disclosure rule permits; the token never
/// leaves the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartyView {
    pub display_alias: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub real_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfferView {
    pub id: Uuid,
    pub amount: i64,
    pub status: crate::models::OfferStatus,
    pub created_at: DateTime<Utc>,
    pub offerer: PartyView,
    /// True when the viewer made this offer.
    pub mine: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestView {
    pub id: Uuid,
    pub amount: i64,
    pub currency: String,
    pub kind: ExchangeKind,
    pub urgency: Urgency,
    pub duration_days: DurationDays,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub owner: PartyView,
    pub offers: Vec<OfferView>,
    /// True when the viewer owns this request.
    pub mine: bool,
}

// -- Create response --

/// Advisory narrative attached to a successful create. Informational only;
/// it never feeds back into request or offer state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrativeView {
    pub reasoning: String,
    pub candidate_tokens: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateRequestResponse {
    pub request: RequestView,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narrative: Option<NarrativeView>,
}

// -- Errors --

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}
