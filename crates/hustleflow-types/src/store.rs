use anyhow::Result;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{ExchangeRequest, RequestTerms, TransactionOffer};

/// Outcome of appending an offer to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Appended,
    RequestMissing,
    /// The offerer already has an offer on this request.
    Duplicate,
}

/// Outcome of an offer-status transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    Applied,
    RequestMissing,
    OfferMissing,
    /// The offer exists but already left the pending state.
    NotPending,
}

/// Outcome of a plain request mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Applied,
    RequestMissing,
}

/// Persistence seam for the request collection. The repository owns the
/// business rules; implementations own atomicity:
///
/// - `append_offer` must enforce the one-offer-per-identity rule in the
///   same atomic step as the append, so two concurrent offers from one
///   identity cannot both land.
/// - `accept_offer` must flip the target offer to accepted, every other
///   pending offer to rejected, and the request to matched in one atomic
///   step with no observable intermediate state; a concurrent accept on
///   the same request must lose with `OfferMissing` or `NotPending`.
///
/// Operations on different requests are independent; no cross-request
/// locking is required.
pub trait RequestStore: Send + Sync + 'static {
    fn insert(&self, request: &ExchangeRequest) -> Result<()>;

    fn get(&self, id: Uuid) -> Result<Option<ExchangeRequest>>;

    /// All requests, expired ones included; callers apply the read-time
    /// expiry filter.
    fn list(&self) -> Result<Vec<ExchangeRequest>>;

    fn update_terms(&self, id: Uuid, terms: &RequestTerms) -> Result<WriteOutcome>;

    fn remove(&self, id: Uuid) -> Result<WriteOutcome>;

    fn append_offer(&self, request_id: Uuid, offer: &TransactionOffer) -> Result<AppendOutcome>;

    fn accept_offer(&self, request_id: Uuid, offer_id: Uuid) -> Result<TransitionOutcome>;

    fn reject_offer(&self, request_id: Uuid, offer_id: Uuid) -> Result<TransitionOutcome>;

    /// Physically drop expired, unmatched requests. Listings already hide
    /// them; this only reclaims storage and may run on any schedule.
    fn prune_expired(&self, now: DateTime<Utc>) -> Result<usize>;
}
