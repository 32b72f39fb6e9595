use thiserror::Error;
use uuid::Uuid;

/// Central error taxonomy for board operations. Every failure a write can
/// produce is one of these kinds; the HTTP layer maps them to statuses and
/// the presentation layer maps them to user-facing text.
#[derive(Debug, Error)]
pub enum BoardError {
    /// Malformed or out-of-range fields; the user corrects and resubmits.
    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    /// No valid session identity accompanied a write.
    #[error("a valid identity is required for this action")]
    IdentityRequired,

    /// The referenced request does not exist: deleted, expired, or bad id.
    #[error("request not found: {0}")]
    NotFound(Uuid),

    /// The referenced offer does not exist on that request.
    #[error("offer not found: {0}")]
    OfferNotFound(Uuid),

    /// Caller token matches neither the required owner nor the admin token.
    #[error("caller is not authorized to perform this action")]
    Unauthorized,

    /// Owners cannot make offers on their own requests.
    #[error("cannot make an offer on your own request")]
    SelfOfferForbidden,

    /// This identity already has an offer on that request.
    #[error("an offer from this identity already exists on this request")]
    DuplicateOffer,

    /// The offer already left the pending state.
    #[error("offer has already been accepted or rejected")]
    AlreadyActioned,

    /// Backing store failure. Not part of the board contract; surfaced
    /// opaquely and logged server-side.
    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl BoardError {
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }

    /// Stable machine-readable kind for API error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput { .. } => "invalid_input",
            Self::IdentityRequired => "identity_required",
            Self::NotFound(_) => "not_found",
            Self::OfferNotFound(_) => "offer_not_found",
            Self::Unauthorized => "unauthorized",
            Self::SelfOfferForbidden => "self_offer_forbidden",
            Self::DuplicateOffer => "duplicate_offer",
            Self::AlreadyActioned => "already_actioned",
            Self::Storage(_) => "storage",
        }
    }
}

pub type BoardResult<T> = std::result::Result<T, BoardError>;
