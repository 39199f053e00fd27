use beacon_core::auth::AuthError;
use beacon_db::DbError;
use beacon_models::gateway::{
    CLOSE_INVALID_CREDENTIAL, CLOSE_MALFORMED_FRAME, CLOSE_MISSING_CREDENTIAL, CLOSE_RATE_LIMITED,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("malformed frame")]
    MalformedFrame,
    #[error("missing session credential")]
    MissingCredential,
    #[error("invalid credential: {0}")]
    InvalidCredential(#[from] AuthError),
    #[error("rate limited")]
    RateLimited,
    #[error("delivery failed: {0}")]
    DeliveryFailure(&'static str),
    #[error("unroutable envelope")]
    UnroutableEnvelope,
    #[error("database error: {0}")]
    Database(#[from] DbError),
}

impl GatewayError {
    /// WebSocket close code for connection-terminal errors. Delivery and
    /// routing failures are local, never a close.
    pub fn close_code(&self) -> Option<u16> {
        match self {
            Self::MalformedFrame => Some(CLOSE_MALFORMED_FRAME),
            Self::MissingCredential => Some(CLOSE_MISSING_CREDENTIAL),
            Self::InvalidCredential(_) => Some(CLOSE_INVALID_CREDENTIAL),
            Self::RateLimited => Some(CLOSE_RATE_LIMITED),
            Self::DeliveryFailure(_) | Self::UnroutableEnvelope | Self::Database(_) => None,
        }
    }
}
