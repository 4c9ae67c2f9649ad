mod changes;
mod health_check;
mod subscriptions;
mod voters;

use actix_web::http::StatusCode;
use actix_web::ResponseError;
pub use changes::*;
pub use health_check::*;
pub use subscriptions::*;
pub use voters::*;

use crate::service::VoterError;
use crate::storage::StorageError;

impl ResponseError for VoterError {
    // the body is the `Display` message; the cause chain only goes to the logs
    fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) | Self::Storage(StorageError::NotFound(_)) => StatusCode::NOT_FOUND,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Duplicate(_) => StatusCode::CONFLICT,
            Self::PendingChanges(_) | Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
