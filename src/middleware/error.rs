use std::fmt;

use axum::{http::StatusCode, response::IntoResponse};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::middleware::ctx::Ctx;

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct CtxError {
    pub error: AppError,
    pub req_id: Uuid,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppError {
    Generic { description: String },
    AuthenticationFail,
    EntityFailIdNotFound { ident: String },
    CodeNotFound,
    CodeAlreadyUsed,
    CodeInUse,
    DuplicateCode,
    DuplicateSubmission,
    TaskAlreadyFinalized,
    WithdrawalAlreadyFinalized,
    JobUnavailable,
    WithdrawalWindowClosed,
    BalanceTooLow,
    Validation { description: String },
    Serde { source: String },
    SurrealDb { source: String },
    SurrealDbNoResult { source: String, id: String },
}

/// CtxError carries the req_id to report to the client and implements IntoResponse.
pub type CtxResult<T> = core::result::Result<T, CtxError>;
/// Any error for storing before composing a response.
pub type AppResult<T> = core::result::Result<T, AppError>;

impl std::error::Error for AppError {}

// for slightly less verbose error mappings
impl CtxError {
    pub fn from<T: Into<AppError>>(ctx: &Ctx) -> impl FnOnce(T) -> CtxError + '_ {
        |err| CtxError {
            req_id: ctx.req_id(),
            error: err.into(),
        }
    }
}

impl From<surrealdb::Error> for CtxError {
    fn from(value: surrealdb::Error) -> Self {
        CtxError {
            req_id: Uuid::new_v4(),
            error: value.into(),
        }
    }
}

impl From<AppError> for CtxError {
    fn from(value: AppError) -> Self {
        CtxError {
            req_id: Uuid::new_v4(),
            error: value,
        }
    }
}

const INTERNAL: &str = "Internal error";

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Generic { description } => write!(f, "{description}"),
            Self::AuthenticationFail => write!(f, "Authentication failed"),
            Self::EntityFailIdNotFound { ident: id } => write!(f, "Record id= {id} not found"),
            Self::CodeNotFound => write!(f, "Code not found"),
            Self::CodeAlreadyUsed => write!(f, "Code already used"),
            Self::CodeInUse => write!(f, "Code already redeemed and can not be deleted"),
            Self::DuplicateCode => write!(f, "Duplicate code in batch"),
            Self::DuplicateSubmission => write!(f, "Submission for this job is already pending"),
            Self::TaskAlreadyFinalized => write!(f, "Task already finalized"),
            Self::WithdrawalAlreadyFinalized => write!(f, "Withdrawal already finalized"),
            Self::JobUnavailable => write!(f, "Job is not available"),
            Self::WithdrawalWindowClosed => write!(f, "Withdrawals are closed until the 26th"),
            Self::BalanceTooLow => write!(f, "Not enough balance"),
            Self::Validation { description } => write!(f, "{description}"),
            Self::Serde { source } => write!(f, "Serde error - {source}"),
            Self::SurrealDb { .. } => write!(f, "{INTERNAL}"),
            Self::SurrealDbNoResult { id, .. } => write!(f, "No result for id {id}"),
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ErrorResponseBody {
    error: String,
    req_id: String,
}

impl ErrorResponseBody {
    pub fn new(error: String, req_id: Option<String>) -> Self {
        ErrorResponseBody {
            error,
            req_id: req_id.unwrap_or_else(|| Uuid::new_v4().to_string()),
        }
    }

    pub fn get_err(&self) -> String {
        self.error.clone()
    }
}

impl From<ErrorResponseBody> for String {
    fn from(value: ErrorResponseBody) -> Self {
        serde_json::to_string(&value).unwrap()
    }
}

// REST error response
impl IntoResponse for CtxError {
    fn into_response(self) -> axum::response::Response {
        tracing::debug!("->> {:<12} - into_response - {self:?}", "ERROR");
        let status_code = match self.error {
            AppError::EntityFailIdNotFound { .. }
            | AppError::CodeNotFound
            | AppError::SurrealDbNoResult { .. } => StatusCode::NOT_FOUND,
            AppError::CodeAlreadyUsed
            | AppError::CodeInUse
            | AppError::DuplicateCode
            | AppError::DuplicateSubmission
            | AppError::TaskAlreadyFinalized
            | AppError::WithdrawalAlreadyFinalized => StatusCode::CONFLICT,
            AppError::JobUnavailable
            | AppError::WithdrawalWindowClosed
            | AppError::BalanceTooLow => StatusCode::FORBIDDEN,
            AppError::Validation { .. } | AppError::Generic { .. } | AppError::Serde { .. } => {
                StatusCode::BAD_REQUEST
            }
            AppError::AuthenticationFail => StatusCode::UNAUTHORIZED,
            // datastore failures are retryable - mutations are conditional updates
            AppError::SurrealDb { .. } => StatusCode::SERVICE_UNAVAILABLE,
        };
        let err = self.error.clone();
        let body: String =
            ErrorResponseBody::new(self.error.to_string(), Some(self.req_id.to_string())).into();
        let mut response = (status_code, body).into_response();
        // Insert the real Error into the response - for the logger
        response.extensions_mut().insert(err);
        response
    }
}

// External Errors
impl From<serde_json::Error> for AppError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serde {
            source: value.to_string(),
        }
    }
}

impl From<surrealdb::Error> for AppError {
    fn from(value: surrealdb::Error) -> Self {
        Self::SurrealDb {
            source: value.to_string(),
        }
    }
}

impl From<CtxError> for AppError {
    fn from(value: CtxError) -> Self {
        value.error
    }
}
