use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts, http::StatusCode};
use surrealdb::sql::Thing;
use uuid::Uuid;

use super::error::{AppError, AppResult, CtxError, CtxResult};
use crate::entities::user_ident;

/// Request context. Authentication lives in the upstream gateway which
/// forwards the verified caller id in the `x-user-id` header.
pub const USER_ID_HEADER: &str = "x-user-id";

#[derive(Clone, Debug)]
pub struct Ctx {
    result_user_id: AppResult<String>,
    req_id: Uuid,
}

impl Ctx {
    pub fn new(result_user_id: AppResult<String>, req_id: Uuid) -> Self {
        Self {
            result_user_id,
            req_id,
        }
    }

    pub fn req_id(&self) -> Uuid {
        self.req_id
    }

    pub fn user_id(&self) -> CtxResult<String> {
        self.result_user_id.clone().map_err(|error| CtxError {
            error,
            req_id: self.req_id,
        })
    }

    pub fn user_thing(&self) -> CtxResult<Thing> {
        let id = self.user_id()?;
        match id.find(':') {
            None => Ok(user_ident(&id)),
            Some(ind) => Ok(user_ident(&id[ind + 1..])),
        }
    }

    pub fn to_ctx_error(&self, error: AppError) -> CtxError {
        CtxError {
            error,
            req_id: self.req_id,
        }
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Ctx {
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id: AppResult<String> = match parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            Some(id) if !id.trim().is_empty() => Ok(id.to_string()),
            _ => Err(AppError::AuthenticationFail),
        };

        Ok(Ctx::new(user_id, Uuid::new_v4()))
    }
}
