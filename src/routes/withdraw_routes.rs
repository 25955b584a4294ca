use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::entities::withdrawal_entity::{self, Withdrawal, WithdrawalDbService};
use crate::middleware::ctx::Ctx;
use crate::middleware::error::CtxResult;
use crate::middleware::mw_ctx::CtxState;
use crate::middleware::utils::db_utils::{Pagination, QryOrder};
use crate::middleware::utils::extractor_utils::{JsonOrFormValidated, ListQueryParams};
use crate::routes::parse_ident;
use crate::services::withdraw_service::{is_withdrawal_open, WithdrawService};

pub fn routes() -> Router<Arc<CtxState>> {
    Router::new()
        .route("/api/withdrawals/window", get(withdrawal_window))
        .route("/api/user/withdrawals", post(request_withdrawal).get(list_user_withdrawals))
        .route("/api/withdrawals/:withdrawal_id/approve", post(approve_withdrawal))
        .route("/api/withdrawals/:withdrawal_id/reject", post(reject_withdrawal))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WithdrawalWindowView {
    pub open: bool,
    pub day: u32,
}

async fn withdrawal_window() -> Json<WithdrawalWindowView> {
    let now = Utc::now();
    Json(WithdrawalWindowView {
        open: is_withdrawal_open(now),
        day: now.day(),
    })
}

#[derive(Debug, Deserialize, Validate)]
pub struct WithdrawInput {
    #[validate(range(min = 1))]
    pub amount: i64,
}

async fn request_withdrawal(
    State(ctx_state): State<Arc<CtxState>>,
    ctx: Ctx,
    JsonOrFormValidated(data): JsonOrFormValidated<WithdrawInput>,
) -> CtxResult<Json<Withdrawal>> {
    let user_thing = ctx.user_thing()?;
    let withdraw_service = WithdrawService::new(
        &ctx_state.db.client,
        &ctx,
        &ctx_state.notification_sender,
    );
    let withdrawal = withdraw_service
        .request_withdrawal(&user_thing, data.amount, Utc::now())
        .await?;
    Ok(Json(withdrawal))
}

async fn list_user_withdrawals(
    State(ctx_state): State<Arc<CtxState>>,
    ctx: Ctx,
    Query(params): Query<ListQueryParams>,
) -> CtxResult<Json<Vec<Withdrawal>>> {
    let user_thing = ctx.user_thing()?;
    let withdrawal_db_service = WithdrawalDbService {
        db: &ctx_state.db.client,
        ctx: &ctx,
    };
    let pagination = Some(Pagination {
        order_by: Some("r_created".to_string()),
        order_dir: Some(QryOrder::DESC),
        count: params.count.unwrap_or(20),
        start: params.start.unwrap_or(0),
    });
    let withdrawals = withdrawal_db_service
        .list_by_user(&user_thing, pagination)
        .await?;
    Ok(Json(withdrawals))
}

#[derive(Debug, Deserialize, Validate)]
pub struct FinalizeWithdrawalInput {
    pub notes: Option<String>,
}

async fn approve_withdrawal(
    State(ctx_state): State<Arc<CtxState>>,
    ctx: Ctx,
    Path(withdrawal_id): Path<String>,
    JsonOrFormValidated(data): JsonOrFormValidated<FinalizeWithdrawalInput>,
) -> CtxResult<Json<Withdrawal>> {
    let withdrawal_thing = parse_ident(&withdrawal_id, withdrawal_entity::TABLE_NAME)
        .map_err(|e| ctx.to_ctx_error(e))?;
    let withdraw_service = WithdrawService::new(
        &ctx_state.db.client,
        &ctx,
        &ctx_state.notification_sender,
    );
    let withdrawal = withdraw_service.approve(&withdrawal_thing, data.notes).await?;
    Ok(Json(withdrawal))
}

async fn reject_withdrawal(
    State(ctx_state): State<Arc<CtxState>>,
    ctx: Ctx,
    Path(withdrawal_id): Path<String>,
    JsonOrFormValidated(data): JsonOrFormValidated<FinalizeWithdrawalInput>,
) -> CtxResult<Json<Withdrawal>> {
    let withdrawal_thing = parse_ident(&withdrawal_id, withdrawal_entity::TABLE_NAME)
        .map_err(|e| ctx.to_ctx_error(e))?;
    let withdraw_service = WithdrawService::new(
        &ctx_state.db.client,
        &ctx,
        &ctx_state.notification_sender,
    );
    let withdrawal = withdraw_service.reject(&withdrawal_thing, data.notes).await?;
    Ok(Json(withdrawal))
}
