use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;

use crate::middleware::ctx::Ctx;
use crate::middleware::error::CtxResult;
use crate::middleware::mw_ctx::CtxState;
use crate::services::earnings_service::{EarningsService, EarningsView};

pub fn routes() -> Router<Arc<CtxState>> {
    Router::new().route("/api/user/earnings", get(get_user_earnings))
}

async fn get_user_earnings(
    State(ctx_state): State<Arc<CtxState>>,
    ctx: Ctx,
) -> CtxResult<Json<EarningsView>> {
    let user_thing = ctx.user_thing()?;
    let earnings_service = EarningsService {
        db: &ctx_state.db.client,
        ctx: &ctx,
    };
    let earnings = earnings_service.get_earnings(&user_thing, Utc::now()).await?;
    Ok(Json(earnings))
}
