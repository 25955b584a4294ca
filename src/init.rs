use std::sync::Arc;

use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{http::StatusCode, Router};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::database::client::Database;
use crate::entities::job_entity::JobDbService;
use crate::entities::reward_code_entity::RewardCodeDbService;
use crate::entities::task_entity::TaskDbService;
use crate::entities::withdrawal_entity::WithdrawalDbService;
use crate::middleware::ctx::Ctx;
use crate::middleware::error::AppResult;
use crate::middleware::mw_ctx::CtxState;
use crate::routes::{earnings_routes, job_routes, task_routes, withdraw_routes};

pub async fn run_migrations(database: &Database) -> AppResult<()> {
    let db = database.client.clone();
    let c = Ctx::new(Ok("migrations".to_string()), Uuid::new_v4());

    JobDbService { db: &db, ctx: &c }.mutate_db().await?;
    RewardCodeDbService { db: &db, ctx: &c }.mutate_db().await?;
    TaskDbService { db: &db, ctx: &c }.mutate_db().await?;
    WithdrawalDbService { db: &db, ctx: &c }.mutate_db().await?;
    Ok(())
}

pub fn main_router(ctx_state: &Arc<CtxState>) -> Router {
    Router::new()
        .route("/hc", get(get_hc))
        .merge(job_routes::routes())
        .merge(task_routes::routes())
        .merge(earnings_routes::routes())
        .merge(withdraw_routes::routes())
        .with_state(ctx_state.clone())
        .layer(TraceLayer::new_for_http())
}

async fn get_hc() -> Response {
    const VERSION: &str = env!("CARGO_PKG_VERSION");
    (StatusCode::OK, format!("v{}", VERSION)).into_response()
}
