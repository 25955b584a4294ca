use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use surrealdb::sql::Thing;
use validator::Validate;

use crate::entities::task_entity::{self, Task};
use crate::entities::task_entity::TaskDbService;
use crate::entities::job_entity;
use crate::middleware::ctx::Ctx;
use crate::middleware::error::CtxResult;
use crate::middleware::mw_ctx::CtxState;
use crate::middleware::utils::db_utils::{Pagination, QryOrder};
use crate::middleware::utils::extractor_utils::{JsonOrFormValidated, ListQueryParams};
use crate::routes::parse_ident;
use crate::services::redeem_service::RedeemService;
use crate::services::task_service::TaskService;

pub fn routes() -> Router<Arc<CtxState>> {
    Router::new()
        .route("/api/jobs/:job_id/redeem", post(redeem_code))
        .route("/api/jobs/:job_id/tasks", post(submit_task))
        .route("/api/user/tasks", get(list_user_tasks))
        .route("/api/tasks/:task_id/approve", post(approve_task))
        .route("/api/tasks/:task_id/reject", post(reject_task))
}

#[derive(Debug, Deserialize, Validate)]
pub struct RedeemInput {
    #[validate(length(min = 4, max = 64))]
    pub code: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RedeemResponse {
    pub success: bool,
    pub task_id: Thing,
    pub reward: i64,
    pub message: String,
}

async fn redeem_code(
    State(ctx_state): State<Arc<CtxState>>,
    ctx: Ctx,
    Path(job_id): Path<String>,
    JsonOrFormValidated(data): JsonOrFormValidated<RedeemInput>,
) -> CtxResult<Json<RedeemResponse>> {
    let user_thing = ctx.user_thing()?;
    let job_thing = parse_ident(&job_id, job_entity::TABLE_NAME).map_err(|e| ctx.to_ctx_error(e))?;

    let redeem_service = RedeemService::new(
        &ctx_state.db.client,
        &ctx,
        &ctx_state.notification_sender,
    );
    let outcome = redeem_service
        .redeem(&job_thing, &data.code, &user_thing)
        .await?;

    let message = match outcome.approved {
        true => format!("Code redeemed, {} credited", outcome.reward),
        false => format!("Code redeemed, {} pending review", outcome.reward),
    };
    Ok(Json(RedeemResponse {
        success: true,
        task_id: outcome.task_id,
        reward: outcome.reward,
        message,
    }))
}

#[derive(Debug, Deserialize, Validate)]
pub struct SubmitTaskInput {
    #[validate(length(min = 1))]
    pub image_uri: String,
}

async fn submit_task(
    State(ctx_state): State<Arc<CtxState>>,
    ctx: Ctx,
    Path(job_id): Path<String>,
    JsonOrFormValidated(data): JsonOrFormValidated<SubmitTaskInput>,
) -> CtxResult<Json<Task>> {
    let user_thing = ctx.user_thing()?;
    let job_thing = parse_ident(&job_id, job_entity::TABLE_NAME).map_err(|e| ctx.to_ctx_error(e))?;

    let task_service = TaskService::new(
        &ctx_state.db.client,
        &ctx,
        &ctx_state.notification_sender,
    );
    let task = task_service
        .submit(&job_thing, &user_thing, data.image_uri)
        .await?;
    Ok(Json(task))
}

async fn list_user_tasks(
    State(ctx_state): State<Arc<CtxState>>,
    ctx: Ctx,
    Query(params): Query<ListQueryParams>,
) -> CtxResult<Json<Vec<Task>>> {
    let user_thing = ctx.user_thing()?;
    let task_db_service = TaskDbService {
        db: &ctx_state.db.client,
        ctx: &ctx,
    };
    let pagination = Some(Pagination {
        order_by: Some("r_created".to_string()),
        order_dir: Some(QryOrder::DESC),
        count: params.count.unwrap_or(20),
        start: params.start.unwrap_or(0),
    });
    let tasks = task_db_service.list_by_user(&user_thing, pagination).await?;
    Ok(Json(tasks))
}

#[derive(Debug, Deserialize, Validate)]
pub struct FinalizeTaskInput {
    pub notes: Option<String>,
}

async fn approve_task(
    State(ctx_state): State<Arc<CtxState>>,
    ctx: Ctx,
    Path(task_id): Path<String>,
    JsonOrFormValidated(data): JsonOrFormValidated<FinalizeTaskInput>,
) -> CtxResult<Json<Task>> {
    let task_thing =
        parse_ident(&task_id, task_entity::TABLE_NAME).map_err(|e| ctx.to_ctx_error(e))?;
    let task_service = TaskService::new(
        &ctx_state.db.client,
        &ctx,
        &ctx_state.notification_sender,
    );
    let task = task_service.approve(&task_thing, data.notes).await?;
    Ok(Json(task))
}

async fn reject_task(
    State(ctx_state): State<Arc<CtxState>>,
    ctx: Ctx,
    Path(task_id): Path<String>,
    JsonOrFormValidated(data): JsonOrFormValidated<FinalizeTaskInput>,
) -> CtxResult<Json<Task>> {
    let task_thing =
        parse_ident(&task_id, task_entity::TABLE_NAME).map_err(|e| ctx.to_ctx_error(e))?;
    let task_service = TaskService::new(
        &ctx_state.db.client,
        &ctx,
        &ctx_state.notification_sender,
    );
    let task = task_service.reject(&task_thing, data.notes).await?;
    Ok(Json(task))
}
