use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::entities::job_entity::{Job, JobCreate, JobDbService, JobStatus, JobType};
use crate::entities::reward_code_entity::{
    self, generate_codes, CodeStats, RewardCode, RewardCodeDbService,
};
use crate::entities::job_entity;
use crate::middleware::ctx::Ctx;
use crate::middleware::error::{AppError, CtxResult};
use crate::middleware::mw_ctx::CtxState;
use crate::middleware::utils::db_utils::{Pagination, QryOrder};
use crate::middleware::utils::extractor_utils::{JsonOrFormValidated, ListQueryParams};
use crate::routes::parse_ident;

pub fn routes() -> Router<Arc<CtxState>> {
    Router::new()
        .route("/api/jobs", post(create_job))
        .route("/api/jobs/:job_id", get(get_job))
        .route("/api/jobs/:job_id/status", post(set_job_status))
        .route("/api/jobs/:job_id/codes", post(insert_codes).get(list_codes))
        .route("/api/jobs/:job_id/codes/stats", get(code_stats))
        .route("/api/codes/:code_id", delete(delete_code))
}

#[derive(Debug, Deserialize, Validate)]
pub struct JobCreateInput {
    #[validate(length(min = 1))]
    pub title: String,
    #[validate(range(min = 1))]
    pub reward: i64,
    #[validate(range(min = 1))]
    pub vacancy: i64,
    pub r#type: JobType,
    #[serde(default)]
    pub approval_required: bool,
}

async fn create_job(
    State(ctx_state): State<Arc<CtxState>>,
    ctx: Ctx,
    JsonOrFormValidated(data): JsonOrFormValidated<JobCreateInput>,
) -> CtxResult<Json<Job>> {
    let job_service = JobDbService {
        db: &ctx_state.db.client,
        ctx: &ctx,
    };
    let job = job_service
        .create(JobCreate {
            title: data.title,
            reward: data.reward,
            vacancy: data.vacancy,
            status: JobStatus::Active,
            r#type: data.r#type,
            approval_required: data.approval_required,
        })
        .await?;
    Ok(Json(job))
}

async fn get_job(
    State(ctx_state): State<Arc<CtxState>>,
    ctx: Ctx,
    Path(job_id): Path<String>,
) -> CtxResult<Json<Job>> {
    let job_service = JobDbService {
        db: &ctx_state.db.client,
        ctx: &ctx,
    };
    let job_thing = parse_ident(&job_id, job_entity::TABLE_NAME).map_err(|e| ctx.to_ctx_error(e))?;
    let job = job_service.get_by_id(&job_thing).await?;
    Ok(Json(job))
}

#[derive(Debug, Deserialize, Validate)]
pub struct JobStatusInput {
    pub status: JobStatus,
}

async fn set_job_status(
    State(ctx_state): State<Arc<CtxState>>,
    ctx: Ctx,
    Path(job_id): Path<String>,
    JsonOrFormValidated(data): JsonOrFormValidated<JobStatusInput>,
) -> CtxResult<Json<Job>> {
    let job_service = JobDbService {
        db: &ctx_state.db.client,
        ctx: &ctx,
    };
    let job_thing = parse_ident(&job_id, job_entity::TABLE_NAME).map_err(|e| ctx.to_ctx_error(e))?;
    let job = job_service.set_status(&job_thing, data.status).await?;
    Ok(Json(job))
}

const GENERATED_CODE_LEN: usize = 10;
const GENERATE_MAX: usize = 10_000;

#[derive(Debug, Deserialize, Validate)]
pub struct CodeBatchInput {
    /// Explicit codes, or none to have `generate` random ones minted.
    pub codes: Option<Vec<String>>,
    pub generate: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CodeBatchResponse {
    pub inserted: usize,
    pub codes: Vec<String>,
}

async fn insert_codes(
    State(ctx_state): State<Arc<CtxState>>,
    ctx: Ctx,
    Path(job_id): Path<String>,
    JsonOrFormValidated(data): JsonOrFormValidated<CodeBatchInput>,
) -> CtxResult<Json<CodeBatchResponse>> {
    let code_service = RewardCodeDbService {
        db: &ctx_state.db.client,
        ctx: &ctx,
    };
    let job_thing = parse_ident(&job_id, job_entity::TABLE_NAME).map_err(|e| ctx.to_ctx_error(e))?;

    let codes = match (data.codes, data.generate) {
        (Some(codes), None) if !codes.is_empty() => codes,
        (None, Some(count)) if (1..=GENERATE_MAX).contains(&count) => {
            generate_codes(count, GENERATED_CODE_LEN)
        }
        _ => {
            return Err(ctx.to_ctx_error(AppError::Validation {
                description: "Provide either codes or a generate count".to_string(),
            }))
        }
    };

    let inserted = code_service.insert_batch(&job_thing, codes.clone()).await?;
    Ok(Json(CodeBatchResponse { inserted, codes }))
}

async fn list_codes(
    State(ctx_state): State<Arc<CtxState>>,
    ctx: Ctx,
    Path(job_id): Path<String>,
    Query(params): Query<ListQueryParams>,
) -> CtxResult<Json<Vec<RewardCode>>> {
    let code_service = RewardCodeDbService {
        db: &ctx_state.db.client,
        ctx: &ctx,
    };
    let job_thing = parse_ident(&job_id, job_entity::TABLE_NAME).map_err(|e| ctx.to_ctx_error(e))?;
    let pagination = Some(Pagination {
        order_by: Some("r_created".to_string()),
        order_dir: Some(QryOrder::DESC),
        count: params.count.unwrap_or(20),
        start: params.start.unwrap_or(0),
    });
    let codes = code_service.list_by_job(&job_thing, pagination).await?;
    Ok(Json(codes))
}

async fn code_stats(
    State(ctx_state): State<Arc<CtxState>>,
    ctx: Ctx,
    Path(job_id): Path<String>,
) -> CtxResult<Json<CodeStats>> {
    let code_service = RewardCodeDbService {
        db: &ctx_state.db.client,
        ctx: &ctx,
    };
    let job_thing = parse_ident(&job_id, job_entity::TABLE_NAME).map_err(|e| ctx.to_ctx_error(e))?;
    let stats = code_service.job_code_stats(&job_thing).await?;
    Ok(Json(stats))
}

async fn delete_code(
    State(ctx_state): State<Arc<CtxState>>,
    ctx: Ctx,
    Path(code_id): Path<String>,
) -> CtxResult<Json<serde_json::Value>> {
    let code_service = RewardCodeDbService {
        db: &ctx_state.db.client,
        ctx: &ctx,
    };
    let code_thing =
        parse_ident(&code_id, reward_code_entity::TABLE_NAME).map_err(|e| ctx.to_ctx_error(e))?;
    code_service.delete(&code_thing).await?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}
