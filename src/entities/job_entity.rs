use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use surrealdb::sql::Thing;

use crate::database::client::Db;
use crate::middleware::ctx::Ctx;
use crate::middleware::error::{AppError, CtxError, CtxResult};
use crate::middleware::utils::db_utils::{get_entity, with_not_found_err, IdentIdName};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Job {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Thing>,
    pub title: String,
    pub reward: i64,
    pub vacancy: i64,
    pub completed: i64,
    pub status: JobStatus,
    pub r#type: JobType,
    pub approval_required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r_created: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct JobCreate {
    pub title: String,
    pub reward: i64,
    pub vacancy: i64,
    pub status: JobStatus,
    pub r#type: JobType,
    pub approval_required: bool,
}

#[derive(EnumString, Display, Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum JobStatus {
    Active,
    Paused,
    Completed,
}

#[derive(EnumString, Display, Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum JobType {
    Code,
    Image,
}

pub struct JobDbService<'a> {
    pub db: &'a Db,
    pub ctx: &'a Ctx,
}

pub const TABLE_NAME: &str = "job";

pub const THROW_JOB_UNAVAILABLE: &str = "Job unavailable";

impl<'a> JobDbService<'a> {
    pub async fn mutate_db(&self) -> Result<(), AppError> {
        let st_active = JobStatus::Active.to_string();
        let st_paused = JobStatus::Paused.to_string();
        let st_completed = JobStatus::Completed.to_string();
        let ty_code = JobType::Code.to_string();
        let ty_image = JobType::Image.to_string();
        let sql = format!("
    DEFINE TABLE IF NOT EXISTS {TABLE_NAME} SCHEMAFULL;
    DEFINE FIELD IF NOT EXISTS title ON TABLE {TABLE_NAME} TYPE string ASSERT string::len(string::trim($value))>0;
    DEFINE FIELD IF NOT EXISTS reward ON TABLE {TABLE_NAME} TYPE number ASSERT $value > 0;
    DEFINE FIELD IF NOT EXISTS vacancy ON TABLE {TABLE_NAME} TYPE number ASSERT $value >= 0;
    DEFINE FIELD IF NOT EXISTS completed ON TABLE {TABLE_NAME} TYPE number DEFAULT 0;
    DEFINE FIELD IF NOT EXISTS status ON TABLE {TABLE_NAME} TYPE string ASSERT $value INSIDE ['{st_active}','{st_paused}','{st_completed}'];
    DEFINE INDEX IF NOT EXISTS status_idx ON TABLE {TABLE_NAME} COLUMNS status;
    DEFINE FIELD IF NOT EXISTS type ON TABLE {TABLE_NAME} TYPE string ASSERT $value INSIDE ['{ty_code}','{ty_image}'];
    DEFINE FIELD IF NOT EXISTS approval_required ON TABLE {TABLE_NAME} TYPE bool DEFAULT false;
    DEFINE FIELD IF NOT EXISTS r_created ON TABLE {TABLE_NAME} TYPE option<datetime> DEFAULT time::now() VALUE $before OR time::now();
    DEFINE FIELD IF NOT EXISTS r_updated ON TABLE {TABLE_NAME} TYPE option<datetime> DEFAULT time::now() VALUE time::now();
    ");
        let mutation = self.db.query(sql).await?;
        mutation.check().expect("should mutate job");

        Ok(())
    }

    pub async fn create(&self, record: JobCreate) -> CtxResult<Job> {
        if record.vacancy < 1 {
            return Err(self.ctx.to_ctx_error(AppError::Validation {
                description: "Job vacancy must be at least 1".to_string(),
            }));
        }
        self.db
            .create(TABLE_NAME)
            .content(record)
            .await
            .map_err(CtxError::from(self.ctx))
            .map(|v: Option<Job>| v.expect("created job"))
    }

    pub async fn get(&self, ident: IdentIdName) -> CtxResult<Job> {
        let opt = get_entity::<Job>(self.db, TABLE_NAME.to_string(), &ident).await?;
        with_not_found_err(opt, self.ctx, ident.to_string().as_str())
    }

    pub async fn get_by_id(&self, id: &Thing) -> CtxResult<Job> {
        self.get(IdentIdName::Id(id.clone())).await
    }

    /// Admin pause/resume/retire. Job counters are never touched here - they
    /// move only inside redemption and approval transactions.
    pub async fn set_status(&self, id: &Thing, status: JobStatus) -> CtxResult<Job> {
        let mut res = self
            .db
            .query("UPDATE (<record>$id) SET status=$status RETURN AFTER;")
            .bind(("id", id.to_raw()))
            .bind(("status", status.to_string()))
            .await
            .map_err(CtxError::from(self.ctx))?;
        let job = res.take::<Option<Job>>(0)?;
        with_not_found_err(job, self.ctx, &id.to_raw())
    }
}
