use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use surrealdb::sql::Thing;

use crate::database::client::Db;
use crate::entities::{job_entity, USER_TABLE};
use crate::middleware::ctx::Ctx;
use crate::middleware::error::{AppError, CtxError, CtxResult};
use crate::middleware::utils::db_utils::{
    check_custom_query_errors, get_entity, get_entity_list, with_not_found_err, IdentIdName,
    Pagination,
};

use job_entity::THROW_JOB_UNAVAILABLE;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Task {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Thing>,
    pub job: Thing,
    pub user: Thing,
    /// Copied from the job reward at submission time, never recomputed.
    pub amount: i64,
    pub status: TaskStatus,
    pub origin: TaskOrigin,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proof: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r_created: Option<DateTime<Utc>>,
}

#[derive(EnumString, Display, Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum TaskStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(EnumString, Display, Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum TaskOrigin {
    CodeRedeem,
    Submission,
}

pub struct TaskDbService<'a> {
    pub db: &'a Db,
    pub ctx: &'a Ctx,
}

pub const TABLE_NAME: &str = "task";
const JOB_TABLE: &str = job_entity::TABLE_NAME;

pub const THROW_TASK_NOT_FOUND: &str = "Task not found";
pub const THROW_TASK_FINALIZED: &str = "Task already finalized";
pub const THROW_DUPLICATE_SUBMISSION: &str = "Submission already pending";
pub const THROW_JOB_NOT_FOUND: &str = "Job not found";
pub const THROW_NOT_SUBMISSION_JOB: &str = "Job does not accept submissions";

impl<'a> TaskDbService<'a> {
    pub async fn mutate_db(&self) -> Result<(), AppError> {
        let st_pending = TaskStatus::Pending.to_string();
        let st_approved = TaskStatus::Approved.to_string();
        let st_rejected = TaskStatus::Rejected.to_string();
        let or_code = TaskOrigin::CodeRedeem.to_string();
        let or_submission = TaskOrigin::Submission.to_string();
        let sql = format!("
    DEFINE TABLE IF NOT EXISTS {TABLE_NAME} SCHEMAFULL;
    DEFINE FIELD IF NOT EXISTS job ON TABLE {TABLE_NAME} TYPE record<{JOB_TABLE}>;
    DEFINE INDEX IF NOT EXISTS job_idx ON TABLE {TABLE_NAME} COLUMNS job;
    DEFINE FIELD IF NOT EXISTS user ON TABLE {TABLE_NAME} TYPE record<{USER_TABLE}>;
    DEFINE INDEX IF NOT EXISTS user_idx ON TABLE {TABLE_NAME} COLUMNS user;
    DEFINE FIELD IF NOT EXISTS amount ON TABLE {TABLE_NAME} TYPE number ASSERT $value > 0;
    DEFINE FIELD IF NOT EXISTS status ON TABLE {TABLE_NAME} TYPE string ASSERT $value INSIDE ['{st_pending}','{st_approved}','{st_rejected}'];
    DEFINE INDEX IF NOT EXISTS user_status_idx ON TABLE {TABLE_NAME} COLUMNS user, status;
    DEFINE FIELD IF NOT EXISTS origin ON TABLE {TABLE_NAME} TYPE string ASSERT $value INSIDE ['{or_code}','{or_submission}'];
    DEFINE FIELD IF NOT EXISTS proof ON TABLE {TABLE_NAME} TYPE option<string>;
    DEFINE FIELD IF NOT EXISTS admin_notes ON TABLE {TABLE_NAME} TYPE option<string>;
    DEFINE FIELD IF NOT EXISTS approved_at ON TABLE {TABLE_NAME} TYPE option<datetime>;
    DEFINE INDEX IF NOT EXISTS approved_at_idx ON TABLE {TABLE_NAME} COLUMNS approved_at;
    DEFINE FIELD IF NOT EXISTS r_created ON TABLE {TABLE_NAME} TYPE option<datetime> DEFAULT time::now() VALUE $before OR time::now();
    ");
        let mutation = self.db.query(sql).await?;
        mutation.check().expect("should mutate task");

        Ok(())
    }

    /// One pending submission per (job, user); the check and the create run in
    /// the same transaction.
    pub async fn submit(
        &self,
        job_id: &Thing,
        user_id: &Thing,
        proof: String,
    ) -> CtxResult<Task> {
        let st_active = job_entity::JobStatus::Active.to_string();
        let st_pending = TaskStatus::Pending.to_string();
        let origin = TaskOrigin::Submission.to_string();
        let ty_image = job_entity::JobType::Image.to_string();
        let qry = format!("BEGIN TRANSACTION;
            LET $job = (SELECT * FROM $job_id)[0];
            IF $job == NONE {{ THROW \"{THROW_JOB_NOT_FOUND}\"; }};
            IF $job.type != '{ty_image}' {{ THROW \"{THROW_NOT_SUBMISSION_JOB}\"; }};
            IF $job.status != '{st_active}' OR $job.vacancy <= 0 {{ THROW \"{THROW_JOB_UNAVAILABLE}\"; }};
            LET $existing = SELECT VALUE id FROM {TABLE_NAME} WHERE job=$job_id AND user=$user_id AND status='{st_pending}';
            IF array::len($existing) > 0 {{ THROW \"{THROW_DUPLICATE_SUBMISSION}\"; }};
            LET $task = CREATE {TABLE_NAME} CONTENT {{
                job: $job_id,
                user: $user_id,
                amount: $job.reward,
                status: '{st_pending}',
                origin: '{origin}',
                proof: $proof,
            }};
            RETURN $task[0];
        COMMIT TRANSACTION;");

        let mut res = self
            .db
            .query(qry)
            .bind(("job_id", job_id.clone()))
            .bind(("user_id", user_id.clone()))
            .bind(("proof", proof))
            .await
            .map_err(CtxError::from(self.ctx))?;
        check_custom_query_errors(
            &mut res,
            &[
                (
                    THROW_JOB_NOT_FOUND,
                    AppError::EntityFailIdNotFound {
                        ident: job_id.to_raw(),
                    },
                ),
                (
                    THROW_NOT_SUBMISSION_JOB,
                    AppError::Validation {
                        description: THROW_NOT_SUBMISSION_JOB.to_string(),
                    },
                ),
                (THROW_JOB_UNAVAILABLE, AppError::JobUnavailable),
                (THROW_DUPLICATE_SUBMISSION, AppError::DuplicateSubmission),
            ],
        )
        .map_err(|e| self.ctx.to_ctx_error(e))?;

        let last = res.num_statements() - 1;
        let task = res.take::<Option<Task>>(last)?;
        with_not_found_err(task, self.ctx, &job_id.to_raw())
    }

    /// pending -> approved, terminal. The `WHERE status='Pending'` guard makes
    /// a second concurrent approval lose and keeps the ledger credited once.
    /// Manually submitted tasks consume their vacancy slot here; redeemed
    /// tasks already took theirs inside the redemption transaction.
    pub async fn approve(&self, task_id: &Thing, notes: Option<String>) -> CtxResult<Task> {
        let st_pending = TaskStatus::Pending.to_string();
        let st_approved = TaskStatus::Approved.to_string();
        let st_active = job_entity::JobStatus::Active.to_string();
        let or_submission = TaskOrigin::Submission.to_string();
        let qry = format!("BEGIN TRANSACTION;
            LET $task = (SELECT * FROM $task_id)[0];
            IF $task == NONE {{ THROW \"{THROW_TASK_NOT_FOUND}\"; }};
            LET $upd = UPDATE $task_id SET status='{st_approved}', approved_at=time::now(), admin_notes=$notes WHERE status='{st_pending}' RETURN AFTER;
            IF array::len($upd)==0 {{ THROW \"{THROW_TASK_FINALIZED}\"; }};
            IF $task.origin == '{or_submission}' {{
                LET $job_upd = UPDATE $task.job SET vacancy -= 1, completed += 1 WHERE status='{st_active}' AND vacancy > 0 RETURN AFTER;
                IF array::len($job_upd)==0 {{ THROW \"{THROW_JOB_UNAVAILABLE}\"; }};
            }};
            RETURN $upd[0];
        COMMIT TRANSACTION;");

        self.finalize(task_id, qry, notes).await
    }

    /// pending -> rejected, terminal. No ledger effect, counters untouched.
    pub async fn reject(&self, task_id: &Thing, notes: Option<String>) -> CtxResult<Task> {
        let st_pending = TaskStatus::Pending.to_string();
        let st_rejected = TaskStatus::Rejected.to_string();
        let qry = format!("BEGIN TRANSACTION;
            LET $task = (SELECT * FROM $task_id)[0];
            IF $task == NONE {{ THROW \"{THROW_TASK_NOT_FOUND}\"; }};
            LET $upd = UPDATE $task_id SET status='{st_rejected}', admin_notes=$notes WHERE status='{st_pending}' RETURN AFTER;
            IF array::len($upd)==0 {{ THROW \"{THROW_TASK_FINALIZED}\"; }};
            RETURN $upd[0];
        COMMIT TRANSACTION;");

        self.finalize(task_id, qry, notes).await
    }

    async fn finalize(
        &self,
        task_id: &Thing,
        qry: String,
        notes: Option<String>,
    ) -> CtxResult<Task> {
        let mut res = self
            .db
            .query(qry)
            .bind(("task_id", task_id.clone()))
            .bind(("notes", notes))
            .await
            .map_err(CtxError::from(self.ctx))?;
        check_custom_query_errors(
            &mut res,
            &[
                (
                    THROW_TASK_NOT_FOUND,
                    AppError::EntityFailIdNotFound {
                        ident: task_id.to_raw(),
                    },
                ),
                (THROW_TASK_FINALIZED, AppError::TaskAlreadyFinalized),
                (THROW_JOB_UNAVAILABLE, AppError::JobUnavailable),
            ],
        )
        .map_err(|e| self.ctx.to_ctx_error(e))?;

        let last = res.num_statements() - 1;
        let task = res.take::<Option<Task>>(last)?;
        with_not_found_err(task, self.ctx, &task_id.to_raw())
    }

    pub async fn get(&self, ident: IdentIdName) -> CtxResult<Task> {
        let opt = get_entity::<Task>(self.db, TABLE_NAME.to_string(), &ident).await?;
        with_not_found_err(opt, self.ctx, ident.to_string().as_str())
    }

    pub async fn get_by_id(&self, id: &Thing) -> CtxResult<Task> {
        self.get(IdentIdName::Id(id.clone())).await
    }

    pub async fn list_by_user(
        &self,
        user_id: &Thing,
        pagination: Option<Pagination>,
    ) -> CtxResult<Vec<Task>> {
        get_entity_list::<Task>(
            self.db,
            TABLE_NAME.to_string(),
            &IdentIdName::ColumnIdent {
                column: "user".to_string(),
                val: user_id.to_raw(),
                rec: true,
            },
            pagination,
        )
        .await
    }
}
