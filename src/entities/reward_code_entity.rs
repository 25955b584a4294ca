use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use rand::distributions::Alphanumeric;
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use surrealdb::sql::{to_value, Thing, Value};

use crate::database::client::Db;
use crate::entities::{job_entity, task_entity, USER_TABLE};
use crate::middleware::ctx::Ctx;
use crate::middleware::error::{AppError, CtxError, CtxResult};
use crate::middleware::utils::db_utils::{
    check_custom_query_errors, get_entity, get_entity_list, with_not_found_err, IdentIdName,
    Pagination, QryBindingsVal,
};

use job_entity::THROW_JOB_UNAVAILABLE;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RewardCode {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Thing>,
    pub job: Thing,
    pub code: String,
    pub used: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used_by: Option<Thing>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r_created: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
struct RewardCodeCreate {
    job: Thing,
    code: String,
    used: bool,
}

/// What a successful claim commits: the code row, the job counters and the
/// credited task - all in one transaction.
#[derive(Debug, Deserialize)]
pub struct RedeemOutcome {
    pub task_id: Thing,
    pub reward: i64,
    pub approved: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CodeStats {
    pub total: i64,
    pub used: i64,
}

pub struct RewardCodeDbService<'a> {
    pub db: &'a Db,
    pub ctx: &'a Ctx,
}

pub const TABLE_NAME: &str = "reward_code";
const JOB_TABLE: &str = job_entity::TABLE_NAME;
const TASK_TABLE: &str = task_entity::TABLE_NAME;

pub const THROW_CODE_NOT_FOUND: &str = "Code not found";
pub const THROW_CODE_USED: &str = "Code already used";
pub const THROW_CODE_IN_USE: &str = "Code already redeemed";
pub const THROW_NOT_CODE_JOB: &str = "Job does not accept codes";

static CODE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{4,64}$").expect("valid regex"));

pub fn generate_codes(count: usize, len: usize) -> Vec<String> {
    let mut out: HashSet<String> = HashSet::with_capacity(count);
    let mut rng = rand::thread_rng();
    while out.len() < count {
        let code: String = (&mut rng)
            .sample_iter(&Alphanumeric)
            .take(len)
            .map(char::from)
            .collect();
        out.insert(code);
    }
    out.into_iter().collect()
}

impl<'a> RewardCodeDbService<'a> {
    pub async fn mutate_db(&self) -> Result<(), AppError> {
        let sql = format!("
    DEFINE TABLE IF NOT EXISTS {TABLE_NAME} SCHEMAFULL;
    DEFINE FIELD IF NOT EXISTS job ON TABLE {TABLE_NAME} TYPE record<{JOB_TABLE}>;
    DEFINE INDEX IF NOT EXISTS job_idx ON TABLE {TABLE_NAME} COLUMNS job;
    DEFINE FIELD IF NOT EXISTS code ON TABLE {TABLE_NAME} TYPE string ASSERT string::len(string::trim($value))>0;
    DEFINE INDEX IF NOT EXISTS job_code_idx ON TABLE {TABLE_NAME} COLUMNS job, code UNIQUE;
    DEFINE FIELD IF NOT EXISTS used ON TABLE {TABLE_NAME} TYPE bool DEFAULT false;
    DEFINE FIELD IF NOT EXISTS used_by ON TABLE {TABLE_NAME} TYPE option<record<{USER_TABLE}>>;
    DEFINE FIELD IF NOT EXISTS used_at ON TABLE {TABLE_NAME} TYPE option<datetime>;
    DEFINE FIELD IF NOT EXISTS r_created ON TABLE {TABLE_NAME} TYPE option<datetime> DEFAULT time::now() VALUE $before OR time::now();
    ");
        let mutation = self.db.query(sql).await?;
        mutation.check().expect("should mutate rewardCode");

        Ok(())
    }

    /// Whole batch is atomic - one duplicate (in the batch or already stored
    /// for this job) rejects everything.
    pub async fn insert_batch(&self, job_id: &Thing, codes: Vec<String>) -> CtxResult<usize> {
        if codes.is_empty() {
            return Err(self.ctx.to_ctx_error(AppError::Validation {
                description: "Code batch is empty".to_string(),
            }));
        }
        let mut seen: HashSet<&str> = HashSet::with_capacity(codes.len());
        for code in codes.iter() {
            if !CODE_RE.is_match(code) {
                return Err(self.ctx.to_ctx_error(AppError::Validation {
                    description: format!("Invalid code format: {code}"),
                }));
            }
            if !seen.insert(code.as_str()) {
                return Err(self.ctx.to_ctx_error(AppError::DuplicateCode));
            }
        }

        let rows: Vec<RewardCodeCreate> = codes
            .into_iter()
            .map(|code| RewardCodeCreate {
                job: job_id.clone(),
                code,
                used: false,
            })
            .collect();
        let count = rows.len();

        let ty_code = job_entity::JobType::Code.to_string();
        let throw_job_not_found = task_entity::THROW_JOB_NOT_FOUND;
        let qry = format!(
            "BEGIN TRANSACTION;
            LET $job = (SELECT * FROM $job_id)[0];
            IF $job == NONE {{ THROW \"{throw_job_not_found}\"; }};
            IF $job.type != '{ty_code}' {{ THROW \"{THROW_NOT_CODE_JOB}\"; }};
            INSERT INTO {TABLE_NAME} $rows;
            COMMIT TRANSACTION;"
        );
        let mut res = self
            .db
            .query(qry)
            .bind(("job_id", job_id.clone()))
            .bind(("rows", rows))
            .await
            .map_err(CtxError::from(self.ctx))?;
        check_custom_query_errors(
            &mut res,
            &[
                (
                    throw_job_not_found,
                    AppError::EntityFailIdNotFound {
                        ident: job_id.to_raw(),
                    },
                ),
                (
                    THROW_NOT_CODE_JOB,
                    AppError::Validation {
                        description: THROW_NOT_CODE_JOB.to_string(),
                    },
                ),
                ("already contains", AppError::DuplicateCode),
            ],
        )
        .map_err(|e| self.ctx.to_ctx_error(e))?;
        Ok(count)
    }

    /// Used codes are the audit trail of a paid-out redemption and stay put.
    pub async fn delete(&self, code_id: &Thing) -> CtxResult<()> {
        if code_id.tb != TABLE_NAME {
            return Err(self.ctx.to_ctx_error(AppError::EntityFailIdNotFound {
                ident: code_id.to_raw(),
            }));
        }
        let qry = format!(
            "BEGIN TRANSACTION;
            LET $row = (SELECT * FROM <record>$id)[0];
            IF $row == NONE {{ THROW \"{THROW_CODE_NOT_FOUND}\"; }};
            IF $row.used {{ THROW \"{THROW_CODE_IN_USE}\"; }};
            DELETE (<record>$id);
            COMMIT TRANSACTION;"
        );
        let mut res = self
            .db
            .query(qry)
            .bind(("id", code_id.to_raw()))
            .await
            .map_err(CtxError::from(self.ctx))?;
        check_custom_query_errors(
            &mut res,
            &[
                (THROW_CODE_NOT_FOUND, AppError::CodeNotFound),
                (THROW_CODE_IN_USE, AppError::CodeInUse),
            ],
        )
        .map_err(|e| self.ctx.to_ctx_error(e))?;
        Ok(())
    }

    pub async fn get(&self, ident: IdentIdName) -> CtxResult<RewardCode> {
        let opt = get_entity::<RewardCode>(self.db, TABLE_NAME.to_string(), &ident).await?;
        with_not_found_err(opt, self.ctx, ident.to_string().as_str())
    }

    pub async fn list_by_job(
        &self,
        job_id: &Thing,
        pagination: Option<Pagination>,
    ) -> CtxResult<Vec<RewardCode>> {
        get_entity_list::<RewardCode>(
            self.db,
            TABLE_NAME.to_string(),
            &IdentIdName::ColumnIdent {
                column: "job".to_string(),
                val: job_id.to_raw(),
                rec: true,
            },
            pagination,
        )
        .await
    }

    pub async fn job_code_stats(&self, job_id: &Thing) -> CtxResult<CodeStats> {
        let mut res = self
            .db
            .query(format!(
                "RETURN array::len((SELECT VALUE id FROM {TABLE_NAME} WHERE job=$job_id));
                RETURN array::len((SELECT VALUE id FROM {TABLE_NAME} WHERE job=$job_id AND used=true));"
            ))
            .bind(("job_id", job_id.clone()))
            .await
            .map_err(CtxError::from(self.ctx))?;
        let total = res.take::<Option<i64>>(0)?.unwrap_or(0);
        let used = res.take::<Option<i64>>(1)?.unwrap_or(0);
        Ok(CodeStats { total, used })
    }

    /// Claims the code for the user. The read of `used` and the write that
    /// flips it are one conditional UPDATE guarded by `used=false`, so
    /// concurrent attempts on the same code have exactly one winner; losers
    /// observe the THROW and no partial credit exists.
    pub async fn redeem(
        &self,
        job_id: &Thing,
        code: &str,
        user_id: &Thing,
    ) -> CtxResult<RedeemOutcome> {
        if !CODE_RE.is_match(code) {
            return Err(self.ctx.to_ctx_error(AppError::Validation {
                description: "Invalid code format".to_string(),
            }));
        }
        let qry = Self::get_redeem_qry(job_id, code, user_id)
            .map_err(|e| self.ctx.to_ctx_error(e))?;
        let mut res = qry
            .into_query(self.db)
            .await
            .map_err(CtxError::from(self.ctx))?;
        check_custom_query_errors(
            &mut res,
            &[
                (THROW_CODE_NOT_FOUND, AppError::CodeNotFound),
                (THROW_CODE_USED, AppError::CodeAlreadyUsed),
                (THROW_JOB_UNAVAILABLE, AppError::JobUnavailable),
            ],
        )
        .map_err(|e| self.ctx.to_ctx_error(e))?;

        let last = res.num_statements() - 1;
        let outcome = res.take::<Option<RedeemOutcome>>(last)?;
        outcome.ok_or_else(|| {
            self.ctx.to_ctx_error(AppError::SurrealDb {
                source: "redeem transaction returned no outcome".to_string(),
            })
        })
    }

    fn get_redeem_qry(
        job_id: &Thing,
        code: &str,
        user_id: &Thing,
    ) -> Result<QryBindingsVal<Value>, AppError> {
        let st_approved = task_entity::TaskStatus::Approved.to_string();
        let st_pending = task_entity::TaskStatus::Pending.to_string();
        let origin = task_entity::TaskOrigin::CodeRedeem.to_string();
        let st_active = job_entity::JobStatus::Active.to_string();

        let qry = format!("BEGIN TRANSACTION;
            LET $code_rows = SELECT VALUE id FROM {TABLE_NAME} WHERE job=$job_id AND code=$code;
            IF array::len($code_rows)==0 {{ THROW \"{THROW_CODE_NOT_FOUND}\"; }};
            LET $claimed = UPDATE {TABLE_NAME} SET used=true, used_by=$user_id, used_at=time::now() WHERE job=$job_id AND code=$code AND used=false RETURN AFTER;
            IF array::len($claimed)==0 {{ THROW \"{THROW_CODE_USED}\"; }};
            LET $job_upd = UPDATE $job_id SET vacancy -= 1, completed += 1 WHERE status='{st_active}' AND vacancy > 0 RETURN AFTER;
            IF array::len($job_upd)==0 {{ THROW \"{THROW_JOB_UNAVAILABLE}\"; }};
            LET $job = $job_upd[0];
            LET $auto = !$job.approval_required;
            LET $task_status = IF $auto {{ '{st_approved}' }} ELSE {{ '{st_pending}' }};
            LET $approved_at = IF $auto {{ time::now() }} ELSE {{ NONE }};
            LET $task = CREATE {TASK_TABLE} CONTENT {{
                job: $job_id,
                user: $user_id,
                amount: $job.reward,
                status: $task_status,
                origin: '{origin}',
                proof: $code,
                approved_at: $approved_at,
            }};
            RETURN {{ task_id: $task[0].id, reward: $job.reward, approved: $auto }};
        COMMIT TRANSACTION;");

        let mut bindings: HashMap<String, Value> = HashMap::new();
        bindings.insert(
            "job_id".to_string(),
            to_value(job_id.clone()).map_err(|e| AppError::SurrealDb {
                source: e.to_string(),
            })?,
        );
        bindings.insert(
            "user_id".to_string(),
            to_value(user_id.clone()).map_err(|e| AppError::SurrealDb {
                source: e.to_string(),
            })?,
        );
        bindings.insert(
            "code".to_string(),
            to_value(code.to_string()).map_err(|e| AppError::SurrealDb {
                source: e.to_string(),
            })?,
        );
        Ok(QryBindingsVal::new(qry, bindings))
    }
}
