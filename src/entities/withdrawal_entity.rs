use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use surrealdb::sql::{Datetime, Thing};

use crate::database::client::Db;
use crate::entities::{task_entity, USER_TABLE};
use crate::middleware::ctx::Ctx;
use crate::middleware::error::{AppError, CtxError, CtxResult};
use crate::middleware::utils::db_utils::{
    check_custom_query_errors, get_entity, get_entity_list, with_not_found_err, IdentIdName,
    Pagination,
};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Withdrawal {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Thing>,
    pub user: Thing,
    pub amount: i64,
    pub status: WithdrawalStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r_created: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r_updated: Option<DateTime<Utc>>,
}

#[derive(EnumString, Display, Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum WithdrawalStatus {
    Pending,
    Approved,
    Rejected,
}

pub struct WithdrawalDbService<'a> {
    pub db: &'a Db,
    pub ctx: &'a Ctx,
}

pub const TABLE_NAME: &str = "withdrawal";
const TASK_TABLE: &str = task_entity::TABLE_NAME;

pub const THROW_BALANCE_TOO_LOW: &str = "Not enough balance";
pub const THROW_WITHDRAWAL_NOT_FOUND: &str = "Withdrawal not found";
pub const THROW_WITHDRAWAL_FINALIZED: &str = "Withdrawal already finalized";

impl<'a> WithdrawalDbService<'a> {
    pub async fn mutate_db(&self) -> Result<(), AppError> {
        let st_pending = WithdrawalStatus::Pending.to_string();
        let st_approved = WithdrawalStatus::Approved.to_string();
        let st_rejected = WithdrawalStatus::Rejected.to_string();
        let sql = format!("
    DEFINE TABLE IF NOT EXISTS {TABLE_NAME} SCHEMAFULL;
    DEFINE FIELD IF NOT EXISTS user ON TABLE {TABLE_NAME} TYPE record<{USER_TABLE}>;
    DEFINE INDEX IF NOT EXISTS user_idx ON TABLE {TABLE_NAME} COLUMNS user;
    DEFINE FIELD IF NOT EXISTS amount ON TABLE {TABLE_NAME} TYPE number ASSERT $value > 0;
    DEFINE FIELD IF NOT EXISTS status ON TABLE {TABLE_NAME} TYPE string ASSERT $value INSIDE ['{st_pending}','{st_approved}','{st_rejected}'];
    DEFINE INDEX IF NOT EXISTS user_status_idx ON TABLE {TABLE_NAME} COLUMNS user, status;
    DEFINE FIELD IF NOT EXISTS admin_notes ON TABLE {TABLE_NAME} TYPE option<string>;
    DEFINE FIELD IF NOT EXISTS r_created ON TABLE {TABLE_NAME} TYPE option<datetime> DEFAULT time::now() VALUE $before OR time::now();
    DEFINE FIELD IF NOT EXISTS r_updated ON TABLE {TABLE_NAME} TYPE option<datetime> DEFAULT time::now() VALUE time::now();
    ");
        let mutation = self.db.query(sql).await?;
        mutation.check().expect("should mutate withdrawal");

        Ok(())
    }

    /// Creates the pending debit. The balance check and the create are one
    /// transaction; pending requests reserve their amount so concurrent
    /// requests can not jointly overdraw closed-month earnings.
    pub async fn create_request(
        &self,
        user_id: &Thing,
        amount: i64,
        month_start: DateTime<Utc>,
    ) -> CtxResult<Withdrawal> {
        let st_task_approved = task_entity::TaskStatus::Approved.to_string();
        let st_pending = WithdrawalStatus::Pending.to_string();
        let st_approved = WithdrawalStatus::Approved.to_string();
        let qry = format!("BEGIN TRANSACTION;
            LET $earned = math::sum((SELECT VALUE amount FROM {TASK_TABLE} WHERE user=$user_id AND status='{st_task_approved}' AND approved_at < $month_start));
            LET $reserved = math::sum((SELECT VALUE amount FROM {TABLE_NAME} WHERE user=$user_id AND status IN ['{st_pending}','{st_approved}']));
            IF $amount > $earned - $reserved {{ THROW \"{THROW_BALANCE_TOO_LOW}\"; }};
            LET $w = CREATE {TABLE_NAME} CONTENT {{
                user: $user_id,
                amount: $amount,
                status: '{st_pending}',
            }};
            RETURN $w[0];
        COMMIT TRANSACTION;");

        let mut res = self
            .db
            .query(qry)
            .bind(("user_id", user_id.clone()))
            .bind(("amount", amount))
            .bind(("month_start", Datetime::from(month_start)))
            .await
            .map_err(CtxError::from(self.ctx))?;
        check_custom_query_errors(&mut res, &[(THROW_BALANCE_TOO_LOW, AppError::BalanceTooLow)])
            .map_err(|e| self.ctx.to_ctx_error(e))?;

        let last = res.num_statements() - 1;
        let withdrawal = res.take::<Option<Withdrawal>>(last)?;
        with_not_found_err(withdrawal, self.ctx, &user_id.to_raw())
    }

    /// External authority settles the request; the guard on `Pending` makes
    /// settlement idempotency-safe.
    pub async fn finalize(
        &self,
        withdrawal_id: &Thing,
        status: WithdrawalStatus,
        notes: Option<String>,
    ) -> CtxResult<Withdrawal> {
        if status == WithdrawalStatus::Pending {
            return Err(self.ctx.to_ctx_error(AppError::Validation {
                description: "Withdrawal can only be finalized to Approved or Rejected"
                    .to_string(),
            }));
        }
        let st_pending = WithdrawalStatus::Pending.to_string();
        let qry = format!("BEGIN TRANSACTION;
            IF !record::exists($w_id) {{ THROW \"{THROW_WITHDRAWAL_NOT_FOUND}\"; }};
            LET $upd = UPDATE $w_id SET status=$status, admin_notes=$notes WHERE status='{st_pending}' RETURN AFTER;
            IF array::len($upd)==0 {{ THROW \"{THROW_WITHDRAWAL_FINALIZED}\"; }};
            RETURN $upd[0];
        COMMIT TRANSACTION;");

        let mut res = self
            .db
            .query(qry)
            .bind(("w_id", withdrawal_id.clone()))
            .bind(("status", status.to_string()))
            .bind(("notes", notes))
            .await
            .map_err(CtxError::from(self.ctx))?;
        check_custom_query_errors(
            &mut res,
            &[
                (
                    THROW_WITHDRAWAL_NOT_FOUND,
                    AppError::EntityFailIdNotFound {
                        ident: withdrawal_id.to_raw(),
                    },
                ),
                (
                    THROW_WITHDRAWAL_FINALIZED,
                    AppError::WithdrawalAlreadyFinalized,
                ),
            ],
        )
        .map_err(|e| self.ctx.to_ctx_error(e))?;

        let last = res.num_statements() - 1;
        let withdrawal = res.take::<Option<Withdrawal>>(last)?;
        with_not_found_err(withdrawal, self.ctx, &withdrawal_id.to_raw())
    }

    pub async fn get(&self, ident: IdentIdName) -> CtxResult<Withdrawal> {
        let opt = get_entity::<Withdrawal>(self.db, TABLE_NAME.to_string(), &ident).await?;
        with_not_found_err(opt, self.ctx, ident.to_string().as_str())
    }

    pub async fn list_by_user(
        &self,
        user_id: &Thing,
        pagination: Option<Pagination>,
    ) -> CtxResult<Vec<Withdrawal>> {
        get_entity_list::<Withdrawal>(
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
