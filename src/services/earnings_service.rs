use chrono::{DateTime, Datelike, Duration, Utc};
use serde::{Deserialize, Serialize};
use surrealdb::sql::{Datetime, Thing};

use crate::database::client::Db;
use crate::entities::{task_entity, withdrawal_entity};
use crate::middleware::ctx::Ctx;
use crate::middleware::error::{CtxError, CtxResult};

/// Point-in-time read model over approved tasks. Nothing here is stored
/// state - every figure is derived from the task and withdrawal tables, so
/// the ledger can not drift from its source of truth.
#[derive(Debug, Serialize, Deserialize)]
pub struct EarningsView {
    pub today: i64,
    pub week: i64,
    pub month: i64,
    /// Earnings from fully closed months minus approved withdrawals.
    pub balance: i64,
    pub total_earned: i64,
    pub pending_payments: i64,
    pub completed_tasks: i64,
}

pub struct EarningsService<'a> {
    pub db: &'a Db,
    pub ctx: &'a Ctx,
}

/// Start of the current calendar month in UTC. Everything approved before
/// this instant belongs to a closed month and is withdrawable.
pub fn month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive()
        .with_day(1)
        .expect("day 1 exists in every month")
        .and_hms_opt(0, 0, 0)
        .expect("midnight exists")
        .and_utc()
}

pub fn today_start(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive()
        .and_hms_opt(0, 0, 0)
        .expect("midnight exists")
        .and_utc()
}

impl<'a> EarningsService<'a> {
    pub async fn get_earnings(
        &self,
        user_id: &Thing,
        now: DateTime<Utc>,
    ) -> CtxResult<EarningsView> {
        let task_table = task_entity::TABLE_NAME;
        let withdrawal_table = withdrawal_entity::TABLE_NAME;
        let st_approved = task_entity::TaskStatus::Approved.to_string();
        let st_pending = task_entity::TaskStatus::Pending.to_string();
        let w_approved = withdrawal_entity::WithdrawalStatus::Approved.to_string();

        let qry = format!("
            RETURN math::sum((SELECT VALUE amount FROM {task_table} WHERE user=$user_id AND status='{st_approved}' AND approved_at >= $today_start));
            RETURN math::sum((SELECT VALUE amount FROM {task_table} WHERE user=$user_id AND status='{st_approved}' AND approved_at >= $week_start));
            RETURN math::sum((SELECT VALUE amount FROM {task_table} WHERE user=$user_id AND status='{st_approved}' AND approved_at >= $month_start));
            RETURN math::sum((SELECT VALUE amount FROM {task_table} WHERE user=$user_id AND status='{st_approved}' AND approved_at < $month_start));
            RETURN math::sum((SELECT VALUE amount FROM {task_table} WHERE user=$user_id AND status='{st_approved}'));
            RETURN math::sum((SELECT VALUE amount FROM {task_table} WHERE user=$user_id AND status='{st_pending}'));
            RETURN array::len((SELECT VALUE id FROM {task_table} WHERE user=$user_id AND status='{st_approved}'));
            RETURN math::sum((SELECT VALUE amount FROM {withdrawal_table} WHERE user=$user_id AND status='{w_approved}'));
        ");

        let mut res = self
            .db
            .query(qry)
            .bind(("user_id", user_id.clone()))
            .bind(("today_start", Datetime::from(today_start(now))))
            .bind(("week_start", Datetime::from(now - Duration::days(7))))
            .bind(("month_start", Datetime::from(month_start(now))))
            .await
            .map_err(CtxError::from(self.ctx))?;

        let today = res.take::<Option<i64>>(0)?.unwrap_or(0);
        let week = res.take::<Option<i64>>(1)?.unwrap_or(0);
        let month = res.take::<Option<i64>>(2)?.unwrap_or(0);
        let closed_months = res.take::<Option<i64>>(3)?.unwrap_or(0);
        let total_earned = res.take::<Option<i64>>(4)?.unwrap_or(0);
        let pending_payments = res.take::<Option<i64>>(5)?.unwrap_or(0);
        let completed_tasks = res.take::<Option<i64>>(6)?.unwrap_or(0);
        let withdrawn = res.take::<Option<i64>>(7)?.unwrap_or(0);

        Ok(EarningsView {
            today,
            week,
            month,
            balance: closed_months - withdrawn,
            total_earned,
            pending_payments,
            completed_tasks,
        })
    }
}
