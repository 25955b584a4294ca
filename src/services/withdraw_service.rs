use std::sync::Arc;

use chrono::{DateTime, Datelike, Utc};
use surrealdb::sql::Thing;
use tracing::warn;

use crate::database::client::Db;
use crate::entities::withdrawal_entity::{Withdrawal, WithdrawalDbService, WithdrawalStatus};
use crate::interfaces::send_notification::SendNotificationInterface;
use crate::middleware::ctx::Ctx;
use crate::middleware::error::{AppError, CtxResult};
use crate::services::earnings_service::month_start;

/// Requests open on the 26th and stay open through the last day of the month,
/// whatever its length.
pub const WITHDRAW_OPEN_FROM_DAY: u32 = 26;

pub fn is_withdrawal_open(date: DateTime<Utc>) -> bool {
    date.day() >= WITHDRAW_OPEN_FROM_DAY
}

pub struct WithdrawService<'a> {
    ctx: &'a Ctx,
    withdrawals_repository: WithdrawalDbService<'a>,
    notification_sender: &'a Arc<dyn SendNotificationInterface + Send + Sync>,
}

impl<'a> WithdrawService<'a> {
    pub fn new(
        db: &'a Db,
        ctx: &'a Ctx,
        notification_sender: &'a Arc<dyn SendNotificationInterface + Send + Sync>,
    ) -> Self {
        Self {
            ctx,
            withdrawals_repository: WithdrawalDbService { db, ctx },
            notification_sender,
        }
    }

    pub async fn request_withdrawal(
        &self,
        user_id: &Thing,
        amount: i64,
        now: DateTime<Utc>,
    ) -> CtxResult<Withdrawal> {
        if amount < 1 {
            return Err(self.ctx.to_ctx_error(AppError::Validation {
                description: "Withdrawal amount must be positive".to_string(),
            }));
        }
        if !is_withdrawal_open(now) {
            return Err(self.ctx.to_ctx_error(AppError::WithdrawalWindowClosed));
        }
        self.withdrawals_repository
            .create_request(user_id, amount, month_start(now))
            .await
    }

    pub async fn approve(&self, withdrawal_id: &Thing, notes: Option<String>) -> CtxResult<Withdrawal> {
        let withdrawal = self
            .withdrawals_repository
            .finalize(withdrawal_id, WithdrawalStatus::Approved, notes)
            .await?;
        self.notify_settled(
            &withdrawal,
            "Withdrawal approved",
            format!("Your withdrawal of {} was paid out.", withdrawal.amount),
        );
        Ok(withdrawal)
    }

    pub async fn reject(&self, withdrawal_id: &Thing, notes: Option<String>) -> CtxResult<Withdrawal> {
        let withdrawal = self
            .withdrawals_repository
            .finalize(withdrawal_id, WithdrawalStatus::Rejected, notes)
            .await?;
        self.notify_settled(
            &withdrawal,
            "Withdrawal rejected",
            "Your withdrawal request was rejected.".to_string(),
        );
        Ok(withdrawal)
    }

    fn notify_settled(&self, withdrawal: &Withdrawal, subject: &'static str, body: String) {
        let sender = self.notification_sender.clone();
        let user = withdrawal.user.to_raw();
        tokio::spawn(async move {
            if let Err(err) = sender.notify(&user, subject, &body).await {
                warn!("->> notify failed for {user}: {err}");
            }
        });
    }
}
