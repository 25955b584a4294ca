use std::sync::Arc;

use surrealdb::sql::Thing;
use tracing::warn;

use crate::database::client::Db;
use crate::entities::reward_code_entity::{RedeemOutcome, RewardCodeDbService};
use crate::interfaces::send_notification::SendNotificationInterface;
use crate::middleware::ctx::Ctx;
use crate::middleware::error::CtxResult;

pub struct RedeemService<'a> {
    codes_repository: RewardCodeDbService<'a>,
    notification_sender: &'a Arc<dyn SendNotificationInterface + Send + Sync>,
}

impl<'a> RedeemService<'a> {
    pub fn new(
        db: &'a Db,
        ctx: &'a Ctx,
        notification_sender: &'a Arc<dyn SendNotificationInterface + Send + Sync>,
    ) -> Self {
        Self {
            codes_repository: RewardCodeDbService { db, ctx },
            notification_sender,
        }
    }

    pub async fn redeem(
        &self,
        job_id: &Thing,
        code: &str,
        user_id: &Thing,
    ) -> CtxResult<RedeemOutcome> {
        let outcome = self.codes_repository.redeem(job_id, code, user_id).await?;

        // fire and forget - delivery never gates the committed credit
        let sender = self.notification_sender.clone();
        let user = user_id.to_raw();
        let body = if outcome.approved {
            format!("Your code was redeemed and {} was credited.", outcome.reward)
        } else {
            format!(
                "Your code was redeemed; {} will be credited after review.",
                outcome.reward
            )
        };
        tokio::spawn(async move {
            if let Err(err) = sender.notify(&user, "Code redeemed", &body).await {
                warn!("->> notify failed for {user}: {err}");
            }
        });

        Ok(outcome)
    }
}
