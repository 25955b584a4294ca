use std::sync::Arc;

use surrealdb::sql::Thing;
use tracing::warn;

use crate::database::client::Db;
use crate::entities::task_entity::{Task, TaskDbService};
use crate::interfaces::send_notification::SendNotificationInterface;
use crate::middleware::ctx::Ctx;
use crate::middleware::error::CtxResult;

pub struct TaskService<'a> {
    tasks_repository: TaskDbService<'a>,
    notification_sender: &'a Arc<dyn SendNotificationInterface + Send + Sync>,
}

impl<'a> TaskService<'a> {
    pub fn new(
        db: &'a Db,
        ctx: &'a Ctx,
        notification_sender: &'a Arc<dyn SendNotificationInterface + Send + Sync>,
    ) -> Self {
        Self {
            tasks_repository: TaskDbService { db, ctx },
            notification_sender,
        }
    }

    pub async fn submit(
        &self,
        job_id: &Thing,
        user_id: &Thing,
        proof: String,
    ) -> CtxResult<Task> {
        self.tasks_repository.submit(job_id, user_id, proof).await
    }

    pub async fn approve(&self, task_id: &Thing, notes: Option<String>) -> CtxResult<Task> {
        let task = self.tasks_repository.approve(task_id, notes).await?;
        self.notify_finalized(
            &task,
            "Task approved",
            format!("Your submission was approved and {} was credited.", task.amount),
        );
        Ok(task)
    }

    pub async fn reject(&self, task_id: &Thing, notes: Option<String>) -> CtxResult<Task> {
        let task = self.tasks_repository.reject(task_id, notes).await?;
        self.notify_finalized(
            &task,
            "Task rejected",
            "Your submission was rejected.".to_string(),
        );
        Ok(task)
    }

    // fire and forget - the approval transaction is already committed
    fn notify_finalized(&self, task: &Task, subject: &'static str, body: String) {
        let sender = self.notification_sender.clone();
        let user = task.user.to_raw();
        tokio::spawn(async move {
            if let Err(err) = sender.notify(&user, subject, &body).await {
                warn!("->> notify failed for {user}: {err}");
            }
        });
    }
}
