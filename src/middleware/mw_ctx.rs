use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use crate::config::AppConfig;
use crate::database::client::Database;
use crate::interfaces::send_notification::SendNotificationInterface;
use crate::utils::notification_sender::NotificationSender;

pub struct CtxState {
    pub db: Database,
    pub is_development: bool,
    pub notification_sender: Arc<dyn SendNotificationInterface + Send + Sync>,
}

impl Debug for CtxState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("CtxState")
    }
}

pub fn create_ctx_state(db: Database, config: &AppConfig) -> Arc<CtxState> {
    let ctx_state = CtxState {
        db,
        is_development: config.is_development,
        notification_sender: Arc::new(NotificationSender::new(
            &config.notify_api_url,
            &config.notify_api_key,
        )),
    };
    Arc::new(ctx_state)
}
