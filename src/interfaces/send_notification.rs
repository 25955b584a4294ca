use async_trait::async_trait;

/// Contract with the external notification/email system. Address resolution
/// and delivery live on the other side of this interface.
#[async_trait]
pub trait SendNotificationInterface {
    async fn notify(&self, user_id: &str, subject: &str, body: &str) -> Result<(), String>;
}
