use async_trait::async_trait;
use serde_json::json;

use crate::interfaces::send_notification::SendNotificationInterface;

pub struct NotificationSender {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
}

impl NotificationSender {
    pub fn new(api_url: &str, api_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.to_string(),
            api_key: api_key.to_string(),
        }
    }
}

#[async_trait]
impl SendNotificationInterface for NotificationSender {
    async fn notify(&self, user_id: &str, subject: &str, body: &str) -> Result<(), String> {
        if self.api_url.is_empty() {
            // notifications not configured
            return Ok(());
        }
        let payload = json!({
            "user_id": user_id,
            "subject": subject,
            "body": body,
        });
        let res = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !res.status().is_success() {
            return Err(format!("notify failed with status {}", res.status()));
        }
        Ok(())
    }
}
