use dotenvy;

#[derive(Debug)]
pub struct AppConfig {
    pub db_namespace: String,
    pub db_database: String,
    pub db_password: Option<String>,
    pub db_username: Option<String>,
    pub db_url: String,
    pub is_development: bool,
    pub notify_api_url: String,
    pub notify_api_key: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        let db_namespace = std::env::var("DB_NAMESPACE").unwrap_or("namespace".to_string());
        let db_database = std::env::var("DB_DATABASE").unwrap_or("database".to_string());
        let db_password = std::env::var("DB_PASSWORD").ok();
        let db_username = std::env::var("DB_USERNAME").ok();
        let db_url = std::env::var("DB_URL").expect("Missing DB_URL in env");

        let is_development = std::env::var("DEVELOPMENT")
            .map(|v| v == "true")
            .unwrap_or(false);

        // notification webhook of the external email system - delivery is not our concern
        let notify_api_url = std::env::var("NOTIFY_API_URL").unwrap_or_default();
        let notify_api_key = std::env::var("NOTIFY_API_KEY").unwrap_or_default();

        AppConfig {
            db_namespace,
            db_database,
            db_password,
            db_username,
            db_url,
            is_development,
            notify_api_url,
            notify_api_key,
        }
    }
}
