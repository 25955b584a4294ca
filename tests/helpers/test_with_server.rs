#[macro_export]
macro_rules! test_with_server {
    ($name:ident, |$server:ident, $ctx_state:ident, $config:ident| $body:block) => {
        #[tokio::test(flavor = "multi_thread")]
        #[serial_test::serial]
        async fn $name() {
            use async_trait::async_trait;
            use axum_test::{TestServer, TestServerConfig};
            use futures::FutureExt;
            use std::panic::resume_unwind;
            use std::sync::Arc;
            use taskpay_server::config::AppConfig;
            use taskpay_server::database::client::{Database, DbConfig};
            use taskpay_server::interfaces::send_notification::SendNotificationInterface;
            use taskpay_server::middleware::mw_ctx::CtxState;

            struct MockNotificationSender;

            #[async_trait]
            impl SendNotificationInterface for MockNotificationSender {
                async fn notify(
                    &self,
                    _user_id: &str,
                    _subject: &str,
                    _body: &str,
                ) -> Result<(), String> {
                    Ok(())
                }
            }

            fn create_ctx_state(db: Database, config: &AppConfig) -> Arc<CtxState> {
                Arc::new(CtxState {
                    db,
                    is_development: config.is_development,
                    notification_sender: Arc::new(MockNotificationSender {}),
                })
            }

            let $config = AppConfig {
                db_namespace: "test".to_string(),
                db_database: "test".to_string(),
                db_password: None,
                db_username: None,
                db_url: "mem://".to_string(),
                is_development: true,
                notify_api_url: "".to_string(),
                notify_api_key: "".to_string(),
            };

            let $ctx_state = {
                let db = Database::connect(DbConfig {
                    url: &$config.db_url,
                    database: &$config.db_database,
                    namespace: &$config.db_namespace,
                    password: $config.db_password.as_deref(),
                    username: $config.db_username.as_deref(),
                })
                .await;

                taskpay_server::init::run_migrations(&db).await.unwrap();
                create_ctx_state(db, &$config)
            };

            let routes_all = taskpay_server::init::main_router(&$ctx_state);

            let $server = TestServer::new_with_config(
                routes_all,
                TestServerConfig {
                    transport: None,
                    save_cookies: true,
                    expect_success_by_default: false,
                    restrict_requests_with_http_schema: false,
                    default_content_type: None,
                    default_scheme: None,
                },
            )
            .expect("Failed to create test server");

            let test_result = std::panic::AssertUnwindSafe(async {
                (|| async $body)().await;
            })
            .catch_unwind()
            .await;

            $ctx_state
                .clone()
                .db
                .client
                .query(format!("REMOVE DATABASE {};", $config.db_database))
                .await
                .expect("failed to remove database");

            if let Err(panic) = test_result {
                resume_unwind(panic);
            }
        }
    };
}
