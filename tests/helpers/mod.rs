pub mod test_with_server;

use axum_test::TestServer;
use chrono::{DateTime, Utc};
use fake::faker::internet::en::Username;
use fake::Fake;
use surrealdb::sql::{Datetime, Thing};
use taskpay_server::entities::job_entity::{Job, JobType};
use taskpay_server::entities::user_ident;
use taskpay_server::middleware::mw_ctx::CtxState;

pub const USER_ID_HEADER: &str = "x-user-id";

#[allow(dead_code)]
pub fn fake_user() -> (String, Thing) {
    let username: String = Username().fake::<String>().replace(['.', '-'], "_");
    let thing = user_ident(&username);
    (username, thing)
}

#[allow(dead_code)]
pub async fn create_job(
    server: &TestServer,
    reward: i64,
    vacancy: i64,
    r#type: JobType,
    approval_required: bool,
) -> Job {
    let response = server
        .post("/api/jobs")
        .add_header(USER_ID_HEADER, "admin")
        .json(&serde_json::json!({
            "title": format!("job paying {reward}"),
            "reward": reward,
            "vacancy": vacancy,
            "type": r#type,
            "approval_required": approval_required,
        }))
        .await;
    response.assert_status_success();
    response.json::<Job>()
}

#[allow(dead_code)]
pub async fn seed_codes(server: &TestServer, job: &Job, codes: &[&str]) {
    let response = server
        .post(&format!("/api/jobs/{}/codes", job.id.as_ref().unwrap().to_raw()))
        .add_header(USER_ID_HEADER, "admin")
        .json(&serde_json::json!({ "codes": codes }))
        .await;
    response.assert_status_success();
}

/// Seeds an already-approved task directly in the datastore so ledger tests
/// can pin approved_at to an exact instant.
#[allow(dead_code)]
pub async fn seed_approved_task(
    ctx_state: &CtxState,
    job: &Job,
    user: &Thing,
    amount: i64,
    approved_at: DateTime<Utc>,
) {
    ctx_state
        .db
        .client
        .query(
            "CREATE task CONTENT {
                job: $job,
                user: $user,
                amount: $amount,
                status: 'Approved',
                origin: 'Submission',
                approved_at: $approved_at,
            };",
        )
        .bind(("job", job.id.clone().unwrap()))
        .bind(("user", user.clone()))
        .bind(("amount", amount))
        .bind(("approved_at", Datetime::from(approved_at)))
        .await
        .expect("task seeded")
        .check()
        .expect("task seed query ok");
}
