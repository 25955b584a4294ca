mod helpers;

use std::future::IntoFuture;

use axum::http::StatusCode;
use futures::future::join_all;
use surrealdb::sql::Thing;
use taskpay_server::entities::job_entity::{Job, JobType};
use taskpay_server::entities::reward_code_entity::RewardCode;
use taskpay_server::entities::task_entity::{Task, TaskStatus};
use taskpay_server::routes::task_routes::RedeemResponse;

use crate::helpers::{create_job, fake_user, seed_codes, USER_ID_HEADER};

async fn job_after(ctx_state: &taskpay_server::middleware::mw_ctx::CtxState, job: &Job) -> Job {
    ctx_state
        .db
        .client
        .query("SELECT * FROM <record>$id;")
        .bind(("id", job.id.as_ref().unwrap().to_raw()))
        .await
        .unwrap()
        .take::<Option<Job>>(0)
        .unwrap()
        .unwrap()
}

async fn tasks_for_job(
    ctx_state: &taskpay_server::middleware::mw_ctx::CtxState,
    job: &Job,
) -> Vec<Task> {
    ctx_state
        .db
        .client
        .query("SELECT * FROM task WHERE job=$job;")
        .bind(("job", job.id.clone().unwrap()))
        .await
        .unwrap()
        .take::<Vec<Task>>(0)
        .unwrap()
}

test_with_server!(redeem_success_credits_task, |server, ctx_state, config| {
    let (user, user_thing) = fake_user();
    let job = create_job(&server, 500, 2, JobType::Code, false).await;
    seed_codes(&server, &job, &["WELCOME500"]).await;

    let response = server
        .post(&format!(
            "/api/jobs/{}/redeem",
            job.id.as_ref().unwrap().to_raw()
        ))
        .add_header(USER_ID_HEADER, &user)
        .json(&serde_json::json!({ "code": "WELCOME500" }))
        .await;
    response.assert_status_success();
    let redeemed = response.json::<RedeemResponse>();
    assert!(redeemed.success);
    assert_eq!(redeemed.reward, 500);

    // code row is claimed once and immutable after that
    let code: Option<RewardCode> = ctx_state
        .db
        .client
        .query("SELECT * FROM reward_code WHERE job=$job AND code='WELCOME500';")
        .bind(("job", job.id.clone().unwrap()))
        .await
        .unwrap()
        .take(0)
        .unwrap();
    let code = code.unwrap();
    assert!(code.used);
    assert_eq!(code.used_by, Some(user_thing.clone()));
    assert!(code.used_at.is_some());

    let job_now = job_after(&ctx_state, &job).await;
    assert_eq!(job_now.vacancy, 1);
    assert_eq!(job_now.completed, 1);

    let tasks = tasks_for_job(&ctx_state, &job).await;
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].status, TaskStatus::Approved);
    assert_eq!(tasks[0].amount, 500);
    assert!(tasks[0].approved_at.is_some());
});

test_with_server!(redeem_unknown_code_not_found, |server, ctx_state, config| {
    let (user, _) = fake_user();
    let job = create_job(&server, 100, 1, JobType::Code, false).await;
    seed_codes(&server, &job, &["REALCODE1"]).await;

    let response = server
        .post(&format!(
            "/api/jobs/{}/redeem",
            job.id.as_ref().unwrap().to_raw()
        ))
        .add_header(USER_ID_HEADER, &user)
        .json(&serde_json::json!({ "code": "NOSUCHCODE" }))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
    assert!(response.text().contains("Code not found"));

    let job_now = job_after(&ctx_state, &job).await;
    assert_eq!(job_now.vacancy, 1);
    assert_eq!(job_now.completed, 0);
});

test_with_server!(redeem_same_code_twice_conflicts, |server, ctx_state, config| {
    let (first_user, _) = fake_user();
    let (second_user, _) = fake_user();
    let job = create_job(&server, 250, 5, JobType::Code, false).await;
    seed_codes(&server, &job, &["ONESHOT99"]).await;
    let redeem_path = format!("/api/jobs/{}/redeem", job.id.as_ref().unwrap().to_raw());

    let first = server
        .post(&redeem_path)
        .add_header(USER_ID_HEADER, &first_user)
        .json(&serde_json::json!({ "code": "ONESHOT99" }))
        .await;
    first.assert_status_success();

    let second = server
        .post(&redeem_path)
        .add_header(USER_ID_HEADER, &second_user)
        .json(&serde_json::json!({ "code": "ONESHOT99" }))
        .await;
    second.assert_status(StatusCode::CONFLICT);
    assert!(second.text().contains("Code already used"));

    // no double credit
    let tasks = tasks_for_job(&ctx_state, &job).await;
    assert_eq!(tasks.len(), 1);
    let job_now = job_after(&ctx_state, &job).await;
    assert_eq!(job_now.vacancy, 4);
    assert_eq!(job_now.completed, 1);
});

test_with_server!(concurrent_redeems_have_one_winner, |server, ctx_state, config| {
    let job = create_job(&server, 1000, 50, JobType::Code, false).await;
    seed_codes(&server, &job, &["RACECODE42"]).await;
    let redeem_path = format!("/api/jobs/{}/redeem", job.id.as_ref().unwrap().to_raw());

    let attempts = 8;
    let users: Vec<String> = (0..attempts).map(|i| format!("racer_{i}")).collect();
    let requests = users.iter().map(|user| {
        server
            .post(&redeem_path)
            .add_header(USER_ID_HEADER, user)
            .json(&serde_json::json!({ "code": "RACECODE42" }))
            .into_future()
    });
    let responses = join_all(requests).await;

    let winners = responses
        .iter()
        .filter(|r| r.status_code().is_success())
        .count();
    assert_eq!(winners, 1);

    // every loser saw the claim conflict (or a retryable datastore abort),
    // never a different failure class
    for response in responses.iter().filter(|r| !r.status_code().is_success()) {
        match response.status_code() {
            StatusCode::CONFLICT => assert!(response.text().contains("Code already used")),
            StatusCode::SERVICE_UNAVAILABLE => {}
            other => panic!("unexpected loser status {other}"),
        }
    }

    // exactly one task carries the reward and the code is claimed by one user
    let tasks = tasks_for_job(&ctx_state, &job).await;
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].amount, 1000);

    let code: Option<RewardCode> = ctx_state
        .db
        .client
        .query("SELECT * FROM reward_code WHERE job=$job AND code='RACECODE42';")
        .bind(("job", job.id.clone().unwrap()))
        .await
        .unwrap()
        .take(0)
        .unwrap();
    let code = code.unwrap();
    assert!(code.used);
    let winner_task_user: Thing = tasks[0].user.clone();
    assert_eq!(code.used_by, Some(winner_task_user));

    let job_now = job_after(&ctx_state, &job).await;
    assert_eq!(job_now.vacancy, 49);
    assert_eq!(job_now.completed, 1);
});

test_with_server!(redeem_on_paused_job_fails, |server, ctx_state, config| {
    let (user, _) = fake_user();
    let job = create_job(&server, 100, 3, JobType::Code, false).await;
    seed_codes(&server, &job, &["PAUSED123"]).await;

    let pause = server
        .post(&format!(
            "/api/jobs/{}/status",
            job.id.as_ref().unwrap().to_raw()
        ))
        .add_header(USER_ID_HEADER, "admin")
        .json(&serde_json::json!({ "status": "Paused" }))
        .await;
    pause.assert_status_success();

    let response = server
        .post(&format!(
            "/api/jobs/{}/redeem",
            job.id.as_ref().unwrap().to_raw()
        ))
        .add_header(USER_ID_HEADER, &user)
        .json(&serde_json::json!({ "code": "PAUSED123" }))
        .await;
    response.assert_status(StatusCode::FORBIDDEN);
    assert!(response.text().contains("Job is not available"));

    // the failed claim rolled back - code still redeemable once resumed
    let code: Option<RewardCode> = ctx_state
        .db
        .client
        .query("SELECT * FROM reward_code WHERE job=$job AND code='PAUSED123';")
        .bind(("job", job.id.clone().unwrap()))
        .await
        .unwrap()
        .take(0)
        .unwrap();
    assert!(!code.unwrap().used);
});

test_with_server!(redeem_exhausted_vacancy_fails, |server, ctx_state, config| {
    let (first_user, _) = fake_user();
    let (second_user, _) = fake_user();
    let job = create_job(&server, 100, 1, JobType::Code, false).await;
    seed_codes(&server, &job, &["SLOT00001", "SLOT00002"]).await;
    let redeem_path = format!("/api/jobs/{}/redeem", job.id.as_ref().unwrap().to_raw());

    let first = server
        .post(&redeem_path)
        .add_header(USER_ID_HEADER, &first_user)
        .json(&serde_json::json!({ "code": "SLOT00001" }))
        .await;
    first.assert_status_success();

    let second = server
        .post(&redeem_path)
        .add_header(USER_ID_HEADER, &second_user)
        .json(&serde_json::json!({ "code": "SLOT00002" }))
        .await;
    second.assert_status(StatusCode::FORBIDDEN);

    let job_now = job_after(&ctx_state, &job).await;
    assert_eq!(job_now.vacancy, 0);
    assert_eq!(job_now.completed, 1);
    assert_eq!(tasks_for_job(&ctx_state, &job).await.len(), 1);
});

test_with_server!(redeem_with_manual_approval_stays_pending, |server, ctx_state, config| {
    let (user, _) = fake_user();
    let job = create_job(&server, 300, 2, JobType::Code, true).await;
    seed_codes(&server, &job, &["REVIEWED1"]).await;

    let response = server
        .post(&format!(
            "/api/jobs/{}/redeem",
            job.id.as_ref().unwrap().to_raw()
        ))
        .add_header(USER_ID_HEADER, &user)
        .json(&serde_json::json!({ "code": "REVIEWED1" }))
        .await;
    response.assert_status_success();
    let redeemed = response.json::<RedeemResponse>();
    assert!(redeemed.message.contains("pending"));

    let tasks = tasks_for_job(&ctx_state, &job).await;
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].status, TaskStatus::Pending);
    assert!(tasks[0].approved_at.is_none());

    // the slot is taken at redemption time even before review
    let job_now = job_after(&ctx_state, &job).await;
    assert_eq!(job_now.vacancy, 1);
    assert_eq!(job_now.completed, 1);
});

test_with_server!(redeem_rejects_malformed_code, |server, ctx_state, config| {
    let (user, _) = fake_user();
    let job = create_job(&server, 100, 1, JobType::Code, false).await;

    let response = server
        .post(&format!(
            "/api/jobs/{}/redeem",
            job.id.as_ref().unwrap().to_raw()
        ))
        .add_header(USER_ID_HEADER, &user)
        .json(&serde_json::json!({ "code": "" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
});
