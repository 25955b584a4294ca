mod helpers;

use axum::http::StatusCode;
use taskpay_server::entities::job_entity::{Job, JobType};
use taskpay_server::entities::reward_code_entity::{CodeStats, RewardCode};
use taskpay_server::routes::job_routes::CodeBatchResponse;

use crate::helpers::{create_job, fake_user, seed_codes, USER_ID_HEADER};

async fn stats(server: &axum_test::TestServer, job: &Job) -> CodeStats {
    server
        .get(&format!(
            "/api/jobs/{}/codes/stats",
            job.id.as_ref().unwrap().to_raw()
        ))
        .add_header(USER_ID_HEADER, "admin")
        .await
        .json::<CodeStats>()
}

async fn post_codes(
    server: &axum_test::TestServer,
    job: &Job,
    body: serde_json::Value,
) -> axum_test::TestResponse {
    server
        .post(&format!(
            "/api/jobs/{}/codes",
            job.id.as_ref().unwrap().to_raw()
        ))
        .add_header(USER_ID_HEADER, "admin")
        .json(&body)
        .await
}

test_with_server!(insert_batch_and_stats, |server, ctx_state, config| {
    let job = create_job(&server, 100, 10, JobType::Code, false).await;
    let response = post_codes(
        &server,
        &job,
        serde_json::json!({ "codes": ["ALPHA001", "BRAVO002", "CHARLIE03"] }),
    )
    .await;
    response.assert_status_success();
    assert_eq!(response.json::<CodeBatchResponse>().inserted, 3);

    let before = stats(&server, &job).await;
    assert_eq!(before.total, 3);
    assert_eq!(before.used, 0);

    let (user, _) = fake_user();
    server
        .post(&format!(
            "/api/jobs/{}/redeem",
            job.id.as_ref().unwrap().to_raw()
        ))
        .add_header(USER_ID_HEADER, &user)
        .json(&serde_json::json!({ "code": "ALPHA001" }))
        .await
        .assert_status_success();

    let after = stats(&server, &job).await;
    assert_eq!(after.total, 3);
    assert_eq!(after.used, 1);
});

test_with_server!(generated_batch_mints_unique_codes, |server, ctx_state, config| {
    let job = create_job(&server, 100, 10, JobType::Code, false).await;
    let response = post_codes(&server, &job, serde_json::json!({ "generate": 25 })).await;
    response.assert_status_success();
    let batch = response.json::<CodeBatchResponse>();
    assert_eq!(batch.inserted, 25);
    assert_eq!(batch.codes.len(), 25);
    for code in &batch.codes {
        assert_eq!(code.len(), 10);
        assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    assert_eq!(stats(&server, &job).await.total, 25);
});

test_with_server!(duplicate_within_batch_rejects_everything, |server, ctx_state, config| {
    let job = create_job(&server, 100, 10, JobType::Code, false).await;
    let response = post_codes(
        &server,
        &job,
        serde_json::json!({ "codes": ["SAME0001", "OTHER001", "SAME0001"] }),
    )
    .await;
    response.assert_status(StatusCode::CONFLICT);
    assert!(response.text().contains("Duplicate code"));

    // nothing from the batch landed
    assert_eq!(stats(&server, &job).await.total, 0);
});

test_with_server!(batch_colliding_with_stored_code_is_atomic, |server, ctx_state, config| {
    let job = create_job(&server, 100, 10, JobType::Code, false).await;
    seed_codes(&server, &job, &["KEPT0001"]).await;

    let response = post_codes(
        &server,
        &job,
        serde_json::json!({ "codes": ["FRESH001", "KEPT0001"] }),
    )
    .await;
    response.assert_status(StatusCode::CONFLICT);

    // FRESH001 was rolled back with the rest of the batch
    assert_eq!(stats(&server, &job).await.total, 1);
});

test_with_server!(same_code_allowed_on_different_jobs, |server, ctx_state, config| {
    let first = create_job(&server, 100, 10, JobType::Code, false).await;
    let second = create_job(&server, 200, 10, JobType::Code, false).await;
    seed_codes(&server, &first, &["SHARED001"]).await;
    seed_codes(&server, &second, &["SHARED001"]).await;

    assert_eq!(stats(&server, &first).await.total, 1);
    assert_eq!(stats(&server, &second).await.total, 1);
});

test_with_server!(codes_rejected_on_image_job, |server, ctx_state, config| {
    let job = create_job(&server, 100, 10, JobType::Image, true).await;
    let response = post_codes(&server, &job, serde_json::json!({ "codes": ["NOTHERE01"] })).await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert!(response.text().contains("does not accept codes"));

    assert_eq!(stats(&server, &job).await.total, 0);
});

test_with_server!(malformed_codes_are_rejected, |server, ctx_state, config| {
    let job = create_job(&server, 100, 10, JobType::Code, false).await;
    let with_space = post_codes(&server, &job, serde_json::json!({ "codes": ["has space"] })).await;
    with_space.assert_status(StatusCode::BAD_REQUEST);

    let too_short = post_codes(&server, &job, serde_json::json!({ "codes": ["abc"] })).await;
    too_short.assert_status(StatusCode::BAD_REQUEST);

    let neither = post_codes(&server, &job, serde_json::json!({})).await;
    neither.assert_status(StatusCode::BAD_REQUEST);

    let both = post_codes(
        &server,
        &job,
        serde_json::json!({ "codes": ["GOOD0001"], "generate": 5 }),
    )
    .await;
    both.assert_status(StatusCode::BAD_REQUEST);
});

test_with_server!(unused_code_can_be_deleted, |server, ctx_state, config| {
    let job = create_job(&server, 100, 10, JobType::Code, false).await;
    seed_codes(&server, &job, &["DELME001", "STAYS001"]).await;

    let codes = server
        .get(&format!(
            "/api/jobs/{}/codes",
            job.id.as_ref().unwrap().to_raw()
        ))
        .add_header(USER_ID_HEADER, "admin")
        .await
        .json::<Vec<RewardCode>>();
    let target = codes.iter().find(|c| c.code == "DELME001").unwrap();

    let response = server
        .delete(&format!(
            "/api/codes/{}",
            target.id.as_ref().unwrap().to_raw()
        ))
        .add_header(USER_ID_HEADER, "admin")
        .await;
    response.assert_status_success();

    assert_eq!(stats(&server, &job).await.total, 1);
});

test_with_server!(used_code_can_not_be_deleted, |server, ctx_state, config| {
    let (user, _) = fake_user();
    let job = create_job(&server, 100, 10, JobType::Code, false).await;
    seed_codes(&server, &job, &["SPENT001"]).await;

    server
        .post(&format!(
            "/api/jobs/{}/redeem",
            job.id.as_ref().unwrap().to_raw()
        ))
        .add_header(USER_ID_HEADER, &user)
        .json(&serde_json::json!({ "code": "SPENT001" }))
        .await
        .assert_status_success();

    let codes = server
        .get(&format!(
            "/api/jobs/{}/codes",
            job.id.as_ref().unwrap().to_raw()
        ))
        .add_header(USER_ID_HEADER, "admin")
        .await
        .json::<Vec<RewardCode>>();
    let spent = codes.iter().find(|c| c.code == "SPENT001").unwrap();

    let response = server
        .delete(&format!(
            "/api/codes/{}",
            spent.id.as_ref().unwrap().to_raw()
        ))
        .add_header(USER_ID_HEADER, "admin")
        .await;
    response.assert_status(StatusCode::CONFLICT);
    assert!(response.text().contains("Code already redeemed"));

    // the audit row survived
    assert_eq!(stats(&server, &job).await.total, 1);
});
