use chrono::{Duration, Utc};
use common::{OutboxStatus, event_type};
use serde_json::json;

use server::outbox::OutboxStore;

use crate::common::{CRON_SECRET, TestApp, routes, test_config};

mod trigger_auth {
    use super::*;

    #[tokio::test]
    async fn missing_secret_is_rejected_before_touching_the_store() {
        let app = TestApp::spawn().await;
        let id = app
            .harness
            .enqueue("foo.bar", json!({}), Utc::now())
            .await;

        let res = app.post_without_token(routes::PROCESS).await;
        assert_eq!(res.status, 401, "body: {}", res.text);
        assert_eq!(res.body["code"], "TOKEN_MISSING");

        let event = app.harness.event(id).await;
        assert_eq!(event.status, OutboxStatus::Pending);
        assert!(event.processing_started_at.is_none());
    }

    #[tokio::test]
    async fn wrong_secret_is_rejected() {
        let app = TestApp::spawn().await;

        let res = app.post_with_token(routes::PROCESS, "not-the-secret").await;
        assert_eq!(res.status, 401);
        assert_eq!(res.body["code"], "TOKEN_INVALID");

        let res = app
            .get_with_header(routes::PROCESS, "x-cron-secret", "not-the-secret")
            .await;
        assert_eq!(res.status, 401);
    }

    #[tokio::test]
    async fn non_bearer_authorization_is_invalid() {
        let app = TestApp::spawn().await;

        let res = app
            .get_with_header(routes::PROCESS, "Authorization", CRON_SECRET)
            .await;
        assert_eq!(res.status, 401);
        assert_eq!(res.body["code"], "TOKEN_INVALID");
    }

    #[tokio::test]
    async fn empty_secret_is_treated_as_missing() {
        let app = TestApp::spawn().await;

        let res = app.get_with_header(routes::PROCESS, "x-cron-secret", "").await;
        assert_eq!(res.status, 401);
        assert_eq!(res.body["code"], "TOKEN_MISSING");

        let res = app
            .get_with_header(routes::PROCESS, "x-cron-secret", "   ")
            .await;
        assert_eq!(res.status, 401);

        let res = app.post_with_token(routes::PROCESS, "").await;
        assert_eq!(res.status, 401);
    }

    #[tokio::test]
    async fn blank_configured_secret_accepts_nothing() {
        let mut config = test_config();
        config.auth.cron_secret = String::new();
        let app = TestApp::spawn_with_config(config).await;
        let id = app.harness.enqueue("foo.bar", json!({}), Utc::now()).await;

        let res = app.get_with_header(routes::PROCESS, "x-cron-secret", "").await;
        assert_eq!(res.status, 401);
        let res = app.post_with_token(routes::PROCESS, "").await;
        assert_eq!(res.status, 401);
        let res = app.post_with_token(routes::PROCESS, "anything").await;
        assert_eq!(res.status, 401);

        assert_eq!(app.harness.event(id).await.status, OutboxStatus::Pending);
    }

    #[tokio::test]
    async fn inspection_endpoints_require_the_secret() {
        let app = TestApp::spawn().await;

        assert_eq!(app.get_without_token(routes::STATS).await.status, 401);
        assert_eq!(app.get_without_token(routes::DEAD_LETTERS).await.status, 401);
    }
}

mod processing {
    use super::*;

    #[tokio::test]
    async fn post_with_bearer_runs_a_cycle() {
        let app = TestApp::spawn().await;
        let now = Utc::now();
        let first = app.harness.enqueue("foo.bar", json!({}), now).await;
        let second = app
            .harness
            .enqueue(event_type::TICKET_ESCALATED, json!({ "ticket_id": 1 }), now)
            .await;

        let res = app.post_with_token(routes::PROCESS, CRON_SECRET).await;

        assert_eq!(res.status, 200, "body: {}", res.text);
        assert_eq!(res.body["success"], true);
        assert_eq!(res.body["processed"], 2);
        assert_eq!(res.body["errors"], 0);
        assert_eq!(res.body["unprocessed"], 0);
        assert_eq!(res.body["processedIds"], json!([first, second]));
        assert!(res.body["message"].as_str().unwrap().contains("Processed 2"));
    }

    #[tokio::test]
    async fn get_with_cron_header_runs_a_cycle() {
        let app = TestApp::spawn().await;
        app.harness.enqueue("foo.bar", json!({}), Utc::now()).await;

        let res = app
            .get_with_header(routes::PROCESS, "x-cron-secret", CRON_SECRET)
            .await;

        assert_eq!(res.status, 200, "body: {}", res.text);
        assert_eq!(res.body["processed"], 1);
    }

    #[tokio::test]
    async fn failures_are_counted_as_errors() {
        let app = TestApp::spawn().await;
        app.harness
            .enqueue(event_type::TICKET_CREATED, json!({ "wrong": 1 }), Utc::now())
            .await;

        let res = app.post_with_token(routes::PROCESS, CRON_SECRET).await;

        assert_eq!(res.status, 200);
        assert_eq!(res.body["processed"], 0);
        assert_eq!(res.body["errors"], 1);
        assert_eq!(res.body["processedIds"], json!([]));
    }

    #[tokio::test]
    async fn store_outage_returns_503_with_success_false() {
        let app = TestApp::spawn().await;
        app.harness.store.set_unavailable(true);

        let res = app.post_with_token(routes::PROCESS, CRON_SECRET).await;

        assert_eq!(res.status, 503, "body: {}", res.text);
        assert_eq!(res.body["success"], false);
        assert_eq!(res.body["processed"], 0);
        assert_eq!(res.body["processedIds"], json!([]));
        assert!(res.body["message"].as_str().unwrap().contains("unavailable"));
    }
}

mod inspection {
    use super::*;

    #[tokio::test]
    async fn stats_report_counts_per_status() {
        let app = TestApp::spawn().await;
        let now = Utc::now();
        app.harness.enqueue("foo.bar", json!({}), now).await;
        app.harness.enqueue("foo.bar", json!({}), now).await;
        app.post_with_token(routes::PROCESS, CRON_SECRET).await;
        app.harness
            .enqueue("foo.bar", json!({}), now + Duration::hours(1))
            .await;

        let res = app.get_with_token(routes::STATS, CRON_SECRET).await;

        assert_eq!(res.status, 200, "body: {}", res.text);
        assert_eq!(res.body["completed"], 2);
        assert_eq!(res.body["pending"], 1);
        assert_eq!(res.body["due"], 0);
        assert_eq!(res.body["deadLetter"], 0);
        assert_eq!(res.body["stuck"], 0);
    }

    #[tokio::test]
    async fn dead_letters_are_listed_newest_first() {
        let app = TestApp::spawn().await;
        let store = &app.harness.store;
        let now = Utc::now();

        let mut ids = Vec::new();
        for offset in 0..3 {
            let at = now + Duration::seconds(offset);
            let id = app
                .harness
                .enqueue(event_type::TICKET_CREATED, json!({ "bad": true }), at)
                .await;
            let claimed = store.claim_batch(at, 1).await.unwrap();
            assert_eq!(claimed[0].id, id);
            store.mark_dead_letter(id, "invalid payload").await.unwrap();
            ids.push(id);
        }

        let res = app
            .get_with_token(&format!("{}?page=1&per_page=2", routes::DEAD_LETTERS), CRON_SECRET)
            .await;

        assert_eq!(res.status, 200, "body: {}", res.text);
        let data = res.body["data"].as_array().unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(data[0]["id"], ids[2]);
        assert_eq!(data[1]["id"], ids[1]);
        assert_eq!(data[0]["eventType"], "ticket.created");
        assert_eq!(data[0]["lastError"], "invalid payload");
        assert_eq!(res.body["pagination"]["total"], 3);
        assert_eq!(res.body["pagination"]["total_pages"], 2);
    }

    #[tokio::test]
    async fn health_needs_no_secret() {
        let app = TestApp::spawn().await;

        let res = app.get_without_token(routes::HEALTH).await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body["status"], "ok");
    }
}
