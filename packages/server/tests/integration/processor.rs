use chrono::{Duration, Utc};
use common::notification::TicketEscalated;
use common::{NotificationEvent, OutboxStatus, event_type};
use serde_json::json;

use server::config::OutboxConfig;
use server::outbox::NewOutboxEvent;

use crate::common::{BASE_URL, Harness, RecordingEmail};

/// A typed escalation event with the default attempt ceiling.
fn escalation(ticket_id: i32) -> NewOutboxEvent {
    NewOutboxEvent::new(
        &NotificationEvent::TicketEscalated(TicketEscalated {
            ticket_id,
            reason: None,
        }),
        &OutboxConfig::default(),
    )
}

mod claiming {
    use super::*;

    #[tokio::test]
    async fn due_events_are_eventually_claimed_across_runs() {
        let h = Harness::builder()
            .config(OutboxConfig {
                batch_size: 10,
                max_events_per_run: 50,
                ..OutboxConfig::default()
            })
            .build();
        let now = Utc::now();
        for ticket_id in 0..60 {
            h.enqueue(event_type::TICKET_ESCALATED, json!({ "ticket_id": ticket_id }), now)
                .await;
        }

        let first = h.processor.run_at(now).await.unwrap();
        assert_eq!(first.processed(), 50);
        assert_eq!(first.remaining, 10);

        let second = h.processor.run_at(now).await.unwrap();
        assert_eq!(second.processed(), 10);
        assert_eq!(second.remaining, 0);

        assert!(
            h.store
                .all()
                .await
                .iter()
                .all(|e| e.status == OutboxStatus::Completed)
        );
    }

    #[tokio::test]
    async fn lower_priority_value_is_processed_first() {
        let h = Harness::builder()
            .config(OutboxConfig {
                batch_size: 1,
                max_events_per_run: 1,
                ..OutboxConfig::default()
            })
            .build();
        let now = Utc::now();

        let low = h
            .store
            .insert(escalation(1).with_priority(2), now)
            .await;
        let high = h
            .store
            .insert(escalation(2).with_priority(1), now + Duration::seconds(1))
            .await;

        let report = h.processor.run_at(now + Duration::seconds(2)).await.unwrap();
        assert_eq!(report.processed_ids, vec![high.id]);
        assert_eq!(h.event(low.id).await.status, OutboxStatus::Pending);
    }

    #[tokio::test]
    async fn same_priority_is_processed_in_arrival_order() {
        let h = Harness::new();
        let now = Utc::now();
        let mut ids = Vec::new();
        for (offset, ticket_id) in [(0, 10), (1, 11), (2, 12)] {
            ids.push(
                h.enqueue(
                    event_type::TICKET_ESCALATED,
                    json!({ "ticket_id": ticket_id }),
                    now + Duration::seconds(offset),
                )
                .await,
            );
        }

        let report = h.processor.run_at(now + Duration::seconds(5)).await.unwrap();
        assert_eq!(report.processed_ids, ids);
    }

    #[tokio::test]
    async fn delayed_events_wait_for_their_schedule() {
        let h = Harness::new();
        let now = Utc::now();
        let delayed = h
            .store
            .insert(escalation(1).scheduled_at(now + Duration::minutes(10)), now)
            .await;

        let report = h.processor.run_at(now).await.unwrap();
        assert!(report.processed_ids.is_empty());
        assert_eq!(report.remaining, 0);

        let report = h.processor.run_at(now + Duration::minutes(10)).await.unwrap();
        assert_eq!(report.processed_ids, vec![delayed.id]);
    }
}

mod retry_policy {
    use super::*;

    /// A public comment whose only delivery is email to the ticket creator.
    async fn comment_event(h: &Harness, now: chrono::DateTime<Utc>) -> i64 {
        h.seed_user(1, "Asha Rao", "student", None).await;
        h.seed_user(2, "Ravi Kumar", "staff", None).await;
        h.seed_ticket(100, 1, Some(2)).await;
        h.enqueue(
            event_type::TICKET_COMMENT_ADDED,
            json!({ "ticket_id": 100, "author_id": 2, "content": "Router replaced." }),
            now,
        )
        .await
    }

    #[tokio::test]
    async fn backoff_doubles_then_dead_letters_at_the_ceiling() {
        let h = Harness::builder()
            .without_chat()
            .email(RecordingEmail::failing(u32::MAX))
            .build();
        let t0 = Utc::now();
        let id = comment_event(&h, t0).await;

        let report = h.processor.run_at(t0).await.unwrap();
        assert_eq!(report.failed_ids, vec![id]);
        let after_first = h.event(id).await;
        assert_eq!(after_first.status, OutboxStatus::Pending);
        assert_eq!(after_first.attempts, 1);
        assert_eq!(after_first.scheduled_at - t0, Duration::minutes(2));
        assert!(after_first.last_error.unwrap().contains("mail relay unreachable"));

        let t1 = after_first.scheduled_at;
        h.processor.run_at(t1).await.unwrap();
        let after_second = h.event(id).await;
        assert_eq!(after_second.attempts, 2);
        assert_eq!(after_second.scheduled_at - t1, Duration::minutes(4));

        let t2 = after_second.scheduled_at;
        let report = h.processor.run_at(t2).await.unwrap();
        assert_eq!(report.dead_lettered_ids, vec![id]);
        let dead = h.event(id).await;
        assert_eq!(dead.status, OutboxStatus::DeadLetter);
        assert_eq!(dead.attempts, 3);

        // Dead letters are terminal: no fourth attempt, however long we wait.
        let report = h.processor.run_at(t2 + Duration::days(30)).await.unwrap();
        assert!(report.processed_ids.is_empty() && report.errors() == 0);
        assert_eq!(h.email.calls(), 3);
        let still_dead = h.event(id).await;
        assert_eq!(still_dead.status, OutboxStatus::DeadLetter);
        assert!(still_dead.attempts <= still_dead.max_attempts);
    }

    #[tokio::test]
    async fn retried_event_is_not_claimed_before_its_backoff_elapses() {
        let h = Harness::builder()
            .without_chat()
            .email(RecordingEmail::failing(1))
            .build();
        let t0 = Utc::now();
        let id = comment_event(&h, t0).await;

        h.processor.run_at(t0).await.unwrap();
        let report = h.processor.run_at(t0 + Duration::minutes(1)).await.unwrap();
        assert!(report.processed_ids.is_empty());
        assert_eq!(h.email.calls(), 1);
        assert_eq!(h.event(id).await.status, OutboxStatus::Pending);
    }

    #[tokio::test]
    async fn succeeds_on_third_invocation_after_two_failures() {
        let h = Harness::builder()
            .without_chat()
            .email(RecordingEmail::failing(2))
            .build();
        let t0 = Utc::now();
        let id = comment_event(&h, t0).await;

        h.processor.run_at(t0).await.unwrap();
        h.processor.run_at(t0 + Duration::minutes(2)).await.unwrap();
        let report = h
            .processor
            .run_at(t0 + Duration::minutes(2 + 4))
            .await
            .unwrap();

        assert_eq!(report.processed_ids, vec![id]);
        let event = h.event(id).await;
        assert_eq!(event.status, OutboxStatus::Completed);
        assert_eq!(event.attempts, 2);
        assert!(event.processed_at.is_some());
        assert_eq!(h.email.messages().await.len(), 1);
    }

    #[tokio::test]
    async fn malformed_payload_of_known_type_is_retried_to_dead_letter() {
        let h = Harness::new();
        let t0 = Utc::now();
        let id = h
            .enqueue(event_type::TICKET_ASSIGNED, json!({ "ticket": "oops" }), t0)
            .await;

        h.processor.run_at(t0).await.unwrap();
        h.processor.run_at(t0 + Duration::minutes(2)).await.unwrap();
        h.processor.run_at(t0 + Duration::minutes(6)).await.unwrap();

        let event = h.event(id).await;
        assert_eq!(event.status, OutboxStatus::DeadLetter);
        assert!(event.last_error.unwrap().contains("invalid payload"));
    }
}

mod outcomes {
    use super::*;

    #[tokio::test]
    async fn unknown_event_type_completes_without_error() {
        let h = Harness::new();
        let now = Utc::now();
        let id = h.enqueue("foo.bar", json!({ "anything": true }), now).await;

        let report = h.processor.run_at(now).await.unwrap();

        assert_eq!(report.processed_ids, vec![id]);
        assert_eq!(report.errors(), 0);
        let event = h.event(id).await;
        assert_eq!(event.status, OutboxStatus::Completed);
        assert_eq!(event.attempts, 0);
        assert!(event.last_error.is_none());
        assert_eq!(h.chat.calls() + h.email.calls(), 0);
    }

    #[tokio::test]
    async fn escalation_is_acknowledged_and_completed() {
        let h = Harness::new();
        let now = Utc::now();
        let id = h
            .enqueue(
                event_type::TICKET_ESCALATED,
                json!({ "ticket_id": 5, "reason": "SLA breached" }),
                now,
            )
            .await;

        h.processor.run_at(now).await.unwrap();
        assert_eq!(h.event(id).await.status, OutboxStatus::Completed);
        assert_eq!(h.chat.calls() + h.email.calls(), 0);
    }

    #[tokio::test]
    async fn internal_comment_makes_zero_adapter_calls() {
        let h = Harness::new();
        h.seed_user(1, "Asha Rao", "student", Some("U-ASHA")).await;
        h.seed_user(2, "Ravi Kumar", "staff", Some("U-RAVI")).await;
        h.seed_ticket(100, 1, Some(2)).await;
        let now = Utc::now();
        let id = h
            .enqueue(
                event_type::TICKET_COMMENT_ADDED,
                json!({
                    "ticket_id": 100,
                    "author_id": 2,
                    "content": "Student's MAC is blacklisted",
                    "is_internal": true
                }),
                now,
            )
            .await;

        h.processor.run_at(now).await.unwrap();

        assert_eq!(h.event(id).await.status, OutboxStatus::Completed);
        assert_eq!(h.chat.calls(), 0);
        assert_eq!(h.email.calls(), 0);
        assert_eq!(h.directory.user_reads(1).await, 0);
    }

    #[tokio::test]
    async fn missing_ticket_is_skipped_not_retried() {
        let h = Harness::new();
        let now = Utc::now();
        let id = h
            .enqueue(event_type::TICKET_CREATED, json!({ "ticket_id": 404 }), now)
            .await;

        let report = h.processor.run_at(now).await.unwrap();

        assert_eq!(report.processed_ids, vec![id]);
        assert_eq!(h.event(id).await.attempts, 0);
    }

    #[tokio::test]
    async fn created_by_staff_renders_internal_link_with_one_creator_read() {
        let h = Harness::new();
        h.seed_user(7, "Meera Iyer", "staff", None).await;
        h.seed_ticket(100, 7, None).await;
        let now = Utc::now();
        let id = h
            .enqueue(event_type::TICKET_CREATED, json!({ "ticket_id": 100 }), now)
            .await;

        h.processor.run_at(now).await.unwrap();

        assert_eq!(h.event(id).await.status, OutboxStatus::Completed);
        assert_eq!(h.directory.user_reads(7).await, 1);

        let emails = h.email.messages().await;
        assert_eq!(emails.len(), 1);
        assert_eq!(emails[0].to, "user7@campus.test");
        assert!(
            emails[0]
                .body
                .contains(&format!("{BASE_URL}/staff/tickets/100"))
        );
        assert!(emails[0].body.contains("Assignee: Unassigned"));
    }

    #[tokio::test]
    async fn store_outage_aborts_the_run_with_partial_report() {
        let h = Harness::new();
        let now = Utc::now();
        h.enqueue("foo.bar", json!({}), now).await;
        h.store.set_unavailable(true);

        let err = h.processor.run_at(now).await.unwrap_err();
        assert!(err.partial.processed_ids.is_empty());

        h.store.set_unavailable(false);
        let pending = h.store.all().await;
        assert!(pending.iter().all(|e| e.status == OutboxStatus::Pending));
    }
}

mod idempotence {
    use server::dispatch::Dispatcher;

    use super::*;

    #[tokio::test]
    async fn double_delivery_renders_identical_content() {
        let h = Harness::new();
        h.seed_user(1, "Asha Rao", "student", Some("U-ASHA")).await;
        h.seed_user(3, "Kiran Shah", "staff", None).await;
        h.seed_ticket(100, 1, Some(3)).await;
        let now = Utc::now();
        let id = h
            .enqueue(
                event_type::TICKET_STATUS_UPDATED,
                json!({
                    "ticket_id": 100,
                    "old_status": "open",
                    "new_status": "in_progress",
                    "changed_by": 3
                }),
                now,
            )
            .await;
        let event = h.event(id).await;

        // Simulate two overlapping invocations both handling the same row.
        h.router.dispatch(&event).await.unwrap();
        h.router.dispatch(&event).await.unwrap();

        let emails = h.email.messages().await;
        assert_eq!(emails.len(), 2);
        assert_eq!(emails[0], emails[1]);

        let chats = h.chat.messages().await;
        assert_eq!(chats.len(), 2);
        assert_eq!(chats[0].text, chats[1].text);
        assert_eq!(chats[0].channel, chats[1].channel);
    }
}
