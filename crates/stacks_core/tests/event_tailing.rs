//! Event tailer behavior in bounded and follow modes.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use stacks_cloud::mock::{MockStack, MockStackApi, RecordingSleeper};
use stacks_cloud::{EventPage, StackEvent, StackStatus};
use stacks_core::{EventTailer, StackClient, TailMode, TailOutcome};

fn event(id: &str, second: u32) -> StackEvent {
    StackEvent {
        event_id: id.to_string(),
        timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, second).unwrap(),
        logical_id: format!("Resource{}", id),
        resource_type: "AWS::S3::Bucket".to_string(),
        status: "CREATE_COMPLETE".to_string(),
        status_reason: None,
    }
}

fn page(events: Vec<StackEvent>, next_token: Option<&str>) -> EventPage {
    EventPage {
        events,
        next_token: next_token.map(str::to_string),
    }
}

fn tailer(api: &MockStackApi, sleeper: &Arc<RecordingSleeper>) -> EventTailer {
    EventTailer::new(StackClient::new(Arc::new(api.clone())).with_sleeper(sleeper.clone()))
}

fn ids(events: &[StackEvent]) -> Vec<&str> {
    events.iter().map(|e| e.event_id.as_str()).collect()
}

#[tokio::test]
async fn test_bounded_dedups_and_orders_across_pages() {
    let api = MockStackApi::new()
        .with_stack("web", MockStack::new(StackStatus::CreateComplete))
        .with_event_page("web", None, page(vec![event("d", 40), event("b", 20), event("c", 30)], Some("p2")))
        .with_event_page("web", Some("p2"), page(vec![event("c", 30), event("a", 10)], None));
    let sleeper = Arc::new(RecordingSleeper::new());

    let mut shown: Vec<StackEvent> = Vec::new();
    let outcome = tailer(&api, &sleeper)
        .tail("web", TailMode::Bounded { lines: 100 }, &mut shown)
        .await
        .unwrap();

    assert_eq!(ids(&shown), vec!["a", "b", "c", "d"]);
    assert_eq!(outcome, TailOutcome::Finished(Some(StackStatus::CreateComplete)));
    assert!(sleeper.sleeps().is_empty());
}

#[tokio::test]
async fn test_bounded_shows_most_recent_lines() {
    let api = MockStackApi::new()
        .with_stack("web", MockStack::new(StackStatus::UpdateComplete))
        .with_event_page("web", None, page(vec![event("c", 3), event("b", 2)], Some("p2")))
        .with_event_page("web", Some("p2"), page(vec![event("a", 1)], Some("p3")));
    let sleeper = Arc::new(RecordingSleeper::new());

    let mut shown: Vec<StackEvent> = Vec::new();
    tailer(&api, &sleeper)
        .tail("web", TailMode::Bounded { lines: 2 }, &mut shown)
        .await
        .unwrap();

    // Two lines were reached on the first page, so "p2" is never requested.
    assert_eq!(ids(&shown), vec!["b", "c"]);
    assert!(!api.captured_calls().iter().any(|c| matches!(
        c,
        stacks_cloud::mock::CapturedCall::ListEvents { next_token: Some(_), .. }
    )));
}

#[tokio::test]
async fn test_follow_polls_until_terminal_status() {
    let api = MockStackApi::new()
        .with_stack("web", MockStack::new(StackStatus::CreateComplete))
        .with_status_script(
            "web",
            vec![
                Some(StackStatus::CreateInProgress),
                Some(StackStatus::CreateComplete),
            ],
        )
        .with_event_page("web", None, page(vec![event("a", 10), event("old", 1)], None))
        .with_event_page("web", None, page(vec![event("b", 20), event("a", 10), event("old", 1)], None));
    let sleeper = Arc::new(RecordingSleeper::new());
    let since = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 5).unwrap();

    let mut shown: Vec<StackEvent> = Vec::new();
    let outcome = tailer(&api, &sleeper)
        .tail("web", TailMode::Follow { since }, &mut shown)
        .await
        .unwrap();

    assert_eq!(ids(&shown), vec!["a", "b"]);
    assert_eq!(outcome, TailOutcome::Finished(Some(StackStatus::CreateComplete)));
    assert_eq!(sleeper.sleeps(), vec![Duration::from_secs(5)]);
}

#[tokio::test]
async fn test_follow_drains_pages_without_sleeping() {
    let api = MockStackApi::new()
        .with_stack("web", MockStack::new(StackStatus::RollbackComplete))
        .with_status_script("web", vec![Some(StackStatus::RollbackInProgress)])
        .with_event_page("web", None, page(vec![event("c", 30), event("b", 20)], Some("t1")))
        .with_event_page("web", Some("t1"), page(vec![event("a", 10)], None));
    let sleeper = Arc::new(RecordingSleeper::new());

    let mut shown: Vec<StackEvent> = Vec::new();
    let outcome = tailer(&api, &sleeper)
        .tail("web", TailMode::follow_all(), &mut shown)
        .await
        .unwrap();

    assert_eq!(ids(&shown), vec!["b", "c", "a"]);
    assert_eq!(outcome, TailOutcome::Finished(Some(StackStatus::RollbackComplete)));
    assert!(sleeper.sleeps().is_empty());
}

#[tokio::test]
async fn test_follow_stops_when_stack_is_gone() {
    let api = MockStackApi::new()
        .with_stack("web", MockStack::new(StackStatus::DeleteInProgress))
        .with_status_script("web", vec![None])
        .with_event_page("web", None, page(vec![event("a", 10)], None));
    let sleeper = Arc::new(RecordingSleeper::new());

    let mut shown: Vec<StackEvent> = Vec::new();
    let outcome = tailer(&api, &sleeper)
        .tail("web", TailMode::follow_all(), &mut shown)
        .await
        .unwrap();

    assert_eq!(outcome, TailOutcome::Finished(None));
    assert_eq!(ids(&shown), vec!["a"]);
}

#[tokio::test]
async fn test_missing_stack_is_reported() {
    let api = MockStackApi::new();
    let sleeper = Arc::new(RecordingSleeper::new());

    let mut shown: Vec<StackEvent> = Vec::new();
    let outcome = tailer(&api, &sleeper)
        .tail("ghost", TailMode::Bounded { lines: 10 }, &mut shown)
        .await
        .unwrap();

    assert_eq!(
        outcome,
        TailOutcome::StackNotFound("Stack with id ghost does not exist".to_string())
    );
    assert!(shown.is_empty());
}
