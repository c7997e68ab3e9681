//! Stack event tailing.

use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use stacks_cloud::{ErrorKind, StackEvent, StackStatus};
use tracing::debug;

use crate::client::StackClient;
use crate::error::CoreResult;

/// Lines shown by a bounded tail unless asked otherwise.
pub const DEFAULT_LINES: usize = 100;

/// Delay between polls once a follow has caught up.
pub const POLL_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TailMode {
    /// Show the most recent `lines` events and stop.
    Bounded { lines: usize },
    /// Keep polling until the stack leaves its in-progress state, showing
    /// only events at or after `since`.
    Follow { since: DateTime<Utc> },
}

impl TailMode {
    /// Follow every event from the beginning.
    pub fn follow_all() -> Self {
        TailMode::Follow {
            since: DateTime::<Utc>::MIN_UTC,
        }
    }
}

/// Receives events as they become displayable, oldest first.
pub trait EventSink {
    fn emit(&mut self, events: &[StackEvent]);
}

impl EventSink for Vec<StackEvent> {
    fn emit(&mut self, events: &[StackEvent]) {
        self.extend_from_slice(events);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TailOutcome {
    /// The last status observed; `None` when the stack is gone.
    Finished(Option<StackStatus>),
    /// The stack does not exist; carries the service's message.
    StackNotFound(String),
}

/// Polls a stack's event stream.
pub struct EventTailer {
    client: StackClient,
    poll_interval: Duration,
}

impl EventTailer {
    pub fn new(client: StackClient) -> Self {
        Self {
            client,
            poll_interval: POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub async fn tail(
        &self,
        name: &str,
        mode: TailMode,
        sink: &mut dyn EventSink,
    ) -> CoreResult<TailOutcome> {
        let result = match mode {
            TailMode::Bounded { lines } => self.bounded(name, lines, sink).await,
            TailMode::Follow { since } => self.follow(name, since, sink).await,
        };

        match result {
            Err(crate::error::CoreError::Cloud(err)) if err.kind() == ErrorKind::NotFound => {
                Ok(TailOutcome::StackNotFound(err.to_string()))
            }
            other => other.map(TailOutcome::Finished),
        }
    }

    async fn bounded(
        &self,
        name: &str,
        lines: usize,
        sink: &mut dyn EventSink,
    ) -> CoreResult<Option<StackStatus>> {
        let mut collected = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let page = self.client.events(name, next_token.as_deref()).await?;
            collected.extend(page.events);
            next_token = page.next_token;
            if collected.len() >= lines || next_token.is_none() {
                break;
            }
        }

        let status = self.client.status(name).await?;

        let mut seen = HashSet::new();
        let mut events = order_events(collected, &mut seen);
        let skip = events.len().saturating_sub(lines);
        events.drain(..skip);
        sink.emit(&events);

        Ok(status)
    }

    async fn follow(
        &self,
        name: &str,
        since: DateTime<Utc>,
        sink: &mut dyn EventSink,
    ) -> CoreResult<Option<StackStatus>> {
        let mut seen = HashSet::new();
        let mut next_token: Option<String> = None;

        loop {
            let page = self.client.events(name, next_token.as_deref()).await?;
            next_token = page.next_token;
            let status = self.client.status(name).await?;

            let fresh: Vec<StackEvent> = page
                .events
                .into_iter()
                .filter(|event| event.timestamp >= since)
                .collect();
            let fresh = order_events(fresh, &mut seen);
            if !fresh.is_empty() {
                sink.emit(&fresh);
            }

            let in_progress = status.as_ref().map_or(false, StackStatus::is_in_progress);
            if next_token.is_none() {
                if !in_progress {
                    return Ok(status);
                }
                debug!("Stack {} is {:?}, polling again", name, status);
                self.client.sleeper().sleep(self.poll_interval).await;
            }
        }
    }
}

/// Drop events already in `seen` and sort the rest by timestamp.
fn order_events(events: Vec<StackEvent>, seen: &mut HashSet<String>) -> Vec<StackEvent> {
    let mut fresh: Vec<StackEvent> = events
        .into_iter()
        .filter(|event| seen.insert(event.event_id.clone()))
        .collect();
    fresh.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
    fresh
}
