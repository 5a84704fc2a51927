//! Shared application state handed to every handler.

use chrono::{NaiveDate, Utc};
use tokio::sync::broadcast;
use tracing::debug;

use optica_core::Event;
use optica_db::{Database, Outcome};

/// State cloned into each request by axum.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,

    /// Fan-out of committed events to `/ws` subscribers
    pub events: broadcast::Sender<Event>,

    /// Overrides the calendar date used for identifiers and exam defaults
    pub fixed_date: Option<NaiveDate>,
}

impl AppState {
    pub fn new(db: Database, event_buffer: usize) -> Self {
        let (events, _) = broadcast::channel(event_buffer.max(1));
        AppState {
            db,
            events,
            fixed_date: None,
        }
    }

    /// Pins "today" to `date`.
    pub fn with_fixed_date(mut self, date: NaiveDate) -> Self {
        self.fixed_date = Some(date);
        self
    }

    pub fn today(&self) -> NaiveDate {
        self.fixed_date.unwrap_or_else(|| Utc::now().date_naive())
    }

    /// Publishes the event of a committed outcome and returns its record.
    pub fn publish<T>(&self, outcome: Outcome<T>) -> T {
        if let Some(event) = outcome.event {
            // No subscribers is not an error; the notification row already exists.
            match self.events.send(event) {
                Ok(receivers) => debug!(receivers, "Event published"),
                Err(_) => debug!("Event published with no subscribers"),
            }
        }
        outcome.record
    }
}
