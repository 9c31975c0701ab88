//! # Event Bus System
//!
//! Broadcasts what the synchronization engine does to whoever is interested
//! (catalog caches, refresh schedulers, audit logs) over
//! `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! - **Event Types**: [`SyncEvent`] for pass lifecycle, [`CatalogEvent`] for
//!   individual catalog mutations, both wrapped in [`CoreEvent`]
//! - **EventBus**: central broadcast channel for publishing events
//! - **EventStream**: wrapper for consuming events with filtering
//!
//! Events are informational. Emitting with no subscribers fails, and
//! publishers are expected to ignore that failure.
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CatalogEvent, CoreEvent, EventBus};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let event_bus = EventBus::new(100);
//! let mut subscriber = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Catalog(CatalogEvent::DatasetAdded {
//!         key: "hive.db1.orders".to_string(),
//!     }))
//!     .ok();
//!
//! let event = subscriber.recv().await.unwrap();
//! assert_eq!(event.description(), "Dataset added");
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber was too slow and missed `n`
//!   events. It can keep receiving.
//! - **`RecvError::Closed`**: every sender has been dropped.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError, TryRecvError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event published through the bus
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Synchronization pass lifecycle
    Sync(SyncEvent),
    /// Individual catalog mutations
    Catalog(CatalogEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Sync(e) => e.description(),
            CoreEvent::Catalog(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Sync(SyncEvent::Failed { .. }) => EventSeverity::Error,
            CoreEvent::Sync(SyncEvent::Completed {
                failed_datasets, ..
            }) if *failed_datasets > 0 => EventSeverity::Warning,
            CoreEvent::Sync(SyncEvent::Completed { .. }) => EventSeverity::Info,
            CoreEvent::Catalog(CatalogEvent::DatasetDeleted { .. })
            | CoreEvent::Catalog(CatalogEvent::FolderDeleted { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Sync Events
// ============================================================================

/// Lifecycle of one synchronization pass over a source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SyncEvent {
    /// A pass started.
    Started {
        /// Root key of the source, dotted.
        source: String,
    },
    /// A pass ended, normally or after cancellation.
    Completed {
        source: String,
        /// Whether the catalog was mutated.
        refreshed: bool,
        /// Whether cancellation cut the listing short.
        interrupted: bool,
        /// Number of datasets that failed and will be retried next pass.
        failed_datasets: usize,
        duration_ms: u64,
    },
    /// A pass stopped on an unexpected error.
    Failed {
        source: String,
        /// Human-readable error message.
        message: String,
    },
}

impl SyncEvent {
    fn description(&self) -> &str {
        match self {
            SyncEvent::Started { .. } => "Sync started",
            SyncEvent::Completed { .. } => "Sync completed",
            SyncEvent::Failed { .. } => "Sync failed",
        }
    }
}

// ============================================================================
// Catalog Events
// ============================================================================

/// Catalog mutations made by a synchronization pass.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum CatalogEvent {
    /// A shallow record was created for a newly discovered dataset.
    DatasetAdded { key: String },
    /// An existing record was refreshed from its source.
    DatasetUpdated { key: String },
    /// A record whose dataset vanished upstream was removed.
    DatasetDeleted { key: String },
    /// An orphaned folder was removed, with everything beneath it.
    ///
    /// Each tracked dataset removed along with the folder is also reported
    /// as [`CatalogEvent::DatasetDeleted`].
    FolderDeleted { key: String },
}

impl CatalogEvent {
    fn description(&self) -> &str {
        match self {
            CatalogEvent::DatasetAdded { .. } => "Dataset added",
            CatalogEvent::DatasetUpdated { .. } => "Dataset updated",
            CatalogEvent::DatasetDeleted { .. } => "Dataset deleted",
            CatalogEvent::FolderDeleted { .. } => "Folder deleted",
        }
    }

    /// Dotted key of the affected entry
    pub fn key(&self) -> &str {
        match self {
            CatalogEvent::DatasetAdded { key }
            | CatalogEvent::DatasetUpdated { key }
            | CatalogEvent::DatasetDeleted { key }
            | CatalogEvent::FolderDeleted { key } => key,
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Broadcast channel shared by every publisher and subscriber.
///
/// Clones publish into the same channel. A subscriber more than `capacity`
/// events behind gets `RecvError::Lagged` and skips ahead.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            sender: broadcast::channel(capacity).0,
        }
    }

    /// Publish to every current subscriber
    ///
    /// # Returns
    /// How many subscribers got the event; an error when there are none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Subscribe to events emitted from now on
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// Subscriber that only sees the events it cares about.
///
/// ```rust
/// use core_runtime::events::{EventBus, EventStream};
///
/// let event_bus = EventBus::new(100);
/// let hive_passes = EventStream::new(event_bus.subscribe()).for_source("hive");
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Keep only events matching `predicate`; replaces any earlier filter
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Keep only the events of one source root
    ///
    /// Catalog events match when their key lies under `source`.
    pub fn for_source(self, source: impl Into<String>) -> Self {
        let source = source.into();
        let prefix = format!("{}.", source);
        self.filter(move |event| match event {
            CoreEvent::Sync(
                SyncEvent::Started { source: s }
                | SyncEvent::Completed { source: s, .. }
                | SyncEvent::Failed { source: s, .. },
            ) => *s == source,
            CoreEvent::Catalog(e) => e.key().starts_with(&prefix),
        })
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Wait for the next accepted event
    ///
    /// # Errors
    ///
    /// `RecvError::Lagged(n)` after falling `n` events behind,
    /// `RecvError::Closed` once every bus handle is dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Next accepted event if one is already queued
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            let event = match self.receiver.try_recv() {
                Ok(event) => event,
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Lagged(n)) => return Some(Err(RecvError::Lagged(n))),
                Err(TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            };
            if self.accepts(&event) {
                return Some(Ok(event));
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("filtered", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
