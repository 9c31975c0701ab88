//! Dataset Handle Listings
//!
//! A listing is a lazy, single-pass, finite sequence of dataset handles that
//! holds connector resources (cursors, open files, HTTP pages) until it is
//! closed. Callers advance it one handle at a time and must close it on every
//! exit path.

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use std::collections::VecDeque;

use crate::error::Result;
use crate::metadata::DatasetHandle;

/// Closable, lazy sequence of dataset handles
///
/// # Example
///
/// ```ignore
/// use bridge_traits::listing::DatasetHandleListing;
///
/// async fn count(mut listing: Box<dyn DatasetHandleListing>) -> Result<usize> {
///     let mut total = 0;
///     while listing.next_handle().await?.is_some() {
///         total += 1;
///     }
///     listing.close();
///     Ok(total)
/// }
/// ```
#[async_trait]
pub trait DatasetHandleListing: Send {
    /// Advance the listing
    ///
    /// Returns `Ok(None)` once the listing is exhausted. May block on network
    /// or disk I/O.
    async fn next_handle(&mut self) -> Result<Option<DatasetHandle>>;

    /// Release resources held by the listing
    ///
    /// Must be idempotent; it may be called more than once.
    fn close(&mut self) {}
}

/// Listing with nothing in it.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyDatasetHandleListing;

#[async_trait]
impl DatasetHandleListing for EmptyDatasetHandleListing {
    async fn next_handle(&mut self) -> Result<Option<DatasetHandle>> {
        Ok(None)
    }
}

/// Listing over handles already held in memory.
#[derive(Debug, Default)]
pub struct VecDatasetHandleListing {
    handles: VecDeque<DatasetHandle>,
}

impl VecDatasetHandleListing {
    pub fn new(handles: Vec<DatasetHandle>) -> Self {
        Self {
            handles: handles.into(),
        }
    }
}

#[async_trait]
impl DatasetHandleListing for VecDatasetHandleListing {
    async fn next_handle(&mut self) -> Result<Option<DatasetHandle>> {
        Ok(self.handles.pop_front())
    }

    fn close(&mut self) {
        self.handles.clear();
    }
}

/// Listing backed by a stream, for connectors that page through a remote API.
pub struct StreamDatasetHandleListing {
    stream: Option<BoxStream<'static, Result<DatasetHandle>>>,
}

impl StreamDatasetHandleListing {
    pub fn new(stream: BoxStream<'static, Result<DatasetHandle>>) -> Self {
        Self {
            stream: Some(stream),
        }
    }
}

#[async_trait]
impl DatasetHandleListing for StreamDatasetHandleListing {
    async fn next_handle(&mut self) -> Result<Option<DatasetHandle>> {
        match self.stream.as_mut() {
            Some(stream) => stream.next().await.transpose(),
            None => Ok(None),
        }
    }

    fn close(&mut self) {
        // dropping the stream releases whatever the connector captured in it
        self.stream = None;
    }
}

impl std::fmt::Debug for StreamDatasetHandleListing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamDatasetHandleListing")
            .field("closed", &self.stream.is_none())
            .finish()
    }
}
