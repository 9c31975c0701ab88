//! # Catalog Synchronizer
//!
//! Reconciles the catalog entries under one source root with what the source
//! currently reports.
//!
//! ## Overview
//!
//! A pass is [`setup`](Synchronizer::setup) followed by
//! [`run`](Synchronizer::run). `setup` snapshots every dataset key the catalog
//! holds under the root. `run` then works in three phases:
//!
//! 1. **Synchronize**: consume the source listing. Keys found in the snapshot
//!    are refreshed, subject to the update mode and the read signature. Keys
//!    missing from the snapshot are admitted as shallow records.
//! 2. **Delete orphan folders**: folders whose datasets all vanished upstream.
//! 3. **Delete orphaned datasets**: keys the listing never matched.
//!
//! Both cleanup phases only run once the listing has been drained. A listing
//! cut short by cancellation leaves unvisited keys in the snapshot, and those
//! are not known to be gone upstream.
//!
//! ## Error Handling
//!
//! | Condition | Treatment |
//! |-----------|-----------|
//! | Record vanished, duplicate create | skipped silently |
//! | Stale tag while refreshing | retried up to `retry_bound` times |
//! | Stale tag while creating or deleting | skipped, the race already produced the wanted state |
//! | Anything else on one dataset | recorded in [`Synchronizer::failed_datasets`] |
//! | Unsupported update mode | rejected by `setup` |
//!
//! `run` never returns an error: an unexpected failure ends the pass early and
//! is logged.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_sync::{CatalogDatasetSaver, Synchronizer};
//! use tokio_util::sync::CancellationToken;
//!
//! let saver = Arc::new(CatalogDatasetSaver::from_config(catalog.clone(), &config));
//! let mut synchronizer =
//!     Synchronizer::new(catalog, source, saver, config, CancellationToken::new());
//!
//! synchronizer.setup(&DatasetKey::parse("hive")?).await?;
//! let outcome = synchronizer.run().await;
//! if outcome.refreshed {
//!     invalidate_plan_cache();
//! }
//! ```

use bridge_traits::{
    DatasetHandle, GetDatasetOptions, MetadataSource, MetadataValidity, SupportsReadSignature,
};
use core_catalog::{CatalogError, CatalogStore, DatasetKey, DatasetRecord};
use core_runtime::config::{SyncConfig, UpdateMode};
use core_runtime::events::{CatalogEvent, CoreEvent, EventBus, SyncEvent};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, field, info, instrument, trace, warn, Span};

use crate::ancestry::AncestryTracker;
use crate::convert::{dataset_key, stored_metadata};
use crate::error::{Result, SyncError};
use crate::listing::ScopedListing;
use crate::saver::DatasetSaver;
use crate::status::{FailureEntry, SyncOutcome};

/// Working state of one pass, owned by the pass that created it
struct PassState {
    root: DatasetKey,
    /// Snapshot keys not yet matched against the listing
    existing: HashSet<DatasetKey>,
    ancestry: AncestryTracker,
    failures: Vec<FailureEntry>,
}

impl PassState {
    fn new(root: DatasetKey, existing: HashSet<DatasetKey>) -> Self {
        Self {
            ancestry: AncestryTracker::new(root.clone()),
            root,
            existing,
            failures: Vec::new(),
        }
    }

    fn record_failure(&mut self, key: &DatasetKey, error: &SyncError) {
        trace!(key = %key, error = %error, "Dataset sync failed; will retry next pass");
        self.failures
            .push(FailureEntry::new(key.clone(), error.to_string()));
    }

    /// Unmatched keys in a stable order
    fn unmatched(&self) -> Vec<DatasetKey> {
        let mut keys: Vec<_> = self.existing.iter().cloned().collect();
        keys.sort();
        keys
    }
}

/// Reconciles one source root of the catalog against its source.
///
/// One instance serves one source; passes over the same instance run one at
/// a time (`setup` and `run` take `&mut self`).
pub struct Synchronizer {
    catalog: Arc<dyn CatalogStore>,
    source: Arc<dyn MetadataSource>,
    saver: Arc<dyn DatasetSaver>,
    config: SyncConfig,
    cancel: CancellationToken,
    event_bus: Option<EventBus>,
    state: Option<PassState>,
    failed_datasets: Vec<FailureEntry>,
}

impl Synchronizer {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        source: Arc<dyn MetadataSource>,
        saver: Arc<dyn DatasetSaver>,
        config: SyncConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            catalog,
            source,
            saver,
            config,
            cancel,
            event_bus: None,
            state: None,
            failed_datasets: Vec::new(),
        }
    }

    /// Publish pass and catalog events on `event_bus`
    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Datasets that failed during the last `run`
    pub fn failed_datasets(&self) -> &[FailureEntry] {
        &self.failed_datasets
    }

    /// Prepare a pass over `root`
    ///
    /// Captures the keys the catalog currently holds under `root`. Nothing is
    /// written.
    ///
    /// # Errors
    ///
    /// - [`SyncError::UnsupportedUpdateMode`] if the configured mode cannot
    ///   admit datasets; checked before any I/O
    /// - any catalog error from reading the snapshot
    #[instrument(skip_all, fields(source = %root))]
    pub async fn setup(&mut self, root: &DatasetKey) -> Result<()> {
        self.state = None;
        self.failed_datasets.clear();

        let mode = self.config.update_mode();
        if !mode.is_admission_mode() {
            return Err(SyncError::UnsupportedUpdateMode(mode));
        }

        let existing = self.catalog.list_keys_under(root).await?;
        debug!(datasets = existing.len(), "Sync setup");
        trace!(datasets = ?existing, "Existing datasets");

        self.state = Some(PassState::new(root.clone(), existing));
        Ok(())
    }

    /// Run the pass prepared by [`setup`](Self::setup)
    ///
    /// Consumes the prepared state; call `setup` again before the next pass.
    /// Calling `run` without a successful `setup` logs a warning and reports
    /// that nothing happened.
    #[instrument(skip_all, fields(source = field::Empty))]
    pub async fn run(&mut self) -> SyncOutcome {
        let Some(mut state) = self.state.take() else {
            warn!("{}", SyncError::NotSetUp);
            return SyncOutcome::default();
        };
        Span::current().record("source", field::display(&state.root));

        let source = state.root.to_string();
        let started = Instant::now();
        debug!("Sync started");
        self.emit(CoreEvent::Sync(SyncEvent::Started {
            source: source.clone(),
        }));

        let mut refreshed = false;
        let mut interrupted = false;
        let mut pass_error = None;

        match self.synchronize_datasets(&mut state, &mut refreshed).await {
            Ok(true) => {
                interrupted = true;
                info!(
                    pending = state.existing.len(),
                    "Sync aborted; skipping cleanup"
                );
            }
            Ok(false) => {
                refreshed |= self.delete_orphan_folders(&mut state).await;
                refreshed |= self.delete_orphaned_datasets(&mut state).await;
            }
            Err(e) => {
                warn!(error = %e, "Sync failed unexpectedly; will try again later");
                pass_error = Some(e.to_string());
            }
        }

        if !state.failures.is_empty() {
            let summary = state
                .failures
                .iter()
                .map(|failure| format!("\t{}", failure))
                .collect::<Vec<_>>()
                .join("\n");
            warn!(
                failed = state.failures.len(),
                "Sync failed for datasets:\n{}", summary
            );
        }

        let duration_ms = started.elapsed().as_millis() as u64;
        debug!(refreshed, interrupted, duration_ms, "Sync ended");

        match pass_error {
            Some(message) => self.emit(CoreEvent::Sync(SyncEvent::Failed { source, message })),
            None => self.emit(CoreEvent::Sync(SyncEvent::Completed {
                source,
                refreshed,
                interrupted,
                failed_datasets: state.failures.len(),
                duration_ms,
            })),
        }

        self.failed_datasets = state.failures;
        SyncOutcome::new(refreshed, interrupted)
    }

    // =========================================================================
    // Phase 1: synchronize
    // =========================================================================

    /// Drain the listing, refreshing matched datasets and admitting new ones.
    ///
    /// Returns whether cancellation cut the listing short. `refreshed` is
    /// updated as writes happen so the caller keeps it when this fails.
    async fn synchronize_datasets(
        &self,
        state: &mut PassState,
        refreshed: &mut bool,
    ) -> Result<bool> {
        let validator = self.source.as_read_signature();
        let options = GetDatasetOptions::default();

        trace!("Syncing datasets");
        let mut listing =
            ScopedListing::open(&self.source, &state.root, &state.existing, &options).await?;

        loop {
            if self.cancel.is_cancelled() {
                return Ok(true);
            }

            let Some(handle) = listing.next_handle().await? else {
                break;
            };

            let key = match dataset_key(handle.path()) {
                Ok(key) => key,
                Err(e) => {
                    warn!(path = %handle.path(), error = %e, "Skipping dataset with invalid path");
                    continue;
                }
            };

            let existing = state.existing.remove(&key);
            trace!(key = %key, existing, "Dataset sync started");

            state.ancestry.track(&key);
            let wrote = if existing {
                self.handle_existing_dataset(state, &key, &handle, validator)
                    .await
            } else {
                self.handle_new_dataset(state, &key, &handle).await?
            };
            *refreshed |= wrote;
        }

        Ok(false)
    }

    async fn handle_existing_dataset(
        &self,
        state: &mut PassState,
        key: &DatasetKey,
        handle: &DatasetHandle,
        validator: Option<&dyn SupportsReadSignature>,
    ) -> bool {
        let retry_bound = self.config.retry_bound;

        for attempt in 0..=retry_bound {
            let started = Instant::now();
            let outcome = self
                .try_handle_existing_dataset(key, handle, validator)
                .await;
            debug!(
                key = %key,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Dataset sync attempt finished"
            );

            match outcome {
                Ok(wrote) => return wrote,
                Err(e) if e.is_concurrent_modification() => {
                    trace!(key = %key, attempt, "Concurrent modification; retrying");
                }
                Err(e) if e.is_not_found() => {
                    debug!(key = %key, "Dataset is no longer valid, skipping sync");
                    return false;
                }
                Err(e) => {
                    state.record_failure(key, &e);
                    return false;
                }
            }
        }

        debug!(
            key = %key,
            retries = retry_bound,
            "Dataset sync failed on concurrent modification. Will retry next sync"
        );
        false
    }

    async fn try_handle_existing_dataset(
        &self,
        key: &DatasetKey,
        handle: &DatasetHandle,
        validator: Option<&dyn SupportsReadSignature>,
    ) -> Result<bool> {
        let record = match self.catalog.get_dataset(key).await {
            Ok(record) => record,
            Err(e) if e.is_not_found() => {
                trace!(key = %key, "Dataset removed since setup");
                return Ok(false);
            }
            Err(e) => return Err(e.into()),
        };

        if !record.is_extended() && self.config.update_mode() == UpdateMode::PrefetchQueried {
            trace!(key = %key, "Shallow dataset is only refreshed on query");
            return Ok(false);
        }

        if record.is_extended() {
            if let Some(validator) = validator {
                let validity = validator
                    .validate_metadata(record.read_signature(), handle, &stored_metadata(&record))
                    .await?;
                if validity == MetadataValidity::Valid {
                    trace!(key = %key, "Metadata is still valid");
                    return Ok(false);
                }
            }
        }

        self.saver
            .save(record, handle, self.source.as_ref())
            .await?;
        self.emit(CoreEvent::Catalog(CatalogEvent::DatasetUpdated {
            key: key.to_string(),
        }));
        Ok(true)
    }

    async fn handle_new_dataset(
        &self,
        state: &mut PassState,
        key: &DatasetKey,
        handle: &DatasetHandle,
    ) -> Result<bool> {
        match self.config.update_mode() {
            UpdateMode::Prefetch | UpdateMode::PrefetchQueried => {
                let record = DatasetRecord::shallow(key.clone(), handle.id.clone());
                match self.catalog.add_or_update_dataset(record).await {
                    Ok(_) => {
                        self.emit(CoreEvent::Catalog(CatalogEvent::DatasetAdded {
                            key: key.to_string(),
                        }));
                        Ok(true)
                    }
                    Err(e) if e.is_concurrent_modification() => {
                        debug!(key = %key, "Dataset was created concurrently, skipping");
                        Ok(false)
                    }
                    Err(e) => {
                        state.record_failure(key, &SyncError::from(e));
                        Ok(false)
                    }
                }
            }
            mode @ (UpdateMode::Unknown | UpdateMode::Inline) => {
                Err(SyncError::UnsupportedUpdateMode(mode))
            }
        }
    }

    // =========================================================================
    // Phase 2: orphan folders
    // =========================================================================

    /// Delete the folders above unmatched datasets that no live dataset needs.
    ///
    /// Folder deletes are recursive, so this only runs when unavailable
    /// datasets may be deleted at all. Unmatched datasets removed along with a
    /// folder are reported as deleted here and leave the pass state, so the
    /// dataset phase does not visit them again.
    async fn delete_orphan_folders(&self, state: &mut PassState) -> bool {
        if !self.config.policy.delete_unavailable_datasets {
            return false;
        }

        let mut deleted = false;
        let mut attempted = HashSet::new();

        for orphan in state.unmatched() {
            if self.cancel.is_cancelled() {
                info!("Folder cleanup aborted");
                break;
            }

            for folder in state.ancestry.deletion_candidates(&orphan) {
                if !attempted.insert(folder.clone()) {
                    continue;
                }

                match self.delete_folder(&folder).await {
                    Ok(()) => {
                        trace!(folder = %folder, "Deleted orphan folder");
                        self.emit(CoreEvent::Catalog(CatalogEvent::FolderDeleted {
                            key: folder.to_string(),
                        }));
                        deleted = true;

                        // the delete took the unmatched datasets beneath it along
                        let mut removed: Vec<_> = state
                            .existing
                            .iter()
                            .filter(|key| key.is_descendant_of(&folder))
                            .cloned()
                            .collect();
                        removed.sort();
                        for key in removed {
                            state.existing.remove(&key);
                            self.emit(CoreEvent::Catalog(CatalogEvent::DatasetDeleted {
                                key: key.to_string(),
                            }));
                        }
                    }
                    Err(e) if e.is_not_found() => {
                        trace!(folder = %folder, "Folder already gone");
                    }
                    Err(e) => {
                        debug!(folder = %folder, error = %e, "Failed to delete orphan folder");
                    }
                }
            }
        }

        deleted
    }

    async fn delete_folder(&self, folder: &DatasetKey) -> std::result::Result<(), CatalogError> {
        let record = self.catalog.get_folder(folder).await?;
        self.catalog.delete_folder(folder, &record.tag).await
    }

    // =========================================================================
    // Phase 3: orphaned datasets
    // =========================================================================

    async fn delete_orphaned_datasets(&self, state: &mut PassState) -> bool {
        if !self.config.policy.delete_unavailable_datasets {
            debug!(
                unavailable = state.existing.len(),
                "Keeping unavailable datasets"
            );
            return false;
        }

        let mut deleted = false;

        for key in state.unmatched() {
            if self.cancel.is_cancelled() {
                info!("Dataset cleanup aborted");
                break;
            }

            match self.delete_dataset(&key).await {
                Ok(()) => {
                    trace!(key = %key, "Deleted unavailable dataset");
                    self.emit(CoreEvent::Catalog(CatalogEvent::DatasetDeleted {
                        key: key.to_string(),
                    }));
                    deleted = true;
                }
                Err(e) if e.is_not_found() => {
                    trace!(key = %key, "Dataset already gone");
                }
                Err(e) if e.is_concurrent_modification() => {
                    debug!(key = %key, "Dataset changed concurrently, skipping delete");
                }
                Err(e) => state.record_failure(&key, &SyncError::from(e)),
            }
        }

        deleted
    }

    async fn delete_dataset(&self, key: &DatasetKey) -> std::result::Result<(), CatalogError> {
        let record = self.catalog.get_dataset(key).await?;
        let tag = record.tag.ok_or_else(|| CatalogError::InvalidInput {
            field: "tag".to_string(),
            message: format!("Stored dataset {} has no concurrency tag", key),
        })?;
        self.catalog.delete_dataset(key, &tag).await
    }

    fn emit(&self, event: CoreEvent) {
        if let Some(event_bus) = &self.event_bus {
            event_bus.emit(event).ok();
        }
    }
}
