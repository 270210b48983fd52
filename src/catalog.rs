//! Dataset collection and selection state.
//!
//! `Catalog` owns the list fetched from the registry, the currently selected
//! dataset and the loading/error flags. Two rules keep them consistent:
//!
//! - Whenever the collection is replaced, a selection is re-pointed at the
//!   member with the same hash, or cleared if that hash is gone. This only
//!   looks at the new collection and the old selection's hash; fetching never
//!   depends on the selection, so a selection change can not trigger a
//!   refetch.
//! - Mutations reported by the server are applied in place (`apply_patch`)
//!   instead of refetching everything. Deletions always refetch.
//!
//! Overlapping refreshes are not fenced: whichever response arrives last
//! overwrites the collection.
//!
//! Every change is published on a `watch` channel so any renderer or test
//! harness can follow the state without polling.

use tokio::sync::watch;

use crate::api::Dataset;
use crate::error::ApiError;

/// Shown when the list request fails.
pub const REFRESH_FAILED: &str = "Failed to fetch datasets. Is the backend running?";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogState {
    pub datasets: Vec<Dataset>,
    pub selected: Option<Dataset>,
    pub is_loading: bool,
    pub error: Option<String>,
}

pub struct Catalog {
    state: CatalogState,
    notifier: watch::Sender<CatalogState>,
}

impl Catalog {
    pub fn new() -> Self {
        let state = CatalogState::default();
        let (notifier, _) = watch::channel(state.clone());
        Self { state, notifier }
    }

    pub fn datasets(&self) -> &[Dataset] {
        &self.state.datasets
    }

    pub fn selected(&self) -> Option<&Dataset> {
        self.state.selected.as_ref()
    }

    pub fn selected_hash(&self) -> Option<&str> {
        self.state.selected.as_ref().map(|d| d.hash.as_str())
    }

    pub fn is_selected(&self, hash: &str) -> bool {
        self.selected_hash() == Some(hash)
    }

    pub fn is_loading(&self) -> bool {
        self.state.is_loading
    }

    pub fn error(&self) -> Option<&str> {
        self.state.error.as_deref()
    }

    /// Receive a snapshot after every state change.
    pub fn subscribe(&self) -> watch::Receiver<CatalogState> {
        self.notifier.subscribe()
    }

    fn notify(&self) {
        self.notifier.send_replace(self.state.clone());
    }

    // -------------------------------------------------------------------------
    // Refresh
    // -------------------------------------------------------------------------

    /// Mark a list request as in flight. The caller issues the request and
    /// hands the outcome to `finish_refresh`.
    pub fn begin_refresh(&mut self) {
        log::debug!("Catalog: refresh started");
        self.state.is_loading = true;
        self.state.error = None;
        self.notify();
    }

    /// Apply the outcome of a list request. A failure keeps the last good
    /// collection and only sets the error.
    pub fn finish_refresh(&mut self, result: Result<Vec<Dataset>, ApiError>) {
        self.state.is_loading = false;

        match result {
            Ok(datasets) => {
                log::debug!("Catalog: refreshed with {} dataset(s)", datasets.len());
                self.replace_datasets(datasets);
            }
            Err(e) => {
                log::warn!("Catalog: refresh failed: {}", e);
                self.state.error = Some(e.generic_message(REFRESH_FAILED));
            }
        }

        self.notify();
    }

    fn replace_datasets(&mut self, datasets: Vec<Dataset>) {
        self.state.datasets = datasets;
        self.state.selected = reconcile_selection(self.state.selected.take(), &self.state.datasets);
    }

    // -------------------------------------------------------------------------
    // Selection and local updates
    // -------------------------------------------------------------------------

    /// Set the selection as given. No membership check: callers pick from
    /// the collection or a projection of it.
    pub fn select(&mut self, dataset: Option<Dataset>) {
        log::debug!(
            "Catalog: select {}",
            dataset.as_ref().map(|d| d.hash.as_str()).unwrap_or("none")
        );
        self.state.selected = dataset;
        self.notify();
    }

    /// Select the collection member with `hash`. Returns false and leaves the
    /// selection untouched when no such member exists.
    pub fn select_hash(&mut self, hash: &str) -> bool {
        match self.state.datasets.iter().find(|d| d.hash == hash).cloned() {
            Some(dataset) => {
                self.select(Some(dataset));
                true
            }
            None => false,
        }
    }

    /// Replace the member sharing `updated.hash`, keeping its position.
    ///
    /// The selection is not touched. A caller patching the selected record
    /// must also `select` the new value, otherwise the selection stays stale
    /// until the next refresh.
    pub fn apply_patch(&mut self, updated: Dataset) -> bool {
        match self
            .state
            .datasets
            .iter_mut()
            .find(|d| d.hash == updated.hash)
        {
            Some(slot) => {
                log::debug!("Catalog: patched {}", updated.hash);
                *slot = updated;
                self.notify();
                true
            }
            None => {
                log::warn!("Catalog: patch for unknown dataset {}", updated.hash);
                false
            }
        }
    }

    /// Clear the selection and start a refresh. The caller issues the list
    /// request, same as after `begin_refresh`.
    pub fn handle_deletion(&mut self) {
        log::debug!("Catalog: dataset deleted, clearing selection");
        self.state.selected = None;
        self.begin_refresh();
    }

    // -------------------------------------------------------------------------
    // Projections
    // -------------------------------------------------------------------------

    /// Datasets whose name contains `term`, case-insensitively.
    pub fn filter(&self, term: &str) -> Vec<&Dataset> {
        let needle = term.to_lowercase();
        self.state
            .datasets
            .iter()
            .filter(|d| d.name.to_lowercase().contains(&needle))
            .collect()
    }

    /// The `n` most downloaded datasets. Ties keep collection order.
    pub fn top(&self, n: usize) -> Vec<&Dataset> {
        let mut ranked: Vec<&Dataset> = self.state.datasets.iter().collect();
        // sort_by is stable
        ranked.sort_by(|a, b| b.download_count.cmp(&a.download_count));
        ranked.truncate(n);
        ranked
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

/// Re-point `previous` at the member of `datasets` with the same hash.
fn reconcile_selection(previous: Option<Dataset>, datasets: &[Dataset]) -> Option<Dataset> {
    let previous = previous?;
    datasets.iter().find(|d| d.hash == previous.hash).cloned()
}
