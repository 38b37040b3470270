//! Load-once-per-process holder of every dataset family.
//!
//! Each family owns a lazily filled slot. The first `get` for a family starts
//! one load pass on a loader thread and records it in the slot; every caller
//! arriving while the pass runs waits on that same pass, each bounded by its
//! own deadline. A successful pass fills the slot so all callers share one
//! `Arc`. Failures leave the slot empty and the next call starts a new pass.

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, OnceLock, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use super::domain::distinct_values;
use super::error::{DataError, Result, UnavailableReason};
use super::family::FamilyRules;
use super::filter::{filtered_indices, FilterSpec};
use super::loader::{load_family, TableSource};
use super::model::{Dimension, FamilyId, NormalizedDataset, NormalizedRow};

struct FamilySlot {
    rules: Arc<FamilyRules>,
    loaded: OnceLock<Arc<NormalizedDataset>>,
    /// The pass currently fetching and normalizing this family, if any.
    pass: Mutex<Option<Arc<LoadPass>>>,
}

/// One in-flight load, shared by every caller waiting for the family.
#[derive(Default)]
struct LoadPass {
    outcome: Mutex<Option<Result<Arc<NormalizedDataset>>>>,
    done: Condvar,
}

impl LoadPass {
    fn finish(&self, result: Result<Arc<NormalizedDataset>>) {
        *self.outcome.lock().unwrap_or_else(PoisonError::into_inner) = Some(result);
        self.done.notify_all();
    }

    /// Block until the pass ends or `limit` elapses from `started`.
    fn wait(
        &self,
        family: FamilyId,
        started: Instant,
        limit: Option<Duration>,
    ) -> Result<Arc<NormalizedDataset>> {
        let outcome = self.outcome.lock().unwrap_or_else(PoisonError::into_inner);
        let outcome = match limit {
            None => self
                .done
                .wait_while(outcome, |o| o.is_none())
                .unwrap_or_else(PoisonError::into_inner),
            Some(limit) => {
                let remaining = limit.saturating_sub(started.elapsed());
                self.done
                    .wait_timeout_while(outcome, remaining, |o| o.is_none())
                    .unwrap_or_else(PoisonError::into_inner)
                    .0
            }
        };
        match outcome.as_ref() {
            Some(result) => result.clone(),
            None => Err(DataError::unavailable(
                family,
                UnavailableReason::TimedOut(limit.unwrap_or_default()),
            )),
        }
    }
}

/// Owns every family's normalized dataset for the lifetime of the registry.
pub struct DatasetRegistry {
    families: BTreeMap<FamilyId, Arc<FamilySlot>>,
    source: Arc<dyn TableSource>,
    load_timeout: Option<Duration>,
}

impl DatasetRegistry {
    /// Registry over `catalog`, reading raw tables through `source`.
    /// A later declaration of the same family replaces an earlier one.
    pub fn new(catalog: impl IntoIterator<Item = FamilyRules>, source: Arc<dyn TableSource>) -> Self {
        let families = catalog
            .into_iter()
            .map(|rules| {
                (
                    rules.id,
                    Arc::new(FamilySlot {
                        rules: Arc::new(rules),
                        loaded: OnceLock::new(),
                        pass: Mutex::new(None),
                    }),
                )
            })
            .collect();

        DatasetRegistry {
            families,
            source,
            load_timeout: None,
        }
    }

    /// Default limit applied by [`DatasetRegistry::get`]; `None` waits forever.
    pub fn with_load_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.load_timeout = timeout;
        self
    }

    pub fn families(&self) -> impl Iterator<Item = FamilyId> + '_ {
        self.families.keys().copied()
    }

    pub fn rules(&self, family: FamilyId) -> Result<&FamilyRules> {
        self.slot(family).map(|slot| slot.rules.as_ref())
    }

    /// Whether the family has already been normalized.
    pub fn is_loaded(&self, family: FamilyId) -> bool {
        self.families
            .get(&family)
            .is_some_and(|slot| slot.loaded.get().is_some())
    }

    /// The family's dataset, loading it on first use with the default timeout.
    pub fn get(&self, family: FamilyId) -> Result<Arc<NormalizedDataset>> {
        self.get_with_timeout(family, self.load_timeout)
    }

    /// Like [`DatasetRegistry::get`] with an explicit limit on how long this
    /// call may wait for the first load. The limit covers joining a pass
    /// another caller started. A timed-out pass keeps running and later
    /// callers wait on it rather than starting another.
    pub fn get_with_timeout(
        &self,
        family: FamilyId,
        timeout: Option<Duration>,
    ) -> Result<Arc<NormalizedDataset>> {
        let started = Instant::now();
        let slot = self.slot(family)?;
        if let Some(dataset) = slot.loaded.get() {
            return Ok(Arc::clone(dataset));
        }

        let pass = {
            let mut current = slot.pass.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(dataset) = slot.loaded.get() {
                return Ok(Arc::clone(dataset));
            }
            match current.as_ref() {
                Some(pass) => Arc::clone(pass),
                None => {
                    let pass = self.start_pass(slot)?;
                    *current = Some(Arc::clone(&pass));
                    pass
                }
            }
        };

        pass.wait(family, started, timeout).inspect_err(|e| {
            log::warn!("{family}: load failed: {e}");
        })
    }

    /// Ordered legal values of `dimension` for the family's selection controls.
    pub fn list_dimension_values(&self, family: FamilyId, dimension: Dimension) -> Result<Vec<String>> {
        let dataset = self.get(family)?;
        Ok(distinct_values(&dataset, dimension)?.to_vec())
    }

    /// Rows of the family passing `spec`, in date order.
    pub fn query(&self, family: FamilyId, spec: &FilterSpec) -> Result<QuerySlice> {
        let dataset = self.get(family)?;
        let indices = filtered_indices(&dataset, spec)?;
        log::debug!(
            "{family}: {} of {} rows match {}..={}",
            indices.len(),
            dataset.len(),
            spec.start,
            spec.end
        );
        Ok(QuerySlice { dataset, indices })
    }

    fn slot(&self, family: FamilyId) -> Result<&Arc<FamilySlot>> {
        self.families
            .get(&family)
            .ok_or_else(|| DataError::UnknownFamily(family.to_string()))
    }

    /// Spawn the loader thread for one pass. Called with the slot's pass
    /// lock held.
    fn start_pass(&self, slot: &Arc<FamilySlot>) -> Result<Arc<LoadPass>> {
        let family = slot.rules.id;
        log::info!("{family}: loading {} source(s)", slot.rules.sources.len());

        let pass = Arc::new(LoadPass::default());
        let source = Arc::clone(&self.source);
        let thread_slot = Arc::clone(slot);
        let thread_pass = Arc::clone(&pass);
        thread::Builder::new()
            .name(format!("load-{family}"))
            .spawn(move || run_pass(source.as_ref(), &thread_slot, &thread_pass))
            .map_err(|e| DataError::unavailable(family, UnavailableReason::Spawn(Arc::new(e))))?;
        Ok(pass)
    }
}

/// Body of a loader thread: load, publish, then release the slot.
fn run_pass(source: &dyn TableSource, slot: &FamilySlot, pass: &LoadPass) {
    let family = slot.rules.id;
    let result = panic::catch_unwind(AssertUnwindSafe(|| load_family(source, &slot.rules)))
        .unwrap_or_else(|_| Err(DataError::unavailable(family, UnavailableReason::LoaderLost)))
        .map(Arc::new);

    let result = match result {
        Ok(dataset) => {
            match dataset.date_span() {
                Some(span) => log::info!(
                    "{family}: {} rows from {} to {}",
                    dataset.len(),
                    span.first,
                    span.last
                ),
                None => log::warn!("{family}: sources contain no rows"),
            }
            Ok(Arc::clone(slot.loaded.get_or_init(|| dataset)))
        }
        Err(e) => Err(e),
    };

    // Fill the slot before clearing the pass so no caller can start a
    // second pass after a success.
    *slot.pass.lock().unwrap_or_else(PoisonError::into_inner) = None;
    pass.finish(result);
}

// ---------------------------------------------------------------------------
// Query result
// ---------------------------------------------------------------------------

/// Matching rows of one query, borrowed from the shared dataset.
#[derive(Debug, Clone)]
pub struct QuerySlice {
    dataset: Arc<NormalizedDataset>,
    indices: Vec<usize>,
}

impl QuerySlice {
    pub fn dataset(&self) -> &NormalizedDataset {
        &self.dataset
    }

    pub fn rows(&self) -> impl Iterator<Item = &NormalizedRow> + '_ {
        let rows = self.dataset.rows();
        self.indices.iter().map(move |&idx| &rows[idx])
    }

    /// Owned copies of the matching rows.
    pub fn to_rows(&self) -> Vec<NormalizedRow> {
        self.rows().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}
