//! Concurrency-safe cache mapping patient identifier → built indices.
//!
//! Each patient gets a slot with two locks: a build gate serializing
//! builds for that patient only, and a reader lock over the published
//! index. Builds run their (possibly blocking) record-store I/O while
//! holding nothing but their own gate, so builds and reads for other
//! patients proceed unaffected. A build publishes its result with a
//! single pointer swap on success and touches nothing on failure, so a
//! reader sees either the previous complete index or the new one, never
//! a partial state.
//!
//! The cache key is the raw identifier string, byte-exact: ids that
//! differ in casing or surrounding whitespace hold distinct entries.
//! (The record store lookup key is the enciphered *normalized* id, so
//! whitespace variants still read the same rows; see `FieldCodec`.)
//!
//! Entries are never evicted implicitly; they live for the process
//! lifetime, which is unbounded growth if patient ids are unbounded.
//! `evict`/`clear` exist for callers that want to manage that.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use super::{CacheError, PatientIndex};

/// One patient's cache slot.
struct PatientSlot {
    /// Serializes builds for this patient. Held across the store I/O of
    /// a build; never held by readers.
    build_gate: Mutex<()>,
    /// The published index. `None` until the first successful build.
    index: RwLock<Option<Arc<PatientIndex>>>,
}

impl PatientSlot {
    fn new() -> Self {
        Self {
            build_gate: Mutex::new(()),
            index: RwLock::new(None),
        }
    }
}

/// Patient identifier → built per-section indices.
pub struct PatientIndexCache {
    slots: RwLock<HashMap<String, Arc<PatientSlot>>>,
}

impl PatientIndexCache {
    pub fn new() -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
        }
    }

    /// Get or create the slot for a patient. The map lock is held only
    /// for the lookup/insert, never across I/O.
    fn slot(&self, patient_id: &str) -> Result<Arc<PatientSlot>, CacheError> {
        {
            let slots = self.slots.read().map_err(|_| CacheError::LockPoisoned)?;
            if let Some(slot) = slots.get(patient_id) {
                return Ok(Arc::clone(slot));
            }
        }
        let mut slots = self.slots.write().map_err(|_| CacheError::LockPoisoned)?;
        Ok(Arc::clone(
            slots
                .entry(patient_id.to_string())
                .or_insert_with(|| Arc::new(PatientSlot::new())),
        ))
    }

    /// Run a build and atomically publish its result.
    ///
    /// `build` executes under this patient's build gate: concurrent
    /// builds for the same id serialize; builds for different ids never
    /// block each other. On `Ok` the new index replaces the entry
    /// wholesale; on `Err` (or unwind) the previous entry, or its
    /// absence, is untouched.
    pub fn build_with<E>(
        &self,
        patient_id: &str,
        build: impl FnOnce() -> Result<PatientIndex, E>,
    ) -> Result<Arc<PatientIndex>, E>
    where
        E: From<CacheError>,
    {
        let slot = self.slot(patient_id)?;
        let _gate = slot
            .build_gate
            .lock()
            .map_err(|_| CacheError::LockPoisoned)?;

        let built = Arc::new(build()?);

        let mut published = slot.index.write().map_err(|_| CacheError::LockPoisoned)?;
        *published = Some(Arc::clone(&built));
        Ok(built)
    }

    /// Read the current index for a patient. Pure read: returns a handle
    /// the caller can use after this call with no cache lock held, so
    /// long-latency work downstream never contends with builds.
    pub fn get(&self, patient_id: &str) -> Result<Arc<PatientIndex>, CacheError> {
        let slot = {
            let slots = self.slots.read().map_err(|_| CacheError::LockPoisoned)?;
            slots
                .get(patient_id)
                .cloned()
                .ok_or_else(|| CacheError::NotBuilt(patient_id.to_string()))?
        };
        let published = slot.index.read().map_err(|_| CacheError::LockPoisoned)?;
        published
            .clone()
            .ok_or_else(|| CacheError::NotBuilt(patient_id.to_string()))
    }

    /// Whether a successful build has been published for this id.
    pub fn is_built(&self, patient_id: &str) -> bool {
        self.get(patient_id).is_ok()
    }

    /// Drop a patient's entry entirely.
    pub fn evict(&self, patient_id: &str) -> Result<(), CacheError> {
        let mut slots = self.slots.write().map_err(|_| CacheError::LockPoisoned)?;
        slots.remove(patient_id);
        Ok(())
    }

    /// Drop all entries.
    pub fn clear(&self) -> Result<(), CacheError> {
        let mut slots = self.slots.write().map_err(|_| CacheError::LockPoisoned)?;
        slots.clear();
        Ok(())
    }

    /// Number of patient slots (built or mid-first-build).
    pub fn len(&self) -> usize {
        self.slots.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for PatientIndexCache {
    fn default() -> Self {
        Self::new()
    }
}
