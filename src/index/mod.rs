pub mod builder;
pub mod cache;

pub use builder::*;
pub use cache::*;

use std::collections::BTreeMap;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("No index built for patient {0}: load the patient first")]
    NotBuilt(String),

    #[error("Internal lock error")]
    LockPoisoned,
}

/// A patient's complete searchable representation: one built index per
/// section, replaced wholesale by each successful build. `BTreeMap` keeps
/// sections in lexicographic order, which fixes the deterministic section
/// order of assembled context.
#[derive(Debug)]
pub struct PatientIndex {
    sections: BTreeMap<String, SectionIndex>,
}

impl PatientIndex {
    pub fn new() -> Self {
        Self {
            sections: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, index: SectionIndex) {
        self.sections.insert(index.section().to_string(), index);
    }

    /// Sections in lexicographic order.
    pub fn sections(&self) -> impl Iterator<Item = &SectionIndex> {
        self.sections.values()
    }

    pub fn section(&self, name: &str) -> Option<&SectionIndex> {
        self.sections.get(name)
    }

    pub fn section_names(&self) -> Vec<&str> {
        self.sections.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

impl Default for PatientIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl FromIterator<SectionIndex> for PatientIndex {
    fn from_iter<I: IntoIterator<Item = SectionIndex>>(iter: I) -> Self {
        let mut index = Self::new();
        for section in iter {
            index.insert(section);
        }
        index
    }
}
