use std::sync::atomic::{AtomicU64, Ordering};

use fnv::FnvHashMap;

use crate::value::VarName;

static NAME_SEED: AtomicU64 = AtomicU64::new(0);

/// Generates names unique across every factory in the process. Each
/// factory takes a distinct seed, so concurrent passes can rename
/// without coordinating.
#[derive(Clone, Debug)]
pub struct NameFactory {
    seed: u64,
    index: u64,
    dictionary: FnvHashMap<String, String>,
}

impl NameFactory {
    pub fn new() -> NameFactory {
        NameFactory {
            seed: NAME_SEED.fetch_add(1, Ordering::Relaxed),
            index: 0,
            dictionary: FnvHashMap::default(),
        }
    }

    pub fn unique_name(&mut self) -> String {
        let name = format!("X{}_{}", self.seed, self.index);
        self.index += 1;
        name
    }

    /// A fresh name carrying the canonical marker.
    pub fn canonical_name(&mut self) -> VarName {
        let name = format!("@X{}_{}", self.seed, self.index);
        self.index += 1;
        VarName::new(name)
    }

    /// The replacement for `old`, minting one on first use. Every
    /// later request for the same name returns the same replacement.
    pub fn name_for(&mut self, old: &str) -> String {
        if let Some(name) = self.dictionary.get(old) {
            return name.clone();
        }
        let name = self.unique_name();
        self.dictionary.insert(old.to_string(), name.clone());
        name
    }

    pub fn is_known(&self, old: &str) -> bool {
        self.dictionary.contains_key(old)
    }
}

impl Default for NameFactory {
    fn default() -> NameFactory {
        NameFactory::new()
    }
}
