//! Types for module graphs

use std::collections::BTreeSet;
use std::fmt;

/// How strictly `ModuleGraph::update` matches tree keys to parameter slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verify {
    /// Every slot must be supplied and every supplied key must name a slot.
    #[default]
    All,
    /// Bind matching keys, ignore the rest.
    None,
}

/// Two-way difference between graph parameter slots and supplied keys.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MismatchReport {
    /// Slots in the graph with no supplied value
    pub missing: BTreeSet<String>,
    /// Supplied keys that name no slot in the graph
    pub unexpected: BTreeSet<String>,
}

impl MismatchReport {
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.unexpected.is_empty()
    }
}

impl fmt::Display for MismatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let list = |keys: &BTreeSet<String>| keys.iter().cloned().collect::<Vec<_>>().join(", ");
        write!(
            f,
            "{} missing parameter(s) [{}], {} unexpected parameter(s) [{}]",
            self.missing.len(),
            list(&self.missing),
            self.unexpected.len(),
            list(&self.unexpected)
        )
    }
}
