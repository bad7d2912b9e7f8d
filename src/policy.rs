use std::{
    fmt::{self, Debug, Formatter},
    sync::Arc,
};

use indexmap::IndexMap;

use crate::file::{FileType, PackFile};

/// Result returned by a merge rule.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Ruling {
    /// The rule resolved the conflict; the (possibly mutated) current value
    /// stays and no further rules run.
    Handled,
    /// Defer to the next rule, or to the value's own merge when every rule
    /// passes.
    Pass,
    /// Delete the entry altogether.
    Remove,
}

/// A merge rule invoked when two files conflict on the same key.
///
/// Rules receive the display path of the entry (`"pack.mcmeta"`,
/// `"minecraft:block/stone"`) along with the current and incoming files, and
/// close over whatever context they need.
pub type MergeCallback = Arc<dyn Fn(&str, &mut PackFile, &mut PackFile) -> Ruling + Send + Sync>;

/// Layered dispatch tables of merge rules.
///
/// Rules are looked up by pack-extra filename, namespace file type, or
/// namespace-extra filename; rules registered earlier run first.
#[derive(Clone, Default)]
pub struct MergePolicy {
    extra: IndexMap<String, Vec<MergeCallback>>,
    namespace: IndexMap<&'static FileType, Vec<MergeCallback>>,
    namespace_extra: IndexMap<String, Vec<MergeCallback>>,
}

impl MergePolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends every rule of the other policy, preserving order per key.
    pub fn extend(&mut self, other: &MergePolicy) {
        for (key, rules) in &other.extra {
            self.extra
                .entry(key.clone())
                .or_insert_with(Vec::new)
                .extend(rules.iter().cloned());
        }
        for (key, rules) in &other.namespace {
            self.namespace
                .entry(*key)
                .or_insert_with(Vec::new)
                .extend(rules.iter().cloned());
        }
        for (key, rules) in &other.namespace_extra {
            self.namespace_extra
                .entry(key.clone())
                .or_insert_with(Vec::new)
                .extend(rules.iter().cloned());
        }
    }

    /// Adds a rule for merging pack extra files.
    pub fn extend_extra(&mut self, filename: impl Into<String>, rule: MergeCallback) {
        self.extra
            .entry(filename.into())
            .or_insert_with(Vec::new)
            .push(rule);
    }

    /// Adds a rule for merging namespace files of the given type.
    pub fn extend_namespace(&mut self, file_type: &'static FileType, rule: MergeCallback) {
        self.namespace
            .entry(file_type)
            .or_insert_with(Vec::new)
            .push(rule);
    }

    /// Adds a rule for merging namespace extra files.
    pub fn extend_namespace_extra(&mut self, filename: impl Into<String>, rule: MergeCallback) {
        self.namespace_extra
            .entry(filename.into())
            .or_insert_with(Vec::new)
            .push(rule);
    }

    pub(crate) fn extra_rules(&self, filename: &str) -> Vec<MergeCallback> {
        self.extra.get(filename).cloned().unwrap_or_default()
    }

    pub(crate) fn namespace_rules(&self, file_type: &'static FileType) -> Vec<MergeCallback> {
        self.namespace.get(&file_type).cloned().unwrap_or_default()
    }

    pub(crate) fn namespace_extra_rules(&self, filename: &str) -> Vec<MergeCallback> {
        self.namespace_extra
            .get(filename)
            .cloned()
            .unwrap_or_default()
    }
}

impl Debug for MergePolicy {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("MergePolicy")
            .field("extra", &self.extra.keys().collect::<Vec<_>>())
            .field(
                "namespace",
                &self.namespace.keys().map(|ty| ty.name).collect::<Vec<_>>(),
            )
            .field(
                "namespace_extra",
                &self.namespace_extra.keys().collect::<Vec<_>>(),
            )
            .finish()
    }
}
