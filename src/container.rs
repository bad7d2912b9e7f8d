use indexmap::IndexMap;

use crate::{
    error::PackError,
    file::{FileType, Merged, PackFile},
    policy::{MergeCallback, Ruling},
};

/// Ordered map of auxiliary files keyed by exact filename.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExtraContainer {
    files: IndexMap<String, PackFile>,
}

impl ExtraContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, filename: impl Into<String>, file: PackFile) {
        self.files.insert(filename.into(), file);
    }

    pub fn get(&self, filename: &str) -> Option<&PackFile> {
        self.files.get(filename)
    }

    pub fn get_mut(&mut self, filename: &str) -> Option<&mut PackFile> {
        self.files.get_mut(filename)
    }

    pub fn remove(&mut self, filename: &str) -> Option<PackFile> {
        self.files.shift_remove(filename)
    }

    pub fn contains_key(&self, filename: &str) -> bool {
        self.files.contains_key(filename)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &PackFile)> {
        self.files.iter()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn clear(&mut self) {
        self.files.clear();
    }

    /// Merges the incoming files by per-value merge, without policy rules.
    pub fn merge(&mut self, incoming: ExtraContainer) -> Result<(), PackError> {
        merge_files(&mut self.files, incoming.files)
    }

    pub(crate) fn files_mut(&mut self) -> &mut IndexMap<String, PackFile> {
        &mut self.files
    }

    pub(crate) fn into_files(self) -> IndexMap<String, PackFile> {
        self.files
    }
}

/// Ordered map holding one type of files in a namespace, keyed by relative
/// path without extension.
#[derive(Clone, Debug, PartialEq)]
pub struct NamespaceContainer {
    ty: &'static FileType,
    files: IndexMap<String, PackFile>,
}

impl NamespaceContainer {
    pub fn new(ty: &'static FileType) -> Self {
        NamespaceContainer {
            ty,
            files: IndexMap::new(),
        }
    }

    pub fn file_type(&self) -> &'static FileType {
        self.ty
    }

    pub fn insert(&mut self, key: impl Into<String>, file: PackFile) {
        debug_assert_eq!(file.file_type(), self.ty);
        self.files.insert(key.into(), file);
    }

    pub fn get(&self, key: &str) -> Option<&PackFile> {
        self.files.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut PackFile> {
        self.files.get_mut(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<PackFile> {
        self.files.shift_remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.files.contains_key(key)
    }

    /// The file under the key, inserting the type's default first when the
    /// key is vacant.
    pub fn setdefault(&mut self, key: impl Into<String>) -> &mut PackFile {
        let ty = self.ty;
        self.files.entry(key.into()).or_insert_with(|| {
            let content = ty.default.map(|default| default());
            match content {
                Some(content) => PackFile::new(ty, content),
                None => PackFile::binary(ty, Vec::new()),
            }
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &PackFile)> {
        self.files.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.files.keys()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Merges the incoming files by per-value merge, without policy rules.
    pub fn merge(&mut self, incoming: NamespaceContainer) -> Result<(), PackError> {
        merge_files(&mut self.files, incoming.files)
    }

    /// Builds a hierarchy of nested directory nodes for the files under the
    /// given path prefix.
    pub fn generate_tree(&self, path: &str) -> FileTreeNode<'_> {
        let prefix: Vec<&str> = path.split('/').filter(|part| !part.is_empty()).collect();
        let mut tree = FileTreeNode::default();

        for (key, file) in &self.files {
            let parts: Vec<&str> = key.split('/').collect();

            if parts.len() < prefix.len() || parts[.. prefix.len()] != prefix[..] {
                continue;
            }

            let mut node = &mut tree;
            for part in &parts[prefix.len() ..] {
                node = node
                    .children
                    .entry((*part).to_owned())
                    .or_insert_with(FileTreeNode::default);
            }
            node.file = Some(file);
        }

        tree
    }

    pub(crate) fn files_mut(&mut self) -> &mut IndexMap<String, PackFile> {
        &mut self.files
    }

    pub(crate) fn into_files(self) -> IndexMap<String, PackFile> {
        self.files
    }
}

/// A directory node produced by [`NamespaceContainer::generate_tree`].
#[derive(Debug, Default)]
pub struct FileTreeNode<'a> {
    pub children: IndexMap<String, FileTreeNode<'a>>,
    pub file: Option<&'a PackFile>,
}

/// Walks the incoming map and merges it into the current one.
///
/// Absent keys are inserted directly; conflicting keys dispatch to the
/// current value's merge, overwriting on `Merged::Overwrite` and deleting on
/// `Merged::Remove`.
pub(crate) fn merge_files(
    current: &mut IndexMap<String, PackFile>,
    incoming: IndexMap<String, PackFile>,
) -> Result<(), PackError> {
    merge_files_with_rules(current, incoming, |key| (key.to_owned(), Vec::new()))
}

/// Rule-driven variant of [`merge_files`]: the policy rules for a key run
/// first, and the per-value merge is only consulted when every rule passes.
pub(crate) fn merge_files_with_rules(
    current: &mut IndexMap<String, PackFile>,
    incoming: IndexMap<String, PackFile>,
    mut map_rules: impl FnMut(&str) -> (String, Vec<MergeCallback>),
) -> Result<(), PackError> {
    for (key, mut value) in incoming {
        if !current.contains_key(&key) {
            current.insert(key, value);
            continue;
        }

        let (path, rules) = map_rules(&key);

        let mut outcome = None;
        if let Some(existing) = current.get_mut(&key) {
            for rule in &rules {
                match rule(&path, existing, &mut value) {
                    Ruling::Handled => {
                        outcome = Some(Merged::Kept);
                        break;
                    }
                    Ruling::Pass => continue,
                    Ruling::Remove => {
                        outcome = Some(Merged::Remove);
                        break;
                    }
                }
            }

            if outcome.is_none() {
                outcome = Some(existing.merge(&mut value)?);
            }
        }

        match outcome {
            Some(Merged::Kept) | None => {}
            Some(Merged::Overwrite) => {
                current.insert(key, value);
            }
            Some(Merged::Remove) => {
                current.shift_remove(&key);
            }
        }
    }

    Ok(())
}

#[test]
fn generate_tree_nests_directories() {
    use crate::assets::MODEL;
    use serde_json::json;

    let mut container = NamespaceContainer::new(&MODEL);
    container.insert("item/stick", PackFile::json(&MODEL, json!({})));
    container.insert("item/stone", PackFile::json(&MODEL, json!({})));
    container.insert("block/stone", PackFile::json(&MODEL, json!({})));

    let tree = container.generate_tree("");
    assert_eq!(tree.children.len(), 2);
    assert!(tree.children["item"].children["stick"].file.is_some());

    let item = container.generate_tree("item");
    assert_eq!(item.children.len(), 2);
    assert!(item.children.contains_key("stick"));
    assert!(!item.children.contains_key("block"));
}

#[test]
fn merge_inserts_absent_keys() {
    use crate::assets::TEXT;

    let mut current = NamespaceContainer::new(&TEXT);
    current.insert("credits", PackFile::text(&TEXT, "a"));

    let mut incoming = NamespaceContainer::new(&TEXT);
    incoming.insert("credits", PackFile::text(&TEXT, "b"));
    incoming.insert("splashes", PackFile::text(&TEXT, "c"));

    current.merge(incoming).unwrap();

    // Raw text merges by overwrite.
    assert_eq!(
        current.get("credits").unwrap().content().unwrap().as_text(),
        Some("b")
    );
    assert_eq!(current.len(), 2);
}
