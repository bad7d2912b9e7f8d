use std::{
    fs::{self, File},
    io::{self, Read},
    path::{Path, PathBuf},
    sync::Arc,
};

use indexmap::IndexMap;
use zip::{result::ZipError, ZipArchive};

use crate::error::PackError;

/// A storage source candidate files are enumerated from and read out of.
pub enum Origin {
    /// A directory tree, or a single plain file (one candidate with an empty
    /// sub-path).
    Path(PathBuf),
    /// An open archive, randomly accessible by internal path.
    Archive(ZipArchive<File>),
    /// An abstract mapping from logical path to filesystem path.
    Mapping(UnveilMapping),
}

impl Origin {
    /// Opens the file at the path as an archive origin.
    pub fn open_archive(path: impl AsRef<Path>) -> Result<Origin, PackError> {
        let file = File::open(path.as_ref())?;
        Ok(Origin::Archive(ZipArchive::new(file)?))
    }

    /// All candidate file paths under this origin, unsorted.
    pub(crate) fn candidates(&mut self) -> Result<Vec<String>, PackError> {
        match self {
            Origin::Path(path) => {
                if path.is_file() {
                    Ok(vec![String::new()])
                } else if path.is_dir() {
                    let mut paths = Vec::new();
                    walk_directory(path, String::new(), &mut paths)?;
                    Ok(paths)
                } else {
                    Ok(Vec::new())
                }
            }
            Origin::Archive(archive) => Ok(archive
                .file_names()
                .filter(|name| !name.ends_with('/'))
                .map(str::to_owned)
                .collect()),
            Origin::Mapping(mapping) => Ok(mapping.keys()),
        }
    }

    /// Reads the bytes at the given sub-path, `None` when the entry is
    /// definitively absent.
    pub(crate) fn read(&mut self, path: &str) -> Result<Option<Vec<u8>>, PackError> {
        match self {
            Origin::Path(root) => {
                let target = if path.is_empty() {
                    root.clone()
                } else {
                    root.join(path)
                };
                read_optional(&target)
            }
            Origin::Archive(archive) => match archive.by_name(path) {
                Ok(mut entry) => {
                    let mut bytes = Vec::new();
                    entry.read_to_end(&mut bytes)?;
                    Ok(Some(bytes))
                }
                Err(ZipError::FileNotFound) => Ok(None),
                Err(error) => Err(error.into()),
            },
            Origin::Mapping(mapping) => match mapping.get(path) {
                Some(target) => read_optional(&target.to_owned()),
                None => Ok(None),
            },
        }
    }

    /// Filesystem provenance for the given sub-path, when the origin has one.
    pub(crate) fn source_path(&self, path: &str) -> Option<PathBuf> {
        match self {
            Origin::Path(root) => {
                if path.is_empty() {
                    Some(root.clone())
                } else {
                    Some(root.join(path))
                }
            }
            Origin::Archive(_) => None,
            Origin::Mapping(mapping) => mapping.get(path).cloned(),
        }
    }
}

impl From<PathBuf> for Origin {
    fn from(path: PathBuf) -> Self {
        Origin::Path(path)
    }
}

impl From<&Path> for Origin {
    fn from(path: &Path) -> Self {
        Origin::Path(path.to_path_buf())
    }
}

impl From<UnveilMapping> for Origin {
    fn from(mapping: UnveilMapping) -> Self {
        Origin::Mapping(mapping)
    }
}

fn read_optional(target: &Path) -> Result<Option<Vec<u8>>, PackError> {
    match fs::read(target) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
        // A file standing in the middle of the joined path reads as absent.
        Err(_) if !target.exists() => Ok(None),
        Err(error) => Err(error.into()),
    }
}

fn walk_directory(root: &Path, prefix: String, out: &mut Vec<String>) -> Result<(), PackError> {
    for entry in root.read_dir()? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();

        if entry.metadata()?.is_dir() {
            walk_directory(&entry.path(), format!("{}{}/", prefix, name), out)?;
        } else {
            out.push(format!("{}{}", prefix, name));
        }
    }

    Ok(())
}

/// A view over a logical-path → filesystem-path table, re-rootable at a
/// prefix.
///
/// Mappings are distinct by identity: two views over the same underlying
/// table count as the same origin for unveil bookkeeping, however they are
/// prefixed, while equal-looking tables built separately stay distinct.
#[derive(Clone, Debug)]
pub struct UnveilMapping {
    files: Arc<IndexMap<String, PathBuf>>,
    prefix: String,
}

impl UnveilMapping {
    pub fn new(files: impl IntoIterator<Item = (String, PathBuf)>) -> Self {
        UnveilMapping {
            files: Arc::new(files.into_iter().collect()),
            prefix: String::new(),
        }
    }

    /// A view over the same table with keys re-rooted at the prefix.
    pub fn with_prefix(&self, prefix: impl Into<String>) -> Self {
        UnveilMapping {
            files: Arc::clone(&self.files),
            prefix: prefix.into(),
        }
    }

    pub(crate) fn identity(&self) -> usize {
        Arc::as_ptr(&self.files) as usize
    }

    pub(crate) fn keys(&self) -> Vec<String> {
        if self.prefix.is_empty() {
            return self.files.keys().cloned().collect();
        }

        let directory_prefix = format!("{}/", self.prefix);
        let mut keys = Vec::new();

        for key in self.files.keys() {
            if *key == self.prefix {
                keys.push(String::new());
            } else if let Some(stripped) = key.strip_prefix(&directory_prefix) {
                keys.push(stripped.to_owned());
            }
        }

        keys
    }

    pub(crate) fn get(&self, key: &str) -> Option<&PathBuf> {
        let full = if !key.is_empty() && !self.prefix.is_empty() {
            format!("{}/{}", self.prefix, key)
        } else {
            format!("{}{}", self.prefix, key)
        };
        self.files.get(&full)
    }
}

#[test]
fn mapping_reroots_keys() {
    let mapping = UnveilMapping::new([
        ("assets/ns/a.json".to_owned(), PathBuf::from("/tmp/a")),
        ("assets/ns/b.json".to_owned(), PathBuf::from("/tmp/b")),
        ("other/c.json".to_owned(), PathBuf::from("/tmp/c")),
    ]);
    let rerooted = mapping.with_prefix("assets/ns");

    assert_eq!(rerooted.keys(), vec!["a.json", "b.json"]);
    assert_eq!(rerooted.get("a.json"), Some(&PathBuf::from("/tmp/a")));
    assert_eq!(rerooted.get("c.json"), None);
    assert_eq!(mapping.identity(), rerooted.identity());
}

#[test]
fn single_file_origin_has_one_candidate() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("stone.png");
    fs::write(&file, [1, 2, 3]).unwrap();

    let mut origin = Origin::Path(file);
    assert_eq!(origin.candidates().unwrap(), vec![String::new()]);
    assert_eq!(origin.read("").unwrap(), Some(vec![1, 2, 3]));
}
