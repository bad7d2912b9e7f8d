use std::{
    fs,
    hash::{Hash, Hasher},
    io::Write,
    path::{Path, PathBuf},
    sync::Arc,
};

use serde::Serialize;
use serde_json::Value;
use tempfile::{NamedTempFile, TempPath};

use crate::{error::PackError, namespace::Namespace, origin::Origin};

/// How a file's bytes are interpreted once loaded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileFormat {
    Json,
    Text,
    Binary,
}

/// Parsed content of a pack file.
///
/// PNG and OGG payloads are carried as `Binary`; the pack model moves bytes
/// around and leaves image or audio decoding to the caller.
#[derive(Clone, Debug, PartialEq)]
pub enum FileData {
    Json(Value),
    Text(String),
    Binary(Vec<u8>),
}

impl FileData {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            FileData::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_json_mut(&mut self) -> Option<&mut Value> {
        match self {
            FileData::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FileData::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            FileData::Binary(bytes) => Some(bytes),
            _ => None,
        }
    }
}

/// Outcome of merging an incoming value into an existing one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Merged {
    /// The existing value absorbed the incoming one.
    Kept,
    /// The incoming value replaces the existing one.
    Overwrite,
    /// The entry should be deleted altogether.
    Remove,
}

pub type MergeFn = fn(&mut FileData, &FileData) -> Merged;
pub type DefaultFn = fn() -> FileData;
pub type BindFn = fn(&str, &BindMeta, &mut Namespace);

/// Static descriptor for a kind of pack file.
///
/// The resource pack types are declared as statics in [`crate::assets`];
/// callers can declare their own statics and register them on a pack at
/// runtime. Two descriptors are the same type when their names match.
#[derive(Debug)]
pub struct FileType {
    pub name: &'static str,
    /// Directory segments locating the type beneath a namespace.
    pub scope: &'static [&'static str],
    /// Full extension, possibly multi-segment (".png.mcmeta").
    pub extension: &'static str,
    pub format: FileFormat,
    /// Type-specific merge rule; `None` means the incoming file wins.
    pub merge: Option<MergeFn>,
    /// Content materialized when a file has neither content nor source.
    pub default: Option<DefaultFn>,
    /// Side effect applied when a file is installed under a bound namespace.
    pub bind: Option<BindFn>,
}

impl PartialEq for FileType {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for FileType {}

impl Hash for FileType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl FileType {
    /// Loads a file from the origin, failing if it is absent or malformed.
    pub fn load(&'static self, origin: &mut Origin, path: &str) -> Result<PackFile, PackError> {
        match self.try_load(origin, path)? {
            Some(file) => Ok(file),
            None => Err(PackError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                path.to_owned(),
            ))),
        }
    }

    /// Loads a file from the origin, returning `None` when it is absent.
    ///
    /// Malformed content is still an error.
    pub fn try_load(
        &'static self,
        origin: &mut Origin,
        path: &str,
    ) -> Result<Option<PackFile>, PackError> {
        let bytes = match origin.read(path)? {
            Some(bytes) => bytes,
            None => return Ok(None),
        };

        let content = parse_bytes(self.format, bytes, path)?;

        Ok(Some(PackFile {
            ty: self,
            content: Some(content),
            source: origin.source_path(path),
            scratch: None,
            meta: BindMeta::None,
        }))
    }
}

fn parse_bytes(format: FileFormat, bytes: Vec<u8>, path: &str) -> Result<FileData, PackError> {
    match format {
        FileFormat::Json => match serde_json::from_slice(&bytes) {
            Ok(value) => Ok(FileData::Json(value)),
            Err(error) => Err(PackError::Format {
                path: path.to_owned(),
                message: error.to_string(),
            }),
        },
        FileFormat::Text => match String::from_utf8(bytes) {
            Ok(text) => Ok(FileData::Text(text)),
            Err(_) => Err(PackError::Format {
                path: path.to_owned(),
                message: "invalid utf-8".to_owned(),
            }),
        },
        FileFormat::Binary => Ok(FileData::Binary(bytes)),
    }
}

/// Authoring metadata consumed when the file is bound into a namespace.
#[derive(Clone, Debug, Default)]
pub enum BindMeta {
    #[default]
    None,
    /// Animation metadata attached to a texture; binding installs a sibling
    /// `.png.mcmeta` entry under the same key.
    TextureMeta(Value),
    /// Sound event registration; binding merges an entry into the
    /// namespace's `sounds.json`.
    SoundEvent(SoundEvent),
}

/// Sound event attributes mirroring a `sounds.json` entry.
///
/// Serializing yields just the per-sound attribute object; the event name,
/// subtitle, and replace flag live at the event level instead.
#[derive(Clone, Debug, Default, Serialize)]
pub struct SoundEvent {
    #[serde(skip)]
    pub event: String,
    #[serde(skip)]
    pub subtitle: Option<String>,
    #[serde(skip)]
    pub replace: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pitch: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attenuation_distance: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preload: Option<bool>,
}

/// A single typed file in a pack.
///
/// At least one of content and source is populated, unless the type carries
/// a default that can be materialized on first read.
#[derive(Clone, Debug)]
pub struct PackFile {
    ty: &'static FileType,
    content: Option<FileData>,
    source: Option<PathBuf>,
    /// Scratch file backing `ensure_source_path` for in-memory content;
    /// removed when the last clone of the file is dropped.
    scratch: Option<Arc<TempPath>>,
    meta: BindMeta,
}

impl PartialEq for PackFile {
    fn eq(&self, other: &Self) -> bool {
        // Source provenance and bind metadata are not part of a file's
        // structural identity.
        self.ty == other.ty && self.content == other.content
    }
}

impl PackFile {
    pub fn new(ty: &'static FileType, content: FileData) -> Self {
        PackFile {
            ty,
            content: Some(content),
            source: None,
            scratch: None,
            meta: BindMeta::None,
        }
    }

    pub fn json(ty: &'static FileType, value: Value) -> Self {
        Self::new(ty, FileData::Json(value))
    }

    pub fn text(ty: &'static FileType, text: impl Into<String>) -> Self {
        Self::new(ty, FileData::Text(text.into()))
    }

    pub fn binary(ty: &'static FileType, bytes: impl Into<Vec<u8>>) -> Self {
        Self::new(ty, FileData::Binary(bytes.into()))
    }

    /// References a file on disk without reading it; the content is loaded
    /// on first access.
    pub fn from_path(ty: &'static FileType, path: impl Into<PathBuf>) -> Self {
        PackFile {
            ty,
            content: None,
            source: Some(path.into()),
            scratch: None,
            meta: BindMeta::None,
        }
    }

    pub fn with_meta(mut self, meta: BindMeta) -> Self {
        self.meta = meta;
        self
    }

    pub fn file_type(&self) -> &'static FileType {
        self.ty
    }

    pub fn bind_meta(&self) -> &BindMeta {
        &self.meta
    }

    /// The content as currently held in memory, without forcing a load.
    pub fn content(&self) -> Option<&FileData> {
        self.content.as_ref()
    }

    pub fn set_content(&mut self, content: FileData) {
        self.content = Some(content);
    }

    pub fn source_path(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// A filesystem path the file's bytes are resolvable at.
    ///
    /// Files without a source get their serialized bytes written to a
    /// scratch file, which lives until the last clone of the file is
    /// dropped.
    pub fn ensure_source_path(&mut self) -> Result<&Path, PackError> {
        if self.source.is_none() && self.scratch.is_none() {
            let bytes = self.serialized()?;
            let mut file = NamedTempFile::new()?;
            file.write_all(&bytes)?;
            self.scratch = Some(Arc::new(file.into_temp_path()));
        }

        match (&self.source, &self.scratch) {
            (Some(source), _) => Ok(source),
            (None, Some(scratch)) => Ok(scratch),
            (None, None) => Err(PackError::MissingContent(self.ty.name.to_owned())),
        }
    }

    /// The content, loading it from the source or materializing the type's
    /// default on first access.
    pub fn data(&mut self) -> Result<&FileData, PackError> {
        self.force()?;
        match &self.content {
            Some(content) => Ok(content),
            None => Err(PackError::MissingContent(self.ty.name.to_owned())),
        }
    }

    pub fn data_mut(&mut self) -> Result<&mut FileData, PackError> {
        self.force()?;
        match &mut self.content {
            Some(content) => Ok(content),
            None => Err(PackError::MissingContent(self.ty.name.to_owned())),
        }
    }

    /// Like `data_mut` but never touches the filesystem; files that only
    /// hold a source reference fall back to the type default.
    pub(crate) fn content_or_default_mut(&mut self) -> Option<&mut FileData> {
        if self.content.is_none() {
            self.content = self.ty.default.map(|default| default());
        }
        self.content.as_mut()
    }

    /// The JSON content, resetting to an empty object when the file holds
    /// anything else in memory.
    pub(crate) fn json_content_mut(&mut self) -> &mut Value {
        if !matches!(self.content, Some(FileData::Json(_))) {
            self.content = Some(FileData::Json(Value::Object(Default::default())));
        }
        match &mut self.content {
            Some(FileData::Json(value)) => value,
            _ => unreachable!("json content was just installed"),
        }
    }

    fn force(&mut self) -> Result<(), PackError> {
        if self.content.is_some() {
            return Ok(());
        }

        if let Some(source) = &self.source {
            let bytes = fs::read(source)?;
            self.content = Some(parse_bytes(
                self.ty.format,
                bytes,
                &source.display().to_string(),
            )?);
        } else if let Some(default) = self.ty.default {
            self.content = Some(default());
        }

        Ok(())
    }

    /// Merges the incoming file into this one using this type's rule.
    pub fn merge(&mut self, incoming: &mut PackFile) -> Result<Merged, PackError> {
        let merge = match self.ty.merge {
            Some(merge) => merge,
            None => return Ok(Merged::Overwrite),
        };

        let theirs = incoming.data()?.clone();
        let ours = self.data_mut()?;

        Ok(merge(ours, &theirs))
    }

    /// The bytes this file serializes to on disk or in an archive.
    ///
    /// Writing the same content twice yields identical bytes.
    pub fn serialized(&self) -> Result<Vec<u8>, PackError> {
        if let Some(content) = &self.content {
            return serialize_data(content, self.ty.name);
        }

        if let Some(source) = &self.source {
            return Ok(fs::read(source)?);
        }

        if let Some(default) = self.ty.default {
            return serialize_data(&default(), self.ty.name);
        }

        Err(PackError::MissingContent(self.ty.name.to_owned()))
    }
}

fn serialize_data(content: &FileData, name: &str) -> Result<Vec<u8>, PackError> {
    match content {
        FileData::Json(value) => match serde_json::to_vec_pretty(value) {
            Ok(mut bytes) => {
                bytes.push(b'\n');
                Ok(bytes)
            }
            Err(error) => Err(PackError::Format {
                path: name.to_owned(),
                message: error.to_string(),
            }),
        },
        FileData::Text(text) => Ok(text.clone().into_bytes()),
        FileData::Binary(bytes) => Ok(bytes.clone()),
    }
}

#[test]
fn overwrite_merge_takes_incoming() {
    use crate::assets::TEXTURE;

    let mut current = PackFile::binary(&TEXTURE, vec![1, 2, 3]);
    let mut incoming = PackFile::binary(&TEXTURE, vec![4, 5]);

    assert_eq!(current.merge(&mut incoming).unwrap(), Merged::Overwrite);
}

#[test]
fn default_materialized_on_read() {
    use crate::assets::LANGUAGE;

    let mut file = PackFile {
        ty: &LANGUAGE,
        content: None,
        source: None,
        scratch: None,
        meta: BindMeta::None,
    };

    let data = file.data().unwrap();
    assert_eq!(data.as_json(), Some(&serde_json::json!({})));
}

#[test]
fn authored_files_materialize_a_source_path() {
    use crate::assets::MODEL;
    use serde_json::json;

    let mut file = PackFile::json(&MODEL, json!({ "parent": "item/generated" }));

    let path = file.ensure_source_path().unwrap().to_path_buf();
    let written: Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
    assert_eq!(written["parent"], "item/generated");

    // The same scratch file is handed back on later calls.
    assert_eq!(file.ensure_source_path().unwrap(), path);
}

#[test]
fn serialized_json_ends_with_newline() {
    use crate::assets::MODEL;

    let file = PackFile::json(&MODEL, serde_json::json!({"parent": "item/generated"}));
    let bytes = file.serialized().unwrap();

    assert!(bytes.ends_with(b"\n"));
    let reparsed: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(reparsed["parent"], "item/generated");
}
