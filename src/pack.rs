use std::{
    collections::BTreeSet,
    env,
    fmt::{self, Debug, Formatter},
    fs::{self, File},
    io::Write,
    marker::PhantomData,
    path::{Path, PathBuf},
};

use indexmap::IndexMap;
use log::debug;
use serde_json::{json, Value};
use zip::{write::SimpleFileOptions, CompressionMethod, ZipWriter};

use crate::{
    assets,
    container::{merge_files_with_rules, ExtraContainer},
    error::PackError,
    file::{BindFn, BindMeta, FileData, FileType, PackFile},
    namespace::{scan, Namespace},
    origin::{Origin, UnveilMapping},
    policy::MergePolicy,
};

/// Compile-time description of a pack flavor: where namespaced files live
/// and which file types and extras are recognized.
pub trait PackLayout {
    /// The directory namespaces live under ("assets" for resource packs).
    const DIRECTORY: &'static str;
    /// Name picked when saving a pack that was never named.
    const DEFAULT_NAME: &'static str;
    /// The pack format stamped on packs that don't declare one.
    const LATEST_PACK_FORMAT: i64;

    fn file_types() -> &'static [&'static FileType];

    /// Pack-level extras, keyed by exact filename.
    fn pack_extra_info() -> IndexMap<String, &'static FileType>;

    /// Namespace-level extras, keyed by exact filename.
    fn namespace_extra_info() -> IndexMap<String, &'static FileType>;
}

/// Archive compression kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Compression {
    None,
    Deflate,
    Bzip2,
    Lzma,
}

impl Compression {
    pub fn method(self) -> CompressionMethod {
        match self {
            Compression::None => CompressionMethod::Stored,
            Compression::Deflate => CompressionMethod::Deflated,
            Compression::Bzip2 => CompressionMethod::Bzip2,
            Compression::Lzma => CompressionMethod::Lzma,
        }
    }
}

/// Arguments for [`Pack::save`]; unset fields fall back to the pack's cached
/// settings.
#[derive(Clone, Debug, Default)]
pub struct SaveOptions {
    pub directory: Option<PathBuf>,
    pub path: Option<PathBuf>,
    pub zipped: Option<bool>,
    pub compression: Option<Compression>,
    pub compression_level: Option<i64>,
    pub overwrite: bool,
}

impl SaveOptions {
    /// Saves into the given parent directory under the pack's own name.
    pub fn directory(path: impl Into<PathBuf>) -> Self {
        SaveOptions {
            directory: Some(path.into()),
            ..Default::default()
        }
    }

    /// Saves at the exact path; a `.zip` suffix switches to archive output.
    pub fn path(path: impl Into<PathBuf>) -> Self {
        SaveOptions {
            path: Some(path.into()),
            ..Default::default()
        }
    }

    pub fn zipped(mut self, zipped: bool) -> Self {
        self.zipped = Some(zipped);
        self
    }

    pub fn compression(mut self, compression: Compression) -> Self {
        self.compression = Some(compression);
        self
    }

    pub fn compression_level(mut self, level: i64) -> Self {
        self.compression_level = Some(level);
        self
    }

    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }
}

/// Where [`Pack::dump`] writes to.
pub enum Destination {
    Directory(PathBuf),
    Archive {
        writer: ZipWriter<File>,
        options: SimpleFileOptions,
    },
}

/// An origin accepted by [`Pack::unveil`].
pub enum UnveilOrigin {
    Path(PathBuf),
    Mapping(UnveilMapping),
}

impl From<PathBuf> for UnveilOrigin {
    fn from(path: PathBuf) -> Self {
        UnveilOrigin::Path(path)
    }
}

impl From<&Path> for UnveilOrigin {
    fn from(path: &Path) -> Self {
        UnveilOrigin::Path(path.to_path_buf())
    }
}

impl From<UnveilMapping> for UnveilOrigin {
    fn from(mapping: UnveilMapping) -> Self {
        UnveilOrigin::Mapping(mapping)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum UnveilKey {
    Path(PathBuf),
    Mapping(usize),
}

/// The root container: named namespaces plus pack-level extra files.
pub struct Pack<L: PackLayout> {
    pub name: Option<String>,
    /// Parent directory of the last load or save target.
    pub path: Option<PathBuf>,
    pub zipped: bool,
    pub compression: Option<Compression>,
    pub compression_level: Option<i64>,

    namespaces: IndexMap<String, Namespace>,
    pub extra: ExtraContainer,

    extend_extra: IndexMap<String, &'static FileType>,
    extend_namespace: Vec<&'static FileType>,
    extend_namespace_extra: IndexMap<String, &'static FileType>,

    pub merge_policy: MergePolicy,
    unveiled: IndexMap<UnveilKey, BTreeSet<String>>,

    marker: PhantomData<L>,
}

impl<L: PackLayout> Pack<L> {
    pub fn new() -> Self {
        let mut pack = Pack {
            name: None,
            path: None,
            zipped: false,
            compression: None,
            compression_level: None,
            namespaces: IndexMap::new(),
            extra: ExtraContainer::new(),
            extend_extra: IndexMap::new(),
            extend_namespace: Vec::new(),
            extend_namespace_extra: IndexMap::new(),
            merge_policy: MergePolicy::new(),
            unveiled: IndexMap::new(),
            marker: PhantomData,
        };
        pack.apply_defaults();
        pack
    }

    /// Loads a pack from a directory or a `.zip` archive on disk.
    ///
    /// A path that doesn't exist yet just records the pack's name and
    /// whether it should save zipped.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PackError> {
        let mut pack = Self::new();
        pack.load_path(path)?;
        Ok(pack)
    }

    /// Mounts the given path into this pack, adopting its name.
    pub fn load_path(&mut self, path: impl AsRef<Path>) -> Result<(), PackError> {
        let path = absolute(path.as_ref())?;
        self.path = path.parent().map(Path::to_path_buf);

        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();

        if path.is_file() {
            self.zipped = true;
            self.name = Some(strip_zip_suffix(&file_name).to_owned());
            let mut origin = Origin::open_archive(&path)?;
            self.mount("", &mut origin)?;
        } else if path.is_dir() {
            self.zipped = false;
            self.name = Some(file_name);
            let mut origin = Origin::Path(path);
            self.mount("", &mut origin)?;
        } else {
            self.zipped = file_name.ends_with(".zip");
            self.name = Some(strip_zip_suffix(&file_name).to_owned());
        }

        self.apply_defaults();
        Ok(())
    }

    /// Mounts an already-open origin (archive handle or mapping) at the
    /// pack root.
    pub fn load_origin(&mut self, origin: &mut Origin) -> Result<(), PackError> {
        self.mount("", origin)?;
        self.apply_defaults();
        Ok(())
    }

    /// Mounts the files of an origin under the given prefix.
    ///
    /// Pack extras are matched against the prefix, then namespaces are
    /// scanned and merged in.
    pub fn mount(&mut self, prefix: &str, origin: &mut Origin) -> Result<(), PackError> {
        debug!("mounting prefix {:?}", prefix);

        let mut files = IndexMap::new();
        for (filename, ty) in self.resolve_extra_info() {
            let loaded = if prefix.is_empty() {
                ty.try_load(origin, &filename)?
            } else if prefix == filename {
                ty.try_load(origin, "")?
            } else if let Some(rest) = filename.strip_prefix(&format!("{}/", prefix)) {
                ty.try_load(origin, rest)?
            } else {
                None
            };

            if let Some(file) = loaded {
                files.insert(filename, file);
            }
        }
        self.merge_extra_files(files)?;

        let types = self.resolve_scope_types();
        let extra_info = self.resolve_namespace_extra_info();
        let namespaces = scan(L::DIRECTORY, prefix, origin, &types, &extra_info)?;
        self.merge_namespace_entries(namespaces)?;

        Ok(())
    }

    /// Lazily mounts a sub-tree of an origin, deduplicating prefixes.
    ///
    /// Mounting a prefix covered by an earlier one is a no-op; mounting an
    /// ancestor subsumes the descendants already recorded.
    pub fn unveil(
        &mut self,
        prefix: &str,
        origin: impl Into<UnveilOrigin>,
    ) -> Result<(), PackError> {
        let origin = origin.into();
        let key = match &origin {
            UnveilOrigin::Path(path) => UnveilKey::Path(absolute(path)?),
            UnveilOrigin::Mapping(mapping) => UnveilKey::Mapping(mapping.identity()),
        };

        let mounted = self.unveiled.entry(key).or_insert_with(BTreeSet::new);

        for existing in mounted.iter() {
            if prefix.starts_with(existing.as_str()) {
                return Ok(());
            }
        }

        mounted.retain(|existing| !existing.starts_with(prefix));
        mounted.insert(prefix.to_owned());

        match origin {
            UnveilOrigin::Mapping(mapping) => {
                let mut origin = Origin::Mapping(mapping.with_prefix(prefix));
                self.mount(prefix, &mut origin)
            }
            UnveilOrigin::Path(path) => {
                let mut origin = Origin::Path(absolute(&path)?.join(prefix));
                self.mount(prefix, &mut origin)
            }
        }
    }

    /// Merges another pack into this one under the merge policy, pruning
    /// empty namespaces afterwards.
    pub fn merge(&mut self, other: Pack<L>) -> Result<(), PackError> {
        self.merge_namespace_entries(other.namespaces)?;
        self.merge_extra_files(other.extra.into_files())?;
        self.prune();
        Ok(())
    }

    /// Copies another pack's extensions and merge policy into this one.
    pub fn configure(&mut self, other: &Pack<L>) {
        for (filename, &ty) in &other.extend_extra {
            self.extend_extra.insert(filename.clone(), ty);
        }
        self.extend_namespace
            .extend(other.extend_namespace.iter().copied());
        for (filename, &ty) in &other.extend_namespace_extra {
            self.extend_namespace_extra.insert(filename.clone(), ty);
        }
        self.merge_policy.extend(&other.merge_policy);
    }

    /// Registers an additional pack-level extra file type.
    pub fn extend_extra(&mut self, filename: impl Into<String>, ty: &'static FileType) {
        self.extend_extra.insert(filename.into(), ty);
    }

    /// Registers an additional namespace file type.
    pub fn extend_namespace(&mut self, ty: &'static FileType) {
        self.extend_namespace.push(ty);
    }

    /// Registers an additional namespace-level extra file type.
    pub fn extend_namespace_extra(&mut self, filename: impl Into<String>, ty: &'static FileType) {
        self.extend_namespace_extra.insert(filename.into(), ty);
    }

    pub fn namespace(&self, name: &str) -> Option<&Namespace> {
        self.namespaces.get(name)
    }

    /// The namespace under the name, created empty when missing.
    pub fn namespace_mut(&mut self, name: impl Into<String>) -> &mut Namespace {
        self.namespaces
            .entry(name.into())
            .or_insert_with(Namespace::new)
    }

    /// Installs a namespace, running the bind side effects of its files.
    pub fn insert_namespace(&mut self, name: impl Into<String>, mut namespace: Namespace) {
        namespace.apply_bind_effects();
        self.namespaces.insert(name.into(), namespace);
    }

    pub fn remove_namespace(&mut self, name: &str) -> Option<Namespace> {
        self.namespaces.shift_remove(name)
    }

    pub fn namespaces(&self) -> impl Iterator<Item = (&String, &Namespace)> {
        self.namespaces.iter()
    }

    /// The file of the given type at a `"namespace:path"` key.
    pub fn get(&self, ty: &'static FileType, path: &str) -> Option<&PackFile> {
        let (namespace, key) = path.split_once(':')?;
        self.namespace(namespace)?.get(ty, key)
    }

    pub fn get_mut(&mut self, ty: &'static FileType, path: &str) -> Option<&mut PackFile> {
        let (namespace, key) = path.split_once(':')?;
        self.namespaces.get_mut(namespace)?.get_mut(ty, key)
    }

    /// Installs a file at a `"namespace:path"` key, running its bind side
    /// effect.
    ///
    /// # Panics
    ///
    /// Panics when the path has no namespace separator.
    pub fn insert(&mut self, path: &str, file: PackFile) {
        let Some((namespace, key)) = path.split_once(':') else {
            panic!("expected a namespaced path, got {:?}", path);
        };
        self.namespace_mut(namespace).insert_bound(key, file);
    }

    /// Every file of one type across all namespaces, under
    /// `"namespace:path"` keys.
    pub fn files_of(&self, ty: &'static FileType) -> Vec<(String, &PackFile)> {
        let mut files = Vec::new();
        for (name, namespace) in &self.namespaces {
            if let Some(container) = namespace.container(ty) {
                for (key, file) in container.iter() {
                    files.push((format!("{}:{}", name, key), file));
                }
            }
        }
        files
    }

    /// Every typed file in the pack, grouped by type, under
    /// `"namespace:path"` keys.
    pub fn content(&self) -> Vec<(String, &PackFile)> {
        let mut files = Vec::new();
        for ty in self.resolve_scope_types() {
            for (name, namespace) in &self.namespaces {
                if let Some(container) = namespace.container(ty) {
                    for (key, file) in container.iter() {
                        files.push((format!("{}:{}", name, key), file));
                    }
                }
            }
        }
        files
    }

    /// Lists every file with its flat storage path below the pack root,
    /// optionally filtered by extension.
    pub fn list_files(&self, extensions: &[&str]) -> Vec<(String, &PackFile)> {
        let mut files = Vec::new();

        for (path, file) in self.extra.iter() {
            if !extensions.is_empty() && !extensions.iter().any(|ext| path.ends_with(ext)) {
                continue;
            }
            files.push((path.clone(), file));
        }

        for (name, namespace) in &self.namespaces {
            files.extend(namespace.list_files(L::DIRECTORY, name, extensions));
        }

        files
    }

    /// Removes empty containers and namespaces.
    pub fn prune(&mut self) {
        for namespace in self.namespaces.values_mut() {
            namespace.prune();
        }
        self.namespaces.retain(|_, namespace| !namespace.is_empty());
    }

    pub fn clear(&mut self) {
        self.extra.clear();
        self.namespaces.clear();
        self.apply_defaults();
    }

    /// True when the pack holds no namespaces and nothing beyond its
    /// pack.mcmeta.
    pub fn is_empty(&self) -> bool {
        self.namespaces.values().all(Namespace::is_empty)
            && self
                .extra
                .iter()
                .all(|(filename, _)| filename == "pack.mcmeta")
    }

    pub(crate) fn resolve_scope_types(&self) -> Vec<&'static FileType> {
        let mut types: Vec<&'static FileType> = L::file_types().to_vec();
        for &ty in &self.extend_namespace {
            // Runtime registrations replace a built-in sharing their key.
            match types
                .iter()
                .position(|existing| existing.scope == ty.scope && existing.extension == ty.extension)
            {
                Some(index) => types[index] = ty,
                None => types.push(ty),
            }
        }
        types
    }

    pub(crate) fn resolve_extra_info(&self) -> IndexMap<String, &'static FileType> {
        let mut info = L::pack_extra_info();
        for (filename, &ty) in &self.extend_extra {
            info.insert(filename.clone(), ty);
        }
        info
    }

    pub(crate) fn resolve_namespace_extra_info(&self) -> IndexMap<String, &'static FileType> {
        let mut info = L::namespace_extra_info();
        for (filename, &ty) in &self.extend_namespace_extra {
            info.insert(filename.clone(), ty);
        }
        info
    }

    /// The pack.mcmeta file, created from its default when missing.
    pub fn mcmeta_mut(&mut self) -> &mut PackFile {
        let ty = L::pack_extra_info()
            .get("pack.mcmeta")
            .copied()
            .unwrap_or(&assets::MCMETA);
        self.extra
            .files_mut()
            .entry("pack.mcmeta".to_owned())
            .or_insert_with(|| PackFile::json(ty, json!({})))
    }

    pub fn mcmeta(&self) -> Option<&PackFile> {
        self.extra.get("pack.mcmeta")
    }

    fn mcmeta_value(&self) -> Option<&Value> {
        self.mcmeta().and_then(PackFile::content).and_then(FileData::as_json)
    }

    /// A top-level section of pack.mcmeta, created as `null` when missing.
    pub(crate) fn mcmeta_section_mut(&mut self, key: &str) -> &mut Value {
        let data = self.mcmeta_mut().json_content_mut();
        if !data.is_object() {
            *data = json!({});
        }
        &mut data[key]
    }

    pub fn pack_format(&self) -> i64 {
        self.mcmeta_value()
            .and_then(|data| data.get("pack"))
            .and_then(|pack| pack.get("pack_format"))
            .and_then(Value::as_i64)
            .unwrap_or(0)
    }

    pub fn set_pack_format(&mut self, value: i64) {
        let section = self.mcmeta_section_mut("pack");
        if !section.is_object() {
            *section = json!({});
        }
        section["pack_format"] = json!(value);
    }

    pub fn description(&self) -> Option<&Value> {
        self.mcmeta_value()
            .and_then(|data| data.get("pack"))
            .and_then(|pack| pack.get("description"))
    }

    pub fn set_description(&mut self, value: impl Into<Value>) {
        let section = self.mcmeta_section_mut("pack");
        if !section.is_object() {
            *section = json!({});
        }
        section["description"] = value.into();
    }

    /// The `filter` section of pack.mcmeta; a `block` list always exists.
    pub fn filter_mut(&mut self) -> &mut Value {
        let section = self.mcmeta_section_mut("filter");
        if !section.is_object() {
            *section = json!({ "block": [] });
        } else if section.get("block").and_then(Value::as_array).is_none() {
            section["block"] = json!([]);
        }
        section
    }

    pub fn icon(&self) -> Option<&PackFile> {
        self.extra.get("pack.png")
    }

    pub fn set_icon(&mut self, file: PackFile) {
        self.extra.insert("pack.png", file);
    }

    fn apply_defaults(&mut self) {
        if self.pack_format() == 0 {
            self.set_pack_format(L::LATEST_PACK_FORMAT);
        }

        let missing = match self.description() {
            None => true,
            Some(value) => value.is_null(),
        };
        if missing {
            self.set_description("");
        }
    }

    fn merge_extra_files(
        &mut self,
        incoming: IndexMap<String, PackFile>,
    ) -> Result<(), PackError> {
        let policy = self.merge_policy.clone();
        merge_files_with_rules(self.extra.files_mut(), incoming, |key| {
            (key.to_owned(), policy.extra_rules(key))
        })
    }

    fn merge_namespace_entries(
        &mut self,
        incoming: impl IntoIterator<Item = (String, Namespace)>,
    ) -> Result<(), PackError> {
        let policy = self.merge_policy.clone();

        for (name, namespace) in incoming {
            match self.namespaces.get_mut(&name) {
                Some(existing) => merge_namespace(&policy, &name, existing, namespace)?,
                None => {
                    let mut namespace = namespace;
                    namespace.apply_bind_effects();
                    self.namespaces.insert(name, namespace);
                }
            }
        }

        self.namespaces.retain(|_, namespace| !namespace.is_empty());
        Ok(())
    }

    /// Writes the pack's files into the destination.
    pub fn dump(&self, destination: &mut Destination) -> Result<(), PackError> {
        dump_files(destination, self.list_files(&[]))
    }

    /// Saves the pack as a directory or archive and returns the output path.
    ///
    /// An existing target errors with [`PackError::Overwrite`] unless the
    /// overwrite flag is set, in which case it is removed first.
    pub fn save(&mut self, options: SaveOptions) -> Result<PathBuf, PackError> {
        if let Some(path) = &options.path {
            let path = absolute(path)?;
            let file_name = path
                .file_name()
                .map(|name| name.to_string_lossy().to_string())
                .unwrap_or_else(|| L::DEFAULT_NAME.to_owned());
            self.zipped = file_name.ends_with(".zip");
            self.name = Some(strip_zip_suffix(&file_name).to_owned());
            self.path = path.parent().map(Path::to_path_buf);
        }

        if let Some(zipped) = options.zipped {
            self.zipped = zipped;
        }
        if let Some(compression) = options.compression {
            self.compression = Some(compression);
        }
        if let Some(level) = options.compression_level {
            self.compression_level = Some(level);
        }

        let suffix = if self.zipped { ".zip" } else { "" };

        let directory = match &options.directory {
            Some(directory) => absolute(directory)?,
            None => match &self.path {
                Some(path) => path.clone(),
                None => env::current_dir()?,
            },
        };
        self.path = Some(directory.clone());

        if self.name.is_none() {
            for i in 0 .. {
                let candidate = if i == 0 {
                    L::DEFAULT_NAME.to_owned()
                } else {
                    format!("{}{}", L::DEFAULT_NAME, i)
                };
                if !directory.join(format!("{}{}", candidate, suffix)).exists() {
                    self.name = Some(candidate);
                    break;
                }
            }
        }

        let name = match &self.name {
            Some(name) => name.clone(),
            None => L::DEFAULT_NAME.to_owned(),
        };
        let output = directory.join(format!("{}{}", name, suffix));

        if output.exists() {
            if !options.overwrite {
                return Err(PackError::Overwrite(output));
            }
            if output.is_dir() {
                fs::remove_dir_all(&output)?;
            } else {
                fs::remove_file(&output)?;
            }
        }

        if self.zipped {
            fs::create_dir_all(&directory)?;

            let method = self.compression.unwrap_or(Compression::Deflate).method();
            let mut zip_options = SimpleFileOptions::default().compression_method(method);
            if let Some(level) = self.compression_level {
                zip_options = zip_options.compression_level(Some(level));
            }

            let file = File::create(&output)?;
            let mut destination = Destination::Archive {
                writer: ZipWriter::new(file),
                options: zip_options,
            };
            let dumped = self.dump(&mut destination);

            // Close the archive whether or not writing succeeded.
            if let Destination::Archive { writer, .. } = destination {
                writer.finish()?;
            }
            dumped?;
        } else {
            fs::create_dir_all(&output)?;
            let mut destination = Destination::Directory(output.clone());
            self.dump(&mut destination)?;
        }

        Ok(output)
    }
}

impl<L: PackLayout> Default for Pack<L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: PackLayout> Clone for Pack<L> {
    fn clone(&self) -> Self {
        Pack {
            name: self.name.clone(),
            path: self.path.clone(),
            zipped: self.zipped,
            compression: self.compression,
            compression_level: self.compression_level,
            namespaces: self.namespaces.clone(),
            extra: self.extra.clone(),
            extend_extra: self.extend_extra.clone(),
            extend_namespace: self.extend_namespace.clone(),
            extend_namespace_extra: self.extend_namespace_extra.clone(),
            merge_policy: self.merge_policy.clone(),
            unveiled: self.unveiled.clone(),
            marker: PhantomData,
        }
    }
}

impl<L: PackLayout> PartialEq for Pack<L> {
    fn eq(&self, other: &Self) -> bool {
        // Settings, extensions, and unveil bookkeeping are not part of the
        // pack's structural identity.
        self.namespaces == other.namespaces && self.extra == other.extra
    }
}

impl<L: PackLayout> Debug for Pack<L> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pack")
            .field("name", &self.name)
            .field("pack_format", &self.pack_format())
            .field("namespaces", &self.namespaces.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn merge_namespace(
    policy: &MergePolicy,
    name: &str,
    current: &mut Namespace,
    incoming: Namespace,
) -> Result<(), PackError> {
    let Namespace { containers, extra } = incoming;

    for (ty, container) in containers {
        let mut effects: Vec<(BindFn, String, BindMeta)> = Vec::new();
        if let Some(hook) = ty.bind {
            for (key, file) in container.iter() {
                if !matches!(file.bind_meta(), BindMeta::None) {
                    effects.push((hook, key.clone(), file.bind_meta().clone()));
                }
            }
        }

        match current.containers.get_mut(&ty) {
            Some(existing) => {
                merge_files_with_rules(existing.files_mut(), container.into_files(), |key| {
                    (format!("{}:{}", name, key), policy.namespace_rules(ty))
                })?;
            }
            None => {
                current.containers.insert(ty, container);
            }
        }

        for (hook, key, meta) in effects {
            hook(&key, &meta, current);
        }
    }

    merge_files_with_rules(current.extra.files_mut(), extra.into_files(), |key| {
        (format!("{}:{}", name, key), policy.namespace_extra_rules(key))
    })?;

    current.prune();
    Ok(())
}

fn dump_files(
    destination: &mut Destination,
    files: Vec<(String, &PackFile)>,
) -> Result<(), PackError> {
    let mut directories: IndexMap<String, Vec<(String, &PackFile)>> = IndexMap::new();

    for (path, file) in files {
        let directory = match path.rsplit_once('/') {
            Some((directory, _)) => directory.to_owned(),
            None => String::new(),
        };
        directories
            .entry(directory)
            .or_insert_with(Vec::new)
            .push((path, file));
    }

    for (directory, entries) in directories {
        if let Destination::Directory(root) = destination {
            if !directory.is_empty() {
                fs::create_dir_all(root.join(&directory))?;
            }
        }

        for (path, file) in entries {
            let bytes = file.serialized()?;
            match destination {
                Destination::Directory(root) => fs::write(root.join(&path), bytes)?,
                Destination::Archive { writer, options } => {
                    writer.start_file(path.as_str(), *options)?;
                    writer.write_all(&bytes)?;
                }
            }
        }
    }

    Ok(())
}

fn strip_zip_suffix(name: &str) -> &str {
    name.strip_suffix(".zip").unwrap_or(name)
}

pub(crate) fn absolute(path: &Path) -> Result<PathBuf, PackError> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(env::current_dir()?.join(path))
    }
}

#[test]
fn unveil_dedups_prefixes() {
    use crate::assets::ResourcePack;

    let dir = tempfile::tempdir().unwrap();
    let mut pack = ResourcePack::new();

    pack.unveil("a/b", dir.path()).unwrap();
    pack.unveil("a", dir.path()).unwrap();
    pack.unveil("a/b/c", dir.path()).unwrap();

    let mounted: Vec<&BTreeSet<String>> = pack.unveiled.values().collect();
    assert_eq!(mounted.len(), 1);
    assert_eq!(
        mounted[0].iter().collect::<Vec<_>>(),
        vec![&"a".to_owned()]
    );
}

#[test]
fn insert_runs_texture_bind_effect() {
    use crate::assets::{ResourcePack, TEXTURE, TEXTURE_MCMETA};
    use crate::file::BindMeta;
    use serde_json::json;

    let mut pack = ResourcePack::new();
    let texture = PackFile::binary(&TEXTURE, vec![0])
        .with_meta(BindMeta::TextureMeta(json!({ "animation": {} })));

    pack.insert("minecraft:block/lava", texture);

    assert!(pack.get(&TEXTURE, "minecraft:block/lava").is_some());
    assert!(pack.get(&TEXTURE_MCMETA, "minecraft:block/lava").is_some());
}

#[test]
fn merge_callback_rules_run_in_order() {
    use crate::assets::{ResourcePack, TEXT};
    use crate::policy::Ruling;
    use std::sync::Arc;

    let mut pack = ResourcePack::new();
    pack.merge_policy.extend_namespace(
        &TEXT,
        Arc::new(|_path, _current, _incoming| Ruling::Pass),
    );
    pack.merge_policy.extend_namespace(
        &TEXT,
        Arc::new(|_path, current, _incoming| {
            current.set_content(FileData::Text("handled".to_owned()));
            Ruling::Handled
        }),
    );
    pack.insert("minecraft:credits", PackFile::text(&TEXT, "a"));

    let mut other = ResourcePack::new();
    other.insert("minecraft:credits", PackFile::text(&TEXT, "b"));

    pack.merge(other).unwrap();

    let merged = pack.get(&TEXT, "minecraft:credits").unwrap();
    assert_eq!(merged.content().unwrap().as_text(), Some("handled"));
}

#[test]
fn merge_remove_rule_prunes_namespace() {
    use crate::assets::{ResourcePack, TEXT};
    use crate::policy::Ruling;
    use std::sync::Arc;

    let mut pack = ResourcePack::new();
    pack.merge_policy
        .extend_namespace(&TEXT, Arc::new(|_, _, _| Ruling::Remove));
    pack.insert("mc:splashes", PackFile::text(&TEXT, "a"));

    let mut other = ResourcePack::new();
    other.insert("mc:splashes", PackFile::text(&TEXT, "b"));

    pack.merge(other).unwrap();

    assert!(pack.namespace("mc").is_none());
}

#[test]
fn merge_is_idempotent() {
    use crate::assets::{ResourcePack, LANGUAGE, MODEL};
    use serde_json::json;

    let mut pack = ResourcePack::new();
    pack.insert(
        "minecraft:item/stick",
        PackFile::json(&MODEL, json!({ "parent": "item/generated" })),
    );
    pack.insert(
        "minecraft:en_us",
        PackFile::json(&LANGUAGE, json!({ "key": "value" })),
    );

    let copy = pack.clone();
    pack.merge(copy).unwrap();

    let expected = ResourcePack::new();
    assert_ne!(pack, expected);
    assert_eq!(
        pack.get(&MODEL, "minecraft:item/stick")
            .unwrap()
            .content()
            .unwrap()
            .as_json(),
        Some(&json!({ "parent": "item/generated" }))
    );
    assert_eq!(pack.files_of(&LANGUAGE).len(), 1);
}

#[test]
fn list_files_produces_flat_paths() {
    use crate::assets::{ResourcePack, MODEL};
    use serde_json::json;

    let mut pack = ResourcePack::new();
    pack.insert(
        "minecraft:item/stick",
        PackFile::json(&MODEL, json!({})),
    );

    let files = pack.list_files(&[]);
    let paths: Vec<&str> = files.iter().map(|(path, _)| path.as_str()).collect();

    assert!(paths.contains(&"pack.mcmeta"));
    assert!(paths.contains(&"assets/minecraft/models/item/stick.json"));
}

#[test]
fn filter_always_has_block_list() {
    use crate::assets::ResourcePack;

    let mut pack = ResourcePack::new();
    let filter = pack.filter_mut();
    assert!(filter["block"].as_array().is_some());
}
