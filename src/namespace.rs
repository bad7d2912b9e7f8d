use std::mem;

use indexmap::IndexMap;
use log::trace;

use crate::{
    container::{ExtraContainer, NamespaceContainer},
    error::PackError,
    file::{BindFn, BindMeta, FileType, PackFile},
    origin::Origin,
};

/// A named group of assets: one container per recognized file type, plus
/// namespace-level extra files such as `sounds.json`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Namespace {
    pub(crate) containers: IndexMap<&'static FileType, NamespaceContainer>,
    pub extra: ExtraContainer,
}

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn container(&self, ty: &'static FileType) -> Option<&NamespaceContainer> {
        self.containers.get(&ty)
    }

    pub fn container_mut(&mut self, ty: &'static FileType) -> &mut NamespaceContainer {
        self.containers
            .entry(ty)
            .or_insert_with(|| NamespaceContainer::new(ty))
    }

    pub fn get(&self, ty: &'static FileType, key: &str) -> Option<&PackFile> {
        self.container(ty).and_then(|container| container.get(key))
    }

    pub fn get_mut(&mut self, ty: &'static FileType, key: &str) -> Option<&mut PackFile> {
        self.containers
            .get_mut(&ty)
            .and_then(|container| container.get_mut(key))
    }

    /// Installs a file under its type's container.
    ///
    /// No bind side effects run; they fire when the namespace is attached to
    /// a pack, or when the file is installed through one.
    pub fn insert(&mut self, key: impl Into<String>, file: PackFile) {
        self.container_mut(file.file_type()).insert(key, file);
    }

    /// Installs a whole typed container, replacing the existing one.
    pub fn insert_container(&mut self, container: NamespaceContainer) {
        self.containers.insert(container.file_type(), container);
    }

    /// Installs a file and runs its bind side effect, as happens for every
    /// insertion routed through a pack.
    pub(crate) fn insert_bound(&mut self, key: &str, file: PackFile) {
        let hook = file.file_type().bind;
        let meta = file.bind_meta().clone();

        self.container_mut(file.file_type()).insert(key, file);

        if let (Some(hook), false) = (hook, matches!(meta, BindMeta::None)) {
            hook(key, &meta, self);
        }
    }

    /// Runs the bind side effect of every file currently held, used when a
    /// detached namespace is attached to a pack.
    pub(crate) fn apply_bind_effects(&mut self) {
        let mut effects: Vec<(BindFn, String, BindMeta)> = Vec::new();

        for container in self.containers.values() {
            let hook = match container.file_type().bind {
                Some(hook) => hook,
                None => continue,
            };
            for (key, file) in container.iter() {
                if !matches!(file.bind_meta(), BindMeta::None) {
                    effects.push((hook, key.clone(), file.bind_meta().clone()));
                }
            }
        }

        for (hook, key, meta) in effects {
            hook(&key, &meta, self);
        }
    }

    /// Iterates over every typed file as `(relative path, file)`.
    pub fn content(&self) -> impl Iterator<Item = (&String, &PackFile)> {
        self.containers.values().flat_map(|container| container.iter())
    }

    /// True when the namespace holds no typed files and no extras.
    pub fn is_empty(&self) -> bool {
        self.containers.values().all(NamespaceContainer::is_empty) && self.extra.is_empty()
    }

    /// Removes empty typed containers.
    pub fn prune(&mut self) {
        self.containers.retain(|_, container| !container.is_empty());
    }

    pub fn clear(&mut self) {
        self.containers.clear();
        self.extra.clear();
    }

    /// Merges another namespace by per-value merge, without policy rules.
    ///
    /// Merging through a pack applies the pack's merge policy instead.
    pub fn merge(&mut self, incoming: Namespace) -> Result<(), PackError> {
        for (ty, container) in incoming.containers {
            match self.containers.get_mut(&ty) {
                Some(existing) => existing.merge(container)?,
                None => {
                    self.containers.insert(ty, container);
                }
            }
        }

        self.extra.merge(incoming.extra)?;
        self.prune();
        Ok(())
    }

    /// Lists every file with its flat storage path below the pack root,
    /// optionally filtered by extension.
    ///
    /// Extras filter by path suffix, typed files by exact extension.
    pub fn list_files<'a>(
        &'a self,
        directory: &str,
        namespace: &str,
        extensions: &[&str],
    ) -> Vec<(String, &'a PackFile)> {
        let mut files = Vec::new();

        for (path, file) in self.extra.iter() {
            if !extensions.is_empty() && !extensions.iter().any(|ext| path.ends_with(ext)) {
                continue;
            }
            files.push((format!("{}/{}/{}", directory, namespace, path), file));
        }

        for (ty, container) in &self.containers {
            if container.is_empty() {
                continue;
            }
            if !extensions.is_empty() && !extensions.contains(&ty.extension) {
                continue;
            }

            let mut prefix = format!("{}/{}", directory, namespace);
            for segment in ty.scope {
                prefix.push('/');
                prefix.push_str(segment);
            }

            for (key, file) in container.iter() {
                files.push((format!("{}/{}{}", prefix, key, ty.extension), file));
            }
        }

        files
    }
}

/// All extension candidates of a basename, longest first.
///
/// `"stone.png.mcmeta"` yields `[".png.mcmeta", ".mcmeta"]`; a leading dot
/// belongs to the stem.
fn list_extensions(basename: &str) -> Vec<&str> {
    basename
        .char_indices()
        .filter(|&(index, c)| c == '.' && index > 0)
        .map(|(index, _)| &basename[index ..])
        .collect()
}

/// Loads namespaces by walking the candidate paths of an origin.
///
/// Candidates are sorted lexicographically on the full path string and
/// destructured into `(directory, namespace, scope ..., basename)`;
/// namespace extras are matched before the scope/extension registry, which
/// is searched by stripping trailing scope segments and trying extensions
/// longest-first at each depth. Unrecognized files are dropped.
pub(crate) fn scan(
    directory: &str,
    prefix: &str,
    origin: &mut Origin,
    types: &[&'static FileType],
    extra_info: &IndexMap<String, &'static FileType>,
) -> Result<Vec<(String, Namespace)>, PackError> {
    let preparts: Vec<&str> = prefix.split('/').filter(|part| !part.is_empty()).collect();
    if let Some(first) = preparts.first() {
        if *first != directory {
            return Ok(Vec::new());
        }
    }

    for (index, ty) in types.iter().enumerate() {
        for other in &types[index + 1 ..] {
            if ty.scope == other.scope && ty.extension == other.extension {
                return Err(PackError::Registry(format!(
                    "{} and {} share scope and extension",
                    ty.name, other.name
                )));
            }
        }
    }

    let mut candidates = origin.candidates()?;
    candidates.sort();

    let mut result = Vec::new();
    let mut name: Option<String> = None;
    let mut namespace = Namespace::new();

    for filename in &candidates {
        let mut parts = preparts.clone();
        parts.extend(filename.split('/').filter(|part| !part.is_empty()));

        if parts.len() < 3 || parts[0] != directory {
            continue;
        }

        let namespace_dir = parts[1];
        let basename = parts[parts.len() - 1];
        let scope = &parts[2 .. parts.len() - 1];

        if name.as_deref() != Some(namespace_dir) {
            let finished = mem::take(&mut namespace);
            if let Some(finished_name) = name.replace(namespace_dir.to_owned()) {
                if !finished.is_empty() {
                    result.push((finished_name, finished));
                }
            }
        }

        let extensions = list_extensions(basename);

        let extra_path = if scope.is_empty() {
            basename.to_owned()
        } else {
            format!("{}/{}", scope.join("/"), basename)
        };

        if let Some(ty) = extra_info.get(&extra_path) {
            let file = ty.load(origin, filename)?;
            namespace.extra.insert(extra_path, file);
            continue;
        }

        let mut scope = scope.to_vec();
        let mut file_dir: Vec<&str> = Vec::new();
        let mut matched = false;

        'strip: while !scope.is_empty() {
            for extension in &extensions {
                let found = types.iter().find(|ty| {
                    ty.extension == *extension
                        && ty.scope.len() == scope.len()
                        && ty.scope.iter().zip(&scope).all(|(a, b)| a == b)
                });

                if let Some(&ty) = found {
                    let stem = &basename[.. basename.len() - extension.len()];
                    let key = if file_dir.is_empty() {
                        stem.to_owned()
                    } else {
                        format!("{}/{}", file_dir.join("/"), stem)
                    };

                    let file = ty.load(origin, filename)?;
                    namespace.container_mut(ty).insert(key, file);
                    matched = true;
                    break 'strip;
                }
            }

            if let Some(last) = scope.pop() {
                file_dir.insert(0, last);
            }
        }

        if !matched {
            trace!("dropping unrecognized file {:?}", filename);
        }
    }

    if let Some(final_name) = name {
        if !namespace.is_empty() {
            result.push((final_name, namespace));
        }
    }

    Ok(result)
}

#[test]
fn extension_candidates_are_longest_first() {
    assert_eq!(
        list_extensions("stone.png.mcmeta"),
        vec![".png.mcmeta", ".mcmeta"]
    );
    assert_eq!(list_extensions("sounds.json"), vec![".json"]);
    assert_eq!(list_extensions(".nomedia"), Vec::<&str>::new());
}

#[cfg(test)]
fn write_tree(root: &std::path::Path, files: &[(&str, &str)]) {
    for (path, content) in files {
        let target = root.join(path);
        std::fs::create_dir_all(target.parent().unwrap()).unwrap();
        std::fs::write(target, content).unwrap();
    }
}

#[test]
fn scan_classifies_longest_extension() {
    use crate::assets::{ResourceLayout, TEXTURE, TEXTURE_MCMETA};
    use crate::pack::PackLayout;

    let dir = tempfile::tempdir().unwrap();
    write_tree(
        dir.path(),
        &[
            ("assets/mc/textures/block/stone.png", "png"),
            ("assets/mc/textures/block/stone.png.mcmeta", "{}"),
        ],
    );

    let mut origin = Origin::Path(dir.path().to_path_buf());
    let namespaces = scan(
        "assets",
        "",
        &mut origin,
        ResourceLayout::file_types(),
        &ResourceLayout::namespace_extra_info(),
    )
    .unwrap();

    assert_eq!(namespaces.len(), 1);
    let (name, namespace) = &namespaces[0];
    assert_eq!(name, "mc");
    assert!(namespace.get(&TEXTURE, "block/stone").is_some());
    assert!(namespace.get(&TEXTURE_MCMETA, "block/stone").is_some());
}

#[test]
fn scan_matches_deepest_scope_first() {
    use crate::assets::{ResourceLayout, SHADER, SHADER_POST};
    use crate::pack::PackLayout;

    let dir = tempfile::tempdir().unwrap();
    write_tree(
        dir.path(),
        &[
            ("assets/mc/shaders/post/blur.json", "{}"),
            ("assets/mc/shaders/core/position.json", "{}"),
        ],
    );

    let mut origin = Origin::Path(dir.path().to_path_buf());
    let namespaces = scan(
        "assets",
        "",
        &mut origin,
        ResourceLayout::file_types(),
        &ResourceLayout::namespace_extra_info(),
    )
    .unwrap();

    let (_, namespace) = &namespaces[0];
    assert!(namespace.get(&SHADER_POST, "blur").is_some());
    assert!(namespace.get(&SHADER, "core/position").is_some());
}

#[test]
fn scan_routes_namespace_extras() {
    use crate::assets::{ResourceLayout, SOUND};
    use crate::pack::PackLayout;

    let dir = tempfile::tempdir().unwrap();
    write_tree(
        dir.path(),
        &[
            ("assets/mc/sounds.json", r#"{"block.note": {"sounds": []}}"#),
            ("assets/mc/sounds/note/harp.ogg", "ogg"),
        ],
    );

    let mut origin = Origin::Path(dir.path().to_path_buf());
    let namespaces = scan(
        "assets",
        "",
        &mut origin,
        ResourceLayout::file_types(),
        &ResourceLayout::namespace_extra_info(),
    )
    .unwrap();

    let (_, namespace) = &namespaces[0];
    assert!(namespace.extra.get("sounds.json").is_some());
    assert!(namespace.get(&SOUND, "note/harp").is_some());
}

#[test]
fn scan_ignores_foreign_directories() {
    use crate::assets::ResourceLayout;
    use crate::pack::PackLayout;

    let dir = tempfile::tempdir().unwrap();
    write_tree(dir.path(), &[("data/mc/models/item/stick.json", "{}")]);

    let mut origin = Origin::Path(dir.path().to_path_buf());
    let namespaces = scan(
        "assets",
        "",
        &mut origin,
        ResourceLayout::file_types(),
        &ResourceLayout::namespace_extra_info(),
    )
    .unwrap();

    assert!(namespaces.is_empty());
}
