//! The recognized resource pack asset types and their merge rules.

use indexmap::IndexMap;
use serde_json::{json, Map, Value};

use crate::{
    container::NamespaceContainer,
    file::{BindMeta, FileData, FileFormat, FileType, Merged, PackFile},
    namespace::Namespace,
    pack::{Pack, PackLayout},
};

/// The game version the latest pack format is derived from.
pub const LATEST_GAME_VERSION: (u8, u8) = (1, 19);

/// Gets the resource pack format for the given game version.
///
/// Returns 0 for versions that predate resource pack formats. Versions newer
/// than the registry map to the latest known format.
pub const fn resource_pack_version(major: u8, minor: u8) -> u8 {
    match (major, minor) {
        (0, _) | (1, 0 ..= 5) => 0,
        (1, 6 ..= 8) => 1,
        (1, 9 | 10) => 2,
        (1, 11 | 12) => 3,
        (1, 13 | 14) => 4,
        (1, 15) => 5,
        (1, 16) => 6,
        (1, 17) => 7,
        (1, 18) => 8,
        _ => 9,
    }
}

/// The latest pack format this library knows about.
pub const LATEST_PACK_FORMAT: u8 = resource_pack_version(LATEST_GAME_VERSION.0, LATEST_GAME_VERSION.1);

fn empty_object() -> FileData {
    FileData::Json(json!({}))
}

fn empty_sources() -> FileData {
    FileData::Json(json!({ "sources": [] }))
}

// Pack-level and namespace-level extras. Their scope never enters the
// scope/extension registry; they are matched by exact filename.

pub static MCMETA: FileType = FileType {
    name: "pack_mcmeta",
    scope: &[],
    extension: ".mcmeta",
    format: FileFormat::Json,
    merge: Some(merge_mcmeta),
    default: Some(empty_object),
    bind: None,
};

pub static PACK_ICON: FileType = FileType {
    name: "pack_icon",
    scope: &[],
    extension: ".png",
    format: FileFormat::Binary,
    merge: None,
    default: None,
    bind: None,
};

pub static SOUND_CONFIG: FileType = FileType {
    name: "sound_config",
    scope: &[],
    extension: ".json",
    format: FileFormat::Json,
    merge: Some(merge_sound_config),
    default: Some(empty_object),
    bind: None,
};

pub static BLOCKSTATE: FileType = FileType {
    name: "blockstates",
    scope: &["blockstates"],
    extension: ".json",
    format: FileFormat::Json,
    merge: None,
    default: None,
    bind: None,
};

pub static MODEL: FileType = FileType {
    name: "models",
    scope: &["models"],
    extension: ".json",
    format: FileFormat::Json,
    merge: Some(merge_model),
    default: None,
    bind: None,
};

pub static LANGUAGE: FileType = FileType {
    name: "languages",
    scope: &["lang"],
    extension: ".json",
    format: FileFormat::Json,
    merge: Some(merge_language),
    default: Some(empty_object),
    bind: None,
};

pub static FONT: FileType = FileType {
    name: "fonts",
    scope: &["font"],
    extension: ".json",
    format: FileFormat::Json,
    merge: Some(merge_font),
    default: None,
    bind: None,
};

pub static GLYPH_SIZES: FileType = FileType {
    name: "glyph_sizes",
    scope: &["font"],
    extension: ".bin",
    format: FileFormat::Binary,
    merge: None,
    default: None,
    bind: None,
};

pub static TRUE_TYPE_FONT: FileType = FileType {
    name: "true_type_fonts",
    scope: &["font"],
    extension: ".ttf",
    format: FileFormat::Binary,
    merge: None,
    default: None,
    bind: None,
};

pub static SHADER_POST: FileType = FileType {
    name: "shader_posts",
    scope: &["shaders", "post"],
    extension: ".json",
    format: FileFormat::Json,
    merge: None,
    default: None,
    bind: None,
};

pub static SHADER: FileType = FileType {
    name: "shaders",
    scope: &["shaders"],
    extension: ".json",
    format: FileFormat::Json,
    merge: None,
    default: None,
    bind: None,
};

pub static FRAGMENT_SHADER: FileType = FileType {
    name: "fragment_shaders",
    scope: &["shaders"],
    extension: ".fsh",
    format: FileFormat::Text,
    merge: None,
    default: None,
    bind: None,
};

pub static VERTEX_SHADER: FileType = FileType {
    name: "vertex_shaders",
    scope: &["shaders"],
    extension: ".vsh",
    format: FileFormat::Text,
    merge: None,
    default: None,
    bind: None,
};

pub static GLSL_SHADER: FileType = FileType {
    name: "glsl_shaders",
    scope: &["shaders"],
    extension: ".glsl",
    format: FileFormat::Text,
    merge: None,
    default: None,
    bind: None,
};

pub static TEXT: FileType = FileType {
    name: "texts",
    scope: &["texts"],
    extension: ".txt",
    format: FileFormat::Text,
    merge: None,
    default: None,
    bind: None,
};

pub static TEXTURE_MCMETA: FileType = FileType {
    name: "textures_mcmeta",
    scope: &["textures"],
    extension: ".png.mcmeta",
    format: FileFormat::Json,
    merge: None,
    default: None,
    bind: None,
};

pub static TEXTURE: FileType = FileType {
    name: "textures",
    scope: &["textures"],
    extension: ".png",
    format: FileFormat::Binary,
    merge: None,
    default: None,
    bind: Some(bind_texture),
};

pub static SOUND: FileType = FileType {
    name: "sounds",
    scope: &["sounds"],
    extension: ".ogg",
    format: FileFormat::Binary,
    merge: None,
    default: None,
    bind: Some(bind_sound),
};

pub static PARTICLE: FileType = FileType {
    name: "particles",
    scope: &["particles"],
    extension: ".json",
    format: FileFormat::Json,
    merge: None,
    default: None,
    bind: None,
};

pub static ATLAS: FileType = FileType {
    name: "atlases",
    scope: &["atlases"],
    extension: ".json",
    format: FileFormat::Json,
    merge: Some(merge_atlas),
    default: Some(empty_sources),
    bind: None,
};

/// Every file type recognized beneath a resource pack namespace.
pub static RESOURCE_FILE_TYPES: &[&FileType] = &[
    &BLOCKSTATE,
    &MODEL,
    &LANGUAGE,
    &FONT,
    &GLYPH_SIZES,
    &TRUE_TYPE_FONT,
    &SHADER_POST,
    &SHADER,
    &FRAGMENT_SHADER,
    &VERTEX_SHADER,
    &GLSL_SHADER,
    &TEXT,
    &TEXTURE_MCMETA,
    &TEXTURE,
    &SOUND,
    &PARTICLE,
    &ATLAS,
];

/// Layout of a vanilla resource pack.
#[derive(Clone, Copy, Debug, Default)]
pub struct ResourceLayout;

impl PackLayout for ResourceLayout {
    const DIRECTORY: &'static str = "assets";
    const DEFAULT_NAME: &'static str = "untitled_resource_pack";
    const LATEST_PACK_FORMAT: i64 = LATEST_PACK_FORMAT as i64;

    fn file_types() -> &'static [&'static FileType] {
        RESOURCE_FILE_TYPES
    }

    fn pack_extra_info() -> IndexMap<String, &'static FileType> {
        let mut info = IndexMap::new();
        info.insert("pack.mcmeta".to_owned(), &MCMETA);
        info.insert("pack.png".to_owned(), &PACK_ICON);
        info
    }

    fn namespace_extra_info() -> IndexMap<String, &'static FileType> {
        let mut info = IndexMap::new();
        info.insert("sounds.json".to_owned(), &SOUND_CONFIG);
        info
    }
}

/// A pack following the vanilla resource pack layout.
pub type ResourcePack = Pack<ResourceLayout>;

fn object_mut(data: &mut FileData) -> Option<&mut Map<String, Value>> {
    data.as_json_mut().and_then(Value::as_object_mut)
}

fn object(data: &FileData) -> Option<&Map<String, Value>> {
    data.as_json().and_then(Value::as_object)
}

/// pack.mcmeta: `filter.block` entries concatenate, skipping structural
/// duplicates; every other key is overwritten by the incoming file.
fn merge_mcmeta(current: &mut FileData, incoming: &FileData) -> Merged {
    let (Some(ours), Some(theirs)) = (object_mut(current), object(incoming)) else {
        return Merged::Overwrite;
    };

    for (key, value) in theirs {
        if key == "filter" {
            let filter = ours.entry("filter").or_insert_with(|| json!({}));
            if !filter.is_object() {
                *filter = json!({});
            }
            let block = filter["block"].as_array().is_some();
            if !block {
                filter["block"] = json!([]);
            }
            let Some(blocks) = filter["block"].as_array_mut() else {
                continue;
            };

            for item in value.get("block").and_then(Value::as_array).into_iter().flatten() {
                if !blocks.contains(item) {
                    blocks.push(item.clone());
                }
            }
        } else {
            ours.insert(key.clone(), value.clone());
        }
    }

    Merged::Kept
}

/// Model: the incoming file replaces everything, but `overrides` are
/// unioned by matching predicate; matching entries take the incoming model,
/// non-matching incoming entries append.
fn merge_model(current: &mut FileData, incoming: &FileData) -> Merged {
    let (Some(ours), Some(theirs)) = (current.as_json(), incoming.as_json()) else {
        return Merged::Overwrite;
    };

    let original: Vec<Value> = ours
        .get("overrides")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let mut merged = original.clone();

    for incoming_override in theirs
        .get("overrides")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
    {
        let predicate = incoming_override.get("predicate");
        let position = original
            .iter()
            .position(|entry| entry.get("predicate") == predicate);

        match position {
            Some(index) => {
                if let (Some(entry), Some(model)) =
                    (merged[index].as_object_mut(), incoming_override.get("model"))
                {
                    entry.insert("model".to_owned(), model.clone());
                }
            }
            None => merged.push(incoming_override.clone()),
        }
    }

    let mut replacement = theirs.clone();
    if !merged.is_empty() {
        if let Some(object) = replacement.as_object_mut() {
            object.insert("overrides".to_owned(), Value::Array(merged));
        }
    }

    *current = FileData::Json(replacement);
    Merged::Kept
}

/// Language: key-wise update, incoming entries win.
fn merge_language(current: &mut FileData, incoming: &FileData) -> Merged {
    let (Some(ours), Some(theirs)) = (object_mut(current), object(incoming)) else {
        return Merged::Overwrite;
    };

    for (key, value) in theirs {
        ours.insert(key.clone(), value.clone());
    }

    Merged::Kept
}

/// Font: all incoming `providers` append, duplicates allowed.
fn merge_font(current: &mut FileData, incoming: &FileData) -> Merged {
    let (Some(ours), Some(theirs)) = (object_mut(current), object(incoming)) else {
        return Merged::Overwrite;
    };

    let providers = ours.entry("providers").or_insert_with(|| json!([]));
    if !providers.is_array() {
        *providers = json!([]);
    }
    let Some(providers) = providers.as_array_mut() else {
        return Merged::Kept;
    };

    for provider in theirs
        .get("providers")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
    {
        providers.push(provider.clone());
    }

    Merged::Kept
}

/// Atlas: incoming `sources` append, skipping structural duplicates.
fn merge_atlas(current: &mut FileData, incoming: &FileData) -> Merged {
    let (Some(ours), Some(theirs)) = (object_mut(current), object(incoming)) else {
        return Merged::Overwrite;
    };

    let sources = ours.entry("sources").or_insert_with(|| json!([]));
    if !sources.is_array() {
        *sources = json!([]);
    }
    let Some(sources) = sources.as_array_mut() else {
        return Merged::Kept;
    };

    for source in theirs
        .get("sources")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
    {
        if !sources.contains(source) {
            sources.push(source.clone());
        }
    }

    Merged::Kept
}

/// sounds.json: events with an incoming `replace` flag are overwritten
/// wholesale; otherwise `sounds` entries union by structural equality and a
/// non-empty incoming `subtitle` wins.
fn merge_sound_config(current: &mut FileData, incoming: &FileData) -> Merged {
    let (Some(ours), Some(theirs)) = (object_mut(current), object(incoming)) else {
        return Merged::Overwrite;
    };

    for (event_name, incoming_event) in theirs {
        if incoming_event
            .get("replace")
            .and_then(Value::as_bool)
            .unwrap_or(false)
        {
            ours.insert(event_name.clone(), incoming_event.clone());
            continue;
        }

        let event = ours.entry(event_name.clone()).or_insert_with(|| json!({}));
        if !event.is_object() {
            *event = json!({});
        }

        let subtitle = incoming_event.get("subtitle");
        if let Some(subtitle) = subtitle {
            let empty = subtitle.as_str().map(str::is_empty).unwrap_or(subtitle.is_null());
            if !empty {
                event["subtitle"] = subtitle.clone();
            }
        }

        if event.get("sounds").and_then(Value::as_array).is_none() {
            event["sounds"] = json!([]);
        }
        let Some(sounds) = event["sounds"].as_array_mut() else {
            continue;
        };

        for sound in incoming_event
            .get("sounds")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
        {
            if !sounds.contains(sound) {
                sounds.push(sound.clone());
            }
        }
    }

    Merged::Kept
}

/// Installs the attached animation metadata as a sibling `.png.mcmeta`.
fn bind_texture(key: &str, meta: &BindMeta, namespace: &mut Namespace) {
    if let BindMeta::TextureMeta(data) = meta {
        namespace
            .container_mut(&TEXTURE_MCMETA)
            .insert(key, PackFile::json(&TEXTURE_MCMETA, data.clone()));
    }
}

/// Registers the sound under its event in the namespace's `sounds.json`.
fn bind_sound(key: &str, meta: &BindMeta, namespace: &mut Namespace) {
    let BindMeta::SoundEvent(sound) = meta else {
        return;
    };

    let attributes = match serde_json::to_value(sound) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    };

    let entry = if attributes.is_empty() {
        json!(key)
    } else {
        let mut object = Map::new();
        object.insert("name".to_owned(), json!(key));
        object.extend(attributes);
        Value::Object(object)
    };

    let mut event = json!({ "sounds": [entry] });
    if let Some(replace) = sound.replace {
        event["replace"] = json!(replace);
    }
    if let Some(subtitle) = &sound.subtitle {
        event["subtitle"] = json!(subtitle);
    }

    let config = json!({ sound.event.clone(): event });

    match namespace.extra.get_mut("sounds.json") {
        Some(existing) => {
            if let Some(data) = existing.content_or_default_mut() {
                merge_sound_config(data, &FileData::Json(config));
            }
        }
        None => {
            namespace
                .extra
                .insert("sounds.json", PackFile::json(&SOUND_CONFIG, config));
        }
    }
}

/// Appends the sources of another atlas, skipping duplicates.
pub fn atlas_append(atlas: &mut PackFile, other: &PackFile) {
    if let (Some(data), Some(incoming)) = (atlas.content_or_default_mut(), other.content()) {
        merge_atlas(data, incoming);
    }
}

/// Prepends the sources of another atlas, skipping duplicates.
pub fn atlas_prepend(atlas: &mut PackFile, other: &PackFile) {
    let incoming: Vec<Value> = other
        .content()
        .and_then(FileData::as_json)
        .and_then(|value| value.get("sources"))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let Some(ours) = atlas.content_or_default_mut().and_then(object_mut) else {
        return;
    };
    let sources = ours.entry("sources").or_insert_with(|| json!([]));
    let Some(sources) = sources.as_array_mut() else {
        return;
    };

    let filtered: Vec<Value> = incoming
        .into_iter()
        .filter(|value| !sources.contains(value))
        .collect();

    for (offset, value) in filtered.into_iter().enumerate() {
        sources.insert(offset, value);
    }
}

/// Adds a single atlas source entry unless an equal one is present.
pub fn atlas_add(atlas: &mut PackFile, value: Value) {
    if let Some(data) = atlas.content_or_default_mut() {
        merge_atlas(
            data,
            &FileData::Json(json!({ "sources": [value] })),
        );
    }
}

/// Removes the atlas source entries structurally equal to the value.
pub fn atlas_remove(atlas: &mut PackFile, value: &Value) {
    let sources = atlas
        .content_or_default_mut()
        .and_then(object_mut)
        .and_then(|object| object.get_mut("sources"))
        .and_then(Value::as_array_mut);

    if let Some(sources) = sources {
        sources.retain(|entry| entry != value);
    }
}

macro_rules! namespace_accessors {
    ($($container:ident, $container_mut:ident => $ty:expr;)*) => {
        /// Statically declared accessors into the per-type container table.
        impl Namespace {
            $(
                pub fn $container(&self) -> Option<&NamespaceContainer> {
                    self.container(&$ty)
                }

                pub fn $container_mut(&mut self) -> &mut NamespaceContainer {
                    self.container_mut(&$ty)
                }
            )*
        }
    };
}

namespace_accessors! {
    blockstates, blockstates_mut => BLOCKSTATE;
    models, models_mut => MODEL;
    languages, languages_mut => LANGUAGE;
    fonts, fonts_mut => FONT;
    glyph_sizes, glyph_sizes_mut => GLYPH_SIZES;
    true_type_fonts, true_type_fonts_mut => TRUE_TYPE_FONT;
    shader_posts, shader_posts_mut => SHADER_POST;
    shaders, shaders_mut => SHADER;
    fragment_shaders, fragment_shaders_mut => FRAGMENT_SHADER;
    vertex_shaders, vertex_shaders_mut => VERTEX_SHADER;
    glsl_shaders, glsl_shaders_mut => GLSL_SHADER;
    texts, texts_mut => TEXT;
    textures_mcmeta, textures_mcmeta_mut => TEXTURE_MCMETA;
    textures, textures_mut => TEXTURE;
    sounds, sounds_mut => SOUND;
    particles, particles_mut => PARTICLE;
    atlases, atlases_mut => ATLAS;
}

impl Pack<ResourceLayout> {
    /// The `language` section of pack.mcmeta, created on first access.
    pub fn language_config_mut(&mut self) -> &mut Value {
        let data = self.mcmeta_section_mut("language");
        if !data.is_object() {
            *data = json!({});
        }
        data
    }
}

#[test]
fn model_overrides_union_by_predicate() {
    let mut current = FileData::Json(json!({
        "parent": "a",
        "overrides": [{ "predicate": { "a": 1 }, "model": "m1" }],
    }));
    let incoming = FileData::Json(json!({
        "parent": "b",
        "overrides": [
            { "predicate": { "a": 1 }, "model": "m2" },
            { "predicate": { "a": 2 }, "model": "m3" },
        ],
    }));

    assert_eq!(merge_model(&mut current, &incoming), Merged::Kept);

    let data = current.as_json().unwrap();
    assert_eq!(data["parent"], "b");
    assert_eq!(
        data["overrides"],
        json!([
            { "predicate": { "a": 1 }, "model": "m2" },
            { "predicate": { "a": 2 }, "model": "m3" },
        ])
    );
}

#[test]
fn sound_config_unions_sounds_and_takes_subtitle() {
    let mut current = FileData::Json(json!({
        "foo": { "replace": false, "sounds": ["a"] },
    }));
    let incoming = FileData::Json(json!({
        "foo": { "sounds": ["a", "b"], "subtitle": "s" },
    }));

    assert_eq!(merge_sound_config(&mut current, &incoming), Merged::Kept);

    let data = current.as_json().unwrap();
    assert_eq!(data["foo"]["sounds"], json!(["a", "b"]));
    assert_eq!(data["foo"]["subtitle"], "s");
}

#[test]
fn sound_config_replace_overwrites_event() {
    let mut current = FileData::Json(json!({
        "foo": { "sounds": ["a"], "subtitle": "old" },
    }));
    let incoming = FileData::Json(json!({
        "foo": { "replace": true, "sounds": ["b"] },
    }));

    merge_sound_config(&mut current, &incoming);

    assert_eq!(
        current.as_json().unwrap()["foo"],
        json!({ "replace": true, "sounds": ["b"] })
    );
}

#[test]
fn mcmeta_filter_blocks_concatenate_without_duplicates() {
    let mut current = FileData::Json(json!({
        "pack": { "pack_format": 8, "description": "x" },
        "filter": { "block": [{ "namespace": "a" }] },
    }));
    let incoming = FileData::Json(json!({
        "pack": { "pack_format": 9, "description": "y" },
        "filter": { "block": [{ "namespace": "a" }, { "namespace": "b" }] },
    }));

    assert_eq!(merge_mcmeta(&mut current, &incoming), Merged::Kept);

    let data = current.as_json().unwrap();
    assert_eq!(data["pack"]["pack_format"], 9);
    assert_eq!(
        data["filter"]["block"],
        json!([{ "namespace": "a" }, { "namespace": "b" }])
    );
}

#[test]
fn language_entries_update() {
    let mut current = FileData::Json(json!({ "k1": "a", "k2": "b" }));
    let incoming = FileData::Json(json!({ "k2": "c", "k3": "d" }));

    merge_language(&mut current, &incoming);

    assert_eq!(
        current.as_json().unwrap(),
        &json!({ "k1": "a", "k2": "c", "k3": "d" })
    );
}

#[test]
fn font_providers_append_with_duplicates() {
    let mut current = FileData::Json(json!({ "providers": [{ "type": "bitmap" }] }));
    let incoming = FileData::Json(json!({ "providers": [{ "type": "bitmap" }] }));

    merge_font(&mut current, &incoming);

    assert_eq!(
        current.as_json().unwrap()["providers"]
            .as_array()
            .unwrap()
            .len(),
        2
    );
}

#[test]
fn atlas_sources_skip_structural_duplicates() {
    let mut current = FileData::Json(json!({ "sources": [{ "source": "a" }] }));
    let incoming = FileData::Json(json!({
        "sources": [{ "source": "a" }, { "source": "b" }],
    }));

    merge_atlas(&mut current, &incoming);

    assert_eq!(
        current.as_json().unwrap()["sources"],
        json!([{ "source": "a" }, { "source": "b" }])
    );
}

#[test]
fn registry_covers_known_versions() {
    assert_eq!(resource_pack_version(1, 12), 3);
    assert_eq!(resource_pack_version(1, 19), 9);
    assert_eq!(resource_pack_version(1, 5), 0);
    assert_eq!(LATEST_PACK_FORMAT, 9);
}

#[test]
fn texture_bind_installs_sibling_mcmeta() {
    let mut namespace = Namespace::new();
    let texture = PackFile::binary(&TEXTURE, vec![0])
        .with_meta(BindMeta::TextureMeta(json!({ "animation": {} })));

    let meta = texture.bind_meta().clone();
    namespace.insert("block/lava", texture);
    bind_texture("block/lava", &meta, &mut namespace);

    let installed = namespace.get(&TEXTURE_MCMETA, "block/lava").unwrap();
    assert_eq!(
        installed.content().unwrap().as_json(),
        Some(&json!({ "animation": {} }))
    );
}

#[test]
fn sound_bind_registers_event() {
    use crate::file::SoundEvent;

    let mut namespace = Namespace::new();
    let meta = BindMeta::SoundEvent(SoundEvent {
        event: "block.note".to_owned(),
        subtitle: Some("plink".to_owned()),
        volume: Some(0.5),
        ..Default::default()
    });

    bind_sound("note/harp", &meta, &mut namespace);

    let config = namespace.extra.get("sounds.json").unwrap();
    assert_eq!(
        config.content().unwrap().as_json(),
        Some(&json!({
            "block.note": { "sounds": [{ "name": "note/harp", "volume": 0.5 }], "subtitle": "plink" },
        }))
    );
}
