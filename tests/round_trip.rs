use std::{fs, path::Path};

use serde_json::json;

use respack::{
    assets::{LANGUAGE, MODEL, TEXT, TEXTURE},
    BindMeta, Compression, PackError, PackFile, ResourcePack, SaveOptions, SoundEvent,
    UnveilMapping,
};

fn write_tree(root: &Path, files: &[(&str, &str)]) {
    for (path, content) in files {
        let target = root.join(path);
        fs::create_dir_all(target.parent().unwrap()).unwrap();
        fs::write(target, content).unwrap();
    }
}

fn sample_pack() -> ResourcePack {
    let mut pack = ResourcePack::new();
    pack.name = Some("sample".to_owned());
    pack.set_description("a sample pack");
    pack.insert(
        "minecraft:item/stick",
        PackFile::json(&MODEL, json!({ "parent": "item/generated" })),
    );
    pack.insert(
        "minecraft:en_us",
        PackFile::json(&LANGUAGE, json!({ "menu.singleplayer": "Singleplayer" })),
    );
    pack.insert(
        "minecraft:block/dirt",
        PackFile::binary(&TEXTURE, vec![0x89, 0x50, 0x4e, 0x47]),
    );
    pack.insert("custom:credits", PackFile::text(&TEXT, "made by nobody\n"));
    pack
}

#[test]
fn load_directory_pack() {
    let dir = tempfile::tempdir().unwrap();
    write_tree(
        dir.path(),
        &[
            (
                "pack.mcmeta",
                r#"{"pack": {"pack_format": 9, "description": "x"}}"#,
            ),
            (
                "assets/minecraft/models/item/stick.json",
                r#"{"parent": "item/generated"}"#,
            ),
        ],
    );

    let pack = ResourcePack::load(dir.path()).unwrap();

    assert_eq!(pack.pack_format(), 9);
    let model = pack.get(&MODEL, "minecraft:item/stick").unwrap();
    assert_eq!(
        model.content().unwrap().as_json(),
        Some(&json!({ "parent": "item/generated" }))
    );
}

#[test]
fn directory_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let mut pack = sample_pack();

    let output = pack.save(SaveOptions::directory(dir.path())).unwrap();
    assert_eq!(output, dir.path().join("sample"));
    assert!(output.join("pack.mcmeta").is_file());

    let reloaded = ResourcePack::load(&output).unwrap();
    assert_eq!(reloaded, pack);
}

#[test]
fn archive_round_trip_deflate() {
    let dir = tempfile::tempdir().unwrap();
    let mut pack = sample_pack();

    let output = pack
        .save(
            SaveOptions::directory(dir.path())
                .zipped(true)
                .compression(Compression::Deflate)
                .compression_level(6),
        )
        .unwrap();
    assert_eq!(output, dir.path().join("sample.zip"));

    let reloaded = ResourcePack::load(&output).unwrap();
    assert_eq!(reloaded, pack);
}

#[test]
fn archive_round_trip_stored() {
    let dir = tempfile::tempdir().unwrap();
    let mut pack = sample_pack();

    let output = pack
        .save(
            SaveOptions::directory(dir.path())
                .zipped(true)
                .compression(Compression::None),
        )
        .unwrap();

    let reloaded = ResourcePack::load(&output).unwrap();
    assert_eq!(reloaded, pack);
}

#[test]
fn archive_round_trip_bzip2() {
    let dir = tempfile::tempdir().unwrap();
    let mut pack = sample_pack();

    let output = pack
        .save(
            SaveOptions::directory(dir.path())
                .zipped(true)
                .compression(Compression::Bzip2),
        )
        .unwrap();

    let reloaded = ResourcePack::load(&output).unwrap();
    assert_eq!(reloaded, pack);
}

#[test]
fn save_refuses_to_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("sample"), "in the way").unwrap();

    let mut pack = sample_pack();

    let error = pack.save(SaveOptions::directory(dir.path())).unwrap_err();
    assert!(matches!(error, PackError::Overwrite(_)));

    let output = pack
        .save(SaveOptions::directory(dir.path()).overwrite(true))
        .unwrap();
    assert!(output.is_dir());
}

#[test]
fn save_picks_unused_default_name() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("untitled_resource_pack")).unwrap();

    let mut pack = ResourcePack::new();
    pack.insert("minecraft:item/stick", PackFile::json(&MODEL, json!({})));

    let output = pack.save(SaveOptions::directory(dir.path())).unwrap();
    assert_eq!(output, dir.path().join("untitled_resource_pack1"));
}

#[test]
fn merged_packs_combine_languages() {
    let mut base = sample_pack();

    let mut overlay = ResourcePack::new();
    overlay.insert(
        "minecraft:en_us",
        PackFile::json(&LANGUAGE, json!({ "menu.quit": "Quit" })),
    );

    base.merge(overlay).unwrap();

    let language = base.get(&LANGUAGE, "minecraft:en_us").unwrap();
    assert_eq!(
        language.content().unwrap().as_json(),
        Some(&json!({
            "menu.singleplayer": "Singleplayer",
            "menu.quit": "Quit",
        }))
    );
}

#[test]
fn unveil_mapping_mounts_rerooted_files() {
    let dir = tempfile::tempdir().unwrap();
    write_tree(
        dir.path(),
        &[("en_us.json", r#"{"menu.quit": "Quit"}"#)],
    );

    let mapping = UnveilMapping::new([(
        "assets/minecraft/lang/en_us.json".to_owned(),
        dir.path().join("en_us.json"),
    )]);

    let mut pack = ResourcePack::new();
    pack.unveil("assets", mapping).unwrap();

    let language = pack.get(&LANGUAGE, "minecraft:en_us").unwrap();
    assert_eq!(
        language.content().unwrap().as_json(),
        Some(&json!({ "menu.quit": "Quit" }))
    );
}

#[test]
fn sound_event_lands_in_sounds_json() {
    let mut pack = ResourcePack::new();
    let sound = PackFile::binary(&respack::assets::SOUND, vec![1, 2, 3]).with_meta(
        BindMeta::SoundEvent(SoundEvent {
            event: "block.note".to_owned(),
            subtitle: Some("plink".to_owned()),
            ..Default::default()
        }),
    );

    pack.insert("minecraft:note/harp", sound);

    let files = pack.list_files(&[]);
    let sounds_json = files
        .iter()
        .find(|(path, _)| path == "assets/minecraft/sounds.json");
    assert!(sounds_json.is_some());

    let (_, config) = sounds_json.unwrap();
    let data = config.content().unwrap().as_json().unwrap();
    assert_eq!(data["block.note"]["subtitle"], "plink");
    assert_eq!(data["block.note"]["sounds"], json!(["note/harp"]));
}

#[test]
fn loaded_files_remember_their_source() {
    let dir = tempfile::tempdir().unwrap();
    write_tree(
        dir.path(),
        &[
            ("pack.mcmeta", r#"{"pack": {"pack_format": 9}}"#),
            ("assets/mc/texts/credits.txt", "hello"),
        ],
    );

    let mut pack = ResourcePack::load(dir.path()).unwrap();
    let credits = pack.get_mut(&TEXT, "mc:credits").unwrap();

    assert_eq!(
        credits.ensure_source_path().unwrap(),
        dir.path().join("assets/mc/texts/credits.txt")
    );
}

#[test]
fn in_memory_files_resolve_to_a_scratch_path() {
    let mut pack = sample_pack();
    let credits = pack.get_mut(&TEXT, "custom:credits").unwrap();

    let path = credits.ensure_source_path().unwrap().to_path_buf();
    assert_eq!(fs::read_to_string(path).unwrap(), "made by nobody\n");
}

#[test]
fn malformed_json_surfaces_format_error() {
    let dir = tempfile::tempdir().unwrap();
    write_tree(
        dir.path(),
        &[
            ("pack.mcmeta", r#"{"pack": {"pack_format": 9}}"#),
            ("assets/mc/models/item/broken.json", "{ not json"),
        ],
    );

    let error = ResourcePack::load(dir.path()).unwrap_err();
    assert!(matches!(error, PackError::Format { .. }));
}
