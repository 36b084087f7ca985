//! End-to-end tests for the upload pipeline
//!
//! These drive the public registry API the way the HTTP layer does: raw
//! archive bytes in, live directories (and for the sandbox engine, world
//! configs and a supervised process) out.

use hosting_core::{
    Engine, EngineRegistry, HostingConfig, HostingError, ServerStatus, ValidationError,
};
use std::io::Write;
use std::path::{Path, PathBuf};

fn build_zip(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();
    for (name, contents) in files {
        writer.start_file(*name, options).unwrap();
        writer.write_all(contents).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Config rooted in a temp dir, with a server binary that cannot spawn so
/// sandbox tests never depend on an installed Minetest.
fn test_config(root: &Path) -> HostingConfig {
    let mut config = HostingConfig::new(root);
    config.minetest.binary = root.join("no-such-server-binary");
    config
}

#[tokio::test]
async fn html_upload_lands_directly_under_the_games_directory() {
    let dir = tempfile::tempdir().unwrap();
    let registry = EngineRegistry::new(test_config(dir.path())).await.unwrap();

    let bytes = build_zip(&[("index.html", b"<html></html>"), ("style.css", b"body{}")]);
    let outcome = registry
        .upload(Engine::Html, "pong", bytes, None)
        .await
        .unwrap();

    assert_eq!(outcome.entry_root.as_deref(), Some(""));
    let live = dir.path().join("html/games/pong");
    assert_eq!(
        std::fs::read(live.join("index.html")).unwrap(),
        b"<html></html>"
    );
    assert!(live.join("style.css").exists());
}

#[tokio::test]
async fn easy_rpg_upload_strips_the_entry_root() {
    let dir = tempfile::tempdir().unwrap();
    let registry = EngineRegistry::new(test_config(dir.path())).await.unwrap();

    let bytes = build_zip(&[
        ("data/RPG_RT.lmt", b"lmt"),
        ("data/RPG_RT.ldb", b"ldb"),
        ("data/RPG_RT.ini", b"[RPG_RT]"),
        ("data/Picture/title.png", b"png"),
    ]);
    let outcome = registry
        .upload(Engine::EasyRpg, "yume", bytes, None)
        .await
        .unwrap();

    assert_eq!(outcome.entry_root.as_deref(), Some("data/"));
    let live = dir.path().join("games/yume");
    assert!(live.join("RPG_RT.ini").exists());
    assert!(live.join("Picture/title.png").exists());
    assert!(!live.join("data").exists());
    // Scratch space is cleaned up after the swap.
    assert!(!dir.path().join("temp/yume").exists());
}

#[tokio::test]
async fn validation_reports_every_missing_marker_before_touching_disk() {
    let dir = tempfile::tempdir().unwrap();
    let registry = EngineRegistry::new(test_config(dir.path())).await.unwrap();

    let bytes = build_zip(&[("data/RPG_RT.ini", b"only one")]);
    let err = registry
        .upload(Engine::EasyRpg, "broken", bytes, None)
        .await
        .unwrap_err();

    assert!(err.is_client_error());
    match err {
        HostingError::Validation(ValidationError::MissingMarkers(missing)) => {
            assert_eq!(missing, vec!["RPG_RT.lmt", "RPG_RT.ldb"]);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!dir.path().join("games/broken").exists());
    assert!(!dir.path().join("temp/broken").exists());
}

#[tokio::test]
async fn resource_fork_only_markers_fail_validation() {
    let dir = tempfile::tempdir().unwrap();
    let registry = EngineRegistry::new(test_config(dir.path())).await.unwrap();

    let bytes = build_zip(&[("__MACOSX/index.html", b"fake"), ("readme.txt", b"hi")]);
    let err = registry
        .upload(Engine::Html, "mac", bytes, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        HostingError::Validation(ValidationError::MissingMarkers(_))
    ));
}

#[tokio::test]
async fn repeated_uploads_replace_the_live_directory() {
    let dir = tempfile::tempdir().unwrap();
    let registry = EngineRegistry::new(test_config(dir.path())).await.unwrap();

    let v1 = build_zip(&[("index.html", b"v1"), ("old.js", b"x")]);
    registry.upload(Engine::Html, "game", v1, None).await.unwrap();

    let v2 = build_zip(&[("index.html", b"v2")]);
    registry.upload(Engine::Html, "game", v2, None).await.unwrap();

    let live = dir.path().join("html/games/game");
    assert_eq!(std::fs::read(live.join("index.html")).unwrap(), b"v2");
    assert!(!live.join("old.js").exists());
}

#[tokio::test]
async fn downloadable_uploads_touch_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let registry = EngineRegistry::new(test_config(dir.path())).await.unwrap();

    let outcome = registry
        .upload(Engine::Downloadable, "setup-exe", b"not even a zip".to_vec(), None)
        .await
        .unwrap();

    assert_eq!(outcome.entry_root, None);
    assert!(outcome.server.is_none());
    assert!(!dir.path().join("games/setup-exe").exists());
    registry
        .delete(Engine::Downloadable, "setup-exe")
        .await
        .unwrap();
}

#[tokio::test]
async fn delete_removes_the_live_directory_idempotently() {
    let dir = tempfile::tempdir().unwrap();
    let registry = EngineRegistry::new(test_config(dir.path())).await.unwrap();

    let bytes = build_zip(&[("index.html", b"x")]);
    registry.upload(Engine::Html, "gone", bytes, None).await.unwrap();
    assert!(dir.path().join("html/games/gone").exists());

    registry.delete(Engine::Html, "gone").await.unwrap();
    assert!(!dir.path().join("html/games/gone").exists());
    registry.delete(Engine::Html, "gone").await.unwrap();
}

#[tokio::test]
async fn minetest_upload_materializes_configs_even_when_the_server_cannot_start() {
    let dir = tempfile::tempdir().unwrap();
    let registry = EngineRegistry::new(test_config(dir.path())).await.unwrap();

    let bytes = build_zip(&[
        ("world.mt", b"mod_storage = true\n"),
        ("map.sqlite", b"sqlite"),
    ]);
    let outcome = registry
        .upload(Engine::Minetest, "alice_world", bytes, None)
        .await
        .unwrap();

    // The binary is unstartable: the upload still succeeds, with the
    // failure carried as a distinguishable status.
    let port = match outcome.server {
        Some(ServerStatus::RestartFailed { port, .. }) => port,
        other => panic!("expected a restart failure status, got {other:?}"),
    };
    assert_eq!(port, 30000);

    let world_dir = dir.path().join("minetest/worlds/alice_world");
    let world_mt = std::fs::read_to_string(world_dir.join("world.mt")).unwrap();
    assert!(world_mt.contains("gameid = minetest"));
    assert!(world_mt.contains("world_name = alice_world"));
    assert!(world_mt.contains("backend = sqlite3"));
    // The key shipped in the archive survived materialization.
    assert!(world_mt.contains("mod_storage = true"));

    let port_conf = std::fs::read_to_string(
        dir.path().join("minetest/config/config.30000.conf"),
    )
    .unwrap();
    assert!(port_conf.contains("port = 30000"));
    assert!(port_conf.contains("name = w3itch"));
}

#[tokio::test]
async fn minetest_redeploys_keep_the_same_port_and_new_worlds_get_fresh_ones() {
    let dir = tempfile::tempdir().unwrap();
    let registry = EngineRegistry::new(test_config(dir.path())).await.unwrap();

    let world = |name: &str| build_zip(&[("world.mt", format!("name = {name}\n").as_bytes())]);

    let first = registry
        .upload(Engine::Minetest, "alice_world", world("alice"), None)
        .await
        .unwrap();
    let again = registry
        .upload(Engine::Minetest, "alice_world", world("alice"), None)
        .await
        .unwrap();
    let other = registry
        .upload(Engine::Minetest, "bob_world", world("bob"), None)
        .await
        .unwrap();

    let port_of = |outcome: &hosting_core::UploadOutcome| match &outcome.server {
        Some(ServerStatus::Running { port }) => *port,
        Some(ServerStatus::RestartFailed { port, .. }) => *port,
        None => panic!("sandbox outcome without server status"),
    };
    assert_eq!(port_of(&first), port_of(&again));
    assert_ne!(port_of(&first), port_of(&other));
}

#[tokio::test]
async fn nested_world_archives_resolve_their_entry_root() {
    let dir = tempfile::tempdir().unwrap();
    let registry = EngineRegistry::new(test_config(dir.path())).await.unwrap();

    let bytes = build_zip(&[
        ("my_world/world.mt", b"backend = files\n"),
        ("my_world/map_meta.txt", b"meta"),
    ]);
    let outcome = registry
        .upload(Engine::Minetest, "nested", bytes, None)
        .await
        .unwrap();

    assert_eq!(outcome.entry_root.as_deref(), Some("my_world/"));
    let world_dir = dir.path().join("minetest/worlds/nested");
    assert!(world_dir.join("map_meta.txt").exists());
    assert!(!world_dir.join("my_world").exists());
}

#[tokio::test]
async fn legacy_charset_names_extract_decoded() {
    let dir = tempfile::tempdir().unwrap();
    let registry = EngineRegistry::new(test_config(dir.path())).await.unwrap();

    // Plain ASCII names decode identically under Shift_JIS; the charset
    // path is exercised end to end without a hand-crafted legacy zip.
    let bytes = build_zip(&[("index.html", b"<html></html>")]);
    let outcome = registry
        .upload(Engine::Html, "jp-game", bytes, Some("Shift_JIS"))
        .await
        .unwrap();

    assert_eq!(outcome.entry_root.as_deref(), Some(""));
    assert!(dir
        .path()
        .join("html/games/jp-game/index.html")
        .exists());
}

#[tokio::test]
async fn unknown_charset_is_a_client_error() {
    let dir = tempfile::tempdir().unwrap();
    let registry = EngineRegistry::new(test_config(dir.path())).await.unwrap();

    let bytes = build_zip(&[("index.html", b"x")]);
    let err = registry
        .upload(Engine::Html, "bad-charset", bytes, Some("klingon"))
        .await
        .unwrap_err();
    assert!(err.is_client_error());
}

#[tokio::test]
async fn port_bindings_survive_a_registry_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());

    let registry = EngineRegistry::new(config.clone()).await.unwrap();
    let bytes = build_zip(&[("world.mt", b"")]);
    registry
        .upload(Engine::Minetest, "alice_world", bytes.clone(), None)
        .await
        .unwrap();
    drop(registry);

    let registry = EngineRegistry::new(config).await.unwrap();
    assert_eq!(
        registry
            .minetest()
            .supervisor()
            .port_of("alice_world")
            .await,
        Some(30000)
    );
    let outcome = registry
        .upload(Engine::Minetest, "bob_world", bytes, None)
        .await
        .unwrap();
    match outcome.server {
        Some(ServerStatus::RestartFailed { port, .. }) => assert_eq!(port, 30001),
        other => panic!("unexpected server status: {other:?}"),
    }
}

#[tokio::test]
async fn easy_rpg_games_receive_shared_runtime_resources() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("rtp/Music")).unwrap();
    std::fs::write(dir.path().join("rtp/Music/town.mid"), b"midi").unwrap();
    std::fs::write(dir.path().join("rtp/RPG_RT.ldb"), b"shared-ldb").unwrap();

    let registry = EngineRegistry::new(test_config(dir.path())).await.unwrap();
    let bytes = build_zip(&[
        ("RPG_RT.lmt", b"lmt"),
        ("RPG_RT.ldb", b"game-ldb"),
        ("RPG_RT.ini", b"ini"),
    ]);
    registry
        .upload(Engine::EasyRpg, "classic", bytes, None)
        .await
        .unwrap();

    let live = dir.path().join("games/classic");
    assert_eq!(std::fs::read(live.join("Music/town.mid")).unwrap(), b"midi");
    // The archive's own file wins over the shared copy.
    assert_eq!(std::fs::read(live.join("RPG_RT.ldb")).unwrap(), b"game-ldb");
}

#[test]
fn registry_is_shareable_across_request_tasks() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<EngineRegistry>();
}

#[test]
fn path_helpers_follow_the_layout_convention() {
    let config = HostingConfig::new("/srv/w3itch");
    assert_eq!(config.games_dir(), PathBuf::from("/srv/w3itch/games"));
    assert_eq!(config.html_temp_dir(), PathBuf::from("/srv/w3itch/html/temp"));
}
