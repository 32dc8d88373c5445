//! Tests for the local client: sessions sharing one state file behave like
//! separate phones on the same collection.

use std::path::{Path, PathBuf};

use ciclomap_cli::{Command, Config, LocalState, OutputFormat, Session};
use ciclomap_core::{Category, UserId};
use tempfile::TempDir;

// ============================================================================
// Helpers
// ============================================================================

fn state_file(dir: &TempDir) -> PathBuf {
    dir.path().join("state.json")
}

/// Open a session from the state file, run one command, save back.
async fn invoke(path: &Path, user: Option<&str>, command: Command) -> anyhow::Result<String> {
    let config = Config::default();
    let state = LocalState::load(path)?;
    let session = Session::open(&config, state, user.map(|u| UserId::new(u).unwrap())).await;
    let result = session.run(&command, OutputFormat::Text).await;
    session.state().save(path)?;
    result
}

fn add(category: Category, notes: &str) -> Command {
    Command::Add {
        category,
        lat: -26.9935,
        lng: -48.6346,
        notes: notes.to_string(),
    }
}

fn only_id(path: &Path) -> String {
    let state = LocalState::load(path).unwrap();
    assert_eq!(state.documents.len(), 1);
    state.documents.keys().next().unwrap().clone()
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_add_persists_and_lists() {
    let dir = TempDir::new().unwrap();
    let path = state_file(&dir);

    let out = invoke(&path, Some("ana"), add(Category::Pothole, "deep hole"))
        .await
        .unwrap();
    assert_eq!(out, "Ponto adicionado!");

    let list = invoke(&path, Some("bruno"), Command::List).await.unwrap();
    assert!(list.contains("Buraco na via"));
    assert!(list.contains("deep hole"));
    // Not owned by bruno, so no ownership marker
    assert!(list.starts_with(' '));
}

#[tokio::test]
async fn test_anonymous_identity_is_remembered() {
    let dir = TempDir::new().unwrap();
    let path = state_file(&dir);

    invoke(&path, None, add(Category::RepairShop, "")).await.unwrap();
    let state = LocalState::load(&path).unwrap();
    let user = state.user_id.clone().expect("signed in anonymously");

    let doc = state.documents.values().next().unwrap();
    assert_eq!(doc["userId"], user.as_str());

    // Same saved identity may edit its own point
    let id = only_id(&path);
    let out = invoke(&path, None, Command::Edit {
        id,
        notes: "closes at 18h".into(),
    })
    .await
    .unwrap();
    assert_eq!(out, "Ponto atualizado!");
}

#[tokio::test]
async fn test_user_override_keeps_saved_identity() {
    let dir = TempDir::new().unwrap();
    let path = state_file(&dir);
    invoke(&path, None, add(Category::Pothole, "mine")).await.unwrap();
    let saved = LocalState::load(&path).unwrap().user_id;
    assert!(saved.is_some());

    invoke(&path, Some("bruno"), Command::List).await.unwrap();
    assert_eq!(LocalState::load(&path).unwrap().user_id, saved);

    // The saved identity still owns its point afterwards
    let id = only_id(&path);
    let out = invoke(&path, None, Command::Delete { id }).await.unwrap();
    assert_eq!(out, "Ponto excluído!");
}

#[tokio::test]
async fn test_other_user_cannot_edit_or_delete() {
    let dir = TempDir::new().unwrap();
    let path = state_file(&dir);
    invoke(&path, Some("ana"), add(Category::DangerousSpot, "fast cars"))
        .await
        .unwrap();
    let id = only_id(&path);

    let edit = invoke(&path, Some("bruno"), Command::Edit {
        id: id.clone(),
        notes: "nope".into(),
    })
    .await;
    let delete = invoke(&path, Some("bruno"), Command::Delete { id: id.clone() }).await;

    assert!(edit.unwrap_err().to_string().contains("Not the owner"));
    assert!(delete.is_err());
    let state = LocalState::load(&path).unwrap();
    assert_eq!(state.documents[&id]["notes"], "fast cars");
}

#[tokio::test]
async fn test_owner_deletes() {
    let dir = TempDir::new().unwrap();
    let path = state_file(&dir);
    invoke(&path, Some("ana"), add(Category::UnlitStretch, "")).await.unwrap();
    let id = only_id(&path);

    let out = invoke(&path, Some("ana"), Command::Delete { id }).await.unwrap();

    assert_eq!(out, "Ponto excluído!");
    assert!(LocalState::load(&path).unwrap().documents.is_empty());
}

#[tokio::test]
async fn test_mine_lists_only_own_points() {
    let dir = TempDir::new().unwrap();
    let path = state_file(&dir);
    invoke(&path, Some("ana"), add(Category::Pothole, "mine")).await.unwrap();
    invoke(&path, Some("bruno"), add(Category::RepairShop, "his")).await.unwrap();

    let out = invoke(&path, Some("ana"), Command::Mine).await.unwrap();

    assert!(out.contains("Seu ID de Utilizador: ana"));
    assert!(out.contains("Buraco na via"));
    assert!(!out.contains("Oficina/Bicicletaria"));
}

#[tokio::test]
async fn test_json_list_output() {
    let dir = TempDir::new().unwrap();
    let path = state_file(&dir);
    invoke(&path, Some("ana"), add(Category::Pothole, "")).await.unwrap();

    let session = Session::open(
        &Config::default(),
        LocalState::load(&path).unwrap(),
        Some(UserId::new("ana").unwrap()),
    )
    .await;
    let out = session.run(&Command::List, OutputFormat::Json).await.unwrap();

    let value: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(value[0]["glyph"], "ic_marker_buraco");
    assert_eq!(value[0]["owned"], true);
    assert_eq!(value[0]["notes"], serde_json::Value::Null);
}

#[tokio::test]
async fn test_map_shows_camera_and_markers() {
    let dir = TempDir::new().unwrap();
    let path = state_file(&dir);
    invoke(&path, Some("ana"), add(Category::UnlitStretch, "")).await.unwrap();

    let session = Session::open(&Config::default(), LocalState::load(&path).unwrap(), None).await;
    let out = session.run(&Command::Map, OutputFormat::Json).await.unwrap();

    let value: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(value["centerLat"], -26.9935);
    assert_eq!(value["zoom"], 14.0);
    assert_eq!(value["markers"][0]["glyph"], "ic_marker_luz");
}

#[tokio::test]
async fn test_invalid_location_is_rejected_before_store() {
    let dir = TempDir::new().unwrap();
    let path = state_file(&dir);

    let result = invoke(&path, Some("ana"), Command::Add {
        category: Category::Pothole,
        lat: 123.0,
        lng: 0.0,
        notes: String::new(),
    })
    .await;

    assert!(result.is_err());
    assert!(LocalState::load(&path).unwrap().documents.is_empty());
}

#[tokio::test]
async fn test_config_load_writes_defaults() {
    let dir = TempDir::new().unwrap();

    let config = Config::load(dir.path()).unwrap();

    assert_eq!(config.sync.app_id, "ciclomap-android-app");
    assert!(dir.path().join("config.json").exists());
    let reloaded = Config::load(dir.path()).unwrap();
    assert_eq!(reloaded.map, config.map);
}
