use filterlab::adapters::session_store::STORAGE_KEY;
use filterlab::core::import::{with_filter, with_input, ImportMode};
use filterlab::core::{Session, SessionStore};
use filterlab::{restore_session, FileSessionStore, LocalStorage};
use anyhow::Result;
use tempfile::TempDir;

fn store_in(temp_dir: &TempDir) -> FileSessionStore<LocalStorage> {
    FileSessionStore::new(LocalStorage::new(temp_dir.path()))
}

#[tokio::test]
async fn test_first_start_uses_sample() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let store = store_in(&temp_dir);

    assert_eq!(store.load().await?, None);
    assert_eq!(restore_session(&store).await, Session::sample());
    Ok(())
}

#[tokio::test]
async fn test_saved_session_survives_restart() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let session = Session::new("{\"log\": \"hello\"}", "function cb_filter(tag, ts, record) return 0, ts, record end");

    store_in(&temp_dir).save(&session).await?;

    // 新的 store 實例模擬重新啟動
    let restored = restore_session(&store_in(&temp_dir)).await;
    assert_eq!(restored, session);

    let file = temp_dir.path().join(format!("{}.json", STORAGE_KEY));
    let stored: serde_json::Value = serde_json::from_slice(&std::fs::read(file).unwrap()).unwrap();
    assert_eq!(stored["input"], "{\"log\": \"hello\"}");
    assert!(stored["filter"].as_str().unwrap().starts_with("function cb_filter"));
    Ok(())
}

#[tokio::test]
async fn test_corrupt_session_falls_back_to_sample() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(
        temp_dir.path().join(format!("{}.json", STORAGE_KEY)),
        b"{\"input\": \"truncated",
    )
    .unwrap();

    let store = store_in(&temp_dir);
    assert_eq!(store.load().await?, None);
    assert_eq!(restore_session(&store).await, Session::sample());
    Ok(())
}

#[tokio::test]
async fn test_clear_forgets_session() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let store = store_in(&temp_dir);
    store.save(&Session::new("{}", "function cb_filter(tag, ts, record) return 0, ts, record end")).await?;

    store.clear().await?;
    assert_eq!(store.load().await?, None);

    // 重複清除不應失敗
    store.clear().await?;
    Ok(())
}

#[tokio::test]
async fn test_imported_raw_lines_are_persisted() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let store = store_in(&temp_dir);

    let session = restore_session(&store).await;
    let session = with_input(&session, "first line\nsecond \"quoted\" line", ImportMode::RawLines);
    let session = with_filter(&session, "function cb_filter(tag, ts, record) return -1, ts, record end");
    store.save(&session).await?;

    let restored = store.load().await?.unwrap();
    assert_eq!(
        restored.input,
        "{\"log\":\"first line\"}\n{\"log\":\"second \\\"quoted\\\" line\"}"
    );
    assert!(restored.filter.contains("return -1, ts, record"));
    Ok(())
}
