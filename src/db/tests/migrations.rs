use crate::db::*;
use tempfile::NamedTempFile;

#[tokio::test]
async fn test_fresh_database_is_at_latest_version() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();

    assert_eq!(db.schema_version().await.unwrap(), 1);

    db.close().await;
}

#[tokio::test]
async fn test_reopen_does_not_reapply_migrations() {
    let temp_file = NamedTempFile::new().unwrap();

    {
        let db = Database::new(temp_file.path()).await.unwrap();
        db.kv_set(namespace::SETTINGS, "xdcc:resume", "false")
            .await
            .unwrap();
        db.close().await;
    }

    // A second open would fail on CREATE TABLE if v1 ran again
    let db = Database::new(temp_file.path()).await.unwrap();
    assert_eq!(db.schema_version().await.unwrap(), 1);
    assert_eq!(
        db.kv_get(namespace::SETTINGS, "xdcc:resume").await.unwrap(),
        Some("false".to_string())
    );
    db.close().await;
}

#[tokio::test]
async fn test_creates_missing_parent_directory() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("nested").join("state.db");

    let db = Database::new(&path).await.unwrap();
    assert!(path.exists());
    db.close().await;
}
