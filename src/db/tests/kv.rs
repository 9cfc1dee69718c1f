use crate::db::*;
use crate::irc::ClientOptions;
use crate::session::{ChannelConfig, SessionConfig};
use crate::types::PendingEntry;
use tempfile::NamedTempFile;

async fn open() -> (Database, NamedTempFile) {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();
    (db, temp_file)
}

fn sample_config() -> SessionConfig {
    SessionConfig {
        hostname: "irc.rizon.net".to_string(),
        nick: "leecher".to_string(),
        commands: vec!["PRIVMSG NickServ :IDENTIFY hunter2".to_string()],
        channels: vec![ChannelConfig::new("#News")],
        client: ClientOptions::default(),
    }
}

#[tokio::test]
async fn test_kv_set_get_overwrite_delete() {
    let (db, _temp) = open().await;

    assert_eq!(db.kv_get(namespace::SETTINGS, "k").await.unwrap(), None);

    db.kv_set(namespace::SETTINGS, "k", "1").await.unwrap();
    db.kv_set(namespace::SETTINGS, "k", "2").await.unwrap();
    assert_eq!(
        db.kv_get(namespace::SETTINGS, "k").await.unwrap(),
        Some("2".to_string())
    );

    assert!(db.kv_delete(namespace::SETTINGS, "k").await.unwrap());
    assert!(!db.kv_delete(namespace::SETTINGS, "k").await.unwrap());
    assert_eq!(db.kv_get(namespace::SETTINGS, "k").await.unwrap(), None);
}

#[tokio::test]
async fn test_namespaces_are_isolated() {
    let (db, _temp) = open().await;

    db.kv_set(namespace::NETWORKS, "same", "\"a\"").await.unwrap();
    db.kv_set(namespace::QUEUES, "same", "\"b\"").await.unwrap();

    assert_eq!(db.kv_list(namespace::NETWORKS).await.unwrap().len(), 1);
    assert_eq!(
        db.kv_get(namespace::QUEUES, "same").await.unwrap(),
        Some("\"b\"".to_string())
    );
}

#[tokio::test]
async fn test_network_config_roundtrip() {
    let (db, _temp) = open().await;

    db.save_network_config("rizon", &sample_config())
        .await
        .unwrap();

    let configs = db.load_network_configs().await.unwrap();
    assert_eq!(configs.len(), 1);
    assert_eq!(configs[0].0, "rizon");
    assert_eq!(configs[0].1, sample_config());

    assert!(db.delete_network_config("rizon").await.unwrap());
    assert!(db.load_network_configs().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_pending_lists_keep_order_and_empty_deletes() {
    let (db, _temp) = open().await;

    let entries = vec![
        PendingEntry {
            pack: 3,
            name: "b.mkv".to_string(),
        },
        PendingEntry {
            pack: 1,
            name: "a.mkv".to_string(),
        },
    ];
    db.save_pending("rizon", "Bot", &entries).await.unwrap();

    assert_eq!(db.get_pending("rizon", "Bot").await.unwrap(), entries);

    let all = db.load_pending().await.unwrap();
    assert_eq!(all, vec![("rizon".to_string(), "Bot".to_string(), entries)]);

    db.save_pending("rizon", "Bot", &[]).await.unwrap();
    assert!(db.load_pending().await.unwrap().is_empty());
    assert_eq!(db.kv_get(namespace::QUEUES, "rizon:Bot").await.unwrap(), None);
}

#[tokio::test]
async fn test_corrupt_value_is_reported() {
    let (db, _temp) = open().await;

    db.kv_set(namespace::NETWORKS, "broken", "{not json")
        .await
        .unwrap();

    let err = db.load_network_configs().await.unwrap_err();
    assert!(matches!(
        err,
        crate::Error::Database(crate::error::DatabaseError::CorruptRecord { .. })
    ));
}

#[tokio::test]
async fn test_settings_are_typed() {
    let (db, _temp) = open().await;

    assert_eq!(db.get_setting::<bool>("xdcc:useSSL").await.unwrap(), None);
    db.set_setting("xdcc:useSSL", &true).await.unwrap();
    db.set_setting("xdcc:progressThreshold", &4096u64)
        .await
        .unwrap();

    assert_eq!(db.get_setting::<bool>("xdcc:useSSL").await.unwrap(), Some(true));
    assert_eq!(
        db.get_setting::<u64>("xdcc:progressThreshold").await.unwrap(),
        Some(4096)
    );
}
