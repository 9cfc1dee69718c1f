use super::*;

#[tokio::test]
async fn test_duplicate_network_name_rejected() {
    let (downloader, _temp_dir, _mocks) = create_test_downloader().await;

    downloader
        .add_network("rizon", "irc.rizon.net", NetworkOptions::new("leech"))
        .await
        .unwrap();
    let err = downloader
        .add_network("rizon", "irc.other.net", NetworkOptions::new("other"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::Network(NetworkError::AlreadyExists { ref name }) if name == "rizon"
    ));
    assert!(err.is_validation());

    // First registration is untouched
    let network = downloader.get_network("rizon").await.unwrap();
    assert_eq!(network.session.hostname, "irc.rizon.net");
    assert_eq!(network.session.nick, "leech");
    assert_eq!(downloader.networks().await, vec!["rizon".to_string()]);
}

#[tokio::test]
async fn test_blank_network_name_rejected() {
    let (downloader, _temp_dir, mocks) = create_test_downloader().await;

    for name in ["", "   "] {
        let err = downloader
            .add_network(name, "irc.rizon.net", NetworkOptions::new("leech"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Network(NetworkError::InvalidName)));
    }
    assert!(mocks.irc.connected().is_empty());
}

#[tokio::test]
async fn test_invalid_pattern_rejected_before_connecting() {
    let (downloader, _temp_dir, mocks) = create_test_downloader().await;

    let mut options = NetworkOptions::new("leech");
    options.channels = vec![ChannelConfig::new("#bad").with_pattern("(", &["pack"])];
    let err = downloader
        .add_network("rizon", "irc.rizon.net", options)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Pattern(_)));
    assert!(mocks.irc.connected().is_empty());
    assert!(downloader.networks().await.is_empty());
}

#[tokio::test]
async fn test_add_network_persists_config() {
    let (downloader, _temp_dir, _mocks) = create_test_downloader().await;

    let mut options = NetworkOptions::new("leech");
    options.commands = vec!["PRIVMSG NickServ :IDENTIFY secret".to_string()];
    options.channels = vec![ChannelConfig::new("#news").with_password("key")];
    let mut events = downloader.subscribe();
    let view = downloader
        .add_network("rizon", "irc.rizon.net", options)
        .await
        .unwrap();
    assert_eq!(view.status, SessionStatus::Connecting);

    let configs = downloader.db.load_network_configs().await.unwrap();
    assert_eq!(configs.len(), 1);
    let (name, config) = &configs[0];
    assert_eq!(name, "rizon");
    assert_eq!(config.hostname, "irc.rizon.net");
    assert_eq!(config.commands.len(), 1);
    assert_eq!(config.channels[0].password.as_deref(), Some("key"));

    assert!(matches!(
        drain_events(&mut events).as_slice(),
        [Event::NetworkAdded { network }] if network == "rizon"
    ));
}

#[tokio::test]
async fn test_registration_joins_configured_channels() {
    let (downloader, _temp_dir, mocks) = create_test_downloader().await;
    let mut events = downloader.subscribe();

    add_registered_network(&downloader, &mocks, "rizon").await;
    settle(&downloader).await;

    let client = mocks.irc.client("rizon");
    assert_eq!(client.joins(), vec!["#packs".to_string()]);

    mocks.irc.sink("rizon").emit(IrcEvent::Join {
        channel: "#Packs".to_string(),
        nick: "leech".to_string(),
    });
    settle(&downloader).await;

    let network = downloader.get_network("rizon").await.unwrap();
    assert_eq!(network.session.status, SessionStatus::Connected);
    assert!(network.session.channels[0].observed);

    let events = drain_events(&mut events);
    assert!(events.iter().any(|e| matches!(e, Event::Registered { nick, .. } if nick == "leech")));
    assert!(events
        .iter()
        .any(|e| matches!(e, Event::ChannelJoined { channel, .. } if channel == "#packs")));
}

#[tokio::test]
async fn test_announcement_recorded_as_pack_offer() {
    let (downloader, _temp_dir, mocks) = create_test_downloader().await;
    add_registered_network(&downloader, &mocks, "rizon").await;
    settle(&downloader).await;
    let sink = mocks.irc.sink("rizon");
    sink.emit(IrcEvent::Join {
        channel: "#packs".to_string(),
        nick: "leech".to_string(),
    });
    settle(&downloader).await;

    let mut events = downloader.subscribe();
    sink.emit(IrcEvent::Message {
        channel: "#packs".to_string(),
        nick: "Bot".to_string(),
        text: "#5  12x [1M] release.mkv".to_string(),
    });
    settle(&downloader).await;

    let id = PackId::new("rizon", "Bot", 5);
    let offer = downloader.get_pack(&id).await.unwrap().unwrap();
    assert_eq!(offer.name, "release.mkv");
    assert_eq!(offer.size, Some(1024.0 * 1024.0));
    assert_eq!(offer.gets, Some(12));
    assert_eq!(offer.channel, "#packs");

    assert!(drain_events(&mut events)
        .iter()
        .any(|e| matches!(e, Event::PackFound { id: found } if *found == id)));

    // Enqueuable right away
    downloader.add_download(&id).await.unwrap();
    assert_eq!(
        queue_statuses(&downloader, "rizon", "Bot").await,
        vec![(5, RequestStatus::Active)]
    );
}

#[tokio::test]
async fn test_remove_network_with_pending_downloads_fails() {
    let (downloader, _temp_dir, mocks) = create_test_downloader().await;
    two_queued(&downloader, &mocks).await;

    let err = downloader.remove_network("rizon", false).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Network(NetworkError::PendingDownloads { count: 2, .. })
    ));

    assert_eq!(downloader.networks().await, vec!["rizon".to_string()]);
    assert!(!mocks
        .irc
        .client("rizon")
        .calls()
        .contains(&ClientCall::Disconnect));
    assert_eq!(downloader.db.load_network_configs().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_remove_network_disconnects_and_flushes() {
    let (downloader, _temp_dir, mocks) = create_test_downloader().await;
    add_registered_network(&downloader, &mocks, "rizon").await;
    add_registered_network(&downloader, &mocks, "abjects").await;
    let flushed = seed_pack(&downloader, "rizon", "Bot", 1, "one.mkv").await;
    let kept = seed_pack(&downloader, "abjects", "Bot", 1, "one.mkv").await;

    downloader.remove_network("rizon", true).await.unwrap();

    assert_eq!(downloader.networks().await, vec!["abjects".to_string()]);
    assert!(mocks
        .irc
        .client("rizon")
        .calls()
        .contains(&ClientCall::Disconnect));
    assert!(downloader.get_pack(&flushed).await.unwrap().is_none());
    assert!(downloader.get_pack(&kept).await.unwrap().is_some());

    let configs = downloader.db.load_network_configs().await.unwrap();
    assert_eq!(configs.len(), 1);
    assert_eq!(configs[0].0, "abjects");

    let err = downloader.get_network("rizon").await.unwrap_err();
    assert!(matches!(err, Error::Network(NetworkError::NotFound { .. })));
}

#[tokio::test]
async fn test_remove_network_without_flush_keeps_history() {
    let (downloader, _temp_dir, mocks) = create_test_downloader().await;
    add_registered_network(&downloader, &mocks, "rizon").await;
    let id = seed_pack(&downloader, "rizon", "Bot", 1, "one.mkv").await;

    downloader.remove_network("rizon", false).await.unwrap();

    assert!(downloader.get_pack(&id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_remove_unknown_network() {
    let (downloader, _temp_dir, _mocks) = create_test_downloader().await;
    let err = downloader.remove_network("nowhere", false).await.unwrap_err();
    assert!(matches!(err, Error::Network(NetworkError::NotFound { .. })));
}

#[tokio::test]
async fn test_add_channel_joins_and_persists() {
    let (downloader, _temp_dir, mocks) = create_test_downloader().await;
    add_registered_network(&downloader, &mocks, "rizon").await;
    settle(&downloader).await;

    downloader
        .add_channel("rizon", ChannelConfig::new("#news"))
        .await
        .unwrap();

    assert!(mocks.irc.client("rizon").joins().contains(&"#news".to_string()));
    let configs = downloader.db.load_network_configs().await.unwrap();
    let names: Vec<_> = configs[0].1.channels.iter().map(|c| c.name.clone()).collect();
    assert_eq!(names, vec!["#news".to_string(), "#packs".to_string()]);
}

#[tokio::test]
async fn test_remove_channel_parts_and_persists() {
    let (downloader, _temp_dir, mocks) = create_test_downloader().await;
    add_registered_network(&downloader, &mocks, "rizon").await;
    settle(&downloader).await;
    let sink = mocks.irc.sink("rizon");
    sink.emit(IrcEvent::Join {
        channel: "#packs".to_string(),
        nick: "leech".to_string(),
    });
    settle(&downloader).await;

    downloader.remove_channel("rizon", "#PACKS").await.unwrap();

    assert_eq!(mocks.irc.client("rizon").parts(), vec!["#packs".to_string()]);
    let configs = downloader.db.load_network_configs().await.unwrap();
    assert!(configs[0].1.channels.is_empty());

    // Part acknowledged: the channel is gone from the live state too
    sink.emit(IrcEvent::Part {
        channel: "#packs".to_string(),
        nick: "leech".to_string(),
    });
    settle(&downloader).await;
    let network = downloader.get_network("rizon").await.unwrap();
    assert!(network.session.channels.is_empty());

    let err = downloader
        .remove_channel("rizon", "#packs")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Network(NetworkError::ChannelNotFound { .. })
    ));
}

#[tokio::test]
async fn test_snapshot_serializes_networks_and_finished() {
    let (downloader, _temp_dir, mocks) = create_test_downloader().await;
    two_queued(&downloader, &mocks).await;

    let snapshot = downloader.snapshot().await;
    assert_eq!(snapshot.networks.len(), 1);
    assert!(snapshot.finished.is_empty());

    let json = serde_json::to_value(&snapshot).unwrap();
    assert_eq!(json["networks"][0]["name"], "rizon");
    assert_eq!(json["networks"][0]["queues"]["Bot"][0]["status"], "active");
    assert_eq!(json["networks"][0]["queues"]["Bot"][1]["status"], "queued");
}
