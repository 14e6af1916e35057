use codecsync::config::{Config, PhonebookMode, TransportKind};

#[tokio::test]
async fn default_file_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    let path = path.to_str().unwrap();

    Config::create_default(path).await.unwrap();
    let mut config = Config::load(path).await.unwrap();
    assert_eq!(config.codec.transport, TransportKind::Tcp);
    assert_eq!(config.directory.phonebook_mode, PhonebookMode::Corporate);

    config.codec.host = "10.20.30.40".into();
    config.codec.password = "hunter2".into();
    config.directory.phonebook_mode = PhonebookMode::Local;
    config.timing.request_timeout_secs = 15;
    config.save(path).await.unwrap();

    let reloaded = Config::load(path).await.unwrap();
    assert_eq!(reloaded.codec.host, "10.20.30.40");
    assert_eq!(reloaded.codec.password, "hunter2");
    assert_eq!(reloaded.directory.phonebook_mode, PhonebookMode::Local);
    assert_eq!(reloaded.timing.request_timeout().as_secs(), 15);
}

#[tokio::test]
async fn invalid_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    tokio::fs::write(&path, "[codec]\ntransport = \"tcp\"\nhost = \"\"\n")
        .await
        .unwrap();
    let err = Config::load(path.to_str().unwrap()).await.unwrap_err();
    assert!(err.to_string().contains("codec.host"));

    assert!(Config::load(dir.path().join("missing.toml").to_str().unwrap())
        .await
        .is_err());
}
