use std::time::Duration;

use metasync::MetadataClient;
use metasync::MetadataConfig;
use metasync::PLAYER_USERNAME;
use tempfile::tempdir;
use tracing_test::traced_test;

use crate::common::fast_config;
use crate::common::wait_until;

const SLED_WAIT: Duration = Duration::from_secs(10);

fn sled_config(path: &std::path::Path) -> MetadataConfig {
    let mut config = fast_config();
    config.store.address = format!("sled://{}", path.display());
    config
}

#[tokio::test]
#[traced_test]
async fn test_sled_backed_client_round_trip() {
    let dir = tempdir().unwrap();
    let config = sled_config(&dir.path().join("meta"));

    let client = MetadataClient::builder(config).build().await.unwrap();
    client
        .update_player("p1", |m| {
            m.set_annotation(PLAYER_USERNAME, "dave");
            m.set_label("tier", "gold");
        })
        .await
        .unwrap();
    assert!(wait_until(SLED_WAIT, || client.get_player_by_name("dave").is_some()).await);

    client.delete_player("p1").await.unwrap();
    assert!(wait_until(SLED_WAIT, || client.get_player("p1").is_none()).await);
    assert!(client.get_player_by_name("dave").is_none());

    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_sled_state_survives_client_restart() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("meta");

    {
        let client = MetadataClient::builder(sled_config(&path)).build().await.unwrap();
        client
            .update_server("srv-1", |m| m.set_label("region", "eu"))
            .await
            .unwrap();
        assert!(wait_until(SLED_WAIT, || client.get_server("srv-1").is_some()).await);
        client.shutdown().await.unwrap();
    }

    let client = MetadataClient::builder(sled_config(&path)).build().await.unwrap();
    // Loaded by warm-up, no waiting needed
    assert!(client.get_server("srv-1").unwrap().has_label("region", "eu"));
    client.shutdown().await.unwrap();
}
