//! Plain-HTTP surface of the relay: status, info page, 404, session limit.

mod common;
use common::Behavior;
use voice_relay::http::StatusBody;

#[tokio::test]
async fn test_status_counts_live_sessions() {
    let upstream = common::start_mock_upstream(Behavior::Echo).await;
    let relay = common::start_relay(common::relay_config(&upstream)).await;

    let body: StatusBody = common::get(relay.http_url("/status"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body.status, "running");
    assert_eq!(body.connections, 0);
    assert_eq!(body.config.app_id, "test-app");
    assert_eq!(body.config.ws_port, Some(relay.addr.port()));

    let mut clients = Vec::new();
    for _ in 0..3 {
        let mut client = common::connect_client(&relay.ws_url()).await;
        common::expect_connected(&mut client).await;
        clients.push(client);
    }

    let body: StatusBody = common::get(relay.http_url("/status"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body.connections, 3);

    for mut client in clients {
        client.close(None).await.unwrap();
    }
    assert!(common::eventually(|| relay.registry.is_empty()).await);

    let body: StatusBody = common::get(relay.http_url("/status"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body.connections, 0);
}

#[tokio::test]
async fn test_status_hides_secrets() {
    let upstream = common::start_mock_upstream(Behavior::Echo).await;
    let relay = common::start_relay(common::relay_config(&upstream)).await;

    let text = common::get(relay.http_url("/status"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(!text.contains("test-access-key"));
    assert!(!text.contains("test-app-key"));
}

#[tokio::test]
async fn test_root_serves_info_page() {
    let upstream = common::start_mock_upstream(Behavior::Echo).await;
    let relay = common::start_relay(common::relay_config(&upstream)).await;

    let res = common::get(relay.http_url("/")).await.unwrap();
    assert_eq!(res.status(), 200);
    assert!(res.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/html"));
    let page = res.text().await.unwrap();
    assert!(page.contains("Voice Dialogue Relay"));
    assert!(page.contains(&format!("ws://localhost:{}", relay.addr.port())));
}

#[tokio::test]
async fn test_unknown_path_is_404() {
    let upstream = common::start_mock_upstream(Behavior::Echo).await;
    let relay = common::start_relay(common::relay_config(&upstream)).await;

    let res = common::get(relay.http_url("/nope")).await.unwrap();
    assert_eq!(res.status(), 404);
    assert_eq!(res.text().await.unwrap(), "Not Found");
}

#[tokio::test]
async fn test_session_limit_rejects_upgrade() {
    let upstream = common::start_mock_upstream(Behavior::Echo).await;
    let mut config = common::relay_config(&upstream);
    config.listener.max_sessions = 1;
    let relay = common::start_relay(config).await;

    let mut first = common::connect_client(&relay.ws_url()).await;
    common::expect_connected(&mut first).await;

    let refused = tokio_tungstenite::connect_async(relay.ws_url()).await;
    assert!(refused.is_err());

    first.close(None).await.unwrap();
    assert!(common::eventually(|| relay.registry.is_empty()).await);

    let mut second = common::connect_client(&relay.ws_url()).await;
    common::expect_connected(&mut second).await;
}
