use httpmock::prelude::*;
use lambda_connectors::adapters::discord::{DiscordChannel, DiscordConfig};
use lambda_connectors::ConnectorError;
use serde_json::json;

fn channel(server: &MockServer) -> anyhow::Result<DiscordChannel> {
    let mut config = DiscordConfig::new("Bot test-token", "1234");
    config.api_base = server.url("/api");
    Ok(DiscordChannel::new(config)?)
}

#[tokio::test]
async fn test_post_message_to_channel() -> anyhow::Result<()> {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/api/channels/1234/messages")
            .header("authorization", "Bot test-token")
            .json_body(json!({ "content": "deploy finished" }));
        then.status(200)
            .json_body(json!({ "id": "99", "content": "deploy finished" }));
    });

    let message = channel(&server)?
        .post_message_to_channel(&json!({ "content": "deploy finished" }))
        .await?;

    mock.assert();
    assert_eq!(message["id"], "99");
    Ok(())
}

#[tokio::test]
async fn test_get_messages_from_channel() -> anyhow::Result<()> {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/api/channels/1234/messages")
            .header("authorization", "Bot test-token");
        then.status(200)
            .json_body(json!([{ "id": "1" }, { "id": "2" }]));
    });

    let messages = channel(&server)?.get_messages_from_channel().await?;

    mock.assert();
    assert_eq!(messages.as_array().map(Vec::len), Some(2));
    Ok(())
}

#[tokio::test]
async fn test_unauthorized_is_an_error() -> anyhow::Result<()> {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/api/channels/1234/messages");
        then.status(401)
            .json_body(json!({ "message": "401: Unauthorized", "code": 0 }));
    });

    let err = channel(&server)?
        .get_messages_from_channel()
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ConnectorError::UnexpectedStatusError { status: 401, .. }
    ));
    Ok(())
}
