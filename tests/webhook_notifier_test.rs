use httpmock::prelude::*;
use lambda_connectors::adapters::notifications::{ApiGatewayEvent, LambdaIdentity, RevHealthNotifications};
use lambda_connectors::adapters::teams::{build_payload, TeamsConfig, TeamsWebhook};
use lambda_connectors::{ConnectorError, FailureAlert, FailureNotifier};
use serde_json::json;

fn alert() -> FailureAlert {
    FailureAlert {
        lambda_name: "contact-form".to_string(),
        function_name: "Dynamo.put".to_string(),
        location: "us-east-1".to_string(),
        status: "failed".to_string(),
        description: "Unable to PUT item.".to_string(),
        logs_link: "https://console.aws.amazon.com/cloudwatch/logs".to_string(),
    }
}

fn event() -> anyhow::Result<ApiGatewayEvent> {
    Ok(serde_json::from_value(json!({
        "requestContext": {
            "domainName": "api.example.com",
            "http": { "path": "/contact", "method": "POST" }
        },
        "headers": { "postman-token": "abc" }
    }))?)
}

fn identity() -> LambdaIdentity {
    LambdaIdentity {
        function_name: "contact-form".to_string(),
        log_stream: "2023/02/07/[$LATEST]abc".to_string(),
    }
}

#[tokio::test]
async fn test_teams_card_posted_to_webhook() -> anyhow::Result<()> {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/webhook")
            .json_body(serde_json::to_value(build_payload(&alert())).unwrap());
        then.status(200).body("1");
    });

    let webhook = TeamsWebhook::new(TeamsConfig::new(server.url("/webhook")))?;
    webhook.notify(&alert()).await?;

    mock.assert();
    Ok(())
}

#[tokio::test]
async fn test_teams_rejection_is_an_error() -> anyhow::Result<()> {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST).path("/webhook");
        then.status(400).body("Summary or Text is required.");
    });

    let webhook = TeamsWebhook::new(TeamsConfig::new(server.url("/webhook")))?;
    let err = webhook.notify(&alert()).await.unwrap_err();

    mock.assert();
    assert!(matches!(
        err,
        ConnectorError::UnexpectedStatusError { status: 400, ref body, .. } if body == "Summary or Text is required."
    ));
    Ok(())
}

#[test]
fn test_teams_rejects_bad_webhook_url() {
    assert!(TeamsWebhook::new(TeamsConfig::new("not a url")).is_err());
}

#[tokio::test]
async fn test_revhealth_notification_payload() -> anyhow::Result<()> {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST).path("/notifications").json_body(json!({
            "lambda_name": "contact-form",
            "function_name": "Dynamo.put",
            "description": "Unable to PUT item.",
            "api_domain_name": "api.example.com",
            "api_path": "/contact",
            "api_method": "POST",
            "status": "failed",
            "log_stream": "2023/02/07/[$LATEST]abc",
            "origin": "postman"
        }));
        then.status(200).json_body(json!({ "ok": true }));
    });

    let notifier = RevHealthNotifications::new(&server.url("/notifications"), event()?, identity())?;
    let notifiers: Vec<Box<dyn FailureNotifier>> = vec![Box::new(notifier)];
    for notifier in &notifiers {
        notifier.notify(&alert()).await?;
    }

    mock.assert();
    Ok(())
}

#[tokio::test]
async fn test_revhealth_server_error() -> anyhow::Result<()> {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST).path("/notifications");
        then.status(502);
    });

    let notifier = RevHealthNotifications::new(&server.url("/notifications"), event()?, identity())?;
    let result = notifier
        .send_notification("Dynamo.put", "Unable to PUT item.")
        .await;

    mock.assert();
    assert!(matches!(
        result,
        Err(ConnectorError::UnexpectedStatusError { status: 502, .. })
    ));
    Ok(())
}
