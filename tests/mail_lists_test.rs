// Campaign Monitor, SendGrid and Marketo against a mock server.

use httpmock::prelude::*;
use lambda_connectors::adapters::campaign_monitor::{CampaignMonitor, CampaignMonitorConfig, Subscriber};
use lambda_connectors::adapters::marketo::{Lead, Marketo, MarketoConfig};
use lambda_connectors::adapters::sendgrid::{SendGrid, SendGridConfig};
use lambda_connectors::ConnectorError;
use serde_json::json;

fn campaign_monitor(server: &MockServer) -> anyhow::Result<CampaignMonitor> {
    Ok(CampaignMonitor::new(CampaignMonitorConfig {
        api_key: "cm-key".to_string(),
        password: "x".to_string(),
        list_api_id: "list-1".to_string(),
        api_base: server.url("/api/v3.3"),
    })?)
}

#[tokio::test]
async fn test_campaign_monitor_adds_subscriber() -> anyhow::Result<()> {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/api/v3.3/subscribers/list-1.json")
            .header_exists("authorization")
            .json_body(json!({
                "EmailAddress": "post@man.com",
                "Name": "Post Man",
                "CustomFields": [{ "Key": "Zip", "Value": "99999" }],
                "Resubscribe": true,
                "RestartSubscriptionBasedAutoresponders": true,
                "ConsentToTrack": "Unchanged"
            }));
        then.status(201).json_body(json!("post@man.com"));
    });

    let subscriber = Subscriber::new("post@man.com", "Post Man").with_field("Zip", "99999");
    campaign_monitor(&server)?
        .add_subscriber_to_list(&subscriber)
        .await?;

    mock.assert();
    Ok(())
}

#[tokio::test]
async fn test_campaign_monitor_only_accepts_201() -> anyhow::Result<()> {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/api/v3.3/subscribers/list-1.json");
        then.status(200).json_body(json!("post@man.com"));
    });

    let err = campaign_monitor(&server)?
        .add_subscriber_to_list(&Subscriber::new("post@man.com", "Post Man"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ConnectorError::UnexpectedStatusError { status: 200, .. }
    ));
    Ok(())
}

fn sendgrid(server: &MockServer) -> anyhow::Result<SendGrid> {
    let config = SendGridConfig {
        api_key: "SG.test".to_string(),
        api_base: server.base_url(),
    };
    Ok(SendGrid::new(config, "noreply@site.com", "a@site.com, b@site.com")?)
}

#[tokio::test]
async fn test_sendgrid_send_email() -> anyhow::Result<()> {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v3/mail/send")
            .header("authorization", "Bearer SG.test")
            .json_body(json!({
                "personalizations": [{ "to": [{ "email": "a@site.com" }, { "email": "b@site.com" }] }],
                "from": { "email": "noreply@site.com" },
                "subject": "New contact",
                "content": [{ "type": "text/html", "value": "<p>Hello</p>" }]
            }));
        then.status(202);
    });

    let response = sendgrid(&server)?
        .send_email("New contact", "<p>Hello</p>")
        .await;

    mock.assert();
    assert!(response.is_success());
    assert_eq!(response.message().as_deref(), Some("success"));
    Ok(())
}

#[tokio::test]
async fn test_sendgrid_failure_response() -> anyhow::Result<()> {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/v3/mail/send");
        then.status(401)
            .json_body(json!({ "errors": [{ "message": "bad key" }] }));
    });

    let mut sendgrid = sendgrid(&server)?;
    assert!(!sendgrid.set_email_receivers(" , ").is_success());
    assert_eq!(sendgrid.receivers().len(), 2);

    let response = sendgrid.send_email("New contact", "<p>Hello</p>").await;
    assert_eq!(response.status_code, 500);
    assert_eq!(response.message().as_deref(), Some("Unable to send email"));
    Ok(())
}

fn marketo(server: &MockServer) -> anyhow::Result<Marketo> {
    Ok(Marketo::new(MarketoConfig {
        munchkin_id: "000-AAA-000".to_string(),
        client_id: "client".to_string(),
        client_secret: "secret".to_string(),
        list_id: "1001".to_string(),
        api_base: server.base_url(),
    })?)
}

#[tokio::test]
async fn test_marketo_create_lead_then_add_to_list() -> anyhow::Result<()> {
    let server = MockServer::start();
    let token = server.mock(|when, then| {
        when.method(GET)
            .path("/identity/oauth/token")
            .query_param("grant_type", "client_credentials")
            .query_param("client_id", "client");
        then.status(200)
            .json_body(json!({ "access_token": "tok", "token_type": "bearer", "expires_in": 3599 }));
    });
    let create = server.mock(|when, then| {
        when.method(POST)
            .path("/rest/v1/leads.json")
            .header("authorization", "Bearer tok")
            .json_body(json!({
                "action": "createOnly",
                "lookupField": "email",
                "asyncProcessing": false,
                "partitionName": "Default",
                "input": [{ "email": "post@man.com", "firstName": "Post", "lastName": "Man" }]
            }));
        then.status(200).json_body(json!({
            "requestId": "e42b#14272d07d78",
            "success": true,
            "result": [{ "id": 50, "status": "created" }]
        }));
    });
    let list = server.mock(|when, then| {
        when.method(POST)
            .path("/rest/v1/lists/1001/leads.json")
            .json_body(json!({ "input": [{ "id": 50 }] }));
        then.status(200).json_body(json!({
            "success": true,
            "result": [{ "id": 50, "status": "added" }]
        }));
    });

    let marketo = marketo(&server)?;
    let lead = Lead {
        email: "post@man.com".to_string(),
        first_name: "Post".to_string(),
        last_name: "Man".to_string(),
    };
    let created = marketo.create_lead(&lead).await?;
    let lead_id = created[0].id.unwrap_or_default();
    let added = marketo.add_to_list(lead_id).await?;

    token.assert_hits(1);
    create.assert();
    list.assert();
    assert_eq!(added[0].status, "added");
    Ok(())
}

#[tokio::test]
async fn test_marketo_unsuccessful_envelope() -> anyhow::Result<()> {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/identity/oauth/token");
        then.status(200).json_body(json!({ "access_token": "tok" }));
    });
    server.mock(|when, then| {
        when.method(POST).path("/rest/v1/lists/1001/leads.json");
        then.status(200).json_body(json!({
            "success": false,
            "errors": [{ "code": "1013", "message": "Static list not found" }]
        }));
    });

    let err = marketo(&server)?.add_to_list(50).await.unwrap_err();

    assert!(matches!(err, ConnectorError::ServiceError { service: "Marketo", .. }));
    assert!(err.to_string().contains("Static list not found"));
    Ok(())
}
