//! Client tests against a mocked tally service.

use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tally_client::{ClientError, SubscriptionStatus, TallyClient};

#[tokio::test]
async fn consume_success() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/credits/consume"))
        .and(header("authorization", "Bearer jwt-1"))
        .and(body_json(json!({ "amount": 10 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "message": "Credits consumed successfully",
            "credits": 0
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = TallyClient::new(server.uri()).unwrap();
    let result = client.consume("jwt-1", 10).await.unwrap();

    assert!(result.success);
    assert_eq!(result.credits, Some(0));
}

#[tokio::test]
async fn consume_rejection_is_a_result_not_an_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/credits/consume"))
        .respond_with(ResponseTemplate::new(402).set_body_json(json!({
            "success": false,
            "message": "Insufficient credits",
            "credits": 5
        })))
        .mount(&server)
        .await;

    let client = TallyClient::new(server.uri()).unwrap();
    let result = client.consume("jwt-1", 10).await.unwrap();

    assert!(!result.success);
    assert_eq!(result.message, "Insufficient credits");
    assert_eq!(result.credits, Some(5));
}

#[tokio::test]
async fn consume_unexpected_body_is_an_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/credits/consume"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
        .mount(&server)
        .await;

    let client = TallyClient::new(server.uri()).unwrap();
    let err = client.consume("jwt-1", 1).await.unwrap_err();

    assert!(matches!(err, ClientError::Api { status: 503, .. }));
}

#[tokio::test]
async fn balance_success() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/credits/balance"))
        .and(header("authorization", "Bearer jwt-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "credits": 77 })))
        .mount(&server)
        .await;

    let client = TallyClient::new(server.uri()).unwrap();
    assert_eq!(client.balance("jwt-2").await.unwrap(), 77);
}

#[tokio::test]
async fn balance_for_unknown_user() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/credits/balance"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": { "code": "not_found", "message": "user not found" }
        })))
        .mount(&server)
        .await;

    let client = TallyClient::new(server.uri()).unwrap();
    let err = client.balance("jwt-2").await.unwrap_err();

    assert!(matches!(err, ClientError::UserNotFound));
}

#[tokio::test]
async fn subscription_view_is_decoded() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/subscription"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "subscription": {
                "user_id": 42,
                "status": "active",
                "current_period_end": "2030-01-01T00:00:00Z",
                "stripe_subscription_id": "sub_123",
                "stripe_price_id": "price_pro",
                "last_event_at": "2029-12-01T00:00:00Z",
                "updated_at": "2029-12-01T00:00:01Z",
                "is_paid": true,
                "is_canceled": false
            }
        })))
        .mount(&server)
        .await;

    let client = TallyClient::new(server.uri()).unwrap();
    let view = client.subscription("jwt-3").await.unwrap().unwrap();

    assert!(view.is_paid);
    assert!(!view.is_canceled);
    assert_eq!(view.subscription.status, SubscriptionStatus::Active);
    assert_eq!(view.subscription.user_id.get(), 42);
}

#[tokio::test]
async fn missing_subscription_is_none() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/subscription"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "subscription": null })))
        .mount(&server)
        .await;

    let client = TallyClient::new(server.uri()).unwrap();
    assert!(client.subscription("jwt-3").await.unwrap().is_none());
}

#[tokio::test]
async fn subscription_requires_auth() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/subscription"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": { "code": "unauthorized", "message": "unauthorized" }
        })))
        .mount(&server)
        .await;

    let client = TallyClient::new(server.uri()).unwrap();
    let err = client.subscription("expired").await.unwrap_err();

    assert!(matches!(err, ClientError::Unauthorized));
}
