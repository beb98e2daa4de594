//! Stripe webhook ingest for the subscription mirror.
//!
//! Only subscription lifecycle events are consumed. Every other event type,
//! and every event that cannot be tied to a known user, is acknowledged so
//! the provider stops redelivering it.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tally_core::{Subscription, SubscriptionStatus, UserId};

use crate::crypto::verify_stripe_signature;
use crate::error::ApiError;
use crate::state::AppState;

/// Stripe webhook payload (simplified).
#[derive(Debug, Deserialize)]
pub struct StripeWebhook {
    /// Event ID.
    pub id: String,
    /// Event type.
    #[serde(rename = "type")]
    pub event_type: String,
    /// When the provider created the event (unix seconds).
    pub created: i64,
    /// Event data.
    pub data: StripeEventData,
}

/// Stripe event data container.
#[derive(Debug, Deserialize)]
pub struct StripeEventData {
    /// Event object.
    pub object: serde_json::Value,
}

/// The subscription fields the mirror keeps.
#[derive(Debug, Deserialize)]
struct StripeSubscription {
    id: String,
    #[serde(default)]
    customer: Option<String>,
    status: String,
    #[serde(default)]
    current_period_end: Option<i64>,
    #[serde(default)]
    metadata: std::collections::HashMap<String, String>,
    #[serde(default)]
    items: Option<StripeList<StripeItem>>,
}

#[derive(Debug, Deserialize)]
struct StripeList<T> {
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct StripeItem {
    #[serde(default)]
    price: Option<StripePrice>,
    #[serde(default)]
    current_period_end: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct StripePrice {
    id: String,
}

impl StripeSubscription {
    fn price_id(&self) -> Option<String> {
        self.items
            .as_ref()
            .and_then(|items| items.data.first())
            .and_then(|item| item.price.as_ref())
            .map(|price| price.id.clone())
    }

    /// Newer API versions report the period end per item.
    fn period_end(&self) -> Option<i64> {
        self.current_period_end.or_else(|| {
            self.items
                .as_ref()
                .and_then(|items| items.data.first())
                .and_then(|item| item.current_period_end)
        })
    }
}

/// Webhook response.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    /// Whether the webhook was received.
    pub received: bool,
}

/// Handle Stripe webhooks.
pub async fn stripe_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<WebhookResponse>, ApiError> {
    if let Some(secret) = &state.config.stripe_webhook_secret {
        let signature = headers
            .get("stripe-signature")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::BadRequest("Missing Stripe signature".into()))?;

        verify_stripe_signature(
            &body,
            signature,
            secret,
            state.config.webhook_tolerance_seconds,
            Utc::now().timestamp(),
        )
        .map_err(|e| {
            tracing::warn!(error = %e, "Invalid Stripe webhook signature");
            ApiError::BadRequest("Invalid webhook signature".into())
        })?;
    } else {
        tracing::warn!("Stripe webhook_secret not configured - skipping signature verification");
    }

    let webhook: StripeWebhook =
        serde_json::from_str(&body).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    tracing::info!(
        event_type = %webhook.event_type,
        event_id = %webhook.id,
        "Received Stripe webhook"
    );

    match webhook.event_type.as_str() {
        "customer.subscription.created" | "customer.subscription.updated" => {
            handle_subscription_event(&state, &webhook, false).await?;
        }
        "customer.subscription.deleted" => {
            handle_subscription_event(&state, &webhook, true).await?;
        }
        _ => {
            tracing::debug!(event_type = %webhook.event_type, "Unhandled Stripe event");
        }
    }

    Ok(Json(WebhookResponse { received: true }))
}

async fn handle_subscription_event(
    state: &AppState,
    webhook: &StripeWebhook,
    deleted: bool,
) -> Result<(), ApiError> {
    let object: StripeSubscription = serde_json::from_value(webhook.data.object.clone())
        .map_err(|e| ApiError::BadRequest(format!("Invalid subscription object: {e}")))?;

    let Some(user_id) = resolve_user(state, &object).await? else {
        tracing::warn!(
            event_id = %webhook.id,
            subscription_id = %object.id,
            "Subscription event for unknown user - ignoring"
        );
        return Ok(());
    };

    let event_at = timestamp(webhook.created)?;
    let status = if deleted {
        SubscriptionStatus::Canceled
    } else {
        SubscriptionStatus::parse(&object.status)
    };
    let current_period_end = match object.period_end() {
        Some(secs) => timestamp(secs)?,
        None if deleted => event_at,
        None => {
            return Err(ApiError::BadRequest(
                "Subscription has no current_period_end".into(),
            ))
        }
    };

    let subscription = Subscription {
        user_id,
        status,
        current_period_end,
        stripe_subscription_id: object.id.clone(),
        stripe_price_id: object.price_id(),
        last_event_at: event_at,
        updated_at: Utc::now(),
    };

    if state.store.upsert_subscription(&subscription).await? {
        tracing::info!(
            user_id = %user_id,
            subscription_id = %object.id,
            status = %status,
            "Subscription mirrored"
        );
    } else {
        tracing::info!(
            user_id = %user_id,
            event_id = %webhook.id,
            "Stale subscription event ignored"
        );
    }

    Ok(())
}

/// Find the local user a subscription belongs to.
///
/// Checkout stores the user id in the subscription metadata; older
/// subscriptions are matched through the linked Stripe customer.
async fn resolve_user(
    state: &AppState,
    object: &StripeSubscription,
) -> Result<Option<UserId>, ApiError> {
    let from_metadata = object
        .metadata
        .get("user_id")
        .and_then(|raw| raw.parse::<UserId>().ok());

    let candidate = match (from_metadata, object.customer.as_deref()) {
        (Some(user_id), _) => Some(user_id),
        (None, Some(customer)) => state.store.find_user_by_stripe_customer(customer).await?,
        (None, None) => None,
    };

    let Some(user_id) = candidate else {
        return Ok(None);
    };

    // Mirrored rows reference an existing user.
    Ok(state.store.get_user(user_id).await?.map(|user| user.id))
}

fn timestamp(secs: i64) -> Result<DateTime<Utc>, ApiError> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| ApiError::BadRequest(format!("Invalid timestamp: {secs}")))
}
