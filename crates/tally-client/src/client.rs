//! Tally HTTP client implementation.

use reqwest::{Client, StatusCode};
use std::time::Duration;

use crate::error::ClientError;
use crate::types::{
    ApiErrorResponse, BalanceResponse, ConsumeRequest, ConsumeResult, SubscriptionResponse,
    SubscriptionView,
};

/// Tally API client.
///
/// Every call is made on behalf of one user, identified by the bearer token
/// passed to it.
#[derive(Debug, Clone)]
pub struct TallyClient {
    client: Client,
    base_url: String,
}

impl TallyClient {
    /// Create a new tally client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Base URL of the tally service (e.g., `"http://tally:8080"`)
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::with_options(base_url, ClientOptions::default())
    }

    /// Create a new tally client with custom options.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_options(
        base_url: impl Into<String>,
        options: ClientOptions,
    ) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(options.timeout_seconds))
            .build()
            .map_err(|e| ClientError::Configuration(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Debit `amount` credits from the token holder's balance.
    ///
    /// Rejections (not authenticated, insufficient credits, unknown user)
    /// come back as a [`ConsumeResult`] with `success == false`, not as an
    /// error.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response is not a
    /// consume result.
    pub async fn consume(&self, user_jwt: &str, amount: i64) -> Result<ConsumeResult, ClientError> {
        let url = format!("{}/v1/credits/consume", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("authorization", format!("Bearer {user_jwt}"))
            .json(&ConsumeRequest { amount })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        match serde_json::from_str::<ConsumeResult>(&body) {
            Ok(result) => {
                if !result.success {
                    tracing::debug!(status = %status, message = %result.message, "Consume rejected");
                }
                Ok(result)
            }
            Err(_) if !status.is_success() => Err(api_error(status, &body)),
            Err(e) => Err(ClientError::Serialization(e)),
        }
    }

    /// Get the token holder's current balance.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn balance(&self, user_jwt: &str) -> Result<i64, ClientError> {
        let url = format!("{}/v1/credits/balance", self.base_url);

        let response = self
            .client
            .get(&url)
            .header("authorization", format!("Bearer {user_jwt}"))
            .send()
            .await?;

        let body: BalanceResponse = self.handle_response(response).await?;
        Ok(body.credits)
    }

    /// Get the token holder's subscription, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn subscription(
        &self,
        user_jwt: &str,
    ) -> Result<Option<SubscriptionView>, ClientError> {
        let url = format!("{}/v1/subscription", self.base_url);

        let response = self
            .client
            .get(&url)
            .header("authorization", format!("Bearer {user_jwt}"))
            .send()
            .await?;

        let body: SubscriptionResponse = self.handle_response(response).await?;
        Ok(body.subscription)
    }

    /// Handle API response and convert errors.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = response.status();

        if status.is_success() {
            return Ok(response.json().await?);
        }

        let body = response.text().await?;
        Err(api_error(status, &body))
    }
}

/// Map a non-success response body to a typed error.
fn api_error(status: StatusCode, body: &str) -> ClientError {
    match serde_json::from_str::<ApiErrorResponse>(body) {
        Ok(api_error) => match api_error.error.code.as_str() {
            "unauthorized" => ClientError::Unauthorized,
            "not_found" => ClientError::UserNotFound,
            code => ClientError::Api {
                code: code.to_string(),
                message: api_error.error.message,
                status: status.as_u16(),
            },
        },
        Err(_) => ClientError::Api {
            code: "unknown".to_string(),
            message: format!("HTTP {status}"),
            status: status.as_u16(),
        },
    }
}

/// Client options for customization.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Request timeout in seconds (default: 30).
    pub timeout_seconds: u64,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
        }
    }
}
