//! `PayPal` Orders API client.
//!
//! Uses OAuth2 client credentials. The access token is cached in memory and
//! fetched again shortly before it expires or after a 401.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::instrument;
use url::Url;

use folio_core::Money;
use folio_core::checkout::VerifiedPayment;

use super::{PaymentError, PaymentVerifier};
use crate::config::PayPalConfig;

/// Currency the store charges in.
const STORE_CURRENCY: &str = "USD";

/// Refresh the access token this long before `PayPal` says it expires.
const TOKEN_REFRESH_MARGIN: chrono::Duration = chrono::Duration::seconds(60);

/// `PayPal` Orders API client.
#[derive(Clone)]
pub struct PayPalClient {
    inner: Arc<PayPalClientInner>,
}

struct PayPalClientInner {
    client: reqwest::Client,
    api_base: Url,
    client_id: String,
    client_secret: SecretString,
    /// In-memory token cache
    token: RwLock<Option<AccessToken>>,
}

#[derive(Clone)]
struct AccessToken {
    value: SecretString,
    expires_at: DateTime<Utc>,
}

impl AccessToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + TOKEN_REFRESH_MARGIN < self.expires_at
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    /// Token lifetime in seconds.
    expires_in: i64,
}

/// The parts of a `PayPal` order we read.
#[derive(Debug, Deserialize)]
struct OrderResponse {
    id: String,
    status: String,
    #[serde(default)]
    purchase_units: Vec<PurchaseUnit>,
}

#[derive(Debug, Deserialize)]
struct PurchaseUnit {
    amount: Amount,
}

#[derive(Debug, Deserialize)]
struct Amount {
    currency_code: String,
    value: String,
}

impl PayPalClient {
    /// Create a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Configuration` if the API base is not a URL and
    /// `PaymentError::Http` if the HTTP client cannot be built.
    pub fn new(config: &PayPalConfig) -> Result<Self, PaymentError> {
        let api_base = Url::parse(&config.api_base)
            .map_err(|e| PaymentError::Configuration(format!("PAYPAL_API_BASE: {e}")))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            inner: Arc::new(PayPalClientInner {
                client,
                api_base,
                client_id: config.client_id.clone(),
                client_secret: config.client_secret.clone(),
                token: RwLock::new(None),
            }),
        })
    }

    /// Get a valid access token, fetching a new one when needed.
    #[instrument(skip(self))]
    async fn access_token(&self) -> Result<SecretString, PaymentError> {
        if let Some(token) = self.inner.token.read().await.as_ref()
            && token.is_fresh(Utc::now())
        {
            return Ok(token.value.clone());
        }

        let mut cached = self.inner.token.write().await;
        // Another request may have refreshed while we waited for the lock.
        if let Some(token) = cached.as_ref()
            && token.is_fresh(Utc::now())
        {
            return Ok(token.value.clone());
        }

        let url = self.endpoint(&["v1", "oauth2", "token"])?;
        let response = self
            .inner
            .client
            .post(url)
            .basic_auth(
                &self.inner.client_id,
                Some(self.inner.client_secret.expose_secret()),
            )
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PaymentError::Authentication(format!("HTTP {status}: {body}")));
        }

        let token: TokenResponse = response.json().await?;
        let access = AccessToken {
            value: SecretString::from(token.access_token),
            expires_at: Utc::now() + chrono::Duration::seconds(token.expires_in),
        };
        let value = access.value.clone();
        *cached = Some(access);

        tracing::debug!("Obtained PayPal access token");
        Ok(value)
    }

    async fn clear_token(&self) {
        *self.inner.token.write().await = None;
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, PaymentError> {
        let mut url = self.inner.api_base.clone();
        url.path_segments_mut()
            .map_err(|()| PaymentError::Configuration("PAYPAL_API_BASE cannot be a base".to_owned()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

#[async_trait]
impl PaymentVerifier for PayPalClient {
    #[instrument(skip(self))]
    async fn verify(&self, provider_order_id: &str) -> Result<VerifiedPayment, PaymentError> {
        let url = self.endpoint(&["v2", "checkout", "orders", provider_order_id])?;
        let token = self.access_token().await?;

        let response = self
            .inner
            .client
            .get(url)
            .bearer_auth(token.expose_secret())
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => {
                let order: OrderResponse = response.json().await?;
                let verified = verified_payment(order)?;
                tracing::info!(
                    provider_order_id = %verified.provider_order_id,
                    status = %verified.status,
                    amount = %verified.amount,
                    "Payment verified with PayPal"
                );
                Ok(verified)
            }
            StatusCode::NOT_FOUND => Err(PaymentError::OrderNotFound(provider_order_id.to_owned())),
            StatusCode::UNAUTHORIZED => {
                self.clear_token().await;
                Err(PaymentError::Authentication(
                    "access token rejected".to_owned(),
                ))
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(PaymentError::Provider {
                    status: status.as_u16(),
                    body,
                })
            }
        }
    }
}

/// Reduce a `PayPal` order to the status and total amount we check.
fn verified_payment(order: OrderResponse) -> Result<VerifiedPayment, PaymentError> {
    if order.purchase_units.is_empty() {
        return Err(PaymentError::InvalidResponse(
            "order has no purchase units".to_owned(),
        ));
    }

    let mut total = Decimal::ZERO;
    for unit in &order.purchase_units {
        if !unit.amount.currency_code.eq_ignore_ascii_case(STORE_CURRENCY) {
            return Err(PaymentError::UnsupportedCurrency(
                unit.amount.currency_code.clone(),
            ));
        }
        let value = unit.amount.value.parse::<Decimal>().map_err(|e| {
            PaymentError::InvalidResponse(format!("amount {:?}: {e}", unit.amount.value))
        })?;
        total = total.checked_add(value).ok_or_else(|| {
            PaymentError::InvalidResponse("order amount overflows".to_owned())
        })?;
    }
    let amount = Money::new(total)
        .map_err(|e| PaymentError::InvalidResponse(e.to_string()))?;

    Ok(VerifiedPayment {
        provider_order_id: order.id,
        status: order.status,
        amount,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn client() -> PayPalClient {
        PayPalClient::new(&PayPalConfig {
            api_base: "https://api-m.sandbox.paypal.com".to_string(),
            client_id: "client".to_string(),
            client_secret: SecretString::from("s3cr3t-Xk9#mP2$vL7@nQ4"),
        })
        .unwrap()
    }

    fn order(json: serde_json::Value) -> OrderResponse {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_completed_order_sums_purchase_units() {
        let verified = verified_payment(order(serde_json::json!({
            "id": "5O190127TN364715T",
            "status": "COMPLETED",
            "purchase_units": [
                { "amount": { "currency_code": "USD", "value": "15.00" } },
                { "amount": { "currency_code": "USD", "value": "5.00" } }
            ]
        })))
        .unwrap();

        assert_eq!(verified.provider_order_id, "5O190127TN364715T");
        assert!(verified.is_completed());
        assert_eq!(verified.amount, Money::from_cents(2000));
    }

    #[test]
    fn test_other_currency_is_declined() {
        let err = verified_payment(order(serde_json::json!({
            "id": "X",
            "status": "COMPLETED",
            "purchase_units": [{ "amount": { "currency_code": "EUR", "value": "20.00" } }]
        })))
        .unwrap_err();
        assert!(err.is_declined());
    }

    #[test]
    fn test_missing_purchase_units_is_invalid() {
        let err = verified_payment(order(serde_json::json!({ "id": "X", "status": "APPROVED" })))
            .unwrap_err();
        assert!(matches!(err, PaymentError::InvalidResponse(_)));
        assert!(!err.is_declined());
    }

    #[test]
    fn test_order_id_is_path_encoded() {
        let url = client()
            .endpoint(&["v2", "checkout", "orders", "A1/B2?x"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://api-m.sandbox.paypal.com/v2/checkout/orders/A1%2FB2%3Fx"
        );
    }

    #[test]
    fn test_token_freshness_margin() {
        let now = Utc::now();
        let token = AccessToken {
            value: SecretString::from("t"),
            expires_at: now + chrono::Duration::seconds(30),
        };
        assert!(!token.is_fresh(now));
        let token = AccessToken {
            expires_at: now + chrono::Duration::hours(1),
            ..token
        };
        assert!(token.is_fresh(now));
    }
}
