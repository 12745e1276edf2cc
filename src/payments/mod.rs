//! Payment provider adapters.
//!
//! Each provider sits behind [`PaymentGateway`], which reduces its own response
//! shape to a single "did this reference settle" answer. Nothing outside this
//! module branches on provider identity.

use std::{collections::HashMap, fmt, sync::Arc, time::Duration};

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;
use utoipa::ToSchema;

use crate::{config::PaymentConfig, models::PaymentProvider, money::Money};

pub mod paystack;
pub mod stripe;

pub use paystack::PaystackGateway;
pub use stripe::StripeGateway;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("{0} is not configured")]
    NotConfigured(PaymentProvider),

    #[error("{provider} request failed: {source}")]
    Transport {
        provider: PaymentProvider,
        #[source]
        source: reqwest::Error,
    },

    #[error("{provider} returned an unexpected response: {detail}")]
    UnexpectedResponse {
        provider: PaymentProvider,
        detail: String,
    },

    #[error("{provider} rejected the request: {message}")]
    Rejected {
        provider: PaymentProvider,
        message: String,
    },
}

/// What a gateway needs to open a payment for an order.
#[derive(Debug, Clone)]
pub struct PaymentInit {
    pub order_number: String,
    pub email: String,
    pub amount: Money,
    pub currency: String,
}

/// Provider-specific data the client needs to complete payment.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PaymentSession {
    pub provider: PaymentProvider,
    /// Identifier later passed back to verification.
    pub reference: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorization_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_code: Option<String>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn provider(&self) -> PaymentProvider;

    /// Open a payment with the provider.
    async fn initialize(&self, request: &PaymentInit) -> Result<PaymentSession, GatewayError>;

    /// `Ok(true)` only when the provider reports the reference as settled.
    async fn verify(&self, reference: &str) -> Result<bool, GatewayError>;
}

/// Registry of configured providers.
#[derive(Clone, Default)]
pub struct PaymentGateways {
    currency: String,
    gateways: HashMap<PaymentProvider, Arc<dyn PaymentGateway>>,
}

impl fmt::Debug for PaymentGateways {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaymentGateways")
            .field("currency", &self.currency)
            .field("providers", &self.gateways.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl PaymentGateways {
    pub fn new(currency: impl Into<String>) -> Self {
        Self {
            currency: currency.into(),
            gateways: HashMap::new(),
        }
    }

    pub fn with_gateway(mut self, gateway: Arc<dyn PaymentGateway>) -> Self {
        self.gateways.insert(gateway.provider(), gateway);
        self
    }

    /// Build the HTTP adapters for every provider that has credentials.
    pub fn from_config(config: &PaymentConfig) -> anyhow::Result<Self> {
        let client = http_client(config.timeout)?;
        let mut gateways = Self::new(config.currency.clone());
        if let Some(creds) = &config.stripe {
            gateways = gateways.with_gateway(Arc::new(StripeGateway::new(
                client.clone(),
                creds.secret_key.clone(),
                creds.api_base.clone(),
            )));
        }
        if let Some(creds) = &config.paystack {
            gateways = gateways.with_gateway(Arc::new(PaystackGateway::new(
                client,
                creds.secret_key.clone(),
                creds.api_base.clone(),
            )));
        }
        Ok(gateways)
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn get(&self, provider: PaymentProvider) -> Result<Arc<dyn PaymentGateway>, GatewayError> {
        self.gateways
            .get(&provider)
            .cloned()
            .ok_or(GatewayError::NotConfigured(provider))
    }

    pub fn providers(&self) -> Vec<PaymentProvider> {
        self.gateways.keys().copied().collect()
    }
}

/// Decode a provider response, turning non-2xx answers into [`GatewayError::Rejected`]
/// with whatever message the provider put in its error body.
pub(crate) async fn decode_response<T: DeserializeOwned>(
    provider: PaymentProvider,
    response: reqwest::Response,
    error_message: fn(&serde_json::Value) -> Option<String>,
) -> Result<T, GatewayError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|source| GatewayError::Transport { provider, source })?;

    if !status.is_success() {
        let message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .as_ref()
            .and_then(error_message)
            .unwrap_or_else(|| format!("HTTP {status}"));
        return Err(GatewayError::Rejected { provider, message });
    }

    serde_json::from_str(&body).map_err(|err| GatewayError::UnexpectedResponse {
        provider,
        detail: err.to_string(),
    })
}

fn http_client(timeout: Duration) -> anyhow::Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("storefront-checkout/", env!("CARGO_PKG_VERSION")))
        .build()?)
}
