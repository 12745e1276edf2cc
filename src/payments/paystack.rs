//! Redirect style provider: a transaction is initialised for a reference, the
//! customer pays on the provider's page, then the reference is verified.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{GatewayError, PaymentGateway, PaymentInit, PaymentSession, decode_response};
use crate::models::PaymentProvider;

const PROVIDER: PaymentProvider = PaymentProvider::Paystack;
const SUCCESS: &str = "success";

/// Every response is wrapped in `{status, message, data}`.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub status: bool,
    #[serde(default)]
    pub message: String,
    pub data: Option<T>,
}

#[derive(Debug, Deserialize)]
pub struct InitializeData {
    pub authorization_url: String,
    pub access_code: String,
    pub reference: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyData {
    pub status: String,
}

#[derive(Debug, Serialize)]
struct InitializeBody<'a> {
    email: &'a str,
    amount: i64,
    currency: String,
    metadata: serde_json::Value,
}

#[derive(Clone)]
pub struct PaystackGateway {
    client: reqwest::Client,
    secret_key: String,
    api_base: String,
}

impl PaystackGateway {
    pub fn new(client: reqwest::Client, secret_key: String, api_base: String) -> Self {
        Self {
            client,
            secret_key,
            api_base,
        }
    }
}

#[async_trait]
impl PaymentGateway for PaystackGateway {
    fn provider(&self) -> PaymentProvider {
        PROVIDER
    }

    async fn initialize(&self, request: &PaymentInit) -> Result<PaymentSession, GatewayError> {
        let body = InitializeBody {
            email: &request.email,
            amount: request.amount.minor(),
            currency: request.currency.to_ascii_uppercase(),
            metadata: serde_json::json!({ "order_number": request.order_number }),
        };
        let response = self
            .client
            .post(format!("{}/transaction/initialize", self.api_base))
            .bearer_auth(&self.secret_key)
            .json(&body)
            .send()
            .await
            .map_err(|source| GatewayError::Transport {
                provider: PROVIDER,
                source,
            })?;

        let envelope: Envelope<InitializeData> =
            decode_response(PROVIDER, response, error_message).await?;
        let data = match envelope {
            Envelope {
                status: true,
                data: Some(data),
                ..
            } => data,
            Envelope { message, .. } => {
                return Err(GatewayError::Rejected {
                    provider: PROVIDER,
                    message: if message.is_empty() {
                        "transaction was not initialized".into()
                    } else {
                        message
                    },
                });
            }
        };

        Ok(PaymentSession {
            provider: PROVIDER,
            reference: data.reference,
            client_secret: None,
            authorization_url: Some(data.authorization_url),
            access_code: Some(data.access_code),
        })
    }

    async fn verify(&self, reference: &str) -> Result<bool, GatewayError> {
        let response = self
            .client
            .get(format!("{}/transaction/verify/{reference}", self.api_base))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|source| GatewayError::Transport {
                provider: PROVIDER,
                source,
            })?;

        let envelope: Envelope<VerifyData> =
            decode_response(PROVIDER, response, error_message).await?;
        verification_succeeded(&envelope)
    }
}

/// A `status: false` envelope is a plain "not paid"; a successful envelope without
/// data is malformed.
pub fn verification_succeeded(envelope: &Envelope<VerifyData>) -> Result<bool, GatewayError> {
    if !envelope.status {
        return Ok(false);
    }
    let data = envelope
        .data
        .as_ref()
        .ok_or_else(|| GatewayError::UnexpectedResponse {
            provider: PROVIDER,
            detail: "verification response has no data".into(),
        })?;
    Ok(data.status == SUCCESS)
}

fn error_message(body: &serde_json::Value) -> Option<String> {
    body.get("message")?.as_str().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(json: serde_json::Value) -> Envelope<VerifyData> {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn success_status_settles() {
        let ok = envelope(serde_json::json!({
            "status": true,
            "message": "Verification successful",
            "data": { "status": "success", "reference": "ref_1" }
        }));
        assert!(verification_succeeded(&ok).unwrap());
    }

    #[test]
    fn abandoned_or_failed_does_not_settle() {
        for status in ["abandoned", "failed", "ongoing"] {
            let env = envelope(serde_json::json!({
                "status": true,
                "data": { "status": status }
            }));
            assert!(!verification_succeeded(&env).unwrap(), "{status}");
        }
    }

    #[test]
    fn false_envelope_is_not_an_error() {
        let env = envelope(serde_json::json!({ "status": false, "message": "nope" }));
        assert!(!verification_succeeded(&env).unwrap());
    }

    #[test]
    fn missing_data_is_unexpected() {
        let env = envelope(serde_json::json!({ "status": true }));
        assert!(matches!(
            verification_succeeded(&env),
            Err(GatewayError::UnexpectedResponse { .. })
        ));
    }
}
