//! Card-network style provider: payment intents created server side, confirmed
//! by the client, then read back by id.

use async_trait::async_trait;
use serde::Deserialize;

use super::{GatewayError, PaymentGateway, PaymentInit, PaymentSession, decode_response};
use crate::models::PaymentProvider;

const PROVIDER: PaymentProvider = PaymentProvider::Stripe;
const SUCCEEDED: &str = "succeeded";

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub client_secret: Option<String>,
}

impl PaymentIntent {
    pub fn is_settled(&self) -> bool {
        self.status == SUCCEEDED
    }
}

#[derive(Clone)]
pub struct StripeGateway {
    client: reqwest::Client,
    secret_key: String,
    api_base: String,
}

impl StripeGateway {
    pub fn new(client: reqwest::Client, secret_key: String, api_base: String) -> Self {
        Self {
            client,
            secret_key,
            api_base,
        }
    }

    pub async fn create_intent(
        &self,
        request: &PaymentInit,
    ) -> Result<PaymentIntent, GatewayError> {
        let amount = request.amount.minor().to_string();
        let response = self
            .client
            .post(format!("{}/payment_intents", self.api_base))
            .basic_auth(&self.secret_key, None::<&str>)
            .form(&[
                ("amount", amount.as_str()),
                ("currency", request.currency.as_str()),
                ("automatic_payment_methods[enabled]", "true"),
                ("metadata[order_number]", request.order_number.as_str()),
            ])
            .send()
            .await
            .map_err(|source| GatewayError::Transport {
                provider: PROVIDER,
                source,
            })?;

        decode_response(PROVIDER, response, error_message).await
    }

    pub async fn retrieve(&self, intent_id: &str) -> Result<PaymentIntent, GatewayError> {
        let response = self
            .client
            .get(format!("{}/payment_intents/{intent_id}", self.api_base))
            .basic_auth(&self.secret_key, None::<&str>)
            .send()
            .await
            .map_err(|source| GatewayError::Transport {
                provider: PROVIDER,
                source,
            })?;

        decode_response(PROVIDER, response, error_message).await
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    fn provider(&self) -> PaymentProvider {
        PROVIDER
    }

    async fn initialize(&self, request: &PaymentInit) -> Result<PaymentSession, GatewayError> {
        let intent = self.create_intent(request).await?;
        let client_secret = intent.client_secret.ok_or_else(|| GatewayError::UnexpectedResponse {
            provider: PROVIDER,
            detail: "payment intent has no client_secret".into(),
        })?;
        Ok(PaymentSession {
            provider: PROVIDER,
            reference: intent.id,
            client_secret: Some(client_secret),
            authorization_url: None,
            access_code: None,
        })
    }

    async fn verify(&self, reference: &str) -> Result<bool, GatewayError> {
        let intent = self.retrieve(reference).await?;
        tracing::debug!(intent = %intent.id, status = %intent.status, "stripe intent retrieved");
        Ok(intent.is_settled())
    }
}

fn error_message(body: &serde_json::Value) -> Option<String> {
    body.get("error")?
        .get("message")?
        .as_str()
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_succeeded_counts_as_settled() {
        for (status, settled) in [
            ("succeeded", true),
            ("processing", false),
            ("requires_payment_method", false),
            ("Succeeded", false),
        ] {
            let intent: PaymentIntent = serde_json::from_value(serde_json::json!({
                "id": "pi_123",
                "status": status,
            }))
            .unwrap();
            assert_eq!(intent.is_settled(), settled, "{status}");
        }
    }

    #[test]
    fn error_body_message_is_extracted() {
        let body = serde_json::json!({
            "error": { "type": "invalid_request_error", "message": "No such payment_intent: 'pi_x'" }
        });
        assert_eq!(
            error_message(&body).as_deref(),
            Some("No such payment_intent: 'pi_x'")
        );
        assert_eq!(error_message(&serde_json::json!({})), None);
    }
}
