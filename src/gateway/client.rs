use async_trait::async_trait;
use bigdecimal::BigDecimal;
use failsafe::futures::CircuitBreaker as FuturesCircuitBreaker;
use failsafe::{backoff, failure_policy, Config, Error as FailsafeError, StateMachine};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use uuid::Uuid;

use super::{GatewayError, GatewaySession, PaymentGateway};

#[derive(Debug, Serialize)]
struct SessionRequest<'a> {
    order_id: Uuid,
    amount: &'a BigDecimal,
}

/// HTTP client for the gateway's session API, guarded by a circuit breaker
/// so a failing gateway is not hammered by every checkout.
#[derive(Clone)]
pub struct HttpPaymentGateway {
    client: Client,
    base_url: String,
    api_key: String,
    circuit_breaker: StateMachine<failure_policy::ConsecutiveFailures<backoff::EqualJittered>, ()>,
}

impl HttpPaymentGateway {
    pub fn new(base_url: String, api_key: String) -> Self {
        Self::with_circuit_breaker(base_url, api_key, 3, 60)
    }

    pub fn with_circuit_breaker(
        base_url: String,
        api_key: String,
        failure_threshold: u32,
        reset_timeout_secs: u64,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_default();

        let backoff = backoff::equal_jittered(
            Duration::from_secs(reset_timeout_secs),
            Duration::from_secs(reset_timeout_secs * 2),
        );
        let policy = failure_policy::consecutive_failures(failure_threshold, backoff);
        let circuit_breaker = Config::new().failure_policy(policy).build();

        HttpPaymentGateway {
            client,
            base_url,
            api_key,
            circuit_breaker,
        }
    }

    pub fn circuit_state(&self) -> &'static str {
        if self.circuit_breaker.is_call_permitted() {
            "closed"
        } else {
            "open"
        }
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn initiate_session(
        &self,
        order_id: Uuid,
        amount: &BigDecimal,
    ) -> Result<GatewaySession, GatewayError> {
        let url = format!("{}/sessions", self.base_url.trim_end_matches('/'));
        let request = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&SessionRequest { order_id, amount });

        let result = self
            .circuit_breaker
            .call(async move {
                let response = request.send().await?.error_for_status()?;
                let session = response.json::<GatewaySession>().await?;
                if session.session_id.trim().is_empty() {
                    return Err(GatewayError::InvalidResponse(
                        "empty session_id".to_string(),
                    ));
                }
                Ok(session)
            })
            .await;

        match result {
            Ok(session) => {
                tracing::info!(order_id = %order_id, session_id = %session.session_id, "gateway session opened");
                Ok(session)
            }
            Err(FailsafeError::Rejected) => {
                tracing::warn!(order_id = %order_id, "payment gateway circuit breaker is open");
                Err(GatewayError::CircuitBreakerOpen(
                    "payment gateway circuit breaker is open".to_string(),
                ))
            }
            Err(FailsafeError::Inner(e)) => {
                tracing::warn!(order_id = %order_id, error = %e, "payment gateway call failed");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_gateway_starts_closed() {
        let gateway = HttpPaymentGateway::new(
            "https://gateway.example.com".to_string(),
            "key".to_string(),
        );
        assert_eq!(gateway.circuit_state(), "closed");
    }

    #[tokio::test]
    async fn test_initiate_session_with_mock() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/sessions")
            .match_header("authorization", "Bearer test-key")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"session_id":"sess_123","checkout_url":"https://pay.example/sess_123"}"#)
            .create_async()
            .await;

        let gateway = HttpPaymentGateway::new(server.url(), "test-key".to_string());
        let session = gateway
            .initiate_session(Uuid::new_v4(), &BigDecimal::from(430))
            .await
            .unwrap();

        assert_eq!(session.session_id, "sess_123");
        assert_eq!(
            session.checkout_url.as_deref(),
            Some("https://pay.example/sess_123")
        );
    }

    #[tokio::test]
    async fn test_upstream_error_is_reported() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/sessions")
            .with_status(503)
            .create_async()
            .await;

        let gateway = HttpPaymentGateway::new(server.url(), "test-key".to_string());
        let result = gateway
            .initiate_session(Uuid::new_v4(), &BigDecimal::from(10))
            .await;

        assert!(matches!(result, Err(GatewayError::Request(_))));
    }

    #[tokio::test]
    async fn test_circuit_breaker_opens_after_failures() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/sessions")
            .with_status(500)
            .expect_at_least(2)
            .create_async()
            .await;

        let gateway =
            HttpPaymentGateway::with_circuit_breaker(server.url(), "test-key".to_string(), 2, 60);
        for _ in 0..2 {
            let _ = gateway
                .initiate_session(Uuid::new_v4(), &BigDecimal::from(10))
                .await;
        }

        let result = gateway
            .initiate_session(Uuid::new_v4(), &BigDecimal::from(10))
            .await;
        assert!(matches!(result, Err(GatewayError::CircuitBreakerOpen(_))));
        assert_eq!(gateway.circuit_state(), "open");
    }
}
