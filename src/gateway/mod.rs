//! The payment-gateway capability.
//!
//! The core only needs two things from a gateway: opening a checkout session
//! for an amount, and a way to tell that a confirmation really came from the
//! gateway. Both live here; the wire protocol beyond that is the gateway's.

pub mod client;
pub mod signature;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use client::HttpPaymentGateway;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Invalid response from gateway: {0}")]
    InvalidResponse(String),
    #[error("Circuit breaker open: {0}")]
    CircuitBreakerOpen(String),
}

/// Handle for a checkout session opened at the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewaySession {
    pub session_id: String,
    pub checkout_url: Option<String>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn initiate_session(
        &self,
        order_id: Uuid,
        amount: &BigDecimal,
    ) -> Result<GatewaySession, GatewayError>;
}

/// Opens sessions locally without any network call. Used by the in-memory
/// development mode and by tests; sessions are then finalized through the
/// signed confirmation endpoint or the CLI.
#[derive(Debug, Clone, Default)]
pub struct SandboxGateway;

#[async_trait]
impl PaymentGateway for SandboxGateway {
    async fn initiate_session(
        &self,
        order_id: Uuid,
        _amount: &BigDecimal,
    ) -> Result<GatewaySession, GatewayError> {
        let session_id = format!("sandbox_{}", Uuid::new_v4().simple());
        Ok(GatewaySession {
            checkout_url: Some(format!("sandbox://checkout/{}/{}", order_id, session_id)),
            session_id,
        })
    }
}
