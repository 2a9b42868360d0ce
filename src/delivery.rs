use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;

/// Failure to acknowledge a delivery back to the broker. The broker channel
/// is assumed corrupted after this, so it aborts the whole pipeline.
#[derive(Debug, thiserror::Error, Clone)]
#[error("delivery acknowledgment failed: {0}")]
pub struct AckError(pub String);

/// Broker-side acknowledgment for one delivery. Must be invoked after the
/// delivery has been folded into local state, never before.
#[async_trait]
pub trait Acknowledger: Send {
    async fn ack(&mut self) -> Result<(), AckError>;
}

/// Acknowledger for sources that have no broker behind them (in-process
/// feeds, tests).
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAcknowledger;

#[async_trait]
impl Acknowledger for NoopAcknowledger {
    async fn ack(&mut self) -> Result<(), AckError> {
        Ok(())
    }
}

/// One inbound message event as seen by the aggregation core: its origin
/// tags, its payload, and the pending acknowledgment.
pub struct Delivery {
    pub exchange: String,
    pub routing_key: String,
    pub body: Bytes,
    acknowledger: Box<dyn Acknowledger>,
}

impl Delivery {
    #[must_use]
    pub fn new(
        exchange: impl Into<String>,
        routing_key: impl Into<String>,
        body: Bytes,
    ) -> Delivery {
        Delivery {
            exchange: exchange.into(),
            routing_key: routing_key.into(),
            body,
            acknowledger: Box::new(NoopAcknowledger),
        }
    }

    #[must_use]
    pub fn with_acknowledger(mut self, acknowledger: Box<dyn Acknowledger>) -> Delivery {
        self.acknowledger = acknowledger;
        self
    }

    pub async fn ack(&mut self) -> Result<(), AckError> {
        self.acknowledger.ack().await
    }
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery")
            .field("exchange", &self.exchange)
            .field("routing_key", &self.routing_key)
            .field("body_len", &self.body.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    struct FailingAcknowledger;

    #[async_trait]
    impl Acknowledger for FailingAcknowledger {
        async fn ack(&mut self) -> Result<(), AckError> {
            Err(AckError("channel gone".to_string()))
        }
    }

    #[tokio::test]
    async fn default_acknowledger_is_noop() {
        let mut delivery = Delivery::new("orders", "created", Bytes::from_static(b"payload"));
        assert_eq!(delivery.body.len(), 7);
        delivery.ack().await.unwrap();
    }

    #[tokio::test]
    async fn acknowledger_failure_surfaces() {
        let mut delivery = Delivery::new("orders", "created", Bytes::new())
            .with_acknowledger(Box::new(FailingAcknowledger));
        let err = delivery.ack().await.unwrap_err();
        assert!(err.to_string().contains("channel gone"));
    }
}
