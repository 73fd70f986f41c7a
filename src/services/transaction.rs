//! Transaction processing
//!
//! Produces the transaction outcome for a validated amount. This is the
//! side-effecting step the idempotency gate protects: it must run at most
//! once per token per TTL window. The outcome decision itself sits behind
//! [`OutcomeDecider`] so a real gateway call can replace the simulated
//! draw, and so tests can force either path.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Closed set of transaction outcomes. A FAILED transaction is a normal
/// result value, cached and returned like any other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionStatus {
    #[serde(rename = "SUCCESS")]
    Success,
    #[serde(rename = "FAILED")]
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Success => "SUCCESS",
            TransactionStatus::Failed => "FAILED",
        }
    }
}

/// Immutable outcome of one first-execution of a payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionResult {
    pub transaction_id: Uuid,
    pub amount: f64,
    pub status: TransactionStatus,
}

/// Decides the outcome of a charge. The production implementation draws
/// uniformly at random; a payment-gateway client would slot in here.
pub trait OutcomeDecider: Send + Sync {
    fn decide(&self, amount: f64) -> TransactionStatus;
}

/// Simulated charge: uniform SUCCESS/FAILED draw.
#[derive(Debug, Default)]
pub struct RandomOutcome;

impl OutcomeDecider for RandomOutcome {
    fn decide(&self, _amount: f64) -> TransactionStatus {
        if rand::thread_rng().gen_bool(0.5) {
            TransactionStatus::Success
        } else {
            TransactionStatus::Failed
        }
    }
}

/// Generates transaction results for validated amounts.
#[derive(Clone)]
pub struct TransactionProcessor {
    decider: Arc<dyn OutcomeDecider>,
}

impl TransactionProcessor {
    pub fn new(decider: Arc<dyn OutcomeDecider>) -> Self {
        Self { decider }
    }

    /// Processor with the simulated random gateway.
    pub fn simulated() -> Self {
        Self::new(Arc::new(RandomOutcome))
    }

    /// Execute the charge once: fresh transaction id, decided outcome.
    pub fn process(&self, amount: f64) -> TransactionResult {
        TransactionResult {
            transaction_id: Uuid::new_v4(),
            amount,
            status: self.decider.decide(amount),
        }
    }
}
