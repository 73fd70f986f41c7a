//! Payment request validation
//!
//! Pure schema check over the raw JSON body. Accepts `amount` as a JSON
//! number or a numeric string; rejects anything missing, unparseable,
//! non-finite, or not strictly positive.

use serde_json::Value;

/// Validated payment request. Exists only for the duration of one call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaymentRequest {
    pub amount: f64,
}

/// Validate a parsed request body against the payment schema.
///
/// Returns `None` for an absent body, a missing `amount` field, a value
/// that cannot be read as a real number, or an amount `<= 0`.
pub fn validate_payment(payload: Option<&Value>) -> Option<PaymentRequest> {
    let payload = payload?;
    let amount = parse_amount(payload.get("amount")?)?;

    if !amount.is_finite() || amount <= 0.0 {
        return None;
    }

    Some(PaymentRequest { amount })
}

fn parse_amount(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|a| a.is_finite()),
        _ => None,
    }
}
