use std::str::FromStr;

use rust_decimal::Decimal;
use thiserror::Error;

use super::Value;

#[derive(Debug, PartialEq, Error)]
pub enum SanitizeError {
    #[error("float {0} does not fit the decimal range")]
    OutOfRange(f64),
    #[error("float {0} needs more fractional digits than a decimal holds")]
    PrecisionLoss(f64),
}

/// Converts a float leaf to an exact decimal built from its shortest
/// round-trip text. Non-finite floats become null, other leaves pass through.
///
/// Parsing rounds text past 28 fractional digits, so the result is checked to
/// read back as the same float.
pub fn sanitize_number(value: Value) -> Result<Value, SanitizeError> {
    match value {
        Value::Float(f) if !f.is_finite() => Ok(Value::Null),
        Value::Float(f) => {
            let decimal = Decimal::from_str(&f.to_string()).map_err(|_| SanitizeError::OutOfRange(f))?;
            if decimal.to_string().parse::<f64>() != Ok(f) {
                return Err(SanitizeError::PrecisionLoss(f));
            }

            Ok(Value::Decimal(decimal))
        },
        other => Ok(other),
    }
}

pub fn sanitize(value: Value) -> Result<Value, SanitizeError> {
    value.try_map_leaves(&mut sanitize_number)
}
