//! Positional parameter helpers.
//!
//! Parameters arrive as a JSON array; these helpers pull typed values
//! out with the type-error code on mismatch. Amounts are accepted as
//! JSON numbers or decimal strings and land in sub-units.

use crate::{RpcError, RpcResult};
use serde_json::Value;
use solidus_chain::{parse_coin, COIN};

/// Required string at `idx`.
pub fn str_param(params: &[Value], idx: usize, name: &str) -> RpcResult<String> {
    params
        .get(idx)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| RpcError::type_error(format!("expected string parameter {}", name)))
}

/// Optional string at `idx`; null and absent are both `None`.
pub fn opt_str_param(params: &[Value], idx: usize) -> Option<String> {
    params
        .get(idx)
        .filter(|v| !v.is_null())
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

/// Required integer at `idx`.
pub fn int_param(params: &[Value], idx: usize, name: &str) -> RpcResult<i64> {
    params
        .get(idx)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| RpcError::type_error(format!("expected integer parameter {}", name)))
}

/// Optional integer with a default.
pub fn opt_int_param(params: &[Value], idx: usize, default: i64) -> RpcResult<i64> {
    match params.get(idx) {
        None => Ok(default),
        Some(Value::Null) => Ok(default),
        Some(v) => v
            .as_i64()
            .ok_or_else(|| RpcError::type_error("expected integer parameter")),
    }
}

/// Required boolean at `idx`.
pub fn bool_param(params: &[Value], idx: usize, name: &str) -> RpcResult<bool> {
    params
        .get(idx)
        .and_then(|v| v.as_bool())
        .ok_or_else(|| RpcError::type_error(format!("expected boolean parameter {}", name)))
}

/// Optional boolean with a default.
pub fn opt_bool_param(params: &[Value], idx: usize, default: bool) -> RpcResult<bool> {
    match params.get(idx) {
        None => Ok(default),
        Some(Value::Null) => Ok(default),
        Some(v) => v
            .as_bool()
            .ok_or_else(|| RpcError::type_error("expected boolean parameter")),
    }
}

/// Amount at `idx`, as a decimal string or JSON number.
pub fn amount_param(params: &[Value], idx: usize, name: &str) -> RpcResult<i64> {
    let value = params
        .get(idx)
        .ok_or_else(|| RpcError::type_error(format!("expected amount parameter {}", name)))?;
    amount_from_value(value)
}

/// Convert a JSON value to sub-units.
pub fn amount_from_value(value: &Value) -> RpcResult<i64> {
    let amount = match value {
        Value::String(s) => parse_coin(s).map_err(|e| RpcError::type_error(e.to_string()))?,
        Value::Number(n) => {
            let coins = n
                .as_f64()
                .ok_or_else(|| RpcError::type_error("invalid amount"))?;
            if !coins.is_finite() {
                return Err(RpcError::type_error("invalid amount"));
            }
            (coins * COIN as f64).round() as i64
        }
        _ => return Err(RpcError::type_error("invalid amount")),
    };
    if amount < 0 {
        return Err(RpcError::type_error("amount cannot be negative"));
    }
    Ok(amount)
}

/// Account name parameter, rejecting the reserved `*`.
pub fn account_param(params: &[Value], idx: usize) -> RpcResult<String> {
    let account = str_param(params, idx, "account")?;
    if account == "*" {
        return Err(RpcError::new(
            crate::error::RPC_WALLET_INVALID_ACCOUNT_NAME,
            "Invalid account name",
        ));
    }
    Ok(account)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_amount_from_number_and_string() {
        assert_eq!(amount_from_value(&json!(1.5)).unwrap(), COIN + COIN / 2);
        assert_eq!(amount_from_value(&json!("2.25")).unwrap(), 2 * COIN + COIN / 4);
        assert!(amount_from_value(&json!(-1.0)).is_err());
        assert!(amount_from_value(&json!(true)).is_err());
    }

    #[test]
    fn test_account_param_rejects_wildcard() {
        let params = vec![json!("*")];
        let err = account_param(&params, 0).unwrap_err();
        assert_eq!(err.code, crate::error::RPC_WALLET_INVALID_ACCOUNT_NAME);
    }

    #[test]
    fn test_optional_defaults() {
        let params: Vec<Value> = vec![];
        assert_eq!(opt_int_param(&params, 0, 7).unwrap(), 7);
        assert!(opt_bool_param(&params, 0, true).unwrap());
        assert_eq!(opt_str_param(&params, 0), None);
    }
}
