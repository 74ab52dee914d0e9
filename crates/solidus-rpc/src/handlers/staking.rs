//! Staking policy and kernel-scan handlers.

use crate::params::*;
use crate::{AppState, RpcError, RpcResult};
use num_bigint::BigUint;
use serde_json::{json, Value};
use solidus_chain::{bits_to_target, format_coin, target_to_bits, Hash256, ONE_DAY};
use solidus_kernel::{KernelEvaluator, KernelInput};

/// `reservebalance [<reserve> [amount]]`
pub fn reservebalance(state: &AppState, params: &[Value]) -> RpcResult<Value> {
    if !params.is_empty() {
        let reserve = bool_param(params, 0, "reserve")?;
        if reserve {
            if params.len() < 2 {
                return Err(RpcError::invalid_parameter(
                    "must provide amount to reserve balance",
                ));
            }
            let amount = amount_param(params, 1, "amount")?;
            state.wallet.set_reserve_balance(amount)?;
        } else {
            if params.len() > 1 {
                return Err(RpcError::invalid_parameter(
                    "cannot specify amount to turn off reserve",
                ));
            }
            state.wallet.set_reserve_balance(0)?;
        }
    }

    let reserve = state.wallet.reserve_balance();
    Ok(json!({
        "reserve": reserve > 0,
        "amount": format_coin(reserve),
    }))
}

/// Compact target scaled down from the proof-of-stake limit by a
/// difficulty figure.
fn bits_for_difficulty(state: &AppState, difficulty: f64) -> RpcResult<u32> {
    if difficulty <= 0.0 {
        return Err(RpcError::invalid_parameter(
            "diff must be greater than zero",
        ));
    }
    let limit = bits_to_target(state.chain.params().pos_limit_bits)?;
    let scaled = limit * BigUint::from(1_000u32) / BigUint::from((difficulty * 1_000.0) as u64);
    Ok(target_to_bits(&scaled))
}

/// `scaninput {"txid": txid, "vout": [n, ...], "difficulty": d, "days": n}`
///
/// Scans a wallet transaction's outputs for kernel solutions over a
/// future window. Advisory; the real lottery runs in the staking loop.
pub fn scaninput(state: &AppState, params: &[Value]) -> RpcResult<Value> {
    let scan = params
        .first()
        .and_then(|v| v.as_object())
        .ok_or_else(|| RpcError::type_error("expected scan parameters object"))?;

    let txid_str = scan
        .get("txid")
        .and_then(|v| v.as_str())
        .ok_or_else(|| RpcError::invalid_parameter("missing txid key"))?;
    let txid = Hash256::from_hex(txid_str)
        .map_err(|_| RpcError::invalid_parameter("expected hex txid"))?;

    let days = match scan.get("days") {
        Some(v) => {
            let days = v
                .as_i64()
                .ok_or_else(|| RpcError::type_error("expected integer days"))?;
            if days <= 0 {
                return Err(RpcError::invalid_parameter(
                    "interval length must be greater than zero",
                ));
            }
            days
        }
        None => 90,
    };

    let bits = match scan.get("difficulty") {
        Some(v) => {
            let difficulty = v
                .as_f64()
                .ok_or_else(|| RpcError::type_error("expected numeric difficulty"))?;
            bits_for_difficulty(state, difficulty)?
        }
        None => state.chain.next_target_required(true),
    };

    let wtx = state.wallet.get_tx(&txid).ok_or_else(|| {
        RpcError::new(
            crate::error::RPC_INVALID_ADDRESS_OR_KEY,
            "Unable to find transaction in the wallet",
        )
    })?;
    let block_hash = wtx.block_hash.ok_or_else(|| {
        RpcError::new(
            crate::error::RPC_INVALID_ADDRESS_OR_KEY,
            "Unable to find transaction in the blockchain",
        )
    })?;
    let index = state
        .chain
        .get(&block_hash)
        .ok_or_else(|| RpcError::misc("containing block is not in the index"))?;

    let vouts: Vec<u32> = match scan.get("vout") {
        Some(Value::Number(n)) => vec![n
            .as_u64()
            .ok_or_else(|| RpcError::invalid_parameter("input number out of range"))?
            as u32],
        Some(Value::Array(values)) => values
            .iter()
            .map(|v| {
                v.as_u64()
                    .map(|n| n as u32)
                    .ok_or_else(|| RpcError::invalid_parameter("input number out of range"))
            })
            .collect::<RpcResult<Vec<u32>>>()?,
        None => (0..wtx.tx.vout.len() as u32).collect(),
        Some(_) => return Err(RpcError::type_error("expected vout number or array")),
    };
    for vout in &vouts {
        if *vout as usize >= wtx.tx.vout.len() {
            return Err(RpcError::invalid_parameter(format!(
                "input number {} is out of range",
                vout
            )));
        }
    }

    let evaluator = KernelEvaluator::new(state.chain.params().clone());
    let now = state.chain.adjusted_time();
    let t0 = now as u32;
    let t1 = (now + days * ONE_DAY) as u32;

    let mut results = Vec::with_capacity(vouts.len());
    for vout in vouts {
        let value = wtx.tx.vout[vout as usize].value;
        if value == 0 {
            continue;
        }
        let input = KernelInput {
            stake_modifier: index.stake_modifier,
            prev_block_time: wtx.block_time as u32,
            tx_offset: wtx.tx_offset,
            tx_time: wtx.tx.n_time,
            vout,
        };
        let solution = evaluator
            .scan_window(&input, value, bits, t0, t1)
            .map_err(|e| RpcError::misc(e.to_string()))?;
        results.push(match solution {
            Some(hit) => json!({
                "vout": vout,
                "solution": { "time": hit.time, "hash": hit.hash.to_string() },
            }),
            None => json!({ "vout": vout, "solution": Value::Null }),
        });
    }
    Ok(json!(results))
}
