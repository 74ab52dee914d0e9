//! Node and staking status handlers.

use crate::{AppState, RpcResult};
use serde_json::{json, Value};
use solidus_chain::{format_coin, TIME_OFFSET_UNKNOWN};

/// Protocol version reported by `getinfo`.
const PROTOCOL_VERSION: u32 = 70_001;

fn offset_or_null(offset: i64) -> Value {
    if offset == TIME_OFFSET_UNKNOWN {
        Value::Null
    } else {
        json!(offset)
    }
}

/// `getinfo`
pub fn getinfo(state: &AppState, _params: &[Value]) -> RpcResult<Value> {
    let chain = &state.chain;
    let wallet = &state.wallet;
    let time = chain.time();
    let balances = wallet.balances();
    let params = chain.params();

    let mut obj = json!({
        "version": env!("CARGO_PKG_VERSION"),
        "protocolversion": PROTOCOL_VERSION,
        "walletversion": 1,
        "balance": format_coin(balances.balance),
        "unspendable": format_coin(balances.watch_only),
        "newmint": format_coin(balances.new_mint),
        "stake": format_coin(balances.stake),
        "blocks": chain.height(),
        "timestamping": {
            "systemclock": time.system_time(),
            "adjustedtime": time.adjusted_time(),
            "ntpoffset": offset_or_null(time.ntp_offset()),
            "p2poffset": offset_or_null(time.peer_offset()),
        },
        "moneysupply": format_coin(chain.best().map(|t| t.money_supply).unwrap_or(0)),
        "difficulty": {
            "proof-of-work": chain.difficulty(false),
            "proof-of-stake": chain.difficulty(true),
        },
        "keypoolsize": wallet.keystore().pool_size(),
        "paytxfee": format_coin(params.min_tx_fee),
        "mininput": format_coin(params.min_input_value),
        "errors": state.minter.warning().unwrap_or_default(),
    });
    if wallet.is_crypted() {
        obj["unlocked_until"] = json!(wallet.relocker().unlocked_until_secs());
    }
    Ok(obj)
}

/// `getstakinginfo`
pub fn getstakinginfo(state: &AppState, _params: &[Value]) -> RpcResult<Value> {
    let chain = &state.chain;
    let stats = state.minter.stats();
    let params = chain.params();

    Ok(json!({
        "blocks": chain.height(),
        "staking": state.minter.staking_allowed() && chain.is_synced(),
        "stakeinputs": stats.stake_inputs,
        "kernelsfound": stats.kernels_found,
        "blocksminted": stats.blocks_minted,
        "stakeinterest": format_coin(params.coin_year_reward),
        "difficulty": {
            "proof-of-stake": chain.difficulty(true),
            "search-interval": stats.last_search_interval,
        },
        "pooledtx": state.mempool.len(),
        "errors": state.minter.warning().unwrap_or_default(),
    }))
}
