//! Wallet method handlers.

use crate::error::{
    RPC_INVALID_ADDRESS_OR_KEY, RPC_WALLET_ALREADY_UNLOCKED, RPC_WALLET_INSUFFICIENT_FUNDS,
    RPC_WALLET_WRONG_ENC_STATE,
};
use crate::params::*;
use crate::{AppState, RpcError, RpcResult};
use serde_json::{json, Map, Value};
use solidus_chain::{format_coin, Address, Hash256};
use solidus_wallet::{MineFilter, MineType, TransactionRecord};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

fn parse_address(s: &str) -> RpcResult<Address> {
    Address::parse(s)
        .map_err(|_| RpcError::new(RPC_INVALID_ADDRESS_OR_KEY, format!("Invalid address: {}", s)))
}

fn record_to_json(record: &TransactionRecord) -> Value {
    let mut obj = Map::new();
    obj.insert("account".into(), json!(record.account));
    if let Some(address) = &record.address {
        obj.insert("address".into(), json!(address));
    }
    obj.insert("category".into(), json!(record.category));
    obj.insert("amount".into(), json!(format_coin(record.amount)));
    if let Some(fee) = record.fee {
        obj.insert("fee".into(), json!(format_coin(fee)));
    }
    if let Some(confirmations) = record.confirmations {
        obj.insert("confirmations".into(), json!(confirmations));
    }
    if record.generated {
        obj.insert("generated".into(), json!(true));
    }
    if let Some(txid) = &record.txid {
        obj.insert("txid".into(), json!(txid.to_string()));
    }
    if let Some(block_hash) = &record.block_hash {
        obj.insert("blockhash".into(), json!(block_hash.to_string()));
    }
    obj.insert("time".into(), json!(record.time));
    if let Some(other) = &record.other_account {
        obj.insert("otheraccount".into(), json!(other));
    }
    if let Some(comment) = &record.comment {
        if !comment.is_empty() {
            obj.insert("comment".into(), json!(comment));
        }
    }
    if record.involves_watch_only {
        obj.insert("involvesWatchonly".into(), json!(true));
    }
    Value::Object(obj)
}

/// `getnewaddress [account]`
pub fn getnewaddress(state: &AppState, params: &[Value]) -> RpcResult<Value> {
    let account = if params.is_empty() {
        String::new()
    } else {
        account_param(params, 0)?
    };
    let address = state.wallet.new_address(&account)?;
    Ok(json!(address.to_string()))
}

/// `setaccount <address> <account>`
pub fn setaccount(state: &AppState, params: &[Value]) -> RpcResult<Value> {
    let address = parse_address(&str_param(params, 0, "address")?)?;
    let account = account_param(params, 1)?;
    state.wallet.set_account(&address, &account);
    Ok(Value::Null)
}

/// `getaccount <address>`
pub fn getaccount(state: &AppState, params: &[Value]) -> RpcResult<Value> {
    let address = parse_address(&str_param(params, 0, "address")?)?;
    Ok(json!(state.wallet.account_of(&address).unwrap_or_default()))
}

/// `getaddressesbyaccount <account>`
pub fn getaddressesbyaccount(state: &AppState, params: &[Value]) -> RpcResult<Value> {
    let account = account_param(params, 0)?;
    let addresses: Vec<String> = state
        .wallet
        .addresses_of_account(&account)
        .into_iter()
        .map(|a| a.to_string())
        .collect();
    Ok(json!(addresses))
}

/// `getbalance [account] [minconf=1] [watchonly=false]`
pub fn getbalance(state: &AppState, params: &[Value]) -> RpcResult<Value> {
    if params.is_empty() {
        return Ok(json!(format_coin(state.wallet.balance())));
    }
    let min_depth = opt_int_param(params, 1, 1)? as i32;
    let filter = MineFilter::with_watch_only(opt_bool_param(params, 2, false)?);

    let account = str_param(params, 0, "account")?;
    let balance = if account == "*" {
        state.wallet.balance_all(min_depth, filter)
    } else {
        state.wallet.account_balance(&account, min_depth, filter)
    };
    Ok(json!(format_coin(balance)))
}

/// `move <fromaccount> <toaccount> <amount> [minconf=1] [comment]`
pub fn movecmd(state: &AppState, params: &[Value]) -> RpcResult<Value> {
    let from = account_param(params, 0)?;
    let to = account_param(params, 1)?;
    let amount = amount_param(params, 2, "amount")?;
    // Legacy minconf parameter: type-checked, otherwise unused.
    let _ = opt_int_param(params, 3, 1)?;
    let comment = opt_str_param(params, 4).unwrap_or_default();

    let now = state.chain.adjusted_time();
    state
        .wallet
        .ledger()
        .move_between(&from, &to, amount, now, &comment)?;
    Ok(json!(true))
}

/// `sendtoaddress <address> <amount> [comment] [comment-to]`
pub fn sendtoaddress(state: &AppState, params: &[Value]) -> RpcResult<Value> {
    let address = parse_address(&str_param(params, 0, "address")?)?;
    let amount = amount_param(params, 1, "amount")?;
    let comment = opt_str_param(params, 2);
    let comment_to = opt_str_param(params, 3);

    let txid = state
        .wallet
        .send_money(&address, amount, "", comment, comment_to)?;
    Ok(json!(txid.to_string()))
}

/// `sendfrom <account> <address> <amount> [minconf=1] [comment] [comment-to]`
pub fn sendfrom(state: &AppState, params: &[Value]) -> RpcResult<Value> {
    let account = account_param(params, 0)?;
    let address = parse_address(&str_param(params, 1, "address")?)?;
    let amount = amount_param(params, 2, "amount")?;
    let min_depth = opt_int_param(params, 3, 1)? as i32;
    let comment = opt_str_param(params, 4);
    let comment_to = opt_str_param(params, 5);

    state.wallet.ensure_unlocked()?;
    let balance = state
        .wallet
        .account_balance(&account, min_depth, MineFilter::SPENDABLE);
    if amount > balance {
        return Err(RpcError::new(
            RPC_WALLET_INSUFFICIENT_FUNDS,
            "Account has insufficient funds",
        ));
    }
    let txid = state
        .wallet
        .send_money(&address, amount, &account, comment, comment_to)?;
    Ok(json!(txid.to_string()))
}

/// `sendmany <account> {address: amount, ...} [minconf=1] [comment]`
pub fn sendmany(state: &AppState, params: &[Value]) -> RpcResult<Value> {
    let account = account_param(params, 0)?;
    let outputs = params
        .get(1)
        .and_then(|v| v.as_object())
        .ok_or_else(|| RpcError::type_error("expected object of address:amount"))?;
    let min_depth = opt_int_param(params, 2, 1)? as i32;
    let comment = opt_str_param(params, 3);

    let mut recipients = Vec::with_capacity(outputs.len());
    let mut total = 0i64;
    for (address, amount) in outputs {
        let amount = amount_from_value(amount)?;
        total += amount;
        recipients.push((address.clone(), amount));
    }

    state.wallet.ensure_unlocked()?;
    let balance = state
        .wallet
        .account_balance(&account, min_depth, MineFilter::SPENDABLE);
    if total > balance && !account.is_empty() {
        return Err(RpcError::new(
            RPC_WALLET_INSUFFICIENT_FUNDS,
            "Account has insufficient funds",
        ));
    }
    let txid = state.wallet.send_many(&account, &recipients, comment)?;
    Ok(json!(txid.to_string()))
}

/// `mergecoins <amount> <minvalue> <outputvalue>`
pub fn mergecoins(state: &AppState, params: &[Value]) -> RpcResult<Value> {
    let amount = amount_param(params, 0, "amount")?;
    let min_value = amount_param(params, 1, "minvalue")?;
    let output_value = amount_param(params, 2, "outputvalue")?;

    let txids: Vec<String> = state
        .wallet
        .merge_coins(amount, min_value, output_value)?
        .into_iter()
        .map(|txid| txid.to_string())
        .collect();
    Ok(json!(txids))
}

/// `listtransactions [account="*"] [count=10] [from=0] [watchonly=false]`
pub fn listtransactions(state: &AppState, params: &[Value]) -> RpcResult<Value> {
    let account = opt_str_param(params, 0).unwrap_or_else(|| "*".to_string());
    let count = opt_int_param(params, 1, 10)?;
    let from = opt_int_param(params, 2, 0)?;
    let watch_only = opt_bool_param(params, 3, false)?;
    if count < 0 {
        return Err(RpcError::invalid_parameter("Negative count"));
    }
    if from < 0 {
        return Err(RpcError::invalid_parameter("Negative from"));
    }

    let rows = state
        .wallet
        .list_transactions(&account, count as usize, from as usize, watch_only);
    Ok(json!(rows.iter().map(record_to_json).collect::<Vec<_>>()))
}

/// `listaccounts [minconf=1] [watchonly=false]`
pub fn listaccounts(state: &AppState, params: &[Value]) -> RpcResult<Value> {
    let min_depth = opt_int_param(params, 0, 1)? as i32;
    let filter = MineFilter::with_watch_only(opt_bool_param(params, 1, false)?);

    let mut obj = Map::new();
    for (account, balance) in state.wallet.account_balances(min_depth, filter) {
        obj.insert(account, json!(format_coin(balance)));
    }
    Ok(Value::Object(obj))
}

/// `listsinceblock [blockhash] [target-confirmations=1] [watchonly=false]`
pub fn listsinceblock(state: &AppState, params: &[Value]) -> RpcResult<Value> {
    let since_height = match opt_str_param(params, 0) {
        Some(hash_str) => {
            let hash = Hash256::from_hex(&hash_str)?;
            let index = state.chain.get(&hash).ok_or_else(|| {
                RpcError::new(RPC_INVALID_ADDRESS_OR_KEY, "Block not found")
            })?;
            Some(index.height)
        }
        None => None,
    };
    let target_confirms = opt_int_param(params, 1, 1)?;
    if target_confirms < 1 {
        return Err(RpcError::invalid_parameter("Invalid parameter"));
    }
    let watch_only = opt_bool_param(params, 2, false)?;

    let rows = state.wallet.list_since_block(since_height, watch_only);
    let last_block = state
        .wallet
        .last_block_for_confirms(target_confirms as u32)
        .map(|hash| hash.to_string())
        .unwrap_or_default();

    Ok(json!({
        "transactions": rows.iter().map(record_to_json).collect::<Vec<_>>(),
        "lastblock": last_block,
    }))
}

/// `walletpassphrase <passphrase> <timeout> [mintonly=false]`
pub fn walletpassphrase(state: &AppState, params: &[Value]) -> RpcResult<Value> {
    let passphrase = str_param(params, 0, "passphrase")?;
    let timeout = int_param(params, 1, "timeout")?;
    let mint_only = opt_bool_param(params, 2, false)?;

    let wallet = &state.wallet;
    if !wallet.is_crypted() {
        return Err(RpcError::new(
            RPC_WALLET_WRONG_ENC_STATE,
            "Error: running with an unencrypted wallet, but walletpassphrase was called.",
        ));
    }
    if !wallet.is_locked() {
        return Err(RpcError::new(
            RPC_WALLET_ALREADY_UNLOCKED,
            "Error: Wallet is already unlocked, use walletlock first if need to change unlock settings.",
        ));
    }
    if passphrase.is_empty() {
        return Err(RpcError::invalid_parameter("passphrase must not be empty"));
    }

    wallet.keystore().unlock(&passphrase, mint_only)?;

    // Key pool top-up runs off-thread, as does the relock timer.
    let keystore = Arc::clone(wallet.keystore());
    let target = wallet.params().keypool_size;
    std::thread::Builder::new()
        .name("key-topup".into())
        .spawn(move || {
            let _ = keystore.top_up_pool(target);
        })
        .map_err(|e| RpcError::misc(e.to_string()))?;

    wallet
        .relocker()
        .schedule(Arc::clone(wallet.keystore()), timeout);
    info!(timeout, mint_only, "Wallet unlocked via RPC");
    Ok(Value::Null)
}

/// `walletpassphrasechange <oldpassphrase> <newpassphrase>`
pub fn walletpassphrasechange(state: &AppState, params: &[Value]) -> RpcResult<Value> {
    let old = str_param(params, 0, "oldpassphrase")?;
    let new = str_param(params, 1, "newpassphrase")?;
    if old.is_empty() || new.is_empty() {
        return Err(RpcError::invalid_parameter("passphrase must not be empty"));
    }
    state.wallet.keystore().change_passphrase(&old, &new)?;
    Ok(Value::Null)
}

/// `walletlock`
pub fn walletlock(state: &AppState, _params: &[Value]) -> RpcResult<Value> {
    let wallet = &state.wallet;
    if !wallet.is_crypted() {
        return Err(RpcError::new(
            RPC_WALLET_WRONG_ENC_STATE,
            "Error: running with an unencrypted wallet, but walletlock was called.",
        ));
    }
    wallet.relocker().cancel();
    wallet.keystore().lock();
    Ok(Value::Null)
}

/// `encryptwallet <passphrase>`
pub fn encryptwallet(state: &AppState, params: &[Value]) -> RpcResult<Value> {
    let passphrase = str_param(params, 0, "passphrase")?;
    state.wallet.keystore().encrypt(&passphrase)?;

    // Plaintext key material may survive in freed memory; restart with
    // the encrypted wallet.
    state.shutdown.store(true, Ordering::SeqCst);
    Ok(json!(
        "wallet encrypted; Solidus server stopping, restart to run with encrypted wallet. \
         The keypool has been flushed, you need to make a new backup."
    ))
}

/// `keypoolrefill [new-size]`
pub fn keypoolrefill(state: &AppState, params: &[Value]) -> RpcResult<Value> {
    let target = match params.first() {
        Some(v) => {
            let size = v
                .as_i64()
                .ok_or_else(|| RpcError::type_error("expected integer size"))?;
            if size < 0 {
                return Err(RpcError::invalid_parameter(
                    "Invalid parameter, expected valid size",
                ));
            }
            size as usize
        }
        None => state.wallet.params().keypool_size,
    };
    state.wallet.ensure_unlocked()?;
    state.wallet.keystore().top_up_pool(target)?;
    Ok(Value::Null)
}

/// `validateaddress <address>`
pub fn validateaddress(state: &AppState, params: &[Value]) -> RpcResult<Value> {
    let address_str = str_param(params, 0, "address")?;
    let Ok(address) = Address::parse(&address_str) else {
        return Ok(json!({ "isvalid": false }));
    };

    let mine = state.wallet.is_mine_address(&address);
    let mut obj = json!({
        "isvalid": true,
        "address": address.to_string(),
        "ismine": mine != MineType::No,
    });
    if mine != MineType::No {
        obj["watchonly"] = json!(mine == MineType::WatchOnly);
        if let Some(pubkey) = state.wallet.keystore().get_pubkey(&address) {
            obj["pubkey"] = json!(hex::encode(pubkey));
        }
    }
    if let Some(account) = state.wallet.account_of(&address) {
        obj["account"] = json!(account);
    }
    Ok(obj)
}

/// `checkwallet`
pub fn checkwallet(state: &AppState, _params: &[Value]) -> RpcResult<Value> {
    let (mismatches, amount) = state.wallet.fix_spent_coins(true);
    if mismatches == 0 {
        Ok(json!({ "wallet check passed": true }))
    } else {
        Ok(json!({
            "mismatched spent coins": mismatches,
            "amount in question": format_coin(amount),
        }))
    }
}

/// `repairwallet`
pub fn repairwallet(state: &AppState, _params: &[Value]) -> RpcResult<Value> {
    let (mismatches, amount) = state.wallet.fix_spent_coins(false);
    if mismatches == 0 {
        Ok(json!({ "wallet check passed": true }))
    } else {
        Ok(json!({
            "mismatched spent coins": mismatches,
            "amount affected by repair": format_coin(amount),
        }))
    }
}

/// `resendwallettransactions`
pub fn resendwallettransactions(state: &AppState, _params: &[Value]) -> RpcResult<Value> {
    let txids: Vec<String> = state
        .wallet
        .resend_transactions()
        .into_iter()
        .map(|txid| txid.to_string())
        .collect();
    Ok(json!(txids))
}
