//! JSON-RPC implementation of [`ChainClient`].
//!
//! Writes go through `eth_sendTransaction`, so the endpoint must be backed by
//! the connected wallet (which owns the keys and signs).

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use crate::abi::{self, Token};
use crate::amount::Amount;
use crate::contracts::{Address, ChainClient, ContractCall, PreparedCall, ReceiptStatus, TokenInfo, TxHash};
use crate::errors::CliError;

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Receipt {
    block_number: Option<String>,
    status: Option<String>,
}

pub struct RpcClient {
    client: Client,
    url: String,
    next_id: AtomicU64,
}

impl RpcClient {
    pub fn new(url: &str) -> Self {
        Self {
            client: Client::new(),
            url: url.to_string(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Issue a request. A `null` result comes back as `None`.
    async fn request<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<Option<T>> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!("rpc #{} {} {}", id, method, params);

        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let resp: RpcResponse<T> = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| CliError::RpcError(format!("{} request failed: {}", method, e)))?
            .json()
            .await
            .map_err(|e| CliError::RpcError(format!("{} returned invalid JSON: {}", method, e)))?;

        if let Some(err) = resp.error {
            return Err(CliError::RpcError(format!("{} ({}): {}", method, err.code, err.message)).into());
        }
        Ok(resp.result)
    }

    async fn call(&self, to: Address, data: Vec<u8>) -> Result<Vec<u8>> {
        let out: Option<String> = self
            .request("eth_call", json!([{ "to": to, "data": to_hex(&data) }, "latest"]))
            .await?;
        let out = out.ok_or_else(|| anyhow!("eth_call returned null"))?;
        from_hex(&out)
    }

    async fn block_number(&self) -> Result<u64> {
        let number: Option<String> = self.request("eth_blockNumber", json!([])).await?;
        parse_quantity(&number.ok_or_else(|| anyhow!("eth_blockNumber returned null"))?)
    }
}

#[async_trait]
impl ChainClient for RpcClient {
    async fn token_info(&self, token: Address) -> Result<TokenInfo> {
        let symbol = abi::decode_string(&self.call(token, abi::encode_call(abi::SYMBOL, &[])).await?)
            .context("Failed to decode token symbol")?;
        let decimals = abi::decode_uint(&self.call(token, abi::encode_call(abi::DECIMALS, &[])).await?)?;
        let decimals = u8::try_from(decimals).context("Token decimals out of range")?;
        Ok(TokenInfo {
            address: token,
            symbol,
            decimals,
        })
    }

    async fn balance_of(&self, token: Address, owner: Address) -> Result<Amount> {
        let data = abi::encode_call(abi::BALANCE_OF, &[Token::Address(owner)]);
        abi::decode_uint(&self.call(token, data).await?)
    }

    async fn allowance(&self, token: Address, owner: Address, spender: Address) -> Result<Amount> {
        let data = abi::encode_call(abi::ALLOWANCE, &[Token::Address(owner), Token::Address(spender)]);
        abi::decode_uint(&self.call(token, data).await?)
    }

    async fn prepare(&self, call: &ContractCall) -> Result<PreparedCall> {
        let gas: Option<String> = self
            .request("eth_estimateGas", json!([tx_object(call)]))
            .await
            .map_err(|e| CliError::PrepareFailure(format!("{}: {}", call.function.name(), e)))?;
        let gas = gas.map(|g| parse_quantity(&g)).transpose()?;
        Ok(PreparedCall { call: *call, gas })
    }

    async fn send(&self, prepared: &PreparedCall) -> Result<TxHash> {
        let mut tx = tx_object(&prepared.call);
        if let Some(gas) = prepared.gas {
            tx["gas"] = json!(format!("0x{:x}", gas));
        }
        let hash: Option<String> = self
            .request("eth_sendTransaction", json!([tx]))
            .await
            .map_err(|e| CliError::TransactionFailure(format!("{}: {}", prepared.call.function.name(), e)))?;
        let hash = hash.ok_or_else(|| CliError::TransactionFailure("no transaction hash returned".into()))?;
        Ok(hash.parse::<TxHash>()?)
    }

    async fn receipt_status(&self, hash: &TxHash) -> Result<ReceiptStatus> {
        let receipt: Option<Receipt> = self
            .request("eth_getTransactionReceipt", json!([hash.to_string()]))
            .await?;

        let Some(receipt) = receipt else {
            let tx: Option<Value> = self
                .request("eth_getTransactionByHash", json!([hash.to_string()]))
                .await?;
            return Ok(if tx.is_some() {
                ReceiptStatus::Pending
            } else {
                ReceiptStatus::Dropped
            });
        };

        if receipt.status.as_deref() == Some("0x0") {
            return Ok(ReceiptStatus::Reverted);
        }
        let Some(included_at) = receipt.block_number else {
            return Ok(ReceiptStatus::Pending);
        };
        let included_at = parse_quantity(&included_at)?;
        let head = self.block_number().await?;
        Ok(ReceiptStatus::Included {
            confirmations: head.saturating_sub(included_at) + 1,
        })
    }
}

fn tx_object(call: &ContractCall) -> Value {
    json!({
        "from": call.from,
        "to": call.to,
        "data": to_hex(&call.function.calldata()),
    })
}

fn to_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

fn from_hex(s: &str) -> Result<Vec<u8>> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(digits).with_context(|| format!("invalid hex data: {}", s))
}

fn parse_quantity(s: &str) -> Result<u64> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    u64::from_str_radix(digits, 16).with_context(|| format!("invalid quantity: {}", s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::Contracts;

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity("0x10").unwrap(), 16);
        assert_eq!(parse_quantity("0x0").unwrap(), 0);
        assert!(parse_quantity("0xzz").is_err());
    }

    #[test]
    fn test_hex_helpers() {
        assert_eq!(to_hex(&[0xde, 0xad]), "0xdead");
        assert_eq!(from_hex("0xdead").unwrap(), vec![0xde, 0xad]);
        assert_eq!(from_hex("0x").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_tx_object_shape() {
        let contracts = Contracts {
            dao: Address::from_bytes([1; 20]),
            ..Default::default()
        };
        let call = contracts.execute_proposal(Address::from_bytes([2; 20]), 5);
        let tx = tx_object(&call);
        assert_eq!(tx["to"], json!(contracts.dao.to_string()));
        assert_eq!(tx["from"], json!(Address::from_bytes([2; 20]).to_string()));
        assert!(tx["data"].as_str().unwrap().starts_with("0x0d61b519"));
    }

    #[test]
    fn test_rpc_error_body_parses() {
        let raw = r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32000,"message":"execution reverted"}}"#;
        let resp: RpcResponse<String> = serde_json::from_str(raw).unwrap();
        assert!(resp.result.is_none());
        assert_eq!(resp.error.unwrap().message, "execution reverted");
    }
}
