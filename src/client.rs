use std::fmt;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sha2::Sha512;
use uuid::Uuid;

use crate::config::ChangellyConfig;
use crate::error::SwapError;
use crate::types::{Currency, CurrencyPair, PairParams, Transaction, TransactionRequest};

type HmacSha512 = Hmac<Sha512>;

/// Remote exchange operations the controller depends on.
#[async_trait]
pub trait ExchangeService: Send + Sync {
    async fn get_exchange_amount(
        &self,
        pair: &CurrencyPair,
        amount: Decimal,
    ) -> Result<Decimal, SwapError>;

    async fn get_pairs_params(&self, pair: &CurrencyPair) -> Result<PairParams, SwapError>;

    async fn get_currencies_full(&self) -> Result<Vec<Currency>, SwapError>;

    async fn get_status(&self, transaction_id: &str) -> Result<String, SwapError>;

    async fn create_transaction(
        &self,
        request: &TransactionRequest,
    ) -> Result<Transaction, SwapError>;
}

#[derive(Serialize)]
struct RpcRequest<'a, P> {
    jsonrpc: &'static str,
    id: String,
    method: &'a str,
    params: P,
}

#[derive(Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
struct ExchangeAmount {
    result: Decimal,
}

/// Changelly JSON-RPC client. Every request body is signed with
/// HMAC-SHA512 over the exact bytes sent.
#[derive(Clone)]
pub struct ChangellyClient {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    api_secret: String,
}

impl fmt::Debug for ChangellyClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangellyClient")
            .field("api_url", &self.api_url)
            .field("api_key", &"<redacted>")
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

impl ChangellyClient {
    pub fn new(
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: api_url.into(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }

    pub fn from_config(config: &ChangellyConfig) -> Self {
        Self::new(&config.api_url, &config.api_key, &config.api_secret)
    }

    pub fn sign(&self, body: &[u8]) -> Result<String, SwapError> {
        sign_body(&self.api_secret, body)
    }

    async fn call<P, T>(&self, method: &str, params: P) -> Result<T, SwapError>
    where
        P: Serialize,
        T: DeserializeOwned,
    {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: Uuid::new_v4().to_string(),
            method,
            params,
        };
        let body = serde_json::to_vec(&request)?;
        let signature = self.sign(&body)?;

        tracing::debug!("Calling exchange method {} ({})", method, request.id);

        let response = self
            .http
            .post(&self.api_url)
            .header("api-key", &self.api_key)
            .header("sign", signature)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        let parsed: Option<RpcResponse<T>> = serde_json::from_str(&text).ok();

        match parsed {
            Some(RpcResponse {
                error: Some(error), ..
            }) => {
                tracing::warn!(
                    "Exchange method {} failed with {}: {}",
                    method,
                    error.code,
                    error.message
                );
                Err(SwapError::Rpc {
                    code: error.code,
                    message: error.message,
                })
            }
            _ if !status.is_success() => Err(SwapError::Network(format!(
                "{} returned HTTP {}: {}",
                method, status, text
            ))),
            Some(RpcResponse {
                result: Some(result),
                ..
            }) => Ok(result),
            Some(_) => Err(SwapError::InvalidResponse(format!(
                "{} returned no result",
                method
            ))),
            None => Err(SwapError::InvalidResponse(format!(
                "{} returned unparseable body: {}",
                method, text
            ))),
        }
    }
}

pub fn sign_body(secret: &str, body: &[u8]) -> Result<String, SwapError> {
    let mut mac = HmacSha512::new_from_slice(secret.as_bytes())
        .map_err(|e| SwapError::Internal(format!("Invalid signing key: {}", e)))?;
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

#[async_trait]
impl ExchangeService for ChangellyClient {
    async fn get_exchange_amount(
        &self,
        pair: &CurrencyPair,
        amount: Decimal,
    ) -> Result<Decimal, SwapError> {
        let params = json!([{ "from": pair.from, "to": pair.to, "amount": amount.to_string() }]);
        let amounts: Vec<ExchangeAmount> = self.call("getExchangeAmount", params).await?;

        amounts.first().map(|a| a.result).ok_or_else(|| {
            SwapError::InvalidResponse(format!("No exchange amount returned for {}", pair))
        })
    }

    async fn get_pairs_params(&self, pair: &CurrencyPair) -> Result<PairParams, SwapError> {
        let params = json!([{ "from": pair.from, "to": pair.to }]);
        let pairs: Vec<PairParams> = self.call("getPairsParams", params).await?;

        pairs.into_iter().next().ok_or_else(|| {
            SwapError::InvalidResponse(format!("No pair parameters returned for {}", pair))
        })
    }

    async fn get_currencies_full(&self) -> Result<Vec<Currency>, SwapError> {
        self.call("getCurrenciesFull", json!({})).await
    }

    async fn get_status(&self, transaction_id: &str) -> Result<String, SwapError> {
        self.call("getStatus", json!({ "id": transaction_id })).await
    }

    async fn create_transaction(
        &self,
        request: &TransactionRequest,
    ) -> Result<Transaction, SwapError> {
        let params: Value = serde_json::to_value(request)?;
        self.call("createTransaction", params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_is_hex_hmac_sha512() {
        // RFC 4231 test case 2
        let signature = sign_body("Jefe", b"what do ya want for nothing?").unwrap();
        assert_eq!(
            signature,
            "164b7a7bfcf819e2e395fbe73b56e0a387bd64222e831fd610270cd7ea250554\
             9758bf75c05a994a6d034f65f8f0e6fdcaeab1a34d4a6b4b636e070a38bce737"
        );
    }

    #[test]
    fn response_fields_may_be_missing() {
        let ok: RpcResponse<String> =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":"1","result":"waiting"}"#).unwrap();
        assert_eq!(ok.result.as_deref(), Some("waiting"));
        assert!(ok.error.is_none());

        let failed: RpcResponse<Vec<PairParams>> = serde_json::from_str(
            r#"{"jsonrpc":"2.0","id":"1","error":{"code":-32600,"message":"Invalid amount"}}"#,
        )
        .unwrap();
        assert!(failed.result.is_none());
        let error = failed.error.unwrap();
        assert_eq!(error.code, -32600);
        assert_eq!(error.message, "Invalid amount");
    }

    #[test]
    fn debug_hides_credentials() {
        let client = ChangellyClient::new("https://api.changelly.com", "key-123", "secret-456");
        let debug = format!("{:?}", client);
        assert!(!debug.contains("key-123"));
        assert!(!debug.contains("secret-456"));
    }
}
