use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CurrencyPair {
    pub from: String,
    pub to: String,
}

impl CurrencyPair {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into().trim().to_lowercase(),
            to: to.into().trim().to_lowercase(),
        }
    }

    /// Converting a currency into itself needs no quote.
    pub fn is_identity(&self) -> bool {
        self.from == self.to
    }
}

impl fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.from, self.to)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteRequest {
    pub epoch: u64,
    pub pair: CurrencyPair,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "lowercase")]
pub enum QuoteResult {
    Pending,
    Value(Decimal),
    Error(String),
}

impl QuoteResult {
    pub fn value(&self) -> Option<Decimal> {
        match self {
            Self::Value(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

/// A currency as listed by `getCurrenciesFull`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Currency {
    pub name: String,
    pub full_name: String,
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticker: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl Currency {
    pub fn symbol(&self) -> &str {
        &self.name
    }

    pub fn label(&self) -> String {
        format!("{} ({})", self.full_name, self.name)
    }
}

/// Trading constraints for a pair, from `getPairsParams`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairParams {
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    pub min_amount_float: Decimal,
    #[serde(default)]
    pub max_amount_float: Option<Decimal>,
    #[serde(default)]
    pub min_amount_fixed: Option<Decimal>,
    #[serde(default)]
    pub max_amount_fixed: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    pub from: String,
    pub to: String,
    /// Withdraw address on the target chain.
    pub address: String,
    pub amount: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refund_address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub payin_address: String,
    #[serde(default)]
    pub payout_address: Option<String>,
    #[serde(default)]
    pub amount_expected_from: Option<Decimal>,
    #[serde(default)]
    pub amount_expected_to: Option<Decimal>,
    #[serde(default)]
    pub status: Option<String>,
}
