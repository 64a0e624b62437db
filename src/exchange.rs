use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::client::ExchangeService;
use crate::error::SwapError;
use crate::types::{CurrencyPair, Transaction, TransactionRequest};

pub const UNKNOWN_STATUS: &str = "unknown";

/// An exchange order as the user filled it in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeOrder {
    pub pair: CurrencyPair,
    pub amount: Decimal,
    pub withdraw_address: String,
    pub refund_address: Option<String>,
}

impl ExchangeOrder {
    pub fn to_request(&self) -> Result<TransactionRequest, SwapError> {
        let address = self.withdraw_address.trim();
        if address.is_empty() {
            return Err(SwapError::InvalidSelection(
                "Withdraw address is required".to_string(),
            ));
        }

        let refund_address = self
            .refund_address
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(str::to_string);

        Ok(TransactionRequest {
            from: self.pair.from.clone(),
            to: self.pair.to.clone(),
            address: address.to_string(),
            amount: self.amount,
            refund_address,
        })
    }
}

/// The most recent submitted exchange and its last fetched status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastExchange {
    pub id: String,
    pub pair: CurrencyPair,
    pub amount_from: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount_to: Option<Decimal>,
    pub payin_address: String,
    pub withdraw_address: String,
    pub status: String,
}

impl LastExchange {
    pub fn new(order: &ExchangeOrder, transaction: Transaction) -> Self {
        Self {
            id: transaction.id,
            pair: order.pair.clone(),
            amount_from: transaction.amount_expected_from.unwrap_or(order.amount),
            amount_to: transaction.amount_expected_to,
            payin_address: transaction.payin_address,
            withdraw_address: order.withdraw_address.trim().to_string(),
            status: UNKNOWN_STATUS.to_string(),
        }
    }

    /// Pay-in address shortened for display, e.g. `0x1234…cdef`.
    pub fn short_payin_address(&self) -> String {
        shorten_address(&self.payin_address, 4)
    }
}

pub fn shorten_address(address: &str, chars: usize) -> String {
    let len = address.chars().count();
    if len <= chars * 2 + 2 {
        return address.to_string();
    }
    let head: String = address.chars().take(chars + 2).collect();
    let tail: String = address.chars().skip(len - chars).collect();
    format!("{}…{}", head, tail)
}

pub async fn submit(
    client: &dyn ExchangeService,
    order: &ExchangeOrder,
) -> Result<LastExchange, SwapError> {
    let request = order.to_request()?;

    tracing::debug!(
        "Submitting exchange of {} {} to {}",
        request.amount,
        request.from,
        request.to
    );

    let transaction = client.create_transaction(&request).await.map_err(|e| {
        tracing::error!("Could not create exchange for {}: {}", order.pair, e);
        e
    })?;

    tracing::info!(
        "Created exchange {} (pay in to {})",
        transaction.id,
        transaction.payin_address
    );

    Ok(LastExchange::new(order, transaction))
}
