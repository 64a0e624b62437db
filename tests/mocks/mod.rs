#![allow(dead_code)]

// Exchange test double with call tracking and controllable latency
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use coin_swap::SwapError;
use coin_swap::client::ExchangeService;
use coin_swap::types::{Currency, CurrencyPair, PairParams, Transaction, TransactionRequest};
use rust_decimal::Decimal;

/// Counts calls to one remote method
#[derive(Debug, Clone, Default)]
pub struct CallTracker {
    calls: Arc<AtomicUsize>,
}

impl CallTracker {
    pub fn record_call(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub fn dec(value: &str) -> Decimal {
    Decimal::from_str(value).unwrap()
}

pub fn currency(name: &str, full_name: &str, enabled: bool) -> Currency {
    Currency {
        name: name.to_string(),
        full_name: full_name.to_string(),
        enabled,
        ticker: Some(name.to_string()),
        image: None,
    }
}

pub fn default_currencies() -> Vec<Currency> {
    vec![
        currency("btc", "Bitcoin", true),
        currency("eth", "Ethereum", true),
        currency("ltc", "Litecoin", false),
        currency("xmr", "Monero", true),
    ]
}

/// Quotes `amount * rate`. Latency can be set per amount (quotes) and per
/// target symbol (pair parameters).
pub struct MockExchange {
    pub quote_calls: CallTracker,
    pub pairs_calls: CallTracker,
    pub catalog_calls: CallTracker,
    pub status_calls: CallTracker,
    pub create_calls: CallTracker,
    pub quote_log: Mutex<Vec<(CurrencyPair, Decimal)>>,
    pub created: Mutex<Vec<TransactionRequest>>,
    rate: Decimal,
    min_amounts: HashMap<String, Decimal>,
    default_min_amount: Decimal,
    quote_delays: HashMap<Decimal, Duration>,
    pairs_delays: HashMap<String, Duration>,
    catalog_delay: Duration,
    catalog_failures: AtomicUsize,
    currencies: Vec<Currency>,
    fail_quotes: AtomicBool,
    status: Mutex<String>,
    status_delay: Duration,
}

impl Default for MockExchange {
    fn default() -> Self {
        Self {
            quote_calls: CallTracker::default(),
            pairs_calls: CallTracker::default(),
            catalog_calls: CallTracker::default(),
            status_calls: CallTracker::default(),
            create_calls: CallTracker::default(),
            quote_log: Mutex::new(Vec::new()),
            created: Mutex::new(Vec::new()),
            rate: dec("15.5"),
            min_amounts: HashMap::new(),
            default_min_amount: dec("0.0041"),
            quote_delays: HashMap::new(),
            pairs_delays: HashMap::new(),
            catalog_delay: Duration::ZERO,
            catalog_failures: AtomicUsize::new(0),
            currencies: default_currencies(),
            fail_quotes: AtomicBool::new(false),
            status: Mutex::new("waiting".to_string()),
            status_delay: Duration::ZERO,
        }
    }
}

impl MockExchange {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rate(&self) -> Decimal {
        self.rate
    }

    pub fn default_min_amount(&self) -> Decimal {
        self.default_min_amount
    }

    pub fn with_currencies(mut self, currencies: Vec<Currency>) -> Self {
        self.currencies = currencies;
        self
    }

    pub fn with_quote_delay(mut self, amount: Decimal, delay: Duration) -> Self {
        self.quote_delays.insert(amount, delay);
        self
    }

    pub fn with_min_amount(mut self, to: &str, min: Decimal, delay: Duration) -> Self {
        self.min_amounts.insert(to.to_string(), min);
        self.pairs_delays.insert(to.to_string(), delay);
        self
    }

    pub fn with_catalog_delay(mut self, delay: Duration) -> Self {
        self.catalog_delay = delay;
        self
    }

    /// The next `count` catalog fetches fail.
    pub fn failing_catalog(self, count: usize) -> Self {
        self.catalog_failures.store(count, Ordering::SeqCst);
        self
    }

    pub fn with_status_delay(mut self, delay: Duration) -> Self {
        self.status_delay = delay;
        self
    }

    pub fn failing_quotes(self) -> Self {
        self.fail_quotes.store(true, Ordering::SeqCst);
        self
    }

    pub fn set_status(&self, status: &str) {
        *self.status.lock().unwrap() = status.to_string();
    }

    pub fn quoted(&self) -> Vec<(CurrencyPair, Decimal)> {
        self.quote_log.lock().unwrap().clone()
    }

    async fn delay(duration: Option<&Duration>) {
        if let Some(duration) = duration {
            if !duration.is_zero() {
                tokio::time::sleep(*duration).await;
            }
        }
    }
}

#[async_trait]
impl ExchangeService for MockExchange {
    async fn get_exchange_amount(
        &self,
        pair: &CurrencyPair,
        amount: Decimal,
    ) -> Result<Decimal, SwapError> {
        self.quote_calls.record_call();
        self.quote_log.lock().unwrap().push((pair.clone(), amount));

        Self::delay(self.quote_delays.get(&amount)).await;

        if self.fail_quotes.load(Ordering::SeqCst) {
            return Err(SwapError::Network("connection reset".to_string()));
        }

        Ok(amount * self.rate)
    }

    async fn get_pairs_params(&self, pair: &CurrencyPair) -> Result<PairParams, SwapError> {
        self.pairs_calls.record_call();

        Self::delay(self.pairs_delays.get(&pair.to)).await;

        Ok(PairParams {
            from: Some(pair.from.clone()),
            to: Some(pair.to.clone()),
            min_amount_float: self
                .min_amounts
                .get(&pair.to)
                .copied()
                .unwrap_or(self.default_min_amount),
            max_amount_float: None,
            min_amount_fixed: None,
            max_amount_fixed: None,
        })
    }

    async fn get_currencies_full(&self) -> Result<Vec<Currency>, SwapError> {
        self.catalog_calls.record_call();

        Self::delay(Some(&self.catalog_delay)).await;

        let failing = self
            .catalog_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(SwapError::Network("catalog unavailable".to_string()));
        }

        Ok(self.currencies.clone())
    }

    async fn get_status(&self, _transaction_id: &str) -> Result<String, SwapError> {
        self.status_calls.record_call();

        Self::delay(Some(&self.status_delay)).await;

        Ok(self.status.lock().unwrap().clone())
    }

    async fn create_transaction(
        &self,
        request: &TransactionRequest,
    ) -> Result<Transaction, SwapError> {
        self.create_calls.record_call();
        self.created.lock().unwrap().push(request.clone());

        Ok(Transaction {
            id: format!("tx-{}", self.create_calls.call_count()),
            payin_address: "bc1qpayinaddress0000000000".to_string(),
            payout_address: Some(request.address.clone()),
            amount_expected_from: Some(request.amount),
            amount_expected_to: Some(request.amount * self.rate),
            status: Some("new".to_string()),
        })
    }
}
