//! Quote controller.
//!
//! Owns the user's selection (pair, amount, addresses) and keeps the
//! converted amount in step with it. Every change to the pair or amount
//! gets a new epoch. Remote quotes are debounced, and a result is only
//! applied if its epoch is still the latest one when it comes back.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::watch;

use crate::catalog::{CatalogLoader, CurrencyCatalog};
use crate::client::ExchangeService;
use crate::config::QuoteConfig;
use crate::debounce::Debouncer;
use crate::error::SwapError;
use crate::exchange::{self, ExchangeOrder, LastExchange};
use crate::types::{CurrencyPair, QuoteRequest, QuoteResult};

/// Parse the amount field. A blank field counts as zero.
pub fn parse_amount(input: &str) -> Result<Decimal, SwapError> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(Decimal::ZERO);
    }

    let amount =
        Decimal::from_str(input).map_err(|_| SwapError::InvalidAmount(input.to_string()))?;
    if amount.is_zero() {
        return Ok(Decimal::ZERO);
    }
    if amount.is_sign_negative() {
        return Err(SwapError::InvalidAmount(input.to_string()));
    }

    Ok(amount)
}

/// What the presentation layer renders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuoteSnapshot {
    pub pair: CurrencyPair,
    pub amount: Decimal,
    pub quote: QuoteResult,
    pub min_amount: Option<Decimal>,
    pub amount_label: String,
    pub withdraw_address: String,
    pub refund_address: String,
}

#[derive(Debug)]
struct ControllerState {
    pair: CurrencyPair,
    amount: Decimal,
    quote_epoch: u64,
    quote: QuoteResult,
    min_epoch: u64,
    /// Latest min-amount epoch issued per pair.
    min_requests: HashMap<CurrencyPair, u64>,
    min_amounts: HashMap<CurrencyPair, Decimal>,
    withdraw_address: String,
    refund_address: String,
    last_exchange: Option<LastExchange>,
}

impl ControllerState {
    fn next_min_epoch(&mut self, pair: &CurrencyPair) -> u64 {
        self.min_epoch += 1;
        self.min_requests.insert(pair.clone(), self.min_epoch);
        self.min_epoch
    }

    /// Min amount known for the selected pair, if any.
    fn current_min_amount(&self) -> Option<Decimal> {
        self.min_amounts.get(&self.pair).copied()
    }
}

struct Inner {
    client: Arc<dyn ExchangeService>,
    catalog: CatalogLoader,
    debouncer: Debouncer,
    state: Mutex<ControllerState>,
    quote_tx: watch::Sender<QuoteResult>,
}

/// Cheap to clone; clones share the same state.
///
/// The setters spawn tokio tasks and must be called from within a runtime.
#[derive(Clone)]
pub struct QuoteController {
    inner: Arc<Inner>,
}

impl QuoteController {
    pub fn new(client: Arc<dyn ExchangeService>, config: &QuoteConfig) -> Self {
        let (quote_tx, _) = watch::channel(QuoteResult::Pending);

        let state = ControllerState {
            pair: CurrencyPair::new(&config.default_from, &config.default_to),
            amount: Decimal::ZERO,
            quote_epoch: 0,
            quote: QuoteResult::Pending,
            min_epoch: 0,
            min_requests: HashMap::new(),
            min_amounts: HashMap::new(),
            withdraw_address: String::new(),
            refund_address: String::new(),
            last_exchange: None,
        };

        Self {
            inner: Arc::new(Inner {
                client,
                catalog: CatalogLoader::new(),
                debouncer: Debouncer::new(config.debounce()),
                state: Mutex::new(state),
                quote_tx,
            }),
        }
    }

    /// First-use path: refresh the min amount and quote for the initial
    /// pair, then load the catalog.
    pub async fn initialize(&self) -> Result<Arc<CurrencyCatalog>, SwapError> {
        let pair = self.pair();
        self.inner.refresh_min_amount(pair);
        self.inner.request_quote();
        self.load_catalog().await
    }

    pub async fn load_catalog(&self) -> Result<Arc<CurrencyCatalog>, SwapError> {
        self.inner.catalog.load(self.inner.client.as_ref()).await
    }

    pub fn catalog(&self) -> Option<Arc<CurrencyCatalog>> {
        self.inner.catalog.get()
    }

    /// Resolve selector indices against the loaded catalog and apply the pair.
    pub fn select_pair_by_index(
        &self,
        from_index: usize,
        to_index: usize,
    ) -> Result<CurrencyPair, SwapError> {
        let catalog = self.catalog().ok_or(SwapError::CatalogNotLoaded)?;
        let pair = CurrencyPair::new(
            catalog.symbol_at(from_index)?,
            catalog.symbol_at(to_index)?,
        );
        self.set_pair(pair.clone());
        Ok(pair)
    }

    pub fn set_pair(&self, pair: CurrencyPair) {
        if let Some(catalog) = self.catalog() {
            for symbol in [&pair.from, &pair.to] {
                if !catalog.contains(symbol) {
                    tracing::warn!("Currency {} is not offered by the exchange", symbol);
                }
            }
        }

        let min_epoch = {
            let mut state = self.inner.lock();
            tracing::debug!("Pair changed from {} to {}", state.pair, pair);
            state.pair = pair.clone();
            state.next_min_epoch(&pair)
        };

        self.inner.fetch_min_amount(pair, min_epoch);
        self.inner.request_quote();
    }

    pub fn set_from(&self, symbol: &str) {
        let to = self.pair().to;
        self.set_pair(CurrencyPair::new(symbol, to));
    }

    pub fn set_to(&self, symbol: &str) {
        let from = self.pair().from;
        self.set_pair(CurrencyPair::new(from, symbol));
    }

    pub fn set_amount(&self, amount: Decimal) {
        self.inner.lock().amount = amount;
        self.inner.request_quote();
    }

    pub fn set_withdraw_address(&self, address: impl Into<String>) {
        self.inner.lock().withdraw_address = address.into();
    }

    pub fn set_refund_address(&self, address: impl Into<String>) {
        self.inner.lock().refund_address = address.into();
    }

    /// Fetch trading limits for `pair`. Not debounced; the last call wins.
    pub fn refresh_min_amount(&self, pair: CurrencyPair) {
        self.inner.refresh_min_amount(pair);
    }

    pub fn pair(&self) -> CurrencyPair {
        self.inner.lock().pair.clone()
    }

    pub fn amount(&self) -> Decimal {
        self.inner.lock().amount
    }

    pub fn quote(&self) -> QuoteResult {
        self.inner.lock().quote.clone()
    }

    /// Min amount for the currently selected pair. Limits fetched for other
    /// pairs are kept but not reported.
    pub fn min_amount(&self) -> Option<Decimal> {
        self.inner.lock().current_min_amount()
    }

    pub fn subscribe_quote(&self) -> watch::Receiver<QuoteResult> {
        self.inner.quote_tx.subscribe()
    }

    pub fn snapshot(&self) -> QuoteSnapshot {
        let state = self.inner.lock();
        let min_amount = state.current_min_amount();
        QuoteSnapshot {
            pair: state.pair.clone(),
            amount: state.amount,
            quote: state.quote.clone(),
            min_amount,
            amount_label: format!("Amount (Min:{})", min_amount.unwrap_or(Decimal::ZERO)),
            withdraw_address: state.withdraw_address.clone(),
            refund_address: state.refund_address.clone(),
        }
    }

    /// Open an exchange order from the current selection. The min amount is
    /// advisory and not checked here.
    pub async fn submit_exchange(&self) -> Result<LastExchange, SwapError> {
        let order = {
            let state = self.inner.lock();
            ExchangeOrder {
                pair: state.pair.clone(),
                amount: state.amount,
                withdraw_address: state.withdraw_address.clone(),
                refund_address: Some(state.refund_address.clone()),
            }
        };

        let last = exchange::submit(self.inner.client.as_ref(), &order).await?;
        self.inner.lock().last_exchange = Some(last.clone());

        Ok(last)
    }

    pub fn last_exchange(&self) -> Option<LastExchange> {
        self.inner.lock().last_exchange.clone()
    }

    /// Fetch the status of the last exchange once.
    pub async fn refresh_status(&self) -> Result<LastExchange, SwapError> {
        let id = self
            .inner
            .lock()
            .last_exchange
            .as_ref()
            .map(|e| e.id.clone())
            .ok_or(SwapError::NoExchange)?;

        let status = self.inner.client.get_status(&id).await.map_err(|e| {
            tracing::warn!("Could not fetch status of exchange {}: {}", id, e);
            e
        })?;

        let mut state = self.inner.lock();
        match state.last_exchange.as_mut() {
            Some(last) if last.id == id => {
                tracing::debug!("Exchange {} status: {}", id, status);
                last.status = status;
            }
            _ => tracing::debug!("Dropping status for replaced exchange {}", id),
        }

        state.last_exchange.clone().ok_or(SwapError::NoExchange)
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, ControllerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &mut ControllerState, result: QuoteResult) {
        state.quote = result.clone();
        self.quote_tx.send_replace(result);
    }

    /// Start a new quote epoch for the current pair and amount.
    fn request_quote(self: &Arc<Self>) {
        // The debouncer is driven under the state lock so that schedule order
        // always matches epoch order.
        let mut state = self.lock();
        state.quote_epoch += 1;

        let request = QuoteRequest {
            epoch: state.quote_epoch,
            pair: state.pair.clone(),
            amount: state.amount,
        };

        if request.pair.is_identity() {
            self.debouncer.cancel();
            self.publish(&mut state, QuoteResult::Value(Decimal::ZERO));
            return;
        }

        self.publish(&mut state, QuoteResult::Pending);

        let inner = Arc::clone(self);
        self.debouncer.schedule(async move {
            inner.fetch_quote(request).await;
        });
    }

    async fn fetch_quote(self: Arc<Self>, request: QuoteRequest) {
        tracing::debug!(
            "Requesting quote #{}: {} {}",
            request.epoch,
            request.amount,
            request.pair
        );

        let result = match self
            .client
            .get_exchange_amount(&request.pair, request.amount)
            .await
        {
            Ok(value) => QuoteResult::Value(value),
            Err(e) => {
                tracing::warn!(
                    "Quote #{} for {} failed: {}",
                    request.epoch,
                    request.pair,
                    e
                );
                QuoteResult::Error(e.to_string())
            }
        };

        let mut state = self.lock();
        if state.quote_epoch != request.epoch {
            tracing::debug!(
                "Discarding stale quote #{} (latest is #{})",
                request.epoch,
                state.quote_epoch
            );
            return;
        }

        self.publish(&mut state, result);
    }

    fn refresh_min_amount(self: &Arc<Self>, pair: CurrencyPair) {
        let epoch = self.lock().next_min_epoch(&pair);
        self.fetch_min_amount(pair, epoch);
    }

    fn fetch_min_amount(self: &Arc<Self>, pair: CurrencyPair, epoch: u64) {
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            let params = match inner.client.get_pairs_params(&pair).await {
                Ok(params) => params,
                Err(e) => {
                    tracing::warn!("Could not fetch pair parameters for {}: {}", pair, e);
                    return;
                }
            };

            let mut state = inner.lock();
            if state.min_requests.get(&pair) != Some(&epoch) {
                tracing::debug!("Discarding stale pair parameters for {}", pair);
                return;
            }

            tracing::debug!("Min amount for {}: {}", pair, params.min_amount_float);
            state.min_amounts.insert(pair, params.min_amount_float);
        });
    }
}
