use axum::routing::{get, post};
use axum::{Router, extract::Json, extract::State};
use serde::{Deserialize, Serialize};

use crate::catalog::CatalogEntry;
use crate::controller::{QuoteController, QuoteSnapshot, parse_amount};
use crate::error::SwapError;
use crate::exchange::LastExchange;
use crate::types::CurrencyPair;

/// Coin Swap State
#[derive(Clone)]
pub struct CoinSwapState {
    controller: QuoteController,
}

pub async fn create_coin_swap_router(controller: QuoteController) -> anyhow::Result<Router> {
    let state = CoinSwapState { controller };

    let router = Router::new()
        .route("/currencies", get(get_currencies))
        .route("/pair", post(post_pair))
        .route("/select", post(post_select))
        .route("/amount", post(post_amount))
        .route("/addresses", post(post_addresses))
        .route("/quote", get(get_quote))
        .route("/exchange", post(post_exchange))
        .route("/status", get(get_status))
        .route("/status/refresh", post(post_refresh_status))
        .with_state(state);

    Ok(router)
}

pub async fn get_currencies(
    State(state): State<CoinSwapState>,
) -> Result<Json<Vec<CatalogEntry>>, SwapError> {
    let catalog = state.controller.load_catalog().await?;
    Ok(Json(catalog.entries()))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairRequest {
    pub from: String,
    pub to: String,
}

pub async fn post_pair(
    State(state): State<CoinSwapState>,
    Json(payload): Json<PairRequest>,
) -> Result<Json<QuoteSnapshot>, SwapError> {
    tracing::debug!("Received pair {} -> {}", payload.from, payload.to);

    state
        .controller
        .set_pair(CurrencyPair::new(payload.from, payload.to));

    Ok(Json(state.controller.snapshot()))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectRequest {
    pub from_index: usize,
    pub to_index: usize,
}

pub async fn post_select(
    State(state): State<CoinSwapState>,
    Json(payload): Json<SelectRequest>,
) -> Result<Json<QuoteSnapshot>, SwapError> {
    let pair = state
        .controller
        .select_pair_by_index(payload.from_index, payload.to_index)
        .map_err(|e| {
            tracing::warn!(
                "Invalid selection {} -> {}: {}",
                payload.from_index,
                payload.to_index,
                e
            );
            e
        })?;

    tracing::debug!("Selected pair {}", pair);
    Ok(Json(state.controller.snapshot()))
}

/// The amount as typed into the field, or as a plain JSON number.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AmountInput {
    Text(String),
    Number(serde_json::Number),
}

impl AmountInput {
    fn as_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Number(number) => number.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmountRequest {
    pub amount: AmountInput,
}

pub async fn post_amount(
    State(state): State<CoinSwapState>,
    Json(payload): Json<AmountRequest>,
) -> Result<Json<QuoteSnapshot>, SwapError> {
    let amount = parse_amount(&payload.amount.as_text())?;
    state.controller.set_amount(amount);

    Ok(Json(state.controller.snapshot()))
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AddressesRequest {
    #[serde(default)]
    pub withdraw_address: Option<String>,
    #[serde(default)]
    pub refund_address: Option<String>,
}

pub async fn post_addresses(
    State(state): State<CoinSwapState>,
    Json(payload): Json<AddressesRequest>,
) -> Result<Json<QuoteSnapshot>, SwapError> {
    if let Some(address) = payload.withdraw_address {
        state.controller.set_withdraw_address(address);
    }
    if let Some(address) = payload.refund_address {
        state.controller.set_refund_address(address);
    }

    Ok(Json(state.controller.snapshot()))
}

pub async fn get_quote(State(state): State<CoinSwapState>) -> Json<QuoteSnapshot> {
    Json(state.controller.snapshot())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeResponse {
    pub id: String,
    pub payin_address: String,
}

pub async fn post_exchange(
    State(state): State<CoinSwapState>,
) -> Result<Json<ExchangeResponse>, SwapError> {
    let last = state.controller.submit_exchange().await?;

    Ok(Json(ExchangeResponse {
        id: last.id,
        payin_address: last.payin_address,
    }))
}

/// Last exchange as shown in the status panel.
#[derive(Debug, Clone, Serialize)]
pub struct ExchangeStatus {
    #[serde(flatten)]
    pub exchange: LastExchange,
    pub short_payin_address: String,
}

impl From<LastExchange> for ExchangeStatus {
    fn from(exchange: LastExchange) -> Self {
        Self {
            short_payin_address: exchange.short_payin_address(),
            exchange,
        }
    }
}

pub async fn get_status(
    State(state): State<CoinSwapState>,
) -> Result<Json<ExchangeStatus>, SwapError> {
    state
        .controller
        .last_exchange()
        .map(|last| Json(last.into()))
        .ok_or(SwapError::NoExchange)
}

pub async fn post_refresh_status(
    State(state): State<CoinSwapState>,
) -> Result<Json<ExchangeStatus>, SwapError> {
    let last = state.controller.refresh_status().await?;
    tracing::info!("Exchange {} is {}", last.id, last.status);

    Ok(Json(last.into()))
}
