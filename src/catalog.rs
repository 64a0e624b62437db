use std::sync::Arc;

use serde::Serialize;
use tokio::sync::OnceCell;

use crate::client::ExchangeService;
use crate::error::SwapError;
use crate::types::Currency;

/// The enabled currencies, in the order the exchange listed them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrencyCatalog {
    currencies: Vec<Currency>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    pub index: usize,
    pub symbol: String,
    pub label: String,
}

impl CurrencyCatalog {
    pub fn from_full_list(currencies: Vec<Currency>) -> Self {
        Self {
            currencies: currencies.into_iter().filter(|c| c.enabled).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.currencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.currencies.is_empty()
    }

    pub fn currencies(&self) -> &[Currency] {
        &self.currencies
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.currencies.iter().map(Currency::symbol)
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.symbols().any(|s| s == symbol)
    }

    /// Resolve a selector index to its symbol.
    pub fn symbol_at(&self, index: usize) -> Result<&str, SwapError> {
        self.currencies
            .get(index)
            .map(Currency::symbol)
            .ok_or_else(|| {
                SwapError::InvalidSelection(format!(
                    "Currency index {} out of range ({} currencies)",
                    index,
                    self.currencies.len()
                ))
            })
    }

    pub fn entries(&self) -> Vec<CatalogEntry> {
        self.currencies
            .iter()
            .enumerate()
            .map(|(index, c)| CatalogEntry {
                index,
                symbol: c.symbol().to_string(),
                label: c.label(),
            })
            .collect()
    }
}

/// Fetches the catalog once and hands out the cached copy afterwards.
/// Callers that arrive while the first fetch is running wait on it.
#[derive(Debug, Default)]
pub struct CatalogLoader {
    cell: OnceCell<Arc<CurrencyCatalog>>,
}

impl CatalogLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<Arc<CurrencyCatalog>> {
        self.cell.get().cloned()
    }

    pub async fn load(
        &self,
        client: &dyn ExchangeService,
    ) -> Result<Arc<CurrencyCatalog>, SwapError> {
        let catalog = self
            .cell
            .get_or_try_init(|| async {
                tracing::debug!("Fetching currency catalog");
                let currencies = client.get_currencies_full().await.map_err(|e| {
                    tracing::warn!("Could not fetch currency catalog: {}", e);
                    e
                })?;
                let total = currencies.len();
                let catalog = CurrencyCatalog::from_full_list(currencies);
                tracing::info!(
                    "Loaded currency catalog: {} enabled of {}",
                    catalog.len(),
                    total
                );
                Ok::<_, SwapError>(Arc::new(catalog))
            })
            .await?;

        Ok(Arc::clone(catalog))
    }
}
