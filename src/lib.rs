pub mod catalog;
pub mod client;
pub mod config;
pub mod controller;
pub mod debounce;
pub mod error;
pub mod exchange;
pub mod server;
pub mod types;

pub use client::{ChangellyClient, ExchangeService};
pub use controller::QuoteController;
pub use error::SwapError;
pub use server::create_coin_swap_router;
