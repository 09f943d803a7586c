//! Exchange and market-data collaborator traits and their error types.
//!
//! The traits abstract over the venue so the execution machine and the
//! scheduler can be driven by in-memory fakes in tests.

pub mod bitget;
pub mod signing;

pub use bitget::{BitgetClient, BitgetConfig};
pub use signing::Credentials;

use crate::domain::{Candle, OrderSide, Position, Timeframe};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Market data failures. The [`MarketData`] trait degrades these to an
/// empty series; they surface only through the adapter's own methods.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("exchange error {code}: {msg}")]
    Api { code: String, msg: String },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),
}

/// Private (signed) endpoint failures.
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("network unreachable: {0}")]
    Transport(String),

    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("exchange error {code}: {msg}")]
    Api { code: String, msg: String },

    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("response format changed: {0}")]
    Schema(String),

    #[error("no credentials configured")]
    MissingCredentials,
}

impl ExchangeError {
    /// Bad key, bad signature, stale timestamp and similar. The operator
    /// must act; retrying will not help.
    pub fn is_authentication(&self) -> bool {
        matches!(self, Self::Authentication(_) | Self::MissingCredentials)
    }
}

/// A single order to place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: f64,
    /// Set on the symbol before the order when present.
    pub leverage: Option<u32>,
    pub reduce_only: bool,
    pub client_oid: String,
}

impl OrderRequest {
    /// Market order with a fresh client order id.
    pub fn market(symbol: &str, side: OrderSide, quantity: f64) -> Self {
        Self {
            symbol: symbol.to_string(),
            side,
            quantity,
            leverage: None,
            reduce_only: false,
            client_oid: uuid::Uuid::new_v4().to_string(),
        }
    }

    pub fn with_leverage(mut self, leverage: u32) -> Self {
        self.leverage = Some(leverage);
        self
    }

    pub fn reduce_only(mut self) -> Self {
        self.reduce_only = true;
        self
    }
}

/// Exchange acknowledgement of an accepted order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderAck {
    pub order_id: String,
    pub client_oid: String,
}

/// Account and order operations against a venue.
///
/// Implementations must bound every call with a timeout and never retry.
pub trait Exchange: Send + Sync {
    /// USD-denominated account equity.
    fn equity(&self) -> Result<f64, ExchangeError>;

    /// Open position for `symbol`, `None` when flat.
    fn position(&self, symbol: &str) -> Result<Option<Position>, ExchangeError>;

    fn submit_order(&self, request: &OrderRequest) -> Result<OrderAck, ExchangeError>;
}

/// Candle source.
pub trait MarketData: Send + Sync {
    /// Up to `limit` candles, oldest-first. Empty on any transport or
    /// schema failure.
    fn fetch_candles(&self, symbol: &str, timeframe: Timeframe, limit: usize) -> Vec<Candle>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn market_orders_get_unique_client_ids() {
        let a = OrderRequest::market("BTCUSDT", OrderSide::Buy, 1.0);
        let b = OrderRequest::market("BTCUSDT", OrderSide::Buy, 1.0);
        assert_ne!(a.client_oid, b.client_oid);
        assert!(!a.reduce_only);
        assert_eq!(a.leverage, None);
    }

    #[test]
    fn builder_flags() {
        let req = OrderRequest::market("ETHUSDT", OrderSide::Sell, 0.5)
            .with_leverage(20)
            .reduce_only();
        assert_eq!(req.leverage, Some(20));
        assert!(req.reduce_only);
    }

    #[test]
    fn authentication_classification() {
        assert!(ExchangeError::Authentication("sign".into()).is_authentication());
        assert!(ExchangeError::MissingCredentials.is_authentication());
        assert!(!ExchangeError::Transport("timeout".into()).is_authentication());
    }
}
