//! Bitget USDT-margined perpetual futures adapter.
//!
//! Public candles come from the v2 mix market endpoint; equity from the v1
//! accounts endpoint (`usdtEquity`); positions, leverage and orders from the
//! v2 mix private endpoints. The account is assumed to be in one-way
//! position mode with cross margin.
//!
//! No retries: a failed call is reported once and the caller skips the
//! symbol for the cycle.

use super::signing::Credentials;
use super::{DataError, Exchange, ExchangeError, MarketData, OrderAck, OrderRequest};
use crate::domain::{normalize_series, Candle, Position, Side, Timeframe};
use chrono::{DateTime, Utc};
use reqwest::blocking::Client;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

const SUCCESS_CODE: &str = "00000";

/// Bitget codes for bad key, expired timestamp, bad signature, bad
/// passphrase and similar credential problems.
const AUTH_CODES: &[&str] = &["40006", "40008", "40009", "40011", "40012", "40037"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BitgetConfig {
    pub base_url: String,
    /// Product type for v2 market data, e.g. "usdt-futures".
    pub product_type: String,
    /// Product type for the v1 accounts endpoint, e.g. "umcbl".
    pub account_product_type: String,
    pub margin_coin: String,
    pub margin_mode: String,
    pub market_timeout_secs: u64,
    pub private_timeout_secs: u64,
}

impl Default for BitgetConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.bitget.com".to_string(),
            product_type: "usdt-futures".to_string(),
            account_product_type: "umcbl".to_string(),
            margin_coin: "USDT".to_string(),
            margin_mode: "crossed".to_string(),
            market_timeout_secs: 8,
            private_timeout_secs: 10,
        }
    }
}

pub struct BitgetClient {
    config: BitgetConfig,
    market: Client,
    private: Client,
    credentials: Option<Credentials>,
}

/// Standard response envelope.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    code: String,
    #[serde(default)]
    msg: String,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountRow {
    usdt_equity: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PositionRow {
    symbol: String,
    hold_side: String,
    total: String,
    open_price_avg: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderRow {
    order_id: String,
    #[serde(default)]
    client_oid: String,
}

impl BitgetClient {
    pub fn new(config: BitgetConfig, credentials: Option<Credentials>) -> Result<Self, ExchangeError> {
        let build = |secs: u64| {
            Client::builder()
                .timeout(Duration::from_secs(secs))
                .build()
                .map_err(|e| ExchangeError::Transport(format!("failed to build HTTP client: {e}")))
        };
        Ok(Self {
            market: build(config.market_timeout_secs)?,
            private: build(config.private_timeout_secs)?,
            config,
            credentials,
        })
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }

    /// Fetch candles, reporting the failure instead of degrading it.
    pub fn candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>, DataError> {
        let url = format!("{}/api/v2/mix/market/candles", self.config.base_url);
        let limit = limit.to_string();
        let resp = self
            .market
            .get(&url)
            .query(&[
                ("symbol", symbol),
                ("productType", self.config.product_type.as_str()),
                ("granularity", timeframe.as_str()),
                ("limit", limit.as_str()),
            ])
            .send()
            .map_err(|e| DataError::NetworkUnreachable(e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .map_err(|e| DataError::NetworkUnreachable(e.to_string()))?;
        if !status.is_success() {
            return Err(DataError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }
        parse_candles(&body)
    }

    fn timestamp_ms() -> String {
        Utc::now().timestamp_millis().to_string()
    }

    fn signed<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<serde_json::Value>,
    ) -> Result<T, ExchangeError> {
        let creds = self
            .credentials
            .as_ref()
            .ok_or(ExchangeError::MissingCredentials)?;

        let query_string = query
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        let request_path = if query_string.is_empty() {
            path.to_string()
        } else {
            format!("{path}?{query_string}")
        };
        let body_text = body.map(|b| b.to_string()).unwrap_or_default();
        let headers = creds.headers(
            &Self::timestamp_ms(),
            method.as_str(),
            &request_path,
            &body_text,
        )?;

        let url = format!("{}{}", self.config.base_url, request_path);
        let mut req = self.private.request(method, &url);
        for (name, value) in headers {
            req = req.header(name, value);
        }
        if !body_text.is_empty() {
            req = req.body(body_text);
        }

        let resp = req
            .send()
            .map_err(|e| ExchangeError::Transport(e.to_string()))?;
        let status = resp.status();
        let text = resp
            .text()
            .map_err(|e| ExchangeError::Transport(e.to_string()))?;
        debug!(path, status = status.as_u16(), "bitget private call");
        parse_private(status, &text)
    }

    fn set_leverage(&self, symbol: &str, leverage: u32) -> Result<(), ExchangeError> {
        let body = json!({
            "symbol": symbol,
            "productType": self.config.product_type,
            "marginCoin": self.config.margin_coin,
            "leverage": leverage.to_string(),
        });
        let _: serde_json::Value = self.signed(
            Method::POST,
            "/api/v2/mix/account/set-leverage",
            &[],
            Some(body),
        )?;
        Ok(())
    }
}

impl MarketData for BitgetClient {
    fn fetch_candles(&self, symbol: &str, timeframe: Timeframe, limit: usize) -> Vec<Candle> {
        match self.candles(symbol, timeframe, limit) {
            Ok(candles) => candles,
            Err(e) => {
                warn!(symbol, timeframe = %timeframe, error = %e, "candle fetch failed");
                Vec::new()
            }
        }
    }
}

impl Exchange for BitgetClient {
    fn equity(&self) -> Result<f64, ExchangeError> {
        let rows: Vec<AccountRow> = self.signed(
            Method::GET,
            "/api/mix/v1/account/accounts",
            &[("productType", self.config.account_product_type.as_str())],
            None,
        )?;
        parse_equity(&rows)
    }

    fn position(&self, symbol: &str) -> Result<Option<Position>, ExchangeError> {
        let rows: Vec<PositionRow> = self.signed(
            Method::GET,
            "/api/v2/mix/position/single-position",
            &[
                ("symbol", symbol),
                ("productType", self.config.product_type.as_str()),
                ("marginCoin", self.config.margin_coin.as_str()),
            ],
            None,
        )?;
        parse_position(symbol, &rows)
    }

    fn submit_order(&self, request: &OrderRequest) -> Result<OrderAck, ExchangeError> {
        if let Some(leverage) = request.leverage {
            self.set_leverage(&request.symbol, leverage)?;
        }
        let body = json!({
            "symbol": request.symbol,
            "productType": self.config.product_type,
            "marginMode": self.config.margin_mode,
            "marginCoin": self.config.margin_coin,
            "size": format_quantity(request.quantity),
            "side": request.side.as_str(),
            "orderType": "market",
            "reduceOnly": if request.reduce_only { "YES" } else { "NO" },
            "clientOid": request.client_oid,
        });
        let row: OrderRow =
            self.signed(Method::POST, "/api/v2/mix/order/place-order", &[], Some(body))?;
        Ok(OrderAck {
            order_id: row.order_id,
            client_oid: if row.client_oid.is_empty() {
                request.client_oid.clone()
            } else {
                row.client_oid
            },
        })
    }
}

/// Quantity as a plain decimal without trailing zeros.
pub fn format_quantity(quantity: f64) -> String {
    let text = format!("{quantity:.4}");
    let text = text.trim_end_matches('0').trim_end_matches('.');
    if text.is_empty() {
        "0".to_string()
    } else {
        text.to_string()
    }
}

fn parse_number(field: &str, value: &str) -> Result<f64, String> {
    value
        .parse::<f64>()
        .map_err(|_| format!("{field} is not a number: {value:?}"))
}

/// Parse the candles response. Rows are `[ts_ms, open, high, low, close, base_vol, ...]`
/// as strings; the result is normalised oldest-first.
fn parse_candles(body: &str) -> Result<Vec<Candle>, DataError> {
    let envelope: Envelope<Vec<Vec<String>>> = serde_json::from_str(body)
        .map_err(|e| DataError::ResponseFormatChanged(format!("candles: {e}")))?;
    if envelope.code != SUCCESS_CODE {
        return Err(DataError::Api {
            code: envelope.code,
            msg: envelope.msg,
        });
    }

    let rows = envelope.data.unwrap_or_default();
    let mut candles = Vec::with_capacity(rows.len());
    for row in rows {
        if row.len() < 6 {
            return Err(DataError::ResponseFormatChanged(format!(
                "candle row has {} fields",
                row.len()
            )));
        }
        let field = |i: usize, name: &str| {
            parse_number(name, &row[i]).map_err(DataError::ResponseFormatChanged)
        };
        let ts_ms = row[0]
            .parse::<i64>()
            .map_err(|_| DataError::ResponseFormatChanged(format!("bad timestamp {:?}", row[0])))?;
        let timestamp = DateTime::from_timestamp_millis(ts_ms)
            .ok_or_else(|| DataError::ResponseFormatChanged(format!("timestamp out of range: {ts_ms}")))?;
        candles.push(Candle {
            timestamp,
            open: field(1, "open")?,
            high: field(2, "high")?,
            low: field(3, "low")?,
            close: field(4, "close")?,
            volume: field(5, "volume")?,
        });
    }
    Ok(normalize_series(candles))
}

/// Decode a private endpoint response, classifying failures.
fn parse_private<T: DeserializeOwned>(status: StatusCode, body: &str) -> Result<T, ExchangeError> {
    let envelope: Option<Envelope<T>> = serde_json::from_str(body).ok();

    if let Some(env) = &envelope {
        if env.code != SUCCESS_CODE {
            if AUTH_CODES.contains(&env.code.as_str()) {
                return Err(ExchangeError::Authentication(format!(
                    "{}: {}",
                    env.code, env.msg
                )));
            }
            return Err(ExchangeError::Api {
                code: env.code.clone(),
                msg: env.msg.clone(),
            });
        }
    }

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(ExchangeError::Authentication(format!("HTTP {status}")));
    }
    if !status.is_success() {
        return Err(ExchangeError::HttpStatus {
            status: status.as_u16(),
            body: body.to_string(),
        });
    }

    match envelope {
        Some(env) => env
            .data
            .ok_or_else(|| ExchangeError::Schema("response has no data".into())),
        None => Err(ExchangeError::Schema(format!(
            "unparseable response: {}",
            body.chars().take(200).collect::<String>()
        ))),
    }
}

fn parse_equity(rows: &[AccountRow]) -> Result<f64, ExchangeError> {
    let raw = rows
        .first()
        .and_then(|r| r.usdt_equity.as_deref())
        .ok_or_else(|| ExchangeError::Schema("no usdtEquity in accounts response".into()))?;
    parse_number("usdtEquity", raw).map_err(ExchangeError::Schema)
}

/// First row with a nonzero size. One-way mode reports at most one.
fn parse_position(symbol: &str, rows: &[PositionRow]) -> Result<Option<Position>, ExchangeError> {
    for row in rows.iter().filter(|r| r.symbol.eq_ignore_ascii_case(symbol)) {
        let size = parse_number("total", &row.total).map_err(ExchangeError::Schema)?;
        if size <= 0.0 {
            continue;
        }
        let side = match row.hold_side.as_str() {
            "long" | "buy" => Side::Long,
            "short" | "sell" => Side::Short,
            other => {
                return Err(ExchangeError::Schema(format!("unknown holdSide {other:?}")));
            }
        };
        return Ok(Some(Position {
            symbol: row.symbol.clone(),
            side,
            size,
            average_entry_price: parse_number("openPriceAvg", &row.open_price_avg)
                .map_err(ExchangeError::Schema)?,
        }));
    }
    Ok(None)
}
