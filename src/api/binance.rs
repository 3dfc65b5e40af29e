use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Deserialize;
use sha2::Sha256;
use std::time::Duration;

use super::{BalanceProvider, CandleProvider};
use crate::error::BotError;
use crate::models::{Balances, Candle};
use crate::Result;

pub const BINANCE_TESTNET_BASE: &str = "https://testnet.binance.vision";
const RECV_WINDOW_MS: u64 = 5000;
const REQUEST_TIMEOUT_SECS: u64 = 30;

type HmacSha256 = Hmac<Sha256>;

/// Binance spot REST client (testnet by default)
#[derive(Clone)]
pub struct BinanceClient {
    client: Client,
    base_url: String,
    credentials: Option<Credentials>,
}

#[derive(Clone)]
struct Credentials {
    api_key: String,
    api_secret: String,
}

// ============== Response Types ==============

/// Kline row: [open time, open, high, low, close, volume, close time, ...]
#[derive(Debug, Deserialize)]
struct RawKline(
    i64,
    String,
    String,
    String,
    String,
    String,
    serde::de::IgnoredAny,
    serde::de::IgnoredAny,
    serde::de::IgnoredAny,
    serde::de::IgnoredAny,
    serde::de::IgnoredAny,
    serde::de::IgnoredAny,
);

#[derive(Debug, Deserialize)]
struct AccountResponse {
    balances: Vec<RawBalance>,
}

#[derive(Debug, Deserialize)]
struct RawBalance {
    asset: String,
    free: String,
}

impl TryFrom<RawKline> for Candle {
    type Error = BotError;

    fn try_from(raw: RawKline) -> Result<Self> {
        let timestamp = DateTime::<Utc>::from_timestamp_millis(raw.0).ok_or_else(|| {
            BotError::MalformedData(format!("kline open time {} out of range", raw.0))
        })?;

        Ok(Candle {
            timestamp,
            open: parse_decimal("open", &raw.1)?,
            high: parse_decimal("high", &raw.2)?,
            low: parse_decimal("low", &raw.3)?,
            close: parse_decimal("close", &raw.4)?,
            volume: parse_decimal("volume", &raw.5)?,
        })
    }
}

// ============== Implementation ==============

impl BinanceClient {
    /// Unauthenticated client; enough for market data
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials: None,
        })
    }

    /// Attach API credentials for signed account requests
    pub fn with_credentials(mut self, api_key: String, api_secret: String) -> Self {
        self.credentials = Some(Credentials {
            api_key,
            api_secret,
        });
        self
    }

    /// Endpoint: GET /api/v3/klines
    async fn get_klines(&self, symbol: &str, interval: &str, limit: usize) -> Result<Vec<Candle>> {
        let url = format!("{}/api/v3/klines", self.base_url);
        let limit = limit.to_string();

        let response = self
            .client
            .get(&url)
            .query(&[("symbol", symbol), ("interval", interval), ("limit", limit.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BotError::Fetch(format!(
                "klines request returned {}: {}",
                status, body
            )));
        }

        let raw: Vec<RawKline> = response.json().await?;
        let candles = raw
            .into_iter()
            .map(Candle::try_from)
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!("Fetched {} candles for {} ({})", candles.len(), symbol, interval);

        Ok(candles)
    }

    /// Endpoint: GET /api/v3/account (signed)
    async fn get_account(&self) -> Result<Balances> {
        let credentials = self.credentials.as_ref().ok_or_else(|| {
            BotError::Config("API key and secret are required for account balances".into())
        })?;

        let query = format!(
            "timestamp={}&recvWindow={}",
            Utc::now().timestamp_millis(),
            RECV_WINDOW_MS
        );
        let signature = sign(&credentials.api_secret, &query)?;
        let url = format!(
            "{}/api/v3/account?{}&signature={}",
            self.base_url, query, signature
        );

        let response = self
            .client
            .get(&url)
            .header("X-MBX-APIKEY", &credentials.api_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BotError::Fetch(format!(
                "account request returned {}: {}",
                status, body
            )));
        }

        let account: AccountResponse = response.json().await?;
        account
            .balances
            .into_iter()
            .map(|b| -> Result<(String, f64)> { Ok((b.asset, parse_decimal("free", &b.free)?)) })
            .collect()
    }
}

#[async_trait]
impl CandleProvider for BinanceClient {
    async fn fetch_candles(
        &self,
        symbol: &str,
        interval: &str,
        limit: usize,
    ) -> Result<Vec<Candle>> {
        self.get_klines(symbol, interval, limit).await
    }
}

#[async_trait]
impl BalanceProvider for BinanceClient {
    async fn get_balances(&self) -> Result<Balances> {
        self.get_account().await
    }
}

/// Hex HMAC-SHA256 of the query string
fn sign(secret: &str, query: &str) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| BotError::Config(format!("failed to init signer: {}", e)))?;
    mac.update(query.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn parse_decimal(field: &str, value: &str) -> Result<f64> {
    value
        .parse::<f64>()
        .map_err(|_| BotError::MalformedData(format!("invalid {} value '{}'", field, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    const KLINES_BODY: &str = r#"[
        [1700000000000, "2000.10", "2001.00", "1999.50", "2000.50", "12.5", 1700000059999, "25000.0", 40, "6.0", "12000.0", "0"],
        [1700000060000, "2000.50", "2003.00", "2000.00", "2002.75", "8.25", 1700000119999, "16500.0", 31, "4.0", "8000.0", "0"]
    ]"#;

    #[test]
    fn test_sign_matches_binance_docs_example() {
        // Example from the Binance REST API documentation
        let secret = "NhqPtmdSJYdKjVHjA7PZj4Mge3R5YNiP1e3UZjInClVN65XAbvqqM6A7H5fATj0j";
        let query = "symbol=LTCBTC&side=BUY&type=LIMIT&timeInForce=GTC&quantity=1&price=0.1&recvWindow=5000&timestamp=1499827319559";

        assert_eq!(
            sign(secret, query).unwrap(),
            "c8db56825ae71d6d79447849e617115f4a920fa2acdcab2b053c4b2838bd6b71"
        );
    }

    #[test]
    fn test_parse_kline_row() {
        let rows: Vec<RawKline> = serde_json::from_str(KLINES_BODY).unwrap();
        let candle = Candle::try_from(rows.into_iter().next().unwrap()).unwrap();

        assert_eq!(candle.timestamp.timestamp_millis(), 1_700_000_000_000);
        assert_eq!(candle.close, 2000.5);
        assert_eq!(candle.volume, 12.5);
    }

    #[test]
    fn test_bad_decimal_is_malformed() {
        let result = parse_decimal("close", "abc");
        assert!(matches!(result, Err(BotError::MalformedData(_))));
    }

    #[tokio::test]
    async fn test_fetch_candles() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v3/klines")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("symbol".into(), "ETHUSDT".into()),
                Matcher::UrlEncoded("interval".into(), "1m".into()),
                Matcher::UrlEncoded("limit".into(), "2".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(KLINES_BODY)
            .create_async()
            .await;

        let client = BinanceClient::new(&server.url()).unwrap();
        let candles = client.fetch_candles("ETHUSDT", "1m", 2).await.unwrap();

        mock.assert_async().await;
        assert_eq!(candles.len(), 2);
        assert!(candles[0].timestamp < candles[1].timestamp);
        assert_eq!(candles[1].close, 2002.75);
    }

    #[tokio::test]
    async fn test_rate_limit_is_fetch_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/v3/klines")
            .match_query(Matcher::Any)
            .with_status(429)
            .with_body(r#"{"code":-1003,"msg":"Too many requests"}"#)
            .create_async()
            .await;

        let client = BinanceClient::new(&server.url()).unwrap();
        let result = client.fetch_candles("ETHUSDT", "1m", 100).await;

        match result {
            Err(BotError::Fetch(msg)) => assert!(msg.contains("429")),
            other => panic!("expected fetch error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_garbage_body_is_fetch_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/v3/klines")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let client = BinanceClient::new(&server.url()).unwrap();
        let result = client.fetch_candles("ETHUSDT", "1m", 100).await;
        assert!(matches!(result, Err(BotError::Fetch(_))));
    }

    #[tokio::test]
    async fn test_get_balances_signed() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v3/account")
            .match_header("X-MBX-APIKEY", "test-key")
            .match_query(Matcher::AllOf(vec![
                Matcher::Regex("timestamp=\\d+".into()),
                Matcher::UrlEncoded("recvWindow".into(), "5000".into()),
                Matcher::Regex("signature=[0-9a-f]{64}".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"balances":[
                    {"asset":"USDT","free":"10000.00000000","locked":"0.00000000"},
                    {"asset":"ETH","free":"1.50000000","locked":"0.00000000"}
                ]}"#,
            )
            .create_async()
            .await;

        let client = BinanceClient::new(&server.url())
            .unwrap()
            .with_credentials("test-key".into(), "test-secret".into());
        let balances = client.get_balances().await.unwrap();

        mock.assert_async().await;
        assert_eq!(balances.get("USDT"), Some(&10000.0));
        assert_eq!(balances.get("ETH"), Some(&1.5));
    }

    #[tokio::test]
    async fn test_get_balances_requires_credentials() {
        let client = BinanceClient::new(BINANCE_TESTNET_BASE).unwrap();
        let result = client.get_balances().await;
        assert!(matches!(result, Err(BotError::Config(_))));
    }
}
