//! InfluxDB 1.x HTTP client.
//!
//! Uses `/query` for `SHOW DATABASES` / `CREATE DATABASE` and `/write` with
//! second precision for batches of points.

use super::{Point, StoreConfig, TimeSeriesStore};
use crate::error::TeleinfoError;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    results: Vec<StatementResult>,
}

#[derive(Debug, Deserialize)]
struct StatementResult {
    #[serde(default)]
    series: Vec<Series>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Series {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

/// Client for one InfluxDB server.
#[derive(Debug, Clone)]
pub struct InfluxClient {
    url: String,
    client: Client,
}

fn transport_error(e: reqwest::Error) -> TeleinfoError {
    TeleinfoError::StoreUnreachable(e.to_string())
}

/// Server errors are treated like an unreachable server; InfluxDB answers 503
/// while it is still starting.
async fn check_status(response: Response) -> Result<Response, TeleinfoError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = format!("{status} - {}", body.trim());
    if status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT {
        Err(TeleinfoError::StoreUnreachable(message))
    } else {
        Err(TeleinfoError::StoreRejected(message))
    }
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('\\', "\\\\").replace('"', "\\\""))
}

impl InfluxClient {
    pub fn new(config: &StoreConfig) -> Result<Self, TeleinfoError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| TeleinfoError::ConfigError(e.to_string()))?;
        Ok(InfluxClient {
            url: config.url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn query(&self, q: &str) -> Result<QueryResponse, TeleinfoError> {
        let response = self
            .client
            .post(format!("{}/query", self.url))
            .form(&[("q", q)])
            .send()
            .await
            .map_err(transport_error)?;
        let response = check_status(response).await?;
        let parsed: QueryResponse = response
            .json()
            .await
            .map_err(|e| TeleinfoError::StoreRejected(format!("invalid query response: {e}")))?;

        if let Some(error) = parsed.results.iter().find_map(|r| r.error.as_ref()) {
            return Err(TeleinfoError::StoreRejected(error.clone()));
        }
        Ok(parsed)
    }
}

#[async_trait::async_trait]
impl TimeSeriesStore for InfluxClient {
    async fn list_databases(&self) -> Result<Vec<String>, TeleinfoError> {
        let response = self.query("SHOW DATABASES").await?;
        Ok(response
            .results
            .into_iter()
            .flat_map(|r| r.series)
            .flat_map(|s| s.values)
            .filter_map(|row| row.first().and_then(|v| v.as_str()).map(str::to_string))
            .collect())
    }

    async fn create_database(&self, name: &str) -> Result<(), TeleinfoError> {
        self.query(&format!("CREATE DATABASE {}", quote_identifier(name)))
            .await
            .map(|_| ())
    }

    async fn write_points(&self, database: &str, points: &[Point]) -> Result<(), TeleinfoError> {
        let body = points
            .iter()
            .map(Point::to_line_protocol)
            .collect::<Vec<_>>()
            .join("\n");

        log::debug!("Writing {} points to {database}", points.len());
        let response = self
            .client
            .post(format!("{}/write", self.url))
            .query(&[("db", database), ("precision", "s")])
            .header("Content-Type", "text/plain; charset=utf-8")
            .body(body)
            .send()
            .await
            .map_err(transport_error)?;
        check_status(response).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_show_databases() {
        let json = r#"{"results":[{"statement_id":0,"series":[{"name":"databases","columns":["name"],"values":[["_internal"],["linky"]]}]}]}"#;
        let parsed: QueryResponse = serde_json::from_str(json).unwrap();
        let names: Vec<_> = parsed
            .results
            .into_iter()
            .flat_map(|r| r.series)
            .flat_map(|s| s.values)
            .filter_map(|row| row.first().and_then(|v| v.as_str()).map(str::to_string))
            .collect();
        assert_eq!(names, vec!["_internal", "linky"]);
    }

    #[test]
    fn test_parse_statement_error() {
        let json = r#"{"results":[{"statement_id":0,"error":"database not found"}]}"#;
        let parsed: QueryResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.results[0].error.as_deref(), Some("database not found"));
    }

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("linky"), "\"linky\"");
        assert_eq!(quote_identifier("a\"b"), "\"a\\\"b\"");
    }

    #[tokio::test]
    async fn test_unreachable_server() {
        let config = StoreConfig {
            // Port 9 (discard) is closed on test machines.
            url: "http://127.0.0.1:9/".into(),
            request_timeout_secs: 2,
            ..StoreConfig::default()
        };
        let client = InfluxClient::new(&config).unwrap();
        assert_eq!(client.url(), "http://127.0.0.1:9");
        assert!(matches!(
            client.list_databases().await,
            Err(TeleinfoError::StoreUnreachable(_))
        ));
    }
}
