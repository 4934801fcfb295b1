use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use bookshelf_kernel::settings::SummarySettings;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use serde_json::Value;

use super::SummaryProvider;
use crate::utils::normalize_isbn;

/// Open Library client.
///
/// Looks up the edition by ISBN first and falls back to the edition's first
/// work when the edition carries no description.
#[derive(Debug, Clone)]
pub struct OpenLibraryClient {
    client: reqwest::Client,
    base_url: String,
}

impl OpenLibraryClient {
    pub fn new(settings: &SummarySettings) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .user_agent(settings.user_agent.clone())
            .default_headers(headers)
            .timeout(Duration::from_millis(settings.timeout_ms))
            .build()
            .context("failed to build Open Library HTTP client")?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json(&self, url: &str) -> Option<Value> {
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(url, error = %err, "summary lookup request failed");
                return None;
            }
        };

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(url, status = status.as_u16(), "summary lookup returned an error status");
            return None;
        }

        match response.json::<Value>().await {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(url, error = %err, "summary lookup returned malformed JSON");
                None
            }
        }
    }
}

#[async_trait]
impl SummaryProvider for OpenLibraryClient {
    async fn fetch_summary(&self, isbn: &str) -> Option<String> {
        let isbn = normalize_isbn(isbn);
        if isbn.is_empty() || !isbn.chars().all(|c| c.is_ascii_alphanumeric()) {
            tracing::debug!(%isbn, "skipping summary lookup for unusable ISBN");
            return None;
        }

        let edition = self
            .get_json(&format!("{}/isbn/{}.json", self.base_url, isbn))
            .await?;
        if let Some(summary) = extract_description(&edition) {
            tracing::debug!(%isbn, source = "edition", "summary found");
            return Some(summary);
        }

        let Some(work) = work_key(&edition) else {
            tracing::debug!(%isbn, "edition has no description and no work reference");
            return None;
        };
        let work_doc = self
            .get_json(&format!("{}{}.json", self.base_url, work))
            .await?;

        let summary = extract_description(&work_doc);
        tracing::debug!(%isbn, work, found = summary.is_some(), source = "work", "summary lookup finished");
        summary
    }
}

/// Read a usable `description`: either a plain string or a typed text
/// object `{"type": "/type/text", "value": "..."}`. Blank text counts as
/// missing.
pub fn extract_description(document: &Value) -> Option<String> {
    let text = match document.get("description")? {
        Value::String(text) => text.as_str(),
        Value::Object(map) => map.get("value")?.as_str()?,
        _ => return None,
    };

    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// `works[0].key` of an edition document, e.g. `/works/OL45883W`.
fn work_key(edition: &Value) -> Option<&str> {
    edition
        .get("works")?
        .as_array()?
        .first()?
        .get("key")?
        .as_str()
        .filter(|key| {
            key.starts_with("/works/")
                && key[1..]
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '/')
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::Path,
        http::{header::USER_AGENT, HeaderMap as RequestHeaders, StatusCode},
        response::{IntoResponse, Response},
        routing::get,
        Json, Router,
    };
    use serde_json::json;

    async fn edition(Path(file): Path<String>, headers: RequestHeaders) -> Response {
        match file.as_str() {
            "111.json" => Json(json!({"description": "  Edition summary.  "})).into_response(),
            "222.json" => Json(json!({"works": [{"key": "/works/OL1W"}]})).into_response(),
            "333.json" => Json(json!({"works": [{"key": "/works/OL2W"}]})).into_response(),
            "444.json" => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
            "555.json" => "definitely not json".into_response(),
            "666.json" => Json(json!({
                "description": {"type": "/type/text", "value": "Typed edition summary."}
            }))
            .into_response(),
            "777.json" => {
                let agent = headers
                    .get(USER_AGENT)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                Json(json!({ "description": agent })).into_response()
            }
            "888.json" => {
                tokio::time::sleep(Duration::from_secs(2)).await;
                Json(json!({"description": "too late"})).into_response()
            }
            "999.json" => Json(json!({"title": "No description, no works"})).into_response(),
            _ => StatusCode::NOT_FOUND.into_response(),
        }
    }

    async fn work(Path(file): Path<String>) -> Response {
        match file.as_str() {
            "OL1W.json" => Json(json!({
                "description": {"type": "/type/text", "value": "Work summary."}
            }))
            .into_response(),
            "OL2W.json" => Json(json!({"description": "   "})).into_response(),
            _ => StatusCode::NOT_FOUND.into_response(),
        }
    }

    async fn stub_client(timeout_ms: u64) -> OpenLibraryClient {
        let app = Router::new()
            .route("/isbn/{file}", get(edition))
            .route("/works/{file}", get(work));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        OpenLibraryClient::new(&SummarySettings {
            enabled: true,
            base_url: format!("http://{}/", address),
            user_agent: "BookshelfTest/0.1".to_string(),
            timeout_ms,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn edition_description_wins() {
        let client = stub_client(2000).await;
        assert_eq!(
            client.fetch_summary("111").await.as_deref(),
            Some("Edition summary.")
        );
        assert_eq!(
            client.fetch_summary("666").await.as_deref(),
            Some("Typed edition summary.")
        );
    }

    #[tokio::test]
    async fn falls_back_to_work() {
        let client = stub_client(2000).await;
        assert_eq!(
            client.fetch_summary("2-2 2").await.as_deref(),
            Some("Work summary.")
        );
    }

    #[tokio::test]
    async fn no_usable_description_anywhere() {
        let client = stub_client(2000).await;
        assert_eq!(client.fetch_summary("333").await, None);
        assert_eq!(client.fetch_summary("999").await, None);
    }

    #[tokio::test]
    async fn failures_are_absorbed() {
        let client = stub_client(2000).await;
        assert_eq!(client.fetch_summary("404").await, None);
        assert_eq!(client.fetch_summary("444").await, None);
        assert_eq!(client.fetch_summary("555").await, None);
        assert_eq!(client.fetch_summary("  ").await, None);
        assert_eq!(client.fetch_summary("../etc").await, None);
    }

    #[tokio::test]
    async fn slow_provider_times_out() {
        let client = stub_client(200).await;
        assert_eq!(client.fetch_summary("888").await, None);
    }

    #[tokio::test]
    async fn identifies_itself() {
        let client = stub_client(2000).await;
        assert_eq!(
            client.fetch_summary("777").await.as_deref(),
            Some("BookshelfTest/0.1")
        );
    }

    #[tokio::test]
    async fn unreachable_provider_yields_none() {
        let client = OpenLibraryClient::new(&SummarySettings {
            enabled: true,
            base_url: "http://127.0.0.1:9".to_string(),
            user_agent: "BookshelfTest/0.1".to_string(),
            timeout_ms: 500,
        })
        .unwrap();
        assert_eq!(client.fetch_summary("111").await, None);
    }

    #[test]
    fn description_shapes() {
        assert_eq!(
            extract_description(&json!({"description": "plain"})).as_deref(),
            Some("plain")
        );
        assert_eq!(
            extract_description(&json!({"description": {"value": " typed "}})).as_deref(),
            Some("typed")
        );
        assert_eq!(extract_description(&json!({"description": {"type": "/type/text"}})), None);
        assert_eq!(extract_description(&json!({"description": 42})), None);
        assert_eq!(extract_description(&json!({"description": ""})), None);
        assert_eq!(extract_description(&json!({})), None);
    }

    #[test]
    fn work_key_requires_works_path() {
        assert_eq!(
            work_key(&json!({"works": [{"key": "/works/OL45883W"}]})),
            Some("/works/OL45883W")
        );
        assert_eq!(work_key(&json!({"works": []})), None);
        assert_eq!(work_key(&json!({"works": [{"key": "/authors/OL1A"}]})), None);
        assert_eq!(work_key(&json!({"works": [{"key": "/works/../x"}]})), None);
        assert_eq!(work_key(&json!({"works": "nope"})), None);
    }
}
