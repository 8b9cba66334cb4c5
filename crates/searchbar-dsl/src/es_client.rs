// Elasticsearch HTTP client

use crate::terms::{
    build_terms_agg_body, build_terms_enum_body, parse_terms_agg_response,
    parse_terms_enum_response,
};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use searchbar_core::{
    BackendError, DatasourceParams, FieldCapsSource, SearchBackend, TermsRequest, TermsSource,
};
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct ElasticsearchClient {
    client: Client,
    base_url: String,
    // `_terms_enum` when true, a terms aggregation otherwise
    use_terms_enum: bool,
}

impl ElasticsearchClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            use_terms_enum: true,
        }
    }

    /// Create from environment variables
    /// - ELASTICSEARCH_URL: Base URL (default: http://localhost:9200)
    pub fn from_env() -> Self {
        let base_url = std::env::var("ELASTICSEARCH_URL")
            .unwrap_or_else(|_| "http://localhost:9200".to_string());
        Self::new(base_url)
    }

    pub fn with_terms_enum(mut self, enabled: bool) -> Self {
        self.use_terms_enum = enabled;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, params: &DatasourceParams, endpoint: &str) -> String {
        format!("{}/{}/{}", self.base_url, params.index, endpoint)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Value, BackendError> {
        let response = request
            .send()
            .await
            .map_err(|e| BackendError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))
    }
}

#[async_trait]
impl FieldCapsSource for ElasticsearchClient {
    async fn field_caps(&self, params: &DatasourceParams) -> Result<Value, BackendError> {
        let url = format!("{}?fields=*", self.url(params, "_field_caps"));
        debug!(url = %url, "Fetching field capabilities");
        self.send(self.client.get(&url)).await
    }
}

#[async_trait]
impl TermsSource for ElasticsearchClient {
    async fn terms(
        &self,
        params: &DatasourceParams,
        request: &TermsRequest,
    ) -> Result<Vec<Value>, BackendError> {
        if self.use_terms_enum {
            let body = build_terms_enum_body(request);
            let raw = self
                .send(self.client.post(self.url(params, "_terms_enum")).json(&body))
                .await?;
            return Ok(parse_terms_enum_response(&raw));
        }

        let body = build_terms_agg_body(request);
        let raw = self.search(params, &body).await?;
        Ok(parse_terms_agg_response(&raw))
    }
}

#[async_trait]
impl SearchBackend for ElasticsearchClient {
    async fn search(&self, params: &DatasourceParams, body: &Value) -> Result<Value, BackendError> {
        self.send(self.client.post(self.url(params, "_search")).json(body))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = ElasticsearchClient::new("http://localhost:9200/");
        assert_eq!(client.base_url(), "http://localhost:9200");
        assert_eq!(
            client.url(&DatasourceParams::new("logs-*"), "_search"),
            "http://localhost:9200/logs-*/_search"
        );
        assert!(client.use_terms_enum);
        assert!(!client.with_terms_enum(false).use_terms_enum);
    }

    #[tokio::test]
    async fn test_unreachable_host_is_request_error() {
        let client = ElasticsearchClient::new("http://127.0.0.1:1");
        let result = client.field_caps(&DatasourceParams::new("logs")).await;
        assert!(matches!(result, Err(BackendError::Request(_))));
    }
}
