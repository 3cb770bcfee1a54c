//! reqwest-based client for the catalog service v2 REST API.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::catalog::models::{
    ClassificationSystem, FetchResult, ItemClassificationInput, ItemClassificationModel,
    ItemModel, NexusModel,
};
use crate::catalog::query::QueryOptions;
use crate::catalog::rate_limit::RequestThrottle;
use crate::catalog::traits::CatalogService;
use crate::config::EnvironmentConfig;
use crate::error::{CatalogError, CatalogResult, ServiceErrorDetail, ServiceErrorEnvelope};

const CLIENT_HEADER: &str = "X-Avalara-Client";
const CLIENT_ID: &str = concat!("catalog-sync; ", env!("CARGO_PKG_VERSION"), "; Rust; ; ");

/// Authenticated client for one catalog environment
#[derive(Debug, Clone)]
pub struct RestCatalogClient {
    name: String,
    base_url: String,
    username: String,
    password: String,
    http_client: Client,
    throttle: RequestThrottle,
}

impl RestCatalogClient {
    pub fn new(
        name: impl Into<String>,
        environment: &EnvironmentConfig,
        timeout: Duration,
        throttle: RequestThrottle,
    ) -> CatalogResult<Self> {
        let http_client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("catalog-sync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CatalogError::Transport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self::with_http_client(name, environment, http_client, throttle))
    }

    /// Create a client with a pre-built `reqwest::Client` (for testing)
    pub fn with_http_client(
        name: impl Into<String>,
        environment: &EnvironmentConfig,
        http_client: Client,
        throttle: RequestThrottle,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: environment.base_url.trim_end_matches('/').to_string(),
            username: environment.username.clone(),
            password: environment.password.clone(),
            http_client,
            throttle,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v2{}", self.base_url, path)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        url: &str,
        options: &QueryOptions,
    ) -> CatalogResult<T> {
        self.throttle.acquire().await;
        debug!("[{}] GET {} {:?}", self.name, url, options.filter);

        let response = self
            .http_client
            .get(url)
            .basic_auth(&self.username, Some(&self.password))
            .header(CLIENT_HEADER, CLIENT_ID)
            .query(&options.to_params())
            .send()
            .await?;
        self.handle_response(response).await
    }

    async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &B,
    ) -> CatalogResult<T> {
        self.throttle.acquire().await;
        debug!("[{}] POST {}", self.name, url);

        let response = self
            .http_client
            .post(url)
            .basic_auth(&self.username, Some(&self.password))
            .header(CLIENT_HEADER, CLIENT_ID)
            .json(body)
            .send()
            .await?;
        self.handle_response(response).await
    }

    async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &B,
    ) -> CatalogResult<T> {
        self.throttle.acquire().await;
        debug!("[{}] PUT {}", self.name, url);

        let response = self
            .http_client
            .put(url)
            .basic_auth(&self.username, Some(&self.password))
            .header(CLIENT_HEADER, CLIENT_ID)
            .json(body)
            .send()
            .await?;
        self.handle_response(response).await
    }

    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> CatalogResult<T> {
        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            return serde_json::from_str(&body).map_err(|e| {
                warn!("[{}] undecodable {} response body", self.name, status);
                CatalogError::from(e)
            });
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            warn!("[{}] catalog service rate limited the request", self.name);
        }

        let detail = serde_json::from_str::<ServiceErrorEnvelope>(&body)
            .map(|envelope| envelope.error)
            .unwrap_or_else(|_| {
                if body.is_empty() {
                    ServiceErrorDetail::raw(format!("HTTP {}", status))
                } else {
                    ServiceErrorDetail::raw(body)
                }
            });

        Err(CatalogError::Service {
            status: status.as_u16(),
            detail,
        })
    }
}

#[async_trait]
impl CatalogService for RestCatalogClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn query_nexus(
        &self,
        company_id: i64,
        options: &QueryOptions,
    ) -> CatalogResult<FetchResult<NexusModel>> {
        let url = self.url(&format!("/companies/{}/nexus", company_id));
        self.get(&url, options).await
    }

    async fn create_nexus(
        &self,
        company_id: i64,
        nexus: Vec<NexusModel>,
    ) -> CatalogResult<Vec<NexusModel>> {
        let url = self.url(&format!("/companies/{}/nexus", company_id));
        self.post(&url, &nexus).await
    }

    async fn query_items(&self, options: &QueryOptions) -> CatalogResult<FetchResult<ItemModel>> {
        let url = self.url("/items");
        self.get(&url, options).await
    }

    async fn create_items(
        &self,
        company_id: i64,
        items: Vec<ItemModel>,
    ) -> CatalogResult<Vec<ItemModel>> {
        let url = self.url(&format!("/companies/{}/items", company_id));
        self.post(&url, &items).await
    }

    async fn list_item_classifications(
        &self,
        company_id: i64,
        item_id: i64,
        options: &QueryOptions,
    ) -> CatalogResult<FetchResult<ItemClassificationModel>> {
        let url = self.url(&format!(
            "/companies/{}/items/{}/classifications",
            company_id, item_id
        ));
        self.get(&url, options).await
    }

    async fn create_item_classifications(
        &self,
        company_id: i64,
        item_id: i64,
        classifications: Vec<ItemClassificationInput>,
    ) -> CatalogResult<Vec<ItemClassificationModel>> {
        let url = self.url(&format!(
            "/companies/{}/items/{}/classifications",
            company_id, item_id
        ));
        self.post(&url, &classifications).await
    }

    async fn update_item_classification(
        &self,
        company_id: i64,
        item_id: i64,
        classification_id: i64,
        classification: &ItemClassificationInput,
    ) -> CatalogResult<ItemClassificationModel> {
        let url = self.url(&format!(
            "/companies/{}/items/{}/classifications/{}",
            company_id, item_id, classification_id
        ));
        self.put(&url, classification).await
    }

    async fn list_classification_systems(
        &self,
        options: &QueryOptions,
    ) -> CatalogResult<FetchResult<ClassificationSystem>> {
        let url = self.url("/definitions/productclassificationsystems");
        self.get(&url, options).await
    }
}
