//! Outbound REST clients. Each vendor sits behind a trait so the pipeline can
//! run against fakes.

pub mod cache;
#[cfg(test)]
pub mod fake;
pub mod openai;
pub mod pexels;
pub mod places;
pub mod spoonacular;
pub mod tavily;

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sqlx::PgPool;

use crate::{
    config::AppConfig,
    pipeline::types::{MenuItem, Restaurant, VerifiedNutrition},
};

pub use cache::Cache;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("{service} request failed: {source}")]
    Http {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{service} returned {status}: {body}")]
    Status {
        service: &'static str,
        status: u16,
        body: String,
    },
    #[error("{service} returned an unexpected payload: {message}")]
    Payload {
        service: &'static str,
        message: String,
    },
}

pub(crate) fn http_error(service: &'static str) -> impl Fn(reqwest::Error) -> ClientError {
    move |source| ClientError::Http { service, source }
}

/// Decodes a JSON body, turning non-2xx responses into `ClientError::Status`.
pub(crate) async fn read_json<T: DeserializeOwned>(
    service: &'static str,
    response: reqwest::Response,
) -> Result<T, ClientError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ClientError::Status {
            service,
            status: status.as_u16(),
            body: body.chars().take(500).collect(),
        });
    }
    response.json::<T>().await.map_err(http_error(service))
}

pub(crate) fn http_client() -> anyhow::Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(180))
        .build()?)
}

const JSON_ONLY: &str =
    "You are a nutrition planning assistant. Respond with a single valid JSON object and nothing else.";

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub system: String,
    pub user: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl ChatRequest {
    pub fn json(user: impl Into<String>) -> Self {
        Self {
            system: JSON_ONLY.to_string(),
            user: user.into(),
            temperature: 0.7,
            max_tokens: 4000,
        }
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Returns the raw message content of the first choice.
    async fn complete(&self, request: &ChatRequest) -> Result<String, ClientError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaceQuery {
    pub location: String,
    pub keyword: String,
    pub radius_meters: u32,
    pub limit: usize,
}

#[async_trait]
pub trait PlacesApi: Send + Sync {
    async fn search_restaurants(&self, query: &PlaceQuery) -> Result<Vec<Restaurant>, ClientError>;
}

#[async_trait]
pub trait MenuApi: Send + Sync {
    async fn search_menu_items(&self, chain: &str, limit: usize) -> Result<Vec<MenuItem>, ClientError>;
    async fn menu_item_nutrition(&self, item_id: i64) -> Result<Option<VerifiedNutrition>, ClientError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Food,
    Workout,
}

#[async_trait]
pub trait ImageApi: Send + Sync {
    async fn find_image(&self, kind: ImageKind, name: &str) -> Result<Option<String>, ClientError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
}

#[async_trait]
pub trait WebSearchApi: Send + Sync {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, ClientError>;
}

#[derive(Clone)]
pub struct Clients {
    pub chat: Arc<dyn ChatClient>,
    pub places: Arc<dyn PlacesApi>,
    pub menus: Arc<dyn MenuApi>,
    pub images: Arc<dyn ImageApi>,
    pub search: Arc<dyn WebSearchApi>,
}

impl Clients {
    pub fn from_config(config: &AppConfig, db: PgPool) -> anyhow::Result<Self> {
        let http = http_client()?;
        let cache = Cache::new(db);
        Ok(Self {
            chat: Arc::new(openai::OpenAiClient::new(http.clone(), config.llm.clone())),
            places: Arc::new(places::GooglePlaces::new(
                http.clone(),
                config.vendors.google_places.clone(),
                cache.clone(),
            )),
            menus: Arc::new(spoonacular::Spoonacular::new(
                http.clone(),
                config.vendors.spoonacular.clone(),
                cache.clone(),
            )),
            images: Arc::new(pexels::Pexels::new(
                http.clone(),
                config.vendors.pexels.clone(),
                cache,
            )),
            search: Arc::new(tavily::Tavily::new(http, config.vendors.tavily.clone())),
        })
    }
}
