//! In-memory client doubles for tests.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    },
};

use async_trait::async_trait;

use super::{
    ChatClient, ChatRequest, ClientError, Clients, ImageApi, ImageKind, MenuApi, PlaceQuery,
    PlacesApi, SearchHit, WebSearchApi,
};
use crate::pipeline::types::{MenuItem, Restaurant, VerifiedNutrition};

pub fn upstream_down() -> ClientError {
    ClientError::Status {
        service: "fake",
        status: 503,
        body: "unavailable".into(),
    }
}

type Responder = dyn Fn(&ChatRequest) -> Result<String, ClientError> + Send + Sync;

pub struct FakeChat {
    responder: Box<Responder>,
    pub calls: AtomicU32,
}

impl FakeChat {
    pub fn new(
        responder: impl Fn(&ChatRequest) -> Result<String, ClientError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            responder: Box::new(responder),
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatClient for FakeChat {
    async fn complete(&self, request: &ChatRequest) -> Result<String, ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.responder)(request)
    }
}

#[derive(Default)]
pub struct FakePlaces {
    pub restaurants: Vec<Restaurant>,
    pub fail: bool,
}

#[async_trait]
impl PlacesApi for FakePlaces {
    async fn search_restaurants(&self, query: &PlaceQuery) -> Result<Vec<Restaurant>, ClientError> {
        if self.fail {
            return Err(upstream_down());
        }
        Ok(self.restaurants.iter().take(query.limit).cloned().collect())
    }
}

#[derive(Default)]
pub struct FakeMenus {
    pub items: HashMap<String, Vec<MenuItem>>,
    pub nutrition: HashMap<i64, VerifiedNutrition>,
    pub failing_ids: Vec<i64>,
}

#[async_trait]
impl MenuApi for FakeMenus {
    async fn search_menu_items(&self, chain: &str, limit: usize) -> Result<Vec<MenuItem>, ClientError> {
        Ok(self
            .items
            .get(chain)
            .map(|items| items.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn menu_item_nutrition(&self, item_id: i64) -> Result<Option<VerifiedNutrition>, ClientError> {
        if self.failing_ids.contains(&item_id) {
            return Err(upstream_down());
        }
        Ok(self.nutrition.get(&item_id).cloned())
    }
}

#[derive(Default)]
pub struct FakeImages {
    pub url: Option<String>,
    pub fail: bool,
}

#[async_trait]
impl ImageApi for FakeImages {
    async fn find_image(&self, _kind: ImageKind, name: &str) -> Result<Option<String>, ClientError> {
        if self.fail {
            return Err(upstream_down());
        }
        Ok(self.url.as_ref().map(|base| format!("{base}/{}", super::cache::normalize_key(name))))
    }
}

#[derive(Default)]
pub struct FakeSearch {
    pub hits: Vec<SearchHit>,
}

#[async_trait]
impl WebSearchApi for FakeSearch {
    async fn search(&self, _query: &str, max_results: usize) -> Result<Vec<SearchHit>, ClientError> {
        Ok(self.hits.iter().take(max_results).cloned().collect())
    }
}

impl Clients {
    /// Every vendor returns nothing and the model answers `{}`.
    pub fn fake() -> Self {
        Self {
            chat: Arc::new(FakeChat::new(|_| Ok("{}".to_string()))),
            places: Arc::new(FakePlaces::default()),
            menus: Arc::new(FakeMenus::default()),
            images: Arc::new(FakeImages::default()),
            search: Arc::new(FakeSearch::default()),
        }
    }
}
