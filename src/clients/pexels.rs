use async_trait::async_trait;
use serde::Deserialize;

use super::{
    cache::{normalize_key, Cache, CacheTable},
    http_error, read_json, ClientError, ImageApi, ImageKind,
};

const SERVICE: &str = "pexels";
const SEARCH_URL: &str = "https://api.pexels.com/v1/search";

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    photos: Vec<Photo>,
}

#[derive(Deserialize)]
struct Photo {
    src: PhotoSrc,
}

#[derive(Deserialize)]
struct PhotoSrc {
    medium: String,
}

pub fn search_query(kind: ImageKind, name: &str) -> String {
    match kind {
        ImageKind::Food => format!("{} food", name.trim()),
        ImageKind::Workout => format!("{} exercise workout", name.trim()),
    }
}

fn table_for(kind: ImageKind) -> CacheTable {
    match kind {
        ImageKind::Food => CacheTable::FoodImages,
        ImageKind::Workout => CacheTable::WorkoutImages,
    }
}

pub struct Pexels {
    http: reqwest::Client,
    api_key: String,
    cache: Cache,
}

impl Pexels {
    pub fn new(http: reqwest::Client, api_key: String, cache: Cache) -> Self {
        Self {
            http,
            api_key,
            cache,
        }
    }
}

#[async_trait]
impl ImageApi for Pexels {
    async fn find_image(&self, kind: ImageKind, name: &str) -> Result<Option<String>, ClientError> {
        let key = normalize_key(name);
        if key.is_empty() || self.api_key.is_empty() {
            return Ok(None);
        }
        let table = table_for(kind);
        if let Some(url) = self.cache.get::<String>(table, &key).await {
            return Ok(Some(url));
        }

        let query = search_query(kind, name);
        let response = self
            .http
            .get(SEARCH_URL)
            .header(reqwest::header::AUTHORIZATION, &self.api_key)
            .query(&[
                ("query", query.as_str()),
                ("per_page", "1"),
                ("orientation", "landscape"),
            ])
            .send()
            .await
            .map_err(http_error(SERVICE))?;
        let parsed: SearchResponse = read_json(SERVICE, response).await?;

        let url = parsed.photos.into_iter().next().map(|p| p.src.medium);
        if let Some(url) = &url {
            self.cache.put(table, &key, url, None).await;
        }
        Ok(url)
    }
}
