use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{http_error, read_json, ClientError, SearchHit, WebSearchApi};

const SERVICE: &str = "tavily";
const SEARCH_URL: &str = "https://api.tavily.com/search";

#[derive(Serialize)]
struct SearchRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: usize,
    search_depth: &'static str,
    include_answer: bool,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

pub struct Tavily {
    http: reqwest::Client,
    api_key: String,
}

impl Tavily {
    pub fn new(http: reqwest::Client, api_key: String) -> Self {
        Self { http, api_key }
    }
}

#[async_trait]
impl WebSearchApi for Tavily {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, ClientError> {
        if self.api_key.is_empty() {
            return Ok(Vec::new());
        }
        let response = self
            .http
            .post(SEARCH_URL)
            .json(&SearchRequest {
                api_key: &self.api_key,
                query,
                max_results,
                search_depth: "basic",
                include_answer: false,
            })
            .send()
            .await
            .map_err(http_error(SERVICE))?;
        let parsed: SearchResponse = read_json(SERVICE, response).await?;
        Ok(parsed.results)
    }
}
