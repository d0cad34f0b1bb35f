use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

/// Keys for the data vendors. An empty key disables the vendor: the client
/// still exists but every lookup comes back empty.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VendorKeys {
    pub google_places: String,
    pub spoonacular: String,
    pub pexels: String,
    pub tavily: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    pub day_plan_timeout: Duration,
    pub home_recipes_timeout: Duration,
    /// Overrides the fixed delay of every retry preset when set.
    pub retry_delay_override: Option<Duration>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            day_plan_timeout: Duration::from_secs(60),
            home_recipes_timeout: Duration::from_secs(120),
            retry_delay_override: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub llm: LlmConfig,
    pub vendors: VendorKeys,
    pub pipeline: PipelineConfig,
}

fn env_secs(name: &str, default: u64) -> Duration {
    Duration::from_secs(
        std::env::var(name)
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(default),
    )
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let llm = LlmConfig {
            api_key: std::env::var("OPENAI_API_KEY")?,
            base_url: std::env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".into()),
            model: std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into()),
        };
        let vendors = VendorKeys {
            google_places: std::env::var("GOOGLE_PLACES_API_KEY").unwrap_or_default(),
            spoonacular: std::env::var("SPOONACULAR_API_KEY").unwrap_or_default(),
            pexels: std::env::var("PEXELS_API_KEY").unwrap_or_default(),
            tavily: std::env::var("TAVILY_API_KEY").unwrap_or_default(),
        };
        let pipeline = PipelineConfig {
            day_plan_timeout: env_secs("DAY_PLAN_TIMEOUT_SECS", 60),
            home_recipes_timeout: env_secs("HOME_RECIPES_TIMEOUT_SECS", 120),
            retry_delay_override: std::env::var("RETRY_DELAY_MS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_millis),
        };
        Ok(Self {
            database_url,
            llm,
            vendors,
            pipeline,
        })
    }
}
