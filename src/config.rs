// task_manager/src/config.rs
use anyhow::{bail, Context};
use std::env;

const DEFAULT_DATABASE_URL: &str = "tasks.db";
const DEFAULT_POOL_SIZE: u32 = 8;
const TEST_BCRYPT_COST: u32 = 4;

/// Process-wide settings, read once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub pool_size: u32,
    pub bcrypt_cost: u32,
    pub template_dir: String,
}

impl AppConfig {
    /// Reads the configuration from environment variables. Call `dotenvy::dotenv()` first
    /// if a `.env` file should be honoured.
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());

        let pool_size = match env::var("DATABASE_POOL_SIZE") {
            Ok(raw) => raw
                .parse::<u32>()
                .with_context(|| format!("DATABASE_POOL_SIZE must be a positive integer, got {raw:?}"))?,
            Err(_) => DEFAULT_POOL_SIZE,
        };
        if pool_size == 0 {
            bail!("DATABASE_POOL_SIZE must be at least 1");
        }

        let bcrypt_cost = match env::var("BCRYPT_COST") {
            Ok(raw) => raw
                .parse::<u32>()
                .with_context(|| format!("BCRYPT_COST must be an integer, got {raw:?}"))?,
            Err(_) => bcrypt::DEFAULT_COST,
        };
        if !(4..=31).contains(&bcrypt_cost) {
            bail!("BCRYPT_COST must be between 4 and 31, got {bcrypt_cost}");
        }

        let template_dir = env::var("TEMPLATE_DIR").unwrap_or_else(|_| default_template_dir());

        Ok(AppConfig {
            database_url,
            pool_size,
            bcrypt_cost,
            template_dir,
        })
    }

    /// Private in-memory database and a cheap hash cost. Used by the test suites.
    pub fn in_memory() -> Self {
        AppConfig {
            database_url: ":memory:".to_string(),
            pool_size: 1,
            bcrypt_cost: TEST_BCRYPT_COST,
            template_dir: default_template_dir(),
        }
    }

    pub fn is_in_memory(&self) -> bool {
        self.database_url == ":memory:" || self.database_url.starts_with("file::memory:")
    }
}

fn default_template_dir() -> String {
    rocket::fs::relative!("templates").to_string()
}
