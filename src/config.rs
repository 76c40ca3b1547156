use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::batch::sink::DeliveryMode;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub batch: BatchConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Generated drafts, archives and reports
    pub output_dir: PathBuf,
    /// Uploaded PDFs kept around for later draft generation
    pub upload_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchConfig {
    pub delivery: DeliveryMode,
    pub pacing_ms: u64,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let output_dir = PathBuf::from(
            std::env::var("OUTPUT_DIR").unwrap_or_else(|_| "./output".to_string()),
        );
        let upload_dir = std::env::var("UPLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| output_dir.join("uploads"));

        Ok(Self {
            server: ServerConfig {
                host: std::env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
                port: std::env::var("SERVER_PORT")
                    .unwrap_or_else(|_| "8001".to_string())
                    .parse()?,
                cors_origins: parse_origins(
                    &std::env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string()),
                ),
            },
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "sqlite://statements.db?mode=rwc".to_string()),
            },
            storage: StorageConfig {
                output_dir,
                upload_dir,
            },
            batch: BatchConfig {
                delivery: std::env::var("DELIVERY_MODE")
                    .unwrap_or_else(|_| "individual".to_string())
                    .parse()?,
                pacing_ms: std::env::var("BATCH_PACING_MS")
                    .unwrap_or_else(|_| "500".to_string())
                    .parse()?,
            },
        })
    }

    /// Delay inserted between items when drafts are delivered one by one
    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.batch.pacing_ms)
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|o| o.trim().to_string())
        .filter(|o| !o.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_origins() {
        assert_eq!(parse_origins("*"), vec!["*"]);
        assert_eq!(
            parse_origins("http://localhost:3000, app://speedy ,"),
            vec!["http://localhost:3000", "app://speedy"]
        );
        assert!(parse_origins("").is_empty());
    }

    #[test]
    fn test_pacing_from_batch_config() {
        let config = AppConfig {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8000,
                cors_origins: vec!["*".to_string()],
            },
            database: DatabaseConfig {
                url: "sqlite::memory:".to_string(),
            },
            storage: StorageConfig {
                output_dir: PathBuf::from("output"),
                upload_dir: PathBuf::from("output/uploads"),
            },
            batch: BatchConfig {
                delivery: DeliveryMode::Individual,
                pacing_ms: 250,
            },
        };
        assert_eq!(config.pacing(), Duration::from_millis(250));
    }
}
