use thiserror::Error;

/// 150 MiB
pub const DEFAULT_MAX_UPLOAD_SIZE: u64 = 150 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    /// Maximum upload size in bytes
    pub max_upload_size: u64,
    /// Overrides the scheme and host used to build download URLs (e.g. behind a proxy).
    pub public_base_url: Option<String>,
    /// Allowed CORS origins; `*` allows any.
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Directory holding the redb metadata file
    pub data_dir: String,
    /// Single-slot directory for the uploaded package
    pub media_dir: String,
    /// Static front-end served at `/`
    pub frontend_dir: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 2000,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: "./data".to_string(),
            media_dir: "./uploads/apk".to_string(),
            frontend_dir: "./frontend".to_string(),
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let port = match std::env::var("PORT") {
            Ok(raw) => raw.trim().parse::<u16>().map_err(|_| {
                ConfigError::ValidationError(format!("PORT must be a port number, got '{raw}'"))
            })?,
            Err(_) => ServerConfig::default().port,
        };

        let host = std::env::var("BIND_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let defaults = StorageConfig::default();
        let data_dir = std::env::var("DATA_DIR").unwrap_or(defaults.data_dir);
        let media_dir = std::env::var("MEDIA_DIR").unwrap_or(defaults.media_dir);
        let frontend_dir = std::env::var("FRONTEND_DIR").unwrap_or(defaults.frontend_dir);

        let max_upload_size = std::env::var("MAX_UPLOAD_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_MAX_UPLOAD_SIZE);

        let public_base_url = std::env::var("PUBLIC_BASE_URL")
            .ok()
            .map(|s| s.trim().trim_end_matches('/').to_string())
            .filter(|s| !s.is_empty());

        let cors_origins = parse_origins(
            &std::env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string()),
        );

        let config = Config {
            server: ServerConfig { host, port },
            storage: StorageConfig {
                data_dir,
                media_dir,
                frontend_dir,
            },
            max_upload_size,
            public_base_url,
            cors_origins,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::ValidationError("PORT cannot be 0".to_string()));
        }

        if self.max_upload_size == 0 {
            return Err(ConfigError::ValidationError(
                "MAX_UPLOAD_SIZE must be greater than 0".to_string(),
            ));
        }

        if let Some(ref url) = self.public_base_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ConfigError::ValidationError(format!(
                    "PUBLIC_BASE_URL must start with http:// or https://, got '{url}'"
                )));
            }
        }

        if self.cors_origins.is_empty() {
            return Err(ConfigError::ValidationError(
                "CORS_ORIGINS must list at least one origin (use * for any)".to_string(),
            ));
        }

        Ok(())
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
