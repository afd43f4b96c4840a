//! Service configuration
//!
//! Settings are layered with the `config` crate: built-in defaults, then an
//! optional `board.toml` in the working directory, then `BOARD__*`
//! environment variables (`BOARD__SERVER__PORT=8080`). Database and Redis
//! connection settings come from `common` and are not repeated here.

use serde::Deserialize;

/// Top-level service settings
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub session: SessionConfig,
    pub cache: CacheConfig,
    pub upload: UploadConfig,
    pub login: LoginConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Origins allowed to call the API with credentials
    pub cors_origins: Vec<String>,
    /// Count views by the first `X-Forwarded-For` entry; enable only
    /// behind a proxy that sets the header itself
    pub trust_forwarded_for: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub cookie_name: String,
    pub ttl_seconds: u64,
    /// Send the cookie only over HTTPS
    pub secure: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    pub post_list_ttl_seconds: u64,
    pub post_detail_ttl_seconds: u64,
    /// How long a viewer is remembered before another view counts
    pub view_window_seconds: u64,
}

/// Where uploaded images are written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadBackend {
    Local,
    S3,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    pub backend: UploadBackend,
    pub local_root: String,
    pub bucket: Option<String>,
    pub max_file_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginConfig {
    pub max_attempts: u32,
    pub window_seconds: u64,
    pub ban_seconds: u64,
}

impl AppConfig {
    /// Load settings from defaults, `board.toml` and `BOARD__*` variables
    pub fn load() -> anyhow::Result<Self> {
        let settings = Self::builder()?
            .add_source(config::File::with_name("board").required(false))
            .add_source(
                config::Environment::with_prefix("BOARD")
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("server.cors_origins")
                    .try_parsing(true),
            )
            .build()?;

        let config: AppConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn builder() -> anyhow::Result<config::ConfigBuilder<config::builder::DefaultState>> {
        Ok(config::Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("server.cors_origins", vec!["http://localhost:5050"])?
            .set_default("server.trust_forwarded_for", false)?
            .set_default("session.cookie_name", "board.sid")?
            .set_default("session.ttl_seconds", 60_000)?
            .set_default("session.secure", false)?
            .set_default("cache.post_list_ttl_seconds", 60)?
            .set_default("cache.post_detail_ttl_seconds", 300)?
            .set_default("cache.view_window_seconds", 86_400)?
            .set_default("upload.backend", "local")?
            .set_default("upload.local_root", "./uploads")?
            .set_default("upload.max_file_bytes", 5 * 1024 * 1024)?
            .set_default("login.max_attempts", 5)?
            .set_default("login.window_seconds", 300)?
            .set_default("login.ban_seconds", 900)?)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.upload.backend == UploadBackend::S3 && self.upload.bucket.is_none() {
            anyhow::bail!("upload.bucket must be set when upload.backend is s3");
        }
        if self.upload.max_file_bytes == 0 {
            anyhow::bail!("upload.max_file_bytes must be positive");
        }
        if self.session.ttl_seconds == 0 {
            anyhow::bail!("session.ttl_seconds must be positive");
        }
        Ok(())
    }

    /// Address the HTTP listener binds to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
