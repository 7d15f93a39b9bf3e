use anyhow::{Context, Result};
use clap::Parser;
use std::{env, str::FromStr, time::Duration};

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub media_dir: String,
    pub database_url: String,
    pub access_token_secret: String,
    pub access_token_ttl: Duration,
    pub refresh_token_secret: String,
    pub refresh_token_ttl: Duration,
    pub request_timeout: Duration,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Video sharing platform API")]
pub struct Args {
    /// Host to bind to (overrides VIDEOTUBE_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides VIDEOTUBE_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory where uploaded media is stored (overrides VIDEOTUBE_MEDIA_DIR)
    #[arg(long)]
    pub media_dir: Option<String>,

    /// Database URL (overrides VIDEOTUBE_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Per-request deadline in seconds (overrides VIDEOTUBE_REQUEST_TIMEOUT_SECS)
    #[arg(long)]
    pub request_timeout_secs: Option<u64>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        let args = Args::parse();

        let env_host = env::var("VIDEOTUBE_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = env_parse("VIDEOTUBE_PORT", 8000u16)?;
        let env_media =
            env::var("VIDEOTUBE_MEDIA_DIR").unwrap_or_else(|_| "./data/media".into());
        let env_db = env::var("VIDEOTUBE_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/db/videotube.db".into());
        let env_timeout = env_parse("VIDEOTUBE_REQUEST_TIMEOUT_SECS", 30u64)?;

        let access_token_secret = env::var("VIDEOTUBE_ACCESS_TOKEN_SECRET").unwrap_or_else(|_| {
            tracing::warn!("VIDEOTUBE_ACCESS_TOKEN_SECRET not set, using development secret");
            "dev-access-secret-change-me".into()
        });
        let refresh_token_secret =
            env::var("VIDEOTUBE_REFRESH_TOKEN_SECRET").unwrap_or_else(|_| {
                tracing::warn!("VIDEOTUBE_REFRESH_TOKEN_SECRET not set, using development secret");
                "dev-refresh-secret-change-me".into()
            });
        let access_ttl_secs = env_parse("VIDEOTUBE_ACCESS_TOKEN_TTL_SECS", 60 * 60 * 24u64)?;
        let refresh_ttl_secs =
            env_parse("VIDEOTUBE_REFRESH_TOKEN_TTL_SECS", 60 * 60 * 24 * 10u64)?;

        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            media_dir: args.media_dir.unwrap_or(env_media),
            database_url: args.database_url.unwrap_or(env_db),
            access_token_secret,
            access_token_ttl: Duration::from_secs(access_ttl_secs),
            refresh_token_secret,
            refresh_token_ttl: Duration::from_secs(refresh_ttl_secs),
            request_timeout: Duration::from_secs(args.request_timeout_secs.unwrap_or(env_timeout)),
        };

        Ok((cfg, args.migrate))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Read `name` from the environment, falling back to `default` when unset.
fn env_parse<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) => value
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", name)),
    }
}
