use anyhow::{Context, Result};
use clap::Parser;
use std::{env, time::Duration};

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub storage: StorageSettings,
    pub uploads: UploadSettings,
}

/// Where presigned URLs point.
#[derive(Debug, Clone)]
pub struct StorageSettings {
    pub bucket: String,
    pub region: String,
    pub endpoint: Option<String>,
}

/// Tunables of the upload pipeline. `Default` carries the production values.
#[derive(Debug, Clone)]
pub struct UploadSettings {
    /// First path segment of every minted object key.
    pub key_folder: String,
    pub max_files_per_batch: usize,
    pub max_file_size_bytes: i64,
    pub upload_url_ttl: Duration,
    pub download_url_ttl: Duration,
    pub presign_rate_limit: u32,
    pub presign_rate_window: Duration,
    pub rate_limit_sweep_interval: Duration,
    /// Bound on waiting for a connection / write lock before the transaction starts.
    pub tx_max_wait: Duration,
    /// Bound on the whole creation transaction.
    pub tx_timeout: Duration,
    pub retry_max_attempts: u32,
    pub retry_base_delay: Duration,
    pub max_delete_batch: usize,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            key_folder: "uploads".into(),
            max_files_per_batch: 10,
            max_file_size_bytes: 50 * 1024 * 1024,
            upload_url_ttl: Duration::from_secs(3600),
            download_url_ttl: Duration::from_secs(3600),
            presign_rate_limit: 50,
            presign_rate_window: Duration::from_secs(60),
            rate_limit_sweep_interval: Duration::from_secs(300),
            tx_max_wait: Duration::from_secs(5),
            tx_timeout: Duration::from_secs(30),
            retry_max_attempts: 3,
            retry_base_delay: Duration::from_millis(1000),
            max_delete_batch: 100,
        }
    }
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Direct-to-storage upload orchestration API")]
pub struct Args {
    /// Host to bind to (overrides UPLOADS_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides UPLOADS_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Database URL (overrides UPLOADS_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Bucket presigned URLs point at (overrides UPLOADS_S3_BUCKET)
    #[arg(long)]
    pub s3_bucket: Option<String>,

    /// Bucket region (overrides UPLOADS_S3_REGION)
    #[arg(long)]
    pub s3_region: Option<String>,

    /// Custom S3-compatible endpoint (overrides UPLOADS_S3_ENDPOINT)
    #[arg(long)]
    pub s3_endpoint: Option<String>,

    /// Presign requests allowed per principal per window (overrides UPLOADS_PRESIGN_RATE_LIMIT)
    #[arg(long)]
    pub presign_rate_limit: Option<u32>,

    /// Creation transaction budget in seconds (overrides UPLOADS_TX_TIMEOUT_SECS)
    #[arg(long)]
    pub tx_timeout_secs: Option<u64>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        let args = Args::parse();
        let cfg = Self::merge(&args)?;
        Ok((cfg, args.migrate))
    }

    fn merge(args: &Args) -> Result<Self> {
        let env_host = env::var("UPLOADS_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = env_parse::<u16>("UPLOADS_PORT")?.unwrap_or(3000);
        let env_db = env::var("UPLOADS_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/uploads.db".into());

        let defaults = UploadSettings::default();
        let uploads = UploadSettings {
            key_folder: env::var("UPLOADS_KEY_FOLDER").unwrap_or(defaults.key_folder.clone()),
            upload_url_ttl: env_parse::<u64>("UPLOADS_URL_TTL_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.upload_url_ttl),
            download_url_ttl: env_parse::<u64>("UPLOADS_DOWNLOAD_URL_TTL_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.download_url_ttl),
            presign_rate_limit: match args.presign_rate_limit {
                Some(limit) => limit,
                None => env_parse("UPLOADS_PRESIGN_RATE_LIMIT")?
                    .unwrap_or(defaults.presign_rate_limit),
            },
            presign_rate_window: env_parse::<u64>("UPLOADS_PRESIGN_RATE_WINDOW_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.presign_rate_window),
            tx_max_wait: env_parse::<u64>("UPLOADS_TX_MAX_WAIT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.tx_max_wait),
            tx_timeout: match args.tx_timeout_secs {
                Some(secs) => Duration::from_secs(secs),
                None => env_parse::<u64>("UPLOADS_TX_TIMEOUT_SECS")?
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.tx_timeout),
            },
            retry_max_attempts: env_parse("UPLOADS_RETRY_MAX_ATTEMPTS")?
                .unwrap_or(defaults.retry_max_attempts),
            retry_base_delay: env_parse::<u64>("UPLOADS_RETRY_BASE_DELAY_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.retry_base_delay),
            ..defaults
        };

        let storage = StorageSettings {
            bucket: args
                .s3_bucket
                .clone()
                .or_else(|| env::var("UPLOADS_S3_BUCKET").ok())
                .unwrap_or_else(|| "uploads".into()),
            region: args
                .s3_region
                .clone()
                .or_else(|| env::var("UPLOADS_S3_REGION").ok())
                .unwrap_or_else(|| "us-east-1".into()),
            endpoint: args
                .s3_endpoint
                .clone()
                .or_else(|| env::var("UPLOADS_S3_ENDPOINT").ok()),
        };

        Ok(Self {
            host: args.host.clone().unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            database_url: args.database_url.clone().unwrap_or(env_db),
            storage,
            uploads,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Read and parse an optional environment variable.
fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(value) => value
            .parse::<T>()
            .map(Some)
            .with_context(|| format!("parsing {} value `{}`", key, value)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(err) => Err(err).with_context(|| format!("reading {}", key)),
    }
}
