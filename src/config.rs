//! Config handling

use std::path::PathBuf;
use std::time::Duration;

use tracing::log::LevelFilter;
use url::Url;

use crate::cli::CliOptions;
use crate::constants::{DEFAULT_MAX_OUTPUT_TOKENS, DEFAULT_TEMPERATURE, DEFAULT_TIMEOUT_SECONDS};

/// Sets up logging based on the debug flag
pub fn setup_logging(debug: bool) -> Result<(), Box<std::io::Error>> {
    let level = if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let mut logger = simple_logger::SimpleLogger::new().with_level(level);
    if !debug {
        logger = logger
            .with_module_level("tracing", LevelFilter::Warn)
            .with_module_level("reqwest", LevelFilter::Warn)
            .with_module_level("rustls", LevelFilter::Info)
            .with_module_level("hyper_util", LevelFilter::Info)
            .with_module_level("h2", LevelFilter::Info);
    }
    logger.init().map_err(|err| {
        eprintln!("Failed to initialize logger: {}", err);
        Box::new(std::io::Error::other(err))
    })
}

/// Problems turning CLI options into a usable config.
#[derive(Debug)]
pub enum ConfigError {
    /// No API key on the command line or in the environment
    MissingApiKey,
    /// The endpoint + model didn't make a valid URL
    InvalidEndpoint(url::ParseError),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingApiKey => write!(f, "No API key given, set GEMINI_API_KEY or --api-key"),
            Self::InvalidEndpoint(err) => write!(f, "Invalid endpoint URL: {err}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<url::ParseError> for ConfigError {
    fn from(err: url::ParseError) -> Self {
        ConfigError::InvalidEndpoint(err)
    }
}

/// Everything the image client needs, passed in at construction.
#[derive(Clone)]
pub struct GeneratorConfig {
    /// `{endpoint}/models/{model}:generateContent`, without the key
    pub api_url: Url,
    /// Sent as the `key` query parameter
    pub api_key: String,
    /// Images land here as `<id>.<ext>`
    pub output_dir: PathBuf,
    /// Hard ceiling for each request
    pub timeout: Duration,
    /// Sampling temperature
    pub temperature: f32,
    /// Max output tokens
    pub max_output_tokens: u32,
    /// When set, raw response bodies are written here as `<id>.json`
    pub response_dump_dir: Option<PathBuf>,
}

impl GeneratorConfig {
    /// Builds a config with default sampling settings and timeout.
    pub fn new(
        endpoint: &str,
        model: &str,
        api_key: impl Into<String>,
        output_dir: impl Into<PathBuf>,
    ) -> Result<Self, ConfigError> {
        let api_url = Url::parse(&format!(
            "{}/models/{}:generateContent",
            endpoint.trim_end_matches('/'),
            model
        ))?;
        Ok(Self {
            api_url,
            api_key: api_key.into(),
            output_dir: output_dir.into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECONDS),
            temperature: DEFAULT_TEMPERATURE,
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            response_dump_dir: None,
        })
    }

    /// Pulls the config out of parsed CLI options.
    pub fn from_cli(cli: &CliOptions) -> Result<Self, ConfigError> {
        let api_key = cli
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or(ConfigError::MissingApiKey)?;
        let mut config = Self::new(&cli.endpoint, &cli.model, api_key, cli.out_dir.clone())?;
        config.timeout = Duration::from_secs(cli.timeout_secs);
        config.temperature = cli.temperature;
        config.max_output_tokens = cli.max_output_tokens;
        config.response_dump_dir = cli.save_responses.clone();
        Ok(config)
    }

    /// The URL actually requested, key included. Don't log this.
    pub fn request_url(&self) -> Url {
        let mut url = self.api_url.clone();
        url.query_pairs_mut().append_pair("key", &self.api_key);
        url
    }
}

impl std::fmt::Debug for GeneratorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneratorConfig")
            .field("api_url", &self.api_url.as_str())
            .field("api_key", &"<redacted>")
            .field("output_dir", &self.output_dir)
            .field("timeout", &self.timeout)
            .field("temperature", &self.temperature)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("response_dump_dir", &self.response_dump_dir)
            .finish()
    }
}
