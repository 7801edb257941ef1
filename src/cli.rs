//! CLI parser
use clap::Parser;
use std::path::PathBuf;

use crate::constants::{
    DEFAULT_ENDPOINT, DEFAULT_MAX_OUTPUT_TOKENS, DEFAULT_MODEL, DEFAULT_OUTPUT_DIR,
    DEFAULT_TEMPERATURE, DEFAULT_TIMEOUT_SECONDS,
};

#[derive(Parser, Debug)]
#[command(name = "campaign-imagegen")]
#[command(about = "Generate the campaign's ad images, one request per prompt")]
/// CLI Options
pub struct CliOptions {
    #[clap(long, help = "Enable debug logging", env = "CAMPAIGN_IMAGEGEN_DEBUG")]
    /// Enable debug logging. Env: CAMPAIGN_IMAGEGEN_DEBUG
    pub debug: bool,

    /// API key for the image service. Env: GEMINI_API_KEY
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    #[clap(long, default_value = DEFAULT_ENDPOINT, env = "CAMPAIGN_IMAGEGEN_ENDPOINT")]
    /// API base URL, up to the version segment.
    /// Env: CAMPAIGN_IMAGEGEN_ENDPOINT
    pub endpoint: String,

    #[clap(long, default_value = DEFAULT_MODEL, env = "CAMPAIGN_IMAGEGEN_MODEL")]
    /// Image-capable model name. Env: CAMPAIGN_IMAGEGEN_MODEL
    pub model: String,

    #[clap(long, short, default_value = DEFAULT_OUTPUT_DIR, env = "CAMPAIGN_IMAGEGEN_OUT_DIR")]
    /// Where images are written, as `<id>.png` or `<id>.jpg`.
    /// Env: CAMPAIGN_IMAGEGEN_OUT_DIR
    pub out_dir: PathBuf,

    #[clap(long, default_value_t = DEFAULT_TIMEOUT_SECONDS)]
    /// Per-request timeout in seconds
    pub timeout_secs: u64,

    #[clap(long, default_value_t = DEFAULT_TEMPERATURE)]
    /// Sampling temperature
    pub temperature: f32,

    #[clap(long, default_value_t = DEFAULT_MAX_OUTPUT_TOKENS)]
    /// Max output tokens per request
    pub max_output_tokens: u32,

    #[clap(long)]
    /// Load prompts from this JSON file instead of the bundled campaign
    pub prompts: Option<PathBuf>,

    #[clap(long = "only", value_name = "ID")]
    /// Only generate these ids (repeatable)
    pub only: Vec<String>,

    #[clap(long)]
    /// Print the prompt ids and exit
    pub list: bool,

    #[clap(long, value_name = "DIR")]
    /// Dump every raw response body to `<DIR>/<id>.json`
    pub save_responses: Option<PathBuf>,
}
