//! Shared defaults for the generator
//!

/// Base URL of the generative language API, up to and including the version.
pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Model that accepts text and returns inline image parts.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash-exp-image-generation";

/// The default place we put images
pub const DEFAULT_OUTPUT_DIR: &str = "./output/images";

/// Per-request ceiling, in seconds.
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 120;

/// Sampling temperature sent with every request.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Maximum output tokens sent with every request.
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 2048;

/// Modalities we accept back from the service.
pub const RESPONSE_MODALITIES: [&str; 2] = ["Text", "Image"];

/// MIME type assumed when an inline part doesn't declare one.
pub const DEFAULT_IMAGE_MIME: &str = "image/png";

/// How much of an error body or text reply we keep for diagnostics.
pub const MAX_DIAGNOSTIC_CHARS: usize = 500;
