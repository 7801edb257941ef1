//! Client for the `generateContent` endpoint: one request in, one image file out.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::config::GeneratorConfig;
use crate::constants::{DEFAULT_IMAGE_MIME, MAX_DIAGNOSTIC_CHARS, RESPONSE_MODALITIES};
use crate::error::GenerationError;

// -----------------------------
// Request body
// -----------------------------

/// Request body for POST .../models/{model}:generateContent
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: [RequestContent<'a>; 1],
    generation_config: GenerationConfig<'a>,
}

#[derive(Serialize, Debug)]
struct RequestContent<'a> {
    parts: [TextPart<'a>; 1],
}

#[derive(Serialize, Debug)]
struct TextPart<'a> {
    text: &'a str,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    response_modalities: &'a [&'a str],
    temperature: f32,
    max_output_tokens: u32,
}

impl<'a> GenerateContentRequest<'a> {
    fn new(prompt: &'a str, config: &GeneratorConfig) -> Self {
        Self {
            contents: [RequestContent {
                parts: [TextPart {
                    text: prompt.trim(),
                }],
            }],
            generation_config: GenerationConfig {
                response_modalities: &RESPONSE_MODALITIES,
                temperature: config.temperature,
                max_output_tokens: config.max_output_tokens,
            },
        }
    }
}

// -----------------------------
// Response body
// -----------------------------

/// The parts of a `generateContent` response we care about.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct Part {
    text: Option<String>,
    inline_data: Option<InlineData>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: Option<String>,
    data: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

/// A base64 image pulled out of a response, not yet decoded.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InlineImage {
    /// Declared MIME type, `image/png` if the service didn't say
    pub mime_type: String,
    /// Base64 payload
    pub data: String,
}

impl InlineImage {
    /// Decodes the payload into raw image bytes.
    /// Line breaks and other ASCII whitespace in the payload are ignored.
    pub fn decode(&self) -> Result<Vec<u8>, GenerationError> {
        let compact: String = self
            .data
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();
        Ok(general_purpose::STANDARD.decode(compact)?)
    }
}

impl Candidate {
    /// Why this candidate might not have produced an image, for the logs.
    fn describe(&self) -> Option<String> {
        let text = self
            .content
            .as_ref()
            .and_then(|content| content.parts.iter().find_map(|part| part.text.as_deref()))
            .map(|text| truncate(text.trim(), MAX_DIAGNOSTIC_CHARS));
        match (self.finish_reason.as_deref(), text) {
            (Some(finish), Some(text)) => Some(format!("finish reason {finish}, model said: {text}")),
            (Some(finish), None) => Some(format!("finish reason {finish}")),
            (None, Some(text)) => Some(format!("model said: {text}")),
            (None, None) => None,
        }
    }
}

impl GenerateContentResponse {
    /// Parses a raw response body.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, GenerationError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Finds the first inline image part, scanning candidates in order.
    pub fn into_inline_image(self) -> Result<InlineImage, GenerationError> {
        let block_reason = self
            .prompt_feedback
            .and_then(|feedback| feedback.block_reason)
            .map(|reason| format!("prompt blocked: {reason}"));

        let Some(candidates) = self.candidates else {
            return match block_reason {
                Some(reason) => Err(GenerationError::NoImageProduced {
                    reason: Some(reason),
                }),
                None => Err(GenerationError::MalformedResponse(
                    "response has no candidates field".to_string(),
                )),
            };
        };

        let reason = match candidates.first() {
            Some(first) => first.describe(),
            None => block_reason.or_else(|| Some("empty candidate list".to_string())),
        };

        candidates
            .into_iter()
            .filter_map(|candidate| candidate.content)
            .flat_map(|content| content.parts)
            .find_map(|part| part.inline_data)
            .map(|inline| InlineImage {
                mime_type: inline
                    .mime_type
                    .unwrap_or_else(|| DEFAULT_IMAGE_MIME.to_string()),
                data: inline.data,
            })
            .ok_or(GenerationError::NoImageProduced { reason })
    }
}

// -----------------------------
// Files
// -----------------------------

/// `png` if the MIME type mentions png, otherwise `jpg`.
pub fn extension_for_mime(mime_type: &str) -> &'static str {
    if mime_type.to_ascii_lowercase().contains("png") {
        "png"
    } else {
        "jpg"
    }
}

/// Where the image for `id` goes.
pub fn image_path(output_dir: &Path, id: &str, mime_type: &str) -> PathBuf {
    output_dir.join(format!("{id}.{}", extension_for_mime(mime_type)))
}

/// Writes `bytes` to a temp file beside `path` and renames it into place, so
/// `path` either holds the whole image or is untouched.
pub fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), GenerationError> {
    let write_err = |source: std::io::Error| GenerationError::Write {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(write_err)?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(bytes).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(path).map_err(|err| write_err(err.error))?;
    Ok(())
}

fn dump_response(dir: &Path, id: &str, bytes: &[u8]) {
    let path = dir.join(format!("{id}.json"));
    match fs::create_dir_all(dir).and_then(|_| fs::write(&path, bytes)) {
        Ok(()) => debug!("Response for {id} saved to {}", path.display()),
        Err(err) => warn!("Couldn't save response for {id} to {}: {err}", path.display()),
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut short: String = text.chars().take(max_chars).collect();
    short.push_str("...");
    short
}

// -----------------------------
// Client
// -----------------------------

/// Talks to the image service and writes what comes back.
#[derive(Debug)]
pub struct ImageClient {
    http: reqwest::Client,
    config: GeneratorConfig,
}

impl ImageClient {
    /// Builds the HTTP client with the configured per-request timeout.
    pub fn new(config: GeneratorConfig) -> Result<Self, GenerationError> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    /// Sends one prompt and writes the returned image to `<output_dir>/<id>.<ext>`.
    pub async fn generate_image(&self, id: &str, prompt: &str) -> Result<PathBuf, GenerationError> {
        let req_body = GenerateContentRequest::new(prompt, &self.config);
        debug!("POST {} for {id}", self.config.api_url);

        let resp = self
            .http
            .post(self.config.request_url())
            .json(&req_body)
            .send()
            .await?;

        let status = resp.status();
        let bytes = resp.bytes().await?;

        if let Some(dir) = &self.config.response_dump_dir {
            dump_response(dir, id, &bytes);
        }

        if !status.is_success() {
            return Err(GenerationError::HttpStatus {
                status: status.as_u16(),
                body: truncate(&String::from_utf8_lossy(&bytes), MAX_DIAGNOSTIC_CHARS),
            });
        }

        let image = GenerateContentResponse::from_slice(&bytes)?.into_inline_image()?;
        let image_bytes = image.decode()?;
        let path = image_path(&self.config.output_dir, id, &image.mime_type);
        write_atomically(&path, &image_bytes)?;
        Ok(path)
    }
}
