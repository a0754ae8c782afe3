use std::env;
use std::fs;
use std::io::Cursor;
use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::{Rgb, RgbImage};
use log::{debug, warn};
use plateshot_contracts::edits::EditMode;
use plateshot_contracts::endpoints::{
    BodyKind, EndpointDescriptor, EndpointRegistry, ResponseKind,
};
use plateshot_contracts::prompt::build_prompt;
use reqwest::blocking::Client as HttpClient;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use thiserror::Error;

pub const DEFAULT_API_BASE: &str = "https://api-inference.huggingface.co/models";
pub const ERROR_DETAIL_LIMIT: usize = 200;

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("{0}")]
    Validation(String),
    #[error("failed to prepare the request payload: {0}")]
    Encoding(String),
    #[error("{message}")]
    Http { status: u16, message: String },
    #[error("the segmentation model returned no candidates")]
    EmptyResult,
    #[error("the selected segmentation candidate is missing the `{0}` field")]
    MissingField(&'static str),
    #[error("{0}")]
    Unknown(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceImage {
    pub bytes: Vec<u8>,
    pub mime_type: Option<String>,
}

impl SourceImage {
    pub fn new(bytes: Vec<u8>, mime_type: Option<String>) -> Self {
        Self { bytes, mime_type }
    }

    pub fn from_path(path: &Path) -> Result<Self, InferenceError> {
        let bytes = fs::read(path).map_err(|err| {
            InferenceError::Encoding(format!("failed reading {}: {err}", path.display()))
        })?;
        Ok(Self {
            bytes,
            mime_type: mime_for_path(path).map(str::to_string),
        })
    }

    pub fn from_data_url(raw: &str) -> Result<Self, InferenceError> {
        let encoded = strip_data_url_prefix(raw);
        let bytes = BASE64.decode(encoded.trim().as_bytes()).map_err(|err| {
            InferenceError::Encoding(format!("data URL base64 decode failed: {err}"))
        })?;
        Ok(Self {
            bytes,
            mime_type: data_url_mime(raw).map(str::to_string),
        })
    }

    pub fn base64_payload(&self) -> String {
        BASE64.encode(&self.bytes)
    }

    pub fn content_type(&self) -> &str {
        self.mime_type
            .as_deref()
            .unwrap_or("application/octet-stream")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Json(Value),
    Raw { bytes: Vec<u8>, content_type: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageBytes {
    pub bytes: Vec<u8>,
    pub mime_type: Option<String>,
}

impl ImageBytes {
    pub fn content_type(&self) -> &str {
        self.mime_type.as_deref().unwrap_or("image/png")
    }

    pub fn to_data_url(&self) -> String {
        data_url(&self.bytes, self.content_type())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InferenceOutput {
    Image(ImageBytes),
    Mask(ImageBytes),
}

impl InferenceOutput {
    pub fn image(&self) -> &ImageBytes {
        match self {
            InferenceOutput::Image(image) | InferenceOutput::Mask(image) => image,
        }
    }

    pub fn is_mask(&self) -> bool {
        matches!(self, InferenceOutput::Mask(_))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SegmentationCandidate {
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub mask: Option<String>,
}

pub fn validate_request(
    api_key: &str,
    mode: EditMode,
    image: Option<&SourceImage>,
) -> Result<(), InferenceError> {
    if api_key.trim().is_empty() {
        return Err(InferenceError::Validation(
            "an API key is required before a request can be sent".to_string(),
        ));
    }
    if mode.requires_source_image() && image.is_none() {
        return Err(InferenceError::Validation(format!(
            "the {mode} mode needs a source photo"
        )));
    }
    Ok(())
}

pub fn encode_for_endpoint(
    descriptor: &EndpointDescriptor,
    prompt: &str,
    image: Option<&SourceImage>,
) -> Result<RequestBody, InferenceError> {
    match descriptor.body {
        BodyKind::JsonPrompt => Ok(RequestBody::Json(json!({ "inputs": prompt }))),
        BodyKind::JsonBase64Image => {
            let image = require_image(descriptor.mode, image)?;
            Ok(RequestBody::Json(json!({ "inputs": image.base64_payload() })))
        }
        BodyKind::RawImage => {
            let image = require_image(descriptor.mode, image)?;
            Ok(RequestBody::Raw {
                bytes: image.bytes.clone(),
                content_type: image.content_type().to_string(),
            })
        }
    }
}

fn require_image<'a>(
    mode: EditMode,
    image: Option<&'a SourceImage>,
) -> Result<&'a SourceImage, InferenceError> {
    image.ok_or_else(|| {
        InferenceError::Validation(format!("the {mode} mode needs a source photo"))
    })
}

pub fn decode_segmentation(body: &[u8]) -> Result<ImageBytes, InferenceError> {
    let candidates: Vec<SegmentationCandidate> =
        serde_json::from_slice(body).map_err(|err| {
            InferenceError::Unknown(format!(
                "segmentation response was not a JSON candidate array: {err}"
            ))
        })?;
    select_mask(&candidates)
}

pub fn select_mask(candidates: &[SegmentationCandidate]) -> Result<ImageBytes, InferenceError> {
    let Some(first) = candidates.first() else {
        return Err(InferenceError::EmptyResult);
    };
    let mut best = first;
    for candidate in &candidates[1..] {
        // Strict comparison keeps the first candidate on ties.
        if candidate.score > best.score {
            best = candidate;
        }
    }
    let mask = best
        .mask
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or(InferenceError::MissingField("mask"))?;
    let bytes = BASE64
        .decode(strip_data_url_prefix(mask).as_bytes())
        .map_err(|err| InferenceError::Encoding(format!("mask base64 decode failed: {err}")))?;
    Ok(ImageBytes {
        bytes,
        mime_type: Some("image/png".to_string()),
    })
}

pub struct InferenceClient {
    api_base: String,
    registry: EndpointRegistry,
    http: HttpClient,
}

impl Default for InferenceClient {
    fn default() -> Self {
        Self::new()
    }
}

impl InferenceClient {
    pub fn new() -> Self {
        let api_base = non_empty_env("PLATESHOT_API_BASE")
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        Self::with_api_base(api_base)
    }

    pub fn with_api_base(api_base: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into().trim().trim_end_matches('/').to_string(),
            registry: EndpointRegistry::default(),
            http: HttpClient::new(),
        }
    }

    pub fn with_registry(mut self, registry: EndpointRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn registry(&self) -> &EndpointRegistry {
        &self.registry
    }

    pub fn endpoint_url(&self, descriptor: &EndpointDescriptor) -> String {
        format!("{}/{}", self.api_base, descriptor.model)
    }

    /// Full per-action pipeline: resolve the endpoint, validate, build the
    /// prompt, encode the body, dispatch once.
    pub fn render(
        &self,
        api_key: &str,
        food: &str,
        mode_label: &str,
        image: Option<&SourceImage>,
    ) -> Result<InferenceOutput, InferenceError> {
        let descriptor = self.registry.resolve_label(mode_label);
        debug!("validating {} request", descriptor.mode);
        validate_request(api_key, descriptor.mode, image)?;
        let prompt = build_prompt(food, mode_label);
        let body = encode_for_endpoint(descriptor, &prompt, image)?;
        self.invoke(api_key, descriptor, body)
    }

    /// Issues exactly one outbound request. No retries.
    pub fn invoke(
        &self,
        api_key: &str,
        descriptor: &EndpointDescriptor,
        body: RequestBody,
    ) -> Result<InferenceOutput, InferenceError> {
        let endpoint = self.endpoint_url(descriptor);
        debug!("dispatching {} request to {endpoint}", descriptor.mode);
        let request = self
            .http
            .post(&endpoint)
            .bearer_auth(api_key.trim())
            .header(ACCEPT, descriptor.accept.as_str());
        let request = match body {
            RequestBody::Json(payload) => request.json(&payload),
            RequestBody::Raw {
                bytes,
                content_type,
            } => request.header(CONTENT_TYPE, content_type).body(bytes),
        };

        debug!("awaiting {} response", descriptor.mode);
        let response = request.send().map_err(|err| {
            InferenceError::Unknown(format!(
                "{} {}",
                descriptor.failure_hint,
                truncate_text(&err.to_string(), ERROR_DETAIL_LIMIT)
            ))
        })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().unwrap_or_default();
            warn!(
                "{} request failed with status {}",
                descriptor.mode,
                status.as_u16()
            );
            return Err(InferenceError::Http {
                status: status.as_u16(),
                message: failure_message(descriptor, status.as_u16(), &detail),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_ascii_lowercase());
        let bytes = response
            .bytes()
            .map_err(|err| {
                InferenceError::Unknown(format!(
                    "{} failed reading the response body: {err}",
                    descriptor.failure_hint
                ))
            })?
            .to_vec();

        match descriptor.response {
            ResponseKind::ImageBytes => Ok(InferenceOutput::Image(ImageBytes {
                bytes,
                mime_type: content_type.filter(|value| value.starts_with("image/")),
            })),
            ResponseKind::SegmentationJson => {
                decode_segmentation(&bytes).map(InferenceOutput::Mask)
            }
        }
    }
}

fn failure_message(descriptor: &EndpointDescriptor, status: u16, detail: &str) -> String {
    let trimmed = detail.trim();
    if trimmed.is_empty() {
        format!("{} (status {status})", descriptor.failure_hint)
    } else {
        format!(
            "{} (status {status}): {}",
            descriptor.failure_hint,
            truncate_text(trimmed, ERROR_DETAIL_LIMIT)
        )
    }
}

/// Deterministic local stand-in for the style endpoint, for runs without a
/// key or network.
pub fn render_placeholder(
    food: &str,
    mode_label: &str,
    width: u32,
    height: u32,
) -> Result<ImageBytes, InferenceError> {
    let prompt = build_prompt(food, mode_label);
    let (r, g, b) = color_from_prompt(&prompt);
    let mut canvas = RgbImage::new(width.max(1), height.max(1));
    for pixel in canvas.pixels_mut() {
        *pixel = Rgb([r, g, b]);
    }
    let mut cursor = Cursor::new(Vec::new());
    canvas
        .write_to(&mut cursor, image::ImageFormat::Png)
        .map_err(|err| InferenceError::Unknown(format!("placeholder render failed: {err}")))?;
    Ok(ImageBytes {
        bytes: cursor.into_inner(),
        mime_type: Some("image/png".to_string()),
    })
}

fn color_from_prompt(prompt: &str) -> (u8, u8, u8) {
    let mut hasher = Sha256::new();
    hasher.update(prompt.as_bytes());
    let digest = hasher.finalize();
    (digest[0], digest[1], digest[2])
}

pub fn data_url(bytes: &[u8], mime: &str) -> String {
    format!("data:{mime};base64,{}", BASE64.encode(bytes))
}

pub fn strip_data_url_prefix(raw: &str) -> &str {
    match raw.find(',') {
        Some(idx) if raw.starts_with("data:") => &raw[idx + 1..],
        _ => raw,
    }
}

fn data_url_mime(raw: &str) -> Option<&str> {
    let rest = raw.strip_prefix("data:")?;
    let end = rest.find(|c| c == ';' || c == ',')?;
    let mime = &rest[..end];
    (!mime.is_empty()).then_some(mime)
}

pub fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}

pub fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

pub fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "bmp" => Some("image/bmp"),
        _ => None,
    }
}
