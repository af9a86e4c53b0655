//! `POST /api/v1/analyze_voice`: multipart audio upload to acoustic features.
//!
//! The upload is checked against an audio content-type allow-list, spooled
//! to a scoped temp file for the decoders, and removed before feature
//! extraction starts. Decoded audio is cut at `max_audio_seconds`. Input
//! problems are answered with 422.

use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;
use parkinsight_core::{ServiceError, VoiceFeatures};
use parkinsight_voice::upload::extension_of;
use parkinsight_voice::{extract, load_audio, ScopedUpload, StageReport};
use serde::Serialize;
use std::sync::Arc;

use crate::api::{run_blocking, Timestamped};
use crate::error::ApiFailure;
use crate::state::AppState;

/// Multipart field carrying the recording.
pub const AUDIO_FIELD: &str = "audio_file";

/// Accepted media types, compared after dropping parameters such as `codecs`.
pub const ALLOWED_AUDIO_TYPES: [&str; 5] = [
    "audio/wav",
    "audio/wave",
    "audio/x-wav",
    "audio/webm",
    "audio/ogg",
];

/// Body of a successful analysis.
#[derive(Debug, Serialize)]
pub struct VoiceAnalysis {
    /// The 13 acoustic features.
    pub features: VoiceFeatures,
    /// The upload could not be decoded and the features come from generated noise.
    pub synthetic_audio: bool,
    /// Only the first `max_audio_seconds` of the recording were analysed.
    pub truncated: bool,
    /// Decoder that produced the samples (`wav`, `symphonia`, `synthetic`).
    pub decoder: &'static str,
    /// Sample rate of the decoded audio.
    pub sample_rate: u32,
    /// Length of the analysed audio.
    pub duration_seconds: f64,
    /// Pitch frames with a detected fundamental.
    pub voiced_frames: usize,
    /// Which stages computed and which kept defaults.
    pub stages: Vec<StageReport>,
}

/// Media type without parameters, lowercased (`audio/webm;codecs=opus` -> `audio/webm`).
#[must_use]
pub fn base_media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Whether `content_type` is on the allow-list.
#[must_use]
pub fn is_allowed_audio_type(content_type: &str) -> bool {
    ALLOWED_AUDIO_TYPES.contains(&base_media_type(content_type).as_str())
}

/// File extension to hint the decoders with.
fn upload_extension(file_name: Option<&str>, media_type: &str) -> Option<String> {
    file_name.and_then(extension_of).or_else(|| {
        match media_type {
            "audio/wav" | "audio/wave" | "audio/x-wav" => Some("wav"),
            "audio/webm" => Some("webm"),
            "audio/ogg" => Some("ogg"),
            _ => None,
        }
        .map(str::to_string)
    })
}

fn unprocessable(message: &str, expected: &str, received: impl Into<String>) -> ApiFailure {
    ApiFailure::from(ServiceError::invalid_input(message, expected, received))
        .with_status(StatusCode::UNPROCESSABLE_ENTITY)
}

struct Upload {
    bytes: Vec<u8>,
    media_type: String,
    file_name: Option<String>,
}

/// Pull the audio field out of the multipart body.
async fn read_upload(multipart: &mut Multipart) -> Result<Upload, ApiFailure> {
    loop {
        let field = multipart.next_field().await.map_err(|e| {
            unprocessable(&e.body_text(), "well-formed multipart/form-data", "malformed multipart body")
        })?;
        let Some(field) = field else {
            return Err(unprocessable(
                "No audio file in request",
                &format!("multipart field '{AUDIO_FIELD}'"),
                "no such field",
            ));
        };
        if field.name() != Some(AUDIO_FIELD) {
            continue;
        }

        let content_type = field.content_type().unwrap_or_default().to_string();
        if !is_allowed_audio_type(&content_type) {
            return Err(unprocessable(
                "Unsupported audio content type",
                &ALLOWED_AUDIO_TYPES.join(", "),
                if content_type.is_empty() {
                    "none".to_string()
                } else {
                    content_type
                },
            ));
        }
        let file_name = field.file_name().map(str::to_string);
        let bytes = field.bytes().await.map_err(|e| {
            unprocessable(&e.body_text(), "a complete audio upload", "truncated upload")
        })?;
        if bytes.is_empty() {
            return Err(unprocessable("Audio file is empty", "non-empty audio data", "0 bytes"));
        }
        return Ok(Upload {
            bytes: bytes.to_vec(),
            media_type: base_media_type(&content_type),
            file_name,
        });
    }
}

/// Decode and analyse one upload. Runs on the blocking pool.
fn analyze(upload: Upload, max_audio_seconds: u32) -> Result<VoiceAnalysis, ServiceError> {
    let extension = upload_extension(upload.file_name.as_deref(), &upload.media_type);
    let spooled = ScopedUpload::write(&upload.bytes, extension.as_deref())
        .map_err(|e| ServiceError::Unexpected(format!("failed to spool upload: {e}")))?;
    Ok(analyze_spooled(spooled, &upload.media_type, max_audio_seconds))
}

/// Decode the spooled file, delete it, then extract features.
fn analyze_spooled(
    spooled: ScopedUpload,
    media_type: &str,
    max_audio_seconds: u32,
) -> VoiceAnalysis {
    let clip = load_audio(spooled.path(), max_audio_seconds);
    if let Err(e) = spooled.close() {
        tracing::warn!(error = %e, "Failed to remove spooled upload");
    }
    if clip.synthetic {
        tracing::warn!(%media_type, "Upload could not be decoded; analysing synthetic audio");
    }

    let extraction = extract(&clip.samples, clip.sample_rate);
    VoiceAnalysis {
        stages: extraction.report(),
        voiced_frames: extraction.voiced_frames,
        features: extraction.features,
        synthetic_audio: clip.synthetic,
        truncated: clip.truncated,
        decoder: clip.decoder,
        sample_rate: clip.sample_rate,
        duration_seconds: clip.duration_seconds(),
    }
}

/// `POST /api/v1/analyze_voice`: extract acoustic features from an upload.
pub async fn analyze_voice_handler(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Timestamped<VoiceAnalysis>>, ApiFailure> {
    let mut multipart = multipart.map_err(|e| {
        unprocessable(&e.body_text(), "multipart/form-data", "non-multipart body")
    })?;
    let upload = read_upload(&mut multipart).await?;
    let media_type = upload.media_type.clone();
    let max_audio_seconds = state.config.max_audio_seconds;
    let analysis = run_blocking(move || analyze(upload, max_audio_seconds)).await?;
    tracing::info!(
        %media_type,
        decoder = analysis.decoder,
        synthetic_audio = analysis.synthetic_audio,
        truncated = analysis.truncated,
        voiced_frames = analysis.voiced_frames,
        "Voice analysis served"
    );
    Ok(Json(Timestamped::now(analysis)))
}
