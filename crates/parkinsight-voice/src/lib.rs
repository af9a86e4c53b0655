//! Audio loading and acoustic voice-feature extraction.
//!
//! ```text
//! upload bytes ──▶ ScopedUpload ──▶ load_audio ──▶ extract ──▶ VoiceFeatures
//!                  (temp file)      wav │ symphonia │ synthetic
//! ```
//!
//! Loading never fails: undecodable input becomes synthetic noise flagged on
//! the returned [`AudioClip`]. Extraction never fails either: every stage
//! reports whether it computed or kept its population default.

pub mod audio;
pub mod extractor;
pub mod hpss;
pub mod pitch;
pub mod ppe;
pub mod upload;

pub use audio::{load_audio, AudioClip, AudioDecoder, AudioError, Decoded, DEFAULT_MAX_AUDIO_SECONDS};
pub use extractor::{extract, population_defaults, Extraction, Stage, StageReport};
pub use upload::ScopedUpload;
