//! Whisper transcription collaborator invocation.

use std::path::Path;
use std::time::Duration;

use crate::checkpoint::{OutputLayout, load_transcription};
use crate::error::{PipeError, PipeResult};
use crate::model::WhisperResult;
use crate::process::{duration_from_env, run_command_with_timeout};
use crate::progress::ProgressSink;

const DEFAULT_WHISPER_BIN: &str = "insanely-fast-whisper";
const WHISPER_MODEL: &str = "openai/whisper-large-v3";
const DEFAULT_LANGUAGE: &str = "en";

/// Transcribe `audio` into the transcription checkpoint and parse it.
///
/// The collaborator writes the artifact itself; a missing file after a
/// successful exit, or a payload without the `chunks` key, is an artifact
/// error and is never defaulted.
pub fn run(
    audio: &Path,
    language: Option<&str>,
    device: Option<&str>,
    layout: &OutputLayout,
    sink: &dyn ProgressSink,
) -> PipeResult<WhisperResult> {
    sink.progress("transcribing audio");

    let artifact = layout.transcription();
    let args = build_args(audio, &artifact, language, device);
    run_command_with_timeout(&whisper_bin(), &args, None, Some(transcription_timeout()))?;

    if !artifact.exists() {
        return Err(PipeError::MissingArtifact(artifact));
    }
    let result = load_transcription(&artifact)?;
    sink.log(&format!("transcription produced {} chunk(s)", result.chunks.len()));
    Ok(result)
}

fn build_args(
    audio: &Path,
    artifact: &Path,
    language: Option<&str>,
    device: Option<&str>,
) -> Vec<String> {
    let mut args = vec![
        "--file-name".to_owned(),
        audio.display().to_string(),
        "--model-name".to_owned(),
        WHISPER_MODEL.to_owned(),
        "--transcript-path".to_owned(),
        artifact.display().to_string(),
        "--language".to_owned(),
        language.unwrap_or(DEFAULT_LANGUAGE).to_owned(),
    ];
    // Device selection is the collaborator's business; the id string is
    // passed through verbatim when the caller supplied one.
    if let Some(device) = device {
        args.push("--device-id".to_owned());
        args.push(device.to_owned());
        args.push("--batch-size".to_owned());
        args.push("32".to_owned());
    }
    args
}

fn whisper_bin() -> String {
    std::env::var("AUDIOPIPE_WHISPER_BIN")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_WHISPER_BIN.to_owned())
}

/// Documented default: 600 s.
fn transcription_timeout() -> Duration {
    duration_from_env("AUDIOPIPE_TRANSCRIPTION_TIMEOUT_MS", Duration::from_secs(600))
}
