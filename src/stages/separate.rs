//! Source separation via Demucs, plus vocal stem recombination.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::audio::recombine_parts;
use crate::checkpoint::OutputLayout;
use crate::error::{PipeError, PipeResult};
use crate::process::{duration_from_env, run_command_with_timeout};
use crate::progress::ProgressSink;

const DEFAULT_DEMUCS_BIN: &str = "demucs";
const MODEL: &str = "htdemucs";
const STEM: &str = "vocals";

/// Run source separation on `input` and recombine the vocal stems into the
/// separation checkpoint. Returns the vocals artifact path.
///
/// The background (`no_vocals`) stems are recombined too when present, but
/// only best-effort: their failure is a warning, not an error.
pub fn run(
    input: &Path,
    device: Option<&str>,
    layout: &OutputLayout,
    sink: &dyn ProgressSink,
) -> PipeResult<PathBuf> {
    sink.progress("separating vocals");

    let separated = layout.separated_dir();
    if separated.exists() {
        fs::remove_dir_all(&separated)?;
    }

    let mut args = vec![
        "-n".to_owned(),
        MODEL.to_owned(),
        "--two-stems".to_owned(),
        STEM.to_owned(),
    ];
    if let Some(device) = device {
        args.push("--device".to_owned());
        args.push(device.to_owned());
    }
    args.push("-o".to_owned());
    args.push(separated.display().to_string());
    args.push(input.display().to_string());

    run_command_with_timeout(&demucs_bin(), &args, None, Some(separation_timeout()))?;

    let model_dir = separated.join(MODEL);
    let vocal_parts = collect_stem_parts(&model_dir, "vocals.wav")?;
    if vocal_parts.is_empty() {
        return Err(PipeError::artifact_parse(
            &model_dir,
            "separation produced no vocals.wav stems",
        ));
    }

    let vocals = layout.vocals();
    recombine_parts(&vocal_parts, &vocals)?;
    sink.log(&format!(
        "recombined {} vocal stem part(s)",
        vocal_parts.len()
    ));

    let background_parts = collect_stem_parts(&model_dir, "no_vocals.wav")?;
    if !background_parts.is_empty()
        && let Err(error) = recombine_parts(&background_parts, &layout.background())
    {
        tracing::warn!(%error, "failed to recombine background stems");
    }

    Ok(vocals)
}

/// Collect `<model_dir>/<track>/<stem_name>` files across all track
/// directories, sorted by path for a deterministic concat order.
fn collect_stem_parts(model_dir: &Path, stem_name: &str) -> PipeResult<Vec<PathBuf>> {
    if !model_dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut parts = Vec::new();
    for entry in fs::read_dir(model_dir)? {
        let entry = entry?;
        if !entry.path().is_dir() {
            continue;
        }
        let candidate = entry.path().join(stem_name);
        if candidate.is_file() {
            parts.push(candidate);
        }
    }
    parts.sort();
    Ok(parts)
}

fn demucs_bin() -> String {
    std::env::var("AUDIOPIPE_DEMUCS_BIN")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_DEMUCS_BIN.to_owned())
}

fn separation_timeout() -> Duration {
    duration_from_env("AUDIOPIPE_SEPARATION_TIMEOUT_MS", Duration::from_secs(1800))
}

#[cfg(test)]
mod tests {
    use super::{collect_stem_parts, demucs_bin};

    #[test]
    fn collect_stem_parts_missing_dir_is_empty() {
        let parts = collect_stem_parts(std::path::Path::new("/nonexistent/htdemucs"), "vocals.wav")
            .expect("missing dir should not error");
        assert!(parts.is_empty());
    }

    #[test]
    fn collect_stem_parts_finds_and_sorts_tracks() {
        let dir = tempfile::tempdir().expect("tempdir");
        for track in ["chunk_001", "chunk_000"] {
            let track_dir = dir.path().join(track);
            std::fs::create_dir_all(&track_dir).expect("mkdir");
            std::fs::write(track_dir.join("vocals.wav"), b"wav").expect("write");
            std::fs::write(track_dir.join("no_vocals.wav"), b"wav").expect("write");
        }

        let parts = collect_stem_parts(dir.path(), "vocals.wav").expect("should collect");
        assert_eq!(parts.len(), 2);
        assert!(parts[0].ends_with("chunk_000/vocals.wav"));
        assert!(parts[1].ends_with("chunk_001/vocals.wav"));
    }

    #[test]
    fn collect_stem_parts_ignores_loose_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("vocals.wav"), b"wav").expect("write");
        let parts = collect_stem_parts(dir.path(), "vocals.wav").expect("should collect");
        assert!(parts.is_empty(), "only files inside track dirs count");
    }

    #[test]
    fn demucs_bin_default() {
        if std::env::var("AUDIOPIPE_DEMUCS_BIN").is_err() {
            assert_eq!(demucs_bin(), "demucs");
        }
    }
}
