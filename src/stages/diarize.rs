//! Speaker diarization collaborator invocation and post-processing.

use std::path::Path;
use std::time::Duration;

use crate::checkpoint::{OutputLayout, load_diarization, write_json_atomic};
use crate::error::{PipeError, PipeResult};
use crate::merge::merge_speaker_fragments;
use crate::model::{DiarizationResult, SpeakerConstraints};
use crate::process::{duration_from_env, run_command_with_timeout};
use crate::progress::ProgressSink;

const DEFAULT_PYTHON_BIN: &str = "python3";
const DEFAULT_DIARIZE_SCRIPT: &str = "diarize.py";

/// Speaker range forwarded when no exact count is requested.
const DEFAULT_MIN_SPEAKERS: u32 = 1;
const DEFAULT_MAX_SPEAKERS: u32 = 8;

/// Run diarization on `vocals`, then clean the collaborator's output:
/// degenerate spans are dropped with a warning and adjacent same-speaker
/// fragments closer than `merge_gap` seconds are merged. The cleaned result
/// replaces the checkpoint artifact and is returned.
pub fn run(
    vocals: &Path,
    constraints: &SpeakerConstraints,
    merge_gap: f64,
    layout: &OutputLayout,
    sink: &dyn ProgressSink,
) -> PipeResult<DiarizationResult> {
    sink.progress("diarizing speakers");

    let args = build_args(vocals, constraints);
    run_command_with_timeout(&python_bin(), &args, None, Some(diarization_timeout()))?;

    let artifact = layout.diarization();
    let raw = load_diarization(&artifact)?;

    let before = raw.segments.len();
    let well_formed: Vec<_> = raw
        .segments
        .into_iter()
        .filter(|segment| {
            let usable = segment.span().is_some();
            if !usable {
                tracing::warn!(
                    speaker = %segment.speaker,
                    start = segment.start,
                    end = segment.end,
                    "dropping malformed diarization segment"
                );
            }
            usable
        })
        .collect();
    if well_formed.is_empty() {
        return Err(PipeError::artifact_parse(
            &artifact,
            "no well-formed diarization segments",
        ));
    }

    let merged = merge_speaker_fragments(well_formed, merge_gap);
    if merged.len() < before {
        sink.log(&format!(
            "merged {} fragmented diarization segment(s)",
            before - merged.len()
        ));
    }

    let result = DiarizationResult {
        speakers: DiarizationResult::speaker_set(&merged),
        segments: merged,
    };
    write_json_atomic(&artifact, &result)?;
    Ok(result)
}

fn build_args(vocals: &Path, constraints: &SpeakerConstraints) -> Vec<String> {
    let mut args = vec![
        "-u".to_owned(),
        diarize_script(),
        vocals.display().to_string(),
    ];
    if let Some(num) = constraints.num_speakers {
        args.push("-n".to_owned());
        args.push(num.to_string());
    } else {
        args.push("--min-speakers".to_owned());
        args.push(
            constraints
                .min_speakers
                .unwrap_or(DEFAULT_MIN_SPEAKERS)
                .to_string(),
        );
        args.push("--max-speakers".to_owned());
        args.push(
            constraints
                .max_speakers
                .unwrap_or(DEFAULT_MAX_SPEAKERS)
                .to_string(),
        );
    }
    args
}

fn python_bin() -> String {
    std::env::var("AUDIOPIPE_PYTHON_BIN")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_PYTHON_BIN.to_owned())
}

fn diarize_script() -> String {
    std::env::var("AUDIOPIPE_DIARIZE_SCRIPT")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_DIARIZE_SCRIPT.to_owned())
}

fn diarization_timeout() -> Duration {
    duration_from_env("AUDIOPIPE_DIARIZATION_TIMEOUT_MS", Duration::from_secs(1800))
}

#[cfg(test)]
mod tests {
    use super::build_args;
    use crate::model::SpeakerConstraints;

    fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .map(String::as_str)
    }

    #[test]
    fn exact_count_uses_n_flag() {
        let args = build_args(
            std::path::Path::new("vocals.wav"),
            &SpeakerConstraints {
                num_speakers: Some(3),
                min_speakers: None,
                max_speakers: None,
            },
        );
        assert_eq!(arg_value(&args, "-n"), Some("3"));
        assert!(!args.contains(&"--min-speakers".to_owned()));
    }

    #[test]
    fn no_count_uses_default_range() {
        let args = build_args(std::path::Path::new("vocals.wav"), &SpeakerConstraints::default());
        assert_eq!(arg_value(&args, "--min-speakers"), Some("1"));
        assert_eq!(arg_value(&args, "--max-speakers"), Some("8"));
    }

    #[test]
    fn explicit_bounds_override_defaults() {
        let args = build_args(
            std::path::Path::new("vocals.wav"),
            &SpeakerConstraints {
                num_speakers: None,
                min_speakers: Some(2),
                max_speakers: Some(5),
            },
        );
        assert_eq!(arg_value(&args, "--min-speakers"), Some("2"));
        assert_eq!(arg_value(&args, "--max-speakers"), Some("5"));
    }

    #[test]
    fn exact_count_takes_priority_over_bounds() {
        let args = build_args(
            std::path::Path::new("vocals.wav"),
            &SpeakerConstraints {
                num_speakers: Some(4),
                min_speakers: Some(2),
                max_speakers: Some(6),
            },
        );
        assert_eq!(arg_value(&args, "-n"), Some("4"));
        assert!(!args.contains(&"--min-speakers".to_owned()));
    }

    #[test]
    fn audio_path_is_first_positional_after_script() {
        let args = build_args(std::path::Path::new("out/vocals.wav"), &SpeakerConstraints::default());
        assert_eq!(args[0], "-u");
        assert_eq!(args[2], "out/vocals.wav");
    }
}
