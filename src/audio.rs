//! ffmpeg/ffprobe helpers and the in-process WAV concatenation fallback.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{PipeError, PipeResult};
use crate::process::{duration_from_env, run_command_with_timeout};

/// Total duration of an audio file in seconds, via ffprobe.
pub fn probe_duration_seconds(input: &Path) -> PipeResult<f64> {
    let args = vec![
        "-v".to_owned(),
        "error".to_owned(),
        "-show_entries".to_owned(),
        "format=duration".to_owned(),
        "-of".to_owned(),
        "default=nokey=1:noprint_wrappers=1".to_owned(),
        input.display().to_string(),
    ];

    let output = run_command_with_timeout("ffprobe", &args, None, Some(ffprobe_timeout()))?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    let secs = stdout.trim().parse::<f64>().ok().filter(|s| s.is_finite() && *s > 0.0);
    secs.ok_or_else(|| {
        PipeError::artifact_parse(input, format!("ffprobe reported no usable duration: `{}`", stdout.trim()))
    })
}

/// Extract `[start, start + duration)` of `input` into `output` as PCM WAV.
pub fn extract_segment(
    input: &Path,
    start_sec: f64,
    duration_sec: f64,
    output: &Path,
) -> PipeResult<()> {
    let args = vec![
        "-hide_banner".to_owned(),
        "-loglevel".to_owned(),
        "error".to_owned(),
        "-y".to_owned(),
        "-ss".to_owned(),
        format!("{start_sec}"),
        "-t".to_owned(),
        format!("{duration_sec}"),
        "-i".to_owned(),
        input.display().to_string(),
        "-c:a".to_owned(),
        "pcm_s16le".to_owned(),
        output.display().to_string(),
    ];
    run_command_with_timeout("ffmpeg", &args, None, Some(ffmpeg_timeout()))?;
    Ok(())
}

/// Recombine separated stem parts into one file.
///
/// The fast path is ffmpeg's concat demuxer with stream copy. When that
/// fails, fall back to in-process WAV concatenation, which skips zero-length
/// parts and fails loudly only when no valid parts remain.
pub fn recombine_parts(parts: &[PathBuf], output: &Path) -> PipeResult<()> {
    if parts.is_empty() {
        return Err(PipeError::NoViableOutput(
            "no stem parts found to recombine".to_owned(),
        ));
    }

    match concat_parts_ffmpeg(parts, output) {
        Ok(()) => Ok(()),
        Err(error) => {
            tracing::warn!(%error, "ffmpeg concat failed, falling back to in-process WAV concat");
            concat_wav_parts(parts, output)
        }
    }
}

fn concat_parts_ffmpeg(parts: &[PathBuf], output: &Path) -> PipeResult<()> {
    let list_path = output.with_extension("concat_list.txt");
    let mut listing = String::new();
    for part in parts {
        let absolute = fs::canonicalize(part)?;
        listing.push_str(&format!("file '{}'\n", absolute.display()));
    }
    fs::write(&list_path, listing)?;

    let args = vec![
        "-hide_banner".to_owned(),
        "-loglevel".to_owned(),
        "error".to_owned(),
        "-y".to_owned(),
        "-f".to_owned(),
        "concat".to_owned(),
        "-safe".to_owned(),
        "0".to_owned(),
        "-i".to_owned(),
        list_path.display().to_string(),
        "-c".to_owned(),
        "copy".to_owned(),
        output.display().to_string(),
    ];
    let result = run_command_with_timeout("ffmpeg", &args, None, Some(ffmpeg_timeout()));
    let _ = fs::remove_file(&list_path);
    result?;
    Ok(())
}

/// In-process fallback: append the samples of every readable, non-empty WAV
/// part whose format matches the first valid one.
pub fn concat_wav_parts(parts: &[PathBuf], output: &Path) -> PipeResult<()> {
    let mut writer: Option<(hound::WavSpec, hound::WavWriter<std::io::BufWriter<fs::File>>)> = None;

    for part in parts {
        let mut reader = match hound::WavReader::open(part) {
            Ok(reader) => reader,
            Err(error) => {
                tracing::warn!(part = %part.display(), %error, "skipping unreadable part");
                continue;
            }
        };
        if reader.len() == 0 {
            tracing::warn!(part = %part.display(), "skipping empty part");
            continue;
        }
        let spec = reader.spec();

        if writer.is_none() {
            let created = hound::WavWriter::create(output, spec).map_err(wav_error)?;
            writer = Some((spec, created));
        }
        let (expected, sink) = writer.as_mut().expect("writer just initialized");
        if spec != *expected {
            tracing::warn!(part = %part.display(), "skipping part with mismatched WAV format");
            continue;
        }

        match spec.sample_format {
            hound::SampleFormat::Int => {
                for sample in reader.samples::<i32>() {
                    sink.write_sample(sample.map_err(wav_error)?)
                        .map_err(wav_error)?;
                }
            }
            hound::SampleFormat::Float => {
                for sample in reader.samples::<f32>() {
                    sink.write_sample(sample.map_err(wav_error)?)
                        .map_err(wav_error)?;
                }
            }
        }
    }

    match writer {
        Some((_, sink)) => {
            sink.finalize().map_err(wav_error)?;
            Ok(())
        }
        None => Err(PipeError::NoViableOutput(
            "no valid audio parts remained after filtering".to_owned(),
        )),
    }
}

fn wav_error(error: hound::Error) -> PipeError {
    PipeError::Io(std::io::Error::other(error.to_string()))
}

pub(crate) fn ffmpeg_timeout() -> Duration {
    duration_from_env("AUDIOPIPE_FFMPEG_TIMEOUT_MS", Duration::from_secs(180))
}

fn ffprobe_timeout() -> Duration {
    duration_from_env("AUDIOPIPE_FFPROBE_TIMEOUT_MS", Duration::from_secs(10))
}
