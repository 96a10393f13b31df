//! Splitting a long recording into bounded windows with absolute offsets.

use std::fs;
use std::path::Path;

use crate::audio;
use crate::error::{PipeError, PipeResult};
use crate::model::AudioChunk;

/// A planned chunk window, before any audio is materialized.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChunkWindow {
    pub index: usize,
    pub start: f64,
    pub end: f64,
}

impl ChunkWindow {
    #[must_use]
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Plan ordered windows covering `[0, total_duration)` with no gaps and no
/// overlaps; the last window is truncated to the total duration. A recording
/// no longer than `chunk_duration` yields exactly one window.
pub fn plan_windows(total_duration: f64, chunk_duration: f64) -> PipeResult<Vec<ChunkWindow>> {
    if !total_duration.is_finite() || total_duration <= 0.0 {
        return Err(PipeError::InvalidRequest(format!(
            "total duration must be positive, got {total_duration}"
        )));
    }
    if !chunk_duration.is_finite() || chunk_duration <= 0.0 {
        return Err(PipeError::InvalidRequest(format!(
            "chunk duration must be positive, got {chunk_duration}"
        )));
    }

    let mut windows = Vec::new();
    let mut start = 0.0;
    let mut index = 0;
    while start < total_duration {
        let end = (start + chunk_duration).min(total_duration);
        windows.push(ChunkWindow { index, start, end });
        start += chunk_duration;
        index += 1;
    }
    Ok(windows)
}

/// Materialize every planned window of `input` into `chunks_dir`.
///
/// A window that fails to materialize is logged and skipped; it is never
/// merged into a neighbour and never aborts the whole run by itself. Whether
/// an empty result is fatal is the caller's decision.
pub fn chop_audio(
    input: &Path,
    chunk_duration: f64,
    chunks_dir: &Path,
) -> PipeResult<Vec<AudioChunk>> {
    let total_duration = audio::probe_duration_seconds(input)?;
    let windows = plan_windows(total_duration, chunk_duration)?;
    fs::create_dir_all(chunks_dir)?;

    let mut chunks = Vec::with_capacity(windows.len());
    for window in &windows {
        let path = chunks_dir.join(format!("chunk_{:03}.wav", window.index));
        match audio::extract_segment(input, window.start, window.duration(), &path) {
            Ok(()) => chunks.push(AudioChunk {
                index: window.index,
                path,
                start_offset: window.start,
                end_offset: window.end,
            }),
            Err(error) => {
                tracing::warn!(chunk = window.index, %error, "failed to materialize chunk, skipping");
            }
        }
    }

    tracing::info!(
        planned = windows.len(),
        materialized = chunks.len(),
        "chopped input audio"
    );
    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::plan_windows;
    use crate::error::PipeError;

    #[test]
    fn windows_cover_duration_without_gaps_or_overlaps() {
        let windows = plan_windows(2750.0, 900.0).expect("plan should succeed");
        assert_eq!(windows.len(), 4); // ceil(2750 / 900)

        assert_eq!(windows[0].start, 0.0);
        for pair in windows.windows(2) {
            assert_eq!(pair[0].end, pair[1].start, "no gap and no overlap");
        }
        assert_eq!(windows.last().unwrap().end, 2750.0);
    }

    #[test]
    fn chunk_count_is_ceiling_of_ratio() {
        for (total, chunk, expected) in [
            (900.0, 900.0, 1),
            (900.1, 900.0, 2),
            (1800.0, 900.0, 2),
            (10.0, 3.0, 4),
            (0.5, 900.0, 1),
        ] {
            let windows = plan_windows(total, chunk).expect("plan should succeed");
            assert_eq!(
                windows.len(),
                expected,
                "ceil({total}/{chunk}) should be {expected}"
            );
        }
    }

    #[test]
    fn short_recording_yields_single_full_window() {
        let windows = plan_windows(120.0, 900.0).expect("plan should succeed");
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].start, 0.0);
        assert_eq!(windows[0].end, 120.0);
    }

    #[test]
    fn last_window_is_truncated() {
        let windows = plan_windows(1000.0, 900.0).expect("plan should succeed");
        assert_eq!(windows[1].start, 900.0);
        assert_eq!(windows[1].end, 1000.0);
        assert!((windows[1].duration() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn indices_are_sequential() {
        let windows = plan_windows(3000.0, 900.0).expect("plan should succeed");
        let indices: Vec<usize> = windows.iter().map(|w| w.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
    }

    #[test]
    fn nonpositive_inputs_are_rejected() {
        assert!(matches!(
            plan_windows(0.0, 900.0),
            Err(PipeError::InvalidRequest(_))
        ));
        assert!(matches!(
            plan_windows(-5.0, 900.0),
            Err(PipeError::InvalidRequest(_))
        ));
        assert!(matches!(
            plan_windows(100.0, 0.0),
            Err(PipeError::InvalidRequest(_))
        ));
        assert!(matches!(
            plan_windows(100.0, f64::NAN),
            Err(PipeError::InvalidRequest(_))
        ));
    }
}
