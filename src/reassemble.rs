//! Re-offsetting per-chunk results back onto the master timeline.

use crate::interval::sort_by_start;
use crate::model::{AttributedSegment, AudioChunk, round_ms};

/// Convert chunk-relative segments to absolute time and produce one
/// chronologically sorted stream.
///
/// Each segment's boundaries are shifted by its chunk's `start_offset`, then
/// the whole collection is stably sorted by absolute start, so the result is
/// independent of the order in which chunks completed. Failed chunks are
/// simply absent from `chunk_results`.
#[must_use]
pub fn reassemble(
    chunk_results: Vec<(AudioChunk, Vec<AttributedSegment>)>,
) -> Vec<AttributedSegment> {
    let mut all_segments = Vec::new();

    for (chunk, segments) in chunk_results {
        for mut segment in segments {
            segment.start = round_ms(segment.start + chunk.start_offset);
            segment.end = round_ms(segment.end + chunk.start_offset);
            all_segments.push(segment);
        }
    }

    sort_by_start(&mut all_segments, |segment| segment.start);
    all_segments
}
