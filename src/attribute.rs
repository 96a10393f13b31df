//! Speaker attribution: mapping transcription spans onto diarization spans.
//!
//! Selection is two-phase and fully deterministic. The overlap phase picks
//! the diarization segment with the strictly greatest overlap; when several
//! tie, the earliest-starting one wins. Only when no segment overlaps at all
//! does the fallback phase pick the segment whose center is nearest to the
//! chunk's center, with the same earliest-start tie-break.

use crate::interval::{center_distance, overlap_duration, sort_by_start};
use crate::model::{AttributedSegment, DiarizationSegment, TimeSpan, WhisperChunk, round_ms};

/// Attribute every usable transcription chunk to exactly one speaker.
///
/// Chunks with a null boundary or a degenerate span are dropped with a
/// warning; chunks whose trimmed text is empty are dropped before any
/// attribution work. An empty diarization set yields an empty output.
/// Emitted boundaries are rounded to millisecond precision.
#[must_use]
pub fn attribute_chunks(
    chunks: &[WhisperChunk],
    diarization: &[DiarizationSegment],
) -> Vec<AttributedSegment> {
    // The earliest-start tie-break is defined over the start-sorted order of
    // the diarization set, independent of collaborator output order.
    let mut candidates: Vec<&DiarizationSegment> = diarization
        .iter()
        .filter(|segment| segment.span().is_some())
        .collect();
    sort_by_start(&mut candidates, |segment| segment.start);

    let mut attributed = Vec::new();
    for chunk in chunks {
        let text = chunk.text.trim();
        if text.is_empty() {
            continue;
        }
        let Some(span) = chunk.span() else {
            tracing::warn!(
                timestamp = ?chunk.timestamp,
                "dropping transcription chunk with unusable timestamps"
            );
            continue;
        };
        if let Some(speaker) = best_speaker(span, &candidates) {
            attributed.push(AttributedSegment {
                speaker: speaker.to_owned(),
                text: text.to_owned(),
                start: round_ms(span.start()),
                end: round_ms(span.end()),
            });
        }
    }
    attributed
}

/// Select the best-matching speaker for one span, or `None` when the
/// diarization set is empty. `candidates` must be sorted by start time.
fn best_speaker<'a>(span: TimeSpan, candidates: &[&'a DiarizationSegment]) -> Option<&'a str> {
    let mut best: Option<&'a DiarizationSegment> = None;
    let mut max_overlap = 0.0_f64;

    for &segment in candidates {
        let Some(candidate) = segment.span() else {
            continue;
        };
        let overlap = overlap_duration(span, candidate);
        // Strict comparison: on equal overlap the earlier-starting segment
        // (seen first in sorted order) is kept.
        if overlap > max_overlap {
            max_overlap = overlap;
            best = Some(segment);
        }
    }

    if let Some(segment) = best {
        return Some(&segment.speaker);
    }

    // Fallback: nearest center, never None for a non-empty set.
    let mut min_distance = f64::INFINITY;
    for &segment in candidates {
        let Some(candidate) = segment.span() else {
            continue;
        };
        let distance = center_distance(span, candidate);
        if distance < min_distance {
            min_distance = distance;
            best = Some(segment);
        }
    }

    best.map(|segment| segment.speaker.as_str())
}

#[cfg(test)]
mod tests {
    use super::attribute_chunks;
    use crate::model::{DiarizationSegment, WhisperChunk};

    fn diar(speaker: &str, start: f64, end: f64) -> DiarizationSegment {
        DiarizationSegment {
            speaker: speaker.to_owned(),
            start,
            end,
        }
    }

    fn chunk(text: &str, start: f64, end: f64) -> WhisperChunk {
        WhisperChunk {
            timestamp: [Some(start), Some(end)],
            text: text.to_owned(),
        }
    }

    #[test]
    fn fully_contained_span_selects_its_speaker() {
        let diarization = vec![diar("S1", 0.0, 5.0), diar("S2", 5.0, 10.0)];
        let out = attribute_chunks(&[chunk("hello", 6.0, 8.0)], &diarization);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].speaker, "S2");
    }

    #[test]
    fn greatest_overlap_wins_across_boundary() {
        let diarization = vec![diar("S1", 0.0, 5.0), diar("S2", 5.0, 10.0)];
        // 1s over S1, 3s over S2.
        let out = attribute_chunks(&[chunk("crossing", 4.0, 8.0)], &diarization);
        assert_eq!(out[0].speaker, "S2");
    }

    #[test]
    fn overlap_tie_goes_to_earliest_start() {
        // Both overlap the chunk [2,4] by exactly 1s.
        let diarization = vec![diar("LATE", 3.0, 6.0), diar("EARLY", 1.0, 3.0)];
        let out = attribute_chunks(&[chunk("tied", 2.0, 4.0)], &diarization);
        assert_eq!(out[0].speaker, "EARLY");
    }

    #[test]
    fn no_overlap_falls_back_to_nearest_center() {
        let diarization = vec![diar("S1", 0.0, 2.0), diar("S2", 10.0, 12.0)];
        // Chunk [3,4]: centers are 1.0 (S1) and 11.0 (S2); chunk center 3.5.
        let out = attribute_chunks(&[chunk("gap", 3.0, 4.0)], &diarization);
        assert_eq!(out[0].speaker, "S1");
    }

    #[test]
    fn fallback_never_none_for_nonempty_set() {
        let diarization = vec![diar("ONLY", 100.0, 101.0)];
        let out = attribute_chunks(&[chunk("far away", 0.0, 1.0)], &diarization);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].speaker, "ONLY");
    }

    #[test]
    fn fallback_tie_goes_to_earliest_start() {
        // Chunk center 5.0; both candidate centers are 2.0 away.
        let diarization = vec![diar("LATE", 6.5, 7.5), diar("EARLY", 2.5, 3.5)];
        let out = attribute_chunks(&[chunk("equidistant", 4.5, 5.5)], &diarization);
        assert_eq!(out[0].speaker, "EARLY");
    }

    #[test]
    fn empty_diarization_set_yields_empty_output() {
        let out = attribute_chunks(&[chunk("orphan", 0.0, 1.0)], &[]);
        assert!(out.is_empty());
    }

    #[test]
    fn null_boundary_chunks_are_dropped() {
        let diarization = vec![diar("S1", 0.0, 5.0)];
        let chunks = vec![
            WhisperChunk {
                timestamp: [None, Some(1.0)],
                text: "no start".to_owned(),
            },
            WhisperChunk {
                timestamp: [Some(0.0), None],
                text: "no end".to_owned(),
            },
            chunk("kept", 1.0, 2.0),
        ];
        let out = attribute_chunks(&chunks, &diarization);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].text, "kept");
    }

    #[test]
    fn degenerate_span_chunks_are_dropped() {
        let diarization = vec![diar("S1", 0.0, 5.0)];
        let out = attribute_chunks(&[chunk("zero width", 2.0, 2.0)], &diarization);
        assert!(out.is_empty());
    }

    #[test]
    fn empty_text_chunks_are_dropped_before_attribution() {
        let diarization = vec![diar("S1", 0.0, 5.0)];
        let out = attribute_chunks(&[chunk("   ", 1.0, 2.0), chunk("", 2.0, 3.0)], &diarization);
        assert!(out.is_empty());
    }

    #[test]
    fn text_is_trimmed() {
        let diarization = vec![diar("S1", 0.0, 5.0)];
        let out = attribute_chunks(&[chunk("  hello there \n", 1.0, 2.0)], &diarization);
        assert_eq!(out[0].text, "hello there");
    }

    #[test]
    fn boundaries_are_rounded_to_milliseconds() {
        let diarization = vec![diar("S1", 0.0, 5.0)];
        let out = attribute_chunks(&[chunk("precise", 1.000444, 2.000555)], &diarization);
        assert_eq!(out[0].start, 1.0);
        assert_eq!(out[0].end, 2.001);
    }

    #[test]
    fn malformed_diarization_segments_are_ignored() {
        let diarization = vec![diar("BROKEN", 5.0, 5.0), diar("GOOD", 0.0, 2.0)];
        let out = attribute_chunks(&[chunk("hi", 0.5, 1.5)], &diarization);
        assert_eq!(out[0].speaker, "GOOD");
    }

    #[test]
    fn input_order_of_diarization_does_not_matter() {
        let forward = vec![diar("A", 1.0, 3.0), diar("B", 3.0, 6.0)];
        let reversed = vec![diar("B", 3.0, 6.0), diar("A", 1.0, 3.0)];
        let chunks = vec![chunk("x", 2.0, 4.0)];
        assert_eq!(
            attribute_chunks(&chunks, &forward),
            attribute_chunks(&chunks, &reversed)
        );
    }
}
