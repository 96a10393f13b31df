//! Gap-based merging: diarization fragment cleanup and transcript
//! consolidation.
//!
//! Both passes share the same gap policy but differ in scope. Fragment
//! merging works per speaker group, so interleaved speakers can never bleed
//! into each other. Consolidation walks the single chronological stream and
//! only ever joins same-speaker neighbours, preserving conversational order.

use std::collections::BTreeMap;

use crate::interval::sort_by_start;
use crate::model::{AttributedSegment, DiarizationSegment};

/// Merge adjacent same-speaker diarization fragments separated by gaps of at
/// most `gap_threshold` seconds. Models breaths and short silences within one
/// turn as part of that turn. Output is re-sorted chronologically across
/// speakers.
#[must_use]
pub fn merge_speaker_fragments(
    segments: Vec<DiarizationSegment>,
    gap_threshold: f64,
) -> Vec<DiarizationSegment> {
    if segments.len() <= 1 {
        return segments;
    }

    let mut by_speaker: BTreeMap<String, Vec<DiarizationSegment>> = BTreeMap::new();
    for segment in segments {
        by_speaker
            .entry(segment.speaker.clone())
            .or_default()
            .push(segment);
    }

    let mut merged = Vec::new();
    for (_, mut group) in by_speaker {
        sort_by_start(&mut group, |segment| segment.start);

        let mut group_iter = group.into_iter();
        let mut current = group_iter.next().expect("group is non-empty");
        for next in group_iter {
            if next.start - current.end <= gap_threshold {
                // Extend, never shrink: a nested fragment must not pull the
                // running end backwards.
                current.end = current.end.max(next.end);
            } else {
                merged.push(current);
                current = next;
            }
        }
        merged.push(current);
    }

    sort_by_start(&mut merged, |segment| segment.start);
    merged
}

/// Consolidate a chronological stream of attributed segments into speaker
/// turns: a new utterance starts whenever the speaker changes or the gap
/// since the previous segment's end exceeds `max_gap` seconds. Text is
/// space-joined; the end time extends to the newest segment's end.
#[must_use]
pub fn consolidate_utterances(
    segments: &[AttributedSegment],
    max_gap: f64,
) -> Vec<AttributedSegment> {
    let mut consolidated: Vec<AttributedSegment> = Vec::new();

    for segment in segments {
        let appendable = consolidated.last().is_some_and(|current| {
            current.speaker == segment.speaker && segment.start - current.end <= max_gap
        });

        if appendable {
            let current = consolidated.last_mut().expect("just checked non-empty");
            let text = segment.text.trim();
            if !text.is_empty() {
                if !current.text.is_empty() {
                    current.text.push(' ');
                }
                current.text.push_str(text);
            }
            current.end = segment.end;
        } else {
            consolidated.push(AttributedSegment {
                speaker: segment.speaker.clone(),
                text: segment.text.trim().to_owned(),
                start: segment.start,
                end: segment.end,
            });
        }
    }

    consolidated
}
