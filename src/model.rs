use std::collections::BTreeSet;
use std::path::PathBuf;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Time spans
// ---------------------------------------------------------------------------

/// A well-formed span of time in seconds. Invariant: `0 <= start < end`.
///
/// Absolute or chunk-relative depending on context; the constructor is the
/// single place the invariant is enforced, so every downstream interval
/// computation can assume it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeSpan {
    start: f64,
    end: f64,
}

impl TimeSpan {
    /// Returns `None` for zero/negative-duration spans, negative starts, or
    /// non-finite boundaries.
    #[must_use]
    pub fn new(start: f64, end: f64) -> Option<Self> {
        if !start.is_finite() || !end.is_finite() || start < 0.0 || end <= start {
            return None;
        }
        Some(Self { start, end })
    }

    #[must_use]
    pub const fn start(&self) -> f64 {
        self.start
    }

    #[must_use]
    pub const fn end(&self) -> f64 {
        self.end
    }

    #[must_use]
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    #[must_use]
    pub fn center(&self) -> f64 {
        (self.start + self.end) / 2.0
    }
}

/// Round a timestamp to millisecond precision (3 decimal places).
///
/// Applied at every emission point so that storing and reloading a transcript
/// never shifts boundaries: `round_ms(round_ms(x)) == round_ms(x)`.
#[must_use]
pub fn round_ms(seconds: f64) -> f64 {
    (seconds * 1000.0).round() / 1000.0
}

// ---------------------------------------------------------------------------
// Pipeline steps
// ---------------------------------------------------------------------------

/// The externally-resumable pipeline steps, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStep {
    Separation,
    Diarization,
    Transcription,
}

impl PipelineStep {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Separation => "separation",
            Self::Diarization => "diarization",
            Self::Transcription => "transcription",
        }
    }
}

/// Speaker-count constraints forwarded to the diarization collaborator.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SpeakerConstraints {
    pub num_speakers: Option<u32>,
    pub min_speakers: Option<u32>,
    pub max_speakers: Option<u32>,
}

impl SpeakerConstraints {
    /// Cross-field validation: an exact count must sit inside the bounds, and
    /// the bounds must not be inverted.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(num) = self.num_speakers {
            if let Some(min) = self.min_speakers
                && num < min
            {
                return Err("num_speakers cannot be less than min_speakers".to_owned());
            }
            if let Some(max) = self.max_speakers
                && num > max
            {
                return Err("num_speakers cannot be greater than max_speakers".to_owned());
            }
        }
        if let (Some(min), Some(max)) = (self.min_speakers, self.max_speakers)
            && min > max
        {
            return Err("min_speakers cannot be greater than max_speakers".to_owned());
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Collaborator payloads
// ---------------------------------------------------------------------------

/// One speaker turn as reported by the diarization collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiarizationSegment {
    pub speaker: String,
    pub start: f64,
    pub end: f64,
}

impl DiarizationSegment {
    /// `None` when the collaborator emitted a degenerate span.
    #[must_use]
    pub fn span(&self) -> Option<TimeSpan> {
        TimeSpan::new(self.start, self.end)
    }
}

/// Diarization collaborator output: `{speakers, segments}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiarizationResult {
    pub speakers: Vec<String>,
    pub segments: Vec<DiarizationSegment>,
}

impl DiarizationResult {
    /// Shape validation mirroring the collaborator contract: non-empty
    /// speakers and segments, and every segment speaker present in the
    /// deduplicated speaker set.
    pub fn validate(&self) -> Result<(), String> {
        if self.speakers.is_empty() {
            return Err("speakers list is empty".to_owned());
        }
        if self.segments.is_empty() {
            return Err("segments list is empty".to_owned());
        }
        let known: BTreeSet<&str> = self.speakers.iter().map(String::as_str).collect();
        for segment in &self.segments {
            if !known.contains(segment.speaker.as_str()) {
                return Err(format!(
                    "segment speaker `{}` is not in the speakers list",
                    segment.speaker
                ));
            }
        }
        Ok(())
    }

    /// Rebuild the deduplicated, sorted speaker set from the segments.
    #[must_use]
    pub fn speaker_set(segments: &[DiarizationSegment]) -> Vec<String> {
        segments
            .iter()
            .map(|s| s.speaker.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// One transcription chunk from the Whisper collaborator. Either boundary may
/// be null (collaborator limitation); such chunks are discarded before
/// attribution, never treated as zero-duration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhisperChunk {
    pub timestamp: [Option<f64>; 2],
    pub text: String,
}

impl WhisperChunk {
    #[must_use]
    pub fn span(&self) -> Option<TimeSpan> {
        let [start, end] = self.timestamp;
        TimeSpan::new(start?, end?)
    }
}

/// Whisper collaborator output: `{chunks: [...]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhisperResult {
    pub chunks: Vec<WhisperChunk>,
}

// ---------------------------------------------------------------------------
// Fusion output
// ---------------------------------------------------------------------------

/// The fusion unit: a transcription span attributed to one speaker, in
/// absolute time once reassembled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributedSegment {
    pub speaker: String,
    pub text: String,
    pub start: f64,
    pub end: f64,
}

impl AttributedSegment {
    #[must_use]
    pub fn span(&self) -> Option<TimeSpan> {
        TimeSpan::new(self.start, self.end)
    }
}

/// Final and consolidated transcript artifact shape: `{segments: [...]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptDocument {
    pub segments: Vec<AttributedSegment>,
}

impl TranscriptDocument {
    /// The deduplicated, sorted speaker set across all segments.
    #[must_use]
    pub fn speakers(&self) -> Vec<String> {
        self.segments
            .iter()
            .map(|s| s.speaker.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// First-start to last-end duration, 0.0 when empty.
    #[must_use]
    pub fn total_duration(&self) -> f64 {
        match (self.segments.first(), self.segments.last()) {
            (Some(first), Some(last)) => last.end - first.start,
            _ => 0.0,
        }
    }
}

/// A materialized chunk of the input recording. `start_offset`/`end_offset`
/// are absolute, so chunk-relative timestamps convert by simple addition.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    pub index: usize,
    pub path: PathBuf,
    pub start_offset: f64,
    pub end_offset: f64,
}

#[cfg(test)]
mod tests {
    use super::{
        AttributedSegment, DiarizationResult, DiarizationSegment, PipelineStep, SpeakerConstraints,
        TimeSpan, TranscriptDocument, WhisperChunk, WhisperResult, round_ms,
    };

    #[test]
    fn time_span_rejects_degenerate_inputs() {
        assert!(TimeSpan::new(1.0, 1.0).is_none());
        assert!(TimeSpan::new(2.0, 1.0).is_none());
        assert!(TimeSpan::new(-0.5, 1.0).is_none());
        assert!(TimeSpan::new(f64::NAN, 1.0).is_none());
        assert!(TimeSpan::new(0.0, f64::INFINITY).is_none());
    }

    #[test]
    fn time_span_accessors() {
        let span = TimeSpan::new(1.0, 3.0).unwrap();
        assert_eq!(span.start(), 1.0);
        assert_eq!(span.end(), 3.0);
        assert_eq!(span.duration(), 2.0);
        assert_eq!(span.center(), 2.0);
    }

    #[test]
    fn round_ms_is_idempotent() {
        for value in [0.0, 1.23456, 910.0005, 0.0004, 12345.678901] {
            let once = round_ms(value);
            assert_eq!(round_ms(once), once, "rounding {value} twice drifted");
        }
    }

    #[test]
    fn round_ms_three_decimals() {
        assert_eq!(round_ms(1.23456), 1.235);
        assert_eq!(round_ms(1.2344), 1.234);
    }

    #[test]
    fn pipeline_steps_are_ordered() {
        assert!(PipelineStep::Separation < PipelineStep::Diarization);
        assert!(PipelineStep::Diarization < PipelineStep::Transcription);
        assert_eq!(PipelineStep::Diarization.as_str(), "diarization");
    }

    #[test]
    fn speaker_constraints_valid_combinations() {
        assert!(SpeakerConstraints::default().validate().is_ok());
        assert!(
            SpeakerConstraints {
                num_speakers: Some(3),
                min_speakers: Some(1),
                max_speakers: Some(8),
            }
            .validate()
            .is_ok()
        );
    }

    #[test]
    fn speaker_constraints_rejections() {
        assert!(
            SpeakerConstraints {
                num_speakers: Some(2),
                min_speakers: Some(4),
                max_speakers: None,
            }
            .validate()
            .is_err()
        );
        assert!(
            SpeakerConstraints {
                num_speakers: Some(9),
                min_speakers: None,
                max_speakers: Some(8),
            }
            .validate()
            .is_err()
        );
        assert!(
            SpeakerConstraints {
                num_speakers: None,
                min_speakers: Some(5),
                max_speakers: Some(2),
            }
            .validate()
            .is_err()
        );
    }

    #[test]
    fn whisper_chunk_span_none_on_null_boundary() {
        let open_start = WhisperChunk {
            timestamp: [None, Some(2.0)],
            text: "hi".to_owned(),
        };
        let open_end = WhisperChunk {
            timestamp: [Some(1.0), None],
            text: "hi".to_owned(),
        };
        assert!(open_start.span().is_none());
        assert!(open_end.span().is_none());
    }

    #[test]
    fn whisper_chunk_span_none_on_inverted_bounds() {
        let chunk = WhisperChunk {
            timestamp: [Some(3.0), Some(1.0)],
            text: "hi".to_owned(),
        };
        assert!(chunk.span().is_none());
    }

    #[test]
    fn whisper_result_deserializes_null_timestamps() {
        let raw = r#"{"chunks": [{"text": " hi ", "timestamp": [0.0, null]}]}"#;
        let result: WhisperResult = serde_json::from_str(raw).expect("should parse");
        assert_eq!(result.chunks.len(), 1);
        assert_eq!(result.chunks[0].timestamp, [Some(0.0), None]);
    }

    #[test]
    fn diarization_result_validation() {
        let good = DiarizationResult {
            speakers: vec!["SPEAKER_00".to_owned()],
            segments: vec![DiarizationSegment {
                speaker: "SPEAKER_00".to_owned(),
                start: 0.0,
                end: 1.0,
            }],
        };
        assert!(good.validate().is_ok());

        let unknown_speaker = DiarizationResult {
            speakers: vec!["SPEAKER_00".to_owned()],
            segments: vec![DiarizationSegment {
                speaker: "SPEAKER_01".to_owned(),
                start: 0.0,
                end: 1.0,
            }],
        };
        let reason = unknown_speaker.validate().unwrap_err();
        assert!(reason.contains("SPEAKER_01"), "got: {reason}");

        let empty = DiarizationResult {
            speakers: vec![],
            segments: vec![],
        };
        assert!(empty.validate().is_err());
    }

    #[test]
    fn speaker_set_is_sorted_and_deduplicated() {
        let segments = vec![
            DiarizationSegment {
                speaker: "B".to_owned(),
                start: 0.0,
                end: 1.0,
            },
            DiarizationSegment {
                speaker: "A".to_owned(),
                start: 1.0,
                end: 2.0,
            },
            DiarizationSegment {
                speaker: "B".to_owned(),
                start: 2.0,
                end: 3.0,
            },
        ];
        assert_eq!(DiarizationResult::speaker_set(&segments), vec!["A", "B"]);
    }

    #[test]
    fn transcript_document_speakers_and_duration() {
        let doc = TranscriptDocument {
            segments: vec![
                AttributedSegment {
                    speaker: "S2".to_owned(),
                    text: "hello".to_owned(),
                    start: 0.5,
                    end: 2.0,
                },
                AttributedSegment {
                    speaker: "S1".to_owned(),
                    text: "world".to_owned(),
                    start: 2.0,
                    end: 4.5,
                },
            ],
        };
        assert_eq!(doc.speakers(), vec!["S1", "S2"]);
        assert_eq!(doc.total_duration(), 4.0);

        let empty = TranscriptDocument { segments: vec![] };
        assert_eq!(empty.total_duration(), 0.0);
        assert!(empty.speakers().is_empty());
    }

    #[test]
    fn attributed_segment_serializes_expected_shape() {
        let segment = AttributedSegment {
            speaker: "SPEAKER_00".to_owned(),
            text: "héllo".to_owned(),
            start: 0.0,
            end: 1.5,
        };
        let json = serde_json::to_string(&segment).unwrap();
        assert!(json.contains("\"speaker\""));
        assert!(json.contains("\"text\""));
        assert!(json.contains("héllo"), "non-ASCII must not be escaped: {json}");
    }
}
