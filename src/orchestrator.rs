//! Pipeline orchestration: sequencing the external stages with resumability
//! and partial-failure tolerance.
//!
//! The run is a linear state machine. Single-unit mode drives one audio file
//! through separation, diarization and transcription, then fuses the
//! results. Chopped mode runs the same sub-pipeline per bounded chunk and
//! isolates each chunk's failures: a chunk that dies is logged and excluded,
//! and the run fails only when zero chunks succeed.

use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::attribute::attribute_chunks;
use crate::checkpoint::{self, OutputLayout, write_json_atomic};
use crate::chunker;
use crate::error::{PipeError, PipeResult};
use crate::interval::sort_by_start;
use crate::merge::consolidate_utterances;
use crate::model::{
    AttributedSegment, AudioChunk, DiarizationResult, PipelineStep, SpeakerConstraints,
    TranscriptDocument,
};
use crate::progress::ProgressSink;
use crate::reassemble::reassemble;
use crate::stages;

// ---------------------------------------------------------------------------
// States
// ---------------------------------------------------------------------------

/// The orchestrator's position in the run. Transitions are linear;
/// `Failed` is reachable from every state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Separating,
    Diarizing,
    Transcribing,
    Attributing,
    Consolidating,
    Done,
    Failed,
}

impl PipelineState {
    /// The state label used in events and logging.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Separating => "separating",
            Self::Diarizing => "diarizing",
            Self::Transcribing => "transcribing",
            Self::Attributing => "attributing",
            Self::Consolidating => "consolidating",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub input_audio: PathBuf,
    pub output_dir: PathBuf,
    pub speakers: SpeakerConstraints,
    pub language: Option<String>,
    pub device: Option<String>,
    pub start_step: PipelineStep,
    pub chop: bool,
    /// Chopped-mode window length in seconds.
    pub chunk_duration: f64,
    /// Max silence inside one diarized speaker turn, seconds.
    pub merge_gap: f64,
    /// Max gap when consolidating same-speaker utterances, seconds.
    pub consolidate_gap: f64,
}

impl PipelineConfig {
    /// A config with the default policy values; callers adjust fields as
    /// needed before handing it to [`Pipeline::new`].
    #[must_use]
    pub fn new(input_audio: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_audio: input_audio.into(),
            output_dir: output_dir.into(),
            speakers: SpeakerConstraints::default(),
            language: None,
            device: None,
            start_step: PipelineStep::Separation,
            chop: false,
            chunk_duration: 900.0,
            merge_gap: 2.0,
            consolidate_gap: 3.0,
        }
    }

    pub fn validate(&self) -> PipeResult<()> {
        if !self.input_audio.is_file() {
            return Err(PipeError::InvalidRequest(format!(
                "input audio does not exist: {}",
                self.input_audio.display()
            )));
        }
        self.speakers.validate().map_err(PipeError::InvalidRequest)?;
        if !self.chunk_duration.is_finite() || self.chunk_duration <= 0.0 {
            return Err(PipeError::InvalidRequest(
                "chunk duration must be positive".to_owned(),
            ));
        }
        for (name, value) in [
            ("merge gap", self.merge_gap),
            ("consolidation gap", self.consolidate_gap),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(PipeError::InvalidRequest(format!(
                    "{name} must be non-negative"
                )));
            }
        }
        if self.chop && self.start_step != PipelineStep::Separation {
            return Err(PipeError::InvalidRequest(
                "chopped mode cannot resume from a later step".to_owned(),
            ));
        }
        Ok(())
    }
}

/// What a completed run produced.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub transcript_path: PathBuf,
    pub consolidated_path: PathBuf,
    pub speakers: Vec<String>,
    pub segment_count: usize,
    pub utterance_count: usize,
    pub total_duration: f64,
    pub elapsed: Duration,
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

pub struct Pipeline<'a> {
    config: PipelineConfig,
    layout: OutputLayout,
    sink: &'a dyn ProgressSink,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: PipelineConfig, sink: &'a dyn ProgressSink) -> PipeResult<Self> {
        config.validate()?;
        let layout = OutputLayout::new(&config.output_dir);
        Ok(Self {
            config,
            layout,
            sink,
        })
    }

    /// Execute the run to completion. On a fatal error the state it occurred
    /// in is logged and the error propagates; no partial final artifact is
    /// written.
    pub fn run(&self) -> PipeResult<RunSummary> {
        let started = Instant::now();
        match self.execute(started) {
            Ok(summary) => {
                tracing::info!(
                    state = PipelineState::Done.label(),
                    segments = summary.segment_count,
                    speakers = summary.speakers.len(),
                    elapsed_s = summary.elapsed.as_secs_f64(),
                    "pipeline complete"
                );
                Ok(summary)
            }
            Err((state, error)) => {
                tracing::error!(
                    state = state.label(),
                    terminal = PipelineState::Failed.label(),
                    %error,
                    "pipeline failed"
                );
                Err(error)
            }
        }
    }

    fn execute(&self, started: Instant) -> Result<RunSummary, (PipelineState, PipeError)> {
        self.layout
            .ensure_root()
            .map_err(|e| (PipelineState::Separating, e))?;

        let segments = if self.config.chop {
            self.run_chopped()?
        } else {
            self.run_single_unit()?
        };

        let transcript = TranscriptDocument { segments };
        write_json_atomic(&self.layout.transcript(), &transcript)
            .map_err(|e| (PipelineState::Attributing, e))?;

        self.enter(PipelineState::Consolidating);
        let consolidated = TranscriptDocument {
            segments: consolidate_utterances(&transcript.segments, self.config.consolidate_gap),
        };
        write_json_atomic(&self.layout.consolidated(), &consolidated)
            .map_err(|e| (PipelineState::Consolidating, e))?;

        Ok(RunSummary {
            transcript_path: self.layout.transcript(),
            consolidated_path: self.layout.consolidated(),
            speakers: transcript.speakers(),
            segment_count: transcript.segments.len(),
            utterance_count: consolidated.segments.len(),
            total_duration: transcript.total_duration(),
            elapsed: started.elapsed(),
        })
    }

    // -- single-unit mode --

    fn run_single_unit(&self) -> Result<Vec<AttributedSegment>, (PipelineState, PipeError)> {
        self.enter(PipelineState::Separating);
        let vocals = self
            .ensure_vocals()
            .map_err(|e| (PipelineState::Separating, e))?;

        self.enter(PipelineState::Diarizing);
        let diarization = self
            .ensure_diarization(&vocals)
            .map_err(|e| (PipelineState::Diarizing, e))?;

        self.enter(PipelineState::Transcribing);
        let whisper = stages::transcribe::run(
            &vocals,
            self.config.language.as_deref(),
            self.config.device.as_deref(),
            &self.layout,
            self.sink,
        )
        .map_err(|e| (PipelineState::Transcribing, e))?;

        self.enter(PipelineState::Attributing);
        let mut segments = attribute_chunks(&whisper.chunks, &diarization.segments);
        if segments.is_empty() {
            return Err((
                PipelineState::Attributing,
                PipeError::NoViableOutput(
                    "zero segments survived speaker attribution".to_owned(),
                ),
            ));
        }
        sort_by_start(&mut segments, |segment| segment.start);
        self.sink
            .progress(&format!("mapped {} segment(s) to speakers", segments.len()));
        Ok(segments)
    }

    /// Separation checkpoint, honouring `--start-step`: the artifact's
    /// existence on disk is the only resume signal.
    fn ensure_vocals(&self) -> PipeResult<PathBuf> {
        if self.config.start_step <= PipelineStep::Separation {
            return stages::separate::run(
                &self.config.input_audio,
                self.config.device.as_deref(),
                &self.layout,
                self.sink,
            );
        }
        let vocals = self.layout.vocals();
        if vocals.exists() {
            self.sink
                .progress("reusing existing separation checkpoint");
            Ok(vocals)
        } else {
            Err(PipeError::MissingArtifact(vocals))
        }
    }

    /// Diarization checkpoint, honouring `--start-step`.
    fn ensure_diarization(&self, vocals: &std::path::Path) -> PipeResult<DiarizationResult> {
        if self.config.start_step <= PipelineStep::Diarization {
            return stages::diarize::run(
                vocals,
                &self.config.speakers,
                self.config.merge_gap,
                &self.layout,
                self.sink,
            );
        }
        self.sink
            .progress("reusing existing diarization checkpoint");
        checkpoint::load_diarization(&self.layout.diarization())
    }

    // -- chopped mode --

    fn run_chopped(&self) -> Result<Vec<AttributedSegment>, (PipelineState, PipeError)> {
        self.enter(PipelineState::Separating);
        self.sink.progress("chopping input audio");
        let chunks = chunker::chop_audio(
            &self.config.input_audio,
            self.config.chunk_duration,
            &self.layout.chunks_dir(),
        )
        .map_err(|e| (PipelineState::Separating, e))?;

        let total = chunks.len();
        let mut chunk_results = Vec::new();
        for chunk in chunks {
            self.sink
                .progress(&format!("processing chunk {}/{total}", chunk.index + 1));
            match self.process_chunk(&chunk) {
                Ok(segments) => chunk_results.push((chunk, segments)),
                Err(error) => {
                    tracing::warn!(chunk = chunk.index, %error, "chunk failed, excluding from reassembly");
                    self.sink
                        .log(&format!("chunk {} failed: {error}", chunk.index));
                }
            }
        }

        if chunk_results.is_empty() {
            return Err((
                PipelineState::Attributing,
                PipeError::NoViableOutput("no chunks were successfully processed".to_owned()),
            ));
        }

        self.enter(PipelineState::Attributing);
        let succeeded = chunk_results.len();
        let segments = reassemble(chunk_results);
        self.sink.progress(&format!(
            "merged {} segment(s) from {succeeded} chunk(s)",
            segments.len()
        ));
        Ok(segments)
    }

    /// One chunk's full sub-pipeline, in chunk-relative time. The chunk's
    /// materialized audio and work directory are discarded once its
    /// attributed segments have been extracted.
    fn process_chunk(&self, chunk: &AudioChunk) -> PipeResult<Vec<AttributedSegment>> {
        let work = OutputLayout::new(self.layout.chunk_work_dir(chunk.index));
        work.ensure_root()?;

        let vocals = stages::separate::run(
            &chunk.path,
            self.config.device.as_deref(),
            &work,
            self.sink,
        )?;
        let diarization = stages::diarize::run(
            &vocals,
            &self.config.speakers,
            self.config.merge_gap,
            &work,
            self.sink,
        )?;
        let whisper = stages::transcribe::run(
            &vocals,
            self.config.language.as_deref(),
            self.config.device.as_deref(),
            &work,
            self.sink,
        )?;

        let segments = attribute_chunks(&whisper.chunks, &diarization.segments);

        if let Err(error) = fs::remove_file(&chunk.path) {
            tracing::warn!(chunk = chunk.index, %error, "failed to remove chunk audio");
        }
        if let Err(error) = fs::remove_dir_all(work.root()) {
            tracing::warn!(chunk = chunk.index, %error, "failed to remove chunk work dir");
        }
        Ok(segments)
    }

    fn enter(&self, state: PipelineState) {
        tracing::info!(state = state.label(), "entering pipeline state");
    }
}
