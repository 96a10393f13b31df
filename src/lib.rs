#![forbid(unsafe_code)]

pub mod attribute;
pub mod audio;
pub mod checkpoint;
pub mod chunker;
pub mod cli;
pub mod error;
pub mod interval;
pub mod logging;
pub mod merge;
pub mod model;
pub mod orchestrator;
pub mod process;
pub mod progress;
pub mod reassemble;
pub mod stages;

pub use error::{PipeError, PipeResult};
pub use model::{
    AttributedSegment, AudioChunk, DiarizationResult, DiarizationSegment, TimeSpan,
    TranscriptDocument, WhisperChunk, WhisperResult,
};
pub use orchestrator::{Pipeline, PipelineConfig, PipelineState, RunSummary};
