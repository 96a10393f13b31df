use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::model::{PipelineStep, SpeakerConstraints};
use crate::orchestrator::PipelineConfig;

#[derive(Debug, Parser)]
#[command(name = "audiopipe")]
#[command(about = "Speaker-attributed transcription pipeline (separation + diarization + Whisper)")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the full pipeline on an audio file.
    Run(RunArgs),
    /// Consolidate an existing transcript into speaker turns.
    Consolidate(ConsolidateArgs),
}

#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// Path to input audio file.
    pub input_audio: PathBuf,

    /// Exact number of speakers, if known.
    #[arg(long, short = 'n')]
    pub num_speakers: Option<u32>,

    /// Minimum number of speakers.
    #[arg(long)]
    pub min_speakers: Option<u32>,

    /// Maximum number of speakers.
    #[arg(long)]
    pub max_speakers: Option<u32>,

    /// Language code for transcription (e.g. "en", "es", "fr").
    #[arg(long, short)]
    pub language: Option<String>,

    /// Device identifier passed through to the collaborators.
    #[arg(long, short)]
    pub device: Option<String>,

    /// Step to start from; earlier steps must have their checkpoint
    /// artifacts on disk.
    #[arg(long, short = 's', value_enum, default_value_t = PipelineStep::Separation)]
    pub start_step: PipelineStep,

    /// Split the input into bounded chunks processed independently.
    #[arg(long, short)]
    pub chop: bool,

    /// Chunk duration in seconds (chopped mode).
    #[arg(long, default_value_t = 900.0)]
    pub chunk_duration: f64,

    /// Directory for checkpoints and final artifacts.
    #[arg(long, default_value = "output")]
    pub output_dir: PathBuf,

    /// Max silence inside one diarized speaker turn, seconds.
    #[arg(long, default_value_t = 2.0)]
    pub merge_gap: f64,

    /// Max gap when consolidating same-speaker utterances, seconds.
    #[arg(long, default_value_t = 3.0)]
    pub consolidate_gap: f64,
}

impl RunArgs {
    #[must_use]
    pub fn to_config(&self) -> PipelineConfig {
        let mut config = PipelineConfig::new(&self.input_audio, &self.output_dir);
        config.speakers = SpeakerConstraints {
            num_speakers: self.num_speakers,
            min_speakers: self.min_speakers,
            max_speakers: self.max_speakers,
        };
        config.language = self.language.clone();
        config.device = self.device.clone();
        config.start_step = self.start_step;
        config.chop = self.chop;
        config.chunk_duration = self.chunk_duration;
        config.merge_gap = self.merge_gap;
        config.consolidate_gap = self.consolidate_gap;
        config
    }
}

#[derive(Debug, Clone, Args)]
pub struct ConsolidateArgs {
    /// Path to an existing transcript artifact.
    #[arg(default_value = "output/final_transcription.json")]
    pub input: PathBuf,

    /// Output path; defaults to `<input stem>_consolidated.json` next to the
    /// input.
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// Maximum gap between segments to consolidate, seconds.
    #[arg(long, short = 'g', default_value_t = 3.0)]
    pub max_gap: f64,
}

impl ConsolidateArgs {
    #[must_use]
    pub fn output_path(&self) -> PathBuf {
        if let Some(output) = &self.output {
            return output.clone();
        }
        let stem = self
            .input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "transcript".to_owned());
        let extension = self
            .input
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_else(|| "json".to_owned());
        let parent = self.input.parent().unwrap_or(std::path::Path::new("."));
        parent.join(format!("{stem}_consolidated.{extension}"))
    }
}
