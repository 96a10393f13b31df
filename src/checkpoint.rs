//! Output-directory layout, atomic JSON artifacts and resume checks.
//!
//! Artifact existence is the only resumability signal: a step is skipped iff
//! its checkpoint file is already on disk. JSON artifacts are written
//! atomically (temp file + rename in the same directory) so a crashed run
//! cannot leave a half-written JSON checkpoint behind.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{PipeError, PipeResult};
use crate::model::{DiarizationResult, TranscriptDocument, WhisperResult};

/// Well-known artifact paths within one run's output directory. Only one run
/// may use a given directory at a time; this is assumed, not enforced.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ensure_root(&self) -> PipeResult<()> {
        fs::create_dir_all(&self.root)?;
        Ok(())
    }

    /// Separation checkpoint: recombined vocal stem.
    #[must_use]
    pub fn vocals(&self) -> PathBuf {
        self.root.join("combined_vocals.wav")
    }

    /// Best-effort companion artifact: recombined background stem.
    #[must_use]
    pub fn background(&self) -> PathBuf {
        self.root.join("combined_background.wav")
    }

    /// Scratch directory the separation collaborator writes stems into.
    #[must_use]
    pub fn separated_dir(&self) -> PathBuf {
        self.root.join("separated")
    }

    /// Diarization checkpoint.
    #[must_use]
    pub fn diarization(&self) -> PathBuf {
        self.root.join("combined_vocals_diarized.json")
    }

    /// Transcription checkpoint.
    #[must_use]
    pub fn transcription(&self) -> PathBuf {
        self.root.join("complete_whisper_transcription.json")
    }

    /// Final speaker-attributed transcript.
    #[must_use]
    pub fn transcript(&self) -> PathBuf {
        self.root.join("final_transcription.json")
    }

    /// Consolidated (speaker-turn) transcript.
    #[must_use]
    pub fn consolidated(&self) -> PathBuf {
        self.root.join("final_transcription_consolidated.json")
    }

    /// Chopped-mode chunk WAVs and per-chunk work directories.
    #[must_use]
    pub fn chunks_dir(&self) -> PathBuf {
        self.root.join("chunks")
    }

    /// Work directory for one chunk's own sub-pipeline artifacts.
    #[must_use]
    pub fn chunk_work_dir(&self, index: usize) -> PathBuf {
        self.chunks_dir().join(format!("chunk_{index:03}"))
    }
}

/// Serialize `value` as pretty JSON (2-space indent, UTF-8, non-ASCII
/// preserved) and move it into place atomically.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> PipeResult<()> {
    let rendered = serde_json::to_string_pretty(value)?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, rendered)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

pub fn load_diarization(path: &Path) -> PipeResult<DiarizationResult> {
    let result: DiarizationResult = load_json(path)?;
    result
        .validate()
        .map_err(|reason| PipeError::artifact_parse(path, reason))?;
    Ok(result)
}

pub fn load_transcription(path: &Path) -> PipeResult<WhisperResult> {
    load_json(path)
}

pub fn load_transcript(path: &Path) -> PipeResult<TranscriptDocument> {
    load_json(path)
}

fn load_json<T: serde::de::DeserializeOwned>(path: &Path) -> PipeResult<T> {
    if !path.exists() {
        return Err(PipeError::MissingArtifact(path.to_path_buf()));
    }
    let raw = fs::read_to_string(path)?;
    serde_json::from_str(&raw).map_err(|error| PipeError::artifact_parse(path, error.to_string()))
}
