//! The job request written by the host GUI before the worker is invoked.

use std::path::{Path, PathBuf};

use crate::error::{WorkerError, WorkerResult};
use crate::extstate::{keys, ExtState, SECTION};

/// Output sample bit-width forwarded to the mastering tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitDepth {
    Pcm16,
    Pcm24,
    Pcm32,
}

impl BitDepth {
    /// Command-line flag understood by the mastering CLI.
    pub fn flag(self) -> &'static str {
        match self {
            BitDepth::Pcm16 => "-b16",
            BitDepth::Pcm24 => "-b24",
            BitDepth::Pcm32 => "-b32",
        }
    }

    /// Lenient parse of the value stored by the host GUI. Unknown or empty
    /// values fall back to 24-bit, matching the host's own default.
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "-b16" | "16" => BitDepth::Pcm16,
            "-b32" | "32" => BitDepth::Pcm32,
            _ => BitDepth::Pcm24,
        }
    }
}

/// A mastering job: read once from the store at submit, immutable thereafter.
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub target: PathBuf,
    pub reference: PathBuf,
    /// Display name of the reference, used for the output filename. May be a
    /// full path; only its stem is used.
    pub reference_name: String,
    pub bit_depth: BitDepth,
}

impl JobRequest {
    /// Reject requests the mastering tool cannot process. Checked before any
    /// filesystem or process work happens.
    pub fn validate(&self) -> WorkerResult<()> {
        if self.target.as_os_str().is_empty() || self.reference.as_os_str().is_empty() {
            return Err(WorkerError::InvalidInput(
                "received invalid paths from the host".to_string(),
            ));
        }
        if is_lossy(&self.target) || is_lossy(&self.reference) {
            return Err(WorkerError::InvalidInput(
                ".mp3 files are not supported. Use .wav or .flac.".to_string(),
            ));
        }
        Ok(())
    }

    /// Output filename derived from the sanitized stems of both inputs.
    pub fn output_file_name(&self) -> String {
        let target_stem = sanitize_component(file_stem(&self.target));
        let reference_stem = sanitize_component(file_stem(Path::new(&self.reference_name)));
        format!("{target_stem}_mastered_REF_{reference_stem}.wav")
    }
}

/// Read the job request the host wrote before invoking the worker.
pub async fn load_request(store: &dyn ExtState) -> WorkerResult<JobRequest> {
    let target = store.get(SECTION, keys::TARGET).await?.unwrap_or_default();
    let reference = store.get(SECTION, keys::REFERENCE).await?.unwrap_or_default();
    let mut reference_name = store
        .get(SECTION, keys::REFERENCE_NAME)
        .await?
        .unwrap_or_default();
    if reference_name.is_empty() {
        reference_name = "ref".to_string();
    }
    let bit_depth = store
        .get(SECTION, keys::BIT_DEPTH)
        .await?
        .unwrap_or_default();

    Ok(JobRequest {
        target: PathBuf::from(target),
        reference: PathBuf::from(reference),
        reference_name,
        bit_depth: BitDepth::parse(&bit_depth),
    })
}

fn is_lossy(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("mp3"))
        .unwrap_or(false)
}

fn file_stem(path: &Path) -> &str {
    path.file_stem().and_then(|stem| stem.to_str()).unwrap_or("")
}

/// Strip characters that are unsafe in filenames on either platform.
fn sanitize_component(name: &str) -> String {
    name.chars()
        .filter(|c| !r#"\/*?:"<>|"#.contains(*c))
        .collect()
}
