//! # Artifact Spool
//!
//! The transcription service takes a file upload, so each assembled container
//! is written to a temporary `.wav` file for the duration of the
//! transcription call.
//!
//! ## Lifetime:
//! [`ArtifactFile`] owns a `tempfile::NamedTempFile`. The file is deleted
//! either explicitly through [`ArtifactFile::release`] (which reports removal
//! errors) or implicitly when the value is dropped. Dropping covers every
//! early return and the cancellation of an in-flight transcription, so no
//! path can leave a stray file behind.

use crate::audio::container::AudioArtifact;
use std::io::{self, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// An audio container staged on disk.
#[derive(Debug)]
pub struct ArtifactFile {
    file: NamedTempFile,
    artifact: AudioArtifact,
}

impl ArtifactFile {
    /// Write `artifact` into a fresh temporary file inside `dir`.
    ///
    /// The artifact is moved in: once staged it belongs to the spool and is
    /// handed to the transcriber from here.
    pub fn stage(artifact: AudioArtifact, dir: &Path) -> io::Result<Self> {
        let mut file = tempfile::Builder::new()
            .prefix("utterance-")
            .suffix(".wav")
            .tempfile_in(dir)?;
        file.write_all(artifact.as_bytes())?;
        file.flush()?;
        Ok(Self { file, artifact })
    }

    /// Location of the staged `.wav` file.
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn artifact(&self) -> &AudioArtifact {
        &self.artifact
    }

    /// Delete the file now and report whether that worked.
    pub fn release(self) -> io::Result<()> {
        self.file.close()
    }
}
