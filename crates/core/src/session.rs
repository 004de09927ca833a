use std::path::{Path, PathBuf};

use spectra_audio::{AudioBuffer, Spectrogram, StftConfig};
use spectra_decode::{decode_file, DecodeError};
use spectra_render::{render, RenderError, RenderOptions, RenderedImage};
use spectra_spectrogram::{analyze, AnalysisError};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("no audio loaded")]
    NothingLoaded,
}

/// What the session currently holds. A successful `load` goes straight to
/// `Analyzed`; there is no observable audio-without-spectrogram state.
#[derive(Debug)]
pub enum SessionState {
    Empty,
    Analyzed {
        path: PathBuf,
        audio: AudioBuffer,
        spectrogram: Spectrogram,
    },
}

/// Owner of the currently loaded audio and its spectrogram.
///
/// `load` decodes and analyzes into locals and installs the new state with
/// a single assignment; exclusive access is enforced by `&mut self`, so the
/// audio/spectrogram pair is never observed half-replaced. Any failure
/// leaves the previous state untouched.
pub struct Session {
    config: StftConfig,
    state: SessionState,
}

impl Session {
    pub fn new(config: StftConfig) -> Self {
        Self {
            config,
            state: SessionState::Empty,
        }
    }

    /// Decode `path` and compute its spectrogram, replacing the current
    /// state on success.
    pub fn load(&mut self, path: &Path) -> Result<(), SessionError> {
        let audio = decode_file(path)?;
        let spectrogram = analyze(&audio, &self.config)?;

        self.state = SessionState::Analyzed {
            path: path.to_path_buf(),
            audio,
            spectrogram,
        };

        log::info!("session loaded '{}'", path.display());
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.state, SessionState::Empty)
    }

    /// Clear the loaded audio and spectrogram.
    pub fn clear(&mut self) {
        self.state = SessionState::Empty;
    }

    pub fn current_audio(&self) -> Option<&AudioBuffer> {
        match &self.state {
            SessionState::Analyzed { audio, .. } => Some(audio),
            SessionState::Empty => None,
        }
    }

    pub fn current_spectrogram(&self) -> Option<&Spectrogram> {
        match &self.state {
            SessionState::Analyzed { spectrogram, .. } => Some(spectrogram),
            SessionState::Empty => None,
        }
    }

    pub fn current_audio_path(&self) -> Option<&Path> {
        match &self.state {
            SessionState::Analyzed { path, .. } => Some(path),
            SessionState::Empty => None,
        }
    }

    pub fn config(&self) -> &StftConfig {
        &self.config
    }

    /// Replace the analysis settings. Takes effect on the next `load`.
    pub fn set_config(&mut self, config: StftConfig) {
        self.config = config;
    }

    /// Render the current spectrogram, titled with the loaded file's name.
    pub fn render_current(&self, options: &RenderOptions) -> Result<RenderedImage, SessionError> {
        let SessionState::Analyzed {
            path, spectrogram, ..
        } = &self.state
        else {
            return Err(SessionError::NothingLoaded);
        };

        let title = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "Audio Spectrogram".to_string());

        Ok(render(spectrogram, &title, options)?)
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(StftConfig::default())
    }
}
