pub mod session;

pub use session::{Session, SessionError, SessionState};

pub use spectra_audio::{AudioBuffer, Spectrogram, StftConfig, WindowKind, DB_FLOOR};
pub use spectra_decode::{decode_file, DecodeError};
pub use spectra_render::{export, render, RenderError, RenderOptions, RenderedImage};
pub use spectra_spectrogram::{analyze, AnalysisError};
