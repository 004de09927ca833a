use std::sync::Arc;

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType,
    WindowFunction as SincWindow,
};
use serde::{Deserialize, Serialize};

/// Floor applied to the dB conversion. Magnitudes at or below zero clamp
/// here instead of going to negative infinity.
pub const DB_FLOOR: f32 = -80.0;

/// Shared, immutable mono audio data.
///
/// `AudioBuffer` stores its samples in an `Arc<[f32]>`, so cloning is a
/// refcount bump and the sample data itself can never be mutated after
/// construction. The decoder produces one of these per loaded file and the
/// session replaces it wholesale on the next load.
///
/// # Examples
///
/// ```
/// use spectra_audio::AudioBuffer;
///
/// let audio = AudioBuffer::new(vec![0.0, 0.5, 1.0, 0.5], 44100);
/// assert_eq!(audio.len(), 4);
/// assert_eq!(audio.sample_rate(), 44100);
///
/// // Clone is cheap - just bumps the refcount
/// let audio2 = audio.clone();
/// assert_eq!(audio2.samples()[2], 1.0);
/// ```
#[derive(Clone)]
pub struct AudioBuffer {
    samples: Arc<[f32]>,
    sample_rate: u32,
}

impl AudioBuffer {
    /// Create a new `AudioBuffer` from owned mono samples.
    ///
    /// # Panics
    ///
    /// Panics if `sample_rate` is 0.
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        assert!(sample_rate > 0, "sample_rate must be greater than 0");
        Self {
            samples: Arc::from(samples),
            sample_rate,
        }
    }

    /// Get a slice of all samples.
    #[inline]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Get the sample rate in Hz.
    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Get the number of samples.
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if the buffer holds no samples.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Get the duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Resample this audio to a target sample rate.
    ///
    /// If the audio is already at the target rate, returns a clone (cheap
    /// refcount bump). Otherwise, performs high-quality sinc interpolation
    /// resampling.
    ///
    /// # Errors
    ///
    /// Returns an error if resampling fails (e.g., invalid parameters).
    pub fn resample(&self, target_sample_rate: u32) -> anyhow::Result<Self> {
        if self.sample_rate == target_sample_rate {
            return Ok(self.clone());
        }

        let input_frames = self.samples.len();
        let resample_ratio = target_sample_rate as f64 / self.sample_rate as f64;

        let params = SincInterpolationParameters {
            sinc_len: 256,
            f_cutoff: 0.95,
            interpolation: SincInterpolationType::Linear,
            oversampling_factor: 256,
            window: SincWindow::BlackmanHarris2,
        };

        let mut resampler = SincFixedIn::<f32>::new(resample_ratio, 2.0, params, input_frames, 1)?;

        let input = vec![self.samples.to_vec()];
        let mut output = resampler.process(&input, None)?;

        Ok(Self::new(output.remove(0), target_sample_rate))
    }
}

impl std::fmt::Debug for AudioBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioBuffer")
            .field("len", &self.len())
            .field("sample_rate", &self.sample_rate)
            .field("duration_secs", &self.duration_secs())
            .finish()
    }
}

/// Analysis window applied to each STFT frame before the transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WindowKind {
    #[default]
    Hann,
    Hamming,
    Rectangular,
}

impl WindowKind {
    /// Window coefficients for a frame of `size` samples.
    pub fn coefficients(&self, size: usize) -> Vec<f32> {
        let n = (size.max(2) - 1) as f32;
        match self {
            WindowKind::Hann => (0..size)
                .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / n).cos()))
                .collect(),
            WindowKind::Hamming => (0..size)
                .map(|i| 0.54 - 0.46 * (2.0 * std::f32::consts::PI * i as f32 / n).cos())
                .collect(),
            WindowKind::Rectangular => vec![1.0; size],
        }
    }
}

/// STFT analysis settings.
///
/// `window_size` trades frequency resolution against time resolution;
/// `hop_size` sets the advance between consecutive frames (overlap =
/// `window_size - hop_size`). Defaults are 2048-sample Hann windows
/// advancing by 512 samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StftConfig {
    pub window_size: usize,
    pub hop_size: usize,
    pub window: WindowKind,
}

impl Default for StftConfig {
    fn default() -> Self {
        Self {
            window_size: 2048,
            hop_size: 512,
            window: WindowKind::Hann,
        }
    }
}

impl StftConfig {
    /// Number of frequency bins a transform with this window produces.
    pub fn num_bins(&self) -> usize {
        self.window_size / 2 + 1
    }
}

/// A dB-scaled magnitude spectrogram.
///
/// Values are stored row-major, one row per frequency bin, one column per
/// time frame. All values are relative dB: the global peak is exactly 0 dB
/// and everything else is negative, clamped at [`DB_FLOOR`]. The config and
/// sample rate the matrix was computed with travel along so axis positions
/// can be recovered.
#[derive(Clone, PartialEq)]
pub struct Spectrogram {
    values: Vec<f32>,
    num_bins: usize,
    num_frames: usize,
    sample_rate: u32,
    config: StftConfig,
}

impl Spectrogram {
    /// Build a spectrogram from row-major dB values.
    ///
    /// # Panics
    ///
    /// Panics if `values.len() != num_bins * num_frames`.
    pub fn from_values(
        values: Vec<f32>,
        num_bins: usize,
        num_frames: usize,
        sample_rate: u32,
        config: StftConfig,
    ) -> Self {
        assert_eq!(
            values.len(),
            num_bins * num_frames,
            "values.len() must equal num_bins * num_frames"
        );
        Self {
            values,
            num_bins,
            num_frames,
            sample_rate,
            config,
        }
    }

    /// dB value at (frequency bin, time frame).
    #[inline]
    pub fn value(&self, bin: usize, frame: usize) -> f32 {
        self.values[bin * self.num_frames + frame]
    }

    /// All values, bin-major.
    #[inline]
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    #[inline]
    pub fn num_bins(&self) -> usize {
        self.num_bins
    }

    #[inline]
    pub fn num_frames(&self) -> usize {
        self.num_frames
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[inline]
    pub fn config(&self) -> &StftConfig {
        &self.config
    }

    /// Center frequency of a bin in Hz: `bin * sample_rate / window_size`.
    pub fn bin_frequency(&self, bin: usize) -> f32 {
        bin as f32 * self.sample_rate as f32 / self.config.window_size as f32
    }

    /// Start time of a frame in seconds: `frame * hop_size / sample_rate`.
    pub fn frame_time(&self, frame: usize) -> f32 {
        frame as f32 * self.config.hop_size as f32 / self.sample_rate as f32
    }

    /// Time span covered by the frames, in seconds.
    pub fn duration_secs(&self) -> f32 {
        self.num_frames as f32 * self.config.hop_size as f32 / self.sample_rate as f32
    }

    /// Nyquist frequency of the analyzed audio.
    pub fn max_frequency(&self) -> f32 {
        self.sample_rate as f32 / 2.0
    }

    /// Largest value in the matrix, or `None` if the matrix is empty.
    pub fn max_value(&self) -> Option<f32> {
        self.values.iter().copied().reduce(f32::max)
    }
}

impl std::fmt::Debug for Spectrogram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Spectrogram")
            .field("num_bins", &self.num_bins)
            .field("num_frames", &self.num_frames)
            .field("sample_rate", &self.sample_rate)
            .field("config", &self.config)
            .finish()
    }
}
