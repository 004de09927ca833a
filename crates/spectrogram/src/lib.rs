use rustfft::{num_complex::Complex, FftPlanner};
use spectra_audio::{AudioBuffer, Spectrogram, StftConfig, DB_FLOOR};

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("invalid analysis config: {0}")]
    InvalidConfig(String),

    #[error("signal is empty or silent")]
    EmptySignal,

    #[error("signal too short for analysis: {len} samples, window is {window_size}")]
    TooShort { len: usize, window_size: usize },

    #[error("signal contains non-finite samples")]
    NonFinite,
}

/// Compute a dB-scaled magnitude spectrogram of `buffer`.
///
/// Frames of `window_size` samples are taken every `hop_size` samples
/// (only full windows; the frame count for `n` samples is
/// `(n - window_size) / hop_size + 1`), windowed, and run through a
/// forward FFT. Magnitudes are converted to decibels relative to the
/// global peak, `20 * log10(mag / max_mag)`, so the loudest cell is
/// exactly 0 dB; silent cells clamp at [`DB_FLOOR`] instead of minus
/// infinity.
///
/// The frame loop and the peak reduction are sequential, so identical
/// input and config produce a bit-identical matrix.
pub fn analyze(buffer: &AudioBuffer, config: &StftConfig) -> Result<Spectrogram, AnalysisError> {
    let window_size = config.window_size;
    let hop_size = config.hop_size;

    if window_size < 2 || hop_size == 0 {
        return Err(AnalysisError::InvalidConfig(format!(
            "window_size={window_size}, hop_size={hop_size}"
        )));
    }
    if hop_size > window_size {
        return Err(AnalysisError::InvalidConfig(format!(
            "hop_size {hop_size} exceeds window_size {window_size}"
        )));
    }

    let samples = buffer.samples();
    if samples.is_empty() {
        return Err(AnalysisError::EmptySignal);
    }
    if samples.iter().any(|s| !s.is_finite()) {
        return Err(AnalysisError::NonFinite);
    }
    if samples.len() < window_size {
        return Err(AnalysisError::TooShort {
            len: samples.len(),
            window_size,
        });
    }

    let num_frames = (samples.len() - window_size) / hop_size + 1;
    let num_bins = config.num_bins();

    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(window_size);
    let window = config.window.coefficients(window_size);

    // Magnitudes, bin-major to match the Spectrogram layout
    let mut magnitudes = vec![0.0f32; num_bins * num_frames];
    let mut fft_buffer: Vec<Complex<f32>> = vec![Complex::new(0.0, 0.0); window_size];
    let mut max_magnitude = 0.0f32;

    for frame in 0..num_frames {
        let start = frame * hop_size;
        for (i, value) in fft_buffer.iter_mut().enumerate() {
            *value = Complex::new(samples[start + i] * window[i], 0.0);
        }
        fft.process(&mut fft_buffer);

        for (bin, value) in fft_buffer[..num_bins].iter().enumerate() {
            let magnitude = value.norm();
            magnitudes[bin * num_frames + frame] = magnitude;
            max_magnitude = max_magnitude.max(magnitude);
        }
    }

    // A signal that is silent everywhere the frames reached has no usable
    // reference peak
    if max_magnitude <= 0.0 {
        return Err(AnalysisError::EmptySignal);
    }

    let values: Vec<f32> = magnitudes
        .iter()
        .map(|&magnitude| (20.0 * (magnitude / max_magnitude).log10()).max(DB_FLOOR))
        .collect();

    log::debug!(
        "analyzed {} samples: {} bins x {} frames, window={}, hop={}",
        samples.len(),
        num_bins,
        num_frames,
        window_size,
        hop_size
    );

    Ok(Spectrogram::from_values(
        values,
        num_bins,
        num_frames,
        buffer.sample_rate(),
        *config,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use spectra_audio::WindowKind;

    fn sine(freq: f32, sample_rate: u32, len: usize) -> AudioBuffer {
        let samples = (0..len)
            .map(|i| {
                let t = i as f32 / sample_rate as f32;
                (2.0 * std::f32::consts::PI * freq * t).sin()
            })
            .collect();
        AudioBuffer::new(samples, sample_rate)
    }

    #[test]
    fn test_matrix_shape() {
        let audio = sine(440.0, 44100, 44100);
        let spec = analyze(&audio, &StftConfig::default()).expect("analyze");
        assert_eq!(spec.num_bins(), 1025);
        // (44100 - 2048) / 512 + 1
        assert_eq!(spec.num_frames(), 83);
    }

    #[test]
    fn test_peak_is_exactly_zero_db() {
        let audio = sine(440.0, 44100, 44100);
        let spec = analyze(&audio, &StftConfig::default()).expect("analyze");
        assert_eq!(spec.max_value(), Some(0.0));
    }

    #[test]
    fn test_values_clamped_and_finite() {
        let audio = sine(440.0, 44100, 44100);
        let spec = analyze(&audio, &StftConfig::default()).expect("analyze");
        assert!(spec
            .values()
            .iter()
            .all(|v| v.is_finite() && *v >= DB_FLOOR && *v <= 0.0));
    }

    #[test]
    fn test_sine_peak_lands_in_expected_bins() {
        // 440 Hz at window 2048 / 44100 Hz: bin resolution ~21.5 Hz
        let audio = sine(440.0, 44100, 44100);
        let spec = analyze(&audio, &StftConfig::default()).expect("analyze");

        for frame in 0..spec.num_frames() {
            let argmax = (0..spec.num_bins())
                .max_by(|&a, &b| {
                    spec.value(a, frame)
                        .partial_cmp(&spec.value(b, frame))
                        .unwrap()
                })
                .unwrap();
            let freq = spec.bin_frequency(argmax);
            assert!(
                (420.0..=460.0).contains(&freq),
                "frame {frame}: peak at {freq} Hz"
            );
        }
    }

    #[test]
    fn test_deterministic() {
        let audio = sine(440.0, 44100, 22050);
        let config = StftConfig::default();
        let a = analyze(&audio, &config).expect("analyze");
        let b = analyze(&audio, &config).expect("analyze");
        assert_eq!(a.values(), b.values());
    }

    #[test]
    fn test_empty_signal_rejected() {
        let audio = AudioBuffer::new(Vec::new(), 44100);
        assert!(matches!(
            analyze(&audio, &StftConfig::default()),
            Err(AnalysisError::EmptySignal)
        ));
    }

    #[test]
    fn test_silent_signal_rejected() {
        let audio = AudioBuffer::new(vec![0.0; 44100], 44100);
        assert!(matches!(
            analyze(&audio, &StftConfig::default()),
            Err(AnalysisError::EmptySignal)
        ));
    }

    #[test]
    fn test_non_finite_signal_rejected() {
        let mut samples = vec![0.1; 4096];
        samples[100] = f32::NAN;
        let audio = AudioBuffer::new(samples, 44100);
        assert!(matches!(
            analyze(&audio, &StftConfig::default()),
            Err(AnalysisError::NonFinite)
        ));
    }

    #[test]
    fn test_short_signal_rejected() {
        let audio = sine(440.0, 44100, 1024);
        assert!(matches!(
            analyze(&audio, &StftConfig::default()),
            Err(AnalysisError::TooShort { len: 1024, .. })
        ));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let audio = sine(440.0, 44100, 4096);
        let zero_hop = StftConfig {
            hop_size: 0,
            ..Default::default()
        };
        assert!(matches!(
            analyze(&audio, &zero_hop),
            Err(AnalysisError::InvalidConfig(_))
        ));

        let gapped = StftConfig {
            window_size: 512,
            hop_size: 1024,
            ..Default::default()
        };
        assert!(matches!(
            analyze(&audio, &gapped),
            Err(AnalysisError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_rectangular_window_dc_peaks_at_bin_zero() {
        let audio = AudioBuffer::new(vec![0.8; 8192], 44100);
        let config = StftConfig {
            window: WindowKind::Rectangular,
            ..Default::default()
        };
        let spec = analyze(&audio, &config).expect("analyze");
        // A constant signal concentrates all energy at DC
        assert_eq!(spec.value(0, 0), 0.0);
        assert!(spec.value(100, 0) < -40.0);
    }

    #[test]
    fn test_custom_hop_changes_frame_count() {
        let audio = sine(440.0, 44100, 44100);
        let config = StftConfig {
            hop_size: 1024,
            ..Default::default()
        };
        let spec = analyze(&audio, &config).expect("analyze");
        assert_eq!(spec.num_frames(), (44100 - 2048) / 1024 + 1);
    }
}
