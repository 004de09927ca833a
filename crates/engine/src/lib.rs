use basedrop::{Collector, Handle, Shared};
use cpal::{
    FromSample, SizedSample,
    traits::{DeviceTrait, HostTrait, StreamTrait},
};
use spectra_audio::AudioBuffer;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("no audio output device found")]
    NoOutputDevice,

    #[error("failed to query output device config: {0}")]
    DeviceConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("unsupported output sample format '{0}'")]
    UnsupportedFormat(cpal::SampleFormat),

    #[error("failed to build output stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start output stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("resampling to device rate failed: {0}")]
    Resample(anyhow::Error),

    #[error("playback command queue is full")]
    Busy,
}

/// Mono samples already converted to the device sample rate. Shared with
/// the audio callback through basedrop so the callback never frees memory.
pub struct PlaybackClip {
    samples: Vec<f32>,
}

enum Command {
    Play(Shared<PlaybackClip>),
    Stop,
}

/// Handle to the running output stream. Playback commands are
/// fire-and-forget: the analysis side never waits on the audio thread and
/// shares no mutable state with it.
pub struct PlaybackHandle {
    commands: rtrb::Producer<Command>,
    collector: Collector,
    handle: Handle,
    sample_rate: u32,
    _stream: cpal::Stream,
}

impl PlaybackHandle {
    /// Queue `audio` for playback from the start, replacing whatever is
    /// currently playing. Resamples to the device rate if needed.
    pub fn play(&mut self, audio: &AudioBuffer) -> Result<(), TransportError> {
        let resampled = audio
            .resample(self.sample_rate)
            .map_err(TransportError::Resample)?;

        let clip = Shared::new(
            &self.handle,
            PlaybackClip {
                samples: resampled.samples().to_vec(),
            },
        );

        // Reclaim clips the audio thread has released
        self.collector.collect();

        self.commands
            .push(Command::Play(clip))
            .map_err(|_| TransportError::Busy)?;
        log::info!("playback started ({:.1}s)", audio.duration_secs());
        Ok(())
    }

    /// Stop playback immediately.
    pub fn stop(&mut self) -> Result<(), TransportError> {
        self.collector.collect();
        self.commands
            .push(Command::Stop)
            .map_err(|_| TransportError::Busy)?;
        log::info!("playback stopped");
        Ok(())
    }

    /// Sample rate the output device runs at.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

/// Open the default output device and start a silent stream waiting for
/// playback commands.
pub fn start() -> Result<PlaybackHandle, TransportError> {
    let collector = Collector::new();
    let handle = collector.handle();

    let (command_tx, command_rx) = rtrb::RingBuffer::<Command>::new(16);

    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or(TransportError::NoOutputDevice)?;

    let config = device.default_output_config()?;
    let sample_rate = config.sample_rate().0;

    let stream = match config.sample_format() {
        cpal::SampleFormat::F32 => {
            build_stream::<f32>(&device, &config.into(), command_rx)?
        }
        sample_format => return Err(TransportError::UnsupportedFormat(sample_format)),
    };

    stream.play()?;

    log::info!("playback engine running at {} Hz", sample_rate);

    Ok(PlaybackHandle {
        commands: command_tx,
        collector,
        handle,
        sample_rate,
        _stream: stream,
    })
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut command_rx: rtrb::Consumer<Command>,
) -> Result<cpal::Stream, TransportError>
where
    T: SizedSample + FromSample<f32>,
{
    let output_channels = config.channels as usize;

    let mut current: Option<Shared<PlaybackClip>> = None;
    let mut position: usize = 0;

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            while let Ok(cmd) = command_rx.pop() {
                match cmd {
                    Command::Play(clip) => {
                        current = Some(clip);
                        position = 0;
                    }
                    Command::Stop => {
                        // Dropping the Shared here defers the free to the collector
                        current = None;
                        position = 0;
                    }
                }
            }

            for frame in data.chunks_mut(output_channels) {
                let sample = match &current {
                    Some(clip) if position < clip.samples.len() => {
                        let s = clip.samples[position];
                        position += 1;
                        s
                    }
                    _ => 0.0,
                };
                // Mono clip fanned out to every output channel
                for out in frame.iter_mut() {
                    *out = T::from_sample(sample);
                }
            }

            if let Some(clip) = &current {
                if position >= clip.samples.len() {
                    current = None;
                    position = 0;
                }
            }
        },
        |err| log::error!("output stream error: {err}"),
        None,
    )?;

    Ok(stream)
}
