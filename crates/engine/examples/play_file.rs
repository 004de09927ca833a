use std::path::Path;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "tone.wav".to_string());

    let audio = spectra_decode::decode_file(Path::new(&path))?;
    println!(
        "Loaded audio: {} samples, {} Hz, {:.1}s",
        audio.len(),
        audio.sample_rate(),
        audio.duration_secs()
    );

    let mut engine = spectra_engine::start()?;
    engine.play(&audio)?;

    std::thread::sleep(std::time::Duration::from_secs_f64(
        audio.duration_secs() + 0.1,
    ));

    Ok(())
}
