use std::error::Error;
use std::f64::consts::TAU;
use std::fs;
use std::path::Path;

use ndarray::Array2;
use rhd2ns::{
    Converter, PositionResampler, RecordingDecoder, RecordingDescriptor, SampleMatrix,
};
use tempfile::TempDir;

/// Stand-in decoder that ignores the file content and fabricates a short
/// recording: four sine-wave amplifier channels and one blinking digital
/// input, two seconds at 20 kHz.
struct SyntheticDecoder;

impl RecordingDecoder for SyntheticDecoder {
    fn decode(&self, _path: &Path) -> Result<RecordingDescriptor, rhd2ns::DecodeError> {
        let rate = 20000.0;
        let samples = 2 * rate as usize;

        let amp = Array2::from_shape_fn((4, samples), |(ch, s)| {
            let hz = 8.0 * (ch + 1) as f64;
            let phase = TAU * hz * s as f64 / rate;
            (phase.sin() * 3000.0) as i16
        });
        let dig = Array2::from_shape_fn((1, samples), |(_, s)| ((s / 2000) % 2) as i16);

        Ok(RecordingDescriptor {
            amplifier_channels: (0..4).map(|i| format!("A-{:03}", i)).collect(),
            board_dig_in_channels: vec!["DIN-00".to_string()],
            amplifier_sample_rate: rate,
            amplifier_data: SampleMatrix::Int16(amp),
            board_dig_in_data: Some(SampleMatrix::Int16(dig)),
        })
    }
}

/// No position tracking in this demo.
struct NoPositions;

impl PositionResampler for NoPositions {
    fn resample(
        &self,
        _csv_path: &Path,
        _out_path: &Path,
        _rate_hz: u32,
    ) -> Result<(), rhd2ns::ResampleError> {
        Err("this demo records no positions".into())
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    // The decoder above never reads this file, but the converter derives
    // the artifact names from it
    let workdir = TempDir::new()?;
    let rhd_path = workdir.path().join("demo_session.rhd");
    fs::write(&rhd_path, b"")?;

    let converter = Converter::new(SyntheticDecoder, NoPositions);
    let dat_path = converter.convert_file(&rhd_path, false)?;

    println!("Artifacts in {}:", dat_path.parent().unwrap().display());
    for ext in ["dat", "xml", "nrs"] {
        let path = dat_path.with_extension(ext);
        let size = fs::metadata(&path)?.len();
        println!("  {} ({} bytes)", path.file_name().unwrap().to_string_lossy(), size);
    }

    // Converting again without override is a no-op
    let again = converter.convert_file(&rhd_path, false)?;
    println!("\nSecond run returned the existing {}", again.display());

    println!("\nParameter document:");
    let xml = fs::read_to_string(dat_path.with_extension("xml"))?;
    for line in xml.lines().take(16) {
        println!("  {}", line);
    }
    println!("  ...");

    Ok(())
}
