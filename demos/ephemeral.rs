use std::error::Error;
use std::fs;
use std::path::Path;

use ndarray::Array2;
use rhd2ns::{
    Converter, PositionResampler, RecordingDecoder, RecordingDescriptor, SampleMatrix,
};
use tempfile::TempDir;

/// Minimal decoder producing a flat two-channel recording.
struct SyntheticDecoder;

impl RecordingDecoder for SyntheticDecoder {
    fn decode(&self, _path: &Path) -> Result<RecordingDescriptor, rhd2ns::DecodeError> {
        Ok(RecordingDescriptor {
            amplifier_channels: vec!["A-000".to_string(), "A-001".to_string()],
            board_dig_in_channels: vec![],
            amplifier_sample_rate: 20000.0,
            amplifier_data: SampleMatrix::Int16(Array2::zeros((2, 20000))),
            board_dig_in_data: None,
        })
    }
}

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

    let workdir = TempDir::new()?;
    let rhd_path = workdir.path().join("quick_look.rhd");
    fs::write(&rhd_path, b"")?;

    let converter = Converter::new(SyntheticDecoder, NoPositions);

    // The artifacts live only for the duration of the closure; a viewer
    // would be launched on `dat_path` here.
    let dat_dir = converter.convert_file_ephemeral(&rhd_path, |dat_path| {
        println!("Converted into {}", dat_path.display());
        for ext in ["dat", "xml", "nrs"] {
            let path = dat_path.with_extension(ext);
            println!("  {} exists: {}", path.file_name().unwrap().to_string_lossy(), path.is_file());
        }
        dat_path.parent().unwrap().to_path_buf()
    })?;

    println!(
        "After the closure, {} still exists: {}",
        dat_dir.display(),
        dat_dir.exists()
    );

    Ok(())
}
