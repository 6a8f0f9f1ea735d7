use std::io;
use std::path::PathBuf;

use ndarray::Array2;

use crate::layout::ChannelLayout;

/// Channel names and sample data for one decoded recording.
///
/// Produced by a [`RecordingDecoder`](crate::RecordingDecoder) implementation
/// and consumed read-only by the conversion pipeline. Amplifier channels come
/// first and digital input channels second in every artifact derived from a
/// descriptor.
#[derive(Debug, Clone)]
pub struct RecordingDescriptor {
    /// Names of the amplifier channels, in recording order
    pub amplifier_channels: Vec<String>,
    /// Names of the board digital input channels, in recording order
    pub board_dig_in_channels: Vec<String>,
    /// Sample rate of the amplifier channels (Hz)
    pub amplifier_sample_rate: f64,
    /// Amplifier samples, shape `[channels, samples]`
    pub amplifier_data: SampleMatrix,
    /// Digital input samples, shape `[channels, samples]`, sampled at the
    /// amplifier rate; `None` when the recording carried no digital data
    pub board_dig_in_data: Option<SampleMatrix>,
}

impl RecordingDescriptor {
    /// Returns the number of amplifier channels.
    pub fn num_amplifier_channels(&self) -> usize {
        self.amplifier_channels.len()
    }

    /// Returns the number of board digital input channels.
    pub fn num_dig_in_channels(&self) -> usize {
        self.board_dig_in_channels.len()
    }

    /// Returns the number of time samples per channel.
    pub fn num_samples(&self) -> usize {
        self.amplifier_data.dim().1
    }

    /// Returns the duration of the recording in seconds.
    pub fn duration(&self) -> f64 {
        self.num_samples() as f64 / self.amplifier_sample_rate
    }

    /// Returns the channel layout implied by the two channel lists.
    pub fn layout(&self) -> ChannelLayout {
        ChannelLayout::new(self.num_amplifier_channels(), self.num_dig_in_channels())
    }
}

/// A per-channel sample matrix tagged with its element type.
///
/// The first axis is the channel and the second the time sample, the shape
/// decoders naturally produce. Only the signed integer forms can be written
/// to a Neuroscope `.dat` file; scaled floating-point data is rejected
/// rather than silently quantized.
#[derive(Debug, Clone)]
pub enum SampleMatrix {
    /// 16-bit signed samples
    Int16(Array2<i16>),
    /// 32-bit signed samples
    Int32(Array2<i32>),
    /// 64-bit signed samples
    Int64(Array2<i64>),
    /// 32-bit floating-point samples (not convertible)
    Float32(Array2<f32>),
    /// 64-bit floating-point samples (not convertible)
    Float64(Array2<f64>),
}

impl SampleMatrix {
    /// Returns the element type name, e.g. `"int16"`.
    pub fn dtype(&self) -> &'static str {
        match self {
            SampleMatrix::Int16(_) => "int16",
            SampleMatrix::Int32(_) => "int32",
            SampleMatrix::Int64(_) => "int64",
            SampleMatrix::Float32(_) => "float32",
            SampleMatrix::Float64(_) => "float64",
        }
    }

    /// Returns the shape as `(channels, samples)`.
    pub fn dim(&self) -> (usize, usize) {
        match self {
            SampleMatrix::Int16(m) => m.dim(),
            SampleMatrix::Int32(m) => m.dim(),
            SampleMatrix::Int64(m) => m.dim(),
            SampleMatrix::Float32(m) => m.dim(),
            SampleMatrix::Float64(m) => m.dim(),
        }
    }

    /// Returns the on-disk sample width in bits.
    ///
    /// Both the sample multiplexer and the parameter document builder go
    /// through this single mapping, so a matrix rejected here produces no
    /// artifact anywhere.
    pub fn bit_depth(&self) -> Result<u32, ConvertError> {
        match self {
            SampleMatrix::Int16(_) => Ok(16),
            SampleMatrix::Int32(_) => Ok(32),
            SampleMatrix::Int64(_) => Ok(64),
            other => Err(ConvertError::UnsupportedFormat {
                dtype: other.dtype(),
            }),
        }
    }
}

/// Viewer policy values written into the metadata documents.
///
/// These are display conventions, not properties of the recording. The
/// defaults match what existing Neuroscope setups expect; override
/// individual fields through [`Converter::with_defaults`](crate::Converter::with_defaults)
/// when a rig deviates.
#[derive(Debug, Clone)]
pub struct ViewerDefaults {
    /// Rate the position track is resampled to and declared at (Hz)
    pub position_sample_rate: u32,
    /// Video frame width written to the parameter document (pixels)
    pub video_width: u32,
    /// Video frame height written to the parameter document (pixels)
    pub video_height: u32,
    /// Local field potential sampling rate (Hz)
    pub lfp_sample_rate: u32,
    /// Length of the initial display window (ms)
    pub display_duration: u32,
    /// Acquisition voltage range declared to the viewer (V)
    pub voltage_range: u32,
    /// Acquisition amplification factor declared to the viewer
    pub amplification: u32,
    /// Acquisition offset declared to the viewer
    pub offset: i32,
}

impl Default for ViewerDefaults {
    fn default() -> Self {
        ViewerDefaults {
            position_sample_rate: 20,
            video_width: 1280,
            video_height: 1024,
            lfp_sample_rate: 1250,
            display_duration: 1000,
            voltage_range: 20,
            amplification: 1000,
            offset: 0,
        }
    }
}

/// Error type decoders report through [`RecordingDecoder`](crate::RecordingDecoder).
pub type DecodeError = Box<dyn std::error::Error + Send + Sync>;

/// Error type resamplers report through [`PositionResampler`](crate::PositionResampler).
pub type ResampleError = Box<dyn std::error::Error + Send + Sync>;

/// Errors surfaced by the conversion pipeline.
///
/// Every variant is fatal to the conversion that raised it; nothing is
/// retried. Artifacts already written when an error surfaces are left in
/// place.
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    /// A required input file or directory is missing
    #[error("{what} not found at {}", .path.display())]
    InputNotFound {
        /// What was being looked for
        what: &'static str,
        /// Where it was expected
        path: PathBuf,
    },

    /// More than one recording was found where exactly one is expected
    #[error("found {} .rhd files in {}, expected exactly one: {candidates:?}", .candidates.len(), .dir.display())]
    AmbiguousInput {
        /// Directory that was scanned
        dir: PathBuf,
        /// File names of every candidate, sorted
        candidates: Vec<String>,
    },

    /// The external decoder failed; its error is passed through unchanged
    #[error("failed to decode {}", .path.display())]
    Decode {
        /// Recording file handed to the decoder
        path: PathBuf,
        /// The decoder's own error
        #[source]
        source: DecodeError,
    },

    /// The sample element type has no Neuroscope bit depth
    #[error("unsupported sample format \"{dtype}\", expected int16, int32 or int64")]
    UnsupportedFormat {
        /// Element type name of the offending matrix
        dtype: &'static str,
    },

    /// The descriptor's channel lists and sample matrices disagree
    #[error("malformed recording: {0}")]
    MalformedRecording(String),

    /// The external position resampler failed
    #[error("failed to resample position track {}", .path.display())]
    Resample {
        /// Source CSV handed to the resampler
        path: PathBuf,
        /// The resampler's own error
        #[source]
        source: ResampleError,
    },

    /// Writing an artifact to disk failed
    #[error("failed to write {}", .path.display())]
    Write {
        /// Artifact path being written
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// An I/O error not tied to a single artifact
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
