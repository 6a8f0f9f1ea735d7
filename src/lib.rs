//! Converts decoded Intan RHD recordings into the file set the Neuroscope
//! viewer opens: a headerless little-endian `.dat` sample file, a `.xml`
//! parameter document, a `.nrs` display-settings document and, when a
//! position track exists, a resampled `.pos` file.
//!
//! The artifacts must agree exactly on channel count, ordering and bit
//! depth or the viewer renders garbage without complaint, so every file of
//! one conversion is derived from a single [`ChannelLayout`]. Parsing the
//! instrument's binary format and resampling position CSVs stay outside
//! the crate, behind the [`RecordingDecoder`] and [`PositionResampler`]
//! traits.
//!
//! # Examples
//!
//! ```no_run
//! use std::path::Path;
//!
//! use rhd2ns::{Converter, PositionResampler, RecordingDecoder, RecordingDescriptor};
//!
//! struct RhdDecoder; // wraps your RHD parser
//!
//! impl RecordingDecoder for RhdDecoder {
//!     fn decode(&self, path: &Path) -> Result<RecordingDescriptor, rhd2ns::DecodeError> {
//!         todo!("parse the recording at `path`")
//!     }
//! }
//!
//! struct CsvResampler; // wraps your position-track resampler
//!
//! impl PositionResampler for CsvResampler {
//!     fn resample(
//!         &self,
//!         csv_path: &Path,
//!         out_path: &Path,
//!         rate_hz: u32,
//!     ) -> Result<(), rhd2ns::ResampleError> {
//!         todo!("resample `csv_path` into `out_path` at `rate_hz`")
//!     }
//! }
//!
//! let converter = Converter::new(RhdDecoder, CsvResampler);
//! let dat_path = converter.convert_file(Path::new("session/recording.rhd"), false)?;
//! println!("wrote {}", dat_path.display());
//! # Ok::<(), rhd2ns::ConvertError>(())
//! ```

mod convert;
mod layout;
mod metadata;
mod mux;
pub mod types;

pub use convert::{Converter, PositionResampler, RecordingDecoder};
pub use layout::{ChannelClass, ChannelLayout};
pub use metadata::{build_parameter_document, build_settings_document, document_to_bytes};
pub use mux::{multiplex, multiplex_into};

// Re-export types
pub use types::*;
