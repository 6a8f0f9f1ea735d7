use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::metadata::{build_parameter_document, build_settings_document, document_to_bytes};
use crate::mux::multiplex;
use crate::types::{
    ConvertError, DecodeError, RecordingDescriptor, ResampleError, ViewerDefaults,
};

// Fixed names of the session directory convention.
const MANIFEST_FILE: &str = "manifest.json";
const EPHYS_DIR: &str = "intan";
const RECORDING_EXT: &str = "rhd";
const SESSION_OUT_DIR: &str = "neuroscope";
const SESSION_BASENAME: &str = "channels";
const VIDEO_DIR: &str = "video";
const POSITION_FILE: &str = "positions.pos";
const FILE_OUT_DIR: &str = "ns";
const TEMP_DIR_PREFIX: &str = "rhd2ns-";

/// Decodes one recording file into a [`RecordingDescriptor`].
///
/// Implementations own the instrument's binary format; the conversion
/// pipeline never looks inside the recording file itself. Decoder errors
/// are passed through unchanged inside [`ConvertError::Decode`].
pub trait RecordingDecoder {
    /// Decodes the recording at `path`.
    fn decode(&self, path: &Path) -> Result<RecordingDescriptor, DecodeError>;
}

/// Resamples a raw position-track CSV into the viewer's `.pos` format at a
/// fixed output rate.
pub trait PositionResampler {
    /// Reads `csv_path` and writes the resampled track to `out_path` at
    /// `rate_hz`.
    fn resample(&self, csv_path: &Path, out_path: &Path, rate_hz: u32) -> Result<(), ResampleError>;
}

/// Sequences one conversion end to end: resolve the input, decode it,
/// write the multiplexed samples, write the metadata documents and
/// optionally convert a position track.
///
/// The decoder and resampler are supplied by the caller; input resolution,
/// layout derivation, document content, artifact naming and the
/// skip/override rules all live here. A `Converter` holds no per-run
/// state and can be reused across conversions.
pub struct Converter<D, R> {
    decoder: D,
    resampler: R,
    defaults: ViewerDefaults,
}

impl<D, R> Converter<D, R>
where
    D: RecordingDecoder,
    R: PositionResampler,
{
    /// Creates a converter with the stock [`ViewerDefaults`].
    pub fn new(decoder: D, resampler: R) -> Converter<D, R> {
        Converter {
            decoder,
            resampler,
            defaults: ViewerDefaults::default(),
        }
    }

    /// Replaces the viewer policy values written into the documents.
    pub fn with_defaults(mut self, defaults: ViewerDefaults) -> Converter<D, R> {
        self.defaults = defaults;
        self
    }

    /// Converts one experiment of a session tree laid out as
    /// `{root}/{subject}/{time}/{experiment}`.
    ///
    /// The experiment directory must hold a `manifest.json` and an
    /// `intan/` subdirectory with exactly one `.rhd` recording. Artifacts
    /// land in `{experiment}/neuroscope/` as `channels.dat`,
    /// `channels.xml` and `channels.nrs`; a position track found at
    /// `video/{subject}_positions.csv` is resampled to `positions.pos`
    /// and referenced from the settings document. Returns the output
    /// directory.
    ///
    /// When `override_existing` is unset and `channels.dat` already
    /// exists, the whole call is a no-op that returns the output
    /// directory untouched.
    pub fn convert_session(
        &self,
        root: &Path,
        subject: &str,
        time: &str,
        experiment: &str,
        override_existing: bool,
    ) -> Result<PathBuf, ConvertError> {
        let experiment_root = root.join(subject).join(time).join(experiment);

        let manifest = experiment_root.join(MANIFEST_FILE);
        if !manifest.is_file() {
            return Err(ConvertError::InputNotFound {
                what: "manifest file",
                path: manifest,
            });
        }

        let rhd_file = find_recording(&experiment_root.join(EPHYS_DIR))?;

        let output_dir = experiment_root.join(SESSION_OUT_DIR);
        create_dir(&output_dir)?;

        let dat_path = output_dir.join(format!("{}.dat", SESSION_BASENAME));
        if dat_path.is_file() && !override_existing {
            info!("{} already exists, skipping conversion", dat_path.display());
            return Ok(output_dir);
        }

        let descriptor = self.decode_and_write(&rhd_file, &dat_path)?;

        // The position track is optional; the settings document references
        // it only when the resampler actually produced one.
        let position_source = experiment_root
            .join(VIDEO_DIR)
            .join(format!("{}_positions.csv", subject));
        let position_file = if position_source.is_file() {
            let pos_path = output_dir.join(POSITION_FILE);
            info!(
                "resampling {} to {} Hz",
                position_source.display(),
                self.defaults.position_sample_rate
            );
            self.resampler
                .resample(&position_source, &pos_path, self.defaults.position_sample_rate)
                .map_err(|source| ConvertError::Resample {
                    path: position_source.clone(),
                    source,
                })?;
            Some(pos_path)
        } else {
            debug!("no position track at {}", position_source.display());
            None
        };

        self.write_metadata(&descriptor, &dat_path, position_file.as_deref(), override_existing)?;

        Ok(output_dir)
    }

    /// Converts a single `.rhd` file, writing `{stem}.dat`, `{stem}.xml`
    /// and `{stem}.nrs` into `output_dir`. Returns the `.dat` path.
    ///
    /// When `override_existing` is unset and the `.dat` file already
    /// exists, nothing is written and the existing path is returned.
    pub fn convert_into(
        &self,
        rhd_file: &Path,
        output_dir: &Path,
        override_existing: bool,
    ) -> Result<PathBuf, ConvertError> {
        let file_name = rhd_file.file_name().ok_or_else(|| ConvertError::InputNotFound {
            what: ".rhd recording",
            path: rhd_file.to_path_buf(),
        })?;

        create_dir(output_dir)?;

        // Swap only the final extension, so dotted stems survive
        let dat_path = output_dir.join(file_name).with_extension("dat");
        if dat_path.is_file() && !override_existing {
            info!("{} already exists, skipping conversion", dat_path.display());
            return Ok(dat_path);
        }

        let descriptor = self.decode_and_write(rhd_file, &dat_path)?;
        self.write_metadata(&descriptor, &dat_path, None, override_existing)?;

        Ok(dat_path)
    }

    /// Converts a single `.rhd` file into an `ns/` directory next to it.
    pub fn convert_file(
        &self,
        rhd_file: &Path,
        override_existing: bool,
    ) -> Result<PathBuf, ConvertError> {
        let parent = rhd_file.parent().unwrap_or(Path::new(""));
        self.convert_into(rhd_file, &parent.join(FILE_OUT_DIR), override_existing)
    }

    /// Converts a single `.rhd` file into a scoped temporary directory,
    /// hands the `.dat` path to `with`, and removes the directory before
    /// returning. Nothing persists after the call, whether the conversion
    /// succeeded or failed.
    pub fn convert_file_ephemeral<F, T>(&self, rhd_file: &Path, with: F) -> Result<T, ConvertError>
    where
        F: FnOnce(&Path) -> T,
    {
        let temp_dir = tempfile::Builder::new()
            .prefix(TEMP_DIR_PREFIX)
            .tempdir()
            .map_err(ConvertError::Io)?;

        // The directory is freshly created, so the skip check can never
        // trigger here
        let dat_path = self.convert_into(rhd_file, temp_dir.path(), true)?;
        Ok(with(&dat_path))
        // temp_dir drops here and removes the tree on success and error alike
    }

    /// Helper function to decode the recording through the caller's
    /// decoder and write the multiplexed sample file.
    fn decode_and_write(
        &self,
        rhd_file: &Path,
        dat_path: &Path,
    ) -> Result<RecordingDescriptor, ConvertError> {
        info!("converting {} to {}", rhd_file.display(), dat_path.display());

        let descriptor = self
            .decoder
            .decode(rhd_file)
            .map_err(|source| ConvertError::Decode {
                path: rhd_file.to_path_buf(),
                source,
            })?;
        debug!(
            "decoded {} amplifier and {} digital input channels, {:.3} s at {} Hz",
            descriptor.num_amplifier_channels(),
            descriptor.num_dig_in_channels(),
            descriptor.duration(),
            descriptor.amplifier_sample_rate
        );

        let bytes = multiplex(&descriptor)?;
        write_file(dat_path, &bytes)?;
        Ok(descriptor)
    }

    /// Helper function to write the two metadata documents next to the
    /// sample file. The parameter document is rewritten on every
    /// conversion; the settings document belongs to the user once it
    /// exists and is only replaced on request.
    fn write_metadata(
        &self,
        descriptor: &RecordingDescriptor,
        dat_path: &Path,
        position_file: Option<&Path>,
        override_settings: bool,
    ) -> Result<(), ConvertError> {
        let layout = descriptor.layout();

        let parameters = build_parameter_document(descriptor, &layout, &self.defaults)?;
        let xml_path = dat_path.with_extension("xml");
        write_file(&xml_path, &document_to_bytes(&parameters)?)?;

        let nrs_path = dat_path.with_extension("nrs");
        if override_settings || !nrs_path.is_file() {
            let settings = build_settings_document(&layout, position_file, &self.defaults);
            write_file(&nrs_path, &document_to_bytes(&settings)?)?;
        } else {
            debug!("keeping existing display settings {}", nrs_path.display());
        }

        Ok(())
    }
}

/// Helper function to find the one `.rhd` file a session's ephys
/// directory must hold. Several candidates are an error rather than a
/// silent pick.
fn find_recording(ephys_dir: &Path) -> Result<PathBuf, ConvertError> {
    let entries = fs::read_dir(ephys_dir).map_err(|_| ConvertError::InputNotFound {
        what: "ephys directory",
        path: ephys_dir.to_path_buf(),
    })?;

    let mut candidates: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().and_then(|ext| ext.to_str()) == Some(RECORDING_EXT))
        .collect();
    candidates.sort();

    match candidates.len() {
        0 => Err(ConvertError::InputNotFound {
            what: ".rhd recording",
            path: ephys_dir.to_path_buf(),
        }),
        1 => Ok(candidates.remove(0)),
        _ => Err(ConvertError::AmbiguousInput {
            dir: ephys_dir.to_path_buf(),
            candidates: candidates
                .iter()
                .filter_map(|path| path.file_name())
                .map(|name| name.to_string_lossy().into_owned())
                .collect(),
        }),
    }
}

fn create_dir(dir: &Path) -> Result<(), ConvertError> {
    fs::create_dir_all(dir).map_err(|source| ConvertError::Write {
        path: dir.to_path_buf(),
        source,
    })
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<(), ConvertError> {
    fs::write(path, bytes).map_err(|source| ConvertError::Write {
        path: path.to_path_buf(),
        source,
    })
}
