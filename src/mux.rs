use std::io::{self, Write};

use byteorder::{LittleEndian, WriteBytesExt};
use ndarray::Array2;

use crate::types::{ConvertError, RecordingDescriptor, SampleMatrix};

/// Multiplexes a descriptor into the raw byte stream of a Neuroscope
/// `.dat` file.
///
/// One sample per channel per time step: amplifier channels in recording
/// order, then digital input channels, each sample little-endian at the
/// element type's width, no header or padding anywhere. The output is a
/// pure function of the descriptor.
///
/// The descriptor is validated before the first byte is produced, so a
/// rejected recording yields no partial output.
pub fn multiplex(descriptor: &RecordingDescriptor) -> Result<Vec<u8>, ConvertError> {
    let bytes_per_sample = descriptor.amplifier_data.bit_depth()? as usize / 8;
    let total_channels = descriptor.layout().total_channels();
    let num_samples = descriptor.num_samples();

    // Preallocate the exact output size
    let mut buf = Vec::with_capacity(total_channels * num_samples * bytes_per_sample);
    multiplex_into(descriptor, &mut buf)?;
    Ok(buf)
}

/// Streams the multiplexed sample bytes into `writer`.
///
/// Same layout as [`multiplex`] without materializing the whole stream.
pub fn multiplex_into<W: Write>(
    descriptor: &RecordingDescriptor,
    writer: &mut W,
) -> Result<(), ConvertError> {
    let matrices = validated_matrices(descriptor)?;
    log::debug!(
        "multiplexing {} channels x {} samples as {}",
        descriptor.layout().total_channels(),
        descriptor.num_samples(),
        descriptor.amplifier_data.dtype()
    );
    match matrices {
        Matrices::Int16(amp, dig) => {
            interleave(writer, amp, dig, |w, v| w.write_i16::<LittleEndian>(v))?
        }
        Matrices::Int32(amp, dig) => {
            interleave(writer, amp, dig, |w, v| w.write_i32::<LittleEndian>(v))?
        }
        Matrices::Int64(amp, dig) => {
            interleave(writer, amp, dig, |w, v| w.write_i64::<LittleEndian>(v))?
        }
    }
    Ok(())
}

/// Matrix pair of one element type, produced only by validation.
enum Matrices<'a> {
    Int16(&'a Array2<i16>, Option<&'a Array2<i16>>),
    Int32(&'a Array2<i32>, Option<&'a Array2<i32>>),
    Int64(&'a Array2<i64>, Option<&'a Array2<i64>>),
}

/// Helper function to check the descriptor's channel lists against its
/// matrices and hand back a pair the interleaver can consume directly.
fn validated_matrices(descriptor: &RecordingDescriptor) -> Result<Matrices<'_>, ConvertError> {
    descriptor.amplifier_data.bit_depth()?;

    let num_amp = descriptor.num_amplifier_channels();
    let num_dig = descriptor.num_dig_in_channels();
    let (amp_rows, num_samples) = descriptor.amplifier_data.dim();

    if amp_rows != num_amp {
        return Err(ConvertError::MalformedRecording(format!(
            "amplifier matrix has {} rows but {} amplifier channels are listed",
            amp_rows, num_amp
        )));
    }

    let dig = match &descriptor.board_dig_in_data {
        Some(dig) => {
            let (dig_rows, dig_samples) = dig.dim();
            if dig_rows != num_dig {
                return Err(ConvertError::MalformedRecording(format!(
                    "digital matrix has {} rows but {} digital input channels are listed",
                    dig_rows, num_dig
                )));
            }
            if dig_rows > 0 && dig_samples != num_samples {
                return Err(ConvertError::MalformedRecording(format!(
                    "digital channels hold {} samples but amplifier channels hold {}",
                    dig_samples, num_samples
                )));
            }
            if dig_rows > 0 {
                Some(dig)
            } else {
                None
            }
        }
        None if num_dig > 0 => {
            return Err(ConvertError::MalformedRecording(format!(
                "{} digital input channels are listed but the recording holds no digital data",
                num_dig
            )));
        }
        None => None,
    };

    match (&descriptor.amplifier_data, dig) {
        (SampleMatrix::Int16(a), None) => Ok(Matrices::Int16(a, None)),
        (SampleMatrix::Int16(a), Some(SampleMatrix::Int16(d))) => Ok(Matrices::Int16(a, Some(d))),
        (SampleMatrix::Int32(a), None) => Ok(Matrices::Int32(a, None)),
        (SampleMatrix::Int32(a), Some(SampleMatrix::Int32(d))) => Ok(Matrices::Int32(a, Some(d))),
        (SampleMatrix::Int64(a), None) => Ok(Matrices::Int64(a, None)),
        (SampleMatrix::Int64(a), Some(SampleMatrix::Int64(d))) => Ok(Matrices::Int64(a, Some(d))),
        (SampleMatrix::Float32(_) | SampleMatrix::Float64(_), _) => {
            Err(ConvertError::UnsupportedFormat {
                dtype: descriptor.amplifier_data.dtype(),
            })
        }
        (amp, Some(dig)) => Err(ConvertError::MalformedRecording(format!(
            "amplifier samples are {} but digital samples are {}",
            amp.dtype(),
            dig.dtype()
        ))),
    }
}

/// Helper function to write one time step per channel; `put` emits a single
/// sample at the element type's width.
fn interleave<T, W, F>(
    writer: &mut W,
    amp: &Array2<T>,
    dig: Option<&Array2<T>>,
    mut put: F,
) -> io::Result<()>
where
    T: Copy,
    W: Write,
    F: FnMut(&mut W, T) -> io::Result<()>,
{
    let (num_amp, num_samples) = amp.dim();
    for t in 0..num_samples {
        for ch in 0..num_amp {
            put(writer, amp[[ch, t]])?;
        }
        if let Some(dig) = dig {
            for ch in 0..dig.dim().0 {
                put(writer, dig[[ch, t]])?;
            }
        }
    }
    Ok(())
}
