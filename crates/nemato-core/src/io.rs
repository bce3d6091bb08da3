//! `.dtmf` field data files.
//!
//! File layout, in order:
//!
//! | Bytes | Content |
//! |-------|---------|
//! | 4 | magic `dtmf` |
//! | 1 | format version, currently `0` |
//! | npy | complex field array `[..., nw, 4, H, W]` |
//! | npy | real wavelengths array `[nw]` |
//! | npy | 0-d pixel size (`<f8`) |
//!
//! Each array is a NumPy `.npy` record (see [`crate::npy`]), so the arrays
//! can be inspected with standard tools.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use ndarray::arr0;
use thiserror::Error;

use crate::config::{Config, Precision};
use crate::field::{validate, FieldData, FieldError, FieldTriple};
use crate::npy::{self, NpyError};

/// File identifier.
pub const MAGIC: &[u8; 4] = b"dtmf";
/// Newest format version this build reads and the one it writes.
pub const VERSION: u8 = 0;
/// Conventional file extension, without the dot.
pub const EXTENSION: &str = "dtmf";

/// Distinguishes temporary files of concurrent saves within one process.
static SAVE_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Error)]
pub enum IoError {
    #[error("Failed to interpret {0}: not a field data file")]
    NotRecognised(String),

    #[error(
        "{source_name} was created with a more recent file format (version {version}); \
         please upgrade nemato to read it"
    )]
    UnsupportedVersion { source_name: String, version: u8 },

    #[error("Malformed array record: {0}")]
    Npy(#[from] NpyError),

    #[error("Invalid field data: {0}")]
    Validation(#[from] FieldError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Write a field data file to a caller-owned stream.
///
/// The data is re-validated at the configured precision first, so what is
/// written, and read back, equals `validate(data, config)`. The pixel size
/// is always stored as a double. The stream is flushed but not closed.
pub fn write_field<W: Write>(w: &mut W, data: &FieldData, config: &Config) -> Result<(), IoError> {
    match config.precision {
        Precision::Double => write_records(w, data, Precision::Double),
        Precision::Single => {
            let (field, wavelengths, pixelsize) = data.clone().into_parts();
            let data = validate((field, wavelengths.into_dyn(), pixelsize), config)?;
            write_records(w, &data, Precision::Single)
        }
    }
}

/// Write data already validated at `precision`.
fn write_records<W: Write>(
    w: &mut W,
    data: &FieldData,
    precision: Precision,
) -> Result<(), IoError> {
    w.write_all(MAGIC)?;
    w.write_all(&[VERSION])?;
    npy::write_complex(w, &data.field().view(), precision)?;
    npy::write_real(w, &data.wavelengths().view().into_dyn(), precision)?;
    npy::write_real(w, &arr0(data.pixelsize()).into_dyn().view(), Precision::Double)?;
    w.flush()?;
    Ok(())
}

fn read_records<R: Read>(r: &mut R, source_name: &str) -> Result<FieldData, IoError> {
    let mut magic = [0u8; 4];
    if r.read_exact(&mut magic).is_err() || &magic != MAGIC {
        return Err(IoError::NotRecognised(source_name.to_string()));
    }
    let mut version = [0u8; 1];
    r.read_exact(&mut version)?;
    if version[0] != VERSION {
        return Err(IoError::UnsupportedVersion {
            source_name: source_name.to_string(),
            version: version[0],
        });
    }
    let field = npy::read_complex(r)?;
    let wavelengths = npy::read_real(r)?;
    let pixelsize = npy::read_real(r)?;
    let pixelsize = match pixelsize.len() {
        1 => pixelsize.iter().copied().next().unwrap_or_default(),
        n => {
            return Err(IoError::Npy(NpyError::Header(format!(
                "pixel size record holds {n} values"
            ))))
        }
    };
    let wavelengths = wavelengths
        .into_dimensionality::<ndarray::Ix1>()
        .map_err(|_| FieldError::Validation("wavelengths must be one-dimensional".into()))?;
    Ok(FieldData::new(field, wavelengths, pixelsize)?)
}

/// Read a field data file from a caller-owned stream, leaving the stream
/// positioned after the last record.
pub fn read_field<R: Read>(r: &mut R) -> Result<FieldData, IoError> {
    read_records(r, "stream")
}

/// Path that [`save_field`] writes to: `.dtmf` is appended when `path` has
/// no extension.
pub fn field_path(path: &Path) -> PathBuf {
    if path.extension().is_some() {
        path.to_path_buf()
    } else {
        path.with_extension(EXTENSION)
    }
}

/// Validate and save field data, returning the path written.
///
/// Data is written to a sibling temporary file that is renamed over the
/// target once complete, so a failed save leaves an existing file intact.
pub fn save_field(
    path: impl AsRef<Path>,
    data: FieldTriple,
    config: &Config,
) -> Result<PathBuf, IoError> {
    let data = validate(data, config)?;
    let target = field_path(path.as_ref());
    let mut tmp_name = target.file_name().unwrap_or_default().to_os_string();
    let save_id = SAVE_COUNTER.fetch_add(1, Ordering::Relaxed);
    tmp_name.push(format!(".{}.{save_id}.tmp", std::process::id()));
    let tmp = target.with_file_name(tmp_name);

    let result = File::create(&tmp).map_err(IoError::from).and_then(|file| {
        let mut w = BufWriter::new(file);
        write_records(&mut w, &data, config.precision)?;
        w.into_inner()
            .map_err(|e| IoError::Io(e.into_error()))?
            .sync_all()?;
        Ok(())
    });
    if let Err(e) = result.and_then(|()| Ok(std::fs::rename(&tmp, &target)?)) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e);
    }
    log::info!("Saved field data {:?} to {}", data.field().shape(), target.display());
    Ok(target)
}

/// Save already validated field data.
pub fn save_field_data(
    path: impl AsRef<Path>,
    data: &FieldData,
    config: &Config,
) -> Result<PathBuf, IoError> {
    let (field, wavelengths, pixelsize) = data.clone().into_parts();
    save_field(path, (field, wavelengths.into_dyn(), pixelsize), config)
}

/// Load field data from `path`, used verbatim.
pub fn load_field(path: impl AsRef<Path>) -> Result<FieldData, IoError> {
    let path = path.as_ref();
    let mut r = BufReader::new(File::open(path)?);
    let data = read_records(&mut r, &path.display().to_string())?;
    log::info!("Loaded field data {:?} from {}", data.field().shape(), path.display());
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_extension_only_added_to_bare_paths() {
        assert_eq!(field_path(Path::new("out/field")), PathBuf::from("out/field.dtmf"));
        assert_eq!(field_path(Path::new("field.dtmf")), PathBuf::from("field.dtmf"));
        assert_eq!(field_path(Path::new("field.bin")), PathBuf::from("field.bin"));
    }

    #[test]
    fn test_stream_starts_with_magic_and_version() {
        let field = ndarray::ArrayD::zeros(ndarray::IxDyn(&[1, 4, 1, 1]));
        let data = FieldData::new(field, ndarray::arr1(&[500.0]), 1.0).unwrap();
        let mut buf = Vec::new();
        write_field(&mut buf, &data, &Config::default()).unwrap();
        assert_eq!(&buf[..5], b"dtmf\x00");
        assert_eq!(&buf[5..11], npy::MAGIC);

        let back = read_field(&mut Cursor::new(&buf)).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn test_written_data_matches_validation_at_write_precision() {
        let field = ndarray::Array::from_shape_fn((1, 4, 2, 2), |(_, c, i, j)| {
            num_complex::Complex64::new(0.1 + c as f64 / 3.0, (i * 2 + j) as f64 / 7.0)
        })
        .into_dyn();
        let wavelengths = ndarray::arr1(&[550.123456789]).into_dyn();
        let triple = (field, wavelengths, 0.1);
        let double = validate(triple.clone(), &Config::default()).unwrap();
        let single = Config {
            precision: Precision::Single,
            ..Default::default()
        };

        let mut buf = Vec::new();
        write_field(&mut buf, &double, &single).unwrap();
        let back = read_field(&mut Cursor::new(&buf)).unwrap();
        assert_ne!(back, double);
        assert_eq!(back, validate(triple, &single).unwrap());
    }

    #[test]
    fn test_rejects_foreign_and_newer_files() {
        assert!(matches!(
            read_field(&mut Cursor::new(b"\x93NUMPY".to_vec())),
            Err(IoError::NotRecognised(_))
        ));
        assert!(matches!(
            read_field(&mut Cursor::new(b"dt".to_vec())),
            Err(IoError::NotRecognised(_))
        ));
        let err = read_field(&mut Cursor::new(b"dtmf\x01".to_vec())).unwrap_err();
        assert!(matches!(err, IoError::UnsupportedVersion { version: 1, .. }));
        assert!(err.to_string().contains("upgrade"));
    }
}
