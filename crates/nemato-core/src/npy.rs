//! NumPy `.npy` array records.
//!
//! `.dtmf` files store their arrays back to back in the `.npy` layout, so the
//! reader and writer here follow the NumPy format description: a magic
//! string, a version, a little-endian header length and an ASCII Python
//! dictionary literal with `descr`, `fortran_order` and `shape`, padded so
//! that the data starts on a 64-byte boundary.
//!
//! Only the element types used by field data are supported: complex
//! (`c8`, `c16`) and real (`f4`, `f8`) floating point, in either byte order
//! when reading, little-endian when writing.

use std::io::{Read, Write};

use ndarray::{ArrayD, ArrayViewD, IxDyn, ShapeBuilder};
use num_complex::Complex64;
use thiserror::Error;

use crate::config::Precision;

/// Magic prefix of every `.npy` record.
pub const MAGIC: &[u8; 6] = b"\x93NUMPY";

const ALIGNMENT: usize = 64;

#[derive(Debug, Error)]
pub enum NpyError {
    #[error("Not a NumPy array record")]
    Magic,

    #[error("Unsupported NumPy format version {0}.{1}")]
    UnsupportedVersion(u8, u8),

    #[error("Malformed NumPy header: {0}")]
    Header(String),

    #[error("Unsupported NumPy dtype '{0}'")]
    UnsupportedDtype(String),

    #[error("Expected a {expected} array, found dtype '{found}'")]
    WrongKind {
        expected: &'static str,
        found: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Element type of an array record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DType {
    Float32,
    Float64,
    Complex64,
    Complex128,
}

impl DType {
    pub(crate) fn item_size(self) -> usize {
        match self {
            DType::Float32 => 4,
            DType::Float64 | DType::Complex64 => 8,
            DType::Complex128 => 16,
        }
    }

    pub(crate) fn is_complex(self) -> bool {
        matches!(self, DType::Complex64 | DType::Complex128)
    }

    fn code(self) -> &'static str {
        match self {
            DType::Float32 => "f4",
            DType::Float64 => "f8",
            DType::Complex64 => "c8",
            DType::Complex128 => "c16",
        }
    }

    /// Real element type for the given precision.
    pub fn real(precision: Precision) -> Self {
        match precision {
            Precision::Single => DType::Float32,
            Precision::Double => DType::Float64,
        }
    }

    /// Complex element type for the given precision.
    pub fn complex(precision: Precision) -> Self {
        match precision {
            Precision::Single => DType::Complex64,
            Precision::Double => DType::Complex128,
        }
    }
}

/// Parsed array record header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub dtype: DType,
    pub big_endian: bool,
    pub fortran_order: bool,
    pub shape: Vec<usize>,
}

impl Header {
    /// Number of elements, or an error when the shape overflows `usize`.
    pub(crate) fn element_count(&self) -> Result<usize, NpyError> {
        self.shape
            .iter()
            .try_fold(1usize, |n, &d| n.checked_mul(d))
            .ok_or_else(|| NpyError::Header(format!("shape {:?} is too large", self.shape)))
    }

    /// Size of the data block in bytes.
    pub(crate) fn data_len(&self) -> Result<usize, NpyError> {
        self.element_count()?
            .checked_mul(self.dtype.item_size())
            .ok_or_else(|| NpyError::Header(format!("shape {:?} is too large", self.shape)))
    }

    fn descr(&self) -> String {
        let order = if self.big_endian { '>' } else { '<' };
        format!("{order}{}", self.dtype.code())
    }

    fn dict_literal(&self) -> String {
        let shape = match self.shape.as_slice() {
            [] => "()".to_string(),
            [n] => format!("({n},)"),
            dims => format!(
                "({})",
                dims.iter()
                    .map(|d| d.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        };
        let fortran = if self.fortran_order { "True" } else { "False" };
        format!(
            "{{'descr': '{}', 'fortran_order': {fortran}, 'shape': {shape}, }}",
            self.descr()
        )
    }
}

/// Write a version 1.0 header for a C-ordered little-endian array.
pub fn write_header<W: Write>(w: &mut W, dtype: DType, shape: &[usize]) -> Result<(), NpyError> {
    let header = Header {
        dtype,
        big_endian: false,
        fortran_order: false,
        shape: shape.to_vec(),
    };
    let mut dict = header.dict_literal();
    // magic + version + u16 length + dict + '\n'
    let unpadded = MAGIC.len() + 2 + 2 + dict.len() + 1;
    let padding = (ALIGNMENT - unpadded % ALIGNMENT) % ALIGNMENT;
    dict.extend(std::iter::repeat(' ').take(padding));
    dict.push('\n');
    let header_len = u16::try_from(dict.len())
        .map_err(|_| NpyError::Header(format!("header of {} bytes is too long", dict.len())))?;

    w.write_all(MAGIC)?;
    w.write_all(&[1, 0])?;
    w.write_all(&header_len.to_le_bytes())?;
    w.write_all(dict.as_bytes())?;
    Ok(())
}

fn parse_descr(descr: &str) -> Result<(DType, bool), NpyError> {
    let unsupported = || NpyError::UnsupportedDtype(descr.to_string());
    let (big_endian, code) = match descr.split_at_checked(1) {
        Some(("<", code)) | Some(("|", code)) | Some(("=", code)) => (false, code),
        Some((">", code)) => (true, code),
        _ => return Err(unsupported()),
    };
    let dtype = match code {
        "f4" => DType::Float32,
        "f8" => DType::Float64,
        "c8" => DType::Complex64,
        "c16" => DType::Complex128,
        _ => return Err(unsupported()),
    };
    Ok((dtype, big_endian))
}

/// Text following `'key':` in a header dictionary literal.
fn dict_value<'a>(dict: &'a str, key: &str) -> Result<&'a str, NpyError> {
    let pattern = format!("'{key}':");
    let start = dict
        .find(&pattern)
        .ok_or_else(|| NpyError::Header(format!("missing key '{key}'")))?;
    Ok(dict[start + pattern.len()..].trim_start())
}

fn parse_dict(dict: &str) -> Result<Header, NpyError> {
    let descr = dict_value(dict, "descr")?;
    let descr = descr
        .strip_prefix('\'')
        .and_then(|s| s.split('\'').next())
        .ok_or_else(|| NpyError::Header("descr is not a string".into()))?;
    let (dtype, big_endian) = parse_descr(descr)?;

    let fortran = dict_value(dict, "fortran_order")?;
    let fortran_order = if fortran.starts_with("True") {
        true
    } else if fortran.starts_with("False") {
        false
    } else {
        return Err(NpyError::Header("fortran_order is not a boolean".into()));
    };

    let shape = dict_value(dict, "shape")?;
    let inner = shape
        .strip_prefix('(')
        .and_then(|s| s.split(')').next())
        .ok_or_else(|| NpyError::Header("shape is not a tuple".into()))?;
    let shape = inner
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.trim_end_matches('L')
                .parse::<usize>()
                .map_err(|_| NpyError::Header(format!("invalid dimension '{s}'")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let header = Header {
        dtype,
        big_endian,
        fortran_order,
        shape,
    };
    header.data_len()?;
    Ok(header)
}

/// Read and parse a record header, leaving the stream at the first data byte.
pub fn read_header<R: Read>(r: &mut R) -> Result<Header, NpyError> {
    let mut magic = [0u8; 6];
    r.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(NpyError::Magic);
    }
    let mut version = [0u8; 2];
    r.read_exact(&mut version)?;
    let header_len = match version {
        [1, 0] => {
            let mut len = [0u8; 2];
            r.read_exact(&mut len)?;
            u16::from_le_bytes(len) as usize
        }
        [2, 0] | [3, 0] => {
            let mut len = [0u8; 4];
            r.read_exact(&mut len)?;
            u32::from_le_bytes(len) as usize
        }
        [major, minor] => return Err(NpyError::UnsupportedVersion(major, minor)),
    };
    let mut dict = vec![0u8; header_len];
    r.read_exact(&mut dict)?;
    let dict = String::from_utf8(dict)
        .map_err(|_| NpyError::Header("header is not valid text".into()))?;
    parse_dict(&dict)
}

fn read_values<R: Read>(r: &mut R, header: &Header) -> Result<Vec<f64>, NpyError> {
    let scalars = if header.dtype.is_complex() { 2 } else { 1 };
    let width = header.dtype.item_size() / scalars;
    let nbytes = header.data_len()?;
    // Bounded by the bytes present, not by the header.
    let mut bytes = Vec::new();
    r.take(nbytes as u64).read_to_end(&mut bytes)?;
    if bytes.len() != nbytes {
        return Err(NpyError::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            format!("record holds {} of {nbytes} data bytes", bytes.len()),
        )));
    }
    let values = bytes
        .chunks_exact(width)
        .map(|b| match (width, header.big_endian) {
            (4, false) => f32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64,
            (4, true) => f32::from_be_bytes([b[0], b[1], b[2], b[3]]) as f64,
            (_, false) => f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]),
            (_, true) => f64::from_be_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]),
        })
        .collect();
    Ok(values)
}

fn into_array<T>(header: &Header, data: Vec<T>) -> Result<ArrayD<T>, NpyError> {
    let shape = IxDyn(&header.shape);
    let array = if header.fortran_order {
        ArrayD::from_shape_vec(shape.f(), data)
    } else {
        ArrayD::from_shape_vec(shape, data)
    };
    array.map_err(|e| NpyError::Header(e.to_string()))
}

/// Read a complex array record. Real records are widened with zero
/// imaginary parts.
pub fn read_complex<R: Read>(r: &mut R) -> Result<ArrayD<Complex64>, NpyError> {
    let header = read_header(r)?;
    let values = read_values(r, &header)?;
    let data = if header.dtype.is_complex() {
        values
            .chunks_exact(2)
            .map(|c| Complex64::new(c[0], c[1]))
            .collect()
    } else {
        values.into_iter().map(|v| Complex64::new(v, 0.0)).collect()
    };
    into_array(&header, data)
}

/// Read a real array record.
pub fn read_real<R: Read>(r: &mut R) -> Result<ArrayD<f64>, NpyError> {
    let header = read_header(r)?;
    if header.dtype.is_complex() {
        return Err(NpyError::WrongKind {
            expected: "real",
            found: header.descr(),
        });
    }
    let values = read_values(r, &header)?;
    into_array(&header, values)
}

/// Write a complex array record at the given precision.
pub fn write_complex<W: Write>(
    w: &mut W,
    array: &ArrayViewD<'_, Complex64>,
    precision: Precision,
) -> Result<(), NpyError> {
    let dtype = DType::complex(precision);
    write_header(w, dtype, array.shape())?;
    let mut bytes = Vec::with_capacity(array.len() * dtype.item_size());
    for v in array.iter() {
        match precision {
            Precision::Single => {
                bytes.extend_from_slice(&(v.re as f32).to_le_bytes());
                bytes.extend_from_slice(&(v.im as f32).to_le_bytes());
            }
            Precision::Double => {
                bytes.extend_from_slice(&v.re.to_le_bytes());
                bytes.extend_from_slice(&v.im.to_le_bytes());
            }
        }
    }
    w.write_all(&bytes)?;
    Ok(())
}

/// Write a real array record at the given precision.
pub fn write_real<W: Write>(
    w: &mut W,
    array: &ArrayViewD<'_, f64>,
    precision: Precision,
) -> Result<(), NpyError> {
    let dtype = DType::real(precision);
    write_header(w, dtype, array.shape())?;
    let mut bytes = Vec::with_capacity(array.len() * dtype.item_size());
    for v in array.iter() {
        match precision {
            Precision::Single => bytes.extend_from_slice(&(*v as f32).to_le_bytes()),
            Precision::Double => bytes.extend_from_slice(&v.to_le_bytes()),
        }
    }
    w.write_all(&bytes)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr0, arr2};
    use std::io::Cursor;

    #[test]
    fn test_header_matches_numpy_save() {
        // Same dictionary as `np.save(f, np.zeros((2, 3)))`.
        let mut buf = Vec::new();
        write_header(&mut buf, DType::Float64, &[2, 3]).unwrap();
        assert_eq!(buf.len() % ALIGNMENT, 0);
        assert_eq!(&buf[..8], b"\x93NUMPY\x01\x00");
        let text = std::str::from_utf8(&buf[10..]).unwrap();
        assert!(text.starts_with("{'descr': '<f8', 'fortran_order': False, 'shape': (2, 3), }"));
        assert!(text.ends_with(" \n"));
    }

    #[test]
    fn test_scalar_and_vector_shapes() {
        let mut buf = Vec::new();
        write_real(&mut buf, &arr0(2.5).into_dyn().view(), Precision::Double).unwrap();
        write_real(&mut buf, &ndarray::arr1(&[1.0]).into_dyn().view(), Precision::Double).unwrap();
        let text = String::from_utf8_lossy(&buf);
        assert!(text.contains("'shape': (), }"));
        assert!(text.contains("'shape': (1,), }"));

        let mut cursor = Cursor::new(buf);
        let scalar = read_real(&mut cursor).unwrap();
        assert_eq!(scalar.ndim(), 0);
        assert_eq!(scalar.iter().next(), Some(&2.5));
        assert_eq!(read_real(&mut cursor).unwrap().shape(), &[1]);
    }

    #[test]
    fn test_reads_fortran_big_endian_records() {
        let dict = "{'descr': '>f4', 'fortran_order': True, 'shape': (2, 2), }";
        let mut buf = Vec::new();
        buf.extend_from_slice(MAGIC);
        buf.extend_from_slice(&[1, 0]);
        buf.extend_from_slice(&(dict.len() as u16 + 1).to_le_bytes());
        buf.extend_from_slice(dict.as_bytes());
        buf.push(b'\n');
        for v in [1.0f32, 3.0, 2.0, 4.0] {
            buf.extend_from_slice(&v.to_be_bytes());
        }
        let a = read_real(&mut Cursor::new(buf)).unwrap();
        assert_eq!(a, arr2(&[[1.0, 2.0], [3.0, 4.0]]).into_dyn());
    }

    #[test]
    fn test_malformed_records() {
        assert!(matches!(
            read_header(&mut Cursor::new(b"\x93NUMPZ\x01\x00".to_vec())),
            Err(NpyError::Magic)
        ));
        let mut buf = Vec::new();
        write_header(&mut buf, DType::Complex128, &[1]).unwrap();
        assert!(matches!(
            read_real(&mut Cursor::new(buf.clone())),
            Err(NpyError::WrongKind { .. })
        ));
        // Header present, data missing.
        assert!(matches!(
            read_complex(&mut Cursor::new(buf)),
            Err(NpyError::Io(_))
        ));
        assert!(matches!(parse_descr("<i8"), Err(NpyError::UnsupportedDtype(_))));
    }

    fn record_with_shape(shape: &str) -> Vec<u8> {
        let dict = format!("{{'descr': '<c16', 'fortran_order': False, 'shape': {shape}, }}");
        let mut buf = Vec::new();
        buf.extend_from_slice(MAGIC);
        buf.extend_from_slice(&[1, 0]);
        buf.extend_from_slice(&(dict.len() as u16 + 1).to_le_bytes());
        buf.extend_from_slice(dict.as_bytes());
        buf.push(b'\n');
        buf.extend_from_slice(&[0u8; 64]);
        buf
    }

    #[test]
    fn test_overflowing_shape_is_a_header_error() {
        let buf = record_with_shape("(4611686018427387904, 4, 1, 1)");
        assert!(matches!(
            read_complex(&mut Cursor::new(buf)),
            Err(NpyError::Header(_))
        ));
    }

    #[test]
    fn test_oversized_shape_reads_only_available_bytes() {
        // 2^40 complex values claimed, 64 bytes present.
        let buf = record_with_shape("(1099511627776,)");
        assert!(matches!(
            read_complex(&mut Cursor::new(buf)),
            Err(NpyError::Io(_))
        ));
    }

    #[test]
    fn test_single_precision_complex() {
        let a = ndarray::arr1(&[Complex64::new(0.1, -0.2)]).into_dyn();
        let mut buf = Vec::new();
        write_complex(&mut buf, &a.view(), Precision::Single).unwrap();
        let text = String::from_utf8_lossy(&buf);
        assert!(text.contains("'<c8'"));
        let b = read_complex(&mut Cursor::new(buf)).unwrap();
        assert_eq!(b[[0]], Complex64::new(0.1f32 as f64, -0.2f32 as f64));
    }
}
