//! Field data round trips through `.dtmf` files and illumination scenarios.
//!
//! - save → load reproduces arrays bit for bit and the pixel size exactly
//! - bare paths gain the `.dtmf` extension, load uses paths verbatim
//! - concurrent saves to one path leave one complete file
//! - foreign and newer files are rejected with distinct errors
//! - normal-incidence illumination carries uniform positive flux

use std::fs;
use std::path::PathBuf;

use approx::assert_abs_diff_eq;
use ndarray::{Array, ArrayD, IxDyn};
use num_complex::Complex64;

use nemato_core::config::{BackendChoice, Config, Precision};
use nemato_core::field::{
    field_to_specter, field_to_specter_sum, illumination_betaphi, FieldError, IlluminationParams,
    Illuminator, JonesVector,
};
use nemato_core::io::{load_field, read_field, save_field, write_field, IoError};

// ─────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────

/// Unique path in the system temp directory.
fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("nemato-{}-{}", std::process::id(), name))
}

fn sequential() -> Config {
    Config {
        backend: BackendChoice::Sequential,
        ..Default::default()
    }
}

fn sample_triple() -> (ArrayD<Complex64>, ArrayD<f64>, f64) {
    let field = Array::from_shape_fn((2, 3, 4, 5, 6), |(p, k, c, i, j)| {
        Complex64::new(
            (p as f64 + 0.1) * (k + 1) as f64 / 7.0 - c as f64 * 0.37,
            ((i * 6 + j) as f64).sin() * 1e-3,
        )
    })
    .into_dyn();
    let wavelengths = ndarray::arr1(&[450.0, 550.0, 650.5]).into_dyn();
    (field, wavelengths, 0.123456789)
}

// ─────────────────────────────────────────────────────────────
// Persistence
// ─────────────────────────────────────────────────────────────

#[test]
fn test_round_trip_is_exact() {
    let config = Config::default();
    let (field, wavelengths, pixelsize) = sample_triple();
    let path = save_field(
        temp_path("roundtrip"),
        (field.clone(), wavelengths.clone(), pixelsize),
        &config,
    )
    .unwrap();
    assert_eq!(path.extension().and_then(|e| e.to_str()), Some("dtmf"));

    let data = load_field(&path).unwrap();
    assert_eq!(data.field(), &field);
    assert_eq!(data.wavelengths().view().into_dyn(), wavelengths.view());
    assert_eq!(data.pixelsize(), pixelsize);
    let bits = |a: &ArrayD<Complex64>| -> Vec<(u64, u64)> {
        a.iter().map(|v| (v.re.to_bits(), v.im.to_bits())).collect()
    };
    assert_eq!(bits(data.field()), bits(&field));
    fs::remove_file(path).unwrap();
}

#[test]
fn test_single_precision_round_trip() {
    let config = Config {
        precision: Precision::Single,
        ..Default::default()
    };
    let (field, wavelengths, pixelsize) = sample_triple();
    let path = save_field(temp_path("single.bin"), (field, wavelengths, pixelsize), &config).unwrap();
    assert_eq!(path.extension().and_then(|e| e.to_str()), Some("bin"));

    let data = load_field(&path).unwrap();
    // Values were rounded through f32 before writing, so reading back widens
    // them without further change.
    let again = nemato_core::field::validate(
        {
            let (f, w, p) = data.clone().into_parts();
            (f, w.into_dyn(), p)
        },
        &config,
    )
    .unwrap();
    assert_eq!(again, data);
    assert_eq!(data.pixelsize(), pixelsize);
    fs::remove_file(path).unwrap();
}

#[test]
fn test_load_uses_path_verbatim() {
    let bare = temp_path("verbatim");
    let written = save_field(&bare, sample_triple(), &Config::default()).unwrap();
    assert_ne!(written, bare);
    assert!(matches!(load_field(&bare), Err(IoError::Io(_))));
    assert!(load_field(&written).is_ok());
    fs::remove_file(written).unwrap();
}

#[test]
fn test_invalid_data_is_not_written() {
    let path = temp_path("invalid.dtmf");
    let (field, _, pixelsize) = sample_triple();
    let short = ndarray::arr1(&[500.0]).into_dyn();
    let err = save_field(&path, (field, short, pixelsize), &Config::default()).unwrap_err();
    assert!(matches!(err, IoError::Validation(FieldError::Validation(_))));
    assert!(!path.exists());
}

#[test]
fn test_failed_save_keeps_existing_file() {
    let path = temp_path("keep.dtmf");
    let original = save_field(&path, sample_triple(), &Config::default()).unwrap();
    let before = fs::read(&original).unwrap();
    let (field, _, _) = sample_triple();
    let wavelengths = ndarray::arr1(&[1.0, 2.0, 3.0]).into_dyn();
    assert!(save_field(&path, (field, wavelengths, -1.0), &Config::default()).is_err());
    assert_eq!(fs::read(&original).unwrap(), before);
    fs::remove_file(original).unwrap();
}

#[test]
fn test_concurrent_saves_to_one_path() {
    let path = temp_path("concurrent.dtmf");
    let shapes = [[1, 1, 4, 2, 2], [2, 1, 4, 3, 3]];
    let handles: Vec<_> = shapes
        .iter()
        .map(|&shape| {
            let path = path.clone();
            std::thread::spawn(move || {
                let field = ArrayD::from_elem(IxDyn(&shape), Complex64::new(1.0, 0.0));
                let wavelengths = ndarray::arr1(&[500.0]).into_dyn();
                (0..20)
                    .map(|_| {
                        let triple = (field.clone(), wavelengths.clone(), 1.0);
                        save_field(&path, triple, &Config::default())
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();
    for handle in handles {
        for result in handle.join().unwrap() {
            assert_eq!(result.unwrap(), path);
        }
    }

    let data = load_field(&path).unwrap();
    let shape = data.field().shape().to_vec();
    assert!(shape == [1, 1, 4, 2, 2] || shape == [2, 1, 4, 3, 3], "{shape:?}");
    fs::remove_file(&path).unwrap();
}

#[test]
fn test_format_errors_are_distinguished() {
    let foreign = temp_path("foreign.dtmf");
    fs::write(&foreign, b"PK\x03\x04not a field").unwrap();
    let err = load_field(&foreign).unwrap_err();
    assert!(matches!(err, IoError::NotRecognised(_)));
    assert!(err.to_string().contains("foreign.dtmf"));
    fs::remove_file(foreign).unwrap();

    let (field, wavelengths, pixelsize) = sample_triple();
    let data = nemato_core::field::validate((field, wavelengths, pixelsize), &Config::default()).unwrap();
    let mut buf = Vec::new();
    write_field(&mut buf, &data, &Config::default()).unwrap();
    buf[4] = 1;
    let err = read_field(&mut buf.as_slice()).unwrap_err();
    assert!(matches!(err, IoError::UnsupportedVersion { version: 1, .. }));
    assert!(err.to_string().contains("more recent"));
}

#[test]
fn test_caller_stream_holds_consecutive_files() {
    let (field, wavelengths, pixelsize) = sample_triple();
    let config = Config::default();
    let data = nemato_core::field::validate((field, wavelengths, pixelsize), &config).unwrap();
    let mut buf = Vec::new();
    write_field(&mut buf, &data, &config).unwrap();
    write_field(&mut buf, &data, &config).unwrap();

    let mut stream = buf.as_slice();
    assert_eq!(read_field(&mut stream).unwrap(), data);
    assert_eq!(read_field(&mut stream).unwrap(), data);
    assert!(stream.is_empty());
}

// ─────────────────────────────────────────────────────────────
// Illumination
// ─────────────────────────────────────────────────────────────

#[test]
fn test_normal_incidence_flux_is_uniform_and_positive() {
    let illuminator = Illuminator::new(&sequential()).unwrap();
    let data = illuminator
        .illumination_data((4, 4), &[500.0], 50.0, &IlluminationParams::default())
        .unwrap();
    let intensity = data.intensity().unwrap();
    assert_eq!(intensity.shape(), &[2, 1, 4, 4]);
    for v in intensity.iter() {
        assert!(*v > 0.0);
        assert_abs_diff_eq!(*v, 0.5, epsilon = 1e-12);
    }
}

#[test]
fn test_ray_bundle_sum_matches_per_ray_specters() {
    let params = IlluminationParams {
        incidence: illumination_betaphi(0.1, 5).unwrap(),
        jones: Some(JonesVector::X),
        ..Default::default()
    };
    let illuminator = Illuminator::new(&sequential()).unwrap();
    let data = illuminator
        .illumination_data((16, 16), &[500.0, 600.0], 10.0, &params)
        .unwrap();
    let nrays = params.incidence.len();
    assert_eq!(data.field().shape(), &[nrays, 2, 4, 16, 16]);

    let total = field_to_specter_sum(&data.field().view()).unwrap();
    assert_eq!(total.shape(), &[16, 16, 2]);
    let per_ray = field_to_specter(&data.field().view()).unwrap();
    assert_eq!(per_ray.shape(), &[nrays, 16, 16, 2]);
    let summed = per_ray.sum_axis(ndarray::Axis(0));
    for (a, b) in total.iter().zip(summed.iter()) {
        assert_abs_diff_eq!(*a, *b, epsilon = 1e-12);
    }
}

#[test]
fn test_empty_layer_axis_is_rejected() {
    let empty = ArrayD::<Complex64>::zeros(IxDyn(&[0, 1, 4, 2, 2]));
    assert!(matches!(
        field_to_specter_sum(&empty.view()),
        Err(FieldError::EmptyInput(_))
    ));
}
