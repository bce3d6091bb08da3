//! Workspace-level check: a droplet director field turned into a
//! permittivity field, and an illumination written to and read back from a
//! `.dtmf` file.

use std::sync::Arc;

use approx::assert_abs_diff_eq;
use nemato::compute::SequentialBackend;
use nemato::core::config::{BackendChoice, Config};
use nemato::core::field::{illumination_data, IlluminationParams};
use nemato::core::io::{load_field, save_field_data};
use nemato::core::rotation::tensor_to_matrix;
use nemato::core::tensor::{Azimuth, MaterialKind, MaterialTable};
use nemato::core::TensorFieldBuilder;
use nemato::geometry::director::{DirectorField, NEMATIC_ID};
use nemato::geometry::primitives::{Primitive, Sphere};
use nemato::materials::cauchy::CauchyMaterial;
use nemato::materials::MaterialProvider;
use ndarray::Array1;
use num_complex::Complex64;

#[test]
fn test_droplet_tensor_has_optical_axis_along_director() {
    let shape = (9, 9, 9);
    let region = Primitive::Sphere(Sphere {
        centre: [0.0; 3],
        radius: 4.0,
    });
    let field = DirectorField::radial(shape, &region).unwrap();
    let angles = field.to_angles().into_dyn();

    let eps = CauchyMaterial::five_cb().principal_permittivity(550.0).unwrap();
    let diagonal = Array1::from(eps.to_vec()).into_dyn();
    let builder = TensorFieldBuilder::new(Arc::new(SequentialBackend)).with_materials(
        MaterialTable::new(vec![MaterialKind::Isotropic, MaterialKind::Uniaxial]),
    );
    let tensor = builder
        .tensor_field(&angles.view(), &diagonal.view(), &Azimuth::default())
        .unwrap();
    assert_eq!(tensor.shape(), &[9, 9, 9, 6]);

    // ε·n = εe·n wherever the director is defined.
    for ((k, i, j), &id) in field.material.indexed_iter() {
        let n = [
            field.director[[k, i, j, 0]],
            field.director[[k, i, j, 1]],
            field.director[[k, i, j, 2]],
        ];
        if id != NEMATIC_ID || n == [0.0; 3] {
            continue;
        }
        let packed: [Complex64; 6] = std::array::from_fn(|c| tensor[[k, i, j, c]]);
        let m = tensor_to_matrix(&packed);
        for row in 0..3 {
            let en: Complex64 = (0..3).map(|col| m[row][col] * n[col]).sum();
            assert_abs_diff_eq!(en.re, eps[2].re * n[row], epsilon = 1e-9);
        }
    }
}

#[test]
fn test_illumination_survives_save_and_load() {
    let config = Config {
        backend: BackendChoice::Sequential,
        ..Default::default()
    };
    let data = illumination_data(
        (8, 8),
        &[500.0, 600.0],
        100.0,
        &IlluminationParams::default(),
        &config,
    )
    .unwrap();

    let path = std::env::temp_dir().join(format!("nemato_e2e_{}", std::process::id()));
    let written = save_field_data(&path, &data, &config).unwrap();
    assert_eq!(written.extension().and_then(|e| e.to_str()), Some("dtmf"));

    let back = load_field(&written).unwrap();
    std::fs::remove_file(&written).unwrap();
    assert_eq!(back, data);

    let intensity = back.intensity().unwrap();
    for v in intensity.iter() {
        assert_abs_diff_eq!(*v, 0.5, epsilon = 1e-9);
    }
}
