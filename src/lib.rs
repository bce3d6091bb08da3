//! # Nemato
//!
//! Umbrella crate re-exporting the Nemato workspace crates. See
//! [`nemato_core`] for the rotation engine and field data model.

pub use nemato_compute as compute;
pub use nemato_core as core;
pub use nemato_geometry as geometry;
pub use nemato_materials as materials;
