//! Static compartment geometry shared by both projection pipelines

pub mod events;
pub mod loader;
pub mod mapping;

pub use events::Events;
pub use loader::{load_compartment_geometry, CompartmentGeometry};
pub use mapping::{compute_inverse_mapping, FlatInverseMapping, MappingElement};
