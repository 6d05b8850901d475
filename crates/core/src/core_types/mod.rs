//! Core types and utilities

pub mod aabb;
pub mod buffer;
pub mod time;
pub mod vec3;

pub use aabb::Aabb;
pub use buffer::{AlignedBuffer, ALIGNMENT};
pub use time::{time_suffix, TimeRangeRequest, Timeline};
pub use vec3::{Dims, Vec3};
