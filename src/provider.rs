//! Identity provider descriptors (data) and strategies (behavior).
//!
//! `descriptor` holds the validated endpoints derived from a configured authority, the enabled
//! grants, and the client authentication preference. `strategy` defines [`ProviderStrategy`],
//! which maps token endpoint failures into the portal error taxonomy.

pub mod descriptor;
pub mod strategy;

pub use descriptor::*;
pub use strategy::*;
