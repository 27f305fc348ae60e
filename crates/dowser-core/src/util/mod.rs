//! Utility types shared across the solver.
//!
//! - [`Rng`] - seedable random number generation for base-address rotation
//! - [`NamedProgress`] - labelled progress-bar styles

mod named_progress;
mod rng;

pub use self::named_progress::NamedProgress;
pub use self::rng::Rng;
