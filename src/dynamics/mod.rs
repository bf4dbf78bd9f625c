//! Rigid-body dynamics: accelerations, contact friction, integration, and
//! derived observables.

pub mod accelerations;
pub mod auxiliary;
pub mod friction;
pub mod integrators;
pub mod propagate;
pub mod state;

pub use accelerations::{AccelOutput, Accelerations};
pub use auxiliary::{AirData, Auxiliary};
pub use integrators::Scheme;
pub use propagate::Propagate;
pub use state::{EulerAngles, FrameTransforms, VehicleState};
