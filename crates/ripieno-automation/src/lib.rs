//! Automation timelines and lanes for Ripieno.
//!
//! An [`Automation`] holds sorted [`Acceleration`] points for one port. An
//! [`AutomationLane`] samples it once per period on the
//! [`MINIMUM_ACCELERATION_LENGTH`] grid and writes the result into the port.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use ripieno_automation::{Acceleration, Automation, AutomationLane, AutomationPosition};
//! use ripieno_core::{LoopRange, ParameterRange, Port};
//!
//! let automation = Automation::new("./volume[0]", 0, ParameterRange::linear(0.0, 1.0, 1.0));
//! automation.add_acceleration(Acceleration::new(0.0, 0.25)).unwrap();
//!
//! let lane = AutomationLane::new(Arc::new(automation));
//! let port = Port::double("./volume[0]", ParameterRange::linear(0.0, 1.0, 1.0));
//! lane.apply(&port, AutomationPosition::at(0, 0, 12.5, LoopRange::default()));
//! assert_eq!(port.read_f64(), 0.25);
//! ```

pub mod error;
pub use error::{Error, Result};

mod acceleration;
mod automation;
mod lane;

pub use acceleration::Acceleration;
pub use automation::{Automation, AutomationDocument};
pub use lane::{quantize, AutomationLane, AutomationPosition, MINIMUM_ACCELERATION_LENGTH};
