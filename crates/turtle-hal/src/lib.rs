//! `turtle-hal` – simulated hardware for headless runs and CI.
//!
//! # Modules
//!
//! - [`sim`] – [`SimTurtle`][sim::SimTurtle], a lockstep unicycle model that
//!   acts as both velocity sink and pose feed, and
//!   [`SimClock`][sim::SimClock], a virtual pacer that never sleeps.

pub mod sim;

pub use sim::{SimClock, SimTurtle};
