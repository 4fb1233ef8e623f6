//! `turtle-runtime` – closed-loop motion control for a planar turtle.
//!
//! # Modules
//!
//! - [`controller`] – [`MotionController`][controller::MotionController]:
//!   the three motion primitives (straight move, in-place rotation and arc
//!   tracing) running on a shared fixed-rate publish/poll loop over any
//!   [`VelocitySink`][turtle_middleware::VelocitySink] +
//!   [`PoseFeed`][turtle_middleware::PoseFeed] link.
//! - [`rate`] – [`LoopRate`][rate::LoopRate]: wall-clock pacer that keeps
//!   the loop at its nominal rate.
//! - [`sequencer`] – [`Sequencer`][sequencer::Sequencer]: walks a scripted
//!   list of primitives, either once or repeating the first step until
//!   shutdown.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: console
//!   logging plus optional OTLP span export.

pub mod controller;
pub mod rate;
pub mod sequencer;
pub mod telemetry;

pub use controller::{MotionController, MotionReport, Primitive, SampleGate};
pub use rate::LoopRate;
pub use sequencer::{MotionStep, SequenceMode, SequenceSummary, Sequencer, turtle_script};
pub use telemetry::{LogFormat, TracerProviderGuard, init_tracing};
