//! [`Sequencer`] – runs a scripted list of motion primitives.
//!
//! The built-in programme ([`turtle_script`]) is:
//!
//! ```text
//! trace_arc(1.0, π)
//! rotate(π + π/2)
//! trace_arc(1.0, π)
//! move(1.9)
//! rotate(π)
//! rotate(π + π/2)
//! move(4.0)
//! ```
//!
//! Two execution modes exist.  [`SequenceMode::RepeatFirst`] traces the
//! first step forever and never reaches the rest of the script.
//! [`SequenceMode::Once`] walks the whole script a single time.
//!
//! A shutdown flag is honoured between steps only.  Once a primitive has
//! started it runs to completion.

use std::f64::consts::PI;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use turtle_middleware::{Pacer, PoseFeed, VelocitySink};

use crate::controller::{MotionController, MotionReport};

/// One entry of a motion script.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MotionStep {
    Move { distance: f64 },
    Rotate { angle: f64 },
    TraceArc { radius: f64, sweep: f64 },
}

impl MotionStep {
    /// Run this step to completion on `controller`.
    pub fn execute<L, P>(&self, controller: &mut MotionController<L, P>) -> MotionReport
    where
        L: VelocitySink + PoseFeed,
        P: Pacer,
    {
        match *self {
            MotionStep::Move { distance } => controller.move_distance(distance),
            MotionStep::Rotate { angle } => controller.rotate(angle),
            MotionStep::TraceArc { radius, sweep } => controller.trace_arc(radius, sweep),
        }
    }
}

/// The scripted turtle programme.
pub fn turtle_script() -> Vec<MotionStep> {
    vec![
        MotionStep::TraceArc { radius: 1.0, sweep: PI },
        MotionStep::Rotate { angle: PI + PI / 2.0 },
        MotionStep::TraceArc { radius: 1.0, sweep: PI },
        MotionStep::Move { distance: 1.9 },
        MotionStep::Rotate { angle: PI },
        MotionStep::Rotate { angle: PI + PI / 2.0 },
        MotionStep::Move { distance: 4.0 },
    ]
}

/// How a [`Sequencer`] walks its script.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SequenceMode {
    /// Execute the first step over and over until shutdown.
    #[default]
    RepeatFirst,
    /// Execute every step once, in order.
    Once,
}

/// Totals for a finished sequencer run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SequenceSummary {
    pub steps: u64,
    pub ticks: u64,
}

impl SequenceSummary {
    fn record(&mut self, report: MotionReport) {
        self.steps += 1;
        self.ticks += report.ticks;
    }
}

/// Drives a [`MotionController`] through a list of [`MotionStep`]s.
pub struct Sequencer {
    steps: Vec<MotionStep>,
    mode: SequenceMode,
    shutdown: Arc<AtomicBool>,
}

impl Sequencer {
    pub fn new(steps: Vec<MotionStep>, mode: SequenceMode) -> Self {
        Self {
            steps,
            mode,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Observe `flag` between steps; the run ends once it reads `true`.
    pub fn with_shutdown(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown = flag;
        self
    }

    /// Run the script.
    ///
    /// In [`SequenceMode::RepeatFirst`] this only returns after shutdown is
    /// requested (or immediately for an empty script).
    pub fn run<L, P>(&self, controller: &mut MotionController<L, P>) -> SequenceSummary
    where
        L: VelocitySink + PoseFeed,
        P: Pacer,
    {
        let mut summary = SequenceSummary::default();
        info!(mode = ?self.mode, steps = self.steps.len(), "sequence starting");

        match self.mode {
            SequenceMode::RepeatFirst => {
                let Some(first) = self.steps.first() else {
                    warn!("empty motion script; nothing to repeat");
                    return summary;
                };
                while !self.shutdown_requested() {
                    summary.record(first.execute(controller));
                }
            }
            SequenceMode::Once => {
                for step in &self.steps {
                    if self.shutdown_requested() {
                        break;
                    }
                    summary.record(step.execute(controller));
                }
            }
        }

        info!(steps = summary.steps, ticks = summary.ticks, "sequence finished");
        summary
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use turtle_hal::{SimClock, SimTurtle};
    use turtle_types::{Pose, VelocityCommand};

    /// Wraps [`SimTurtle`] and raises a shutdown flag after a tick budget.
    struct StoppingTurtle {
        inner: SimTurtle,
        flag: Arc<AtomicBool>,
        stop_after: u64,
    }

    impl VelocitySink for StoppingTurtle {
        fn publish_velocity(&mut self, command: &VelocityCommand) {
            self.inner.publish_velocity(command);
        }
    }

    impl PoseFeed for StoppingTurtle {
        fn poll_pose(&mut self) -> Option<Pose> {
            let pose = self.inner.poll_pose();
            if self.inner.ticks() >= self.stop_after {
                self.flag.store(true, Ordering::Release);
            }
            pose
        }
    }

    /// The built-in script is the seven-step programme.
    #[test]
    fn script_matches_programme() {
        let script = turtle_script();
        assert_eq!(script.len(), 7);
        assert_eq!(script[0], MotionStep::TraceArc { radius: 1.0, sweep: PI });
        assert_eq!(script[3], MotionStep::Move { distance: 1.9 });
        assert_eq!(script[6], MotionStep::Move { distance: 4.0 });
    }

    #[test]
    fn default_mode_repeats_first_step() {
        assert_eq!(SequenceMode::default(), SequenceMode::RepeatFirst);
    }

    /// `Once` walks the whole script on the simulator and ends stopped.
    #[test]
    fn once_runs_every_step_and_leaves_vehicle_stopped() {
        let turtle = SimTurtle::new().with_recording();
        let mut controller = MotionController::new(turtle, SimClock::new());
        let sequencer = Sequencer::new(turtle_script(), SequenceMode::Once);

        let summary = sequencer.run(&mut controller);

        assert_eq!(summary.steps, 7);
        assert_eq!(summary.ticks, controller.pacer().sleeps());
        assert_eq!(controller.link().command(), VelocityCommand::STOP);
        assert_eq!(*controller.link().commands().last().unwrap(), VelocityCommand::STOP);
    }

    /// `RepeatFirst` keeps tracing the first arc until the flag goes up.
    #[test]
    fn repeat_first_only_traces_arcs_until_shutdown() {
        let flag = Arc::new(AtomicBool::new(false));
        let turtle = StoppingTurtle {
            inner: SimTurtle::new().with_recording(),
            flag: Arc::clone(&flag),
            // Longer than one half circle (~3.1k ticks), shorter than two.
            stop_after: 5_000,
        };
        let mut controller = MotionController::new(turtle, SimClock::new());
        let sequencer = Sequencer::new(turtle_script(), SequenceMode::RepeatFirst).with_shutdown(flag);

        let summary = sequencer.run(&mut controller);

        // The second arc was already running when the flag went up and was
        // allowed to finish.
        assert_eq!(summary.steps, 2);
        let commands = controller.link().inner.commands();
        assert!(commands
            .iter()
            .all(|c| *c == VelocityCommand::new(1.0, 1.0) || c.is_stop()));
        assert!(commands.last().unwrap().is_stop());
    }

    /// A raised flag is honoured before the first step in both modes.
    #[test]
    fn shutdown_before_start_runs_nothing() {
        let flag = Arc::new(AtomicBool::new(true));
        let mut controller = MotionController::new(SimTurtle::new(), SimClock::new());

        for mode in [SequenceMode::Once, SequenceMode::RepeatFirst] {
            let sequencer = Sequencer::new(turtle_script(), mode).with_shutdown(Arc::clone(&flag));
            assert_eq!(sequencer.run(&mut controller), SequenceSummary::default());
        }
    }

    #[test]
    fn empty_script_returns_immediately() {
        let mut controller = MotionController::new(SimTurtle::new(), SimClock::new());
        let sequencer = Sequencer::new(Vec::new(), SequenceMode::RepeatFirst);
        assert_eq!(sequencer.run(&mut controller), SequenceSummary::default());
    }
}
