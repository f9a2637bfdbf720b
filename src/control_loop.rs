use crate::errors::{Error, Result};
use crate::solver::{solve_ik, IkSettings, QpRegistry};
use crate::spacetime::configuration::Configuration;
use crate::tasks::{Target, Task};
use crate::utils::rate_limiter::RateLimiter;
use crate::visualization::Visualizer;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Solving,
    Integrating,
    Rendering,
    Sleeping,
}

/// Shared flag stopping [`ControlLoop::run`] at the next iteration boundary.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Fixed-rate differential IK loop: update targets, solve, integrate,
/// render, sleep.
pub struct ControlLoop<V: Visualizer> {
    configuration: Configuration,
    tasks: Vec<Box<dyn Task + Send>>,
    registry: QpRegistry,
    settings: IkSettings,
    rate: RateLimiter,
    visualizer: V,
    state: LoopState,
    t: f64,
    iterations: u64,
    cancel: CancelToken,
}

impl<V: Visualizer> ControlLoop<V> {
    pub fn new(
        configuration: Configuration,
        tasks: Vec<Box<dyn Task + Send>>,
        rate: RateLimiter,
        visualizer: V,
    ) -> Result<Self> {
        if tasks.is_empty() {
            return Err(Error::EmptyTaskList);
        }
        let registry = QpRegistry::default();
        log::info!(
            "Control loop at {:.1} Hz with {} tasks, solvers {:?}",
            rate.frequency(),
            tasks.len(),
            registry.available_solvers()
        );
        Ok(Self {
            configuration,
            tasks,
            registry,
            settings: IkSettings::default(),
            rate,
            visualizer,
            state: LoopState::Idle,
            t: 0.0,
            iterations: 0,
            cancel: CancelToken::default(),
        })
    }

    /// Fails with [`Error::SolverUnavailable`] if the selected solver is not
    /// registered.
    pub fn with_settings(mut self, settings: IkSettings) -> Result<Self> {
        self.registry.get(settings.solver.as_deref())?;
        self.settings = settings;
        Ok(self)
    }

    pub fn with_registry(mut self, registry: QpRegistry) -> Result<Self> {
        registry.get(self.settings.solver.as_deref())?;
        self.registry = registry;
        Ok(self)
    }

    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    pub fn tasks(&self) -> &[Box<dyn Task + Send>] {
        &self.tasks
    }

    pub fn tasks_mut(&mut self) -> &mut [Box<dyn Task + Send>] {
        &mut self.tasks
    }

    pub fn visualizer(&self) -> &V {
        &self.visualizer
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Time accumulator, advanced by the nominal period every iteration.
    pub fn time(&self) -> f64 {
        self.t
    }

    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Runs one iteration. `update` receives the loop time, the tasks and the
    /// current configuration, and moves the targets.
    ///
    /// On error the configuration is left untouched.
    pub fn step<F>(&mut self, update: &mut F) -> Result<()>
    where
        F: FnMut(f64, &mut [Box<dyn Task + Send>], &Configuration) -> Result<()>,
    {
        let res = self.try_step(update);
        if let Err(e) = &res {
            log::error!("Iteration {} at t = {:.3} s failed: {e}", self.iterations, self.t);
        }
        self.state = LoopState::Idle;
        res
    }

    fn try_step<F>(&mut self, update: &mut F) -> Result<()>
    where
        F: FnMut(f64, &mut [Box<dyn Task + Send>], &Configuration) -> Result<()>,
    {
        let t1 = Instant::now();
        let dt = self.rate.dt();

        self.state = LoopState::Solving;
        update(self.t, self.tasks.as_mut_slice(), &self.configuration)?;
        let velocity = solve_ik(&self.configuration, &self.tasks, dt, &self.registry, &self.settings)?;

        self.state = LoopState::Integrating;
        let q = self.configuration.integrate(&velocity, dt)?;
        self.configuration = Configuration::new(self.configuration.model().clone(), q)?;

        self.state = LoopState::Rendering;
        self.render();
        log::debug!("iteration {} computed in {:.3?}", self.iterations, t1.elapsed());

        self.state = LoopState::Sleeping;
        self.rate.sleep();
        self.t += dt;
        self.iterations += 1;
        Ok(())
    }

    fn render(&mut self) {
        for task in &self.tasks {
            let Some(frame) = task.frame() else { continue };
            if let Some(Target::Pose(target)) = task.target() {
                if let Err(e) = self.visualizer.set_transform(&format!("{frame}_target"), &target) {
                    log::warn!("Cannot draw target of {frame}: {e}");
                }
            }
            match self.configuration.get_transform_frame_to_world(frame) {
                Ok(transform) => {
                    if let Err(e) = self.visualizer.set_transform(frame, &transform) {
                        log::warn!("Cannot draw {frame}: {e}");
                    }
                }
                Err(e) => log::warn!("Cannot draw {frame}: {e}"),
            }
        }
        if let Err(e) = self.visualizer.display(self.configuration.q()) {
            log::warn!("Display failed: {e}");
        }
    }

    /// Loops until the cancel token is set or an iteration fails. Returns the
    /// number of completed iterations.
    pub fn run<F>(&mut self, mut update: F) -> Result<u64>
    where
        F: FnMut(f64, &mut [Box<dyn Task + Send>], &Configuration) -> Result<()>,
    {
        let start = self.iterations;
        while !self.cancel.is_cancelled() {
            self.step(&mut update)?;
        }
        let completed = self.iterations - start;
        log::info!("Control loop cancelled after {completed} iterations");
        Ok(completed)
    }

    /// Runs at most `iterations` iterations, stopping early on cancellation.
    pub fn run_for<F>(&mut self, iterations: u64, mut update: F) -> Result<u64>
    where
        F: FnMut(f64, &mut [Box<dyn Task + Send>], &Configuration) -> Result<()>,
    {
        let start = self.iterations;
        while self.iterations - start < iterations && !self.cancel.is_cancelled() {
            self.step(&mut update)?;
        }
        Ok(self.iterations - start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::{QpBackend, QpProblem};
    use crate::spacetime::model::{JointKind, JointLimits, RobotModel, RootJoint};
    use crate::tasks::PostureTask;
    use crate::visualization::LogVisualizer;
    use approx::assert_relative_eq;
    use nalgebra::{DVector, Isometry3, Unit, Vector3};

    struct Failing;

    /// Sink refusing every frame.
    #[derive(Default)]
    struct BrokenDisplay {
        attempts: usize,
    }

    impl Visualizer for BrokenDisplay {
        fn display(&mut self, _q: &DVector<f64>) -> Result<()> {
            self.attempts += 1;
            Err(Error::Visualization {
                reason: "display closed".to_string(),
            })
        }

        fn set_transform(&mut self, name: &str, _transform: &Isometry3<f64>) -> Result<()> {
            Err(Error::Visualization {
                reason: format!("no marker {name}"),
            })
        }
    }

    impl QpBackend for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn solve(&self, _problem: &QpProblem) -> Result<DVector<f64>> {
            Err(Error::Infeasible {
                reason: "test".to_string(),
            })
        }
    }

    fn single_joint() -> Configuration {
        let mut model = RobotModel::new("pendulum", RootJoint::Fixed);
        let axis = Unit::new_normalize(Vector3::y());
        model
            .add_joint("hinge", JointKind::Revolute { axis }, None, Isometry3::identity(), JointLimits::unbounded())
            .unwrap();
        Configuration::neutral(std::sync::Arc::new(model)).unwrap()
    }

    fn posture_loop(target: f64) -> ControlLoop<LogVisualizer> {
        let configuration = single_joint();
        let mut task = PostureTask::new(1.0).unwrap();
        task.set_target(Target::Posture(DVector::from_element(1, target))).unwrap();
        let rate = RateLimiter::new(1000.0).unwrap();
        let settings = IkSettings {
            solver: Some("kkt".to_string()),
            ..IkSettings::default()
        };
        ControlLoop::new(configuration, vec![Box::new(task)], rate, LogVisualizer::default())
            .unwrap()
            .with_settings(settings)
            .unwrap()
    }

    #[test]
    fn requires_tasks() {
        let rate = RateLimiter::new(10.0).unwrap();
        let res = ControlLoop::new(single_joint(), Vec::new(), rate, LogVisualizer::default());
        assert!(matches!(res, Err(Error::EmptyTaskList)));
    }

    #[test]
    fn steps_towards_target() {
        let mut control = posture_loop(0.5);
        let n = control.run_for(3, |_, _, _| Ok(())).unwrap();
        assert_eq!(n, 3);
        assert_eq!(control.state(), LoopState::Idle);
        assert_eq!(control.visualizer().frames_displayed, 3);
        assert_relative_eq!(control.time(), 0.003, epsilon = 1e-9);
        // Unit gain reaches the target in one step
        assert_relative_eq!(control.configuration().q()[0], 0.5, epsilon = 1e-6);
    }

    #[test]
    fn cancel_stops_the_loop() {
        let mut control = posture_loop(0.5);
        let token = control.cancel_token();
        let n = control
            .run(|t, _, _| {
                if t >= 0.0045 {
                    token.cancel();
                }
                Ok(())
            })
            .unwrap();
        assert_eq!(n, 6);
        assert!(control.cancel_token().is_cancelled());
    }

    #[test]
    fn failed_solve_leaves_configuration_untouched() {
        let mut registry = QpRegistry::empty();
        registry.register(Box::new(Failing));
        let mut control = posture_loop(0.5).with_settings(IkSettings::default()).unwrap();
        control = control.with_registry(registry).unwrap();
        let res = control.step(&mut |_, _, _| Ok(()));
        assert!(matches!(res, Err(Error::Infeasible { .. })));
        assert_eq!(control.iterations(), 0);
        assert_eq!(control.state(), LoopState::Idle);
        assert_relative_eq!(control.configuration().q()[0], 0.0);
        assert_eq!(control.visualizer().frames_displayed, 0);
    }

    #[test]
    fn update_moves_targets() {
        let mut control = posture_loop(0.0);
        control
            .run_for(2, |t, tasks, _| tasks[0].set_target(Target::Posture(DVector::from_element(1, 100.0 * t))))
            .unwrap();
        assert_relative_eq!(control.configuration().q()[0], 0.1, epsilon = 1e-6);
    }

    #[test]
    fn render_failures_do_not_stop_the_loop() {
        let mut model = RobotModel::new("arm", RootJoint::Fixed);
        let axis = Unit::new_normalize(Vector3::z());
        let hinge = model
            .add_joint("hinge", JointKind::Revolute { axis }, None, Isometry3::identity(), JointLimits::unbounded())
            .unwrap();
        model
            .add_frame("tip", Some(hinge), Isometry3::translation(1.0, 0.0, 0.0))
            .unwrap();
        let configuration = Configuration::neutral(std::sync::Arc::new(model)).unwrap();

        let mut tip = crate::tasks::FrameTask::new("tip", 1.0, 0.0).unwrap();
        tip.set_target(Target::Pose(Isometry3::translation(0.0, 1.0, 0.0))).unwrap();
        let rate = RateLimiter::new(1000.0).unwrap();
        let settings = IkSettings {
            solver: Some("kkt".to_string()),
            ..IkSettings::default()
        };
        let mut control = ControlLoop::new(configuration, vec![Box::new(tip)], rate, BrokenDisplay::default())
            .unwrap()
            .with_settings(settings)
            .unwrap();

        control.step(&mut |_, _, _| Ok(())).unwrap();
        assert_eq!(control.iterations(), 1);
        assert_eq!(control.visualizer().attempts, 1);
        assert_eq!(control.state(), LoopState::Idle);
        assert!(control.configuration().q()[0] > 0.0);
    }

    #[test]
    fn run_counts_iterations_of_this_call() {
        let mut control = posture_loop(0.5);
        control.run_for(2, |_, _, _| Ok(())).unwrap();
        let token = control.cancel_token();
        let n = control
            .run(|_, _, _| {
                token.cancel();
                Ok(())
            })
            .unwrap();
        assert_eq!(n, 1);
        assert_eq!(control.iterations(), 3);
    }
}
