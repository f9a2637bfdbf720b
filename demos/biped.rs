use clap::Parser;
use diffik_lib::control_loop::ControlLoop;
use diffik_lib::loader::{ModelLoader, UrdfLoader};
use diffik_lib::spacetime::custom_configuration_vector;
use diffik_lib::tasks::{FrameTask, PostureTask, Target, Task};
use diffik_lib::{Configuration, IkSettings, LogVisualizer, RateLimiter, RootJoint};
use std::path::PathBuf;

/// Crouch a wheeled biped by moving its base down and up
#[derive(Parser)]
struct Cli {
    /// Directory holding robot descriptions
    #[arg(long, default_value = "assets")]
    assets: PathBuf,
    /// Name of the robot description
    #[arg(long, default_value = "upkie")]
    robot: String,
    /// Crouching amplitude [m]
    #[arg(short, long, default_value_t = 0.05)]
    amplitude: f64,
    /// Number of control iterations
    #[arg(short, long, default_value_t = 600)]
    iterations: u64,
    /// QP solver
    #[arg(long)]
    solver: Option<String>,
}

fn main() -> diffik_lib::Result<()> {
    env_logger::init();
    let args = Cli::parse();
    let description = UrdfLoader::new(&[&args.assets]).load(&args.robot, RootJoint::FreeFlyer)?;
    let q0 = custom_configuration_vector(&description.model, &[("left_knee", 0.2), ("right_knee", -0.2)])?;
    let configuration = Configuration::new(description.model, q0)?;

    let mut base_task = FrameTask::new("base", 1.0, 1.0)?;
    let mut left_wheel = FrameTask::new("left_wheel_tire", 1.0, 0.0)?;
    let mut right_wheel = FrameTask::new("right_wheel_tire", 1.0, 0.0)?;
    let mut posture = PostureTask::new(1e-3)?;
    base_task.set_target_from_configuration(&configuration)?;
    left_wheel.set_target_from_configuration(&configuration)?;
    right_wheel.set_target_from_configuration(&configuration)?;
    posture.set_target_from_configuration(&configuration)?;
    let start = configuration.get_transform_frame_to_world("base")?;

    let tasks: Vec<Box<dyn Task + Send>> = vec![
        Box::new(base_task),
        Box::new(left_wheel),
        Box::new(right_wheel),
        Box::new(posture),
    ];
    let settings = IkSettings {
        solver: args.solver,
        ..IkSettings::default()
    };
    let rate = RateLimiter::new(200.0)?.with_name("biped");
    let mut control =
        ControlLoop::new(configuration, tasks, rate, LogVisualizer::default())?.with_settings(settings)?;

    let amplitude = args.amplitude;
    control.run_for(args.iterations, |t, tasks, _| {
        let mut target = start;
        target.translation.vector.z -= amplitude * (1.0 - t.cos()) / 2.0;
        tasks[0].set_target(Target::Pose(target))
    })?;

    let base = control.configuration().get_transform_frame_to_world("base")?;
    log::info!("Base height {:.3} m after {} iterations", base.translation.vector.z, control.iterations());
    Ok(())
}
