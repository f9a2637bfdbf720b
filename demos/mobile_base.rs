use clap::Parser;
use diffik_lib::control_loop::ControlLoop;
use diffik_lib::tasks::Target;
use diffik_lib::utils::config_parser::Settings;
use diffik_lib::{Configuration, LogVisualizer, RateLimiter};
use nalgebra::{Isometry3, Translation3, UnitQuaternion};
use std::path::PathBuf;
use std::sync::Arc;

/// Drive a planar mobile base so that its camera follows a line
#[derive(Parser)]
struct Cli {
    /// Specify path to the settings file.
    #[arg(short, long, default_value = "configs/mobile_base.toml", value_name = "FILE PATH")]
    settings: PathBuf,
    /// Forward speed of the target [m] / [s]
    #[arg(long, default_value_t = 0.3)]
    speed: f64,
    /// Yaw rate of the target [rad] / [s]
    #[arg(long, default_value_t = 0.2)]
    yaw_rate: f64,
    /// Duration of the run [s]
    #[arg(short, long, default_value_t = 5.0)]
    duration: f64,
}

fn main() -> diffik_lib::Result<()> {
    env_logger::init();
    let args = Cli::parse();
    let settings = Settings::from_settings_file(&args.settings)?;
    let model = Arc::new(settings.load_model()?);
    let q0 = settings.initial_configuration(&model)?;
    let configuration = Configuration::new(model, q0)?;

    let mut tasks = settings.build_tasks()?;
    for task in tasks.iter_mut() {
        task.set_target_from_configuration(&configuration)?;
    }
    let start = configuration.get_transform_frame_to_world("camera")?;

    let rate = RateLimiter::new(settings.frequency)?.with_name("mobile base");
    let iterations = (args.duration * rate.frequency()).round() as u64;
    let mut control = ControlLoop::new(configuration, tasks, rate, LogVisualizer::default())?
        .with_settings(settings.ik_settings())?;

    let (speed, yaw_rate) = (args.speed, args.yaw_rate);
    control.run_for(iterations, |t, tasks, _| {
        let motion = Isometry3::from_parts(
            Translation3::new(speed * t, 0.0, 0.0),
            UnitQuaternion::from_euler_angles(0.0, 0.0, yaw_rate * t),
        );
        let target = start * motion;
        for task in tasks.iter_mut().filter(|task| task.frame() == Some("camera")) {
            task.set_target(Target::Pose(target))?;
        }
        Ok(())
    })?;

    let q = control.configuration().q();
    log::info!("Base at x = {:.3}, y = {:.3}, yaw = {:.3}", q[0], q[1], q[3].atan2(q[2]));
    Ok(())
}
