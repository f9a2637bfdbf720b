use clap::Parser;
use diffik_lib::control_loop::ControlLoop;
use diffik_lib::tasks::Target;
use diffik_lib::utils::config_parser::Settings;
use diffik_lib::{Configuration, LogVisualizer, RateLimiter};
use nalgebra::{Isometry3, Translation3};
use std::path::PathBuf;
use std::sync::Arc;

/// Track a circle with the tool of a planar arm
#[derive(Parser)]
struct Cli {
    /// Specify path to the settings file.
    #[arg(short, long, default_value = "configs/arm.toml", value_name = "FILE PATH")]
    settings: PathBuf,
    /// Radius of the circle
    #[arg(short, long, default_value_t = 0.2)]
    radius: f64,
    /// Angular frequency of the target [rad] / [s]
    #[arg(short, long, default_value_t = 1.0)]
    omega: f64,
    /// Number of control iterations
    #[arg(short, long, default_value_t = 1000)]
    iterations: u64,
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
    let center = configuration.get_transform_frame_to_world("tool")?;

    let rate = RateLimiter::new(settings.frequency)?.with_name("arm");
    let mut control = ControlLoop::new(configuration, tasks, rate, LogVisualizer::default())?
        .with_settings(settings.ik_settings())?;

    let (radius, omega) = (args.radius, args.omega);
    let n = control.run_for(args.iterations, |t, tasks, _| {
        let (s, c) = (omega * t).sin_cos();
        let offset = Translation3::new(radius * (c - 1.0), radius * s, 0.0);
        let target = Isometry3::from_parts(offset * center.translation, center.rotation);
        for task in tasks.iter_mut().filter(|task| task.frame() == Some("tool")) {
            task.set_target(Target::Pose(target))?;
        }
        Ok(())
    })?;

    let tool = control.configuration().get_transform_frame_to_world("tool")?;
    log::info!(
        "Ran {n} iterations, tool at [{:.3}, {:.3}, {:.3}]",
        tool.translation.vector.x,
        tool.translation.vector.y,
        tool.translation.vector.z
    );
    Ok(())
}
