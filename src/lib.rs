pub mod conditions;
pub mod config;
pub mod engine;
pub mod entities;
pub mod operations;
pub mod requests;
pub mod server;
pub mod telemetry;
pub mod world;

pub use engine::error::EngineError;
pub use engine::event::{Event, EventId, PartitionKey};
pub use engine::outcome::{EventReport, Outcome};
pub use engine::scheduler::{Scheduler, SchedulerHandle, StepReport};
pub use server::{run_engine, Engine, RunSummary, ServerControl};

use engine::notification::ChannelSink;
use std::sync::Arc;

pub fn run(args: &[String]) -> Result<(), String> {
    let config = config::AppConfig::from_args(args)?;
    telemetry::logging::init(&config.root)?;

    let seed = world::seed::WorldSeed::load(&config.world_path())?;
    let world = seed.build()?;
    println!("tibia-core: world loaded");
    println!("- root: {}", config.root.display());
    println!("- item types: {}", world.item_types.len());
    println!("- tiles: {}", world.map.tile_count());
    println!("- creatures: {}", world.creatures().count());
    println!("- scripted intents: {}", seed.script.len());
    telemetry::logging::log_game(&format!(
        "world loaded: types={}, tiles={}, creatures={}",
        world.item_types.len(),
        world.map.tile_count(),
        world.creatures().count()
    ));

    let (sink, notifications) = ChannelSink::new();
    let listener = std::thread::spawn(move || notifications.iter().count());

    let clock = Arc::new(world::time::SystemClock::new());
    let mut engine = Engine::new(
        clock,
        config.engine.clone(),
        world,
        seed.sorted_script(),
        Box::new(sink),
    );
    engine.bootstrap();
    let control = ServerControl::new();
    let summary = run_engine(&mut engine, &control);
    drop(engine);

    let delivered = listener
        .join()
        .map_err(|_| "notification listener panicked".to_string())?;
    println!(
        "tibia-core: stopped at {} after {} steps",
        summary.finished_at, summary.steps
    );
    println!("- executed: {}", summary.executed);
    println!("- faulted: {}", summary.faulted);
    println!("- rejected intents: {}", summary.rejected);
    println!("- notifications: {}", delivered);
    Ok(())
}
