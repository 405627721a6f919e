use crate::config::EngineConfig;
use crate::conditions::Condition;
use crate::engine::context::Services;
use crate::engine::event::{Event, EventId};
use crate::engine::notification::{Notification, NotificationPayload, NotificationSink};
use crate::engine::scheduler::{Scheduler, StepReport};
use crate::entities::creature::CreditKind;
use crate::operations::Operation;
use crate::requests::{describe_failure, handle_intent};
use crate::telemetry::logging;
use crate::world::seed::ScriptedIntent;
use crate::world::state::World;
use crate::world::time::{Clock, GameTick};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ServerSignal {
    Running = 0,
    Shutdown = 1,
}

/// Stop flag shared between the engine loop and whoever wants it to end.
#[derive(Debug)]
pub struct ServerControl {
    signal: AtomicU8,
}

impl ServerControl {
    pub fn new() -> Self {
        Self {
            signal: AtomicU8::new(ServerSignal::Running as u8),
        }
    }

    pub fn request_shutdown(&self) {
        self.signal.store(ServerSignal::Shutdown as u8, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        matches!(self.current_signal(), ServerSignal::Running)
    }

    fn current_signal(&self) -> ServerSignal {
        match self.signal.load(Ordering::SeqCst) {
            0 => ServerSignal::Running,
            _ => ServerSignal::Shutdown,
        }
    }
}

impl Default for ServerControl {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub steps: u64,
    pub executed: u64,
    pub faulted: u64,
    pub rejected: u64,
    pub finished_at: GameTick,
}

/// World, scheduler and collaborators wired together, plus the intents
/// still waiting to be replayed.
pub struct Engine {
    pub scheduler: Scheduler,
    pub world: World,
    pub services: Services,
    script: VecDeque<ScriptedIntent>,
    background: Vec<EventId>,
    started: GameTick,
    summary: RunSummary,
}

impl Engine {
    pub fn new(
        clock: Arc<dyn Clock>,
        config: EngineConfig,
        world: World,
        script: Vec<ScriptedIntent>,
        notifications: Box<dyn NotificationSink>,
    ) -> Self {
        let services = Services::from_config(&config, notifications);
        let scheduler = Scheduler::new(clock, config);
        let started = scheduler.current_time();
        let mut script = script;
        script.sort_by_key(|entry| entry.at_ms);
        Self {
            scheduler,
            world,
            services,
            script: script.into(),
            background: Vec::new(),
            started,
            summary: RunSummary::default(),
        }
    }

    /// Queues the work every world starts with: credit refills for each
    /// creature and decay for items that decay on their own.
    pub fn bootstrap(&mut self) {
        let creatures: Vec<_> = self.world.creatures().map(|creature| creature.id).collect();
        for creature in creatures {
            for credit in [CreditKind::Attack, CreditKind::Defense] {
                let event = Event::operation(creature, Operation::restore_combat_credit(credit))
                    .non_cancellable()
                    .excluded_from_telemetry();
                let delay = self.scheduler.config().credit_restore_interval();
                self.background.push(self.scheduler.schedule(event, delay));
            }
        }

        let now = self.scheduler.current_time();
        let mut decaying = Vec::new();
        for tile in self.world.map.tiles() {
            for id in tile.item_ids() {
                let Some(item) = tile.find_item(id) else {
                    continue;
                };
                if let Some(duration) = self
                    .world
                    .item_types
                    .get(item.type_id)
                    .and_then(|item_type| item_type.decay_duration())
                {
                    decaying.push(Condition::decay(id, now.after(duration)));
                }
            }
        }
        let count = decaying.len();
        for condition in decaying {
            self.scheduler.raise_condition(condition);
        }
        logging::log_game(&format!(
            "engine bootstrapped: {} creatures, {} decaying items",
            self.world.creatures().count(),
            count
        ));
    }

    /// Feeds due script entries, then runs one scheduler step.
    pub fn tick(&mut self) -> StepReport {
        let now = self.scheduler.current_time();
        let elapsed = self.started.until(now).as_millis() as u64;
        while self.script.front().map_or(false, |entry| entry.at_ms <= elapsed) {
            let Some(entry) = self.script.pop_front() else {
                break;
            };
            if let Err(err) = handle_intent(
                &mut self.scheduler,
                &self.world,
                entry.actor,
                entry.intent.clone(),
                now,
            ) {
                self.summary.rejected += 1;
                logging::log_game(&format!(
                    "intent {:?} of creature {} rejected: {}",
                    entry.intent, entry.actor.0, err
                ));
            }
        }

        let report = self.scheduler.step(&mut self.world, &mut self.services);
        for entry in &report.reports {
            if entry.requestor.is_system() {
                continue;
            }
            if let Some(text) = describe_failure(entry) {
                self.services.notifications.dispatch(Notification::to_creature(
                    entry.requestor,
                    NotificationPayload::TextMessage(text.to_string()),
                ));
            }
        }
        self.summary.steps += 1;
        self.summary.executed += report.executed as u64;
        self.summary.faulted += report.faulted as u64;
        self.summary.finished_at = now;
        report
    }

    /// No script left and nothing queued beyond the credit refills.
    pub fn is_idle(&self) -> bool {
        if !self.script.is_empty() {
            return false;
        }
        let background = self
            .background
            .iter()
            .filter(|id| self.scheduler.contains(**id))
            .count();
        self.scheduler.len() <= background
    }

    pub fn summary(&self) -> RunSummary {
        self.summary
    }
}

/// Steps the engine every tick until told to stop, the run time is up, or
/// there is nothing left to do.
pub fn run_engine(engine: &mut Engine, control: &ServerControl) -> RunSummary {
    let tick = engine.scheduler.config().tick();
    let run_for = engine.scheduler.config().run_for();
    let started = engine.scheduler.current_time();
    while control.is_running() {
        engine.tick();
        let elapsed = started.until(engine.scheduler.current_time());
        if run_for.map_or(engine.is_idle(), |limit| elapsed >= limit) {
            break;
        }
        std::thread::sleep(sleep_until_next(engine, tick));
    }
    let summary = engine.summary();
    logging::log_game(&format!(
        "engine stopped after {} steps: executed={}, faulted={}, rejected={}",
        summary.steps, summary.executed, summary.faulted, summary.rejected
    ));
    summary
}

fn sleep_until_next(engine: &mut Engine, tick: Duration) -> Duration {
    let now = engine.scheduler.current_time();
    match engine.scheduler.next_due() {
        Some(due) if due > now => now.until(due).min(tick),
        Some(_) => Duration::ZERO,
        None => tick,
    }
}
