//! Supermarket - headless runner for the NPC behavior simulation
//!
//! Runs a number of store days with a scripted player and logs what the
//! shoppers, shoplifters, kids, Karens and the manager got up to.

mod autoplay;
mod settings;

use anyhow::{Context, Result};
use market_events::{Event, Mailbox, Topic};
use market_sim::{ProbabilityConfig, Simulation, SimulationSetup};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use autoplay::AutoPlayer;
use settings::SimSettings;

/// Outcome tally for one day
#[derive(Debug, Default, Clone, Copy)]
struct DayReport {
    spawned: u32,
    purchased: u32,
    stolen: u32,
    player_attacked: u32,
    tasks_completed: u32,
}

impl DayReport {
    const TOPICS: [Topic; 5] = [
        Topic::AgentSpawned,
        Topic::ItemPurchased,
        Topic::ItemStolen,
        Topic::PlayerAttacked,
        Topic::TaskCompleted,
    ];

    fn record(&mut self, event: &Event) {
        match event {
            Event::AgentSpawned { .. } => self.spawned += 1,
            Event::ItemPurchased { .. } => self.purchased += 1,
            Event::ItemStolen { .. } => self.stolen += 1,
            Event::PlayerAttacked { .. } => self.player_attacked += 1,
            Event::TaskCompleted { .. } => self.tasks_completed += 1,
            _ => {}
        }
    }

    fn add(&mut self, other: &DayReport) {
        self.spawned += other.spawned;
        self.purchased += other.purchased;
        self.stolen += other.stolen;
        self.player_attacked += other.player_attacked;
        self.tasks_completed += other.tasks_completed;
    }
}

fn main() -> Result<()> {
    let settings = SimSettings::load();

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.run.log_level))
        .context("Invalid log filter")?;
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    info!("Starting supermarket simulation...");

    if !SimSettings::exists() {
        if let Err(e) = settings.save() {
            warn!("Failed to write default settings: {}", e);
        }
    }

    let config = match &settings.run.probabilities {
        Some(path) => ProbabilityConfig::load(path)
            .with_context(|| format!("Failed to load probabilities from {}", path.display()))?,
        None => {
            info!("No probability file configured, using built-in tables");
            ProbabilityConfig::with_defaults()
        }
    };
    info!(days = ?config.days().collect::<Vec<_>>(), "Probability tables ready");

    // The player minds the first till
    let post = settings
        .layout
        .checkouts
        .first()
        .copied()
        .unwrap_or(settings.layout.exit);
    let mut sim = Simulation::new(SimulationSetup {
        seed: settings.run.seed,
        time: settings.time.clone(),
        layout: settings.layout.clone(),
        config,
        ..Default::default()
    });
    let mut player = AutoPlayer::new(settings.player.clone(), post);

    let outcomes = Mailbox::new();
    let listener = sim.bus().register_listener();
    for topic in DayReport::TOPICS {
        outcomes.subscribe(sim.bus(), topic, listener);
    }

    let frame = settings.run.frame_delta;
    let frames_open = (settings.run.day_length / frame).ceil() as u64;
    let frames_closing = (settings.run.closing_time / frame).ceil() as u64;
    let mut total = DayReport::default();

    for index in 0..settings.run.days {
        let mut report = DayReport::default();
        sim.open_store().context("Failed to open the store")?;

        for _ in 0..frames_open {
            run_frame(&mut sim, &mut player, frame)?;
            outcomes.drain().iter().for_each(|e| report.record(e));
        }

        sim.close_store();
        let mut waited = 0;
        while sim.population().live_count() > 0 && waited < frames_closing {
            run_frame(&mut sim, &mut player, frame)?;
            outcomes.drain().iter().for_each(|e| report.record(e));
            waited += 1;
        }
        if sim.population().live_count() > 0 {
            warn!(
                day = sim.day(),
                left = sim.population().live_count(),
                "Customers still inside at end of day"
            );
        }

        info!(
            day = sim.day(),
            spawned = report.spawned,
            purchased = report.purchased,
            stolen = report.stolen,
            player_attacked = report.player_attacked,
            tasks_completed = report.tasks_completed,
            "Day over"
        );
        total.add(&report);

        if index + 1 < settings.run.days {
            sim.end_day();
        }
    }

    info!(
        days = settings.run.days,
        purchased = total.purchased,
        stolen = total.stolen,
        player_attacked = total.player_attacked,
        tasks_completed = total.tasks_completed,
        "Simulation finished"
    );

    sim.bus().unsubscribe_all(listener);
    sim.shutdown();
    Ok(())
}

fn run_frame(sim: &mut Simulation, player: &mut AutoPlayer, frame: f32) -> Result<()> {
    let scaled = frame * sim.clock().config.time_scale;
    player.update(sim, scaled);
    sim.advance(frame).context("Simulation tick failed")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use market_core::{AgentId, ProductType};

    #[test]
    fn test_report_counts_outcomes_only() {
        let agent = AgentId::from_raw(0, 0);
        let mut report = DayReport::default();
        report.record(&Event::ItemPurchased {
            agent,
            product: ProductType(1),
        });
        report.record(&Event::ItemStolen {
            agent,
            product: ProductType(2),
        });
        report.record(&Event::StoreClosing);

        assert_eq!(report.purchased, 1);
        assert_eq!(report.stolen, 1);
        assert_eq!(report.spawned, 0);

        let mut total = DayReport::default();
        total.add(&report);
        total.add(&report);
        assert_eq!(total.purchased, 2);
    }
}
