use std::process::ExitCode;

use rampage_ai::host::Clock;
use rampage_ai::{SimWorld, Tuning};
use tracing::{error, info};

use super::arena::Arena;
use super::bootstrap::{AppError, AppWiring, LoopConfig};
use super::metrics::{MetricsAccumulator, SimulationReport};

pub(crate) fn run(app: AppWiring) -> ExitCode {
    let report = simulate(&app.config, app.tuning);
    match report.to_json().map_err(AppError::Report) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, "report_failed");
            ExitCode::FAILURE
        }
    }
}

/// Runs the scripted arena on a fixed tick for the configured simulated length.
pub(crate) fn simulate(config: &LoopConfig, tuning: Tuning) -> SimulationReport {
    let fixed_dt = config.fixed_dt();
    let total_ticks = config.total_ticks();
    let mut world = SimWorld::new();
    let (mut arena, mut session) = Arena::build(&mut world, tuning, config.seed);
    let mut metrics = MetricsAccumulator::new(config.metrics_log_interval);

    info!(total_ticks, fixed_dt, "simulation_started");
    for tick in 1..=total_ticks {
        let elapsed = tick as f32 * fixed_dt;
        world.step(fixed_dt);
        arena.apply_due(elapsed, &mut world, &mut session);
        let report = session.tick(&mut world);
        metrics.record_tick(&report);

        if let Some(snapshot) = metrics.maybe_snapshot(elapsed, session.stats()) {
            info!(
                tps = snapshot.tps,
                ticks = snapshot.session.ticks,
                live_tasks = snapshot.session.live_tasks,
                live_enemies = snapshot.session.live_enemies,
                kills = snapshot.session.kills,
                tasks_resumed = snapshot.tasks_resumed,
                tasks_faulted = snapshot.tasks_faulted,
                paused = snapshot.session.paused,
                "loop_metrics"
            );
        }
    }

    let report = SimulationReport {
        seed: config.seed,
        simulated_seconds: total_ticks as f32 * fixed_dt,
        game_time: world.game_time(),
        session: session.stats(),
        tasks_faulted: metrics.total_faulted(),
        boss_state: session.boss().map(|boss| format!("{:?}", boss.state())),
        boss_health: session.boss().map(|boss| boss.agent().health()),
        entity_count: world.entity_count(),
    };
    info!(
        kills = report.session.kills,
        live_enemies = report.session.live_enemies,
        boss_state = ?report.boss_state,
        timeline_done = arena.is_finished(),
        "simulation_finished"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(sim_seconds: f32) -> LoopConfig {
        LoopConfig {
            target_tps: 30,
            sim_seconds,
            ..LoopConfig::default()
        }
    }

    #[test]
    fn short_run_counts_every_tick() {
        let report = simulate(&config(1.0), Tuning::default());
        assert_eq!(report.session.ticks, 30);
        assert_eq!(report.tasks_faulted, 0);
        assert_eq!(report.session.kills, 0);
        assert_eq!(report.boss_state.as_deref(), Some("Dormant"));
    }

    #[test]
    fn scripted_hits_kill_enemies() {
        let report = simulate(&config(5.0), Tuning::default());
        assert_eq!(report.session.kills, 2);
        assert!(report.session.live_enemies >= 2);
    }

    #[test]
    fn pause_window_holds_game_time() {
        let report = simulate(&config(14.0), Tuning::default());
        assert!(report.game_time < report.simulated_seconds - 0.9);
        assert!(!report.session.paused);
    }

    #[test]
    fn same_seed_same_report() {
        let first = simulate(&config(8.0), Tuning::default());
        let second = simulate(&config(8.0), Tuning::default());
        assert_eq!(first, second);
    }
}
