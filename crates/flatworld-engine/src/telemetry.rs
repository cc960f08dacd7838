//! Tick hooks that report collected data.
//!
//! Before every tick the per-tick infected counter is reset. After every
//! `report_every` ticks the walker data, scene data and contagion counters
//! are gathered with the [`DataCollector`] and logged as one JSON object.

use std::collections::BTreeMap;
use std::sync::Arc;

use flatworld_core::{Data, DataCollector, Scene, TickHooks, TickSummary};
use tracing::{info, warn};

use crate::contagion::Contagion;

/// Hooks that reset counters and emit periodic reports.
pub struct TelemetryHooks {
    contagion: Arc<Contagion>,
    report_every: u64,
}

impl TelemetryHooks {
    /// Report every `report_every` ticks (0 = never).
    pub const fn new(contagion: Arc<Contagion>, report_every: u64) -> Self {
        Self {
            contagion,
            report_every,
        }
    }

    /// Gather one report from the scene and the contagion counters.
    pub fn report(&self, scene: &Scene) -> BTreeMap<String, Data> {
        let mut data = DataCollector::collect(scene);
        data.extend(DataCollector::collect_single(scene));
        data.extend(DataCollector::collect_single(self.contagion.as_ref()));
        data
    }

    const fn is_report_tick(&self, age: u64) -> bool {
        matches!(age.checked_rem(self.report_every), Some(0))
    }
}

impl TickHooks for TelemetryHooks {
    fn before_update(&mut self, _scene: &Scene) {
        self.contagion.reset_infected_count();
    }

    fn after_update(&mut self, scene: &Scene, summary: &TickSummary) {
        if !self.is_report_tick(summary.age) {
            return;
        }
        let data = self.report(scene);
        match serde_json::to_string(&data) {
            Ok(json) => info!(
                age = summary.age,
                population = summary.population,
                infected = self.contagion.infected_count(),
                report = %json,
                "Telemetry report"
            ),
            Err(e) => warn!(error = %e, age = summary.age, "Failed to serialize telemetry report"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use flatworld_core::SimRandom;

    use super::*;
    use crate::contagion::{ContagionParams, populate};

    fn setup(report_every: u64) -> (Scene, TelemetryHooks) {
        let contagion = Arc::new(Contagion::new(
            ContagionParams {
                speed: 0.5,
                infection_radius: 20.0,
                infect_chance: 0.0,
                death_chance: 0.0,
            },
            SimRandom::new(9),
        ));
        let scene = Scene::new(200.0, 200.0).unwrap();
        populate(&scene, &contagion, 8, 2);
        (scene, TelemetryHooks::new(contagion, report_every))
    }

    fn run_ticks(scene: &Scene, hooks: &mut TelemetryHooks, ticks: u64) {
        for _ in 0..ticks {
            hooks.before_update(scene);
            let summary = scene.tick();
            hooks.after_update(scene, &summary);
        }
    }

    #[test]
    fn report_contains_every_series() {
        let (scene, mut hooks) = setup(1);
        run_ticks(&scene, &mut hooks, 1);

        let report = hooks.report(&scene);
        let names: Vec<&str> = report.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["age", "entity_count", "infected_count", "just_a_number"]);
        assert_eq!(report.get("infected_count").and_then(Data::value), Some(2.0));
        assert_eq!(report.get("entity_count").and_then(Data::value), Some(10.0));
        assert_eq!(report.get("just_a_number").map(Data::len), Some(10));
    }

    #[test]
    fn reports_follow_the_interval() {
        let (_scene, hooks) = setup(10);
        let report_ticks: Vec<u64> = (1..=35).filter(|age| hooks.is_report_tick(*age)).collect();
        assert_eq!(report_ticks, vec![10, 20, 30]);
    }

    #[test]
    fn zero_interval_never_reports() {
        let (_scene, hooks) = setup(0);
        assert!((0..100).all(|age| !hooks.is_report_tick(age)));
    }

    #[test]
    fn counter_resets_before_each_tick() {
        let (scene, mut hooks) = setup(0);
        run_ticks(&scene, &mut hooks, 5);
        assert_eq!(hooks.contagion.infected_count(), 2);
    }
}
