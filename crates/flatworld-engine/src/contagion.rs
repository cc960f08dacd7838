//! Contagion demo: walkers that wander the scene and spread an infection.
//!
//! Every walker heads for a random target and picks a new one on arrival.
//! Infected walkers try to infect healthy neighbors within a radius each
//! tick and may die. Infected walkers turn into red squares.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use flatworld_core::config::DemoConfig;
use flatworld_core::{Behavior, DataPoints, Entity, EntityState, Scene, SimRandom, UpdateContext};
use flatworld_types::{Color, Point, Shape};
use parking_lot::Mutex;
use tracing::info;

/// Diameter of a healthy walker and side of an infected one.
pub const WALKER_SIZE: f64 = 7.0;

/// Upper bound of the arbitrary number each walker carries.
const NUMBER_RANGE: f64 = 10.0;

/// Tunables of the contagion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContagionParams {
    /// Distance moved per tick.
    pub speed: f64,
    /// Radius within which infection spreads.
    pub infection_radius: f64,
    /// Per-tick probability of infecting each healthy neighbor.
    pub infect_chance: f64,
    /// Per-tick probability that an infected walker dies.
    pub death_chance: f64,
}

impl From<&DemoConfig> for ContagionParams {
    fn from(demo: &DemoConfig) -> Self {
        Self {
            speed: demo.speed,
            infection_radius: demo.infection_radius,
            infect_chance: demo.infect_chance,
            death_chance: demo.death_chance,
        }
    }
}

/// State shared by every walker of one simulation.
#[derive(Debug)]
pub struct Contagion {
    params: ContagionParams,
    rng: Mutex<SimRandom>,
    infected_this_tick: AtomicU64,
}

impl Contagion {
    /// Create shared state drawing randomness from `rng`.
    pub fn new(params: ContagionParams, rng: SimRandom) -> Self {
        Self {
            params,
            rng: Mutex::new(rng),
            infected_this_tick: AtomicU64::new(0),
        }
    }

    /// Seed of the shared generator.
    pub fn seed(&self) -> u64 {
        self.rng.lock().seed()
    }

    /// Infected walkers that updated since the last reset.
    pub fn infected_count(&self) -> u64 {
        self.infected_this_tick.load(Ordering::Acquire)
    }

    /// Zero the per-tick infected counter.
    pub fn reset_infected_count(&self) {
        self.infected_this_tick.store(0, Ordering::Release);
    }

    fn count_infected(&self) {
        self.infected_this_tick.fetch_add(1, Ordering::AcqRel);
    }

    fn chance(&self, probability: f64) -> bool {
        self.rng.lock().chance(probability)
    }

    fn point(&self, max_x: f64, max_y: f64) -> Point {
        self.rng.lock().point(max_x, max_y)
    }
}

impl DataPoints for Contagion {
    fn data_points(&self) -> Vec<(&'static str, f64)> {
        #[allow(clippy::cast_precision_loss)]
        let infected = self.infected_count() as f64;
        vec![("infected_count", infected)]
    }
}

/// A walker of the contagion demo.
#[derive(Debug)]
pub struct Walker {
    infected: bool,
    target: Point,
    number: f64,
    contagion: Arc<Contagion>,
}

impl Walker {
    /// Create a walker entity at a random position inside
    /// `width` x `height`.
    pub fn spawn(contagion: &Arc<Contagion>, infected: bool, width: f64, height: f64) -> Entity {
        let position = contagion.point(width, height);
        let target = contagion.point(width, height);
        let number = contagion.rng.lock().double(0.0, NUMBER_RANGE);

        let mut walker = Self {
            infected: false,
            target,
            number,
            contagion: Arc::clone(contagion),
        };
        let mut state = EntityState::new(Shape::circle(position, WALKER_SIZE), Color::GREEN);
        if infected {
            walker.infect(&mut state);
        }
        Entity::new(*state.shape(), state.color(), walker)
    }

    /// Return `true` if this walker is infected.
    pub const fn is_infected(&self) -> bool {
        self.infected
    }

    /// The position this walker is heading for.
    pub const fn target(&self) -> Point {
        self.target
    }

    fn infect(&mut self, state: &mut EntityState) {
        self.infected = true;
        state.set_shape(Shape::rectangle(state.position(), WALKER_SIZE, WALKER_SIZE));
        state.set_color(Color::RED);
    }

    fn spread(&self, ctx: &mut UpdateContext<'_>) {
        let contagion = &self.contagion;
        for neighbor in ctx.query_neighbors(contagion.params.infection_radius) {
            ctx.with_behavior::<Self, _>(neighbor, |other, state| {
                if !other.infected && contagion.chance(contagion.params.infect_chance) {
                    other.infect(state);
                }
            });
        }
    }
}

impl Behavior for Walker {
    fn update(&mut self, ctx: &mut UpdateContext<'_>) {
        if self.infected {
            self.spread(ctx);
            if self.contagion.chance(self.contagion.params.death_chance) {
                ctx.remove();
            }
            self.contagion.count_infected();
        }

        ctx.move_towards(self.target, self.contagion.params.speed);
        if ctx.position() == self.target {
            let bounds = ctx.bounds();
            self.target = self.contagion.point(bounds.width(), bounds.height());
        }
    }

    fn on_select(&mut self, state: &mut EntityState) {
        info!(
            infected = self.is_infected(),
            number = self.number,
            position = %state.position(),
            target = %self.target(),
            "Walker selected"
        );
    }

    fn data_points(&self) -> Vec<(&'static str, f64)> {
        vec![("just_a_number", self.number)]
    }
}

/// Add `healthy` healthy and `infected` infected walkers to `scene`.
pub fn populate(scene: &Scene, contagion: &Arc<Contagion>, healthy: u32, infected: u32) {
    let (width, height) = (scene.width(), scene.height());
    let walkers = (0..healthy)
        .map(|_| false)
        .chain((0..infected).map(|_| true))
        .map(|is_infected| Walker::spawn(contagion, is_infected, width, height));
    let ids = scene.add_many(walkers);
    info!(
        healthy,
        infected,
        total = ids.len(),
        seed = contagion.seed(),
        "Walkers added"
    );
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn contagion(infect_chance: f64, death_chance: f64) -> Arc<Contagion> {
        Arc::new(Contagion::new(
            ContagionParams {
                speed: 0.5,
                infection_radius: 20.0,
                infect_chance,
                death_chance,
            },
            SimRandom::new(50_626_451),
        ))
    }

    fn infected_walkers(scene: &Scene) -> usize {
        scene
            .snapshot_entities()
            .iter()
            .filter(|e| e.color == Color::RED)
            .count()
    }

    #[test]
    fn infected_walkers_look_infected() {
        let contagion = contagion(0.0, 0.0);
        let entity = Walker::spawn(&contagion, true, 100.0, 100.0);
        assert_eq!(entity.state().color(), Color::RED);
        assert!(!entity.state().shape().is_ellipse());
        assert!(entity.behavior::<Walker>().unwrap().is_infected());

        let healthy = Walker::spawn(&contagion, false, 100.0, 100.0);
        assert_eq!(healthy.state().color(), Color::GREEN);
        assert!(healthy.state().shape().is_ellipse());
    }

    #[test]
    fn certain_infection_spreads_to_neighbors() {
        let scene = Scene::new(10.0, 10.0).unwrap();
        let contagion = contagion(1.0, 0.0);
        populate(&scene, &contagion, 5, 1);

        // First tick indexes everyone; the infected walker spreads to all
        // walkers within range, and the scene is smaller than the radius.
        scene.tick();
        assert_eq!(infected_walkers(&scene), 6);
        assert!(contagion.infected_count() >= 1);
    }

    #[test]
    fn zero_chance_keeps_everyone_healthy() {
        let scene = Scene::new(10.0, 10.0).unwrap();
        let contagion = contagion(0.0, 0.0);
        populate(&scene, &contagion, 5, 1);
        for _ in 0..20 {
            contagion.reset_infected_count();
            scene.tick();
            assert_eq!(contagion.infected_count(), 1);
        }
        assert_eq!(infected_walkers(&scene), 1);
        assert_eq!(scene.population(), 6);
    }

    #[test]
    fn certain_death_removes_infected() {
        let scene = Scene::new(100.0, 100.0).unwrap();
        let contagion = contagion(0.0, 1.0);
        populate(&scene, &contagion, 3, 2);
        let summary = scene.tick();
        assert_eq!(summary.purged, 2);
        assert_eq!(scene.population(), 3);
        assert_eq!(infected_walkers(&scene), 0);
    }

    #[test]
    fn walkers_pick_new_target_on_arrival() {
        let scene = Scene::new(50.0, 50.0).unwrap();
        let contagion = Arc::new(Contagion::new(
            ContagionParams {
                speed: 1000.0,
                infection_radius: 0.0,
                infect_chance: 0.0,
                death_chance: 0.0,
            },
            SimRandom::new(1),
        ));
        populate(&scene, &contagion, 1, 0);
        let id = scene.snapshot_entities().first().unwrap().id;
        let first_target = scene.with_behavior::<Walker, _>(id, |w, _| w.target()).unwrap();

        scene.tick();

        let state = scene.entity(id).unwrap();
        assert_eq!(state.position(), first_target);
        let next_target = scene.with_behavior::<Walker, _>(id, |w, _| w.target()).unwrap();
        assert_ne!(next_target, first_target);
    }

    #[test]
    fn walkers_report_their_number() {
        let scene = Scene::new(100.0, 100.0).unwrap();
        let contagion = contagion(0.0, 0.0);
        populate(&scene, &contagion, 4, 0);
        let data = flatworld_core::DataCollector::collect(&scene);
        let numbers = data.get("just_a_number").unwrap();
        assert_eq!(numbers.len(), 4);
        assert!(numbers.values().iter().all(|n| (0.0..NUMBER_RANGE).contains(n)));
    }
}
