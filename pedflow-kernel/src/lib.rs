pub mod clock;
pub mod diagnostic;
pub mod direction;
pub mod distributor;
pub mod error;
pub mod events;
pub mod field;
pub mod geometry;
pub mod goal_manager;
mod models;
pub mod neighbor_grid;
pub mod pedestrian;
pub mod router;
pub mod scenario;
pub mod trajectory;
pub mod util;
pub mod waiting;

use std::io::Write;
use std::time::Instant;

use glam::DVec2;
use log::{info, warn};
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use rustc_hash::{FxHashMap, FxHashSet};

use clock::SimulationClock;
use diagnostic::{DiagnosticLog, DoorFlowStats, StepMetrics};
use direction::{DirectionManager, DirectionStrategy};
use distributor::{distribute_spec, AgentSourcesManager};
use error::SimResult;
use events::EventQueue;
use field::SpeedMode;
use geometry::{Building, RoomId, Uid};
use neighbor_grid::NeighborGrid;
use pedestrian::{AgentId, Pedestrian};
use router::{FloorfieldRouter, RouterConfig};
use scenario::{Built, Scenario};
use trajectory::TrajectoryWriter;
use waiting::WaitingStrategy;

pub use models::{GradientModel, ModelContext, OperationalModel, PedestrianUpdate};

/// Simulator options.
#[derive(Debug, Clone)]
pub struct SimulatorOptions {
    /// Step length. (seconds)
    pub dt: f64,
    /// Trajectory frames per simulated second.
    pub fps: f64,
    /// Hard end of simulated time. (seconds)
    pub t_max: f64,
    pub seed: u64,
    /// Cell size of the neighbor search grid, raised to the model's
    /// interaction range if smaller. (meters)
    pub neighbor_grid_unit: f64,
    /// Grid spacing of the router's distance fields. (meters)
    pub router_spacing: f64,
    /// Grid spacing of the direction strategies' fields. (meters)
    pub field_spacing: f64,
    pub wall_avoid_distance: f64,
    pub use_wall_avoidance: bool,
    /// Candidate doors per routing query: agent's subroom instead of room.
    pub within_subroom: bool,
    pub strategy: DirectionStrategy,
    pub waiting_strategy: WaitingStrategy,
    pub periodic: bool,
}

impl Default for SimulatorOptions {
    fn default() -> Self {
        SimulatorOptions {
            dt: 0.05,
            fps: 8.0,
            t_max: 500.0,
            seed: 8091983,
            neighbor_grid_unit: 4.0,
            router_spacing: 0.125,
            field_spacing: 0.125,
            wall_avoid_distance: 0.8,
            use_wall_avoidance: false,
            within_subroom: false,
            strategy: DirectionStrategy::LocalFloorfield,
            waiting_strategy: WaitingStrategy::Middle,
            periodic: false,
        }
    }
}

/// Simulator instance: owns the building, the agent population, the router
/// and fields, the event queue and the clock, and advances them in a fixed
/// per-step phase order.
pub struct Simulator {
    pub building: Building,
    pub agents: Vec<Pedestrian>,
    pub router: FloorfieldRouter,
    pub direction: DirectionManager,
    pub model: Box<dyn OperationalModel>,
    pub neighbor_grid: NeighborGrid,
    pub clock: SimulationClock,
    pub options: SimulatorOptions,
    pub diagnostic_log: DiagnosticLog,
    events: EventQueue,
    sources: AgentSourcesManager,
    trajectory: Option<TrajectoryWriter<Box<dyn Write + Send>>>,
    next_agent_id: u64,
    write_interval: u64,
    egress_time: FxHashMap<RoomId, f64>,
}

impl Simulator {
    pub fn new(scenario: Scenario, options: SimulatorOptions) -> SimResult<Self> {
        let Built {
            building,
            events,
            distributions,
            sources,
        } = scenario.build()?;

        let mut next_agent_id = 0;
        let mut agents = Vec::new();
        for spec in &distributions {
            agents.extend(distribute_spec(
                &building,
                spec,
                options.seed,
                &mut next_agent_id,
            )?);
        }

        let speed_mode = if options.use_wall_avoidance {
            SpeedMode::WallAvoid
        } else {
            SpeedMode::Homogeneous
        };
        let build_start = Instant::now();
        let mut direction = DirectionManager::new(
            options.strategy,
            options.field_spacing,
            speed_mode,
            options.wall_avoid_distance,
        );
        direction.reinit(&building)?;
        let time_build_fields = build_start.elapsed().as_secs_f64();

        let build_start = Instant::now();
        let mut router = FloorfieldRouter::new(RouterConfig {
            spacing: options.router_spacing,
            within_subroom: options.within_subroom,
        });
        router.reinit(&building)?;
        let time_build_router = build_start.elapsed().as_secs_f64();

        let mut model: Box<dyn OperationalModel> = Box::new(GradientModel::new());
        model.init(&building)?;

        let (min, max) = building.bounding_box();
        let unit = options.neighbor_grid_unit.max(model.max_interaction_range());
        let neighbor_grid = NeighborGrid::new(min, max, unit);

        let sources = AgentSourcesManager::new(sources, options.t_max, options.seed);
        let events = EventQueue::new(events);
        events.list_events();

        let write_interval = (((1.0 / options.fps) / options.dt) + 0.5).max(1.0) as u64;
        let clock = SimulationClock::new(options.dt);

        let mut diagnostic_log = DiagnosticLog::default();
        diagnostic_log.preprocess_metrics.time_build_fields = time_build_fields;
        diagnostic_log.preprocess_metrics.time_build_router = time_build_router;

        info!(
            "simulator: initialized with {} agents, {} doors, {} pending events",
            agents.len(),
            building.doors().count(),
            events.pending()
        );

        Ok(Simulator {
            building,
            agents,
            router,
            direction,
            model,
            neighbor_grid,
            clock,
            options,
            diagnostic_log,
            events,
            sources,
            trajectory: None,
            next_agent_id,
            write_interval,
            egress_time: FxHashMap::default(),
        })
    }

    /// Swap in a different operational model before running.
    pub fn with_model(mut self, mut model: Box<dyn OperationalModel>) -> SimResult<Self> {
        model.init(&self.building)?;
        let (min, max) = self.building.bounding_box();
        let unit = self
            .options
            .neighbor_grid_unit
            .max(model.max_interaction_range());
        self.neighbor_grid = NeighborGrid::new(min, max, unit);
        self.model = model;
        Ok(self)
    }

    /// Attach a trajectory sink; writes the header and the initial frame.
    pub fn set_trajectory(&mut self, out: Box<dyn Write + Send>) -> SimResult<()> {
        let mut writer = TrajectoryWriter::new(out);
        let expected = self.agents.len() + self.sources.total_cap() as usize;
        writer.write_header(expected, self.options.fps, &self.building)?;
        writer.write_frame(0, &self.agents, &self.building)?;
        self.trajectory = Some(writer);
        Ok(())
    }

    pub fn get_pedestrian_count(&self) -> usize {
        self.agents.len()
    }

    /// One simulation step at the current clock time.
    pub fn step(&mut self) -> SimResult<()> {
        let t = self.clock.elapsed_time();
        let dt = self.clock.dt();
        let mut metrics = StepMetrics::default();

        // 1. neighborhood index rebuild
        self.neighbor_grid.update(self.agents.iter().map(|p| p.pos));

        // 2. event processing and agent ingress
        let instant = Instant::now();
        let (stale, created) = self.events.process_due(
            t,
            &mut self.building,
            self.options.seed,
            &mut self.next_agent_id,
        );
        self.agents.extend(created);
        let spawned = self.sources.process_all(
            t,
            dt,
            &self.building,
            self.options.seed,
            &mut self.next_agent_id,
        );
        self.agents.extend(spawned);
        self.router.set_needs_update(stale);
        metrics.time_events = instant.elapsed().as_secs_f64();

        // 3. router and field rebuild when stale
        let instant = Instant::now();
        if self.router.needs_update() {
            self.router.reinit(&self.building)?;
            self.direction.reinit(&self.building)?;
        }

        // 4. premovement gate
        let min_premovement = self
            .agents
            .iter()
            .map(|p| p.premovement)
            .fold(f64::INFINITY, f64::min);
        let physics = self.agents.is_empty() || t > min_premovement;

        if physics {
            // 5. routing: destination door and exit line per agent
            self.update_routes(t);
            metrics.time_routing = instant.elapsed().as_secs_f64();

            // desired direction from the active strategies
            self.update_desired_directions();

            // 6. operational model
            let instant = Instant::now();
            let updates = self.compute_updates(dt);
            let faulty = self.apply_updates(updates);
            metrics.time_model = instant.elapsed().as_secs_f64();

            // 7. location update, door counters, egress/removal
            let instant = Instant::now();
            self.update_locations(t, faulty);

            // 8. goal manager and flow regulation
            let mut stale = goal_manager::update(&mut self.building, &mut self.agents, t);
            for door in self.building.doors_mut() {
                stale |= door.update_regulation(t);
            }
            self.router.set_needs_update(stale);
            metrics.time_update = instant.elapsed().as_secs_f64();
        }

        // 9. trajectory frame emission
        if self.clock.frame() % self.write_interval == 0 {
            if let Some(writer) = &mut self.trajectory {
                let frame = self.clock.frame() / self.write_interval;
                if let Err(e) = writer.write_frame(frame, &self.agents, &self.building) {
                    warn!("trajectory write failed: {e}");
                }
            }
        }

        // 10. advance
        metrics.active_ped_count = self.agents.len();
        self.diagnostic_log.push(metrics);
        self.clock.advance();
        Ok(())
    }

    pub fn is_finished(&self) -> bool {
        let t = self.clock.elapsed_time();
        if t > self.options.t_max {
            return true;
        }
        self.agents.is_empty()
            && self.events.pending() == 0
            && (self.sources.is_empty() || self.sources.is_completed(t))
    }

    /// Run until the population is drained or simulated time runs out.
    pub fn run(&mut self) -> SimResult<f64> {
        while !self.is_finished() {
            self.step()?;
            if self.clock.frame() % 1000 == 0 {
                info!(
                    "t={:7.2}s, active agents: {:6}",
                    self.clock.elapsed_time(),
                    self.agents.len()
                );
            }
        }
        self.collect_door_statistics();
        self.print_statistics();
        Ok(self.clock.elapsed_time())
    }

    /// Snapshot the flow curve of every used door into the diagnostic log,
    /// where the driver exports it.
    pub fn collect_door_statistics(&mut self) {
        self.diagnostic_log.door_flow = self
            .building
            .doors()
            .filter(|d| d.usage() > 0)
            .map(|d| DoorFlowStats {
                door_id: d.id,
                usage: d.usage(),
                last_passing_time: d.last_passing_time(),
                flow_curve: d.flow_curve().to_vec(),
            })
            .collect();
    }

    fn update_routes(&mut self, t: f64) {
        for i in 0..self.agents.len() {
            let ped = &mut self.agents[i];
            let target = self.router.find_exit(ped, &self.building, &self.direction);

            match target {
                None => {
                    // no reachable goal; hold position and retry after the
                    // next event
                    self.agents[i].start_waiting(t);
                }
                Some(uid) => {
                    let ped = &mut self.agents[i];
                    let waiting_in_area = Self::inside_waiting_area(&self.building, ped);
                    if let Some(door) = self.building.door(uid) {
                        if door.is_in(ped.room) {
                            if !ped.is_waiting() && door.is_temp_closed() {
                                ped.start_waiting(t);
                            }
                            if ped.is_waiting() && door.is_open() && !waiting_in_area {
                                ped.end_waiting();
                            }
                        }
                    }
                }
            }
        }
    }

    fn inside_waiting_area(building: &Building, ped: &Pedestrian) -> bool {
        ped.final_goal
            .and_then(|id| building.goal(id))
            .is_some_and(|g| g.is_waiting_area() && g.contains(ped.pos))
    }

    fn update_desired_directions(&mut self) {
        for i in 0..self.agents.len() {
            let target = if self.agents[i].is_waiting() {
                let ped = &mut self.agents[i];
                self.options
                    .waiting_strategy
                    .waiting_position(&self.building, &self.direction, ped)
            } else {
                self.direction.target(&self.building, &self.agents[i])
            };
            let ped = &mut self.agents[i];
            ped.desired_dir = (target - ped.pos).normalize_or_zero();
        }
    }

    fn compute_updates(&self, dt: f64) -> Vec<PedestrianUpdate> {
        let ctx = ModelContext {
            building: &self.building,
            grid: &self.neighbor_grid,
            agents: &self.agents,
            direction: &self.direction,
            periodic: self.options.periodic,
        };
        self.agents
            .par_iter()
            .map(|ped| self.model.compute_new_position(dt, ped, &ctx))
            .collect()
    }

    /// Apply updates; agents with a non-finite update are degraded and
    /// scheduled for removal.
    fn apply_updates(&mut self, updates: Vec<PedestrianUpdate>) -> FxHashSet<AgentId> {
        let mut faulty = FxHashSet::default();
        for (ped, update) in self.agents.iter_mut().zip(&updates) {
            if !update.is_finite() {
                warn!("model: agent {}: non-finite update, removing agent", ped.id);
                faulty.insert(ped.id);
                continue;
            }
            ped.prev_pos = ped.pos;
            self.model.apply_update(update, ped);
        }
        faulty
    }

    /// Re-locate every agent, enforce closed doors, book door passings,
    /// and remove agents that reached a final goal or left the geometry.
    fn update_locations(&mut self, t: f64, mut to_remove: FxHashSet<AgentId>) {
        let mut passings: Vec<(Uid, AgentId)> = Vec::new();
        let mut egress: Vec<RoomId> = Vec::new();

        for i in 0..self.agents.len() {
            let (old_room, old_subroom, old_pos, new_pos, id) = {
                let ped = &self.agents[i];
                (ped.room, ped.subroom, ped.prev_pos, ped.pos, ped.id)
            };
            if to_remove.contains(&id) {
                continue;
            }

            // walls and closed or temp-closed doors are never crossed; the
            // move is rejected instead
            let old_sub = self.building.subroom(old_room, old_subroom);
            let mut blocked = old_sub
                .all_walls()
                .any(|w| w.line.crossed_by(old_pos, new_pos));
            if !blocked {
                for uid in &old_sub.door_uids {
                    let Some(door) = self.building.door(*uid) else {
                        continue;
                    };
                    if !door.is_open() && door.line.crossed_by(old_pos, new_pos) {
                        blocked = true;
                        break;
                    }
                }
            }
            if blocked {
                let ped = &mut self.agents[i];
                ped.pos = old_pos;
                ped.vel = DVec2::ZERO;
                continue;
            }

            if self.building.subroom(old_room, old_subroom).contains(new_pos) {
                continue;
            }

            // crossed into a neighboring subroom, or out of the building
            let crossed_door = self
                .building
                .subroom(old_room, old_subroom)
                .door_uids
                .iter()
                .filter_map(|uid| self.building.door(*uid))
                .find(|door| door.line.crossed_by(old_pos, new_pos))
                .map(|door| (door.uid(), door.is_exit()));

            match self.building.find_room_and_subroom(new_pos) {
                Some((room, subroom)) => {
                    if let Some((uid, _)) = crossed_door {
                        passings.push((uid, id));
                    }
                    if room != old_room {
                        egress.push(old_room);
                    }
                    let ped = &mut self.agents[i];
                    ped.room = room;
                    ped.subroom = subroom;
                }
                None => match crossed_door {
                    Some((uid, true)) => {
                        // left through an exit
                        passings.push((uid, id));
                        egress.push(old_room);
                        to_remove.insert(id);
                    }
                    _ => {
                        warn!("agent {id}: could not be properly relocated, removing");
                        to_remove.insert(id);
                    }
                },
            }
        }

        for (uid, agent) in passings {
            if let Some(door) = self.building.door_mut(uid) {
                door.register_passing(t, agent);
            }
        }
        for room in egress {
            self.egress_time.insert(room, t);
        }

        // final plain goals swallow their agents
        for ped in &self.agents {
            if let Some(goal) = ped.final_goal.and_then(|id| self.building.goal(id)) {
                if goal.is_final && !goal.is_waiting_area() && goal.contains(ped.pos) {
                    to_remove.insert(ped.id);
                }
            }
        }

        if !to_remove.is_empty() {
            self.agents.retain(|p| !to_remove.contains(&p.id));
        }
    }

    /// Egress times per room and usage per door, logged at the end of a
    /// run.
    pub fn print_statistics(&self) {
        info!("rooms egress, simulation time: {:.2}", self.clock.elapsed_time());
        for (room, time) in &self.egress_time {
            info!(
                "room {} ({}): egress time {:.2}s",
                self.building.room(*room).id,
                self.building.room(*room).caption,
                time
            );
        }

        info!("usage of exits");
        for door in self.building.doors() {
            if door.usage() > 0 {
                info!(
                    "door {} used by {} agents, last passing time {:.2}s",
                    door.id,
                    door.usage(),
                    door.last_passing_time().unwrap_or(0.0)
                );
            }
        }
    }
}
