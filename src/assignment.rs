//! Worker job assignment and command issuance.
//!
//! `AssignmentEngine` owns every per-agent table: the job each worker
//! holds, which base and resource node it is attached to, and the inverse
//! occupancy sets used for capacity bookkeeping. It runs twice per tick:
//! `update_assignments` settles the job state machine, then `issue_orders`
//! turns the settled assignments into concrete move/gather/return
//! commands, consulting the order timer before the default mineral path.
//!
//! Nothing here is fatal: any lookup miss demotes the worker to no job and
//! the next tick re-evaluates it.

use crate::constants::*;
use crate::game::*;
use crate::instrument::*;
use crate::order_timer::OrderTimer;
use crate::position::Position;
use fnv::{FnvHashMap, FnvHashSet};
use itertools::Itertools;
use log::*;

/// The duty a worker currently holds. Workers default to `None` and are
/// promoted to `Minerals` on the next assignment pass.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub enum Job {
    #[default]
    None,
    Minerals,
    Gas,
    /// Held for non-mining duties (building, scouting); untouched until
    /// explicitly released.
    Reserved,
}

pub struct AssignmentEngine {
    desired_gas_workers: usize,
    jobs: FnvHashMap<AgentId, Job>,
    worker_base: FnvHashMap<AgentId, BaseId>,
    base_workers: FnvHashMap<BaseId, FnvHashSet<AgentId>>,
    worker_patch: FnvHashMap<AgentId, NodeId>,
    patch_workers: FnvHashMap<NodeId, FnvHashSet<AgentId>>,
    worker_refinery: FnvHashMap<AgentId, NodeId>,
    refinery_workers: FnvHashMap<NodeId, FnvHashSet<AgentId>>,
    ledger: Option<MiningStatusLedger>,
}

impl Default for AssignmentEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl AssignmentEngine {
    pub fn new() -> Self {
        AssignmentEngine {
            desired_gas_workers: 0,
            jobs: FnvHashMap::default(),
            worker_base: FnvHashMap::default(),
            base_workers: FnvHashMap::default(),
            worker_patch: FnvHashMap::default(),
            patch_workers: FnvHashMap::default(),
            worker_refinery: FnvHashMap::default(),
            refinery_workers: FnvHashMap::default(),
            ledger: None,
        }
    }

    /// Attach a mining-status ledger; purely diagnostic.
    pub fn enable_instrumentation(&mut self) {
        self.ledger = Some(MiningStatusLedger::new());
    }

    pub fn instrumentation(&self) -> Option<&MiningStatusLedger> {
        self.ledger.as_ref()
    }

    pub fn job_of(&self, agent: AgentId) -> Job {
        self.jobs.get(&agent).copied().unwrap_or(Job::None)
    }

    pub fn assigned_patch(&self, agent: AgentId) -> Option<NodeId> {
        self.worker_patch.get(&agent).copied()
    }

    pub fn assigned_refinery(&self, agent: AgentId) -> Option<NodeId> {
        self.worker_refinery.get(&agent).copied()
    }

    pub fn assigned_base(&self, agent: AgentId) -> Option<BaseId> {
        self.worker_base.get(&agent).copied()
    }

    /// Occupants currently attached to a node.
    pub fn node_occupants(&self, node: NodeId) -> usize {
        self.patch_workers
            .get(&node)
            .or_else(|| self.refinery_workers.get(&node))
            .map_or(0, |set| set.len())
    }

    pub fn set_desired_gas_workers(&mut self, count: usize) {
        self.desired_gas_workers = count;
    }

    pub fn desired_gas_workers(&self) -> usize {
        self.desired_gas_workers
    }

    // ---- lifecycle events -------------------------------------------------

    /// A worker died or changed hands: drop every trace of it this tick.
    pub fn on_agent_lost(&mut self, agent: AgentId) {
        self.jobs.remove(&agent);
        self.clear_base(agent);
        self.clear_patch(agent);
        self.clear_refinery(agent);
    }

    /// A mineral patch mined out or a refinery was destroyed: detach every
    /// worker that was attached to it.
    pub fn on_node_lost(&mut self, node: NodeId) {
        if let Some(workers) = self.patch_workers.remove(&node) {
            for worker in workers {
                self.worker_patch.remove(&worker);
            }
        }
        if let Some(workers) = self.refinery_workers.remove(&node) {
            for worker in workers {
                self.worker_refinery.remove(&worker);
            }
        }
    }

    fn clear_base(&mut self, agent: AgentId) {
        if let Some(base) = self.worker_base.remove(&agent) {
            if let Some(set) = self.base_workers.get_mut(&base) {
                set.remove(&agent);
            }
        }
    }

    fn clear_patch(&mut self, agent: AgentId) {
        if let Some(patch) = self.worker_patch.remove(&agent) {
            if let Some(set) = self.patch_workers.get_mut(&patch) {
                set.remove(&agent);
            }
        }
    }

    fn clear_refinery(&mut self, agent: AgentId) {
        if let Some(refinery) = self.worker_refinery.remove(&agent) {
            if let Some(set) = self.refinery_workers.get_mut(&refinery) {
                set.remove(&agent);
            }
        }
    }

    // ---- capacity counters (derived, never stored) ------------------------

    pub fn available_mineral_assignments_at_base(
        &self,
        catalog: &dyn ResourceCatalog,
        base: BaseId,
    ) -> i32 {
        let Some(snapshot) = catalog.base(base) else {
            return 0;
        };
        if !snapshot.has_live_depot() {
            return 0;
        }

        let patches = catalog
            .mineral_patches(base)
            .iter()
            .filter(|&&patch| catalog.node(patch).map_or(false, |n| n.exists))
            .count() as i32;

        let mut count = patches * MINERAL_PATCH_CAPACITY as i32;
        if let Some(workers) = self.base_workers.get(&base) {
            for worker in workers {
                if self.job_of(*worker) == Job::Minerals {
                    count -= 1;
                }
            }
        }
        count
    }

    pub fn available_gas_assignments_at_base(
        &self,
        catalog: &dyn ResourceCatalog,
        base: BaseId,
    ) -> i32 {
        let Some(snapshot) = catalog.base(base) else {
            return 0;
        };
        if !snapshot.has_live_depot() {
            return 0;
        }

        let mut count = 0;
        for refinery in catalog.refineries(base) {
            if catalog
                .node(refinery)
                .map_or(false, |n| n.exists && n.completed)
            {
                count += REFINERY_CAPACITY as i32;
            }
        }
        if let Some(workers) = self.base_workers.get(&base) {
            for worker in workers {
                if self.job_of(*worker) == Job::Gas {
                    count -= 1;
                }
            }
        }
        count
    }

    /// Total open mineral slots across owned bases with a completed depot.
    /// Exposed to the production layer for saturation decisions.
    pub fn available_mineral_assignments(&self, catalog: &dyn ResourceCatalog) -> i32 {
        let mut count = 0;
        for base in catalog.bases() {
            let Some(snapshot) = catalog.base(base) else {
                continue;
            };
            if !snapshot.depot_completed() {
                continue;
            }
            for patch in catalog.mineral_patches(base) {
                if !catalog.node(patch).map_or(false, |n| n.exists) {
                    continue;
                }
                let occupants = self.patch_workers.get(&patch).map_or(0, |s| s.len());
                if occupants < MINERAL_PATCH_CAPACITY {
                    count += (MINERAL_PATCH_CAPACITY - occupants) as i32;
                }
            }
        }
        count
    }

    /// Workers actively attached to a mineral patch and near it; workers
    /// still on a long journey toward their patch are not counted.
    pub fn mineral_worker_count(&self, catalog: &dyn ResourceCatalog, world: &dyn AgentWorld) -> usize {
        self.worker_patch
            .iter()
            .filter(|(&worker, &patch)| {
                world.agent(worker).map_or(false, |a| a.exists)
                    && catalog.node(patch).map_or(false, |n| n.exists)
                    && world.distance_to_node(worker, patch) < BASE_PROXIMITY
            })
            .count()
    }

    /// Workers actively attached to a refinery and near it.
    pub fn gas_worker_count(&self, catalog: &dyn ResourceCatalog, world: &dyn AgentWorld) -> usize {
        self.worker_refinery
            .iter()
            .filter(|(&worker, &refinery)| {
                world.agent(worker).map_or(false, |a| a.exists)
                    && catalog.node(refinery).map_or(false, |n| n.exists)
                    && world.distance_to_node(worker, refinery) < BASE_PROXIMITY
            })
            .count()
    }

    // ---- reservation API --------------------------------------------------

    /// Whether a worker may be pulled for another duty right now. Never
    /// interrupts active mining or gas carriers mid-cycle.
    pub fn is_available_for_reassignment(
        &self,
        world: &dyn AgentWorld,
        agent: AgentId,
        allow_carry_minerals: bool,
    ) -> bool {
        let Some(snapshot) = world.agent(agent) else {
            return false;
        };
        if !snapshot.exists || !snapshot.completed || !snapshot.is_worker {
            return false;
        }

        match self.job_of(agent) {
            Job::None => true,
            Job::Minerals => {
                if snapshot.carrying_gas {
                    return false;
                }
                if snapshot.carrying_minerals && !allow_carry_minerals {
                    return false;
                }
                matches!(
                    snapshot.order,
                    UnitOrder::Move | UnitOrder::MoveToMinerals | UnitOrder::ReturnMinerals
                )
            }
            _ => false,
        }
    }

    /// Nearest worker eligible for reassignment, by straight-line distance.
    pub fn closest_reassignable_worker(
        &self,
        world: &dyn AgentWorld,
        position: Position,
        allow_carry_minerals: bool,
    ) -> Option<AgentId> {
        let mut best: Option<(i32, AgentId)> = None;
        for worker in world.workers() {
            if !self.is_available_for_reassignment(world, worker, allow_carry_minerals) {
                continue;
            }
            let Some(snapshot) = world.agent(worker) else {
                continue;
            };
            let dist = snapshot.position.distance_to(position);
            if best.map_or(true, |(d, _)| dist < d) {
                best = Some((dist, worker));
            }
        }
        best.map(|(_, worker)| worker)
    }

    /// Hold a worker for non-mining duties. Idempotent; strips any node
    /// assignment so its slot frees up immediately.
    pub fn reserve_worker(&mut self, world: &dyn AgentWorld, agent: AgentId) {
        let Some(snapshot) = world.agent(agent) else {
            return;
        };
        if !snapshot.exists || !snapshot.completed || !snapshot.is_worker {
            return;
        }

        self.jobs.insert(agent, Job::Reserved);
        self.clear_base(agent);
        self.clear_patch(agent);
        self.clear_refinery(agent);
        debug!("agent {:?} reserved for non-mining duties", agent);
    }

    /// Return a reserved worker to the pool; it re-enters the state machine
    /// as jobless next tick.
    pub fn release_worker(&mut self, world: &dyn AgentWorld, agent: AgentId) {
        let Some(snapshot) = world.agent(agent) else {
            return;
        };
        if !snapshot.exists || !snapshot.completed || !snapshot.is_worker {
            return;
        }

        self.jobs.insert(agent, Job::None);
        debug!("agent {:?} released from non-mining duties", agent);
    }

    // ---- assignment pass --------------------------------------------------

    /// Settle the job state machine for every worker. Runs fully before
    /// `issue_orders` so capacity decisions are visible to issuance.
    pub fn update_assignments(
        &mut self,
        clock: FrameClock,
        catalog: &dyn ResourceCatalog,
        travel: &dyn TravelEstimator,
        world: &dyn AgentWorld,
    ) {
        // Opening optimization: pair the four best worker/patch combinations
        // for the earliest possible fifth mineral return.
        if clock.frame == 0 {
            self.assign_initial_mineral_workers(catalog, world);
        }

        for worker in world.workers() {
            let Some(agent) = world.agent(worker) else {
                continue;
            };
            if !agent.exists || !agent.completed || !agent.is_worker {
                continue;
            }

            let mut job = self.job_of(worker);
            if job == Job::None {
                // Explicit re-dispatch: jobless workers mine minerals.
                job = Job::Minerals;
                self.jobs.insert(worker, Job::Minerals);
                debug!("agent {:?} assigned to minerals", worker);
            }

            match job {
                Job::Minerals => self.update_mineral_assignment(worker, &agent, catalog, travel),
                Job::Gas => self.update_gas_assignment(worker, &agent, catalog, travel, world),
                _ => {}
            }
        }
    }

    fn update_mineral_assignment(
        &mut self,
        worker: AgentId,
        agent: &AgentSnapshot,
        catalog: &dyn ResourceCatalog,
        travel: &dyn TravelEstimator,
    ) {
        // Locked to a live patch: nothing to re-evaluate.
        if let Some(&patch) = self.worker_patch.get(&worker) {
            if catalog.node(patch).map_or(false, |n| n.exists) {
                return;
            }
            self.clear_patch(worker);
        }

        let base = match self.valid_or_new_base(worker, agent, Job::Minerals, catalog, travel) {
            Some(base) => base,
            None => return,
        };
        let Some(base_snapshot) = catalog.base(base) else {
            return;
        };

        // Pick a patch once the worker is at the base and empty-handed.
        if agent.position.distance_to(base_snapshot.position) <= BASE_PROXIMITY
            && !agent.carrying_minerals
            && !agent.carrying_gas
            && self.assign_mineral_patch(worker, catalog).is_none()
        {
            // The base has no open patch after all; release it so the next
            // tick re-selects from scratch.
            self.clear_base(worker);
            self.jobs.insert(worker, Job::None);
        }
    }

    fn update_gas_assignment(
        &mut self,
        worker: AgentId,
        agent: &AgentSnapshot,
        catalog: &dyn ResourceCatalog,
        travel: &dyn TravelEstimator,
        world: &dyn AgentWorld,
    ) {
        if let Some(&refinery) = self.worker_refinery.get(&worker) {
            if catalog
                .node(refinery)
                .map_or(false, |n| n.exists && n.completed)
            {
                return;
            }
            self.clear_refinery(worker);
        }

        let base = match self.valid_or_new_base(worker, agent, Job::Gas, catalog, travel) {
            Some(base) => base,
            None => return,
        };
        let Some(base_snapshot) = catalog.base(base) else {
            return;
        };

        if agent.position.distance_to(base_snapshot.position) <= BASE_PROXIMITY
            && !agent.carrying_minerals
            && !agent.carrying_gas
            && self.assign_refinery(worker, catalog, world).is_none()
        {
            self.clear_base(worker);
            self.jobs.insert(worker, Job::None);
        }
    }

    /// Validate the worker's base assignment, lazily clearing stale ones,
    /// and select a new base if needed. Demotes the worker to jobless when
    /// no base has capacity.
    fn valid_or_new_base(
        &mut self,
        worker: AgentId,
        agent: &AgentSnapshot,
        job: Job,
        catalog: &dyn ResourceCatalog,
        travel: &dyn TravelEstimator,
    ) -> Option<BaseId> {
        if let Some(&base) = self.worker_base.get(&worker) {
            if catalog.base(base).map_or(false, |s| s.has_live_depot()) {
                return Some(base);
            }
            self.clear_base(worker);
        }

        let base = self.assign_base(worker, agent.position, job, catalog, travel);
        if base.is_none() {
            self.jobs.insert(worker, Job::None);
        }
        base
    }

    /// Pick the base with spare capacity for the given job that the worker
    /// can reach soonest. Incomplete depots cost at least their remaining
    /// construction time; unreachable bases are excluded.
    fn assign_base(
        &mut self,
        worker: AgentId,
        from: Position,
        job: Job,
        catalog: &dyn ResourceCatalog,
        travel: &dyn TravelEstimator,
    ) -> Option<BaseId> {
        let mut best: Option<(i32, BaseId)> = None;
        for base in catalog.bases() {
            match job {
                Job::Minerals if self.available_mineral_assignments_at_base(catalog, base) <= 0 => {
                    continue
                }
                Job::Gas if self.available_gas_assignments_at_base(catalog, base) <= 0 => continue,
                _ => {}
            }

            let Some(snapshot) = catalog.base(base) else {
                continue;
            };
            let Some(mut frames) = travel.travel_frames(from, snapshot.position) else {
                continue;
            };
            if let DepotState::UnderConstruction { remaining_frames } = snapshot.depot {
                frames = frames.max(remaining_frames);
            }

            if best.map_or(true, |(f, _)| frames < f) {
                best = Some((frames, base));
            }
        }

        let base = best.map(|(_, base)| base)?;
        self.worker_base.insert(worker, base);
        self.base_workers.entry(base).or_default().insert(worker);
        Some(base)
    }

    /// Pick a patch at the worker's base: an untouched patch closest to the
    /// depot if one exists, otherwise the half-filled patch farthest from
    /// the depot, spreading second workers away from the contested center.
    fn assign_mineral_patch(
        &mut self,
        worker: AgentId,
        catalog: &dyn ResourceCatalog,
    ) -> Option<NodeId> {
        let base = self.worker_base.get(&worker).copied()?;

        let mut best_empty: Option<(i32, NodeId)> = None;
        let mut best_shared: Option<(i32, NodeId)> = None;
        for patch in catalog.mineral_patches(base) {
            let Some(node) = catalog.node(patch) else {
                continue;
            };
            if !node.exists {
                continue;
            }
            let occupants = self.patch_workers.get(&patch).map_or(0, |s| s.len());
            if occupants >= MINERAL_PATCH_CAPACITY {
                continue;
            }
            if occupants == 0 {
                if best_empty.map_or(true, |(d, _)| node.depot_distance < d) {
                    best_empty = Some((node.depot_distance, patch));
                }
            } else if best_shared.map_or(true, |(d, _)| node.depot_distance > d) {
                best_shared = Some((node.depot_distance, patch));
            }
        }

        let patch = best_empty.or(best_shared).map(|(_, patch)| patch)?;
        self.worker_patch.insert(worker, patch);
        self.patch_workers.entry(patch).or_default().insert(worker);
        Some(patch)
    }

    /// Pick the nearest completed refinery at the worker's base with a free
    /// slot.
    fn assign_refinery(
        &mut self,
        worker: AgentId,
        catalog: &dyn ResourceCatalog,
        world: &dyn AgentWorld,
    ) -> Option<NodeId> {
        let base = self.worker_base.get(&worker).copied()?;

        let mut best: Option<(i32, NodeId)> = None;
        for refinery in catalog.refineries(base) {
            let Some(node) = catalog.node(refinery) else {
                continue;
            };
            if !node.exists || !node.completed {
                continue;
            }
            let occupants = self.refinery_workers.get(&refinery).map_or(0, |s| s.len());
            if occupants >= REFINERY_CAPACITY {
                continue;
            }
            let dist = world.distance_to_node(worker, refinery);
            if best.map_or(true, |(d, _)| dist < d) {
                best = Some((dist, refinery));
            }
        }

        let refinery = best.map(|(_, refinery)| refinery)?;
        self.worker_refinery.insert(worker, refinery);
        self.refinery_workers
            .entry(refinery)
            .or_default()
            .insert(worker);
        Some(refinery)
    }

    /// Greedy frame-0 pairing of the closest worker/patch combinations,
    /// weighting the depot leg double since it is travelled both ways
    /// before the first return.
    fn assign_initial_mineral_workers(
        &mut self,
        catalog: &dyn ResourceCatalog,
        world: &dyn AgentWorld,
    ) {
        let Some(base) = catalog.main_base() else {
            return;
        };

        for _ in 0..INITIAL_MINERAL_WORKERS {
            let mut best: Option<(i32, AgentId, NodeId)> = None;
            for worker in world.workers() {
                let Some(agent) = world.agent(worker) else {
                    continue;
                };
                if !agent.exists || !agent.completed || !agent.is_worker {
                    continue;
                }
                if self.worker_patch.contains_key(&worker) {
                    continue;
                }

                for patch in catalog.mineral_patches(base) {
                    let Some(node) = catalog.node(patch) else {
                        continue;
                    };
                    if !node.exists {
                        continue;
                    }
                    if self
                        .patch_workers
                        .get(&patch)
                        .map_or(false, |s| !s.is_empty())
                    {
                        continue;
                    }

                    let score = world.distance_to_node(worker, patch) + node.depot_distance * 2;
                    if best.map_or(true, |(s, _, _)| score < s) {
                        best = Some((score, worker, patch));
                    }
                }
            }

            let Some((_, worker, patch)) = best else {
                break;
            };
            self.jobs.insert(worker, Job::Minerals);
            self.worker_base.insert(worker, base);
            self.base_workers.entry(base).or_default().insert(worker);
            self.worker_patch.insert(worker, patch);
            self.patch_workers.entry(patch).or_default().insert(worker);
            debug!("agent {:?} bootstrapped onto patch {:?}", worker, patch);
        }
    }

    // ---- gas rebalancing --------------------------------------------------

    /// Gas workers attached to a refinery that still holds resources.
    /// This is the count compared against the desired number; workers at
    /// depleted refineries are surplus by definition.
    fn productive_gas_workers(&self, catalog: &dyn ResourceCatalog) -> usize {
        self.worker_refinery
            .values()
            .filter(|&&refinery| {
                catalog
                    .node(refinery)
                    .map_or(false, |n| n.exists && n.remaining > 0)
            })
            .count()
    }

    /// Release every worker parked at a refinery that has run dry.
    fn release_depleted_gas_workers(&mut self, catalog: &dyn ResourceCatalog) {
        let stuck: Vec<AgentId> = self
            .worker_refinery
            .iter()
            .filter(|(_, &refinery)| {
                catalog
                    .node(refinery)
                    .map_or(false, |n| n.exists && n.remaining <= 0)
            })
            .map(|(&worker, _)| worker)
            .collect();

        for worker in stuck {
            debug!("agent {:?} released from depleted refinery", worker);
            self.jobs.insert(worker, Job::None);
            self.clear_base(worker);
            self.clear_refinery(worker);
        }
    }

    /// Move the reassignable worker nearest an open refinery onto gas.
    fn assign_gas_worker(
        &mut self,
        catalog: &dyn ResourceCatalog,
        travel: &dyn TravelEstimator,
        world: &dyn AgentWorld,
    ) -> bool {
        let mut best: Option<(i32, AgentId)> = None;
        for worker in world.workers() {
            if !self.is_available_for_reassignment(world, worker, false) {
                continue;
            }
            for base in catalog.bases() {
                for refinery in catalog.refineries(base) {
                    let Some(node) = catalog.node(refinery) else {
                        continue;
                    };
                    if !node.exists || !node.completed || node.remaining <= 0 {
                        continue;
                    }
                    let occupants = self.refinery_workers.get(&refinery).map_or(0, |s| s.len());
                    if occupants >= REFINERY_CAPACITY {
                        continue;
                    }

                    let dist = world.distance_to_node(worker, refinery);
                    if best.map_or(true, |(d, _)| dist < d) {
                        best = Some((dist, worker));
                    }
                }
            }
        }

        let Some((_, worker)) = best else {
            return false;
        };

        self.jobs.insert(worker, Job::Gas);
        self.clear_base(worker);
        self.clear_patch(worker);
        if let Some(agent) = world.agent(worker) {
            if self
                .assign_base(worker, agent.position, Job::Gas, catalog, travel)
                .is_some()
            {
                self.assign_refinery(worker, catalog, world);
            }
        }
        debug!("agent {:?} assigned to gas", worker);
        true
    }

    /// Release the first gas worker whose base has spare mineral capacity.
    fn remove_gas_worker(&mut self, catalog: &dyn ResourceCatalog) -> bool {
        let candidates: Vec<AgentId> = self.worker_refinery.keys().copied().sorted().collect();
        for worker in candidates {
            let Some(&base) = self.worker_base.get(&worker) else {
                continue;
            };
            if self.available_mineral_assignments_at_base(catalog, base) > 0 {
                self.jobs.insert(worker, Job::None);
                self.clear_base(worker);
                self.clear_refinery(worker);
                debug!("agent {:?} released from gas", worker);
                return true;
            }
        }
        false
    }

    // ---- command issuance -------------------------------------------------

    /// Issue this tick's commands for every assigned worker, rebalancing
    /// the gas workforce first.
    pub fn issue_orders(
        &mut self,
        clock: FrameClock,
        catalog: &dyn ResourceCatalog,
        travel: &dyn TravelEstimator,
        world: &mut dyn AgentWorld,
        timer: &mut OrderTimer,
    ) {
        self.release_depleted_gas_workers(catalog);

        let mut current = self.productive_gas_workers(catalog);
        while current < self.desired_gas_workers {
            if !self.assign_gas_worker(catalog, travel, world) {
                break;
            }
            current += 1;
        }
        while current > self.desired_gas_workers {
            if !self.remove_gas_worker(catalog) {
                break;
            }
            current -= 1;
        }

        let assignments: Vec<(AgentId, Job)> = self
            .jobs
            .iter()
            .map(|(&agent, &job)| (agent, job))
            .sorted_by_key(|&(agent, _)| agent)
            .collect();

        for (worker, job) in assignments {
            if job != Job::Minerals && job != Job::Gas {
                continue;
            }
            let Some(agent) = world.agent(worker) else {
                continue;
            };
            if !agent.exists || !agent.completed {
                continue;
            }

            // Skip workers without a live base; the next assignment pass
            // sorts them out.
            let Some(base) = self.worker_base.get(&worker).copied() else {
                continue;
            };
            let Some(base_snapshot) = catalog.base(base) else {
                continue;
            };
            if !base_snapshot.has_live_depot() {
                continue;
            }

            if agent.carrying_minerals || agent.carrying_gas {
                issue_cargo_delivery(worker, &agent, base, &base_snapshot, catalog, travel, world);
                continue;
            }

            if let Some(patch) = self.worker_patch.get(&worker).copied() {
                if let Some(node) = catalog.node(patch) {
                    if node.exists {
                        self.issue_mineral_order(
                            clock, worker, &agent, patch, &node, catalog, world, timer,
                        );
                        continue;
                    }
                }
            }

            if let Some(refinery) = self.worker_refinery.get(&worker).copied() {
                if catalog
                    .node(refinery)
                    .map_or(false, |n| n.exists && n.completed)
                    && world.distance_to_node(worker, refinery) < REFINERY_GATHER_RANGE
                {
                    if !agent.order.is_gathering_gas() {
                        world.gather(worker, refinery);
                    }
                    continue;
                }
            }

            // Nothing better to do: head for the base.
            world.move_to(worker, base_snapshot.position);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn issue_mineral_order(
        &mut self,
        clock: FrameClock,
        worker: AgentId,
        agent: &AgentSnapshot,
        patch: NodeId,
        node: &NodeSnapshot,
        catalog: &dyn ResourceCatalog,
        world: &mut dyn AgentWorld,
        timer: &mut OrderTimer,
    ) {
        if let Some(ledger) = self.ledger.as_mut() {
            ledger.record(patch, mining_status(agent, node), clock.frame);
        }

        // The timing optimizer is authoritative; everything below is the
        // fallback path for ticks where it stays silent.
        if timer.optimize_start_of_mining(clock, worker, agent, patch, world) {
            return;
        }

        if agent.order.is_mining_minerals() || agent.order == UnitOrder::ReturnMinerals {
            return;
        }

        // Out of vision: walk to where the patch was last seen.
        if !node.visible {
            world.move_to(worker, node.position);
            return;
        }

        // Pre-emptive resend as the co-assigned worker finishes its swing,
        // so this worker starts mining the moment the patch frees up.
        let other = self
            .patch_workers
            .get(&patch)
            .and_then(|set| set.iter().copied().find(|&a| a != worker));
        if let Some(other) = other {
            if let Some(other_agent) = world.agent(other) {
                if other_agent.order == UnitOrder::MiningMinerals
                    && other_agent.order_timer + ORDER_TIMER_OFFSET
                        == ORDER_RESEND_WINDOW + clock.latency_frames
                {
                    // Far away with a stale command: stay quiet and let the
                    // order timer's learned resend fire instead.
                    let dist = world.distance_to_node(worker, patch);
                    if dist > NEAR_PATCH_DISTANCE
                        && agent.last_command_frame < clock.frame - STALE_COMMAND_FRAMES
                    {
                        return;
                    }
                    world.gather(worker, patch);
                    return;
                }
            }
        }

        // Mineral locking: an in-flight gather must not drift to another
        // patch, but only force-correct once the latency window has passed.
        if matches!(
            agent.order,
            UnitOrder::MoveToMinerals | UnitOrder::WaitForMinerals
        ) {
            let wrong_target = agent.order_target.map_or(false, |target| {
                target != patch && catalog.node(target).map_or(false, |n| n.remaining > 0)
            });
            if wrong_target && agent.last_command_frame < clock.frame - clock.latency_frames {
                world.gather(worker, patch);
            }
            return;
        }

        world.gather(worker, patch);
    }
}

/// Deliver carried cargo. With the home depot incomplete, a nearby finished
/// depot is used instead when the round trip beats waiting out the
/// remaining construction time.
fn issue_cargo_delivery(
    worker: AgentId,
    agent: &AgentSnapshot,
    base: BaseId,
    base_snapshot: &BaseSnapshot,
    catalog: &dyn ResourceCatalog,
    travel: &dyn TravelEstimator,
    world: &mut dyn AgentWorld,
) {
    if matches!(
        agent.order,
        UnitOrder::ReturnMinerals | UnitOrder::ReturnGas
    ) {
        return;
    }

    match base_snapshot.depot {
        DepotState::Completed => world.return_cargo(worker),
        DepotState::UnderConstruction { remaining_frames } => {
            let mut best: Option<(i32, BaseId)> = None;
            for other in catalog.bases() {
                if other == base {
                    continue;
                }
                let Some(snapshot) = catalog.base(other) else {
                    continue;
                };
                if !snapshot.depot_completed() {
                    continue;
                }
                let Some(out) = travel.travel_frames(agent.position, snapshot.position) else {
                    continue;
                };
                let Some(back) = travel.travel_frames(snapshot.position, base_snapshot.position)
                else {
                    continue;
                };
                let round_trip = out + back;
                if best.map_or(true, |(t, _)| round_trip < t) {
                    best = Some((round_trip, other));
                }
            }

            match best {
                Some((round_trip, other)) if round_trip < remaining_frames => {
                    world.right_click_depot(worker, other)
                }
                _ => world.move_to(worker, base_snapshot.position),
            }
        }
        DepotState::None => {}
    }
}

fn mining_status(agent: &AgentSnapshot, node: &NodeSnapshot) -> MiningStatus {
    if node.remaining <= 0 {
        return MiningStatus::Done;
    }
    match agent.order {
        UnitOrder::MiningMinerals | UnitOrder::ResetCollision => MiningStatus::Mining,
        UnitOrder::WaitForMinerals => MiningStatus::Waiting,
        UnitOrder::MoveToMinerals | UnitOrder::Move => MiningStatus::Moving,
        _ => MiningStatus::Unknown,
    }
}
