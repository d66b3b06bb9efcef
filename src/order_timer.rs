//! Harvest order-timing optimizer.
//!
//! The simulation engine imposes a fixed wait between a worker touching a
//! resource and its gather order taking effect. That wait can be skipped by
//! resending the gather command from exactly the right spot on the approach
//! path. This module learns those spots per resource node: it records each
//! tracked worker's (position, velocity) every frame, and when a worker
//! arrives it back-computes which historical sample was the last one from
//! which a resend would have been accepted in time, promoting it into a
//! per-node learned set. The set is persisted per map across sessions.

use crate::constants::*;
use crate::game::*;
use crate::persist::*;
use crate::position::*;
use fnv::FnvHashMap;
use log::*;
use std::collections::{BTreeMap, BTreeSet};

pub struct OrderTimer {
    config: PersistConfig,
    /// Learned resend signatures per node. `BTreeSet` keeps a deterministic
    /// total order over (position, vx, vy) for storage and lookup.
    optimal_positions: FnvHashMap<NodeId, BTreeSet<PositionAndVelocity>>,
    /// Frame-keyed kinematic history per tracked agent, cleared on arrival.
    position_history: FnvHashMap<AgentId, BTreeMap<i32, PositionAndVelocity>>,
}

impl OrderTimer {
    pub fn new(config: PersistConfig) -> Self {
        OrderTimer {
            config,
            optimal_positions: FnvHashMap::default(),
            position_history: FnvHashMap::default(),
        }
    }

    /// Load the learned set persisted by earlier sessions on this map.
    ///
    /// Persisted entries are keyed by node tile; entries whose tile no
    /// longer resolves to a live node are dropped (map revisions move
    /// patches around).
    pub fn load(&mut self, catalog: &dyn ResourceCatalog) {
        self.optimal_positions.clear();
        self.position_history.clear();

        for signature in load_signatures(&self.config) {
            match catalog.node_at_tile(signature.tile) {
                Some(node) => {
                    self.optimal_positions
                        .entry(node)
                        .or_default()
                        .insert(signature.sample);
                }
                None => debug!(
                    "discarding learned position for unknown tile {:?}",
                    signature.tile
                ),
            }
        }
    }

    /// Write the learned set back to disk, overwriting the previous file.
    /// Nodes that no longer resolve in the catalog are omitted.
    pub fn store(&self, catalog: &dyn ResourceCatalog) -> Result<(), PersistError> {
        let mut signatures = Vec::new();
        let mut nodes: Vec<_> = self.optimal_positions.keys().copied().collect();
        nodes.sort();
        for node in nodes {
            let Some(snapshot) = catalog.node(node) else {
                continue;
            };
            for &sample in &self.optimal_positions[&node] {
                signatures.push(PersistedSignature {
                    tile: snapshot.tile,
                    sample,
                });
            }
        }
        store_signatures(&self.config, &signatures)
    }

    /// Forget a destroyed or reassigned agent's history.
    pub fn on_agent_lost(&mut self, agent: AgentId) {
        self.position_history.remove(&agent);
    }

    /// Number of learned signatures for a node (diagnostics).
    pub fn learned_signatures(&self, node: NodeId) -> usize {
        self.optimal_positions
            .get(&node)
            .map_or(0, |set| set.len())
    }

    /// Run the timing optimization for one worker approaching its patch.
    ///
    /// Returns true if a gather command was sent, in which case the
    /// default order logic must be skipped for this agent this tick.
    pub fn optimize_start_of_mining(
        &mut self,
        clock: FrameClock,
        agent: AgentId,
        snapshot: &AgentSnapshot,
        node: NodeId,
        world: &mut dyn AgentWorld,
    ) -> bool {
        let dist = world.distance_to_node(agent, node);
        if dist > ORDER_TIMER_TRACK_RANGE {
            return false;
        }

        if dist == 0 {
            self.record_arrival(clock, agent, node);
            return false;
        }

        let current = PositionAndVelocity::quantize(snapshot.position, snapshot.velocity);

        // Resend the gather order if this exact kinematic state previously
        // led to an on-time acceptance at this node.
        let resend = snapshot.order == UnitOrder::MoveToMinerals
            && self
                .optimal_positions
                .get(&node)
                .map_or(false, |set| set.contains(&current));
        if resend {
            world.gather(agent, node);
        }

        self.position_history
            .entry(agent)
            .or_default()
            .insert(clock.frame, current);

        resend
    }

    /// The worker has reached its node: promote the sample recorded at the
    /// back-computed optimal frame into the learned set, then drop the
    /// history.
    fn record_arrival(&mut self, clock: FrameClock, agent: AgentId, node: NodeId) {
        let Some(history) = self.position_history.get_mut(&agent) else {
            return;
        };

        let optimal_frame = clock.frame - clock.latency_frames - ORDER_RESEND_WINDOW;
        if let Some(&sample) = history.get(&optimal_frame) {
            let learned = self.optimal_positions.entry(node).or_default();

            // Workers sometimes take slightly different routes near the
            // patch. A command sent a frame late still lands in time, so
            // samples just after the optimal frame stay; anything recorded
            // much later than that must not remain in the learned set.
            for (&frame, late_sample) in history.iter() {
                if frame <= optimal_frame + HISTORY_LATE_TOLERANCE {
                    continue;
                }
                learned.remove(late_sample);
            }

            learned.insert(sample);
            debug!(
                "learned resend position for node {:?} at frame {} ({} total)",
                node,
                optimal_frame,
                learned.len()
            );
        }

        history.clear();
    }
}
