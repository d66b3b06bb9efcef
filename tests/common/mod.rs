//! Scripted game world for driving the engine without a simulation engine.
//!
//! `SimMap` plays the resource catalog and travel estimator; `SimAgents`
//! plays the live-unit side, recording every issued command instead of
//! executing it. Tests mutate snapshots directly to script each frame.

use fnv::FnvHashMap;
use harvest_foreman::*;

pub struct SimBase {
    pub snapshot: BaseSnapshot,
    pub patches: Vec<NodeId>,
    pub refineries: Vec<NodeId>,
}

#[derive(Default)]
pub struct SimMap {
    order: Vec<BaseId>,
    bases: FnvHashMap<BaseId, SimBase>,
    nodes: FnvHashMap<NodeId, NodeSnapshot>,
    main: Option<BaseId>,
}

impl SimMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_base(&mut self, id: u32, position: Position, depot: DepotState) -> BaseId {
        let base = BaseId(id);
        self.order.push(base);
        self.bases.insert(
            base,
            SimBase {
                snapshot: BaseSnapshot {
                    position,
                    owned: true,
                    depot,
                },
                patches: Vec::new(),
                refineries: Vec::new(),
            },
        );
        if self.main.is_none() {
            self.main = Some(base);
        }
        base
    }

    pub fn add_patch(
        &mut self,
        id: u32,
        base: BaseId,
        position: Position,
        depot_distance: i32,
    ) -> NodeId {
        let node = NodeId(id);
        self.nodes.insert(
            node,
            NodeSnapshot {
                kind: NodeKind::MineralPatch,
                position,
                tile: position.tile(),
                exists: true,
                visible: true,
                remaining: 1500,
                completed: true,
                depot_distance,
            },
        );
        self.bases.get_mut(&base).unwrap().patches.push(node);
        node
    }

    pub fn add_refinery(
        &mut self,
        id: u32,
        base: BaseId,
        position: Position,
        completed: bool,
    ) -> NodeId {
        let node = NodeId(id);
        self.nodes.insert(
            node,
            NodeSnapshot {
                kind: NodeKind::Refinery,
                position,
                tile: position.tile(),
                exists: true,
                visible: true,
                remaining: 5000,
                completed,
                depot_distance: 64,
            },
        );
        self.bases.get_mut(&base).unwrap().refineries.push(node);
        node
    }

    pub fn node_mut(&mut self, node: NodeId) -> &mut NodeSnapshot {
        self.nodes.get_mut(&node).unwrap()
    }

    pub fn base_mut(&mut self, base: BaseId) -> &mut BaseSnapshot {
        &mut self.bases.get_mut(&base).unwrap().snapshot
    }

    pub fn node_positions(&self) -> FnvHashMap<NodeId, Position> {
        self.nodes
            .iter()
            .map(|(&node, snapshot)| (node, snapshot.position))
            .collect()
    }
}

impl ResourceCatalog for SimMap {
    fn bases(&self) -> Vec<BaseId> {
        self.order.clone()
    }

    fn base(&self, base: BaseId) -> Option<BaseSnapshot> {
        self.bases.get(&base).map(|b| b.snapshot)
    }

    fn main_base(&self) -> Option<BaseId> {
        self.main
    }

    fn mineral_patches(&self, base: BaseId) -> Vec<NodeId> {
        self.bases.get(&base).map_or(Vec::new(), |b| b.patches.clone())
    }

    fn refineries(&self, base: BaseId) -> Vec<NodeId> {
        self.bases
            .get(&base)
            .map_or(Vec::new(), |b| b.refineries.clone())
    }

    fn node(&self, node: NodeId) -> Option<NodeSnapshot> {
        self.nodes.get(&node).copied()
    }

    fn node_at_tile(&self, tile: TilePosition) -> Option<NodeId> {
        self.nodes
            .iter()
            .find(|(_, snapshot)| snapshot.tile == tile)
            .map(|(&node, _)| node)
    }
}

impl TravelEstimator for SimMap {
    /// One pixel per frame over the straight line; good enough to compare
    /// candidates.
    fn travel_frames(&self, from: Position, to: Position) -> Option<i32> {
        Some(from.distance_to(to))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    MoveTo(AgentId, Position),
    Gather(AgentId, NodeId),
    ReturnCargo(AgentId),
    RightClickDepot(AgentId, BaseId),
}

pub struct SimAgents {
    order: Vec<AgentId>,
    agents: FnvHashMap<AgentId, AgentSnapshot>,
    node_positions: FnvHashMap<NodeId, Position>,
    pub commands: Vec<Command>,
}

impl SimAgents {
    pub fn new(map: &SimMap) -> Self {
        SimAgents {
            order: Vec::new(),
            agents: FnvHashMap::default(),
            node_positions: map.node_positions(),
            commands: Vec::new(),
        }
    }

    pub fn add_worker(&mut self, id: u32, position: Position) -> AgentId {
        let agent = AgentId(id);
        self.order.push(agent);
        self.agents.insert(
            agent,
            AgentSnapshot {
                position,
                exists: true,
                completed: true,
                is_worker: true,
                order: UnitOrder::Idle,
                order_target: None,
                order_timer: 0,
                carrying_minerals: false,
                carrying_gas: false,
                velocity: (0.0, 0.0),
                last_command_frame: 0,
            },
        );
        agent
    }

    pub fn agent_mut(&mut self, agent: AgentId) -> &mut AgentSnapshot {
        self.agents.get_mut(&agent).unwrap()
    }

    /// Simulate destruction: the unit disappears from the roster.
    pub fn remove_worker(&mut self, agent: AgentId) {
        self.order.retain(|&a| a != agent);
        self.agents.remove(&agent);
    }

    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    pub fn gathers_for(&self, agent: AgentId) -> Vec<NodeId> {
        self.commands
            .iter()
            .filter_map(|command| match command {
                Command::Gather(a, node) if *a == agent => Some(*node),
                _ => None,
            })
            .collect()
    }
}

impl AgentWorld for SimAgents {
    fn workers(&self) -> Vec<AgentId> {
        self.order.clone()
    }

    fn agent(&self, agent: AgentId) -> Option<AgentSnapshot> {
        self.agents.get(&agent).copied()
    }

    fn distance_to_node(&self, agent: AgentId, node: NodeId) -> i32 {
        let Some(snapshot) = self.agents.get(&agent) else {
            return i32::MAX;
        };
        let Some(&position) = self.node_positions.get(&node) else {
            return i32::MAX;
        };
        snapshot.position.distance_to(position)
    }

    fn move_to(&mut self, agent: AgentId, target: Position) {
        self.commands.push(Command::MoveTo(agent, target));
    }

    fn gather(&mut self, agent: AgentId, node: NodeId) {
        self.commands.push(Command::Gather(agent, node));
    }

    fn return_cargo(&mut self, agent: AgentId) {
        self.commands.push(Command::ReturnCargo(agent));
    }

    fn right_click_depot(&mut self, agent: AgentId, base: BaseId) {
        self.commands.push(Command::RightClickDepot(agent, base));
    }
}

/// An order timer whose persistence points nowhere; tests that need real
/// files build their own config.
pub fn detached_order_timer() -> OrderTimer {
    OrderTimer::new(PersistConfig {
        read_dirs: vec![std::path::PathBuf::from("does/not/exist")],
        write_dir: std::path::PathBuf::from("does/not/exist"),
        map_hash: "sim".to_string(),
    })
}
