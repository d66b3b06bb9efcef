//! Collaborator seams between this crate and the host bot.
//!
//! The engine never holds references into the host's unit arenas; agents,
//! bases and resource nodes are addressed by stable integer keys and all
//! game state is read through snapshot structs. Implementations of the
//! three traits exist on the host side (live game) and in the test suite
//! (scripted world), so the crate compiles and tests offline.

use crate::position::*;
use serde::{Deserialize, Serialize};

/// Stable key for a harvesting-capable unit owned by the controlling player.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
pub struct AgentId(pub u32);

/// Stable key for a base (expansion location with a resource depot slot).
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
pub struct BaseId(pub u32);

/// Stable key for a resource node (mineral patch or refinery).
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
pub struct NodeId(pub u32);

/// The engine-level order a unit is currently executing.
///
/// This is a closed projection of the underlying simulation's order state.
/// Orders the core does not reason about map to `Other` rather than being
/// unrepresentable.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum UnitOrder {
    Idle,
    Move,
    MoveToMinerals,
    WaitForMinerals,
    MiningMinerals,
    ReturnMinerals,
    /// Post-mining collision reset; the unit is still effectively mining.
    ResetCollision,
    MoveToGas,
    WaitForGas,
    HarvestGas,
    ReturnGas,
    Other,
}

impl UnitOrder {
    /// The unit is actively mining a patch and must not be disturbed.
    pub fn is_mining_minerals(self) -> bool {
        matches!(self, UnitOrder::MiningMinerals | UnitOrder::ResetCollision)
    }

    /// The unit is somewhere in the gas-gathering cycle.
    pub fn is_gathering_gas(self) -> bool {
        matches!(
            self,
            UnitOrder::MoveToGas
                | UnitOrder::WaitForGas
                | UnitOrder::HarvestGas
                | UnitOrder::ReturnGas
        )
    }
}

/// The current simulation frame and the engine's command latency.
#[derive(Copy, Clone, Debug)]
pub struct FrameClock {
    pub frame: i32,
    /// Frames between a command being issued and the engine acting on it.
    pub latency_frames: i32,
}

impl FrameClock {
    pub fn new(frame: i32, latency_frames: i32) -> Self {
        FrameClock {
            frame,
            latency_frames,
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum NodeKind {
    MineralPatch,
    Refinery,
}

/// Read-only view of a resource node for the current frame.
#[derive(Copy, Clone, Debug)]
pub struct NodeSnapshot {
    pub kind: NodeKind,
    /// Last known center position.
    pub position: Position,
    /// Initial tile; stable across sessions, used as the persistence key.
    pub tile: TilePosition,
    pub exists: bool,
    /// Whether the node is visible this frame (mineral patches outside
    /// vision report their last known state).
    pub visible: bool,
    /// Remaining resource amount; 0 for a depleted geyser or mined-out patch.
    pub remaining: i32,
    /// Refineries under construction are not gatherable yet. Always true
    /// for mineral patches.
    pub completed: bool,
    /// Edge-to-edge distance from this node to its base's depot location.
    pub depot_distance: i32,
}

/// Construction state of a base's resource depot.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum DepotState {
    None,
    UnderConstruction { remaining_frames: i32 },
    Completed,
}

/// Read-only view of a base for the current frame.
#[derive(Copy, Clone, Debug)]
pub struct BaseSnapshot {
    pub position: Position,
    /// Whether the controlling player owns this base.
    pub owned: bool,
    pub depot: DepotState,
}

impl BaseSnapshot {
    /// A base can host workers only while it is owned and its depot exists.
    pub fn has_live_depot(&self) -> bool {
        self.owned && !matches!(self.depot, DepotState::None)
    }

    pub fn depot_completed(&self) -> bool {
        self.owned && self.depot == DepotState::Completed
    }
}

/// Read-only view of an agent for the current frame.
#[derive(Copy, Clone, Debug)]
pub struct AgentSnapshot {
    pub position: Position,
    pub exists: bool,
    pub completed: bool,
    pub is_worker: bool,
    pub order: UnitOrder,
    /// The resource node the current order targets, if any.
    pub order_target: Option<NodeId>,
    /// The engine's internal countdown for the current order.
    pub order_timer: i32,
    pub carrying_minerals: bool,
    pub carrying_gas: bool,
    /// Raw velocity in pixels per frame.
    pub velocity: (f64, f64),
    /// Frame at which the last command was issued to this agent.
    pub last_command_frame: i32,
}

/// The spatial map model: which bases and resource nodes exist.
pub trait ResourceCatalog {
    /// All known bases, owned or not. Ownership gates are applied by the
    /// capacity counters, not by this listing.
    fn bases(&self) -> Vec<BaseId>;

    fn base(&self, base: BaseId) -> Option<BaseSnapshot>;

    /// The player's starting base, used by the frame-0 bootstrap.
    fn main_base(&self) -> Option<BaseId>;

    fn mineral_patches(&self, base: BaseId) -> Vec<NodeId>;

    fn refineries(&self, base: BaseId) -> Vec<NodeId>;

    fn node(&self, node: NodeId) -> Option<NodeSnapshot>;

    /// Resolve a persisted tile key back to a live node, if one is there.
    fn node_at_tile(&self, tile: TilePosition) -> Option<NodeId>;
}

/// Estimates worker travel times over the map's pathing topology.
pub trait TravelEstimator {
    /// Expected frames for a worker to travel between two points, or
    /// `None` if no path exists.
    fn travel_frames(&self, from: Position, to: Position) -> Option<i32>;
}

/// The live-unit side: per-agent state reads and command primitives.
///
/// Commands take effect `latency_frames` after issuance; the engine never
/// assumes an issued command is already visible in the same tick's state.
pub trait AgentWorld {
    /// All completed-or-building worker units owned by the player.
    fn workers(&self) -> Vec<AgentId>;

    fn agent(&self, agent: AgentId) -> Option<AgentSnapshot>;

    /// Edge-to-edge distance between an agent and a node, as the
    /// simulation reports it (0 means adjacent/touching).
    fn distance_to_node(&self, agent: AgentId, node: NodeId) -> i32;

    fn move_to(&mut self, agent: AgentId, target: Position);

    fn gather(&mut self, agent: AgentId, node: NodeId);

    fn return_cargo(&mut self, agent: AgentId);

    /// Deliver carried cargo to a specific base's depot.
    fn right_click_depot(&mut self, agent: AgentId, base: BaseId);
}
