//! Mining diagnostics.
//!
//! Records per-node status transitions so inefficient mining (workers
//! waiting on a contested patch, patches going idle) can be inspected
//! offline. Purely observational: the engine runs identically with or
//! without a ledger attached.

use crate::game::NodeId;
use fnv::FnvHashMap;
use serde::Serialize;

#[derive(Copy, Clone, Eq, PartialEq, Debug, Serialize)]
pub enum MiningStatus {
    Unknown,
    /// A worker is on its way to the node.
    Moving,
    /// A worker is waiting for the node to free up.
    Waiting,
    /// A worker is actively extracting.
    Mining,
    /// The node is depleted.
    Done,
}

#[derive(Serialize)]
struct NodeLog {
    node: u32,
    events: Vec<(MiningStatus, i32)>,
}

/// Per-node ordered sequence of (status, frame) changes.
#[derive(Default)]
pub struct MiningStatusLedger {
    entries: FnvHashMap<NodeId, Vec<(MiningStatus, i32)>>,
}

impl MiningStatusLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a status observation; consecutive duplicates collapse.
    pub fn record(&mut self, node: NodeId, status: MiningStatus, frame: i32) {
        let events = self.entries.entry(node).or_default();
        if events.last().map(|&(last, _)| last) == Some(status) {
            return;
        }
        events.push((status, frame));
    }

    pub fn events(&self, node: NodeId) -> &[(MiningStatus, i32)] {
        self.entries
            .get(&node)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Dump the whole ledger as JSON, nodes in ascending id order.
    pub fn to_json(&self) -> String {
        let mut logs: Vec<NodeLog> = self
            .entries
            .iter()
            .map(|(node, events)| NodeLog {
                node: node.0,
                events: events.clone(),
            })
            .collect();
        logs.sort_by_key(|log| log.node);
        serde_json::to_string(&logs).unwrap_or_else(|_| "[]".to_string())
    }
}
