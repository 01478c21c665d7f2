//! k-core peeling of a period's pickup -> dropoff flow graph.
//!
//! Pickups and dropoffs are kept in separate adjacency maps, so a zone that is
//! both a pickup and a dropoff is two distinct nodes. Peeling a node on one
//! side deletes its edges from the other side too, which can push neighbours
//! under the threshold; each threshold is therefore repeated until neither
//! side loses a node.

use std::collections::{BTreeMap, BTreeSet};

use crate::grid::ZoneId;
use crate::metrics::FlowCounts;

type Adjacency = BTreeMap<ZoneId, BTreeSet<ZoneId>>;

/// Directed pickup -> dropoff edge.
pub type Edge = (ZoneId, ZoneId);

/// Owned bipartite view of one period's flows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlowGraph {
    outbound: Adjacency,
    inbound: Adjacency,
}

impl FlowGraph {
    pub fn from_flows(flows: &FlowCounts) -> Self {
        let mut graph = Self::default();
        for (&pickup, dropoffs) in flows {
            let targets = graph.outbound.entry(pickup).or_default();
            for &dropoff in dropoffs.keys() {
                targets.insert(dropoff);
                graph.inbound.entry(dropoff).or_default().insert(pickup);
            }
        }
        graph
    }

    pub fn is_empty(&self) -> bool {
        self.outbound.is_empty() && self.inbound.is_empty()
    }

    /// Smallest degree among remaining nodes on either side.
    pub fn min_degree(&self) -> Option<usize> {
        self.outbound
            .values()
            .chain(self.inbound.values())
            .map(BTreeSet::len)
            .min()
    }

    pub fn out_degree(&self, pickup: ZoneId) -> usize {
        self.outbound.get(&pickup).map_or(0, BTreeSet::len)
    }

    pub fn in_degree(&self, dropoff: ZoneId) -> usize {
        self.inbound.get(&dropoff).map_or(0, BTreeSet::len)
    }

    /// Edges as seen from the pickup side.
    pub fn outbound_edges(&self) -> BTreeSet<Edge> {
        edges(&self.outbound, false)
    }

    /// Edges as seen from the dropoff side, reversed to pickup -> dropoff.
    pub fn inbound_edges(&self) -> BTreeSet<Edge> {
        edges(&self.inbound, true)
    }
}

fn edges(adjacency: &Adjacency, reverse: bool) -> BTreeSet<Edge> {
    adjacency
        .iter()
        .flat_map(|(&node, neighbours)| {
            neighbours
                .iter()
                .map(move |&other| if reverse { (other, node) } else { (node, other) })
        })
        .collect()
}

/// Removes every node of `side` with degree at most `threshold`, along with
/// its edges in `other`. Returns the removed nodes.
fn peel(side: &mut Adjacency, other: &mut Adjacency, threshold: usize) -> Vec<ZoneId> {
    let doomed: Vec<ZoneId> = side
        .iter()
        .filter(|(_, neighbours)| neighbours.len() <= threshold)
        .map(|(&node, _)| node)
        .collect();

    for node in &doomed {
        let Some(neighbours) = side.remove(node) else {
            continue;
        };
        for neighbour in neighbours {
            if let Some(back) = other.get_mut(&neighbour) {
                back.remove(node);
            }
        }
    }
    doomed
}

/// Result of peeling a flow graph for one privacy level.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Decomposition {
    /// The graph left after peeling.
    pub graph: FlowGraph,
    /// Pickup zones removed at each threshold.
    pub pickups_removed: BTreeMap<usize, Vec<ZoneId>>,
    /// Dropoff zones removed at each threshold.
    pub dropoffs_removed: BTreeMap<usize, Vec<ZoneId>>,
}

impl Decomposition {
    /// Highest threshold that removed anything, if any.
    pub fn deepest_level(&self) -> Option<usize> {
        self.pickups_removed
            .keys()
            .chain(self.dropoffs_removed.keys())
            .copied()
            .max()
    }
}

/// Peels `graph` at thresholds `1..k`.
///
/// Each threshold is peeled on both sides until neither side loses a node.
/// The first threshold that removes nothing at all ends the decomposition:
/// every remaining node already has a degree above it, and the survivors are
/// published as they stand.
pub fn decompose(mut graph: FlowGraph, k: usize) -> Decomposition {
    let mut pickups_removed: BTreeMap<usize, Vec<ZoneId>> = BTreeMap::new();
    let mut dropoffs_removed: BTreeMap<usize, Vec<ZoneId>> = BTreeMap::new();

    for threshold in 1..k {
        let mut removed_any = false;
        loop {
            let out = peel(&mut graph.outbound, &mut graph.inbound, threshold);
            let inn = peel(&mut graph.inbound, &mut graph.outbound, threshold);
            if out.is_empty() && inn.is_empty() {
                break;
            }
            removed_any = true;
            if !out.is_empty() {
                pickups_removed.entry(threshold).or_default().extend(out);
            }
            if !inn.is_empty() {
                dropoffs_removed.entry(threshold).or_default().extend(inn);
            }
        }

        if !removed_any || graph.is_empty() {
            break;
        }
    }

    Decomposition {
        graph,
        pickups_removed,
        dropoffs_removed,
    }
}
