//! Agent interaction graphs and their decomposition into solve groups.
//!
//! Nodes of an interaction graph are agents (node index = layout index) and
//! an edge joins two agents that come within the coupling radius; its
//! weight is the closest distance observed.

use std::collections::BTreeSet;

use ndarray::ArrayView2;
use petgraph::{
    graph::{NodeIndex, UnGraph},
    visit::EdgeRef,
};

use crate::mas::{pairwise_distances, AgentId, AgentLayout};

/// Build the interaction graph of the joint states in `states` (one per
/// row).
///
/// Example
/// ```
/// use ndarray::array;
/// use multi_ilqr::{graphs::interaction_graph, AgentId, AgentLayout};
///
/// let layout = AgentLayout::new([(AgentId(0), 2, 1), (AgentId(1), 2, 1), (AgentId(2), 2, 1)]).unwrap();
/// // Positions 0, 1 and 10 on a line, each with zero velocity.
/// let x = array![[0., 0., 1., 0., 10., 0.]];
/// let graph = interaction_graph(&layout, x.view(), 1, 2.0);
/// assert_eq!(graph.node_count(), 3);
/// assert_eq!(graph.edge_count(), 1);
/// ```
pub fn interaction_graph(
    layout: &AgentLayout,
    states: ArrayView2<f64>,
    n_position: usize,
    coupling_radius: f64,
) -> UnGraph<AgentId, f64> {
    let n = layout.n_agents();
    let mut closest = vec![f64::INFINITY; n * n];
    for x in states.rows() {
        for (i, j, d) in pairwise_distances(layout, x, n_position) {
            let entry = &mut closest[i * n + j];
            *entry = entry.min(d);
        }
    }

    let mut graph = UnGraph::with_capacity(n, 0);
    for slice in layout.slices() {
        graph.add_node(slice.id);
    }
    for i in 0..n {
        for j in (i + 1)..n {
            let d = closest[i * n + j];
            if d <= coupling_radius {
                graph.add_edge(NodeIndex::new(i), NodeIndex::new(j), d);
            }
        }
    }
    graph
}

/// A set of agents solved together.
///
/// `members` are in layout order; `egos` are the members whose planned
/// trajectory is taken from this group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Group {
    pub members: Vec<AgentId>,
    pub egos: Vec<AgentId>,
}

impl Group {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Assignment of every agent to exactly one ego group. Groups may overlap
/// in their non-ego members.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Partition {
    groups: Vec<Group>,
}

impl Partition {
    /// One group containing every agent.
    pub fn centralized(ids: &[AgentId]) -> Partition {
        Partition {
            groups: vec![Group {
                members: ids.to_vec(),
                egos: ids.to_vec(),
            }],
        }
    }

    /// Give every agent a group of itself and its nearest `n_d - 1`
    /// neighbours in `graph`. Agents whose groups have identical members
    /// share one group.
    pub fn decentralized(graph: &UnGraph<AgentId, f64>, n_d: usize) -> Partition {
        let mut groups: Vec<(BTreeSet<usize>, Group)> = Vec::new();
        for node in graph.node_indices() {
            let mut neighbours: Vec<(f64, usize)> = graph
                .edges(node)
                .map(|e| {
                    let other = if e.source() == node { e.target() } else { e.source() };
                    (*e.weight(), other.index())
                })
                .collect();
            neighbours.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

            let mut members: BTreeSet<usize> = neighbours
                .into_iter()
                .take(n_d.saturating_sub(1))
                .map(|(_, j)| j)
                .collect();
            members.insert(node.index());

            let ego = graph[node];
            match groups.iter_mut().find(|(key, _)| *key == members) {
                Some((_, group)) => group.egos.push(ego),
                None => {
                    let group = Group {
                        members: members.iter().map(|&j| graph[NodeIndex::new(j)]).collect(),
                        egos: vec![ego],
                    };
                    groups.push((members, group));
                }
            }
        }
        Partition {
            groups: groups.into_iter().map(|(_, group)| group).collect(),
        }
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// The group that plans for `id`.
    pub fn ego_group(&self, id: AgentId) -> Option<&Group> {
        self.groups.iter().find(|g| g.egos.contains(&id))
    }
}
