use super::Position;
use crate::node::NodeId;
use std::collections::VecDeque;

/// Static shortest-hop routes over the links that are up.
///
/// A link is up between two nodes at most `range` metres apart. Routes
/// are computed once, with a breadth first search from every node;
/// neighbours are explored by increasing [`NodeId`] so that ties always
/// resolve to the same path.
///
/// ```
/// # use manet_core::{network::{GridLayout, RoutingTable}, node::NodeId};
/// let grid = GridLayout::new(3, 500.0);
/// let positions: Vec<_> = (0..9).map(|i| grid.position(i)).collect();
/// let routes = RoutingTable::compute(&positions, 550.0);
///
/// // 0 1 2
/// // 3 4 5
/// // 6 7 8
/// assert_eq!(routes.hops(NodeId::new(8), NodeId::new(0)), Some(4));
/// assert_eq!(routes.next_hop(NodeId::new(8), NodeId::new(0)), Some(NodeId::new(5)));
/// ```
#[derive(Debug, Clone)]
pub struct RoutingTable {
    neighbours: Vec<Vec<NodeId>>,

    /// `routes[from][to]`: next hop and hop count
    routes: Vec<Vec<Option<(NodeId, usize)>>>,
}

impl RoutingTable {
    pub fn compute(positions: &[Position], range: f64) -> Self {
        let neighbours: Vec<Vec<NodeId>> = positions
            .iter()
            .enumerate()
            .map(|(i, a)| {
                positions
                    .iter()
                    .enumerate()
                    .filter(|(j, b)| *j != i && a.distance(b) <= range)
                    .map(|(j, _)| NodeId::new(j as u32))
                    .collect()
            })
            .collect();

        let routes = (0..positions.len())
            .map(|from| Self::search(&neighbours, from))
            .collect();

        Self { neighbours, routes }
    }

    fn search(neighbours: &[Vec<NodeId>], from: usize) -> Vec<Option<(NodeId, usize)>> {
        let mut routes = vec![None; neighbours.len()];
        let mut visited = vec![false; neighbours.len()];
        let mut queue = VecDeque::new();

        visited[from] = true;
        for &first in &neighbours[from] {
            visited[first.index()] = true;
            routes[first.index()] = Some((first, 1));
            queue.push_back(first);
        }

        while let Some(node) = queue.pop_front() {
            let Some((first, hops)) = routes[node.index()] else {
                continue;
            };
            for &next in &neighbours[node.index()] {
                if !visited[next.index()] {
                    visited[next.index()] = true;
                    routes[next.index()] = Some((first, hops + 1));
                    queue.push_back(next);
                }
            }
        }

        routes
    }

    pub fn len(&self) -> usize {
        self.neighbours.len()
    }

    pub fn is_empty(&self) -> bool {
        self.neighbours.is_empty()
    }

    /// Nodes with a link up to `node`, by increasing id.
    pub fn neighbours(&self, node: NodeId) -> &[NodeId] {
        self.neighbours
            .get(node.index())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Where `from` forwards a packet for `to`.
    ///
    /// `None` when `to` is unreachable, unknown, or `from` itself.
    pub fn next_hop(&self, from: NodeId, to: NodeId) -> Option<NodeId> {
        self.route(from, to).map(|(next, _)| next)
    }

    pub fn hops(&self, from: NodeId, to: NodeId) -> Option<usize> {
        if from == to && from.index() < self.len() {
            return Some(0);
        }
        self.route(from, to).map(|(_, hops)| hops)
    }

    fn route(&self, from: NodeId, to: NodeId) -> Option<(NodeId, usize)> {
        *self.routes.get(from.index())?.get(to.index())?
    }
}
