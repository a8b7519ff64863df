//! Cycle detection over the link graph.
//!
//! Graph nodes are the parts that own ports: a port's nearest ancestor with
//! a node role, or the port's top-level part when there is none. Edges are
//! the attached links between them. Links between two ports of the same node
//! are ignored.
//!
//! Each query builds its visited set afresh, so concurrent queries on the
//! same document never interfere.

use std::collections::HashSet;

use log::info;

use vellum_core::{
    change::{Change, DocumentChange},
    key::PartKey,
    policy::ValidCycle,
};

use crate::{Document, Result, store::PartStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Outgoing,
    Incoming,
}

/// Read-only cycle queries over a document's link graph.
#[derive(Debug, Clone, Copy)]
pub struct CycleChecker<'a> {
    parts: &'a PartStore,
}

impl<'a> CycleChecker<'a> {
    pub(crate) fn new(parts: &'a PartStore) -> Self {
        Self { parts }
    }

    /// The graph node owning `port`.
    pub fn node_of(&self, port: PartKey) -> PartKey {
        self.parts
            .ancestors(port)
            .into_iter()
            .find(|key| self.parts.get(*key).is_some_and(|p| p.node().is_some()))
            .unwrap_or_else(|| self.parts.top_level(port))
    }

    fn neighbors(&self, node: PartKey, direction: Direction) -> Vec<PartKey> {
        let mut out = Vec::new();
        for port in self.parts.subtree(node) {
            let Some(port_role) = self.parts.get(port).and_then(|p| p.port()) else {
                continue;
            };
            if self.node_of(port) != node {
                continue;
            }
            for link in port_role.links() {
                if !self.parts.is_attached(*link) {
                    continue;
                }
                let Some(role) = self.parts.get(*link).and_then(|p| p.link()) else {
                    continue;
                };
                let (near, far) = match direction {
                    Direction::Outgoing => (role.from_port(), role.to_port()),
                    Direction::Incoming => (role.to_port(), role.from_port()),
                };
                let (Some(near), Some(far)) = (near, far) else {
                    continue;
                };
                if near != port {
                    continue;
                }
                let other = self.node_of(far);
                if other != node {
                    out.push(other);
                }
            }
        }
        out
    }

    /// Nodes reached by links leaving `node`.
    pub fn outgoing(&self, node: PartKey) -> Vec<PartKey> {
        self.neighbors(node, Direction::Outgoing)
    }

    /// Nodes whose links arrive at `node`.
    pub fn incoming(&self, node: PartKey) -> Vec<PartKey> {
        self.neighbors(node, Direction::Incoming)
    }

    /// Whether adding a link `a -> b` would close a directed cycle, i.e.
    /// whether `a` is reachable from `b`.
    pub fn makes_directed_cycle(&self, a: PartKey, b: PartKey) -> bool {
        if a == b {
            return true;
        }
        let mut visited = HashSet::from([b]);
        let mut stack = vec![b];
        while let Some(node) = stack.pop() {
            for next in self.outgoing(node) {
                if next == a {
                    return true;
                }
                if visited.insert(next) {
                    stack.push(next);
                }
            }
        }
        false
    }

    /// Like [`CycleChecker::makes_directed_cycle`] without a visited set.
    ///
    /// The existing graph must be acyclic; on a cyclic graph this does not
    /// terminate.
    pub fn makes_directed_cycle_fast(&self, a: PartKey, b: PartKey) -> bool {
        a == b || self.reaches(b, a)
    }

    fn reaches(&self, from: PartKey, target: PartKey) -> bool {
        self.outgoing(from)
            .into_iter()
            .any(|next| next == target || self.reaches(next, target))
    }

    /// Whether adding a link between `a` and `b` would close a cycle when
    /// link direction is ignored.
    pub fn makes_undirected_cycle(&self, a: PartKey, b: PartKey) -> bool {
        if a == b {
            return true;
        }
        let mut visited = HashSet::from([b]);
        let mut stack = vec![b];
        while let Some(node) = stack.pop() {
            let mut neighbors = self.outgoing(node);
            neighbors.extend(self.incoming(node));
            for next in neighbors {
                if next == a {
                    return true;
                }
                if visited.insert(next) {
                    stack.push(next);
                }
            }
        }
        false
    }
}

impl Document {
    pub fn cycle_checker(&self) -> CycleChecker<'_> {
        CycleChecker::new(&self.parts)
    }

    pub fn makes_directed_cycle(&self, a: PartKey, b: PartKey) -> bool {
        self.cycle_checker().makes_directed_cycle(a, b)
    }

    pub fn makes_directed_cycle_fast(&self, a: PartKey, b: PartKey) -> bool {
        self.cycle_checker().makes_directed_cycle_fast(a, b)
    }

    pub fn makes_undirected_cycle(&self, a: PartKey, b: PartKey) -> bool {
        self.cycle_checker().makes_undirected_cycle(a, b)
    }

    pub fn valid_cycle(&self) -> ValidCycle {
        self.valid_cycle
    }

    pub fn set_valid_cycle(&mut self, mode: ValidCycle) -> Result<()> {
        if mode == self.valid_cycle {
            return Ok(());
        }
        let old = std::mem::replace(&mut self.valid_cycle, mode);
        info!(old:% = old, new:% = mode; "Link cycle policy changed");
        self.raise(Change::Document(DocumentChange::ValidCycle { old, new: mode }))
    }
}
