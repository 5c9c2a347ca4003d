// Copyright 2026 the Bracken Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Immutable structural snapshots of a graph.
//!
//! A snapshot is a pure read: it reports cached values as they are and
//! never triggers recomputation, so it is safe to take from inside an
//! observer callback mid-mutation.

use alloc::string::String;
use alloc::vec::Vec;

use crate::graph::Graph;
use crate::id::NodeId;
use crate::value::ErasedValue;

/// Rendering of an absent cached value.
const NIL: &str = "<nil>";

/// One node as reported by a snapshot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeValue {
    /// The node's stable identity.
    pub id: NodeId,
    /// The node's diagnostic name.
    pub name: String,
    /// Whether a transitive producer may have changed since the last clean
    /// observation.
    pub potentially_dirty: bool,
    /// Textual rendering of the cached value, `"<nil>"` if absent.
    pub value: String,
    /// `true` for rule nodes, `false` for inputs.
    pub is_rule: bool,
    /// Whether the node is currently somewhere on the evaluation stack.
    pub is_current: bool,
}

/// One edge as reported by a snapshot.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct EdgeValue {
    /// The producer.
    pub from: NodeId,
    /// The consumer.
    pub to: NodeId,
    /// Whether the producer's value has changed since the consumer last
    /// read it.
    pub pending: bool,
}

/// Immutable structural view of a [`Graph`] at one moment.
///
/// `nodes` is in graph insertion order; `edges` is the flat concatenation
/// of each node's outgoing edges in insertion order, so both sequences are
/// deterministic for a given history.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct GraphValue {
    /// All nodes, in creation order.
    pub nodes: Vec<NodeValue>,
    /// All edges, grouped by producer in creation order.
    pub edges: Vec<EdgeValue>,
}

impl GraphValue {
    /// Looks up a node by id.
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&NodeValue> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Looks up a node by name.
    ///
    /// Names are diagnostic and not required to be unique; the first match
    /// in insertion order wins.
    #[must_use]
    pub fn node_named(&self, name: &str) -> Option<&NodeValue> {
        self.nodes.iter().find(|n| n.name == name)
    }

    /// Looks up the edge with the given endpoints.
    #[must_use]
    pub fn edge(&self, from: NodeId, to: NodeId) -> Option<&EdgeValue> {
        self.edges.iter().find(|e| e.from == from && e.to == to)
    }
}

impl Graph {
    /// Produces an immutable structural description of the graph.
    ///
    /// This is a pure read; in particular it reports rule caches as-is
    /// rather than bringing them up to date.
    #[must_use]
    pub fn snapshot(&self) -> GraphValue {
        let shared = self.shared();
        let state = shared.state.borrow();
        let mut nodes = Vec::with_capacity(state.nodes.len());
        let mut edges = Vec::new();
        for (index, node) in state.nodes.iter().enumerate() {
            let id = NodeId::new(index as u32);
            nodes.push(NodeValue {
                id,
                name: node.name.clone(),
                potentially_dirty: node.potentially_dirty,
                value: node
                    .value
                    .as_ref()
                    .map_or_else(|| String::from(NIL), ErasedValue::render),
                is_rule: node.is_rule(),
                is_current: state.stack.contains(&id),
            });
            for edge in &node.outgoing {
                edges.push(EdgeValue {
                    from: id,
                    to: edge.to,
                    pending: edge.pending,
                });
            }
        }
        GraphValue { nodes, edges }
    }
}
