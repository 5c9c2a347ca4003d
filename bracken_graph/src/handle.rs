// Copyright 2026 the Bracken Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Typed node handles.
//!
//! The graph stores nodes type-erased; these handles carry the value type
//! as a phantom parameter so reads and writes are checked at compile time.
//! Handles hold a weak back-reference to the graph, which keeps rule
//! closures (which capture handle clones) from forming strong reference
//! cycles with the graph that owns them.

use alloc::rc::Weak;
use core::fmt;
use core::marker::PhantomData;

use crate::graph::{Graph, GraphShared};
use crate::id::NodeId;
use crate::value::ErasedValue;

/// Typed handle to an input node.
///
/// An input holds a directly-assigned value and never has a rule. Writing
/// through [`set`](Self::set) raises the `pending` flag on every outgoing
/// edge and marks everything downstream potentially dirty; no rule runs
/// until something is read.
///
/// Handles are only valid while the [`Graph`] that issued them is alive;
/// using one after the graph is dropped aborts.
pub struct Input<T> {
    pub(crate) shared: Weak<GraphShared>,
    pub(crate) id: NodeId,
    pub(crate) _marker: PhantomData<fn() -> T>,
}

/// Typed handle to a rule node.
///
/// A rule node's value is computed by its closure; dependencies on the
/// nodes the closure reads are captured automatically while it runs.
pub struct Rule<T> {
    pub(crate) shared: Weak<GraphShared>,
    pub(crate) id: NodeId,
    pub(crate) _marker: PhantomData<fn() -> T>,
}

impl<T: Clone + fmt::Debug + 'static> Input<T> {
    /// Returns this node's id.
    #[must_use]
    #[inline]
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Reads the current value.
    ///
    /// If a rule is evaluating, this registers (or refreshes) its
    /// dependency on this input.
    #[must_use]
    pub fn get(&self) -> T {
        let graph = self.graph();
        graph.recompute(self.id);
        read_typed(&graph, self.id)
    }

    /// Writes a new value.
    ///
    /// Flips invalidation flags only; recomputation is deferred to the
    /// next read of an affected node.
    pub fn set(&self, value: T) {
        self.graph().write_input(self.id, ErasedValue::new(value));
    }

    /// Updates the value using a function of the current value.
    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        let graph = self.graph();
        let next = {
            let current = read_typed::<T>(&graph, self.id);
            f(&current)
        };
        graph.write_input(self.id, ErasedValue::new(next));
    }

    fn graph(&self) -> Graph {
        upgrade(&self.shared)
    }
}

impl<T: Clone + fmt::Debug + 'static> Rule<T> {
    /// Returns this node's id.
    #[must_use]
    #[inline]
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Reads the rule's value, recomputing it if needed.
    ///
    /// The read first reconciles this node's producers, then re-runs the
    /// rule only if at least one incoming edge is pending or the node has
    /// never been evaluated. If another rule is currently evaluating, this
    /// also registers its dependency on this node.
    #[must_use]
    pub fn get(&self) -> T {
        let graph = upgrade(&self.shared);
        graph.recompute(self.id);
        read_typed(&graph, self.id)
    }
}

fn upgrade(shared: &Weak<GraphShared>) -> Graph {
    Graph::from_shared(
        shared
            .upgrade()
            .expect("graph was dropped while a node handle was still in use"),
    )
}

fn read_typed<T: Clone + 'static>(graph: &Graph, id: NodeId) -> T {
    graph.with_value(id, |value| {
        value
            .downcast_ref::<T>()
            .expect("cached value has a different type than this handle")
            .clone()
    })
}

// Manual trait implementations so `T` needs no bounds.

impl<T> Clone for Input<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
            id: self.id,
            _marker: PhantomData,
        }
    }
}

impl<T> Clone for Rule<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
            id: self.id,
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Input<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Input")
            .field("id", &self.id)
            .field("type", &core::any::type_name::<T>())
            .finish()
    }
}

impl<T> fmt::Debug for Rule<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("id", &self.id)
            .field("type", &core::any::type_name::<T>())
            .finish()
    }
}
