// Copyright 2026 the Bracken Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The graph: node arena, evaluation stack, transactions, and the
//! pull-based recompute procedure.

use alloc::boxed::Box;
use alloc::format;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::fmt;
use core::marker::PhantomData;

use hashbrown::HashSet;

use crate::handle::{Input, Rule};
use crate::id::NodeId;
use crate::node::{IncomingEdge, NodeSlot, OutgoingEdge};
use crate::value::ErasedValue;

/// Error returned when a type-erased write targets a rule node.
///
/// Rule nodes derive their value from their rule; assigning one directly is
/// a usage error and leaves the graph unmodified.
#[derive(Clone, PartialEq, Eq)]
pub struct RuleWriteError {
    /// The rule node the write targeted.
    pub id: NodeId,
    /// The node's diagnostic name.
    pub name: String,
}

impl fmt::Debug for RuleWriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RuleWriteError {{ id: {:?}, name: {:?} }}",
            self.id, self.name
        )
    }
}

impl fmt::Display for RuleWriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cannot write to rule node {:?} ({}); only input nodes accept values",
            self.name, self.id
        )
    }
}

impl core::error::Error for RuleWriteError {}

type ObserverFn = Box<dyn FnMut(&str, &Graph)>;

pub(crate) struct GraphState {
    pub(crate) nodes: Vec<NodeSlot>,
    /// LIFO of nodes currently mid-evaluation. The top is the reader whose
    /// dependencies are being captured.
    pub(crate) stack: Vec<NodeId>,
}

pub(crate) struct GraphShared {
    pub(crate) state: RefCell<GraphState>,
    observer: RefCell<Option<ObserverFn>>,
}

/// An incremental attribute graph.
///
/// The graph owns all nodes and the evaluation stack. Cloning a `Graph` is
/// cheap and yields another handle to the same shared graph, in the same
/// way that cloning an [`Input`] or [`Rule`] handle does.
///
/// All mutation happens inside [transactions](Self::transaction); every
/// transaction exit invokes the installed observer (if any) with a short
/// label and the graph, which is the sole mechanism by which embedders are
/// told the graph may have changed.
///
/// See the [crate docs](crate) for an overview and an example.
pub struct Graph {
    shared: Rc<GraphShared>,
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for Graph {
    fn clone(&self) -> Self {
        Self {
            shared: Rc::clone(&self.shared),
        }
    }
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.borrow();
        f.debug_struct("Graph")
            .field("nodes", &state.nodes.len())
            .field("stack_depth", &state.stack.len())
            .finish()
    }
}

impl Graph {
    /// Creates a new empty graph with no observer installed.
    #[must_use]
    pub fn new() -> Self {
        Self {
            shared: Rc::new(GraphShared {
                state: RefCell::new(GraphState {
                    nodes: Vec::new(),
                    stack: Vec::new(),
                }),
                observer: RefCell::new(None),
            }),
        }
    }

    pub(crate) fn from_shared(shared: Rc<GraphShared>) -> Self {
        Self { shared }
    }

    /// Installs the observer invoked after every transaction.
    ///
    /// The callback receives the transaction's label and the graph; taking a
    /// [snapshot](Self::snapshot) from inside it is the intended use. While
    /// the callback runs it is removed from its slot, so notifications it
    /// causes itself (by mutating the graph) are dropped rather than
    /// recursing; an observer installed from inside the callback replaces
    /// the running one.
    pub fn set_observer(&self, observer: impl FnMut(&str, &Graph) + 'static) {
        *self.shared.observer.borrow_mut() = Some(Box::new(observer));
    }

    /// Removes the installed observer, if any.
    pub fn clear_observer(&self) {
        *self.shared.observer.borrow_mut() = None;
    }

    /// Returns the number of nodes in the graph.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.state.borrow().nodes.len()
    }

    /// Returns `true` if the graph has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shared.state.borrow().nodes.is_empty()
    }

    /// Returns the diagnostic name of `id`.
    #[must_use]
    pub fn name(&self, id: NodeId) -> String {
        self.shared.state.borrow().nodes[id.idx()].name.clone()
    }

    // -------------------------------------------------------------------------
    // Construction
    // -------------------------------------------------------------------------

    /// Creates an input node pre-populated with `value`.
    ///
    /// Emits one `"<name> input"` notification.
    pub fn input<T>(&self, name: impl Into<String>, value: T) -> Input<T>
    where
        T: Clone + fmt::Debug + 'static,
    {
        let name = name.into();
        let id = self.transaction(&format!("{name} input"), || {
            let mut state = self.shared.state.borrow_mut();
            let id = NodeId::new(u32::try_from(state.nodes.len()).expect("node arena overflow"));
            state.nodes.push(NodeSlot::input(name.clone(), ErasedValue::new(value)));
            id
        });
        Input {
            shared: Rc::downgrade(&self.shared),
            id,
            _marker: PhantomData,
        }
    }

    /// Creates a rule node bound to the zero-argument closure `f`.
    ///
    /// The cached value is initially absent and no dependencies are known;
    /// both materialize on the first read. Emits one `"<name> rule"`
    /// notification.
    pub fn rule<T, F>(&self, name: impl Into<String>, f: F) -> Rule<T>
    where
        T: Clone + fmt::Debug + 'static,
        F: Fn() -> T + 'static,
    {
        let name = name.into();
        let rule: Rc<dyn Fn() -> ErasedValue> = Rc::new(move || ErasedValue::new(f()));
        let id = self.transaction(&format!("{name} rule"), || {
            let mut state = self.shared.state.borrow_mut();
            let id = NodeId::new(u32::try_from(state.nodes.len()).expect("node arena overflow"));
            state.nodes.push(NodeSlot::rule(name.clone(), rule));
            id
        });
        Rule {
            shared: Rc::downgrade(&self.shared),
            id,
            _marker: PhantomData,
        }
    }

    // -------------------------------------------------------------------------
    // Transactions
    // -------------------------------------------------------------------------

    /// Runs `f` inside a transaction labelled `note`.
    ///
    /// On every exit path, normal return or unwind, the observer is invoked
    /// with `note` and the graph. Transactions nest; each nesting level
    /// notifies on its own exit.
    pub fn transaction<R>(&self, note: &str, f: impl FnOnce() -> R) -> R {
        let _guard = TransactionGuard { graph: self, note };
        f()
    }

    fn notify(&self, note: &str) {
        let taken = self.shared.observer.borrow_mut().take();
        if let Some(mut observer) = taken {
            observer(note, self);
            let mut slot = self.shared.observer.borrow_mut();
            if slot.is_none() {
                *slot = Some(observer);
            }
        }
    }

    // -------------------------------------------------------------------------
    // Writes and invalidation
    // -------------------------------------------------------------------------

    /// Writes a type-erased value to the input node `id`.
    ///
    /// On success the value is stored and, for every outgoing edge, the
    /// edge's `pending` flag and the consumer's `potentially_dirty` flag are
    /// raised (the latter propagating transitively). No rule runs until the
    /// next read.
    ///
    /// # Errors
    ///
    /// Returns [`RuleWriteError`], without modifying the graph, if `id`
    /// names a rule node.
    pub fn set_value(&self, id: NodeId, value: ErasedValue) -> Result<(), RuleWriteError> {
        {
            let state = self.shared.state.borrow();
            let node = &state.nodes[id.idx()];
            if node.is_rule() {
                return Err(RuleWriteError {
                    id,
                    name: node.name.clone(),
                });
            }
        }
        self.write_input(id, value);
        Ok(())
    }

    /// Stores `value` into an input slot and fans out the invalidation.
    ///
    /// The caller must have checked that `id` is an input node.
    pub(crate) fn write_input(&self, id: NodeId, value: ErasedValue) {
        let name = self.name(id);
        self.transaction(&format!("{name} wrappedValue: set"), || {
            self.shared.state.borrow_mut().nodes[id.idx()].value = Some(value);
            let degree = self.shared.state.borrow().nodes[id.idx()].outgoing.len();
            for slot in 0..degree {
                let to = {
                    let mut state = self.shared.state.borrow_mut();
                    let edge = &mut state.nodes[id.idx()].outgoing[slot];
                    edge.pending = true;
                    edge.to
                };
                self.set_potentially_dirty(to, true);
            }
        });
    }

    /// Sets the `potentially_dirty` flag of `id`.
    ///
    /// The setter is idempotent: if the flag already has the requested value
    /// nothing happens. Raising the flag happens inside a
    /// `"<name> set dirty"` transaction and propagates to every node
    /// reachable over outgoing edges, short-circuiting at nodes that are
    /// already dirty, so the walk terminates on any graph. Clearing the flag
    /// is silent; the recompute path does it once a node has reconciled its
    /// producers.
    pub fn set_potentially_dirty(&self, id: NodeId, dirty: bool) {
        let current = self.shared.state.borrow().nodes[id.idx()].potentially_dirty;
        if current == dirty {
            return;
        }
        if !dirty {
            self.shared.state.borrow_mut().nodes[id.idx()].potentially_dirty = false;
            return;
        }
        let mut work: Vec<NodeId> = Vec::new();
        work.push(id);
        while let Some(next) = work.pop() {
            let name = {
                let state = self.shared.state.borrow();
                let node = &state.nodes[next.idx()];
                if node.potentially_dirty {
                    continue;
                }
                node.name.clone()
            };
            self.transaction(&format!("{name} set dirty"), || {
                self.shared.state.borrow_mut().nodes[next.idx()].potentially_dirty = true;
            });
            let state = self.shared.state.borrow();
            work.extend(state.nodes[next.idx()].outgoing.iter().map(|e| e.to));
        }
    }

    // -------------------------------------------------------------------------
    // Pull-based recompute
    // -------------------------------------------------------------------------

    /// Brings `id` up to date, capturing a dependency on it if a rule is
    /// currently evaluating.
    ///
    /// This is the type-erased recompute entry point; typed reads
    /// ([`Input::get`], [`Rule::get`]) call it before returning the cached
    /// value. The procedure:
    ///
    /// 1. If the evaluation stack is non-empty, ensure an edge from `id` to
    ///    the stack top exists; an edge traversed again this cycle has its
    ///    `pending` flag cleared.
    /// 2. Inputs, and rules that are cached and not potentially dirty,
    ///    return here.
    /// 3. Recursively bring every producer up to date, in the order the
    ///    rule first read them.
    /// 4. If no incoming edge is pending and the cache is populated, the
    ///    node is clean: clear `potentially_dirty` and return.
    /// 5. Otherwise evaluate the rule on the evaluation stack and cache the
    ///    result. Re-evaluations (not the initial one) mark every outgoing
    ///    edge pending, since consumers must re-check the new value.
    pub fn recompute(&self, id: NodeId) {
        // Step 1: dependency capture.
        let reader = self.shared.state.borrow().stack.last().copied();
        if let Some(consumer) = reader {
            self.capture_edge(id, consumer);
        }

        // Step 2: short-circuit for inputs and clean cached rules.
        {
            let state = self.shared.state.borrow();
            let node = &state.nodes[id.idx()];
            if !node.is_rule() || (node.value.is_some() && !node.potentially_dirty) {
                return;
            }
        }

        // Step 3: reconcile producers.
        let producers: Vec<NodeId> = {
            let state = self.shared.state.borrow();
            state.nodes[id.idx()].incoming.iter().map(|e| e.from).collect()
        };
        for producer in producers {
            self.recompute(producer);
        }

        // Step 4: decide.
        let (has_pending, initial, name) = {
            let state = self.shared.state.borrow();
            let node = &state.nodes[id.idx()];
            let has_pending = node.incoming.iter().any(|e| {
                state.nodes[e.from.idx()].outgoing[e.slot as usize].pending
            });
            (has_pending, node.value.is_none(), node.name.clone())
        };
        if !has_pending && !initial {
            self.transaction(&format!("{name} rec: no-pending"), || {
                self.shared.state.borrow_mut().nodes[id.idx()].potentially_dirty = false;
            });
            return;
        }

        // Step 5: evaluate.
        self.transaction(&format!("{name} rec: push"), || {
            let mut state = self.shared.state.borrow_mut();
            assert!(
                !state.stack.contains(&id),
                "node {id} is already mid-evaluation; rules must be acyclic"
            );
            state.stack.push(id);
        });
        let rule = {
            let state = self.shared.state.borrow();
            state.nodes[id.idx()]
                .rule
                .clone()
                .expect("recompute reached evaluation for an input node")
        };
        {
            // The pop must happen even if the rule unwinds; the cache then
            // stays empty and the node stays potentially dirty, so the next
            // read retries.
            let _pop = PopGuard {
                graph: self,
                id,
                name: name.clone(),
            };
            self.transaction(&format!("{name} rec: evaluate rule"), || {
                let value = (*rule)();
                let mut state = self.shared.state.borrow_mut();
                let node = &mut state.nodes[id.idx()];
                node.value = Some(value);
                node.potentially_dirty = false;
            });
        }
        if !initial {
            let mut state = self.shared.state.borrow_mut();
            for edge in state.nodes[id.idx()].outgoing.iter_mut() {
                edge.pending = true;
            }
        }
    }

    /// Ensures an edge `from -> to` exists, mirroring it on both endpoints.
    ///
    /// An edge that already exists is satisfied for this cycle: its
    /// `pending` flag is cleared. Re-reading the same producer within one
    /// rule therefore never duplicates edges.
    fn capture_edge(&self, from: NodeId, to: NodeId) {
        let (existing, from_name) = {
            let state = self.shared.state.borrow();
            let node = &state.nodes[from.idx()];
            (
                node.outgoing.iter().position(|e| e.to == to),
                node.name.clone(),
            )
        };
        match existing {
            Some(slot) => {
                self.transaction(&format!("{from_name} rec: resetting edge"), || {
                    self.shared.state.borrow_mut().nodes[from.idx()].outgoing[slot].pending =
                        false;
                });
            }
            None => {
                self.transaction(&format!("{from_name} rec: adding edge"), || {
                    let mut state = self.shared.state.borrow_mut();
                    let slot = u32::try_from(state.nodes[from.idx()].outgoing.len())
                        .expect("outgoing edge list overflow");
                    state.nodes[from.idx()].outgoing.push(OutgoingEdge {
                        to,
                        pending: false,
                    });
                    state.nodes[to.idx()].incoming.push(IncomingEdge { from, slot });
                });
            }
        }
    }

    /// Reads the cached value of `id` through `f`.
    ///
    /// The caller is responsible for having recomputed first.
    pub(crate) fn with_value<R>(&self, id: NodeId, f: impl FnOnce(&ErasedValue) -> R) -> R {
        let state = self.shared.state.borrow();
        let value = state.nodes[id.idx()]
            .value
            .as_ref()
            .expect("node has no cached value after recompute");
        f(value)
    }

    pub(crate) fn shared(&self) -> &Rc<GraphShared> {
        &self.shared
    }

    // -------------------------------------------------------------------------
    // Diagnostics
    // -------------------------------------------------------------------------

    /// Audits the graph's structural invariants, panicking on violation.
    ///
    /// Checks, for every node: edge mirroring (each outgoing edge has
    /// exactly one matching incoming back-reference and vice versa), at
    /// most one edge per ordered endpoint pair, input quiescence (inputs
    /// have no incoming edges and a populated value), and dirty closure
    /// (every successor of a potentially-dirty node is potentially dirty).
    ///
    /// A violation is a bug in the engine, not a user-recoverable
    /// condition; this is a test and debugging aid.
    pub fn validate(&self) {
        let state = self.shared.state.borrow();
        let mut pairs: HashSet<(u32, u32)> = HashSet::new();
        for (index, node) in state.nodes.iter().enumerate() {
            let from = NodeId::new(index as u32);
            for (slot, edge) in node.outgoing.iter().enumerate() {
                assert!(
                    pairs.insert((from.index(), edge.to.index())),
                    "duplicate edge {from} -> {}",
                    edge.to
                );
                let mirrored = state.nodes[edge.to.idx()]
                    .incoming
                    .iter()
                    .filter(|inc| inc.from == from && inc.slot as usize == slot)
                    .count();
                assert!(
                    mirrored == 1,
                    "edge {from} -> {} is mirrored {mirrored} times on the incoming side",
                    edge.to
                );
            }
            for inc in &node.incoming {
                let out = state.nodes[inc.from.idx()].outgoing.get(inc.slot as usize);
                assert!(
                    out.is_some_and(|e| e.to == from),
                    "incoming entry ({}, {}) of {from} does not mirror an outgoing edge",
                    inc.from,
                    inc.slot
                );
            }
            if !node.is_rule() {
                assert!(
                    node.incoming.is_empty(),
                    "input node {:?} has incoming edges",
                    node.name
                );
                assert!(
                    node.value.is_some(),
                    "input node {:?} has an empty value slot",
                    node.name
                );
            }
        }
        for node in &state.nodes {
            if node.potentially_dirty {
                for edge in &node.outgoing {
                    assert!(
                        state.nodes[edge.to.idx()].potentially_dirty,
                        "dirty closure violated: {:?} is dirty but successor {:?} is not",
                        node.name,
                        state.nodes[edge.to.idx()].name
                    );
                }
            }
        }
    }
}

struct TransactionGuard<'a> {
    graph: &'a Graph,
    note: &'a str,
}

impl Drop for TransactionGuard<'_> {
    fn drop(&mut self) {
        self.graph.notify(self.note);
    }
}

struct PopGuard<'a> {
    graph: &'a Graph,
    id: NodeId,
    name: String,
}

impl Drop for PopGuard<'_> {
    fn drop(&mut self) {
        self.graph
            .transaction(&format!("{} rec: pop", self.name), || {
                let mut state = self.graph.shared.state.borrow_mut();
                let top = state.stack.pop();
                assert!(
                    top == Some(self.id),
                    "evaluation stack corrupted: expected {} on top, found {top:?}",
                    self.id
                );
            });
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use alloc::rc::Rc;
    use alloc::string::ToString;
    use alloc::vec::Vec;
    use core::cell::RefCell;

    #[test]
    fn inputs_read_back_their_value() {
        let graph = Graph::new();
        let x = graph.input("x", 2_i64);
        assert_eq!(x.get(), 2);
        x.set(10);
        assert_eq!(x.get(), 10);
        graph.validate();
    }

    #[test]
    fn rule_evaluates_lazily_and_caches() {
        let graph = Graph::new();
        let runs = Rc::new(RefCell::new(0));
        let x = graph.input("x", 2_i64);
        let doubled = graph.rule("doubled", {
            let (x, runs) = (x.clone(), runs.clone());
            move || {
                *runs.borrow_mut() += 1;
                x.get() * 2
            }
        });

        // Not computed until read.
        assert_eq!(*runs.borrow(), 0);
        assert_eq!(doubled.get(), 4);
        assert_eq!(*runs.borrow(), 1);

        // Cached on re-read.
        assert_eq!(doubled.get(), 4);
        assert_eq!(*runs.borrow(), 1);

        // Recomputed after a write.
        x.set(5);
        assert_eq!(*runs.borrow(), 1);
        assert_eq!(doubled.get(), 10);
        assert_eq!(*runs.borrow(), 2);
        graph.validate();
    }

    #[test]
    fn set_value_rejects_rule_nodes() {
        let graph = Graph::new();
        let x = graph.input("x", 1_i64);
        let r = graph.rule("r", {
            let x = x.clone();
            move || x.get() + 1
        });
        assert_eq!(r.get(), 2);

        let err = graph
            .set_value(r.id(), ErasedValue::new(9_i64))
            .unwrap_err();
        assert_eq!(err.id, r.id());
        assert_eq!(err.name, "r");

        // The graph is unmodified: the cached value is still the rule's.
        assert_eq!(r.get(), 2);
        graph.validate();
    }

    #[test]
    fn set_value_accepts_input_nodes() {
        let graph = Graph::new();
        let x = graph.input("x", 1_i64);
        graph.set_value(x.id(), ErasedValue::new(7_i64)).unwrap();
        assert_eq!(x.get(), 7);
    }

    #[test]
    fn set_potentially_dirty_is_idempotent() {
        let graph = Graph::new();
        let x = graph.input("x", 1_i64);
        let r = graph.rule("r", {
            let x = x.clone();
            move || x.get()
        });
        assert_eq!(r.get(), 1);

        let notes = Rc::new(RefCell::new(Vec::new()));
        graph.set_observer({
            let notes = notes.clone();
            move |note: &str, _: &Graph| notes.borrow_mut().push(note.to_string())
        });

        graph.set_potentially_dirty(r.id(), true);
        graph.set_potentially_dirty(r.id(), true);
        assert_eq!(notes.borrow().as_slice(), ["r set dirty"]);

        // Clearing is silent.
        graph.set_potentially_dirty(r.id(), false);
        assert_eq!(notes.borrow().len(), 1);
    }

    #[test]
    fn manual_dirty_without_pending_keeps_cache() {
        let graph = Graph::new();
        let runs = Rc::new(RefCell::new(0));
        let x = graph.input("x", 1_i64);
        let r = graph.rule("r", {
            let (x, runs) = (x.clone(), runs.clone());
            move || {
                *runs.borrow_mut() += 1;
                x.get()
            }
        });
        assert_eq!(r.get(), 1);
        assert_eq!(*runs.borrow(), 1);

        // No pending incoming edge, so the read takes the no-pending path.
        graph.set_potentially_dirty(r.id(), true);
        let notes = Rc::new(RefCell::new(Vec::new()));
        graph.set_observer({
            let notes = notes.clone();
            move |note: &str, _: &Graph| notes.borrow_mut().push(note.to_string())
        });
        assert_eq!(r.get(), 1);
        assert_eq!(*runs.borrow(), 1);
        assert!(notes.borrow().iter().any(|n| n == "r rec: no-pending"));
        graph.validate();
    }

    #[test]
    fn transaction_notifies_on_unwind() {
        let graph = Graph::new();
        let notes = Rc::new(RefCell::new(Vec::new()));
        graph.set_observer({
            let notes = notes.clone();
            move |note: &str, _: &Graph| notes.borrow_mut().push(note.to_string())
        });

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            graph.transaction("doomed", || panic!("boom"));
        }));
        assert!(result.is_err());
        assert_eq!(notes.borrow().as_slice(), ["doomed"]);
    }

    #[test]
    fn failed_rule_pops_stack_and_retries() {
        let graph = Graph::new();
        let arm = Rc::new(RefCell::new(true));
        let x = graph.input("x", 1_i64);
        let r = graph.rule("r", {
            let (x, arm) = (x.clone(), arm.clone());
            move || {
                let v = x.get();
                if *arm.borrow() {
                    panic!("rule failure");
                }
                v + 1
            }
        });

        let failed = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| r.get()));
        assert!(failed.is_err());

        // The stack was popped on the way out and the cache is still empty,
        // so the next read re-runs the rule.
        *arm.borrow_mut() = false;
        assert_eq!(r.get(), 2);
        graph.validate();
    }

    #[test]
    fn observer_mutation_does_not_recurse() {
        let graph = Graph::new();
        let x = graph.input("x", 1_i64);
        let count = Rc::new(RefCell::new(0));
        graph.set_observer({
            let (graph, x, count) = (graph.clone(), x.clone(), count.clone());
            move |_: &str, _: &Graph| {
                *count.borrow_mut() += 1;
                // Writing from inside the observer must not re-enter it.
                if *count.borrow() == 1 {
                    graph.set_value(x.id(), ErasedValue::new(5_i64)).unwrap();
                }
            }
        });
        graph.transaction("tick", || {});
        assert_eq!(*count.borrow(), 1);
        assert_eq!(x.get(), 5);
    }
}
