// Copyright 2026 the Bracken Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Bracken Graph: an incremental attribute graph.
//!
//! This crate implements a one-way constraint engine. Clients declare
//! *input* nodes whose values are assigned directly and *rule* nodes whose
//! values are computed by a zero-argument closure that reads other nodes.
//! The engine:
//!
//! - **Captures dependencies automatically** ([`Graph`] keeps an evaluation
//!   stack; a node read while a rule is evaluating records an edge from the
//!   node to that rule).
//! - **Invalidates on two levels**: writing an input flips a `pending` flag
//!   on its direct outgoing edges and a `potentially_dirty` flag on every
//!   transitively reachable node. Flag flipping is all a write does; no rule
//!   runs until something is read.
//! - **Recomputes lazily, pull-based**: reading a node reconciles its
//!   producers first and re-runs its rule only when at least one incoming
//!   edge is pending (or the node has never been evaluated).
//!
//! Mutations are bracketed in *transactions*: scoped regions whose exit
//! invokes an observer callback with a short label and the graph, which is
//! how embedders trace what happened (see [`TraceRecorder`]).
//!
//! ## Quick Start
//!
//! ```rust
//! use bracken_graph::Graph;
//!
//! let graph = Graph::new();
//! let x = graph.input("x", 2_i64);
//! let y = graph.input("y", 3_i64);
//!
//! let sum = graph.rule("sum", {
//!     let (x, y) = (x.clone(), y.clone());
//!     move || x.get() + y.get()
//! });
//!
//! assert_eq!(sum.get(), 5);
//!
//! // Writes only flip flags; the rule re-runs on the next read.
//! x.set(10);
//! assert_eq!(sum.get(), 13);
//! ```
//!
//! ## Inspecting the graph
//!
//! [`Graph::snapshot`] produces an immutable [`GraphValue`] describing every
//! node (identity, name, dirty flag, rendered cached value, kind, whether it
//! is mid-evaluation) and every edge (endpoints and pending flag). Snapshots
//! never trigger recomputation, so they are safe to take from inside an
//! observer callback.
//!
//! ## Concurrency model
//!
//! Single-threaded and re-entrant. Recomputation is recursive through the
//! evaluation stack, and the graph types are deliberately `!Send`/`!Sync`.
//! Rules must be acyclic; cycles are a usage bug and are not detected, and
//! a cyclic rule set aborts (by assertion or exhausted stack) rather than
//! producing a value.
//!
//! ## `no_std` Support
//!
//! This crate is `no_std` and uses `alloc`. It does not depend on `std`.

#![no_std]

extern crate alloc;

mod graph;
mod handle;
mod id;
mod node;
mod snapshot;
mod trace;
mod value;

pub use graph::{Graph, RuleWriteError};
pub use handle::{Input, Rule};
pub use id::NodeId;
pub use snapshot::{EdgeValue, GraphValue, NodeValue};
pub use trace::{TraceEntry, TraceRecorder};
pub use value::ErasedValue;
