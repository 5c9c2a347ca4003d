// Copyright 2026 the Bracken Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Explainability helpers for transaction traces.
//!
//! The core does not retain any history of what happened to the graph; the
//! observer callback is the only signal. For many embedders it is useful to
//! answer questions like “which steps did that read take?”.
//!
//! This module provides a small recorder, [`TraceRecorder`], which installs
//! an observer that stores one `(label, snapshot)` entry per transaction.
//! Pairing it with a renderer such as `bracken_dot` yields a per-step
//! visual trace of propagation and recomputation.

use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::RefCell;

use crate::graph::Graph;
use crate::snapshot::GraphValue;

/// One recorded transaction: its label and the graph state at exit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TraceEntry {
    /// The transaction's label, e.g. `"sum rec: push"`.
    pub note: String,
    /// Snapshot taken when the transaction's notification fired.
    pub snapshot: GraphValue,
}

/// Records every transaction notification of a [`Graph`].
///
/// Installing a recorder replaces any previously installed observer.
///
/// # Example
///
/// ```rust
/// use bracken_graph::{Graph, TraceRecorder};
///
/// let graph = Graph::new();
/// let recorder = TraceRecorder::install(&graph);
///
/// let x = graph.input("x", 1_i64);
/// let notes = recorder.notes();
/// assert_eq!(notes, ["x input"]);
/// # let _ = x;
/// ```
#[derive(Clone)]
pub struct TraceRecorder {
    entries: Rc<RefCell<Vec<TraceEntry>>>,
}

impl TraceRecorder {
    /// Installs a fresh recorder as `graph`'s observer.
    #[must_use]
    pub fn install(graph: &Graph) -> Self {
        let entries: Rc<RefCell<Vec<TraceEntry>>> = Rc::new(RefCell::new(Vec::new()));
        graph.set_observer({
            let entries = Rc::clone(&entries);
            move |note: &str, graph: &Graph| {
                entries.borrow_mut().push(TraceEntry {
                    note: String::from(note),
                    snapshot: graph.snapshot(),
                });
            }
        });
        Self { entries }
    }

    /// Returns the number of recorded entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Returns `true` if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Returns the recorded labels, in notification order.
    #[must_use]
    pub fn notes(&self) -> Vec<String> {
        self.entries.borrow().iter().map(|e| e.note.clone()).collect()
    }

    /// Returns a copy of the recorded entries, in notification order.
    #[must_use]
    pub fn entries(&self) -> Vec<TraceEntry> {
        self.entries.borrow().clone()
    }

    /// Takes the recorded entries, leaving the recorder empty.
    pub fn take(&self) -> Vec<TraceEntry> {
        core::mem::take(&mut *self.entries.borrow_mut())
    }

    /// Clears the recorded entries.
    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }
}
