// Copyright 2026 the Bracken Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! DOT export backend for bracken graph snapshots.
//!
//! This crate renders a [`GraphValue`] to a Graphviz-style directed-graph
//! description. It is intended for debugging/inspection, not for driving a
//! layout engine:
//!
//! - Nodes render as `n<index> [label="<name> (<value>)", …]` with
//!   `style=dashed` for potentially-dirty nodes, `shape=rect` for rule
//!   nodes, and `color=red` for nodes currently mid-evaluation.
//! - Edges render as `n<from> -> n<to> [style=…]` with `style=dashed` for
//!   pending edges.
//! - Identifiers are alphanumeric; quotation marks and backslashes inside
//!   labels are escaped.
//!
//! Paired with [`TraceRecorder`](bracken_graph::TraceRecorder), this
//! produces one renderable frame per transaction, which is the cheapest way
//! to watch invalidation and recomputation move through a graph.
//!
//! ```rust
//! use bracken_graph::Graph;
//!
//! let graph = Graph::new();
//! let x = graph.input("x", 2_i64);
//! let doubled = graph.rule("doubled", {
//!     let x = x.clone();
//!     move || x.get() * 2
//! });
//! assert_eq!(doubled.get(), 4);
//!
//! let dot = bracken_dot::render(&graph.snapshot());
//! assert!(dot.contains("n0 [label=\"x (2)\", style=solid]"));
//! assert!(dot.contains("n0 -> n1 [style=solid]"));
//! ```

#![no_std]

extern crate alloc;

use alloc::string::String;
use core::fmt::Write as _;

use bracken_graph::{EdgeValue, GraphValue, NodeValue};

/// Renders a snapshot as a DOT `digraph` document.
#[must_use]
pub fn render(snapshot: &GraphValue) -> String {
    let mut out = String::new();
    out.push_str("digraph {\n");
    for node in &snapshot.nodes {
        out.push_str("    ");
        write_node(&mut out, node);
        out.push('\n');
    }
    for edge in &snapshot.edges {
        out.push_str("    ");
        write_edge(&mut out, edge);
        out.push('\n');
    }
    out.push_str("}\n");
    out
}

fn write_node(out: &mut String, node: &NodeValue) {
    let style = if node.potentially_dirty {
        "dashed"
    } else {
        "solid"
    };
    let _ = write!(
        out,
        "n{} [label=\"{} ({})\", style={style}",
        node.id.index(),
        escape(&node.name),
        escape(&node.value),
    );
    if node.is_rule {
        out.push_str(", shape=rect");
    }
    if node.is_current {
        out.push_str(", color=red");
    }
    out.push(']');
}

fn write_edge(out: &mut String, edge: &EdgeValue) {
    let style = if edge.pending { "dashed" } else { "solid" };
    let _ = write!(
        out,
        "n{} -> n{} [style={style}]",
        edge.from.index(),
        edge.to.index(),
    );
}

/// Escapes a string for embedding in a double-quoted DOT label.
fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out
}
