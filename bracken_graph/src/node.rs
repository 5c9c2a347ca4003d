// Copyright 2026 the Bracken Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Arena node slots and edge representation.
//!
//! Ownership is arranged so that no reference cycles exist: the graph owns
//! an arena of [`NodeSlot`]s; a producer owns its outgoing edges as small
//! value structs; a consumer's incoming list holds `(producer, slot)`
//! indices into the producer's outgoing array.

use alloc::rc::Rc;
use alloc::string::String;
use smallvec::SmallVec;

use crate::id::NodeId;
use crate::value::ErasedValue;

/// A dependency edge as stored on the producer side.
///
/// `pending` means "this producer's value has changed since `to` last read
/// it"; it is raised by input writes and by non-initial rule re-evaluations,
/// and cleared when the consumer's rule actually reads the producer again.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct OutgoingEdge {
    pub(crate) to: NodeId,
    pub(crate) pending: bool,
}

/// Back-reference to an outgoing edge, as stored on the consumer side.
///
/// `slot` indexes into `from`'s outgoing list; the entry there must name
/// this consumer (the mirroring invariant).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct IncomingEdge {
    pub(crate) from: NodeId,
    pub(crate) slot: u32,
}

/// One arena slot: a single graph cell.
///
/// Input nodes have no rule, a pre-filled value, and an always-empty
/// incoming list. Rule nodes start with an empty value slot that is filled
/// on first evaluation and stays filled thereafter.
pub(crate) struct NodeSlot {
    pub(crate) name: String,
    pub(crate) rule: Option<Rc<dyn Fn() -> ErasedValue>>,
    pub(crate) value: Option<ErasedValue>,
    pub(crate) potentially_dirty: bool,
    pub(crate) outgoing: SmallVec<[OutgoingEdge; 4]>,
    pub(crate) incoming: SmallVec<[IncomingEdge; 4]>,
}

impl NodeSlot {
    pub(crate) fn input(name: String, value: ErasedValue) -> Self {
        Self {
            name,
            rule: None,
            value: Some(value),
            potentially_dirty: false,
            outgoing: SmallVec::new(),
            incoming: SmallVec::new(),
        }
    }

    pub(crate) fn rule(name: String, rule: Rc<dyn Fn() -> ErasedValue>) -> Self {
        Self {
            name,
            rule: Some(rule),
            value: None,
            potentially_dirty: false,
            outgoing: SmallVec::new(),
            incoming: SmallVec::new(),
        }
    }

    #[inline]
    pub(crate) fn is_rule(&self) -> bool {
        self.rule.is_some()
    }
}
