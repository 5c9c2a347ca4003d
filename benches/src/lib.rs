// Copyright 2026 the Bracken Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shared helpers for the bracken benchmarks.
//!
//! The interesting code lives in `benches/`.
