// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests Module
//!
//! Uses proptest to check properties of topic naming, envelope keys and the
//! in-memory partitioner that must hold for all inputs.

mod topic_naming;
