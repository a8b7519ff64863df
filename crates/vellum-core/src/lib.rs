//! Vellum Core Types
//!
//! This crate provides the value types shared by the Vellum document model
//! and its collaborators (viewers, undo managers). It includes:
//!
//! - **Geometry**: points, sizes and bounds in document space ([`geometry`])
//! - **Capabilities**: the flag set gating select/move/copy/... ([`capability`])
//! - **Keys**: stable handles for parts, layers and viewers ([`key`])
//! - **Identifiers**: interned layer names ([`identifier`])
//! - **Policies**: persisted document-wide policies ([`policy`])
//! - **Changes**: the change-record vocabulary ([`change`])

pub mod capability;
pub mod change;
pub mod geometry;
pub mod identifier;
pub mod key;
pub mod policy;
