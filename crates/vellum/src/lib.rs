//! Vellum - a mutable document model for node-and-link diagrams.
//!
//! A [`Document`] holds positioned parts in ordered layers. Parts may be
//! groups, labelled nodes, ports, or links routed between ports. Every
//! mutation goes through the document and produces change records that
//! listeners, an external [`UndoManager`] and observing parts receive.
//!
//! On top of the scene graph the document provides:
//!
//! - nested transactions with rollback, and replay of recorded changes
//! - picking and per-viewer visibility caches
//! - cycle detection over the link graph ([`CycleChecker`])
//! - delayed routing with orthogonal overlap correction
//! - copying parts within a document or from another one
//! - optional unique part identifiers
//!
//! # Example
//!
//! ```
//! use vellum::{Document, part::Part};
//! use vellum_core::geometry::{Bounds, Point};
//!
//! let mut doc = Document::new();
//! let a = doc.create_part(Part::new(Bounds::new(0.0, 0.0, 20.0, 20.0)).as_port());
//! let b = doc.create_part(Part::new(Bounds::new(100.0, 0.0, 20.0, 20.0)).as_port());
//! doc.add(a)?;
//! doc.add(b)?;
//!
//! let link = doc.create_part(Part::new(Bounds::default()).as_link(false));
//! doc.add(link)?;
//! doc.connect(link, a, b)?;
//!
//! assert_eq!(doc.pick_object(Point::new(5.0, 17.0), true), Some(a));
//! # Ok::<(), vellum::DocumentError>(())
//! ```

pub mod config;
pub mod layer;
pub mod part;

mod copy;
mod cycle;
mod document;
mod error;
mod grid;
mod group;
mod identity;
mod layers;
mod link;
mod query;
mod routing;
mod store;
mod transaction;

pub use vellum_core::{capability, change, geometry, identifier, key, policy};

pub use copy::{CopyMap, CopyOptions};
pub use cycle::CycleChecker;
pub use document::{ChangeListener, Document, ListenerId};
pub use error::{DocumentError, Result};
pub use grid::PositionGrid;
pub use layer::Layer;
pub use link::route_points;
pub use transaction::{CustomChangeHandler, Direction, UndoManager};
