#![forbid(unsafe_code)]

//! `roughcast` turns precisely drawn SVG diagrams into a hand-drawn sketch, in place.
//!
//! The pipeline runs over a [`Document`]:
//!
//! 1. [`acquire`](acquire::acquire) inlines `<img src="*.svg">` placeholders as live `<svg>` roots.
//! 2. [`Page::tick`] selects opted-in roots that have not been processed yet.
//! 3. Every visual primitive of a root is classified and replaced by a [`HandDrawn`] rendering.
//! 4. The root is marked processed, so later passes (and re-parsed output) leave it alone.
//!
//! Diagrams rendered late by an external library are picked up by [`Page::run`], which repeats
//! the pass on a fixed period until its [`StopHandle`] fires. [`Page::run_with`] also lets the
//! host touch the document between passes.

pub mod acquire;
pub mod classify;
pub mod config;
pub mod dom;
mod error;
pub mod guard;
pub mod page;
pub mod poll;
pub mod rough;
pub mod shape;
pub mod sketch;

pub use acquire::{AcquireReport, Fetcher, FsFetcher, MemoryFetcher};
pub use config::{SketchOptions, SourcePolicy};
pub use dom::{Document, Element, NodeId};
pub use error::{Error, Result};
pub use guard::{PROCESSED_ATTR, ProcessedSet, REPLACEMENT_ATTR, SurfaceState};
pub use page::{Activation, Page, PassReport, SketchedDocument, sketch_document};
pub use poll::{RetryOutcome, RetryPolicy, Scheduler, StopHandle, ThreadScheduler};
pub use rough::{HandDrawn, RoughStyle, RoughrRenderer, Sketch};
pub use shape::{PrimitiveKind, Shape};
pub use sketch::{Provenance, SurfaceReport};
