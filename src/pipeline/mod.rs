//! Staged, barrier-joined execution of a sprite run.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use cssprite::pipeline::{Inline, Pipeline};
//!
//! let summary = Pipeline::new(options, sources)
//!     .with_spawner(Arc::new(Inline))
//!     .on_complete(|summary| println!("{} sheets", summary.sheets.len()))
//!     .run()?;
//! ```

mod barrier;
mod coordinator;
mod destination;
mod spawn;

pub use barrier::StageBarrier;
pub use coordinator::{CompletionHook, Pipeline, RunSummary};
pub use destination::Destination;
pub use spawn::{Inline, Job, RayonSpawner, Spawner};
