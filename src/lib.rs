//! Estimates how many readers a news outlet reaches.
//!
//! Outlets are discovered on encyclopedia list pages, given a raw circulation or
//! audience figure, normalized against their country's internet population and
//! finally matched to the publisher names two news search engines use. Every
//! stage is snapshotted so an interrupted run can resume.

pub mod config;
pub mod context;
pub mod countries;
pub mod error;
pub mod extract;
pub mod outlet;
pub mod persistence;
pub mod pipeline;
pub mod progress;
pub mod queue;
pub mod runner;
pub mod source;
pub mod stages;

pub use config::PipelineConfig;
pub use context::PipelineContext;
pub use error::{FetchError, TaskError};
pub use outlet::{NewsOutlet, OutletKind};
pub use persistence::ReachTable;
pub use source::{DocumentSource, Engine, NewsSearch, SearchHit};
