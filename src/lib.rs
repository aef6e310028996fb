pub mod clients;
pub mod config;
pub mod error;
pub mod http;
pub mod invoker;
pub mod prompts;
pub mod refine;
pub mod roadmap;
pub mod router;
pub mod sanitize;
pub mod vagueness;

pub use error::{Result, RoadmapError};
pub use refine::{GoalRequest, RefinementOutcome};
pub use roadmap::{PipelineResult, RoadmapItem, RoadmapMeta, RoadmapRequest};
pub use router::{RawRequest, Reply, RoadmapService};
