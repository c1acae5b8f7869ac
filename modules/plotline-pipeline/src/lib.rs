pub mod assemble;
pub mod enrich;
pub mod jobs;
pub mod manifest;
pub mod narrative;
pub mod pipeline;
pub mod simulate;
pub mod traits;
pub mod upload;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use enrich::{Enricher, EnrichmentFailure, EnrichmentReport, EnrichmentSettings};
pub use jobs::{JobRunner, PollPolicy};
pub use narrative::{GenderSplit, Narrative, Persona, PersonaColor};
pub use pipeline::{default_query, Pipeline, RunSettings, RunSummary};
pub use traits::{AnalyticsApi, DatasetStore};
