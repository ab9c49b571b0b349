pub mod google;
pub mod hybrid;
pub mod perplexity;
pub mod registry;
pub mod research;
pub mod router;
pub mod synthesis;
pub mod traits;
pub(crate) mod sse;
pub(crate) mod util;

// Re-exports for convenience.
pub use hybrid::{HybridFlags, HybridLabel, HybridResponses};
pub use registry::ProviderRegistry;
pub use router::{LlmRouter, RoutingTable};
pub use synthesis::Synthesizer;
pub use traits::{dispatch, ProviderClient, RequestOptions};
pub use util::resolve_api_key;
