pub mod dispatcher;
pub mod metrics;
pub mod providers;

pub use dispatcher::{DispatchError, DispatchSuccess, FallbackDispatcher, SuccessPolicy};
pub use providers::gemini::GeminiClient;
