pub mod bridge;
pub mod llm;
pub mod registry;

pub use bridge::{
    select_provider, Content, GenerationContext, LiveProvider, ResponseProvider, StubProvider,
};
pub use llm::{ChatBackend, LLMProvider, Vendor};
pub use registry::ModelRegistry;
