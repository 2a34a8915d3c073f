//! Backend module - remote generation contract, Gemini client and variant registry

pub mod gemini;
pub mod registry;
pub mod traits;

pub use gemini::GeminiGenerator;
pub use registry::GeneratorRegistry;
pub use traits::{
    GenerationCall, GenerationResponse, GeneratorStatus, ImageConfig, ImageGenerator, InlineData,
    Part, ResponseOutcome,
};
