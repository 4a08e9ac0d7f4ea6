//! RPG encoding pipeline: file discovery, semantic lifting, structural
//! reorganization, artifact grounding, plus diff-driven evolution.
//!
//! Implements the three-phase encode (discovery → Phase 1 → Phase 2 →
//! Phase 3) and the incremental evolution engine that updates an existing
//! graph from a commit range instead of re-encoding from scratch.

pub mod discovery;
pub mod evolution;
pub mod grounding;
pub mod hierarchy;
pub mod llm;
pub mod pipeline;
pub mod semantic;

pub use evolution::{detect_changes, EvolutionEngine, EvolutionOptions, EvolutionResult, FileChange};
pub use llm::{EmbeddingProvider, LlmCompletion, LlmError, NullEmbedder, NullLlm};
pub use pipeline::{EncodeResult, EncoderPipeline};
