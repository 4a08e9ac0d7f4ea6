//! The interactive construction protocol: a step-wise alternative to the
//! fully autonomous encoder pipeline, for agents that
//! supply semantic features and hierarchy decisions themselves instead of
//! delegating Phase 1/Phase 2 to an LLM provider.
//!
//! [`InteractiveSession`] holds all per-session state; nothing here reaches
//! into a [`rpg_core::store::GraphStore`] except through its own operations,
//! so the same session object can drive an MCP tool surface one call at a
//! time.

pub mod session;

pub use session::{
    BuildIndexResult, EntityBatchView, FileFeatureView, FinalizeResult, HierarchyContextView,
    HierarchyResult, InteractiveSession, LiftableEntity, PendingRouting, RenderedEntity,
    RoutingBatchView, RoutingResult, SubmitFeaturesResult, SynthesisBatchView, SynthesisResult,
};
