// src/core/call_graph/mod.rs
//! Change-impact analysis for Android applications
//!
//! Starting from each changed method, this module walks inbound call edges,
//! overridden declarations and framework-managed calling points until it reaches
//! the GUI events, lifecycle methods or dead ends that can trigger the change.

mod call_graph;
mod program_model;
mod gui_model;
mod framework_edges;
mod reachability;
mod top_caller_resolver;
mod result_aggregator;
mod impact_engine;

#[cfg(test)]
mod test_support;

pub use call_graph::{CallGraph, CallEdge, ClassRecord, MethodRecord, ProgramSnapshot, CallGraphStats};
pub use program_model::{
    AnalysisScope, ArgKind, ClassInfo, ClassOrigin, ClassRole, MethodInfo, ProgramModel,
    Receiver, Statement
};
pub use gui_model::{EventBinding, EventHandlerIndex, GuiModel, GuiSnapshot, GuiWindow, WindowKind};
pub use framework_edges::{
    AsyncExecuteRule, AttachSite, BroadcastReceiverRule, EdgeRule, FragmentLifecycleRule,
    FrameworkEdgeSynthesizer, FrameworkTables, ServiceReflectionRule, SynthesisRule,
    SynthesisStats, SyntheticCaller
};
pub use reachability::{ReachabilityOracle, virtual_siblings};
pub use top_caller_resolver::{
    MemoCache, MemoEntry, MemoState, ResolverContext, ResolverOptions, ResolverStats,
    TopCallerResolver, TriggerLabel
};
pub use result_aggregator::{HandledEvent, ImpactReport, ReportCounts, ResultAggregator};
pub use impact_engine::{ImpactEngine, ImpactAnalysisResult, AnalysisStatistics};
