// src/core/mod.rs
mod engine;
mod change_set;
mod signature;

// Top-caller analysis over the program snapshot
mod call_graph;

pub use signature::{
    class_literal_name, compose_signature, translate_low_level_signature, MethodSignature,
    CONSTRUCTOR_NAME
};
pub use change_set::{ChangeSet, TranslatedChanges};

pub use call_graph::{
    CallGraph, CallEdge, ClassRecord, MethodRecord, ProgramSnapshot, CallGraphStats,
    AnalysisScope, ArgKind, ClassInfo, ClassOrigin, ClassRole, MethodInfo, ProgramModel,
    Receiver, Statement,
    EventBinding, EventHandlerIndex, GuiModel, GuiSnapshot, GuiWindow, WindowKind,
    AsyncExecuteRule, AttachSite, BroadcastReceiverRule, EdgeRule, FragmentLifecycleRule,
    FrameworkEdgeSynthesizer, FrameworkTables, ServiceReflectionRule, SynthesisRule,
    SynthesisStats, SyntheticCaller,
    ReachabilityOracle, virtual_siblings,
    MemoCache, MemoEntry, MemoState, ResolverContext, ResolverOptions, ResolverStats,
    TopCallerResolver, TriggerLabel,
    HandledEvent, ImpactReport, ReportCounts, ResultAggregator,
    ImpactEngine, ImpactAnalysisResult, AnalysisStatistics
};

// Export the main engine
pub use engine::{AnalyzeRequest, Engine};
