// src/core/call_graph/impact_engine.rs
use std::path::{Path, PathBuf};
use serde::{Serialize, Deserialize};
use tracing::{info, debug};

use crate::error::Result;
use super::{
    AnalysisScope, CallGraph, EventHandlerIndex, FrameworkEdgeSynthesizer, ImpactReport,
    ResolverContext, ResolverOptions, ResolverStats, ResultAggregator, SynthesisStats,
    TopCallerResolver,
};

/// Main orchestrator for one change-impact analysis run
pub struct ImpactEngine {
    scope: AnalysisScope,
    execute_like: Vec<String>,
    resolver_options: ResolverOptions,
}

#[derive(Debug, Clone)]
pub struct ImpactAnalysisResult {
    /// The aggregated report
    pub report: ImpactReport,
    /// Performance statistics
    pub stats: AnalysisStatistics,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisStatistics {
    pub total_methods: usize,
    pub total_calls: usize,
    pub changed_methods: usize,
    pub resolved_methods: usize,
    pub not_found_methods: usize,
    pub handled_methods: usize,
    pub unreachable_methods: usize,
    pub synthesis: SynthesisStats,
    pub resolver: ResolverStats,
    pub analysis_time_ms: u128,
}

impl ImpactEngine {
    pub fn new(scope: AnalysisScope, execute_like: Vec<String>, resolver_options: ResolverOptions) -> Self {
        Self {
            scope,
            execute_like,
            resolver_options,
        }
    }

    /// Resolve every changed method and aggregate the results
    pub fn analyze(
        &self,
        program: &CallGraph,
        events: &dyn EventHandlerIndex,
        changed: &[String],
        input_digest: String,
    ) -> Result<ImpactAnalysisResult> {
        let start_time = std::time::Instant::now();
        info!("🔍 Starting change-impact analysis...");

        let graph_stats = program.get_statistics();
        info!("Program: {} methods in {} classes ({} application), {} call edges",
              graph_stats.total_methods, graph_stats.total_classes,
              graph_stats.application_classes, graph_stats.total_calls);

        // Step 1: Scan bodies for framework-managed calling points
        info!("🧩 Scanning application bodies for framework edges...");
        let synthesizer = FrameworkEdgeSynthesizer::build(program, &self.scope, &self.execute_like);
        debug!("Synthesis rules: {:?}", synthesizer.rule_names());

        // Step 2: Resolve top callers
        info!("🔗 Resolving top callers of {} changed methods...", changed.len());
        let resolver = TopCallerResolver::new(
            program,
            events,
            &self.scope,
            &synthesizer,
            self.resolver_options.clone(),
        );
        let mut ctx = ResolverContext::new();
        let mut resolved = 0;

        for (i, method) in changed.iter().enumerate() {
            debug!("Resolving {}/{}: {}", i + 1, changed.len(), method);
            if resolver.resolve(&mut ctx, method) {
                resolved += 1;
            }
        }
        info!("Resolved {} methods, {} not found", resolved, ctx.not_found().len());

        // Step 3: Aggregate
        info!("📦 Aggregating top callers...");
        let report = ResultAggregator::new(events).aggregate(changed, &ctx, input_digest);

        let analysis_time_ms = start_time.elapsed().as_millis();
        info!("✅ Change-impact analysis complete in {}ms", analysis_time_ms);

        let stats = AnalysisStatistics {
            total_methods: graph_stats.total_methods,
            total_calls: graph_stats.total_calls,
            changed_methods: changed.len(),
            resolved_methods: resolved,
            not_found_methods: report.counts.not_found,
            handled_methods: report.counts.handled,
            unreachable_methods: report.unreachable_methods.len(),
            synthesis: synthesizer.stats().clone(),
            resolver: ctx.stats().clone(),
            analysis_time_ms,
        };

        Ok(ImpactAnalysisResult { report, stats })
    }

    /// Write the report as JSON into `output_dir`
    pub fn write_report(
        &self,
        result: &ImpactAnalysisResult,
        output_dir: &Path,
        file_name: &str,
        pretty: bool,
    ) -> Result<PathBuf> {
        info!("📝 Writing impact report...");

        std::fs::create_dir_all(output_dir)?;
        let path = output_dir.join(file_name);
        std::fs::write(&path, result.report.to_json(pretty)?)?;

        info!("Report written to: {}", path.display());
        Ok(path)
    }
}

impl AnalysisStatistics {
    pub fn log(&self) {
        info!("📊 Analysis statistics:");
        info!("  Methods: {} ({} call edges)", self.total_methods, self.total_calls);
        info!("  Changed: {} (resolved {}, not found {})",
              self.changed_methods, self.resolved_methods, self.not_found_methods);
        info!("  Handled by GUI events: {}", self.handled_methods);
        info!("  Unreachable methods: {}", self.unreachable_methods);
        info!("  Framework tables: {} async classes / {} execute sites, {} fragments, {} class constants",
              self.synthesis.async_classes, self.synthesis.execute_sites,
              self.synthesis.attached_fragments, self.synthesis.class_constants);
        info!("  Resolver: {} frames, {} memo reuses, deepest level {}",
              self.resolver.frames, self.resolver.memo_reuses, self.resolver.deepest_level);
        info!("  Time: {}ms", self.analysis_time_ms);
    }
}
