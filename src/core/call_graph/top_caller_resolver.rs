// src/core/call_graph/top_caller_resolver.rs
//! Memoized, cycle-safe upward search from a changed method to the GUI events,
//! lifecycle methods or dead ends that can trigger it.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use serde::{Serialize, Deserialize};
use tracing::{debug, info};

use super::super::signature::MethodSignature;
use super::framework_edges::FrameworkEdgeSynthesizer;
use super::gui_model::EventHandlerIndex;
use super::program_model::{AnalysisScope, ClassRole, ProgramModel, Statement};
use super::reachability::{virtual_siblings, ReachabilityOracle};

const GET_INTENT: &str = "getIntent";

/// Why the upward search stopped at a method
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "method", rename_all = "kebab-case")]
pub enum TriggerLabel {
    /// Directly bound to a GUI event
    EventBound(String),
    /// Nothing can call it
    Unreachable(String),
    /// GUI constructor, lifecycle anchor or the method itself when no caller was found
    Terminal(String),
}

impl TriggerLabel {
    pub fn method(&self) -> &str {
        match self {
            TriggerLabel::EventBound(m) | TriggerLabel::Unreachable(m) | TriggerLabel::Terminal(m) => m,
        }
    }

    pub fn is_unreachable(&self) -> bool {
        matches!(self, TriggerLabel::Unreachable(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoState {
    /// Frame for the method is still on the visited path
    InProgress,
    /// Frame returned; labels are as complete as this run gets them
    Finalized,
}

#[derive(Debug, Clone)]
pub struct MemoEntry {
    pub state: MemoState,
    pub labels: BTreeSet<TriggerLabel>,
}

/// Per-method top callers shared by every search of one run.
///
/// Labels are only ever added and an entry never leaves `Finalized`.
#[derive(Debug, Clone, Default)]
pub struct MemoCache {
    entries: HashMap<String, MemoEntry>,
}

impl MemoCache {
    fn entry(&mut self, method: &str) -> &mut MemoEntry {
        self.entries.entry(method.to_string()).or_insert_with(|| MemoEntry {
            state: MemoState::InProgress,
            labels: BTreeSet::new(),
        })
    }

    fn begin(&mut self, method: &str) {
        self.entry(method);
    }

    fn finalize(&mut self, method: &str) {
        self.entry(method).state = MemoState::Finalized;
    }

    fn add(&mut self, method: &str, label: TriggerLabel) {
        self.entry(method).labels.insert(label);
    }

    fn extend(&mut self, method: &str, labels: &BTreeSet<TriggerLabel>) {
        if !labels.is_empty() {
            self.entry(method).labels.extend(labels.iter().cloned());
        }
    }

    pub fn get(&self, method: &str) -> Option<&MemoEntry> {
        self.entries.get(method)
    }

    pub fn labels(&self, method: &str) -> Option<&BTreeSet<TriggerLabel>> {
        self.entries.get(method).map(|e| &e.labels)
    }

    /// A completed frame with a result can stand in for a fresh search
    pub fn is_reusable(&self, method: &str) -> bool {
        self.entries
            .get(method)
            .is_some_and(|e| e.state == MemoState::Finalized && !e.labels.is_empty())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Counters describing the work done by the resolver
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolverStats {
    pub frames: usize,
    pub memo_reuses: usize,
    pub deepest_level: usize,
    /// Frames logged because they ran under `trace_method`
    pub traced_frames: usize,
}

/// All mutable state of one analysis run
#[derive(Debug, Default)]
pub struct ResolverContext {
    path: Vec<String>,
    on_path: HashSet<String>,
    memo: MemoCache,
    top_callers: BTreeMap<String, BTreeSet<TriggerLabel>>,
    intent_callers: BTreeMap<String, BTreeSet<String>>,
    unreachable: BTreeSet<String>,
    not_found: Vec<String>,
    /// Level at which a traced frame switched on verbose logging
    trace_level: Option<usize>,
    stats: ResolverStats,
}

impl ResolverContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn top_callers(&self) -> &BTreeMap<String, BTreeSet<TriggerLabel>> {
        &self.top_callers
    }

    pub fn top_callers_of(&self, method: &str) -> Option<&BTreeSet<TriggerLabel>> {
        self.top_callers.get(method)
    }

    /// Method -> Activities whose custom intents lead to it
    pub fn intent_callers(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.intent_callers
    }

    pub fn unreachable_methods(&self) -> &BTreeSet<String> {
        &self.unreachable
    }

    pub fn not_found(&self) -> &[String] {
        &self.not_found
    }

    pub fn memo(&self) -> &MemoCache {
        &self.memo
    }

    pub fn stats(&self) -> &ResolverStats {
        &self.stats
    }

    pub fn is_on_path(&self, method: &str) -> bool {
        self.on_path.contains(method)
    }

    fn push_path(&mut self, method: &str) {
        self.path.push(method.to_string());
        self.on_path.insert(method.to_string());
    }

    fn pop_path(&mut self) {
        if let Some(method) = self.path.pop() {
            self.on_path.remove(&method);
        }
    }

    fn enter(&mut self, method: &str, level: usize) {
        self.push_path(method);
        self.memo.begin(method);
        self.stats.frames += 1;
        self.stats.deepest_level = self.stats.deepest_level.max(level);
    }

    fn leave(&mut self, method: &str, level: usize) {
        self.pop_path();
        self.memo.finalize(method);
        if self.trace_level == Some(level) {
            self.trace_level = None;
        }
    }

    fn tracing(&self) -> bool {
        self.trace_level.is_some()
    }

    /// Record a top caller for `changed` and remember it for `also`
    fn record(&mut self, changed: &str, label: TriggerLabel, also: &[&str]) {
        self.top_callers.entry(changed.to_string()).or_default().insert(label.clone());
        self.memo.add(changed, label.clone());
        for method in also {
            self.memo.add(method, label.clone());
        }
    }

    fn add_intent_caller(&mut self, method: &str, activity: &str) {
        self.intent_callers.entry(method.to_string()).or_default().insert(activity.to_string());
    }

    /// Merge what is known about `source` into each of `targets`
    fn absorb(&mut self, source: &str, targets: &[&str]) {
        if let Some(labels) = self.memo.labels(source).cloned() {
            for target in targets {
                self.memo.extend(target, &labels);
            }
        }
        if let Some(activities) = self.intent_callers.get(source).cloned() {
            for target in targets {
                self.intent_callers.entry(target.to_string()).or_default().extend(activities.iter().cloned());
            }
        }
    }

    /// Answer a frame from the memo: copy labels and intent origins into `changed`.
    ///
    /// An on-path hit with no labels yet still counts as found; the frame that
    /// owns `callback` is already searching for its callers.
    fn reuse(&mut self, changed: &str, callback: &str) {
        self.stats.memo_reuses += 1;
        let labels = self.memo.labels(callback).cloned().unwrap_or_default();
        for label in labels {
            self.record(changed, label, &[]);
        }
        if let Some(activities) = self.intent_callers.get(callback).cloned() {
            self.intent_callers.entry(changed.to_string()).or_default().extend(activities);
        }
    }

    /// Make `top_callers[changed]` and the memo entry agree after a search
    fn settle(&mut self, changed: &str) {
        let from_memo = self.memo.labels(changed).cloned().unwrap_or_default();
        let top = self.top_callers.entry(changed.to_string()).or_default();
        top.extend(from_memo);
        let top = top.clone();
        self.memo.extend(changed, &top);
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResolverOptions {
    /// Signature fragment whose searches are logged frame by frame
    pub trace_method: Option<String>,
}

/// Walks inbound call edges, hierarchy overrides and synthesized framework
/// edges until every path ends at an event, a dead end or a lifecycle anchor
pub struct TopCallerResolver<'a> {
    program: &'a dyn ProgramModel,
    events: &'a dyn EventHandlerIndex,
    scope: &'a AnalysisScope,
    synthesizer: &'a FrameworkEdgeSynthesizer,
    oracle: ReachabilityOracle<'a>,
    options: ResolverOptions,
}

impl<'a> TopCallerResolver<'a> {
    pub fn new(
        program: &'a dyn ProgramModel,
        events: &'a dyn EventHandlerIndex,
        scope: &'a AnalysisScope,
        synthesizer: &'a FrameworkEdgeSynthesizer,
        options: ResolverOptions,
    ) -> Self {
        Self {
            program,
            events,
            scope,
            synthesizer,
            oracle: ReachabilityOracle::new(program, scope, synthesizer),
            options,
        }
    }

    /// Resolve the top callers of one changed method into `ctx`.
    ///
    /// Returns false when the method is unknown to the program model.
    pub fn resolve(&self, ctx: &mut ResolverContext, changed: &str) -> bool {
        if !self.program.has_method(changed) {
            debug!("Changed method not in program model: {}", changed);
            if !ctx.not_found.iter().any(|m| m == changed) {
                ctx.not_found.push(changed.to_string());
            }
            return false;
        }

        self.find_top_callers(ctx, changed, changed, 0, None);
        ctx.settle(changed);
        true
    }

    fn find_top_callers(
        &self,
        ctx: &mut ResolverContext,
        changed: &str,
        callback: &str,
        level: usize,
        anchor: Option<&str>,
    ) -> bool {
        if ctx.is_on_path(callback) || ctx.memo.is_reusable(callback) {
            if ctx.tracing() {
                info!("[trace] {} - {} answered from memo", level, callback);
            }
            ctx.reuse(changed, callback);
            return true;
        }

        ctx.enter(callback, level);
        if ctx.trace_level.is_none()
            && self.options.trace_method.as_deref().is_some_and(|t| callback.contains(t))
        {
            ctx.trace_level = Some(level);
        }
        if ctx.tracing() {
            ctx.stats.traced_frames += 1;
            info!("[trace] {} - changed: {} - callback: {}", level, changed, callback);
        }

        let found = self.classify(ctx, changed, callback, level, anchor);

        ctx.leave(callback, level);
        found
    }

    fn classify(
        &self,
        ctx: &mut ResolverContext,
        changed: &str,
        callback: &str,
        level: usize,
        anchor: Option<&str>,
    ) -> bool {
        self.record_intent_origin(ctx, changed, callback);

        if self.events.is_event_handler(callback) {
            if ctx.tracing() {
                info!("[trace] {} is an event handler", callback);
            }
            ctx.record(changed, TriggerLabel::EventBound(callback.to_string()), &[callback]);
            return true;
        }

        if !self.oracle.is_reachable(callback, &mut ctx.unreachable) {
            ctx.record(changed, TriggerLabel::Unreachable(callback.to_string()), &[callback]);
            return true;
        }

        let Ok(signature) = MethodSignature::parse(callback) else {
            ctx.record(changed, TriggerLabel::Terminal(callback.to_string()), &[callback]);
            return true;
        };
        let class = signature.class_name.as_str();
        let is_gui = self.scope.is_gui_class(self.program, class);

        // the platform instantiates GUI hosts
        if is_gui && signature.is_constructor() {
            ctx.record(changed, TriggerLabel::Terminal(callback.to_string()), &[callback]);
            return true;
        }

        let anchor = if is_gui { Some(callback) } else { anchor };
        let mut fallbacks = self.expand_siblings(ctx, changed, callback, level, anchor);

        let is_static = self.program.resolve_method(callback).is_some_and(|m| m.is_static);
        if !fallbacks.is_empty()
            && !is_static
            && self.expand_construction_sites(ctx, changed, callback, class, level, anchor)
        {
            fallbacks.clear();
        }

        for fallback in &fallbacks {
            if ctx.tracing() {
                info!("[trace] no calling point above {}, stopping at {}", callback, fallback);
            }
            ctx.record(changed, TriggerLabel::Terminal(fallback.clone()), &[fallback.as_str(), callback]);
        }
        true
    }

    fn record_intent_origin(&self, ctx: &mut ResolverContext, changed: &str, callback: &str) {
        let reads_intent = self.program.body_statements(callback).iter().any(|statement| match statement {
            Statement::Invoke { callee, .. } => MethodSignature::parse(callee)
                .is_ok_and(|c| c.method_name.contains(GET_INTENT)),
            _ => false,
        });
        if !reads_intent {
            return;
        }

        let Ok(signature) = MethodSignature::parse(callback) else { return };
        let outer = self.program.outermost_class(&signature.class_name);
        if self.program.has_role(&outer, ClassRole::Activity) && self.program.receives_custom_intents(&outer) {
            debug!("{} reads the intent of {}", callback, outer);
            ctx.add_intent_caller(callback, &outer);
            ctx.add_intent_caller(changed, &outer);
        }
    }

    /// Explore the callback and its overridden declarations; returns the pending fallbacks
    fn expand_siblings(
        &self,
        ctx: &mut ResolverContext,
        changed: &str,
        callback: &str,
        level: usize,
        anchor: Option<&str>,
    ) -> Vec<String> {
        let siblings: Vec<String> = virtual_siblings(self.program, callback)
            .into_iter()
            .filter(|s| s == callback || !ctx.is_on_path(s))
            .collect();

        let overridden = &siblings[1..];
        for sibling in overridden {
            ctx.push_path(sibling);
        }

        let mut fallbacks: Vec<String> = Vec::new();
        for method in &siblings {
            if self.expand_sibling(ctx, changed, callback, method, &siblings, level, anchor) {
                continue;
            }
            let fallback = match anchor {
                Some(anchor) => anchor.to_string(),
                None if self.is_library_method(method) => callback.to_string(),
                None => method.clone(),
            };
            if !fallbacks.contains(&fallback) {
                fallbacks.push(fallback);
            }
        }

        for _ in overridden {
            ctx.pop_path();
        }
        fallbacks
    }

    /// Follow synthesized and raw callers of one sibling; true if any calling point was found
    #[allow(clippy::too_many_arguments)]
    fn expand_sibling(
        &self,
        ctx: &mut ResolverContext,
        changed: &str,
        callback: &str,
        method: &str,
        siblings: &[String],
        level: usize,
        anchor: Option<&str>,
    ) -> bool {
        let mut has_calling_point = false;

        for candidate in self.synthesizer.synthesize(self.program, method) {
            let next_anchor = if candidate.anchors_lifecycle {
                Some(candidate.method.as_str())
            } else {
                anchor
            };
            if ctx.tracing() {
                info!("[trace] {:?} caller of {}: {}", candidate.rule, method, candidate.method);
            }
            has_calling_point |= self.find_top_callers(ctx, changed, &candidate.method, level + 1, next_anchor);
            ctx.absorb(&candidate.method, &[method, callback]);
        }

        let Ok(signature) = MethodSignature::parse(method) else {
            return has_calling_point;
        };
        for caller in self.program.callers_of(method) {
            if siblings.contains(&caller) {
                continue;
            }
            let Ok(caller_signature) = MethodSignature::parse(&caller) else { continue };
            let caller_class = caller_signature.class_name.as_str();
            // super calls from subclasses do not lead anywhere new
            if self.program.is_subclass_of(caller_class, &signature.class_name)
                || self.scope.is_library(self.program, caller_class)
                || self.scope.is_excluded_caller(caller_class)
            {
                continue;
            }
            if ctx.tracing() {
                info!("[trace] caller of {}: {}", method, caller);
            }
            has_calling_point |= self.find_top_callers(ctx, changed, &caller, level + 1, anchor);
            ctx.absorb(&caller, &[method, callback]);
        }

        has_calling_point
    }

    /// Follow the places that instantiate the callback's class; true if they led anywhere
    fn expand_construction_sites(
        &self,
        ctx: &mut ResolverContext,
        changed: &str,
        callback: &str,
        class: &str,
        level: usize,
        anchor: Option<&str>,
    ) -> bool {
        let mut sites: Vec<String> = Vec::new();

        if self.program.has_role(class, ClassRole::View) {
            for window in self.events.view_hosts(class) {
                for constructor in self.program.constructors_of(&window) {
                    if !sites.contains(&constructor) {
                        sites.push(constructor);
                    }
                }
            }
        }

        for constructor in self.program.constructors_of(class) {
            for caller in self.program.callers_of(&constructor) {
                let excluded = MethodSignature::parse(&caller)
                    .map(|s| self.scope.is_excluded_caller(&s.class_name))
                    .unwrap_or(true);
                if !excluded && !sites.contains(&caller) {
                    sites.push(caller);
                }
            }
        }

        if sites.is_empty() {
            return false;
        }

        let mut found = false;
        for site in &sites {
            if ctx.tracing() {
                info!("[trace] {} is constructed in {}", class, site);
            }
            found |= self.find_top_callers(ctx, changed, site, level, anchor);
            ctx.absorb(site, &[callback]);
        }
        found
    }

    fn is_library_method(&self, method: &str) -> bool {
        MethodSignature::parse(method)
            .map(|s| self.scope.is_library(self.program, &s.class_name))
            .unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::gui_model::{GuiModel, WindowKind};
    use super::super::test_support::{binding, invoke, local, ProgramBuilder};
    use super::super::call_graph::CallGraph;
    use super::super::framework_edges::{BroadcastReceiverRule, SynthesisRule};
    use super::super::program_model::Statement;

    struct Fixture {
        program: CallGraph,
        gui: GuiModel,
        scope: AnalysisScope,
        synthesizer: FrameworkEdgeSynthesizer,
    }

    impl Fixture {
        fn new(program: CallGraph, gui: GuiModel) -> Self {
            Self::with_scope(program, gui, AnalysisScope::default())
        }

        fn with_scope(program: CallGraph, gui: GuiModel, scope: AnalysisScope) -> Self {
            let synthesizer = FrameworkEdgeSynthesizer::build(&program, &scope, &["execute".to_string()]);
            Self { program, gui, scope, synthesizer }
        }

        fn resolver(&self) -> TopCallerResolver<'_> {
            self.resolver_with(ResolverOptions::default())
        }

        fn resolver_with(&self, options: ResolverOptions) -> TopCallerResolver<'_> {
            TopCallerResolver::new(&self.program, &self.gui, &self.scope, &self.synthesizer, options)
        }

        fn resolve(&self, ctx: &mut ResolverContext, method: &str) -> BTreeSet<TriggerLabel> {
            self.resolver().resolve(ctx, method);
            ctx.top_callers_of(method).cloned().unwrap_or_default()
        }
    }

    fn gui_with(handlers: &[(&str, &str)]) -> GuiModel {
        let mut gui = GuiModel::new();
        for (window, handler) in handlers {
            gui.add_binding(binding(WindowKind::Activity, window, "button", "click", handler));
        }
        gui
    }

    fn labels(items: &[TriggerLabel]) -> BTreeSet<TriggerLabel> {
        items.iter().cloned().collect()
    }

    const ON_CLICK: &str = "<a.Main: void onSave(android.view.View)>";

    #[test]
    fn test_event_handler_is_its_own_top_caller() {
        let program = ProgramBuilder::new()
            .class("a.Main", Some("android.app.Activity"), &["void onSave(android.view.View)"])
            .build();
        let fixture = Fixture::new(program, gui_with(&[("a.Main", ON_CLICK)]));
        let mut ctx = ResolverContext::new();

        let result = fixture.resolve(&mut ctx, ON_CLICK);
        assert_eq!(result, labels(&[TriggerLabel::EventBound(ON_CLICK.to_string())]));
        assert_eq!(ctx.stats().frames, 1);
    }

    #[test]
    fn test_orphan_method_is_unreachable_once() {
        let program = ProgramBuilder::new()
            .class("a.Util", None, &["void orphan()"])
            .build();
        let fixture = Fixture::new(program, GuiModel::new());
        let mut ctx = ResolverContext::new();
        let orphan = "<a.Util: void orphan()>";

        fixture.resolve(&mut ctx, orphan);
        let result = fixture.resolve(&mut ctx, orphan);

        assert_eq!(result, labels(&[TriggerLabel::Unreachable(orphan.to_string())]));
        assert_eq!(ctx.unreachable_methods().iter().filter(|m| *m == orphan).count(), 1);
    }

    #[test]
    fn test_search_reaches_handler_through_call_chain() {
        let program = ProgramBuilder::new()
            .class("a.Main", Some("android.app.Activity"), &["void onSave(android.view.View)"])
            .class("a.Store", None, &["void save()", "void write()"])
            .edge(ON_CLICK, "<a.Store: void save()>")
            .edge("<a.Store: void save()>", "<a.Store: void write()>")
            .build();
        let fixture = Fixture::new(program, gui_with(&[("a.Main", ON_CLICK)]));
        let mut ctx = ResolverContext::new();

        let result = fixture.resolve(&mut ctx, "<a.Store: void write()>");
        assert_eq!(result, labels(&[TriggerLabel::EventBound(ON_CLICK.to_string())]));
        assert_eq!(
            ctx.memo().labels("<a.Store: void save()>"),
            Some(&labels(&[TriggerLabel::EventBound(ON_CLICK.to_string())]))
        );
        assert_eq!(ctx.memo().get("<a.Store: void save()>").map(|e| e.state), Some(MemoState::Finalized));
    }

    #[test]
    fn test_cycles_terminate() {
        let program = ProgramBuilder::new()
            .class("a.Loop", None, &["void one()", "void two()", "void three()"])
            .edge("<a.Loop: void one()>", "<a.Loop: void two()>")
            .edge("<a.Loop: void two()>", "<a.Loop: void three()>")
            .edge("<a.Loop: void three()>", "<a.Loop: void one()>")
            .build();
        let fixture = Fixture::new(program, GuiModel::new());
        let mut ctx = ResolverContext::new();

        // a closed cycle has no way in, and no member falls back to itself
        for method in ["<a.Loop: void one()>", "<a.Loop: void two()>", "<a.Loop: void three()>"] {
            let result = fixture.resolve(&mut ctx, method);
            assert!(result.is_empty(), "unexpected top callers for {}: {:?}", method, result);
        }
        assert!(ctx.memo().get("<a.Loop: void one()>").is_some_and(|e| e.state == MemoState::Finalized));
    }

    fn click_loop(click_edge_first: bool) -> CallGraph {
        let click = (ON_CLICK, "<a.Loop: void one()>");
        let back = ("<a.Loop: void two()>", "<a.Loop: void one()>");
        let edges = if click_edge_first { [click, back] } else { [back, click] };

        let mut builder = ProgramBuilder::new()
            .class("a.Main", Some("android.app.Activity"), &["void onSave(android.view.View)"])
            .class("a.Loop", None, &["void one()", "void two()"]);
        for (caller, callee) in edges {
            builder = builder.edge(caller, callee);
        }
        builder.edge("<a.Loop: void one()>", "<a.Loop: void two()>").build()
    }

    #[test]
    fn test_results_do_not_depend_on_edge_order() {
        let mut results = Vec::new();
        for click_edge_first in [true, false] {
            let fixture = Fixture::new(click_loop(click_edge_first), gui_with(&[("a.Main", ON_CLICK)]));
            let mut ctx = ResolverContext::new();
            fixture.resolve(&mut ctx, "<a.Loop: void one()>");
            fixture.resolve(&mut ctx, "<a.Loop: void two()>");
            results.push(ctx.top_callers().clone());
        }

        assert_eq!(results[0], results[1]);
        let expected = labels(&[TriggerLabel::EventBound(ON_CLICK.to_string())]);
        assert_eq!(results[1].get("<a.Loop: void one()>"), Some(&expected));
        assert_eq!(results[1].get("<a.Loop: void two()>"), Some(&expected));
    }

    #[test]
    fn test_cycle_with_exit_reaches_handler() {
        let program = ProgramBuilder::new()
            .class("a.Main", Some("android.app.Activity"), &["void onSave(android.view.View)"])
            .class("a.Loop", None, &["void one()", "void two()"])
            .edge("<a.Loop: void one()>", "<a.Loop: void two()>")
            .edge("<a.Loop: void two()>", "<a.Loop: void one()>")
            .edge(ON_CLICK, "<a.Loop: void two()>")
            .build();
        let fixture = Fixture::new(program, gui_with(&[("a.Main", ON_CLICK)]));
        let mut ctx = ResolverContext::new();

        let result = fixture.resolve(&mut ctx, "<a.Loop: void one()>");
        assert!(result.contains(&TriggerLabel::EventBound(ON_CLICK.to_string())));
    }

    #[test]
    fn test_repeated_resolution_is_idempotent() {
        let program = ProgramBuilder::new()
            .class("a.Main", Some("android.app.Activity"), &["void onSave(android.view.View)"])
            .class("a.Loop", None, &["void one()", "void two()"])
            .edge("<a.Loop: void one()>", "<a.Loop: void two()>")
            .edge("<a.Loop: void two()>", "<a.Loop: void one()>")
            .edge(ON_CLICK, "<a.Loop: void one()>")
            .build();
        let fixture = Fixture::new(program, gui_with(&[("a.Main", ON_CLICK)]));
        let mut ctx = ResolverContext::new();

        let first = fixture.resolve(&mut ctx, "<a.Loop: void two()>");
        let second = fixture.resolve(&mut ctx, "<a.Loop: void two()>");
        assert_eq!(first, second);
    }

    #[test]
    fn test_virtual_dispatch_through_superclass_edge() {
        let program = ProgramBuilder::new()
            .class("a.Main", Some("android.app.Activity"), &["void onSave(android.view.View)"])
            .class("a.A", None, &["void f()"])
            .class("a.B", Some("a.A"), &["void f()"])
            .edge(ON_CLICK, "<a.A: void f()>")
            .build();
        let fixture = Fixture::new(program, gui_with(&[("a.Main", ON_CLICK)]));
        let mut ctx = ResolverContext::new();

        let result = fixture.resolve(&mut ctx, "<a.B: void f()>");
        assert!(result.contains(&TriggerLabel::EventBound(ON_CLICK.to_string())));
    }

    #[test]
    fn test_subclass_super_call_is_not_a_caller() {
        let program = ProgramBuilder::new()
            .class("a.Base", None, &["void work()"])
            .class("a.Child", Some("a.Base"), &["void work()"])
            .class("a.Client", None, &["void use()"])
            .edge("<a.Child: void work()>", "<a.Base: void work()>")
            .edge("<a.Client: void use()>", "<a.Base: void work()>")
            .build();
        let fixture = Fixture::new(program, GuiModel::new());
        let mut ctx = ResolverContext::new();

        let result = fixture.resolve(&mut ctx, "<a.Base: void work()>");
        assert!(result.iter().all(|l| l.method() != "<a.Child: void work()>"));
        assert!(result.contains(&TriggerLabel::Unreachable("<a.Client: void use()>".to_string())));
    }

    #[test]
    fn test_fragment_method_delegates_to_activity_on_create() {
        let on_create = "<a.Act: void onCreate(android.os.Bundle)>";
        let program = ProgramBuilder::new()
            .library_class("android.app.Activity", None, &["void onCreate(android.os.Bundle)"])
            .library_class("androidx.fragment.app.Fragment", None, &[])
            .class("a.Act", Some("android.app.Activity"), &["void onCreate(android.os.Bundle)"])
            .class("a.Frag", Some("androidx.fragment.app.Fragment"), &[
                "android.view.View onCreateView(android.view.LayoutInflater,android.view.ViewGroup,android.os.Bundle)",
            ])
            .body(on_create, vec![
                Statement::Alloc { local: "f".to_string(), class: "a.Frag".to_string() },
                invoke(
                    "<androidx.fragment.app.FragmentTransaction: androidx.fragment.app.FragmentTransaction add(int,androidx.fragment.app.Fragment)>",
                    Some("tx"),
                    vec![super::super::program_model::ArgKind::Constant, local("f", None)],
                ),
            ])
            .build();
        let fixture = Fixture::new(program, GuiModel::new());
        let mut ctx = ResolverContext::new();

        let result = fixture.resolve(
            &mut ctx,
            "<a.Frag: android.view.View onCreateView(android.view.LayoutInflater,android.view.ViewGroup,android.os.Bundle)>",
        );
        assert_eq!(result, labels(&[TriggerLabel::Terminal(on_create.to_string())]));
    }

    #[test]
    fn test_async_run_delegates_to_click_handler() {
        let program = ProgramBuilder::new()
            .class("a.Main", Some("android.app.Activity"), &["void onSave(android.view.View)"])
            .class("a.Upload", None, &["void <init>()", "void run()"])
            .interfaces("a.Upload", &["java.lang.Runnable"])
            .body(ON_CLICK, vec![
                Statement::Alloc { local: "r".to_string(), class: "a.Upload".to_string() },
                invoke("<a.Upload: void <init>()>", Some("r"), vec![]),
                invoke("<java.util.concurrent.Executor: void execute(java.lang.Runnable)>", Some("pool"), vec![local("r", Some("a.Upload"))]),
            ])
            .edge(ON_CLICK, "<a.Upload: void <init>()>")
            .build();
        let fixture = Fixture::new(program, gui_with(&[("a.Main", ON_CLICK)]));
        let mut ctx = ResolverContext::new();

        let result = fixture.resolve(&mut ctx, "<a.Upload: void run()>");
        assert_eq!(result, labels(&[TriggerLabel::EventBound(ON_CLICK.to_string())]));
    }

    #[test]
    fn test_construction_site_supersedes_fallback() {
        let update = "<a.Listener: void update(java.util.Observable,java.lang.Object)>";
        let program = ProgramBuilder::new()
            .library_class("java.util.Observer", None, &["void update(java.util.Observable,java.lang.Object)"])
            .class("a.Main", Some("android.app.Activity"), &["void onSave(android.view.View)"])
            .class("a.Listener", None, &["void <init>()", "void update(java.util.Observable,java.lang.Object)"])
            .interfaces("a.Listener", &["java.util.Observer"])
            .edge(ON_CLICK, "<a.Listener: void <init>()>")
            .build();
        let fixture = Fixture::new(program, gui_with(&[("a.Main", ON_CLICK)]));
        let mut ctx = ResolverContext::new();

        let result = fixture.resolve(&mut ctx, update);
        assert_eq!(result, labels(&[TriggerLabel::EventBound(ON_CLICK.to_string())]));
    }

    #[test]
    fn test_static_method_without_callers_falls_back_to_itself() {
        let helper = "<a.Tools: void helper()>";
        let program = ProgramBuilder::new()
            .library_class("java.lang.Thread", None, &["void helper()"])
            .class("a.Tools", Some("java.lang.Thread"), &["void helper()"])
            .static_method(helper)
            .build();
        let fixture = Fixture::new(program, GuiModel::new());
        let mut ctx = ResolverContext::new();

        let result = fixture.resolve(&mut ctx, helper);
        assert_eq!(result, labels(&[TriggerLabel::Terminal(helper.to_string())]));
    }

    #[test]
    fn test_view_method_reaches_hosting_window_constructor() {
        let on_draw = "<a.Chart: void onDraw(android.graphics.Canvas)>";
        let host_ctor = "<a.Main: void <init>()>";
        let build = || ProgramBuilder::new()
            .library_class("android.view.View", None, &["void onDraw(android.graphics.Canvas)"])
            .library_class("android.app.Activity", None, &["void <init>()"])
            .class("a.Main", Some("android.app.Activity"), &["void <init>()"])
            .class("a.Chart", Some("android.view.View"), &["void <init>()", "void onDraw(android.graphics.Canvas)"])
            .build();

        let mut gui = GuiModel::new();
        gui.add_view_host("a.Chart", "a.Main");
        let hosted = Fixture::new(build(), gui);
        let mut ctx = ResolverContext::new();
        assert_eq!(hosted.resolve(&mut ctx, on_draw), labels(&[TriggerLabel::Terminal(host_ctor.to_string())]));

        // without a known host the view method stops at itself
        let unhosted = Fixture::new(build(), GuiModel::new());
        let mut ctx = ResolverContext::new();
        assert_eq!(unhosted.resolve(&mut ctx, on_draw), labels(&[TriggerLabel::Terminal(on_draw.to_string())]));
    }

    #[test]
    fn test_excluded_callers_are_skipped() {
        let save = "<a.Store: void save()>";
        let update = "<a.Store: void update(java.util.Observable,java.lang.Object)>";
        let generated_call = "<com.google.android.gms.internal.Zz: void z()>";
        let generated_new = "<com.google.android.gms.internal.Zz: void build()>";
        let build = || ProgramBuilder::new()
            .library_class("java.util.Observer", None, &["void update(java.util.Observable,java.lang.Object)"])
            .class("a.Store", None, &["void <init>()", "void save()", "void update(java.util.Observable,java.lang.Object)"])
            .interfaces("a.Store", &["java.util.Observer"])
            .class("com.google.android.gms.internal.Zz", None, &["void z()", "void build()"])
            .edge(generated_call, save)
            .edge(generated_new, "<a.Store: void <init>()>")
            .build();

        let excluding = Fixture::new(build(), GuiModel::new());
        let mut ctx = ResolverContext::new();
        assert_eq!(excluding.resolve(&mut ctx, save), labels(&[TriggerLabel::Terminal(save.to_string())]));
        assert_eq!(excluding.resolve(&mut ctx, update), labels(&[TriggerLabel::Terminal(update.to_string())]));

        let scope = AnalysisScope::new(vec!["android.".to_string(), "java.".to_string()], Vec::new());
        let including = Fixture::with_scope(build(), GuiModel::new(), scope);
        let mut ctx = ResolverContext::new();
        assert_eq!(including.resolve(&mut ctx, save), labels(&[TriggerLabel::Unreachable(generated_call.to_string())]));
        assert_eq!(including.resolve(&mut ctx, update), labels(&[TriggerLabel::Unreachable(generated_new.to_string())]));
    }

    fn service_program() -> CallGraph {
        ProgramBuilder::new()
            .library_class("android.app.Service", None, &[])
            .class("a.Main", Some("android.app.Activity"), &["void onSave(android.view.View)"])
            .class("a.Sync", Some("android.app.Service"), &["int onStartCommand(android.content.Intent,int,int)"])
            .body(ON_CLICK, vec![
                Statement::ClassConstant { local: Some("c".to_string()), literal: "La/Sync;".to_string() },
            ])
            .build()
    }

    #[test]
    fn test_service_started_from_click_handler() {
        let on_start = "<a.Sync: int onStartCommand(android.content.Intent,int,int)>";
        let fixture = Fixture::new(service_program(), gui_with(&[("a.Main", ON_CLICK)]));
        let mut ctx = ResolverContext::new();

        assert_eq!(fixture.resolve(&mut ctx, on_start), labels(&[TriggerLabel::EventBound(ON_CLICK.to_string())]));
        assert!(ctx.unreachable_methods().is_empty());
    }

    #[test]
    fn test_service_without_reflection_rule_is_unreachable() {
        let on_start = "<a.Sync: int onStartCommand(android.content.Intent,int,int)>";
        let program = service_program();
        let gui = gui_with(&[("a.Main", ON_CLICK)]);
        let scope = AnalysisScope::default();
        let rules: Vec<Box<dyn SynthesisRule>> = vec![Box::new(BroadcastReceiverRule)];
        let synthesizer = FrameworkEdgeSynthesizer::with_rules(rules);
        let resolver = TopCallerResolver::new(&program, &gui, &scope, &synthesizer, ResolverOptions::default());
        let mut ctx = ResolverContext::new();

        resolver.resolve(&mut ctx, on_start);
        assert_eq!(ctx.top_callers_of(on_start), Some(&labels(&[TriggerLabel::Unreachable(on_start.to_string())])));
        assert_eq!(synthesizer.rule_names(), vec!["broadcast-receiver"]);
    }

    #[test]
    fn test_trace_method_logs_only_its_subtree() {
        let program = || ProgramBuilder::new()
            .class("a.Main", Some("android.app.Activity"), &["void onSave(android.view.View)"])
            .class("a.Store", None, &["void save()", "void write()", "void audit()"])
            .edge(ON_CLICK, "<a.Store: void save()>")
            .edge(ON_CLICK, "<a.Store: void audit()>")
            .edge("<a.Store: void save()>", "<a.Store: void write()>")
            .build();

        let fixture = Fixture::new(program(), gui_with(&[("a.Main", ON_CLICK)]));
        let resolver = fixture.resolver_with(ResolverOptions { trace_method: Some("Store: void save".to_string()) });
        let mut ctx = ResolverContext::new();

        // write (untraced) -> save (traced) -> handler (traced)
        resolver.resolve(&mut ctx, "<a.Store: void write()>");
        assert_eq!(ctx.stats().traced_frames, 2);
        assert!(!ctx.tracing());

        resolver.resolve(&mut ctx, "<a.Store: void audit()>");
        assert_eq!(ctx.stats().traced_frames, 2);

        let untraced = Fixture::new(program(), gui_with(&[("a.Main", ON_CLICK)]));
        let mut ctx = ResolverContext::new();
        untraced.resolve(&mut ctx, "<a.Store: void write()>");
        assert_eq!(ctx.stats().traced_frames, 0);
    }

    #[test]
    fn test_gui_constructor_is_terminal() {
        let ctor = "<a.Main: void <init>()>";
        let program = ProgramBuilder::new()
            .class("a.Main", Some("android.app.Activity"), &["void <init>()"])
            .class("a.Other", None, &["void make()"])
            .edge("<a.Other: void make()>", ctor)
            .build();
        let fixture = Fixture::new(program, GuiModel::new());
        let mut ctx = ResolverContext::new();

        assert_eq!(fixture.resolve(&mut ctx, ctor), labels(&[TriggerLabel::Terminal(ctor.to_string())]));
    }

    #[test]
    fn test_intent_reading_activity_is_recorded() {
        let on_create = "<a.Share: void onCreate(android.os.Bundle)>";
        let program = ProgramBuilder::new()
            .library_class("android.app.Activity", None, &["void onCreate(android.os.Bundle)"])
            .class("a.Share", Some("android.app.Activity"), &["void onCreate(android.os.Bundle)", "void parse()"])
            .body(on_create, vec![
                invoke("<android.app.Activity: android.content.Intent getIntent()>", Some("this"), vec![]),
            ])
            .edge(on_create, "<a.Share: void parse()>")
            .intent_filter("a.Share")
            .build();
        let fixture = Fixture::new(program, GuiModel::new());
        let mut ctx = ResolverContext::new();

        fixture.resolve(&mut ctx, "<a.Share: void parse()>");
        let activities = ctx.intent_callers().get("<a.Share: void parse()>").cloned().unwrap_or_default();
        assert!(activities.contains("a.Share"));

        // later searches reusing onCreate inherit the intent origin
        fixture.resolve(&mut ctx, on_create);
        assert!(ctx.intent_callers().get(on_create).is_some_and(|a| a.contains("a.Share")));
    }

    #[test]
    fn test_unknown_method_is_not_found() {
        let fixture = Fixture::new(ProgramBuilder::new().build(), GuiModel::new());
        let mut ctx = ResolverContext::new();

        assert!(!fixture.resolver().resolve(&mut ctx, "<a.Gone: void x()>"));
        assert!(!fixture.resolver().resolve(&mut ctx, "<a.Gone: void x()>"));
        assert_eq!(ctx.not_found(), &["<a.Gone: void x()>".to_string()]);
        assert!(ctx.top_callers().is_empty());
    }

    #[test]
    fn test_trigger_label_serialization() {
        let label = TriggerLabel::EventBound("<a.B: void c()>".to_string());
        let json = serde_json::to_string(&label).unwrap();
        assert_eq!(json, r#"{"kind":"event-bound","method":"<a.B: void c()>"}"#);
    }
}
