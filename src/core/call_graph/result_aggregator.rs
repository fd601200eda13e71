// src/core/call_graph/result_aggregator.rs - resolver output to report
use std::collections::{BTreeMap, BTreeSet};
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};

use crate::error::Result;
use super::gui_model::EventHandlerIndex;
use super::top_caller_resolver::{ResolverContext, TriggerLabel};

/// One GUI event whose handlers lead to modified code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandledEvent {
    pub event: String,
    pub handlers: BTreeSet<String>,
    pub modified_methods: BTreeSet<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportCounts {
    pub modified: usize,
    pub handled: usize,
    pub unhandled: usize,
    pub unreachable: usize,
    pub not_found: usize,
    pub impacted_events: usize,
}

/// Everything a test-selection tool needs to know about one change set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpactReport {
    pub generated_at: DateTime<Utc>,
    /// SHA-256 over the analysed inputs
    pub input_digest: String,
    pub modified_methods: Vec<String>,
    /// window -> widget -> events reaching modified methods
    pub handled: BTreeMap<String, BTreeMap<String, Vec<HandledEvent>>>,
    pub top_callers: BTreeMap<String, Vec<TriggerLabel>>,
    /// Activity -> modified methods reachable through its custom intents
    pub intent_callers: BTreeMap<String, BTreeSet<String>>,
    /// Top callers that no GUI event is bound to
    pub unhandled_methods: BTreeSet<String>,
    pub unreachable_methods: BTreeSet<String>,
    /// Modified methods whose every top caller is unreachable
    pub unreachable_modified_methods: BTreeSet<String>,
    /// Modified methods with neither an event nor a dead end above them
    pub unhandled_modified_methods: BTreeSet<String>,
    pub not_found_methods: Vec<String>,
    pub counts: ReportCounts,
}

impl ImpactReport {
    pub fn to_json(&self, pretty: bool) -> Result<String> {
        let json = if pretty {
            serde_json::to_string_pretty(self)?
        } else {
            serde_json::to_string(self)?
        };
        Ok(json)
    }

    /// Every distinct (window, widget, event) affected by the change set
    pub fn impacted_event_count(&self) -> usize {
        self.handled.values().flat_map(|widgets| widgets.values()).map(Vec::len).sum()
    }
}

/// Turns the resolver's maps into an `ImpactReport` by set algebra
pub struct ResultAggregator<'a> {
    events: &'a dyn EventHandlerIndex,
}

impl<'a> ResultAggregator<'a> {
    pub fn new(events: &'a dyn EventHandlerIndex) -> Self {
        Self { events }
    }

    pub fn aggregate(&self, modified: &[String], ctx: &ResolverContext, input_digest: String) -> ImpactReport {
        let modified_set: BTreeSet<&str> = modified.iter().map(String::as_str).collect();

        let mut handled_events: BTreeMap<(String, String, String), HandledEvent> = BTreeMap::new();
        let mut handled_modified: BTreeSet<String> = BTreeSet::new();
        let mut unhandled_methods: BTreeSet<String> = BTreeSet::new();
        let mut top_callers: BTreeMap<String, Vec<TriggerLabel>> = BTreeMap::new();

        for (changed, labels) in ctx.top_callers() {
            if !modified_set.contains(changed.as_str()) {
                continue;
            }
            top_callers.insert(changed.clone(), labels.iter().cloned().collect());

            for label in labels {
                let bindings = self.events.events_bound_to(label.method());
                if bindings.is_empty() {
                    unhandled_methods.insert(label.method().to_string());
                    continue;
                }
                handled_modified.insert(changed.clone());
                for binding in bindings {
                    let key = (binding.window.to_string(), binding.widget.clone(), binding.event.clone());
                    let event = handled_events.entry(key).or_insert_with(|| HandledEvent {
                        event: binding.event.clone(),
                        handlers: BTreeSet::new(),
                        modified_methods: BTreeSet::new(),
                    });
                    event.handlers.extend(binding.handlers.iter().cloned());
                    event.modified_methods.insert(changed.clone());
                }
            }
        }

        let mut handled: BTreeMap<String, BTreeMap<String, Vec<HandledEvent>>> = BTreeMap::new();
        for ((window, widget, _), event) in handled_events {
            handled.entry(window).or_default().entry(widget).or_default().push(event);
        }

        let unreachable_modified: BTreeSet<String> = top_callers
            .iter()
            .filter(|(_, labels)| !labels.is_empty() && labels.iter().all(TriggerLabel::is_unreachable))
            .map(|(changed, _)| changed.clone())
            .collect();

        let unhandled_modified: BTreeSet<String> = top_callers
            .keys()
            .filter(|m| !handled_modified.contains(*m) && !unreachable_modified.contains(*m))
            .cloned()
            .collect();

        let mut intent_callers: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (method, activities) in ctx.intent_callers() {
            if !modified_set.contains(method.as_str()) {
                continue;
            }
            for activity in activities {
                intent_callers.entry(activity.clone()).or_default().insert(method.clone());
            }
        }

        let mut report = ImpactReport {
            generated_at: Utc::now(),
            input_digest,
            modified_methods: modified.to_vec(),
            handled,
            top_callers,
            intent_callers,
            unhandled_methods,
            unreachable_methods: ctx.unreachable_methods().clone(),
            unreachable_modified_methods: unreachable_modified,
            unhandled_modified_methods: unhandled_modified,
            not_found_methods: ctx.not_found().to_vec(),
            counts: ReportCounts::default(),
        };
        report.counts = ReportCounts {
            modified: modified.len(),
            handled: handled_modified.len(),
            unhandled: report.unhandled_modified_methods.len(),
            unreachable: report.unreachable_modified_methods.len(),
            not_found: report.not_found_methods.len(),
            impacted_events: report.impacted_event_count(),
        };
        report
    }
}
