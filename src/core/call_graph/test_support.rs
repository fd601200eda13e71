// src/core/call_graph/test_support.rs - fixture builders shared by the analysis tests
use std::collections::HashMap;

use super::super::signature::MethodSignature;
use super::call_graph::{CallEdge, CallGraph, ClassRecord, MethodRecord, ProgramSnapshot};
use super::gui_model::{EventBinding, GuiWindow, WindowKind};
use super::program_model::{ArgKind, ClassOrigin, Receiver, Statement};

/// Fluent builder for small in-memory programs
#[derive(Default)]
pub struct ProgramBuilder {
    classes: Vec<ClassRecord>,
    edges: Vec<CallEdge>,
    bodies: HashMap<String, Vec<Statement>>,
    statics: Vec<String>,
    intent_filter_activities: Vec<String>,
}

impl ProgramBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn class(self, name: &str, superclass: Option<&str>, methods: &[&str]) -> Self {
        self.push_class(name, superclass, methods, ClassOrigin::Application)
    }

    pub fn library_class(self, name: &str, superclass: Option<&str>, methods: &[&str]) -> Self {
        self.push_class(name, superclass, methods, ClassOrigin::Library)
    }

    fn push_class(mut self, name: &str, superclass: Option<&str>, methods: &[&str], origin: ClassOrigin) -> Self {
        self.classes.push(ClassRecord {
            name: name.to_string(),
            superclass: superclass.map(str::to_string),
            interfaces: Vec::new(),
            outer_class: None,
            origin,
            methods: methods
                .iter()
                .map(|sub| MethodRecord {
                    sub_signature: sub.to_string(),
                    is_static: false,
                    has_body: None,
                    statements: Vec::new(),
                })
                .collect(),
        });
        self
    }

    pub fn interfaces(mut self, class: &str, interfaces: &[&str]) -> Self {
        if let Some(record) = self.classes.iter_mut().find(|c| c.name == class) {
            record.interfaces = interfaces.iter().map(|i| i.to_string()).collect();
        }
        self
    }

    pub fn static_method(mut self, method: &str) -> Self {
        self.statics.push(method.to_string());
        self
    }

    pub fn body(mut self, method: &str, statements: Vec<Statement>) -> Self {
        self.bodies.insert(method.to_string(), statements);
        self
    }

    pub fn edge(mut self, caller: &str, callee: &str) -> Self {
        self.edges.push(CallEdge {
            caller: caller.to_string(),
            callee: callee.to_string(),
        });
        self
    }

    pub fn intent_filter(mut self, activity: &str) -> Self {
        self.intent_filter_activities.push(activity.to_string());
        self
    }

    pub fn snapshot(mut self) -> ProgramSnapshot {
        for class in &mut self.classes {
            for method in &mut class.methods {
                let id = format!("<{}: {}>", class.name, method.sub_signature);
                if let Some(statements) = self.bodies.remove(&id) {
                    method.statements = statements;
                }
                method.is_static = self.statics.contains(&id);
            }
        }
        ProgramSnapshot {
            classes: self.classes,
            call_edges: self.edges,
            intent_filter_activities: self.intent_filter_activities,
        }
    }

    pub fn build(self) -> CallGraph {
        CallGraph::from_snapshot(self.snapshot()).unwrap()
    }
}

pub fn invoke(callee: &str, receiver: Option<&str>, args: Vec<ArgKind>) -> Statement {
    let receiver_class = MethodSignature::parse(callee).ok().map(|s| s.class_name);
    Statement::Invoke {
        callee: callee.to_string(),
        receiver: receiver.map(|local| Receiver {
            local: local.to_string(),
            class: receiver_class,
        }),
        args,
        result: None,
    }
}

pub fn local(name: &str, class: Option<&str>) -> ArgKind {
    ArgKind::Local {
        name: name.to_string(),
        class: class.map(str::to_string),
    }
}

pub fn binding(kind: WindowKind, window: &str, widget: &str, event: &str, handler: &str) -> EventBinding {
    EventBinding {
        window: GuiWindow {
            kind,
            class: window.to_string(),
        },
        widget: widget.to_string(),
        event: event.to_string(),
        handlers: vec![handler.to_string()],
    }
}
