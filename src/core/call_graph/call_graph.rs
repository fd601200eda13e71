// src/core/call_graph/call_graph.rs - in-memory program snapshot
use std::collections::{HashMap, HashSet, VecDeque};
use serde::{Serialize, Deserialize};
use tracing::{debug, warn};

use crate::error::{ImpactError, Result};
use super::super::signature::{compose_signature, MethodSignature};
use super::program_model::{ClassInfo, ClassOrigin, MethodInfo, ProgramModel, Statement};

/// Serialized program facts exported by the host analysis engine
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgramSnapshot {
    pub classes: Vec<ClassRecord>,
    #[serde(default)]
    pub call_edges: Vec<CallEdge>,
    /// Activities declaring intent filters beyond MAIN/LAUNCHER
    #[serde(default)]
    pub intent_filter_activities: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassRecord {
    pub name: String,
    #[serde(default)]
    pub superclass: Option<String>,
    #[serde(default)]
    pub interfaces: Vec<String>,
    #[serde(default)]
    pub outer_class: Option<String>,
    #[serde(default = "default_origin")]
    pub origin: ClassOrigin,
    #[serde(default)]
    pub methods: Vec<MethodRecord>,
}

fn default_origin() -> ClassOrigin {
    ClassOrigin::Application
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodRecord {
    /// `Ret name(A,B)`; the declaring class comes from the enclosing record
    pub sub_signature: String,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub has_body: Option<bool>,
    #[serde(default)]
    pub statements: Vec<Statement>,
}

/// Edge in the call graph representing a method call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallEdge {
    /// Method making the call
    pub caller: String,
    /// Method being called
    pub callee: String,
}

#[derive(Debug, Clone)]
struct MethodNode {
    info: MethodInfo,
    statements: Vec<Statement>,
}

/// Complete call graph and class hierarchy for the application
#[derive(Debug, Clone, Default)]
pub struct CallGraph {
    /// All methods, keyed by normalized signature
    nodes: HashMap<String, MethodNode>,
    /// All classes in snapshot order
    classes: Vec<ClassInfo>,
    class_index: HashMap<String, usize>,
    /// Methods declared per class, in declaration order
    class_methods: HashMap<String, Vec<String>>,
    /// All edges (calls) in the graph
    edges: Vec<CallEdge>,
    /// Reverse adjacency list (who calls this method)
    reverse_adjacency: HashMap<String, Vec<String>>,
    intent_filter_activities: HashSet<String>,
}

impl CallGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON snapshot
    pub fn from_json(content: &str) -> Result<Self> {
        let snapshot: ProgramSnapshot = serde_json::from_str(content)?;
        Self::from_snapshot(snapshot)
    }

    /// Build the graph from a snapshot
    pub fn from_snapshot(snapshot: ProgramSnapshot) -> Result<Self> {
        let mut graph = Self::new();

        // First pass: classes and their methods
        for class in snapshot.classes {
            graph.add_class(class)?;
        }

        // Second pass: call edges
        for edge in snapshot.call_edges {
            graph.add_edge(edge);
        }
        debug!("Loaded {} methods and {} call edges", graph.nodes.len(), graph.edges.len());

        graph.intent_filter_activities = snapshot.intent_filter_activities.into_iter().collect();
        graph.build_adjacency_lists();

        Ok(graph)
    }

    /// Add a class and every method it declares
    pub fn add_class(&mut self, record: ClassRecord) -> Result<()> {
        if self.class_index.contains_key(&record.name) {
            return Err(ImpactError::Model(format!("class {} declared twice", record.name)));
        }

        let mut declared = Vec::with_capacity(record.methods.len());
        for method in record.methods {
            let id = compose_signature(&record.name, &method.sub_signature);
            let signature = MethodSignature::parse(&id)?;
            let has_body = method
                .has_body
                .unwrap_or(record.origin == ClassOrigin::Application);
            let node = MethodNode {
                info: MethodInfo {
                    id: id.clone(),
                    signature,
                    is_static: method.is_static,
                    has_body,
                },
                statements: method.statements,
            };
            declared.push(id.clone());
            self.nodes.insert(id, node);
        }

        self.class_methods.insert(record.name.clone(), declared);
        self.class_index.insert(record.name.clone(), self.classes.len());
        self.classes.push(ClassInfo {
            name: record.name,
            superclass: record.superclass,
            interfaces: record.interfaces,
            outer_class: record.outer_class,
            origin: record.origin,
        });
        Ok(())
    }

    /// Add a call edge to the graph; call `build_adjacency_lists` afterwards
    pub fn add_edge(&mut self, edge: CallEdge) {
        if edge.caller == edge.callee {
            return;
        }
        if MethodSignature::parse(&edge.caller).is_err() || MethodSignature::parse(&edge.callee).is_err() {
            warn!("Skipping call edge with malformed endpoint: {} -> {}", edge.caller, edge.callee);
            return;
        }
        self.edges.push(edge);
    }

    /// Get methods that call this method (incoming edges)
    pub fn get_callers(&self, method: &str) -> Vec<&String> {
        self.reverse_adjacency.get(method)
            .map(|callers| callers.iter().collect())
            .unwrap_or_default()
    }

    pub fn in_degree(&self, method: &str) -> usize {
        self.get_callers(method).len()
    }

    pub fn method_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Get statistics about the call graph
    pub fn get_statistics(&self) -> CallGraphStats {
        CallGraphStats {
            total_methods: self.nodes.len(),
            total_classes: self.classes.len(),
            application_classes: self.classes.iter()
                .filter(|c| c.origin == ClassOrigin::Application)
                .count(),
            total_calls: self.edges.len(),
            max_in_degree: self.nodes.keys().map(|m| self.in_degree(m)).max().unwrap_or(0),
        }
    }

    /// Build the reverse adjacency list used by caller lookups
    pub fn build_adjacency_lists(&mut self) {
        self.reverse_adjacency.clear();

        for edge in &self.edges {
            let callers = self.reverse_adjacency.entry(edge.callee.clone()).or_default();
            if !callers.contains(&edge.caller) {
                callers.push(edge.caller.clone());
            }
        }
    }
}

impl ProgramModel for CallGraph {
    fn resolve_method(&self, signature: &str) -> Option<&MethodInfo> {
        self.nodes.get(signature).map(|n| &n.info)
    }

    fn callers_of(&self, method: &str) -> Vec<String> {
        self.reverse_adjacency.get(method).cloned().unwrap_or_default()
    }

    fn class(&self, name: &str) -> Option<&ClassInfo> {
        self.class_index.get(name).map(|&i| &self.classes[i])
    }

    fn supertypes_of(&self, class: &str) -> Vec<String> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut ordered = Vec::new();
        let mut queue: VecDeque<String> = VecDeque::new();
        queue.push_back(class.to_string());
        seen.insert(class.to_string());

        while let Some(current) = queue.pop_front() {
            let Some(info) = self.class(&current) else { continue };
            let parents = info.superclass.iter().chain(info.interfaces.iter());
            for parent in parents {
                if seen.insert(parent.clone()) {
                    ordered.push(parent.clone());
                    queue.push_back(parent.clone());
                }
            }
        }
        ordered
    }

    fn methods_of(&self, class: &str) -> Vec<String> {
        self.class_methods.get(class).cloned().unwrap_or_default()
    }

    fn body_statements(&self, method: &str) -> &[Statement] {
        self.nodes.get(method).map(|n| n.statements.as_slice()).unwrap_or(&[])
    }

    fn application_methods(&self) -> Vec<String> {
        self.classes.iter()
            .filter(|c| c.origin == ClassOrigin::Application)
            .flat_map(|c| self.methods_of(&c.name))
            .filter(|m| self.resolve_method(m).is_some_and(|info| info.has_body))
            .collect()
    }

    fn receives_custom_intents(&self, class: &str) -> bool {
        self.intent_filter_activities.contains(class)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallGraphStats {
    pub total_methods: usize,
    pub total_classes: usize,
    pub application_classes: usize,
    pub total_calls: usize,
    pub max_in_degree: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::program_model::ClassRole;

    fn sample_json() -> &'static str {
        r#"{
            "classes": [
                {"name": "android.app.Activity", "origin": "library",
                 "methods": [{"sub_signature": "void onCreate(android.os.Bundle)"}]},
                {"name": "com.example.Main", "superclass": "android.app.Activity",
                 "methods": [
                    {"sub_signature": "void <init>()"},
                    {"sub_signature": "void onCreate(android.os.Bundle)",
                     "statements": [{"op": "invoke", "callee": "<com.example.Main: void load()>"}]},
                    {"sub_signature": "void load()"}
                 ]},
                {"name": "com.example.Main$1", "outer_class": "com.example.Main",
                 "interfaces": ["java.lang.Runnable"],
                 "methods": [{"sub_signature": "void run()"}]}
            ],
            "call_edges": [
                {"caller": "<com.example.Main: void onCreate(android.os.Bundle)>",
                 "callee": "<com.example.Main: void load()>"},
                {"caller": "<com.example.Main: void onCreate(android.os.Bundle)>",
                 "callee": "<com.example.Main: void load()>"}
            ],
            "intent_filter_activities": ["com.example.Main"]
        }"#
    }

    #[test]
    fn test_load_snapshot_and_query() {
        let graph = CallGraph::from_json(sample_json()).unwrap();

        assert_eq!(graph.method_count(), 5);
        assert!(graph.has_method("<com.example.Main: void load()>"));
        assert_eq!(
            graph.callers_of("<com.example.Main: void load()>"),
            vec!["<com.example.Main: void onCreate(android.os.Bundle)>".to_string()]
        );
        assert_eq!(graph.body_statements("<com.example.Main: void onCreate(android.os.Bundle)>").len(), 1);
        assert!(graph.receives_custom_intents("com.example.Main"));
    }

    #[test]
    fn test_hierarchy_queries() {
        let graph = CallGraph::from_json(sample_json()).unwrap();

        assert_eq!(graph.supertypes_of("com.example.Main"), vec!["android.app.Activity".to_string()]);
        assert!(graph.is_subclass_of("com.example.Main", "android.app.Activity"));
        assert!(!graph.is_subclass_of("com.example.Main", "com.example.Main"));
        assert!(graph.has_role("com.example.Main", ClassRole::Activity));
        assert!(graph.has_role("com.example.Main$1", ClassRole::AsyncOrRunnable));
        assert_eq!(graph.outermost_class("com.example.Main$1"), "com.example.Main");
        assert_eq!(
            graph.declared_method("android.app.Activity", "void onCreate(android.os.Bundle)"),
            Some("<android.app.Activity: void onCreate(android.os.Bundle)>".to_string())
        );
        assert_eq!(graph.constructors_of("com.example.Main"), vec!["<com.example.Main: void <init>()>".to_string()]);
    }

    #[test]
    fn test_application_methods_skip_library_bodies() {
        let graph = CallGraph::from_json(sample_json()).unwrap();
        let methods = graph.application_methods();

        assert_eq!(methods.len(), 4);
        assert!(!methods.iter().any(|m| m.starts_with("<android.")));
    }

    #[test]
    fn test_duplicate_class_is_rejected() {
        let json = r#"{"classes": [{"name": "a.B"}, {"name": "a.B"}]}"#;
        assert!(CallGraph::from_json(json).is_err());
    }
}
