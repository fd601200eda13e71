// src/core/call_graph/framework_edges.rs
//! Synthetic caller candidates for methods the platform invokes on the app's
//! behalf: async tasks and runnables, fragment lifecycle delegation and
//! reflective service start-up.

use std::collections::HashMap;
use serde::{Serialize, Deserialize};
use tracing::{debug, info};

use super::super::signature::{class_literal_name, MethodSignature};
use super::program_model::{AnalysisScope, ArgKind, ClassRole, MethodInfo, ProgramModel, Statement};

pub const ACTIVITY_ON_CREATE: &str = "void onCreate(android.os.Bundle)";
pub const ACTIVITY_ON_START: &str = "void onStart()";
pub const ON_ACTIVITY_RESULT: &str = "void onActivityResult(int,int,android.content.Intent)";
pub const ON_PAUSE: &str = "void onPause()";
pub const ON_STOP: &str = "void onStop()";
pub const ON_OPTIONS_ITEM_SELECTED: &str = "boolean onOptionsItemSelected(android.view.MenuItem)";
pub const FRAGMENT_ON_ATTACH: &str = "void onAttach(android.content.Context)";
pub const FRAGMENT_ON_CREATE_VIEW: &str =
    "android.view.View onCreateView(android.view.LayoutInflater,android.view.ViewGroup,android.os.Bundle)";
pub const FRAGMENT_ON_ACTIVITY_CREATED: &str = "void onActivityCreated(android.os.Bundle)";

const GET_CLASS_SUB_SIGNATURE: &str = "java.lang.Class getClass()";
const OBJECT_GET_CLASS: &str = "<java.lang.Object: java.lang.Class getClass()>";
const FRAGMENT_ATTACH_OPERATIONS: &[&str] = &["add", "replace"];
const FRAGMENT_TRANSACTION_SUFFIX: &str = "FragmentTransaction";

/// Fragment lifecycle callback -> Activity lifecycle methods that drive it
const FRAGMENT_LIFECYCLE_DRIVERS: &[(&str, &[&str])] = &[
    (FRAGMENT_ON_ATTACH, &[ACTIVITY_ON_CREATE, ACTIVITY_ON_START]),
    (FRAGMENT_ON_CREATE_VIEW, &[ACTIVITY_ON_CREATE, ACTIVITY_ON_START]),
    (FRAGMENT_ON_ACTIVITY_CREATED, &[ACTIVITY_ON_CREATE, ACTIVITY_ON_START]),
    (ACTIVITY_ON_CREATE, &[ACTIVITY_ON_CREATE, ACTIVITY_ON_START]),
    (ACTIVITY_ON_START, &[ACTIVITY_ON_CREATE, ACTIVITY_ON_START]),
    (ON_ACTIVITY_RESULT, &[ON_ACTIVITY_RESULT]),
    (ON_PAUSE, &[ON_PAUSE]),
    (ON_STOP, &[ON_STOP]),
    (ON_OPTIONS_ITEM_SELECTED, &[ON_OPTIONS_ITEM_SELECTED]),
];

/// Which heuristic produced a synthetic edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeRule {
    AsyncExecute,
    FragmentLifecycle,
    ServiceReflection,
}

/// A caller the raw call graph does not show
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntheticCaller {
    pub method: String,
    pub rule: EdgeRule,
    /// The caller is an Activity lifecycle method and becomes the fallback anchor
    pub anchors_lifecycle: bool,
}

/// Activity method that attaches a fragment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachSite {
    pub activity: String,
    pub site: String,
}

/// Lookup tables collected by one scan over every application method body
#[derive(Debug, Clone, Default)]
pub struct FrameworkTables {
    /// Async/runnable class -> methods handing an instance to an execute-like operation
    pub execute_sites: HashMap<String, Vec<String>>,
    /// Fragment class -> activities attaching it
    pub attach_sites: HashMap<String, Vec<AttachSite>>,
    /// Class -> methods referencing it as a class literal
    pub class_constant_refs: HashMap<String, Vec<String>>,
}

impl FrameworkTables {
    /// Scan all application bodies once
    pub fn build(program: &dyn ProgramModel, execute_like: &[String]) -> Self {
        let mut tables = Self::default();

        for method in program.application_methods() {
            tables.scan_method(program, &method, execute_like);
        }

        info!(
            "Framework tables: {} async classes, {} attached fragments, {} class constants",
            tables.execute_sites.len(),
            tables.attach_sites.len(),
            tables.class_constant_refs.len()
        );
        tables
    }

    fn scan_method(&mut self, program: &dyn ProgramModel, method: &str, execute_like: &[String]) {
        // Allocation facts are local to one body
        let mut async_locals: HashMap<&str, &str> = HashMap::new();
        let mut fragment_locals: HashMap<&str, &str> = HashMap::new();

        for statement in program.body_statements(method) {
            match statement {
                Statement::Alloc { local, class } => {
                    if program.has_role(class, ClassRole::AsyncOrRunnable) {
                        async_locals.insert(local.as_str(), class.as_str());
                    }
                    if program.has_role(class, ClassRole::Fragment) {
                        fragment_locals.insert(local.as_str(), class.as_str());
                    }
                }
                Statement::ClassConstant { literal, .. } => {
                    self.register_class_constant(literal, method);
                }
                Statement::Invoke { callee, receiver, args, .. } => {
                    for arg in args {
                        if let ArgKind::ClassConstant { literal } = arg {
                            self.register_class_constant(literal, method);
                        }
                    }

                    let Ok(callee) = MethodSignature::parse(callee) else {
                        continue;
                    };

                    let executes = execute_like.iter().any(|name| *name == callee.method_name);
                    if executes {
                        if let Some(class) = receiver.as_ref().and_then(|r| async_locals.get(r.local.as_str())) {
                            push_unique(self.execute_sites.entry(class.to_string()).or_default(), method);
                        }
                    }
                    if executes || callee.is_constructor() {
                        // runnables handed to an executor, handler or thread wrapper
                        for arg in args {
                            if let ArgKind::Local { name, .. } = arg {
                                if let Some(class) = async_locals.get(name.as_str()) {
                                    push_unique(self.execute_sites.entry(class.to_string()).or_default(), method);
                                }
                            }
                        }
                    }

                    if is_fragment_attach(&callee) {
                        self.register_attach_site(program, method, args, &fragment_locals);
                    }
                }
                Statement::FieldRef { .. } => {}
            }
        }
    }

    fn register_attach_site(
        &mut self,
        program: &dyn ProgramModel,
        method: &str,
        args: &[ArgKind],
        fragment_locals: &HashMap<&str, &str>,
    ) {
        let Ok(site) = MethodSignature::parse(method) else { return };
        let owner = program.outermost_class(&site.class_name);
        if !program.has_role(&owner, ClassRole::Activity) {
            debug!("Fragment attached outside an activity at {}", method);
            return;
        }

        for arg in args {
            let ArgKind::Local { name, class } = arg else { continue };
            let fragment = fragment_locals
                .get(name.as_str())
                .map(|c| c.to_string())
                .or_else(|| class.clone().filter(|c| program.has_role(c, ClassRole::Fragment)));
            if let Some(fragment) = fragment {
                let attach = AttachSite { activity: owner.clone(), site: method.to_string() };
                let sites = self.attach_sites.entry(fragment).or_default();
                if !sites.contains(&attach) {
                    sites.push(attach);
                }
            }
        }
    }

    fn register_class_constant(&mut self, literal: &str, method: &str) {
        if let Some(class) = class_literal_name(literal) {
            push_unique(self.class_constant_refs.entry(class).or_default(), method);
        }
    }
}

fn is_fragment_attach(callee: &MethodSignature) -> bool {
    FRAGMENT_ATTACH_OPERATIONS.contains(&callee.method_name.as_str())
        && callee.class_name.ends_with(FRAGMENT_TRANSACTION_SUFFIX)
}

fn push_unique(list: &mut Vec<String>, method: &str) {
    if !list.iter().any(|m| m == method) {
        list.push(method.to_string());
    }
}

/// One heuristic source of synthetic callers
pub trait SynthesisRule {
    fn name(&self) -> &'static str;

    fn synthesize(&self, program: &dyn ProgramModel, method: &MethodInfo) -> Vec<SyntheticCaller>;
}

/// `run()` / `doInBackground()` of a task is reached through whoever executes it
pub struct AsyncExecuteRule {
    execute_sites: HashMap<String, Vec<String>>,
}

impl SynthesisRule for AsyncExecuteRule {
    fn name(&self) -> &'static str {
        "async-execute"
    }

    fn synthesize(&self, program: &dyn ProgramModel, method: &MethodInfo) -> Vec<SyntheticCaller> {
        let class = method.declaring_class();
        if !program.has_role(class, ClassRole::AsyncOrRunnable) {
            return Vec::new();
        }

        // sites allocating the class itself or one of its subclasses
        let mut allocated: Vec<&String> = self.execute_sites.keys()
            .filter(|allocated| allocated.as_str() == class || program.is_subclass_of(allocated, class))
            .collect();
        allocated.sort();

        allocated.into_iter()
            .flat_map(|c| self.execute_sites[c].iter())
            .map(|site| SyntheticCaller {
                method: site.clone(),
                rule: EdgeRule::AsyncExecute,
                anchors_lifecycle: false,
            })
            .collect()
    }
}

/// Fragment lifecycle callbacks run when the hosting Activity runs its own
pub struct FragmentLifecycleRule {
    attach_sites: HashMap<String, Vec<AttachSite>>,
}

impl SynthesisRule for FragmentLifecycleRule {
    fn name(&self) -> &'static str {
        "fragment-lifecycle"
    }

    fn synthesize(&self, program: &dyn ProgramModel, method: &MethodInfo) -> Vec<SyntheticCaller> {
        let class = method.declaring_class();
        if !program.has_role(class, ClassRole::Fragment) {
            return Vec::new();
        }
        let sub_signature = method.sub_signature();
        let Some((_, drivers)) = FRAGMENT_LIFECYCLE_DRIVERS.iter().find(|(s, _)| *s == sub_signature) else {
            return Vec::new();
        };
        let Some(sites) = self.attach_sites.get(class) else {
            return Vec::new();
        };

        let mut callers = Vec::new();
        for site in sites {
            for driver in drivers.iter() {
                if let Some(activity_method) = program.declared_method(&site.activity, driver) {
                    callers.push(SyntheticCaller {
                        method: activity_method,
                        rule: EdgeRule::FragmentLifecycle,
                        anchors_lifecycle: program.has_role(&site.activity, ClassRole::Activity),
                    });
                }
            }
        }
        callers
    }
}

/// Services are started reflectively through `getClass()` or `Foo.class` intents
pub struct ServiceReflectionRule {
    class_constant_refs: HashMap<String, Vec<String>>,
    scope: AnalysisScope,
}

impl ServiceReflectionRule {
    fn get_class_method(program: &dyn ProgramModel, class: &str) -> String {
        std::iter::once(class.to_string())
            .chain(program.supertypes_of(class))
            .find_map(|c| program.declared_method(&c, GET_CLASS_SUB_SIGNATURE))
            .unwrap_or_else(|| OBJECT_GET_CLASS.to_string())
    }

    fn get_class_sites(&self, program: &dyn ProgramModel, class: &str) -> Vec<String> {
        let get_class = Self::get_class_method(program, class);
        let mut sites = Vec::new();

        for caller in program.callers_of(&get_class) {
            let Ok(signature) = MethodSignature::parse(&caller) else { continue };
            if self.scope.is_library(program, &signature.class_name) {
                continue;
            }
            let on_service = program.body_statements(&caller).iter().any(|statement| match statement {
                Statement::Invoke { callee, receiver: Some(receiver), .. } => {
                    *callee == get_class && receiver.class.as_deref() == Some(class)
                }
                _ => false,
            });
            if on_service {
                push_unique(&mut sites, &caller);
            }
        }
        sites
    }
}

impl SynthesisRule for ServiceReflectionRule {
    fn name(&self) -> &'static str {
        "service-reflection"
    }

    fn synthesize(&self, program: &dyn ProgramModel, method: &MethodInfo) -> Vec<SyntheticCaller> {
        let class = method.declaring_class();
        if !program.has_role(class, ClassRole::Service) {
            return Vec::new();
        }

        let mut sites = self.get_class_sites(program, class);
        for site in self.class_constant_refs.get(class).into_iter().flatten() {
            push_unique(&mut sites, site);
        }

        sites.into_iter()
            .map(|site| SyntheticCaller {
                method: site,
                rule: EdgeRule::ServiceReflection,
                anchors_lifecycle: false,
            })
            .collect()
    }
}

/// Broadcast receivers are recognised but their registration is not traced
pub struct BroadcastReceiverRule;

impl SynthesisRule for BroadcastReceiverRule {
    fn name(&self) -> &'static str {
        "broadcast-receiver"
    }

    fn synthesize(&self, program: &dyn ProgramModel, method: &MethodInfo) -> Vec<SyntheticCaller> {
        if program.has_role(method.declaring_class(), ClassRole::BroadcastReceiver) {
            debug!("No synthetic caller for broadcast receiver method {}", method.id);
        }
        Vec::new()
    }
}

/// Sizes of the pre-pass tables, for run statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SynthesisStats {
    pub async_classes: usize,
    pub execute_sites: usize,
    pub attached_fragments: usize,
    pub class_constants: usize,
}

/// Produces caller candidates hidden behind platform dispatch
pub struct FrameworkEdgeSynthesizer {
    rules: Vec<Box<dyn SynthesisRule>>,
    stats: SynthesisStats,
}

impl FrameworkEdgeSynthesizer {
    /// Run the body pre-pass and install the default rule set
    pub fn build(program: &dyn ProgramModel, scope: &AnalysisScope, execute_like: &[String]) -> Self {
        Self::from_tables(FrameworkTables::build(program, execute_like), scope)
    }

    pub fn from_tables(tables: FrameworkTables, scope: &AnalysisScope) -> Self {
        let stats = SynthesisStats {
            async_classes: tables.execute_sites.len(),
            execute_sites: tables.execute_sites.values().map(Vec::len).sum(),
            attached_fragments: tables.attach_sites.len(),
            class_constants: tables.class_constant_refs.len(),
        };

        let rules: Vec<Box<dyn SynthesisRule>> = vec![
            Box::new(AsyncExecuteRule { execute_sites: tables.execute_sites }),
            Box::new(FragmentLifecycleRule { attach_sites: tables.attach_sites }),
            Box::new(ServiceReflectionRule {
                class_constant_refs: tables.class_constant_refs,
                scope: scope.clone(),
            }),
            Box::new(BroadcastReceiverRule),
        ];

        Self { rules, stats }
    }

    /// Synthesizer with an explicit rule list
    pub fn with_rules(rules: Vec<Box<dyn SynthesisRule>>) -> Self {
        Self { rules, stats: SynthesisStats::default() }
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    pub fn stats(&self) -> &SynthesisStats {
        &self.stats
    }

    /// Candidate callers of `method`, deduplicated, never `method` itself
    pub fn synthesize(&self, program: &dyn ProgramModel, method: &str) -> Vec<SyntheticCaller> {
        let Some(info) = program.resolve_method(method) else {
            return Vec::new();
        };

        let mut callers: Vec<SyntheticCaller> = Vec::new();
        for rule in &self.rules {
            for candidate in rule.synthesize(program, info) {
                if candidate.method != method && !callers.iter().any(|c| c.method == candidate.method) {
                    callers.push(candidate);
                }
            }
        }
        callers
    }

    pub fn has_candidates(&self, program: &dyn ProgramModel, method: &str) -> bool {
        !self.synthesize(program, method).is_empty()
    }
}
