// src/core/call_graph/program_model.rs
//! Read-only view of the analysed program: methods, classes, hierarchy, call
//! edges and simplified statement records.

use serde::{Deserialize, Serialize};

use super::super::signature::{compose_signature, MethodSignature};

/// Where a class comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClassOrigin {
    /// Compiled from the application under analysis
    Application,
    /// Platform, JDK or third-party code
    Library,
}

/// Framework role of a class, derived from its supertypes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClassRole {
    Activity,
    Fragment,
    Dialog,
    Application,
    Service,
    AsyncOrRunnable,
    BroadcastReceiver,
    View,
}

impl ClassRole {
    pub const ALL: [ClassRole; 8] = [
        ClassRole::Activity,
        ClassRole::Fragment,
        ClassRole::Dialog,
        ClassRole::Application,
        ClassRole::Service,
        ClassRole::AsyncOrRunnable,
        ClassRole::BroadcastReceiver,
        ClassRole::View,
    ];

    /// Framework classes whose subclasses take this role
    pub fn framework_roots(self) -> &'static [&'static str] {
        match self {
            ClassRole::Activity => &["android.app.Activity"],
            ClassRole::Fragment => &[
                "android.app.Fragment",
                "android.support.v4.app.Fragment",
                "androidx.fragment.app.Fragment",
            ],
            ClassRole::Dialog => &["android.app.Dialog"],
            ClassRole::Application => &["android.app.Application"],
            ClassRole::Service => &["android.app.Service"],
            ClassRole::AsyncOrRunnable => &["android.os.AsyncTask", "java.lang.Runnable"],
            ClassRole::BroadcastReceiver => &["android.content.BroadcastReceiver"],
            ClassRole::View => &["android.view.View"],
        }
    }

    /// Roles whose instances the platform creates and drives as top-level GUI hosts
    pub fn is_gui_host(self) -> bool {
        match self {
            ClassRole::Activity | ClassRole::Fragment | ClassRole::Dialog | ClassRole::Application => true,
            ClassRole::Service
            | ClassRole::AsyncOrRunnable
            | ClassRole::BroadcastReceiver
            | ClassRole::View => false,
        }
    }
}

/// Kind of a local or constant passed to an invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ArgKind {
    /// A local variable, with its static type when known
    Local {
        name: String,
        #[serde(default)]
        class: Option<String>,
    },
    /// A class literal such as `Foo.class`
    ClassConstant { literal: String },
    /// Any other constant (numbers, strings, null)
    Constant,
}

/// Receiver of an instance invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receiver {
    pub local: String,
    /// Static type of the receiver local
    #[serde(default)]
    pub class: Option<String>,
}

/// Simplified per-instruction fact extracted from a method body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum Statement {
    FieldRef {
        field: String,
    },
    Invoke {
        callee: String,
        #[serde(default)]
        receiver: Option<Receiver>,
        #[serde(default)]
        args: Vec<ArgKind>,
        /// Local receiving the call result, if any
        #[serde(default)]
        result: Option<String>,
    },
    Alloc {
        local: String,
        class: String,
    },
    ClassConstant {
        #[serde(default)]
        local: Option<String>,
        literal: String,
    },
}

/// Method attributes exposed by the program model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodInfo {
    pub id: String,
    pub signature: MethodSignature,
    pub is_static: bool,
    pub has_body: bool,
}

impl MethodInfo {
    pub fn declaring_class(&self) -> &str {
        &self.signature.class_name
    }

    pub fn sub_signature(&self) -> String {
        self.signature.sub_signature()
    }

    pub fn is_constructor(&self) -> bool {
        self.signature.is_constructor()
    }
}

/// Class attributes exposed by the program model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassInfo {
    pub name: String,
    pub superclass: Option<String>,
    pub interfaces: Vec<String>,
    pub outer_class: Option<String>,
    pub origin: ClassOrigin,
}

/// Queries the analysis needs from the host program-analysis engine.
///
/// Every method is addressed by its normalized signature string.
pub trait ProgramModel {
    fn has_method(&self, signature: &str) -> bool {
        self.resolve_method(signature).is_some()
    }

    fn resolve_method(&self, signature: &str) -> Option<&MethodInfo>;

    /// Methods with a call edge into `method`
    fn callers_of(&self, method: &str) -> Vec<String>;

    fn class(&self, name: &str) -> Option<&ClassInfo>;

    /// Transitive supertypes in breadth-first order, excluding `class` itself
    fn supertypes_of(&self, class: &str) -> Vec<String>;

    /// Signatures of every method declared by `class`
    fn methods_of(&self, class: &str) -> Vec<String>;

    fn body_statements(&self, method: &str) -> &[Statement];

    /// Every method declared by an application class that has a body
    fn application_methods(&self) -> Vec<String>;

    /// Classes registered with intent filters beyond the launcher default
    fn receives_custom_intents(&self, class: &str) -> bool;

    fn declared_method(&self, class: &str, sub_signature: &str) -> Option<String> {
        let signature = compose_signature(class, sub_signature);
        self.has_method(&signature).then_some(signature)
    }

    fn constructors_of(&self, class: &str) -> Vec<String> {
        self.methods_of(class)
            .into_iter()
            .filter(|m| self.resolve_method(m).is_some_and(MethodInfo::is_constructor))
            .collect()
    }

    /// Proper subclass test (a class is not a subclass of itself)
    fn is_subclass_of(&self, class: &str, ancestor: &str) -> bool {
        class != ancestor && self.supertypes_of(class).iter().any(|s| s == ancestor)
    }

    fn has_role(&self, class: &str, role: ClassRole) -> bool {
        let roots = role.framework_roots();
        roots.contains(&class) || self.supertypes_of(class).iter().any(|s| roots.contains(&s.as_str()))
    }

    /// Follow outer-class links to the top-level class
    fn outermost_class(&self, class: &str) -> String {
        let mut current = class.to_string();
        let mut hops = 0;
        while let Some(outer) = self.class(&current).and_then(|c| c.outer_class.clone()) {
            hops += 1;
            if hops > 64 {
                break;
            }
            current = outer;
        }
        current
    }
}

/// Which classes count as library code and which callers are ignored
#[derive(Debug, Clone)]
pub struct AnalysisScope {
    library_prefixes: Vec<String>,
    excluded_caller_prefixes: Vec<String>,
}

impl AnalysisScope {
    pub fn new(library_prefixes: Vec<String>, excluded_caller_prefixes: Vec<String>) -> Self {
        Self {
            library_prefixes,
            excluded_caller_prefixes,
        }
    }

    /// Library, platform or unknown class
    pub fn is_library(&self, program: &dyn ProgramModel, class: &str) -> bool {
        if self.library_prefixes.iter().any(|p| class.starts_with(p.as_str())) {
            return true;
        }
        match program.class(class) {
            Some(info) => info.origin == ClassOrigin::Library,
            None => true,
        }
    }

    /// Generated or obfuscated code whose call sites never lead to app triggers
    pub fn is_excluded_caller(&self, class: &str) -> bool {
        self.excluded_caller_prefixes.iter().any(|p| class.starts_with(p.as_str()))
    }

    /// Application GUI host: Activity, Fragment, Dialog or Application subclass
    pub fn is_gui_class(&self, program: &dyn ProgramModel, class: &str) -> bool {
        !self.is_library(program, class)
            && ClassRole::ALL
                .iter()
                .any(|role| role.is_gui_host() && program.has_role(class, *role))
    }
}

impl Default for AnalysisScope {
    fn default() -> Self {
        Self::new(
            vec!["android.".to_string(), "androidx.".to_string(), "java.".to_string(), "javax.".to_string()],
            vec!["com.google.android.gms.internal".to_string()],
        )
    }
}
