// src/core/call_graph/reachability.rs
//! Cheap pre-check that tells whether a method can be entered at all.

use std::collections::BTreeSet;
use tracing::debug;

use super::super::signature::MethodSignature;
use super::framework_edges::FrameworkEdgeSynthesizer;
use super::program_model::{AnalysisScope, ProgramModel};

/// A method and every supertype declaration of the same sub-signature
pub fn virtual_siblings(program: &dyn ProgramModel, method: &str) -> Vec<String> {
    let mut siblings = vec![method.to_string()];
    let Ok(signature) = MethodSignature::parse(method) else {
        return siblings;
    };
    let sub_signature = signature.sub_signature();

    for supertype in program.supertypes_of(&signature.class_name) {
        if let Some(declared) = program.declared_method(&supertype, &sub_signature) {
            if !siblings.contains(&declared) {
                siblings.push(declared);
            }
        }
    }
    siblings
}

/// Decides reachability from library dispatch, raw callers or synthesized callers
pub struct ReachabilityOracle<'a> {
    program: &'a dyn ProgramModel,
    scope: &'a AnalysisScope,
    synthesizer: &'a FrameworkEdgeSynthesizer,
}

impl<'a> ReachabilityOracle<'a> {
    pub fn new(
        program: &'a dyn ProgramModel,
        scope: &'a AnalysisScope,
        synthesizer: &'a FrameworkEdgeSynthesizer,
    ) -> Self {
        Self { program, scope, synthesizer }
    }

    /// True when `method` overrides library code, has a caller outside its own
    /// override family, or has a synthesized caller. Records it in `unreachable` otherwise.
    pub fn is_reachable(&self, method: &str, unreachable: &mut BTreeSet<String>) -> bool {
        let siblings = virtual_siblings(self.program, method);

        for sibling in &siblings {
            let Ok(signature) = MethodSignature::parse(sibling) else { continue };
            if self.scope.is_library(self.program, &signature.class_name) {
                return true;
            }
            if self.program.callers_of(sibling).iter().any(|c| !siblings.contains(c)) {
                return true;
            }
            if self.synthesizer.has_candidates(self.program, sibling) {
                return true;
            }
        }

        debug!("No way into {}", method);
        unreachable.insert(method.to_string());
        false
    }
}
