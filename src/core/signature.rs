// src/core/signature.rs
//! Method signatures in the normalized `<Class: Ret name(A,B)>` form, and the
//! translation from low-level bytecode signatures found in app diff files.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{ImpactError, Result};

/// Name used by the bytecode for instance constructors
pub const CONSTRUCTOR_NAME: &str = "<init>";

const PARAM_SEPARATOR: &str = ",";

fn normalized_signature_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^<([^:<>\s]+): (\S+) ([^\s(]+)\(([^)]*)\)>$")
            .expect("Invalid normalized signature regex")
    })
}

/// Parsed form of a normalized method signature
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MethodSignature {
    /// Fully qualified declaring class
    pub class_name: String,
    /// Return type as written in the signature
    pub return_type: String,
    /// Method name (`<init>` for constructors)
    pub method_name: String,
    /// Parameter types in declaration order
    pub params: Vec<String>,
}

impl MethodSignature {
    pub fn new(
        class_name: impl Into<String>,
        return_type: impl Into<String>,
        method_name: impl Into<String>,
        params: Vec<String>,
    ) -> Self {
        Self {
            class_name: class_name.into(),
            return_type: return_type.into(),
            method_name: method_name.into(),
            params,
        }
    }

    /// Parse `<com.example.Foo: void bar(int,java.lang.String)>`
    pub fn parse(signature: &str) -> Result<Self> {
        let caps = normalized_signature_regex()
            .captures(signature.trim())
            .ok_or_else(|| ImpactError::invalid_signature(signature, "expected <Class: Ret name(args)>"))?;

        let params = caps[4]
            .split(PARAM_SEPARATOR)
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Self::new(&caps[1], &caps[2], &caps[3], params))
    }

    /// The hierarchy-comparable part: return type, name and parameters
    pub fn sub_signature(&self) -> String {
        format!("{} {}({})", self.return_type, self.method_name, self.params.join(PARAM_SEPARATOR))
    }

    /// Create the unique string used as a map key throughout the analysis
    pub fn to_unique_string(&self) -> String {
        format!("<{}: {}>", self.class_name, self.sub_signature())
    }

    pub fn is_constructor(&self) -> bool {
        self.method_name == CONSTRUCTOR_NAME
    }

    /// Short name for logs: simple class name and method name
    pub fn display_name(&self) -> String {
        let simple = self.class_name.rsplit('.').next().unwrap_or(&self.class_name);
        format!("{}.{}", simple, self.method_name)
    }
}

impl fmt::Display for MethodSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_unique_string())
    }
}

/// Build a normalized signature string from a class name and a sub-signature
pub fn compose_signature(class_name: &str, sub_signature: &str) -> String {
    format!("<{}: {}>", class_name, sub_signature)
}

/// Translate `pkg.Class.method(argDescriptors)retDescriptor` into the normalized form
/// `<pkg.Class: Ret method(A,B)>`.
///
/// Primitive codes `I,B,D,S,J,F,C,Z,V` map to Java keywords, `Lpkg/Type;` maps to
/// `pkg.Type` and every leading `[` appends one `[]` to the following type.
pub fn translate_low_level_signature(signature: &str) -> Result<String> {
    let signature = signature.trim();
    let open = signature
        .find('(')
        .ok_or_else(|| ImpactError::invalid_signature(signature, "missing '('"))?;
    let close = signature[open..]
        .find(')')
        .map(|i| open + i)
        .ok_or_else(|| ImpactError::invalid_signature(signature, "missing ')'"))?;

    let qualified_name = &signature[..open];
    let dot = qualified_name
        .rfind('.')
        .ok_or_else(|| ImpactError::invalid_signature(signature, "method name is not class-qualified"))?;
    let class_name = &qualified_name[..dot];
    let method_name = &qualified_name[dot + 1..];
    if class_name.is_empty() || method_name.is_empty() {
        return Err(ImpactError::invalid_signature(signature, "empty class or method name"));
    }

    let params = translate_descriptors(&signature[open + 1..close])
        .map_err(|reason| ImpactError::invalid_signature(signature, reason))?;
    let returns = translate_descriptors(&signature[close + 1..])
        .map_err(|reason| ImpactError::invalid_signature(signature, reason))?;
    if returns.len() != 1 {
        return Err(ImpactError::invalid_signature(signature, "expected exactly one return type"));
    }

    Ok(MethodSignature::new(class_name, returns[0].clone(), method_name, params).to_unique_string())
}

/// Decode a run of type descriptors into Java type names
fn translate_descriptors(descriptors: &str) -> std::result::Result<Vec<String>, String> {
    let mut types = Vec::new();
    let mut dimensions = 0usize;
    let mut chars = descriptors.char_indices();

    while let Some((i, c)) = chars.next() {
        let base = match c {
            '[' => {
                dimensions += 1;
                continue;
            }
            'L' => {
                let end = descriptors[i..]
                    .find(';')
                    .map(|e| i + e)
                    .ok_or_else(|| format!("unterminated object type at offset {}", i))?;
                let name = descriptors[i + 1..end].replace('/', ".");
                // skip past the ';'
                while let Some((j, _)) = chars.next() {
                    if j == end {
                        break;
                    }
                }
                name
            }
            other => primitive_name(other)
                .ok_or_else(|| format!("unknown bytecode type '{}'", other))?
                .to_string(),
        };
        types.push(format!("{}{}", base, "[]".repeat(dimensions)));
        dimensions = 0;
    }

    if dimensions > 0 {
        return Err("array prefix without element type".to_string());
    }
    Ok(types)
}

fn primitive_name(code: char) -> Option<&'static str> {
    match code {
        'I' => Some("int"),
        'B' => Some("byte"),
        'D' => Some("double"),
        'S' => Some("short"),
        'J' => Some("long"),
        'F' => Some("float"),
        'C' => Some("char"),
        'Z' => Some("boolean"),
        'V' => Some("void"),
        _ => None,
    }
}

/// Class name referenced by a class literal such as `Lcom/example/Foo;` or
/// `com/example/Foo`. Array literals name no class and yield `None`.
pub fn class_literal_name(literal: &str) -> Option<String> {
    let dotted = literal.trim().replace('/', ".");
    if dotted.is_empty() || dotted.starts_with('[') {
        return None;
    }
    let name = match dotted.strip_prefix('L').and_then(|s| s.strip_suffix(';')) {
        Some(inner) => inner.to_string(),
        None => dotted,
    };
    Some(name)
}
