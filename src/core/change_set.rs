// src/core/change_set.rs
//! App diff files listing the methods changed between two builds.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ImpactError, Result};
use super::signature::{translate_low_level_signature, MethodSignature};

/// `{"methodsChanged": [...], "methodsAdded": [...]}` with low-level signatures
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeSet {
    #[serde(default)]
    pub methods_changed: Vec<String>,
    #[serde(default)]
    pub methods_added: Vec<String>,
}

/// Normalized changed methods plus the entries that could not be translated
#[derive(Debug, Default)]
pub struct TranslatedChanges {
    pub methods: Vec<String>,
    pub rejected: Vec<ImpactError>,
}

impl ChangeSet {
    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Translate entries into normalized signatures, keeping those whose declaring
    /// class starts with `app_package`. Duplicates are dropped.
    pub fn translate(&self, include_added: bool, app_package: Option<&str>) -> TranslatedChanges {
        let mut translated = TranslatedChanges::default();

        let added: &[String] = if include_added { &self.methods_added } else { &[] };
        for raw in self.methods_changed.iter().chain(added) {
            let signature = match translate_low_level_signature(raw) {
                Ok(signature) => signature,
                Err(e) => {
                    warn!("Skipping changed method: {}", e);
                    translated.rejected.push(e);
                    continue;
                }
            };

            if let Some(package) = app_package {
                let in_package = MethodSignature::parse(&signature)
                    .is_ok_and(|s| s.class_name.starts_with(package));
                if !in_package {
                    continue;
                }
            }

            if !translated.methods.contains(&signature) {
                translated.methods.push(signature);
            }
        }
        translated
    }
}
