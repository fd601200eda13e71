use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::core::AnalysisScope;
use crate::error::{ImpactError, Result};

/// Upper bound for `analysis.stack_size_mb` (16 GiB)
pub const MAX_STACK_SIZE_MB: usize = 16 * 1024;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Project configuration
    pub project: ProjectConfig,

    /// Resolver and synthesis settings
    pub analysis: AnalysisConfig,

    /// Output settings
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Project name
    pub name: String,

    /// Only changed methods of classes under this package prefix are analysed
    pub app_package: Option<String>,
}

/// What to analyse when no change set is given
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MissingChangesPolicy {
    /// Treat every application method as changed
    AllApplicationMethods,
    /// Analyse nothing
    Skip,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Class name prefixes treated as platform or library code
    pub library_prefixes: Vec<String>,

    /// Callers from classes with these prefixes are ignored
    pub excluded_caller_prefixes: Vec<String>,

    /// Method names that hand an async task or runnable to the platform
    pub execute_like_methods: Vec<String>,

    /// Analyse `methodsAdded` as well as `methodsChanged`
    pub include_added_methods: bool,

    pub missing_changes: MissingChangesPolicy,

    /// Stack size of the resolver thread, in MiB
    pub stack_size_mb: usize,

    /// Signature fragment whose searches are logged frame by frame
    pub trace_method: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Report directory
    pub dir: PathBuf,

    /// Report file name
    pub file_name: String,

    /// Pretty-print the JSON report
    pub pretty: bool,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: "Unnamed App".to_string(),
            app_package: None,
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            library_prefixes: vec![
                "android.".to_string(),
                "androidx.".to_string(),
                "java.".to_string(),
                "javax.".to_string(),
            ],
            excluded_caller_prefixes: vec!["com.google.android.gms.internal".to_string()],
            execute_like_methods: [
                "execute",
                "executeOnExecutor",
                "start",
                "run",
                "post",
                "postDelayed",
                "postAtTime",
                "runOnUiThread",
                "submit",
                "schedule",
                "scheduleAtFixedRate",
                "scheduleWithFixedDelay",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            include_added_methods: true,
            missing_changes: MissingChangesPolicy::AllApplicationMethods,
            stack_size_mb: 256,
            trace_method: None,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("impact-output"),
            file_name: "impact-report.json".to_string(),
            pretty: true,
        }
    }
}

impl AnalysisConfig {
    pub fn scope(&self) -> AnalysisScope {
        AnalysisScope::new(self.library_prefixes.clone(), self.excluded_caller_prefixes.clone())
    }

    /// Resolver thread stack in bytes, `None` if it does not fit in `usize`
    pub fn stack_size_bytes(&self) -> Option<usize> {
        self.stack_size_mb.checked_mul(1024 * 1024)
    }
}

impl Config {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| ImpactError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ImpactError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration with fallback to default
    pub fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        match path {
            Some(p) => {
                if p.as_ref().exists() {
                    Self::load(p)
                } else {
                    Ok(Self::default())
                }
            }
            None => {
                // Try common config file locations
                let candidates = [
                    "ImpactTrace.toml",
                    "impact-trace.toml",
                    ".impact-trace.toml",
                ];

                for candidate in &candidates {
                    if Path::new(candidate).exists() {
                        return Self::load(candidate);
                    }
                }

                Ok(Self::default())
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if self.analysis.stack_size_mb == 0 || self.analysis.stack_size_mb > MAX_STACK_SIZE_MB {
            return Err(ImpactError::Config(format!(
                "analysis.stack_size_mb must be between 1 and {}",
                MAX_STACK_SIZE_MB
            )));
        }
        if self.output.file_name.trim().is_empty() {
            return Err(ImpactError::Config("output.file_name must not be empty".to_string()));
        }
        Ok(())
    }
}
