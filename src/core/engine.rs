// src/core/engine.rs
use std::path::{Path, PathBuf};
use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::sync::oneshot;
use tracing::{info, warn, debug};

use crate::config::{Config, MissingChangesPolicy};
use super::change_set::ChangeSet;
use super::signature::{translate_low_level_signature, MethodSignature};
use super::{CallGraph, GuiModel, ImpactAnalysisResult, ImpactEngine, ProgramModel, ResolverOptions};

const CONFIG_FILE_NAME: &str = "ImpactTrace.toml";

/// Inputs of one `analyze` run
#[derive(Debug, Clone)]
pub struct AnalyzeRequest {
    /// Serialized program snapshot (classes, methods, call edges)
    pub program: PathBuf,
    /// Serialized GUI event bindings
    pub gui: PathBuf,
    /// App diff file; the configured policy applies when absent
    pub changes: Option<PathBuf>,
    /// Overrides `output.dir`
    pub output: Option<PathBuf>,
    /// Overrides `project.app_package`
    pub app_package: Option<String>,
}

/// Main orchestration engine for impact-trace
pub struct Engine {
    config: Config,
}

impl Engine {
    /// Create a new engine instance
    pub async fn new(config_path: Option<&Path>) -> Result<Self> {
        let config = Config::load_or_default(config_path)?;

        debug!("Loaded configuration: {:?}", config);

        Ok(Self { config })
    }

    pub fn with_config(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Write a default configuration file
    pub async fn init(&self, path: Option<PathBuf>, force: bool) -> Result<PathBuf> {
        let dir = path.unwrap_or_else(|| PathBuf::from("."));
        tokio::fs::create_dir_all(&dir).await
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        let config_path = dir.join(CONFIG_FILE_NAME);
        if config_path.exists() && !force {
            warn!("⚠️ {} already exists, use --force to overwrite", config_path.display());
            return Ok(config_path);
        }

        self.config.save(&config_path)?;
        info!("✅ Wrote configuration to {}", config_path.display());
        Ok(config_path)
    }

    /// Translate low-level signatures, one result per entry
    pub fn translate(&self, signatures: &[String]) -> Vec<std::result::Result<String, String>> {
        signatures
            .iter()
            .map(|raw| translate_low_level_signature(raw).map_err(|e| e.to_string()))
            .collect()
    }

    /// Run a complete analysis and write the report
    pub async fn analyze(&self, request: AnalyzeRequest) -> Result<(ImpactAnalysisResult, PathBuf)> {
        info!("🔍 Loading analysis inputs...");
        info!("Program: {}", request.program.display());
        info!("GUI model: {}", request.gui.display());

        let program_json = tokio::fs::read_to_string(&request.program).await
            .with_context(|| format!("Failed to read program snapshot {}", request.program.display()))?;
        let gui_json = tokio::fs::read_to_string(&request.gui).await
            .with_context(|| format!("Failed to read GUI model {}", request.gui.display()))?;
        let changes_json = match &request.changes {
            Some(path) => Some(
                tokio::fs::read_to_string(path).await
                    .with_context(|| format!("Failed to read change set {}", path.display()))?,
            ),
            None => None,
        };

        let input_digest = digest_inputs(&[Some(&program_json), Some(&gui_json), changes_json.as_ref()]);

        let program = CallGraph::from_json(&program_json)
            .map_err(|e| anyhow::anyhow!("Invalid program snapshot: {}", e))?;
        let gui = GuiModel::from_json(&gui_json)
            .map_err(|e| anyhow::anyhow!("Invalid GUI model: {}", e))?;
        info!("Loaded {} methods and {} event bindings", program.method_count(), gui.binding_count());

        let app_package = request.app_package.clone().or_else(|| self.config.project.app_package.clone());
        let changed = self.changed_methods(&program, changes_json.as_deref(), app_package.as_deref())?;
        info!("{} changed methods to analyse", changed.len());

        let analysis = &self.config.analysis;
        let engine = ImpactEngine::new(
            analysis.scope(),
            analysis.execute_like_methods.clone(),
            ResolverOptions { trace_method: analysis.trace_method.clone() },
        );
        let output_dir = request.output.clone().unwrap_or_else(|| self.config.output.dir.clone());
        let file_name = self.config.output.file_name.clone();
        let pretty = self.config.output.pretty;
        let stack_size = analysis.stack_size_bytes()
            .ok_or_else(|| anyhow::anyhow!("analysis.stack_size_mb is too large: {}", analysis.stack_size_mb))?;

        // Deep call chains recurse far; run on a thread with a large stack
        let (tx, rx) = oneshot::channel();
        std::thread::Builder::new()
            .name("impact-resolver".to_string())
            .stack_size(stack_size)
            .spawn(move || {
                let outcome = engine
                    .analyze(&program, &gui, &changed, input_digest)
                    .and_then(|result| {
                        let path = engine.write_report(&result, &output_dir, &file_name, pretty)?;
                        Ok((result, path))
                    });
                let _ = tx.send(outcome);
            })
            .context("Failed to start resolver thread")?;

        let (result, path) = rx.await
            .context("Resolver thread terminated unexpectedly")?
            .map_err(|e| anyhow::anyhow!("Impact analysis failed: {}", e))?;

        result.stats.log();
        Ok((result, path))
    }

    fn changed_methods(
        &self,
        program: &CallGraph,
        changes_json: Option<&str>,
        app_package: Option<&str>,
    ) -> Result<Vec<String>> {
        if let Some(json) = changes_json {
            let change_set = ChangeSet::from_json(json)
                .map_err(|e| anyhow::anyhow!("Invalid change set: {}", e))?;
            let translated = change_set.translate(self.config.analysis.include_added_methods, app_package);
            if !translated.rejected.is_empty() {
                warn!("⚠️ {} change entries could not be translated", translated.rejected.len());
            }
            return Ok(translated.methods);
        }

        match self.config.analysis.missing_changes {
            MissingChangesPolicy::AllApplicationMethods => {
                info!("No change set given, analysing every application method");
                let mut methods: Vec<String> = program
                    .application_methods()
                    .into_iter()
                    .filter(|m| match app_package {
                        Some(package) => MethodSignature::parse(m)
                            .is_ok_and(|s| s.class_name.starts_with(package)),
                        None => true,
                    })
                    .collect();
                methods.sort();
                Ok(methods)
            }
            MissingChangesPolicy::Skip => {
                warn!("⚠️ No change set given, nothing to analyse");
                Ok(Vec::new())
            }
        }
    }
}

/// Hex SHA-256 over the concatenated inputs, absent inputs skipped
fn digest_inputs(inputs: &[Option<&String>]) -> String {
    let mut hasher = Sha256::new();
    for input in inputs.iter().flatten() {
        hasher.update(input.as_bytes());
        hasher.update([0u8]);
    }
    format!("{:x}", hasher.finalize())
}
