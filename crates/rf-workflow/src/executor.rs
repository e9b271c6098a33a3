//! The [`StepExecutor`] trait defines the seam to the external work a step
//! performs (text generation, speech synthesis, encoding, ...).
//!
//! Executors are registered by step name at startup and resolved explicitly;
//! a step with no registered executor is a hard error, never a silent
//! substitute. Payloads pass through as opaque JSON values.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use rf_core::{Error, ProjectId, Result};

use crate::catalog::StepDefinition;

/// Performs the actual work of one pipeline step.
///
/// Implementations wrap a provider API or an encoding tool. The workflow
/// core never inspects the payloads; it records them verbatim.
#[async_trait]
pub trait StepExecutor: Send + Sync {
    /// Execute the step for one project, consuming the input payload and
    /// producing the output payload recorded on completion.
    async fn execute(
        &self,
        project_id: ProjectId,
        input: serde_json::Value,
    ) -> Result<serde_json::Value>;
}

/// Maps step names to their executor instances, resolved at startup.
#[derive(Default, Clone)]
pub struct ExecutorRegistry {
    executors: HashMap<String, Arc<dyn StepExecutor>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an executor for a step name, replacing any previous one.
    pub fn register(&mut self, step_name: impl Into<String>, executor: Arc<dyn StepExecutor>) {
        self.executors.insert(step_name.into(), executor);
    }

    /// Resolve the executor for a step name.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownStep`] if no executor is registered under that name.
    pub fn get(&self, step_name: &str) -> Result<Arc<dyn StepExecutor>> {
        self.executors
            .get(step_name)
            .cloned()
            .ok_or_else(|| Error::UnknownStep(step_name.to_string()))
    }

    /// Verify every step of a plan has a registered executor.
    ///
    /// Called before execution begins so a missing executor fails fast
    /// instead of aborting mid-pipeline.
    pub fn verify_plan(&self, plan: &[StepDefinition]) -> Result<()> {
        for def in plan {
            if !self.executors.contains_key(def.step_name) {
                return Err(Error::UnknownStep(def.step_name.to_string()));
            }
        }
        Ok(())
    }
}
