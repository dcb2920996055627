//! Artifact factory boundary.
//!
//! Deciders and job listeners are created by name from an [`ArtifactRef`]
//! and handed back to the factory when the engine is done with them.

use std::collections::HashMap;
use std::ops::Deref;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{EngineError, EngineResult};
use crate::execution::StepExecution;
use crate::model::ArtifactRef;
use crate::properties::Properties;

/// Computes an exit status from the step results preceding a decision.
#[async_trait]
pub trait Decider: Send + Sync {
    /// `preceding` holds the last step execution before the decision, or
    /// one entry per branch when the decision follows a split.
    async fn decide(&self, preceding: &[StepExecution]) -> anyhow::Result<String>;
}

/// Hooks around a job run.
#[async_trait]
pub trait JobListener: Send + Sync {
    async fn before_job(&self) -> anyhow::Result<()>;

    async fn after_job(&self) -> anyhow::Result<()>;
}

/// Creates and releases artifact instances.
pub trait ArtifactFactory: Send + Sync {
    fn create_decider(&self, artifact: &ArtifactRef) -> EngineResult<Box<dyn Decider>>;

    fn create_job_listener(&self, artifact: &ArtifactRef) -> EngineResult<Box<dyn JobListener>>;

    fn destroy_decider(&self, decider: Box<dyn Decider>) {
        drop(decider);
    }

    fn destroy_job_listener(&self, listener: Box<dyn JobListener>) {
        drop(listener);
    }
}

/// Artifacts that can be handed back to their factory.
pub trait Destroy {
    fn destroy(self: Box<Self>, factory: &dyn ArtifactFactory);
}

impl Destroy for dyn Decider {
    fn destroy(self: Box<Self>, factory: &dyn ArtifactFactory) {
        factory.destroy_decider(self);
    }
}

impl Destroy for dyn JobListener {
    fn destroy(self: Box<Self>, factory: &dyn ArtifactFactory) {
        factory.destroy_job_listener(self);
    }
}

/// An artifact instance released through its factory when dropped.
pub struct ScopedArtifact<T: ?Sized + Destroy> {
    name: String,
    instance: Option<Box<T>>,
    factory: Arc<dyn ArtifactFactory>,
}

impl<T: ?Sized + Destroy> ScopedArtifact<T> {
    pub fn new(name: impl Into<String>, instance: Box<T>, factory: Arc<dyn ArtifactFactory>) -> Self {
        Self {
            name: name.into(),
            instance: Some(instance),
            factory,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl ScopedArtifact<dyn Decider> {
    pub fn decider(factory: &Arc<dyn ArtifactFactory>, artifact: &ArtifactRef) -> EngineResult<Self> {
        let instance = factory.create_decider(artifact)?;
        Ok(Self::new(artifact.name.clone(), instance, factory.clone()))
    }
}

impl ScopedArtifact<dyn JobListener> {
    pub fn job_listener(
        factory: &Arc<dyn ArtifactFactory>,
        artifact: &ArtifactRef,
    ) -> EngineResult<Self> {
        let instance = factory.create_job_listener(artifact)?;
        Ok(Self::new(artifact.name.clone(), instance, factory.clone()))
    }
}

impl<T: ?Sized + Destroy> Deref for ScopedArtifact<T> {
    type Target = T;

    fn deref(&self) -> &T {
        match &self.instance {
            Some(instance) => &**instance,
            // Only `drop` takes the instance.
            None => unreachable!("artifact used after release"),
        }
    }
}

impl<T: ?Sized + Destroy> Drop for ScopedArtifact<T> {
    fn drop(&mut self) {
        if let Some(instance) = self.instance.take() {
            tracing::trace!(artifact = %self.name, "Releasing artifact");
            instance.destroy(&*self.factory);
        }
    }
}

impl<T: ?Sized + Destroy> std::fmt::Debug for ScopedArtifact<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopedArtifact")
            .field("name", &self.name)
            .finish()
    }
}

type DeciderCtor = Box<dyn Fn(&Properties) -> anyhow::Result<Box<dyn Decider>> + Send + Sync>;
type ListenerCtor = Box<dyn Fn(&Properties) -> anyhow::Result<Box<dyn JobListener>> + Send + Sync>;

/// Name-keyed registry of artifact constructors.
#[derive(Default)]
pub struct ArtifactRegistry {
    deciders: HashMap<String, DeciderCtor>,
    listeners: HashMap<String, ListenerCtor>,
}

impl ArtifactRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a decider constructor under `name`.
    pub fn register_decider<F>(&mut self, name: impl Into<String>, ctor: F)
    where
        F: Fn(&Properties) -> anyhow::Result<Box<dyn Decider>> + Send + Sync + 'static,
    {
        self.deciders.insert(name.into(), Box::new(ctor));
    }

    /// Register a job listener constructor under `name`.
    pub fn register_listener<F>(&mut self, name: impl Into<String>, ctor: F)
    where
        F: Fn(&Properties) -> anyhow::Result<Box<dyn JobListener>> + Send + Sync + 'static,
    {
        self.listeners.insert(name.into(), Box::new(ctor));
    }

    pub fn has_decider(&self, name: &str) -> bool {
        self.deciders.contains_key(name)
    }

    pub fn has_listener(&self, name: &str) -> bool {
        self.listeners.contains_key(name)
    }

    /// Registered names, deciders first.
    pub fn list(&self) -> Vec<&str> {
        let mut deciders: Vec<&str> = self.deciders.keys().map(|s| s.as_str()).collect();
        let mut listeners: Vec<&str> = self.listeners.keys().map(|s| s.as_str()).collect();
        deciders.sort_unstable();
        listeners.sort_unstable();
        deciders.extend(listeners);
        deciders
    }
}

impl ArtifactFactory for ArtifactRegistry {
    fn create_decider(&self, artifact: &ArtifactRef) -> EngineResult<Box<dyn Decider>> {
        let ctor = self.deciders.get(&artifact.name).ok_or_else(|| {
            EngineError::Artifact(format!("No decider registered as '{}'", artifact.name))
        })?;
        ctor(&artifact.properties).map_err(|e| {
            EngineError::Artifact(format!("Failed to create decider '{}': {}", artifact.name, e))
        })
    }

    fn create_job_listener(&self, artifact: &ArtifactRef) -> EngineResult<Box<dyn JobListener>> {
        let ctor = self.listeners.get(&artifact.name).ok_or_else(|| {
            EngineError::Artifact(format!("No listener registered as '{}'", artifact.name))
        })?;
        ctor(&artifact.properties).map_err(|e| {
            EngineError::Artifact(format!("Failed to create listener '{}': {}", artifact.name, e))
        })
    }
}

impl std::fmt::Debug for ArtifactRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactRegistry")
            .field("artifacts", &self.list())
            .finish()
    }
}
