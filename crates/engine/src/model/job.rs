//! Job definition and structural validation.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::element::{ArtifactRef, JobElement};
use super::rule::TransitionRule;
use crate::error::{EngineError, EngineResult};
use crate::properties::Properties;

/// A job: an ordered graph of job elements plus job-level listeners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,

    #[serde(default, skip_serializing_if = "Properties::is_empty")]
    pub properties: Properties,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub listeners: Vec<ArtifactRef>,

    pub elements: Vec<JobElement>,
}

impl Job {
    pub fn new(id: impl Into<String>, elements: Vec<JobElement>) -> Self {
        Self {
            id: id.into(),
            properties: Properties::new(),
            listeners: Vec::new(),
            elements,
        }
    }

    pub fn with_listener(mut self, listener: ArtifactRef) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Look up a direct child by identifier.
    pub fn element(&self, id: &str) -> Option<&JobElement> {
        self.elements.iter().find(|e| e.id() == id)
    }

    /// Check the structure of the graph.
    ///
    /// Identifiers must be unique within their direct container and every
    /// `next` reference must name a sibling. A decision placed first is left
    /// to the runner, which fails the run when it reaches it.
    pub fn validate(&self) -> EngineResult<()> {
        if self.id.trim().is_empty() {
            return Err(EngineError::Validation("Job id must not be empty".to_string()));
        }
        if self.elements.is_empty() {
            return Err(EngineError::Validation(format!(
                "Job '{}' has no elements",
                self.id
            )));
        }

        let top_level: HashSet<&str> = self.elements.iter().map(|e| e.id()).collect();
        validate_container(&self.id, &self.elements, &top_level)
    }
}

fn validate_container(
    container: &str,
    elements: &[JobElement],
    top_level: &HashSet<&str>,
) -> EngineResult<()> {
    let mut seen = HashSet::new();
    for element in elements {
        if element.id().trim().is_empty() {
            return Err(EngineError::Validation(format!(
                "Container '{}' holds an element without id",
                container
            )));
        }
        if !seen.insert(element.id()) {
            return Err(EngineError::Validation(format!(
                "Duplicate element id '{}' in '{}'",
                element.id(),
                container
            )));
        }
    }

    for element in elements {
        if let Some(next) = element.next() {
            if !seen.contains(next) {
                return Err(EngineError::Validation(format!(
                    "Element '{}' references unknown element '{}' in next",
                    element.id(),
                    next
                )));
            }
        }

        for rule in element.transitions() {
            match rule {
                TransitionRule::Next { to, .. } if !seen.contains(to.as_str()) => {
                    return Err(EngineError::Validation(format!(
                        "Element '{}' has a transition to unknown element '{}'",
                        element.id(),
                        to
                    )));
                }
                TransitionRule::Stop {
                    restart: Some(restart),
                    ..
                } if !top_level.contains(restart.as_str()) => {
                    return Err(EngineError::Validation(format!(
                        "Element '{}' restarts at '{}', which is not a job-level element",
                        element.id(),
                        restart
                    )));
                }
                _ => {}
            }
        }

        match element {
            JobElement::Flow(flow) => {
                if flow.elements.is_empty() {
                    return Err(EngineError::Validation(format!(
                        "Flow '{}' has no elements",
                        flow.id
                    )));
                }
                validate_container(&flow.id, &flow.elements, top_level)?;
            }
            JobElement::Split(split) => {
                if split.flows.is_empty() {
                    return Err(EngineError::Validation(format!(
                        "Split '{}' has no flows",
                        split.id
                    )));
                }
                let flows: Vec<JobElement> =
                    split.flows.iter().cloned().map(JobElement::Flow).collect();
                validate_container(&split.id, &flows, top_level)?;
            }
            JobElement::Step(_) | JobElement::Decision(_) => {}
        }
    }

    Ok(())
}
