//! Job element variants.

use serde::{Deserialize, Serialize};

use super::rule::TransitionRule;
use crate::properties::Properties;

/// Reference to an artifact (decider or listener) plus its properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    /// Name the artifact factory resolves.
    #[serde(rename = "ref")]
    pub name: String,

    #[serde(default, skip_serializing_if = "Properties::is_empty")]
    pub properties: Properties,
}

impl ArtifactRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: Properties::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

/// One node of a job graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobElement {
    Step(Step),
    Flow(Flow),
    Split(Split),
    Decision(Decision),
}

impl JobElement {
    pub fn id(&self) -> &str {
        match self {
            Self::Step(s) => &s.id,
            Self::Flow(f) => &f.id,
            Self::Split(s) => &s.id,
            Self::Decision(d) => &d.id,
        }
    }

    pub fn transitions(&self) -> &[TransitionRule] {
        match self {
            Self::Step(s) => &s.transitions,
            Self::Flow(f) => &f.transitions,
            Self::Split(s) => &s.transitions,
            Self::Decision(d) => &d.transitions,
        }
    }

    /// Explicit `next` attribute. Decisions have none.
    pub fn next(&self) -> Option<&str> {
        match self {
            Self::Step(s) => s.next.as_deref(),
            Self::Flow(f) => f.next.as_deref(),
            Self::Split(s) => s.next.as_deref(),
            Self::Decision(_) => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Step(_) => "step",
            Self::Flow(_) => "flow",
            Self::Split(_) => "split",
            Self::Decision(_) => "decision",
        }
    }
}

/// A unit of work run by the step runner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transitions: Vec<TransitionRule>,

    /// Execution parameters, opaque to the engine.
    #[serde(default, skip_serializing_if = "Properties::is_empty")]
    pub properties: Properties,
}

impl Step {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            next: None,
            transitions: Vec::new(),
            properties: Properties::new(),
        }
    }

    pub fn with_next(mut self, next: impl Into<String>) -> Self {
        self.next = Some(next.into());
        self
    }

    pub fn with_transition(mut self, rule: TransitionRule) -> Self {
        self.transitions.push(rule);
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

/// A sequential sub-graph of elements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flow {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transitions: Vec<TransitionRule>,

    pub elements: Vec<JobElement>,
}

impl Flow {
    pub fn new(id: impl Into<String>, elements: Vec<JobElement>) -> Self {
        Self {
            id: id.into(),
            next: None,
            transitions: Vec::new(),
            elements,
        }
    }

    pub fn with_next(mut self, next: impl Into<String>) -> Self {
        self.next = Some(next.into());
        self
    }

    pub fn with_transition(mut self, rule: TransitionRule) -> Self {
        self.transitions.push(rule);
        self
    }
}

/// Flows executed concurrently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Split {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transitions: Vec<TransitionRule>,

    pub flows: Vec<Flow>,
}

impl Split {
    pub fn new(id: impl Into<String>, flows: Vec<Flow>) -> Self {
        Self {
            id: id.into(),
            next: None,
            transitions: Vec::new(),
            flows,
        }
    }

    pub fn with_next(mut self, next: impl Into<String>) -> Self {
        self.next = Some(next.into());
        self
    }
}

/// Computes the next transition from preceding step results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub id: String,

    pub decider: ArtifactRef,

    #[serde(default)]
    pub transitions: Vec<TransitionRule>,
}

impl Decision {
    pub fn new(id: impl Into<String>, decider: ArtifactRef) -> Self {
        Self {
            id: id.into(),
            decider,
            transitions: Vec::new(),
        }
    }

    pub fn with_transition(mut self, rule: TransitionRule) -> Self {
        self.transitions.push(rule);
        self
    }
}

impl From<Step> for JobElement {
    fn from(step: Step) -> Self {
        Self::Step(step)
    }
}

impl From<Flow> for JobElement {
    fn from(flow: Flow) -> Self {
        Self::Flow(flow)
    }
}

impl From<Split> for JobElement {
    fn from(split: Split) -> Self {
        Self::Split(split)
    }
}

impl From<Decision> for JobElement {
    fn from(decision: Decision) -> Self {
        Self::Decision(decision)
    }
}
