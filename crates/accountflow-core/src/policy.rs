//! IAM policy documents
//!
//! The wire format (`Version` / `Statement` / `Effect` ...) is its own type,
//! built explicitly from the template statements rather than serialized
//! from them.

use crate::model::{StatementCondition, StatementEffect, StatementSpec};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PolicyVersion {
    #[default]
    #[serde(rename = "2012-10-17")]
    V2012_10_17,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    Allow,
    Deny,
}

impl From<StatementEffect> for Effect {
    fn from(effect: StatementEffect) -> Self {
        match effect {
            StatementEffect::Allow => Effect::Allow,
            StatementEffect::Deny => Effect::Deny,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    #[serde(rename = "AWS")]
    pub aws: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Statement {
    pub effect: Effect,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub action: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<StatementCondition>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal: Option<Principal>,
}

impl From<&StatementSpec> for Statement {
    fn from(spec: &StatementSpec) -> Self {
        Self {
            effect: spec.effect.into(),
            action: spec.action.clone(),
            resource: spec.resource.clone(),
            condition: spec.condition.clone(),
            principal: spec.principal.as_ref().map(|p| Principal { aws: p.aws.clone() }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyDocument {
    pub version: PolicyVersion,

    pub statement: Vec<Statement>,
}

impl PolicyDocument {
    pub fn new(statement: Vec<Statement>) -> Self {
        Self {
            version: PolicyVersion::default(),
            statement,
        }
    }

    pub fn from_statements(statements: &[StatementSpec]) -> Self {
        Self::new(statements.iter().map(Statement::from).collect())
    }

    /// Trust policy letting exactly `principal_arn` assume the role
    pub fn trust(principal_arn: &str) -> Self {
        Self::new(vec![Statement {
            effect: Effect::Allow,
            action: vec!["sts:AssumeRole".to_string()],
            resource: Vec::new(),
            condition: None,
            principal: Some(Principal {
                aws: vec![principal_arn.to_string()],
            }),
        }])
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
