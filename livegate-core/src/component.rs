//! Component tree, branch and analysis rows consumed by a recomputation pass

use serde::{Deserialize, Serialize};

pub const QUALIFIER_PROJECT: &str = "TRK";
pub const QUALIFIER_MODULE: &str = "BRC";
pub const QUALIFIER_DIRECTORY: &str = "DIR";
pub const QUALIFIER_FILE: &str = "FIL";

/// A node of the project hierarchy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Component {
    pub uuid: String,
    pub key: String,
    pub project_uuid: String,
    /// Ancestor uuids from the project down to the parent, root first
    pub uuid_path: Vec<String>,
    pub qualifier: String,
    /// Set on branch and pull-request roots, points to the main branch project
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main_branch_project_uuid: Option<String>,
}

impl Component {
    pub fn is_root_project(&self) -> bool {
        self.uuid == self.project_uuid
    }

    /// Uuid of the project whose quality gate applies to this component
    pub fn gate_project_uuid(&self) -> &str {
        self.main_branch_project_uuid
            .as_deref()
            .unwrap_or(&self.project_uuid)
    }

    /// Serialized form of `uuid_path`, as stored: `.uuid1.uuid2.`
    pub fn encoded_uuid_path(&self) -> String {
        encode_uuid_path(&self.uuid_path)
    }
}

pub fn encode_uuid_path(path: &[String]) -> String {
    let mut encoded = String::from(".");
    for uuid in path {
        encoded.push_str(uuid);
        encoded.push('.');
    }
    encoded
}

pub fn decode_uuid_path(encoded: &str) -> Vec<String> {
    encoded
        .split('.')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BranchType {
    Long,
    Short,
    PullRequest,
}

impl BranchType {
    pub fn as_str(self) -> &'static str {
        match self {
            BranchType::Long => "LONG",
            BranchType::Short => "SHORT",
            BranchType::PullRequest => "PULL_REQUEST",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "LONG" => Some(BranchType::Long),
            "SHORT" => Some(BranchType::Short),
            "PULL_REQUEST" => Some(BranchType::PullRequest),
            _ => None,
        }
    }

    /// Short-lived branches and pull requests count every issue as new
    pub fn is_short_lived(self) -> bool {
        matches!(self, BranchType::Short | BranchType::PullRequest)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Branch {
    pub uuid: String,
    pub project_uuid: String,
    pub key: String,
    pub branch_type: BranchType,
}

/// Last analysis snapshot of a project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Analysis {
    pub uuid: String,
    pub project_uuid: String,
    pub created_at: i64,
    /// Start of the new code period, epoch millis
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period_date: Option<i64>,
}
