//! Access rule inputs.

use casegate_storage::AccessRule;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A rule as submitted by a caller, before an id and creation date exist.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleDraft {
    #[serde(default)]
    pub rule_case_id: Option<String>,
    #[serde(default)]
    pub rule_case_type_id: Option<String>,
    #[serde(default)]
    pub rule_checkpoint_type_id: Option<String>,
    #[serde(default)]
    pub member_role: Option<String>,
    #[serde(default)]
    pub member_group_id: Option<String>,
    #[serde(default)]
    pub member_user_id: Option<String>,
    #[serde(default)]
    pub access_level: u32,
}

impl RuleDraft {
    /// A draft scoped to every case of a case type.
    pub fn for_case_type(case_type_id: impl Into<String>) -> Self {
        Self {
            rule_case_type_id: Some(case_type_id.into()),
            ..Self::default()
        }
    }

    /// A draft scoped to every case at a checkpoint type.
    pub fn for_checkpoint_type(checkpoint_type_id: impl Into<String>) -> Self {
        Self {
            rule_checkpoint_type_id: Some(checkpoint_type_id.into()),
            ..Self::default()
        }
    }

    /// A draft scoped to one case.
    pub fn for_case(case_id: impl Into<String>) -> Self {
        Self {
            rule_case_id: Some(case_id.into()),
            ..Self::default()
        }
    }

    /// A draft whose scope is supplied later (by `create_case_rule`).
    pub fn unscoped() -> Self {
        Self::default()
    }

    pub fn at_checkpoint(mut self, checkpoint_type_id: impl Into<String>) -> Self {
        self.rule_checkpoint_type_id = Some(checkpoint_type_id.into());
        self
    }

    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.member_role = Some(role.into());
        self
    }

    pub fn group(mut self, group_id: impl Into<String>) -> Self {
        self.member_group_id = Some(group_id.into());
        self
    }

    pub fn user(mut self, user_id: impl Into<String>) -> Self {
        self.member_user_id = Some(user_id.into());
        self
    }

    pub fn level(mut self, access_level: u32) -> Self {
        self.access_level = access_level;
        self
    }

    /// Stamps the draft into a storable rule.
    pub fn into_rule(self, id: String, created_date: DateTime<Utc>) -> AccessRule {
        AccessRule {
            id,
            rule_case_id: self.rule_case_id,
            rule_case_type_id: self.rule_case_type_id,
            rule_checkpoint_type_id: self.rule_checkpoint_type_id,
            member_role: self.member_role,
            member_group_id: self.member_group_id,
            member_user_id: self.member_user_id,
            access_level: self.access_level,
            created_date,
        }
    }
}
