//! The acting principal.
//!
//! Authentication happens upstream; this crate only reads already-verified
//! claims through the narrow [`Principal`] capability trait.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Read-only view of a verified principal.
pub trait Principal: Send + Sync {
    fn roles(&self) -> &BTreeSet<String>;

    fn subject_id(&self) -> Option<&str>;

    fn group_id(&self) -> Option<&str>;

    fn is_admin(&self) -> bool;

    fn is_system_client(&self) -> bool;

    /// Whether a system client presented the scope required for case access.
    fn has_required_scope(&self) -> bool;

    /// Admins and system clients may manage type-wide rules.
    fn is_privileged(&self) -> bool {
        self.is_admin() || self.is_system_client()
    }
}

/// Plain claims holder implementing [`Principal`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default)]
    pub roles: BTreeSet<String>,
    pub subject_id: Option<String>,
    pub group_id: Option<String>,
    #[serde(default)]
    pub admin: bool,
    #[serde(default)]
    pub system_client: bool,
    #[serde(default)]
    pub required_scope: bool,
}

impl Claims {
    /// Claims for an ordinary user.
    pub fn user(subject_id: impl Into<String>) -> Self {
        Self {
            subject_id: Some(subject_id.into()),
            ..Self::default()
        }
    }

    /// Claims for an administrator.
    pub fn admin(subject_id: impl Into<String>) -> Self {
        Self {
            admin: true,
            ..Self::user(subject_id)
        }
    }

    /// Claims for a system (machine) client.
    pub fn system(required_scope: bool) -> Self {
        Self {
            system_client: true,
            required_scope,
            ..Self::default()
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.insert(role.into());
        self
    }

    pub fn with_group(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = Some(group_id.into());
        self
    }
}

impl Principal for Claims {
    fn roles(&self) -> &BTreeSet<String> {
        &self.roles
    }

    fn subject_id(&self) -> Option<&str> {
        self.subject_id.as_deref()
    }

    fn group_id(&self) -> Option<&str> {
        self.group_id.as_deref()
    }

    fn is_admin(&self) -> bool {
        self.admin
    }

    fn is_system_client(&self) -> bool {
        self.system_client
    }

    fn has_required_scope(&self) -> bool {
        self.required_scope
    }
}
