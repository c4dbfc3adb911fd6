//! Access rule validation.
//!
//! A valid rule sets exactly one scope combination (case, case type,
//! checkpoint type, or case + checkpoint type) and at least one of member
//! role, member group or member user.

use crate::error::{DomainError, DomainResult};
use crate::model::RuleDraft;

/// Validates both the scope and the grant of a draft.
pub fn validate_rule(draft: &RuleDraft) -> DomainResult<()> {
    validate_scope(draft)?;
    validate_grant(draft)
}

/// Validates the scope fields of a draft.
pub fn validate_scope(draft: &RuleDraft) -> DomainResult<()> {
    ensure_not_blank("rule_case_id", &draft.rule_case_id)?;
    ensure_not_blank("rule_case_type_id", &draft.rule_case_type_id)?;
    ensure_not_blank("rule_checkpoint_type_id", &draft.rule_checkpoint_type_id)?;

    let case = draft.rule_case_id.is_some();
    let case_type = draft.rule_case_type_id.is_some();
    let checkpoint = draft.rule_checkpoint_type_id.is_some();

    if !case && !case_type && !checkpoint {
        return Err(DomainError::validation(
            "rule must set a case, case type or checkpoint type scope",
        ));
    }
    if case && case_type {
        return Err(DomainError::validation(
            "rule cannot be scoped to both a case and a case type",
        ));
    }
    if case_type && checkpoint {
        return Err(DomainError::validation(
            "rule cannot be scoped to both a case type and a checkpoint type",
        ));
    }
    Ok(())
}

/// Validates the member fields of a draft.
pub fn validate_grant(draft: &RuleDraft) -> DomainResult<()> {
    ensure_not_blank("member_role", &draft.member_role)?;
    ensure_not_blank("member_group_id", &draft.member_group_id)?;
    ensure_not_blank("member_user_id", &draft.member_user_id)?;

    if draft.member_role.is_none()
        && draft.member_group_id.is_none()
        && draft.member_user_id.is_none()
    {
        return Err(DomainError::validation(
            "rule must grant a member role, member group or member user",
        ));
    }
    Ok(())
}

fn ensure_not_blank(field: &str, value: &Option<String>) -> DomainResult<()> {
    match value {
        Some(v) if v.trim().is_empty() => Err(DomainError::validation(format!(
            "{field} cannot be blank"
        ))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_rule_without_scope_is_rejected() {
        let draft = RuleDraft::unscoped().role("X");
        let err = validate_rule(&draft).unwrap_err();
        assert!(matches!(err, DomainError::Validation { .. }));
        assert!(err.to_string().contains("scope"));
    }

    #[test]
    fn test_rule_without_grant_is_rejected() {
        let draft = RuleDraft::for_case_type("T");
        let err = validate_rule(&draft).unwrap_err();
        assert!(matches!(err, DomainError::Validation { .. }));
        assert!(err.to_string().contains("member"));
    }

    #[test]
    fn test_case_and_case_type_are_exclusive() {
        let draft = RuleDraft {
            rule_case_type_id: Some("T".to_string()),
            ..RuleDraft::for_case("c1").role("Agent")
        };
        assert!(validate_rule(&draft).is_err());
    }

    #[test]
    fn test_case_with_checkpoint_is_allowed() {
        let draft = RuleDraft::for_case("c1").at_checkpoint("cp1").user("alice");
        assert!(validate_rule(&draft).is_ok());
    }

    #[test]
    fn test_case_type_with_checkpoint_is_rejected() {
        let draft = RuleDraft::for_case_type("T").at_checkpoint("cp1").role("Agent");
        assert!(validate_rule(&draft).is_err());
    }

    #[test]
    fn test_blank_fields_are_rejected() {
        let draft = RuleDraft::for_case_type("  ").role("Agent");
        assert!(validate_rule(&draft).is_err());

        let draft = RuleDraft::for_case_type("T").role("");
        assert!(validate_rule(&draft).is_err());
    }

    fn id_strategy() -> impl Strategy<Value = Option<String>> {
        proptest::option::of("[a-z0-9]{1,8}")
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Property: scope exclusivity and grant presence decide validity
        #[test]
        fn test_property_scope_and_grant_invariants(
            case_id in id_strategy(),
            case_type_id in id_strategy(),
            checkpoint_type_id in id_strategy(),
            role in id_strategy(),
            group in id_strategy(),
            user in id_strategy(),
        ) {
            let draft = RuleDraft {
                rule_case_id: case_id.clone(),
                rule_case_type_id: case_type_id.clone(),
                rule_checkpoint_type_id: checkpoint_type_id.clone(),
                member_role: role.clone(),
                member_group_id: group.clone(),
                member_user_id: user.clone(),
                access_level: 1,
            };

            let no_scope =
                case_id.is_none() && case_type_id.is_none() && checkpoint_type_id.is_none();
            let case_and_type = case_id.is_some() && case_type_id.is_some();
            let type_and_checkpoint = case_type_id.is_some() && checkpoint_type_id.is_some();
            let no_grant = role.is_none() && group.is_none() && user.is_none();

            let expected_valid = !(no_scope || case_and_type || type_and_checkpoint || no_grant);
            prop_assert_eq!(validate_rule(&draft).is_ok(), expected_valid);
        }
    }
}
