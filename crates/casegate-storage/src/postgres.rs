//! PostgreSQL translation of case list queries.
//!
//! Builds a single `SELECT` over the `cases` table in which every access
//! predicate becomes a correlated sub-select against `access_rules`, so the
//! database filters and rates cases without materialising them first.
//!
//! Expected schema:
//!
//! ```sql
//! CREATE TABLE access_rules (
//!     id                      TEXT PRIMARY KEY,
//!     rule_case_id            TEXT,
//!     rule_case_type_id       TEXT,
//!     rule_checkpoint_type_id TEXT,
//!     member_role             TEXT,
//!     member_group_id         TEXT,
//!     member_user_id          TEXT,
//!     access_level            BIGINT NOT NULL,
//!     created_date            TIMESTAMPTZ NOT NULL
//! );
//! ```
//!
//! The `cases` relation must expose `id`, `case_type_id`,
//! `checkpoint_type_id`, `group_id` and `created_by_id`.

use sqlx::{Postgres, QueryBuilder};

use crate::cases::{AccessSpec, CaseListQuery, CasePredicate, MAX_ACCESS_LEVEL};

const CASE_COLUMNS: &str =
    "c.id, c.case_type_id, c.checkpoint_type_id, c.group_id, c.created_by_id";

/// Rule scopes matched against a case row `c`. Scope columns a rule leaves
/// unset must be NULL, except for the case-plus-checkpoint pairing.
const RULE_SCOPE_CLAUSES: [&str; 4] = [
    concat!(
        "(r.rule_case_id = c.id",
        " AND r.rule_case_type_id IS NULL AND r.rule_checkpoint_type_id IS NULL)"
    ),
    concat!(
        "(r.rule_case_type_id = c.case_type_id",
        " AND r.rule_case_id IS NULL AND r.rule_checkpoint_type_id IS NULL)"
    ),
    concat!(
        "(r.rule_checkpoint_type_id = c.checkpoint_type_id",
        " AND r.rule_case_id IS NULL AND r.rule_case_type_id IS NULL)"
    ),
    "(r.rule_case_id = c.id AND r.rule_checkpoint_type_id = c.checkpoint_type_id)",
];

/// Builds the push-down query for a case list.
///
/// The result selects the case columns plus an `access_level` column and only
/// returns rows whose access level is positive.
pub fn build_case_list_query(query: &CaseListQuery) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new("SELECT rated.* FROM (SELECT ");
    builder.push(CASE_COLUMNS);
    builder.push(", ");
    push_level_expression(&mut builder, query);
    builder.push(" AS access_level FROM cases c) rated WHERE rated.access_level > 0");

    for predicate in query.predicates() {
        if let CasePredicate::GroupIn(groups) = predicate {
            builder.push(" AND rated.group_id = ANY(");
            builder.push_bind(groups.iter().cloned().collect::<Vec<String>>());
            builder.push(")");
        }
    }

    builder.push(" ORDER BY rated.id");
    builder
}

/// Pushes the effective level: the least level across access predicates.
fn push_level_expression(builder: &mut QueryBuilder<'static, Postgres>, query: &CaseListQuery) {
    let specs: Vec<&AccessSpec> = query
        .predicates()
        .iter()
        .filter_map(|p| match p {
            CasePredicate::Access(spec) => Some(spec),
            CasePredicate::GroupIn(_) => None,
        })
        .collect();

    if specs.is_empty() {
        builder.push_bind(i64::from(MAX_ACCESS_LEVEL));
        return;
    }

    builder.push("LEAST(");
    for (i, spec) in specs.iter().enumerate() {
        if i > 0 {
            builder.push(", ");
        }
        push_spec_level(builder, spec);
    }
    builder.push(")");
}

fn push_spec_level(builder: &mut QueryBuilder<'static, Postgres>, spec: &AccessSpec) {
    let (roles, user_id) = match spec {
        AccessSpec::Unrestricted => {
            builder.push_bind(i64::from(MAX_ACCESS_LEVEL));
            return;
        }
        AccessSpec::RuleGrants { roles, user_id } => (roles, user_id),
    };

    builder.push("(SELECT COALESCE(MAX(r.access_level), 0) FROM access_rules r WHERE (");
    builder.push(RULE_SCOPE_CLAUSES.join(" OR "));
    builder.push(") AND (r.member_role = ANY(");
    builder.push_bind(roles.iter().cloned().collect::<Vec<String>>());
    builder.push(") OR r.member_user_id = ");
    // NULL never compares equal, so an anonymous principal matches no user grant
    builder.push_bind(user_id.clone());
    builder.push(" OR r.member_group_id = c.group_id))");
}
