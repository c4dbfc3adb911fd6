//! Storage Integration Tests.
//!
//! These tests drive the rule store through the `RuleStore` trait only, so
//! any backend can be swapped in behind `Arc<dyn RuleStore>`.

use std::collections::BTreeSet;
use std::sync::Arc;

use casegate_storage::{
    AccessRule, AccessSpec, CaseListQuery, CasePredicate, CaseProjection, CaseSource, FieldMatch,
    MemoryCaseSource, MemoryRuleStore, PaginationOptions, RuleFilter, RuleQuery, RuleStore,
    StorageError,
};
use chrono::{Duration, TimeZone, Utc};

fn rule(id: &str) -> AccessRule {
    AccessRule {
        id: id.to_string(),
        rule_case_id: None,
        rule_case_type_id: None,
        rule_checkpoint_type_id: None,
        member_role: None,
        member_group_id: None,
        member_user_id: None,
        access_level: 1,
        created_date: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
    }
}

/// Helper function to run a CRUD pass against any RuleStore implementation.
async fn run_basic_crud_test(store: Arc<dyn RuleStore>) {
    let created = store
        .insert(AccessRule {
            rule_case_type_id: Some("T".to_string()),
            member_role: Some("Agent".to_string()),
            ..rule("r1")
        })
        .await
        .unwrap();
    assert_eq!(created.id, "r1");

    let found = store.find_by_id("r1").await.unwrap().unwrap();
    assert_eq!(found, created);

    let updated = store
        .update(AccessRule {
            access_level: 9,
            ..found
        })
        .await
        .unwrap();
    assert_eq!(updated.access_level, 9);

    let type_scoped = store.query(&RuleQuery::TypeScoped).await.unwrap();
    assert_eq!(type_scoped.len(), 1);

    store.delete("r1").await.unwrap();
    assert!(store.find_by_id("r1").await.unwrap().is_none());
    assert!(matches!(
        store.delete("r1").await,
        Err(StorageError::RuleNotFound { .. })
    ));
}

#[tokio::test]
async fn test_memory_store_basic_crud() {
    run_basic_crud_test(MemoryRuleStore::new_shared()).await;
}

#[tokio::test]
async fn test_negation_filters_keep_unset_fields() {
    let store = MemoryRuleStore::new();
    store
        .insert_many(vec![
            AccessRule {
                rule_case_type_id: Some("T".to_string()),
                member_role: Some("Agent".to_string()),
                ..rule("r1")
            },
            AccessRule {
                rule_case_type_id: Some("U".to_string()),
                member_role: Some("Agent".to_string()),
                ..rule("r2")
            },
            AccessRule {
                rule_checkpoint_type_id: Some("cp1".to_string()),
                member_group_id: Some("g1".to_string()),
                ..rule("r3")
            },
        ])
        .await
        .unwrap();

    let filter = RuleFilter {
        case_type_id: Some(FieldMatch::NotEquals("T".to_string())),
        ..RuleFilter::default()
    };
    let ids: Vec<String> = store
        .query(&RuleQuery::Filter(filter))
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();

    assert_eq!(ids, vec!["r2", "r3"]);
}

#[tokio::test]
async fn test_large_dataset_pagination() {
    let store = MemoryRuleStore::new();
    let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    let rules: Vec<AccessRule> = (0..250)
        .map(|i| AccessRule {
            rule_case_type_id: Some(format!("T{}", i % 3)),
            member_role: Some("Agent".to_string()),
            created_date: start + Duration::seconds(i),
            ..rule(&format!("r{i:03}"))
        })
        .collect();
    store.insert_many(rules).await.unwrap();

    let query = RuleQuery::Filter(RuleFilter {
        case_type_id: Some(FieldMatch::Equals("T0".to_string())),
        ..RuleFilter::default()
    });

    let mut collected = Vec::new();
    let mut token = None;
    loop {
        let page = store
            .query_paginated(
                &query,
                &PaginationOptions {
                    page_size: Some(30),
                    continuation_token: token,
                },
            )
            .await
            .unwrap();
        collected.extend(page.items);
        token = page.continuation_token;
        if token.is_none() {
            break;
        }
    }

    assert_eq!(collected.len(), 84);
    assert!(collected
        .windows(2)
        .all(|pair| pair[0].created_date <= pair[1].created_date));
}

#[tokio::test]
async fn test_concurrent_access_across_tasks() {
    let store = MemoryRuleStore::new_shared();

    let mut handles = Vec::new();
    for i in 0..20 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            store
                .insert(AccessRule {
                    rule_case_id: Some("c1".to_string()),
                    member_user_id: Some("alice".to_string()),
                    ..rule(&format!("r{i}"))
                })
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }
    assert_eq!(store.len().await, 20);

    let writer = {
        let store = Arc::clone(&store);
        tokio::spawn(async move { store.bulk_update_user("c1", "alice", "bob").await })
    };
    let reader = {
        let store = Arc::clone(&store);
        tokio::spawn(async move { store.query(&RuleQuery::ForCase("c1".to_string())).await })
    };

    assert_eq!(writer.await.unwrap().unwrap(), 20);
    let snapshot = reader.await.unwrap().unwrap();
    let owners: BTreeSet<Option<String>> =
        snapshot.into_iter().map(|r| r.member_user_id).collect();
    assert_eq!(owners.len(), 1, "reader observed a partial reassignment");
}

#[tokio::test]
async fn test_case_source_reports_max_level() {
    let store = MemoryRuleStore::new_shared();
    store
        .insert_many(vec![
            AccessRule {
                rule_case_type_id: Some("T".to_string()),
                member_role: Some("Agent".to_string()),
                access_level: 2,
                ..rule("r1")
            },
            AccessRule {
                rule_checkpoint_type_id: Some("cp1".to_string()),
                member_role: Some("Agent".to_string()),
                access_level: 5,
                ..rule("r2")
            },
        ])
        .await
        .unwrap();

    let cases = MemoryCaseSource::new(Arc::clone(&store));
    cases
        .upsert(CaseProjection {
            id: "c1".to_string(),
            case_type_id: "T".to_string(),
            checkpoint_type_id: "cp1".to_string(),
            group_id: None,
            created_by_id: None,
        })
        .await;

    let query = CaseListQuery::new().with(CasePredicate::Access(AccessSpec::RuleGrants {
        roles: BTreeSet::from(["Agent".to_string()]),
        user_id: None,
    }));
    let rated = cases.fetch(&query).await.unwrap();

    assert_eq!(rated.len(), 1);
    assert_eq!(rated[0].access_level, 5);
}
