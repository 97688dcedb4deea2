/// Integration tests for the meta store

mod common;

use serde_json::json;
use std::collections::BTreeMap;
use vuedoo_shared::models::meta::{Meta, MetaOwner};

fn owner() -> MetaOwner {
    MetaOwner::new(common::unique_kind("metatest"), 1)
}

#[tokio::test]
async fn test_put_and_get_json_values() {
    let Some(pool) = common::test_pool().await else {
        return;
    };
    let owner = owner();

    Meta::put(&pool, &owner, "tone", "friendly").await.unwrap();
    Meta::put(&pool, &owner, "questions", &json!(["Budget?", "Timeline?"])).await.unwrap();

    assert_eq!(Meta::get(&pool, &owner, "tone").await.unwrap().as_deref(), Some("friendly"));

    let questions: Vec<String> = Meta::get_json(&pool, &owner, "questions").await.unwrap().unwrap();
    assert_eq!(questions, vec!["Budget?", "Timeline?"]);

    assert!(Meta::get(&pool, &owner, "missing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_put_overwrites() {
    let Some(pool) = common::test_pool().await else {
        return;
    };
    let owner = owner();

    Meta::put(&pool, &owner, "role", "assistant").await.unwrap();
    Meta::put(&pool, &owner, "role", "editor").await.unwrap();

    let role: Option<String> = Meta::get_json(&pool, &owner, "role").await.unwrap();
    assert_eq!(role.as_deref(), Some("editor"));
}

#[tokio::test]
async fn test_get_many_and_prefixed() {
    let Some(pool) = common::test_pool().await else {
        return;
    };
    let owner = owner();

    Meta::put(&pool, &owner, "a", &1).await.unwrap();
    Meta::put(&pool, &owner, "b", &2).await.unwrap();
    Meta::put(&pool, &owner, "privilege_5", &json!(["admin"])).await.unwrap();

    let all = Meta::get_many(&pool, &owner, &[]).await.unwrap();
    assert_eq!(all.len(), 3);

    let some = Meta::get_many(&pool, &owner, &["a", "missing"]).await.unwrap();
    let expected: BTreeMap<String, String> = [("a".to_string(), "1".to_string())].into_iter().collect();
    assert_eq!(some, expected);

    let privileges = Meta::get_prefixed(&pool, &owner, "privilege_").await.unwrap();
    assert_eq!(privileges.len(), 1);
    assert_eq!(privileges[0].0, "privilege_5");
}

#[tokio::test]
async fn test_remove_hides_and_put_revives() {
    let Some(pool) = common::test_pool().await else {
        return;
    };
    let owner = owner();

    Meta::put(&pool, &owner, "prompt", "Be brief").await.unwrap();
    assert!(Meta::remove(&pool, &owner, "prompt").await.unwrap());
    assert!(!Meta::remove(&pool, &owner, "prompt").await.unwrap());
    assert!(Meta::get(&pool, &owner, "prompt").await.unwrap().is_none());

    Meta::put(&pool, &owner, "prompt", "Be thorough").await.unwrap();
    let prompt: Option<String> = Meta::get_json(&pool, &owner, "prompt").await.unwrap();
    assert_eq!(prompt.as_deref(), Some("Be thorough"));
}

#[tokio::test]
async fn test_remove_if_value_only_matches_current_value() {
    let Some(pool) = common::test_pool().await else {
        return;
    };
    let owner = owner();

    Meta::put_raw(&pool, &owner, "token", "\"first\"").await.unwrap();
    assert!(!Meta::remove_if_value(&pool, &owner, "token", "\"second\"").await.unwrap());
    assert!(Meta::remove_if_value(&pool, &owner, "token", "\"first\"").await.unwrap());
    assert!(!Meta::remove_if_value(&pool, &owner, "token", "\"first\"").await.unwrap());
}

#[tokio::test]
async fn test_find_by_json_field() {
    let Some(pool) = common::test_pool().await else {
        return;
    };
    let kind = common::unique_kind("jsonfield");

    for (id, hash) in [(1, "aaa"), (2, "bbb"), (3, "aaa")] {
        let owner = MetaOwner::new(kind.clone(), id);
        Meta::put(&pool, &owner, "pending", &json!({"code_hash": hash})).await.unwrap();
    }
    // A plain string under another key must not break the JSON lookup
    Meta::put(&pool, &MetaOwner::new(kind.clone(), 4), "note", "not an object").await.unwrap();

    let mut matches: Vec<i64> = Meta::find_by_json_field(&pool, &kind, "pending", "code_hash", "aaa", None)
        .await
        .unwrap()
        .into_iter()
        .map(|(id, _)| id)
        .collect();
    matches.sort();
    assert_eq!(matches, vec![1, 3]);

    let scoped = Meta::find_by_json_field(&pool, &kind, "pending", "code_hash", "aaa", Some(3))
        .await
        .unwrap();
    assert_eq!(scoped.len(), 1);
    assert_eq!(scoped[0].0, 3);
}

#[tokio::test]
async fn test_concurrent_first_puts_leave_one_row() {
    let Some(pool) = common::test_pool().await else {
        return;
    };
    let owner = owner();

    let mut handles = Vec::new();
    for i in 0..16 {
        let pool = pool.clone();
        let owner = owner.clone();
        handles.push(tokio::spawn(async move { Meta::put(&pool, &owner, "tone", &i).await }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let (rows,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM metas WHERE owner_kind = $1 AND owner_id = $2 AND meta_key = 'tone'",
    )
    .bind(&owner.kind)
    .bind(owner.id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(rows, 1);

    let value: Option<i64> = Meta::get_json(&pool, &owner, "tone").await.unwrap();
    assert!(matches!(value, Some(v) if (0..16).contains(&v)));
}
