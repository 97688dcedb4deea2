/// Integration tests for the embedded schema migrations
///
/// Run with: cargo test -p vuedoo-shared --test db_migrations_tests

mod common;

use vuedoo_shared::db::migrations::{get_migration_status, run_migrations, MIGRATOR};

#[tokio::test]
async fn test_migrations_are_idempotent() {
    let Some(pool) = common::test_pool().await else {
        return;
    };

    // test_pool already applied them once
    assert!(run_migrations(&pool).await.is_ok());
    assert!(run_migrations(&pool).await.is_ok());
}

#[tokio::test]
async fn test_status_is_up_to_date() {
    let Some(pool) = common::test_pool().await else {
        return;
    };

    let status = get_migration_status(&pool).await.unwrap();
    let embedded_latest = MIGRATOR.iter().map(|m| m.version).max();

    assert!(status.is_up_to_date);
    assert!(status.applied_migrations >= 1);
    assert_eq!(status.latest_version, embedded_latest);
}

#[tokio::test]
async fn test_schema_tables_exist() {
    let Some(pool) = common::test_pool().await else {
        return;
    };

    for table in ["tenants", "users", "blocks", "metas"] {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (
                SELECT FROM information_schema.tables
                WHERE table_schema = current_schema() AND table_name = $1
            )",
        )
        .bind(table)
        .fetch_one(&pool)
        .await
        .unwrap();

        assert!(exists, "table {} should exist", table);
    }
}

#[tokio::test]
async fn test_block_slugs_are_unique() {
    let Some(pool) = common::test_pool().await else {
        return;
    };

    let slug = format!("{}", uuid::Uuid::new_v4().simple())[..15].to_string();
    let insert = "INSERT INTO blocks (type, author, slug) VALUES ('constraint_check', 1, $1)";

    sqlx::query(insert).bind(&slug).execute(&pool).await.unwrap();
    let duplicate = sqlx::query(insert).bind(&slug).execute(&pool).await;

    match duplicate {
        Err(sqlx::Error::Database(err)) => assert_eq!(err.constraint(), Some("blocks_slug_key")),
        other => panic!("expected unique violation, got {:?}", other),
    }
}
