/// Integration tests for the block store and privilege checks

mod common;

use rand::thread_rng;
use vuedoo_shared::auth::privilege::{Capability, PrivilegeError, Privileges};
use vuedoo_shared::models::block::{Block, BlockError, BlockLookup, NewBlock};
use vuedoo_shared::models::meta::{Meta, MetaOwner};
use vuedoo_shared::models::query::Page;

/// Author ids are arbitrary; blocks do not reference users
const AUTHOR: i64 = 7001;
const OTHER: i64 = 7002;

#[tokio::test]
async fn test_create_draws_slug_and_finds_by_slug() {
    let Some(pool) = common::test_pool().await else {
        return;
    };
    let kind = common::unique_kind("ws");

    let block = Block::create(&pool, &mut thread_rng(), NewBlock::new(AUTHOR, &kind, "Launch").content("Plan"))
        .await
        .unwrap();

    assert_eq!(block.slug.len(), 15);
    assert_eq!(block.title, "Launch");
    assert_eq!(block.content, "Plan");
    assert!(block.parent.is_none());
    assert!(block.is_live());

    let found = Block::find_by_slug(&pool, AUTHOR, &kind, &block.slug).await.unwrap().unwrap();
    assert_eq!(found.id, block.id);
}

#[tokio::test]
async fn test_create_with_live_slug_updates_in_place() {
    let Some(pool) = common::test_pool().await else {
        return;
    };
    let kind = common::unique_kind("ws");
    let mut rng = thread_rng();

    let original = Block::create(&pool, &mut rng, NewBlock::new(AUTHOR, &kind, "Draft")).await.unwrap();

    let updated = Block::create(
        &pool,
        &mut rng,
        NewBlock::new(OTHER, &kind, "Final").content("Done").slug(original.slug.clone()),
    )
    .await
    .unwrap();

    assert_eq!(updated.id, original.id);
    assert_eq!(updated.title, "Final");
    assert_eq!(updated.content, "Done");
    // Authorship is not transferable through an upsert
    assert_eq!(updated.author, AUTHOR);
    assert!(updated.modified_at >= original.modified_at);
}

#[tokio::test]
async fn test_create_with_deleted_slug_conflicts() {
    let Some(pool) = common::test_pool().await else {
        return;
    };
    let kind = common::unique_kind("ws");
    let mut rng = thread_rng();

    let block = Block::create(&pool, &mut rng, NewBlock::new(AUTHOR, &kind, "Gone")).await.unwrap();
    assert!(Block::delete(&pool, block.id).await.unwrap());

    let result = Block::create(&pool, &mut rng, NewBlock::new(AUTHOR, &kind, "Again").slug(block.slug.clone())).await;
    assert!(matches!(result, Err(BlockError::SlugConflict(slug)) if slug == block.slug));
}

#[tokio::test]
async fn test_create_rejects_malformed_slug() {
    let Some(pool) = common::test_pool().await else {
        return;
    };

    let result = Block::create(&pool, &mut thread_rng(), NewBlock::new(AUTHOR, "ws", "Bad").slug("Not A Slug")).await;
    assert!(matches!(result, Err(BlockError::InvalidSlug(_))));
}

#[tokio::test]
async fn test_list_pages_newest_first() {
    let Some(pool) = common::test_pool().await else {
        return;
    };
    let kind = common::unique_kind("ws");
    let mut rng = thread_rng();

    let mut ids = Vec::new();
    for i in 0..5 {
        let block = Block::create(&pool, &mut rng, NewBlock::new(AUTHOR, &kind, format!("WS {}", i)))
            .await
            .unwrap();
        ids.push(block.id);
    }

    let first = Block::list(&pool, AUTHOR, &kind, Page::new(1, 2), None).await.unwrap();
    let third = Block::list(&pool, AUTHOR, &kind, Page::new(3, 2), None).await.unwrap();
    let beyond = Block::list(&pool, AUTHOR, &kind, Page::new(4, 2), None).await.unwrap();

    assert_eq!(first.iter().map(|b| b.id).collect::<Vec<_>>(), vec![ids[4], ids[3]]);
    assert_eq!(third.iter().map(|b| b.id).collect::<Vec<_>>(), vec![ids[0]]);
    assert!(beyond.is_empty());
}

#[tokio::test]
async fn test_visibility_follows_authorship_and_grants() {
    let Some(pool) = common::test_pool().await else {
        return;
    };
    let kind = common::unique_kind("ws");

    let block = Block::create(&pool, &mut thread_rng(), NewBlock::new(AUTHOR, &kind, "Private"))
        .await
        .unwrap();

    assert!(Block::find_by_slug(&pool, OTHER, &kind, &block.slug).await.unwrap().is_none());
    assert!(Block::list(&pool, OTHER, &kind, Page::new(1, 10), None).await.unwrap().is_empty());

    Privileges::grant(&pool, &kind, block.id, OTHER, &[Capability::new("read")]).await.unwrap();
    assert!(Block::find_by_slug(&pool, OTHER, &kind, &block.slug).await.unwrap().is_some());
    assert_eq!(Block::list(&pool, OTHER, &kind, Page::new(1, 10), None).await.unwrap().len(), 1);

    assert!(Privileges::revoke(&pool, &kind, block.id, OTHER).await.unwrap());
    assert!(Block::find_by_slug(&pool, OTHER, &kind, &block.slug).await.unwrap().is_none());

    // Anonymous viewers see nothing
    assert!(Block::find_by_slug(&pool, 0, &kind, &block.slug).await.unwrap().is_none());
}

#[tokio::test]
async fn test_get_includes_visible_children_and_metas() {
    let Some(pool) = common::test_pool().await else {
        return;
    };
    let kind = common::unique_kind("ws");
    let child_kind = common::unique_kind("thread");
    let mut rng = thread_rng();

    let parent = Block::create(&pool, &mut rng, NewBlock::new(AUTHOR, &kind, "Parent")).await.unwrap();
    let mine = Block::create(&pool, &mut rng, NewBlock::new(AUTHOR, &child_kind, "Mine").parent(parent.id))
        .await
        .unwrap();
    Block::create(&pool, &mut rng, NewBlock::new(OTHER, &child_kind, "Theirs").parent(parent.id))
        .await
        .unwrap();
    Meta::put(&pool, &MetaOwner::new(kind.clone(), parent.id), "tone", "calm").await.unwrap();

    let lookup = BlockLookup::for_viewer(AUTHOR)
        .kind(kind.clone())
        .slug(parent.slug.clone())
        .with_children(child_kind.clone());
    let detail = Block::get(&pool, lookup).await.unwrap().unwrap();

    assert_eq!(detail.block.id, parent.id);
    assert_eq!(detail.children.len(), 1);
    assert_eq!(detail.children[0].id, mine.id);
    assert_eq!(detail.metas.get("tone").map(String::as_str), Some("calm"));

    let threads = Block::list(&pool, AUTHOR, &child_kind, Page::new(1, 10), Some(parent.id)).await.unwrap();
    assert_eq!(threads.len(), 1);
}

#[tokio::test]
async fn test_soft_delete_hides_block() {
    let Some(pool) = common::test_pool().await else {
        return;
    };
    let kind = common::unique_kind("ws");

    let block = Block::create(&pool, &mut thread_rng(), NewBlock::new(AUTHOR, &kind, "Temp")).await.unwrap();

    assert!(Block::delete(&pool, block.id).await.unwrap());
    assert!(!Block::delete(&pool, block.id).await.unwrap());
    assert!(Block::find_by_id(&pool, block.id).await.unwrap().is_none());
    assert!(Block::find_by_slug(&pool, AUTHOR, &kind, &block.slug).await.unwrap().is_none());
}

#[tokio::test]
async fn test_count_children_of_author() {
    let Some(pool) = common::test_pool().await else {
        return;
    };
    let kind = common::unique_kind("ws");
    let child_kind = common::unique_kind("thread");
    let mut rng = thread_rng();

    let ws = Block::create(&pool, &mut rng, NewBlock::new(AUTHOR, &kind, "WS")).await.unwrap();
    for title in ["a", "b", "c"] {
        Block::create(&pool, &mut rng, NewBlock::new(OTHER, &child_kind, title).parent(ws.id))
            .await
            .unwrap();
    }

    let count = Block::count_children_of_author(&pool, AUTHOR, &kind, &child_kind).await.unwrap();
    assert_eq!(count, 3);
}

#[tokio::test]
async fn test_privilege_grants_and_require() {
    let Some(pool) = common::test_pool().await else {
        return;
    };
    let kind = common::unique_kind("ws");

    let block = Block::create(&pool, &mut thread_rng(), NewBlock::new(AUTHOR, &kind, "Shared"))
        .await
        .unwrap();

    // Authors pass without a grant
    Privileges::require(&pool, &block, AUTHOR, &Capability::admin()).await.unwrap();

    let denied = Privileges::require(&pool, &block, OTHER, &Capability::admin()).await;
    assert!(matches!(denied, Err(PrivilegeError::MissingCapability(_, id)) if id == block.id));

    Privileges::grant(&pool, &kind, block.id, OTHER, &[Capability::new("read")]).await.unwrap();
    assert!(Privileges::has(&pool, &kind, block.id, OTHER, &Capability::new("read")).await.unwrap());
    assert!(!Privileges::has(&pool, &kind, block.id, OTHER, &Capability::admin()).await.unwrap());

    // A new grant replaces the old one
    Privileges::grant(&pool, &kind, block.id, OTHER, &[Capability::admin()]).await.unwrap();
    Privileges::require(&pool, &block, OTHER, &Capability::admin()).await.unwrap();
    assert!(!Privileges::has(&pool, &kind, block.id, OTHER, &Capability::new("read")).await.unwrap());

    Privileges::grant(&pool, &kind, block.id, AUTHOR, &[Capability::admin(), Capability::admin()])
        .await
        .unwrap();
    let grants = Privileges::list_grants(&pool, &kind, block.id).await.unwrap();
    assert_eq!(grants.len(), 2);
    assert_eq!(grants[0].user_id, AUTHOR);
    assert_eq!(grants[0].capabilities.len(), 1);
    assert_eq!(grants[1].user_id, OTHER);
}

#[tokio::test]
async fn test_concurrent_creates_on_one_slug_share_a_row() {
    let Some(pool) = common::test_pool().await else {
        return;
    };
    let kind = common::unique_kind("ws");
    let slug = format!("c{}", uuid::Uuid::new_v4().simple())[..15].to_string();

    let mut handles = Vec::new();
    for i in 0..16 {
        let pool = pool.clone();
        let data = NewBlock::new(AUTHOR, kind.clone(), format!("Title {}", i)).slug(slug.clone());
        handles.push(tokio::spawn(async move { Block::create(&pool, &mut rand::rngs::OsRng, data).await }));
    }

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap().unwrap().id);
    }
    ids.dedup();
    assert_eq!(ids.len(), 1);

    let (rows,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM blocks WHERE slug = $1")
        .bind(&slug)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(rows, 1);
}
