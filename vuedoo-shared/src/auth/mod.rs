/// Authentication and authorization
///
/// # Modules
///
/// - [`access`]: resolves the domain and access key headers of a request
/// - [`privilege`]: per-block capability grants stored as metas
/// - [`password`]: Argon2id hashing of placeholder passwords
///
/// # Example
///
/// ```no_run
/// use vuedoo_shared::auth::access::resolve;
/// use vuedoo_shared::auth::privilege::{Capability, Privileges};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool, key: &str) -> Result<(), Box<dyn std::error::Error>> {
/// let ctx = resolve(&pool, "shop.example.com", key).await?;
/// let admin = Privileges::has(&pool, "workspace", 42, ctx.user_id, &Capability::admin()).await?;
/// # Ok(())
/// # }
/// ```

pub mod access;
pub mod password;
pub mod privilege;
