/// Plan summary returned next to a user's workspace list
///
/// Billing writes a JSON object into the user's `subscription` meta. Reading
/// it back merges that object with the user id and a live count of the
/// threads under the user's workspaces. Users without a plan get an empty
/// `expiry_date`.

use serde_json::{Map, Value};
use sqlx::PgPool;

use super::block::{kinds, Block};
use super::meta::{Meta, MetaError, MetaOwner};

/// Meta key holding the billing record
pub const SUBSCRIPTION_KEY: &str = "subscription";

/// Builds the summary object for `user_id`
pub async fn subscription_info(pool: &PgPool, user_id: i64) -> Result<Map<String, Value>, MetaError> {
    let stored = Meta::get(pool, &MetaOwner::user(user_id), SUBSCRIPTION_KEY).await?;
    let threads = Block::count_children_of_author(pool, user_id, kinds::WORKSPACE, kinds::THREAD).await?;

    Ok(merge_subscription(user_id, stored.as_deref(), threads))
}

/// Merges a stored subscription record into the summary
///
/// Keys from the record win over `user_id`; a record that is not a JSON
/// object is ignored. `threads` is always the live count.
pub fn merge_subscription(user_id: i64, stored: Option<&str>, threads: i64) -> Map<String, Value> {
    let mut info = Map::new();
    info.insert("user_id".to_string(), Value::from(user_id));

    match stored.map(serde_json::from_str::<Value>) {
        Some(Ok(Value::Object(record))) => info.extend(record),
        Some(Ok(_)) | Some(Err(_)) => {
            tracing::warn!(user_id, "Ignoring malformed subscription meta");
        }
        None => {
            info.insert("expiry_date".to_string(), Value::from(""));
        }
    }

    info.insert("threads".to_string(), Value::from(threads));
    info
}
