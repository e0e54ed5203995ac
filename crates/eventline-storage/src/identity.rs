//! Persistent user identity

use tracing::{info, warn};
use uuid::Uuid;

use super::store::KeyValueStore;

/// Storage key of the generated user id
pub const USER_ID_KEY: &str = "user_id";

/// Return the stored user id, generating and persisting one on first use
///
/// A failed write is logged and the generated id is still returned, so the
/// current process keeps a stable id even if the next one will not.
pub async fn load_or_create_user_id(store: &dyn KeyValueStore) -> String {
    match store.get(USER_ID_KEY).await {
        Ok(Some(id)) if !id.trim().is_empty() => return id,
        Ok(_) => {}
        Err(e) => warn!(error = %e, "Failed to read user id, generating a new one"),
    }

    let id = Uuid::new_v4().to_string();
    match store.set(USER_ID_KEY, id.clone()).await {
        Ok(()) => info!(user_id = %id, "Generated new user id"),
        Err(e) => warn!(user_id = %id, error = %e, "Failed to persist generated user id"),
    }
    id
}
