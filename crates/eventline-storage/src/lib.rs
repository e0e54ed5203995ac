// Eventline storage
//
// KeyValueStore is the host's persistent string storage. On top of it sit the
// task log (the ordered list of events awaiting or having had delivery) and
// the generated user id.

pub mod file;
pub mod identity;
pub mod memory;
pub mod store;
pub mod task_log;

pub use file::FileKeyValueStore;
pub use identity::{load_or_create_user_id, USER_ID_KEY};
pub use memory::InMemoryKeyValueStore;
pub use store::{KeyValueStore, StoreError};
pub use task_log::{TaskLog, TASK_LOG_KEY};
