pub mod algolia_item_source;
pub mod crossterm_adapter;
pub mod http_activity_api;
pub mod memory_page;
pub mod sqlite_kv_store;

pub use algolia_item_source::AlgoliaItemSource;
pub use crossterm_adapter::CrosstermTerminal;
pub use http_activity_api::HttpActivityApi;
pub use memory_page::{MemoryPage, MemoryRow, PageEvent, RowData};
pub use sqlite_kv_store::SqliteKeyValueStore;
