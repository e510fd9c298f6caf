pub mod activity_api;
pub mod item_source;
pub mod page;
pub mod storage;
pub mod terminal;

pub use activity_api::{ActivityApi, ActivitySnapshot, ApiError};
pub use item_source::{Item, ItemSource};
pub use page::{ClickTarget, Control, ControlRef, Focus, Page, Row, RowEvent, RowListener};
pub use storage::{KeyValueStore, StorageError};
pub use terminal::{KeyCode, KeyEvent, KeyModifiers, Terminal, TerminalEvent};
