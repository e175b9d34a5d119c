pub mod chat_history;
pub mod preferences;
pub mod saved_items;

pub use self::chat_history::ChatHistoryStore;
pub use self::preferences::ThemeStore;
pub use self::saved_items::SavedItemsStore;
