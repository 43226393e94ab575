pub mod format;
pub mod telegram;
pub mod updates;
