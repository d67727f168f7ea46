pub mod bookmarks;
pub mod news;
pub mod theme;

pub use bookmarks::{BookmarkListener, BookmarkRepository};
pub use news::{NewsPager, NewsRepository};
pub use theme::ThemeManager;
