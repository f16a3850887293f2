//! App - バックグラウンドループ
//!
//! - **ReaperLoop**: Deleted になったワーカーを定期的に pool から外す

pub mod reaper_loop;

pub use self::reaper_loop::ReaperLoop;
