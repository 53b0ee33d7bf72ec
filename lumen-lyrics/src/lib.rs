//! Timed-lyric parsing and synchronization for Lumen
//!
//! Raw lyric text is newline-separated; a line carries a leading
//! `[MM:SS.mmm]` timestamp or it is dropped. Parsed lines form a
//! non-overlapping timeline queryable by playback position.

mod sheet;

pub use sheet::{LyricCursor, LyricLine, LyricSheet, LyricWord};
