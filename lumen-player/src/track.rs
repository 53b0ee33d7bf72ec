//! Track model

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Unique track identifier within a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackId(pub u64);

/// Counter for synthetic ids handed to tracks that arrive without one
static NEXT_ID: AtomicU64 = AtomicU64::new(1);

impl TrackId {
    /// Allocate a fresh synthetic id
    pub fn next() -> Self {
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Immutable track description, shared as `Arc<Track>`
///
/// Identity is the id alone; two tracks with the same id are the same
/// queue entry regardless of the other fields.
#[derive(Debug, Clone)]
pub struct Track {
    pub id: TrackId,
    pub name: String,
    pub artists: Vec<String>,
    pub artwork_url: String,
    /// Path or URL handed to the loader
    pub playable_url: String,
    /// Raw timed-lyric text; None means no lyrics
    pub lyric_text: Option<String>,
    /// Duration claimed by metadata, replaced by the decoded duration on load
    pub duration_hint: Option<f64>,
}

impl PartialEq for Track {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Track {}

impl Track {
    /// Minimal track from a playable path
    pub fn from_path(playable_url: impl Into<String>) -> Arc<Self> {
        let playable_url = playable_url.into();
        let name = std::path::Path::new(&playable_url)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("Unknown")
            .to_string();

        Arc::new(Self {
            id: TrackId::next(),
            name,
            artists: Vec::new(),
            artwork_url: String::new(),
            playable_url,
            lyric_text: None,
            duration_hint: None,
        })
    }

    pub fn with_lyrics(mut self: Arc<Self>, lyric_text: String) -> Arc<Self> {
        let track = Arc::make_mut(&mut self);
        track.lyric_text = Some(lyric_text);
        self
    }
}
