//! Lyric sheet - parse timed lyric text, query by playback position

use regex::Regex;
use std::sync::OnceLock;

/// Tail duration appended to the last line, which has no successor
const LAST_LINE_TAIL: f64 = 10.0;

static TIMESTAMP: OnceLock<Regex> = OnceLock::new();

fn timestamp_re() -> &'static Regex {
    // Minutes, then seconds with a mandatory fractional part, then the text
    TIMESTAMP.get_or_init(|| Regex::new(r"\[(\d+):(\d+\.\d+)\](.*)").expect("valid regex"))
}

/// One displayable unit of a line, with its share of the line's interval
#[derive(Debug, Clone, PartialEq)]
pub struct LyricWord {
    pub text: String,
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds (exclusive)
    pub end: f64,
}

/// A timed lyric line; words partition `[start_time, end_time)` evenly
#[derive(Debug, Clone, PartialEq)]
pub struct LyricLine {
    pub start_time: f64,
    pub end_time: f64,
    pub words: Vec<LyricWord>,
}

/// Active line/word indexes for highlighting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LyricCursor {
    pub line: usize,
    /// None for a timestamp-only (empty) line
    pub word: Option<usize>,
}

/// Parsed lyric timeline for one track
///
/// Rebuilt whenever the active track's lyric text changes; an absent or
/// unparseable text yields an empty sheet, never an error.
#[derive(Debug, Clone, Default)]
pub struct LyricSheet {
    lines: Vec<LyricLine>,
}

impl LyricSheet {
    /// Parse raw timed-lyric text into a sheet
    ///
    /// Lines without a timestamp prefix are silently dropped. Entries are
    /// sorted by timestamp so out-of-order input still yields a monotonic
    /// timeline. Each line's end time is the next line's start time; the
    /// last line gets a fixed tail.
    pub fn parse(raw: &str) -> Self {
        let re = timestamp_re();

        let mut entries: Vec<(f64, String)> = raw
            .lines()
            .filter_map(|line| {
                let caps = re.captures(line)?;
                let minutes: f64 = caps[1].parse().ok()?;
                let seconds: f64 = caps[2].parse().ok()?;
                Some((minutes * 60.0 + seconds, caps[3].trim().to_string()))
            })
            .collect();

        entries.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut lines = Vec::with_capacity(entries.len());
        for (i, (start_time, text)) in entries.iter().enumerate() {
            let end_time = entries
                .get(i + 1)
                .map(|next| next.0)
                .unwrap_or(start_time + LAST_LINE_TAIL);

            let chars: Vec<char> = text.chars().collect();
            let words = if chars.is_empty() {
                Vec::new()
            } else {
                let word_duration = (end_time - start_time) / chars.len() as f64;
                chars
                    .iter()
                    .enumerate()
                    .map(|(j, c)| LyricWord {
                        text: c.to_string(),
                        start: start_time + j as f64 * word_duration,
                        end: start_time + (j + 1) as f64 * word_duration,
                    })
                    .collect()
            };

            lines.push(LyricLine {
                start_time: *start_time,
                end_time,
                words,
            });
        }

        Self { lines }
    }

    pub fn lines(&self) -> &[LyricLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Find the active line and word for playback position `t`
    ///
    /// Before the first line's start there is no active line; past the last
    /// line's end the last line stays selected. Word-boundary ties resolve
    /// to the later word.
    pub fn cursor_at(&self, t: f64) -> Option<LyricCursor> {
        if self.lines.is_empty() {
            return None;
        }

        // First line whose start is strictly after t
        let after = self.lines.partition_point(|line| line.start_time <= t);
        if after == 0 {
            return None;
        }

        let candidate = after - 1;
        let line = &self.lines[candidate];
        let past_end = t >= line.end_time;
        if past_end && candidate + 1 != self.lines.len() {
            // Lines abut, so this only happens for the last line
            return None;
        }

        let word = if line.words.is_empty() {
            None
        } else if past_end {
            Some(line.words.len() - 1)
        } else {
            let span = line.end_time - line.start_time;
            let idx = ((t - line.start_time) / span * line.words.len() as f64).floor() as usize;
            Some(idx.min(line.words.len() - 1))
        };

        Some(LyricCursor {
            line: candidate,
            word,
        })
    }
}
