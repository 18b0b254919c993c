//! Hallucination guard.
//!
//! Models sometimes start writing the next turn of the conversation
//! themselves. The guard scans the accumulated output for configured
//! antiprompt markers and reports the earliest one so the caller can cut the
//! text there and stop generation.
//!
//! Matching is ASCII case-insensitive. Lower-casing ASCII never changes byte
//! offsets, so positions found in the lowered text are valid in the original.

use tracing::warn;

/// A marker found in the accumulated text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AntipromptMatch {
    /// The configured marker that matched.
    pub marker: String,

    /// Byte offset of the match start in the accumulated text.
    pub position: usize,
}

#[derive(Debug, Clone)]
struct Marker {
    original: String,
    lowered: String,
}

/// Scans generated text for antiprompt markers.
#[derive(Debug, Clone)]
pub struct AntipromptGuard {
    markers: Vec<Marker>,
    max_marker_len: usize,
}

impl AntipromptGuard {
    /// Build a guard from the configured markers. Empty markers are ignored.
    pub fn new<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let markers: Vec<Marker> = markers
            .into_iter()
            .map(Into::into)
            .filter(|m: &String| !m.is_empty())
            .map(|original| Marker {
                lowered: original.to_ascii_lowercase(),
                original,
            })
            .collect();
        let max_marker_len = markers.iter().map(|m| m.lowered.len()).max().unwrap_or(0);

        Self {
            markers,
            max_marker_len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    /// Find the earliest marker in `text` that ends at or after `scan_from`.
    ///
    /// `scan_from` is the length of the text before the newest chunk was
    /// appended. Everything before it was already checked, so only the tail
    /// starting `max_marker_len - 1` bytes earlier needs scanning; that
    /// overlap catches markers split across a chunk boundary.
    pub fn detect(&self, text: &str, scan_from: usize) -> Option<AntipromptMatch> {
        if self.markers.is_empty() {
            return None;
        }

        let mut start = scan_from
            .min(text.len())
            .saturating_sub(self.max_marker_len.saturating_sub(1));
        while !text.is_char_boundary(start) {
            start -= 1;
        }

        let haystack = text[start..].to_ascii_lowercase();
        self.markers
            .iter()
            .filter_map(|m| {
                haystack.find(&m.lowered).map(|offset| AntipromptMatch {
                    marker: m.original.clone(),
                    position: start + offset,
                })
            })
            .min_by_key(|m| m.position)
    }

    /// Scan the full text.
    pub fn detect_all(&self, text: &str) -> Option<AntipromptMatch> {
        self.detect(text, 0)
    }

    /// Check the text after a chunk was appended and cut it at the first
    /// marker. Returns the match when the text was truncated.
    pub fn check_and_truncate(&self, text: &mut String, scan_from: usize) -> Option<AntipromptMatch> {
        let found = self.detect(text, scan_from)?;
        warn!(
            marker = found.marker,
            position = found.position,
            "Detected hallucination with antiprompt"
        );
        text.truncate(found.position);
        Some(found)
    }
}

impl Default for AntipromptGuard {
    fn default() -> Self {
        Self::new(["!@>"])
    }
}
