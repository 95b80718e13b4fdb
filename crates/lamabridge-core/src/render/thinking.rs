//! Incremental detection of thinking segments in streamed model output.
//!
//! Markers can arrive split across increments (`<thi` + `nk>`), so any tail
//! of the pending text that could still become a marker is held back until
//! the next increment or `finish`.

use lamabridge_types::config::ThinkingDisplay;
use lamabridge_types::model::ThinkingMarkers;

/// Filters thinking segments out of (or quotes them in) streamed text.
#[derive(Debug)]
pub struct ThinkingFilter {
    markers: Option<ThinkingMarkers>,
    display: ThinkingDisplay,
    pending: String,
    in_thinking: bool,
    /// Drop whitespace until the first visible character after a marker.
    skip_whitespace: bool,
    /// Next quoted character starts a new `> ` line.
    quote_line_start: bool,
    /// Whether the current thinking segment produced any quoted output.
    quoted_any: bool,
}

impl ThinkingFilter {
    /// A filter for `markers`; `None` passes text through unchanged.
    pub fn new(markers: Option<ThinkingMarkers>, display: ThinkingDisplay) -> Self {
        Self {
            markers,
            display,
            pending: String::new(),
            in_thinking: false,
            skip_whitespace: false,
            quote_line_start: true,
            quoted_any: false,
        }
    }

    /// Feed one increment; returns the display text it releases.
    pub fn push(&mut self, chunk: &str) -> String {
        let Some(markers) = self.markers.clone() else {
            return chunk.to_string();
        };

        self.pending.push_str(chunk);
        let mut out = String::new();

        loop {
            let marker = if self.in_thinking {
                &markers.suffix
            } else {
                &markers.prefix
            };

            if let Some(pos) = self.pending.find(marker.as_str()) {
                let before: String = self.pending.drain(..pos).collect();
                self.pending.drain(..marker.len());
                self.emit(&before, &mut out);
                self.toggle(&mut out);
                continue;
            }

            let keep = partial_marker_len(&self.pending, marker);
            let release = self.pending.len() - keep;
            let text: String = self.pending.drain(..release).collect();
            self.emit(&text, &mut out);
            break;
        }

        out
    }

    /// Flush held-back text at end of stream.
    ///
    /// An unterminated thinking segment is treated like any other thinking
    /// text (dropped or quoted).
    pub fn finish(&mut self) -> String {
        let rest = std::mem::take(&mut self.pending);
        let mut out = String::new();
        self.emit(&rest, &mut out);
        out
    }

    fn toggle(&mut self, out: &mut String) {
        if self.in_thinking && self.display == ThinkingDisplay::Quoted && self.quoted_any {
            out.push_str(if self.quote_line_start { "\n" } else { "\n\n" });
        }
        self.in_thinking = !self.in_thinking;
        self.skip_whitespace = true;
        self.quote_line_start = true;
        self.quoted_any = false;
    }

    fn emit(&mut self, text: &str, out: &mut String) {
        let text = if self.skip_whitespace {
            let trimmed = text.trim_start();
            if !trimmed.is_empty() {
                self.skip_whitespace = false;
            }
            trimmed
        } else {
            text
        };
        if text.is_empty() {
            return;
        }

        if !self.in_thinking {
            out.push_str(text);
            return;
        }
        if self.display == ThinkingDisplay::Hidden {
            return;
        }

        for c in text.chars() {
            if self.quote_line_start {
                out.push_str("> ");
                self.quote_line_start = false;
            }
            out.push(c);
            if c == '\n' {
                self.quote_line_start = true;
            }
        }
        self.quoted_any = true;
    }
}

/// Length of the longest proper prefix of `marker` that `text` ends with.
fn partial_marker_len(text: &str, marker: &str) -> usize {
    let max = marker.len().saturating_sub(1).min(text.len());
    (1..=max)
        .rev()
        .find(|&k| {
            marker.is_char_boundary(k)
                && text.is_char_boundary(text.len() - k)
                && text.ends_with(&marker[..k])
        })
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn markers() -> Option<ThinkingMarkers> {
        Some(ThinkingMarkers {
            prefix: "<think>".to_string(),
            suffix: "</think>".to_string(),
        })
    }

    fn run(filter: &mut ThinkingFilter, chunks: &[&str]) -> String {
        let mut out = String::new();
        for chunk in chunks {
            out.push_str(&filter.push(chunk));
        }
        out.push_str(&filter.finish());
        out
    }

    #[test]
    fn test_no_markers_pass_through() {
        let mut filter = ThinkingFilter::new(None, ThinkingDisplay::Hidden);
        assert_eq!(run(&mut filter, &["<think>a", "</think> b"]), "<think>a</think> b");
    }

    #[test]
    fn test_hidden_strips_thoughts_and_leading_whitespace() {
        let mut filter = ThinkingFilter::new(markers(), ThinkingDisplay::Hidden);
        let out = run(&mut filter, &["<think>\nplanning\n</think>\n\nHello there"]);
        assert_eq!(out, "Hello there");
    }

    #[test]
    fn test_markers_split_across_increments() {
        let mut filter = ThinkingFilter::new(markers(), ThinkingDisplay::Hidden);
        let out = run(&mut filter, &["<th", "ink>sec", "ret</th", "ink>", " vis", "ible"]);
        assert_eq!(out, "visible");
    }

    #[test]
    fn test_partial_marker_is_held_back_until_resolved() {
        let mut filter = ThinkingFilter::new(markers(), ThinkingDisplay::Hidden);
        assert_eq!(filter.push("a <th"), "a ");
        assert_eq!(filter.push("e"), "<the");
    }

    #[test]
    fn test_quoted_renders_blockquote() {
        let mut filter = ThinkingFilter::new(markers(), ThinkingDisplay::Quoted);
        let out = run(&mut filter, &["<think>\nstep one\nstep two</think>\nAnswer"]);
        assert_eq!(out, "> step one\n> step two\n\nAnswer");
    }

    #[test]
    fn test_quoted_empty_thought_emits_nothing() {
        let mut filter = ThinkingFilter::new(markers(), ThinkingDisplay::Quoted);
        let out = run(&mut filter, &["<think>\n\n</think>\n\nAnswer"]);
        assert_eq!(out, "Answer");
    }

    #[test]
    fn test_unterminated_thought_is_hidden() {
        let mut filter = ThinkingFilter::new(markers(), ThinkingDisplay::Hidden);
        assert_eq!(run(&mut filter, &["<think>never done"]), "");
    }

    #[test]
    fn test_trailing_partial_marker_flushed_on_finish() {
        let mut filter = ThinkingFilter::new(markers(), ThinkingDisplay::Hidden);
        assert_eq!(run(&mut filter, &["ends with <thi"]), "ends with <thi");
    }

    #[test]
    fn test_partial_marker_len_respects_char_boundaries() {
        assert_eq!(partial_marker_len("héllo <", "<think>"), 1);
        assert_eq!(partial_marker_len("é", "<think>"), 0);
        assert_eq!(partial_marker_len("", "<think>"), 0);
    }
}
