//! Merging token predictions into character spans.

use tracing::warn;

use crate::types::Entity;

/// A span under construction.
#[derive(Debug, Clone)]
pub(crate) struct OpenSpan {
    label: String,
    start: usize,
    end: usize,
    tokens: Vec<String>,
    confidence_sum: f32,
}

impl OpenSpan {
    fn new(label: &str, (start, end): (usize, usize), token: &str, confidence: f32) -> Self {
        Self {
            label: label.to_string(),
            start,
            end,
            tokens: vec![token.to_string()],
            confidence_sum: confidence,
        }
    }

    fn extend(&mut self, end: usize, token: &str, confidence: f32) {
        self.end = end;
        self.tokens.push(token.to_string());
        self.confidence_sum += confidence;
    }

    /// Running arithmetic mean over every contributing token.
    fn confidence(&self) -> f32 {
        (self.confidence_sum / self.tokens.len() as f32).clamp(0.0, 1.0)
    }
}

/// Accumulates consecutive same-label tokens and emits repaired entities.
pub(crate) struct SpanMerger<'a> {
    text: &'a str,
    current: Option<OpenSpan>,
    entities: Vec<Entity>,
}

impl<'a> SpanMerger<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            text,
            current: None,
            entities: Vec::new(),
        }
    }

    /// Feed one entity-labelled token.
    pub fn push(&mut self, label: &str, offsets: (usize, usize), token: &str, confidence: f32) {
        if let Some(span) = self.current.as_mut().filter(|s| s.label == label) {
            span.extend(offsets.1, token, confidence);
            return;
        }
        self.close();
        self.current = Some(OpenSpan::new(label, offsets, token, confidence));
    }

    /// Close the open span, if any. Called for non-entity and structural tokens.
    pub fn close(&mut self) {
        if let Some(span) = self.current.take() {
            let confidence = span.confidence();
            match repair_bounds(span.start, span.end, self.text) {
                Some((start, end)) => self.entities.push(Entity {
                    label: span.label,
                    start_offset: start,
                    end_offset: end,
                    text: self.text[start..end].to_string(),
                    contributing_tokens: span.tokens,
                    confidence,
                }),
                None => warn!(
                    label = %span.label,
                    start = span.start,
                    end = span.end,
                    "dropping span: original text is empty"
                ),
            }
        }
    }

    pub fn finish(mut self) -> Vec<Entity> {
        self.close();
        self.entities
    }
}

/// Clamp a span into `text` and make it non-empty.
///
/// Offsets are clamped to the text length and snapped outward to char
/// boundaries. A span that collapses is widened by one character: forward
/// when there is room, otherwise backward from the end of the text.
/// Returns `None` only for empty text, which has no valid span.
pub fn repair_bounds(start: usize, end: usize, text: &str) -> Option<(usize, usize)> {
    let len = text.len();
    if len == 0 {
        return None;
    }

    let mut start = floor_char_boundary(text, start.min(len));
    let mut end = ceil_char_boundary(text, end.min(len));

    if start >= end {
        if start < len {
            end = next_char_boundary(text, start);
        } else {
            end = len;
            start = prev_char_boundary(text, len);
        }
    }

    Some((start, end))
}

fn floor_char_boundary(text: &str, mut idx: usize) -> usize {
    while !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn ceil_char_boundary(text: &str, mut idx: usize) -> usize {
    while !text.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}

fn next_char_boundary(text: &str, idx: usize) -> usize {
    text[idx..]
        .chars()
        .next()
        .map_or(text.len(), |c| idx + c.len_utf8())
}

fn prev_char_boundary(text: &str, idx: usize) -> usize {
    text[..idx]
        .chars()
        .next_back()
        .map_or(0, |c| idx - c.len_utf8())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_span_is_untouched() {
        assert_eq!(repair_bounds(0, 6, "Arctic Explorer"), Some((0, 6)));
    }

    #[test]
    fn end_past_text_is_clamped() {
        assert_eq!(repair_bounds(7, 40, "Arctic Explorer"), Some((7, 15)));
    }

    #[test]
    fn zero_width_span_widens_forward() {
        assert_eq!(repair_bounds(3, 3, "Norway"), Some((3, 4)));
    }

    #[test]
    fn span_at_end_shifts_back() {
        assert_eq!(repair_bounds(6, 6, "Norway"), Some((5, 6)));
        assert_eq!(repair_bounds(10, 12, "Norway"), Some((5, 6)));
    }

    #[test]
    fn inverted_span_widens_from_start() {
        assert_eq!(repair_bounds(4, 2, "Norway"), Some((4, 5)));
    }

    #[test]
    fn empty_text_has_no_span() {
        assert_eq!(repair_bounds(0, 0, ""), None);
    }

    #[test]
    fn multibyte_offsets_snap_to_char_boundaries() {
        let text = "Tromsø port";
        // 'ø' occupies bytes 5..7
        assert_eq!(repair_bounds(6, 6, text), Some((5, 7)));
        assert_eq!(repair_bounds(0, 6, text), Some((0, 7)));
        let (s, e) = repair_bounds(11, 11, "Ålesund").unwrap();
        assert_eq!(&"Ålesund"[s..e], "d");
    }

    #[test]
    fn merger_averages_all_tokens() {
        let text = "Arctic Explorer Star";
        let mut merger = SpanMerger::new(text);
        merger.push("VESSEL", (0, 6), "arctic", 0.9);
        merger.push("VESSEL", (7, 15), "explorer", 0.6);
        merger.push("VESSEL", (16, 20), "star", 0.3);
        let entities = merger.finish();
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].text, "Arctic Explorer Star");
        assert!((entities[0].confidence - 0.6).abs() < 1e-6);
        assert_eq!(entities[0].contributing_tokens.len(), 3);
    }

    #[test]
    fn label_change_splits_spans() {
        let text = "Oslo Norway";
        let mut merger = SpanMerger::new(text);
        merger.push("PORT", (0, 4), "oslo", 0.8);
        merger.push("FLAG", (5, 11), "norway", 0.7);
        let entities = merger.finish();
        assert_eq!(entities.len(), 2);
        assert_eq!(entities[0].label, "PORT");
        assert_eq!(entities[1].text, "Norway");
    }
}
