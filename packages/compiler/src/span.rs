//! Text and source spans shared by every downstream component.

use serde::{Deserialize, Serialize};

use crate::identity::SourceFileId;

/// A half-open byte range `[start, end)` within a single document.
///
/// `start <= end` always holds; callers that compute a span by subtraction
/// must clamp rather than let `end` slide below `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TextSpan {
    pub start: u32,
    pub end: u32,
}

impl TextSpan {
    pub fn new(start: u32, end: u32) -> Self {
        debug_assert!(start <= end, "TextSpan start must not exceed end");
        TextSpan { start, end }
    }

    pub fn empty_at(offset: u32) -> Self {
        TextSpan { start: offset, end: offset }
    }

    pub fn len(&self) -> u32 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Shift both endpoints by `delta`, saturating at zero.
    pub fn offset(&self, delta: i64) -> Self {
        let shift = |v: u32| -> u32 {
            let shifted = v as i64 + delta;
            if shifted < 0 { 0 } else { shifted as u32 }
        };
        TextSpan { start: shift(self.start), end: shift(self.end) }
    }

    pub fn contains(&self, offset: u32) -> bool {
        offset >= self.start && offset < self.end
    }

    /// Whether `offset` falls inside the span, treating a zero-length span
    /// as containing the single point at its own offset.
    pub fn contains_inclusive(&self, offset: u32) -> bool {
        if self.is_empty() {
            offset == self.start
        } else {
            self.contains(offset)
        }
    }

    pub fn intersects(&self, other: &TextSpan) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn intersect(&self, other: &TextSpan) -> Option<TextSpan> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        if start <= end {
            Some(TextSpan::new(start, end))
        } else {
            None
        }
    }

    /// The smallest span containing both `self` and `other`.
    pub fn union(&self, other: &TextSpan) -> TextSpan {
        TextSpan::new(self.start.min(other.start), self.end.max(other.end))
    }

    /// Given a set of candidate spans that all contain `offset`, pick the
    /// narrowest one. Used by provenance lookups that must prefer a
    /// member-level hit over an expression-level one.
    pub fn narrowest_containing<'a, I>(offset: u32, candidates: I) -> Option<&'a TextSpan>
    where
        I: IntoIterator<Item = &'a TextSpan>,
    {
        candidates
            .into_iter()
            .filter(|s| s.contains_inclusive(offset))
            .min_by_key(|s| s.len())
    }

    pub fn slice<'a>(&self, text: &'a str) -> &'a str {
        &text[self.start as usize..self.end as usize]
    }
}

/// A [`TextSpan`] tagged with the file it was authored in. `file` is `None`
/// for spans inside synthetic documents (e.g. overlays before they are
/// written out).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceSpan {
    pub span: TextSpan,
    pub file: Option<SourceFileId>,
}

impl SourceSpan {
    pub fn new(span: TextSpan, file: Option<SourceFileId>) -> Self {
        SourceSpan { span, file }
    }

    pub fn in_file(file: SourceFileId, start: u32, end: u32) -> Self {
        SourceSpan { span: TextSpan::new(start, end), file: Some(file) }
    }

    pub fn same_file(&self, other: &SourceSpan) -> bool {
        self.file == other.file
    }

    pub fn len(&self) -> u32 {
        self.span.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intersect_overlapping() {
        let a = TextSpan::new(0, 10);
        let b = TextSpan::new(5, 15);
        assert_eq!(a.intersect(&b), Some(TextSpan::new(5, 10)));
    }

    #[test]
    fn intersect_disjoint() {
        let a = TextSpan::new(0, 5);
        let b = TextSpan::new(10, 15);
        assert_eq!(a.intersect(&b), None);
    }

    #[test]
    fn contains_is_half_open() {
        let s = TextSpan::new(2, 5);
        assert!(!s.contains(5));
        assert!(s.contains(4));
        assert!(!s.contains(1));
    }

    #[test]
    fn narrowest_containing_prefers_smaller() {
        let outer = TextSpan::new(0, 20);
        let inner = TextSpan::new(4, 8);
        let spans = vec![outer, inner];
        let found = TextSpan::narrowest_containing(5, spans.iter()).unwrap();
        assert_eq!(*found, inner);
    }

    #[test]
    fn offset_saturates_at_zero() {
        let s = TextSpan::new(2, 4);
        assert_eq!(s.offset(-10), TextSpan::new(0, 0));
    }
}
