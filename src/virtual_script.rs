//! Text rewriting with offset bookkeeping.
//!
//! The builder interleaves verbatim copies of the original text with
//! injected text. Copies become linear [`Segment`]s; injected text becomes a
//! [`Fragment`] anchored at the original offset where it was inserted.
//! [`OffsetMap`] answers virtual → original queries afterwards.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub virtual_start: usize,
    pub original_start: usize,
    pub len: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Fragment {
    pub virtual_start: usize,
    pub virtual_end: usize,
    /// Original offset the text was injected at.
    pub anchor: usize,
}

pub struct VirtualScriptBuilder<'s> {
    original: &'s str,
    code: String,
    consumed: usize,
    segments: Vec<Segment>,
    fragments: Vec<Fragment>,
}

impl<'s> VirtualScriptBuilder<'s> {
    pub fn new(original: &'s str) -> Self {
        Self {
            original,
            code: String::with_capacity(original.len() + 64),
            consumed: 0,
            segments: vec![Segment {
                virtual_start: 0,
                original_start: 0,
                len: 0,
            }],
            fragments: Vec::new(),
        }
    }

    pub fn original(&self) -> &'s str {
        self.original
    }

    /// Original offset up to which text has been copied or skipped.
    pub fn consumed(&self) -> usize {
        self.consumed
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    fn push_segment(&mut self, original_start: usize, len: usize) {
        let virtual_start = self.code.len();
        if let Some(last) = self.segments.last_mut() {
            if last.len == 0 && last.virtual_start == virtual_start {
                *last = Segment {
                    virtual_start,
                    original_start,
                    len,
                };
                return;
            }
            if len > 0
                && last.virtual_start + last.len == virtual_start
                && last.original_start + last.len == original_start
            {
                last.len += len;
                return;
            }
        }
        self.segments.push(Segment {
            virtual_start,
            original_start,
            len,
        });
    }

    /// Copies the original text up to `index`. A no-op if already past it.
    pub fn append_original(&mut self, index: usize) {
        let index = index.min(self.original.len());
        if index <= self.consumed {
            return;
        }
        self.push_segment(self.consumed, index - self.consumed);
        self.code.push_str(&self.original[self.consumed..index]);
        self.consumed = index;
    }

    /// Injects text that has no counterpart in the original.
    pub fn append_virtual(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let virtual_start = self.code.len();
        self.code.push_str(text);
        self.fragments.push(Fragment {
            virtual_start,
            virtual_end: self.code.len(),
            anchor: self.consumed,
        });
    }

    /// Replaces the next `text.len()` original bytes one-for-one with `text`.
    /// Positions inside the replaced span map linearly.
    pub fn append_replacement(&mut self, text: &str) {
        let len = text.len().min(self.original.len() - self.consumed);
        self.push_segment(self.consumed, len);
        self.code.push_str(&text[..len]);
        self.consumed += len;
    }

    pub fn skip_original(&mut self, len: usize) {
        self.skip_until(self.consumed + len);
    }

    /// Drops original text up to `index` without copying it.
    pub fn skip_until(&mut self, index: usize) {
        let index = index.min(self.original.len());
        if index <= self.consumed {
            return;
        }
        self.consumed = index;
        self.push_segment(index, 0);
    }

    pub fn finish(self) -> (String, OffsetMap) {
        (
            self.code,
            OffsetMap {
                segments: self.segments,
                fragments: self.fragments,
            },
        )
    }
}

/// Virtual → original offset correspondence.
#[derive(Debug, Clone, Serialize)]
pub struct OffsetMap {
    segments: Vec<Segment>,
    fragments: Vec<Fragment>,
}

impl OffsetMap {
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    fn fragment_containing_start(&self, v: usize) -> Option<&Fragment> {
        let i = self.fragments.partition_point(|f| f.virtual_start <= v);
        self.fragments[..i].last().filter(|f| v < f.virtual_end)
    }

    fn fragment_containing_end(&self, v: usize) -> Option<&Fragment> {
        let i = self.fragments.partition_point(|f| f.virtual_start < v);
        self.fragments[..i].last().filter(|f| v <= f.virtual_end)
    }

    /// Start offsets inside injected text move forward to its end.
    pub fn map_start(&self, v: usize) -> usize {
        let mut v = v;
        while let Some(f) = self.fragment_containing_start(v) {
            v = f.virtual_end;
        }
        let i = self
            .segments
            .partition_point(|s| s.virtual_start <= v)
            .saturating_sub(1);
        let s = &self.segments[i];
        s.original_start + (v.saturating_sub(s.virtual_start)).min(s.len)
    }

    /// End offsets inside injected text move back to its start.
    pub fn map_end(&self, v: usize) -> usize {
        let mut v = v;
        while let Some(f) = self.fragment_containing_end(v) {
            v = f.virtual_start;
        }
        let i = self
            .segments
            .partition_point(|s| s.virtual_start < v)
            .saturating_sub(1);
        let s = &self.segments[i];
        s.original_start + (v.saturating_sub(s.virtual_start)).min(s.len)
    }

    /// The anchor of the injected run covering all of `[start, end)`, if
    /// the range is made only of injected text.
    pub fn injected_anchor(&self, [start, end]: [usize; 2]) -> Option<usize> {
        if start >= end {
            return None;
        }
        let first = self.fragment_containing_start(start)?;
        let anchor = first.anchor;
        let mut cursor = first.virtual_end;
        while cursor < end {
            let next = self.fragment_containing_start(cursor)?;
            cursor = next.virtual_end;
        }
        Some(anchor)
    }

    pub fn remap_range(&self, range: [usize; 2]) -> [usize; 2] {
        let [start, end] = range;
        if start == end {
            let at = self.map_start(start);
            return [at, at];
        }
        if let Some(anchor) = self.injected_anchor(range) {
            return [anchor, anchor];
        }
        let (s, e) = (self.map_start(start), self.map_end(end));
        if e < s {
            [e, s]
        } else {
            [s, e]
        }
    }

    /// Original → virtual for offsets inside copied text.
    pub fn original_to_virtual(&self, original: usize) -> Option<usize> {
        self.segments
            .iter()
            .filter(|s| s.len > 0)
            .find(|s| s.original_start <= original && original < s.original_start + s.len)
            .map(|s| s.virtual_start + (original - s.original_start))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copied_text_maps_linearly() {
        let src = "abc<!-- x -->def";
        let mut b = VirtualScriptBuilder::new(src);
        b.append_original(3);
        b.append_virtual("0;");
        b.skip_until(13);
        b.append_original(src.len());
        let (code, map) = b.finish();
        assert_eq!(code, "abc0;def");
        assert_eq!(map.map_start(0), 0);
        assert_eq!(map.map_start(5), 13);
        assert_eq!(map.map_end(8), 16);
        // the placeholder collapses to where it was injected
        assert_eq!(map.remap_range([3, 5]), [3, 3]);
        // a range that covers copied text on both sides spans the skip
        assert_eq!(map.remap_range([1, 6]), [1, 14]);
    }

    #[test]
    fn test_range_edges_inside_injected_text_snap_outward_to_source() {
        let src = "<a>";
        let mut b = VirtualScriptBuilder::new(src);
        b.append_virtual("<>");
        b.append_original(3);
        b.append_virtual("</>;");
        let (code, map) = b.finish();
        assert_eq!(code, "<><a></>;");
        assert_eq!(map.remap_range([0, 8]), [0, 3]);
        assert_eq!(map.remap_range([0, 9]), [0, 3]);
        assert!(map.injected_anchor([5, 9]).is_some());
        assert!(map.injected_anchor([2, 5]).is_none());
    }

    #[test]
    fn test_replacement_keeps_positions() {
        let src = "a:b";
        let mut b = VirtualScriptBuilder::new(src);
        b.append_original(1);
        b.append_replacement("_");
        b.append_original(3);
        let (code, map) = b.finish();
        assert_eq!(code, "a_b");
        assert_eq!(map.remap_range([0, 3]), [0, 3]);
        assert_eq!(map.map_start(2), 2);
    }

    #[test]
    fn test_breakpoints_round_trip() {
        let src = "---\nlet a;\n---\n<p>{a}</p>";
        let mut b = VirtualScriptBuilder::new(src);
        b.skip_original(3);
        b.append_original(10);
        b.append_virtual("\n;");
        b.skip_until(14);
        b.append_original(15);
        b.append_virtual("<>");
        b.append_original(src.len());
        b.append_virtual("</>;");
        let (_, map) = b.finish();
        for seg in map.segments().iter().filter(|s| s.len > 0) {
            let original = map.map_start(seg.virtual_start);
            assert_eq!(map.original_to_virtual(original), Some(seg.virtual_start));
        }
    }
}
