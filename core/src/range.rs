//! Text ranges and offset helpers
//!
//! All offsets in prosefix are character offsets (Unicode scalar values),
//! half-open `[start, end)`. These helpers convert them to byte offsets
//! before touching a `String`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Half-open character range `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TextRange {
    pub start: usize,
    pub end: usize,
}

impl TextRange {
    /// Create a range, swapping the bounds if they are reversed
    pub fn new(start: usize, end: usize) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self {
                start: end,
                end: start,
            }
        }
    }

    /// Range covering a whole text of `len` characters
    pub fn whole(len: usize) -> Self {
        Self { start: 0, end: len }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Two ranges overlap iff `s1 < e2 && s2 < e1`.
    ///
    /// Empty ranges never overlap anything, including themselves.
    pub fn overlaps(&self, other: &TextRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Whether `other` lies entirely inside this range
    pub fn contains_range(&self, other: &TextRange) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Shift both bounds by `offset` characters
    pub fn offset_by(&self, offset: usize) -> Self {
        Self {
            start: self.start + offset,
            end: self.end + offset,
        }
    }
}

impl fmt::Display for TextRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

impl std::str::FromStr for TextRange {
    type Err = String;

    /// Parses `START..END`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (start, end) = s
            .split_once("..")
            .ok_or_else(|| format!("expected START..END, got '{}'", s))?;
        let start = start
            .trim()
            .parse::<usize>()
            .map_err(|e| format!("invalid start '{}': {}", start, e))?;
        let end = end
            .trim()
            .parse::<usize>()
            .map_err(|e| format!("invalid end '{}': {}", end, e))?;
        if start > end {
            return Err(format!("start {} is after end {}", start, end));
        }
        Ok(Self { start, end })
    }
}

/// Number of characters in `text`
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Byte offset of the `char_idx`-th character. `char_idx == char_len` maps to `text.len()`.
pub fn char_to_byte(text: &str, char_idx: usize) -> Option<usize> {
    if char_idx == 0 {
        return Some(0);
    }
    let mut count = 0;
    for (byte_idx, _) in text.char_indices() {
        if count == char_idx {
            return Some(byte_idx);
        }
        count += 1;
    }
    if count == char_idx {
        Some(text.len())
    } else {
        None
    }
}

/// Byte range of a character range, if it lies within `text`
pub fn byte_range(text: &str, range: TextRange) -> Option<std::ops::Range<usize>> {
    let start = char_to_byte(text, range.start)?;
    let end = char_to_byte(text, range.end)?;
    Some(start..end)
}

/// Slice `text` by character range
pub fn slice_chars(text: &str, range: TextRange) -> Option<&str> {
    byte_range(text, range).map(|r| &text[r])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlap_rule() {
        let a = TextRange::new(0, 5);
        assert!(a.overlaps(&TextRange::new(4, 8)));
        assert!(a.overlaps(&TextRange::new(1, 2)));
        assert!(!a.overlaps(&TextRange::new(5, 9)));
        assert!(!TextRange::new(5, 9).overlaps(&a));
        assert!(!a.overlaps(&TextRange::new(3, 3)));
    }

    #[test]
    fn test_new_swaps_reversed_bounds() {
        assert_eq!(TextRange::new(7, 4), TextRange { start: 4, end: 7 });
    }

    #[test]
    fn test_parse_range() {
        assert_eq!("4..7".parse::<TextRange>().unwrap(), TextRange::new(4, 7));
        assert!("7..4".parse::<TextRange>().is_err());
        assert!("4-7".parse::<TextRange>().is_err());
    }

    #[test]
    fn test_char_offsets_multibyte() {
        let text = "héllo wörld";
        assert_eq!(char_len(text), 11);
        assert_eq!(char_to_byte(text, 2), Some(3));
        assert_eq!(char_to_byte(text, 11), Some(text.len()));
        assert_eq!(char_to_byte(text, 12), None);
        assert_eq!(slice_chars(text, TextRange::new(6, 11)), Some("wörld"));
    }

    #[test]
    fn test_slice_out_of_bounds() {
        assert_eq!(slice_chars("abc", TextRange::new(1, 4)), None);
        assert_eq!(slice_chars("abc", TextRange::new(3, 3)), Some(""));
    }
}
