//! A1-style cell addressing
//!
//! Rows and columns are 1-based everywhere in this module, matching the
//! addresses written to the output document (`A1` is row 1, column 1).

use std::fmt;

/// Largest column index accepted in an address (`XFD`).
pub const MAX_COLUMN: u32 = 16_384;

/// Convert a 1-based column index to its letters (1→A, 26→Z, 27→AA, ...)
pub fn column_letter(col: u32) -> String {
    let mut result = String::new();
    let mut num = col;

    while num > 0 {
        let remainder = (num - 1) % 26;
        result.insert(0, (b'A' + remainder as u8) as char);
        num = (num - 1) / 26;
    }

    result
}

/// Convert column letters to a 1-based index (A→1, AA→27). Case-insensitive.
pub fn column_index(letters: &str) -> Option<u32> {
    if letters.is_empty() {
        return None;
    }

    let mut col: u32 = 0;
    for ch in letters.chars() {
        if !ch.is_ascii_alphabetic() {
            return None;
        }
        let digit = (ch.to_ascii_uppercase() as u8 - b'A') as u32 + 1;
        col = col.checked_mul(26)?.checked_add(digit)?;
    }

    (col <= MAX_COLUMN).then_some(col)
}

/// A single cell position
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CellRef {
    pub row: u32,
    pub col: u32,
}

impl CellRef {
    pub fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// Parse `B7`, `$B$7` or `b7`.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let split = s
            .char_indices()
            .find(|(_, c)| c.is_ascii_digit())
            .map(|(i, _)| i)?;
        let (letters, digits) = s.split_at(split);
        let letters = letters.replace('$', "");
        let col = column_index(&letters)?;
        let row: u32 = digits.parse().ok()?;
        (row > 0).then_some(Self { row, col })
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", column_letter(self.col), self.row)
    }
}

/// An inclusive rectangular range, normalized so `start` is top-left
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellRange {
    pub start: CellRef,
    pub end: CellRef,
}

impl CellRange {
    pub fn new(a: CellRef, b: CellRef) -> Self {
        Self {
            start: CellRef::new(a.row.min(b.row), a.col.min(b.col)),
            end: CellRef::new(a.row.max(b.row), a.col.max(b.col)),
        }
    }

    /// Parse `A1:B2` or a single-cell `A1`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.split_once(':') {
            Some((a, b)) => Some(Self::new(CellRef::parse(a)?, CellRef::parse(b)?)),
            None => {
                let cell = CellRef::parse(s)?;
                Some(Self::new(cell, cell))
            }
        }
    }

    pub fn contains(&self, row: u32, col: u32) -> bool {
        row >= self.start.row && row <= self.end.row && col >= self.start.col && col <= self.end.col
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}:{}", self.start, self.end)
        }
    }
}

/// Parse a space-separated `sqref` list (`A1:A10 C3`). Unparseable parts are skipped.
pub fn parse_sqref(sqref: &str) -> Vec<CellRange> {
    sqref.split_whitespace().filter_map(CellRange::parse).collect()
}
