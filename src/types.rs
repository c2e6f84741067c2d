use crate::address::{column_letter, CellRange, CellRef};
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

//==============================================================================
// Cell Values
//==============================================================================

/// Typed cell value
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Number(f64),
    Text(String),
    Boolean(bool),
    Date(NaiveDateTime),
    /// Error literal such as `#DIV/0!`
    Error(String),
    Empty,
}

impl CellValue {
    /// Single-letter type tag written as `t`
    pub fn kind(&self) -> &'static str {
        match self {
            CellValue::Number(_) => "n",
            CellValue::Text(_) => "s",
            CellValue::Boolean(_) => "b",
            CellValue::Date(_) => "d",
            CellValue::Error(_) => "e",
            CellValue::Empty => "z",
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }
}

impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            // Integral numbers are written without a fraction (2, not 2.0)
            CellValue::Number(n) if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 => {
                serializer.serialize_i64(*n as i64)
            }
            CellValue::Number(n) => serializer.serialize_f64(*n),
            CellValue::Text(s) | CellValue::Error(s) => serializer.serialize_str(s),
            CellValue::Boolean(b) => serializer.serialize_bool(*b),
            CellValue::Date(dt) => {
                serializer.serialize_str(&dt.format("%Y-%m-%dT%H:%M:%S%.3f").to_string())
            }
            CellValue::Empty => serializer.serialize_none(),
        }
    }
}

//==============================================================================
// Cells
//==============================================================================

/// Position of a cell relative to the merge regions of its sheet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeState {
    Standalone,
    /// Top-left cell of a region; holds the visible value
    Anchor,
    Member { anchor: CellRef },
}

/// Opaque style passthrough: the `cellXfs` index and its raw attributes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StyleRef {
    pub id: u32,
    pub attrs: BTreeMap<String, String>,
}

/// What a cell authoritatively contains
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CellContent<'a> {
    Formula(&'a str),
    Value(&'a CellValue),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub position: CellRef,
    /// Stored value, or the last cached result when `formula` is set
    pub value: CellValue,
    /// Formula text without the leading `=`
    pub formula: Option<String>,
    /// Displayed text; `None` when the cell has no value
    pub text: Option<String>,
    pub number_format: Option<String>,
    pub style: Option<StyleRef>,
    pub data_validation: Option<DataValidationRule>,
    pub merge: MergeState,
}

impl Cell {
    pub fn empty(row: u32, col: u32) -> Self {
        Self {
            position: CellRef::new(row, col),
            value: CellValue::Empty,
            formula: None,
            text: None,
            number_format: None,
            style: None,
            data_validation: None,
            merge: MergeState::Standalone,
        }
    }

    pub fn address(&self) -> String {
        self.position.to_string()
    }

    /// The formula when present, otherwise the stored value
    pub fn content(&self) -> CellContent<'_> {
        match &self.formula {
            Some(f) => CellContent::Formula(f),
            None => CellContent::Value(&self.value),
        }
    }

    pub fn is_merged(&self) -> bool {
        !matches!(self.merge, MergeState::Standalone)
    }

    /// Anchor address for merge members, own address otherwise
    pub fn master(&self) -> CellRef {
        match self.merge {
            MergeState::Member { anchor } => anchor,
            _ => self.position,
        }
    }
}

impl Serialize for Cell {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("Cell", 12)?;
        s.serialize_field("address", &self.address())?;
        s.serialize_field("row", &self.position.row)?;
        s.serialize_field("col", &self.position.col)?;
        s.serialize_field("t", self.value.kind())?;
        s.serialize_field("v", &self.value)?;
        s.serialize_field("f", &self.formula)?;
        s.serialize_field("w", &self.text)?;
        s.serialize_field("z", &self.number_format)?;
        s.serialize_field("style", &self.style)?;
        s.serialize_field("dataValidation", &self.data_validation)?;
        s.serialize_field("isMerged", &self.is_merged())?;
        s.serialize_field("master", &self.master().to_string())?;
        s.end()
    }
}

//==============================================================================
// Sheet Metadata
//==============================================================================

/// Merged rectangle, anchored at `range.start`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeRegion {
    pub range: CellRange,
}

impl MergeRegion {
    pub fn anchor(&self) -> CellRef {
        self.range.start
    }
}

impl Serialize for MergeRegion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("MergeRegion", 3)?;
        s.serialize_field("ref", &self.range.to_string())?;
        s.serialize_field("start", &self.range.start.to_string())?;
        s.serialize_field("end", &self.range.end.to_string())?;
        s.end()
    }
}

/// Non-default column span (`min..=max`, 1-based)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnMeta {
    pub min: u32,
    pub max: u32,
    pub first: String,
    pub last: String,
    pub width: Option<f64>,
    pub hidden: bool,
}

impl ColumnMeta {
    pub fn new(min: u32, max: u32, width: Option<f64>, hidden: bool) -> Self {
        Self {
            min,
            max,
            first: column_letter(min),
            last: column_letter(max),
            width,
            hidden,
        }
    }

    pub fn covers(&self, col: u32) -> bool {
        col >= self.min && col <= self.max
    }
}

/// Non-default row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowMeta {
    pub row: u32,
    pub height: Option<f64>,
    pub hidden: bool,
}

/// A data-validation rule attached to one or more ranges
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataValidationRule {
    #[serde(rename = "type")]
    pub kind: String,
    pub operator: Option<String>,
    pub sqref: String,
    pub formula1: Option<String>,
    pub formula2: Option<String>,
    pub allow_blank: bool,
    pub show_drop_down: bool,
    pub show_input_message: bool,
    pub show_error_message: bool,
    pub error_style: Option<String>,
    pub error_title: Option<String>,
    pub error: Option<String>,
    pub prompt_title: Option<String>,
    pub prompt: Option<String>,
    /// Items of an inline `list` rule (`"Yes,No"`)
    pub values: Option<Vec<String>>,
    #[serde(skip)]
    pub ranges: Vec<CellRange>,
}

impl DataValidationRule {
    pub fn covers(&self, row: u32, col: u32) -> bool {
        self.ranges.iter().any(|r| r.contains(row, col))
    }
}

/// Sheet-level rule set
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct DataValidation {
    pub rules: Vec<DataValidationRule>,
}

impl DataValidation {
    /// Rule governing a cell: the last rule in document order covering it
    pub fn rule_for(&self, row: u32, col: u32) -> Option<&DataValidationRule> {
        self.rules.iter().rev().find(|r| r.covers(row, col))
    }
}

/// Workbook-scoped named reference
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DefinedName {
    pub name: String,
    #[serde(rename = "ref")]
    pub reference: String,
    /// Sheet the name is local to, if any
    pub sheet: Option<String>,
    pub hidden: bool,
}

//==============================================================================
// Sheets and Workbooks
//==============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub name: String,
    /// Grid of `rows x cols` cells starting at A1
    pub cells: Vec<Vec<Cell>>,
    pub merges: Vec<MergeRegion>,
    pub cols: Vec<ColumnMeta>,
    pub rows_meta: Vec<RowMeta>,
    pub data_validation: Option<DataValidation>,
}

impl Sheet {
    pub fn new(name: String) -> Self {
        Self {
            name,
            cells: Vec::new(),
            merges: Vec::new(),
            cols: Vec::new(),
            rows_meta: Vec::new(),
            data_validation: None,
        }
    }

    /// (rows, cols) of the grid
    pub fn dimensions(&self) -> (usize, usize) {
        (self.cells.len(), self.cells.first().map_or(0, Vec::len))
    }

    /// Cell at a 1-based position
    pub fn cell(&self, row: u32, col: u32) -> Option<&Cell> {
        let r = (row as usize).checked_sub(1)?;
        let c = (col as usize).checked_sub(1)?;
        self.cells.get(r)?.get(c)
    }

    /// Cell at an A1 address
    pub fn get(&self, address: &str) -> Option<&Cell> {
        let pos = CellRef::parse(address)?;
        self.cell(pos.row, pos.col)
    }

    /// Cell holding the visible content at a position; merge members resolve to their anchor
    pub fn resolve(&self, row: u32, col: u32) -> Option<&Cell> {
        let cell = self.cell(row, col)?;
        match cell.merge {
            MergeState::Member { anchor } => self.cell(anchor.row, anchor.col).or(Some(cell)),
            _ => Some(cell),
        }
    }

    /// Simple view: displayed text per position, merge members resolved
    pub fn display_rows(&self) -> Vec<Vec<Option<String>>> {
        self.cells
            .iter()
            .map(|row| {
                row.iter()
                    .map(|cell| {
                        self.resolve(cell.position.row, cell.position.col)
                            .and_then(|c| c.text.clone())
                    })
                    .collect()
            })
            .collect()
    }
}

struct SheetBody<'a>(&'a Sheet);

impl Serialize for SheetBody<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let sheet = self.0;
        let cols = (!sheet.cols.is_empty()).then_some(&sheet.cols);
        let mut s = serializer.serialize_struct("Sheet", 6)?;
        s.serialize_field("rows", &sheet.display_rows())?;
        s.serialize_field("rowsDetailed", &sheet.cells)?;
        s.serialize_field("merges", &sheet.merges)?;
        s.serialize_field("cols", &cols)?;
        s.serialize_field("rowsMeta", &sheet.rows_meta)?;
        s.serialize_field("dataValidation", &sheet.data_validation)?;
        s.end()
    }
}

struct SheetMap<'a>(&'a [Sheet]);

impl Serialize for SheetMap<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for sheet in self.0 {
            map.serialize_entry(&sheet.name, &SheetBody(sheet))?;
        }
        map.end()
    }
}

/// Extraction result for one spreadsheet file
#[derive(Debug, Clone, PartialEq)]
pub struct Workbook {
    /// Source file name (no directory)
    pub file: String,
    pub read_at: DateTime<Utc>,
    /// Sheets in document order
    pub sheets: Vec<Sheet>,
    pub defined_names: Option<Vec<DefinedName>>,
}

impl Workbook {
    pub fn new(file: String) -> Self {
        Self {
            file,
            read_at: Utc::now(),
            sheets: Vec::new(),
            defined_names: None,
        }
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    pub fn sheet_count(&self) -> usize {
        self.sheets.len()
    }
}

impl Serialize for Workbook {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("Workbook", 5)?;
        s.serialize_field("file", &self.file)?;
        s.serialize_field(
            "readAt",
            &self.read_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        )?;
        s.serialize_field("sheetCount", &self.sheets.len())?;
        s.serialize_field("definedNames", &self.defined_names)?;
        s.serialize_field("sheets", &SheetMap(&self.sheets))?;
        s.end()
    }
}
