//! Workbook extraction - spreadsheet file → Workbook
//!
//! Values, cached formula results and formulas come from calamine, so every
//! format calamine reads (.xlsx, .xlsm, .xlsb, .xls, .ods) is accepted.
//! OOXML packages are additionally scanned for styles, merges, column/row
//! metadata, data validation and scoped defined names; other formats
//! extract with those fields empty.

mod layout;
mod number_format;

pub use layout::{with_default_styles, OoxmlPackage, SheetLayout, StyleTable};
pub use number_format::{
    builtin_format, format_general, format_value, is_date_format, serial_to_datetime,
};

use crate::address::CellRef;
use crate::error::{ExtractError, ExtractResult};
use crate::types::{
    Cell, CellValue, DataValidation, DefinedName, MergeRegion, MergeState, Sheet, Workbook,
};
use calamine::{open_workbook_auto, CellType, Data, Range, Reader, Sheets, Xlsx};
use chrono::{NaiveDate, NaiveDateTime};
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const OOXML_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xltx", "xltm"];

/// Extracts a full structured `Workbook` from a spreadsheet file
pub struct WorkbookExtractor {
    path: PathBuf,
}

impl WorkbookExtractor {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn extract(&self) -> ExtractResult<Workbook> {
        match open_workbook_auto(&self.path) {
            Ok(mut source) => self.read_workbook(&mut source, self.open_package()),
            Err(source) => {
                let error = ExtractError::Open {
                    path: self.path.clone(),
                    source,
                };
                match self.reopen_with_default_styles() {
                    Some(mut source) => {
                        warn!(
                            "{}: styles could not be read ({}); cell formats and styles are dropped",
                            self.path.display(),
                            error
                        );
                        self.read_workbook(&mut source, self.open_package())
                    }
                    None => Err(error),
                }
            }
        }
    }

    fn open_package(&self) -> Option<OoxmlPackage<BufReader<File>>> {
        if !self.is_ooxml() {
            debug!("{} is not an OOXML package; layout fields stay empty", self.path.display());
            return None;
        }
        match OoxmlPackage::open(&self.path) {
            Ok(package) => Some(package),
            Err(e) => {
                warn!("Layout metadata unavailable for {}: {}", self.path.display(), e);
                None
            }
        }
    }

    /// Second attempt for OOXML packages calamine rejects: the same package
    /// with a bare stylesheet, read from memory
    fn reopen_with_default_styles(&self) -> Option<Sheets<Cursor<Vec<u8>>>> {
        if !self.is_ooxml() {
            return None;
        }
        let bytes = match with_default_styles(&self.path) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                debug!("{}: package could not be rebuilt: {}", self.path.display(), e);
                return None;
            }
        };
        match Xlsx::new(Cursor::new(bytes)) {
            Ok(xlsx) => Some(Sheets::Xlsx(xlsx)),
            Err(e) => {
                debug!("{}: still unreadable with default styles: {}", self.path.display(), e);
                None
            }
        }
    }

    fn read_workbook<RS: Read + Seek>(
        &self,
        source: &mut Sheets<RS>,
        mut package: Option<OoxmlPackage<BufReader<File>>>,
    ) -> ExtractResult<Workbook> {
        let styles = package
            .as_ref()
            .map(|p| p.styles().clone())
            .unwrap_or_default();

        let file = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut workbook = Workbook::new(file);

        for name in source.sheet_names() {
            let values = source
                .worksheet_range(&name)
                .map_err(|source| ExtractError::Sheet {
                    sheet: name.clone(),
                    source,
                })?;
            let formulas = source
                .worksheet_formula(&name)
                .map_err(|source| ExtractError::Sheet {
                    sheet: name.clone(),
                    source,
                })?;
            let layout = match package.as_mut() {
                Some(package) => package.sheet_layout(&name).unwrap_or_else(|e| {
                    warn!("Sheet '{}': layout metadata skipped: {}", name, e);
                    SheetLayout::default()
                }),
                None => SheetLayout::default(),
            };

            let sheet = build_sheet(name, &values, &formulas, &layout, &styles);
            let (rows, cols) = sheet.dimensions();
            debug!(
                "Sheet '{}': {}x{} cells, {} merges, {} validation rules",
                sheet.name,
                rows,
                cols,
                sheet.merges.len(),
                sheet.data_validation.as_ref().map_or(0, |dv| dv.rules.len())
            );
            workbook.sheets.push(sheet);
        }

        let names: Vec<DefinedName> = match &package {
            Some(package) => package.defined_names().to_vec(),
            None => source
                .defined_names()
                .iter()
                .map(|(name, reference)| DefinedName {
                    name: name.clone(),
                    reference: reference.clone(),
                    sheet: None,
                    hidden: false,
                })
                .collect(),
        };
        workbook.defined_names = (!names.is_empty()).then_some(names);

        Ok(workbook)
    }

    fn is_ooxml(&self) -> bool {
        self.path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| OOXML_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
    }
}

/// Bottom-right corner (1-based) over non-default cells of a range
fn used_extent<T: CellType>(range: &Range<T>) -> Option<(u32, u32)> {
    let (start_row, start_col) = range.start()?;
    range.used_cells().fold(None, |acc, (r, c, _)| {
        let row = start_row + r as u32 + 1;
        let col = start_col + c as u32 + 1;
        Some(match acc {
            None => (row, col),
            Some((max_row, max_col)) => (max_row.max(row), max_col.max(col)),
        })
    })
}

fn max_extent(extents: impl IntoIterator<Item = Option<(u32, u32)>>) -> (u32, u32) {
    extents
        .into_iter()
        .flatten()
        .fold((0, 0), |(rows, cols), (r, c)| (rows.max(r), cols.max(c)))
}

fn cell_value(data: &Data) -> CellValue {
    match data {
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Float(f) => CellValue::Number(*f),
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Bool(b) => CellValue::Boolean(*b),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(value) if !dt.is_duration() => CellValue::Date(value),
            _ => CellValue::Number(dt.as_f64()),
        },
        Data::DateTimeIso(s) => parse_iso_datetime(s)
            .map(CellValue::Date)
            .unwrap_or_else(|| CellValue::Text(s.clone())),
        Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(e) => CellValue::Error(e.to_string()),
        Data::Empty => CellValue::Empty,
    }
}

fn parse_iso_datetime(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn merge_state(merges: &[MergeRegion], pos: CellRef) -> MergeState {
    match merges.iter().find(|m| m.range.contains(pos.row, pos.col)) {
        Some(m) if m.anchor() == pos => MergeState::Anchor,
        Some(m) => MergeState::Member { anchor: m.anchor() },
        None => MergeState::Standalone,
    }
}

/// Assemble one sheet from calamine's value/formula ranges and the package layout
pub fn build_sheet(
    name: String,
    values: &Range<Data>,
    formulas: &Range<String>,
    layout: &SheetLayout,
    styles: &StyleTable,
) -> Sheet {
    let merge_extent = layout
        .merges
        .iter()
        .map(|m| Some((m.range.end.row, m.range.end.col)));
    let (rows, cols) = max_extent(
        [used_extent(values), used_extent(formulas), layout.styled_extent()]
            .into_iter()
            .chain(merge_extent),
    );

    let data_validation = (!layout.validations.is_empty()).then(|| DataValidation {
        rules: layout.validations.clone(),
    });

    let mut cells = Vec::with_capacity(rows as usize);
    for row in 1..=rows {
        let mut row_cells = Vec::with_capacity(cols as usize);
        for col in 1..=cols {
            let pos = CellRef::new(row, col);
            let abs = (row - 1, col - 1);

            let formula = formulas
                .get_value(abs)
                .filter(|f| !f.is_empty())
                .map(|f| f.strip_prefix('=').unwrap_or(f.as_str()).to_string());
            let value = values.get_value(abs).map(cell_value).unwrap_or(CellValue::Empty);

            let (style, number_format) = match layout.cell_styles.get(&pos) {
                Some(&id) => {
                    let style = styles.style(id);
                    if style.is_none() && !styles.is_empty() {
                        warn!("{}!{}: unknown style index {}", name, pos, id);
                    }
                    (style, styles.number_format(id))
                }
                None => (None, None),
            };
            let text = format_value(&value, number_format.as_deref());

            row_cells.push(Cell {
                position: pos,
                value,
                formula,
                text,
                number_format,
                style,
                data_validation: data_validation
                    .as_ref()
                    .and_then(|dv| dv.rule_for(row, col))
                    .cloned(),
                merge: merge_state(&layout.merges, pos),
            });
        }
        cells.push(row_cells);
    }

    Sheet {
        name,
        cells,
        merges: layout.merges.clone(),
        cols: layout.cols.clone(),
        rows_meta: layout.rows.clone(),
        data_validation,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::CellRange;
    use calamine::CellErrorType;

    fn values(cells: &[((u32, u32), Data)]) -> Range<Data> {
        let mut range = Range::new((0, 0), (0, 0));
        for (pos, data) in cells {
            range.set_value(*pos, data.clone());
        }
        range
    }

    #[test]
    fn test_formula_and_cached_result() {
        let vals = values(&[
            ((0, 0), Data::Float(2.0)),
            ((0, 1), Data::String("Hi".to_string())),
        ]);
        let mut formulas: Range<String> = Range::new((0, 0), (0, 0));
        formulas.set_value((0, 0), "1+1".to_string());

        let sheet = build_sheet(
            "Sheet1".to_string(),
            &vals,
            &formulas,
            &SheetLayout::default(),
            &StyleTable::default(),
        );

        assert_eq!(sheet.dimensions(), (1, 2));
        let a1 = sheet.get("A1").unwrap();
        assert_eq!(a1.formula.as_deref(), Some("1+1"));
        assert_eq!(a1.value, CellValue::Number(2.0));
        assert_eq!(a1.text.as_deref(), Some("2"));
        let b1 = sheet.get("B1").unwrap();
        assert_eq!(b1.value, CellValue::Text("Hi".to_string()));
        assert_eq!(b1.formula, None);
    }

    #[test]
    fn test_grid_starts_at_a1_and_keeps_empty_cells() {
        let vals = values(&[((2, 3), Data::Int(7))]);
        let sheet = build_sheet(
            "S".to_string(),
            &vals,
            &Range::empty(),
            &SheetLayout::default(),
            &StyleTable::default(),
        );

        assert_eq!(sheet.dimensions(), (3, 4));
        assert!(sheet.cells.iter().all(|row| row.len() == 4));
        assert_eq!(sheet.get("A1").unwrap().text, None);
        assert_eq!(sheet.get("D3").unwrap().text.as_deref(), Some("7"));
    }

    #[test]
    fn test_empty_sheet_has_no_rows() {
        let sheet = build_sheet(
            "Empty".to_string(),
            &Range::empty(),
            &Range::empty(),
            &SheetLayout::default(),
            &StyleTable::default(),
        );
        assert_eq!(sheet.dimensions(), (0, 0));
        assert!(sheet.data_validation.is_none());
    }

    #[test]
    fn test_styled_and_merged_cells_extend_the_grid() {
        let vals = values(&[((0, 0), Data::String("Title".to_string()))]);
        let mut layout = SheetLayout::default();
        layout.cell_styles.insert(CellRef::new(4, 2), 3);
        layout.merges.push(MergeRegion {
            range: CellRange::parse("A1:C1").unwrap(),
        });

        let sheet = build_sheet(
            "S".to_string(),
            &vals,
            &Range::empty(),
            &layout,
            &StyleTable::default(),
        );

        assert_eq!(sheet.dimensions(), (4, 3));
        assert_eq!(sheet.get("A1").unwrap().merge, MergeState::Anchor);
        assert_eq!(
            sheet.get("C1").unwrap().merge,
            MergeState::Member {
                anchor: CellRef::new(1, 1)
            }
        );
        assert_eq!(sheet.get("A2").unwrap().merge, MergeState::Standalone);
        // Unknown style index degrades to null without dropping the cell
        assert!(sheet.get("B4").unwrap().style.is_none());
    }

    #[test]
    fn test_cell_value_conversion() {
        assert_eq!(cell_value(&Data::Int(3)), CellValue::Number(3.0));
        assert_eq!(cell_value(&Data::Bool(false)), CellValue::Boolean(false));
        assert_eq!(
            cell_value(&Data::Error(CellErrorType::Div0)),
            CellValue::Error("#DIV/0!".to_string())
        );
        assert_eq!(
            cell_value(&Data::DateTimeIso("2024-05-17".to_string())),
            CellValue::Date(
                NaiveDate::from_ymd_opt(2024, 5, 17)
                    .unwrap()
                    .and_hms_opt(0, 0, 0)
                    .unwrap()
            )
        );
        assert_eq!(cell_value(&Data::Empty), CellValue::Empty);
    }

    #[test]
    fn test_missing_file_is_open_error() {
        let result = WorkbookExtractor::new("does-not-exist.xlsx").extract();
        assert!(matches!(result, Err(ExtractError::Open { .. })));
    }
}
