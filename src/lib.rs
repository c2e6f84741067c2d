//! Workbook Extract - lossless spreadsheet to JSON extraction
//!
//! Reads every sheet of a spreadsheet file and produces a structured
//! document: cell values, formulas with their cached results, displayed
//! text, number formats, opaque style references, merge regions,
//! column/row metadata, data-validation rules and defined names.
//!
//! # Example
//!
//! ```no_run
//! use workbook_extract::extract::WorkbookExtractor;
//! use workbook_extract::writer::write_workbook;
//! use std::path::Path;
//!
//! let workbook = WorkbookExtractor::new("grades.xlsx").extract()?;
//!
//! println!("Sheets: {}", workbook.sheet_count());
//!
//! write_workbook(&workbook, Path::new("grades.raw.json"), true)?;
//! # Ok::<(), workbook_extract::error::ExtractError>(())
//! ```

pub mod address;
pub mod cli;
pub mod error;
pub mod extract;
pub mod types;
pub mod writer;

// Re-export commonly used types
pub use error::{ExtractError, ExtractResult};
pub use types::{Cell, CellValue, MergeState, Sheet, Workbook};
