//! OOXML package scan
//!
//! calamine reads cell values and formulas. Everything it does not expose
//! (cell style indexes, number-format codes, merges, column/row metadata,
//! data validation, scoped defined names) is read here from the package
//! parts with quick-xml.

use crate::address::{parse_sqref, CellRange, CellRef};
use crate::error::{ExtractError, ExtractResult};
use crate::extract::number_format::builtin_format;
use crate::types::{ColumnMeta, DataValidationRule, DefinedName, MergeRegion, RowMeta, StyleRef};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufRead, BufReader, Cursor, Read, Seek, Write};
use std::path::Path;
use tracing::{debug, warn};
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

const WORKBOOK_PART: &str = "xl/workbook.xml";
const WORKBOOK_RELS_PART: &str = "xl/_rels/workbook.xml.rels";
const STYLES_PART: &str = "xl/styles.xml";

/// One General cell format, enough for any reader to open the package
const DEFAULT_STYLES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><cellXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/></cellXfs></styleSheet>"#;

/// Attribute map keyed by local name
fn attributes(e: &BytesStart) -> BTreeMap<String, String> {
    e.attributes()
        .flatten()
        .map(|attr| {
            let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| String::from_utf8_lossy(&attr.value).into_owned());
            (key, value)
        })
        .collect()
}

fn flag(attrs: &BTreeMap<String, String>, key: &str) -> bool {
    matches!(attrs.get(key).map(String::as_str), Some("1" | "true"))
}

fn number<T: std::str::FromStr>(attrs: &BTreeMap<String, String>, key: &str) -> Option<T> {
    attrs.get(key).and_then(|v| v.trim().parse().ok())
}

fn xml_reader<R: BufRead>(source: R) -> Reader<R> {
    let mut reader = Reader::from_reader(source);
    reader.config_mut().trim_text(true);
    reader
}

//==============================================================================
// Workbook part
//==============================================================================

#[derive(Debug, Default)]
struct WorkbookPart {
    /// (sheet name, relationship id) in document order
    sheets: Vec<(String, String)>,
    defined_names: Vec<DefinedName>,
}

fn parse_workbook<R: BufRead>(source: R) -> ExtractResult<WorkbookPart> {
    let mut reader = xml_reader(source);
    let mut buf = Vec::new();
    let mut part = WorkbookPart::default();
    // (attrs, text) of the definedName being read
    let mut pending: Option<(BTreeMap<String, String>, String)> = None;
    let mut scoped: Vec<(usize, Option<usize>)> = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"sheet" => {
                let attrs = attributes(&e);
                if let (Some(name), Some(rid)) = (attrs.get("name"), attrs.get("id")) {
                    part.sheets.push((name.clone(), rid.clone()));
                }
            }
            Event::Start(e) if e.local_name().as_ref() == b"definedName" => {
                pending = Some((attributes(&e), String::new()));
            }
            Event::Text(t) => {
                if let Some((_, text)) = pending.as_mut() {
                    text.push_str(&t.unescape()?);
                }
            }
            Event::End(e) if e.local_name().as_ref() == b"definedName" => {
                if let Some((attrs, text)) = pending.take() {
                    if let Some(name) = attrs.get("name") {
                        scoped.push((part.defined_names.len(), number(&attrs, "localSheetId")));
                        part.defined_names.push(DefinedName {
                            name: name.clone(),
                            reference: text,
                            sheet: None,
                            hidden: flag(&attrs, "hidden"),
                        });
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    // localSheetId indexes the sheet list, which is only complete at the end
    for (idx, local_sheet) in scoped {
        if let Some(sheet) = local_sheet.and_then(|i| part.sheets.get(i)) {
            part.defined_names[idx].sheet = Some(sheet.0.clone());
        }
    }

    Ok(part)
}

/// Relationship id → target
fn parse_relationships<R: BufRead>(source: R) -> ExtractResult<HashMap<String, String>> {
    let mut reader = xml_reader(source);
    let mut buf = Vec::new();
    let mut rels = HashMap::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                let attrs = attributes(&e);
                if let (Some(id), Some(target)) = (attrs.get("Id"), attrs.get("Target")) {
                    rels.insert(id.clone(), target.clone());
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(rels)
}

/// Relationship targets are relative to `xl/` unless absolute
fn resolve_target(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("xl/{}", target),
    }
}

//==============================================================================
// Styles part
//==============================================================================

/// `cellXfs` entries and custom number formats from `xl/styles.xml`
#[derive(Debug, Default, Clone)]
pub struct StyleTable {
    num_fmts: HashMap<u32, String>,
    cell_xfs: Vec<BTreeMap<String, String>>,
}

impl StyleTable {
    pub fn len(&self) -> usize {
        self.cell_xfs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cell_xfs.is_empty()
    }

    /// Opaque style record for a `cellXfs` index
    pub fn style(&self, id: u32) -> Option<StyleRef> {
        self.cell_xfs.get(id as usize).map(|attrs| StyleRef {
            id,
            attrs: attrs.clone(),
        })
    }

    /// Number-format code applied by a `cellXfs` index
    pub fn number_format(&self, id: u32) -> Option<String> {
        let xf = self.cell_xfs.get(id as usize)?;
        let fmt_id: u32 = number(xf, "numFmtId").unwrap_or(0);
        self.num_fmts
            .get(&fmt_id)
            .cloned()
            .or_else(|| builtin_format(fmt_id).map(str::to_string))
    }
}

fn parse_styles<R: BufRead>(source: R) -> ExtractResult<StyleTable> {
    let mut reader = xml_reader(source);
    let mut buf = Vec::new();
    let mut table = StyleTable::default();
    let mut in_cell_xfs = false;
    let mut in_xf = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"numFmt" => {
                let attrs = attributes(&e);
                if let (Some(id), Some(code)) = (number(&attrs, "numFmtId"), attrs.get("formatCode")) {
                    table.num_fmts.insert(id, code.clone());
                }
            }
            Event::Start(e) if e.local_name().as_ref() == b"cellXfs" => in_cell_xfs = true,
            Event::End(e) if e.local_name().as_ref() == b"cellXfs" => in_cell_xfs = false,
            Event::Start(e) if in_cell_xfs && e.local_name().as_ref() == b"xf" => {
                table.cell_xfs.push(attributes(&e));
                in_xf = true;
            }
            Event::Empty(e) if in_cell_xfs && e.local_name().as_ref() == b"xf" => {
                table.cell_xfs.push(attributes(&e));
            }
            Event::End(e) if e.local_name().as_ref() == b"xf" => in_xf = false,
            // <alignment>, <protection> inside an xf
            Event::Empty(e) if in_xf => {
                let element = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if let Some(xf) = table.cell_xfs.last_mut() {
                    for (key, value) in attributes(&e) {
                        xf.insert(format!("{}.{}", element, key), value);
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(table)
}

//==============================================================================
// Worksheet parts
//==============================================================================

/// Formatting and structure of one worksheet
#[derive(Debug, Default, Clone)]
pub struct SheetLayout {
    /// Explicit `s` attribute per cell
    pub cell_styles: HashMap<CellRef, u32>,
    pub merges: Vec<MergeRegion>,
    pub cols: Vec<ColumnMeta>,
    pub rows: Vec<RowMeta>,
    pub validations: Vec<DataValidationRule>,
}

impl SheetLayout {
    /// Bottom-right corner over cells carrying a non-default style
    pub fn styled_extent(&self) -> Option<(u32, u32)> {
        self.cell_styles
            .iter()
            .filter(|(_, style)| **style != 0)
            .fold(None, |acc, (pos, _)| match acc {
                None => Some((pos.row, pos.col)),
                Some((r, c)) => Some((r.max(pos.row), c.max(pos.col))),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ValidationText {
    Formula1,
    Formula2,
    Sqref,
}

fn validation_rule(attrs: &BTreeMap<String, String>) -> DataValidationRule {
    DataValidationRule {
        kind: attrs.get("type").cloned().unwrap_or_else(|| "none".to_string()),
        operator: attrs.get("operator").cloned(),
        sqref: attrs.get("sqref").cloned().unwrap_or_default(),
        allow_blank: flag(attrs, "allowBlank"),
        show_drop_down: flag(attrs, "showDropDown"),
        show_input_message: flag(attrs, "showInputMessage"),
        show_error_message: flag(attrs, "showErrorMessage"),
        error_style: attrs.get("errorStyle").cloned(),
        error_title: attrs.get("errorTitle").cloned(),
        error: attrs.get("error").cloned(),
        prompt_title: attrs.get("promptTitle").cloned(),
        prompt: attrs.get("prompt").cloned(),
        ..Default::default()
    }
}

/// Items of an inline list formula (`"Yes,No"`)
fn inline_list(formula: &str) -> Option<Vec<String>> {
    let inner = formula.trim().strip_prefix('"')?.strip_suffix('"')?;
    Some(inner.split(',').map(|item| item.trim().to_string()).collect())
}

fn finish_rule(mut rule: DataValidationRule) -> DataValidationRule {
    rule.sqref = rule.sqref.trim().to_string();
    rule.ranges = parse_sqref(&rule.sqref);
    if rule.kind == "list" {
        rule.values = rule.formula1.as_deref().and_then(inline_list);
    }
    rule
}

fn parse_sheet<R: BufRead>(source: R) -> ExtractResult<SheetLayout> {
    let mut reader = xml_reader(source);
    let mut buf = Vec::new();
    let mut layout = SheetLayout::default();
    let mut current_row: u32 = 0;
    let mut current_col: u32 = 0;
    let mut rule: Option<DataValidationRule> = None;
    let mut text_target: Option<ValidationText> = None;

    loop {
        let event = reader.read_event_into(&mut buf)?;
        let is_empty = matches!(event, Event::Empty(_));
        match event {
            Event::Start(e) | Event::Empty(e) => match e.local_name().as_ref() {
                b"row" => {
                    let attrs = attributes(&e);
                    current_row = number(&attrs, "r").unwrap_or(current_row + 1);
                    current_col = 0;
                    let hidden = flag(&attrs, "hidden");
                    if hidden || flag(&attrs, "customHeight") {
                        layout.rows.push(RowMeta {
                            row: current_row,
                            height: number(&attrs, "ht"),
                            hidden,
                        });
                    }
                }
                b"c" => {
                    let attrs = attributes(&e);
                    let pos = attrs
                        .get("r")
                        .and_then(|r| CellRef::parse(r))
                        .unwrap_or_else(|| CellRef::new(current_row.max(1), current_col + 1));
                    current_col = pos.col;
                    if let Some(style) = number(&attrs, "s") {
                        layout.cell_styles.insert(pos, style);
                    }
                }
                b"col" => {
                    let attrs = attributes(&e);
                    let hidden = flag(&attrs, "hidden");
                    if let (Some(min), Some(max)) = (number(&attrs, "min"), number(&attrs, "max")) {
                        if hidden || flag(&attrs, "customWidth") {
                            layout
                                .cols
                                .push(ColumnMeta::new(min, max, number(&attrs, "width"), hidden));
                        }
                    }
                }
                b"mergeCell" => {
                    if let Some(range) = attributes(&e).get("ref").and_then(|r| CellRange::parse(r)) {
                        layout.merges.push(MergeRegion { range });
                    }
                }
                b"dataValidation" => {
                    let new_rule = validation_rule(&attributes(&e));
                    if is_empty {
                        layout.validations.push(finish_rule(new_rule));
                    } else {
                        rule = Some(new_rule);
                    }
                }
                b"formula1" if rule.is_some() => text_target = Some(ValidationText::Formula1),
                b"formula2" if rule.is_some() => text_target = Some(ValidationText::Formula2),
                b"sqref" if rule.is_some() => text_target = Some(ValidationText::Sqref),
                _ => {}
            },
            Event::Text(t) => {
                if let (Some(target), Some(current)) = (text_target, rule.as_mut()) {
                    let text = t.unescape()?;
                    match target {
                        ValidationText::Formula1 => {
                            current.formula1.get_or_insert_with(String::new).push_str(&text)
                        }
                        ValidationText::Formula2 => {
                            current.formula2.get_or_insert_with(String::new).push_str(&text)
                        }
                        ValidationText::Sqref => {
                            if !current.sqref.is_empty() {
                                current.sqref.push(' ');
                            }
                            current.sqref.push_str(&text);
                        }
                    }
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"formula1" | b"formula2" | b"sqref" => text_target = None,
                b"dataValidation" => {
                    if let Some(done) = rule.take() {
                        layout.validations.push(finish_rule(done));
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(layout)
}

//==============================================================================
// Package
//==============================================================================

/// An opened OOXML spreadsheet package
pub struct OoxmlPackage<R: Read + Seek> {
    archive: ZipArchive<R>,
    /// Sheet name → worksheet part path
    sheet_parts: HashMap<String, String>,
    defined_names: Vec<DefinedName>,
    styles: StyleTable,
}

impl OoxmlPackage<BufReader<File>> {
    pub fn open(path: &Path) -> ExtractResult<Self> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }
}

impl<R: Read + Seek> OoxmlPackage<R> {
    pub fn from_reader(reader: R) -> ExtractResult<Self> {
        let mut archive = ZipArchive::new(reader)?;

        let workbook = parse_workbook(BufReader::new(archive.by_name(WORKBOOK_PART)?))?;

        let rels = match archive.by_name(WORKBOOK_RELS_PART) {
            Ok(part) => parse_relationships(BufReader::new(part))?,
            Err(_) => HashMap::new(),
        };

        let styles = match archive.by_name(STYLES_PART) {
            Ok(part) => parse_styles(BufReader::new(part)).unwrap_or_else(|e| {
                warn!("Ignoring unreadable styles part: {}", e);
                StyleTable::default()
            }),
            Err(_) => StyleTable::default(),
        };
        debug!(
            "Package: {} sheets, {} cell formats",
            workbook.sheets.len(),
            styles.len()
        );

        let sheet_parts = workbook
            .sheets
            .iter()
            .filter_map(|(name, rid)| {
                rels.get(rid)
                    .map(|target| (name.clone(), resolve_target(target)))
            })
            .collect();

        Ok(Self {
            archive,
            sheet_parts,
            defined_names: workbook.defined_names,
            styles,
        })
    }

    pub fn defined_names(&self) -> &[DefinedName] {
        &self.defined_names
    }

    pub fn styles(&self) -> &StyleTable {
        &self.styles
    }

    /// Scan the worksheet part of a sheet
    pub fn sheet_layout(&mut self, sheet_name: &str) -> ExtractResult<SheetLayout> {
        let path = self
            .sheet_parts
            .get(sheet_name)
            .cloned()
            .ok_or_else(|| ExtractError::Layout(format!("no worksheet part for '{}'", sheet_name)))?;
        let part = self.archive.by_name(&path)?;
        parse_sheet(BufReader::new(part))
    }
}

/// Copy of the package at `path` with its styles part swapped for a single
/// General format. `None` when the package has no styles part.
pub fn with_default_styles(path: &Path) -> ExtractResult<Option<Vec<u8>>> {
    let mut archive = ZipArchive::new(BufReader::new(File::open(path)?))?;
    if !archive.file_names().any(|name| name == STYLES_PART) {
        return Ok(None);
    }

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for i in 0..archive.len() {
        let part = archive.by_index(i)?;
        if part.name() == STYLES_PART {
            continue;
        }
        writer.raw_copy_file(part)?;
    }
    writer.start_file(STYLES_PART, SimpleFileOptions::default())?;
    writer.write_all(DEFAULT_STYLES_XML.as_bytes())?;

    Ok(Some(writer.finish()?.into_inner()))
}
