//! Fixture workbooks built on the fly with rust_xlsxwriter

#![allow(dead_code)]

use rust_xlsxwriter::{DataValidation, ExcelDateTime, Format, Formula, Workbook};
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

/// One sheet: A1 `=1+1` cached as 2, B1 "Hi"
pub fn formula_workbook(dir: &Path) -> anyhow::Result<PathBuf> {
    let path = dir.join("formula.xlsx");
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name("Sheet1")?;
    worksheet.write_formula(0, 0, Formula::new("=1+1").set_result("2"))?;
    worksheet.write_string(0, 1, "Hi")?;
    workbook.save(&path)?;
    Ok(path)
}

/// One sheet with A1:B1 merged holding "Title"
pub fn merged_workbook(dir: &Path) -> anyhow::Result<PathBuf> {
    let path = dir.join("merged.xlsx");
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name("Sheet1")?;
    worksheet.merge_range(0, 0, 0, 1, "Title", &Format::new().set_bold())?;
    workbook.save(&path)?;
    Ok(path)
}

/// Three sheets resembling a grade report:
///
/// `Grades`: header row, a percent, a date, a boolean, a list validation on
/// C2:C11, a custom column width on B, a hidden column D, a tall row 3 and
/// a hidden row 5. `Blank`: no cells. `Lists`: two pass/fail labels.
/// Defined name `PassMark` → `Grades!$B$2`.
pub fn report_workbook(dir: &Path) -> anyhow::Result<PathBuf> {
    let path = dir.join("report.xlsx");
    let mut workbook = Workbook::new();

    let grades = workbook.add_worksheet();
    grades.set_name("Grades")?;
    grades.write_string(0, 0, "Student")?;
    grades.write_string(0, 1, "Score")?;
    grades.write_string(0, 2, "Result")?;
    grades.write_string(1, 0, "Somchai")?;
    grades.write_number_with_format(1, 1, 0.256, &Format::new().set_num_format("0.00%"))?;
    grades.write_string(1, 2, "Pass")?;
    let date = ExcelDateTime::from_ymd(2024, 5, 17)?;
    grades.write_datetime_with_format(1, 3, &date, &Format::new().set_num_format("yyyy-mm-dd"))?;
    grades.write_boolean(1, 4, true)?;
    grades.set_column_width(1, 20)?;
    grades.set_column_hidden(3)?;
    grades.set_row_height(2, 30)?;
    grades.set_row_hidden(4)?;
    let validation = DataValidation::new().allow_list_strings(&["Pass", "Fail"])?;
    grades.add_data_validation(1, 2, 10, 2, &validation)?;

    let blank = workbook.add_worksheet();
    blank.set_name("Blank")?;

    let lists = workbook.add_worksheet();
    lists.set_name("Lists")?;
    lists.write_string(0, 0, "Pass")?;
    lists.write_string(1, 0, "Fail")?;

    workbook.define_name("PassMark", "=Grades!$B$2")?;
    workbook.save(&path)?;
    Ok(path)
}

/// Copy of the package at `source` with one part's contents replaced
pub fn replace_part(
    source: &Path,
    dest: &Path,
    part_name: &str,
    contents: &str,
) -> anyhow::Result<PathBuf> {
    let mut archive = ZipArchive::new(File::open(source)?)?;
    let mut writer = ZipWriter::new(File::create(dest)?);
    for i in 0..archive.len() {
        let mut part = archive.by_index(i)?;
        let name = part.name().to_string();
        writer.start_file(name.as_str(), SimpleFileOptions::default())?;
        if name == part_name {
            writer.write_all(contents.as_bytes())?;
        } else {
            let mut bytes = Vec::new();
            part.read_to_end(&mut bytes)?;
            writer.write_all(&bytes)?;
        }
    }
    writer.finish()?;
    Ok(dest.to_path_buf())
}

/// The grade report with its stylesheet cut off mid-tag
pub fn broken_styles_workbook(dir: &Path) -> anyhow::Result<PathBuf> {
    let report = report_workbook(dir)?;
    replace_part(
        &report,
        &dir.join("broken-styles.xlsx"),
        "xl/styles.xml",
        "<styleSheet><cellXfs><xf numFmtId=\"",
    )
}
