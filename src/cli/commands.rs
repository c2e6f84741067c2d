use crate::error::ExtractResult;
use crate::extract::WorkbookExtractor;
use crate::writer::write_workbook;
use colored::Colorize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Suffix appended to the input file stem when no output path is given
pub const DEFAULT_OUTPUT_SUFFIX: &str = ".raw.json";

/// Runtime options for the extract command
#[derive(Debug, Clone, Copy)]
pub struct ExtractOptions {
    /// Indented JSON (default) or a single line
    pub pretty: bool,
    /// Suppress the success line
    pub quiet: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            pretty: true,
            quiet: false,
        }
    }
}

/// `<input-stem>.raw.json` in the working directory
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "output".to_string());
    PathBuf::from(format!("{}{}", stem, DEFAULT_OUTPUT_SUFFIX))
}

/// Execute the extract command, returning the path written
pub fn extract(
    input: PathBuf,
    output: Option<PathBuf>,
    options: ExtractOptions,
) -> ExtractResult<PathBuf> {
    let output = output.unwrap_or_else(|| default_output_path(&input));
    debug!("Extracting {} -> {}", input.display(), output.display());

    let workbook = WorkbookExtractor::new(&input).extract()?;
    debug!("Read {} sheets from {}", workbook.sheet_count(), workbook.file);

    write_workbook(&workbook, &output, options.pretty)?;

    if !options.quiet {
        println!(
            "{} Raw workbook data written to {}",
            "✅".green(),
            output.display().to_string().bold()
        );
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_output_path() {
        assert_eq!(
            default_output_path(Path::new("/data/uploads/pp5-2567.xlsx")),
            PathBuf::from("pp5-2567.raw.json")
        );
        assert_eq!(
            default_output_path(Path::new("report")),
            PathBuf::from("report.raw.json")
        );
        assert_eq!(
            default_output_path(Path::new("archive.tar.xlsx")),
            PathBuf::from("archive.tar.raw.json")
        );
    }

    #[test]
    fn test_extract_nonexistent_input() {
        let result = extract(
            PathBuf::from("nonexistent.xlsx"),
            Some(PathBuf::from("never-written.json")),
            ExtractOptions::default(),
        );
        assert!(result.is_err());
        assert!(!Path::new("never-written.json").exists());
    }
}
