use crate::error::{ExtractError, ExtractResult};
use crate::types::Workbook;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Serialize a workbook to JSON bytes
pub fn render_workbook(workbook: &Workbook, pretty: bool) -> ExtractResult<Vec<u8>> {
    let bytes = if pretty {
        serde_json::to_vec_pretty(workbook)?
    } else {
        serde_json::to_vec(workbook)?
    };
    Ok(bytes)
}

/// Write the full document in one go through a temporary file next to `output`,
/// so a failed run never leaves a truncated file behind.
pub fn write_workbook(workbook: &Workbook, output: &Path, pretty: bool) -> ExtractResult<()> {
    let bytes = render_workbook(workbook, pretty)?;

    let write_error = |source: std::io::Error| ExtractError::Write {
        path: output.to_path_buf(),
        source,
    };

    let dir = output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir).map_err(write_error)?;
    tmp.write_all(&bytes).map_err(write_error)?;
    tmp.as_file().sync_all().map_err(write_error)?;
    tmp.persist(output).map_err(|e| write_error(e.error))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_workbook_pretty_and_compact() {
        let temp_dir = TempDir::new().unwrap();
        let workbook = Workbook::new("book.xlsx".to_string());

        let pretty_path = temp_dir.path().join("pretty.json");
        write_workbook(&workbook, &pretty_path, true).unwrap();
        let pretty = std::fs::read_to_string(&pretty_path).unwrap();
        assert!(pretty.contains("\n  \"file\": \"book.xlsx\""));

        let compact_path = temp_dir.path().join("compact.json");
        write_workbook(&workbook, &compact_path, false).unwrap();
        let compact = std::fs::read_to_string(&compact_path).unwrap();
        assert!(!compact.contains('\n'));
        assert!(compact.starts_with("{\"file\":\"book.xlsx\""));
    }

    #[test]
    fn test_write_into_missing_directory_fails_cleanly() {
        let temp_dir = TempDir::new().unwrap();
        let output = temp_dir.path().join("missing").join("out.json");
        let workbook = Workbook::new("book.xlsx".to_string());

        let result = write_workbook(&workbook, &output, true);
        assert!(matches!(result, Err(ExtractError::Write { .. })));
        assert!(!output.exists());
    }

    #[test]
    fn test_write_replaces_existing_file() {
        let temp_dir = TempDir::new().unwrap();
        let output = temp_dir.path().join("out.json");
        std::fs::write(&output, "stale").unwrap();

        write_workbook(&Workbook::new("a.xlsx".to_string()), &output, false).unwrap();
        let content = std::fs::read_to_string(&output).unwrap();
        assert!(content.contains("\"a.xlsx\""));
        // Only the output remains in the directory
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 1);
    }
}
