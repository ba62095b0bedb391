use crate::export::ExportFile;
use crate::utils::error::Result;
use std::io::Write;
use zip::write::{FileOptions, ZipWriter};

pub const BUNDLE_FILE_NAME: &str = "invoices.zip";

/// Packs the rendered outputs into one ZIP archive in memory.
pub fn build_bundle(files: &[ExportFile]) -> Result<Vec<u8>> {
    tracing::debug!("Creating ZIP bundle with {} files", files.len());

    let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));
    for file in files {
        zip.start_file::<_, ()>(file.name.as_str(), FileOptions::default())?;
        zip.write_all(&file.contents)?;
    }

    // 完成並取回底層 Vec<u8>
    let cursor = zip.finish()?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn test_bundle_contains_every_file() {
        let files = vec![
            ExportFile::new("a.json", b"{}".to_vec()),
            ExportFile::new("invoices.csv", b"source_file\n".to_vec()),
        ];

        let bytes = build_bundle(&files).unwrap();
        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 2);

        let mut content = String::new();
        archive
            .by_name("invoices.csv")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "source_file\n");
    }

    #[test]
    fn test_empty_bundle_is_a_valid_archive() {
        let bytes = build_bundle(&[]).unwrap();
        let archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 0);
    }
}
