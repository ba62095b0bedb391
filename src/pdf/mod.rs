//! Document text extraction: PDF text layer first, then tiered OCR.

pub mod extract;
pub mod ocr;
pub mod quality;

pub use extract::{DocumentReader, PdfTextLayer};
pub use ocr::{CommandOcr, OcrConfidence, OcrOutput};

use std::path::Path;

/// 不是 PDF 的文件直接走 OCR
pub const IMAGE_EXTENSIONS: &[&str] = &[
    "heic", "heif", "jpg", "jpeg", "png", "tiff", "tif", "bmp", "webp",
];

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

pub fn is_image(path: &Path) -> bool {
    extension_of(path).is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

pub fn is_pdf(path: &Path) -> bool {
    extension_of(path).is_some_and(|ext| ext == "pdf")
}

pub fn is_supported_document(path: &Path) -> bool {
    is_pdf(path) || is_image(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_documents() {
        assert!(is_supported_document(Path::new("bills/power.pdf")));
        assert!(is_supported_document(Path::new("bills/POWER.PDF")));
        assert!(is_supported_document(Path::new("receipt.HEIC")));
        assert!(is_image(Path::new("photo.jpeg")));
        assert!(!is_image(Path::new("power.pdf")));
        assert!(!is_supported_document(Path::new("notes.txt")));
        assert!(!is_supported_document(Path::new("no_extension")));
    }
}
