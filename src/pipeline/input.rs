//! Input discovery: find the files a stage should process and name its outputs.
//!
//! Listings are sorted by file name so repeated runs visit files in the same
//! order. PDFs are validated by their magic bytes (`%PDF`) before pdfium sees
//! them, so a stray `.pdf`-named HTML page gets a clear error instead of a
//! pdfium parse failure.

use crate::error::PipelineError;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Suffix of the OCR stage's output files.
pub const OCR_SUFFIX: &str = "_ocr.json";
/// Suffix of the German → English stage's output files.
pub const TRANSLATED_SUFFIX: &str = "_translated.json";
/// Suffix of the English → Urdu stage's output files.
pub const URDU_SUFFIX: &str = "_urdu.json";

/// Validate that `path` exists, is readable and starts with `%PDF`.
pub fn validate_pdf(path: &Path) -> Result<(), PipelineError> {
    if !path.exists() {
        return Err(PipelineError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    match std::fs::File::open(path) {
        Ok(mut f) => {
            use std::io::Read;
            let mut magic = [0u8; 4];
            if f.read_exact(&mut magic).is_ok() && &magic != b"%PDF" {
                return Err(PipelineError::NotAPdf {
                    path: path.to_path_buf(),
                    magic,
                });
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(PipelineError::PermissionDenied {
                path: path.to_path_buf(),
            });
        }
        Err(_) => {
            return Err(PipelineError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
    }

    debug!("Validated PDF: {}", path.display());
    Ok(())
}

/// Regular files in `dir` whose name satisfies `matches`, sorted by name.
async fn list_files(
    dir: &Path,
    matches: impl Fn(&str) -> bool,
) -> Result<Vec<PathBuf>, PipelineError> {
    if !dir.is_dir() {
        return Err(PipelineError::DirectoryNotFound {
            path: dir.to_path_buf(),
        });
    }

    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| PipelineError::Internal(format!("Cannot list '{}': {}", dir.display(), e)))?;

    let mut files = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| PipelineError::Internal(format!("Cannot list '{}': {}", dir.display(), e)))?
    {
        let path = entry.path();
        // metadata() follows symlinks; DirEntry::file_type() does not.
        let is_file = tokio::fs::metadata(&path)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false);
        let name_matches = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(&matches);
        if is_file && name_matches {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

/// `*.pdf` files (case-insensitive extension) in `dir`.
pub async fn list_pdfs(dir: &Path) -> Result<Vec<PathBuf>, PipelineError> {
    list_files(dir, |name| name.to_lowercase().ends_with(".pdf")).await
}

/// Files in `dir` ending with `suffix`, e.g. [`OCR_SUFFIX`].
pub async fn list_with_suffix(dir: &Path, suffix: &str) -> Result<Vec<PathBuf>, PipelineError> {
    list_files(dir, |name| name.ends_with(suffix) && name.len() > suffix.len()).await
}

/// `<out_dir>/<stem>_ocr.json` for `<anything>/<stem>.pdf`.
pub fn ocr_output_path(pdf: &Path, out_dir: &Path) -> PathBuf {
    let stem = pdf
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    out_dir.join(format!("{stem}{OCR_SUFFIX}"))
}

/// Sibling of `input` with `from` replaced by `to` at the end of the name.
///
/// Returns `None` when the name does not end with `from`.
pub fn replace_suffix(input: &Path, from: &str, to: &str) -> Option<PathBuf> {
    let name = input.file_name()?.to_str()?;
    let base = name.strip_suffix(from)?;
    Some(input.with_file_name(format!("{base}{to}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn ocr_output_named_after_stem() {
        let out = ocr_output_path(Path::new("pdfs/Motorenbau 1931.PDF"), Path::new("output"));
        assert_eq!(out, PathBuf::from("output/Motorenbau 1931_ocr.json"));
    }

    #[test]
    fn suffix_replacement() {
        let p = Path::new("output/book_ocr.json");
        assert_eq!(
            replace_suffix(p, OCR_SUFFIX, TRANSLATED_SUFFIX),
            Some(PathBuf::from("output/book_translated.json"))
        );
        assert_eq!(replace_suffix(p, TRANSLATED_SUFFIX, URDU_SUFFIX), None);
    }

    #[test]
    fn validate_rejects_non_pdf() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fake.pdf");
        std::fs::write(&path, b"<html>").unwrap();
        match validate_pdf(&path) {
            Err(PipelineError::NotAPdf { magic, .. }) => assert_eq!(&magic, b"<htm"),
            other => panic!("expected NotAPdf, got {other:?}"),
        }
    }

    #[test]
    fn validate_missing_file() {
        let err = validate_pdf(Path::new("/nonexistent/scan.pdf")).unwrap_err();
        assert!(matches!(err, PipelineError::FileNotFound { .. }));
    }

    #[test]
    fn validate_accepts_pdf_magic() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scan.pdf");
        std::fs::write(&path, b"%PDF-1.4\n").unwrap();
        assert!(validate_pdf(&path).is_ok());
    }

    #[tokio::test]
    async fn listings_are_sorted_and_filtered() {
        let dir = TempDir::new().unwrap();
        for name in ["b.pdf", "a.PDF", "notes.txt", "c_ocr.json", "_ocr.json"] {
            std::fs::write(dir.path().join(name), b"%PDF").unwrap();
        }
        std::fs::create_dir(dir.path().join("sub.pdf")).unwrap();

        let pdfs = list_pdfs(dir.path()).await.unwrap();
        let names: Vec<_> = pdfs
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a.PDF", "b.pdf"]);

        let ocr = list_with_suffix(dir.path(), OCR_SUFFIX).await.unwrap();
        assert_eq!(ocr.len(), 1);
        assert!(ocr[0].ends_with("c_ocr.json"));
    }

    #[tokio::test]
    async fn missing_directory_is_reported() {
        let err = list_pdfs(Path::new("/nonexistent/pdfs")).await.unwrap_err();
        assert!(matches!(err, PipelineError::DirectoryNotFound { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn symlinked_files_are_listed() {
        let dir = TempDir::new().unwrap();
        let real = dir.path().join("elsewhere");
        std::fs::create_dir(&real).unwrap();
        std::fs::write(real.join("scan.pdf"), b"%PDF-1.4").unwrap();
        std::fs::write(real.join("scan_ocr.json"), b"{}").unwrap();

        let listed = dir.path().join("in");
        std::fs::create_dir(&listed).unwrap();
        std::os::unix::fs::symlink(real.join("scan.pdf"), listed.join("linked.pdf")).unwrap();
        std::os::unix::fs::symlink(real.join("scan_ocr.json"), listed.join("linked_ocr.json"))
            .unwrap();
        std::os::unix::fs::symlink(&real, listed.join("dir.pdf")).unwrap();

        assert_eq!(list_pdfs(&listed).await.unwrap(), vec![listed.join("linked.pdf")]);
        assert_eq!(
            list_with_suffix(&listed, OCR_SUFFIX).await.unwrap(),
            vec![listed.join("linked_ocr.json")]
        );
    }
}
