//! PDF rasterisation: count pages and render one page to a `DynamicImage`.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which keeps thread-local
//! state and is not safe to call from async contexts. Every pdfium call runs
//! on tokio's blocking pool so the worker threads never stall on rendering.
//!
//! ## Why one page at a time?
//!
//! A scanned book at 2,000 px per edge costs ~16 MB per decoded page. Pages
//! are rendered and encoded just before their OCR request, so only one image
//! is alive at any moment, and pages skipped on resume are never rendered.

use crate::error::PipelineError;
use crate::pipeline::encode::encode_page;
use async_trait::async_trait;
use edgequake_llm::ImageData;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Produces the image payload for a page of some source document.
///
/// Page indices are 0-based.
#[async_trait]
pub trait PageRasteriser: Send + Sync {
    async fn rasterise(&self, index: usize) -> Result<ImageData, PipelineError>;
}

/// [`PageRasteriser`] over a PDF file on disk.
#[derive(Debug, Clone)]
pub struct PdfRasteriser {
    path: PathBuf,
    max_pixels: u32,
    password: Option<String>,
}

impl PdfRasteriser {
    pub fn new(path: impl Into<PathBuf>, max_pixels: u32, password: Option<String>) -> Self {
        Self {
            path: path.into(),
            max_pixels,
            password,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open the document once and report its page count.
    ///
    /// Surfaces password and corruption errors before any page is attempted.
    pub async fn page_count(&self) -> Result<usize, PipelineError> {
        let path = self.path.clone();
        let password = self.password.clone();

        tokio::task::spawn_blocking(move || page_count_blocking(&path, password.as_deref()))
            .await
            .map_err(|e| PipelineError::Internal(format!("Page count task panicked: {}", e)))?
    }
}

#[async_trait]
impl PageRasteriser for PdfRasteriser {
    async fn rasterise(&self, index: usize) -> Result<ImageData, PipelineError> {
        let path = self.path.clone();
        let password = self.password.clone();
        let max_pixels = self.max_pixels;

        tokio::task::spawn_blocking(move || {
            let image = render_page_blocking(&path, index, max_pixels, password.as_deref())?;
            encode_page(&image).map_err(|e| PipelineError::RasterisationFailed {
                page: index + 1,
                detail: format!("PNG encoding failed: {}", e),
            })
        })
        .await
        .map_err(|e| PipelineError::Internal(format!("Render task panicked: {}", e)))?
    }
}

/// Bind to the pdfium shared library.
///
/// `PDFIUM_LIB_PATH` may name the library file itself or the directory that
/// contains it; without it the system library search path is used.
pub fn bind_pdfium() -> Result<Pdfium, PipelineError> {
    let bindings = match std::env::var("PDFIUM_LIB_PATH") {
        Ok(p) if !p.trim().is_empty() => {
            let p = PathBuf::from(p);
            let lib = if p.is_dir() {
                Pdfium::pdfium_platform_library_name_at_path(&p)
            } else {
                p
            };
            debug!("Binding pdfium from {}", lib.display());
            Pdfium::bind_to_library(&lib).map_err(|e| {
                PipelineError::PdfiumBindingFailed(format!("{}: {}", lib.display(), e))
            })?
        }
        _ => Pdfium::bind_to_system_library()
            .map_err(|e| PipelineError::PdfiumBindingFailed(e.to_string()))?,
    };
    Ok(Pdfium::new(bindings))
}

fn open_error(pdf_path: &Path, password: Option<&str>, e: PdfiumError) -> PipelineError {
    let err_str = format!("{:?}", e);
    if err_str.contains("Password") || err_str.contains("password") {
        if password.is_some() {
            PipelineError::WrongPassword {
                path: pdf_path.to_path_buf(),
            }
        } else {
            PipelineError::PasswordRequired {
                path: pdf_path.to_path_buf(),
            }
        }
    } else {
        PipelineError::CorruptPdf {
            path: pdf_path.to_path_buf(),
            detail: err_str,
        }
    }
}

fn page_count_blocking(pdf_path: &Path, password: Option<&str>) -> Result<usize, PipelineError> {
    let pdfium = bind_pdfium()?;
    let document = pdfium
        .load_pdf_from_file(pdf_path, password)
        .map_err(|e| open_error(pdf_path, password, e))?;

    let total = document.pages().len() as usize;
    info!("PDF loaded: {} pages", total);
    Ok(total)
}

fn render_page_blocking(
    pdf_path: &Path,
    index: usize,
    max_pixels: u32,
    password: Option<&str>,
) -> Result<DynamicImage, PipelineError> {
    let pdfium = bind_pdfium()?;
    let document = pdfium
        .load_pdf_from_file(pdf_path, password)
        .map_err(|e| open_error(pdf_path, password, e))?;

    let pages = document.pages();
    if index >= pages.len() as usize {
        return Err(PipelineError::RasterisationFailed {
            page: index + 1,
            detail: format!("out of range, document has {} pages", pages.len()),
        });
    }

    let render_config = PdfRenderConfig::new()
        .set_target_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let page = pages
        .get(index as u16)
        .map_err(|e| PipelineError::RasterisationFailed {
            page: index + 1,
            detail: format!("{:?}", e),
        })?;

    let bitmap =
        page.render_with_config(&render_config)
            .map_err(|e| PipelineError::RasterisationFailed {
                page: index + 1,
                detail: format!("{:?}", e),
            })?;

    let image = bitmap.as_image();
    debug!(
        "Rendered page {} → {}x{} px",
        index + 1,
        image.width(),
        image.height()
    );
    Ok(image)
}
