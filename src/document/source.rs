//! Document sources
//!
//! A source turns a document on disk into raw per-page text. Failing to
//! open the document fails the whole load; a single unreadable page is
//! reported per page so the loader can drop it and keep going.

use crate::{Result, TalkError};
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};

/// Page separator emitted by `pdftotext` and friends
pub const FORM_FEED: char = '\x0c';

/// Produces the ordered raw text of every page in a document
pub trait DocumentSource: Send {
    /// Human-readable name for logs and status lines
    fn describe(&self) -> String;

    /// Read every page in order
    ///
    /// The outer error aborts the load; an inner error marks one page as
    /// unreadable.
    fn read_pages(&self) -> Result<Vec<Result<String>>>;
}

/// Plain text file with pages separated by form feeds
pub struct TextFileSource {
    path: PathBuf,
}

impl TextFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl DocumentSource for TextFileSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn read_pages(&self) -> Result<Vec<Result<String>>> {
        let contents = fs::read_to_string(&self.path)
            .map_err(|e| TalkError::LoadFailed(format!("{}: {}", self.path.display(), e)))?;

        Ok(split_pages(&contents).into_iter().map(Ok).collect())
    }
}

/// Split text on form feeds, ignoring the one that usually closes the last page
pub fn split_pages(contents: &str) -> Vec<String> {
    let body = contents.strip_suffix(FORM_FEED).unwrap_or(contents);
    body.split(FORM_FEED).map(str::to_string).collect()
}

/// Directory holding one `.txt` file per page, ordered by file name
pub struct PageDirSource {
    dir: PathBuf,
}

impl PageDirSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn page_files(&self) -> Result<Vec<PathBuf>> {
        let entries = fs::read_dir(&self.dir)
            .map_err(|e| TalkError::LoadFailed(format!("{}: {}", self.dir.display(), e)))?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && path.extension().map_or(false, |ext| ext == "txt"))
            .collect();
        files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

        debug!("Found {} page files in {:?}", files.len(), self.dir);
        Ok(files)
    }
}

impl DocumentSource for PageDirSource {
    fn describe(&self) -> String {
        self.dir.display().to_string()
    }

    fn read_pages(&self) -> Result<Vec<Result<String>>> {
        let files = self.page_files()?;
        if files.is_empty() {
            return Err(TalkError::LoadFailed(format!(
                "{}: no .txt pages found",
                self.dir.display()
            )));
        }

        Ok(files
            .iter()
            .map(|path| {
                fs::read_to_string(path)
                    .map_err(|e| TalkError::LoadFailed(format!("{}: {}", path.display(), e)))
            })
            .collect())
    }
}

/// PDF document, text extracted page by page
#[cfg(feature = "pdf")]
pub struct PdfSource {
    path: PathBuf,
}

#[cfg(feature = "pdf")]
impl PdfSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[cfg(feature = "pdf")]
impl DocumentSource for PdfSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn read_pages(&self) -> Result<Vec<Result<String>>> {
        // The extractor panics on some well-formed but unusual files
        let extracted = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            pdf_extract::extract_text_by_pages(&self.path)
        }))
        .map_err(|payload| {
            let reason = panic_message(payload.as_ref());
            log::warn!("PDF extraction panicked on {:?}: {}", self.path, reason);
            TalkError::LoadFailed(format!("{}: unreadable PDF ({})", self.path.display(), reason))
        })?;
        let pages = extracted
            .map_err(|e| TalkError::LoadFailed(format!("{}: {}", self.path.display(), e)))?;

        debug!("Extracted {} pages from {:?}", pages.len(), self.path);
        Ok(pages.into_iter().map(Ok).collect())
    }
}

#[cfg(feature = "pdf")]
fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("extractor panicked")
}

/// Pick a source for `path`: a directory of pages, a PDF, or a text file
pub fn open_source(path: &Path) -> Result<Box<dyn DocumentSource>> {
    if path.is_dir() {
        return Ok(Box::new(PageDirSource::new(path)));
    }

    let is_pdf = path
        .extension()
        .map_or(false, |ext| ext.eq_ignore_ascii_case("pdf"));

    if is_pdf {
        #[cfg(feature = "pdf")]
        return Ok(Box::new(PdfSource::new(path)));

        #[cfg(not(feature = "pdf"))]
        return Err(TalkError::LoadFailed(format!(
            "{}: built without PDF support",
            path.display()
        )));
    }

    Ok(Box::new(TextFileSource::new(path)))
}
