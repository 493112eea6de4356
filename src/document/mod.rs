//! Documents: page sources, loading and the section store

pub mod loader;
pub mod source;
pub mod store;

pub use loader::{read_document, LoadTicket, LoadTracker};
pub use source::{open_source, DocumentSource, PageDirSource, TextFileSource};
#[cfg(feature = "pdf")]
pub use source::PdfSource;
pub use store::{Section, SectionStore};
