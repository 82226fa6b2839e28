use thiserror::Error;

/// Failure taxonomy for the reader pipeline. Per-page and per-cycle errors
/// are isolated by callers; only `DocumentLoad` blocks the user.
#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("failed to load document: {0}")]
    DocumentLoad(String),

    #[error("page {page} out of range (document has {page_count} pages)")]
    PageOutOfRange { page: usize, page_count: usize },

    #[error("failed to render page {page}: {reason}")]
    Render { page: usize, reason: String },

    /// A newer render for the same surface started before this one landed.
    /// Expected outcome under rapid scale/scroll changes, not a fault.
    #[error("render result superseded by a newer request")]
    RenderSuperseded,

    #[error("failed to extract text from page {page}: {reason}")]
    TextExtraction { page: usize, reason: String },

    #[error("failed to encode frame: {0}")]
    FrameEncode(String),

    #[error("document store failure: {0}")]
    Store(String),
}

impl ReaderError {
    pub fn is_superseded(&self) -> bool {
        matches!(self, ReaderError::RenderSuperseded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn superseded_is_distinguishable() {
        assert!(ReaderError::RenderSuperseded.is_superseded());
        assert!(!ReaderError::DocumentLoad("corrupt".into()).is_superseded());
    }

    #[test]
    fn page_out_of_range_names_both_sides() {
        let err = ReaderError::PageOutOfRange {
            page: 9,
            page_count: 4,
        };
        let rendered = err.to_string();
        assert!(rendered.contains('9'));
        assert!(rendered.contains('4'));
    }
}
