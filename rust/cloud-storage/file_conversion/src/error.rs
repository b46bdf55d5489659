use thiserror::Error;

/// Errors produced by conversion operations
#[derive(Debug, Error)]
pub enum ConversionError {
    /// The caller supplied parameters or content that cannot be processed
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// The input or requested output format is not supported
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),
    /// The PDF library failed to parse or write the document
    #[error("pdf error: {0}")]
    Pdf(#[from] lopdf::Error),
    /// The image library failed to decode or encode the image
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    /// The archive could not be written
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),
    /// Filesystem failure while managing job files
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConversionError {
    /// Shorthand for [ConversionError::InvalidInput]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Whether the error was caused by the caller rather than the service
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ConversionError::InvalidInput(_)
                | ConversionError::UnsupportedFormat(_)
                | ConversionError::Pdf(_)
                | ConversionError::Image(image::ImageError::Decoding(_))
                | ConversionError::Image(image::ImageError::Unsupported(_))
        )
    }
}
