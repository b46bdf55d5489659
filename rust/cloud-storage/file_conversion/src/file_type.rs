use std::str::FromStr;

use thiserror::Error;

/// Coarse grouping of file types, used for validation and usage analytics
#[derive(
    serde::Serialize,
    serde::Deserialize,
    Eq,
    PartialEq,
    Hash,
    Debug,
    Copy,
    Clone,
    PartialOrd,
    Ord,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FileCategory {
    /// PDF documents
    Pdf,
    /// Raster and vector images
    Image,
    /// Word processing documents and plain text
    Document,
    /// Spreadsheets and CSV
    Spreadsheet,
    /// Slide decks
    Presentation,
    /// Compressed archives
    Archive,
    /// Anything else
    Other,
}

/// Indicates we encountered an unknown extension or mime type
#[derive(Debug, Error)]
#[error("{0} is not a supported file type")]
pub struct UnknownFileType(String);

macro_rules! generate_file_types {
    ($(($variant:ident, $ext:expr, $mime:expr, $category:ident)),* $(,)?) => {
        /// The file types docvault knows how to label.
        ///
        /// Each variant maps to its canonical extension, mime type and [FileCategory].
        #[derive(serde::Serialize, serde::Deserialize, Eq, PartialEq, Hash, Debug, Copy, Clone)]
        #[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
        #[serde(rename_all = "lowercase")]
        pub enum FileType {
            $(
                #[allow(missing_docs)]
                $variant,
            )*
        }

        impl FromStr for FileType {
            type Err = UnknownFileType;

            /// Parses an extension, with or without the leading dot, ignoring case
            fn from_str(extension: &str) -> Result<Self, Self::Err> {
                let lowercase = extension.trim_start_matches('.').to_ascii_lowercase();
                match lowercase.as_str() {
                    $(
                        $ext => Ok(FileType::$variant),
                    )*
                    "jpeg" => Ok(FileType::Jpg),
                    "tif" => Ok(FileType::Tiff),
                    "htm" => Ok(FileType::Html),
                    _ => Err(UnknownFileType(lowercase)),
                }
            }
        }

        impl FileType {
            /// return the canonical file extension
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(
                        FileType::$variant => $ext,
                    )*
                }
            }

            /// return the mime type
            pub fn mime_type(&self) -> &'static str {
                match self {
                    $(
                        FileType::$variant => $mime,
                    )*
                }
            }

            /// return the category of the file type
            pub fn category(&self) -> FileCategory {
                match self {
                    $(
                        FileType::$variant => FileCategory::$category,
                    )*
                }
            }

            /// Looks up a file type by its exact mime type
            pub fn from_mime_type(mime_type: &str) -> Option<Self> {
                let essence = mime_type
                    .split(';')
                    .next()
                    .unwrap_or_default()
                    .trim()
                    .to_ascii_lowercase();
                match essence.as_str() {
                    $(
                        $mime => Some(FileType::$variant),
                    )*
                    "image/jpg" => Some(FileType::Jpg),
                    _ => None,
                }
            }
        }
    };
}

generate_file_types!(
    (Pdf, "pdf", "application/pdf", Pdf),
    (Png, "png", "image/png", Image),
    (Jpg, "jpg", "image/jpeg", Image),
    (Gif, "gif", "image/gif", Image),
    (Webp, "webp", "image/webp", Image),
    (Bmp, "bmp", "image/bmp", Image),
    (Tiff, "tiff", "image/tiff", Image),
    (Svg, "svg", "image/svg+xml", Image),
    (Docx, "docx", "application/vnd.openxmlformats-officedocument.wordprocessingml.document", Document),
    (Doc, "doc", "application/msword", Document),
    (Odt, "odt", "application/vnd.oasis.opendocument.text", Document),
    (Rtf, "rtf", "application/rtf", Document),
    (Txt, "txt", "text/plain", Document),
    (Md, "md", "text/markdown", Document),
    (Html, "html", "text/html", Document),
    (Xlsx, "xlsx", "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet", Spreadsheet),
    (Xls, "xls", "application/vnd.ms-excel", Spreadsheet),
    (Csv, "csv", "text/csv", Spreadsheet),
    (Pptx, "pptx", "application/vnd.openxmlformats-officedocument.presentationml.presentation", Presentation),
    (Ppt, "ppt", "application/vnd.ms-powerpoint", Presentation),
    (Zip, "zip", "application/zip", Archive),
    (Json, "json", "application/json", Other),
);

impl std::fmt::Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FileType {
    /// Determines the file type from a file name's extension
    pub fn from_filename(filename: &str) -> Option<Self> {
        let (_, extension) = filename.rsplit_once('.')?;
        FileType::from_str(extension).ok()
    }

    /// Whether the image operations can decode this type
    pub fn is_raster_image(&self) -> bool {
        matches!(
            self,
            FileType::Png
                | FileType::Jpg
                | FileType::Gif
                | FileType::Webp
                | FileType::Bmp
                | FileType::Tiff
        )
    }
}

/// Classifies a mime type, falling back to the top level type for unknown subtypes
pub fn category_for_mime(mime_type: &str) -> FileCategory {
    if let Some(file_type) = FileType::from_mime_type(mime_type) {
        return file_type.category();
    }
    match mime_type.split('/').next().unwrap_or_default() {
        "image" => FileCategory::Image,
        "text" => FileCategory::Document,
        _ => FileCategory::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_str_ignores_dot_and_case() {
        assert_eq!(FileType::from_str(".PDF").unwrap(), FileType::Pdf);
        assert_eq!(FileType::from_str("jpeg").unwrap(), FileType::Jpg);
        assert_eq!(FileType::from_str("Tif").unwrap(), FileType::Tiff);
        assert!(FileType::from_str("exe").is_err());
    }

    #[test]
    fn test_from_filename() {
        assert_eq!(
            FileType::from_filename("Quarterly Report.final.xlsx"),
            Some(FileType::Xlsx)
        );
        assert_eq!(FileType::from_filename("README"), None);
    }

    #[test]
    fn test_mime_lookup() {
        assert_eq!(
            FileType::from_mime_type("application/pdf; charset=binary"),
            Some(FileType::Pdf)
        );
        assert_eq!(FileType::Jpg.mime_type(), "image/jpeg");
        assert_eq!(category_for_mime("image/x-icon"), FileCategory::Image);
        assert_eq!(category_for_mime("text/csv"), FileCategory::Spreadsheet);
        assert_eq!(
            category_for_mime("application/octet-stream"),
            FileCategory::Other
        );
    }
}
