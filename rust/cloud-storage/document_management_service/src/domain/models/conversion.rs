use file_conversion::batch::BatchItemResult;
use file_conversion::image_ops::{CompressOptions, ResizeOptions, TargetFormat};
use file_conversion::pdf::{PageNumberOptions, PageRange, WatermarkOptions};
use utoipa::ToSchema;
use uuid::Uuid;

use super::Document;

/// Where conversion output goes. Without a folder, results land next to their source.
#[derive(Debug, Clone, Copy, Default, serde::Deserialize, ToSchema)]
pub struct OutputTarget {
    pub folder_id: Option<Uuid>,
}

#[derive(Debug, Clone, serde::Deserialize, ToSchema)]
pub struct MergePdfsRequest {
    /// At least two pdf documents, merged in this order
    pub document_ids: Vec<Uuid>,
    /// Title of the merged document
    pub title: Option<String>,
    #[serde(flatten)]
    pub output: OutputTarget,
}

#[derive(Debug, Clone, serde::Deserialize, ToSchema)]
pub struct SplitPdfRequest {
    pub document_id: Uuid,
    /// Defaults to one document per page
    pub ranges: Option<Vec<PageRange>>,
    #[serde(flatten)]
    pub output: OutputTarget,
}

#[derive(Debug, Clone, serde::Deserialize, ToSchema)]
pub struct RotatePdfRequest {
    pub document_id: Uuid,
    /// 90, 180 or 270; negative values rotate counter-clockwise
    pub degrees: i32,
    /// 1-based page numbers, defaults to every page
    pub pages: Option<Vec<u32>>,
    #[serde(flatten)]
    pub output: OutputTarget,
}

#[derive(Debug, Clone, serde::Deserialize, ToSchema)]
pub struct WatermarkPdfRequest {
    pub document_id: Uuid,
    #[serde(flatten)]
    pub options: WatermarkOptions,
    #[serde(flatten)]
    pub output: OutputTarget,
}

#[derive(Debug, Clone, serde::Deserialize, ToSchema)]
pub struct NumberPdfPagesRequest {
    pub document_id: Uuid,
    #[serde(flatten)]
    pub options: PageNumberOptions,
    #[serde(flatten)]
    pub output: OutputTarget,
}

#[derive(Debug, Clone, serde::Deserialize, ToSchema)]
pub struct ResizeImageRequest {
    pub document_id: Uuid,
    #[serde(flatten)]
    pub options: ResizeOptions,
    #[serde(flatten)]
    pub output: OutputTarget,
}

#[derive(Debug, Clone, serde::Deserialize, ToSchema)]
pub struct CompressImageRequest {
    pub document_id: Uuid,
    #[serde(flatten)]
    pub options: CompressOptions,
    #[serde(flatten)]
    pub output: OutputTarget,
}

#[derive(Debug, Clone, serde::Deserialize, ToSchema)]
pub struct ConvertImageRequest {
    pub document_id: Uuid,
    pub target: TargetFormat,
    #[serde(flatten)]
    pub output: OutputTarget,
}

/// A single-input operation that can be applied to many documents
#[derive(Debug, Clone, serde::Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BatchOperation {
    RotatePdf { degrees: i32 },
    WatermarkPdf(WatermarkOptions),
    NumberPdfPages(PageNumberOptions),
    ResizeImage(ResizeOptions),
    CompressImage(CompressOptions),
    ConvertImage { target: TargetFormat },
}

impl BatchOperation {
    pub fn name(&self) -> &'static str {
        match self {
            BatchOperation::RotatePdf { .. } => "rotate_pdf",
            BatchOperation::WatermarkPdf(_) => "watermark_pdf",
            BatchOperation::NumberPdfPages(_) => "number_pdf_pages",
            BatchOperation::ResizeImage(_) => "resize_image",
            BatchOperation::CompressImage(_) => "compress_image",
            BatchOperation::ConvertImage { .. } => "convert_image",
        }
    }

    pub fn needs_pdf(&self) -> bool {
        matches!(
            self,
            BatchOperation::RotatePdf { .. }
                | BatchOperation::WatermarkPdf(_)
                | BatchOperation::NumberPdfPages(_)
        )
    }
}

#[derive(Debug, Clone, serde::Deserialize, ToSchema)]
pub struct BatchConversionRequest {
    pub document_ids: Vec<Uuid>,
    pub operation: BatchOperation,
    #[serde(flatten)]
    pub output: OutputTarget,
}

/// The documents produced by one conversion job
#[derive(Debug, Clone, serde::Serialize, ToSchema)]
pub struct ConversionResult {
    pub job_id: Uuid,
    pub documents: Vec<Document>,
}

/// Per document outcomes of a batch job, keyed by source document id
#[derive(Debug, Clone, serde::Serialize)]
pub struct BatchConversionResult {
    pub job_id: Uuid,
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<BatchItemResult<Uuid, Document>>,
}
