//! File conversions on stored documents. Results become new documents owned by the caller.

use std::{collections::HashMap, sync::Arc};

use file_conversion::{
    ConversionError, FileType,
    batch::{self, BatchItemResult, BatchOutcome},
    image_ops,
    pdf::{self, PageRange},
    workspace::JobWorkspace,
};
use model_vault::{AccessLevel, UserContext};
use serde_json::json;
use uuid::Uuid;

use super::{AuditService, document::DocumentService};
use crate::domain::{
    error::{Result, VaultError},
    models::{
        AuditAction, AuditLog, BatchConversionRequest, BatchConversionResult, BatchOperation,
        CompressImageRequest, ConversionResult, ConvertImageRequest, Document, DocumentContent,
        EntityType, MergePdfsRequest, NumberPdfPagesRequest, OutputTarget, ResizeImageRequest,
        RotatePdfRequest, SplitPdfRequest, UploadDocument, WatermarkPdfRequest,
    },
    ports::{BlobStorage, VaultStorage},
};

const DEFAULT_MERGE_TITLE: &str = "Merged document";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceKind {
    Pdf,
    Image,
}

impl SourceKind {
    fn accepts(self, document: &Document) -> bool {
        match (self, document.file_type()) {
            (SourceKind::Pdf, Some(file_type)) => file_type == FileType::Pdf,
            (SourceKind::Image, Some(file_type)) => file_type.is_raster_image(),
            (_, None) => false,
        }
    }

    fn expected(self) -> &'static str {
        match self {
            SourceKind::Pdf => "a pdf document",
            SourceKind::Image => "a png, jpeg, gif, webp, bmp or tiff image",
        }
    }
}

/// Bytes produced by a conversion and their type
struct Converted {
    bytes: Vec<u8>,
    file_type: FileType,
}

impl Converted {
    fn pdf(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            file_type: FileType::Pdf,
        }
    }

    fn image(output: image_ops::ImageOutput) -> Self {
        Self {
            file_type: output.format.file_type(),
            bytes: output.bytes,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConversionService<S, B> {
    documents: DocumentService<S, B>,
    audit: AuditService<S>,
}

impl<S: VaultStorage, B: BlobStorage> ConversionService<S, B> {
    pub fn new(storage: S, documents: DocumentService<S, B>) -> Self {
        Self {
            audit: AuditService::new(storage),
            documents,
        }
    }

    /// Concatenates pdf documents in the given order
    #[tracing::instrument(skip(self, user, request), fields(user_id=%user.user_id), err)]
    pub async fn merge_pdfs(
        &self,
        user: &UserContext,
        request: MergePdfsRequest,
    ) -> Result<ConversionResult> {
        let job_id = Uuid::now_v7();
        if request.document_ids.len() < 2 {
            return Err(VaultError::validation("merging needs at least two documents"));
        }
        if request.document_ids.len() > pdf::MAX_MERGE_INPUTS {
            return Err(VaultError::validation(format!(
                "at most {} documents can be merged",
                pdf::MAX_MERGE_INPUTS
            )));
        }

        let mut sources = Vec::with_capacity(request.document_ids.len());
        for id in &request.document_ids {
            sources.push(self.load_source(user, *id, SourceKind::Pdf).await?);
        }

        let inputs: Vec<Vec<u8>> = sources.iter().map(|s| s.bytes.clone()).collect();
        let merged = blocking(move || {
            let inputs: Vec<&[u8]> = inputs.iter().map(Vec::as_slice).collect();
            pdf::merge(&inputs)
        })
        .await?;

        let title = request
            .title
            .as_deref()
            .map(str::trim)
            .filter(|title| !title.is_empty())
            .unwrap_or(DEFAULT_MERGE_TITLE)
            .to_string();
        let folder_id = self
            .output_folder(user, request.output, Some(&sources[0].document))
            .await?;

        let document = self
            .save(
                user,
                folder_id,
                format!("{title}.pdf"),
                Some(title),
                Converted::pdf(merged),
            )
            .await?;

        let source_documents: Vec<&Document> = sources.iter().map(|s| &s.document).collect();
        self.finish(user, job_id, "merge_pdfs", &source_documents, vec![document])
            .await
    }

    /// Splits a pdf into one document per range, or per page when no ranges are given
    #[tracing::instrument(skip(self, user, request), fields(user_id=%user.user_id), err)]
    pub async fn split_pdf(
        &self,
        user: &UserContext,
        request: SplitPdfRequest,
    ) -> Result<ConversionResult> {
        let job_id = Uuid::now_v7();
        let source = self
            .load_source(user, request.document_id, SourceKind::Pdf)
            .await?;

        let bytes = source.bytes.clone();
        let requested = request.ranges.clone();
        let (ranges, workspace) = blocking(move || {
            let ranges = match requested {
                Some(ranges) => ranges,
                None => PageRange::every_page(pdf::page_count(&bytes)?),
            };
            // parts are spilled to disk so only one is held in memory while saving
            let workspace = JobWorkspace::new(job_id)?;
            for (index, part) in pdf::split(&bytes, &ranges)?.into_iter().enumerate() {
                workspace.write(&part_name(index), &part)?;
            }
            Ok((ranges, Arc::new(workspace)))
        })
        .await?;

        let folder_id = self
            .output_folder(user, request.output, Some(&source.document))
            .await?;
        let stem = stem(&source.document);

        let mut documents = Vec::with_capacity(ranges.len());
        for (index, range) in ranges.iter().enumerate() {
            let label = if range.start == range.end {
                format!("page {}", range.start)
            } else {
                format!("pages {}-{}", range.start, range.end)
            };
            let filename = format!("{stem} ({label}).pdf");
            let workspace = workspace.clone();
            let saved = match blocking(move || workspace.read(&part_name(index))).await {
                Ok(part) => {
                    self.save(user, folder_id, filename, None, Converted::pdf(part))
                        .await
                }
                Err(e) => Err(e),
            };
            match saved {
                Ok(document) => documents.push(document),
                Err(e) => {
                    tracing::warn!(
                        job_id=%job_id,
                        stored=documents.len(),
                        "split failed, discarding stored parts"
                    );
                    self.documents.discard(&documents).await;
                    return Err(e);
                }
            }
        }

        self.finish(user, job_id, "split_pdf", &[&source.document], documents)
            .await
    }

    pub async fn rotate_pdf(
        &self,
        user: &UserContext,
        request: RotatePdfRequest,
    ) -> Result<ConversionResult> {
        let degrees = request.degrees;
        let pages = request.pages;
        self.single(
            user,
            request.document_id,
            request.output,
            SourceKind::Pdf,
            "rotate_pdf",
            move |bytes| pdf::rotate(bytes, degrees, pages.as_deref()).map(Converted::pdf),
        )
        .await
    }

    pub async fn watermark_pdf(
        &self,
        user: &UserContext,
        request: WatermarkPdfRequest,
    ) -> Result<ConversionResult> {
        let options = request.options;
        self.single(
            user,
            request.document_id,
            request.output,
            SourceKind::Pdf,
            "watermark_pdf",
            move |bytes| pdf::watermark(bytes, &options).map(Converted::pdf),
        )
        .await
    }

    pub async fn number_pdf_pages(
        &self,
        user: &UserContext,
        request: NumberPdfPagesRequest,
    ) -> Result<ConversionResult> {
        let options = request.options;
        self.single(
            user,
            request.document_id,
            request.output,
            SourceKind::Pdf,
            "number_pdf_pages",
            move |bytes| pdf::add_page_numbers(bytes, &options).map(Converted::pdf),
        )
        .await
    }

    pub async fn resize_image(
        &self,
        user: &UserContext,
        request: ResizeImageRequest,
    ) -> Result<ConversionResult> {
        let options = request.options;
        self.single(
            user,
            request.document_id,
            request.output,
            SourceKind::Image,
            "resize_image",
            move |bytes| image_ops::resize(bytes, &options).map(Converted::image),
        )
        .await
    }

    pub async fn compress_image(
        &self,
        user: &UserContext,
        request: CompressImageRequest,
    ) -> Result<ConversionResult> {
        let options = request.options;
        self.single(
            user,
            request.document_id,
            request.output,
            SourceKind::Image,
            "compress_image",
            move |bytes| image_ops::compress(bytes, &options).map(Converted::image),
        )
        .await
    }

    pub async fn convert_image(
        &self,
        user: &UserContext,
        request: ConvertImageRequest,
    ) -> Result<ConversionResult> {
        let target = request.target;
        self.single(
            user,
            request.document_id,
            request.output,
            SourceKind::Image,
            "convert_image",
            move |bytes| image_ops::convert(bytes, target).map(Converted::image),
        )
        .await
    }

    /// Applies one operation to many documents. Each document succeeds or fails on its own.
    #[tracing::instrument(
        skip(self, user, request),
        fields(user_id=%user.user_id, operation=request.operation.name()),
        err
    )]
    pub async fn batch(
        &self,
        user: &UserContext,
        request: BatchConversionRequest,
    ) -> Result<BatchConversionResult> {
        let job_id = Uuid::now_v7();
        batch::validate_size(request.document_ids.len())?;

        let operation = request.operation;
        let operation_name = operation.name();
        let kind = if operation.needs_pdf() {
            SourceKind::Pdf
        } else {
            SourceKind::Image
        };
        if let Some(folder_id) = request.output.folder_id {
            self.documents
                .access()
                .require_folder(user, folder_id, AccessLevel::Edit)
                .await?;
        }

        let mut results: Vec<BatchItemResult<Uuid, Document>> = Vec::new();
        let mut sources: HashMap<usize, Document> = HashMap::new();
        let mut inputs = Vec::new();
        for (index, id) in request.document_ids.iter().copied().enumerate() {
            match self.load_source(user, id, kind).await {
                Ok(content) => {
                    inputs.push(((index, id), content.bytes));
                    sources.insert(index, content.document);
                }
                Err(e) => results.push(failed(index, id, &e)),
            }
        }

        let converted = blocking(move || {
            Ok(batch::run(inputs, |bytes: Vec<u8>| apply(&operation, &bytes)))
        })
        .await?;

        let mut outputs = Vec::new();
        for item in converted {
            let (index, id) = item.key;
            let result = match item.outcome {
                BatchOutcome::Succeeded { output } => {
                    let Some(source) = sources.get(&index) else {
                        continue;
                    };
                    match self
                        .store_output(user, request.output, source, operation_name, output)
                        .await
                    {
                        Ok(document) => {
                            outputs.push(document.id);
                            BatchItemResult {
                                index,
                                key: id,
                                outcome: BatchOutcome::Succeeded { output: document },
                            }
                        }
                        Err(e) => failed(index, id, &e),
                    }
                }
                BatchOutcome::Failed { error } => BatchItemResult {
                    index,
                    key: id,
                    outcome: BatchOutcome::Failed { error },
                },
            };
            results.push(result);
        }
        results.sort_by_key(|result| result.index);

        let succeeded = results.iter().filter(|r| r.is_success()).count();
        let failed = results.len() - succeeded;
        tracing::info!(job_id=%job_id, succeeded, failed, "batch conversion finished");

        self.audit
            .record(
                AuditLog::new(user, AuditAction::DocumentConvert, EntityType::Document, None)
                    .with_metadata(json!({
                        "job_id": job_id,
                        "operation": format!("batch.{operation_name}"),
                        "sources": request.document_ids,
                        "outputs": outputs,
                        "failed": failed,
                    })),
            )
            .await;

        Ok(BatchConversionResult {
            job_id,
            succeeded,
            failed,
            results,
        })
    }

    async fn single<F>(
        &self,
        user: &UserContext,
        document_id: Uuid,
        output: OutputTarget,
        kind: SourceKind,
        operation: &'static str,
        convert: F,
    ) -> Result<ConversionResult>
    where
        F: FnOnce(&[u8]) -> file_conversion::Result<Converted> + Send + 'static,
    {
        let job_id = Uuid::now_v7();
        let source = self.load_source(user, document_id, kind).await?;

        let bytes = source.bytes;
        let converted = blocking(move || convert(&bytes)).await?;

        let document = self
            .store_output(user, output, &source.document, operation, converted)
            .await?;
        self.finish(user, job_id, operation, &[&source.document], vec![document])
            .await
    }

    async fn load_source(
        &self,
        user: &UserContext,
        id: Uuid,
        kind: SourceKind,
    ) -> Result<DocumentContent> {
        let document = self.documents.get(user, id).await?;
        if !kind.accepts(&document) {
            return Err(VaultError::validation(format!(
                "document {} is not {}",
                document.id,
                kind.expected()
            )));
        }
        self.documents.read(user, id).await
    }

    /// The requested folder when given. Otherwise the source's folder if the caller may add to
    /// it, else the root.
    async fn output_folder(
        &self,
        user: &UserContext,
        output: OutputTarget,
        source: Option<&Document>,
    ) -> Result<Option<Uuid>> {
        if let Some(folder_id) = output.folder_id {
            self.documents
                .access()
                .require_folder(user, folder_id, AccessLevel::Edit)
                .await?;
            return Ok(Some(folder_id));
        }

        let Some(folder_id) = source.and_then(|document| document.folder_id) else {
            return Ok(None);
        };
        match self
            .documents
            .access()
            .require_folder(user, folder_id, AccessLevel::Edit)
            .await
        {
            Ok(_) => Ok(Some(folder_id)),
            Err(VaultError::NotFound(_) | VaultError::Forbidden(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn store_output(
        &self,
        user: &UserContext,
        output: OutputTarget,
        source: &Document,
        operation: &str,
        converted: Converted,
    ) -> Result<Document> {
        let folder_id = self.output_folder(user, output, Some(source)).await?;
        let filename = output_filename(source, operation, converted.file_type);
        self.save(user, folder_id, filename, None, converted).await
    }

    async fn save(
        &self,
        user: &UserContext,
        folder_id: Option<Uuid>,
        filename: String,
        title: Option<String>,
        converted: Converted,
    ) -> Result<Document> {
        let upload = UploadDocument {
            filename,
            content_type: Some(converted.file_type.mime_type().to_string()),
            bytes: converted.bytes,
            title,
            description: None,
            folder_id,
            tags: Vec::new(),
        };
        self.documents.store(user, upload).await
    }

    async fn finish(
        &self,
        user: &UserContext,
        job_id: Uuid,
        operation: &str,
        sources: &[&Document],
        documents: Vec<Document>,
    ) -> Result<ConversionResult> {
        let source_ids: Vec<Uuid> = sources.iter().map(|d| d.id).collect();
        let output_ids: Vec<Uuid> = documents.iter().map(|d| d.id).collect();
        tracing::info!(
            job_id=%job_id,
            operation,
            sources=source_ids.len(),
            outputs=output_ids.len(),
            "conversion finished"
        );

        self.audit
            .record(
                AuditLog::new(user, AuditAction::DocumentConvert, EntityType::Document, None)
                    .with_metadata(json!({
                        "job_id": job_id,
                        "operation": operation,
                        "sources": source_ids,
                        "outputs": output_ids,
                    })),
            )
            .await;

        Ok(ConversionResult { job_id, documents })
    }
}

fn apply(operation: &BatchOperation, bytes: &[u8]) -> file_conversion::Result<Converted> {
    match operation {
        BatchOperation::RotatePdf { degrees } => pdf::rotate(bytes, *degrees, None).map(Converted::pdf),
        BatchOperation::WatermarkPdf(options) => pdf::watermark(bytes, options).map(Converted::pdf),
        BatchOperation::NumberPdfPages(options) => {
            pdf::add_page_numbers(bytes, options).map(Converted::pdf)
        }
        BatchOperation::ResizeImage(options) => {
            image_ops::resize(bytes, options).map(Converted::image)
        }
        BatchOperation::CompressImage(options) => {
            image_ops::compress(bytes, options).map(Converted::image)
        }
        BatchOperation::ConvertImage { target } => {
            image_ops::convert(bytes, *target).map(Converted::image)
        }
    }
}

/// Runs CPU bound conversion work on the blocking pool
async fn blocking<T, F>(work: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> std::result::Result<T, ConversionError> + Send + 'static,
{
    let result = tokio::task::spawn_blocking(work)
        .await
        .map_err(anyhow::Error::from)?;
    Ok(result?)
}

fn part_name(index: usize) -> String {
    format!("part-{index}.pdf")
}

fn failed(index: usize, id: Uuid, error: &VaultError) -> BatchItemResult<Uuid, Document> {
    BatchItemResult {
        index,
        key: id,
        outcome: BatchOutcome::Failed {
            error: error.to_string(),
        },
    }
}

fn stem(document: &Document) -> &str {
    let name = document.original_filename.as_str();
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name,
    }
}

fn output_filename(source: &Document, operation: &str, file_type: FileType) -> String {
    let stem = stem(source);
    let extension = file_type.as_str();
    let suffix = match operation {
        "rotate_pdf" => "rotated",
        "watermark_pdf" => "watermarked",
        "number_pdf_pages" => "numbered",
        "resize_image" => "resized",
        "compress_image" => "compressed",
        _ => return format!("{stem}.{extension}"),
    };
    format!("{stem} ({suffix}).{extension}")
}
