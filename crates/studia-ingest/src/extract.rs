//! Text extraction adapters for uploaded study material.
//!
//! PDF extraction shells out to `pdftotext` (poppler-utils) and DOCX to
//! `pandoc`; plain text is decoded natively. Each external command runs
//! under a per-invocation timeout.

use std::collections::HashMap;
use std::io::Write;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tempfile::NamedTempFile;
use tokio::process::Command;
use tracing::warn;

use studia_core::defaults::EXTRACTION_CMD_TIMEOUT_SECS;
use studia_core::models::FileType;
use studia_core::{Error, Result};

/// Output of a text extraction run.
#[derive(Debug, Clone)]
pub struct ExtractionResult {
    /// The full extracted text.
    pub text: String,
    /// Adapter-specific metadata (page count, char count, converter used).
    pub metadata: JsonValue,
}

/// Strategy for turning uploaded file bytes into plain text.
#[async_trait]
pub trait ExtractionAdapter: Send + Sync {
    /// Extract text from raw file bytes.
    async fn extract(&self, data: &[u8], filename: &str) -> Result<ExtractionResult>;

    /// Check that the adapter's external tooling (if any) is available.
    async fn health_check(&self) -> Result<bool>;

    /// Short adapter name for logging.
    fn name(&self) -> &str;
}

/// Run a command with a timeout, returning stdout as a string.
async fn run_cmd_with_timeout(cmd: &mut Command, timeout_secs: u64) -> Result<String> {
    let output = tokio::time::timeout(std::time::Duration::from_secs(timeout_secs), cmd.output())
        .await
        .map_err(|_| {
            Error::Extraction(format!("External command timed out after {}s", timeout_secs))
        })?
        .map_err(|e| Error::Extraction(format!("Failed to execute command: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::Extraction(format!(
            "Command failed (exit {}): {}",
            output.status,
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Write upload bytes to a named temp file so file-path converters can read them.
fn write_temp(data: &[u8]) -> Result<NamedTempFile> {
    let mut tmpfile = NamedTempFile::new()
        .map_err(|e| Error::Extraction(format!("Failed to create temp file: {}", e)))?;
    tmpfile
        .write_all(data)
        .map_err(|e| Error::Extraction(format!("Failed to write temp file: {}", e)))?;
    Ok(tmpfile)
}

fn text_metadata(text: &str, extra: &[(&str, JsonValue)]) -> JsonValue {
    let mut obj = serde_json::Map::new();
    obj.insert("char_count".to_string(), JsonValue::Number(text.len().into()));
    obj.insert(
        "line_count".to_string(),
        JsonValue::Number(text.lines().count().into()),
    );
    for (key, value) in extra {
        obj.insert((*key).to_string(), value.clone());
    }
    JsonValue::Object(obj)
}

/// Adapter for extracting text from PDF files using `pdftotext`.
pub struct PdfTextAdapter;

/// Parse `pdfinfo` output into a JSON metadata object.
fn parse_pdfinfo(output: &str) -> JsonValue {
    let mut metadata = serde_json::Map::new();

    for line in output.lines() {
        if let Some((key, value)) = line.split_once(':') {
            let key = key.trim().to_lowercase().replace(' ', "_");
            let value = value.trim();
            if !value.is_empty() {
                if key == "pages" {
                    if let Ok(pages) = value.parse::<u64>() {
                        metadata.insert(key, JsonValue::Number(pages.into()));
                        continue;
                    }
                }
                metadata.insert(key, JsonValue::String(value.to_string()));
            }
        }
    }

    JsonValue::Object(metadata)
}

#[async_trait]
impl ExtractionAdapter for PdfTextAdapter {
    async fn extract(&self, data: &[u8], filename: &str) -> Result<ExtractionResult> {
        if data.is_empty() {
            return Err(Error::InvalidInput(
                "Cannot extract text from empty PDF data".to_string(),
            ));
        }

        // Validate PDF magic bytes (%PDF)
        if data.len() < 4 || &data[0..4] != b"%PDF" {
            return Err(Error::InvalidInput(format!(
                "File '{}' is not a valid PDF (missing %PDF header)",
                filename
            )));
        }

        let tmpfile = write_temp(data)?;
        let tmp_path = tmpfile.path().to_string_lossy().to_string();

        let pdfinfo_output = run_cmd_with_timeout(
            Command::new("pdfinfo").arg(&tmp_path),
            EXTRACTION_CMD_TIMEOUT_SECS,
        )
        .await;

        let mut metadata = match pdfinfo_output {
            Ok(output) => parse_pdfinfo(&output),
            Err(e) => {
                warn!(filename, error = %e, "pdfinfo failed, continuing without metadata");
                serde_json::json!({})
            }
        };

        let text = run_cmd_with_timeout(
            Command::new("pdftotext").arg(&tmp_path).arg("-"),
            EXTRACTION_CMD_TIMEOUT_SECS,
        )
        .await?;

        if let Some(obj) = metadata.as_object_mut() {
            obj.insert("char_count".to_string(), JsonValue::Number(text.len().into()));
            obj.insert(
                "line_count".to_string(),
                JsonValue::Number(text.lines().count().into()),
            );
        }

        Ok(ExtractionResult { text, metadata })
    }

    async fn health_check(&self) -> Result<bool> {
        match Command::new("pdftotext").arg("-v").output().await {
            Ok(output) => {
                // pdftotext -v prints version to stderr and exits with 0 or 99
                // depending on the version. Both indicate the binary exists.
                Ok(output.status.success() || output.status.code() == Some(99))
            }
            Err(_) => Ok(false),
        }
    }

    fn name(&self) -> &str {
        "pdf_text"
    }
}

/// Adapter for extracting text from DOCX files using `pandoc`.
pub struct DocxAdapter;

#[async_trait]
impl ExtractionAdapter for DocxAdapter {
    async fn extract(&self, data: &[u8], filename: &str) -> Result<ExtractionResult> {
        if data.is_empty() {
            return Err(Error::InvalidInput(
                "Cannot extract text from empty DOCX data".to_string(),
            ));
        }

        // DOCX files are ZIP archives (PK magic)
        if data.len() < 2 || &data[0..2] != b"PK" {
            return Err(Error::InvalidInput(format!(
                "File '{}' is not a valid DOCX (missing ZIP header)",
                filename
            )));
        }

        let tmpfile = write_temp(data)?;
        let tmp_path = tmpfile.path().to_string_lossy().to_string();

        let text = run_cmd_with_timeout(
            Command::new("pandoc")
                .arg("--from=docx")
                .arg("--to=plain")
                .arg("--wrap=none")
                .arg(&tmp_path),
            EXTRACTION_CMD_TIMEOUT_SECS,
        )
        .await?;

        let metadata = text_metadata(&text, &[("converter", JsonValue::String("pandoc".into()))]);
        Ok(ExtractionResult { text, metadata })
    }

    async fn health_check(&self) -> Result<bool> {
        match Command::new("pandoc").arg("--version").output().await {
            Ok(output) => Ok(output.status.success()),
            Err(_) => Ok(false),
        }
    }

    fn name(&self) -> &str {
        "docx"
    }
}

/// Adapter for plain text files. Decodes bytes as UTF-8, lossily.
pub struct PlainTextAdapter;

#[async_trait]
impl ExtractionAdapter for PlainTextAdapter {
    async fn extract(&self, data: &[u8], _filename: &str) -> Result<ExtractionResult> {
        if data.is_empty() {
            return Err(Error::InvalidInput(
                "Cannot extract text from empty file".to_string(),
            ));
        }

        let text = String::from_utf8_lossy(data).into_owned();
        let metadata = text_metadata(&text, &[]);
        Ok(ExtractionResult { text, metadata })
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "plain_text"
    }
}

/// Registry routing uploads to an extraction adapter by file type.
pub struct ExtractionRegistry {
    adapters: HashMap<FileType, Box<dyn ExtractionAdapter>>,
}

impl ExtractionRegistry {
    /// Create a registry with the standard adapters registered.
    pub fn new() -> Self {
        let mut adapters: HashMap<FileType, Box<dyn ExtractionAdapter>> = HashMap::new();
        adapters.insert(FileType::Pdf, Box::new(PdfTextAdapter));
        adapters.insert(FileType::Docx, Box::new(DocxAdapter));
        adapters.insert(FileType::Txt, Box::new(PlainTextAdapter));
        Self { adapters }
    }

    /// Get the adapter for a file type.
    pub fn adapter_for(&self, file_type: FileType) -> Result<&dyn ExtractionAdapter> {
        self.adapters
            .get(&file_type)
            .map(|a| a.as_ref())
            .ok_or_else(|| {
                Error::Extraction(format!("No extraction adapter for file type '{}'", file_type))
            })
    }

    /// Detect the file type from content, falling back to the filename extension.
    pub fn detect_file_type(data: &[u8], filename: &str) -> Result<FileType> {
        if let Some(kind) = infer::get(data) {
            match kind.mime_type() {
                "application/pdf" => return Ok(FileType::Pdf),
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
                    return Ok(FileType::Docx)
                }
                // Generic zip: could still be a docx with an unusual entry order,
                // fall through to the extension.
                "application/zip" => {}
                other => {
                    return Err(Error::InvalidInput(format!(
                        "Unsupported file type '{}' for '{}'",
                        other, filename
                    )))
                }
            }
        }

        let extension = filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        match extension.as_str() {
            "pdf" => Ok(FileType::Pdf),
            "docx" => Ok(FileType::Docx),
            "txt" | "text" | "md" => Ok(FileType::Txt),
            _ => Err(Error::InvalidInput(format!(
                "Unsupported file extension for '{}'; expected pdf, docx, or txt",
                filename
            ))),
        }
    }

    /// Detect the file type and extract text in one step.
    pub async fn extract(&self, data: &[u8], filename: &str) -> Result<(FileType, ExtractionResult)> {
        let file_type = Self::detect_file_type(data, filename)?;
        let adapter = self.adapter_for(file_type)?;
        let result = adapter.extract(data, filename).await?;
        Ok((file_type, result))
    }
}

impl Default for ExtractionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
