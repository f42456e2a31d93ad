use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use flate2::Compression;
use flate2::write::GzEncoder;
use serde::Serialize;

use crate::belt_error;
use crate::error::{BeltError, BeltResult, ErrorKind};
use crate::sink::{SinkWriter, SinkWriterFactory};
use crate::types::ElementId;

/// One output line: an id plus either the record payload or the error text.
#[derive(Debug, Serialize)]
pub struct SinkLine<'a> {
    pub id: &'a ElementId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<&'a serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<'a> SinkLine<'a> {
    pub fn record(id: &'a ElementId, record: &'a serde_json::Value) -> Self {
        Self {
            id,
            record: Some(record),
            error: None,
        }
    }

    pub fn error(id: &'a ElementId, error: &BeltError) -> Self {
        Self {
            id,
            record: None,
            error: Some(error.to_string()),
        }
    }
}

/// Line encoding for the file sink.
///
/// The encoder owns the file extension, so a sink's filename always matches
/// the format actually written into it.
pub trait RecordEncoder: Send + Sync + 'static {
    fn extension(&self) -> &'static str;
    fn encode(&self, line: &SinkLine<'_>) -> BeltResult<Vec<u8>>;
}

/// Newline-delimited JSON encoding; files carry the `json` extension.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonEncoder;

impl RecordEncoder for JsonEncoder {
    fn extension(&self) -> &'static str {
        "json"
    }

    fn encode(&self, line: &SinkLine<'_>) -> BeltResult<Vec<u8>> {
        Ok(serde_json::to_vec(line)?)
    }
}

/// Factory producing one gzip-compressed output file per producer, named
/// `"{directory}/{producer}.{extension}.gz"`.
#[derive(Clone)]
pub struct FsSinkWriterFactory {
    directory: PathBuf,
    encoder: Arc<dyn RecordEncoder>,
}

impl FsSinkWriterFactory {
    /// Creates the output directory if absent; an existing directory is not
    /// an error.
    pub fn new(directory: impl Into<PathBuf>, encoder: Arc<dyn RecordEncoder>) -> BeltResult<Self> {
        let directory = directory.into();
        std::fs::create_dir_all(&directory).map_err(|err| {
            belt_error!(
                ErrorKind::SinkCreateFailed,
                "Failed to create sink directory",
                format!("{}: {err}", directory.display())
            )
        })?;
        Ok(Self {
            directory,
            encoder,
        })
    }

    /// Factory writing newline-delimited JSON.
    pub fn json(directory: impl Into<PathBuf>) -> BeltResult<Self> {
        Self::new(directory, Arc::new(JsonEncoder))
    }
}

impl std::fmt::Debug for FsSinkWriterFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FsSinkWriterFactory")
            .field("directory", &self.directory)
            .field("extension", &self.encoder.extension())
            .finish()
    }
}

impl SinkWriterFactory for FsSinkWriterFactory {
    type Writer = FsSinkWriter;

    async fn create(&self, producer_name: &str) -> BeltResult<FsSinkWriter> {
        let path = self
            .directory
            .join(format!("{producer_name}.{}.gz", self.encoder.extension()));

        let file = tokio::task::spawn_blocking({
            let path = path.clone();
            move || File::create(&path)
        })
        .await
        .map_err(|err| belt_error!(ErrorKind::WorkerPanicked, "Sink open task panicked", err))?
        .map_err(|err| {
            belt_error!(
                ErrorKind::SinkCreateFailed,
                "Failed to create sink file",
                format!("{}: {err}", path.display())
            )
        })?;

        Ok(FsSinkWriter {
            path,
            encoder: Arc::clone(&self.encoder),
            writer: Some(BufWriter::new(GzEncoder::new(file, Compression::default()))),
        })
    }
}

/// Gzip-compressed, line-delimited file writer owned by one producer.
pub struct FsSinkWriter {
    path: PathBuf,
    encoder: Arc<dyn RecordEncoder>,
    writer: Option<BufWriter<GzEncoder<File>>>,
}

impl FsSinkWriter {
    fn write_line(&mut self, line: &SinkLine<'_>) -> BeltResult<()> {
        let bytes = self.encoder.encode(line)?;
        let Some(writer) = self.writer.as_mut() else {
            return Err(belt_error!(ErrorKind::SinkWriteFailed, "Sink already closed"));
        };
        writer
            .write_all(&bytes)
            .and_then(|_| writer.write_all(b"\n"))
            .map_err(|err| {
                belt_error!(
                    ErrorKind::SinkWriteFailed,
                    "Failed to write sink line",
                    err
                )
            })
    }
}

impl std::fmt::Debug for FsSinkWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FsSinkWriter")
            .field("path", &self.path)
            .field("open", &self.writer.is_some())
            .finish()
    }
}

impl SinkWriter for FsSinkWriter {
    async fn append(&mut self, id: &ElementId, record: &serde_json::Value) -> BeltResult<()> {
        self.write_line(&SinkLine::record(id, record))
    }

    async fn append_error(&mut self, id: &ElementId, error: &BeltError) -> BeltResult<()> {
        self.write_line(&SinkLine::error(id, error))
    }

    /// Flushes the buffer, finishes the gzip stream, and syncs the file,
    /// returning the first error encountered.
    async fn close(mut self) -> BeltResult<()> {
        let Some(writer) = self.writer.take() else {
            return Ok(());
        };
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || close_writer(writer, &path))
            .await
            .map_err(|err| belt_error!(ErrorKind::WorkerPanicked, "Sink close task panicked", err))?
    }
}

fn close_writer(writer: BufWriter<GzEncoder<File>>, path: &Path) -> BeltResult<()> {
    let encoder = writer.into_inner().map_err(|err| {
        belt_error!(
            ErrorKind::SinkCloseFailed,
            "Failed to flush sink buffer",
            format!("{}: {err}", path.display())
        )
    })?;
    let file = encoder.finish().map_err(|err| {
        belt_error!(
            ErrorKind::SinkCloseFailed,
            "Failed to finish sink gzip stream",
            format!("{}: {err}", path.display())
        )
    })?;
    file.sync_all().map_err(|err| {
        belt_error!(
            ErrorKind::SinkCloseFailed,
            "Failed to sync sink file",
            format!("{}: {err}", path.display())
        )
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::io::{BufRead, BufReader};
    use tempfile::TempDir;

    fn read_lines(path: &Path) -> Vec<serde_json::Value> {
        let file = File::open(path).unwrap();
        let reader = BufReader::new(GzDecoder::new(file));
        reader
            .lines()
            .map(|line| serde_json::from_str(&line.unwrap()).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn writes_records_and_errors_as_json_lines() {
        let dir = TempDir::new().unwrap();
        let factory = FsSinkWriterFactory::json(dir.path()).unwrap();
        let mut sink = factory.create("shard-a_producer_0").await.unwrap();

        sink.append(&ElementId::from("r-1"), &serde_json::json!({"v": 1}))
            .await
            .unwrap();
        sink.append_error(
            &ElementId::from("r-2"),
            &belt_error!(ErrorKind::DecodeFailed, "Failed to decode input line"),
        )
        .await
        .unwrap();
        sink.close().await.unwrap();

        let path = dir.path().join("shard-a_producer_0.json.gz");
        let lines = read_lines(&path);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["id"], "r-1");
        assert_eq!(lines[0]["record"]["v"], 1);
        assert!(lines[0].get("error").is_none());
        assert_eq!(lines[1]["id"], "r-2");
        assert_eq!(lines[1]["error"], "Failed to decode input line");
        assert!(lines[1].get("record").is_none());
    }

    #[tokio::test]
    async fn factory_tolerates_existing_directory() {
        let dir = TempDir::new().unwrap();
        FsSinkWriterFactory::json(dir.path()).unwrap();
        FsSinkWriterFactory::json(dir.path()).unwrap();
    }

    #[tokio::test]
    async fn close_flushes_everything() {
        let dir = TempDir::new().unwrap();
        let factory = FsSinkWriterFactory::json(dir.path()).unwrap();
        let mut sink = factory.create("p").await.unwrap();

        for index in 0..100 {
            sink.append(
                &ElementId::from(format!("id-{index}")),
                &serde_json::json!({"index": index}),
            )
            .await
            .unwrap();
        }
        sink.close().await.unwrap();

        let lines = read_lines(&dir.path().join("p.json.gz"));
        assert_eq!(lines.len(), 100);
    }
}
