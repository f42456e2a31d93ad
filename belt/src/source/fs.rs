use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use flate2::read::GzDecoder;
use serde::de::DeserializeOwned;
use walkdir::WalkDir;

use crate::error::{BeltResult, ErrorKind};
use crate::source::{ElementPartition, ElementShard, ElementSource};
use crate::types::Offset;
use crate::{bail, belt_error};

/// Ceiling on a single input line. Longer lines fail the partition instead
/// of ballooning memory.
const MAX_LINE_BYTES: usize = 128 * 1024 * 1024;

/// Decodes one input line into a record.
pub type LineDecoder<T> = Arc<dyn Fn(&[u8]) -> BeltResult<T> + Send + Sync>;

/// Line decoder for newline-delimited JSON.
pub fn json_line_decoder<T: DeserializeOwned>() -> LineDecoder<T> {
    Arc::new(|line| {
        serde_json::from_slice(line).map_err(|err| {
            belt_error!(ErrorKind::DecodeFailed, "Failed to decode input line", err)
        })
    })
}

/// Source over line-delimited files in a directory tree.
///
/// Every file is one partition; compression is auto-detected by the `.gz`
/// suffix. Shard assignment depends on the constructor: one shard for the
/// whole directory, or one shard per filename prefix.
pub struct DirectorySource<T> {
    id: String,
    shards: Vec<FileShard<T>>,
}

impl<T> std::fmt::Debug for DirectorySource<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectorySource")
            .field("id", &self.id)
            .field("shards", &self.shards.len())
            .finish()
    }
}

impl<T: Send + Sync + 'static> DirectorySource<T> {
    /// A single shard holding every file under `directory` whose name ends
    /// with `suffix`.
    pub fn single_shard(
        directory: impl AsRef<Path>,
        suffix: &str,
        decoder: LineDecoder<T>,
    ) -> BeltResult<Self> {
        let directory = directory.as_ref();
        let files = collect_files(directory, |name| name.ends_with(suffix))?;
        let id = directory.display().to_string();
        let shard = FileShard {
            id: id.clone(),
            files,
            decoder,
        };
        Ok(Self {
            id,
            shards: vec![shard],
        })
    }

    /// One shard per filename prefix: every `.gz` file under `directory` is
    /// grouped by the token before the first `_` in its name.
    pub fn grouped_by_prefix(
        directory: impl AsRef<Path>,
        decoder: LineDecoder<T>,
    ) -> BeltResult<Self> {
        let directory = directory.as_ref();
        let mut files_per_shard: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
        for path in collect_files(directory, |name| name.ends_with(".gz"))? {
            let name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            let prefix = name.split('_').next().unwrap_or(&name).to_owned();
            files_per_shard.entry(prefix).or_default().push(path);
        }

        let shards = files_per_shard
            .into_iter()
            .map(|(prefix, files)| FileShard {
                id: prefix,
                files,
                decoder: Arc::clone(&decoder),
            })
            .collect();
        Ok(Self {
            id: directory.display().to_string(),
            shards,
        })
    }
}

fn collect_files(directory: &Path, matches: impl Fn(&str) -> bool) -> BeltResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(directory) {
        let entry = entry.map_err(|err| {
            belt_error!(
                ErrorKind::SourceEnumerationFailed,
                "Failed to walk source directory",
                err
            )
        })?;
        if entry.file_type().is_file() && matches(&entry.file_name().to_string_lossy()) {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

impl<T: Send + Sync + 'static> ElementSource<T> for DirectorySource<T> {
    type Shard = FileShard<T>;

    fn id(&self) -> &str {
        &self.id
    }

    async fn shards(&self) -> BeltResult<Vec<FileShard<T>>> {
        Ok(self.shards.clone())
    }
}

/// A group of files read as one shard.
pub struct FileShard<T> {
    id: String,
    files: Vec<PathBuf>,
    decoder: LineDecoder<T>,
}

impl<T> std::fmt::Debug for FileShard<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileShard")
            .field("id", &self.id)
            .field("files", &self.files)
            .finish()
    }
}

impl<T> Clone for FileShard<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            files: self.files.clone(),
            decoder: Arc::clone(&self.decoder),
        }
    }
}

impl<T: Send + Sync + 'static> ElementShard<T> for FileShard<T> {
    type Resource = ();
    type Partition = FilePartition<T>;

    fn id(&self) -> &str {
        &self.id
    }

    async fn new_resource(&self) -> BeltResult<()> {
        Ok(())
    }

    async fn partitions(&self) -> BeltResult<Vec<FilePartition<T>>> {
        Ok(self
            .files
            .iter()
            .map(|path| FilePartition::new(path.clone(), Arc::clone(&self.decoder)))
            .collect())
    }
}

/// One line-delimited file read as a partition.
///
/// The file opens lazily on the first batch and reading happens on blocking
/// tasks, with the reader state handed back and forth so the partition stays
/// movable between polls.
pub struct FilePartition<T> {
    id: String,
    path: PathBuf,
    compressed: bool,
    decoder: LineDecoder<T>,
    reader: Option<Box<dyn BufRead + Send>>,
    offset: u64,
    done: bool,
}

impl<T: Send + 'static> FilePartition<T> {
    pub fn new(path: PathBuf, decoder: LineDecoder<T>) -> Self {
        let compressed = path.extension().is_some_and(|extension| extension == "gz");
        Self {
            id: path.display().to_string(),
            path,
            compressed,
            decoder,
            reader: None,
            offset: 0,
            done: false,
        }
    }
}

impl<T> std::fmt::Debug for FilePartition<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilePartition")
            .field("path", &self.path)
            .field("compressed", &self.compressed)
            .field("offset", &self.offset)
            .field("done", &self.done)
            .finish()
    }
}

impl<T: Send + Sync + 'static> ElementPartition<T> for FilePartition<T> {
    type Resource = ();

    fn id(&self) -> &str {
        &self.id
    }

    fn done(&self) -> bool {
        self.done
    }

    async fn next_batch(
        &mut self,
        _resource: &mut (),
        batch_size: usize,
    ) -> BeltResult<Option<(Vec<T>, Offset)>> {
        if self.done {
            return Ok(None);
        }

        let reader = self.reader.take();
        let path = self.path.clone();
        let compressed = self.compressed;
        let decoder = Arc::clone(&self.decoder);
        let (reader, outcome) = tokio::task::spawn_blocking(move || {
            let mut reader = match reader {
                Some(reader) => reader,
                None => match open_line_reader(&path, compressed) {
                    Ok(reader) => reader,
                    Err(err) => return (None, Err(err)),
                },
            };
            let outcome = read_batch(reader.as_mut(), &decoder, batch_size, MAX_LINE_BYTES);
            (Some(reader), outcome)
        })
        .await
        .map_err(|err| belt_error!(ErrorKind::WorkerPanicked, "File reader task panicked", err))?;

        self.reader = reader;
        let records = outcome?;
        self.offset += records.len() as u64;

        if records.is_empty() {
            self.done = true;
            self.reader = None;
            return Ok(None);
        }
        Ok(Some((records, Offset::Index(self.offset))))
    }

    async fn close(&mut self) -> BeltResult<()> {
        self.reader = None;
        Ok(())
    }
}

fn open_line_reader(path: &Path, compressed: bool) -> BeltResult<Box<dyn BufRead + Send>> {
    let file = File::open(path).map_err(|err| {
        belt_error!(
            ErrorKind::PartitionReadFailed,
            "Failed to open source file",
            format!("{}: {err}", path.display())
        )
    })?;
    Ok(if compressed {
        Box::new(BufReader::new(GzDecoder::new(file)))
    } else {
        Box::new(BufReader::new(file))
    })
}

fn read_batch<T>(
    reader: &mut (dyn BufRead + Send),
    decoder: &LineDecoder<T>,
    batch_size: usize,
    max_line_bytes: usize,
) -> BeltResult<Vec<T>> {
    let mut records = Vec::with_capacity(batch_size);
    let mut line = Vec::with_capacity(1024);
    for _ in 0..batch_size {
        line.clear();
        let read = read_line_capped(reader, &mut line, max_line_bytes)?;
        if read == 0 {
            break;
        }
        while line.last().is_some_and(|byte| *byte == b'\n' || *byte == b'\r') {
            line.pop();
        }
        records.push(decoder(&line)?);
    }
    Ok(records)
}

/// Reads one `\n`-terminated line into `line`, erroring before the buffer
/// grows past `max_line_bytes`.
fn read_line_capped(
    reader: &mut (dyn BufRead + Send),
    line: &mut Vec<u8>,
    max_line_bytes: usize,
) -> BeltResult<usize> {
    let mut read = 0;
    loop {
        let (consumed, terminated) = {
            let buffer = reader.fill_buf().map_err(|err| {
                belt_error!(
                    ErrorKind::PartitionReadFailed,
                    "Failed to read line from source file",
                    err
                )
            })?;
            if buffer.is_empty() {
                break;
            }
            match buffer.iter().position(|&byte| byte == b'\n') {
                Some(position) => {
                    line.extend_from_slice(&buffer[..=position]);
                    (position + 1, true)
                }
                None => {
                    line.extend_from_slice(buffer);
                    (buffer.len(), false)
                }
            }
        };
        reader.consume(consumed);
        read += consumed;
        if line.len() > max_line_bytes {
            bail!(
                ErrorKind::LineTooLong,
                "Input line exceeds the line buffer ceiling",
                format!("more than {max_line_bytes} bytes")
            );
        }
        if terminated {
            break;
        }
    }
    Ok(read)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::{Cursor, Write};
    use tempfile::TempDir;

    fn write_plain(directory: &Path, name: &str, lines: &[&str]) -> PathBuf {
        let path = directory.join(name);
        std::fs::write(&path, lines.join("\n") + "\n").unwrap();
        path
    }

    fn write_gzipped(directory: &Path, name: &str, lines: &[&str]) -> PathBuf {
        let path = directory.join(name);
        let file = File::create(&path).unwrap();
        let mut encoder = GzEncoder::new(file, Compression::default());
        for line in lines {
            writeln!(encoder, "{line}").unwrap();
        }
        encoder.finish().unwrap();
        path
    }

    fn string_decoder() -> LineDecoder<String> {
        Arc::new(|line| Ok(String::from_utf8_lossy(line).into_owned()))
    }

    async fn drain_partition(partition: &mut FilePartition<String>) -> Vec<String> {
        let mut records = Vec::new();
        while !partition.done() {
            if let Some((batch, _)) = partition.next_batch(&mut (), 2).await.unwrap() {
                records.extend(batch);
            }
        }
        records
    }

    #[tokio::test]
    async fn reads_plain_file_in_batches() {
        let dir = TempDir::new().unwrap();
        let path = write_plain(dir.path(), "data.ndjson", &["a", "b", "c"]);

        let mut partition = FilePartition::new(path, string_decoder());
        let records = drain_partition(&mut partition).await;
        assert_eq!(records, vec!["a", "b", "c"]);
        assert!(partition.done());
    }

    #[tokio::test]
    async fn reads_gzipped_file() {
        let dir = TempDir::new().unwrap();
        let path = write_gzipped(dir.path(), "data_1.gz", &["x", "y"]);

        let mut partition = FilePartition::new(path, string_decoder());
        let records = drain_partition(&mut partition).await;
        assert_eq!(records, vec!["x", "y"]);
    }

    #[tokio::test]
    async fn offset_counts_consumed_records() {
        let dir = TempDir::new().unwrap();
        let path = write_plain(dir.path(), "data.ndjson", &["a", "b", "c"]);

        let mut partition = FilePartition::new(path, string_decoder());
        let (_, offset) = partition.next_batch(&mut (), 2).await.unwrap().unwrap();
        assert_eq!(offset, Offset::Index(2));
        let (_, offset) = partition.next_batch(&mut (), 2).await.unwrap().unwrap();
        assert_eq!(offset, Offset::Index(3));
    }

    #[tokio::test]
    async fn decoder_errors_are_fatal_to_the_partition() {
        let dir = TempDir::new().unwrap();
        let path = write_plain(dir.path(), "data.ndjson", &["{\"ok\":1}", "not-json"]);

        let mut partition: FilePartition<serde_json::Value> =
            FilePartition::new(path, json_line_decoder());
        let err = partition.next_batch(&mut (), 10).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DecodeFailed);
    }

    #[test]
    fn read_batch_rejects_overlong_lines() {
        let decoder = string_decoder();
        let mut input = Cursor::new(b"short\nmuch-longer-line\n".to_vec());
        let err = read_batch(&mut input, &decoder, 10, 8).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LineTooLong);
    }

    #[test]
    fn read_batch_strips_line_endings() {
        let decoder = string_decoder();
        let mut input = Cursor::new(b"one\r\ntwo\n".to_vec());
        let records = read_batch(&mut input, &decoder, 10, 1024).unwrap();
        assert_eq!(records, vec!["one", "two"]);
    }

    #[tokio::test]
    async fn grouped_by_prefix_builds_one_shard_per_prefix() {
        let dir = TempDir::new().unwrap();
        write_gzipped(dir.path(), "alpha_0.gz", &["1"]);
        write_gzipped(dir.path(), "alpha_1.gz", &["2"]);
        write_gzipped(dir.path(), "beta_0.gz", &["3"]);
        write_plain(dir.path(), "ignored.txt", &["nope"]);

        let source: DirectorySource<String> =
            DirectorySource::grouped_by_prefix(dir.path(), string_decoder()).unwrap();
        let shards = source.shards().await.unwrap();
        let ids: Vec<&str> = shards.iter().map(|shard| shard.id()).collect();
        assert_eq!(ids, vec!["alpha", "beta"]);

        assert_eq!(shards[0].partitions().await.unwrap().len(), 2);
        assert_eq!(shards[1].partitions().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn single_shard_collects_matching_files() {
        let dir = TempDir::new().unwrap();
        write_plain(dir.path(), "a.ndjson", &["1"]);
        write_plain(dir.path(), "b.ndjson", &["2"]);
        write_plain(dir.path(), "c.other", &["3"]);

        let source: DirectorySource<String> =
            DirectorySource::single_shard(dir.path(), ".ndjson", string_decoder()).unwrap();
        let shards = source.shards().await.unwrap();
        assert_eq!(shards.len(), 1);
        assert_eq!(shards[0].partitions().await.unwrap().len(), 2);
    }
}
