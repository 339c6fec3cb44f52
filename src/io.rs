use anyhow::{Context, Result};
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Path that stands for stdin when reading and stdout when writing.
pub const STDIO_PATH: &str = "-";

/// True when `path` refers to stdin/stdout rather than a file.
pub fn is_stdio(path: &Path) -> bool {
    path.as_os_str() == STDIO_PATH
}

fn is_gzip(path: &Path) -> bool {
    path.extension().is_some_and(|e| e == "gz")
}

/// Open a line-oriented text input. `-` reads stdin; a `.gz` suffix selects a
/// gzip decoder (multi-member streams such as BGZF are supported).
pub fn open_input(path: &Path) -> Result<Box<dyn BufRead>> {
    if is_stdio(path) {
        return Ok(Box::new(BufReader::new(io::stdin())));
    }
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    if is_gzip(path) {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Buffered output that knows how to finish a gzip stream.
pub enum OutputWriter {
    Plain(BufWriter<Box<dyn Write>>),
    Gzip(GzEncoder<BufWriter<File>>),
}

impl OutputWriter {
    /// Flush buffered data and, for gzip, write the stream trailer.
    pub fn finish(self) -> io::Result<()> {
        match self {
            Self::Plain(mut w) => w.flush(),
            Self::Gzip(w) => w.finish()?.flush(),
        }
    }
}

impl Write for OutputWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Plain(w) => w.write(buf),
            Self::Gzip(w) => w.write(buf),
        }
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        match self {
            Self::Plain(w) => w.write_all(buf),
            Self::Gzip(w) => w.write_all(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Plain(w) => w.flush(),
            Self::Gzip(w) => w.flush(),
        }
    }
}

/// Create an output writer. `-` writes stdout; a `.gz` suffix gzip-compresses.
pub fn create_output(path: &Path) -> Result<OutputWriter> {
    if is_stdio(path) {
        let stdout: Box<dyn Write> = Box::new(io::stdout());
        return Ok(OutputWriter::Plain(BufWriter::new(stdout)));
    }
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    if is_gzip(path) {
        Ok(OutputWriter::Gzip(GzEncoder::new(BufWriter::new(file), Compression::default())))
    } else {
        let file: Box<dyn Write> = Box::new(file);
        Ok(OutputWriter::Plain(BufWriter::new(file)))
    }
}

/// True when `err` (or anything it wraps) is a closed-pipe write failure.
pub fn is_broken_pipe(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<io::Error>()
            .is_some_and(|e| e.kind() == io::ErrorKind::BrokenPipe)
            || matches!(
                cause.downcast_ref::<crate::errors::DedupError>(),
                Some(crate::errors::DedupError::Io(e)) if e.kind() == io::ErrorKind::BrokenPipe
            )
    })
}
