pub mod barcodes;
pub mod detect;
pub mod features;
pub mod mtx;

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum InputError {
    #[error("missing required file: {0}")]
    MissingFile(String),
    #[error("invalid matrix market header: {0}")]
    InvalidMtxHeader(String),
    #[error("invalid matrix market entry at line {line}: {reason}")]
    InvalidMtxEntry { line: usize, reason: String },
    #[error("invalid matrix dimensions: {0}")]
    InvalidMtxDimensions(String),
    #[error("{what} count does not match matrix: expected {expected}, found {found}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("invalid TSV row at line {line}: {reason}")]
    InvalidTsvRow { line: usize, reason: String },
    #[error("empty barcode at line {0}")]
    EmptyBarcode(usize),
    #[error("duplicate barcode {barcode} at line {line}")]
    DuplicateBarcode { barcode: String, line: usize },
    #[error("unsupported gzip input without feature enabled: {0}")]
    GzipNotEnabled(PathBuf),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

pub fn open_reader(path: &Path) -> Result<Box<dyn io::BufRead>, InputError> {
    let file = std::fs::File::open(path)?;
    if path.extension().and_then(|s| s.to_str()) == Some("gz") {
        #[cfg(feature = "gz")]
        {
            let decoder = flate2::read::GzDecoder::new(file);
            return Ok(Box::new(io::BufReader::new(decoder)));
        }
        #[cfg(not(feature = "gz"))]
        {
            return Err(InputError::GzipNotEnabled(path.to_path_buf()));
        }
    }
    Ok(Box::new(io::BufReader::new(file)))
}

/// Calls `f` with the 1-based line number and the line content (newline stripped)
/// for every line of a plain or gzipped text file.
pub fn for_each_line<F>(path: &Path, mut f: F) -> Result<(), InputError>
where
    F: FnMut(usize, &str) -> Result<(), InputError>,
{
    let mut reader = open_reader(path)?;
    let mut line = String::new();
    let mut line_no = 0usize;
    loop {
        line.clear();
        let read = reader.read_line(&mut line)?;
        if read == 0 {
            break;
        }
        line_no += 1;
        f(line_no, line.trim_end_matches(['\n', '\r']))?;
    }
    Ok(())
}
