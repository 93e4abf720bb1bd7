use std::path::Path;

use crate::input::{InputError, open_reader};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueField {
    Integer,
    Real,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatrixHeader {
    pub n_rows: usize,
    pub n_cols: usize,
    pub nnz: usize,
    pub field: ValueField,
}

/// One stored entry as (column, row, count), zero-based.
pub type Entry = (u32, u32, u32);

pub fn read_header(path: &Path) -> Result<MatrixHeader, InputError> {
    let mut reader = open_reader(path)?;
    let mut line = String::new();
    let mut line_no = 0usize;
    read_header_from(&mut *reader, &mut line, &mut line_no)
}

pub fn read_entries(path: &Path) -> Result<(MatrixHeader, Vec<Entry>), InputError> {
    let mut reader = open_reader(path)?;
    let mut line = String::new();
    let mut line_no = 0usize;
    let header = read_header_from(&mut *reader, &mut line, &mut line_no)?;

    let mut entries = Vec::with_capacity(header.nnz);
    let mut seen = 0usize;
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            break;
        }
        line_no += 1;
        let value = line.trim();
        if value.is_empty() || value.starts_with('%') {
            continue;
        }
        seen += 1;
        if seen > header.nnz {
            return Err(InputError::InvalidMtxDimensions(format!(
                "more entries than the declared {}",
                header.nnz
            )));
        }
        let (row, col, count) = parse_entry(value, line_no, &header)?;
        if count > 0 {
            entries.push((col, row, count));
        }
    }

    if seen != header.nnz {
        return Err(InputError::InvalidMtxDimensions(format!(
            "declared {} entries, found {}",
            header.nnz, seen
        )));
    }

    Ok((header, entries))
}

fn read_header_from(
    reader: &mut dyn std::io::BufRead,
    line: &mut String,
    line_no: &mut usize,
) -> Result<MatrixHeader, InputError> {
    line.clear();
    if reader.read_line(line)? == 0 {
        return Err(InputError::InvalidMtxHeader("empty file".to_string()));
    }
    *line_no += 1;
    let field = parse_banner(line.trim())?;

    loop {
        line.clear();
        if reader.read_line(line)? == 0 {
            return Err(InputError::InvalidMtxHeader(
                "missing size line".to_string(),
            ));
        }
        *line_no += 1;
        let value = line.trim();
        if value.is_empty() || value.starts_with('%') {
            continue;
        }
        let dims: Vec<&str> = value.split_whitespace().collect();
        if dims.len() != 3 {
            return Err(InputError::InvalidMtxHeader(format!(
                "size line must have 3 fields, found {}",
                dims.len()
            )));
        }
        let parse = |s: &str, name: &str| {
            s.parse::<usize>().map_err(|_| {
                InputError::InvalidMtxHeader(format!("invalid {} in size line: {}", name, s))
            })
        };
        let n_rows = parse(dims[0], "row count")?;
        let n_cols = parse(dims[1], "column count")?;
        let nnz = parse(dims[2], "entry count")?;
        if n_rows > u32::MAX as usize || n_cols > u32::MAX as usize {
            return Err(InputError::InvalidMtxDimensions(
                "dimensions exceed u32 index range".to_string(),
            ));
        }
        return Ok(MatrixHeader {
            n_rows,
            n_cols,
            nnz,
            field,
        });
    }
}

fn parse_banner(banner: &str) -> Result<ValueField, InputError> {
    let tokens: Vec<String> = banner
        .split_whitespace()
        .map(|t| t.to_ascii_lowercase())
        .collect();
    if tokens.len() != 5 || tokens[0] != "%%matrixmarket" {
        return Err(InputError::InvalidMtxHeader(format!(
            "unexpected banner: {}",
            banner
        )));
    }
    if tokens[1] != "matrix" || tokens[2] != "coordinate" {
        return Err(InputError::InvalidMtxHeader(
            "only coordinate matrices are supported".to_string(),
        ));
    }
    if tokens[4] != "general" {
        return Err(InputError::InvalidMtxHeader(format!(
            "unsupported symmetry: {}",
            tokens[4]
        )));
    }
    match tokens[3].as_str() {
        "integer" => Ok(ValueField::Integer),
        "real" => Ok(ValueField::Real),
        other => Err(InputError::InvalidMtxHeader(format!(
            "unsupported value field: {}",
            other
        ))),
    }
}

fn parse_entry(
    value: &str,
    line_no: usize,
    header: &MatrixHeader,
) -> Result<(u32, u32, u32), InputError> {
    let bad = |reason: String| InputError::InvalidMtxEntry {
        line: line_no,
        reason,
    };
    let parts: Vec<&str> = value.split_whitespace().collect();
    if parts.len() != 3 {
        return Err(bad(format!("expected 3 fields, found {}", parts.len())));
    }
    let row: usize = parts[0]
        .parse()
        .map_err(|_| bad(format!("invalid row index: {}", parts[0])))?;
    let col: usize = parts[1]
        .parse()
        .map_err(|_| bad(format!("invalid column index: {}", parts[1])))?;
    if row == 0 || row > header.n_rows {
        return Err(bad(format!("row index {} out of 1..={}", row, header.n_rows)));
    }
    if col == 0 || col > header.n_cols {
        return Err(bad(format!(
            "column index {} out of 1..={}",
            col, header.n_cols
        )));
    }

    let count = match header.field {
        ValueField::Integer => parts[2]
            .parse::<u32>()
            .map_err(|_| bad(format!("invalid count: {}", parts[2])))?,
        ValueField::Real => {
            let v: f64 = parts[2]
                .parse()
                .map_err(|_| bad(format!("invalid value: {}", parts[2])))?;
            if !v.is_finite() || v < 0.0 || v.fract().abs() > 1e-6 || v > u32::MAX as f64 {
                return Err(bad(format!("non-integer matrix value: {}", parts[2])));
            }
            v.round() as u32
        }
    };

    Ok(((row - 1) as u32, (col - 1) as u32, count))
}

#[cfg(test)]
#[path = "../../tests/src_inline/input/mtx.rs"]
mod tests;
