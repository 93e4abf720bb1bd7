use std::collections::HashMap;
use std::path::Path;

use crate::input::{InputError, for_each_line};

pub fn read_barcodes(path: &Path) -> Result<Vec<String>, InputError> {
    let mut barcodes = Vec::new();
    let mut seen: HashMap<String, usize> = HashMap::new();
    for_each_line(path, |line_no, line| {
        let barcode = line.split('\t').next().unwrap_or("").trim();
        if barcode.is_empty() {
            return Err(InputError::EmptyBarcode(line_no));
        }
        if seen.insert(barcode.to_string(), line_no).is_some() {
            return Err(InputError::DuplicateBarcode {
                barcode: barcode.to_string(),
                line: line_no,
            });
        }
        barcodes.push(barcode.to_string());
        Ok(())
    })?;

    if barcodes.is_empty() {
        return Err(InputError::InvalidTsvRow {
            line: 0,
            reason: "no barcodes found".to_string(),
        });
    }

    Ok(barcodes)
}

#[cfg(test)]
#[path = "../../tests/src_inline/input/barcodes.rs"]
mod tests;
