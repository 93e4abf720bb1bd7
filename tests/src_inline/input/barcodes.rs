use super::*;
use std::fs;
use tempfile::tempdir;

#[test]
fn reads_first_column() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("barcodes.tsv");
    fs::write(&path, "AAAC-1\nAAAG-1\textra\n").expect("write file");

    let barcodes = read_barcodes(&path).expect("barcodes");
    assert_eq!(barcodes, vec!["AAAC-1", "AAAG-1"]);
}

#[test]
fn duplicate_barcode_is_rejected() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("barcodes.tsv");
    fs::write(&path, "A-1\nB-1\nA-1\n").expect("write file");

    let err = read_barcodes(&path).unwrap_err();
    assert!(matches!(err, InputError::DuplicateBarcode { line: 3, .. }));
}

#[test]
fn empty_barcode_is_rejected() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("barcodes.tsv");
    fs::write(&path, "A-1\n \n").expect("write file");

    assert!(matches!(
        read_barcodes(&path).unwrap_err(),
        InputError::EmptyBarcode(2)
    ));
}

#[cfg(feature = "gz")]
#[test]
fn reads_gzipped_barcodes() {
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;

    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("barcodes.tsv.gz");
    let mut enc = GzEncoder::new(Vec::new(), Compression::default());
    enc.write_all(b"X-1\nY-1\n").expect("gz write");
    fs::write(&path, enc.finish().expect("gz finish")).expect("write file");

    assert_eq!(read_barcodes(&path).expect("barcodes"), vec!["X-1", "Y-1"]);
}
