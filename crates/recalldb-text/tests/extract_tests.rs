use std::fs;
use std::io::Write;
use tempfile::TempDir;

use recalldb_core::traits::TextExtractor;
use recalldb_text::{list_documents, ExtractorRegistry, PlainTextExtractor};

#[test]
fn list_documents_keeps_only_supported_files() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    fs::create_dir_all(dir.join("nested")).unwrap();
    fs::write(dir.join("b.txt"), "bravo").unwrap();
    fs::write(dir.join("nested/a.md"), "alpha").unwrap();
    fs::write(dir.join("photo.png"), [0u8, 1, 2]).unwrap();
    fs::write(dir.join("notes.bin"), [0u8]).unwrap();

    let registry = ExtractorRegistry::text_only();
    let files = list_documents(dir, &registry);

    let names: Vec<String> = files
        .iter()
        .map(|p| p.strip_prefix(dir).unwrap().to_string_lossy().replace('\\', "/"))
        .collect();
    assert_eq!(names, vec!["b.txt", "nested/a.md"]);
}

#[test]
fn plain_text_falls_back_to_lossy_decoding() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("latin1.txt");
    let mut f = fs::File::create(&path).unwrap();
    f.write_all(b"caf\xe9 report").unwrap();

    let text = PlainTextExtractor.extract(&path).expect("extract");
    assert!(text.starts_with("caf"));
    assert!(text.ends_with(" report"));
}

#[test]
fn missing_file_is_an_error() {
    let tmp = TempDir::new().unwrap();
    assert!(PlainTextExtractor.extract(&tmp.path().join("nope.txt")).is_err());
}
