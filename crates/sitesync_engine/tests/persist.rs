use std::fs;

use pretty_assertions::assert_eq;
use sitesync_engine::{
    ensure_output_dir, remove_path, write_atomic, write_atomic_if_changed, AtomicFileWriter,
    WriteOutcome,
};
use tempfile::TempDir;

#[test]
fn creates_missing_output_dir() {
    let temp = TempDir::new().unwrap();
    let new_dir = temp.path().join("pages").join("blog");
    assert!(!new_dir.exists());
    ensure_output_dir(&new_dir).unwrap();
    assert!(new_dir.is_dir());
}

#[test]
fn output_dir_that_is_a_file_is_rejected() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("blog");
    fs::write(&file_path, "x").unwrap();
    assert!(ensure_output_dir(&file_path).is_err());
}

#[test]
fn atomic_write_replaces_existing() {
    let temp = TempDir::new().unwrap();
    let writer = AtomicFileWriter::new(temp.path().to_path_buf());

    let first = writer.write("post.html", "hello").unwrap();
    assert_eq!(first.file_name().unwrap(), "post.html");
    assert_eq!(fs::read_to_string(&first).unwrap(), "hello");

    let second = writer.write("post.html", "world").unwrap();
    assert_eq!(first, second);
    assert_eq!(fs::read_to_string(&second).unwrap(), "world");
}

#[test]
fn no_partial_file_on_error() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("not_a_dir");
    fs::write(&file_path, "x").unwrap();

    let writer = AtomicFileWriter::new(file_path.clone());
    let result = writer.write("post.html", "data");
    assert!(result.is_err());
    assert!(!file_path.with_file_name("post.html").exists());
}

#[test]
fn failed_rename_leaves_target_and_no_temp_files() {
    let temp = TempDir::new().unwrap();
    // A non-empty directory at the target path makes the final rename fail
    // after the temp file has been fully written.
    let target = temp.path().join("state.json");
    fs::create_dir(&target).unwrap();
    fs::write(target.join("keep.txt"), "kept").unwrap();

    let result = write_atomic(&target, b"{\"new\": true}");
    assert!(result.is_err());

    assert!(target.is_dir());
    assert_eq!(fs::read_to_string(target.join("keep.txt")).unwrap(), "kept");
    let names: Vec<String> = fs::read_dir(temp.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["state.json".to_string()]);
}

#[test]
fn unchanged_content_is_not_rewritten() {
    let temp = TempDir::new().unwrap();
    let target = temp.path().join("post.html");

    assert_eq!(write_atomic_if_changed(&target, b"abc").unwrap(), WriteOutcome::Written);
    let modified = fs::metadata(&target).unwrap().modified().unwrap();

    assert_eq!(write_atomic_if_changed(&target, b"abc").unwrap(), WriteOutcome::Unchanged);
    assert_eq!(fs::metadata(&target).unwrap().modified().unwrap(), modified);

    assert_eq!(write_atomic_if_changed(&target, b"abcd").unwrap(), WriteOutcome::Written);
    assert_eq!(fs::read(&target).unwrap(), b"abcd");
}

#[test]
fn remove_path_handles_files_dirs_and_missing() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("a.html");
    let dir = temp.path().join("a.files");
    fs::write(&file, "x").unwrap();
    fs::create_dir(&dir).unwrap();
    fs::write(dir.join("img.png"), "x").unwrap();

    assert!(remove_path(&file).unwrap());
    assert!(remove_path(&dir).unwrap());
    assert!(!remove_path(&file).unwrap());
    assert!(!file.exists());
    assert!(!dir.exists());
}
