//! Tests for directory archiving.

use std::collections::BTreeMap;
use std::fs;
use std::io::Read;
use std::path::Path;

use drive_backup::archive::{archive, archive_into};
use zip::{CompressionMethod, ZipArchive};

fn build_tree(root: &Path) {
    fs::create_dir_all(root.join("src/nested")).unwrap();
    fs::create_dir_all(root.join("empty")).unwrap();
    fs::write(root.join("README.md"), b"# project\n").unwrap();
    fs::write(root.join("src/main.rs"), b"fn main() {}\n").unwrap();
    fs::write(root.join("src/nested/data.bin"), [0u8, 159, 146, 150, 255]).unwrap();
}

/// Read every file entry of an archive into name -> bytes.
fn read_entries(path: &Path) -> (BTreeMap<String, Vec<u8>>, Vec<String>) {
    let mut zip = ZipArchive::new(fs::File::open(path).unwrap()).unwrap();
    let mut files = BTreeMap::new();
    let mut dirs = Vec::new();

    for i in 0..zip.len() {
        let mut entry = zip.by_index(i).unwrap();
        if entry.is_dir() {
            dirs.push(entry.name().to_string());
            continue;
        }
        assert_eq!(entry.compression(), CompressionMethod::Deflated);
        let mut content = Vec::new();
        entry.read_to_end(&mut content).unwrap();
        files.insert(entry.name().to_string(), content);
    }

    (files, dirs)
}

#[test]
fn archive_is_rooted_at_directory_name() {
    let workspace = tempfile::tempdir().unwrap();
    let source = workspace.path().join("project");
    build_tree(&source);

    let archive = archive(&source).unwrap();
    assert_eq!(archive.file_name(), "project.zip");

    let (files, dirs) = read_entries(archive.path());

    let expected: BTreeMap<String, Vec<u8>> = [
        ("project/README.md", b"# project\n".to_vec()),
        ("project/src/main.rs", b"fn main() {}\n".to_vec()),
        ("project/src/nested/data.bin", vec![0u8, 159, 146, 150, 255]),
    ]
    .into_iter()
    .map(|(name, content)| (name.to_string(), content))
    .collect();
    assert_eq!(files, expected);

    assert!(dirs.contains(&"project/".to_string()));
    assert!(dirs.contains(&"project/empty/".to_string()));
    assert!(dirs.contains(&"project/src/nested/".to_string()));
}

#[test]
fn extracted_archive_matches_source_tree() {
    let workspace = tempfile::tempdir().unwrap();
    let source = workspace.path().join("photos");
    build_tree(&source);

    let out = tempfile::tempdir().unwrap();
    let archive_path = archive_into(&source, out.path()).unwrap();
    assert_eq!(archive_path, out.path().join("photos.zip"));

    let extract_dir = tempfile::tempdir().unwrap();
    let mut zip = ZipArchive::new(fs::File::open(&archive_path).unwrap()).unwrap();
    zip.extract(extract_dir.path()).unwrap();

    let restored = extract_dir.path().join("photos");
    for relative in ["README.md", "src/main.rs", "src/nested/data.bin"] {
        assert_eq!(
            fs::read(restored.join(relative)).unwrap(),
            fs::read(source.join(relative)).unwrap(),
            "content differs for {}",
            relative
        );
    }
    assert!(restored.join("empty").is_dir());
}

#[test]
fn archive_of_empty_directory() {
    let workspace = tempfile::tempdir().unwrap();
    let source = workspace.path().join("nothing");
    fs::create_dir(&source).unwrap();

    let archive = archive(&source).unwrap();
    let (files, dirs) = read_entries(archive.path());

    assert!(files.is_empty());
    assert_eq!(dirs, vec!["nothing/".to_string()]);
}

#[cfg(unix)]
#[test]
fn symlinked_directories_are_skipped() {
    use std::os::unix::fs::symlink;

    let workspace = tempfile::tempdir().unwrap();
    let source = workspace.path().join("linked");
    fs::create_dir_all(source.join("inner")).unwrap();
    fs::write(source.join("inner/data.txt"), b"data").unwrap();
    // A link back to the root would loop forever if followed.
    symlink(&source, source.join("inner/loop")).unwrap();
    symlink(source.join("inner/data.txt"), source.join("alias.txt")).unwrap();

    let archive = archive(&source).unwrap();
    let (files, dirs) = read_entries(archive.path());

    let names: Vec<&str> = files.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["linked/alias.txt", "linked/inner/data.txt"]);
    assert_eq!(files["linked/alias.txt"], b"data".to_vec());
    assert!(!dirs.iter().any(|d| d.contains("loop")));
}
