use super::*;
use pretty_assertions::assert_eq;

fn names(entries: &[DirEntry]) -> Vec<(&str, bool)> {
    entries.iter().map(|e| (e.name.as_str(), e.is_dir)).collect()
}

#[test]
fn normalize_folds_dots() {
    assert_eq!(normalize(Path::new("./a/b/../c")), PathBuf::from("a/c"));
    assert_eq!(normalize(Path::new("/a/../../b")), PathBuf::from("/b"));
    assert_eq!(normalize(Path::new("../a/./b")), PathBuf::from("../a/b"));
    assert_eq!(normalize(Path::new("a/../../b")), PathBuf::from("../b"));
    assert_eq!(normalize(Path::new(".")), PathBuf::new());
}

#[test]
fn memory_listing_follows_insertion_order() {
    let fs = MemoryFileSystem::new()
        .with_file("pkg/z.tarn", "package p")
        .with_file("pkg/sub/x.tarn", "package s")
        .with_file("pkg/a.tarn", "package p")
        .with_file("other/b.tarn", "package o");
    let entries = fs.list(Path::new("./pkg")).unwrap_or_else(|e| panic!("{e}"));
    assert_eq!(
        names(&entries),
        vec![("z.tarn", false), ("sub", true), ("a.tarn", false)]
    );
}

#[test]
fn memory_read_and_is_dir() {
    let fs = MemoryFileSystem::new().with_file("pkg/a.tarn", "package p");
    assert_eq!(
        fs.read(Path::new("pkg/./a.tarn")).unwrap_or_default(),
        b"package p".to_vec()
    );
    assert!(fs.is_dir(Path::new("pkg")));
    assert!(!fs.is_dir(Path::new("pkg/a.tarn")));
    assert!(!fs.is_dir(Path::new("nope")));
    assert_eq!(
        fs.read(Path::new("pkg/b.tarn")).map_err(|e| e.kind()).err(),
        Some(io::ErrorKind::NotFound)
    );
    assert!(fs.list(Path::new("nope")).is_err());
}

#[test]
fn memory_replace_keeps_position() {
    let fs = MemoryFileSystem::new()
        .with_file("p/a.tarn", "one")
        .with_file("p/b.tarn", "two");
    fs.add_file("p/a.tarn", "three");
    let entries = fs.list(Path::new("p")).unwrap_or_else(|e| panic!("{e}"));
    assert_eq!(names(&entries), vec![("a.tarn", false), ("b.tarn", false)]);
    assert_eq!(fs.read(Path::new("p/a.tarn")).unwrap_or_default(), b"three".to_vec());
}

#[test]
fn os_listing_is_sorted() {
    let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("{e}"));
    for name in ["b.tarn", "a.tarn", "c.tarn"] {
        std::fs::write(dir.path().join(name), "package p\n").unwrap_or_else(|e| panic!("{e}"));
    }
    std::fs::create_dir(dir.path().join("sub")).unwrap_or_else(|e| panic!("{e}"));
    let entries = OsFileSystem
        .list(dir.path())
        .unwrap_or_else(|e| panic!("{e}"));
    assert_eq!(
        names(&entries),
        vec![
            ("a.tarn", false),
            ("b.tarn", false),
            ("c.tarn", false),
            ("sub", true)
        ]
    );
    assert!(OsFileSystem.is_dir(&dir.path().join("sub")));
    assert_eq!(
        OsFileSystem
            .read(&dir.path().join("a.tarn"))
            .unwrap_or_default(),
        b"package p\n".to_vec()
    );
}
