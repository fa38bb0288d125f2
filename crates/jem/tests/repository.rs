mod common;

use common::GemFixture;
use jem::{validate_gem, ArchiveError, GemRepository, RepositoryError, MARKER_FILE};
use std::fs;
use tempfile::TempDir;

#[test]
fn added_gem_is_loadable() {
    let src = TempDir::new().unwrap();
    let dir = TempDir::new().unwrap();
    let gem_file = GemFixture::new("widget", "0.9.1")
        .require_paths(&["lib", "ext"])
        .file("ext/widget.jar", "jar")
        .write_to(src.path());

    let repo = GemRepository::open(dir.path()).unwrap();
    let gem = repo.add_gem(&gem_file).unwrap();

    assert_eq!(gem.full_name(), "widget-0.9.1");
    let paths = repo.load_paths(&gem);
    assert_eq!(
        paths,
        vec![
            dir.path().join("gems/widget-0.9.1/lib"),
            dir.path().join("gems/widget-0.9.1/ext"),
        ]
    );
    for path in &paths {
        assert!(path.join(MARKER_FILE).is_file());
    }
    assert!(dir.path().join("gems/widget-0.9.1").join(MARKER_FILE).is_file());
}

#[test]
fn missing_require_path_is_not_a_load_path() {
    let src = TempDir::new().unwrap();
    let gem_file = GemFixture::new("sparse", "1.0")
        .require_paths(&["lib", "generated"])
        .write_to(src.path());

    let repo = GemRepository::temporary().unwrap();
    let gem = repo.add_gem(&gem_file).unwrap();

    assert_eq!(repo.load_paths(&gem), vec![repo.root().join("gems/sparse-1.0/lib")]);
}

#[test]
fn specification_reads_back_installed_gem() {
    let src = TempDir::new().unwrap();
    let gem_file = GemFixture::new("roundtrip", "3.0.0")
        .platform("java")
        .bindir("exe")
        .write_to(src.path());

    let repo = GemRepository::temporary().unwrap();
    let gem = repo.add_gem(&gem_file).unwrap();

    let spec = repo.specification("roundtrip-3.0.0-java").unwrap();
    assert_eq!(spec, gem);
}

#[test]
fn unknown_specification_is_a_read_error() {
    let repo = GemRepository::temporary().unwrap();
    let err = repo.specification("ghost-1.0").unwrap_err();
    assert!(matches!(err, RepositoryError::Read { .. }));
}

#[test]
fn broken_archive_is_rejected() {
    let src = TempDir::new().unwrap();
    let gem_file = GemFixture::new("broken", "1.0")
        .without_data()
        .write_to(src.path());

    let repo = GemRepository::temporary().unwrap();
    let err = repo.add_gem(&gem_file).unwrap_err();
    assert!(matches!(err, RepositoryError::Install(_)));
}

#[test]
fn temporary_repository_is_removed_on_drop() {
    let repo = GemRepository::temporary().unwrap();
    let root = repo.root().to_path_buf();
    assert!(root.join("gems").is_dir());

    drop(repo);
    assert!(!root.exists());
}

#[test]
fn validate_accepts_well_formed_gem() {
    let src = TempDir::new().unwrap();
    let gem_file = GemFixture::new("valid", "1.0").write_to(src.path());
    validate_gem(&gem_file).unwrap();
}

#[test]
fn validate_rejects_missing_entries_and_extension() {
    let src = TempDir::new().unwrap();

    let no_metadata = GemFixture::new("a", "1.0")
        .without_metadata()
        .write_to(src.path());
    assert!(matches!(
        validate_gem(&no_metadata),
        Err(ArchiveError::MissingEntry(_))
    ));

    let renamed = src.path().join("valid.tar");
    fs::copy(GemFixture::new("b", "1.0").write_to(src.path()), &renamed).unwrap();
    assert!(matches!(validate_gem(&renamed), Err(ArchiveError::NotAGem(_))));
}
