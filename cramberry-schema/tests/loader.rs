//! Integration tests for the schema loader: import resolution, caching
//! and cycle detection against real files.

use std::fs;
use std::path::PathBuf;

use cramberry_schema::{LoadError, Loader};

fn write(dir: &std::path::Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn test_load_with_imports() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "types.cram",
        "package types;\nmessage Address { city: string = 1; }\n",
    );
    let main = write(
        dir.path(),
        "main.cram",
        "package example;\nimport \"types.cram\" as types;\n\
         message User { id: int64 = 1 [required]; address: *types.Address = 2; }\n",
    );

    let mut loader = Loader::new();
    let loaded = loader.load(&main).unwrap();
    assert_eq!(loaded.schema.package.as_deref(), Some("example"));
    let types = loaded.imports.get("types").unwrap();
    assert!(types.schema.find_message("Address").is_some());
}

#[test]
fn test_import_without_alias_uses_stem() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "common.cram",
        "message Shared { x: int32 = 1; }\n",
    );
    let main = write(
        dir.path(),
        "main.cram",
        "import \"common.cram\";\nmessage M { s: common.Shared = 1; }\n",
    );

    let mut loader = Loader::new();
    let loaded = loader.load(&main).unwrap();
    assert!(loaded.imports.contains_key("common"));
}

#[test]
fn test_search_paths() {
    let lib_dir = tempfile::tempdir().unwrap();
    let app_dir = tempfile::tempdir().unwrap();
    write(
        lib_dir.path(),
        "shared.cram",
        "message Shared { x: int32 = 1; }\n",
    );
    let main = write(
        app_dir.path(),
        "main.cram",
        "import \"shared.cram\" as shared;\nmessage M { s: shared.Shared = 1; }\n",
    );

    let mut loader = Loader::with_search_paths(vec![lib_dir.path().to_path_buf()]);
    let loaded = loader.load(&main).unwrap();
    assert!(loaded.imports.contains_key("shared"));
}

#[test]
fn test_missing_import() {
    let dir = tempfile::tempdir().unwrap();
    let main = write(dir.path(), "main.cram", "import \"nowhere.cram\";\n");

    let mut loader = Loader::new();
    let err = loader.load(&main).unwrap_err();
    assert!(matches!(err, LoadError::ImportNotFound { .. }), "{err}");
}

#[test]
fn test_import_cycle_detected() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.cram", "import \"b.cram\";\n");
    write(dir.path(), "b.cram", "import \"a.cram\";\n");
    let a = dir.path().join("a.cram");

    let mut loader = Loader::new();
    let err = loader.load(&a).unwrap_err();
    let LoadError::ImportCycle { chain } = err else {
        panic!("expected cycle, got {err}");
    };
    assert!(chain.len() >= 3);
    assert_eq!(chain.first(), chain.last());
}

#[test]
fn test_diamond_imports_cached() {
    // base is imported twice; the loader must parse it once and share it.
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "base.cram", "message Base { x: int32 = 1; }\n");
    write(
        dir.path(),
        "left.cram",
        "import \"base.cram\" as base;\nmessage L { b: base.Base = 1; }\n",
    );
    write(
        dir.path(),
        "right.cram",
        "import \"base.cram\" as base;\nmessage R { b: base.Base = 1; }\n",
    );
    let main = write(
        dir.path(),
        "main.cram",
        "import \"left.cram\" as left;\nimport \"right.cram\" as right;\n\
         message M { l: left.L = 1; r: right.R = 2; }\n",
    );

    let mut loader = Loader::new();
    let loaded = loader.load(&main).unwrap();
    let via_left = loaded.imports["left"].imports["base"].clone();
    let via_right = loaded.imports["right"].imports["base"].clone();
    assert!(std::sync::Arc::ptr_eq(&via_left, &via_right));
}

#[test]
fn test_parse_errors_reported_with_path() {
    let dir = tempfile::tempdir().unwrap();
    let main = write(dir.path(), "broken.cram", "message M { id int64 = 1; }\n");

    let mut loader = Loader::new();
    let err = loader.load(&main).unwrap_err();
    let LoadError::Parse { path, count, .. } = err else {
        panic!("expected parse error");
    };
    assert!(path.ends_with("broken.cram"));
    assert!(count >= 1);
}

#[test]
fn test_validation_errors_surface() {
    let dir = tempfile::tempdir().unwrap();
    let main = write(
        dir.path(),
        "dup.cram",
        "message M { a: int32 = 1; b: int32 = 1; }\n",
    );

    let mut loader = Loader::new();
    let err = loader.load(&main).unwrap_err();
    assert!(matches!(err, LoadError::Validation { .. }), "{err}");
}
