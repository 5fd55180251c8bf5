//! Options loaded from files on disk

mod common;

use std::io::Write;

use common::*;
use qat_engine::{BuildMode, CompileOptions, ConfigError, DefineValue};

fn write_options(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_options_file_is_loaded() {
    let file = write_options(
        r#"
        name = "kernel"
        mode = "release"
        prerun_loop_limit = 100

        [defines]
        arch_bits = 64
        "#,
    );
    let options = CompileOptions::from_file(file.path()).unwrap();

    assert_eq!(options.name, "kernel");
    assert_eq!(options.mode, BuildMode::Release);
    assert_eq!(options.prerun_loop_limit, 100);
    assert_eq!(options.pointer_width, 64);
    assert_eq!(options.defines.get("arch_bits"), Some(&DefineValue::Int(64)));
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = CompileOptions::from_file(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
}

#[test]
fn test_empty_name_is_rejected() {
    let file = write_options("name = \"\"");
    let err = CompileOptions::from_file(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::MissingName));
}

#[test]
fn test_defines_from_file_drive_guards() {
    let file = write_options("[defines]\nwith_logging = false\n");
    let options = CompileOptions::from_file(file.path()).unwrap();

    let logger = function("log", vec![], None, vec![]).with_guard(entity("with_logging"));
    let fallback = function("fallback", vec![], None, vec![]);
    let output = compile_ok(&program(vec![logger, fallback]), &options);

    assert!(output.ir.get_function_by_name("main::log").is_none());
    assert!(output.ir.get_function_by_name("main::fallback").is_some());
}

#[test]
fn test_release_mode_from_file_rejects_todo() {
    let file = write_options("mode = \"release\"");
    let options = CompileOptions::from_file(file.path()).unwrap();

    let program = program(vec![function("unfinished", vec![], None, vec![todo(None)])]);
    let failure = compile_err(&program, &options);
    assert_eq!(error_code(&failure), "E5001");
}
