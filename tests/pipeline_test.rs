use std::fs;
use std::path::PathBuf;
use taskfog::config::ObfuscatorConfig;
use taskfog::emit::{RUNTIME_HEADER, RUNTIME_HEADER_NAME};
use taskfog::pipeline::{Diagnostic, Obfuscator, OutputTarget, PipelineError};
use tempfile::TempDir;

const MATH: &str = "int square(int x) {\n    return x * x;\n}\n";
const MAIN: &str = "int square(int x);\n\nint main() {\n    return square(7);\n}\n";

fn project() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("src/lib")).unwrap();
    fs::write(dir.path().join("src/main.c"), MAIN).unwrap();
    fs::write(dir.path().join("src/lib/math.c"), MATH).unwrap();
    fs::write(dir.path().join("src/README.md"), "not C").unwrap();
    dir
}

#[test]
fn test_discover_walks_directories_in_order() {
    let dir = project();
    let files = Obfuscator::discover(&[dir.path().join("src")]).unwrap();

    let relative: Vec<PathBuf> = files.iter().map(|f| f.relative.clone()).collect();
    assert_eq!(relative, vec![PathBuf::from("lib/math.c"), PathBuf::from("main.c")]);
}

#[test]
fn test_obfuscate_into_output_directory() {
    let dir = project();
    let out = dir.path().join("out");
    let obfuscator = Obfuscator::new(ObfuscatorConfig::builder().workers(3).build()).unwrap();

    let report = obfuscator.run(&[dir.path().join("src")]).unwrap();
    assert!(report.diagnostics.is_empty());
    assert_eq!(report.registry.len(), 1);
    report.write(&OutputTarget::Directory(out.clone())).unwrap();

    let main = fs::read_to_string(out.join("main.c")).unwrap();
    assert!(main.starts_with("#include \"taskfog_records.hpp\"\n#line 1 "));
    assert!(main.contains("void square(int tf_worker_slot, int tf_record_index);"));
    assert!(main.contains("taskfog::call_and_wait(square_pool, TASKFOG_FN_square, 3, tf_worker_slot,"));
    assert_eq!(main.lines().count(), MAIN.lines().count() + 2);

    let math = fs::read_to_string(out.join("lib/math.c")).unwrap();
    assert!(math.contains("square_pool.at(tf_record_index).x * square_pool.at(tf_record_index).x"));

    for header_dir in [out.clone(), out.join("lib")] {
        let records = fs::read_to_string(header_dir.join("taskfog_records.hpp")).unwrap();
        assert!(records.contains("taskfog::start(3, taskfog_dispatch)"));
        let runtime = fs::read_to_string(header_dir.join(RUNTIME_HEADER_NAME)).unwrap();
        assert_eq!(runtime, RUNTIME_HEADER);
    }
    assert!(!out.join("README.md").exists());

    // inputs are untouched
    assert_eq!(fs::read_to_string(dir.path().join("src/main.c")).unwrap(), MAIN);
}

#[test]
fn test_obfuscate_in_place() {
    let dir = project();
    let obfuscator = Obfuscator::new(ObfuscatorConfig::default()).unwrap();

    let report = obfuscator.run(&[dir.path().join("src/lib/math.c")]).unwrap();
    report.write(&OutputTarget::InPlace).unwrap();

    let math = fs::read_to_string(dir.path().join("src/lib/math.c")).unwrap();
    assert!(math.contains("void square(int tf_worker_slot, int tf_record_index)"));
    assert!(dir.path().join("src/lib/taskfog_records.hpp").exists());
}

#[test]
fn test_unparsable_file_is_copied_unchanged() {
    let dir = project();
    let broken = "int broken( {\n";
    fs::write(dir.path().join("src/broken.c"), broken).unwrap();
    let out = dir.path().join("out");
    let obfuscator = Obfuscator::new(ObfuscatorConfig::default()).unwrap();

    let report = obfuscator.run(&[dir.path().join("src")]).unwrap();
    assert_eq!(report.diagnostics.len(), 1);
    assert!(matches!(report.diagnostics[0], Diagnostic::Unparsable { .. }));
    report.write(&OutputTarget::Directory(out.clone())).unwrap();

    assert_eq!(fs::read_to_string(out.join("broken.c")).unwrap(), broken);
}

#[test]
fn test_missing_input_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let obfuscator = Obfuscator::new(ObfuscatorConfig::default()).unwrap();

    let err = obfuscator.run(&[dir.path().join("nope.c")]).unwrap_err();
    assert!(matches!(err, PipelineError::Io { .. }));

    let empty = obfuscator.run(&[dir.path().to_path_buf()]).unwrap_err();
    assert!(matches!(empty, PipelineError::NoInputs));
}
