//! Obfuscates small programs, builds them with the system C++ compiler
//! against the taskfog static library and checks what they print.
//!
//! Skipped (with a note on stderr) when no C++ compiler or no
//! `libtaskfog.a` can be found.

#![cfg(unix)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use taskfog::config::{CallStyle, LockScope, ObfuscatorConfig};
use taskfog::pipeline::{Obfuscator, OutputTarget};

const CALL: &str = r#"#include <stdio.h>

int funcA(int x) {
    return x + 1;
}

int main() {
    int r = funcA(5);
    printf("r=%d\n", r);
    return 0;
}
"#;

const COUNTER: &str = r#"#include <stdio.h>

int counter = 0;

int bump(int times) {
    for (int i = 0; i < times; i++) {
        counter = counter + 1;
    }
    return times;
}

int main() {
    int first = bump(1000);
    int second = bump(1000);
    printf("counter=%d\n", counter);
    return first + second - 2000;
}
"#;

const NESTED: &str = r#"#include <stdio.h>

int inc(int x) {
    return x + 1;
}

int fib(int n) {
    if (n < 2) {
        return n;
    }
    return fib(n - 1) + fib(n - 2);
}

int pair(int a, int b) {
    int x = inc(a), y = inc(x);
    return x + y + b;
}

int main() {
    printf("fib=%d pair=%d\n", fib(15), pair(5, 2));
    return 0;
}
"#;

const STATIC_A: &str = r#"static int helper(int x) {
    return x + 1;
}

int run_a(int v) {
    return helper(v);
}
"#;

const STATIC_B: &str = r#"#include <stdio.h>

int run_a(int v);

static int helper(int x) {
    return x * 100;
}

int main() {
    printf("a=%d b=%d\n", run_a(1), helper(1));
    return 0;
}
"#;

fn compiler() -> Option<String> {
    let mut candidates: Vec<String> = env::var("CXX").into_iter().collect();
    candidates.extend(["c++", "g++", "clang++"].map(String::from));
    candidates.into_iter().find(|cxx| {
        Command::new(cxx)
            .arg("--version")
            .output()
            .is_ok_and(|out| out.status.success())
    })
}

/// `libtaskfog.a` built alongside this test binary.
fn staticlib() -> Option<PathBuf> {
    let exe = env::current_exe().ok()?;
    let deps = exe.parent()?;
    let profile = deps.parent()?;
    let uplifted = profile.join("libtaskfog.a");
    if uplifted.exists() {
        return Some(uplifted);
    }
    fs::read_dir(deps)
        .ok()?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with("libtaskfog-") && name.ends_with(".a"))
        })
        .max_by_key(|path| fs::metadata(path).and_then(|m| m.modified()).ok())
}

fn toolchain() -> Option<(String, PathBuf)> {
    match (compiler(), staticlib()) {
        (Some(cxx), Some(lib)) => Some((cxx, lib)),
        (cxx, lib) => {
            eprintln!("skipping: compiler {:?}, static library {:?}", cxx, lib);
            None
        }
    }
}

fn configs() -> Vec<ObfuscatorConfig> {
    let mut configs = Vec::new();
    for style in [CallStyle::Inline, CallStyle::Hoisted] {
        for scope in [LockScope::Statement, LockScope::Line] {
            configs.push(ObfuscatorConfig::builder().call_style(style).lock_scope(scope).workers(3).build());
        }
    }
    configs
}

/// Obfuscate `files`, compile the result and return its stdout.
fn build_and_run(cxx: &str, lib: &Path, config: &ObfuscatorConfig, files: &[(&str, &str)]) -> String {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("src");
    let out = dir.path().join("out");
    fs::create_dir_all(&src).unwrap();
    for (name, text) in files {
        fs::write(src.join(name), text).unwrap();
    }

    let report = Obfuscator::new(config.clone()).unwrap().run(&[src]).unwrap();
    assert!(report.diagnostics.is_empty(), "{:?}", report.diagnostics);
    report.write(&OutputTarget::Directory(out.clone())).unwrap();

    let binary = dir.path().join("program");
    let mut command = Command::new(cxx);
    command.args(["-std=c++17", "-x", "c++"]);
    for (name, _) in files {
        command.arg(out.join(name));
    }
    command.args(["-x", "none"]).arg(lib).args(["-pthread", "-ldl", "-lm", "-o"]).arg(&binary);
    let compiled = command.output().unwrap();
    assert!(
        compiled.status.success(),
        "{:?} failed to compile:\n{}",
        config,
        String::from_utf8_lossy(&compiled.stderr)
    );

    let run = Command::new(&binary).output().unwrap();
    assert!(run.status.success(), "{:?} exited with {}", config, run.status);
    String::from_utf8(run.stdout).unwrap()
}

#[test]
fn test_call_and_wait_program() {
    let Some((cxx, lib)) = toolchain() else {
        return;
    };
    for config in configs() {
        assert_eq!(build_and_run(&cxx, &lib, &config, &[("main.c", CALL)]), "r=6\n", "{:?}", config);
    }
}

#[test]
fn test_shared_counter_program() {
    let Some((cxx, lib)) = toolchain() else {
        return;
    };
    for config in configs() {
        assert_eq!(
            build_and_run(&cxx, &lib, &config, &[("main.c", COUNTER)]),
            "counter=2000\n",
            "{:?}",
            config
        );
    }
}

#[test]
fn test_recursion_and_declaration_groups() {
    let Some((cxx, lib)) = toolchain() else {
        return;
    };
    for config in configs() {
        assert_eq!(
            build_and_run(&cxx, &lib, &config, &[("main.c", NESTED)]),
            "fib=610 pair=15\n",
            "{:?}",
            config
        );
    }
}

#[test]
fn test_static_helpers_in_separate_units() {
    let Some((cxx, lib)) = toolchain() else {
        return;
    };
    for config in configs() {
        assert_eq!(
            build_and_run(&cxx, &lib, &config, &[("a.c", STATIC_A), ("b.c", STATIC_B)]),
            "a=2 b=100\n",
            "{:?}",
            config
        );
    }
}
