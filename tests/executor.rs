// tests/executor.rs

//! Running resolved plans.

mod common;

use common::{platform, resolve};
use formulary::formula::parse_formula_file;
use formulary::{
    resolve_plan, run_plan, DryRunExecutor, Error, FormulaCatalog, Layout, ProcessExecutor,
    StepResult,
};
use std::fs;
use tempfile::TempDir;

const FORMULA: &str = r#"
[package]
name = "hello"
version = "2.10"

[source]
url = "https://example.com/hello-2.10.tar.gz"
checksum = "sha256:00"

[options]
declare = [{ name = "with-greeting", description = "Print a greeting at install time" }]

[patches.prefix]
targets = ["config.h"]
replace = [{ from = "/usr/local", to = "%(prefix)s" }]

[[rule]]
id = "prefix"
effect = { kind = "select-patch", id = "prefix" }

[[rule]]
id = "greeting"
when = "with(greeting)"
effect = { kind = "set-env", key = "GREETING", value = "hello from %(name)s" }

[[rule]]
id = "build"
effect = { kind = "invoke", id = "build", program = "sh", args = ["-c", "cp config.h build.out"] }

[[rule]]
id = "install"
effect = { kind = "invoke", id = "install", program = "sh", args = ["-c", "echo \"$GREETING\" > greeting.out"], phase = "install" }
"#;

fn setup() -> (TempDir, formulary::Formula) {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("hello.toml");
    fs::write(&path, FORMULA).unwrap();
    fs::write(temp.path().join("config.h"), "#define PREFIX \"/usr/local\"\n").unwrap();
    let formula = parse_formula_file(&path).unwrap();
    (temp, formula)
}

#[test]
fn test_dry_run_lists_every_step() {
    let plan = resolve("openssl", &["universal"], "mavericks is: x86_64 i386").unwrap();
    let total = plan.len();

    let mut executor = DryRunExecutor::new();
    let report = run_plan(plan, &mut executor);

    assert!(report.is_success());
    assert_eq!(report.records.len(), total);
    assert_eq!(report.not_run, 0);
    assert_eq!(executor.lines().len(), total);
    assert!(executor.lines()[0].starts_with(&format!("[1/{}] ", total)));
    assert!(executor.lines().iter().any(|l| l.contains("darwin-i386-cc")));
}

#[test]
fn test_dry_run_of_every_builtin() {
    let catalog = FormulaCatalog::default();
    for name in catalog.names().unwrap() {
        let loaded = catalog.load(&name).unwrap();
        let layout = Layout::new("/usr/local", "/usr/local/Cellar/x/1");
        let plan = resolve_plan::<&str>(
            &loaded.formula,
            layout,
            &[],
            platform("yosemite is: x86_64"),
        )
        .unwrap();
        let report = run_plan(plan, &mut DryRunExecutor::new());
        assert!(report.is_success(), "{} failed a dry run", name);
    }
}

#[cfg(unix)]
#[test]
fn test_process_executor_builds_in_workdir() {
    let (temp, formula) = setup();
    let prefix = temp.path().join("Cellar/hello/2.10");
    let layout = Layout::new(temp.path(), &prefix);
    let plan = resolve_plan(
        &formula,
        layout,
        &["with-greeting"],
        platform("yosemite is: x86_64"),
    )
    .unwrap();

    let mut executor = ProcessExecutor::new(temp.path(), temp.path());
    let report = run_plan(plan, &mut executor);
    assert!(report.is_success(), "{:?}", report.failure());

    let config = fs::read_to_string(temp.path().join("build.out")).unwrap();
    assert!(config.contains(prefix.to_str().unwrap()));
    assert!(!config.contains("\"/usr/local\""));

    let greeting = fs::read_to_string(temp.path().join("greeting.out")).unwrap();
    assert_eq!(greeting.trim(), "hello from hello");
    assert_eq!(executor.env().get("GREETING").unwrap(), "hello from hello");
}

#[cfg(unix)]
#[test]
fn test_process_executor_stops_at_first_failure() {
    let (temp, formula) = setup();
    // Without config.h the substitution has nothing to patch
    fs::remove_file(temp.path().join("config.h")).unwrap();

    let layout = Layout::new(temp.path(), temp.path().join("prefix"));
    let plan = resolve_plan::<&str>(&formula, layout, &[], platform("lion is: x86_64")).unwrap();
    let total = plan.len();

    let mut executor = ProcessExecutor::new(temp.path(), temp.path());
    let report = run_plan(plan, &mut executor);

    let failure = report.failure().unwrap();
    assert_eq!(failure.id, "patch:prefix");
    assert!(matches!(failure.result, StepResult::Failed(_)));
    assert_eq!(report.records.len(), 1);
    assert_eq!(report.not_run, total - 1);
    assert!(!temp.path().join("build.out").exists());

    let err = report.into_result().unwrap_err();
    assert!(matches!(err, Error::StepFailed { ref step, .. } if step == "patch:prefix"));
}
