//! Smoke tests for the demonstration CLI binary (`src/cli.rs`, `src/main.rs`):
//! exercises `check`/`preview`/`up` against on-disk fixtures through the
//! built binary via `assert_cmd`. These fixtures only ever talk to the
//! in-memory `DemoPackage`/`MockOrchestrator`, so they run unconditionally
//! without real cloud credentials.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use tempfile::NamedTempFile;

fn yamlrt() -> Command {
    Command::cargo_bin("yamlrt").expect("yamlrt binary should build")
}

fn fixture(contents: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().expect("tempfile");
    write!(file, "{}", contents).unwrap();
    file
}

#[test]
fn check_reports_no_errors_for_a_well_formed_template() {
    let file = fixture(
        r#"
name: demo
config:
  region:
    type: string
    default: us-west-2
resources:
  bucket:
    type: demo:index:Bucket
    properties:
      name: ${region}
outputs:
  out: ${bucket.name}
"#,
    );
    yamlrt().arg("check").arg(file.path()).assert().success();
}

#[test]
fn check_fails_on_duplicate_name_across_namespaces() {
    let file = fixture(
        r#"
name: demo
config:
  thing:
    type: string
    default: x
resources:
  thing:
    type: demo:index:Bucket
    properties: {}
"#,
    );
    yamlrt()
        .arg("check")
        .arg(file.path())
        .assert()
        .failure()
        .stdout(predicate::str::contains("cannot have the same name"));
}

#[test]
fn up_exports_resolved_values() {
    let file = fixture(
        r#"
name: demo
resources:
  bucket:
    type: demo:index:Bucket
    properties:
      name: my-bucket
outputs:
  bucketName: ${bucket.name}
"#,
    );
    yamlrt()
        .arg("up")
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("bucketName"))
        .stdout(predicate::str::contains("my-bucket"));
}

#[test]
fn preview_tolerates_unset_config_as_unknown() {
    let file = fixture(
        r#"
name: demo
config:
  region:
    type: string
resources:
  bucket:
    type: demo:index:Bucket
    properties:
      region: ${region}
"#,
    );
    yamlrt().arg("preview").arg(file.path()).assert().success();
}
