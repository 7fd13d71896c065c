use span_trace::commands::{execute_demo, validate_args, validate_snapshot_file, DemoArgs};
use span_trace::output::read_snapshot;
use span_trace::snapshot::validate_snapshot;

#[test]
fn test_validate_args_valid() {
    assert!(validate_args(&DemoArgs::default()).is_ok());
}

#[test]
fn test_validate_args_zero_iterations() {
    let args = DemoArgs {
        iterations: 0,
        ..Default::default()
    };

    assert!(validate_args(&args).is_err());
}

#[test]
fn test_validate_args_empty_output() {
    let args = DemoArgs {
        output: "".into(),
        ..Default::default()
    };

    assert!(validate_args(&args).is_err());
}

#[test]
fn test_demo_writes_valid_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("demo.json");
    let args = DemoArgs {
        output: output.clone(),
        iterations: 2,
        work_ms: 0,
        ..Default::default()
    };

    let built = execute_demo(args).unwrap();
    let loaded = read_snapshot(&output).unwrap();

    // 2 requests x (request, select, update, call) + one running vacuum
    assert_eq!(loaded.records.len(), 9);
    assert_eq!(loaded.records.len(), built.records.len());
    assert_eq!(loaded.aggregators.len(), 2);
    assert_eq!(loaded.records.values().filter(|r| !r.stopped).count(), 1);
    assert_eq!(validate_snapshot(&loaded), Ok(()));
    assert!(validate_snapshot_file(output).is_ok());
}

#[test]
fn test_demo_redacts_credentials() {
    let dir = tempfile::tempdir().unwrap();
    let args = DemoArgs {
        output: dir.path().join("demo.json"),
        iterations: 1,
        work_ms: 0,
        ..Default::default()
    };

    let built = execute_demo(args).unwrap();
    let call = built.records.values().find(|r| r.name == "GET /profile").unwrap();

    assert_eq!(
        call.formatted_data.get("authorization").map(String::as_str),
        Some("<redacted(authorization)>")
    );
}

#[test]
fn test_demo_rejects_bad_precision() {
    let dir = tempfile::tempdir().unwrap();
    let args = DemoArgs {
        output: dir.path().join("demo.json"),
        precision: 99,
        ..Default::default()
    };

    assert!(execute_demo(args).is_err());
}
