//! Compile-step tests at the runner level.

use arbiter::runner::{CompileError, Runner};
use arbiter::sandbox::Sandbox;

use super::{fixture_source, test_config};

#[tokio::test]
#[ignore = "requires root"]
async fn compiles_valid_cpp() {
    let config = test_config();
    let runner = Runner::new(config.clone());
    let mut sandbox = Sandbox::init(20, config.isolate_binary(), config.cgroup)
        .await
        .expect("failed to create sandbox");

    let source = fixture_source("hello.cpp");
    let language = config.language("cpp17").expect("cpp17 not configured");

    let result = runner
        .compile(&sandbox, &source, language, None)
        .await
        .expect("compile call failed");

    assert!(result.success);
    assert_eq!(result.outcome.exit_code, Some(0));
    assert!(sandbox.file_exists("main").await.unwrap());

    sandbox.teardown().await.expect("teardown failed");
}

#[tokio::test]
#[ignore = "requires root"]
async fn reports_diagnostics_on_bad_source() {
    let config = test_config();
    let runner = Runner::new(config.clone());
    let mut sandbox = Sandbox::init(21, config.isolate_binary(), config.cgroup)
        .await
        .expect("failed to create sandbox");

    let source = fixture_source("bad_syntax.cpp");
    let language = config.language("cpp17").expect("cpp17 not configured");

    let result = runner
        .compile(&sandbox, &source, language, None)
        .await
        .expect("compile call failed");

    assert!(!result.success);
    assert!(!result.diagnostics.is_empty());
    assert!(result.diagnostics.contains("error"));

    sandbox.teardown().await.expect("teardown failed");
}

#[tokio::test]
#[ignore = "requires root"]
async fn interpreted_language_has_no_compile_step() {
    let config = test_config();
    let runner = Runner::new(config.clone());
    let mut sandbox = Sandbox::init(22, config.isolate_binary(), config.cgroup)
        .await
        .expect("failed to create sandbox");

    let language = config.language("python3").expect("python3 not configured");
    let err = runner
        .compile(&sandbox, b"print(1)", language, None)
        .await
        .unwrap_err();

    assert!(matches!(err, CompileError::NotCompiled(_)));

    sandbox.teardown().await.expect("teardown failed");
}
