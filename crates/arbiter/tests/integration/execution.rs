//! Run-step tests at the runner level.

use arbiter::runner::Runner;
use arbiter::sandbox::Sandbox;
use arbiter::types::{LimitBreach, ResourceLimits, RunStatus};

use super::{fixture_source, test_config};

#[tokio::test]
#[ignore = "requires root"]
async fn runs_compiled_program_with_stdin() {
    let config = test_config();
    let runner = Runner::new(config.clone());
    let mut sandbox = Sandbox::init(30, config.isolate_binary(), config.cgroup)
        .await
        .expect("failed to create sandbox");

    let source = fixture_source("echo.cpp");
    let language = config.language("cpp17").expect("cpp17 not configured");

    let compiled = runner
        .compile(&sandbox, &source, language, None)
        .await
        .expect("compile call failed");
    assert!(compiled.success);

    let outcome = runner
        .run(&sandbox, language, b"test input\n", None)
        .await
        .expect("run call failed");

    assert!(outcome.completed());
    assert!(outcome.stdout_lossy().contains("test input"));

    sandbox.teardown().await.expect("teardown failed");
}

#[tokio::test]
#[ignore = "requires root"]
async fn runs_interpreted_program() {
    let config = test_config();
    let runner = Runner::new(config.clone());
    let mut sandbox = Sandbox::init(31, config.isolate_binary(), config.cgroup)
        .await
        .expect("failed to create sandbox");

    let source = fixture_source("hello.py");
    let language = config.language("python3").expect("python3 not configured");

    runner
        .stage_source(&sandbox, language, &source)
        .await
        .expect("staging failed");
    let outcome = runner
        .run(&sandbox, language, b"", None)
        .await
        .expect("run call failed");

    assert!(outcome.completed());
    assert!(outcome.stdout_lossy().contains("Hello, World!"));

    sandbox.teardown().await.expect("teardown failed");
}

#[tokio::test]
#[ignore = "requires root"]
async fn infinite_loop_hits_the_time_ceiling() {
    let config = test_config();
    let runner = Runner::new(config.clone());
    let mut sandbox = Sandbox::init(32, config.isolate_binary(), config.cgroup)
        .await
        .expect("failed to create sandbox");

    let source = fixture_source("infinite_loop.cpp");
    let language = config.language("cpp17").expect("cpp17 not configured");

    let compiled = runner
        .compile(&sandbox, &source, language, None)
        .await
        .expect("compile call failed");
    assert!(compiled.success);

    let limits = ResourceLimits::none()
        .with_time_limit(0.5)
        .with_wall_time_limit(1.0);
    let outcome = runner
        .run(&sandbox, language, b"", Some(&limits))
        .await
        .expect("run call failed");

    assert_eq!(outcome.status, RunStatus::TimedOut);
    assert!(outcome.limit.is_time());

    sandbox.teardown().await.expect("teardown failed");
}

#[tokio::test]
#[ignore = "requires root"]
async fn segfault_reports_the_signal() {
    let config = test_config();
    let runner = Runner::new(config.clone());
    let mut sandbox = Sandbox::init(33, config.isolate_binary(), config.cgroup)
        .await
        .expect("failed to create sandbox");

    let source = fixture_source("segfault.cpp");
    let language = config.language("cpp17").expect("cpp17 not configured");

    let compiled = runner
        .compile(&sandbox, &source, language, None)
        .await
        .expect("compile call failed");
    assert!(compiled.success);

    let outcome = runner
        .run(&sandbox, language, b"", None)
        .await
        .expect("run call failed");

    assert!(!outcome.completed());
    assert_eq!(outcome.status, RunStatus::Signaled);
    assert_eq!(outcome.signal, Some(11));

    sandbox.teardown().await.expect("teardown failed");
}

#[tokio::test]
#[ignore = "requires root"]
async fn stdout_and_stderr_are_captured_separately() {
    let config = test_config();
    let runner = Runner::new(config.clone());
    let mut sandbox = Sandbox::init(34, config.isolate_binary(), config.cgroup)
        .await
        .expect("failed to create sandbox");

    let language = config.language("python3").expect("python3 not configured");
    runner
        .stage_source(
            &sandbox,
            language,
            b"import sys\nprint('to stdout')\nprint('to stderr', file=sys.stderr)\n",
        )
        .await
        .expect("staging failed");

    let outcome = runner
        .run(&sandbox, language, b"", None)
        .await
        .expect("run call failed");

    assert!(outcome.stdout_lossy().contains("to stdout"));
    assert!(!outcome.stdout_lossy().contains("to stderr"));
    assert!(outcome.stderr_lossy().contains("to stderr"));

    sandbox.teardown().await.expect("teardown failed");
}

#[tokio::test]
#[ignore = "requires root"]
async fn sandbox_blocks_network_access() {
    let config = test_config();
    let runner = Runner::new(config.clone());
    let mut sandbox = Sandbox::init(35, config.isolate_binary(), config.cgroup)
        .await
        .expect("failed to create sandbox");

    let language = config.language("python3").expect("python3 not configured");
    runner
        .stage_source(
            &sandbox,
            language,
            b"import socket\ns = socket.create_connection(('1.1.1.1', 53), timeout=2)\nprint('connected')\n",
        )
        .await
        .expect("staging failed");

    let outcome = runner
        .run(&sandbox, language, b"", None)
        .await
        .expect("run call failed");

    assert!(!outcome.completed());
    assert!(!outcome.stdout_lossy().contains("connected"));

    sandbox.teardown().await.expect("teardown failed");
}

#[tokio::test]
#[ignore = "requires root"]
async fn mle_is_attributed_to_the_memory_ceiling() {
    let config = test_config();
    let runner = Runner::new(config.clone());
    let mut sandbox = Sandbox::init(36, config.isolate_binary(), config.cgroup)
        .await
        .expect("failed to create sandbox");

    let source = fixture_source("memory_hog.cpp");
    let language = config.language("cpp17").expect("cpp17 not configured");

    let compiled = runner
        .compile(&sandbox, &source, language, None)
        .await
        .expect("compile call failed");
    assert!(compiled.success);

    let limits = ResourceLimits::none().with_memory_limit(64 * 1024);
    let outcome = runner
        .run(&sandbox, language, b"", Some(&limits))
        .await
        .expect("run call failed");

    assert!(!outcome.completed());
    assert_eq!(outcome.limit, LimitBreach::Memory);

    sandbox.teardown().await.expect("teardown failed");
}
