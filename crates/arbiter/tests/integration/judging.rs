//! End-to-end judging tests: submission in, verdict out.

use arbiter::{Judge, JudgeError, Submission, TestCase, VerdictStatus};
use tokio::sync::watch;

use super::test_config;

fn case(input: &str, expected: &str) -> TestCase {
    TestCase {
        input: input.to_string(),
        expected_output: expected.to_string(),
        hidden: false,
    }
}

fn submission(language: &str, code: &str, cases: Vec<TestCase>) -> Submission {
    Submission {
        code: code.to_string(),
        language: language.to_string(),
        test_cases: cases,
        time_limit_ms: None,
        memory_limit_bytes: None,
    }
}

#[tokio::test]
#[ignore = "requires root"]
async fn python_submission_is_accepted() {
    let judge = Judge::new(test_config());
    let sub = submission(
        "python3",
        "a, b = map(int, input().split())\nprint(a + b)",
        vec![case("1 2", "3"), case("10 32", "42"), case("-5 5", "0")],
    );

    let verdict = judge.judge(&sub).await.expect("judging failed");

    assert_eq!(verdict.status, VerdictStatus::Accepted);
    assert_eq!(verdict.test_results.len(), 3);
    assert!(verdict.test_results.iter().all(|r| r.passed));
    assert!(verdict.execution_time_ms.is_some());
    assert!(verdict.memory_used_bytes.unwrap() > 0);
}

#[tokio::test]
#[ignore = "requires root"]
async fn wrong_answer_still_runs_every_case() {
    let judge = Judge::new(test_config());
    let sub = submission(
        "python3",
        "print(int(input()) * 2)",
        vec![case("1", "2"), case("2", "5"), case("3", "6")],
    );

    let verdict = judge.judge(&sub).await.expect("judging failed");

    assert_eq!(verdict.status, VerdictStatus::WrongAnswer);
    assert_eq!(verdict.test_results.len(), 3);
    assert!(verdict.test_results[0].passed);
    assert!(!verdict.test_results[1].passed);
    assert_eq!(verdict.test_results[1].actual_output.trim(), "4");
    assert!(verdict.test_results[2].passed);
}

#[tokio::test]
#[ignore = "requires root"]
async fn runtime_error_halts_with_no_results() {
    let judge = Judge::new(test_config());
    let sub = submission(
        "python3",
        "raise RuntimeError('boom')",
        vec![case("", ""), case("", "")],
    );

    let verdict = judge.judge(&sub).await.expect("judging failed");

    assert_eq!(verdict.status, VerdictStatus::RuntimeError);
    assert!(verdict.test_results.is_empty());
    assert!(verdict.error.as_deref().unwrap().contains("boom"));
}

#[tokio::test]
#[ignore = "requires root"]
async fn sleeping_past_the_limit_is_time_limit_exceeded() {
    let judge = Judge::new(test_config());
    let sub = Submission {
        time_limit_ms: Some(500),
        ..submission(
            "python3",
            "import time\ntime.sleep(10)\nprint('late')",
            vec![case("", "late"), case("", "late")],
        )
    };

    let verdict = judge.judge(&sub).await.expect("judging failed");

    assert_eq!(verdict.status, VerdictStatus::TimeLimitExceeded);
    assert!(verdict.test_results.is_empty());
}

#[tokio::test]
#[ignore = "requires root"]
async fn allocating_past_the_limit_is_memory_limit_exceeded() {
    let judge = Judge::new(test_config());
    let sub = Submission {
        memory_limit_bytes: Some(64 * 1024 * 1024),
        ..submission(
            "python3",
            // grows until the ceiling stops it, whichever mechanism enforces it
            "chunks = []\nwhile True:\n    chunks.append(b'x' * (1 << 20))",
            vec![case("", "never")],
        )
    };

    let verdict = judge.judge(&sub).await.expect("judging failed");

    assert_eq!(verdict.status, VerdictStatus::MemoryLimitExceeded);
    assert!(verdict.test_results.is_empty());
}

#[tokio::test]
#[ignore = "requires root"]
async fn compile_failure_yields_no_test_results() {
    let judge = Judge::new(test_config());
    let sub = submission(
        "cpp17",
        "int main( { return 0; }",
        vec![case("", ""), case("", ""), case("", "")],
    );

    let verdict = judge.judge(&sub).await.expect("judging failed");

    assert_eq!(verdict.status, VerdictStatus::CompilationError);
    assert!(verdict.test_results.is_empty());
    assert!(verdict.error.is_some());
    assert!(verdict.execution_time_ms.is_none());
}

#[tokio::test]
#[ignore = "requires root"]
async fn compiled_submission_reuses_the_binary_across_cases() {
    let judge = Judge::new(test_config());
    let sub = submission(
        "cpp17",
        r#"#include <iostream>
int main() { long a, b; std::cin >> a >> b; std::cout << a + b << std::endl; }"#,
        vec![case("1 2", "3"), case("40 2", "42")],
    );

    let verdict = judge.judge(&sub).await.expect("judging failed");

    assert_eq!(verdict.status, VerdictStatus::Accepted);
    assert_eq!(verdict.test_results.len(), 2);
}

#[tokio::test]
#[ignore = "requires root"]
async fn javascript_main_function_result_is_printed() {
    let judge = Judge::new(test_config());
    let sub = submission(
        "javascript",
        "function main(){ return 1+1 }",
        vec![case("", "2")],
    );

    let verdict = judge.judge(&sub).await.expect("judging failed");

    assert_eq!(verdict.status, VerdictStatus::Accepted);
    assert_eq!(verdict.test_results.len(), 1);
    assert!(verdict.test_results[0].passed);
    assert_eq!(verdict.test_results[0].actual_output.trim(), "2");
}

#[tokio::test]
#[ignore = "requires root"]
async fn javascript_uncaught_throw_is_runtime_error() {
    let judge = Judge::new(test_config());
    let sub = submission(
        "javascript",
        "throw new Error('exploded')",
        vec![case("", "")],
    );

    let verdict = judge.judge(&sub).await.expect("judging failed");

    assert_eq!(verdict.status, VerdictStatus::RuntimeError);
    assert!(verdict.test_results.is_empty());
    assert!(verdict.error.as_deref().unwrap().contains("exploded"));
}

#[tokio::test]
async fn unsupported_language_is_rejected() {
    let judge = Judge::new(test_config());
    let sub = submission("cobol", "DISPLAY '2'.", vec![case("", "2")]);

    let err = judge.judge(&sub).await.unwrap_err();
    assert!(matches!(err, JudgeError::UnsupportedLanguage(ref l) if l == "cobol"));
}

#[tokio::test]
#[ignore = "requires root"]
async fn judging_twice_is_deterministic() {
    let judge = Judge::new(test_config());
    let sub = submission(
        "python3",
        "print(input()[::-1])",
        vec![case("abc", "cba"), case("racecar", "racecar")],
    );

    let first = judge.judge(&sub).await.expect("first run failed");
    let second = judge.judge(&sub).await.expect("second run failed");

    assert_eq!(first.status, second.status);
    assert_eq!(first.test_results, second.test_results);
}

#[tokio::test]
#[ignore = "requires root"]
async fn run_all_policy_reports_every_case() {
    let mut config = test_config();
    config.judge.run_all_tests = true;
    let judge = Judge::new(config);

    // crashes on the second input only
    let sub = submission(
        "python3",
        "n = int(input())\nprint(100 // n)",
        vec![case("10", "10"), case("0", "0"), case("4", "25")],
    );

    let verdict = judge.judge(&sub).await.expect("judging failed");

    assert_eq!(verdict.status, VerdictStatus::RuntimeError);
    assert_eq!(verdict.test_results.len(), 3);
    assert!(verdict.test_results[0].passed);
    assert!(!verdict.test_results[1].passed);
    assert!(verdict.test_results[1].error.is_some());
    assert!(verdict.test_results[2].passed);
}

#[tokio::test]
#[ignore = "requires root"]
async fn try_judge_rejects_when_pool_is_full() {
    let mut config = test_config();
    config.judge.max_sandboxes = 1;
    config.judge.box_start_id = 60;
    let judge = std::sync::Arc::new(Judge::new(config));

    let slow = submission(
        "python3",
        "import time\ntime.sleep(3)\nprint('done')",
        vec![case("", "done")],
    );
    let quick = submission("python3", "print('hi')", vec![case("", "hi")]);

    let busy = {
        let judge = judge.clone();
        tokio::spawn(async move { judge.judge(&slow).await })
    };
    // Let the slow submission claim the only slot.
    tokio::time::sleep(std::time::Duration::from_millis(500)).await;

    let err = judge.try_judge(&quick).await.unwrap_err();
    assert!(matches!(err, JudgeError::Overloaded));

    let verdict = busy.await.unwrap().expect("slow judging failed");
    assert_eq!(verdict.status, VerdictStatus::Accepted);

    // The slot is free again afterwards.
    let verdict = judge.try_judge(&quick).await.expect("retry failed");
    assert_eq!(verdict.status, VerdictStatus::Accepted);
}

#[tokio::test]
#[ignore = "requires root"]
async fn cancellation_kills_the_active_run() {
    let mut config = test_config();
    config.judge.box_start_id = 70;
    let judge = Judge::new(config);

    let sub = submission(
        "python3",
        "import time\ntime.sleep(60)",
        vec![case("", "")],
    );

    let (tx, rx) = watch::channel(false);
    let started = std::time::Instant::now();
    let handle = {
        let judge = &judge;
        async move { judge.judge_with_cancel(&sub, rx).await }
    };

    tokio::pin!(handle);
    tokio::select! {
        _ = tokio::time::sleep(std::time::Duration::from_millis(500)) => {}
        _ = &mut handle => panic!("judging finished before cancellation"),
    }
    tx.send(true).unwrap();

    let err = handle.await.unwrap_err();
    assert!(matches!(err, JudgeError::Canceled));
    // Canceled long before the program's own 60s sleep finished.
    assert!(started.elapsed() < std::time::Duration::from_secs(30));
}

#[tokio::test]
#[ignore = "requires root"]
async fn empty_test_case_list_is_trivially_accepted() {
    let judge = Judge::new(test_config());
    let sub = submission("python3", "print('unused')", vec![]);

    let verdict = judge.judge(&sub).await.expect("judging failed");

    assert_eq!(verdict.status, VerdictStatus::Accepted);
    assert!(verdict.test_results.is_empty());
}

#[tokio::test]
#[ignore = "requires root"]
async fn empty_interpreted_source_runs_and_compares() {
    let judge = Judge::new(test_config());
    let sub = submission("python3", "", vec![case("", "")]);

    let verdict = judge.judge(&sub).await.expect("judging failed");
    assert_eq!(verdict.status, VerdictStatus::Accepted);

    let sub = submission("python3", "", vec![case("", "expected text")]);
    let verdict = judge.judge(&sub).await.expect("judging failed");
    assert_eq!(verdict.status, VerdictStatus::WrongAnswer);
}

#[tokio::test]
#[ignore = "requires root"]
async fn empty_compiled_source_is_a_compilation_error() {
    let judge = Judge::new(test_config());
    let sub = submission("cpp17", "", vec![case("", "")]);

    let verdict = judge.judge(&sub).await.expect("judging failed");
    assert_eq!(verdict.status, VerdictStatus::CompilationError);
}

#[tokio::test]
#[ignore = "requires root"]
async fn hidden_flag_round_trips_to_results() {
    let judge = Judge::new(test_config());
    let mut sub = submission("python3", "print(input())", vec![case("secret", "secret")]);
    sub.test_cases[0].hidden = true;

    let verdict = judge.judge(&sub).await.expect("judging failed");
    assert!(verdict.test_results[0].hidden);
}

#[tokio::test]
#[ignore = "requires root"]
async fn concurrent_submissions_do_not_interfere() {
    let mut config = test_config();
    config.judge.max_sandboxes = 2;
    config.judge.box_start_id = 80;
    let judge = std::sync::Arc::new(Judge::new(config));

    let a = submission("python3", "print('alpha')", vec![case("", "alpha")]);
    let b = submission("python3", "print('beta')", vec![case("", "beta")]);

    let (ra, rb) = tokio::join!(
        {
            let judge = judge.clone();
            async move { judge.judge(&a).await }
        },
        {
            let judge = judge.clone();
            async move { judge.judge(&b).await }
        }
    );

    assert_eq!(ra.unwrap().status, VerdictStatus::Accepted);
    assert_eq!(rb.unwrap().status, VerdictStatus::Accepted);
}
