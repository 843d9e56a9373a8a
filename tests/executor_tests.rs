use ci_lite::error::CiError;
use ci_lite::worker::{ProcessRunner, ShellRunner};

async fn run(command: &str) -> ci_lite::worker::CommandOutput {
    let dir = tempfile::tempdir().unwrap();
    ShellRunner::new()
        .run(command, dir.path())
        .await
        .expect("sh should launch")
}

#[tokio::test]
async fn test_execute_simple_command() {
    let result = run("echo hello").await;

    assert!(result.success());
    assert_eq!(result.output, "hello\n");
    assert_eq!(result.lines().collect::<Vec<_>>(), vec!["hello"]);
}

#[tokio::test]
async fn test_execute_empty_output() {
    let result = run("true").await;

    assert!(result.success());
    assert!(result.output.is_empty());
    assert_eq!(result.lines().count(), 0);
}

#[tokio::test]
async fn test_execute_large_output() {
    let result = run("seq 1 1000").await;

    assert!(result.success());
    assert_eq!(result.lines().count(), 1000);
}

#[tokio::test]
async fn test_execute_command_failure() {
    let result = run("exit 1").await;

    assert_eq!(result.exit_code, Some(1));
    assert!(matches!(result.check(), Err(CiError::ExitCode(1))));
}

#[tokio::test]
async fn test_stderr_is_interleaved_with_stdout() {
    let result = run("echo one; echo two >&2; echo three").await;

    assert!(result.success());
    assert_eq!(
        result.lines().collect::<Vec<_>>(),
        vec!["one", "two", "three"]
    );
}

#[tokio::test]
async fn test_execute_invalid_command() {
    let result = run("nonexistent_command_12345").await;

    assert!(!result.success());
    assert!(result.output.contains("nonexistent_command_12345"));
}

#[tokio::test]
async fn test_runs_in_work_dir() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("marker"), "here").unwrap();

    let result = ShellRunner::new()
        .run("cat marker", dir.path())
        .await
        .unwrap();

    assert!(result.success());
    assert_eq!(result.output, "here");
}

#[tokio::test]
async fn test_execute_piped_commands() {
    let result = run("echo 'hello world' | wc -w").await;

    assert!(result.success());
    assert_eq!(result.output.trim(), "2");
}

#[tokio::test]
async fn test_missing_work_dir_is_a_launch_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("gone");

    let result = ShellRunner::new().run("true", &missing).await;

    assert!(matches!(result, Err(CiError::Launch(_))));
}
