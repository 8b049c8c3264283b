mod common;

use common::MockUiWriter;
use locode_core::ui_writer::NullUiWriter;
use locode_core::{Session, ToolCall, ToolExecutor, ToolRegistry};
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

fn executor(shell_timeout: Duration) -> ToolExecutor {
    ToolExecutor::new(ToolRegistry::builtin().unwrap(), shell_timeout, 20_000)
}

fn call(name: &str, args: &[&str]) -> ToolCall {
    ToolCall {
        name: name.to_string(),
        args: args.iter().map(|a| a.to_string()).collect(),
    }
}

#[tokio::test]
async fn test_write_then_edit_shows_exact_changed_lines() {
    let dir = TempDir::new().unwrap();
    let mut session = Session::new(dir.path().to_path_buf(), "test");
    let ui = MockUiWriter::new();
    let executor = executor(Duration::from_secs(5));

    let created = executor
        .execute(
            &call("write_file", &["app.py", r"import os\nDEBUG = False\nprint('hi')\n"]),
            &mut session,
            &ui,
        )
        .await;
    assert!(created.succeeded, "{}", created.summary);
    assert!(created.summary.contains("3 lines"));
    assert!(!created.summary.contains("@@"));

    let edited = executor
        .execute(
            &call("edit_file", &["app.py", "DEBUG = False", "DEBUG = True"]),
            &mut session,
            &ui,
        )
        .await;
    assert!(edited.succeeded, "{}", edited.summary);

    let removed: Vec<&str> = edited
        .summary
        .lines()
        .filter(|l| l.starts_with('-') && !l.starts_with("-1"))
        .collect();
    let added: Vec<&str> = edited
        .summary
        .lines()
        .filter(|l| l.starts_with('+') && !l.starts_with("+1"))
        .collect();
    assert_eq!(removed, vec!["-DEBUG = False"]);
    assert_eq!(added, vec!["+DEBUG = True"]);
    assert_eq!(
        fs::read_to_string(dir.path().join("app.py")).unwrap(),
        "import os\nDEBUG = True\nprint('hi')\n"
    );
}

#[tokio::test]
async fn test_edit_with_absent_text_fails_and_leaves_file() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("a.txt"), "alpha\n").unwrap();
    let mut session = Session::new(dir.path().to_path_buf(), "test");

    let result = executor(Duration::from_secs(5))
        .execute(
            &call("edit_file", &["a.txt", "beta", "gamma"]),
            &mut session,
            &MockUiWriter::new(),
        )
        .await;

    assert!(!result.succeeded);
    assert!(result.summary.contains("not found"));
    assert_eq!(fs::read_to_string(dir.path().join("a.txt")).unwrap(), "alpha\n");
}

#[tokio::test]
async fn test_unknown_tool_and_arity_mismatch_are_failures() {
    let dir = TempDir::new().unwrap();
    let mut session = Session::new(dir.path().to_path_buf(), "test");
    let ui = MockUiWriter::new();
    let executor = executor(Duration::from_secs(5));

    let unknown = executor.execute(&call("format_disk", &[]), &mut session, &ui).await;
    assert!(!unknown.succeeded);
    assert!(unknown.summary.contains("Unknown tool 'format_disk'"));

    let too_few = executor.execute(&call("write_file", &["only.txt"]), &mut session, &ui).await;
    assert!(!too_few.succeeded);
    assert!(too_few.summary.contains("write_file(path, content) expects 2 argument(s), got 1"));
    assert!(!dir.path().join("only.txt").exists());

    let too_many = executor
        .execute(&call("show_todos", &["unexpected"]), &mut session, &ui)
        .await;
    assert!(!too_many.succeeded);

    let optional_omitted = executor.execute(&call("list_files", &[]), &mut session, &ui).await;
    assert!(optional_omitted.succeeded, "{}", optional_omitted.summary);
}

#[tokio::test]
async fn test_shell_timeout_is_a_failure() {
    let dir = TempDir::new().unwrap();
    let mut session = Session::new(dir.path().to_path_buf(), "test");

    let started = std::time::Instant::now();
    let result = executor(Duration::from_millis(300))
        .execute(&call("run_command", &["sleep 5"]), &mut session, &MockUiWriter::new())
        .await;

    assert!(!result.succeeded);
    assert!(result.summary.contains("timed out"));
    assert!(started.elapsed() < Duration::from_secs(4));
}

#[tokio::test]
async fn test_shell_runs_in_working_directory_and_reports_exit_status() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("marker.txt"), "").unwrap();
    let mut session = Session::new(dir.path().to_path_buf(), "test");
    let ui = MockUiWriter::new();
    let executor = executor(Duration::from_secs(5));

    let ok = executor.execute(&call("run_command", &["ls"]), &mut session, &ui).await;
    assert!(ok.succeeded);
    assert!(ok.summary.contains("marker.txt"));

    let failed = executor
        .execute(&call("run_command", &["echo oops >&2; exit 3"]), &mut session, &ui)
        .await;
    assert!(!failed.succeeded);
    assert!(failed.summary.contains("status 3"));
    assert!(failed.summary.contains("oops"));
}

#[tokio::test]
async fn test_later_call_sees_earlier_effects() {
    let dir = TempDir::new().unwrap();
    let mut session = Session::new(dir.path().to_path_buf(), "test");
    let ui = MockUiWriter::new();
    let executor = executor(Duration::from_secs(5));

    let mkdir = executor
        .execute(&call("create_directory", &["src/components"]), &mut session, &ui)
        .await;
    assert!(mkdir.succeeded);
    let write = executor
        .execute(
            &call("write_file", &["src/components/button.js", "export {}"]),
            &mut session,
            &ui,
        )
        .await;
    assert!(write.succeeded);

    let search = executor.execute(&call("search_files", &["button"]), &mut session, &ui).await;
    assert!(search.succeeded);
    assert!(search.summary.contains("button.js"));

    let listing = executor.execute(&call("list_files", &["src"]), &mut session, &ui).await;
    assert!(listing.summary.contains("components/"));
    assert!(listing.summary.contains("button.js"));
}

#[tokio::test]
async fn test_search_without_matches_fails() {
    let dir = TempDir::new().unwrap();
    let mut session = Session::new(dir.path().to_path_buf(), "test");
    let result = executor(Duration::from_secs(5))
        .execute(&call("search_files", &["nothing_here"]), &mut session, &MockUiWriter::new())
        .await;
    assert!(!result.succeeded);
    assert!(result.summary.contains("No matches"));
}

#[tokio::test]
async fn test_todo_tools_mutate_session_tasks() {
    let dir = TempDir::new().unwrap();
    let mut session = Session::new(dir.path().to_path_buf(), "test");
    let ui = MockUiWriter::new();
    let executor = executor(Duration::from_secs(5));

    executor.execute(&call("add_todo", &["write tests"]), &mut session, &ui).await;
    let update = executor
        .execute(&call("update_todo", &["1", "in progress"]), &mut session, &ui)
        .await;
    assert!(update.succeeded, "{}", update.summary);

    let bad = executor
        .execute(&call("update_todo", &["7", "completed"]), &mut session, &ui)
        .await;
    assert!(!bad.succeeded);
    assert!(bad.summary.contains("Task 7 does not exist"));

    let shown = executor.execute(&call("show_todos", &[]), &mut session, &ui).await;
    assert_eq!(shown.summary, "1. [in_progress] write tests");
}

#[tokio::test]
async fn test_tool_result_reports_success_and_failure_to_writer() {
    let dir = TempDir::new().unwrap();
    let mut session = Session::new(dir.path().to_path_buf(), "test");
    let ui = MockUiWriter::new();
    let executor = executor(Duration::from_secs(5));

    executor
        .execute(&call("add_todo", &["write docs"]), &mut session, &ui)
        .await;
    executor
        .execute(&call("read_file", &["missing.txt"]), &mut session, &ui)
        .await;

    let results: Vec<String> = ui
        .get_output()
        .into_iter()
        .filter(|line| line.starts_with("RESULT:") || line.starts_with("TOOL:"))
        .collect();
    assert_eq!(
        results,
        vec!["TOOL: add_todo", "RESULT: ok", "TOOL: read_file", "RESULT: error"]
    );
}

#[tokio::test]
async fn test_tools_run_without_a_display() {
    let dir = TempDir::new().unwrap();
    let mut session = Session::new(dir.path().to_path_buf(), "test");

    let result = executor(Duration::from_secs(5))
        .execute(&call("write_file", &["quiet.txt", "shh"]), &mut session, &NullUiWriter)
        .await;

    assert!(result.succeeded, "{}", result.summary);
    assert_eq!(fs::read_to_string(dir.path().join("quiet.txt")).unwrap(), "shh");
}
