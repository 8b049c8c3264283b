use locode_core::context::resolve_mentions;
use locode_core::{
    ContextBuilder, ConversationTurn, History, PromptInputs, Role, TaskList, UserTurn,
};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn history_of(count: usize) -> History {
    let mut history = History::new();
    for i in 1..=count {
        let role = if i % 2 == 1 { Role::User } else { Role::Assistant };
        history.push(ConversationTurn::new(role, format!("turn-{:02}", i)));
    }
    history
}

fn build(builder: &ContextBuilder, history: &History, tasks: &TaskList, user: Option<UserTurn<'_>>) -> String {
    builder.build(&PromptInputs {
        catalog: "- read_file(path): Read the contents of a file",
        working_dir: Path::new("/work/project"),
        project: Some("Languages: Rust (3 files)"),
        tasks,
        history,
        user_turn: user,
    })
}

#[test]
fn test_window_keeps_most_recent_turns_in_order() {
    let builder = ContextBuilder::new(6, 5000);
    let prompt = build(&builder, &history_of(10), &TaskList::new(), None);

    for i in 1..=4 {
        assert!(!prompt.contains(&format!("turn-{:02}", i)), "turn {} should be dropped", i);
    }
    let positions: Vec<usize> = (5..=10)
        .map(|i| prompt.find(&format!("turn-{:02}", i)).unwrap())
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]));
    assert!(prompt.contains("user: turn-05\n\nassistant: turn-06\n\n"));
}

#[test]
fn test_prompt_layout_contains_preamble_sections_and_ends_with_assistant() {
    let builder = ContextBuilder::new(6, 5000);
    let mut tasks = TaskList::new();
    tasks.add("write tests");
    let prompt = build(
        &builder,
        &History::new(),
        &tasks,
        Some(UserTurn {
            text: "hello",
            mentions: &[],
        }),
    );

    assert!(prompt.contains("- read_file(path): Read the contents of a file"));
    assert!(prompt.contains("TOOL[tool_name](arg1, arg2, ...)"));
    assert!(prompt.contains("Current directory: /work/project"));
    assert!(prompt.contains("Project overview:\nLanguages: Rust (3 files)"));
    assert!(prompt.contains("Current tasks:\n1. [pending] write tests"));
    assert!(prompt.ends_with("user: hello\n\nassistant: "));
}

#[test]
fn test_build_is_deterministic() {
    let builder = ContextBuilder::new(4, 100);
    let history = history_of(7);
    let tasks = TaskList::new();
    let a = build(&builder, &history, &tasks, None);
    let b = build(&builder, &history, &tasks, None);
    assert_eq!(a, b);
}

#[test]
fn test_mentioned_file_is_inlined_before_user_text() {
    let dir = TempDir::new().unwrap();
    let notes = "Meeting notes: ship on Friday.\n".repeat(300);
    fs::write(dir.path().join("notes.txt"), &notes).unwrap();

    let input = "@notes.txt summarize this";
    let mentions = resolve_mentions(input, dir.path());
    assert_eq!(mentions.len(), 1);

    let builder = ContextBuilder::new(6, 5000);
    let prompt = build(
        &builder,
        &History::new(),
        &TaskList::new(),
        Some(UserTurn {
            text: input,
            mentions: &mentions,
        }),
    );

    let file_start = prompt.find("--- File: notes.txt ---").unwrap();
    let file_end = prompt.find("--- End of notes.txt ---").unwrap();
    let instruction = prompt.rfind("summarize this").unwrap();
    assert!(file_start < file_end && file_end < instruction);

    let inlined = &prompt[file_start + "--- File: notes.txt ---\n".len()..file_end];
    assert!(inlined.trim_end().chars().count() <= 5000);
    assert!(inlined.starts_with("Meeting notes: ship on Friday."));
}

#[test]
fn test_mentions_follow_input_order_and_missing_files_are_skipped() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("b.txt"), "B").unwrap();
    fs::write(dir.path().join("a.txt"), "A").unwrap();

    let mentions = resolve_mentions("compare @b.txt with @a.txt and @missing.txt", dir.path());
    let paths: Vec<&str> = mentions.iter().map(|m| m.path.as_str()).collect();
    assert_eq!(paths, vec!["b.txt", "a.txt"]);
}
