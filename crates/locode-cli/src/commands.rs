//! Slash commands understood by the interactive prompt.

/// A control command entered at the prompt instead of a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlashCommand {
    Help,
    Clear,
    /// `/model` alone reports the current model.
    Model(Option<String>),
    Pwd,
    Cd(Option<String>),
    Tools,
    Todos,
    Stats,
    Exit,
    Unknown(String),
}

pub const HELP_TEXT: &str = "\
📖 Control Commands:
  /help          - Show this help message
  /clear         - Forget the conversation so far (tasks are kept)
  /model [name]  - Show or switch the model (aliases: fast, balanced, powerful, default)
  /pwd           - Show the working directory
  /cd <path>     - Change the working directory
  /tools         - List the tools the model can call
  /todos         - Show the task list
  /stats         - Show token usage and session statistics
  /exit, exit, quit - Leave the session

Mention a file with @path to include its contents in your message.
End a line with \\ to continue on the next line.";

impl SlashCommand {
    /// Parse one line of input. Returns `None` for anything that should go to
    /// the model.
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        if input == "exit" || input == "quit" {
            return Some(Self::Exit);
        }
        let rest = input.strip_prefix('/')?;

        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, Some(arg.trim()).filter(|a| !a.is_empty())),
            None => (rest, None),
        };
        let arg = arg.map(str::to_string);

        Some(match name {
            "help" | "?" => Self::Help,
            "clear" => Self::Clear,
            "model" => Self::Model(arg),
            "pwd" => Self::Pwd,
            "cd" => Self::Cd(arg),
            "tools" => Self::Tools,
            "todos" | "todo" => Self::Todos,
            "stats" => Self::Stats,
            "exit" | "quit" => Self::Exit,
            _ => Self::Unknown(input.to_string()),
        })
    }

    /// Name used in machine-mode `COMMAND:` markers.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Help => "help",
            Self::Clear => "clear",
            Self::Model(_) => "model",
            Self::Pwd => "pwd",
            Self::Cd(_) => "cd",
            Self::Tools => "tools",
            Self::Todos => "todos",
            Self::Stats => "stats",
            Self::Exit => "exit",
            Self::Unknown(_) => "unknown",
        }
    }
}
