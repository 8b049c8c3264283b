use crossterm::style::{Color, ResetColor, SetForegroundColor};

/// Plain line output for the REPL itself, outside of any agent turn.
pub struct SimpleOutput {
    machine_mode: bool,
}

impl SimpleOutput {
    pub fn new() -> Self {
        Self::new_with_mode(false)
    }

    pub fn new_with_mode(machine_mode: bool) -> Self {
        Self { machine_mode }
    }

    pub fn is_machine(&self) -> bool {
        self.machine_mode
    }

    pub fn print(&self, message: &str) {
        println!("{}", message);
    }

    /// Print the final answer of a turn. Streaming already showed it, so only
    /// the separating blank line is needed on a console.
    pub fn print_smart(&self, response: &str) {
        if self.machine_mode {
            println!();
            println!("END_TURN");
        } else if !response.ends_with('\n') {
            println!();
        }
    }

    /// Dimmed on a console, verbatim in machine mode.
    pub fn print_dim(&self, message: &str) {
        if self.machine_mode {
            println!("{}", message);
        } else {
            println!(
                "{}{}{}",
                SetForegroundColor(Color::DarkGrey),
                message,
                ResetColor
            );
        }
    }
}

impl Default for SimpleOutput {
    fn default() -> Self {
        Self::new()
    }
}
