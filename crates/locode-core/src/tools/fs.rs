use anyhow::{Context, Result};
use async_trait::async_trait;
use std::fs;
use tracing::debug;

use super::{FileChange, ParamSpec, Tool, ToolContext, ToolError, ToolOutput};

pub struct ReadFile;
pub struct WriteFile;
pub struct EditFile;
pub struct CreateDirectory;

#[async_trait]
impl Tool for ReadFile {
    fn name(&self) -> &'static str {
        "read_file"
    }

    fn description(&self) -> &'static str {
        "Read the contents of a file"
    }

    fn params(&self) -> &'static [ParamSpec] {
        const PARAMS: &[ParamSpec] = &[ParamSpec::required("path")];
        PARAMS
    }

    async fn invoke(&self, args: &[String], ctx: &mut ToolContext<'_>) -> Result<ToolOutput> {
        let path = ctx.resolve_path(&args[0]);
        if !path.is_file() {
            return Err(ToolError::NotFound(args[0].clone()).into());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let total_chars = content.chars().count();
        debug!("Read {} characters from {}", total_chars, path.display());

        if total_chars <= ctx.max_read_chars {
            return Ok(ToolOutput::message(content));
        }

        let truncated: String = content.chars().take(ctx.max_read_chars).collect();
        Ok(ToolOutput::message(format!(
            "{}\n... (truncated, {} more characters)",
            truncated,
            total_chars - ctx.max_read_chars
        )))
    }
}

#[async_trait]
impl Tool for WriteFile {
    fn name(&self) -> &'static str {
        "write_file"
    }

    fn description(&self) -> &'static str {
        "Create or overwrite a file; escape newlines inside quoted content as \\n"
    }

    fn params(&self) -> &'static [ParamSpec] {
        const PARAMS: &[ParamSpec] = &[ParamSpec::required("path"), ParamSpec::required("content")];
        PARAMS
    }

    async fn invoke(&self, args: &[String], ctx: &mut ToolContext<'_>) -> Result<ToolOutput> {
        if args[0].trim().is_empty() {
            return Err(ToolError::EmptyArgument("path").into());
        }
        let path = ctx.resolve_path(&args[0]);
        let content = decode_escapes(&args[1]);

        let before = if path.exists() {
            Some(
                fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read existing {}", path.display()))?,
            )
        } else {
            None
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(&path, &content)
            .with_context(|| format!("Failed to write {}", path.display()))?;

        let message = match before {
            Some(_) => format!("Wrote {} characters to {}", content.chars().count(), args[0]),
            None => format!("Created {} ({} lines)", args[0], content.lines().count()),
        };
        Ok(ToolOutput::with_change(
            message,
            FileChange {
                path,
                before,
                after: content,
            },
        ))
    }
}

#[async_trait]
impl Tool for EditFile {
    fn name(&self) -> &'static str {
        "edit_file"
    }

    fn description(&self) -> &'static str {
        "Replace every occurrence of old_text with new_text in a file"
    }

    fn params(&self) -> &'static [ParamSpec] {
        const PARAMS: &[ParamSpec] = &[
            ParamSpec::required("path"),
            ParamSpec::required("old_text"),
            ParamSpec::required("new_text"),
        ];
        PARAMS
    }

    async fn invoke(&self, args: &[String], ctx: &mut ToolContext<'_>) -> Result<ToolOutput> {
        let path = ctx.resolve_path(&args[0]);
        let old_text = decode_escapes(&args[1]);
        let new_text = decode_escapes(&args[2]);

        if old_text.is_empty() {
            return Err(ToolError::EmptyArgument("old_text").into());
        }
        if !path.is_file() {
            return Err(ToolError::NotFound(args[0].clone()).into());
        }

        let before = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let occurrences = before.matches(old_text.as_str()).count();
        if occurrences == 0 {
            return Err(ToolError::TextNotFound(args[0].clone()).into());
        }

        let after = before.replace(old_text.as_str(), &new_text);
        fs::write(&path, &after).with_context(|| format!("Failed to write {}", path.display()))?;

        Ok(ToolOutput::with_change(
            format!("Edited {} ({} replacement(s))", args[0], occurrences),
            FileChange {
                path,
                before: Some(before),
                after,
            },
        ))
    }
}

#[async_trait]
impl Tool for CreateDirectory {
    fn name(&self) -> &'static str {
        "create_directory"
    }

    fn description(&self) -> &'static str {
        "Create a directory and any missing parents"
    }

    fn params(&self) -> &'static [ParamSpec] {
        const PARAMS: &[ParamSpec] = &[ParamSpec::required("path")];
        PARAMS
    }

    async fn invoke(&self, args: &[String], ctx: &mut ToolContext<'_>) -> Result<ToolOutput> {
        if args[0].trim().is_empty() {
            return Err(ToolError::EmptyArgument("path").into());
        }
        let path = ctx.resolve_path(&args[0]);
        fs::create_dir_all(&path)
            .with_context(|| format!("Failed to create directory {}", path.display()))?;
        Ok(ToolOutput::message(format!("Created directory {}", args[0])))
    }
}

/// Decode the escapes models use to fit multi-line content into one argument.
/// Unknown escapes are kept as written.
pub fn decode_escapes(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('"') => out.push('"'),
            Some('\'') => out.push('\''),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::todo::TaskList;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_decode_escapes() {
        assert_eq!(decode_escapes(r"a\nb\tc"), "a\nb\tc");
        assert_eq!(decode_escapes(r#"say \"hi\""#), "say \"hi\"");
        assert_eq!(decode_escapes(r"C:\\dir"), r"C:\dir");
        assert_eq!(decode_escapes(r"\d+"), r"\d+");
        assert_eq!(decode_escapes("trailing\\"), "trailing\\");
    }

    #[tokio::test]
    async fn test_overwrite_counts_characters_not_bytes() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("greeting.txt"), "old").unwrap();
        let mut tasks = TaskList::new();
        let mut ctx = ToolContext {
            working_dir: dir.path(),
            tasks: &mut tasks,
            shell_timeout: Duration::from_secs(5),
            max_read_chars: 1000,
        };

        let args = vec!["greeting.txt".to_string(), "héllo wörld ✓".to_string()];
        let output = WriteFile.invoke(&args, &mut ctx).await.unwrap();

        assert_eq!(output.message, "Wrote 13 characters to greeting.txt");
        assert_eq!(
            fs::read_to_string(dir.path().join("greeting.txt")).unwrap(),
            "héllo wörld ✓"
        );
    }
}
