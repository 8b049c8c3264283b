//! Scanner for tool invocations embedded in model output.
//!
//! The wire form is `TOOL[name](arg1, arg2, ...)`. Only registered names are
//! recognised; anything else that merely looks like a call stays in the text.

use std::ops::Range;

use crate::tools::ToolRegistry;

pub const TOOL_MARKER: &str = "TOOL[";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCall {
    pub name: String,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCall {
    pub call: ToolCall,
    /// Byte range of the whole invocation, marker through closing paren.
    pub span: Range<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedResponse {
    pub calls: Vec<ToolCall>,
    /// The input with every invocation removed.
    pub residual: String,
}

/// Lazily yields calls from left to right.
pub struct ToolCallScanner<'a, F> {
    text: &'a str,
    pos: usize,
    is_registered: F,
}

impl<'a, F> ToolCallScanner<'a, F>
where
    F: Fn(&str) -> bool,
{
    pub fn new(text: &'a str, is_registered: F) -> Self {
        Self {
            text,
            pos: 0,
            is_registered,
        }
    }

    fn try_parse_at(&self, start: usize) -> Option<ParsedCall> {
        let name_start = start + TOOL_MARKER.len();
        let rest = &self.text[name_start..];
        let name_len = rest.find(']')?;
        let name = &rest[..name_len];

        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return None;
        }
        if !(self.is_registered)(name) {
            return None;
        }

        let open = name_start + name_len + 1;
        if !self.text[open..].starts_with('(') {
            return None;
        }

        let (args, close) = scan_arguments(self.text, open + 1)?;
        Some(ParsedCall {
            call: ToolCall {
                name: name.to_string(),
                args,
            },
            span: start..close + 1,
        })
    }
}

impl<F> Iterator for ToolCallScanner<'_, F>
where
    F: Fn(&str) -> bool,
{
    type Item = ParsedCall;

    fn next(&mut self) -> Option<Self::Item> {
        while self.pos < self.text.len() {
            let start = self.pos + self.text[self.pos..].find(TOOL_MARKER)?;
            match self.try_parse_at(start) {
                Some(parsed) => {
                    self.pos = parsed.span.end;
                    return Some(parsed);
                }
                None => self.pos = start + TOOL_MARKER.len(),
            }
        }
        None
    }
}

/// Collect every call in `text` and the text that remains once they are cut out.
pub fn parse_response(text: &str, registry: &ToolRegistry) -> ParsedResponse {
    let mut calls = Vec::new();
    let mut residual = String::with_capacity(text.len());
    let mut last = 0;

    for parsed in ToolCallScanner::new(text, |name| registry.contains(name)) {
        residual.push_str(&text[last..parsed.span.start]);
        last = parsed.span.end;
        calls.push(parsed.call);
    }
    residual.push_str(&text[last..]);

    ParsedResponse { calls, residual }
}

#[derive(Default)]
struct ArgBuffer {
    raw: String,
    quoted: bool,
}

/// Scan an argument list starting just after `(`. Returns the arguments and
/// the byte index of the closing paren, or `None` if the list never closes.
fn scan_arguments(text: &str, from: usize) -> Option<(Vec<String>, usize)> {
    let mut args: Vec<ArgBuffer> = Vec::new();
    let mut current = ArgBuffer::default();
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut depth = 1usize;
    let mut prev: Option<char> = None;

    for (offset, ch) in text[from..].char_indices() {
        if let Some(q) = quote {
            current.raw.push(ch);
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == q {
                quote = None;
            }
            prev = Some(ch);
            continue;
        }

        match ch {
            '"' | '\'' if !prev.is_some_and(|p| p.is_alphanumeric()) => {
                quote = Some(ch);
                current.quoted = true;
                current.raw.push(ch);
            }
            '(' => {
                depth += 1;
                current.raw.push(ch);
            }
            ')' => {
                depth -= 1;
                if depth == 0 {
                    args.push(current);
                    return Some((finish_arguments(args), from + offset));
                }
                current.raw.push(ch);
            }
            ',' if depth == 1 => {
                args.push(std::mem::take(&mut current));
            }
            _ => current.raw.push(ch),
        }
        prev = Some(ch);
    }

    None
}

fn finish_arguments(mut args: Vec<ArgBuffer>) -> Vec<String> {
    // `NAME()` and a trailing comma both leave a blank unquoted final argument
    if args
        .last()
        .is_some_and(|a| !a.quoted && a.raw.trim().is_empty())
    {
        args.pop();
    }
    args.into_iter().map(|a| strip_quotes(a.raw.trim())).collect()
}

fn strip_quotes(arg: &str) -> String {
    let bytes = arg.as_bytes();
    if bytes.len() >= 2 {
        let first = bytes[0];
        let last = bytes[bytes.len() - 1];
        if (first == b'"' || first == b'\'') && first == last {
            return arg[1..arg.len() - 1].to_string();
        }
    }
    arg.to_string()
}
