//! Human-readable rendering of token streams

use crate::config::compile_time::serialization::INDENT_WIDTH;
use crate::tokens::{LayoutToken, Token, TokenStream};

/// Words after which `(` or `[` starts a new operand rather than a call or index
const KEYWORDS: &[&str] = &[
    "of", "filter", "join", "as", "on", "return", "let", "new", "edge", "now", "=>", "compute",
    "aggregate", "class", "extends", "function", "in", "out", "req", "opt",
];

struct Printer {
    output: String,
    indents: Vec<usize>,
    previous: Option<String>,
    pending_newline: bool,
    force_space: bool,
}

impl Printer {
    fn new() -> Self {
        Self {
            output: String::new(),
            indents: vec![0],
            previous: None,
            pending_newline: false,
            force_space: false,
        }
    }

    fn indent(&self) -> usize {
        self.indents.last().copied().unwrap_or(0)
    }

    fn column(&self) -> usize {
        match self.output.rfind('\n') {
            Some(newline) => self.output[newline + 1..].chars().count(),
            None => self.output.chars().count(),
        }
    }

    fn layout(&mut self, layout: LayoutToken) {
        match layout {
            LayoutToken::Indent => self.indents.push(self.indent() + INDENT_WIDTH),
            LayoutToken::SetTab => self.indents.push(self.column()),
            LayoutToken::Dedent | LayoutToken::ClearTab => {
                if self.indents.len() > 1 {
                    self.indents.pop();
                }
            }
            LayoutToken::Space => self.force_space = true,
            LayoutToken::Newline => self.pending_newline = true,
            LayoutToken::NoNewline => self.pending_newline = false,
        }
    }

    fn write(&mut self, text: &str) {
        if self.pending_newline && !self.output.is_empty() {
            let trimmed = self.output.trim_end_matches(' ').len();
            self.output.truncate(trimmed);
            self.output.push('\n');
            self.output.push_str(&" ".repeat(self.indent()));
            self.previous = None;
        } else if let Some(previous) = &self.previous {
            if self.force_space || needs_space(previous, text) {
                self.output.push(' ');
            }
        }
        self.pending_newline = false;
        self.force_space = false;
        self.output.push_str(text);
        self.previous = Some(text.to_string());
    }

    fn finish(self) -> String {
        self.output.trim().to_string()
    }
}

fn is_word(token: &str) -> bool {
    token
        .chars()
        .last()
        .map(|c| c.is_alphanumeric() || c == '_' || c == '?')
        .unwrap_or(false)
        && !KEYWORDS.contains(&token)
}

fn needs_space(previous: &str, next: &str) -> bool {
    if matches!(previous, "(" | "[" | "{" | "#[" | "!" | ".") {
        return false;
    }
    if matches!(next, ")" | "]" | "}" | "," | ";" | ".") {
        return false;
    }
    if previous == "=" || next == "=" {
        return false;
    }
    match next {
        "(" => !is_word(previous),
        "[" => !(is_word(previous) || matches!(previous, ")" | "]")),
        _ => true,
    }
}

/// Render `stream` as indented source text
pub fn prettyprint(stream: &TokenStream) -> String {
    let mut printer = Printer::new();
    for token in stream {
        match token {
            Token::Layout(layout) => printer.layout(*layout),
            Token::Literal(text) => printer.write(text),
            Token::Constant(constant) => printer.write(&constant.render()),
        }
    }
    printer.finish()
}
