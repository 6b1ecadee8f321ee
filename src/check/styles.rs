use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

use crate::editor_core::line_of;

/// Style text rejected by the probe. Every message carries `line N`.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum StyleError {
    #[error("Unexpected '}}' at line {line}")]
    UnexpectedClose { line: usize },
    #[error("Unclosed block opened at line {line}")]
    UnclosedBlock { line: usize },
    #[error("Empty selector before '{{' at line {line}")]
    EmptySelector { line: usize },
    #[error("Unterminated comment at line {line}")]
    UnterminatedComment { line: usize },
    #[error("Unterminated string at line {line}")]
    UnterminatedString { line: usize },
    #[error("Unbalanced parenthesis at line {line}")]
    UnbalancedParen { line: usize },
    #[error("Expected ':' in declaration '{text}' at line {line}")]
    MissingColon { text: String, line: usize },
    #[error("Invalid property name '{property}' at line {line}")]
    InvalidProperty { property: String, line: usize },
    #[error("Missing value for property '{property}' at line {line}")]
    MissingValue { property: String, line: usize },
}

/// Blanks out comments, keeping byte offsets and newlines. Returns the
/// offset of an unterminated comment, whose tail is dropped.
fn strip_comments(src: &str) -> (String, Option<usize>) {
    let mut out = String::with_capacity(src.len());
    let mut rest = src;
    let mut consumed = 0usize;
    let mut quote: Option<char> = None;

    while let Some(c) = rest.chars().next() {
        if let Some(q) = quote {
            out.push(c);
            rest = &rest[c.len_utf8()..];
            consumed += c.len_utf8();
            if c == '\\' {
                if let Some(next) = rest.chars().next() {
                    out.push(next);
                    rest = &rest[next.len_utf8()..];
                    consumed += next.len_utf8();
                }
            } else if c == q || c == '\n' {
                quote = None;
            }
            continue;
        }
        if rest.starts_with("/*") {
            let Some(end) = rest[2..].find("*/") else {
                return (out, Some(consumed));
            };
            let comment = &rest[..end + 4];
            out.extend(comment.bytes().map(|b| if b == b'\n' { '\n' } else { ' ' }));
            rest = &rest[end + 4..];
            consumed += end + 4;
            continue;
        }
        if c == '"' || c == '\'' {
            quote = Some(c);
        }
        out.push(c);
        rest = &rest[c.len_utf8()..];
        consumed += c.len_utf8();
    }
    (out, None)
}

fn property_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(--[\w-]*|-?[A-Za-z_][\w-]*)$").unwrap())
}

fn check_segment(text: &str, segment: &str, offset: usize) -> Result<(), StyleError> {
    let trimmed = segment.trim();
    if trimmed.is_empty() || trimmed.starts_with('@') {
        return Ok(());
    }
    let lead = segment.len() - segment.trim_start().len();
    let line = line_of(text, offset + lead);

    let Some((name, value)) = trimmed.split_once(':') else {
        let mut shown: String = trimmed.chars().take(40).collect();
        if shown.len() < trimmed.len() {
            shown.push_str("...");
        }
        return Err(StyleError::MissingColon { text: shown, line });
    };
    let name = name.trim();
    if !property_re().is_match(name) {
        return Err(StyleError::InvalidProperty {
            property: name.to_string(),
            line,
        });
    }
    let value = value.trim();
    let value = strip_important(value).trim_end();
    if value.is_empty() && !name.starts_with("--") {
        return Err(StyleError::MissingValue {
            property: name.to_string(),
            line,
        });
    }
    Ok(())
}

fn strip_important(value: &str) -> &str {
    let lower = value.to_ascii_lowercase();
    match lower.rfind("!important") {
        Some(at) if lower[at + "!important".len()..].trim().is_empty() => &value[..at],
        _ => value,
    }
}

/// Applies style text to a throwaway probe: rule blocks, at-rules and bare
/// declarations (as in a `style` attribute) are accepted.
pub fn check_styles(src: &str) -> Result<(), StyleError> {
    let (text, open_comment) = strip_comments(src);
    check_structure(&text)?;
    match open_comment {
        Some(at) => Err(StyleError::UnterminatedComment {
            line: line_of(src, at),
        }),
        None => Ok(()),
    }
}

fn check_structure(text: &str) -> Result<(), StyleError> {
    let mut blocks: Vec<usize> = Vec::new();
    let mut parens: Vec<usize> = Vec::new();
    let mut segment_start = 0usize;
    let mut chars = text.char_indices();

    while let Some((i, c)) = chars.next() {
        match c {
            '"' | '\'' => {
                let mut closed = false;
                while let Some((_, s)) = chars.next() {
                    if s == '\\' {
                        chars.next();
                    } else if s == c {
                        closed = true;
                        break;
                    } else if s == '\n' {
                        break;
                    }
                }
                if !closed {
                    return Err(StyleError::UnterminatedString {
                        line: line_of(text, i),
                    });
                }
            }
            '(' => parens.push(i),
            ')' => {
                if parens.pop().is_none() {
                    return Err(StyleError::UnbalancedParen {
                        line: line_of(text, i),
                    });
                }
            }
            _ if !parens.is_empty() => {}
            '{' => {
                if text[segment_start..i].trim().is_empty() {
                    return Err(StyleError::EmptySelector {
                        line: line_of(text, i),
                    });
                }
                blocks.push(i);
                segment_start = i + 1;
            }
            ';' => {
                check_segment(text, &text[segment_start..i], segment_start)?;
                segment_start = i + 1;
            }
            '}' => {
                if blocks.pop().is_none() {
                    return Err(StyleError::UnexpectedClose {
                        line: line_of(text, i),
                    });
                }
                check_segment(text, &text[segment_start..i], segment_start)?;
                segment_start = i + 1;
            }
            _ => {}
        }
    }

    if let Some(open) = parens.first() {
        return Err(StyleError::UnbalancedParen {
            line: line_of(text, *open),
        });
    }
    if let Some(open) = blocks.first() {
        return Err(StyleError::UnclosedBlock {
            line: line_of(text, *open),
        });
    }
    check_segment(text, &text[segment_start..], segment_start)
}
