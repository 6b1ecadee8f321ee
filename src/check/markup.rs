use thiserror::Error;

use crate::editor_core::line_of;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum MarkupError {
    #[error("Unclosed element <{tag}> opened on line {line}")]
    Unclosed { tag: String, line: usize },
    #[error("Unexpected closing tag </{tag}> on line {line}")]
    UnexpectedClose { tag: String, line: usize },
    #[error("Unterminated tag <{tag} starting on line {line}")]
    UnterminatedTag { tag: String, line: usize },
    #[error("Unterminated comment starting on line {line}")]
    UnterminatedComment { line: usize },
}

impl MarkupError {
    pub fn line(&self) -> usize {
        match self {
            MarkupError::Unclosed { line, .. }
            | MarkupError::UnexpectedClose { line, .. }
            | MarkupError::UnterminatedTag { line, .. }
            | MarkupError::UnterminatedComment { line } => *line,
        }
    }
}

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Elements whose content is not markup.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "textarea", "title"];

/// Elements the HTML parser closes implicitly.
const OPTIONAL_END_ELEMENTS: &[&str] = &[
    "html", "head", "body", "p", "li", "dt", "dd", "option", "optgroup", "tr", "td", "th",
    "thead", "tbody", "tfoot", "colgroup", "rb", "rt", "rp", "rtc",
];

struct OpenTag {
    name: String,
    line: usize,
}

impl OpenTag {
    fn needs_close(&self) -> bool {
        !OPTIONAL_END_ELEMENTS.contains(&self.name.as_str())
    }
}

fn tag_name(rest: &str) -> &str {
    let end = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == ':' || c == '_'))
        .unwrap_or(rest.len());
    &rest[..end]
}

/// Offset just past the `>` closing the tag that starts at `from`, skipping
/// quoted attribute values.
fn tag_end(src: &str, from: usize) -> Option<usize> {
    let mut quote = None;
    for (i, c) in src[from..].char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '>') => return Some(from + i + 1),
            (None, _) => {}
        }
    }
    None
}

/// Structural check of an HTML fragment: balanced elements, terminated tags
/// and comments. Stops at the first problem.
pub fn check_markup(src: &str) -> Result<(), MarkupError> {
    let mut stack: Vec<OpenTag> = Vec::new();
    let mut i = 0usize;

    while let Some(rel) = src[i..].find('<') {
        let at = i + rel;
        let rest = &src[at..];
        let line = line_of(src, at);

        if rest.starts_with("<!--") {
            let Some(end) = src[at + 4..].find("-->") else {
                return Err(MarkupError::UnterminatedComment { line });
            };
            i = at + 4 + end + 3;
            continue;
        }

        if rest.starts_with("<!") || rest.starts_with("<?") {
            let Some(end) = src[at..].find('>') else {
                return Err(MarkupError::UnterminatedTag {
                    tag: rest[1..2].to_string(),
                    line,
                });
            };
            i = at + end + 1;
            continue;
        }

        if let Some(after) = rest.strip_prefix("</") {
            let name = tag_name(after).to_ascii_lowercase();
            if name.is_empty() {
                i = at + 2;
                continue;
            }
            let Some(end) = src[at..].find('>') else {
                return Err(MarkupError::UnterminatedTag {
                    tag: format!("/{name}"),
                    line,
                });
            };
            i = at + end + 1;
            if VOID_ELEMENTS.contains(&name.as_str()) {
                continue;
            }
            close_element(&mut stack, name, line)?;
            continue;
        }

        let name = tag_name(&rest[1..]);
        if name.is_empty() || !name.starts_with(|c: char| c.is_ascii_alphabetic()) {
            // A bare `<` in text.
            i = at + 1;
            continue;
        }
        let name = name.to_ascii_lowercase();
        let Some(end) = tag_end(src, at + 1) else {
            return Err(MarkupError::UnterminatedTag { tag: name, line });
        };
        i = end;

        let self_closing = src[..end - 1].ends_with('/');
        if self_closing || VOID_ELEMENTS.contains(&name.as_str()) {
            continue;
        }

        if RAW_TEXT_ELEMENTS.contains(&name.as_str()) {
            let closing = format!("</{name}");
            let Some(close) = src[end..].to_ascii_lowercase().find(&closing) else {
                return Err(MarkupError::Unclosed { tag: name, line });
            };
            i = end + close;
        }
        stack.push(OpenTag { name, line });
    }

    match stack.iter().find(|open| open.needs_close()) {
        Some(open) => Err(MarkupError::Unclosed {
            tag: open.name.clone(),
            line: open.line,
        }),
        None => Ok(()),
    }
}

fn close_element(stack: &mut Vec<OpenTag>, name: String, line: usize) -> Result<(), MarkupError> {
    let Some(index) = stack.iter().rposition(|open| open.name == name) else {
        return Err(MarkupError::UnexpectedClose { tag: name, line });
    };
    if let Some(open) = stack[index + 1..].iter().find(|open| open.needs_close()) {
        return Err(MarkupError::Unclosed {
            tag: open.name.clone(),
            line: open.line,
        });
    }
    stack.truncate(index);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_well_formed_documents() {
        let src = r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>a < b</title></head>
<body>
  <!-- a <div> in a comment -->
  <p>one
  <p>two
  <ul><li>a<li>b</ul>
  <input type="text" value="x > y">
  <svg><circle r="1"/></svg>
  <script>if (a < b && "</div>") {}</script>
  <p>1 < 2</p>
</body>
</html>"#;
        assert_eq!(check_markup(src), Ok(()));
    }

    #[test]
    fn empty_markup_is_fine() {
        assert_eq!(check_markup(""), Ok(()));
        assert_eq!(check_markup("just text"), Ok(()));
    }

    #[test]
    fn reports_unclosed_element() {
        assert_eq!(
            check_markup("<div>"),
            Err(MarkupError::Unclosed {
                tag: "div".to_string(),
                line: 1
            })
        );
    }

    #[test]
    fn reports_element_closed_implicitly_by_an_outer_close() {
        let err = check_markup("<div>\n  <span>\n</div>").unwrap_err();
        assert_eq!(
            err,
            MarkupError::Unclosed {
                tag: "span".to_string(),
                line: 2
            }
        );
    }

    #[test]
    fn reports_stray_closing_tag() {
        let err = check_markup("<p>a</p>\n</section>").unwrap_err();
        assert_eq!(err.line(), 2);
        assert!(matches!(err, MarkupError::UnexpectedClose { .. }));
    }

    #[test]
    fn reports_unterminated_constructs() {
        assert!(matches!(
            check_markup("<div class=\"a"),
            Err(MarkupError::UnterminatedTag { .. })
        ));
        assert!(matches!(
            check_markup("a\n<!-- open"),
            Err(MarkupError::UnterminatedComment { line: 2 })
        ));
        assert!(matches!(
            check_markup("<script>let a;"),
            Err(MarkupError::Unclosed { .. })
        ));
    }

    #[test]
    fn tag_names_are_case_insensitive() {
        assert_eq!(check_markup("<DIV><Span></SPAN></div>"), Ok(()));
    }
}
