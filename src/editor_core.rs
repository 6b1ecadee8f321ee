use thiserror::Error;

use crate::hints::HintEntry;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Selection {
    pub start: usize,
    pub end: usize,
}

impl Selection {
    pub fn new(start: usize, end: usize) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self {
                start: end,
                end: start,
            }
        }
    }

    pub fn cursor(pos: usize) -> Self {
        Self {
            start: pos,
            end: pos,
        }
    }

    pub fn is_cursor(self) -> bool {
        self.start == self.end
    }

    pub fn clamp(self, len: usize) -> Self {
        Self::new(self.start.min(len), self.end.min(len))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextChange {
    pub start: usize,
    pub end: usize,
    pub insert: String,
}

impl TextChange {
    pub fn new(start: usize, end: usize, insert: impl Into<String>) -> Self {
        Self {
            start,
            end,
            insert: insert.into(),
        }
    }
}

/// What produced a transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeOrigin {
    Command,
    Completion,
    ColorPicker,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    pub changes: Vec<TextChange>,
    pub selection_after: Option<Selection>,
    pub origin: ChangeOrigin,
    pub label: &'static str,
}

impl Transaction {
    pub fn single(
        change: TextChange,
        selection_after: Option<Selection>,
        origin: ChangeOrigin,
        label: &'static str,
    ) -> Self {
        Self {
            changes: vec![change],
            selection_after,
            origin,
            label,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ApplyOutcome {
    pub text_changed: bool,
    pub selection_changed: bool,
    pub revision: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("range {start}..{end} is outside the text (length {len})")]
    InvalidRange {
        start: usize,
        end: usize,
        len: usize,
    },
    #[error("changes {first_start}..{first_end} and {next_start}..{next_end} overlap")]
    OverlappingChanges {
        first_start: usize,
        first_end: usize,
        next_start: usize,
        next_end: usize,
    },
}

/// Text, selection and revision of one editor pane.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EditorSnapshot {
    pub text: String,
    pub selection: Selection,
    pub revision: u64,
}

impl EditorSnapshot {
    pub fn new(text: String) -> Self {
        let len = text.len();
        Self {
            text,
            selection: Selection::cursor(len),
            revision: 0,
        }
    }

    pub fn set_selection(&mut self, selection: Selection) {
        self.selection = selection.clamp(self.text.len());
    }

    pub fn apply_transaction(
        &mut self,
        transaction: Transaction,
    ) -> Result<ApplyOutcome, CoreError> {
        let normalized = normalize_changes(&transaction.changes, &self.text)?;
        let next_text = if normalized.is_empty() {
            self.text.clone()
        } else {
            apply_changes_to_text(&self.text, &normalized)
        };

        let next_selection = transaction
            .selection_after
            .map(|selection| selection.clamp(next_text.len()))
            .unwrap_or_else(|| {
                Selection::new(
                    map_position_through_changes(self.selection.start, &normalized),
                    map_position_through_changes(self.selection.end, &normalized),
                )
                .clamp(next_text.len())
            });

        let text_changed = self.text != next_text;
        let selection_changed = self.selection != next_selection;

        self.text = next_text;
        self.selection = next_selection;
        if text_changed {
            self.revision += 1;
        }

        Ok(ApplyOutcome {
            text_changed,
            selection_changed,
            revision: self.revision,
        })
    }
}

fn normalize_changes(changes: &[TextChange], text: &str) -> Result<Vec<TextChange>, CoreError> {
    let len = text.len();
    let mut sorted = changes.to_vec();
    sorted.sort_by_key(|change| (change.start, change.end));

    for change in &sorted {
        if change.start > change.end
            || change.end > len
            || !text.is_char_boundary(change.start)
            || !text.is_char_boundary(change.end)
        {
            return Err(CoreError::InvalidRange {
                start: change.start,
                end: change.end,
                len,
            });
        }
    }

    for pair in sorted.windows(2) {
        let first = &pair[0];
        let next = &pair[1];
        if next.start < first.end {
            return Err(CoreError::OverlappingChanges {
                first_start: first.start,
                first_end: first.end,
                next_start: next.start,
                next_end: next.end,
            });
        }
    }

    Ok(sorted)
}

fn apply_changes_to_text(text: &str, changes: &[TextChange]) -> String {
    let mut out = String::new();
    let mut cursor = 0usize;
    for change in changes {
        out.push_str(&text[cursor..change.start]);
        out.push_str(&change.insert);
        cursor = change.end;
    }
    out.push_str(&text[cursor..]);
    out
}

fn map_position_through_changes(mut pos: usize, changes: &[TextChange]) -> usize {
    for change in changes {
        if pos < change.start {
            continue;
        }
        if pos <= change.end {
            pos = change.start + change.insert.len();
            continue;
        }
        let removed = change.end - change.start;
        if change.insert.len() >= removed {
            pos += change.insert.len() - removed;
        } else {
            pos = pos.saturating_sub(removed - change.insert.len());
        }
    }
    pos
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EditCommand<'a> {
    Indent {
        unit: usize,
    },
    Outdent {
        unit: usize,
    },
    /// Newline that keeps the current line's indentation.
    Newline {
        unit: usize,
    },
    AutoPair {
        open: &'static str,
        close: &'static str,
    },
    /// Replace `start..cursor` with a completion entry.
    Complete {
        entry: HintEntry,
        start: usize,
        unit: usize,
    },
    /// Replace an arbitrary range, e.g. a color token.
    Replace {
        start: usize,
        end: usize,
        text: &'a str,
    },
}

pub fn apply_command(
    snapshot: &mut EditorSnapshot,
    command: EditCommand<'_>,
) -> Result<bool, CoreError> {
    let Some(transaction) = build_transaction(snapshot, command) else {
        return Ok(false);
    };
    log::trace!("{:?} {}", transaction.origin, transaction.label);
    let outcome = snapshot.apply_transaction(transaction)?;
    Ok(outcome.text_changed || outcome.selection_changed)
}

fn build_transaction(snapshot: &EditorSnapshot, command: EditCommand<'_>) -> Option<Transaction> {
    match command {
        EditCommand::Indent { unit } => indent_or_outdent_transaction(snapshot, unit, false),
        EditCommand::Outdent { unit } => indent_or_outdent_transaction(snapshot, unit, true),
        EditCommand::Newline { unit } => Some(newline_transaction(snapshot, unit)),
        EditCommand::AutoPair { open, close } => Some(wrap_transaction(snapshot, open, close)),
        EditCommand::Complete { entry, start, unit } => {
            Some(completion_transaction(snapshot, entry, start, unit))
        }
        EditCommand::Replace { start, end, text } => {
            let caret = start + text.len();
            Some(Transaction::single(
                TextChange::new(start, end, text),
                Some(Selection::cursor(caret)),
                ChangeOrigin::ColorPicker,
                "replace",
            ))
        }
    }
}

fn wrap_transaction(snapshot: &EditorSnapshot, open: &str, close: &str) -> Transaction {
    let selection = snapshot.selection.clamp(snapshot.text.len());
    let mut insert = String::new();
    insert.push_str(open);
    insert.push_str(&snapshot.text[selection.start..selection.end]);
    insert.push_str(close);
    let selection_after = if selection.is_cursor() {
        Selection::cursor(selection.start + open.len())
    } else {
        Selection::new(selection.start + open.len(), selection.end + open.len())
    };
    Transaction::single(
        TextChange::new(selection.start, selection.end, insert),
        Some(selection_after),
        ChangeOrigin::Command,
        "autopair",
    )
}

fn newline_transaction(snapshot: &EditorSnapshot, unit: usize) -> Transaction {
    let text = &snapshot.text;
    let selection = snapshot.selection.clamp(text.len());
    let ls = line_start(text, selection.start);
    let indent: String = text[ls..selection.start]
        .chars()
        .take_while(|c| *c == ' ' || *c == '\t')
        .collect();

    let mut insert = format!("\n{indent}");
    let opens_block = text[..selection.start]
        .trim_end_matches([' ', '\t'])
        .ends_with(['{', '(', '[']);
    if opens_block {
        insert.push_str(&" ".repeat(unit));
    }
    let caret = selection.start + insert.len();
    Transaction::single(
        TextChange::new(selection.start, selection.end, insert),
        Some(Selection::cursor(caret)),
        ChangeOrigin::Command,
        "newline",
    )
}

/// Expands a completion template: `$N` placeholders are removed, tabs become
/// `unit` spaces. Returns the text and the offset of `$1` (or the end).
pub fn expand_snippet(template: &str, unit: usize) -> (String, usize) {
    let mut out = String::with_capacity(template.len());
    let mut caret = None;
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '$' if chars.peek().is_some_and(|next| next.is_ascii_digit()) => {
                let mut digits = String::new();
                while let Some(d) = chars.peek().copied().filter(char::is_ascii_digit) {
                    digits.push(d);
                    chars.next();
                }
                if digits == "1" && caret.is_none() {
                    caret = Some(out.len());
                }
            }
            '\t' => out.push_str(&" ".repeat(unit)),
            _ => out.push(c),
        }
    }
    let caret = caret.unwrap_or(out.len());
    (out, caret)
}

fn completion_transaction(
    snapshot: &EditorSnapshot,
    entry: HintEntry,
    start: usize,
    unit: usize,
) -> Transaction {
    let selection = snapshot.selection.clamp(snapshot.text.len());
    let start = start.min(selection.start);
    let (insert, caret) = if entry.is_snippet {
        expand_snippet(entry.insert_text, unit)
    } else {
        (entry.insert_text.to_string(), entry.insert_text.len())
    };
    Transaction::single(
        TextChange::new(start, selection.end, insert),
        Some(Selection::cursor(start + caret)),
        ChangeOrigin::Completion,
        "complete",
    )
}

fn indent_or_outdent_transaction(
    snapshot: &EditorSnapshot,
    unit: usize,
    outdent: bool,
) -> Option<Transaction> {
    let text = &snapshot.text;
    let selection = snapshot.selection.clamp(text.len());
    let pad = " ".repeat(unit);

    if selection.is_cursor() {
        if !outdent {
            return Some(Transaction::single(
                TextChange::new(selection.start, selection.end, pad),
                Some(Selection::cursor(selection.start + unit)),
                ChangeOrigin::Command,
                "indent",
            ));
        }

        let ls = line_start(text, selection.start);
        let le = line_end(text, selection.start);
        let line = &text[ls..le];
        let remove = leading_indent(line, unit);
        if remove == 0 {
            return None;
        }
        let cursor_offset = selection.start.saturating_sub(ls);
        let new_cursor = if cursor_offset >= remove {
            selection.start - remove
        } else {
            ls
        };

        return Some(Transaction::single(
            TextChange::new(ls, le, &line[remove..]),
            Some(Selection::cursor(new_cursor)),
            ChangeOrigin::Command,
            "outdent",
        ));
    }

    let block_start = line_start(text, selection.start);
    let block_end = line_end(text, selection.end);
    let block = &text[block_start..block_end];
    let mut transformed = String::new();

    for (idx, line) in block.split('\n').enumerate() {
        if idx > 0 {
            transformed.push('\n');
        }
        if outdent {
            transformed.push_str(&line[leading_indent(line, unit)..]);
        } else {
            transformed.push_str(&pad);
            transformed.push_str(line);
        }
    }

    Some(Transaction::single(
        TextChange::new(block_start, block_end, transformed.clone()),
        Some(Selection::new(block_start, block_start + transformed.len())),
        ChangeOrigin::Command,
        if outdent {
            "outdent-block"
        } else {
            "indent-block"
        },
    ))
}

fn leading_indent(line: &str, unit: usize) -> usize {
    if line.starts_with('\t') {
        1
    } else {
        line.chars().take_while(|c| *c == ' ').take(unit).count()
    }
}

pub fn line_start(text: &str, pos: usize) -> usize {
    let clamped = pos.min(text.len());
    text[..clamped].rfind('\n').map(|i| i + 1).unwrap_or(0)
}

pub fn line_end(text: &str, pos: usize) -> usize {
    let clamped = pos.min(text.len());
    text[clamped..]
        .find('\n')
        .map(|i| clamped + i)
        .unwrap_or(text.len())
}

/// 1-based line number of a byte offset.
pub fn line_of(text: &str, pos: usize) -> usize {
    let clamped = pos.min(text.len());
    text.as_bytes()[..clamped].iter().filter(|b| **b == b'\n').count() + 1
}

/// Byte offset of a UTF-16 offset, as reported by DOM selection APIs.
pub fn byte_offset(text: &str, utf16: usize) -> usize {
    let mut units = 0usize;
    for (i, c) in text.char_indices() {
        if units >= utf16 {
            return i;
        }
        units += c.len_utf16();
    }
    text.len()
}

pub fn utf16_offset(text: &str, byte: usize) -> usize {
    let mut byte = byte.min(text.len());
    while !text.is_char_boundary(byte) {
        byte -= 1;
    }
    text[..byte].encode_utf16().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_between_utf16_and_bytes() {
        let text = "a\u{e9}\u{1f389}b";
        assert_eq!(byte_offset(text, 0), 0);
        assert_eq!(byte_offset(text, 2), 3);
        assert_eq!(byte_offset(text, 4), 7);
        assert_eq!(byte_offset(text, 99), text.len());
        assert_eq!(utf16_offset(text, 7), 4);
        assert_eq!(utf16_offset(text, 3), 2);
    }

    #[test]
    fn applies_multi_change_transaction() {
        let mut snapshot = EditorSnapshot::new("hello world".to_string());
        snapshot.set_selection(Selection::cursor(0));
        let transaction = Transaction {
            changes: vec![TextChange::new(0, 0, "<b>"), TextChange::new(11, 11, "</b>")],
            selection_after: Some(Selection::cursor(14)),
            origin: ChangeOrigin::Command,
            label: "wrap",
        };

        let outcome = snapshot.apply_transaction(transaction).unwrap();
        assert!(outcome.text_changed);
        assert_eq!(snapshot.text, "<b>hello world</b>");
        assert_eq!(snapshot.selection, Selection::cursor(14));
        assert_eq!(snapshot.revision, 1);
    }

    #[test]
    fn rejects_overlapping_changes() {
        let mut snapshot = EditorSnapshot::new("abcdef".to_string());
        let transaction = Transaction {
            changes: vec![TextChange::new(1, 4, "x"), TextChange::new(3, 5, "y")],
            selection_after: None,
            origin: ChangeOrigin::Command,
            label: "bad",
        };
        assert!(matches!(
            snapshot.apply_transaction(transaction),
            Err(CoreError::OverlappingChanges { .. })
        ));
    }

    #[test]
    fn rejects_ranges_inside_a_character() {
        let mut snapshot = EditorSnapshot::new("é".to_string());
        let result = apply_command(
            &mut snapshot,
            EditCommand::Replace {
                start: 1,
                end: 2,
                text: "x",
            },
        );
        assert!(matches!(result, Err(CoreError::InvalidRange { .. })));
        assert_eq!(snapshot.text, "é");
    }

    #[test]
    fn auto_pairs_around_selection() {
        let mut snapshot = EditorSnapshot::new("value".to_string());
        snapshot.set_selection(Selection::new(0, 5));
        let changed = apply_command(
            &mut snapshot,
            EditCommand::AutoPair {
                open: "(",
                close: ")",
            },
        )
        .unwrap();

        assert!(changed);
        assert_eq!(snapshot.text, "(value)");
        assert_eq!(snapshot.selection, Selection::new(1, 6));
    }

    #[test]
    fn newline_keeps_indentation_and_opens_blocks() {
        let mut snapshot = EditorSnapshot::new("  a {".to_string());
        apply_command(&mut snapshot, EditCommand::Newline { unit: 2 }).unwrap();
        assert_eq!(snapshot.text, "  a {\n    ");
        assert_eq!(snapshot.selection, Selection::cursor(snapshot.text.len()));
    }

    #[test]
    fn indents_and_outdents_block() {
        let mut snapshot = EditorSnapshot::new("a\nb".to_string());
        snapshot.set_selection(Selection::new(0, snapshot.text.len()));
        apply_command(&mut snapshot, EditCommand::Indent { unit: 2 }).unwrap();
        assert_eq!(snapshot.text, "  a\n  b");

        snapshot.set_selection(Selection::new(0, snapshot.text.len()));
        apply_command(&mut snapshot, EditCommand::Outdent { unit: 2 }).unwrap();
        assert_eq!(snapshot.text, "a\nb");
    }

    #[test]
    fn outdent_without_indent_is_a_no_op() {
        let mut snapshot = EditorSnapshot::new("a".to_string());
        let changed = apply_command(&mut snapshot, EditCommand::Outdent { unit: 2 }).unwrap();
        assert!(!changed);
    }

    #[test]
    fn completes_plain_word() {
        let mut snapshot = EditorSnapshot::new("<sec".to_string());
        let changed = apply_command(
            &mut snapshot,
            EditCommand::Complete {
                entry: HintEntry::word("section"),
                start: 1,
                unit: 2,
            },
        )
        .unwrap();
        assert!(changed);
        assert_eq!(snapshot.text, "<section");
        assert_eq!(snapshot.selection, Selection::cursor(8));
    }

    #[test]
    fn completes_snippet_with_caret_on_first_placeholder() {
        let mut snapshot = EditorSnapshot::new("fu".to_string());
        apply_command(
            &mut snapshot,
            EditCommand::Complete {
                entry: HintEntry::snippet("fun", "function $1($2) {\n\t$3\n}"),
                start: 0,
                unit: 2,
            },
        )
        .unwrap();
        assert_eq!(snapshot.text, "function () {\n  \n}");
        assert_eq!(snapshot.selection, Selection::cursor("function ".len()));
    }

    #[test]
    fn expands_snippet_without_placeholders() {
        assert_eq!(expand_snippet("a\tb", 4), ("a    b".to_string(), 6));
        assert_eq!(expand_snippet("x$1y$10", 2), ("xy".to_string(), 1));
    }

    #[test]
    fn counts_lines() {
        assert_eq!(line_of("a\nb\nc", 0), 1);
        assert_eq!(line_of("a\nb\nc", 2), 2);
        assert_eq!(line_of("a\nb\nc", 99), 3);
    }
}
