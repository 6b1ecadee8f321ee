use std::sync::OnceLock;

use crate::bundle::Language;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HintEntry {
    pub key: &'static str,
    pub insert_text: &'static str,
    pub is_snippet: bool,
}

impl HintEntry {
    pub const fn word(key: &'static str) -> Self {
        Self {
            key,
            insert_text: key,
            is_snippet: false,
        }
    }

    pub const fn snippet(key: &'static str, template: &'static str) -> Self {
        Self {
            key,
            insert_text: template,
            is_snippet: true,
        }
    }

    pub fn display_label(&self) -> String {
        if self.is_snippet {
            format!("{} (snippet)", self.key)
        } else {
            self.key.to_string()
        }
    }
}

const HTML_TAGS: &[&str] = &[
    "div", "span", "p", "h1", "h2", "h3", "h4", "h5", "h6", "section", "article", "nav",
    "header", "footer", "main", "aside", "form", "input", "button", "select", "option",
    "textarea", "label", "img", "video", "audio", "source", "canvas", "table", "tr", "td", "th",
    "thead", "tbody", "ul", "ol", "li", "a", "link", "script", "style",
];

const HTML_ATTRIBUTES: &[&str] = &[
    "class", "id", "style", "href", "src", "alt", "title", "type", "value", "placeholder",
    "name", "required", "disabled", "checked", "selected", "readonly", "maxlength", "min", "max",
    "pattern", "target", "rel", "download", "width", "height", "data-*", "aria-*",
];

const CSS_PROPERTIES: &[&str] = &[
    "display", "position", "top", "right", "bottom", "left", "margin", "padding", "width",
    "height", "background", "color", "font-size", "font-weight", "font-family", "border",
    "border-radius", "box-shadow", "text-align", "flex", "grid", "transform", "transition",
    "animation", "opacity", "z-index", "overflow", "cursor", "content",
];

const CSS_VALUES: &[&str] = &[
    "flex", "grid", "block", "inline", "none", "hidden", "absolute", "relative", "fixed",
    "sticky", "auto", "center", "left", "right", "justify", "space-between", "cover", "contain",
    "repeat", "no-repeat", "pointer", "bold", "normal", "italic", "underline", "uppercase",
];

const CSS_UNITS: &[&str] = &["px", "em", "rem", "%", "vh", "vw", "deg", "s", "ms"];

const CSS_COLORS: &[&str] = &[
    "red", "blue", "green", "yellow", "purple", "orange", "black", "white", "gray",
    "transparent", "currentColor",
];

const JS_KEYWORDS: &[&str] = &[
    "function", "const", "let", "var", "if", "else", "for", "while", "do", "switch", "case",
    "break", "continue", "return", "try", "catch", "finally", "throw", "class", "extends", "new",
    "this", "super", "import", "export",
];

const JS_FUNCTIONS: &[&str] = &[
    "querySelector",
    "querySelectorAll",
    "getElementById",
    "getElementsByClassName",
    "getElementsByTagName",
    "addEventListener",
    "removeEventListener",
    "setTimeout",
    "setInterval",
    "clearTimeout",
    "clearInterval",
    "fetch",
    "console.log",
    "console.error",
    "console.warn",
    "alert",
];

const JS_SNIPPETS: &[HintEntry] = &[
    HintEntry::snippet("log", "console.log($1);"),
    HintEntry::snippet("ael", "addEventListener(\"$1\", ($2) => {\n\t$3\n});"),
    HintEntry::snippet("fun", "function $1($2) {\n\t$3\n}"),
    HintEntry::snippet("afun", "($1) => {\n\t$2\n}"),
    HintEntry::snippet("if", "if ($1) {\n\t$2\n}"),
    HintEntry::snippet("for", "for (let i = 0; i < $1; i++) {\n\t$2\n}"),
    HintEntry::snippet("forin", "for (const key in $1) {\n\t$2\n}"),
    HintEntry::snippet("forof", "for (const item of $1) {\n\t$2\n}"),
    HintEntry::snippet(
        "fetch",
        "fetch(\"$1\")\n\t.then(response => response.json())\n\t.then(data => {\n\t\t$2\n\t})\n\t.catch(error => console.error(error));",
    ),
];

fn words(groups: &[&[&'static str]]) -> Vec<HintEntry> {
    groups
        .iter()
        .flat_map(|group| group.iter().copied().map(HintEntry::word))
        .collect()
}

/// The completion table for a language, in presentation order.
pub fn table(language: Language) -> &'static [HintEntry] {
    static MARKUP: OnceLock<Vec<HintEntry>> = OnceLock::new();
    static STYLES: OnceLock<Vec<HintEntry>> = OnceLock::new();
    static SCRIPT: OnceLock<Vec<HintEntry>> = OnceLock::new();

    match language {
        Language::Markup => MARKUP.get_or_init(|| words(&[HTML_TAGS, HTML_ATTRIBUTES])),
        Language::Styles => {
            STYLES.get_or_init(|| words(&[CSS_PROPERTIES, CSS_VALUES, CSS_UNITS, CSS_COLORS]))
        }
        Language::Script => SCRIPT.get_or_init(|| {
            let mut entries = words(&[JS_KEYWORDS, JS_FUNCTIONS]);
            entries.extend_from_slice(JS_SNIPPETS);
            entries
        }),
    }
}

/// Entries whose key starts with `prefix`, ignoring case, in table order.
pub fn filter(hints: &[HintEntry], prefix: &str) -> Vec<HintEntry> {
    let prefix = prefix.to_lowercase();
    hints
        .iter()
        .filter(|entry| entry.key.to_lowercase().starts_with(&prefix))
        .copied()
        .collect()
}

fn is_prefix_char(language: Language, c: char) -> bool {
    if c.is_alphanumeric() || c == '_' {
        return true;
    }
    match language {
        Language::Markup => c == '-' || c == '*',
        Language::Styles => c == '-' || c == '%',
        Language::Script => c == '$' || c == '.',
    }
}

/// Byte offset where the completion prefix ending at `cursor` starts.
pub fn prefix_start(text: &str, cursor: usize, language: Language) -> usize {
    let cursor = floor_char_boundary(text, cursor);
    text[..cursor]
        .char_indices()
        .rev()
        .take_while(|(_, c)| is_prefix_char(language, *c))
        .last()
        .map(|(i, _)| i)
        .unwrap_or(cursor)
}

pub fn prefix_at(text: &str, cursor: usize, language: Language) -> &str {
    let cursor = floor_char_boundary(text, cursor);
    &text[prefix_start(text, cursor, language)..cursor]
}

/// Suggestions for the word in front of the cursor; empty when there is no word.
pub fn suggest(text: &str, cursor: usize, language: Language) -> Vec<HintEntry> {
    let prefix = prefix_at(text, cursor, language);
    if prefix.is_empty() {
        return Vec::new();
    }
    filter(table(language), prefix)
}

fn floor_char_boundary(text: &str, pos: usize) -> usize {
    let mut pos = pos.min(text.len());
    while !text.is_char_boundary(pos) {
        pos -= 1;
    }
    pos
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_prefix_returns_everything() {
        let all = table(Language::Styles);
        assert_eq!(filter(all, ""), all.to_vec());
    }

    #[test]
    fn filter_is_case_insensitive_and_ordered() {
        let found = filter(table(Language::Styles), "CU");
        let keys: Vec<_> = found.iter().map(|e| e.key).collect();
        assert_eq!(keys, vec!["cursor", "currentColor"]);

        let upper = filter(table(Language::Script), "get");
        let keys: Vec<_> = upper.iter().map(|e| e.key).collect();
        assert_eq!(
            keys,
            vec![
                "getElementById",
                "getElementsByClassName",
                "getElementsByTagName"
            ]
        );
    }

    #[test]
    fn every_result_matches_prefix_in_source_order() {
        for language in Language::ALL {
            let source = table(language);
            for prefix in ["a", "Co", "for", "data", "zz", "-"] {
                let found = filter(source, prefix);
                let mut last = 0;
                for entry in &found {
                    assert!(entry
                        .key
                        .to_lowercase()
                        .starts_with(&prefix.to_lowercase()));
                    let index = source
                        .iter()
                        .enumerate()
                        .skip(last)
                        .find(|(_, e)| *e == entry)
                        .map(|(i, _)| i)
                        .expect("entry comes from the source table");
                    last = index + 1;
                }
            }
        }
    }

    #[test]
    fn snippets_keep_duplicate_keywords() {
        let found = filter(table(Language::Script), "for");
        let labels: Vec<_> = found.iter().map(|e| e.display_label()).collect();
        assert_eq!(
            labels,
            vec!["for", "for (snippet)", "forin (snippet)", "forof (snippet)"]
        );
        assert!(found[1].insert_text.contains("$1"));
    }

    #[test]
    fn no_match_is_empty() {
        assert!(filter(table(Language::Markup), "zzz").is_empty());
    }

    #[test]
    fn prefix_respects_language_characters() {
        let text = "document.body; console.lo";
        assert_eq!(prefix_at(text, text.len(), Language::Script), "console.lo");
        let css = "a { font-we";
        assert_eq!(prefix_at(css, css.len(), Language::Styles), "font-we");
        let html = "<sec";
        assert_eq!(prefix_at(html, html.len(), Language::Markup), "sec");
        assert_eq!(prefix_at("a ", 2, Language::Markup), "");
    }

    #[test]
    fn suggest_needs_a_prefix() {
        assert!(suggest("p ", 2, Language::Markup).is_empty());
        let found = suggest("<na", 3, Language::Markup);
        assert_eq!(found.iter().map(|e| e.key).collect::<Vec<_>>(), vec!["nav", "name"]);
    }
}
