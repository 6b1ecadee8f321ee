use serde::{Deserialize, Serialize};

/// The three editable sources of a playground session.
///
/// Stored under the legacy `html`/`css`/`js` field names so payloads written
/// by earlier builds keep loading.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SourceBundle {
    #[serde(rename = "html")]
    pub markup: String,
    #[serde(rename = "css")]
    pub styles: String,
    #[serde(rename = "js")]
    pub script: String,
}

impl SourceBundle {
    pub fn new(
        markup: impl Into<String>,
        styles: impl Into<String>,
        script: impl Into<String>,
    ) -> Self {
        Self {
            markup: markup.into(),
            styles: styles.into(),
            script: script.into(),
        }
    }

    pub fn get(&self, language: Language) -> &str {
        match language {
            Language::Markup => &self.markup,
            Language::Styles => &self.styles,
            Language::Script => &self.script,
        }
    }

    pub fn set(&mut self, language: Language, text: String) {
        match language {
            Language::Markup => self.markup = text,
            Language::Styles => self.styles = text,
            Language::Script => self.script = text,
        }
    }

    pub fn is_blank(&self) -> bool {
        Language::ALL
            .iter()
            .all(|language| self.get(*language).trim().is_empty())
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Markup,
    Styles,
    Script,
}

impl Language {
    pub const ALL: [Language; 3] = [Language::Markup, Language::Styles, Language::Script];

    pub fn label(self) -> &'static str {
        match self {
            Language::Markup => "HTML",
            Language::Styles => "CSS",
            Language::Script => "JavaScript",
        }
    }

    /// Short id used for DOM ids and tab data attributes.
    pub fn id(self) -> &'static str {
        match self {
            Language::Markup => "html",
            Language::Styles => "css",
            Language::Script => "js",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_and_set_dispatch_by_language() {
        let mut bundle = SourceBundle::default();
        bundle.set(Language::Styles, "a{}".to_string());
        assert_eq!(bundle.get(Language::Styles), "a{}");
        assert_eq!(bundle.get(Language::Markup), "");
        assert!(!bundle.is_blank());
    }

    #[test]
    fn whitespace_only_bundle_is_blank() {
        let bundle = SourceBundle::new("  \n", "\t", "");
        assert!(bundle.is_blank());
    }

    #[test]
    fn serializes_with_stored_field_names() {
        let bundle = SourceBundle::new("<p>", "p{}", "x()");
        let json = serde_json::to_string(&bundle).unwrap();
        assert_eq!(json, r#"{"html":"<p>","css":"p{}","js":"x()"}"#);
    }
}
