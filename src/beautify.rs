//! Formatting through the js-beautify functions loaded by the page.

use serde::Serialize;
use thiserror::Error;
use wasm_bindgen::prelude::*;

use crate::bundle::Language;

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(catch, js_name = html_beautify)]
    fn html_beautify(source: &str, options: JsValue) -> Result<String, JsValue>;
    #[wasm_bindgen(catch, js_name = css_beautify)]
    fn css_beautify(source: &str, options: JsValue) -> Result<String, JsValue>;
    #[wasm_bindgen(catch, js_name = js_beautify)]
    fn js_beautify(source: &str, options: JsValue) -> Result<String, JsValue>;
}

#[derive(Debug, Error)]
pub enum BeautifyError {
    #[error("could not pass options to the formatter: {0}")]
    Options(String),
    #[error("formatter failed: {0}")]
    Formatter(String),
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct BeautifyOptions {
    pub indent_size: usize,
    pub indent_char: &'static str,
    pub max_preserve_newlines: usize,
    pub preserve_newlines: bool,
    pub keep_array_indentation: bool,
    pub break_chained_methods: bool,
    pub indent_scripts: &'static str,
    pub brace_style: &'static str,
    pub space_before_conditional: bool,
    pub unescape_strings: bool,
    pub jslint_happy: bool,
    pub end_with_newline: bool,
    pub wrap_line_length: usize,
    pub indent_empty_lines: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unformatted: Option<Vec<&'static str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub space_after_anon_function: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub space_after_named_function: Option<bool>,
}

impl BeautifyOptions {
    pub fn for_language(language: Language, indent_size: usize) -> Self {
        let mut options = Self {
            indent_size,
            indent_char: " ",
            max_preserve_newlines: 2,
            preserve_newlines: true,
            keep_array_indentation: false,
            break_chained_methods: false,
            indent_scripts: "normal",
            brace_style: "collapse",
            space_before_conditional: true,
            unescape_strings: false,
            jslint_happy: false,
            end_with_newline: false,
            wrap_line_length: 0,
            indent_empty_lines: false,
            unformatted: None,
            space_after_anon_function: None,
            space_after_named_function: None,
        };
        match language {
            Language::Markup => {
                options.unformatted = Some(vec!["code", "pre", "em", "strong", "span"]);
            }
            Language::Styles => {}
            Language::Script => {
                options.space_after_anon_function = Some(true);
                options.space_after_named_function = Some(true);
            }
        }
        options
    }
}

fn describe(err: JsValue) -> String {
    err.as_string()
        .or_else(|| {
            js_sys::Reflect::get(&err, &JsValue::from_str("message"))
                .ok()
                .and_then(|message| message.as_string())
        })
        .unwrap_or_else(|| "unknown error".to_string())
}

/// Formats `source` with the formatter for `language`.
pub fn beautify(
    language: Language,
    source: &str,
    indent_size: usize,
) -> Result<String, BeautifyError> {
    let options = BeautifyOptions::for_language(language, indent_size);
    let options = serde_wasm_bindgen::to_value(&options)
        .map_err(|err| BeautifyError::Options(err.to_string()))?;
    let formatted = match language {
        Language::Markup => html_beautify(source, options),
        Language::Styles => css_beautify(source, options),
        Language::Script => js_beautify(source, options),
    };
    formatted.map_err(|err| BeautifyError::Formatter(describe(err)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markup_keeps_inline_elements_unformatted() {
        let options = BeautifyOptions::for_language(Language::Markup, 4);
        let value = serde_json::to_value(&options).unwrap();
        assert_eq!(value["indent_size"], 4);
        assert_eq!(value["brace_style"], "collapse");
        assert_eq!(
            value["unformatted"],
            serde_json::json!(["code", "pre", "em", "strong", "span"])
        );
        assert!(value.get("space_after_anon_function").is_none());
    }

    #[test]
    fn script_adds_function_spacing() {
        let value =
            serde_json::to_value(BeautifyOptions::for_language(Language::Script, 2)).unwrap();
        assert_eq!(value["indent_size"], 2);
        assert_eq!(value["space_after_anon_function"], true);
        assert_eq!(value["space_after_named_function"], true);
        assert!(value.get("unformatted").is_none());
    }

    #[test]
    fn styles_use_base_options() {
        let value =
            serde_json::to_value(BeautifyOptions::for_language(Language::Styles, 4)).unwrap();
        assert_eq!(value["preserve_newlines"], true);
        assert_eq!(value["max_preserve_newlines"], 2);
        assert!(value.get("unformatted").is_none());
    }
}
