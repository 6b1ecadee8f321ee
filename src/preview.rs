//! Composes the preview document from a [`SourceBundle`].
//!
//! The output is a pure function of the bundle: no timestamps, no ids. User
//! sources are embedded verbatim; nothing here validates them.

use crate::bundle::SourceBundle;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PreviewTarget {
    /// The sandboxed frame next to the editors. Links open in a new tab.
    Frame,
    /// A standalone page opened in its own tab.
    Standalone,
}

const RESET_CSS: &str = "* {\n  margin: 0;\n  padding: 0;\n  box-sizing: border-box;\n}\n";

const BANNER_STYLE: &str = "position:fixed;bottom:0;left:0;right:0;padding:10px;\
background:#ff5555;color:white;font-family:monospace;z-index:9999;white-space:pre-wrap;";

/// Renders the frame document.
pub fn render(bundle: &SourceBundle) -> String {
    render_for(bundle, PreviewTarget::Frame)
}

pub fn render_for(bundle: &SourceBundle, target: PreviewTarget) -> String {
    let mut doc = String::with_capacity(
        bundle.markup.len() + bundle.styles.len() + bundle.script.len() + 2048,
    );
    let prelude = script_prelude();
    doc.push_str(&document_head(bundle, target));
    let offset = count_lines(&doc) + count_lines(&prelude);
    doc.push_str(&prelude.replace("__SCRIPT_OFFSET__", &offset.to_string()));
    doc.push_str(&bundle.script);
    doc.push_str("\n})();\n} catch (error) {\n  __reportError(error && error.message ? error.message : String(error), __lineOf(error));\n}\n");
    doc.push_str("</script>\n</body>\n</html>\n");
    doc
}

/// 0-based document line where the user script starts in [`render_for`]
/// output. The reporter subtracts it to map document lines back to script
/// lines.
pub fn script_offset(bundle: &SourceBundle, target: PreviewTarget) -> usize {
    count_lines(&document_head(bundle, target)) + count_lines(&script_prelude())
}

/// Everything up to and including the opening `<script>` line.
fn document_head(bundle: &SourceBundle, target: PreviewTarget) -> String {
    let mut head = String::with_capacity(bundle.markup.len() + bundle.styles.len() + 512);
    head.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"UTF-8\">\n");
    head.push_str(
        "<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n",
    );
    match target {
        PreviewTarget::Frame => head.push_str("<base target=\"_blank\">\n"),
        PreviewTarget::Standalone => head.push_str("<title>Preview</title>\n"),
    }
    head.push_str("<style>\n");
    head.push_str(RESET_CSS);
    head.push_str(&bundle.styles);
    head.push_str("\n</style>\n</head>\n<body>\n");
    head.push_str(&bundle.markup);
    head.push_str("\n<script>\n");
    head
}

/// Reporter plus the wrapper opening, with `__SCRIPT_OFFSET__` still unset.
fn script_prelude() -> String {
    let mut prelude = error_reporter_js();
    prelude.push_str("try {\n(function() {\n");
    prelude
}

fn count_lines(text: &str) -> usize {
    text.bytes().filter(|b| *b == b'\n').count()
}

fn error_reporter_js() -> String {
    format!(
        r#"var __SCRIPT_OFFSET = __SCRIPT_OFFSET__;
function __reportError(message, line) {{
  console.error('JavaScript Error:', message);
  var banner = document.createElement('div');
  banner.className = 'playground-error';
  banner.style.cssText = '{BANNER_STYLE}';
  banner.textContent = 'JavaScript Error: ' + message + (line > 0 ? ' (Line: ' + line + ')' : '');
  (document.body || document.documentElement).appendChild(banner);
}}
function __lineOf(error) {{
  var found = error && error.stack ? /about:srcdoc:(\d+)/.exec(error.stack) : null;
  var line = found ? parseInt(found[1], 10) : (error && error.lineNumber) || 0;
  return line > 0 ? line - __SCRIPT_OFFSET : 0;
}}
window.addEventListener('error', function(event) {{
  var line = event.lineno > 0 ? event.lineno - __SCRIPT_OFFSET : 0;
  __reportError(event.message, line);
}});
window.addEventListener('unhandledrejection', function(event) {{
  var reason = event.reason;
  __reportError(reason && reason.message ? reason.message : String(reason), __lineOf(reason));
}});
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bundle() -> SourceBundle {
        SourceBundle::new(
            "<h1>Hi</h1>",
            "h1 { color: red; }",
            "document.querySelector('h1').textContent = 'Hello';",
        )
    }

    #[test]
    fn render_is_deterministic() {
        let b = bundle();
        assert_eq!(render(&b), render(&b));
    }

    #[test]
    fn reset_precedes_user_styles() {
        let doc = render(&bundle());
        let reset = doc.find("box-sizing: border-box").unwrap();
        let user = doc.find("h1 { color: red; }").unwrap();
        assert!(reset < user);
    }

    #[test]
    fn markup_and_script_are_embedded_verbatim() {
        let b = SourceBundle::new("<div><span>", "", "function(");
        let doc = render(&b);
        let body = doc.find("<body>").unwrap();
        assert!(doc[body..].contains("<div><span>"));
        assert!(doc.contains("(function() {\nfunction(\n})();"));
        assert!(doc.contains("window.addEventListener('error'"));
        assert!(doc.contains("} catch (error) {"));
    }

    #[test]
    fn offset_points_at_first_script_line() {
        let b = SourceBundle::new("<p>\n</p>", "a{}\nb{}", "let marker = 1;\nnext();");
        for target in [PreviewTarget::Frame, PreviewTarget::Standalone] {
            let doc = render_for(&b, target);
            let offset = script_offset(&b, target);
            assert_eq!(doc.lines().nth(offset), Some("let marker = 1;"));
            assert!(doc.contains(&format!("var __SCRIPT_OFFSET = {offset};")));
        }
    }

    #[test]
    fn offset_ignores_lookalike_text_in_user_sources() {
        let b = SourceBundle::new(
            "<pre>var __SCRIPT_OFFSET = 99;</pre>\n<script>\nvar __SCRIPT_OFFSET = 7;\n</script>",
            "/* var __SCRIPT_OFFSET = 3; */",
            "let marker = 'var __SCRIPT_OFFSET = 1;';",
        );
        let doc = render(&b);
        let offset = script_offset(&b, PreviewTarget::Frame);
        assert_eq!(
            doc.lines().nth(offset),
            Some("let marker = 'var __SCRIPT_OFFSET = 1;';")
        );
    }

    #[test]
    fn targets_differ_only_in_head() {
        let b = bundle();
        let frame = render_for(&b, PreviewTarget::Frame);
        let page = render_for(&b, PreviewTarget::Standalone);
        assert!(frame.contains("<base target=\"_blank\">"));
        assert!(!frame.contains("<title>"));
        assert!(page.contains("<title>Preview</title>"));
        assert!(!page.contains("<base"));
    }

    #[test]
    fn empty_bundle_still_renders_a_document() {
        let doc = render(&SourceBundle::default());
        assert!(doc.starts_with("<!DOCTYPE html>"));
        assert!(doc.ends_with("</html>\n"));
    }
}
