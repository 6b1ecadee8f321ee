use std::cell::RefCell;
use std::rc::Rc;

use codepane::bundle::{Language, SourceBundle};
use codepane::check::{self, ErrorChecker};
use codepane::color;
use codepane::debounce::{Debouncer, TimerDriver};
use codepane::editor_core::{self, EditCommand, EditorSnapshot, Selection};
use codepane::export;
use codepane::hints;
use codepane::preview;
use codepane::storage::{MemoryStore, PersistenceStore};

#[test]
fn filter_keeps_prefix_matches_in_table_order() {
    for language in Language::ALL {
        let table = hints::table(language);
        for prefix in ["", "a", "B", "co", "fOr", "zzz", "-"] {
            let found = hints::filter(table, prefix);
            let lowered = prefix.to_lowercase();
            assert!(found
                .iter()
                .all(|entry| entry.key.to_lowercase().starts_with(&lowered)));

            let positions: Vec<usize> = found
                .iter()
                .map(|entry| table.iter().position(|candidate| candidate == entry).unwrap())
                .collect();
            assert!(positions.windows(2).all(|pair| pair[0] < pair[1]));
        }
    }
}

#[test]
fn render_is_pure_and_passes_sources_through() {
    let bundle = SourceBundle::new(
        "<section><p>unbalanced",
        "p { color: rebeccapurple; }",
        "function( {",
    );
    let first = preview::render(&bundle);
    assert_eq!(first, preview::render(&bundle));
    assert!(first.contains("<section><p>unbalanced"));
    assert!(first.contains("function( {"));

    let reset = first.find("box-sizing: border-box").unwrap();
    let styles = first.find("rebeccapurple").unwrap();
    assert!(reset < styles);
}

#[test]
fn saved_bundles_load_back_unchanged() {
    let store = PersistenceStore::new(MemoryStore::default());
    for bundle in [
        SourceBundle::default(),
        SourceBundle::new("<p>plain</p>", "body {}", "let x = 1;"),
        SourceBundle::new("<p>\u{00fc}ber \"quoted\"</p>\n", "/* \u{65e5}\u{672c} */", "`a\nb`"),
    ] {
        store.save(&bundle).unwrap();
        assert_eq!(store.load().unwrap(), bundle);
    }
}

#[test]
fn checking_twice_gives_the_same_diagnostics() {
    let bundle = SourceBundle::new("<ul><li>one", "a { color }", "if (x {");
    let checker = ErrorChecker::default();
    let first = checker.check(&bundle);
    assert_eq!(first, checker.check(&bundle));
    assert_eq!(first.len(), 3);
}

#[test]
fn reports_one_diagnostic_per_broken_language() {
    let markup = check::check(&SourceBundle::new("<div>", "", ""));
    assert_eq!(markup.len(), 1);
    assert_eq!(markup[0].language, Language::Markup);

    let styles = check::check(&SourceBundle::new("<div></div>", "color: ;", ""));
    assert_eq!(styles.len(), 1);
    assert_eq!(styles[0].language, Language::Styles);

    let script = check::check(&SourceBundle::new("", "", "function("));
    assert_eq!(script.len(), 1);
    assert_eq!(script[0].language, Language::Script);
    assert_eq!(script[0].line, 1);

    assert!(check::check(&SourceBundle::new(
        "<div><p>ok</p></div>",
        "p { color: red; }",
        "console.log('ok');"
    ))
    .is_empty());
}

#[test]
fn classifies_color_tokens() {
    for token in ["#fff", "#112233", "red", "rgb(1,2,3)", "hsla(0,0%,0%,1)"] {
        assert!(color::is_color_token(token), "{token}");
    }
    for token in ["42px", "auto"] {
        assert!(!color::is_color_token(token), "{token}");
    }
}

#[test]
fn picker_replaces_the_color_under_the_cursor() {
    let css = "a { color: rgb(255, 0, 0); }";
    let cursor = css.find("255").unwrap();
    let (start, end) = color::color_token_at(css, cursor).unwrap();
    assert_eq!(&css[start..end], "rgb(255, 0, 0)");
    assert_eq!(color::to_hex(&css[start..end]).as_deref(), Some("#ff0000"));

    let mut snapshot = EditorSnapshot::new(css.to_string());
    snapshot.set_selection(Selection::cursor(cursor));
    editor_core::apply_command(
        &mut snapshot,
        EditCommand::Replace {
            start,
            end,
            text: "#00ff00",
        },
    )
    .unwrap();
    assert_eq!(snapshot.text, "a { color: #00ff00; }");
}

#[test]
fn completing_a_snippet_leaves_the_caret_inside() {
    let text = "fu";
    let suggestions = hints::suggest(text, text.len(), Language::Script);
    let entry = *suggestions.iter().find(|entry| entry.key == "fun").unwrap();

    let mut snapshot = EditorSnapshot::new(text.to_string());
    let start = hints::prefix_start(text, text.len(), Language::Script);
    editor_core::apply_command(&mut snapshot, EditCommand::Complete { entry, start, unit: 2 })
        .unwrap();
    assert!(snapshot.text.starts_with("function "));
    assert!(snapshot.selection.is_cursor());
    assert_eq!(&snapshot.text[..snapshot.selection.start], "function ");
}

#[test]
fn exports_follow_the_edited_bundle() {
    let bundle = SourceBundle::new("<p>hi</p>", "", "");
    let files = export::export_files(&bundle);
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].name, "index.html");
    assert_eq!(export::summary(files.len()), "1 file downloaded successfully!");
}

#[derive(Default)]
struct StepTimers {
    queue: Rc<RefCell<Vec<(u64, Option<Box<dyn FnOnce()>>)>>>,
    now: Rc<RefCell<u64>>,
}

struct StepHandle {
    index: usize,
    queue: Rc<RefCell<Vec<(u64, Option<Box<dyn FnOnce()>>)>>>,
}

impl Drop for StepHandle {
    fn drop(&mut self) {
        if let Ok(mut queue) = self.queue.try_borrow_mut() {
            queue[self.index].1 = None;
        }
    }
}

impl TimerDriver for StepTimers {
    type Handle = StepHandle;

    fn schedule(&self, delay_ms: u32, callback: Box<dyn FnOnce()>) -> StepHandle {
        let due = *self.now.borrow() + u64::from(delay_ms);
        let mut queue = self.queue.borrow_mut();
        queue.push((due, Some(callback)));
        StepHandle {
            index: queue.len() - 1,
            queue: self.queue.clone(),
        }
    }
}

fn advance(queue: &Rc<RefCell<Vec<(u64, Option<Box<dyn FnOnce()>>)>>>, now: &Rc<RefCell<u64>>, to: u64) {
    *now.borrow_mut() = to;
    loop {
        let ready = {
            let mut queue = queue.borrow_mut();
            queue
                .iter_mut()
                .find(|(due, callback)| *due <= to && callback.is_some())
                .and_then(|(_, callback)| callback.take())
        };
        match ready {
            Some(callback) => callback(),
            None => break,
        }
    }
}

#[test]
fn edits_in_a_burst_refresh_once_with_the_last_state() {
    let timers = StepTimers::default();
    let queue = timers.queue.clone();
    let now = timers.now.clone();

    let renders = Rc::new(RefCell::new(Vec::<(u64, String)>::new()));
    let seen = renders.clone();
    let clock = now.clone();
    let debouncer = Debouncer::new(timers, 200, move |bundle: SourceBundle| {
        seen.borrow_mut()
            .push((*clock.borrow(), preview::render(&bundle)));
    });

    for (at, markup) in [(0, "<p>a"), (50, "<p>ab"), (100, "<p>abc</p>")] {
        advance(&queue, &now, at);
        debouncer.call(SourceBundle::new(markup, "", ""));
    }
    advance(&queue, &now, 299);
    assert!(renders.borrow().is_empty());
    advance(&queue, &now, 300);

    let renders = renders.borrow();
    assert_eq!(renders.len(), 1);
    assert_eq!(renders[0].0, 300);
    assert!(renders[0].1.contains("<p>abc</p>"));
}
