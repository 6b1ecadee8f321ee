use leptos::html;
use leptos::prelude::*;
use leptos::web_sys;
use wasm_bindgen::prelude::*;

use crate::beautify;
use crate::bundle::{Language, SourceBundle};
use crate::check::{self, Diagnostic, ErrorChecker, SyntaxScanner};
use crate::color;
use crate::debounce::{Debouncer, GlooTimers};
use crate::editor_core::{self, EditCommand, EditorSnapshot, Selection};
use crate::export;
use crate::hints::{self, HintEntry};
use crate::preview::{self, PreviewTarget};
use crate::settings::{ScriptCheck, Settings};
use crate::storage::{LocalStore, PersistenceStore, StorageError};

/// Visible time of a notification, fade included.
const NOTICE_MS: u32 = 2_300;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum NoticeKind {
    Success,
    Info,
    Warning,
    Error,
}

impl NoticeKind {
    fn background(self) -> &'static str {
        match self {
            NoticeKind::Success => "#2e7d32",
            NoticeKind::Info => "#1565c0",
            NoticeKind::Warning => "#ef6c00",
            NoticeKind::Error => "#c62828",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
struct Notice {
    id: u64,
    message: String,
    kind: NoticeKind,
}

fn checker_for(mode: ScriptCheck) -> ErrorChecker {
    match mode {
        ScriptCheck::Scanner => ErrorChecker::with_compiler(Box::new(SyntaxScanner)),
        #[cfg(target_arch = "wasm32")]
        ScriptCheck::Engine => ErrorChecker::with_compiler(Box::new(check::EngineCompiler)),
        #[cfg(not(target_arch = "wasm32"))]
        ScriptCheck::Engine => ErrorChecker::default(),
    }
}

fn persistence() -> PersistenceStore<LocalStore> {
    PersistenceStore::new(LocalStore)
}

/// Closing half for keys that auto-pair.
fn pair_for(key: &str) -> Option<(&'static str, &'static str)> {
    match key {
        "(" => Some(("(", ")")),
        "[" => Some(("[", "]")),
        "{" => Some(("{", "}")),
        "\"" => Some(("\"", "\"")),
        "'" => Some(("'", "'")),
        "`" => Some(("`", "`")),
        _ => None,
    }
}

fn is_closer(key: &str) -> bool {
    matches!(key, ")" | "]" | "}" | "\"" | "'" | "`")
}

fn read_snapshot(el: &web_sys::HtmlTextAreaElement) -> EditorSnapshot {
    let text = el.value();
    let start = el.selection_start().ok().flatten().unwrap_or(0) as usize;
    let end = el.selection_end().ok().flatten().unwrap_or(0) as usize;
    let selection = Selection::new(
        editor_core::byte_offset(&text, start),
        editor_core::byte_offset(&text, end),
    );
    let mut snapshot = EditorSnapshot::new(text);
    snapshot.set_selection(selection);
    snapshot
}

fn place_caret(el: &web_sys::HtmlTextAreaElement, text: &str, selection: Selection) {
    let start = editor_core::utf16_offset(text, selection.start) as u32;
    let end = editor_core::utf16_offset(text, selection.end) as u32;
    let _ = el.set_selection_range(start, end);
}

fn open_in_new_tab(document: &str) -> Result<(), JsValue> {
    let parts = js_sys::Array::of1(&JsValue::from_str(document));
    let options = web_sys::BlobPropertyBag::new();
    options.set_type("text/html");
    let blob = web_sys::Blob::new_with_str_sequence_and_options(&parts, &options)?;
    let url = web_sys::Url::create_object_url_with_blob(&blob)?;
    window().open_with_url_and_target(&url, "_blank")?;
    // The new tab needs the URL until it has loaded.
    gloo::timers::callback::Timeout::new(60_000, move || {
        let _ = web_sys::Url::revoke_object_url(&url);
    })
    .forget();
    Ok(())
}

#[component]
pub fn App() -> impl IntoView {
    let initial_settings = Settings::load(&LocalStore);
    let (settings, set_settings) = signal(initial_settings.clone());

    let (notices, set_notices) = signal(Vec::<Notice>::new());
    let next_notice = StoredValue::new(0u64);
    let notify = move |message: String, kind: NoticeKind| {
        let id = next_notice.get_value();
        next_notice.set_value(id + 1);
        set_notices.update(|list| list.push(Notice { id, message, kind }));
        gloo::timers::callback::Timeout::new(NOTICE_MS, move || {
            set_notices.update(|list| list.retain(|notice| notice.id != id));
        })
        .forget();
    };

    let (loaded, load_notice) = match persistence().load() {
        Ok(bundle) => (
            bundle,
            Some(("Code loaded successfully!".to_string(), NoticeKind::Success)),
        ),
        Err(StorageError::Missing(_)) => (SourceBundle::default(), None),
        Err(err) => {
            log::warn!("could not load saved code: {err}");
            (
                SourceBundle::default(),
                Some((format!("Failed to load saved code: {err}"), NoticeKind::Error)),
            )
        }
    };

    let (bundle, set_bundle) = signal(loaded);
    let (active, set_active) = signal(Language::Markup);
    let (diagnostics, set_diagnostics) = signal(Vec::<Diagnostic>::new());
    let (preview_doc, set_preview_doc) = signal(String::new());
    let (preview_open, set_preview_open) = signal(true);

    let (suggestions, set_suggestions) = signal(Vec::<HintEntry>::new());
    let (hint_index, set_hint_index) = signal(0usize);

    let (picker_value, set_picker_value) = signal("#000000".to_string());
    let (picker_target, set_picker_target) = signal(None::<(usize, usize)>);

    let (scroll_top, set_scroll_top) = signal(0);
    let editor_ref: NodeRef<html::Textarea> = NodeRef::new();

    let checker = StoredValue::new_local(checker_for(initial_settings.script_check));

    let refresh = move |snapshot: SourceBundle, force: bool| {
        let found = checker.with_value(|checker| checker.check(&snapshot));
        for diagnostic in &found {
            log::debug!(
                "{} line {}: {}",
                diagnostic.language.id(),
                diagnostic.line,
                diagnostic.message
            );
        }
        set_diagnostics.set(found);

        if force || settings.with_untracked(|s| s.auto_preview) {
            let document = preview::render(&snapshot);
            if force || preview_doc.with_untracked(|current| *current != document) {
                set_preview_doc.set(document);
            }
        }
    };

    // Reads the bundle when the timer fires, not when it was scheduled.
    let debounced = StoredValue::new_local(Debouncer::new(
        GlooTimers,
        initial_settings.preview_debounce_ms,
        move |()| refresh(bundle.get_untracked(), false),
    ));
    let schedule_refresh = move || debounced.with_value(|refresh| refresh.call(()));

    refresh(bundle.get_untracked(), true);
    if let Some((message, kind)) = load_notice {
        notify(message, kind);
    }

    let persist_settings = move |next: Settings| {
        if let Err(err) = next.save(&LocalStore) {
            log::warn!("could not save settings: {err}");
        }
        set_settings.set(next);
    };

    let update_suggestions = move |text: &str, cursor: usize, everything: bool| {
        let language = active.get_untracked();
        let found = if everything {
            hints::filter(
                hints::table(language),
                hints::prefix_at(text, cursor, language),
            )
        } else {
            hints::suggest(text, cursor, language)
        };
        set_hint_index.set(0);
        set_suggestions.set(found);
    };

    let track_color = move |text: &str, cursor: usize| {
        if active.get_untracked() != Language::Styles {
            set_picker_target.set(None);
            return;
        }
        let target = color::color_token_at(text, cursor);
        if let Some((start, end)) = target {
            if let Some(hex) = color::to_hex(&text[start..end]) {
                set_picker_value.set(hex);
            }
        }
        set_picker_target.set(target);
    };

    let commit = move |el: &web_sys::HtmlTextAreaElement, snapshot: EditorSnapshot| {
        let language = active.get_untracked();
        el.set_value(&snapshot.text);
        place_caret(el, &snapshot.text, snapshot.selection);
        track_color(&snapshot.text, snapshot.selection.start);
        set_bundle.update(|b| b.set(language, snapshot.text));
        schedule_refresh();
    };

    let run_command = move |el: &web_sys::HtmlTextAreaElement, command: EditCommand<'static>| {
        let mut snapshot = read_snapshot(el);
        match editor_core::apply_command(&mut snapshot, command) {
            Ok(true) => commit(el, snapshot),
            Ok(false) => {}
            Err(err) => log::warn!("edit rejected: {err}"),
        }
    };

    let accept_hint = move |index: usize| {
        let Some(el) = editor_ref.get_untracked() else {
            return;
        };
        let Some(entry) = suggestions.with_untracked(|list| list.get(index).copied()) else {
            return;
        };
        let language = active.get_untracked();
        let snapshot = read_snapshot(&el);
        let start = hints::prefix_start(&snapshot.text, snapshot.selection.start, language);
        let unit = settings.with_untracked(|s| s.indent_unit);
        set_suggestions.set(Vec::new());
        run_command(&el, EditCommand::Complete { entry, start, unit });
        let _ = el.focus();
    };

    let on_input = move |ev: web_sys::Event| {
        let el: web_sys::HtmlTextAreaElement = event_target(&ev);
        let snapshot = read_snapshot(&el);
        let language = active.get_untracked();
        update_suggestions(&snapshot.text, snapshot.selection.start, false);
        track_color(&snapshot.text, snapshot.selection.start);
        set_bundle.update(|b| b.set(language, snapshot.text));
        schedule_refresh();
    };

    let on_keydown = move |ev: web_sys::KeyboardEvent| {
        let Some(el) = editor_ref.get_untracked() else {
            return;
        };
        let key = ev.key();

        let open = suggestions.with_untracked(Vec::len);
        if open > 0 {
            match key.as_str() {
                "ArrowDown" => {
                    ev.prevent_default();
                    set_hint_index.update(|i| *i = (*i + 1) % open);
                    return;
                }
                "ArrowUp" => {
                    ev.prevent_default();
                    set_hint_index.update(|i| *i = (*i + open - 1) % open);
                    return;
                }
                "Enter" | "Tab" => {
                    ev.prevent_default();
                    accept_hint(hint_index.get_untracked());
                    return;
                }
                "Escape" => {
                    ev.prevent_default();
                    set_suggestions.set(Vec::new());
                    return;
                }
                _ => {}
            }
        }

        if key == " " && ev.ctrl_key() {
            ev.prevent_default();
            let snapshot = read_snapshot(&el);
            update_suggestions(&snapshot.text, snapshot.selection.start, true);
            return;
        }
        if ev.ctrl_key() || ev.meta_key() || ev.alt_key() {
            return;
        }

        if is_closer(&key) {
            let snapshot = read_snapshot(&el);
            let caret = snapshot.selection.start;
            if snapshot.selection.is_cursor() && snapshot.text[caret..].starts_with(key.as_str()) {
                ev.prevent_default();
                place_caret(&el, &snapshot.text, Selection::cursor(caret + key.len()));
                return;
            }
        }

        let unit = settings.with_untracked(|s| s.indent_unit);
        let command = match key.as_str() {
            "Tab" if ev.shift_key() => Some(EditCommand::Outdent { unit }),
            "Tab" => Some(EditCommand::Indent { unit }),
            "Enter" => Some(EditCommand::Newline { unit }),
            other => pair_for(other).map(|(open, close)| EditCommand::AutoPair { open, close }),
        };
        if let Some(command) = command {
            ev.prevent_default();
            set_suggestions.set(Vec::new());
            run_command(&el, command);
        }
    };

    let on_caret_move = move || {
        if let Some(el) = editor_ref.get_untracked() {
            let snapshot = read_snapshot(&el);
            track_color(&snapshot.text, snapshot.selection.start);
        }
    };

    let apply_picker = move |ev: web_sys::Event| {
        let hex = event_target_value(&ev);
        set_picker_value.set(hex.clone());
        let Some(el) = editor_ref.get_untracked() else {
            return;
        };
        let Some((start, end)) = picker_target.get_untracked() else {
            return;
        };
        let text = el.value();
        let still_color = text
            .get(start..end)
            .is_some_and(color::is_color_token);
        if !still_color {
            set_picker_target.set(None);
            return;
        }
        let mut snapshot = read_snapshot(&el);
        match editor_core::apply_command(&mut snapshot, EditCommand::Replace { start, end, text: &hex }) {
            Ok(_) => {
                commit(&el, snapshot);
                set_picker_target.set(Some((start, start + hex.len())));
            }
            Err(err) => log::warn!("color replacement rejected: {err}"),
        }
    };

    let switch_to = move |language: Language| {
        set_suggestions.set(Vec::new());
        set_picker_target.set(None);
        set_scroll_top.set(0);
        set_active.set(language);
    };

    let run_now = move || {
        debounced.with_value(Debouncer::cancel);
        refresh(bundle.get_untracked(), true);
    };

    let reset = move || {
        let confirmed = window()
            .confirm_with_message("Are you sure you want to reset all code? This cannot be undone.")
            .unwrap_or(false);
        if !confirmed {
            return;
        }
        set_bundle.set(SourceBundle::default());
        set_suggestions.set(Vec::new());
        run_now();
        notify("Code reset successfully!".to_string(), NoticeKind::Success);
    };

    let save = move || {
        let snapshot = bundle.get_untracked();
        if let Err(err) = persistence().save(&snapshot) {
            log::error!("save failed: {err}");
            notify(format!("Failed to save code: {err}"), NoticeKind::Error);
            return;
        }
        let files = export::export_files(&snapshot);
        for file in &files {
            #[cfg(target_arch = "wasm32")]
            if let Err(err) = export::download(file) {
                log::error!("download of {} failed: {err:?}", file.name);
            }
            log::info!("exported {} ({} bytes)", file.name, file.contents.len());
        }
        let kind = if files.is_empty() {
            NoticeKind::Warning
        } else {
            NoticeKind::Success
        };
        notify(export::summary(files.len()), kind);
    };

    let beautify_active = move || {
        let language = active.get_untracked();
        let source = bundle.with_untracked(|b| b.get(language).to_string());
        let indent = settings.with_untracked(|s| s.beautify_indent);
        match beautify::beautify(language, &source, indent) {
            Ok(formatted) => {
                set_bundle.update(|b| b.set(language, formatted));
                run_now();
                notify("Code beautified successfully!".to_string(), NoticeKind::Success);
            }
            Err(err) => {
                log::error!("beautify failed: {err}");
                notify("Failed to beautify code!".to_string(), NoticeKind::Error);
            }
        }
    };

    let open_tab = move || {
        let document = bundle.with_untracked(|b| preview::render_for(b, PreviewTarget::Standalone));
        if let Err(err) = open_in_new_tab(&document) {
            log::error!("could not open preview tab: {err:?}");
            notify("Could not open the preview in a new tab".to_string(), NoticeKind::Error);
        }
    };

    let active_diagnostic = move || {
        let language = active.get();
        diagnostics.with(|found| check::for_language(found, language).cloned())
    };

    let line_count = move || {
        let language = active.get();
        bundle.with(|b| b.get(language).split('\n').count())
    };

    let gutter = move || {
        let marked = active_diagnostic();
        (1..=line_count())
            .map(|n| {
                let error = marked.as_ref().filter(|d| d.line == n).map(|d| d.message.clone());
                let is_error = error.is_some();
                view! {
                    <div
                        style=format!("height: 1.5em; padding: 0 0.5rem; text-align: right; {}", if is_error { "background: rgba(255, 85, 85, 0.25); color: #ff5555; cursor: help;" } else { "" })
                        title=error.unwrap_or_default()
                    >
                        {if is_error { format!("\u{26a0} {n}") } else { n.to_string() }}
                    </div>
                }
            })
            .collect::<Vec<_>>()
    };

    let highlight_style = move || match active_diagnostic() {
        Some(diagnostic) => format!(
            "position: absolute; left: 0; right: 0; height: 1.5em; top: calc({}em + 1rem - {}px); background: rgba(255, 85, 85, 0.15); pointer-events: none;",
            (diagnostic.line - 1) as f64 * 1.5,
            scroll_top.get()
        ),
        None => "display: none;".to_string(),
    };

    let tab_button = move |language: Language| {
        let has_error = move || diagnostics.with(|found| check::for_language(found, language).is_some());
        view! {
            <button
                on:click=move |_| switch_to(language)
                style=move || format!("padding: 0.5rem 1rem; border: none; cursor: pointer; font-weight: 600; {}", if active.get() == language { "background: #44475a; color: #f8f8f2;" } else { "background: transparent; color: #6272a4;" })
            >
                {language.label()}
                {move || has_error().then(|| view! { <span style="color: #ff5555; margin-left: 0.35rem;">"\u{26a0}"</span> })}
            </button>
        }
    };

    let toolbar_button = "padding: 0.4rem 0.9rem; border: 1px solid #44475a; border-radius: 4px; background: #282a36; color: #f8f8f2; cursor: pointer;";

    let settings_panel = move || {
        view! {
            <div style="display: flex; gap: 1rem; align-items: center; font-size: 0.85rem; color: #6272a4;">
                <label style="display: flex; gap: 0.35rem; align-items: center;">
                    <input type="checkbox" prop:checked=move || settings.get().auto_preview on:change=move |e| {
                        let target: web_sys::HtmlInputElement = event_target(&e);
                        let mut next = settings.get_untracked();
                        next.auto_preview = target.checked();
                        persist_settings(next);
                    } />
                    "Auto preview"
                </label>
                <label style="display: flex; gap: 0.35rem; align-items: center;">
                    <input type="checkbox" prop:checked=move || settings.get().script_check == ScriptCheck::Engine on:change=move |e| {
                        let target: web_sys::HtmlInputElement = event_target(&e);
                        let mut next = settings.get_untracked();
                        next.script_check = if target.checked() { ScriptCheck::Engine } else { ScriptCheck::Scanner };
                        checker.set_value(checker_for(next.script_check));
                        notify(format!("Script check: {:?}", next.script_check), NoticeKind::Info);
                        persist_settings(next);
                        run_now();
                    } />
                    "Engine script check"
                </label>
                <label style="display: flex; gap: 0.35rem; align-items: center;">
                    "Font"
                    <input style="width: 3.5rem; background: #282a36; color: #f8f8f2; border: 1px solid #44475a;" type="number" prop:value=move || settings.get().font_size.to_string() on:input=move |e| {
                        let mut next = settings.get_untracked();
                        next.font_size = event_target_value(&e).parse().unwrap_or(14);
                        persist_settings(next);
                    } />
                </label>
            </div>
        }
    };

    let hint_popup = move || {
        let list = suggestions.get();
        if list.is_empty() {
            return None;
        }
        let selected = hint_index.get();
        Some(view! {
            <ul style="position: absolute; left: 3.5rem; bottom: 0.5rem; margin: 0; padding: 0.25rem 0; list-style: none; max-height: 12rem; overflow-y: auto; background: #21222c; border: 1px solid #44475a; border-radius: 4px; z-index: 5; min-width: 12rem;">
                {list.into_iter().enumerate().map(move |(i, entry)| {
                    view! {
                        <li
                            style=format!("padding: 0.2rem 0.75rem; cursor: pointer; {}", if i == selected { "background: #44475a; color: #f8f8f2;" } else { "color: #bd93f9;" })
                            on:mousedown=move |e: web_sys::MouseEvent| {
                                e.prevent_default();
                                accept_hint(i);
                            }
                        >
                            {entry.display_label()}
                        </li>
                    }
                }).collect::<Vec<_>>()}
            </ul>
        })
    };

    view! {
        <main style=move || format!("display: flex; height: 100vh; width: 100vw; background: #282a36; color: #f8f8f2; font-family: system-ui, sans-serif; --editor-font-size: {}px;", settings.get().font_size)>
            <section style="flex: 1; display: flex; flex-direction: column; min-width: 0; border-right: 1px solid #44475a;">
                <header style="display: flex; align-items: center; justify-content: space-between; padding: 0.5rem; border-bottom: 1px solid #44475a; gap: 0.5rem; flex-wrap: wrap;">
                    <nav style="display: flex; gap: 0.25rem;">
                        {Language::ALL.into_iter().map(tab_button).collect::<Vec<_>>()}
                    </nav>
                    <div style="display: flex; gap: 0.5rem; align-items: center;">
                        {move || (active.get() == Language::Styles).then(|| view! {
                            <input
                                type="color"
                                title="Pick a color for the value under the cursor"
                                style=move || format!("width: 2rem; height: 1.8rem; border: none; padding: 0; background: transparent; cursor: pointer; opacity: {};", if picker_target.get().is_some() { "1" } else { "0.4" })
                                prop:value=move || picker_value.get()
                                on:input=apply_picker
                            />
                        })}
                        <button style=toolbar_button on:click=move |_| run_now() title="Run">"Run"</button>
                        <button style=toolbar_button on:click=move |_| save() title="Save and download">"Save"</button>
                        <button style=toolbar_button on:click=move |_| beautify_active() title="Beautify">"Beautify"</button>
                        <button style=toolbar_button on:click=move |_| reset() title="Reset">"Reset"</button>
                    </div>
                </header>
                <div style="flex: 1; position: relative; display: flex; overflow: hidden; font-family: 'Fira Code', monospace; font-size: var(--editor-font-size); line-height: 1.5;">
                    <div
                        style="padding: 1rem 0; min-width: 3rem; background: #21222c; color: #6272a4; overflow: hidden; user-select: none;"
                        prop:scrollTop=move || scroll_top.get()
                    >
                        {gutter}
                    </div>
                    <div style="flex: 1; position: relative; overflow: hidden;">
                        <div style=highlight_style></div>
                        <textarea
                            node_ref=editor_ref
                            style="position: absolute; top: 0; left: 0; width: 100%; height: 100%; padding: 1rem; font: inherit; line-height: 1.5; color: #f8f8f2; background: transparent; caret-color: #f8f8f2; outline: none; border: none; resize: none; box-sizing: border-box; overflow-y: auto; white-space: pre; tab-size: 2;"
                            prop:value=move || { let language = active.get(); bundle.with(|b| b.get(language).to_string()) }
                            on:input=on_input
                            on:keydown=on_keydown
                            on:click=move |_| on_caret_move()
                            on:keyup=move |e: web_sys::KeyboardEvent| if e.key().starts_with("Arrow") { on_caret_move() }
                            on:blur=move |_| set_suggestions.set(Vec::new())
                            on:scroll=move |e| {
                                let target: web_sys::Element = event_target(&e);
                                set_scroll_top.set(target.scroll_top());
                            }
                            placeholder=move || format!("Write {} here...", active.get().label())
                            spellcheck="false"
                        ></textarea>
                        {hint_popup}
                    </div>
                </div>
                <footer style="padding: 0.35rem 0.75rem; border-top: 1px solid #44475a; font-size: 0.8rem; display: flex; justify-content: space-between; align-items: center;">
                    <span style="color: #ff5555;">
                        {move || active_diagnostic().map(|d| format!("Line {}: {}", d.line, d.message))}
                    </span>
                    {settings_panel}
                </footer>
            </section>
            <section style=move || format!("display: flex; flex-direction: column; background: #ffffff; {}", if preview_open.get() { "flex: 1;" } else { "width: 2.5rem;" })>
                <header style="display: flex; align-items: center; justify-content: space-between; padding: 0.5rem; background: #282a36; border-bottom: 1px solid #44475a;">
                    <span style="font-weight: 600;">{move || preview_open.get().then_some("Preview")}</span>
                    <div style="display: flex; gap: 0.5rem;">
                        {move || preview_open.get().then(|| view! {
                            <button style=toolbar_button on:click=move |_| run_now() title="Refresh preview">"\u{21bb}"</button>
                            <button style=toolbar_button on:click=move |_| open_tab() title="Open in new tab">"\u{2197}"</button>
                        })}
                        <button style=toolbar_button on:click=move |_| set_preview_open.update(|open| *open = !*open) title="Toggle preview">
                            {move || if preview_open.get() { "\u{25b6}" } else { "\u{25c0}" }}
                        </button>
                    </div>
                </header>
                {move || preview_open.get().then(|| view! {
                    <iframe
                        style="flex: 1; width: 100%; border: none; background: #ffffff;"
                        title="Preview"
                        sandbox="allow-scripts allow-modals"
                        prop:srcdoc=move || preview_doc.get()
                    ></iframe>
                })}
            </section>
            <div style="position: fixed; right: 1rem; bottom: 1rem; display: flex; flex-direction: column; gap: 0.5rem; z-index: 10;">
                {move || notices.get().into_iter().map(|notice| view! {
                    <div style=format!("padding: 0.6rem 1rem; border-radius: 4px; color: #ffffff; box-shadow: 0 2px 8px rgba(0, 0, 0, 0.3); background: {};", notice.kind.background())>
                        {notice.message}
                    </div>
                }).collect::<Vec<_>>()}
            </div>
        </main>
    }
}
