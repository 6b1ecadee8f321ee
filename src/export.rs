use crate::bundle::{Language, SourceBundle};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportFile {
    pub name: &'static str,
    pub mime: &'static str,
    pub contents: String,
}

pub fn file_name(language: Language) -> &'static str {
    match language {
        Language::Markup => "index.html",
        Language::Styles => "styles.css",
        Language::Script => "script.js",
    }
}

pub fn mime_type(language: Language) -> &'static str {
    match language {
        Language::Markup => "text/html",
        Language::Styles => "text/css",
        Language::Script => "application/javascript",
    }
}

/// One file per non-blank source, in pane order.
pub fn export_files(bundle: &SourceBundle) -> Vec<ExportFile> {
    Language::ALL
        .iter()
        .filter(|language| !bundle.get(**language).trim().is_empty())
        .map(|language| ExportFile {
            name: file_name(*language),
            mime: mime_type(*language),
            contents: bundle.get(*language).to_string(),
        })
        .collect()
}

pub fn summary(count: usize) -> String {
    match count {
        0 => "No files to download - all editors are empty".to_string(),
        1 => "1 file downloaded successfully!".to_string(),
        n => format!("{n} files downloaded successfully!"),
    }
}

/// Offers `file` as a download through a temporary object URL.
#[cfg(target_arch = "wasm32")]
pub fn download(file: &ExportFile) -> Result<(), wasm_bindgen::JsValue> {
    use wasm_bindgen::JsCast;

    let parts = js_sys::Array::of1(&wasm_bindgen::JsValue::from_str(&file.contents));
    let options = web_sys::BlobPropertyBag::new();
    options.set_type(file.mime);
    let blob = web_sys::Blob::new_with_str_sequence_and_options(&parts, &options)?;
    let url = web_sys::Url::create_object_url_with_blob(&blob)?;

    let document = web_sys::window()
        .and_then(|window| window.document())
        .ok_or_else(|| wasm_bindgen::JsValue::from_str("no document"))?;
    let link: web_sys::HtmlAnchorElement = document.create_element("a")?.dyn_into()?;
    link.set_href(&url);
    link.set_download(file.name);
    let body = document
        .body()
        .ok_or_else(|| wasm_bindgen::JsValue::from_str("no body"))?;
    body.append_child(&link)?;
    link.click();
    body.remove_child(&link)?;

    gloo::timers::callback::Timeout::new(1_000, move || {
        let _ = web_sys::Url::revoke_object_url(&url);
    })
    .forget();
    Ok(())
}
