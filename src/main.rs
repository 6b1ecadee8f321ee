use codepane::app::App;
use codepane::settings::Settings;
use codepane::storage::LocalStore;
use leptos::prelude::*;

fn main() {
    console_error_panic_hook::set_once();
    codepane::logging::init(Settings::load(&LocalStore).level_filter());
    log::info!("starting codepane");
    mount_to_body(|| view! { <App/> })
}
