mod app;
mod config;
mod overlay;

use crate::app::App;
use crate::config::Config;
use vantage_runtime::ViewerEvent;
use winit::event_loop::EventLoop;

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    let path = Config::default_path();
    let (config, problem) = match Config::load_from(&path) {
        Ok(Some(config)) => (config, None),
        Ok(None) => (Config::default(), None),
        Err(err) => (Config::default(), Some(err)),
    };

    let filter = config.logging.filter.as_str();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();
    match problem {
        Some(err) => log::error!("{err}; using default settings"),
        None => log::debug!("settings: {config:?}"),
    }

    let event_loop = match EventLoop::<ViewerEvent>::with_user_event().build() {
        Ok(event_loop) => event_loop,
        Err(err) => {
            log::error!("failed to create event loop: {err}");
            std::process::exit(1);
        }
    };

    let mut app = App::new(&event_loop, config);
    if let Err(err) = event_loop.run_app(&mut app) {
        log::error!("event loop stopped with an error: {err}");
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {
    use winit::platform::web::EventLoopExtWebSys;

    console_error_panic_hook::set_once();
    if let Err(err) = console_log::init_with_level(log::Level::Info) {
        web_sys::console::error_1(&format!("failed to init logger: {err}").into());
    }

    let event_loop = match EventLoop::<ViewerEvent>::with_user_event().build() {
        Ok(event_loop) => event_loop,
        Err(err) => {
            log::error!("failed to create event loop: {err}");
            return;
        }
    };
    let app = App::new(&event_loop, Config::default());
    event_loop.spawn_app(app);
}
