use anyhow::Result;
use ragchat_core::Config;

mod app;
mod handler;
mod logging;
mod tui;
mod ui;

use app::App;
use tui::{EventHandler, Tui};

// One thread: terminal input, timers and every network call interleave
// cooperatively on the same event loop.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let config = Config::load().unwrap_or_else(|err| {
        eprintln!("Could not read config ({}), using defaults", err);
        Config::new()
    });

    logging::init(&config)?;
    tracing::info!(server = %config.server_url, route = config.send_route.as_str(), "starting");

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new();

    let mut app = App::new(&config);
    app.session.mount();

    let result = run(&mut terminal, &mut app, &mut events).await;

    tui::restore()?;
    if let Err(err) = &result {
        tracing::error!(error = %err, "exiting with error");
    }
    result
}

async fn run(terminal: &mut Tui, app: &mut App, events: &mut EventHandler) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        tokio::select! {
            Some(event) = events.next() => handler::handle_event(app, event)?,
            Some(sync) = app.session.next_event() => app.apply_sync(sync),
            else => break,
        }
    }
    Ok(())
}
