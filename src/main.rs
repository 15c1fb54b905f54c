mod actions;
mod app;
mod event;
mod snapshot;
mod store;
mod ui;

use std::time::{Duration, Instant};

use anyhow::Result;
use crossterm::event::{self as ct_event, Event};
use tokio::sync::mpsc;

use actions::{ActionRunner, UpgradeOutcome};
use app::App;
use event::Command;
use store::{PollOutcome, SnapshotStore};

/// How often the snapshot file is re-checked for a new export token
const POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Results from background tasks
enum TaskResult
{
    /// A captured upgrade finished; label names what was updated
    Upgrade
    {
        label: String,
        result: Result<UpgradeOutcome, String>,
    },
    /// A fire-and-forget action finished (only failures matter)
    Action(Result<(), String>),
}

#[tokio::main]
async fn main() -> Result<()>
{
    init_logging();

    let mut store = SnapshotStore::from_env();
    tracing::info!(path = %store.data_path().display(), "watching snapshot file");

    let runner = ActionRunner::new();

    // Initialize terminal
    let mut terminal = ratatui::init();
    terminal.clear()?;

    // Create app and take the initial snapshot; absence is the normal
    // state before Vesslo has ever run
    let mut app = App::new();
    match store.reload()
    {
        Some(snapshot) => app.set_snapshot(snapshot),
        None => app.note_absent(),
    }

    // Run event loop
    let result = run_event_loop(&mut terminal, &mut app, &mut store, runner).await;

    // Restore terminal
    ratatui::restore();

    result
}

async fn run_event_loop(terminal: &mut ratatui::DefaultTerminal,
                        app: &mut App,
                        store: &mut SnapshotStore,
                        runner: ActionRunner)
                        -> Result<()>
{
    // Channel for receiving results from background tasks
    let (tx, mut rx) = mpsc::channel::<TaskResult>(10);
    let mut last_poll = Instant::now();

    loop
    {
        // Tick spinner for animation
        app.tick_spinner();

        // Check for completed background tasks (non-blocking)
        while let Ok(result) = rx.try_recv()
        {
            handle_task_result(app, store, result);
        }

        // One snapshot poll per interval. The tick is synchronous, so
        // polls never overlap; leaving this loop stops them on every
        // exit path.
        if last_poll.elapsed() >= POLL_INTERVAL
        {
            last_poll = Instant::now();
            match store.poll()
            {
                PollOutcome::Changed(snapshot) => app.set_snapshot(snapshot),
                PollOutcome::Unchanged => {}
                PollOutcome::Absent => app.note_absent(),
            }
        }

        // Draw UI
        terminal.draw(|frame| ui::render(frame, app))?;

        // Poll for events with short timeout to keep spinner animated
        if ct_event::poll(Duration::from_millis(80))?
        {
            if let Event::Key(key) = ct_event::read()?
            {
                // Handle key and get optional command
                if let Some(cmd) = app.handle_key(key)
                {
                    dispatch_command(&runner, cmd, tx.clone(), app, store);
                }
            }
        }

        if app.should_quit
        {
            break;
        }
    }

    Ok(())
}

/// Execute a command: refresh runs inline, everything else becomes a
/// background task reporting back over the channel
fn dispatch_command(runner: &ActionRunner,
                    cmd: Command,
                    tx: mpsc::Sender<TaskResult>,
                    app: &mut App,
                    store: &mut SnapshotStore)
{
    match cmd
    {
        Command::Refresh =>
        {
            match store.reload()
            {
                Some(snapshot) =>
                {
                    app.set_snapshot(snapshot);
                    app.set_status("Snapshot reloaded".to_string());
                }
                None => app.note_absent(),
            }
        }
        Command::BrewUpgrade { cask, name } =>
        {
            let runner = runner.clone();
            tokio::spawn(async move {
                let result = runner.brew_upgrade(&cask).await.map_err(|e| e.to_string());
                let _ = tx.send(TaskResult::Upgrade { label: name, result }).await;
            });
        }
        Command::BrewUpgradeAll { count } =>
        {
            let runner = runner.clone();
            tokio::spawn(async move {
                let result = runner.brew_upgrade_all().await.map_err(|e| e.to_string());
                let label = format!("{} Homebrew apps", count);
                let _ = tx.send(TaskResult::Upgrade { label, result }).await;
            });
        }
        Command::MasUpgrade { app_store_id, name } =>
        {
            let runner = runner.clone();
            tokio::spawn(async move {
                let result = runner.mas_upgrade(&app_store_id).await.map_err(|e| e.to_string());
                let _ = tx.send(TaskResult::Upgrade { label: name, result }).await;
            });
        }
        Command::BrewUpgradeInTerminal { cask } =>
        {
            let runner = runner.clone();
            tokio::spawn(async move {
                let result = runner.brew_upgrade_in_terminal(&cask)
                                   .await
                                   .map_err(|e| e.to_string());
                let _ = tx.send(TaskResult::Action(result)).await;
            });
        }
        Command::MasUpgradeInTerminal { app_store_id } =>
        {
            let runner = runner.clone();
            tokio::spawn(async move {
                let result = runner.mas_upgrade_in_terminal(&app_store_id)
                                   .await
                                   .map_err(|e| e.to_string());
                let _ = tx.send(TaskResult::Action(result)).await;
            });
        }
        Command::OpenApp { path } =>
        {
            let runner = runner.clone();
            tokio::spawn(async move {
                let result = runner.open_app(&path).await.map_err(|e| e.to_string());
                let _ = tx.send(TaskResult::Action(result)).await;
            });
        }
        Command::RevealInFinder { path } =>
        {
            let runner = runner.clone();
            tokio::spawn(async move {
                let result = runner.reveal_in_finder(&path).await.map_err(|e| e.to_string());
                let _ = tx.send(TaskResult::Action(result)).await;
            });
        }
        Command::CopyBundleId { bundle_id } =>
        {
            let runner = runner.clone();
            tokio::spawn(async move {
                let result = runner.copy_to_clipboard(&bundle_id)
                                   .await
                                   .map_err(|e| e.to_string());
                let _ = tx.send(TaskResult::Action(result)).await;
            });
        }
        Command::OpenInVesslo { bundle_id } =>
        {
            spawn_open_url(runner, tx, actions::vesslo_app_url(&bundle_id));
        }
        Command::UpdateInVesslo { bundle_id, .. } =>
        {
            spawn_open_url(runner, tx, actions::vesslo_update_url(&bundle_id));
        }
        Command::UpdateAllInVesslo =>
        {
            spawn_open_url(runner, tx, actions::vesslo_update_all_url());
        }
        Command::OpenAppStorePage { app_store_id } =>
        {
            spawn_open_url(runner, tx, actions::app_store_url(&app_store_id));
        }
        Command::Quit =>
        {
            // Already handled by should_quit flag
        }
    }
}

/// Open a URL in the background, fire-and-forget
fn spawn_open_url(runner: &ActionRunner,
                  tx: mpsc::Sender<TaskResult>,
                  url: String)
{
    let runner = runner.clone();
    tokio::spawn(async move {
        let result = runner.open_url(&url).await.map_err(|e| e.to_string());
        let _ = tx.send(TaskResult::Action(result)).await;
    });
}

/// Handle results from background tasks
fn handle_task_result(app: &mut App,
                      store: &mut SnapshotStore,
                      result: TaskResult)
{
    match result
    {
        TaskResult::Upgrade { label, result } =>
        {
            app.finish_upgrade(&label, result);

            // Vesslo rewrites its export after installs change; pick the
            // new state up now instead of waiting out the poll interval
            if let Some(snapshot) = store.reload()
            {
                app.set_snapshot(snapshot);
            }
        }
        TaskResult::Action(Ok(())) => {}
        TaskResult::Action(Err(e)) => app.set_error(e),
    }
}

/// Log to a file when VESSLO_TUI_LOG names one; the TUI owns the
/// terminal, so there is nowhere else to write diagnostics
fn init_logging()
{
    let path = match std::env::var_os("VESSLO_TUI_LOG")
    {
        Some(path) => path,
        None => return,
    };

    let file = match std::fs::OpenOptions::new().create(true).append(true).open(path)
    {
        Ok(file) => file,
        Err(_) => return,
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::fmt().with_env_filter(filter)
                             .with_writer(std::sync::Mutex::new(file))
                             .with_ansi(false)
                             .init();
}
