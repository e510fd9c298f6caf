//! hnav - Hacker News keyboard navigator
//!
//! Browse a story thread or the front page with vim-style keys. Favorites
//! and flags are mirrored to an activity store when a username is set.

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::DisableMouseCapture,
    execute,
    terminal::{disable_raw_mode, LeaveAlternateScreen},
};
use hnav::activity::ActivityTrail;
use hnav::adapters::{
    AlgoliaItemSource, CrosstermTerminal, HttpActivityApi, MemoryPage, SqliteKeyValueStore,
};
use hnav::app::App;
use hnav::config::{Config, Overrides};
use hnav::logging;
use hnav::ports::{ItemSource, KeyValueStore};
use hnav::ui::styles;
use std::io;
use std::panic;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::rc::Rc;
use tokio::task::LocalSet;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "hnav")]
#[command(about = "Keyboard navigation for Hacker News threads")]
#[command(version)]
struct Args {
    /// Item id of the story thread to open (default: front page)
    #[arg(short, long)]
    item: Option<String>,

    /// Username whose favorites and flags are tracked
    #[arg(short, long)]
    user: Option<String>,

    /// Path to config.toml (default: platform config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path to the state database (default: platform data directory)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Color theme
    #[arg(long)]
    theme: Option<String>,
}

fn main() -> Result<()> {
    // Set up panic hook to restore terminal on panic
    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen, DisableMouseCapture);
        original_hook(panic_info);
    }));

    let args = Args::parse();
    let config = Config::resolve(
        args.config.as_deref(),
        &Overrides {
            username: args.user.clone(),
            theme: args.theme.clone(),
        },
    )?;

    match logging::default_log_path() {
        Ok(path) => {
            if let Err(e) = logging::init(&path, config.log_filter.as_deref()) {
                eprintln!("Warning: Could not initialize logging: {:#}", e);
            }
        }
        Err(e) => eprintln!("Warning: {:#}. Logging is disabled.", e),
    }

    let palette = styles::palette(&config.theme).map_err(anyhow::Error::msg)?;

    let store: Rc<dyn KeyValueStore> = match open_store(args.db.as_deref()) {
        Ok(store) => Rc::new(store),
        Err(e) => {
            eprintln!(
                "Warning: Could not open state database: {:#}. Positions and activity will not persist.",
                e
            );
            Rc::new(SqliteKeyValueStore::open_in_memory()?)
        }
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    LocalSet::new().block_on(&runtime, async move {
        let trail = config.username.as_deref().map(|username| {
            let api = Rc::new(HttpActivityApi::new(
                &config.activity_api_url,
                config.request_timeout(),
            ));
            ActivityTrail::new(
                username,
                config.auth_token.clone(),
                api,
                Rc::clone(&store),
                config.backoff.clone(),
            )
        });

        let source = AlgoliaItemSource::new(&config.item_api_url, config.request_timeout());
        let page = match &args.item {
            Some(id) => {
                let item = source
                    .item(id)
                    .await
                    .with_context(|| format!("Failed to fetch item {id}"))?;
                MemoryPage::from_thread(&item)
            }
            None => {
                let stories = source
                    .front_page()
                    .await
                    .context("Failed to fetch the front page")?;
                MemoryPage::from_front_page(&stories)
            }
        };
        info!(item = ?args.item, "page loaded");

        let mut terminal = CrosstermTerminal::new().context("Failed to initialize terminal")?;
        let mut app = App::new(
            Rc::new(page),
            store,
            trail,
            palette,
            Box::new(open_in_browser),
        );

        // Terminal cleanup happens in Drop
        app.run(&mut terminal).await
    })
}

fn open_store(path: Option<&std::path::Path>) -> Result<SqliteKeyValueStore> {
    match path {
        Some(path) => SqliteKeyValueStore::open(path),
        None => SqliteKeyValueStore::new(),
    }
}

fn open_in_browser(url: &str) {
    let program = if cfg!(target_os = "macos") {
        "open"
    } else {
        "xdg-open"
    };
    let spawned = Command::new(program)
        .arg(url)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn();
    match spawned {
        // Reaped off the UI thread so the opener never lingers as a zombie.
        Ok(mut child) => {
            std::thread::spawn(move || {
                if let Err(e) = child.wait() {
                    warn!(error = %e, "browser launcher did not exit cleanly");
                }
            });
        }
        Err(e) => warn!(%url, error = %e, "could not launch browser"),
    }
}
