use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use clap::Parser;
use crossterm::{
    cursor::{Hide, Show},
    event::{DisableFocusChange, EnableFocusChange, EventStream},
    execute,
    terminal::{self, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures::StreamExt;
use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::sleep;

use sensor_demo_rs::config::{DemoConfig, OutputMode, SourceKind};
use sensor_demo_rs::source::iio::DEFAULT_IIO_ROOT;
use sensor_demo_rs::view::{self, Action, TerminalView, ViewModel};
use sensor_demo_rs::{
    Cadence, LatestReadingStore, ReadingSource, SensorDescriptor, SubscriptionManager,
    TrackedKind,
};

#[derive(Parser, Debug)]
#[command(name = "sensor_demo")]
#[command(about = "Live light, accelerometer and gyroscope readings plus the device sensor inventory", long_about = None)]
struct Args {
    /// Where sensors come from
    #[arg(long, value_enum, default_value_t = SourceKind::Sim)]
    source: SourceKind,

    /// IIO sysfs device directory (with --source iio)
    #[arg(long, default_value = DEFAULT_IIO_ROOT)]
    iio_root: PathBuf,

    /// Kinds the simulated device exposes
    #[arg(long, value_enum, value_delimiter = ',', default_values_t = TrackedKind::ALL)]
    sim_sensors: Vec<TrackedKind>,

    /// Sampling cadence requested from the source
    #[arg(long, value_enum, default_value_t = Cadence::Normal)]
    cadence: Cadence,

    /// Print the sensor inventory and exit
    #[arg(long)]
    list: bool,

    /// Print the inventory as JSON
    #[arg(long, requires = "list")]
    json: bool,

    /// Print readings as they change instead of drawing the terminal view
    #[arg(long, conflicts_with = "list")]
    headless: bool,

    /// Duration in seconds (0 = until quit)
    #[arg(long, value_name = "SECONDS", default_value = "0")]
    duration: u64,
}

impl Args {
    fn into_config(self) -> DemoConfig {
        let mode = if self.list {
            OutputMode::List { json: self.json }
        } else if self.headless || !io::stdout().is_terminal() {
            OutputMode::Headless
        } else {
            OutputMode::Terminal
        };

        DemoConfig {
            source: self.source,
            iio_root: self.iio_root,
            sim_sensors: self.sim_sensors,
            cadence: self.cadence,
            mode,
            duration: (self.duration > 0).then(|| Duration::from_secs(self.duration)),
        }
    }
}

type Manager = SubscriptionManager<Box<dyn ReadingSource>>;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Args::parse().into_config();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.default_log_filter()),
    )
    .init();

    let store = LatestReadingStore::new();
    let mut manager = SubscriptionManager::new(config.build_source(), store, config.cadence);

    match config.mode {
        OutputMode::List { json } => print_inventory(manager.inventory(), json),
        OutputMode::Headless => run_headless(&mut manager, config.duration).await,
        OutputMode::Terminal => run_terminal(&mut manager, config.duration).await,
    }
}

fn print_inventory(inventory: &[SensorDescriptor], json: bool) -> Result<()> {
    let mut out = io::stdout().lock();
    if json {
        let text = serde_json::to_string_pretty(inventory).context("serializing inventory")?;
        writeln!(out, "{}", text)?;
    } else {
        for line in view::inventory_lines(inventory) {
            writeln!(out, "{}", line)?;
        }
    }
    Ok(())
}

async fn deadline(duration: Option<Duration>) {
    match duration {
        Some(d) => sleep(d).await,
        None => std::future::pending().await,
    }
}

/// Local wall-clock time of an update, or now if the entry has none
fn ts(at: Option<DateTime<Utc>>) -> String {
    at.map(|t| t.with_timezone(&Local))
        .unwrap_or_else(Local::now)
        .format("%H:%M:%S%.3f")
        .to_string()
}

async fn run_headless(manager: &mut Manager, duration: Option<Duration>) -> Result<()> {
    let mut store_rx = manager.store().subscribe();
    let mut seen = store_rx.borrow_and_update().clone();

    {
        let model = ViewModel {
            resolved: manager.resolved(),
            snapshot: &seen,
            inventory: manager.inventory(),
        };
        for line in model.header_lines() {
            println!("{}", line);
        }
    }

    manager.activate()?;

    let stop = deadline(duration);
    tokio::pin!(stop);

    loop {
        tokio::select! {
            _ = &mut stop => {
                log::info!("Duration reached, stopping");
                break;
            }
            _ = tokio::signal::ctrl_c() => break,
            changed = store_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = store_rx.borrow_and_update().clone();
                for kind in TrackedKind::ALL {
                    let entry = snapshot.entry(kind);
                    if entry.samples != seen.entry(kind).samples {
                        println!("[{}] {}", ts(entry.updated_at), entry.display);
                    }
                }
                seen = snapshot;
            }
        }
    }

    manager.deactivate();
    Ok(())
}

/// Restores the terminal even when the view loop bails out early
struct TerminalGuard;

impl TerminalGuard {
    fn enter() -> Result<Self> {
        terminal::enable_raw_mode().context("enabling raw mode")?;
        execute!(io::stdout(), EnterAlternateScreen, EnableFocusChange, Hide)?;
        Ok(TerminalGuard)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = execute!(io::stdout(), DisableFocusChange, Show, LeaveAlternateScreen);
        let _ = terminal::disable_raw_mode();
    }
}

async fn run_terminal(manager: &mut Manager, duration: Option<Duration>) -> Result<()> {
    let _guard = TerminalGuard::enter()?;
    let mut stdout = io::stdout();
    let mut view = TerminalView::new();
    let mut events = EventStream::new();
    let mut store_rx = manager.store().subscribe();
    let mut paused_by_user = false;

    manager.activate()?;

    let stop = deadline(duration);
    tokio::pin!(stop);

    loop {
        let snapshot = store_rx.borrow_and_update().clone();
        let model = ViewModel {
            resolved: manager.resolved(),
            snapshot: &snapshot,
            inventory: manager.inventory(),
        };
        view.draw(&mut stdout, &model, manager.state())?;

        tokio::select! {
            _ = &mut stop => break,
            changed = store_rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            event = events.next() => {
                let event = match event {
                    Some(event) => event.context("reading terminal events")?,
                    None => break,
                };
                match view::action_for(&event) {
                    Some(Action::Quit) => break,
                    Some(Action::TogglePause) => {
                        if manager.is_active() {
                            manager.deactivate();
                            paused_by_user = true;
                        } else {
                            manager.activate()?;
                            paused_by_user = false;
                        }
                    }
                    Some(Action::Foreground) if !paused_by_user => manager.activate()?,
                    Some(Action::Background) => manager.deactivate(),
                    Some(Action::ScrollLines(n)) => view.scroll_by(n),
                    Some(Action::ScrollPages(n)) => view.scroll_pages(n),
                    Some(Action::ScrollHome) => view.scroll_home(),
                    Some(Action::Foreground) | Some(Action::Redraw) | None => {}
                }
            }
        }
    }

    manager.deactivate();
    Ok(())
}
