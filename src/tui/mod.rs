//! TUI module for interactive terminal interface
//!
//! Provides a full-screen terminal UI using Ratatui. The loop owns the
//! terminal and the [`AppState`]; scans, measurements and deletions run on
//! worker threads and report back over a channel as [`Message`]s.

pub mod events;
pub mod screens;
pub mod state;
pub mod theme;
pub mod widgets;

use anyhow::Result;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::Backend, backend::CrosstermBackend, Terminal};
use std::io::stdout;
use std::path::PathBuf;
use std::sync::atomic::AtomicU64;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use self::events::{key_action, mouse_action};
use self::screens::{render, RenderContext};
use self::state::{AppState, Effect, Message};
use crate::cleaner::Deleter;
use crate::progress::ScanProgress;
use crate::rules::ScanRules;
use crate::scan_cache::ScanCache;
use crate::size_resolver::SizeResolver;
use crate::tools;

/// Everything the loop needs to carry out effects.
pub struct Services {
    pub cache: Arc<ScanCache>,
    pub resolver: Arc<SizeResolver>,
    pub deleter: Arc<dyn Deleter>,
    pub rules: Arc<ScanRules>,
    pub open_timeout: Duration,
    pub tick: Duration,
}

/// Run the TUI application
pub fn run(app_state: AppState, services: Services) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = event_loop(&mut terminal, app_state, &services);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

fn event_loop<B: Backend>(
    terminal: &mut Terminal<B>,
    mut app_state: AppState,
    services: &Services,
) -> Result<()> {
    let (tx, rx): (Sender<Message>, Receiver<Message>) = mpsc::channel();
    let runtime = Runtime { services, tx };

    let effects = app_state.init();
    if runtime.apply(&app_state, effects) {
        return Ok(());
    }

    loop {
        let ctx = RenderContext {
            rules: &services.rules,
            now: chrono::Utc::now(),
        };
        terminal.draw(|f| render(f, &app_state, &ctx))?;

        // Results from workers first, so a keypress sees the freshest state
        while let Ok(msg) = rx.try_recv() {
            let effects = app_state.update(msg);
            if runtime.apply(&app_state, effects) {
                return Ok(());
            }
        }

        if event::poll(Duration::from_millis(50))? {
            let action = match event::read()? {
                Event::Key(key) => key_action(key),
                Event::Mouse(mouse) => mouse_action(mouse),
                _ => None,
            };
            if let Some(action) = action {
                let effects = app_state.update(Message::Key(action));
                if runtime.apply(&app_state, effects) {
                    return Ok(());
                }
            }
        }
    }
}

struct Runtime<'a> {
    services: &'a Services,
    tx: Sender<Message>,
}

impl Runtime<'_> {
    /// Carry out `effects`. Returns true when the app should exit.
    fn apply(&self, app_state: &AppState, effects: Vec<Effect>) -> bool {
        for effect in effects {
            match effect {
                Effect::Quit => return true,
                Effect::ScheduleTick => self.spawn_tick(),
                Effect::Scan { generation, path } => {
                    app_state.progress.reset();
                    self.spawn_scan(generation, path, Arc::clone(&app_state.progress));
                }
                Effect::MeasureOverview(path) => self.spawn_measure(path),
                Effect::Delete(path) => self.spawn_delete(path, Arc::clone(&app_state.delete_count)),
                Effect::Open(path) => tools::open_path(&path, self.services.open_timeout),
                Effect::Reveal(path) => tools::reveal_path(&path, self.services.open_timeout),
                Effect::InvalidateCache(path) => self.services.cache.invalidate(&path),
                Effect::StoreOverviewSize { path, size } => {
                    if let Some(store) = self.services.cache.store() {
                        if let Err(e) = store.store_overview_size(&path, size) {
                            warn!("failed to store size of {}: {:#}", path.display(), e);
                        }
                    }
                }
            }
        }
        false
    }

    fn spawn_tick(&self) {
        let tx = self.tx.clone();
        let interval = self.services.tick;
        thread::spawn(move || {
            thread::sleep(interval);
            let _ = tx.send(Message::Tick);
        });
    }

    fn spawn_scan(&self, generation: u64, path: PathBuf, progress: Arc<ScanProgress>) {
        let cache = Arc::clone(&self.services.cache);
        let tx = self.tx.clone();
        thread::spawn(move || {
            let started = Instant::now();
            let result = cache.get_or_scan(&path, &progress);
            match &result {
                Ok(scan) => info!(
                    "scanned {} ({} bytes) in {:?}",
                    path.display(),
                    scan.total_size,
                    started.elapsed()
                ),
                Err(e) => warn!("scan of {} failed: {}", path.display(), e),
            }
            let _ = tx.send(Message::ScanFinished {
                generation,
                path,
                result,
            });
        });
    }

    fn spawn_measure(&self, path: PathBuf) {
        let resolver = Arc::clone(&self.services.resolver);
        let tx = self.tx.clone();
        thread::spawn(move || {
            let result = resolver.measure(&path);
            debug!("measured {}: {:?}", path.display(), result.as_ref().ok());
            let _ = tx.send(Message::OverviewMeasured { path, result });
        });
    }

    fn spawn_delete(&self, path: PathBuf, count: Arc<AtomicU64>) {
        let deleter = Arc::clone(&self.services.deleter);
        let tx = self.tx.clone();
        thread::spawn(move || {
            let result = deleter.delete(&path, &count);
            if let Err(e) = &result {
                warn!("{}", e);
            }
            let _ = tx.send(Message::DeleteFinished { path, result });
        });
    }
}
