//! Application state management for TUI
//!
//! `AppState` is the navigation model. It never performs I/O: every input is a
//! [`Message`], and [`AppState::update`] answers with the [`Effect`]s the
//! runtime must carry out. Background work reports back with another message.

use crate::error::AnalyzeError;
use crate::model::{sum_known_sizes, Entry, FileRecord, HistoryFrame, ScanResult, Selection};
use crate::overview::{self, OverviewScheduler};
use crate::progress::ScanProgress;
use crate::size::{format_bytes, format_number};
use crate::spinner;
use crate::utils::display_path;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// User intent, already decoupled from concrete key bindings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Up,
    Down,
    Enter,
    Back,
    Refresh,
    ToggleLargeFiles,
    Open,
    Reveal,
    Delete,
    Escape,
    Quit,
    /// Any other key. Still meaningful: it cancels a pending delete.
    Other,
}

#[derive(Debug, Clone)]
pub enum Message {
    Key(Action),
    Tick,
    ScanFinished {
        generation: u64,
        path: PathBuf,
        result: Result<ScanResult, AnalyzeError>,
    },
    OverviewMeasured {
        path: PathBuf,
        result: Result<u64, AnalyzeError>,
    },
    DeleteFinished {
        path: PathBuf,
        result: Result<u64, AnalyzeError>,
    },
}

/// Work the runtime performs on behalf of the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Cache-first scan; answers with `ScanFinished` carrying the same generation.
    Scan { generation: u64, path: PathBuf },
    /// Answers with `OverviewMeasured`.
    MeasureOverview(PathBuf),
    /// Answers with `DeleteFinished`, bumping the shared delete counter as it goes.
    Delete(PathBuf),
    Open(PathBuf),
    Reveal(PathBuf),
    InvalidateCache(PathBuf),
    StoreOverviewSize { path: PathBuf, size: u64 },
    /// Send `Tick` after one tick interval.
    ScheduleTick,
    Quit,
}

/// The item a delete was requested for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteTarget {
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
    pub is_dir: bool,
}

impl From<&Entry> for DeleteTarget {
    fn from(entry: &Entry) -> Self {
        Self {
            name: entry.name.clone(),
            path: entry.path.clone(),
            size: entry.known_size(),
            is_dir: entry.is_dir,
        }
    }
}

impl From<&FileRecord> for DeleteTarget {
    fn from(file: &FileRecord) -> Self {
        Self {
            name: file.name.clone(),
            path: file.path.clone(),
            size: file.size,
            is_dir: false,
        }
    }
}

/// Current screen being displayed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screen {
    Scanning,
    Browsing,
    BrowsingLargeFiles,
    OverviewBrowsing,
    DeleteConfirm { target: DeleteTarget },
    Deleting { target: DeleteTarget },
}

#[derive(Debug, Clone, Copy)]
pub struct Settings {
    pub entry_viewport: usize,
    pub large_viewport: usize,
    pub overview_batch: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            entry_viewport: 20,
            large_viewport: 20,
            overview_batch: 3,
        }
    }
}

pub struct AppState {
    pub screen: Screen,
    pub path: PathBuf,
    pub is_overview: bool,
    pub show_large_files: bool,
    pub entries: Vec<Entry>,
    pub large_files: Vec<FileRecord>,
    pub total_size: u64,
    pub selection: Selection,
    pub history: Vec<HistoryFrame>,
    /// Last result seen for each path, reused on re-entry unless dirty.
    pub view_cache: HashMap<PathBuf, HistoryFrame>,
    pub status: String,
    /// Animation frame counter
    pub tick: usize,
    pub progress: Arc<ScanProgress>,
    pub delete_count: Arc<AtomicU64>,
    settings: Settings,
    overview_template: Vec<Entry>,
    overview_sizes: HashMap<PathBuf, u64>,
    scheduler: OverviewScheduler,
    scan_generation: u64,
    tick_scheduled: bool,
}

impl AppState {
    /// `start` is `None` for the overview. `overview_sizes` are sizes persisted
    /// by earlier runs.
    pub fn new(
        start: Option<PathBuf>,
        settings: Settings,
        overview_entries: Vec<Entry>,
        overview_sizes: HashMap<PathBuf, u64>,
    ) -> Self {
        let is_overview = start.is_none();
        Self {
            screen: if is_overview {
                Screen::OverviewBrowsing
            } else {
                Screen::Scanning
            },
            path: start.unwrap_or_else(|| PathBuf::from("/")),
            is_overview,
            show_large_files: false,
            entries: Vec::new(),
            large_files: Vec::new(),
            total_size: 0,
            selection: Selection::default(),
            history: Vec::new(),
            view_cache: HashMap::new(),
            status: "Preparing scan...".to_string(),
            tick: 0,
            progress: Arc::new(ScanProgress::new()),
            delete_count: Arc::new(AtomicU64::new(0)),
            settings,
            overview_template: overview_entries,
            overview_sizes,
            scheduler: OverviewScheduler::new(settings.overview_batch),
            scan_generation: 0,
            tick_scheduled: false,
        }
    }

    /// Effects to run right after construction.
    pub fn init(&mut self) -> Vec<Effect> {
        if self.is_overview {
            self.hydrate_overview_entries();
            if overview::has_pending(&self.entries) {
                self.status = "Estimating system roots...".to_string();
            } else {
                self.status = "Ready".to_string();
            }
            self.schedule_overview()
        } else {
            self.start_scan()
        }
    }

    pub fn is_scanning(&self) -> bool {
        matches!(self.screen, Screen::Scanning)
    }

    pub fn is_deleting(&self) -> bool {
        matches!(self.screen, Screen::Deleting { .. })
    }

    pub fn spinner_frame(&self) -> &'static str {
        spinner::frame(self.tick)
    }

    pub fn overview_active(&self) -> bool {
        self.is_overview && (self.scheduler.is_active() || overview::has_pending(&self.entries))
    }

    pub fn update(&mut self, msg: Message) -> Vec<Effect> {
        match msg {
            Message::Key(action) => self.on_key(action),
            Message::Tick => self.on_tick(),
            Message::ScanFinished {
                generation,
                path,
                result,
            } => self.on_scan_finished(generation, path, result),
            Message::OverviewMeasured { path, result } => self.on_overview_measured(path, result),
            Message::DeleteFinished { path, result } => self.on_delete_finished(path, result),
        }
    }

    /// A history frame describing the current view.
    pub fn snapshot(&self) -> HistoryFrame {
        HistoryFrame {
            path: self.path.clone(),
            entries: self.entries.clone(),
            large_files: self.large_files.clone(),
            total_size: self.total_size,
            selection: self.selection,
            dirty: false,
        }
    }

    fn browse_screen(&self) -> Screen {
        if self.is_overview {
            Screen::OverviewBrowsing
        } else if self.show_large_files {
            Screen::BrowsingLargeFiles
        } else {
            Screen::Browsing
        }
    }

    fn ensure_tick(&mut self) -> Option<Effect> {
        if self.tick_scheduled {
            return None;
        }
        self.tick_scheduled = true;
        Some(Effect::ScheduleTick)
    }

    fn start_scan(&mut self) -> Vec<Effect> {
        self.scan_generation += 1;
        self.screen = Screen::Scanning;
        let mut effects = vec![Effect::Scan {
            generation: self.scan_generation,
            path: self.path.clone(),
        }];
        effects.extend(self.ensure_tick());
        effects
    }

    /// Results of any scan still running no longer apply.
    fn abandon_scan(&mut self) {
        self.scan_generation += 1;
    }

    // ---- keys ----

    fn on_key(&mut self, action: Action) -> Vec<Effect> {
        match &self.screen {
            Screen::DeleteConfirm { target } => {
                let target = target.clone();
                return self.on_delete_confirm_key(action, target);
            }
            Screen::Deleting { .. } => {
                return match action {
                    Action::Quit => vec![Effect::Quit],
                    _ => Vec::new(),
                };
            }
            Screen::Scanning => {
                return match action {
                    Action::Quit => vec![Effect::Quit],
                    Action::Escape if self.show_large_files => {
                        self.show_large_files = false;
                        Vec::new()
                    }
                    Action::Escape => vec![Effect::Quit],
                    Action::Back => self.go_back(),
                    _ => Vec::new(),
                };
            }
            _ => {}
        }

        match action {
            Action::Quit => vec![Effect::Quit],
            Action::Escape => {
                if self.show_large_files {
                    self.close_large_files();
                    Vec::new()
                } else {
                    vec![Effect::Quit]
                }
            }
            Action::Up => {
                self.move_up();
                Vec::new()
            }
            Action::Down => {
                self.move_down();
                Vec::new()
            }
            Action::Enter => {
                if self.show_large_files {
                    Vec::new()
                } else {
                    self.enter_selected()
                }
            }
            Action::Back => {
                if self.show_large_files {
                    self.close_large_files();
                    Vec::new()
                } else {
                    self.go_back()
                }
            }
            Action::Refresh => self.refresh(),
            Action::ToggleLargeFiles => {
                self.toggle_large_files();
                Vec::new()
            }
            Action::Open => self.open_selected(false),
            Action::Reveal => self.open_selected(true),
            Action::Delete => {
                self.request_delete();
                Vec::new()
            }
            Action::Other => Vec::new(),
        }
    }

    fn on_delete_confirm_key(&mut self, action: Action, target: DeleteTarget) -> Vec<Effect> {
        if action != Action::Delete {
            self.status = "Cancelled".to_string();
            self.screen = self.browse_screen();
            return Vec::new();
        }
        self.delete_count.store(0, Ordering::Relaxed);
        self.status = format!("Deleting {}...", target.name);
        let path = target.path.clone();
        self.screen = Screen::Deleting { target };
        let mut effects = vec![Effect::Delete(path)];
        effects.extend(self.ensure_tick());
        effects
    }

    fn move_up(&mut self) {
        let sel = &mut self.selection;
        if self.show_large_files {
            if sel.large_selected > 0 {
                sel.large_selected -= 1;
                if sel.large_selected < sel.large_offset {
                    sel.large_offset = sel.large_selected;
                }
            }
        } else if sel.selected > 0 {
            sel.selected -= 1;
            if sel.selected < sel.offset {
                sel.offset = sel.selected;
            }
        }
    }

    fn move_down(&mut self) {
        let sel = &mut self.selection;
        if self.show_large_files {
            if sel.large_selected + 1 < self.large_files.len() {
                sel.large_selected += 1;
                let viewport = self.settings.large_viewport.max(1);
                if sel.large_selected >= sel.large_offset + viewport {
                    sel.large_offset = sel.large_selected + 1 - viewport;
                }
            }
        } else if sel.selected + 1 < self.entries.len() {
            sel.selected += 1;
            let viewport = self.settings.entry_viewport.max(1);
            if sel.selected >= sel.offset + viewport {
                sel.offset = sel.selected + 1 - viewport;
            }
        }
    }

    fn enter_selected(&mut self) -> Vec<Effect> {
        let Some(selected) = self.entries.get(self.selection.selected).cloned() else {
            return Vec::new();
        };
        if !selected.is_dir || selected.is_symlink {
            self.status = format!(
                "File: {} ({})",
                selected.name,
                format_bytes(selected.known_size())
            );
            return Vec::new();
        }

        if !self.is_overview {
            self.history.push(self.snapshot());
        }
        self.path = selected.path;
        self.is_overview = false;
        self.show_large_files = false;
        self.selection = Selection::default();
        self.abandon_scan();

        if let Some(cached) = self.view_cache.get(&self.path).filter(|f| !f.dirty).cloned() {
            self.restore_frame(cached);
            self.status = format!("Cached view for {}", display_path(&self.path));
            return Vec::new();
        }

        self.status = "Scanning...".to_string();
        self.start_scan()
    }

    fn restore_frame(&mut self, frame: HistoryFrame) {
        self.path = frame.path;
        self.entries = frame.entries;
        self.large_files = frame.large_files;
        self.total_size = frame.total_size;
        self.selection = frame.selection;
        self.clamp_entry_selection();
        self.clamp_large_selection();
        self.screen = self.browse_screen();
    }

    fn go_back(&mut self) -> Vec<Effect> {
        let Some(frame) = self.history.pop() else {
            if self.is_overview {
                return Vec::new();
            }
            return self.switch_to_overview();
        };

        self.abandon_scan();
        self.is_overview = false;
        self.show_large_files = false;
        if frame.dirty {
            self.path = frame.path;
            self.selection = frame.selection;
            self.status = "Scanning...".to_string();
            return self.start_scan();
        }

        self.restore_frame(frame);
        self.status = format!("Scanned {}", format_bytes(self.total_size));
        Vec::new()
    }

    fn switch_to_overview(&mut self) -> Vec<Effect> {
        self.abandon_scan();
        self.is_overview = true;
        self.path = PathBuf::from("/");
        self.show_large_files = false;
        self.large_files.clear();
        self.selection = Selection::default();
        self.hydrate_overview_entries();
        self.screen = Screen::OverviewBrowsing;
        self.status = "Ready".to_string();
        self.schedule_overview()
    }

    fn refresh(&mut self) -> Vec<Effect> {
        if self.is_overview {
            // Forget every shortcut size and measure again.
            let mut effects = Vec::new();
            for entry in &mut self.entries {
                self.overview_sizes.remove(&entry.path);
                if !self.scheduler.is_in_flight(&entry.path) {
                    entry.size = None;
                }
                effects.push(Effect::InvalidateCache(entry.path.clone()));
            }
            self.total_size = sum_known_sizes(&self.entries);
            effects.extend(self.schedule_overview());
            return effects;
        }
        self.status = "Refreshing...".to_string();
        self.start_scan()
    }

    fn toggle_large_files(&mut self) {
        if self.is_overview {
            return;
        }
        self.show_large_files = !self.show_large_files;
        if self.show_large_files {
            self.selection.large_selected = 0;
            self.selection.large_offset = 0;
        }
        self.clamp_large_selection();
        self.screen = self.browse_screen();
    }

    fn close_large_files(&mut self) {
        self.show_large_files = false;
        self.screen = self.browse_screen();
    }

    /// Name and path of whatever the cursor is on.
    fn selected_item(&self) -> Option<(String, PathBuf)> {
        if self.show_large_files {
            self.large_files
                .get(self.selection.large_selected)
                .map(|f| (f.name.clone(), f.path.clone()))
        } else {
            self.entries
                .get(self.selection.selected)
                .map(|e| (e.name.clone(), e.path.clone()))
        }
    }

    fn open_selected(&mut self, reveal: bool) -> Vec<Effect> {
        let Some((name, path)) = self.selected_item() else {
            return Vec::new();
        };
        if reveal {
            self.status = format!("Revealing {}...", name);
            vec![Effect::Reveal(path)]
        } else {
            self.status = format!("Opening {}...", name);
            vec![Effect::Open(path)]
        }
    }

    fn request_delete(&mut self) {
        let target = if self.show_large_files {
            self.large_files
                .get(self.selection.large_selected)
                .map(DeleteTarget::from)
        } else if !self.is_overview {
            self.entries.get(self.selection.selected).map(DeleteTarget::from)
        } else {
            None
        };
        if let Some(target) = target {
            self.status = format!(
                "Delete {} ({})? Press Delete again to confirm, any other key to cancel",
                target.name,
                format_bytes(target.size)
            );
            self.screen = Screen::DeleteConfirm { target };
        }
    }

    // ---- background results ----

    fn on_tick(&mut self) -> Vec<Effect> {
        self.tick_scheduled = false;
        let active = self.is_scanning() || self.is_deleting() || self.overview_active();
        if !active {
            return Vec::new();
        }
        self.tick = spinner::advance(self.tick);
        if self.is_deleting() {
            let count = self.delete_count.load(Ordering::Relaxed);
            if count > 0 {
                self.status = format!("Deleting... {} items removed", format_number(count));
            }
        }
        self.ensure_tick().into_iter().collect()
    }

    fn on_scan_finished(
        &mut self,
        generation: u64,
        path: PathBuf,
        result: Result<ScanResult, AnalyzeError>,
    ) -> Vec<Effect> {
        if generation != self.scan_generation || !self.is_scanning() || path != self.path {
            return Vec::new();
        }
        self.screen = self.browse_screen();

        let scan = match result {
            Ok(scan) => scan,
            Err(e) => {
                self.entries.clear();
                self.large_files.clear();
                self.total_size = 0;
                self.clamp_entry_selection();
                self.clamp_large_selection();
                self.status = format!("Scan failed: {}", e);
                return Vec::new();
            }
        };

        self.entries = scan.entries;
        self.large_files = scan.large_files;
        self.total_size = scan.total_size;
        self.status = format!("Scanned {}", format_bytes(self.total_size));
        self.clamp_entry_selection();
        self.clamp_large_selection();
        self.view_cache.insert(self.path.clone(), self.snapshot());

        if self.total_size > 0 {
            self.overview_sizes.insert(self.path.clone(), self.total_size);
            return vec![Effect::StoreOverviewSize {
                path: self.path.clone(),
                size: self.total_size,
            }];
        }
        Vec::new()
    }

    fn on_overview_measured(&mut self, path: PathBuf, result: Result<u64, AnalyzeError>) -> Vec<Effect> {
        self.scheduler.complete(&path);
        if let Ok(size) = &result {
            self.overview_sizes.insert(path.clone(), *size);
        }
        if !self.is_overview {
            return Vec::new();
        }

        if let Some(entry) = self.entries.iter_mut().find(|e| e.path == path) {
            // A failed measurement shows as zero instead of blocking the view.
            entry.size = Some(result.as_ref().copied().unwrap_or(0));
        }
        self.total_size = sum_known_sizes(&self.entries);
        if let Err(e) = &result {
            self.status = format!("Unable to measure {}: {}", display_path(&path), e);
        }
        self.schedule_overview()
    }

    fn on_delete_finished(&mut self, path: PathBuf, result: Result<u64, AnalyzeError>) -> Vec<Effect> {
        if !self.is_deleting() {
            return Vec::new();
        }
        self.screen = self.browse_screen();

        let count = match result {
            Ok(count) => count,
            Err(e) => {
                self.status = format!("Failed to delete: {}", e);
                return Vec::new();
            }
        };

        self.remove_path_from_view(&path);
        let mut effects = vec![
            Effect::InvalidateCache(path.clone()),
            Effect::InvalidateCache(self.path.clone()),
        ];
        self.overview_sizes.remove(&path);
        self.overview_sizes.remove(&self.path);
        for frame in &mut self.history {
            frame.dirty = true;
        }
        for frame in self.view_cache.values_mut() {
            frame.dirty = true;
        }
        self.status = format!("Deleted {} items", format_number(count));

        effects.extend(self.start_scan());
        effects
    }

    // ---- overview ----

    fn hydrate_overview_entries(&mut self) {
        self.entries = self.overview_template.clone();
        for entry in &mut self.entries {
            if let Some(size) = self.overview_sizes.get(&entry.path) {
                entry.size = Some(*size);
            }
        }
        self.total_size = sum_known_sizes(&self.entries);
        self.clamp_entry_selection();
    }

    fn schedule_overview(&mut self) -> Vec<Effect> {
        if !self.is_overview {
            return Vec::new();
        }
        let batch = self.scheduler.schedule(&self.entries);
        if batch.is_empty() {
            if !overview::has_pending(&self.entries) {
                self.status = "Ready".to_string();
            }
            return Vec::new();
        }

        let remaining = self.entries.iter().filter(|e| e.is_pending()).count();
        self.status = if batch.len() == 1 {
            let name = self
                .entries
                .iter()
                .find(|e| e.path == batch[0])
                .map(|e| e.name.clone())
                .unwrap_or_default();
            format!("Scanning {}... ({} left)", name, remaining)
        } else {
            format!("Scanning {} directories... ({} left)", batch.len(), remaining)
        };

        let mut effects: Vec<Effect> = batch.into_iter().map(Effect::MeasureOverview).collect();
        effects.extend(self.ensure_tick());
        effects
    }

    // ---- list maintenance ----

    /// Drop `path` from both lists and take its size off the total.
    pub fn remove_path_from_view(&mut self, path: &Path) {
        let mut removed = None;
        if let Some(i) = self.entries.iter().position(|e| e.path == path) {
            removed = Some(self.entries.remove(i).known_size());
        }
        if let Some(i) = self.large_files.iter().position(|f| f.path == path) {
            let file = self.large_files.remove(i);
            removed.get_or_insert(file.size);
        }
        self.total_size = self.total_size.saturating_sub(removed.unwrap_or(0));
        self.clamp_entry_selection();
        self.clamp_large_selection();
    }

    pub fn clamp_entry_selection(&mut self) {
        clamp(
            &mut self.selection.selected,
            &mut self.selection.offset,
            self.entries.len(),
            self.settings.entry_viewport,
        );
    }

    pub fn clamp_large_selection(&mut self) {
        clamp(
            &mut self.selection.large_selected,
            &mut self.selection.large_offset,
            self.large_files.len(),
            self.settings.large_viewport,
        );
    }
}

/// Keep `selected` inside the list and inside the viewport window at `offset`.
fn clamp(selected: &mut usize, offset: &mut usize, len: usize, viewport: usize) {
    if len == 0 {
        *selected = 0;
        *offset = 0;
        return;
    }
    let viewport = viewport.max(1);
    *selected = (*selected).min(len - 1);
    *offset = (*offset).min(len.saturating_sub(viewport));
    if *selected < *offset {
        *offset = *selected;
    }
    if *selected >= *offset + viewport {
        *offset = *selected + 1 - viewport;
    }
}
