use crate::catalog::{self, COLUMNS};
use crate::controller::{REFRESH_INTERVALS, StatsPageController, Tab};
use crate::error::Result;
use crate::model::PaginationEvent;
use crate::storage::{StatsStore, StoreSummary};
use crossterm::{
    event::{
        self, DisableFocusChange, DisableMouseCapture, EnableFocusChange, EnableMouseCapture, Event,
        KeyCode, KeyEventKind, KeyModifiers, MouseEventKind,
    },
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, prelude::*};
use std::io::{self, stdout};
use std::path::Path;
use std::time::{Duration, Instant};

use super::ui;

/// Page length menu for `+`/`-`
pub const PAGE_LENGTHS: [usize; 5] = [10, 25, 50, 100, 200];

/// Dashboard application state around the stats page controller
pub struct App {
    pub controller: StatsPageController<StatsStore>,
    file_name: String,
    running: bool,
    selected_row: usize,
    /// Index into the table columns of the column `s` sorts by
    selected_column: usize,
    /// Filter text being typed; `Some` while the filter prompt is open
    filter_input: Option<String>,
    summary: Option<StoreSummary>,
}

impl App {
    pub fn new(controller: StatsPageController<StatsStore>, path: &Path) -> Self {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("stats")
            .to_string();
        let selected_column = COLUMNS
            .iter()
            .position(|c| c.sort_key == controller.query().sort_field)
            .unwrap_or(1);

        App {
            controller,
            file_name,
            running: true,
            selected_row: 0,
            selected_column,
            filter_input: None,
            summary: None,
        }
    }

    pub fn run(&mut self) -> Result<()> {
        // Setup terminal
        enable_raw_mode()?;
        let mut stdout = stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture, EnableFocusChange)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let result = self.main_loop(&mut terminal);

        // Timers and chart sessions go away with the page
        self.controller.destroy();

        // Restore terminal
        disable_raw_mode()?;
        execute!(
            terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture,
            DisableFocusChange
        )?;
        terminal.show_cursor()?;

        result
    }

    fn main_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
        self.controller.mount(Instant::now());
        tracing::info!(file = %self.file_name, "dashboard mounted");

        while self.running {
            if event::poll(Duration::from_millis(50))? {
                match event::read()? {
                    Event::Key(key) if key.kind == KeyEventKind::Press => {
                        self.handle_key(key.code, key.modifiers, Instant::now());
                    }
                    Event::Mouse(mouse) => match mouse.kind {
                        MouseEventKind::ScrollUp => self.move_selection(-1),
                        MouseEventKind::ScrollDown => self.move_selection(1),
                        _ => {}
                    },
                    Event::FocusGained => self.controller.set_page_visible(true),
                    Event::FocusLost => self.controller.set_page_visible(false),
                    _ => {}
                }
            }

            self.tick(Instant::now(), chrono::Utc::now().timestamp());

            terminal.draw(|frame| {
                ui::render(frame, self);
            })?;
        }

        Ok(())
    }

    /// Advance timers and chart fetches, then keep the selection on the page
    pub fn tick(&mut self, now: Instant, now_secs: i64) {
        self.controller.poll(now, now_secs);
        let rows = self.row_count();
        self.selected_row = self.selected_row.min(rows.saturating_sub(1));
    }

    pub fn handle_key(&mut self, key: KeyCode, modifiers: KeyModifiers, now: Instant) {
        if self.filter_input.is_some() {
            self.handle_filter_key(key);
            return;
        }
        let ctrl = modifiers.contains(KeyModifiers::CONTROL);

        match key {
            KeyCode::Char('q') | KeyCode::Esc => self.running = false,
            KeyCode::Char('c') if ctrl => self.running = false,

            // Tabs
            KeyCode::Tab => {
                let next = Tab::from_index(self.controller.tab().index() + 1).unwrap_or(Tab::Overview);
                self.select_tab(next, now);
            }
            KeyCode::Char('1') => self.select_tab(Tab::Overview, now),
            KeyCode::Char('2') => self.select_tab(Tab::Storage, now),

            _ if self.controller.tab() != Tab::Overview => {}

            // Rows
            KeyCode::Char('j') | KeyCode::Down => self.move_selection(1),
            KeyCode::Char('k') | KeyCode::Up => self.move_selection(-1),
            KeyCode::Home => self.selected_row = 0,
            KeyCode::End => self.selected_row = self.row_count().saturating_sub(1),
            KeyCode::Enter | KeyCode::Char(' ') => {
                if let Some(node_id) = self.selected_node_id() {
                    let expanded = self.controller.toggle_node(&node_id);
                    tracing::debug!(node = %node_id, expanded, "toggled node drill-down");
                }
            }

            // Sorting
            KeyCode::Char('h') | KeyCode::Left => self.move_column(-1),
            KeyCode::Char('l') | KeyCode::Right => self.move_column(1),
            KeyCode::Char('s') => {
                let key = COLUMNS[self.selected_column].sort_key;
                if let Err(e) = self.controller.sort_by(key) {
                    tracing::warn!(error = %e, "sort failed");
                }
            }

            // Paging
            KeyCode::Char('n') | KeyCode::PageDown => self.go_to_page(self.current_page() + 1),
            KeyCode::Char('p') | KeyCode::PageUp => {
                self.go_to_page(self.current_page().saturating_sub(1))
            }
            KeyCode::Char('+') | KeyCode::Char('=') => self.step_page_length(1),
            KeyCode::Char('-') => self.step_page_length(-1),

            // Filter
            KeyCode::Char('/') => {
                self.filter_input = Some(self.controller.query().filter_text.clone().unwrap_or_default());
            }

            // Chart and refresh menus
            KeyCode::Char('m') => {
                let metrics = catalog::chartable_metrics();
                let idx = metrics.iter().position(|m| *m == self.controller.metric()).unwrap_or(0);
                self.controller.set_chart_metric(metrics[(idx + 1) % metrics.len()]);
            }
            KeyCode::Char('w') => {
                let next = self.controller.window().next();
                self.controller.set_chart_window(next);
            }
            KeyCode::Char('r') => {
                let idx = REFRESH_INTERVALS
                    .iter()
                    .position(|d| *d == self.controller.refresh_interval())
                    .unwrap_or(0);
                let next = REFRESH_INTERVALS[(idx + 1) % REFRESH_INTERVALS.len()];
                self.controller.set_refresh_interval(next, now);
            }
            KeyCode::Char('R') => self.controller.refresh(),
            KeyCode::Char('g') => self.controller.toggle_graphs(),
            KeyCode::Char('t') => self.controller.toggle_node_stats(),
            _ => {}
        }
    }

    fn handle_filter_key(&mut self, key: KeyCode) {
        match key {
            KeyCode::Enter => {
                let text = self.filter_input.take();
                self.selected_row = 0;
                self.controller.set_filter(text);
            }
            KeyCode::Esc => self.filter_input = None,
            KeyCode::Backspace => {
                if let Some(input) = self.filter_input.as_mut() {
                    input.pop();
                }
            }
            KeyCode::Char(c) => {
                if let Some(input) = self.filter_input.as_mut() {
                    input.push(c);
                }
            }
            _ => {}
        }
    }

    fn select_tab(&mut self, tab: Tab, now: Instant) {
        self.controller.select_tab(tab, now);
        if tab == Tab::Storage {
            self.summary = match self.controller.service().summary() {
                Ok(summary) => Some(summary),
                Err(e) => {
                    tracing::warn!(error = %e, "failed to read store summary");
                    None
                }
            };
        }
    }

    fn move_selection(&mut self, delta: i32) {
        let rows = self.row_count();
        if rows == 0 {
            self.selected_row = 0;
            return;
        }
        let next = (self.selected_row as i64 + delta as i64).clamp(0, rows as i64 - 1);
        self.selected_row = next as usize;
    }

    /// Move the sort cursor to the next sortable column
    fn move_column(&mut self, delta: i32) {
        let sortable: Vec<usize> = (0..COLUMNS.len()).filter(|&i| COLUMNS[i].sortable()).collect();
        let pos = sortable.iter().position(|&i| i == self.selected_column).unwrap_or(0) as i64;
        let next = (pos + delta as i64).clamp(0, sortable.len() as i64 - 1);
        self.selected_column = sortable[next as usize];
    }

    fn go_to_page(&mut self, page: usize) {
        let page = page.clamp(1, self.page_count());
        if page == self.current_page() {
            return;
        }
        self.selected_row = 0;
        let length = self.controller.query().page_length;
        self.controller.on_pagination(PaginationEvent::to_page(length, page));
    }

    fn step_page_length(&mut self, delta: i32) {
        let length = self.controller.query().page_length;
        let idx = PAGE_LENGTHS.iter().position(|l| *l == length).unwrap_or(0) as i64;
        let next = PAGE_LENGTHS[(idx + delta as i64).clamp(0, PAGE_LENGTHS.len() as i64 - 1) as usize];
        if next != length {
            self.selected_row = 0;
            self.controller.on_pagination(PaginationEvent::to_page(next, 1));
        }
    }

    pub fn row_count(&self) -> usize {
        self.controller.snapshot().map_or(0, |s| s.rows.len())
    }

    pub fn current_page(&self) -> usize {
        self.controller.query().current_page
    }

    pub fn page_count(&self) -> usize {
        let total = self.controller.snapshot().map_or(0, |s| s.total_row_count);
        total.div_ceil(self.controller.query().page_length.max(1)).max(1)
    }

    pub fn selected_node_id(&self) -> Option<String> {
        self.controller
            .snapshot()
            .and_then(|s| s.rows.get(self.selected_row))
            .map(|r| r.node_id.clone())
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn selected_row(&self) -> usize {
        self.selected_row
    }

    pub fn selected_column(&self) -> usize {
        self.selected_column
    }

    pub fn filter_input(&self) -> Option<&str> {
        self.filter_input.as_deref()
    }

    pub fn summary(&self) -> Option<&StoreSummary> {
        self.summary.as_ref()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::controller::DashboardConfig;
    use crate::settings::UserSettings;
    use crate::storage::{NodeSample, StatsWriter};
    use tempfile::TempDir;

    pub(crate) fn seeded_app(nodes: usize) -> (TempDir, App) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.db");

        let mut writer = StatsWriter::open(&path).unwrap();
        for i in 0..nodes {
            writer.record(NodeSample {
                node: format!("node-{:02}", i + 1),
                timestamp: 1000,
                delta_ms: 1000,
                cpu: 10.0 * (i + 1) as f64,
                delta_packets: 100.0,
                ..Default::default()
            });
        }
        writer.flush().unwrap();

        let store = StatsStore::open(&path).unwrap();
        let config = DashboardConfig {
            page_length: 10,
            ..DashboardConfig::default()
        };
        let controller = StatsPageController::new(store, config, UserSettings::default());
        let mut app = App::new(controller, &path);
        app.controller.mount(Instant::now());
        (dir, app)
    }

    fn press(app: &mut App, key: KeyCode) {
        app.handle_key(key, KeyModifiers::NONE, Instant::now());
    }

    #[test]
    fn test_paging_keys() {
        let (_dir, mut app) = seeded_app(25);
        assert_eq!(app.page_count(), 3);
        assert_eq!(app.row_count(), 10);

        press(&mut app, KeyCode::Char('n'));
        assert_eq!(app.current_page(), 2);
        assert_eq!(app.controller.query().start_offset, 10);

        press(&mut app, KeyCode::PageDown);
        press(&mut app, KeyCode::PageDown);
        assert_eq!(app.current_page(), 3);
        assert_eq!(app.row_count(), 5);

        press(&mut app, KeyCode::Char('+'));
        assert_eq!(app.controller.query().page_length, 25);
        assert_eq!(app.current_page(), 1);
    }

    #[test]
    fn test_filter_prompt() {
        let (_dir, mut app) = seeded_app(12);
        press(&mut app, KeyCode::Char('/'));
        for c in "node-1".chars() {
            press(&mut app, KeyCode::Char(c));
        }
        // Keys go to the prompt, not the page
        assert_eq!(app.current_page(), 1);
        press(&mut app, KeyCode::Enter);

        assert_eq!(app.filter_input(), None);
        assert_eq!(app.controller.query().filter_text.as_deref(), Some("node-1"));
        // node-10, node-11, node-12
        assert_eq!(app.controller.snapshot().unwrap().total_row_count, 3);
    }

    #[test]
    fn test_sort_selected_column() {
        let (_dir, mut app) = seeded_app(3);
        // Node -> Time -> Sessions -> Free Space -> CPU
        for _ in 0..4 {
            press(&mut app, KeyCode::Char('l'));
        }
        assert_eq!(COLUMNS[app.selected_column()].sort_key, "cpu");

        press(&mut app, KeyCode::Char('s'));
        press(&mut app, KeyCode::Char('s'));
        assert!(app.controller.query().sort_descending);
        assert_eq!(app.controller.snapshot().unwrap().rows[0].node_name, "node-03");
    }

    #[test]
    fn test_enter_toggles_drilldown() {
        let (_dir, mut app) = seeded_app(2);
        press(&mut app, KeyCode::Char('j'));
        press(&mut app, KeyCode::Enter);
        assert!(app.controller.drilldowns().is_expanded("node-02"));
        press(&mut app, KeyCode::Enter);
        assert!(app.controller.drilldowns().is_empty());
    }

    #[test]
    fn test_storage_tab_stops_refresh() {
        let (_dir, mut app) = seeded_app(2);
        press(&mut app, KeyCode::Char('2'));
        assert_eq!(app.controller.tab(), Tab::Storage);
        assert!(!app.controller.scheduler().is_armed());
        assert_eq!(app.summary().unwrap().nodes, 2);

        // Table keys are ignored away from the overview
        press(&mut app, KeyCode::Char('g'));
        assert!(app.controller.graphs_open());

        press(&mut app, KeyCode::Tab);
        assert_eq!(app.controller.tab(), Tab::Overview);
        assert!(app.controller.scheduler().is_armed());
    }

    #[test]
    fn test_quit() {
        let (_dir, mut app) = seeded_app(1);
        press(&mut app, KeyCode::Char('q'));
        assert!(!app.is_running());
    }
}
