use super::app::App;
use crate::catalog::{COLUMNS, LEADING_COLUMNS};
use crate::chart::{NodeDrilldownSession, Sample, UNABLE_TO_LOAD, WindowedChart};
use crate::controller::Tab;
use crate::format;
use crate::settings::Timezone;
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Cell, Chart, Dataset, GraphType, Paragraph, Row, Sparkline, Table, Tabs},
};

/// Drawn over sparkline bars whose fetch failed
const UNAVAILABLE_MARK: &str = "×";

pub fn render(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Header (single line, no border)
            Constraint::Min(10),   // Main content
            Constraint::Length(1), // Footer (single line, no border)
        ])
        .split(frame.area());

    render_header(frame, app, chunks[0]);
    match app.controller.tab() {
        Tab::Overview => render_overview(frame, app, chunks[1]),
        Tab::Storage => render_storage(frame, app, chunks[1]),
    }
    render_footer(frame, app, chunks[2]);
}

fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let controller = &app.controller;
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(34), Constraint::Min(10)])
        .split(area);

    let titles: Vec<&str> = Tab::ALL.iter().map(|t| t.title()).collect();
    let tabs = Tabs::new(titles)
        .select(controller.tab().index())
        .highlight_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
        .divider("│");
    let title = Line::from(vec![
        Span::styled("nodestats", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
        Span::raw(" "),
    ]);
    let tab_area = Rect {
        x: chunks[0].x + title.width() as u16,
        width: chunks[0].width.saturating_sub(title.width() as u16),
        ..chunks[0]
    };
    frame.render_widget(Paragraph::new(title), chunks[0]);
    frame.render_widget(tabs, tab_area);

    let status = if let Some(err) = controller.error() {
        Span::styled(format!(" ERROR {} ", err), Style::default().bg(Color::Red).fg(Color::White))
    } else if controller.is_loading() {
        Span::styled(" LOADING ", Style::default().bg(Color::Yellow).fg(Color::Black))
    } else if controller.refresh_interval().is_zero() {
        Span::styled(" PAUSED ", Style::default().bg(Color::Yellow).fg(Color::Black))
    } else {
        Span::styled(" LIVE ", Style::default().bg(Color::Green).fg(Color::Black))
    };

    let total = controller.snapshot().map_or(0, |s| s.total_row_count);
    let refresh = if controller.refresh_interval().is_zero() {
        "off".to_string()
    } else {
        humantime::format_duration(controller.refresh_interval()).to_string()
    };
    let line = Line::from(vec![
        status,
        Span::raw(format!(
            " {} │ {} nodes │ page {}/{} │ refresh {} │ chart {} {}",
            app.file_name(),
            total,
            app.current_page(),
            app.page_count(),
            refresh,
            controller.metric().name(),
            controller.window().label(),
        )),
    ]);
    frame.render_widget(Paragraph::new(line), chunks[1]);
}

fn render_overview(frame: &mut Frame, app: &App, area: Rect) {
    let controller = &app.controller;
    let show_chart =
        controller.graphs_open() && (controller.cluster().is_some() || !controller.window().is_off());
    let drilldowns: Vec<&NodeDrilldownSession> = if controller.node_stats_open() {
        controller.drilldowns().iter().collect()
    } else {
        Vec::new()
    };

    let mut constraints = Vec::new();
    if show_chart {
        constraints.push(Constraint::Percentage(35));
    }
    constraints.push(Constraint::Min(6));
    for session in &drilldowns {
        constraints.push(Constraint::Length(session.chart().series().len() as u16 + 2));
    }

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(area);

    let mut next = 0;
    if show_chart {
        render_cluster_chart(frame, app, chunks[next]);
        next += 1;
    }
    render_stats_table(frame, app, chunks[next]);
    next += 1;
    for session in drilldowns {
        if let Some(area) = chunks.get(next) {
            render_drilldown(frame, session, *area);
        }
        next += 1;
    }
}

fn render_cluster_chart(frame: &mut Frame, app: &App, area: Rect) {
    let controller = &app.controller;
    let Some(cluster) = controller.cluster() else {
        // No nodes reported yet; the chart is built from the first non-empty snapshot
        let block = Block::default()
            .title(format!(" {} [{}] ", controller.metric().name(), controller.window().label()))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray));
        let msg = Paragraph::new(" Waiting for nodes...")
            .block(block)
            .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(msg, area);
        return;
    };
    let chart = cluster.chart();
    let running = if cluster.is_running() { "" } else { " (paused)" };
    let mut title = vec![Span::raw(format!(
        " {} [{}]{} ",
        cluster.metric().name(),
        cluster.window().label(),
        running
    ))];
    let failed: Vec<String> = chart
        .series()
        .iter()
        .filter(|s| s.error().is_some())
        .map(|s| node_label(app, &s.label))
        .collect();
    if !failed.is_empty() {
        title.push(Span::styled(
            format!(" {}: {} ", UNABLE_TO_LOAD, failed.join(", ")),
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ));
    }
    let block = Block::default()
        .title(Line::from(title))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));

    let Some(until) = chart.fetched_until() else {
        let msg = Paragraph::new(" Collecting data...")
            .block(block)
            .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(msg, area);
        return;
    };

    let points: Vec<Vec<(f64, f64)>> = (0..chart.series().len()).map(|i| chart.points(i)).collect();
    // Failed ranges sit on the x axis in red, so they never read as plain gaps
    let unavailable: Vec<(f64, f64)> = (0..chart.series().len())
        .flat_map(|i| chart.unavailable_times(i))
        .map(|t| (t, 0.0))
        .collect();
    let palette = controller.palette();
    let mut datasets: Vec<Dataset> = chart
        .series()
        .iter()
        .zip(&points)
        .enumerate()
        .map(|(i, (series, data))| {
            let color = palette.get(i % palette.len().max(1)).copied().unwrap_or(Color::Green);
            Dataset::default()
                .name(node_label(app, &series.label))
                .marker(symbols::Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(color))
                .data(data)
        })
        .collect();
    if !unavailable.is_empty() {
        datasets.push(
            Dataset::default()
                .marker(symbols::Marker::Dot)
                .graph_type(GraphType::Scatter)
                .style(Style::default().fg(Color::Red))
                .data(&unavailable),
        );
    }

    let x_end = until as f64;
    let x_start = x_end - chart.window().as_secs_f64();
    let y_max = points
        .iter()
        .flatten()
        .map(|(_, y)| *y)
        .fold(0.0f64, f64::max);
    let y_max = if y_max > 0.0 { y_max * 1.1 } else { 1.0 };
    let metric = cluster.metric();
    let timezone = controller.settings().timezone;

    let widget = Chart::new(datasets)
        .block(block)
        .x_axis(
            Axis::default()
                .style(Style::default().fg(Color::DarkGray))
                .bounds([x_start, x_end])
                .labels(vec![
                    Span::raw(time_label(timezone, x_start)),
                    Span::raw(time_label(timezone, (x_start + x_end) / 2.0)),
                    Span::raw(time_label(timezone, x_end)),
                ]),
        )
        .y_axis(
            Axis::default()
                .style(Style::default().fg(Color::DarkGray))
                .bounds([0.0, y_max])
                .labels(vec![
                    Span::raw(format::format_metric(metric, 0.0)),
                    Span::raw(format::format_metric(metric, y_max / 2.0)),
                    Span::raw(format::format_metric(metric, y_max)),
                ]),
        );

    frame.render_widget(widget, area);
}

/// Chart legends show node names, which may differ from ids
fn node_label(app: &App, node_id: &str) -> String {
    app.controller
        .snapshot()
        .and_then(|s| s.rows.iter().find(|r| r.node_id == node_id))
        .map_or_else(|| node_id.to_string(), |r| r.node_name.clone())
}

/// `HH:MM:SS` part of a formatted timestamp
fn time_label(timezone: Timezone, unix_secs: f64) -> String {
    let text = timezone.format(unix_secs as i64);
    text.split(' ').nth(1).unwrap_or(&text).to_string()
}

fn render_stats_table(frame: &mut Frame, app: &App, area: Rect) {
    let controller = &app.controller;
    let query = controller.query();
    let timezone = controller.settings().timezone;

    let header_cells = COLUMNS.iter().enumerate().map(|(i, column)| {
        let mut text = column.name.to_string();
        if column.sortable() && column.sort_key == query.sort_field {
            text.push_str(if query.sort_descending { " ▼" } else { " ▲" });
        }
        let mut style = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);
        if i == app.selected_column() {
            style = style.add_modifier(Modifier::UNDERLINED);
        }
        Cell::from(text).style(style)
    });
    let header = Row::new(header_cells).height(1);

    let mut rows: Vec<Row> = Vec::new();
    if let Some(snapshot) = controller.snapshot() {
        for (i, row) in snapshot.rows.iter().enumerate() {
            let expanded = controller.drilldowns().is_expanded(&row.node_id);
            let cells = COLUMNS.iter().enumerate().map(|(c, column)| {
                if c == 0 {
                    Cell::from(if expanded { "▾" } else { "▸" })
                } else {
                    Cell::from(format::format_cell(row, column, timezone))
                }
            });
            let style = if i == app.selected_row() {
                Style::default().bg(Color::DarkGray)
            } else {
                Style::default()
            };
            rows.push(Row::new(cells).style(style));
        }
    }

    if let Some(aggregates) = controller.aggregates() {
        for (label, average) in [("Total", false), ("Average", true)] {
            let cells = COLUMNS.iter().enumerate().map(|(c, column)| {
                if c == 1 {
                    return Cell::from(label);
                }
                match column.metric {
                    Some(metric) if c >= LEADING_COLUMNS => {
                        Cell::from(format::format_aggregate(aggregates, metric, average))
                    }
                    _ => Cell::from(""),
                }
            });
            rows.push(Row::new(cells).style(Style::default().add_modifier(Modifier::BOLD)));
        }
    }

    let mut widths = vec![Constraint::Length(1), Constraint::Length(14), Constraint::Length(19)];
    widths.extend(COLUMNS.iter().skip(LEADING_COLUMNS).map(|c| {
        Constraint::Length((c.name.len() as u16 + 2).max(9))
    }));

    let filter = query
        .filter_text
        .as_deref()
        .map(|f| format!(" filter: {} ", f))
        .unwrap_or_default();
    let block = Block::default()
        .title(format!(" Node Stats {}", filter))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));

    let table = Table::new(rows, widths).header(header).block(block);
    frame.render_widget(table, area);
}

fn render_drilldown(frame: &mut Frame, session: &NodeDrilldownSession, area: Rect) {
    let block = Block::default()
        .title(format!(" {} (1m) ", session.node_id()))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let chart = session.chart();
    for (i, series) in chart.series().iter().enumerate() {
        let y = inner.y + i as u16;
        if y >= inner.y + inner.height {
            break;
        }
        let label_area = Rect { x: inner.x, y, width: 16.min(inner.width), height: 1 };
        let value_area = Rect {
            x: inner.x + label_area.width,
            y,
            width: 10.min(inner.width.saturating_sub(label_area.width)),
            height: 1,
        };
        let spark_area = Rect {
            x: value_area.x + value_area.width,
            y,
            width: inner.width.saturating_sub(label_area.width + value_area.width),
            height: 1,
        };

        frame.render_widget(Paragraph::new(series.label.as_str()), label_area);
        if let Some(message) = series.error() {
            let style = Style::default().fg(Color::Red);
            frame.render_widget(Paragraph::new(message).style(style), spark_area);
            continue;
        }

        let latest = series.latest().map(format::format_count).unwrap_or_default();
        frame.render_widget(Paragraph::new(latest), value_area);

        let (data, unavailable) = sparkline_data(chart, i, spark_area.width as usize);
        let sparkline = Sparkline::default()
            .data(&data)
            .style(Style::default().fg(Color::Green));
        frame.render_widget(sparkline, spark_area);

        let buf = frame.buffer_mut();
        for offset in unavailable {
            buf[(spark_area.x + offset as u16, y)]
                .set_symbol(UNAVAILABLE_MARK)
                .set_fg(Color::Red);
        }
    }
}

/// Last `width` samples scaled to sparkline bars, plus the bar offsets whose
/// fetch failed; gaps draw empty
fn sparkline_data(chart: &WindowedChart, index: usize, width: usize) -> (Vec<u64>, Vec<usize>) {
    let Some(series) = chart.series().get(index) else {
        return (Vec::new(), Vec::new());
    };
    let samples: Vec<&Sample> = series.samples().iter().rev().take(width).collect();
    let max = samples
        .iter()
        .filter_map(|s| match s {
            Sample::Value(v) => Some(*v),
            _ => None,
        })
        .fold(0.0f64, f64::max);

    let samples: Vec<&Sample> = samples.into_iter().rev().collect();
    let unavailable = samples
        .iter()
        .enumerate()
        .filter(|(_, s)| matches!(s, Sample::Unavailable))
        .map(|(i, _)| i)
        .collect();
    let bars = samples
        .into_iter()
        .map(|s| match s {
            Sample::Value(v) if max > 0.0 => (v / max * 100.0).round().max(0.0) as u64,
            _ => 0,
        })
        .collect();
    (bars, unavailable)
}

fn render_storage(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .title(" Storage ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));

    let timezone = app.controller.settings().timezone;
    let lines: Vec<Line> = match app.summary() {
        Some(summary) => {
            let time = |t: Option<i64>| t.map(|t| timezone.format(t)).unwrap_or_else(|| "-".to_string());
            vec![
                Line::from(format!("File:     {}", app.file_name())),
                Line::from(format!("Created:  {}", summary.created.as_deref().unwrap_or("-"))),
                Line::from(format!("Nodes:    {}", summary.nodes)),
                Line::from(format!("Samples:  {}", summary.samples)),
                Line::from(format!("First:    {}", time(summary.first_timestamp))),
                Line::from(format!("Last:     {}", time(summary.last_timestamp))),
            ]
        }
        None => vec![Line::from(Span::styled(
            UNABLE_TO_LOAD,
            Style::default().fg(Color::Red),
        ))],
    };

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_footer(frame: &mut Frame, app: &App, area: Rect) {
    let key = |k: &'static str| Span::styled(k, Style::default().bg(Color::DarkGray));

    if let Some(input) = app.filter_input() {
        let line = Line::from(vec![
            key(" / "),
            Span::raw(format!(" filter: {}_ ", input)),
            key(" Enter "),
            Span::raw(" apply "),
            key(" Esc "),
            Span::raw(" cancel "),
        ]);
        frame.render_widget(Paragraph::new(line), area);
        return;
    }

    let mut spans = vec![key(" q "), Span::raw(" quit "), key(" Tab "), Span::raw(" tab ")];
    if app.controller.tab() == Tab::Overview {
        spans.extend([
            key(" j/k "),
            Span::raw(" nav "),
            key(" ⏎ "),
            Span::raw(" node "),
            key(" h/l s "),
            Span::raw(" sort "),
            key(" n/p "),
            Span::raw(" page "),
            key(" +/- "),
            Span::raw(" rows "),
            key(" / "),
            Span::raw(" filter "),
            key(" m "),
            Span::raw(" metric "),
            key(" w "),
            Span::raw(" window "),
            key(" r "),
            Span::raw(" refresh "),
            key(" g/t "),
            Span::raw(" sections "),
        ]);
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tui::app::tests::seeded_app;
    use crossterm::event::{KeyCode, KeyModifiers};
    use ratatui::{Terminal, backend::TestBackend};
    use std::time::Instant;

    fn screen(app: &App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(220, 60)).unwrap();
        terminal.draw(|frame| render(frame, app)).unwrap();
        let buffer = terminal.backend().buffer();
        let mut text = String::new();
        for y in 0..buffer.area.height {
            for x in 0..buffer.area.width {
                text.push_str(buffer[(x, y)].symbol());
            }
            text.push('\n');
        }
        text
    }

    #[test]
    fn test_overview_renders_rows_and_aggregates() {
        let (_dir, app) = seeded_app(3);
        let text = screen(&app);

        assert!(text.contains("node-01"));
        assert!(text.contains("node-03"));
        assert!(text.contains("Total"));
        assert!(text.contains("Average"));
        assert!(text.contains("Node ▲"));
        assert!(text.contains("60.0%"));
    }

    #[test]
    fn test_drilldown_block_renders() {
        let (_dir, mut app) = seeded_app(1);
        app.handle_key(KeyCode::Enter, KeyModifiers::NONE, Instant::now());
        app.tick(Instant::now(), 1_000_000);
        let text = screen(&app);

        assert!(text.contains("node-01 (1m)"));
        assert!(text.contains("Packet/m"));
    }

    /// Rename the stats table behind the store's back so series fetches fail
    fn rename_stats(dir: &tempfile::TempDir, from: &str, to: &str) {
        let conn = rusqlite::Connection::open(dir.path().join("stats.db")).unwrap();
        conn.execute_batch(&format!("ALTER TABLE {from} RENAME TO {to}")).unwrap();
    }

    #[test]
    fn test_cluster_chart_marks_failed_series() {
        let (dir, mut app) = seeded_app(2);
        rename_stats(&dir, "stats", "stats_moved");
        app.tick(Instant::now(), 1_000_000);

        let cluster = app.controller.cluster().unwrap();
        assert!(cluster.chart().series().iter().all(|s| s.error().is_some()));
        assert!(!cluster.chart().unavailable_times(0).is_empty());

        let text = screen(&app);
        assert!(text.contains(&format!("{}: node-01, node-02", UNABLE_TO_LOAD)));
    }

    #[test]
    fn test_drilldown_keeps_failed_range_marked() {
        let (dir, mut app) = seeded_app(1);
        app.handle_key(KeyCode::Enter, KeyModifiers::NONE, Instant::now());
        rename_stats(&dir, "stats", "stats_moved");
        app.tick(Instant::now(), 1_000_000);
        assert!(screen(&app).contains(UNABLE_TO_LOAD));

        rename_stats(&dir, "stats_moved", "stats");
        app.tick(Instant::now(), 1_000_120);
        let text = screen(&app);

        // Recovered, but the steps that failed are still drawn as failures
        assert!(!text.contains(UNABLE_TO_LOAD));
        assert!(text.contains(UNAVAILABLE_MARK));
    }

    #[test]
    fn test_storage_tab_renders_summary() {
        let (_dir, mut app) = seeded_app(2);
        app.handle_key(KeyCode::Char('2'), KeyModifiers::NONE, Instant::now());
        let text = screen(&app);

        assert!(text.contains("Nodes:    2"));
        assert!(text.contains("Samples:  2"));
    }
}
