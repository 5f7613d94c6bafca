/// Perpetual-Futures Screener TUI
///
/// Polls one exchange's public REST API per refresh cycle, feeds the rolling
/// open-interest history, and renders the ranked derived-metrics table with
/// a plain-text open-interest alert panel.
///
/// A cycle either completes or is abandoned whole: a failed fetch leaves the
/// history store and the previous table untouched and surfaces the error in
/// the status bar until the next successful refresh.
use std::{
    error::Error,
    io,
    time::{Duration, Instant},
};

use chrono::{DateTime, Utc};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table},
    Frame, Terminal,
};
use screener_data::{source_for, SnapshotSource};
use screener_tui::{
    alert_lines, build_rows, rank, DerivedMetrics, HistoryStore, ScreenerConfig, StructureLabel,
};
use tracing::{error, info, warn};

/// Rendered outcome of the most recent refresh attempt.
#[derive(Debug, Default)]
struct CycleStatus {
    last_refresh: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_logging();

    let config = ScreenerConfig::from_env();
    info!("starting screener: {:?}", config);

    // Setup panic hook to restore terminal on crash
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen, DisableMouseCapture);
        original_hook(panic_info);
    }));

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let client = reqwest::Client::new();
    let source = source_for(config.exchange, config.liquidity_floor_usd);
    let mut history = HistoryStore::new();

    let tick_rate = Duration::from_secs(config.refresh_interval_secs);
    let mut last_tick = Instant::now();
    let mut force_refresh = true;

    let mut rows: Vec<DerivedMetrics> = Vec::new();
    let mut alerts: Vec<String> = Vec::new();
    let mut status = CycleStatus::default();

    loop {
        if force_refresh || last_tick.elapsed() >= tick_rate {
            run_cycle(
                source.as_ref(),
                &client,
                &config,
                &mut history,
                &mut rows,
                &mut alerts,
                &mut status,
            )
            .await;
            last_tick = Instant::now();
            force_refresh = false;
        }

        let secs_to_next = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_default()
            .as_secs();
        terminal.draw(|f| {
            render_ui(f, &config, &history, &rows, &alerts, &status, secs_to_next)
        })?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_default()
            .min(Duration::from_millis(250));
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => break,
                    KeyCode::Char('r') => force_refresh = true,
                    KeyCode::Char('x') => {
                        history.reset();
                        info!("history store reset");
                    }
                    _ => {}
                }
            }
        }
    }

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}

/// Execute one refresh cycle: fetch, ingest, derive, rank, alert.
///
/// A failed fetch abandons the cycle without touching the history store;
/// the previous table stays on screen behind the error banner.
async fn run_cycle(
    source: &dyn SnapshotSource,
    client: &reqwest::Client,
    config: &ScreenerConfig,
    history: &mut HistoryStore,
    rows: &mut Vec<DerivedMetrics>,
    alerts: &mut Vec<String>,
    status: &mut CycleStatus,
) {
    match source.fetch(client).await {
        Ok(snapshots) => {
            for snapshot in &snapshots {
                history.ingest(snapshot);
            }

            let mut fresh = build_rows(&snapshots, history, config);
            rank(&mut fresh);

            // Alerts consider every ranked row, not just the displayed slice
            *alerts = alert_lines(&fresh, config.oi_alert_threshold_pct);
            for line in alerts.iter() {
                info!("OI alert: {}", line);
            }

            fresh.truncate(config.top_n_display);
            info!(
                "cycle complete: {} instruments, {} displayed, {} alerts",
                snapshots.len(),
                fresh.len(),
                alerts.len()
            );

            *rows = fresh;
            status.last_refresh = Some(Utc::now());
            status.last_error = None;
        }
        Err(err) => {
            // Transport blips clear on their own; decode/API failures need a look
            if err.is_transient() {
                warn!("cycle abandoned ({}): {}", source.exchange(), err);
            } else {
                error!("cycle abandoned ({}): {}", source.exchange(), err);
            }
            status.last_error = Some(err.to_string());
        }
    }
}

fn render_ui(
    f: &mut Frame,
    config: &ScreenerConfig,
    history: &HistoryStore,
    rows: &[DerivedMetrics],
    alerts: &[String],
    status: &CycleStatus,
    secs_to_next: u64,
) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(8),
            Constraint::Length(7),
        ])
        .split(f.area());

    render_status(f, config, history, status, secs_to_next, chunks[0]);
    render_table(f, rows, chunks[1]);
    render_alerts(f, config, alerts, chunks[2]);
}

fn render_status(
    f: &mut Frame,
    config: &ScreenerConfig,
    history: &HistoryStore,
    status: &CycleStatus,
    secs_to_next: u64,
    area: Rect,
) {
    let block = Block::default()
        .title(" PERP SCREENER ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::White));

    let mut spans = vec![
        Span::styled("Source: ", Style::default().fg(Color::Gray)),
        Span::styled(
            config.exchange.as_str().to_uppercase(),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::raw("  "),
        Span::styled("Tracked: ", Style::default().fg(Color::Gray)),
        Span::styled(
            format!("{}", history.symbol_count()),
            Style::default().fg(Color::White),
        ),
        Span::raw("  "),
        Span::styled("Refreshed: ", Style::default().fg(Color::Gray)),
        Span::styled(
            status
                .last_refresh
                .map(|t| t.format("%H:%M:%S").to_string())
                .unwrap_or_else(|| "never".to_string()),
            Style::default().fg(Color::White),
        ),
        Span::raw("  "),
        Span::styled("Next: ", Style::default().fg(Color::Gray)),
        Span::styled(format!("{}s", secs_to_next), Style::default().fg(Color::White)),
        Span::raw("  "),
        Span::styled(
            "[q]uit [r]efresh [x]reset",
            Style::default().fg(Color::DarkGray),
        ),
    ];

    if let Some(error) = &status.last_error {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(
            format!("ERROR: {}", error),
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ));
    }

    let paragraph = Paragraph::new(Line::from(spans)).block(block);
    f.render_widget(paragraph, area);
}

fn render_table(f: &mut Frame, rows: &[DerivedMetrics], area: Rect) {
    let header_cells = [
        "SYMBOL", "PRICE", "24H %", "VOLUME", "FUNDING", "OI", "OI 5M", "OI 15M", "OI 1H",
        "STRUCTURE", "SCORE",
    ]
    .iter()
    .map(|h| {
        Cell::from(*h).style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
    });
    let header = Row::new(header_cells).height(1);

    let body = rows.iter().map(|row| {
        let change_color = if row.price_change_pct >= 0.0 {
            Color::Green
        } else {
            Color::Red
        };
        let cells = vec![
            Cell::from(row.symbol.as_str().to_string())
                .style(Style::default().add_modifier(Modifier::BOLD)),
            Cell::from(format!("{:.4}", row.last_price)),
            Cell::from(format!("{:+.2}%", row.price_change_pct))
                .style(Style::default().fg(change_color)),
            Cell::from(format_usd(row.quote_volume_24h)),
            Cell::from(format!("{:+.4}%", row.funding_rate * 100.0)),
            Cell::from(format_quantity(row.open_interest)),
            Cell::from(format!("{:+.2}%", row.oi_delta_5m))
                .style(Style::default().fg(delta_color(row.oi_delta_5m))),
            Cell::from(format!("{:+.2}%", row.oi_delta_15m))
                .style(Style::default().fg(delta_color(row.oi_delta_15m))),
            Cell::from(format!("{:+.2}%", row.oi_delta_1h))
                .style(Style::default().fg(delta_color(row.oi_delta_1h))),
            Cell::from(row.structure.label())
                .style(Style::default().fg(structure_color(row.structure))),
            Cell::from(format!("{}", row.score)).style(
                Style::default()
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD),
            ),
        ];
        Row::new(cells).height(1)
    });

    let table = Table::new(
        body,
        [
            Constraint::Length(16),
            Constraint::Length(12),
            Constraint::Length(9),
            Constraint::Length(9),
            Constraint::Length(9),
            Constraint::Length(11),
            Constraint::Length(8),
            Constraint::Length(8),
            Constraint::Length(8),
            Constraint::Length(17),
            Constraint::Length(6),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title(" RANKED INSTRUMENTS ")
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(table, area);
}

fn render_alerts(f: &mut Frame, config: &ScreenerConfig, alerts: &[String], area: Rect) {
    let block = Block::default()
        .title(format!(
            " OI ALERTS (|5m delta| > {:.0}%) ",
            config.oi_alert_threshold_pct
        ))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::White));

    let lines: Vec<Line> = if alerts.is_empty() {
        vec![Line::from(Span::styled(
            "No alerts this cycle",
            Style::default().fg(Color::DarkGray),
        ))]
    } else {
        alerts
            .iter()
            .map(|line| {
                Line::from(Span::styled(
                    line.clone(),
                    Style::default()
                        .fg(Color::Yellow)
                        .add_modifier(Modifier::BOLD),
                ))
            })
            .collect()
    };

    let paragraph = Paragraph::new(lines).block(block);
    f.render_widget(paragraph, area);
}

fn structure_color(structure: StructureLabel) -> Color {
    match structure {
        StructureLabel::BullishBuildUp => Color::Green,
        StructureLabel::BearishBuildUp => Color::Red,
        StructureLabel::ShortCovering => Color::Cyan,
        StructureLabel::LongClosing => Color::Magenta,
        StructureLabel::Neutral => Color::Gray,
    }
}

fn delta_color(delta_pct: f64) -> Color {
    if delta_pct > 0.0 {
        Color::Green
    } else if delta_pct < 0.0 {
        Color::Red
    } else {
        Color::Gray
    }
}

/// Compact USD formatting for the volume column.
fn format_usd(value: f64) -> String {
    if value >= 1_000_000_000.0 {
        format!("${:.1}B", value / 1_000_000_000.0)
    } else if value >= 1_000_000.0 {
        format!("${:.0}M", value / 1_000_000.0)
    } else {
        format!("${:.0}K", value / 1_000.0)
    }
}

/// Compact formatting for contract/base-unit quantities.
fn format_quantity(value: f64) -> String {
    if value >= 1_000_000.0 {
        format!("{:.1}M", value / 1_000_000.0)
    } else if value >= 1_000.0 {
        format!("{:.1}K", value / 1_000.0)
    } else {
        format!("{:.1}", value)
    }
}

/// Initialize logging to a file so log lines never corrupt the TUI.
///
/// Path via SCREENER_LOG (default "screener.log"), filter via RUST_LOG.
fn init_logging() {
    let path = std::env::var("SCREENER_LOG").unwrap_or_else(|_| "screener.log".to_string());
    let Ok(file) = std::fs::File::create(&path) else {
        return;
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_ansi(false)
        .with_writer(std::sync::Mutex::new(file))
        .init();
}
