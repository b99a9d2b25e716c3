use monitor_sense::{ControllerState, LoadPhase, Severity, SettingsSource};
use ratatui::prelude::*;
use ratatui::widgets::*;
use shared::{MonitorSettings, SettingKey, SettingUpdate, Tab};

use crate::app::View;

// ═══════════════════════════════════════════════════════════════════════════════
//  Theme: MSI Red
// ═══════════════════════════════════════════════════════════════════════════════

struct Theme;

impl Theme {
    const ACCENT: Color = Color::Rgb(230, 30, 40);
    const ACCENT2: Color = Color::Rgb(255, 90, 80);
    const DIM: Color = Color::Rgb(150, 30, 35);
    const DARK: Color = Color::Rgb(70, 15, 20);
    const BG_HL: Color = Color::Rgb(40, 10, 12);
    const BG_HEADER: Color = Color::Rgb(20, 5, 6);
    const FG: Color = Color::Rgb(225, 215, 215);
    const FG_DIM: Color = Color::Rgb(135, 110, 110);
    const OK: Color = Color::Rgb(80, 220, 100);
    const WARM: Color = Color::Rgb(255, 200, 0);
    const ERR: Color = Color::Rgb(255, 70, 50);
}

// ═══════════════════════════════════════════════════════════════════════════════
//  UI Rendering
// ═══════════════════════════════════════════════════════════════════════════════

pub fn draw(f: &mut Frame, view: &View) {
    let [header, tab_bar, body, detail, status] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Length(1),
        Constraint::Min(12),
        Constraint::Length(6),
        Constraint::Length(4),
    ])
    .areas(f.area());

    draw_header(f, header);
    draw_tab_bar(f, tab_bar, view.tab);

    let [left, right] =
        Layout::horizontal([Constraint::Percentage(32), Constraint::Percentage(68)]).areas(body);

    draw_monitors(f, left, &view.state);
    draw_settings(f, right, view);
    draw_detail(f, detail, view);
    draw_status(f, status, view);
}

// ─── Header ─────────────────────────────────────────────────────────────────

fn draw_header(f: &mut Frame, area: Rect) {
    let block = Block::bordered()
        .border_type(BorderType::Double)
        .border_style(Style::new().fg(Theme::ACCENT))
        .style(Style::new().bg(Theme::BG_HEADER));

    let text = Line::from(vec![
        Span::styled("  ◆ ", Style::new().fg(Theme::ACCENT).bold()),
        Span::styled("M O N I T O R - S E N S E", Style::new().fg(Theme::ACCENT).bold()),
        Span::styled("  ◆  ", Style::new().fg(Theme::ACCENT)),
        Span::styled("MSI Monitor Control Center", Style::new().fg(Theme::FG_DIM)),
    ])
    .centered();

    f.render_widget(Paragraph::new(text).block(block), area);
}

// ─── Tab Bar ────────────────────────────────────────────────────────────────

fn draw_tab_bar(f: &mut Frame, area: Rect, active: Tab) {
    let mut spans = vec![Span::raw("  ")];
    for (i, tab) in Tab::ALL.iter().enumerate() {
        let style = if *tab == active {
            Style::new().fg(Color::Black).bg(Theme::ACCENT).bold()
        } else {
            Style::new().fg(Theme::FG_DIM)
        };
        spans.push(Span::styled(format!(" F{} {} ", i + 1, tab.label()), style));
        spans.push(Span::raw("  "));
    }
    spans.push(Span::styled(
        "          Tab to switch",
        Style::new().fg(Theme::DARK),
    ));

    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

// ─── Monitors Panel ─────────────────────────────────────────────────────────

fn draw_monitors(f: &mut Frame, area: Rect, state: &ControllerState) {
    let block = Block::bordered()
        .border_type(BorderType::Rounded)
        .border_style(Style::new().fg(Theme::DIM))
        .title(Span::styled(" Monitors ", Style::new().fg(Theme::ACCENT).bold()));

    let inner = block.inner(area);
    f.render_widget(block, area);

    if state.monitors.is_empty() {
        let msg = vec![
            Line::default(),
            Line::from(Span::styled(
                "  ⚠ No monitors detected",
                Style::new().fg(Theme::WARM),
            )),
            Line::from(Span::styled(
                "    Check the USB cable to the monitor.",
                Style::new().fg(Theme::FG_DIM),
            )),
            Line::from(Span::styled(
                "    m: rescan",
                Style::new().fg(Theme::DIM),
            )),
        ];
        f.render_widget(Paragraph::new(msg), inner);
        return;
    }

    let mut lines = Vec::new();
    for monitor in &state.monitors {
        let sel = state.selected_id.as_deref() == Some(monitor.id.as_str());
        let arrow = if sel { " ▸ " } else { "   " };
        let style = if sel {
            Style::new().fg(Theme::ACCENT).bg(Theme::BG_HL).bold()
        } else {
            Style::new().fg(Theme::FG)
        };
        lines.push(Line::from(vec![
            Span::styled(arrow, style),
            Span::styled(monitor.model.clone(), style),
        ]));
        lines.push(Line::from(Span::styled(
            format!("     S/N {}  FW {}", monitor.serial, monitor.firmware),
            Style::new().fg(Theme::FG_DIM),
        )));
    }

    f.render_widget(Paragraph::new(lines), inner);
}

// ─── Settings Panel ─────────────────────────────────────────────────────────

fn level(update: &SettingUpdate) -> Option<u8> {
    match update {
        SettingUpdate::Brightness(v)
        | SettingUpdate::Contrast(v)
        | SettingUpdate::Sharpness(v)
        | SettingUpdate::BlackTuner(v)
        | SettingUpdate::OsdTransparency(v)
        | SettingUpdate::OsdTimeout(v) => Some(*v),
        _ => None,
    }
}

/// `#rrggbb` as a terminal colour.
fn hex_color(raw: &str) -> Option<Color> {
    let hex = raw.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
    Some(Color::Rgb(channel(0)?, channel(2)?, channel(4)?))
}

fn value_spans(key: SettingKey, settings: &MonitorSettings, sel: bool) -> Vec<Span<'static>> {
    let update = settings.get(key);
    let val_style = if sel {
        Style::new().fg(Theme::ACCENT2).bg(Theme::BG_HL).bold()
    } else {
        Style::new().fg(Theme::DIM)
    };

    if let Some(v) = level(&update) {
        let (lo, hi) = key.range();
        let bar_w: usize = 16;
        let span = usize::from(hi.saturating_sub(lo)).max(1);
        let fill = (usize::from(v.saturating_sub(lo)) * bar_w / span).min(bar_w);
        return vec![
            Span::styled("━".repeat(fill), Style::new().fg(Theme::ACCENT)),
            Span::styled("─".repeat(bar_w - fill), Style::new().fg(Theme::DARK)),
            Span::styled(format!(" {v}"), val_style),
        ];
    }

    let mut spans = vec![
        Span::styled("◀ ", Style::new().fg(Theme::DARK)),
        Span::styled(update.wire_value(), val_style),
        Span::styled(" ▶", Style::new().fg(Theme::DARK)),
    ];
    if let SettingUpdate::LedColor(c) | SettingUpdate::LedColor2(c) = &update {
        if let Some(color) = hex_color(c) {
            spans.push(Span::styled(" ███", Style::new().fg(color)));
        }
    }
    spans
}

fn draw_settings(f: &mut Frame, area: Rect, view: &View) {
    let title = match &view.state.phase {
        LoadPhase::Ready(SettingsSource::Cache) => format!(" {} (cached) ", view.tab.label()),
        _ => format!(" {} ", view.tab.label()),
    };
    let block = Block::bordered()
        .border_type(BorderType::Rounded)
        .border_style(Style::new().fg(Theme::DIM))
        .title(Span::styled(title, Style::new().fg(Theme::ACCENT).bold()));

    let inner = block.inner(area);
    f.render_widget(block, area);

    let Some(settings) = &view.state.settings else {
        let msg = if view.state.loading() {
            "Reading monitor…"
        } else {
            "No settings loaded"
        };
        f.render_widget(
            Paragraph::new(msg)
                .style(Style::new().fg(Theme::FG_DIM))
                .centered(),
            inner,
        );
        return;
    };

    let rows: Vec<Row> = view
        .rows
        .iter()
        .enumerate()
        .map(|(i, key)| {
            let sel = i == view.row;
            let arrow = if sel { " ▸ " } else { "   " };
            let style = if sel {
                Style::new().fg(Theme::ACCENT).bg(Theme::BG_HL).bold()
            } else {
                Style::new().fg(Theme::FG)
            };
            let hint = if sel { " [←→]" } else { "" };

            Row::new(vec![
                Cell::new(arrow).style(style),
                Cell::new(format!("{:<22}", key.label())).style(style),
                Cell::new(Line::from(value_spans(*key, settings, sel))),
                Cell::new(hint).style(Style::new().fg(Theme::FG_DIM)),
            ])
        })
        .collect();

    let widths = [
        Constraint::Length(3),
        Constraint::Length(23),
        Constraint::Min(20),
        Constraint::Length(6),
    ];

    f.render_widget(Table::new(rows, widths).column_spacing(0), inner);
}

// ─── Detail Panel ───────────────────────────────────────────────────────────

fn draw_detail(f: &mut Frame, area: Rect, view: &View) {
    let Some(key) = view.rows.get(view.row).copied() else {
        return;
    };

    let block = Block::bordered()
        .border_type(BorderType::Rounded)
        .border_style(Style::new().fg(Theme::DIM))
        .title(Span::styled(
            format!(" {} ", key.label()),
            Style::new().fg(Theme::ACCENT).bold(),
        ));

    let current = view
        .state
        .settings
        .as_ref()
        .map(|s| s.get(key).wire_value())
        .unwrap_or_else(|| "N/A".into());

    let mut lines = vec![Line::from(vec![
        Span::styled("  Current: ", Style::new().fg(Theme::FG_DIM)),
        Span::styled(current, Style::new().fg(Theme::ACCENT).bold()),
        Span::styled("  │  msigd: ", Style::new().fg(Theme::FG_DIM)),
        Span::styled(format!("--{}", key.msigd_name()), Style::new().fg(Theme::FG)),
    ])];

    if let Some(v) = view.state.settings.as_ref().and_then(|s| level(&s.get(key))) {
        let (lo, hi) = key.range();
        lines.push(Line::from(Span::styled(
            format!("  Range {lo}–{hi}, step {}. Now {v}.", key.increment()),
            Style::new().fg(Theme::FG).italic(),
        )));
    }
    if !key.is_queryable() {
        lines.push(Line::from(Span::styled(
            "  The monitor cannot report this; the value shown is the last one sent.",
            Style::new().fg(Theme::WARM).italic(),
        )));
    }
    lines.push(Line::from(Span::styled(
        "  ←→: Adjust  │  ↑↓: Navigate  │  [ ]: Monitor",
        Style::new().fg(Theme::DIM),
    )));

    f.render_widget(Paragraph::new(lines).block(block), area);
}

// ─── Status Bar ─────────────────────────────────────────────────────────────

fn draw_status(f: &mut Frame, area: Rect, view: &View) {
    let tab_span = Span::styled(
        format!(" {} ", view.tab.label().to_uppercase()),
        Style::new().fg(Color::Black).bg(Theme::ACCENT).bold(),
    );

    let phase_span = match &view.state.phase {
        LoadPhase::Idle => Span::styled(" IDLE ", Style::new().fg(Theme::FG_DIM).bold()),
        LoadPhase::Loading => Span::styled(" LOADING… ", Style::new().fg(Theme::WARM).bold()),
        LoadPhase::Ready(SettingsSource::Cache) => {
            Span::styled(" CACHED ", Style::new().fg(Theme::WARM).bold())
        }
        LoadPhase::Ready(SettingsSource::Hardware) => {
            Span::styled(" LIVE ✓ ", Style::new().fg(Theme::OK).bold())
        }
        LoadPhase::Failed(_) => Span::styled(" ERROR ", Style::new().fg(Theme::ERR).bold()),
    };

    let message = match (&view.toast, view.state.error()) {
        (Some(toast), _) => {
            let (mark, color) = match toast.severity {
                Severity::Success => ("✓", Theme::OK),
                Severity::Error => ("✗", Theme::ERR),
            };
            Span::styled(format!("  {mark} {}", toast.message), Style::new().fg(color))
        }
        (None, Some(err)) => Span::styled(format!("  ✗ {err}"), Style::new().fg(Theme::ERR)),
        (None, None) => Span::styled(
            "  Ready",
            Style::new().fg(Theme::FG_DIM),
        ),
    };

    let help = " F1-F4/Tab Tab │ [ ] Monitor │ ↑↓ Navigate │ ←→ Adjust │ r Refresh │ m Rescan │ Esc Dismiss │ q Quit ";

    let lines = vec![
        Line::from(vec![tab_span, Span::raw(" "), phase_span, message]),
        Line::from(Span::styled(help, Style::new().fg(Theme::FG_DIM))),
    ];

    let block = Block::bordered()
        .border_type(BorderType::Rounded)
        .border_style(Style::new().fg(Theme::DARK));

    f.render_widget(Paragraph::new(lines).block(block), area);
}
