use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Tabs, Wrap},
    Frame,
};

use crate::app::{App, AppMode, Button, Focus, Output, UploadTarget};
use crate::form::Feature;

pub fn ui(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title bar
            Constraint::Min(0),    // Form and results
            Constraint::Length(1), // Status bar
        ])
        .split(f.size());

    render_title_bar(f, app, chunks[0]);
    render_main_content(f, app, chunks[1]);
    render_status_bar(f, app, chunks[2]);

    match app.mode {
        AppMode::FileBrowser(target) => render_file_browser(f, app, target, centered_rect(70, 80, chunks[1])),
        AppMode::Help => render_help(f, centered_rect(60, 80, chunks[1])),
        AppMode::Form => {}
    }
}

fn focus_block(title: &str, focused: bool) -> Block<'_> {
    let style = if focused {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    };
    Block::default().title(title).borders(Borders::ALL).border_style(style)
}

fn render_title_bar(f: &mut Frame, app: &App, area: Rect) {
    let titles = vec!["Email Analysis Application", "Help"];
    let tabs = Tabs::new(titles.iter().cloned().map(Line::from).collect())
        .block(
            Block::default()
                .borders(Borders::BOTTOM)
                .title(format!("Service: {}", app.client.base_url())),
        )
        .highlight_style(Style::default().fg(Color::Yellow))
        .select(match app.mode {
            AppMode::Form | AppMode::FileBrowser(_) => 0,
            AppMode::Help => 1,
        });
    f.render_widget(tabs, area);
}

fn render_main_content(f: &mut Frame, app: &App, area: Rect) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(area);

    let left = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(6),    // Email body
            Constraint::Length(3), // Scenario
            Constraint::Length(3), // Attachment upload
            Constraint::Length(3), // Email file upload
            Constraint::Length(3), // Buttons
        ])
        .split(columns[0]);

    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(Feature::COUNT as u16 + 2), // Feature checkboxes
            Constraint::Min(0),                            // Results
        ])
        .split(columns[1]);

    render_email_body(f, app, left[0]);
    render_scenario(f, app, left[1]);
    render_upload(f, app, UploadTarget::Attachment, left[2]);
    render_upload(f, app, UploadTarget::EmailFile, left[3]);
    render_buttons(f, app, left[4]);
    render_features(f, app, right[0]);
    render_output(f, app, right[1]);
}

fn render_email_body(f: &mut Frame, app: &App, area: Rect) {
    let focused = app.focus == Focus::Body && app.mode == AppMode::Form;
    let mut content = app.email_content.clone();
    if focused {
        content.push('▏');
    }

    // Keep the end of long emails in view
    let inner_height = area.height.saturating_sub(2) as usize;
    let line_count = content.lines().count().max(1);
    let scroll = line_count.saturating_sub(inner_height) as u16;

    let body = Paragraph::new(content)
        .block(focus_block("Enter the email content here", focused))
        .wrap(Wrap { trim: false })
        .scroll((scroll, 0));

    f.render_widget(body, area);
}

fn render_scenario(f: &mut Frame, app: &App, area: Rect) {
    let focused = app.focus == Focus::Scenario && app.mode == AppMode::Form;
    let line = Line::from(vec![
        Span::styled("◀ ", Style::default().fg(Color::Gray)),
        Span::styled(app.scenario.as_str(), Style::default().add_modifier(Modifier::BOLD)),
        Span::styled(" ▶", Style::default().fg(Color::Gray)),
    ]);

    let scenario = Paragraph::new(line)
        .block(focus_block("Select Scenario for Response Generation", focused));
    f.render_widget(scenario, area);
}

fn render_upload(f: &mut Frame, app: &App, target: UploadTarget, area: Rect) {
    let (focus, path) = match target {
        UploadTarget::Attachment => (Focus::Attachment, &app.attachment_path),
        UploadTarget::EmailFile => (Focus::EmailFile, &app.email_file_path),
    };
    let focused = app.focus == focus && app.mode == AppMode::Form;

    let text = match path {
        Some(path) => Line::from(path.display().to_string()),
        None => Line::from(Span::styled(
            format!("Enter to browse ({})", target.extensions().join(", ")),
            Style::default().fg(Color::Gray),
        )),
    };

    let upload = Paragraph::new(text).block(focus_block(target.title(), focused));
    f.render_widget(upload, area);
}

fn render_buttons(f: &mut Frame, app: &App, area: Rect) {
    let focused = app.focus == Focus::Buttons && app.mode == AppMode::Form;

    let mut spans = Vec::new();
    for (i, button) in Button::ALL.iter().enumerate() {
        let style = if focused && i == app.selected_button_idx {
            Style::default().fg(Color::Black).bg(Color::Yellow)
        } else {
            Style::default().add_modifier(Modifier::BOLD)
        };
        spans.push(Span::styled(format!("[ {} ]", button.label()), style));
        spans.push(Span::raw(" "));
    }

    let buttons = Paragraph::new(Line::from(spans)).block(focus_block("Actions", focused));
    f.render_widget(buttons, area);
}

fn render_features(f: &mut Frame, app: &App, area: Rect) {
    let focused = app.focus == Focus::Features && app.mode == AppMode::Form;

    let items: Vec<ListItem> = app
        .features
        .iter()
        .map(|(feature, enabled)| {
            let mark = if enabled { "[x]" } else { "[ ]" };
            ListItem::new(format!("{} {}", mark, feature.label()))
        })
        .collect();

    let mut state = ListState::default();
    if focused {
        state.select(Some(app.selected_feature_idx));
    }

    let list = List::new(items)
        .block(focus_block("Features", focused))
        .highlight_style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD));

    f.render_stateful_widget(list, area, &mut state);
}

fn render_output(f: &mut Frame, app: &App, area: Rect) {
    if let Some(busy) = &app.busy {
        let waiting = Paragraph::new(busy.as_str())
            .block(Block::default().title("Working").borders(Borders::ALL));
        f.render_widget(waiting, area);
        return;
    }

    let (title, lines): (&str, Vec<Line>) = match &app.output {
        Output::Empty => (
            "Results",
            vec![Line::from(Span::styled(
                "Press F5 or choose Analyze Email to run an analysis",
                Style::default().fg(Color::Gray),
            ))],
        ),
        Output::Analysis(fields) => (
            "Analysis Results",
            fields
                .iter()
                .map(|field| {
                    Line::from(vec![
                        Span::styled(
                            format!("{}: ", field.label),
                            Style::default().add_modifier(Modifier::BOLD),
                        ),
                        Span::raw(field.value.clone()),
                    ])
                })
                .collect(),
        ),
        Output::Attachment(text) => ("Attachment Analysis Results", text.lines().map(Line::from).collect()),
        Output::Metadata(text) => ("Email Metadata", text.lines().map(Line::from).collect()),
        Output::DownloadReady(description) => (
            "Download Analysis Results",
            vec![
                Line::from(description.as_str()),
                Line::from(""),
                Line::from(Span::styled(
                    "Press Ctrl+S to save",
                    Style::default().fg(Color::Green),
                )),
            ],
        ),
        Output::Saved(path) => (
            "Download Analysis Results",
            vec![Line::from(format!("Saved to {}", path.display()))],
        ),
        Output::Error(message) => (
            "Error",
            vec![Line::from(Span::styled(message.as_str(), Style::default().fg(Color::Red)))],
        ),
    };

    let output = Paragraph::new(lines)
        .block(Block::default().title(title).borders(Borders::ALL))
        .wrap(Wrap { trim: false });
    f.render_widget(output, area);
}

fn render_file_browser(f: &mut Frame, app: &App, target: UploadTarget, area: Rect) {
    let items: Vec<ListItem> = app
        .file_browser_items
        .iter()
        .map(|item| {
            let content = if item.is_directory {
                format!("{}/", item.name)
            } else {
                match item.size {
                    Some(size) => format!("{:<40} {:>10} B", item.name, size),
                    None => item.name.clone(),
                }
            };
            let style = if item.is_directory {
                Style::default().fg(Color::Blue)
            } else {
                Style::default()
            };
            ListItem::new(content).style(style)
        })
        .collect();

    let mut state = ListState::default();
    if !app.file_browser_items.is_empty() {
        state.select(Some(app.file_browser_selected));
    }

    let title = format!("{} - {}", target.title(), app.file_browser_current_path.display());
    let list = List::new(items)
        .block(Block::default().title(title).borders(Borders::ALL))
        .highlight_style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD));

    f.render_widget(Clear, area);
    f.render_stateful_widget(list, area, &mut state);
}

fn render_help(f: &mut Frame, area: Rect) {
    let help_text = vec![
        Line::from("Email Analysis Help"),
        Line::from(""),
        Line::from("Global:"),
        Line::from("  Ctrl+q - Quit"),
        Line::from("  F1 - Show/hide help"),
        Line::from("  Tab/Shift+Tab - Move between fields"),
        Line::from("  F5 - Analyze email"),
        Line::from("  F6/F7 - Download JSON/PDF analysis"),
        Line::from("  Ctrl+s - Save the last download"),
        Line::from(""),
        Line::from("Features:"),
        Line::from("  ↑/↓ - Navigate, Space - Toggle"),
        Line::from("  a - Enable all, n - Disable all"),
        Line::from(""),
        Line::from("Scenario:"),
        Line::from("  ←/→ - Change scenario"),
        Line::from(""),
        Line::from("Uploads:"),
        Line::from("  Enter - Browse; choosing a file uploads it"),
        Line::from("  Backspace - Parent directory, Esc - Cancel"),
    ];

    let help = Paragraph::new(help_text).block(Block::default().title("Help").borders(Borders::ALL));

    f.render_widget(Clear, area);
    f.render_widget(help, area);
}

fn render_status_bar(f: &mut Frame, app: &App, area: Rect) {
    let mut text = format!(
        "Scenario: {} | Features: {}/{} | Focus: {:?}",
        app.scenario,
        app.features.enabled_count(),
        Feature::COUNT,
        app.focus
    );

    if let Some(busy) = &app.busy {
        text = format!("WORKING: {}", busy);
    } else if let Some(error) = &app.error_message {
        text = format!("ERROR: {}", error);
    } else if let Some(info) = &app.info_message {
        text = format!("INFO: {}", info);
    }

    let status = Paragraph::new(text).style(Style::default().bg(Color::Blue).fg(Color::White));

    f.render_widget(status, area);
}

// Helper function to create a centered rect
fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
