use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};
use ragchat_core::{Message, Role};

use crate::app::{App, InputMode};

/// Split a line into plain and **bold** spans. An unclosed `**` is literal.
fn parse_markdown_line(text: &str) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find("**") {
        let after = &rest[start + 2..];
        let Some(len) = after.find("**").filter(|&len| len > 0) else {
            break;
        };

        if start > 0 {
            spans.push(Span::raw(rest[..start].to_string()));
        }
        spans.push(Span::styled(
            after[..len].to_string(),
            Style::default().add_modifier(Modifier::BOLD),
        ));
        rest = &after[len + 2..];
    }

    if !rest.is_empty() {
        spans.push(Span::raw(rest.to_string()));
    }

    if spans.is_empty() {
        Line::default()
    } else {
        Line::from(spans)
    }
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, chat, composer, footer
    let [header_area, chat_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_chat(app, frame, chat_area);
    render_composer(app, frame, input_area);
    render_footer(app, frame, footer_area);

    if app.input_mode == InputMode::FilePrompt {
        render_file_prompt(app, frame, area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let title = Line::from(vec![
        Span::styled(" RAG Chat ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(
            format!("{} ", app.server_url),
            Style::default().fg(Color::White),
        ),
        Span::styled(
            format!("[send: /{}/] ", app.send_route.as_str()),
            Style::default().fg(Color::Gray),
        ),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn message_lines(msg: &Message, lines: &mut Vec<Line<'static>>) {
    let label_color = match msg.role {
        Role::User => Color::Cyan,
        Role::Assistant => Color::Yellow,
    };
    let mut label = vec![Span::styled(
        format!("{}:", msg.role.display_name()),
        Style::default().fg(label_color).add_modifier(Modifier::BOLD),
    )];
    if let Some(timestamp) = &msg.timestamp {
        label.push(Span::styled(
            format!(" {}", timestamp),
            Style::default().fg(Color::DarkGray),
        ));
    }
    lines.push(Line::from(label));

    match msg.role {
        Role::User => {
            for line in msg.content.lines() {
                lines.push(Line::from(line.to_string()));
            }
        }
        Role::Assistant => {
            for line in msg.content.lines() {
                lines.push(parse_markdown_line(line));
            }
        }
    }
    lines.push(Line::default());
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    // Store chat area dimensions for scroll calculations (inner size minus borders)
    app.chat_height = area.height.saturating_sub(2);
    app.chat_width = area.width.saturating_sub(2);

    let messages = app.session.store().current();
    let sending = app.session.dispatcher().is_sending();

    let chat_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(format!(" Conversation ({}) ", messages.len()));

    let chat_text = if messages.is_empty() && !sending {
        Text::from(vec![
            Line::from(Span::styled(
                "No messages yet",
                Style::default().fg(Color::Gray),
            )),
            Line::from(Span::styled(
                "Type something below to start",
                Style::default().fg(Color::DarkGray),
            )),
        ])
        .centered()
    } else {
        let mut lines: Vec<Line> = Vec::new();
        for msg in messages {
            message_lines(msg, &mut lines);
        }

        // The turn only shows up once the refresh lands.
        if sending {
            lines.push(Line::from(Span::styled(
                "Assistant:",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            )));
            // Animated ellipsis: cycles through ".", "..", "..."
            let dots = ".".repeat((app.animation_frame as usize) + 1);
            lines.push(Line::from(Span::styled(
                format!("Sending{}", dots),
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            )));
        }

        Text::from(lines)
    };

    let chat = Paragraph::new(chat_text)
        .block(chat_block)
        .wrap(Wrap { trim: false })
        .scroll((app.chat_scroll, 0));

    frame.render_widget(chat, area);
}

fn render_composer(app: &App, frame: &mut Frame, area: Rect) {
    let sending = app.session.dispatcher().is_sending();
    let composing = app.input_mode == InputMode::Compose && !sending;

    let border_color = if composing { Color::Yellow } else { Color::DarkGray };
    let title = if sending {
        " Sending... "
    } else {
        " Message (Enter to send) "
    };

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    // Inner width = total width - 2 (for borders)
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = app.draft_cursor;

    // Calculate scroll offset to keep cursor visible
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let draft = app.session.dispatcher().draft();
    let (visible_text, style) = if draft.is_empty() && composing {
        (
            "Type your message...".to_string(),
            Style::default().fg(Color::DarkGray),
        )
    } else {
        (
            draft.chars().skip(scroll_offset).take(inner_width).collect(),
            Style::default().fg(if sending { Color::DarkGray } else { Color::Cyan }),
        )
    };

    let input = Paragraph::new(visible_text).style(style).block(input_block);
    frame.render_widget(input, area);

    if composing {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().fg(Color::White);

    let hints: &[(&str, &str)] = match app.input_mode {
        InputMode::Compose => &[
            ("Enter", "send"),
            ("^O", "pick PDF"),
            ("^U", "upload"),
            ("^X", "clear file"),
            ("^R", "refresh"),
            ("PgUp/PgDn", "scroll"),
            ("Esc", "quit"),
        ],
        InputMode::FilePrompt => &[("Enter", "select"), ("Esc", "cancel")],
    };

    let mut spans: Vec<Span> = Vec::new();
    for (key, label) in hints {
        spans.push(Span::styled(format!(" {} ", key), key_style));
        spans.push(Span::styled(format!(" {} ", label), label_style));
    }

    spans.push(Span::raw(" "));
    spans.push(upload_status(app));

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn upload_status(app: &App) -> Span<'static> {
    let uploads = app.session.uploads();

    if uploads.is_uploading() {
        let name = uploads.selected().map(|f| f.name()).unwrap_or("file");
        let dots = ".".repeat((app.animation_frame as usize) + 1);
        return Span::styled(
            format!("Uploading {}{}", name, dots),
            Style::default().fg(Color::Yellow),
        );
    }
    if let Some(file) = uploads.selected() {
        return Span::styled(
            format!("Selected: {}", file.name()),
            Style::default().fg(Color::Cyan),
        );
    }
    match uploads.last_notice() {
        Some(notice) => Span::styled(notice.to_string(), Style::default().fg(Color::Green)),
        None => Span::raw(""),
    }
}

/// One-row strip `offset` rows into `inner`, if the popup is tall enough.
fn popup_row(inner: Rect, offset: u16) -> Option<Rect> {
    (offset < inner.height).then(|| Rect::new(inner.x, inner.y + offset, inner.width, 1))
}

fn render_file_prompt(app: &App, frame: &mut Frame, area: Rect) {
    // Calculate popup size and position (centered), kept inside the frame
    let popup_width = 70.min(area.width.saturating_sub(4));
    let popup_height = 7;

    let popup_x = area.x + (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = area.y + (area.height.saturating_sub(popup_height)) / 2;

    let popup_area = Rect::new(popup_x, popup_y, popup_width, popup_height).intersection(area);
    if popup_area.is_empty() {
        return;
    }

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Select a PDF to upload ");

    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    if let Some(row) = popup_row(inner, 0) {
        let instructions = Paragraph::new("Path to the document. Enter to select, Esc to cancel.")
            .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(instructions, row);
    }

    // Input field, scrolled to keep the cursor visible
    if let Some(input_area) = popup_row(inner, 2) {
        let width = input_area.width as usize;
        let scroll_offset = if width > 0 && app.file_input_cursor >= width {
            app.file_input_cursor - width + 1
        } else {
            0
        };
        let visible: String = app.file_input.chars().skip(scroll_offset).take(width).collect();
        frame.render_widget(
            Paragraph::new(visible).style(Style::default().fg(Color::Cyan)),
            input_area,
        );

        let cursor_x = (app.file_input_cursor - scroll_offset) as u16;
        frame.set_cursor_position((input_area.x + cursor_x, input_area.y));
    }

    if let (Some(error), Some(row)) = (&app.file_input_error, popup_row(inner, 4)) {
        let status = Paragraph::new(error.as_str()).style(Style::default().fg(Color::Red));
        frame.render_widget(status, row);
    }
}
