use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Paragraph},
};
use sitechat_core::{ChatRole, ChatTransport};
use crate::app::{App, BubbleContent, MAX_INPUT_LINES};

/// Widest the chat window gets on large terminals
const CHAT_WIDTH: u16 = 64;

pub fn render<T: ChatTransport + 'static>(frame: &mut Frame, app: &mut App<T>) {
    let area = frame.area();

    render_page(frame, area);

    if app.chat_open {
        render_chat_window(frame, app, chat_window_area(area));
    } else {
        render_launcher(frame, area);
    }
}

fn render_page(frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" sitechat ");

    let text = Text::from(vec![
        Line::default(),
        Line::from(Span::styled(
            "  Ctrl+O  open or close the chat",
            Style::default().fg(Color::DarkGray),
        )),
        Line::from(Span::styled(
            "  Ctrl+C  quit",
            Style::default().fg(Color::DarkGray),
        )),
    ]);

    frame.render_widget(Paragraph::new(text).block(block), area);
}

fn render_launcher(frame: &mut Frame, area: Rect) {
    let label = " Chat (Enter) ";
    let width = (label.chars().count() as u16 + 2).min(area.width);
    let launcher = Rect {
        x: area.right().saturating_sub(width + 1),
        y: area.bottom().saturating_sub(4),
        width,
        height: 3.min(area.height),
    };

    let button = Paragraph::new(Span::styled(
        label,
        Style::default().fg(Color::Black).bg(Color::Cyan).add_modifier(Modifier::BOLD),
    ))
    .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Cyan)));

    frame.render_widget(Clear, launcher);
    frame.render_widget(button, launcher);
}

/// Floating window anchored bottom-right; full screen on narrow terminals
fn chat_window_area(area: Rect) -> Rect {
    if area.width <= CHAT_WIDTH + 4 {
        return area;
    }
    Rect {
        x: area.right() - CHAT_WIDTH - 2,
        y: area.y + 1,
        width: CHAT_WIDTH,
        height: area.height.saturating_sub(2),
    }
}

fn render_chat_window<T: ChatTransport + 'static>(frame: &mut Frame, app: &mut App<T>, area: Rect) {
    frame.render_widget(Clear, area);

    let [chat_area, input_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(app.input_height()),
    ])
    .areas(area);

    // Inner size minus borders, kept for scroll math
    app.chat_height = chat_area.height.saturating_sub(2);
    app.chat_width = chat_area.width.saturating_sub(2);

    let lines = transcript_lines(app, app.chat_width as usize);
    app.settle_scroll(u16::try_from(lines.len()).unwrap_or(u16::MAX));

    let chat_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Chat (Esc to minimize) ");

    let chat_text = if lines.is_empty() {
        Text::from(Span::styled(
            "Ask us anything...",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        Text::from(lines)
    };

    let chat = Paragraph::new(chat_text)
        .block(chat_block)
        .scroll((app.scroll, 0));
    frame.render_widget(chat, chat_area);

    render_input(frame, app, input_area);
}

fn transcript_lines<T: ChatTransport + 'static>(app: &App<T>, width: usize) -> Vec<Line<'static>> {
    let mut lines: Vec<Line> = Vec::new();

    for bubble in &app.bubbles {
        let (label, color) = match bubble.role {
            ChatRole::User => ("You:", Color::Cyan),
            ChatRole::Assistant => ("Bot:", Color::Yellow),
        };
        lines.push(Line::from(Span::styled(
            label,
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        )));

        match &bubble.content {
            BubbleContent::Placeholder => {
                // Trailing dots of the placeholder cycle through ".", "..", "..."
                let dots = ".".repeat(app.animation_frame as usize + 1);
                let text = format!("{}{}", app.placeholder.trim_end_matches('.'), dots);
                lines.push(Line::from(Span::styled(
                    text,
                    Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
                )));
            }
            BubbleContent::Text(text) => {
                push_wrapped(&mut lines, text, width, Style::default());
            }
            BubbleContent::Error(text) => {
                push_wrapped(&mut lines, text, width, Style::default().fg(Color::Red));
            }
        }

        lines.push(Line::default());
    }

    lines
}

/// Each `\n` starts a new line; long lines wrap at word boundaries
fn push_wrapped(lines: &mut Vec<Line<'static>>, text: &str, width: usize, style: Style) {
    for paragraph in text.split('\n') {
        for wrapped in wrap_text_to_width(paragraph, width) {
            lines.push(Line::from(Span::styled(wrapped, style)));
        }
    }
}

fn render_input<T: ChatTransport + 'static>(frame: &mut Frame, app: &App<T>, area: Rect) {
    let (border_color, title) = if !app.input_enabled {
        (Color::DarkGray, " Sending... ")
    } else if app.input_focused {
        (Color::Yellow, " Message (Enter to send, Alt+Enter for new line) ")
    } else {
        (Color::DarkGray, " Message ")
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    let (cursor_row, cursor_col) = app.cursor_row_col();
    let inner_width = area.width.saturating_sub(2);

    // Keep the cursor line and column in view
    let row_offset = cursor_row.saturating_sub(MAX_INPUT_LINES - 1);
    let col_offset = if inner_width == 0 || cursor_col < inner_width {
        0
    } else {
        cursor_col - inner_width + 1
    };

    let style = if app.input_enabled {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::DarkGray)
    };

    let input = Paragraph::new(app.input.as_str())
        .style(style)
        .block(block)
        .scroll((row_offset, col_offset));
    frame.render_widget(input, area);

    if app.input_focused && app.input_enabled {
        frame.set_cursor_position((
            area.x + 1 + cursor_col - col_offset,
            area.y + 1 + cursor_row - row_offset,
        ));
    }
}

/// Wrap text to fit within a given width, returning multiple lines.
///
/// Breaks at the last space that fits, dropping only that one space; words
/// wider than the line are split. Indentation and runs of spaces are kept.
fn wrap_text_to_width(text: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return vec![text.to_string()];
    }

    let chars: Vec<char> = text.chars().collect();
    let mut lines = Vec::new();
    let mut start = 0;

    while chars.len() - start > width {
        let end = start + width;

        if chars[end].is_whitespace() {
            lines.push(chars[start..end].iter().collect());
            start = end + 1;
            continue;
        }

        match chars[start..end].iter().rposition(|c| c.is_whitespace()) {
            Some(space) if space > 0 => {
                lines.push(chars[start..start + space].iter().collect());
                start += space + 1;
            }
            // No break point, or only leading indentation: split the word
            _ => {
                lines.push(chars[start..end].iter().collect());
                start = end;
            }
        }
    }

    lines.push(chars[start..].iter().collect());
    lines
}
