use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};
use crate::app::{App, ChatView, InputMode, LoginView, Screen};
use crate::auth::{AuthMode, Field, Notice};
use crate::conversation::{Message, Sender};

const TITLE: &str = "Chat-AI";

/// Wrap text to fit within `width` display columns, breaking at word
/// boundaries. Words longer than a whole line are split.
fn wrap_text_to_width(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();
    let mut current_line = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let mut word = word.to_string();
        let mut word_len = word.width();

        if current_len > 0 && current_len + 1 + word_len <= width {
            current_line.push(' ');
            current_line.push_str(&word);
            current_len += 1 + word_len;
            continue;
        }
        if current_len > 0 {
            lines.push(std::mem::take(&mut current_line));
        }

        // Hard-split anything wider than a full line
        while word_len > width {
            let mut head = String::new();
            let mut head_len = 0;
            let mut rest = word.chars().peekable();
            while let Some(&c) = rest.peek() {
                let w = c.width().unwrap_or(0);
                if head_len + w > width && head_len > 0 {
                    break;
                }
                head.push(c);
                head_len += w;
                rest.next();
            }
            lines.push(head);
            word = rest.collect();
            word_len = word.width();
        }
        current_line = word;
        current_len = word_len;
    }

    if !current_line.is_empty() || lines.is_empty() {
        lines.push(current_line);
    }
    lines
}

/// Map the transcript to display rows for a pane `width` columns wide,
/// oldest first. Text is pre-wrapped, so one `Line` is exactly one row.
/// User messages sit on the right, bot messages on the left, with a blank
/// row between entries.
pub fn transcript_lines(messages: &[Message], width: u16) -> Vec<Line<'static>> {
    let user_style = Style::default().fg(Color::White).bg(Color::Blue);
    let bot_style = Style::default().fg(Color::Black).bg(Color::Gray);
    // one column of padding either side of the text
    let text_width = (width as usize).saturating_sub(2);

    let mut lines = Vec::new();
    for (i, msg) in messages.iter().enumerate() {
        if i > 0 {
            lines.push(Line::default());
        }
        let (style, alignment) = match msg.sender {
            Sender::User => (user_style, Alignment::Right),
            Sender::Bot => (bot_style, Alignment::Left),
        };
        for text in msg.text.split('\n') {
            for row in wrap_text_to_width(text, text_width) {
                lines.push(Line::from(Span::styled(format!(" {} ", row), style)).alignment(alignment));
            }
        }
    }
    lines
}

/// The slice of `text` to show in a single-row box `inner_width` columns
/// wide so the cursor stays visible, and the cursor's column within it.
fn visible_input(text: &str, cursor: usize, inner_width: u16) -> (String, u16) {
    let inner_width = inner_width as usize;
    if inner_width == 0 {
        return (String::new(), 0);
    }

    let chars: Vec<char> = text.chars().collect();
    let cursor = cursor.min(chars.len());

    // Walk back from the cursor until the box is full
    let mut scroll_offset = cursor;
    let mut cursor_x = 0;
    while scroll_offset > 0 {
        let w = chars[scroll_offset - 1].width().unwrap_or(0);
        if cursor_x + w >= inner_width {
            break;
        }
        cursor_x += w;
        scroll_offset -= 1;
    }

    let mut visible = String::new();
    let mut used = 0;
    for &c in &chars[scroll_offset..] {
        let w = c.width().unwrap_or(0);
        if used + w > inner_width {
            break;
        }
        visible.push(c);
        used += w;
    }

    let cursor_x = cursor_x.min(u16::MAX as usize) as u16;
    (visible, cursor_x)
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);

    let animation_frame = app.animation_frame;
    match &mut app.screen {
        Screen::Login(view) => render_login(view, frame, body_area),
        Screen::Chat(view) => render_chat(view, animation_frame, frame, body_area),
    }

    render_footer(app, frame, footer_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let mut spans = vec![
        Span::styled(format!(" {} ", TITLE), Style::default().fg(Color::Cyan).bold()),
        Span::styled(app.server_url.clone(), Style::default().fg(Color::Gray)),
    ];
    if app.is_chat() {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(" Logout (Ctrl-L) ", Style::default().bg(Color::Red).fg(Color::White)));
    }

    let header = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let pairs: &[(&str, &str)] = match &app.screen {
        Screen::Login(_) => &[
            (" Tab ", " field "),
            (" Enter ", " submit "),
            (" Ctrl-R ", " login/register "),
            (" Esc ", " quit "),
        ],
        Screen::Chat(view) => match view.input_mode {
            InputMode::Editing => &[
                (" Enter ", " send "),
                (" PgUp/PgDn ", " scroll "),
                (" Esc ", " normal "),
                (" Ctrl-L ", " logout "),
            ],
            InputMode::Normal => &[
                (" j/k ", " scroll "),
                (" G ", " latest "),
                (" i ", " type "),
                (" L ", " logout "),
                (" q ", " quit "),
            ],
        },
    };

    let mode = match &app.screen {
        Screen::Login(_) => Span::styled(" LOGIN ", Style::default().bg(Color::Blue).fg(Color::White)),
        Screen::Chat(view) if view.input_mode == InputMode::Editing => {
            Span::styled(" INSERT ", Style::default().bg(Color::Yellow).fg(Color::Black))
        }
        Screen::Chat(_) => Span::styled(" CHAT ", Style::default().bg(Color::Blue).fg(Color::White)),
    };

    let mut spans = vec![mode, Span::raw(" ")];
    for (k, label) in pairs {
        spans.push(Span::styled(*k, key_style));
        spans.push(Span::styled(*label, label_style));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

fn render_login(view: &LoginView, frame: &mut Frame, area: Rect) {
    let form = &view.form;
    let box_area = centered(area, 44, 13);
    frame.render_widget(Clear, box_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" {} ", form.mode.title()))
        .title_alignment(Alignment::Center)
        .border_style(Style::default().fg(Color::Cyan));
    let inner = block.inner(box_area);
    frame.render_widget(block, box_area);

    let [notice_area, user_area, pass_area, status_area, toggle_area] = Layout::vertical([
        Constraint::Length(2),
        Constraint::Length(3),
        Constraint::Length(3),
        Constraint::Length(1),
        Constraint::Length(1),
    ])
    .areas(inner);

    if let Some(notice) = &form.notice {
        let (text, color) = match notice {
            Notice::Info(text) => (text, Color::Green),
            Notice::Error(text) => (text, Color::Red),
        };
        frame.render_widget(
            Paragraph::new(text.as_str()).style(Style::default().fg(color)).wrap(Wrap { trim: true }),
            notice_area,
        );
    }

    let masked = "•".repeat(form.password.chars().count());
    for (field, value, field_area) in [
        (Field::Username, form.username.as_str(), user_area),
        (Field::Password, masked.as_str(), pass_area),
    ] {
        let focused = form.focus == field;
        let label = match field {
            Field::Username => " Username ",
            Field::Password => " Password ",
        };
        let border = if focused { Color::Yellow } else { Color::DarkGray };
        let cursor = if focused { form.cursor } else { 0 };
        let (visible, cursor_x) = visible_input(value, cursor, field_area.width.saturating_sub(2));
        let input = Paragraph::new(visible).block(
            Block::default()
                .borders(Borders::ALL)
                .title(label)
                .border_style(Style::default().fg(border)),
        );
        frame.render_widget(input, field_area);

        if focused && !form.submitting {
            frame.set_cursor_position((
                field_area.x.saturating_add(1).saturating_add(cursor_x),
                field_area.y + 1,
            ));
        }
    }

    let status = if form.submitting {
        Line::from(Span::styled("Please wait...", Style::default().fg(Color::DarkGray).italic()))
    } else if form.can_submit() {
        Line::from(Span::styled(format!("Enter to {}", form.mode.title().to_lowercase()), Style::default().fg(Color::Blue)))
    } else {
        Line::from(Span::styled("Username and password are required", Style::default().fg(Color::DarkGray)))
    };
    frame.render_widget(Paragraph::new(status).alignment(Alignment::Center), status_area);

    let toggle = match form.mode {
        AuthMode::Login => "Don't have an account? Ctrl-R: Register",
        AuthMode::Register => "Already have an account? Ctrl-R: Login",
    };
    frame.render_widget(
        Paragraph::new(toggle).alignment(Alignment::Center).style(Style::default().fg(Color::Gray)),
        toggle_area,
    );
}

fn render_chat(view: &mut ChatView, animation_frame: u8, frame: &mut Frame, area: Rect) {
    let [transcript_area, input_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(3),
    ])
    .areas(area);

    let block = Block::default().borders(Borders::ALL).title(" Conversation ");
    let inner = block.inner(transcript_area);

    let mut lines = transcript_lines(view.conversation.transcript(), inner.width);
    if view.conversation.pending() > 0 {
        if !lines.is_empty() {
            lines.push(Line::default());
        }
        let dots = ".".repeat(animation_frame as usize + 1);
        lines.push(Line::from(Span::styled(
            format!("Thinking{}", dots),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
    }

    // Follow the newest line unless the user has scrolled back
    let total = lines.len().min(u16::MAX as usize) as u16;
    let max_offset = total.saturating_sub(inner.height);
    view.scroll_back = view.scroll_back.min(max_offset);
    let offset = max_offset - view.scroll_back;

    let transcript = Paragraph::new(lines)
        .block(block)
        .scroll((offset, 0));
    frame.render_widget(transcript, transcript_area);

    let editing = view.input_mode == InputMode::Editing;
    let border = if editing { Color::Yellow } else { Color::DarkGray };
    let (visible, cursor_x) =
        visible_input(&view.conversation.input, view.cursor, input_area.width.saturating_sub(2));
    let input = Paragraph::new(visible).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Type your message... ")
            .border_style(Style::default().fg(border)),
    );
    frame.render_widget(input, input_area);

    if editing {
        frame.set_cursor_position((
            input_area.x.saturating_add(1).saturating_add(cursor_x),
            input_area.y + 1,
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::tests::FakeAuth;
    use crate::conversation::tests::FakeChat;
    use crate::session::{MemoryTokenStore, Session};
    use ratatui::{backend::TestBackend, Terminal};
    use std::sync::Arc;

    fn app(token: Option<&str>) -> App {
        let store = match token {
            Some(t) => MemoryTokenStore::with_token(t),
            None => MemoryTokenStore::new(),
        };
        App::new(
            Session::restore(Box::new(store)),
            Arc::new(FakeAuth::default()),
            Arc::new(FakeChat::replying("hello")),
            "http://localhost:8000",
        )
    }

    fn draw(app: &mut App, width: u16, height: u16) -> Vec<String> {
        let mut terminal = Terminal::new(TestBackend::new(width, height)).unwrap();
        terminal.draw(|f| render(app, f)).unwrap();
        let buffer = terminal.backend().buffer();
        (0..height)
            .map(|y| (0..width).map(|x| buffer[(x, y)].symbol().to_string()).collect())
            .collect()
    }

    #[test]
    fn transcript_preserves_order_and_alignment() {
        let lines = transcript_lines(
            &[Message::user("hi"), Message::bot("hello"), Message::user("again")],
            40,
        );

        let texts: Vec<String> = lines.iter().map(|l| l.to_string()).collect();
        assert_eq!(texts, vec![" hi ", "", " hello ", "", " again "]);
        assert_eq!(lines[0].alignment, Some(Alignment::Right));
        assert_eq!(lines[2].alignment, Some(Alignment::Left));
        assert_eq!(lines[4].alignment, Some(Alignment::Right));
    }

    #[test]
    fn multi_line_messages_keep_their_lines() {
        let lines = transcript_lines(&[Message::bot("one\ntwo")], 40);
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn wrapping_breaks_at_words_and_splits_long_words() {
        assert_eq!(
            wrap_text_to_width("aaaaaa bbbbbb cc", 10),
            vec!["aaaaaa", "bbbbbb cc"]
        );
        assert_eq!(wrap_text_to_width("abcdefghij", 4), vec!["abcd", "efgh", "ij"]);
        assert_eq!(wrap_text_to_width("", 4), vec![""]);
        assert_eq!(wrap_text_to_width("日本語", 4), vec!["日本", "語"]);
    }

    #[test]
    fn wrapped_messages_are_one_line_per_row() {
        let lines = transcript_lines(&[Message::user("aaaaaa bbbbbb cccccc dddddd")], 12);
        let texts: Vec<String> = lines.iter().map(|l| l.to_string()).collect();
        assert_eq!(texts, vec![" aaaaaa ", " bbbbbb ", " cccccc ", " dddddd "]);
    }

    #[test]
    fn newest_reply_stays_visible_when_messages_wrap() {
        let mut app = app(Some("tok"));
        if let Screen::Chat(view) = &mut app.screen {
            for _ in 0..6 {
                view.conversation.input = "aaaaaa bbbbbb cccccc dddddd".into();
                let _ = view.conversation.begin_exchange(&app.session);
                view.conversation
                    .complete_exchange(Ok("eeeeee ffffff gggggg hhhhhh".into()));
            }
            view.conversation.input = "x".into();
            let _ = view.conversation.begin_exchange(&app.session);
            view.conversation.complete_exchange(Ok("ENDMARK".into()));
        }

        let rows = draw(&mut app, 14, 16);
        assert!(rows.iter().any(|r| r.contains("ENDMARK")));
    }

    #[test]
    fn input_scrolls_to_keep_cursor_text_visible() {
        let mut app = app(Some("tok"));
        if let Screen::Chat(view) = &mut app.screen {
            view.conversation.input = format!("{}TAILWORD", "x".repeat(60));
            view.cursor = view.conversation.input.chars().count();
        }

        let rows = draw(&mut app, 30, 10);
        assert!(rows.iter().any(|r| r.contains("TAILWORD")));
    }

    #[test]
    fn login_field_scrolls_with_cursor() {
        let mut app = app(None);
        if let Screen::Login(view) = &mut app.screen {
            view.form.username = format!("{}TAILWORD", "u".repeat(80));
            view.form.cursor = view.form.username.chars().count();
        }

        let rows = draw(&mut app, 60, 20).join("\n");
        assert!(rows.contains("TAILWORD"));
    }

    #[test]
    fn visible_input_measures_display_width() {
        assert_eq!(visible_input("hello", 5, 10), ("hello".to_string(), 5));
        // wide characters take two columns each
        assert_eq!(visible_input("日本語", 3, 10), ("日本語".to_string(), 6));
        let (visible, x) = visible_input("日本語です", 5, 6);
        assert_eq!((visible.as_str(), x), ("です", 4));
        assert_eq!(visible_input("abc", 3, 0), (String::new(), 0));
    }

    #[test]
    fn huge_input_does_not_overflow_cursor() {
        let text = "x".repeat(70_000);
        let (visible, x) = visible_input(&text, 70_000, 20);
        assert_eq!(visible.chars().count(), 19);
        assert_eq!(x, 19);
        assert_eq!(visible_input(&text, 0, 20).1, 0);
    }

    #[test]
    fn login_screen_masks_password() {
        let mut app = app(None);
        if let Screen::Login(view) = &mut app.screen {
            view.form.username = "alice".into();
            view.form.password = "secret".into();
        }

        let rows = draw(&mut app, 60, 20).join("\n");
        assert!(rows.contains("Login"));
        assert!(rows.contains("alice"));
        assert!(rows.contains("••••••"));
        assert!(!rows.contains("secret"));
    }

    #[test]
    fn chat_screen_places_user_right_and_bot_left() {
        let mut app = app(Some("tok"));
        if let Screen::Chat(view) = &mut app.screen {
            view.conversation.input = "hi".into();
            let _ = view.conversation.begin_exchange(&app.session);
            view.conversation.complete_exchange(Ok("hello".into()));
        }

        let rows = draw(&mut app, 40, 16);
        let user_row = rows.iter().find(|r| r.contains(" hi ")).unwrap();
        let bot_row = rows.iter().find(|r| r.contains("hello")).unwrap();
        assert!(user_row.find(" hi ").unwrap() > 20);
        assert!(bot_row.find("hello").unwrap() < 5);
        assert!(rows[0].contains("Logout"));
    }

    #[test]
    fn pending_exchange_shows_thinking() {
        let mut app = app(Some("tok"));
        if let Screen::Chat(view) = &mut app.screen {
            view.conversation.input = "hi".into();
            let _ = view.conversation.begin_exchange(&app.session);
        }

        let rows = draw(&mut app, 40, 16).join("\n");
        assert!(rows.contains("Thinking."));
    }
}
