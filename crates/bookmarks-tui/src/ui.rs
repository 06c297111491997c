//! Rendering. Pure function of the app and the view snapshot.

use bookmarks_core::bookmark::DraftInput;
use bookmarks_core::view::{BookmarkRow, Screen, ViewState};
use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap};

use crate::app::{App, Focus};

const DIAGNOSTICS_HEIGHT: u16 = 8;

pub fn draw(frame: &mut Frame<'_>, app: &App, state: &ViewState) {
    let screen = state.screen();

    let mut constraints = vec![Constraint::Min(0)];
    if app.show_diagnostics {
        constraints.push(Constraint::Length(DIAGNOSTICS_HEIGHT));
    }
    constraints.push(Constraint::Length(1));
    let areas = Layout::vertical(constraints).split(frame.size());

    match &screen {
        Screen::Loading => draw_loading(frame, areas[0]),
        Screen::SignIn => draw_sign_in(frame, areas[0], app),
        Screen::Bookmarks {
            heading,
            rows,
            draft,
        } => draw_bookmarks(
            frame,
            areas[0],
            app,
            heading,
            rows,
            draft,
            screen.empty_message(),
        ),
    }

    if app.show_diagnostics {
        draw_diagnostics(frame, areas[1], app);
    }
    draw_footer(frame, areas[areas.len() - 1], &screen);
}

fn draw_loading(frame: &mut Frame<'_>, area: Rect) {
    let paragraph = Paragraph::new("Loading...")
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).title(" Bookmarks "));
    frame.render_widget(paragraph, area);
}

fn draw_sign_in(frame: &mut Frame<'_>, area: Rect, app: &App) {
    let status = if app.login_in_progress() {
        Line::styled(
            "Waiting for the browser sign-in to finish...",
            Style::default().fg(Color::Yellow),
        )
    } else {
        Line::from(vec![
            Span::raw("Press "),
            Span::styled("l", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(" to sign in"),
        ])
    };

    let text = vec![
        Line::raw(""),
        Line::styled(
            "Sign in to see your bookmarks",
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Line::raw(""),
        status,
    ];
    let paragraph = Paragraph::new(text)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).title(" Bookmarks "));
    frame.render_widget(paragraph, area);
}

fn draw_bookmarks(
    frame: &mut Frame<'_>,
    area: Rect,
    app: &App,
    heading: &str,
    rows: &[BookmarkRow],
    draft: &DraftInput,
    empty_message: Option<&str>,
) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" Bookmarks - {} ", heading));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let [title_area, url_area, list_area] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Length(3),
        Constraint::Min(0),
    ])
    .areas(inner);

    draw_input(frame, title_area, "Title", &draft.title, app.focus == Focus::Title);
    draw_input(frame, url_area, "URL", &draft.url, app.focus == Focus::Url);

    let list_block = Block::default()
        .borders(Borders::ALL)
        .title(" Saved ")
        .border_style(focus_style(app.focus == Focus::List));

    if let Some(message) = empty_message {
        let empty = Paragraph::new(message)
            .style(Style::default().fg(Color::DarkGray))
            .block(list_block);
        frame.render_widget(empty, list_area);
        return;
    }

    let items: Vec<ListItem> = rows
        .iter()
        .map(|row| {
            let title_style = if row.pending {
                Style::default().add_modifier(Modifier::ITALIC | Modifier::DIM)
            } else {
                Style::default().add_modifier(Modifier::BOLD)
            };
            ListItem::new(Line::from(vec![
                Span::styled(row.title.clone(), title_style),
                Span::raw("  "),
                Span::styled(row.url.clone(), Style::default().fg(Color::Cyan)),
            ]))
        })
        .collect();

    let list = List::new(items)
        .block(list_block)
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
        .highlight_symbol("> ");

    let mut list_state = ListState::default();
    if app.focus == Focus::List {
        list_state.select(Some(app.selected.min(rows.len().saturating_sub(1))));
    }
    frame.render_stateful_widget(list, list_area, &mut list_state);
}

fn draw_input(frame: &mut Frame<'_>, area: Rect, label: &str, value: &str, focused: bool) {
    let input = Paragraph::new(value.to_string()).block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!(" {} ", label))
            .border_style(focus_style(focused)),
    );
    frame.render_widget(input, area);

    if focused {
        let width = value.chars().count() as u16;
        let x = (area.x + 1 + width).min(area.right().saturating_sub(2));
        frame.set_cursor(x, area.y + 1);
    }
}

fn draw_diagnostics(frame: &mut Frame<'_>, area: Rect, app: &App) {
    let visible = DIAGNOSTICS_HEIGHT.saturating_sub(2) as usize;
    let lines: Vec<Line> = app
        .diagnostics
        .iter()
        .rev()
        .take(visible)
        .rev()
        .map(|d| {
            let color = if d.level == tracing::Level::ERROR {
                Color::Red
            } else {
                Color::Yellow
            };
            Line::from(vec![
                Span::raw(format!("{} ", d.timestamp.format("%H:%M:%S"))),
                Span::styled(format!("{:<5} ", d.level), Style::default().fg(color)),
                Span::raw(d.message.clone()),
            ])
        })
        .collect();

    let paragraph = Paragraph::new(lines)
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).title(" Diagnostics "));
    frame.render_widget(paragraph, area);
}

fn draw_footer(frame: &mut Frame<'_>, area: Rect, screen: &Screen) {
    let hints = match screen {
        Screen::Loading => "Esc quit",
        Screen::SignIn => "l sign in | F2 diagnostics | Esc quit",
        Screen::Bookmarks { .. } => {
            "Tab focus | Enter add/open | d remove | Ctrl-L sign out | F2 diagnostics | Esc quit"
        }
    };
    frame.render_widget(
        Paragraph::new(hints).style(Style::default().fg(Color::DarkGray)),
        area,
    );
}

fn focus_style(focused: bool) -> Style {
    if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    }
}
