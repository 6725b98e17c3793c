use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
    Frame,
};

use super::{due_label, progress_bar, truncate};
use crate::tui::App;

pub fn draw(f: &mut Frame, app: &App, area: Rect) {
    let title = if app.unfinished_only {
        " Items (unfinished) ".to_string()
    } else {
        " Items ".to_string()
    };

    let items: Vec<ListItem> = app
        .items
        .items
        .iter()
        .map(|overview| {
            let (next_text, next_color) = if overview.item.is_finished {
                ("-".to_string(), Color::DarkGray)
            } else {
                due_label(overview.next_review, app.today)
            };
            let status_color = match overview.status_label() {
                "Finished" => Color::Green,
                "No pattern" => Color::DarkGray,
                _ => Color::Cyan,
            };

            ListItem::new(Line::from(vec![
                Span::styled(
                    format!("{:<30}", truncate(&overview.item.name, 28)),
                    Style::default().fg(Color::White),
                ),
                Span::styled(
                    progress_bar(overview.completed_steps, overview.total_steps, 6),
                    Style::default().fg(Color::Green),
                ),
                Span::styled(
                    format!(" {:>2}/{:<2} ", overview.completed_steps, overview.total_steps),
                    Style::default().fg(Color::Yellow),
                ),
                Span::styled(
                    format!("{:<12}", overview.status_label()),
                    Style::default().fg(status_color),
                ),
                Span::styled(next_text, Style::default().fg(next_color)),
            ]))
        })
        .collect();

    let block = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .title_style(Style::default().fg(Color::Cyan));

    let header_style = Style::default()
        .fg(Color::DarkGray)
        .add_modifier(Modifier::BOLD);
    let header = Line::from(vec![
        Span::styled(format!("{:<30}", "Name"), header_style),
        Span::styled("Progress     ", header_style),
        Span::styled(format!("{:<12}", "Status"), header_style),
        Span::styled("Next Review", header_style),
    ]);

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    let mut state = ListState::default();
    state.select(app.items.selected);

    // Header sits on the block's top padding row
    let header_area = Rect {
        x: area.x + 1,
        y: area.y + 1,
        width: area.width.saturating_sub(2),
        height: 1,
    };
    f.render_widget(Paragraph::new(header), header_area);

    let list_area = Rect {
        x: area.x,
        y: area.y + 1,
        width: area.width,
        height: area.height.saturating_sub(1),
    };

    f.render_stateful_widget(list, list_area, &mut state);
}
