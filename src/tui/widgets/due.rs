use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
    Frame,
};

use super::{due_label, truncate};
use crate::calendar::days_between;
use crate::tui::App;

pub fn draw(f: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" Due on or before {} ", app.today))
        .title_style(Style::default().fg(Color::Yellow));

    if app.due.items.is_empty() {
        let paragraph = Paragraph::new("Nothing due. Enjoy the day off!")
            .style(Style::default().fg(Color::Green))
            .block(block);
        f.render_widget(paragraph, area);
        return;
    }

    let items: Vec<ListItem> = app
        .due
        .items
        .iter()
        .map(|due| {
            let rd = &due.review_date;
            let (date, color) = due_label(Some(rd.scheduled_date), app.today);
            let late = days_between(rd.scheduled_date, app.today);
            let late_text = match late {
                0 => "today".to_string(),
                1 => "1 day late".to_string(),
                n => format!("{} days late", n),
            };

            ListItem::new(Line::from(vec![
                Span::styled(format!("{:<10}", date), Style::default().fg(color)),
                Span::styled(
                    format!("{:<32}", truncate(&due.item_name, 30)),
                    Style::default().fg(Color::White),
                ),
                Span::styled(
                    format!("Step {:<3} ", rd.step_number),
                    Style::default().fg(Color::Cyan),
                ),
                Span::styled(late_text, Style::default().fg(Color::Gray)),
            ]))
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    let mut state = ListState::default();
    state.select(app.due.selected);
    f.render_stateful_widget(list, area, &mut state);
}
