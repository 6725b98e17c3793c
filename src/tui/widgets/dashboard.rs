use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph},
    Frame,
};

use super::{due_label, progress_bar, truncate};
use crate::tui::App;

pub fn draw(f: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(9), // Stats + due reviews row
            Constraint::Min(0),    // Upcoming items
        ])
        .split(area);

    let top_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(chunks[0]);

    draw_stats(f, app, top_chunks[0]);
    draw_due_reviews(f, app, top_chunks[1]);
    draw_upcoming(f, app, chunks[1]);
}

fn stat_line(label: &str, value: String, color: Color) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("{}: ", label), Style::default().fg(Color::Gray)),
        Span::styled(value, Style::default().fg(color)),
    ])
}

fn draw_stats(f: &mut Frame, app: &App, area: Rect) {
    let stats = &app.stats;
    let completion = if stats.total_reviews > 0 {
        stats.completed_reviews as f64 * 100.0 / stats.total_reviews as f64
    } else {
        0.0
    };

    let text = vec![
        Line::from(vec![
            Span::styled("Items: ", Style::default().fg(Color::Gray)),
            Span::styled(
                format!("{}", stats.total_items),
                Style::default()
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD),
            ),
        ]),
        stat_line("Finished", stats.finished_items.to_string(), Color::Green),
        stat_line(
            "Reviews",
            format!("{}/{}", stats.completed_reviews, stats.total_reviews),
            Color::White,
        ),
        stat_line(
            "Due",
            stats.due_today.to_string(),
            if stats.due_today > 0 {
                Color::Yellow
            } else {
                Color::White
            },
        ),
        stat_line("Completed", format!("{:.0}%", completion), Color::Cyan),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Stats ")
        .title_style(Style::default().fg(Color::Cyan));

    let paragraph = Paragraph::new(text).block(block);
    f.render_widget(paragraph, area);
}

fn draw_due_reviews(f: &mut Frame, app: &App, area: Rect) {
    let items: Vec<ListItem> = app
        .due
        .items
        .iter()
        .take(area.height.saturating_sub(2) as usize)
        .enumerate()
        .map(|(i, due)| {
            let (date, color) = due_label(Some(due.review_date.scheduled_date), app.today);
            ListItem::new(Line::from(vec![
                Span::styled(format!("{}. ", i + 1), Style::default().fg(Color::DarkGray)),
                Span::styled(
                    format!("{:<22}", truncate(&due.item_name, 20)),
                    Style::default().fg(Color::White),
                ),
                Span::styled(
                    format!("#{} ", due.review_date.step_number),
                    Style::default().fg(Color::Cyan),
                ),
                Span::styled(date, Style::default().fg(color)),
            ]))
        })
        .collect();

    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" Due ({}) ", app.due.items.len()))
        .title_style(Style::default().fg(Color::Yellow));

    let list = List::new(items).block(block);
    f.render_widget(list, area);
}

fn draw_upcoming(f: &mut Frame, app: &App, area: Rect) {
    let mut upcoming: Vec<_> = app
        .items
        .items
        .iter()
        .filter(|o| !o.item.is_finished)
        .filter_map(|o| o.next_review.filter(|d| *d > app.today).map(|d| (d, o)))
        .collect();
    upcoming.sort_by_key(|(d, _)| *d);

    let items: Vec<ListItem> = upcoming
        .into_iter()
        .map(|(date, overview)| {
            ListItem::new(Line::from(vec![
                Span::styled(
                    format!("{:<10}", date.format("%b %d").to_string()),
                    Style::default().fg(Color::DarkGray),
                ),
                Span::styled(
                    format!("{:<32}", truncate(&overview.item.name, 30)),
                    Style::default().fg(Color::White),
                ),
                Span::styled(
                    progress_bar(overview.completed_steps, overview.total_steps, 8),
                    Style::default().fg(Color::Green),
                ),
                Span::styled(
                    format!(" {}/{}", overview.completed_steps, overview.total_steps),
                    Style::default().fg(Color::Yellow),
                ),
            ]))
        })
        .collect();

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Upcoming ")
        .title_style(Style::default().fg(Color::Magenta));

    let list = List::new(items).block(block);
    f.render_widget(list, area);
}
