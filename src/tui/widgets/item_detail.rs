use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};

use super::due_label;
use crate::models::Item;
use crate::tui::App;

pub fn draw(f: &mut Frame, app: &App, area: Rect) {
    let Some(item) = &app.selected_item else {
        let block = Block::default().borders(Borders::ALL).title(" Item ");
        let paragraph = Paragraph::new("No item selected").block(block);
        f.render_widget(paragraph, area);
        return;
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(6), // Header info
            Constraint::Min(0),    // Review dates
        ])
        .split(area);

    draw_header(f, item, chunks[0]);
    draw_review_dates(f, app, chunks[1]);
}

fn draw_header(f: &mut Frame, item: &Item, area: Rect) {
    let detail = if item.detail.is_empty() {
        "No detail"
    } else {
        item.detail.as_str()
    };
    let (status, status_color) = if item.is_finished {
        ("Finished", Color::Green)
    } else {
        ("Active", Color::Cyan)
    };

    let text = vec![
        Line::from(vec![
            Span::styled("Detail: ", Style::default().fg(Color::Gray)),
            Span::styled(detail, Style::default().fg(Color::White)),
        ]),
        Line::from(vec![
            Span::styled("Learned: ", Style::default().fg(Color::Gray)),
            Span::styled(
                item.learned_date.to_string(),
                Style::default().fg(Color::White),
            ),
            Span::raw("  "),
            Span::styled("Status: ", Style::default().fg(Color::Gray)),
            Span::styled(status, Style::default().fg(status_color)),
        ]),
        Line::from(vec![
            Span::styled("Id: ", Style::default().fg(Color::Gray)),
            Span::styled(item.id.to_string(), Style::default().fg(Color::DarkGray)),
        ]),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" {} ", item.name))
        .title_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );

    let paragraph = Paragraph::new(text).block(block).wrap(Wrap { trim: true });
    f.render_widget(paragraph, area);
}

fn draw_review_dates(f: &mut Frame, app: &App, area: Rect) {
    let reviews = &app.selected_reviews.items;

    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" Review Dates ({}) ", reviews.len()))
        .title_style(Style::default().fg(Color::Magenta));

    if reviews.is_empty() {
        let paragraph = Paragraph::new("No pattern attached, nothing scheduled.")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        f.render_widget(paragraph, area);
        return;
    }

    let items: Vec<ListItem> = reviews
        .iter()
        .map(|rd| {
            let (mark, mark_color) = if rd.is_completed {
                ("[x]", Color::Green)
            } else {
                ("[ ]", Color::White)
            };
            let (date, date_color) = if rd.is_completed {
                (rd.scheduled_date.format("%b %d").to_string(), Color::DarkGray)
            } else {
                due_label(Some(rd.scheduled_date), app.today)
            };
            let moved = if rd.scheduled_date != rd.initial_scheduled_date {
                format!("  (was {})", rd.initial_scheduled_date.format("%b %d"))
            } else {
                String::new()
            };

            ListItem::new(Line::from(vec![
                Span::styled(format!("{} ", mark), Style::default().fg(mark_color)),
                Span::styled(
                    format!("Step {:<3} ", rd.step_number),
                    Style::default().fg(Color::Cyan),
                ),
                Span::styled(format!("{:<10}", date), Style::default().fg(date_color)),
                Span::styled(moved, Style::default().fg(Color::Gray)),
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
    state.select(app.selected_reviews.selected);
    f.render_stateful_widget(list, area, &mut state);
}
