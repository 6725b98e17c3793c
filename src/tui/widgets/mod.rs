pub mod dashboard;
pub mod due;
pub mod item_detail;
pub mod items;

use chrono::NaiveDate;
use ratatui::style::Color;

pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

pub fn progress_bar(done: u32, total: u32, width: usize) -> String {
    let filled = if total == 0 {
        0
    } else {
        (done as usize * width) / total as usize
    };
    format!("{}{}", "█".repeat(filled), "░".repeat(width - filled.min(width)))
}

/// Short date plus its colour relative to today: red when overdue, yellow
/// when due today.
pub fn due_label(date: Option<NaiveDate>, today: NaiveDate) -> (String, Color) {
    match date {
        Some(d) if d < today => (format!("{} !", d.format("%b %d")), Color::Red),
        Some(d) if d == today => (d.format("%b %d").to_string(), Color::Yellow),
        Some(d) => (d.format("%b %d").to_string(), Color::White),
        None => ("-".to_string(), Color::DarkGray),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_counts_chars() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello world", 8), "hello...");
        assert_eq!(truncate("日本語の単語", 5), "日本...");
    }

    #[test]
    fn progress_bar_fills_proportionally() {
        assert_eq!(progress_bar(0, 0, 4), "░░░░");
        assert_eq!(progress_bar(1, 2, 4), "██░░");
        assert_eq!(progress_bar(3, 3, 4), "████");
    }

    #[test]
    fn due_label_colours() {
        let today = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
        let (text, color) = due_label(NaiveDate::from_ymd_opt(2024, 1, 9), today);
        assert_eq!(text, "Jan 09 !");
        assert_eq!(color, Color::Red);
        assert_eq!(due_label(Some(today), today).1, Color::Yellow);
        assert_eq!(due_label(None, today), ("-".to_string(), Color::DarkGray));
    }
}
