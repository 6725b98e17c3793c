mod ui;
mod widgets;

use std::io;
use std::time::Duration;

use chrono::NaiveDate;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use uuid::Uuid;

use crate::db::{Database, Stats};
use crate::engine::Engine;
use crate::error::{EngineError, Result as EngineResult};
use crate::models::{DueReview, Item, ItemOverview, ItemWithSchedule, ReviewDate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Dashboard,
    Items,
    ItemDetail,
    Due,
}

impl View {
    fn next(&self) -> Self {
        match self {
            View::Dashboard => View::Items,
            View::Items => View::Due,
            View::ItemDetail => View::Items,
            View::Due => View::Dashboard,
        }
    }

    fn prev(&self) -> Self {
        match self {
            View::Dashboard => View::Due,
            View::Items => View::Dashboard,
            View::ItemDetail => View::Items,
            View::Due => View::Items,
        }
    }
}

pub struct StatefulList<T> {
    pub items: Vec<T>,
    pub selected: Option<usize>,
}

impl<T> StatefulList<T> {
    fn with_items(items: Vec<T>) -> Self {
        let selected = if items.is_empty() { None } else { Some(0) };
        Self { items, selected }
    }

    // Keeps the cursor near where it was when the list is reloaded
    fn replace_items(&mut self, items: Vec<T>) {
        self.selected = match (self.selected, items.len()) {
            (_, 0) => None,
            (Some(i), len) => Some(i.min(len - 1)),
            (None, _) => Some(0),
        };
        self.items = items;
    }

    fn next(&mut self) {
        if self.items.is_empty() {
            return;
        }
        let i = match self.selected {
            Some(i) => {
                if i >= self.items.len() - 1 {
                    0
                } else {
                    i + 1
                }
            }
            None => 0,
        };
        self.selected = Some(i);
    }

    fn previous(&mut self) {
        if self.items.is_empty() {
            return;
        }
        let i = match self.selected {
            Some(i) => {
                if i == 0 {
                    self.items.len() - 1
                } else {
                    i - 1
                }
            }
            None => 0,
        };
        self.selected = Some(i);
    }

    fn first(&mut self) {
        if !self.items.is_empty() {
            self.selected = Some(0);
        }
    }

    fn last(&mut self) {
        if !self.items.is_empty() {
            self.selected = Some(self.items.len() - 1);
        }
    }

    fn selected_item(&self) -> Option<&T> {
        self.selected.and_then(|i| self.items.get(i))
    }
}

pub struct App {
    db: Database,
    user_id: String,
    pub today: NaiveDate,
    pub view: View,
    pub items: StatefulList<ItemOverview>,
    pub due: StatefulList<DueReview>,
    pub selected_item: Option<Item>,
    pub selected_reviews: StatefulList<ReviewDate>,
    pub stats: Stats,
    pub unfinished_only: bool,
    pub status: Option<String>,
    pub should_quit: bool,
}

impl App {
    pub fn new(db: Database, user_id: &str, today: NaiveDate) -> EngineResult<Self> {
        let stats = db.get_stats(user_id, today)?;
        let items = db.list_items(user_id, false)?;
        let due = db.due_reviews(user_id, today)?;

        Ok(Self {
            db,
            user_id: user_id.to_string(),
            today,
            view: View::Dashboard,
            items: StatefulList::with_items(items),
            due: StatefulList::with_items(due),
            selected_item: None,
            selected_reviews: StatefulList::with_items(Vec::new()),
            stats,
            unfinished_only: false,
            status: None,
            should_quit: false,
        })
    }

    pub fn refresh_data(&mut self) -> EngineResult<()> {
        self.stats = self.db.get_stats(&self.user_id, self.today)?;
        self.items
            .replace_items(self.db.list_items(&self.user_id, self.unfinished_only)?);
        self.due
            .replace_items(self.db.due_reviews(&self.user_id, self.today)?);

        if let Some(item) = &self.selected_item {
            match self.db.get_item_with_schedule(item.id)? {
                Some(schedule) => self.show_schedule(schedule),
                None => {
                    self.selected_item = None;
                    self.view = View::Items;
                }
            }
        }
        Ok(())
    }

    fn show_schedule(&mut self, schedule: ItemWithSchedule) {
        self.selected_reviews.replace_items(schedule.review_dates);
        self.selected_item = Some(schedule.item);
    }

    fn open_item(&mut self, item_id: Uuid) -> EngineResult<()> {
        if let Some(schedule) = self.db.get_item_with_schedule(item_id)? {
            self.selected_reviews = StatefulList::with_items(schedule.review_dates);
            self.selected_item = Some(schedule.item);
            self.view = View::ItemDetail;
        }
        Ok(())
    }

    fn open_selected(&mut self) -> EngineResult<()> {
        let item_id = match self.view {
            View::Items => self.items.selected_item().map(|o| o.item.id),
            View::Due => self.due.selected_item().map(|r| r.review_date.item_id),
            _ => None,
        };
        match item_id {
            Some(id) => self.open_item(id),
            None => Ok(()),
        }
    }

    fn close_item(&mut self) {
        self.view = View::Items;
        self.selected_item = None;
    }

    // Runs an engine action, reporting rejections in the status bar instead
    // of tearing down the terminal
    fn act<F>(&mut self, label: &str, action: F) -> EngineResult<()>
    where
        F: FnOnce(&Engine<'_, Database>) -> EngineResult<ItemWithSchedule>,
    {
        let outcome = {
            let engine = Engine::new(&self.db, self.user_id.as_str());
            action(&engine)
        };

        match outcome {
            Ok(_) => {
                self.status = Some(label.to_string());
                self.refresh_data()
            }
            Err(e) if e.is_rejection() || matches!(e, EngineError::NotFound { .. }) => {
                self.status = Some(e.to_string());
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn toggle_selected_review(&mut self) -> EngineResult<()> {
        let target = match self.view {
            View::ItemDetail => self
                .selected_reviews
                .selected_item()
                .map(|r| (r.item_id, r.step_number, r.is_completed)),
            View::Due => self
                .due
                .selected_item()
                .map(|d| (d.review_date.item_id, d.review_date.step_number, false)),
            _ => None,
        };

        match target {
            Some((item_id, step, true)) => self.act("Review reopened", |e| {
                e.uncomplete_review_date(item_id, step)
            }),
            Some((item_id, step, false)) => self.act("Review done", |e| {
                e.complete_review_date(item_id, step)
            }),
            None => Ok(()),
        }
    }

    fn handle_key(&mut self, key: KeyCode, modifiers: KeyModifiers) -> EngineResult<()> {
        self.status = None;

        match key {
            KeyCode::Char('q') => self.should_quit = true,

            // Refresh: Ctrl+r
            KeyCode::Char('r') if modifiers.contains(KeyModifiers::CONTROL) => {
                self.refresh_data()?;
            }

            KeyCode::Esc => {
                if self.view == View::ItemDetail {
                    self.close_item();
                }
            }

            KeyCode::Char('h') | KeyCode::Left => match self.view {
                View::ItemDetail => self.close_item(),
                _ => self.view = self.view.prev(),
            },
            KeyCode::Char('l') | KeyCode::Right => match self.view {
                View::Items | View::Due => self.open_selected()?,
                _ => self.view = self.view.next(),
            },

            KeyCode::Tab => {
                if modifiers.contains(KeyModifiers::SHIFT) {
                    self.view = self.view.prev();
                } else {
                    self.view = self.view.next();
                }
            }
            KeyCode::BackTab => {
                self.view = self.view.prev();
            }

            KeyCode::Char('j') | KeyCode::Down => match self.view {
                View::Items => self.items.next(),
                View::Due => self.due.next(),
                View::ItemDetail => self.selected_reviews.next(),
                View::Dashboard => {}
            },
            KeyCode::Char('k') | KeyCode::Up => match self.view {
                View::Items => self.items.previous(),
                View::Due => self.due.previous(),
                View::ItemDetail => self.selected_reviews.previous(),
                View::Dashboard => {}
            },

            KeyCode::Char('g') => match self.view {
                View::Items => self.items.first(),
                View::Due => self.due.first(),
                View::ItemDetail => self.selected_reviews.first(),
                View::Dashboard => {}
            },
            KeyCode::Char('G') => match self.view {
                View::Items => self.items.last(),
                View::Due => self.due.last(),
                View::ItemDetail => self.selected_reviews.last(),
                View::Dashboard => {}
            },

            KeyCode::Enter => self.open_selected()?,

            KeyCode::Char(' ') => self.toggle_selected_review()?,

            KeyCode::Char('u') if self.view == View::Items => {
                self.unfinished_only = !self.unfinished_only;
                self.items = StatefulList::with_items(
                    self.db.list_items(&self.user_id, self.unfinished_only)?,
                );
            }

            KeyCode::Char('f') if self.view == View::ItemDetail => {
                if let Some(id) = self.selected_item.as_ref().map(|i| i.id) {
                    self.act("Item finished", |e| e.force_finish(id))?;
                }
            }
            KeyCode::Char('r') if self.view == View::ItemDetail => {
                if let Some(id) = self.selected_item.as_ref().map(|i| i.id) {
                    let today = self.today;
                    self.act("Item resumed", |e| e.force_resume(id, today))?;
                }
            }

            _ => {}
        }
        Ok(())
    }
}

pub fn run(
    db: Database,
    user_id: &str,
    today: NaiveDate,
) -> Result<(), Box<dyn std::error::Error>> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = match App::new(db, user_id, today) {
        Ok(mut app) => run_app(&mut terminal, &mut app),
        Err(e) => Err(e.into()),
    };

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<(), Box<dyn std::error::Error>> {
    loop {
        terminal.draw(|f| ui::draw(f, app))?;

        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                app.handle_key(key.code, key.modifiers)?;
            }
        }

        if app.should_quit {
            return Ok(());
        }
    }
}
