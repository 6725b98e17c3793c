use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use uuid::Uuid;

use crate::error::{EngineError, Result};
use crate::models::{
    Category, DueReview, Item, ItemOverview, ItemWithSchedule, Pattern, PatternStep, ReviewDate,
    StudyBox,
};
use crate::store::{
    ItemStore, PatternStepReader, Reference, ReferenceReader, ReviewDateStore, Stores,
    TransactionRunner,
};

const ITEM_COLUMNS: &str = "id, user_id, category_id, box_id, pattern_id, name, detail, \
                            learned_date, is_finished, edited_at";

const REVIEW_DATE_COLUMNS: &str = "id, user_id, item_id, category_id, box_id, step_number, \
                                   initial_scheduled_date, scheduled_date, is_completed";

fn item_from_row(row: &Row) -> rusqlite::Result<Item> {
    Ok(Item {
        id: row.get(0)?,
        user_id: row.get(1)?,
        category_id: row.get(2)?,
        box_id: row.get(3)?,
        pattern_id: row.get(4)?,
        name: row.get(5)?,
        detail: row.get(6)?,
        learned_date: row.get(7)?,
        is_finished: row.get(8)?,
        edited_at: row.get(9)?,
    })
}

fn review_date_from_row(row: &Row) -> rusqlite::Result<ReviewDate> {
    Ok(ReviewDate {
        id: row.get(0)?,
        user_id: row.get(1)?,
        item_id: row.get(2)?,
        category_id: row.get(3)?,
        box_id: row.get(4)?,
        step_number: row.get(5)?,
        initial_scheduled_date: row.get(6)?,
        scheduled_date: row.get(7)?,
        is_completed: row.get(8)?,
    })
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self { conn })
    }

    pub fn init(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS categories (
                id BLOB PRIMARY KEY,
                user_id TEXT NOT NULL,
                name TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                UNIQUE (user_id, name)
            );

            CREATE TABLE IF NOT EXISTS boxes (
                id BLOB PRIMARY KEY,
                user_id TEXT NOT NULL,
                name TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                UNIQUE (user_id, name)
            );

            CREATE TABLE IF NOT EXISTS patterns (
                id BLOB PRIMARY KEY,
                user_id TEXT NOT NULL,
                name TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                UNIQUE (user_id, name)
            );

            CREATE TABLE IF NOT EXISTS pattern_steps (
                pattern_id BLOB NOT NULL,
                step_number INTEGER NOT NULL CHECK (step_number > 0),
                interval_days INTEGER NOT NULL CHECK (interval_days > 0),
                PRIMARY KEY (pattern_id, step_number),
                FOREIGN KEY (pattern_id) REFERENCES patterns(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS items (
                id BLOB PRIMARY KEY,
                user_id TEXT NOT NULL,
                category_id BLOB,
                box_id BLOB,
                pattern_id BLOB,
                name TEXT NOT NULL,
                detail TEXT NOT NULL DEFAULT '',
                learned_date TEXT NOT NULL,
                is_finished INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                edited_at TEXT NOT NULL,
                FOREIGN KEY (category_id) REFERENCES categories(id) ON DELETE SET NULL,
                FOREIGN KEY (box_id) REFERENCES boxes(id) ON DELETE SET NULL,
                FOREIGN KEY (pattern_id) REFERENCES patterns(id) ON DELETE RESTRICT
            );

            CREATE TABLE IF NOT EXISTS review_dates (
                id BLOB PRIMARY KEY,
                user_id TEXT NOT NULL,
                item_id BLOB NOT NULL,
                category_id BLOB,
                box_id BLOB,
                step_number INTEGER NOT NULL,
                initial_scheduled_date TEXT NOT NULL,
                scheduled_date TEXT NOT NULL,
                is_completed INTEGER NOT NULL DEFAULT 0,
                UNIQUE (item_id, step_number),
                FOREIGN KEY (item_id) REFERENCES items(id) ON DELETE CASCADE,
                FOREIGN KEY (category_id) REFERENCES categories(id) ON DELETE SET NULL,
                FOREIGN KEY (box_id) REFERENCES boxes(id) ON DELETE SET NULL
            );

            CREATE INDEX IF NOT EXISTS idx_items_user ON items(user_id);
            CREATE INDEX IF NOT EXISTS idx_items_pattern ON items(pattern_id);
            CREATE INDEX IF NOT EXISTS idx_review_dates_item ON review_dates(item_id);
            CREATE INDEX IF NOT EXISTS idx_review_dates_due
                ON review_dates(user_id, is_completed, scheduled_date);
            "#,
        )?;
        Ok(())
    }

    pub fn store(&self) -> SqliteStore<'_> {
        SqliteStore { conn: &self.conn }
    }

    // Category operations
    pub fn add_category(&self, category: &Category) -> Result<()> {
        self.conn.execute(
            "INSERT INTO categories (id, user_id, name) VALUES (?1, ?2, ?3)",
            params![category.id, category.user_id, category.name],
        )?;
        Ok(())
    }

    pub fn list_categories(&self, user_id: &str) -> Result<Vec<Category>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, user_id, name FROM categories WHERE user_id = ?1 ORDER BY name")?;
        let rows = stmt.query_map(params![user_id], |row| {
            Ok(Category {
                id: row.get(0)?,
                user_id: row.get(1)?,
                name: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn delete_category(&self, user_id: &str, id: Uuid) -> Result<bool> {
        let rows = self.conn.execute(
            "DELETE FROM categories WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
        )?;
        Ok(rows > 0)
    }

    // Box operations
    pub fn add_box(&self, study_box: &StudyBox) -> Result<()> {
        self.conn.execute(
            "INSERT INTO boxes (id, user_id, name) VALUES (?1, ?2, ?3)",
            params![study_box.id, study_box.user_id, study_box.name],
        )?;
        Ok(())
    }

    pub fn list_boxes(&self, user_id: &str) -> Result<Vec<StudyBox>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, user_id, name FROM boxes WHERE user_id = ?1 ORDER BY name")?;
        let rows = stmt.query_map(params![user_id], |row| {
            Ok(StudyBox {
                id: row.get(0)?,
                user_id: row.get(1)?,
                name: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn delete_box(&self, user_id: &str, id: Uuid) -> Result<bool> {
        let rows = self.conn.execute(
            "DELETE FROM boxes WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
        )?;
        Ok(rows > 0)
    }

    // Pattern operations
    pub fn add_pattern(&self, pattern: &Pattern) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO patterns (id, user_id, name) VALUES (?1, ?2, ?3)",
            params![pattern.id, pattern.user_id, pattern.name],
        )?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO pattern_steps (pattern_id, step_number, interval_days) \
                 VALUES (?1, ?2, ?3)",
            )?;
            for step in &pattern.steps {
                stmt.execute(params![pattern.id, step.step_number, step.interval_days])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn get_pattern(&self, id: Uuid) -> Result<Option<Pattern>> {
        let header = self
            .conn
            .query_row(
                "SELECT id, user_id, name FROM patterns WHERE id = ?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        match header {
            Some((id, user_id, name)) => Ok(Some(Pattern {
                id,
                user_id,
                name,
                steps: self.store().steps_for_pattern(id)?,
            })),
            None => Ok(None),
        }
    }

    pub fn list_patterns(&self, user_id: &str) -> Result<Vec<Pattern>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, user_id, name FROM patterns WHERE user_id = ?1 ORDER BY name")?;
        let rows = stmt.query_map(params![user_id], |row| {
            Ok(Pattern {
                id: row.get(0)?,
                user_id: row.get(1)?,
                name: row.get(2)?,
                steps: vec![],
            })
        })?;
        let mut patterns = rows.collect::<rusqlite::Result<Vec<_>>>()?;

        for pattern in &mut patterns {
            pattern.steps = self.store().steps_for_pattern(pattern.id)?;
        }

        Ok(patterns)
    }

    /// Refuses to delete a pattern that items still follow.
    pub fn delete_pattern(&self, user_id: &str, id: Uuid) -> Result<bool> {
        let in_use: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM items WHERE pattern_id = ?1",
            params![id],
            |row| row.get(0),
        )?;
        if in_use > 0 {
            return Err(EngineError::Validation(format!(
                "pattern is still used by {} item(s)",
                in_use
            )));
        }

        let rows = self.conn.execute(
            "DELETE FROM patterns WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
        )?;
        Ok(rows > 0)
    }

    // Item queries
    pub fn list_items(&self, user_id: &str, unfinished_only: bool) -> Result<Vec<ItemOverview>> {
        let query = format!(
            r#"
            SELECT {columns},
                   (SELECT COUNT(*) FROM review_dates r
                     WHERE r.item_id = items.id AND r.is_completed = 1),
                   (SELECT COUNT(*) FROM review_dates r WHERE r.item_id = items.id),
                   (SELECT MIN(r.scheduled_date) FROM review_dates r
                     WHERE r.item_id = items.id AND r.is_completed = 0)
            FROM items
            WHERE user_id = ?1 {filter}
            ORDER BY name
            "#,
            columns = ITEM_COLUMNS,
            filter = if unfinished_only { "AND is_finished = 0" } else { "" },
        );

        let mut stmt = self.conn.prepare(&query)?;
        let rows = stmt.query_map(params![user_id], |row| {
            Ok(ItemOverview {
                item: item_from_row(row)?,
                completed_steps: row.get(10)?,
                total_steps: row.get(11)?,
                next_review: row.get(12)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn get_item_with_schedule(&self, id: Uuid) -> Result<Option<ItemWithSchedule>> {
        let store = self.store();
        match store.get_item(id)? {
            Some(item) => Ok(Some(ItemWithSchedule {
                review_dates: store.review_dates_for_item(item.id)?,
                item,
            })),
            None => Ok(None),
        }
    }

    pub fn delete_item(&self, user_id: &str, id: Uuid) -> Result<bool> {
        let rows = self.conn.execute(
            "DELETE FROM items WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
        )?;
        Ok(rows > 0)
    }

    /// Incomplete review dates scheduled on or before `on`, oldest first.
    pub fn due_reviews(&self, user_id: &str, on: NaiveDate) -> Result<Vec<DueReview>> {
        let query = format!(
            r#"
            SELECT {}, i.name
            FROM review_dates r
            JOIN items i ON i.id = r.item_id
            WHERE r.user_id = ?1 AND r.is_completed = 0 AND r.scheduled_date <= ?2
            ORDER BY r.scheduled_date ASC, i.name ASC, r.step_number ASC
            "#,
            REVIEW_DATE_COLUMNS
                .split(", ")
                .map(|c| format!("r.{}", c.trim()))
                .collect::<Vec<_>>()
                .join(", ")
        );

        let mut stmt = self.conn.prepare(&query)?;
        let rows = stmt.query_map(params![user_id, on], |row| {
            Ok(DueReview {
                review_date: review_date_from_row(row)?,
                item_name: row.get(9)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn get_stats(&self, user_id: &str, today: NaiveDate) -> Result<Stats> {
        let (total_items, finished_items): (i64, i64) = self.conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(is_finished), 0) FROM items WHERE user_id = ?1",
            params![user_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let (total_reviews, completed_reviews): (i64, i64) = self.conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(is_completed), 0) FROM review_dates WHERE user_id = ?1",
            params![user_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let due_today: i64 = self.conn.query_row(
            r#"
            SELECT COUNT(*) FROM review_dates
            WHERE user_id = ?1 AND is_completed = 0 AND scheduled_date <= ?2
            "#,
            params![user_id, today],
            |row| row.get(0),
        )?;

        Ok(Stats {
            total_items,
            finished_items,
            total_reviews,
            completed_reviews,
            due_today,
        })
    }
}

impl TransactionRunner for Database {
    fn run_in_transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&dyn Stores) -> Result<T>,
    {
        // Dropping the transaction on the error path rolls it back
        let tx = self.conn.unchecked_transaction()?;
        let value = f(&SqliteStore { conn: &tx })?;
        tx.commit()?;
        Ok(value)
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct Stats {
    pub total_items: i64,
    pub finished_items: i64,
    pub total_reviews: i64,
    pub completed_reviews: i64,
    pub due_today: i64,
}

/// Store implementation over a borrowed connection, which may be a live
/// transaction.
pub struct SqliteStore<'c> {
    conn: &'c Connection,
}

impl PatternStepReader for SqliteStore<'_> {
    fn steps_for_pattern(&self, pattern_id: Uuid) -> Result<Vec<PatternStep>> {
        let mut stmt = self.conn.prepare_cached(
            r#"
            SELECT step_number, interval_days
            FROM pattern_steps
            WHERE pattern_id = ?1
            ORDER BY step_number ASC
            "#,
        )?;
        let rows = stmt.query_map(params![pattern_id], |row| {
            Ok(PatternStep {
                step_number: row.get(0)?,
                interval_days: row.get(1)?,
            })
        })?;
        let steps = rows.collect::<rusqlite::Result<Vec<_>>>()?;

        // Patterns always carry at least one step
        if steps.is_empty() {
            return Err(EngineError::not_found("pattern", pattern_id));
        }
        Ok(steps)
    }
}

impl ReferenceReader for SqliteStore<'_> {
    fn reference_owner(&self, reference: Reference, id: Uuid) -> Result<Option<String>> {
        let table = match reference {
            Reference::Pattern => "patterns",
            Reference::Category => "categories",
            Reference::Box => "boxes",
        };
        let owner = self
            .conn
            .query_row(
                &format!("SELECT user_id FROM {} WHERE id = ?1", table),
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(owner)
    }
}

impl ItemStore for SqliteStore<'_> {
    fn get_item(&self, id: Uuid) -> Result<Option<Item>> {
        let item = self
            .conn
            .query_row(
                &format!("SELECT {} FROM items WHERE id = ?1", ITEM_COLUMNS),
                params![id],
                item_from_row,
            )
            .optional()?;
        Ok(item)
    }

    fn insert_item(&self, item: &Item) -> Result<()> {
        self.conn.execute(
            &format!(
                "INSERT INTO items ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                ITEM_COLUMNS
            ),
            params![
                item.id,
                item.user_id,
                item.category_id,
                item.box_id,
                item.pattern_id,
                item.name,
                item.detail,
                item.learned_date,
                item.is_finished,
                now()
            ],
        )?;
        Ok(())
    }

    fn update_item(&self, item: &Item) -> Result<()> {
        let rows = self.conn.execute(
            r#"
            UPDATE items
            SET category_id = ?1,
                box_id = ?2,
                pattern_id = ?3,
                name = ?4,
                detail = ?5,
                learned_date = ?6,
                is_finished = ?7,
                edited_at = ?8
            WHERE id = ?9
            "#,
            params![
                item.category_id,
                item.box_id,
                item.pattern_id,
                item.name,
                item.detail,
                item.learned_date,
                item.is_finished,
                now(),
                item.id
            ],
        )?;
        if rows == 0 {
            return Err(EngineError::not_found("item", item.id));
        }
        Ok(())
    }

    fn set_item_finished(&self, id: Uuid, finished: bool) -> Result<()> {
        let rows = self.conn.execute(
            "UPDATE items SET is_finished = ?1, edited_at = ?2 WHERE id = ?3",
            params![finished, now(), id],
        )?;
        if rows == 0 {
            return Err(EngineError::not_found("item", id));
        }
        Ok(())
    }
}

impl ReviewDateStore for SqliteStore<'_> {
    fn insert_review_dates(&self, rows: &[ReviewDate]) -> Result<()> {
        let mut stmt = self.conn.prepare_cached(&format!(
            "INSERT INTO review_dates ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            REVIEW_DATE_COLUMNS
        ))?;
        for rd in rows {
            stmt.execute(params![
                rd.id,
                rd.user_id,
                rd.item_id,
                rd.category_id,
                rd.box_id,
                rd.step_number,
                rd.initial_scheduled_date,
                rd.scheduled_date,
                rd.is_completed
            ])?;
        }
        Ok(())
    }

    fn update_review_dates(&self, rows: &[ReviewDate]) -> Result<()> {
        let mut stmt = self.conn.prepare_cached(
            r#"
            UPDATE review_dates
            SET user_id = ?1,
                item_id = ?2,
                category_id = ?3,
                box_id = ?4,
                step_number = ?5,
                initial_scheduled_date = ?6,
                scheduled_date = ?7,
                is_completed = ?8
            WHERE id = ?9
            "#,
        )?;
        for rd in rows {
            let changed = stmt.execute(params![
                rd.user_id,
                rd.item_id,
                rd.category_id,
                rd.box_id,
                rd.step_number,
                rd.initial_scheduled_date,
                rd.scheduled_date,
                rd.is_completed,
                rd.id
            ])?;
            if changed == 0 {
                return Err(EngineError::not_found("review date", rd.id));
            }
        }
        Ok(())
    }

    fn delete_review_dates_for_item(&self, item_id: Uuid) -> Result<usize> {
        Ok(self
            .conn
            .execute("DELETE FROM review_dates WHERE item_id = ?1", params![item_id])?)
    }

    fn review_dates_for_item(&self, item_id: Uuid) -> Result<Vec<ReviewDate>> {
        let mut stmt = self.conn.prepare_cached(&format!(
            "SELECT {} FROM review_dates WHERE item_id = ?1 ORDER BY step_number ASC",
            REVIEW_DATE_COLUMNS
        ))?;
        let rows = stmt.query_map(params![item_id], review_date_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn review_date_ids_for_item(&self, item_id: Uuid) -> Result<Vec<Uuid>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT id FROM review_dates WHERE item_id = ?1 ORDER BY step_number ASC",
        )?;
        let rows = stmt.query_map(params![item_id], |row| row.get(0))?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn has_completed_review_date(&self, item_id: Uuid) -> Result<bool> {
        Ok(self.conn.query_row(
            "SELECT EXISTS (SELECT 1 FROM review_dates WHERE item_id = ?1 AND is_completed = 1)",
            params![item_id],
            |row| row.get(0),
        )?)
    }

    fn reclassify_review_dates(
        &self,
        item_id: Uuid,
        category_id: Option<Uuid>,
        box_id: Option<Uuid>,
    ) -> Result<()> {
        self.conn.execute(
            "UPDATE review_dates SET category_id = ?1, box_id = ?2 WHERE item_id = ?3",
            params![category_id, box_id, item_id],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::parse_date;

    fn setup_db() -> Database {
        let db = Database::open(":memory:").expect("Failed to create in-memory database");
        db.init().expect("Failed to initialize database");
        db
    }

    fn d(s: &str) -> NaiveDate {
        parse_date(s).unwrap()
    }

    fn make_item(pattern_id: Option<Uuid>) -> Item {
        Item {
            id: Uuid::new_v4(),
            user_id: "local".to_string(),
            category_id: None,
            box_id: None,
            pattern_id,
            name: "Irregular verbs".to_string(),
            detail: String::new(),
            learned_date: d("2024-01-01"),
            is_finished: false,
            edited_at: String::new(),
        }
    }

    fn make_review(item: &Item, step_number: u32, date: &str, is_completed: bool) -> ReviewDate {
        ReviewDate {
            id: Uuid::new_v4(),
            user_id: item.user_id.clone(),
            item_id: item.id,
            category_id: item.category_id,
            box_id: item.box_id,
            step_number,
            initial_scheduled_date: d(date),
            scheduled_date: d(date),
            is_completed,
        }
    }

    mod init_tests {
        use super::*;

        #[test]
        fn init_creates_tables() {
            let db = setup_db();
            let tables = [
                "categories",
                "boxes",
                "patterns",
                "pattern_steps",
                "items",
                "review_dates",
            ];
            for table in tables {
                let count: i64 = db
                    .conn
                    .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))
                    .unwrap_or_else(|_| panic!("{} table should exist", table));
                assert_eq!(count, 0);
            }
        }

        #[test]
        fn init_is_idempotent() {
            let db = setup_db();
            db.add_category(&Category::new("local", "Languages").unwrap())
                .unwrap();

            db.init().expect("Re-init should succeed");

            assert_eq!(db.list_categories("local").unwrap().len(), 1);
        }
    }

    mod category_box_tests {
        use super::*;

        #[test]
        fn categories_are_scoped_and_sorted() {
            let db = setup_db();
            db.add_category(&Category::new("local", "Zoology").unwrap()).unwrap();
            db.add_category(&Category::new("local", "Algebra").unwrap()).unwrap();
            db.add_category(&Category::new("other", "Music").unwrap()).unwrap();

            let names: Vec<_> = db
                .list_categories("local")
                .unwrap()
                .into_iter()
                .map(|c| c.name)
                .collect();
            assert_eq!(names, vec!["Algebra", "Zoology"]);
        }

        #[test]
        fn duplicate_category_name_fails() {
            let db = setup_db();
            db.add_category(&Category::new("local", "Same").unwrap()).unwrap();
            assert!(db.add_category(&Category::new("local", "Same").unwrap()).is_err());
        }

        #[test]
        fn deleting_category_unclassifies_items_and_reviews() {
            let db = setup_db();
            let category = Category::new("local", "Languages").unwrap();
            db.add_category(&category).unwrap();

            let mut item = make_item(None);
            item.category_id = Some(category.id);
            let store = db.store();
            store.insert_item(&item).unwrap();
            store
                .insert_review_dates(&[make_review(&item, 1, "2024-01-02", false)])
                .unwrap();

            assert!(db.delete_category("local", category.id).unwrap());

            let reloaded = store.get_item(item.id).unwrap().unwrap();
            assert_eq!(reloaded.category_id, None);
            let reviews = store.review_dates_for_item(item.id).unwrap();
            assert_eq!(reviews[0].category_id, None);
        }

        #[test]
        fn delete_box_other_user_is_noop() {
            let db = setup_db();
            let b = StudyBox::new("local", "Box 1").unwrap();
            db.add_box(&b).unwrap();
            assert!(!db.delete_box("someone-else", b.id).unwrap());
            assert_eq!(db.list_boxes("local").unwrap().len(), 1);
            assert!(db.delete_box("local", b.id).unwrap());
            assert!(db.list_boxes("local").unwrap().is_empty());
        }
    }

    mod pattern_tests {
        use super::*;

        #[test]
        fn add_and_get_pattern() {
            let db = setup_db();
            let p = Pattern::from_intervals("local", "Classic", &[1, 3, 7]).unwrap();
            db.add_pattern(&p).unwrap();

            let loaded = db.get_pattern(p.id).unwrap().unwrap();
            assert_eq!(loaded.name, "Classic");
            assert_eq!(loaded.steps, p.steps);
        }

        #[test]
        fn get_pattern_not_found() {
            let db = setup_db();
            assert!(db.get_pattern(Uuid::new_v4()).unwrap().is_none());
        }

        #[test]
        fn reference_owner_per_kind() {
            let db = setup_db();
            let p = Pattern::from_intervals("local", "Classic", &[1]).unwrap();
            db.add_pattern(&p).unwrap();
            let b = StudyBox::new("other", "Shelf").unwrap();
            db.add_box(&b).unwrap();
            let store = db.store();

            assert_eq!(
                store.reference_owner(Reference::Pattern, p.id).unwrap(),
                Some("local".to_string())
            );
            assert_eq!(
                store.reference_owner(Reference::Box, b.id).unwrap(),
                Some("other".to_string())
            );
            assert!(store
                .reference_owner(Reference::Category, b.id)
                .unwrap()
                .is_none());
        }

        #[test]
        fn steps_for_unknown_pattern_is_not_found() {
            let db = setup_db();
            let r = db.store().steps_for_pattern(Uuid::new_v4());
            assert!(matches!(r, Err(EngineError::NotFound { kind: "pattern", .. })));
        }

        #[test]
        fn list_patterns_includes_steps() {
            let db = setup_db();
            db.add_pattern(&Pattern::from_intervals("local", "B", &[2, 4]).unwrap())
                .unwrap();
            db.add_pattern(&Pattern::from_intervals("local", "A", &[1]).unwrap())
                .unwrap();

            let patterns = db.list_patterns("local").unwrap();
            assert_eq!(patterns.len(), 2);
            assert_eq!(patterns[0].name, "A");
            assert_eq!(patterns[1].steps.len(), 2);
        }

        #[test]
        fn delete_pattern_in_use_is_refused() {
            let db = setup_db();
            let p = Pattern::from_intervals("local", "Classic", &[1, 3]).unwrap();
            db.add_pattern(&p).unwrap();
            db.store().insert_item(&make_item(Some(p.id))).unwrap();

            let r = db.delete_pattern("local", p.id);
            assert!(matches!(r, Err(EngineError::Validation(_))));
            assert!(db.get_pattern(p.id).unwrap().is_some());
        }

        #[test]
        fn delete_pattern_removes_steps() {
            let db = setup_db();
            let p = Pattern::from_intervals("local", "Classic", &[1, 3]).unwrap();
            db.add_pattern(&p).unwrap();

            assert!(db.delete_pattern("local", p.id).unwrap());
            let steps: i64 = db
                .conn
                .query_row("SELECT COUNT(*) FROM pattern_steps", [], |row| row.get(0))
                .unwrap();
            assert_eq!(steps, 0);
        }
    }

    mod store_tests {
        use super::*;

        #[test]
        fn item_round_trip() {
            let db = setup_db();
            let store = db.store();
            let item = make_item(None);
            store.insert_item(&item).unwrap();

            let loaded = store.get_item(item.id).unwrap().unwrap();
            assert_eq!(loaded.name, item.name);
            assert_eq!(loaded.learned_date, d("2024-01-01"));
            assert!(!loaded.edited_at.is_empty());
        }

        #[test]
        fn update_missing_item_is_not_found() {
            let db = setup_db();
            let r = db.store().update_item(&make_item(None));
            assert!(matches!(r, Err(EngineError::NotFound { kind: "item", .. })));
        }

        #[test]
        fn set_item_finished() {
            let db = setup_db();
            let store = db.store();
            let item = make_item(None);
            store.insert_item(&item).unwrap();

            store.set_item_finished(item.id, true).unwrap();
            assert!(store.get_item(item.id).unwrap().unwrap().is_finished);
        }

        #[test]
        fn review_dates_sorted_by_step() {
            let db = setup_db();
            let store = db.store();
            let item = make_item(None);
            store.insert_item(&item).unwrap();
            let rows = vec![
                make_review(&item, 2, "2024-01-04", false),
                make_review(&item, 1, "2024-01-02", true),
            ];
            store.insert_review_dates(&rows).unwrap();

            let loaded = store.review_dates_for_item(item.id).unwrap();
            assert_eq!(loaded[0].step_number, 1);
            assert_eq!(loaded[1].step_number, 2);

            let ids = store.review_date_ids_for_item(item.id).unwrap();
            assert_eq!(ids, vec![rows[1].id, rows[0].id]);
            assert!(store.has_completed_review_date(item.id).unwrap());
        }

        #[test]
        fn update_review_dates_rewrites_rows() {
            let db = setup_db();
            let store = db.store();
            let item = make_item(None);
            store.insert_item(&item).unwrap();
            let mut row = make_review(&item, 1, "2024-01-02", false);
            store.insert_review_dates(&[row.clone()]).unwrap();

            row.scheduled_date = d("2024-01-09");
            row.is_completed = true;
            store.update_review_dates(&[row.clone()]).unwrap();

            assert_eq!(store.review_dates_for_item(item.id).unwrap(), vec![row]);
        }

        #[test]
        fn update_unknown_review_date_fails() {
            let db = setup_db();
            let item = make_item(None);
            let r = db
                .store()
                .update_review_dates(&[make_review(&item, 1, "2024-01-02", false)]);
            assert!(matches!(r, Err(EngineError::NotFound { .. })));
        }

        #[test]
        fn delete_review_dates_for_item() {
            let db = setup_db();
            let store = db.store();
            let item = make_item(None);
            store.insert_item(&item).unwrap();
            store
                .insert_review_dates(&[
                    make_review(&item, 1, "2024-01-02", false),
                    make_review(&item, 2, "2024-01-04", false),
                ])
                .unwrap();

            assert_eq!(store.delete_review_dates_for_item(item.id).unwrap(), 2);
            assert!(!store.has_completed_review_date(item.id).unwrap());
        }

        #[test]
        fn deleting_item_cascades_reviews() {
            let db = setup_db();
            let store = db.store();
            let item = make_item(None);
            store.insert_item(&item).unwrap();
            store
                .insert_review_dates(&[make_review(&item, 1, "2024-01-02", false)])
                .unwrap();

            assert!(db.delete_item("local", item.id).unwrap());
            assert!(store.review_dates_for_item(item.id).unwrap().is_empty());
        }
    }

    mod transaction_tests {
        use super::*;

        #[test]
        fn commit_on_success() {
            let db = setup_db();
            let item = make_item(None);
            db.run_in_transaction(|store| store.insert_item(&item)).unwrap();
            assert!(db.store().get_item(item.id).unwrap().is_some());
        }

        #[test]
        fn rollback_on_error() {
            let db = setup_db();
            let item = make_item(None);
            let r: Result<()> = db.run_in_transaction(|store| {
                store.insert_item(&item)?;
                store.insert_review_dates(&[make_review(&item, 1, "2024-01-02", false)])?;
                Err(EngineError::NoDiff)
            });
            assert!(matches!(r, Err(EngineError::NoDiff)));
            assert!(db.store().get_item(item.id).unwrap().is_none());
            assert!(db.store().review_dates_for_item(item.id).unwrap().is_empty());
        }
    }

    mod query_tests {
        use super::*;

        #[test]
        fn list_items_summarises_schedule() {
            let db = setup_db();
            let store = db.store();
            let item = make_item(None);
            store.insert_item(&item).unwrap();
            store
                .insert_review_dates(&[
                    make_review(&item, 1, "2024-01-02", true),
                    make_review(&item, 2, "2024-01-04", false),
                    make_review(&item, 3, "2024-01-08", false),
                ])
                .unwrap();

            let items = db.list_items("local", false).unwrap();
            assert_eq!(items.len(), 1);
            assert_eq!(items[0].completed_steps, 1);
            assert_eq!(items[0].total_steps, 3);
            assert_eq!(items[0].next_review, Some(d("2024-01-04")));
        }

        #[test]
        fn list_items_unfinished_filter() {
            let db = setup_db();
            let store = db.store();
            let open = make_item(None);
            let mut done = make_item(None);
            done.name = "Done".to_string();
            done.is_finished = true;
            store.insert_item(&open).unwrap();
            store.insert_item(&done).unwrap();

            assert_eq!(db.list_items("local", false).unwrap().len(), 2);
            let open_only = db.list_items("local", true).unwrap();
            assert_eq!(open_only.len(), 1);
            assert_eq!(open_only[0].item.id, open.id);
            assert_eq!(open_only[0].next_review, None);
        }

        #[test]
        fn due_reviews_include_today_and_overdue() {
            let db = setup_db();
            let store = db.store();
            let item = make_item(None);
            store.insert_item(&item).unwrap();
            store
                .insert_review_dates(&[
                    make_review(&item, 1, "2024-01-02", true),
                    make_review(&item, 2, "2024-01-04", false),
                    make_review(&item, 3, "2024-01-05", false),
                    make_review(&item, 4, "2024-01-06", false),
                ])
                .unwrap();

            let due = db.due_reviews("local", d("2024-01-05")).unwrap();
            let steps: Vec<_> = due.iter().map(|r| r.review_date.step_number).collect();
            assert_eq!(steps, vec![2, 3]);
            assert_eq!(due[0].item_name, "Irregular verbs");
        }

        #[test]
        fn stats_counts() {
            let db = setup_db();
            let store = db.store();
            let mut item = make_item(None);
            item.is_finished = true;
            store.insert_item(&item).unwrap();
            store.insert_item(&make_item(None)).unwrap();
            store
                .insert_review_dates(&[
                    make_review(&item, 1, "2024-01-02", true),
                    make_review(&item, 2, "2024-01-04", false),
                ])
                .unwrap();

            let stats = db.get_stats("local", d("2024-01-10")).unwrap();
            assert_eq!(stats.total_items, 2);
            assert_eq!(stats.finished_items, 1);
            assert_eq!(stats.total_reviews, 2);
            assert_eq!(stats.completed_reviews, 1);
            assert_eq!(stats.due_today, 1);
        }

        #[test]
        fn stats_empty_db() {
            let db = setup_db();
            let stats = db.get_stats("local", d("2024-01-10")).unwrap();
            assert_eq!(stats.total_items, 0);
            assert_eq!(stats.finished_items, 0);
            assert_eq!(stats.due_today, 0);
        }
    }
}
