mod calendar;
mod completion;
mod config;
mod db;
mod engine;
mod error;
mod models;
mod reconcile;
mod scheduler;
mod store;
mod tui;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use config::Config;
use db::Database;
use engine::Engine;
use error::EngineError;
use models::{
    Category, ItemUpdate, ItemWithSchedule, JsonOutput, NewItem, OverduePolicy, Pattern,
    ShiftRequest, StudyBox,
};

#[derive(Parser)]
#[command(name = "spaced")]
#[command(about = "Spaced-repetition review scheduler for the things you learn")]
#[command(version)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Pretend today is this date (YYYY-MM-DD)
    #[arg(long, global = true, value_parser = parse_date_arg)]
    today: Option<NaiveDate>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Manage categories
    #[command(subcommand)]
    Category(NamedCommands),

    /// Manage boxes
    #[command(subcommand)]
    Box(NamedCommands),

    /// Manage review patterns
    #[command(subcommand)]
    Pattern(PatternCommands),

    /// Manage study items
    #[command(subcommand)]
    Item(ItemCommands),

    /// Complete, reopen or move a single review date
    #[command(subcommand)]
    Review(ReviewCommands),

    /// List review dates that are due
    Due {
        /// Show reviews due on or before this date instead of today
        #[arg(long, short, value_parser = parse_date_arg)]
        date: Option<NaiveDate>,
    },

    /// Show review statistics
    Stats,

    /// Launch interactive terminal UI
    Tui,
}

#[derive(Subcommand)]
enum NamedCommands {
    /// Add a new entry
    Add {
        /// Name
        name: String,
    },

    /// List all entries
    List,

    /// Delete an entry; items using it become unclassified
    Delete {
        /// Entry ID
        id: Uuid,
    },
}

#[derive(Subcommand)]
enum PatternCommands {
    /// Add a new pattern
    Add {
        /// Pattern name
        name: String,

        /// Comma-separated day offsets from the learned date, e.g. 1,3,7
        #[arg(long, short, value_delimiter = ',', required = true)]
        intervals: Vec<u32>,
    },

    /// List all patterns
    List,

    /// Show pattern steps
    Show {
        /// Pattern ID
        id: Uuid,
    },

    /// Delete a pattern no item uses
    Delete {
        /// Pattern ID
        id: Uuid,
    },
}

#[derive(Subcommand)]
enum ItemCommands {
    /// Add a new item
    Add {
        /// Item name
        name: String,

        /// Free-form notes
        #[arg(long, short)]
        detail: Option<String>,

        /// Date the item was learned (defaults to today)
        #[arg(long, short, value_parser = parse_date_arg)]
        learned: Option<NaiveDate>,

        /// Pattern ID to schedule reviews with
        #[arg(long, short)]
        pattern: Option<Uuid>,

        /// Category ID
        #[arg(long, short)]
        category: Option<Uuid>,

        /// Box ID
        #[arg(long, short)]
        r#box: Option<Uuid>,

        /// How to treat dates already in the past: completed or incomplete
        #[arg(long, value_parser = parse_policy_arg)]
        overdue: Option<OverduePolicy>,
    },

    /// List items
    List {
        /// Hide finished items
        #[arg(long, short)]
        unfinished: bool,
    },

    /// Show an item and its review dates
    Show {
        /// Item ID
        id: Uuid,
    },

    /// Edit an item; review dates are rescheduled when needed
    Update {
        /// Item ID
        id: Uuid,

        #[arg(long, short)]
        name: Option<String>,

        #[arg(long, short)]
        detail: Option<String>,

        #[arg(long, short, value_parser = parse_date_arg)]
        learned: Option<NaiveDate>,

        #[arg(long, short, conflicts_with = "no_pattern")]
        pattern: Option<Uuid>,

        /// Detach the pattern and drop all review dates
        #[arg(long)]
        no_pattern: bool,

        #[arg(long, short, conflicts_with = "no_category")]
        category: Option<Uuid>,

        #[arg(long)]
        no_category: bool,

        #[arg(long, short, conflicts_with = "no_box")]
        r#box: Option<Uuid>,

        #[arg(long)]
        no_box: bool,

        #[arg(long, value_parser = parse_policy_arg)]
        overdue: Option<OverduePolicy>,
    },

    /// Delete an item and its review dates
    Delete {
        /// Item ID
        id: Uuid,
    },

    /// Mark an item finished without touching its review dates
    Finish {
        /// Item ID
        id: Uuid,
    },

    /// Reopen a finished item; overdue open reviews are moved so none is in the past
    Resume {
        /// Item ID
        id: Uuid,
    },
}

#[derive(Subcommand)]
enum ReviewCommands {
    /// Mark a review step completed
    Done {
        /// Item ID
        item: Uuid,

        /// Step number
        step: u32,
    },

    /// Mark a review step not completed
    Undo {
        /// Item ID
        item: Uuid,

        /// Step number
        step: u32,
    },

    /// Move a review step (and every later step) to a new date
    Shift {
        /// Item ID
        item: Uuid,

        /// Step number
        step: u32,

        /// New date (YYYY-MM-DD), not before the step's initial date
        #[arg(value_parser = parse_date_arg)]
        date: NaiveDate,

        #[arg(long, value_parser = parse_policy_arg)]
        overdue: Option<OverduePolicy>,
    },
}

fn parse_date_arg(s: &str) -> Result<NaiveDate, String> {
    calendar::parse_date(s).map_err(|e| e.to_string())
}

fn parse_policy_arg(s: &str) -> Result<OverduePolicy, String> {
    OverduePolicy::from_str(s)
        .ok_or_else(|| format!("Invalid policy '{}'. Use: completed or incomplete", s))
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_logging();
    let cli = Cli::parse();
    let json = cli.json;

    if let Err(e) = run(cli, Config::from_env()) {
        if json {
            println!(
                "{}",
                serde_json::to_string(&JsonOutput::<()>::err(e.to_string())).unwrap_or_default()
            );
        } else {
            eprintln!("Error: {}", e);
        }
        std::process::exit(1);
    }
}

fn print_json<T: Serialize>(data: T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string(&JsonOutput::ok(data))?);
    Ok(())
}

fn run(cli: Cli, config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open(&config.db_path)?;
    let today = cli.today.unwrap_or_else(calendar::today);
    let user = config.user_id.as_str();
    let engine = Engine::new(&db, user);
    tracing::debug!(db = %config.db_path.display(), user, %today, "starting");

    match cli.command {
        Commands::Init => {
            db.init()?;
            if cli.json {
                print_json(())?;
            } else {
                println!("Database initialized at: {}", config.db_path.display());
            }
        }

        Commands::Category(cmd) => match cmd {
            NamedCommands::Add { name } => {
                let category = Category::new(user, &name)?;
                db.add_category(&category)?;
                if cli.json {
                    print_json(&category)?;
                } else {
                    println!("Added category '{}' with ID: {}", category.name, category.id);
                }
            }
            NamedCommands::List => {
                let categories = db.list_categories(user)?;
                if cli.json {
                    print_json(&categories)?;
                } else if categories.is_empty() {
                    println!("No categories found.");
                } else {
                    println!("{:<38} NAME", "ID");
                    println!("{}", "-".repeat(60));
                    for c in categories {
                        println!("{:<38} {}", c.id, c.name);
                    }
                }
            }
            NamedCommands::Delete { id } => {
                report_delete(db.delete_category(user, id)?, "Category", id, cli.json)?
            }
        },

        Commands::Box(cmd) => match cmd {
            NamedCommands::Add { name } => {
                let study_box = StudyBox::new(user, &name)?;
                db.add_box(&study_box)?;
                if cli.json {
                    print_json(&study_box)?;
                } else {
                    println!("Added box '{}' with ID: {}", study_box.name, study_box.id);
                }
            }
            NamedCommands::List => {
                let boxes = db.list_boxes(user)?;
                if cli.json {
                    print_json(&boxes)?;
                } else if boxes.is_empty() {
                    println!("No boxes found.");
                } else {
                    println!("{:<38} NAME", "ID");
                    println!("{}", "-".repeat(60));
                    for b in boxes {
                        println!("{:<38} {}", b.id, b.name);
                    }
                }
            }
            NamedCommands::Delete { id } => {
                report_delete(db.delete_box(user, id)?, "Box", id, cli.json)?
            }
        },

        Commands::Pattern(cmd) => match cmd {
            PatternCommands::Add { name, intervals } => {
                let pattern = Pattern::from_intervals(user, &name, &intervals)?;
                db.add_pattern(&pattern)?;
                if cli.json {
                    print_json(&pattern)?;
                } else {
                    println!(
                        "Added pattern '{}' ({} days) with ID: {}",
                        pattern.name,
                        pattern.intervals_label(),
                        pattern.id
                    );
                }
            }
            PatternCommands::List => {
                let patterns = db.list_patterns(user)?;
                if cli.json {
                    print_json(&patterns)?;
                } else if patterns.is_empty() {
                    println!("No patterns found.");
                } else {
                    println!("{:<38} {:<24} INTERVALS", "ID", "NAME");
                    println!("{}", "-".repeat(80));
                    for p in patterns {
                        println!(
                            "{:<38} {:<24} {}",
                            p.id,
                            truncate(&p.name, 22),
                            p.intervals_label()
                        );
                    }
                }
            }
            PatternCommands::Show { id } => {
                let pattern = db
                    .get_pattern(id)?
                    .filter(|p| p.user_id == user)
                    .ok_or_else(|| EngineError::not_found("pattern", id))?;
                if cli.json {
                    print_json(&pattern)?;
                } else {
                    println!("Pattern: {}", pattern.name);
                    println!("ID: {}", pattern.id);
                    println!();
                    println!("{:<6} DAYS AFTER LEARNING", "STEP");
                    for step in &pattern.steps {
                        println!("{:<6} {}", step.step_number, step.interval_days);
                    }
                }
            }
            PatternCommands::Delete { id } => {
                report_delete(db.delete_pattern(user, id)?, "Pattern", id, cli.json)?
            }
        },

        Commands::Item(cmd) => match cmd {
            ItemCommands::Add {
                name,
                detail,
                learned,
                pattern,
                category,
                r#box,
                overdue,
            } => {
                let mut new = NewItem::new(&name, learned.unwrap_or(today))?;
                new.detail = detail.unwrap_or_default();
                new.pattern_id = pattern;
                new.category_id = category;
                new.box_id = r#box;
                new.policy = overdue.unwrap_or(config.default_policy);

                let created = engine.create_item(new, today)?;
                if cli.json {
                    print_json(&created)?;
                } else {
                    println!(
                        "Added item '{}' with ID: {}",
                        created.item.name, created.item.id
                    );
                    print_schedule(&created, today);
                }
            }

            ItemCommands::List { unfinished } => {
                let items = db.list_items(user, unfinished)?;
                if cli.json {
                    print_json(&items)?;
                } else if items.is_empty() {
                    println!("No items found.");
                } else {
                    println!(
                        "{:<38} {:<30} {:<10} {:<12} NEXT",
                        "ID", "NAME", "PROGRESS", "STATUS"
                    );
                    println!("{}", "-".repeat(104));
                    for o in items {
                        let next = o
                            .next_review
                            .map(calendar::format_date)
                            .unwrap_or_else(|| "-".to_string());
                        println!(
                            "{:<38} {:<30} {:<10} {:<12} {}",
                            o.item.id,
                            truncate(&o.item.name, 28),
                            format!("{}/{}", o.completed_steps, o.total_steps),
                            o.status_label(),
                            next
                        );
                    }
                }
            }

            ItemCommands::Show { id } => {
                let schedule = db
                    .get_item_with_schedule(id)?
                    .filter(|s| s.item.user_id == user)
                    .ok_or_else(|| EngineError::not_found("item", id))?;
                if cli.json {
                    print_json(&schedule)?;
                } else {
                    let item = &schedule.item;
                    println!("Item: {}", item.name);
                    println!("ID: {}", item.id);
                    if !item.detail.is_empty() {
                        println!("Detail: {}", item.detail);
                    }
                    println!("Learned: {}", calendar::format_date(item.learned_date));
                    if let Some(pattern_id) = item.pattern_id {
                        if let Some(p) = db.get_pattern(pattern_id)? {
                            println!("Pattern: {} ({} days)", p.name, p.intervals_label());
                        }
                    }
                    println!("Finished: {}", if item.is_finished { "yes" } else { "no" });
                    println!("Edited: {}", item.edited_at);
                    print_schedule(&schedule, today);
                }
            }

            ItemCommands::Update {
                id,
                name,
                detail,
                learned,
                pattern,
                no_pattern,
                category,
                no_category,
                r#box,
                no_box,
                overdue,
            } => {
                let current = db
                    .get_item_with_schedule(id)?
                    .ok_or_else(|| EngineError::not_found("item", id))?
                    .item;

                let mut update = ItemUpdate::from_item(&current);
                if let Some(name) = name {
                    update.name = name;
                }
                if let Some(detail) = detail {
                    update.detail = detail;
                }
                if let Some(learned) = learned {
                    update.learned_date = learned;
                }
                update.pattern_id = optional_change(current.pattern_id, pattern, no_pattern);
                update.category_id = optional_change(current.category_id, category, no_category);
                update.box_id = optional_change(current.box_id, r#box, no_box);
                update.policy = overdue.unwrap_or(config.default_policy);

                let updated = engine.update_item(update, today)?;
                if cli.json {
                    print_json(&updated)?;
                } else {
                    println!("Updated item '{}'.", updated.item.name);
                    print_schedule(&updated, today);
                }
            }

            ItemCommands::Delete { id } => {
                report_delete(db.delete_item(user, id)?, "Item", id, cli.json)?
            }

            ItemCommands::Finish { id } => {
                let finished = engine.force_finish(id)?;
                if cli.json {
                    print_json(&finished)?;
                } else {
                    println!("Item '{}' marked finished.", finished.item.name);
                }
            }

            ItemCommands::Resume { id } => {
                let resumed = engine.force_resume(id, today)?;
                if cli.json {
                    print_json(&resumed)?;
                } else {
                    println!("Item '{}' resumed.", resumed.item.name);
                    print_schedule(&resumed, today);
                }
            }
        },

        Commands::Review(cmd) => {
            let (result, message) = match cmd {
                ReviewCommands::Done { item, step } => (
                    engine.complete_review_date(item, step)?,
                    format!("Step {} completed.", step),
                ),
                ReviewCommands::Undo { item, step } => (
                    engine.uncomplete_review_date(item, step)?,
                    format!("Step {} reopened.", step),
                ),
                ReviewCommands::Shift {
                    item,
                    step,
                    date,
                    overdue,
                } => {
                    let request = ShiftRequest {
                        item_id: item,
                        step_number: step,
                        requested_date: date,
                        policy: overdue.unwrap_or(config.default_policy),
                    };
                    (
                        engine.shift_review_date(request, today)?,
                        format!("Step {} moved to {}.", step, calendar::format_date(date)),
                    )
                }
            };

            if cli.json {
                print_json(&result)?;
            } else {
                println!("{}", message);
                if result.item.is_finished {
                    println!("Item '{}' is finished.", result.item.name);
                }
                print_schedule(&result, today);
            }
        }

        Commands::Due { date } => {
            let on = date.unwrap_or(today);
            let due = db.due_reviews(user, on)?;
            if cli.json {
                print_json(&due)?;
            } else if due.is_empty() {
                println!("Nothing due on or before {}.", calendar::format_date(on));
            } else {
                println!("{:<12} {:<38} {:<30} STEP", "DATE", "ITEM ID", "NAME");
                println!("{}", "-".repeat(90));
                for d in due {
                    println!(
                        "{:<12} {:<38} {:<30} {}",
                        calendar::format_date(d.review_date.scheduled_date),
                        d.review_date.item_id,
                        truncate(&d.item_name, 28),
                        d.review_date.step_number
                    );
                }
            }
        }

        Commands::Stats => {
            let stats = db.get_stats(user, today)?;
            if cli.json {
                print_json(&stats)?;
            } else {
                println!("=== Review Statistics ===");
                println!("Total items: {}", stats.total_items);
                println!("Finished items: {}", stats.finished_items);
                println!(
                    "Reviews completed: {}/{}",
                    stats.completed_reviews, stats.total_reviews
                );
                println!("Due today: {}", stats.due_today);
            }
        }

        Commands::Tui => {
            tui::run(db, user, today)?;
        }
    }

    Ok(())
}

// `--x <id>` sets, `--no-x` clears, neither keeps the current value
fn optional_change(current: Option<Uuid>, set: Option<Uuid>, clear: bool) -> Option<Uuid> {
    if clear {
        None
    } else {
        set.or(current)
    }
}

fn report_delete(
    deleted: bool,
    kind: &'static str,
    id: Uuid,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if !deleted {
        return Err(EngineError::not_found(kind, id).into());
    }
    if json {
        print_json(())?;
    } else {
        println!("{} {} deleted.", kind, id);
    }
    Ok(())
}

fn print_schedule(schedule: &ItemWithSchedule, today: NaiveDate) {
    if schedule.review_dates.is_empty() {
        return;
    }
    println!();
    println!("{:<6} {:<12} {:<12} STATUS", "STEP", "DATE", "INITIAL");
    for rd in &schedule.review_dates {
        let status = if rd.is_completed {
            "done"
        } else if calendar::is_before(rd.scheduled_date, today) {
            "overdue"
        } else if rd.scheduled_date == today {
            "due"
        } else {
            "pending"
        };
        println!(
            "{:<6} {:<12} {:<12} {}",
            rd.step_number,
            calendar::format_date(rd.scheduled_date),
            calendar::format_date(rd.initial_scheduled_date),
            status
        );
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
