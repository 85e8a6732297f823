//! FocusFlow CLI
//!
//! Runs the Pomodoro timer in a terminal and manages settings, stats,
//! notes and tasks stored in the local database.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use focusflow::audio::{AudioPlayer, CuePlayer, Silent};
use focusflow::backup::{self, Backup};
use focusflow::clock::{Clock, SystemClock};
use focusflow::ledger::StatsLedger;
use focusflow::notes::{NoteDraft, NoteUpdate, Notebook};
use focusflow::tasks::Planner;
use focusflow::timer::{self, format_status_line, format_time};
use focusflow::{
    Database, Engine, EngineEvent, Mode, SettingsPatch, SharedEngine, Store, Theme, Timer,
};
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::warn;

mod notifications;

#[derive(Parser)]
#[command(name = "focusflow")]
#[command(about = "Pomodoro timer with streaks, daily stats, notes and tasks")]
#[command(version)]
struct Cli {
    /// Database file (defaults to the platform data directory)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the timer in this terminal until the countdown ends
    Run {
        /// Switch to this mode before starting
        #[arg(short, long, value_enum)]
        mode: Option<ModeArg>,

        /// Start the next countdown automatically after each one ends
        #[arg(short, long)]
        continuous: bool,

        /// Do not show desktop notifications
        #[arg(long)]
        no_notify: bool,

        /// Do not play the completion chime
        #[arg(long)]
        silent: bool,
    },

    /// Show today's progress, streak and lifetime sessions
    Status,

    /// Show per-day statistics
    Stats {
        /// Number of days to show, ending today
        #[arg(
            short,
            long,
            default_value = "7",
            value_parser = clap::value_parser!(u32).range(1..=3650)
        )]
        days: u32,
    },

    /// Show the current streak
    Streak,

    /// Show study achievements and progress towards them
    Achievements,

    /// Show or change settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },

    /// Show or set the daily goal of focus sessions
    Goal {
        /// New goal (at least 1)
        goal: Option<u32>,
    },

    /// Manage study notes
    Note {
        #[command(subcommand)]
        action: NoteAction,
    },

    /// Manage planner tasks
    Task {
        #[command(subcommand)]
        action: TaskAction,
    },

    /// Export all data as JSON
    Export {
        /// Output file (defaults to focusflow-backup-<date>.json)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Delete all stored data
    Reset {
        /// Confirm that everything should be deleted
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Print the current settings
    Show,

    /// Change one or more settings
    Set {
        /// Focus session length in minutes
        #[arg(long)]
        focus_mins: Option<u32>,

        /// Short break length in minutes
        #[arg(long)]
        short_break_mins: Option<u32>,

        /// Long break length in minutes
        #[arg(long)]
        long_break_mins: Option<u32>,

        /// Focus sessions between long breaks
        #[arg(long)]
        sessions_until_long_break: Option<u32>,

        /// Chime volume between 0 and 1
        #[arg(long)]
        volume: Option<f32>,

        /// Play a chime when a countdown ends
        #[arg(long)]
        sound: Option<bool>,

        #[arg(long, value_enum)]
        theme: Option<ThemeArg>,
    },
}

#[derive(Subcommand)]
enum NoteAction {
    /// Create a note
    Add {
        title: String,

        #[arg(short, long, default_value = "")]
        content: String,

        /// Tag to attach (repeatable)
        #[arg(short, long = "tag")]
        tags: Vec<String>,

        #[arg(long)]
        important: bool,
    },
    /// Change a note's title, content, tags or importance
    Edit {
        id: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        content: Option<String>,

        /// Replace the tags (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,

        /// Remove all tags
        #[arg(long, conflicts_with = "tags")]
        clear_tags: bool,

        #[arg(long)]
        important: Option<bool>,
    },
    /// Mark a note important, or unmark it
    Star { id: String },
    /// Write a note to a plain-text file
    Export {
        id: String,

        /// Output file (defaults to the note title with underscores, plus .txt)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List all notes
    List,
    /// Find notes by title, content or tag
    Search { query: String },
    /// Delete a note by id
    Delete { id: String },
}

#[derive(Subcommand)]
enum TaskAction {
    /// Add a task
    Add { text: String },
    /// List tasks
    List,
    /// Mark a task done or not done
    Toggle { id: String },
    /// Delete a task by id
    Delete { id: String },
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Focus,
    ShortBreak,
    LongBreak,
}

impl From<ModeArg> for Mode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Focus => Mode::Focus,
            ModeArg::ShortBreak => Mode::ShortBreak,
            ModeArg::LongBreak => Mode::LongBreak,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ThemeArg {
    Light,
    Dark,
    Orange,
}

impl From<ThemeArg> for Theme {
    fn from(arg: ThemeArg) -> Self {
        match arg {
            ThemeArg::Light => Theme::Light,
            ThemeArg::Dark => Theme::Dark,
            ThemeArg::Orange => Theme::Orange,
        }
    }
}

fn open_engine(store: Arc<Database>, cue: Box<dyn CuePlayer>) -> Engine {
    Engine::new(store, Box::new(SystemClock), cue)
}

/// Formats seconds as "1h 05m", "25m" or "40s".
fn format_study_time(secs: u64) -> String {
    let hours = secs / 3600;
    let mins = (secs % 3600) / 60;
    if hours > 0 {
        format!("{}h {:02}m", hours, mins)
    } else if mins > 0 {
        format!("{}m", mins)
    } else {
        format!("{}s", secs)
    }
}

fn run_timer(
    store: Arc<Database>,
    mode: Option<Mode>,
    continuous: bool,
    notify: bool,
    silent: bool,
) -> Result<()> {
    let cue: Box<dyn CuePlayer> = if silent {
        Box::new(Silent)
    } else {
        match AudioPlayer::spawn() {
            Ok(player) => Box::new(player),
            Err(e) => {
                warn!(error = %e, "audio unavailable, continuing without sound");
                Box::new(Silent)
            }
        }
    };

    let engine: SharedEngine = Arc::new(Mutex::new(open_engine(store, cue)));
    let events = {
        let mut engine = timer::lock(&engine);
        if let Some(mode) = mode {
            engine.set_mode(mode);
        }
        engine.subscribe()
    };

    let mut timer = Timer::new(Arc::clone(&engine));
    if !timer.start() {
        bail!("the timer could not be started");
    }

    let mut stdout = io::stdout();
    let mut pending_notification = None;
    for event in events.iter() {
        match event {
            EngineEvent::StateChanged(snapshot) if snapshot.state.is_running => {
                write!(stdout, "\r{}   ", format_status_line(&snapshot))?;
                stdout.flush()?;
            }
            EngineEvent::Completed(completion) => {
                let next_mins = timer::lock(&engine)
                    .settings()
                    .duration_for(completion.next_mode())
                    / 60;
                let (summary, body) = notifications::completion_message(completion, next_mins);
                writeln!(stdout)?;
                writeln!(stdout, "{}\n{}", summary, body)?;

                if notify {
                    pending_notification =
                        Some(notifications::notify_completion(completion, next_mins));
                }
                if !continuous {
                    break;
                }
                timer.start();
            }
            _ => {}
        }
    }

    timer.shutdown();
    if let Some(handle) = pending_notification {
        let _ = handle.join();
    }
    Ok(())
}

fn show_status(engine: &Engine) {
    let snapshot = engine.snapshot();
    let today = engine.today_stat();
    let goal = engine.goal_progress();

    println!(
        "Next up:            {} ({})",
        snapshot.state.mode.label(),
        format_time(snapshot.state.time_left)
    );
    println!(
        "Today:              {}/{} pomodoros{}",
        goal.completed,
        goal.goal,
        if goal.is_met() { " - goal reached!" } else { "" }
    );
    println!(
        "Focused today:      {}",
        format_study_time(u64::from(today.study_time))
    );
    println!("Current streak:     {} days", engine.streak());
    println!("Sessions completed: {}", engine.sessions_completed());
}

fn show_stats(engine: &Engine, days: u32) {
    let ledger: &StatsLedger = engine.ledger();
    let today = engine.today();

    for stat in ledger.last_days(today, days) {
        println!(
            "{} {}  {:>8}  {} 🍅",
            stat.date.format("%a"),
            stat.date,
            format_study_time(u64::from(stat.study_time)),
            stat.pomodoros
        );
    }

    let totals = ledger.totals();
    println!();
    println!(
        "All time: {} focused, {} pomodoros over {} days",
        format_study_time(totals.study_time),
        totals.pomodoros,
        totals.active_days
    );
    println!(
        "Average:  {} per active day",
        format_study_time(ledger.average_study_time().round() as u64)
    );
}

fn handle_settings(engine: &mut Engine, action: SettingsAction) -> Result<()> {
    match action {
        SettingsAction::Show => {}
        SettingsAction::Set {
            focus_mins,
            short_break_mins,
            long_break_mins,
            sessions_until_long_break,
            volume,
            sound,
            theme,
        } => {
            let patch = SettingsPatch {
                theme: theme.map(Theme::from),
                focus_duration: focus_mins.map(|m| m.saturating_mul(60)),
                short_break_duration: short_break_mins.map(|m| m.saturating_mul(60)),
                long_break_duration: long_break_mins.map(|m| m.saturating_mul(60)),
                sessions_until_long_break,
                volume,
                sound_enabled: sound,
            };
            if patch.is_empty() {
                bail!("nothing to change; see `focusflow settings set --help`");
            }
            engine.update_settings(&patch)?;
        }
    }

    println!("{}", serde_json::to_string_pretty(engine.settings())?);
    Ok(())
}

fn handle_note(store: &dyn Store, action: NoteAction) -> Result<()> {
    let mut notebook = Notebook::load(store);
    match action {
        NoteAction::Add {
            title,
            content,
            tags,
            important,
        } => {
            let Some(note) = notebook.add(NoteDraft {
                title,
                content,
                tags,
                is_important: important,
            }) else {
                bail!("a note needs a title or some content");
            };
            let id = note.id.clone();
            notebook.save(store)?;
            println!("Added note {}", id);
        }
        NoteAction::Edit {
            id,
            title,
            content,
            tags,
            clear_tags,
            important,
        } => {
            let tags = if clear_tags {
                Some(Vec::new())
            } else if tags.is_empty() {
                None
            } else {
                Some(tags)
            };
            let update = NoteUpdate {
                title,
                content,
                tags,
                is_important: important,
            };
            if update == NoteUpdate::default() {
                bail!("nothing to change; see `focusflow note edit --help`");
            }
            if !notebook.update(&id, update) {
                bail!("no note with id {}", id);
            }
            notebook.save(store)?;
            println!("Updated note {}", id);
        }
        NoteAction::Star { id } => {
            let Some(important) = notebook.toggle_important(&id) else {
                bail!("no note with id {}", id);
            };
            notebook.save(store)?;
            println!(
                "Note {} is {}",
                id,
                if important { "important" } else { "no longer important" }
            );
        }
        NoteAction::Export { id, output } => {
            let Some(note) = notebook.get(&id) else {
                bail!("no note with id {}", id);
            };
            let path = output.unwrap_or_else(|| PathBuf::from(note.txt_file_name()));
            fs::write(&path, note.to_txt())
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Exported to {}", path.display());
        }
        NoteAction::List => print_notes(notebook.notes().iter()),
        NoteAction::Search { query } => print_notes(notebook.search(&query).into_iter()),
        NoteAction::Delete { id } => {
            if !notebook.delete(&id) {
                bail!("no note with id {}", id);
            }
            notebook.save(store)?;
            println!("Deleted note {}", id);
        }
    }
    Ok(())
}

fn print_notes<'a>(notes: impl Iterator<Item = &'a focusflow::notes::Note>) {
    for note in notes {
        let star = if note.is_important { "★ " } else { "" };
        println!("{}  {}{}", note.id, star, note.title);
        if !note.tags.is_empty() {
            println!("    tags: {}", note.tags.join(", "));
        }
        if !note.content.is_empty() {
            println!("    {}", note.content);
        }
    }
}

fn handle_task(store: &dyn Store, action: TaskAction) -> Result<()> {
    let mut planner = Planner::load(store);
    match action {
        TaskAction::Add { text } => {
            let id = planner.add(text).id.clone();
            planner.save(store)?;
            println!("Added task {}", id);
        }
        TaskAction::List => {
            for task in planner.tasks() {
                let mark = if task.completed { "x" } else { " " };
                println!("[{}] {}  {}", mark, task.id, task.text);
            }
            println!(
                "{}/{} done ({:.0}%)",
                planner.completed_count(),
                planner.tasks().len(),
                planner.progress_percent()
            );
        }
        TaskAction::Toggle { id } => {
            let Some(done) = planner.toggle(&id) else {
                bail!("no task with id {}", id);
            };
            planner.save(store)?;
            println!("Task {} is now {}", id, if done { "done" } else { "open" });
        }
        TaskAction::Delete { id } => {
            if !planner.delete(&id) {
                bail!("no task with id {}", id);
            }
            planner.save(store)?;
            println!("Deleted task {}", id);
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("focusflow=warn".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let db = match &cli.db {
        Some(path) => Database::open(path)
            .with_context(|| format!("failed to open database at {}", path.display()))?,
        None => Database::new().context("failed to open database")?,
    };
    let store = Arc::new(db);

    match cli.command {
        Commands::Run {
            mode,
            continuous,
            no_notify,
            silent,
        } => run_timer(store, mode.map(Mode::from), continuous, !no_notify, silent)?,
        Commands::Status => show_status(&open_engine(store, Box::new(Silent))),
        Commands::Stats { days } => show_stats(&open_engine(store, Box::new(Silent)), days),
        Commands::Streak => {
            let engine = open_engine(store, Box::new(Silent));
            println!("{} days", engine.streak());
        }
        Commands::Achievements => {
            let engine = open_engine(store, Box::new(Silent));
            for achievement in engine.achievements() {
                let definition = achievement.definition;
                let mark = if achievement.is_unlocked() { "🏆" } else { "🔒" };
                println!(
                    "{} {:<22} {:>3.0}%  {} ({}/{})",
                    mark,
                    definition.title,
                    achievement.progress_percent(),
                    definition.description,
                    achievement.current.min(definition.target),
                    definition.target
                );
            }
        }
        Commands::Settings { action } => {
            let mut engine = open_engine(store, Box::new(Silent));
            handle_settings(&mut engine, action)?;
        }
        Commands::Goal { goal } => {
            let mut engine = open_engine(store, Box::new(Silent));
            if let Some(goal) = goal {
                engine.set_daily_goal(goal)?;
            }
            let progress = engine.goal_progress();
            println!("Daily goal: {} ({} done today)", progress.goal, progress.completed);
        }
        Commands::Note { action } => handle_note(&*store, action)?,
        Commands::Task { action } => handle_task(&*store, action)?,
        Commands::Export { output } => {
            let path =
                output.unwrap_or_else(|| PathBuf::from(backup::file_name(SystemClock.today())));
            let json = Backup::collect(&*store).to_json()?;
            fs::write(&path, json)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Exported to {}", path.display());
        }
        Commands::Reset { yes } => {
            if !yes {
                bail!("refusing to delete all data without --yes");
            }
            open_engine(store, Box::new(Silent)).reset_all_data();
            println!("All data deleted.");
        }
    }

    Ok(())
}
