use anyhow::{Context as _, Result};
use chrono::{NaiveDate, NaiveTime};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use taskd::client::{ListQuery, TasksClient, DEFAULT_SERVER_URL};
use taskd::config::ServerConfig;
use taskd::storage::Storage;
use taskd::tasks::model::{CreateTask, Priority, Task, UpdateTask};
use taskd::tasks::query::{Selector, SortKey};
use taskd::tasks::TaskStore;
use taskd::{rest, AppContext};
use tracing::info;
use uuid::Uuid;

#[derive(Parser)]
#[command(
    name = "taskd",
    about = "taskd — personal task manager (REST server + CLI client)",
    version
)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// REST API server port
    #[arg(long, env = "TASKD_PORT")]
    port: Option<u16>,

    /// Data directory for config and the SQLite database
    #[arg(long, env = "TASKD_DATA_DIR")]
    data_dir: Option<std::path::PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "TASKD_LOG")]
    log: Option<String>,

    /// Bind address for the REST server (default: 127.0.0.1; use 0.0.0.0 for LAN access)
    #[arg(long, env = "TASKD_BIND")]
    bind_address: Option<String>,

    /// Write logs to this file path (rotated daily). Optional.
    #[arg(long, env = "TASKD_LOG_FILE")]
    log_file: Option<std::path::PathBuf>,

    /// Server URL the client subcommands talk to
    #[arg(long, env = "TASKD_SERVER", default_value = DEFAULT_SERVER_URL, global = true)]
    server: String,
}

#[derive(Subcommand)]
enum Command {
    /// Start the REST API server (default when no subcommand given).
    ///
    /// Runs taskd in the foreground on 127.0.0.1:3001 unless overridden by
    /// --port / --bind-address or {data_dir}/config.toml.
    ///
    /// Examples:
    ///   taskd serve
    ///   taskd serve --port 8080
    ///   taskd
    Serve,
    /// Add a task.
    ///
    /// Creates the task on the running server. Only the title is required;
    /// everything else defaults (medium priority, not starred, unscheduled).
    ///
    /// Examples:
    ///   taskd add "Buy milk"
    ///   taskd add "Team standup" --date 2025-09-01 --time 09:30 --tag Work
    ///   taskd add "Pay rent" --priority high --starred
    Add {
        /// Task title
        title: String,
        /// Longer free-text description
        #[arg(long)]
        description: Option<String>,
        /// Due date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<String>,
        /// Due time (HH:MM)
        #[arg(long)]
        time: Option<String>,
        /// Tag label (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Priority: low, medium, high
        #[arg(long)]
        priority: Option<Priority>,
        /// Star the task
        #[arg(long)]
        starred: bool,
    },
    /// List tasks.
    ///
    /// Filter, search, and sort server-side. --filter accepts all, starred,
    /// today, week, completed, or tag:<name>; --tag is ANDed on top of it.
    ///
    /// Examples:
    ///   taskd list
    ///   taskd list --filter today
    ///   taskd list --filter starred --tag Work --sort priority
    ///   taskd list --search "молоко" --json
    List {
        /// Filter selector: all, starred, today, week, completed, tag:<name>
        #[arg(long, short)]
        filter: Option<Selector>,
        /// Additional tag filter (ANDed with --filter)
        #[arg(long, short)]
        tag: Option<String>,
        /// Case-insensitive search over title and description
        #[arg(long, short)]
        search: Option<String>,
        /// Sort key: date, priority, title, created (default: created)
        #[arg(long)]
        sort: Option<SortKey>,
        /// Output as JSON array (for piping)
        #[arg(long)]
        json: bool,
    },
    /// Show the full detail of one task.
    ///
    /// Examples:
    ///   taskd show 0b2e49a0-6f3e-4c66-9de1-8a5a8e2b6a10
    ///   taskd show 0b2e49a0-6f3e-4c66-9de1-8a5a8e2b6a10 --json
    Show {
        /// Task ID
        id: Uuid,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Edit fields of a task.
    ///
    /// Only the provided flags are changed; everything else keeps its value.
    /// --tag replaces the whole tag list when given.
    ///
    /// Examples:
    ///   taskd edit <id> --title "Buy oat milk"
    ///   taskd edit <id> --date 2025-09-02 --time 18:00
    ///   taskd edit <id> --tag Home --tag Errands --priority low
    Edit {
        /// Task ID
        id: Uuid,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// Due date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<String>,
        /// Due time (HH:MM)
        #[arg(long)]
        time: Option<String>,
        /// Replacement tag list (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Priority: low, medium, high
        #[arg(long)]
        priority: Option<Priority>,
    },
    /// Mark a task completed (or reopen it with --undo).
    ///
    /// Examples:
    ///   taskd done <id>
    ///   taskd done <id> --undo
    Done {
        /// Task ID
        id: Uuid,
        /// Reopen instead of completing
        #[arg(long)]
        undo: bool,
    },
    /// Star a task (or unstar it with --undo).
    ///
    /// Examples:
    ///   taskd star <id>
    ///   taskd star <id> --undo
    Star {
        /// Task ID
        id: Uuid,
        /// Remove the star
        #[arg(long)]
        undo: bool,
    },
    /// Delete a task.
    ///
    /// Examples:
    ///   taskd rm 0b2e49a0-6f3e-4c66-9de1-8a5a8e2b6a10
    Rm {
        /// Task ID
        id: Uuid,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // ── Logging setup ────────────────────────────────────────────────────────
    // Init once, before any tracing calls.
    let log_level = args.log.as_deref().unwrap_or("info").to_owned();
    let log_format =
        std::env::var("TASKD_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());
    let _file_guard = setup_logging(&log_level, args.log_file.as_deref(), &log_format);

    match args.command {
        Some(Command::Add {
            title,
            description,
            date,
            time,
            tags,
            priority,
            starred,
        }) => {
            run_add(
                &args.server,
                title,
                description,
                date,
                time,
                tags,
                priority,
                starred,
            )
            .await?;
        }
        Some(Command::List {
            filter,
            tag,
            search,
            sort,
            json,
        }) => {
            run_list(&args.server, filter, tag, search, sort, json).await?;
        }
        Some(Command::Show { id, json }) => run_show(&args.server, id, json).await?,
        Some(Command::Edit {
            id,
            title,
            description,
            date,
            time,
            tags,
            priority,
        }) => {
            run_edit(
                &args.server,
                id,
                title,
                description,
                date,
                time,
                tags,
                priority,
            )
            .await?;
        }
        Some(Command::Done { id, undo }) => run_done(&args.server, id, undo).await?,
        Some(Command::Star { id, undo }) => run_star(&args.server, id, undo).await?,
        Some(Command::Rm { id }) => run_rm(&args.server, id).await?,
        None | Some(Command::Serve) => {
            run_server(args.port, args.data_dir, args.log, args.bind_address).await?;
        }
    }

    Ok(())
}

/// Initialize the tracing subscriber.
/// If `log_file` is set, logs go to both stdout and a daily-rolling file.
/// Returns a `WorkerGuard` that must stay alive for the process lifetime.
///
/// `log_format` may be `"pretty"` (default, human-readable compact format) or
/// `"json"` (structured JSON for log aggregators).
///
/// If the log directory cannot be created, falls back to stdout-only logging
/// with a warning instead of panicking.
fn setup_logging(
    log_level: &str,
    log_file: Option<&std::path::Path>,
    log_format: &str,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let use_json = log_format == "json";

    if let Some(path) = log_file {
        let dir = path.parent().unwrap_or_else(|| std::path::Path::new("."));
        let filename = path
            .file_name()
            .unwrap_or_else(|| std::ffi::OsStr::new("taskd.log"));

        // Ensure the directory exists before tracing-appender tries to open it.
        if let Err(e) = std::fs::create_dir_all(dir) {
            // A bad log path must not take the process down; log to stdout only.
            eprintln!(
                "warn: could not create log directory '{}': {e} — falling back to stdout",
                dir.display()
            );
            if use_json {
                tracing_subscriber::fmt().json().with_env_filter(log_level).init();
            } else {
                tracing_subscriber::fmt().with_env_filter(log_level).compact().init();
            }
            return None;
        }

        let appender = tracing_appender::rolling::daily(dir, filename);
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);

        if use_json {
            tracing_subscriber::registry()
                .with(EnvFilter::new(log_level))
                .with(fmt::layer().json())
                .with(fmt::layer().json().with_writer(non_blocking))
                .init();
        } else {
            tracing_subscriber::registry()
                .with(EnvFilter::new(log_level))
                .with(fmt::layer().compact())
                .with(fmt::layer().with_writer(non_blocking))
                .init();
        }

        Some(guard)
    } else if use_json {
        tracing_subscriber::fmt().json().with_env_filter(log_level).init();
        None
    } else {
        tracing_subscriber::fmt().with_env_filter(log_level).compact().init();
        None
    }
}

// ── taskd serve ───────────────────────────────────────────────────────────────

async fn run_server(
    port: Option<u16>,
    data_dir: Option<std::path::PathBuf>,
    log: Option<String>,
    bind_address: Option<String>,
) -> Result<()> {
    info!(version = env!("CARGO_PKG_VERSION"), "taskd starting");

    let config = Arc::new(ServerConfig::new(port, data_dir, log, bind_address));
    info!(
        data_dir = %config.data_dir.display(),
        port = config.port,
        bind = %config.bind_address,
        "config loaded"
    );

    let storage = Storage::new_with_slow_query(
        &config.data_dir,
        config.observability.slow_query_threshold_ms,
    )
    .await?;
    let store = TaskStore::new(storage.pool());

    let task_count = store.count().await.unwrap_or(0);
    info!(tasks = task_count, "task store ready");

    let ctx = Arc::new(AppContext {
        config: config.clone(),
        store,
        started_at: std::time::Instant::now(),
    });

    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr} (is another taskd running?)"))?;

    rest::serve(ctx, listener).await
}

// ── Client subcommands ────────────────────────────────────────────────────────

/// Build a client and verify the server is actually there, so every command
/// fails with the same hint instead of a bare connection error.
async fn connect(server: &str) -> Result<TasksClient> {
    let client = TasksClient::new(server)?;
    if !client.is_reachable().await {
        anyhow::bail!(
            "cannot reach taskd server at {server}\n  Start it with: taskd serve"
        );
    }
    Ok(client)
}

fn parse_date_arg(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("invalid date '{s}' (expected YYYY-MM-DD)"))
}

fn parse_time_arg(s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .with_context(|| format!("invalid time '{s}' (expected HH:MM)"))
}

async fn run_add(
    server: &str,
    title: String,
    description: Option<String>,
    date: Option<String>,
    time: Option<String>,
    tags: Vec<String>,
    priority: Option<Priority>,
    starred: bool,
) -> Result<()> {
    let client = connect(server).await?;
    let req = CreateTask {
        title,
        description,
        date: date.as_deref().map(parse_date_arg).transpose()?,
        time: time.as_deref().map(parse_time_arg).transpose()?,
        tags: (!tags.is_empty()).then_some(tags),
        priority,
        starred: starred.then_some(true),
        ..Default::default()
    };
    let task = client.create(&req).await?;
    println!("Added: {} — {}", task.id, task.title);
    Ok(())
}

async fn run_list(
    server: &str,
    filter: Option<Selector>,
    tag: Option<String>,
    search: Option<String>,
    sort: Option<SortKey>,
    json: bool,
) -> Result<()> {
    let client = connect(server).await?;
    let query = ListQuery {
        filter,
        tag,
        search,
        sort_by: sort,
    };
    let tasks = client.list(&query).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&tasks)?);
        return Ok(());
    }
    if tasks.is_empty() {
        println!("No tasks found.");
        return Ok(());
    }

    println!("{:<36}  {:<5} {:<10} {:<8}  TITLE", "ID", "DONE", "DUE", "PRIORITY");
    println!("{}", "-".repeat(96));
    for t in &tasks {
        let done = if t.completed { "x" } else { "-" };
        let due = t
            .date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "-".to_string());
        let star = if t.starred { "* " } else { "" };
        println!(
            "{}  {:<5} {:<10} {:<8}  {}{}",
            t.id,
            done,
            due,
            t.priority.as_str(),
            star,
            t.title
        );
    }
    println!("\n{} task(s)", tasks.len());
    Ok(())
}

async fn run_show(server: &str, id: Uuid, json: bool) -> Result<()> {
    let client = connect(server).await?;
    let task = client.get(id).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&task)?);
    } else {
        print_task_detail(&task);
    }
    Ok(())
}

fn print_task_detail(t: &Task) {
    println!("ID:          {}", t.id);
    println!("Title:       {}", t.title);
    println!("Completed:   {}", if t.completed { "yes" } else { "no" });
    println!("Starred:     {}", if t.starred { "yes" } else { "no" });
    println!("Priority:    {}", t.priority.as_str());
    match (t.date, t.time) {
        (Some(d), Some(tm)) => println!("Due:         {} {}", d, tm.format("%H:%M")),
        (Some(d), None) => println!("Due:         {d}"),
        _ => println!("Due:         -"),
    }
    if let Some(ref d) = t.description {
        println!("Description: {d}");
    }
    if !t.tags.is_empty() {
        println!("Tags:        {}", t.tags.join(", "));
    }
    println!("Created:     {}", t.created_at.to_rfc3339());
    println!("Updated:     {}", t.updated_at.to_rfc3339());
}

async fn run_edit(
    server: &str,
    id: Uuid,
    title: Option<String>,
    description: Option<String>,
    date: Option<String>,
    time: Option<String>,
    tags: Vec<String>,
    priority: Option<Priority>,
) -> Result<()> {
    let client = connect(server).await?;
    let patch = UpdateTask {
        title,
        description,
        date: date.as_deref().map(parse_date_arg).transpose()?,
        time: time.as_deref().map(parse_time_arg).transpose()?,
        tags: (!tags.is_empty()).then_some(tags),
        priority,
        ..Default::default()
    };
    let task = client.update(id, &patch).await?;
    println!("Updated: {} — {}", task.id, task.title);
    Ok(())
}

async fn run_done(server: &str, id: Uuid, undo: bool) -> Result<()> {
    let client = connect(server).await?;
    let patch = UpdateTask {
        completed: Some(!undo),
        ..Default::default()
    };
    let task = client.update(id, &patch).await?;
    if undo {
        println!("Reopened: {} — {}", task.id, task.title);
    } else {
        println!("Done: {} — {}", task.id, task.title);
    }
    Ok(())
}

async fn run_star(server: &str, id: Uuid, undo: bool) -> Result<()> {
    let client = connect(server).await?;
    let patch = UpdateTask {
        starred: Some(!undo),
        ..Default::default()
    };
    let task = client.update(id, &patch).await?;
    if undo {
        println!("Unstarred: {} — {}", task.id, task.title);
    } else {
        println!("Starred: {} — {}", task.id, task.title);
    }
    Ok(())
}

async fn run_rm(server: &str, id: Uuid) -> Result<()> {
    let client = connect(server).await?;
    client.delete(id).await?;
    println!("Deleted: {id}");
    Ok(())
}
