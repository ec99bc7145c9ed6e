//! workshopd CLI: operator interface to the workshop scheduler.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use workshopd::config::Config;
use workshopd::evaluator::{Evaluator, EvaluatorConfig};
use workshopd::http::{self, AppState};
use workshopd::model::{Mode, NewRegistration, NewWorkshop, Status, WorkshopId};
use workshopd::scheduler::{Scheduler, WorkshopFilter};
use workshopd::seed;
use workshopd::telemetry::{TelemetryConfig, init_telemetry};

#[derive(Parser)]
#[command(name = "workshopd", about = "Workshop scheduling service")]
struct Cli {
    /// SQLite path, overriding WORKSHOPD_DB
    #[arg(long, global = true)]
    db: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the API server and lifecycle evaluator
    Serve {
        /// Seed the demo catalog at startup (always on for in-memory stores)
        #[arg(long)]
        seed: bool,
    },
    /// Workshop catalog operations
    Workshop {
        #[command(subcommand)]
        action: WorkshopAction,
    },
    /// Register a user for a workshop
    Register {
        workshop_id: i64,
        user_id: String,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        name: Option<String>,
    },
    /// Cancel a user's registration
    Cancel { workshop_id: i64, user_id: String },
    /// Show recorded events
    Events {
        /// Only events after this sequence number
        #[arg(long, default_value_t = 0)]
        since: u64,
    },
    /// Load the demo catalog into the store
    Seed,
}

#[derive(Subcommand)]
enum WorkshopAction {
    /// List workshops
    List {
        /// Filter by status (upcoming | live | completed)
        #[arg(long)]
        status: Option<String>,
        /// Maximum entries to show
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Show a workshop
    Show { id: i64 },
    /// Add a workshop
    Add {
        title: String,
        /// Start time, RFC 3339 (e.g. 2026-08-10T14:00:00Z)
        start: String,
        /// Duration in minutes
        #[arg(long, default_value_t = 60)]
        duration: u32,
        /// Total seats
        #[arg(long, default_value_t = 30)]
        capacity: u32,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        instructor: Option<String>,
        /// Delivery mode (online | offline | hybrid)
        #[arg(long, default_value = "online")]
        mode: String,
        /// Topic tag; repeat for several
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut config = Config::from_env()?;
    if let Some(db) = cli.db {
        config.db_path = db;
    }

    match cli.command {
        Command::Serve { seed } => cmd_serve(config, seed).await,
        Command::Workshop { action } => {
            let mut scheduler = open_scheduler(&config)?;
            match action {
                WorkshopAction::List { status, limit } => {
                    cmd_workshop_list(&scheduler, status, limit)
                }
                WorkshopAction::Show { id } => cmd_workshop_show(&scheduler, id),
                WorkshopAction::Add {
                    title,
                    start,
                    duration,
                    capacity,
                    description,
                    instructor,
                    mode,
                    tags,
                } => cmd_workshop_add(
                    &mut scheduler,
                    title,
                    start,
                    duration,
                    capacity,
                    description,
                    instructor,
                    mode,
                    tags,
                ),
            }
        }
        Command::Register {
            workshop_id,
            user_id,
            email,
            name,
        } => {
            let mut scheduler = open_scheduler(&config)?;
            cmd_register(&mut scheduler, workshop_id, user_id, email, name)
        }
        Command::Cancel {
            workshop_id,
            user_id,
        } => {
            let mut scheduler = open_scheduler(&config)?;
            cmd_cancel(&mut scheduler, workshop_id, user_id)
        }
        Command::Events { since } => {
            let scheduler = open_scheduler(&config)?;
            cmd_events(&scheduler, since)
        }
        Command::Seed => {
            let mut scheduler = open_scheduler(&config)?;
            let count = seed::load(&mut scheduler, chrono::Utc::now())?;
            println!("Seeded {count} workshop(s).");
            Ok(())
        }
    }
}

fn open_scheduler(config: &Config) -> anyhow::Result<Scheduler> {
    let scheduler = if config.db_path == ":memory:" {
        Scheduler::in_memory()?
    } else {
        Scheduler::open(&config.db_path)?
    };
    Ok(scheduler)
}

async fn cmd_serve(config: Config, seed_flag: bool) -> anyhow::Result<()> {
    let _guard = init_telemetry(TelemetryConfig {
        endpoint: config.otel_endpoint.clone(),
        service_name: "workshopd".to_string(),
        log_level: config.log_level.clone(),
    })?;

    let in_memory = config.db_path == ":memory:";
    let mut scheduler = open_scheduler(&config)?;

    if seed_flag || in_memory {
        let count = seed::load(&mut scheduler, chrono::Utc::now())?;
        tracing::info!(workshops = count, "demo catalog seeded");
    }

    let bus = scheduler.bus();
    let shared = scheduler.into_shared();

    let evaluator = Evaluator::new(
        Arc::clone(&shared),
        EvaluatorConfig {
            tick_interval: config.tick_interval,
        },
    );
    let server_shutdown = Arc::new(tokio::sync::Notify::new());

    {
        let evaluator = evaluator.clone();
        let server_shutdown = Arc::clone(&server_shutdown);
        tokio::spawn(async move {
            http::shutdown_signal().await;
            tracing::warn!("shutdown signal received");
            evaluator.shutdown();
            server_shutdown.notify_one();
        });
    }

    let evaluator_task = {
        let evaluator = evaluator.clone();
        tokio::spawn(async move { evaluator.run().await })
    };

    http::serve(config.bind_addr, AppState::new(shared, bus), server_shutdown).await?;
    evaluator_task.await?;
    Ok(())
}

fn cmd_workshop_list(
    scheduler: &Scheduler,
    status: Option<String>,
    limit: usize,
) -> anyhow::Result<()> {
    let status = match status {
        Some(s) => Some(s.parse::<Status>()?),
        None => None,
    };

    let filter = WorkshopFilter {
        status,
        ..Default::default()
    };
    let mut workshops = scheduler.list_workshops(&filter)?;
    workshops.truncate(limit);

    if workshops.is_empty() {
        println!("No workshops found.");
        return Ok(());
    }

    // Header
    println!(
        "{:<5}  {:<32}  {:<10}  {:>7}  {:<18}  START",
        "ID", "TITLE", "STATUS", "SEATS", "INSTRUCTOR"
    );
    println!("{}", "-".repeat(100));

    for w in &workshops {
        let title = if w.title.len() > 32 {
            &w.title[..32]
        } else {
            &w.title
        };
        println!(
            "{:<5}  {:<32}  {:<10}  {:>3}/{:<3}  {:<18}  {}",
            w.id.to_string(),
            title,
            w.status.to_string(),
            w.capacity.filled,
            w.capacity.total,
            w.instructor,
            w.scheduled_start.format("%Y-%m-%d %H:%M")
        );
    }

    println!("\n{} workshop(s)", workshops.len());
    Ok(())
}

fn cmd_workshop_show(scheduler: &Scheduler, id: i64) -> anyhow::Result<()> {
    let w = scheduler.get_workshop(WorkshopId(id))?;

    println!("ID:          {}", w.id);
    println!("Title:       {}", w.title);
    if !w.description.is_empty() {
        println!("Description: {}", w.description);
    }
    println!("Instructor:  {}", w.instructor);
    println!("Mode:        {}", w.mode);
    println!("Tags:        {}", w.tags.join(", "));
    println!("Status:      {}", w.status);
    println!("Start:       {}", w.scheduled_start);
    println!("Ends:        {}", w.end_time());
    println!("Duration:    {} min", w.duration_minutes);
    println!(
        "Seats:       {}/{} ({} remaining)",
        w.capacity.filled,
        w.capacity.total,
        w.capacity.remaining()
    );
    println!("Created:     {}", w.created_at);
    println!("Updated:     {}", w.updated_at);

    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn cmd_workshop_add(
    scheduler: &mut Scheduler,
    title: String,
    start: String,
    duration: u32,
    capacity: u32,
    description: Option<String>,
    instructor: Option<String>,
    mode: String,
    tags: Vec<String>,
) -> anyhow::Result<()> {
    let start = chrono::DateTime::parse_from_rfc3339(&start)
        .map_err(|e| anyhow::anyhow!("invalid start time: {e}"))?
        .with_timezone(&chrono::Utc);

    let mut new = NewWorkshop::new(&title, start, duration, capacity)
        .mode(mode.parse::<Mode>()?)
        .tags(tags);
    if let Some(description) = description {
        new = new.description(description);
    }
    if let Some(instructor) = instructor {
        new = new.instructor(instructor);
    }

    let workshop = scheduler.add_workshop(new)?;
    println!(
        "Created: {} \"{}\" ({} seats, starts {})",
        workshop.id, workshop.title, workshop.capacity.total, workshop.scheduled_start
    );
    Ok(())
}

fn cmd_register(
    scheduler: &mut Scheduler,
    workshop_id: i64,
    user_id: String,
    email: Option<String>,
    name: Option<String>,
) -> anyhow::Result<()> {
    let mut new = NewRegistration::new(&user_id);
    if let Some(email) = email {
        new = new.email(email);
    }
    if let Some(name) = name {
        new = new.name(name);
    }

    let (workshop, registration) = scheduler.register(WorkshopId(workshop_id), new)?;
    println!(
        "Registered: {} for \"{}\" (seat {}/{})",
        registration.user_id, workshop.title, workshop.capacity.filled, workshop.capacity.total
    );
    Ok(())
}

fn cmd_cancel(scheduler: &mut Scheduler, workshop_id: i64, user_id: String) -> anyhow::Result<()> {
    let workshop = scheduler.cancel(WorkshopId(workshop_id), &user_id)?;
    println!(
        "Cancelled: {} for \"{}\" ({}/{} seats filled)",
        user_id, workshop.title, workshop.capacity.filled, workshop.capacity.total
    );
    Ok(())
}

fn cmd_events(scheduler: &Scheduler, since: u64) -> anyhow::Result<()> {
    let events = scheduler.events_since(since)?;

    if events.is_empty() {
        println!("No events.");
        return Ok(());
    }

    for event in &events {
        println!(
            "{:<6}  {}  {}",
            event.seq,
            event.timestamp.format("%Y-%m-%d %H:%M:%S"),
            serde_json::to_string(&event.kind)?
        );
    }

    println!("\n{} event(s)", events.len());
    Ok(())
}
