#![forbid(unsafe_code)]

mod actor;
mod cmd;
mod output;

use clap::{CommandFactory, Parser, Subcommand};
use output::OutputMode;
use std::env;
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "frota: work-order time accounting for fleet maintenance",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON output (same as `--format json`).
    #[arg(long, global = true)]
    json: bool,

    /// Output format. Defaults to pretty on a terminal and text when piped.
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Acting user for mutating commands (skips env resolution).
    #[arg(long, global = true)]
    actor: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn actor_flag(&self) -> Option<&str> {
        self.actor.as_deref()
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Setup",
        about = "Initialize a workshop store",
        long_about = "Create .frota/ with the SQLite store and a default config.toml.",
        after_help = "EXAMPLES:\n    # Initialize in the current directory\n    frota init\n\n    # Rewrite the default config, keeping stored orders\n    frota init --force"
    )]
    Init(cmd::init::InitArgs),

    #[command(
        next_help_heading = "Lifecycle",
        about = "Open a new work order",
        long_about = "Open a new work order in `aguardando` with a zeroed time ledger.",
        after_help = "EXAMPLES:\n    # Open an order for a truck\n    frota create --vehicle ABC1D23 --estimated-hours 3\n\n    # Assign a mechanic and category up front\n    frota create --vehicle ABC1D23 --mechanic carla --category freio --json"
    )]
    Create(cmd::create::CreateArgs),

    #[command(
        next_help_heading = "Read",
        about = "Show one work order",
        long_about = "Show a work order with per-status dwell times, alerts and overtime projected at an instant.",
        after_help = "EXAMPLES:\n    # Project at the current time\n    frota show os-1a2b3c4d\n\n    # Project at a past instant, with history\n    frota show os-1a2b3c4d --at 2024-03-01T12:00:00Z --history"
    )]
    Show(cmd::show::ShowArgs),

    #[command(
        next_help_heading = "Read",
        about = "List work orders",
        long_about = "List work orders, all projected at the same instant.",
        after_help = "EXAMPLES:\n    # Open orders only\n    frota list --open\n\n    # Orders in execution for one mechanic\n    frota list --status em_execucao --mechanic carla\n\n    # Only orders with an alert raised\n    frota list --alerts --json"
    )]
    List(cmd::list::ListArgs),

    #[command(
        next_help_heading = "Lifecycle",
        about = "Change a work order's status",
        long_about = "Close the running interval, credit it to the current status and move to the target status.",
        after_help = "EXAMPLES:\n    # Start execution\n    frota status os-1a2b3c4d em_execucao\n\n    # Finalize, guarding against concurrent edits\n    frota status os-1a2b3c4d finalizada --expected-version 3"
    )]
    Status(cmd::status::StatusArgs),

    #[command(
        next_help_heading = "Editing",
        about = "Take the edit lock",
        long_about = "Take the advisory edit lock. A lock older than the configured abandonment age is taken over.",
        after_help = "EXAMPLES:\n    frota --actor ana lock os-1a2b3c4d"
    )]
    Lock(cmd::lock::LockArgs),

    #[command(
        next_help_heading = "Editing",
        about = "Release the edit lock",
        after_help = "EXAMPLES:\n    frota --actor ana unlock os-1a2b3c4d"
    )]
    Unlock(cmd::lock::UnlockArgs),

    #[command(
        next_help_heading = "Editing",
        about = "Reassign a work order",
        long_about = "Hand a work order to another mechanic and record a productivity snapshot.",
        after_help = "EXAMPLES:\n    frota assign os-1a2b3c4d bruno"
    )]
    Assign(cmd::assign::AssignArgs),

    #[command(
        next_help_heading = "Editing",
        about = "Edit work order details",
        long_about = "Edit non-ledger fields: vehicle, category, priority, estimates, costs and part requests.",
        after_help = "EXAMPLES:\n    # Raise priority and request two filters\n    frota update os-1a2b3c4d --priority alta --part FLT-100:2"
    )]
    Update(cmd::update::UpdateArgs),

    #[command(next_help_heading = "Editing", about = "Manage service lines")]
    Service {
        #[command(subcommand)]
        command: cmd::service::ServiceCommand,
    },

    #[command(
        next_help_heading = "Read",
        about = "Summarize mechanic productivity",
        long_about = "Group reassignment snapshots by mechanic: count, total and average execution time.",
        after_help = "EXAMPLES:\n    # Everyone, this month\n    frota productivity --from 2024-03-01 --to 2024-03-31\n\n    # One mechanic as JSON\n    frota productivity --mechanic carla --json"
    )]
    Productivity(cmd::productivity::ProductivityArgs),

    #[command(
        next_help_heading = "Setup",
        about = "Import work orders from JSON",
        long_about = "Normalize and store loosely shaped work-order payloads (one object or an array).",
        after_help = "EXAMPLES:\n    frota import legacy-orders.json\n\n    # From stdin\n    cat orders.json | frota import -"
    )]
    Import(cmd::import::ImportArgs),

    #[command(
        next_help_heading = "Setup",
        about = "Generate shell completion scripts",
        after_help = "EXAMPLES:\n    frota completions bash\n    frota completions zsh"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("FROTA_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "frota=debug,info"
        } else {
            "frota=info,warn"
        })
    });

    let format = env::var("FROTA_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    // Logs go to stderr so stdout stays parseable.
    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let project_root = env::current_dir()?;
    let output = output::resolve_output_mode(cli.format, cli.json, &project_root);
    debug!(?output, root = %project_root.display(), "resolved output mode");

    let actor = cli.actor_flag();
    match cli.command {
        Commands::Init(ref args) => cmd::init::run_init(args, output, &project_root),
        Commands::Create(ref args) => cmd::create::run_create(args, actor, output, &project_root),
        Commands::Show(ref args) => cmd::show::run_show(args, output, &project_root),
        Commands::List(ref args) => cmd::list::run_list(args, output, &project_root),
        Commands::Status(ref args) => cmd::status::run_status(args, actor, output, &project_root),
        Commands::Lock(ref args) => cmd::lock::run_lock(args, actor, output, &project_root),
        Commands::Unlock(ref args) => cmd::lock::run_unlock(args, actor, output, &project_root),
        Commands::Assign(ref args) => cmd::assign::run_assign(args, actor, output, &project_root),
        Commands::Update(ref args) => cmd::update::run_update(args, actor, output, &project_root),
        Commands::Service { ref command } => {
            cmd::service::run_service(command, actor, output, &project_root)
        }
        Commands::Productivity(ref args) => {
            cmd::productivity::run_productivity(args, output, &project_root)
        }
        Commands::Import(ref args) => cmd::import::run_import(args, output, &project_root),
        Commands::Completions(ref args) => {
            let mut command = Cli::command();
            cmd::completions::run_completions(args.shell, &mut command)
        }
    }
}
