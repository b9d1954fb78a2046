use anyhow::{Context as _, Result};
use clap::Args;
use frota_core::config::FROTA_DIR;
use frota_core::db::{self, STORE_FILE, migrations};
use serde::Serialize;
use std::io::Write;
use std::path::Path;

use crate::output::{CliError, OutputMode, fail, render};

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Rewrite `config.toml` even if the project is already initialized.
    /// Stored work orders are kept.
    #[arg(long)]
    pub force: bool,
}

const CONFIG_TOML: &str = "[locks]\n\
    abandon_after_minutes = 30\n\
    busy_timeout_ms = 5000\n\
    \n\
    [alerts]\n\
    waiting_hours = 4.0\n\
    execution_floor_hours = 2.0\n\
    execution_factor = 1.2\n\
    paused_hours = 6.0\n\
    total_factor = 2.0\n\
    \n\
    [ledger]\n\
    clock_skew_policy = \"clamp\"\n";

const GITIGNORE: &str = "frota.db\nfrota.db-wal\nfrota.db-shm\n";

#[derive(Debug, Serialize)]
struct InitOutput {
    store: String,
    config: String,
    schema_version: u32,
    reinitialized: bool,
}

/// Execute `frota init`. Creates the project skeleton:
///
/// ```text
/// .frota/
///   frota.db      (SQLite store, migrated to the latest schema)
///   config.toml   (default thresholds)
///   .gitignore
/// ```
///
/// # Errors
///
/// Returns an error if the store already exists and `--force` is not set,
/// or if any filesystem or store operation fails.
pub fn run_init(args: &InitArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let frota_dir = project_root.join(FROTA_DIR);
    let store_path = frota_dir.join(STORE_FILE);
    let existed = store_path.exists();

    if existed && !args.force {
        return Err(fail(
            output,
            &CliError::new(format!("{FROTA_DIR}/ is already initialized"))
                .with_suggestion("Use `frota init --force` to rewrite the default config"),
        ));
    }

    std::fs::create_dir_all(&frota_dir)
        .with_context(|| format!("Failed to create {}", frota_dir.display()))?;

    let config_path = frota_dir.join("config.toml");
    if args.force || !config_path.exists() {
        std::fs::write(&config_path, CONFIG_TOML)
            .with_context(|| format!("Failed to write config: {}", config_path.display()))?;
    }

    let gitignore_path = frota_dir.join(".gitignore");
    std::fs::write(&gitignore_path, GITIGNORE)
        .with_context(|| format!("Failed to write .gitignore: {}", gitignore_path.display()))?;

    let conn = db::open_store(&store_path)?;
    let schema_version = migrations::current_schema_version(&conn)?;

    let result = InitOutput {
        store: store_path.display().to_string(),
        config: config_path.display().to_string(),
        schema_version,
        reinitialized: existed,
    };
    render(output, &result, |r, w| {
        writeln!(w, "✓ Initialized {FROTA_DIR}/ (schema v{})", r.schema_version)?;
        writeln!(w)?;
        writeln!(w, "  Store:  {}", r.store)?;
        writeln!(w, "  Config: {}", r.config)?;
        writeln!(w)?;
        writeln!(w, "Next steps:")?;
        writeln!(w, "  export FROTA_ACTOR=your-name")?;
        writeln!(w, "  frota create --vehicle ABC1D23")
    })
}
