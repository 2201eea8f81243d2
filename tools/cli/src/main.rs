//! coopledger CLI - Command line interface for the poultry production ledger.
//!
//! Records daily flock figures locally, pushes them to the remote table and
//! manages the users allowed to operate the ledger.

use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use coopledger_common::{AccessKey, RecordDate, RecordId};
use coopledger_ledger::{
    DashboardStats, NewUser, PeriodReport, Record, RecordFilter, RecordInput, RecordStore,
    RemoteOutcome, TrendPoint, User, UserDirectory, UserRole,
};
use coopledger_storage::{DocumentStore, LocalDocumentStore};
use coopledger_sync::{AppSheetClient, AppSheetSettings, SyncCoordinator};

#[derive(Parser)]
#[command(name = "coopledger")]
#[command(about = "coopledger - Poultry production ledger")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Directory holding the local documents.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Remote API root.
    #[arg(long, global = true)]
    api_base: Option<String>,

    /// Remote request timeout in seconds.
    #[arg(long, global = true, default_value_t = 30)]
    timeout_secs: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record a day of production.
    Add {
        /// Day being recorded, YYYY-MM-DD (default: today).
        #[arg(short, long)]
        date: Option<String>,

        /// Birds in the flock.
        #[arg(short, long)]
        birds: u32,

        /// Eggs collected.
        #[arg(short, long)]
        eggs: u32,

        /// Eggs found broken.
        #[arg(long, default_value_t = 0)]
        broken: u32,

        /// Morning feed in kilograms.
        #[arg(long)]
        feed_am: f64,

        /// Evening feed in kilograms.
        #[arg(long)]
        feed_pm: f64,

        /// Who collected the figures (default: logged-in user).
        #[arg(short, long)]
        responsible: Option<String>,

        /// Free-form notes.
        #[arg(short, long)]
        notes: Option<String>,
    },

    /// List records, most recent first.
    List {
        /// Only show records not yet pushed.
        #[arg(long)]
        pending: bool,

        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Print a production report for a period.
    Report {
        #[command(flatten)]
        filter: FilterArgs,

        /// Emit CSV instead of text.
        #[arg(long)]
        csv: bool,
    },

    /// Delete a record.
    Delete {
        /// Record id.
        id: String,
    },

    /// Show dashboard figures.
    Stats {
        /// Also print the daily trend series.
        #[arg(long)]
        trend: bool,
    },

    /// Push every unsynced record to the remote table.
    Sync,

    /// Show or change the remote sync configuration.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Manage users (administrators only).
    Users {
        #[command(subcommand)]
        action: UsersAction,
    },

    /// Start a session.
    Login {
        /// Username.
        username: String,
    },

    /// End the current session.
    Logout,

    /// Show the logged-in user.
    Whoami,

    /// Print a shell completion script.
    Completions {
        /// Target shell.
        shell: Shell,
    },
}

/// Record selection shared by `list` and `report`.
#[derive(Args)]
struct FilterArgs {
    /// First day included, YYYY-MM-DD.
    #[arg(long, conflicts_with = "last_days")]
    from: Option<String>,

    /// Last day included, YYYY-MM-DD.
    #[arg(long, conflicts_with = "last_days")]
    to: Option<String>,

    /// Only the last N days up to today.
    #[arg(long)]
    last_days: Option<u32>,

    /// Case-insensitive match on responsible or notes.
    #[arg(short, long)]
    search: Option<String>,
}

impl FilterArgs {
    fn to_filter(&self) -> Result<RecordFilter> {
        let mut filter = match self.last_days {
            Some(days) => RecordFilter::last_days(RecordDate::parse(&today())?, days),
            None => RecordFilter::new(),
        };
        if let Some(from) = &self.from {
            filter = filter.with_from(RecordDate::parse(from).context("Invalid --from")?);
        }
        if let Some(to) = &self.to {
            filter = filter.with_to(RecordDate::parse(to).context("Invalid --to")?);
        }
        if let Some(term) = &self.search {
            filter = filter.with_search(term.as_str());
        }
        Ok(filter)
    }
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the current configuration.
    Show,

    /// Update the configuration (administrators only).
    Set {
        /// Remote application id.
        #[arg(long)]
        app_id: Option<String>,

        /// Remote table name.
        #[arg(long)]
        table: Option<String>,

        /// Enable or disable automatic pushes.
        #[arg(long)]
        enabled: Option<bool>,

        /// Prompt for a new access key.
        #[arg(long)]
        access_key: bool,
    },
}

#[derive(Subcommand)]
enum UsersAction {
    /// List users.
    List,

    /// Add a user.
    Add {
        /// Login name.
        username: String,

        /// Display name.
        #[arg(short, long)]
        name: String,

        /// Grant administrator rights.
        #[arg(long)]
        admin: bool,
    },

    /// Remove a user.
    Remove {
        /// User id.
        id: String,
    },
}

/// Local stores and the remote client, opened from the global options.
struct Ledger {
    records: Arc<RecordStore>,
    users: UserDirectory,
    remote: Arc<AppSheetClient>,
}

impl Ledger {
    fn open(cli: &Cli) -> Result<Self> {
        let data_dir = match &cli.data_dir {
            Some(dir) => dir.clone(),
            None => dirs::data_dir()
                .context("Could not determine the user data directory; pass --data-dir")?
                .join("coopledger"),
        };

        let documents: Arc<dyn DocumentStore> =
            Arc::new(LocalDocumentStore::new(&data_dir).context("Failed to open data directory")?);

        let mut settings =
            AppSheetSettings::new().with_timeout(Duration::from_secs(cli.timeout_secs));
        if let Some(base) = &cli.api_base {
            settings = settings.with_base_url(base).context("Invalid --api-base")?;
        }
        let remote = Arc::new(AppSheetClient::new(settings)?);

        let records = Arc::new(RecordStore::new(documents.clone()).with_remote(remote.clone()));
        let users = UserDirectory::new(documents);

        Ok(Self {
            records,
            users,
            remote,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    if let Commands::Completions { shell } = &cli.command {
        clap_complete::generate(*shell, &mut Cli::command(), "coopledger", &mut std::io::stdout());
        return Ok(());
    }

    let ledger = Ledger::open(&cli)?;

    match cli.command {
        Commands::Add {
            date,
            birds,
            eggs,
            broken,
            feed_am,
            feed_pm,
            responsible,
            notes,
        } => {
            let input = RecordInput {
                date: date.unwrap_or_else(today),
                bird_count: birds,
                total_eggs: eggs,
                broken_eggs: broken,
                feed_morning: feed_am,
                feed_evening: feed_pm,
                responsible: responsible.unwrap_or_default(),
                notes,
            };
            cmd_add(&ledger, input).await
        }

        Commands::List { pending, filter } => cmd_list(&ledger, pending, filter.to_filter()?).await,

        Commands::Report { filter, csv } => cmd_report(&ledger, filter.to_filter()?, csv).await,

        Commands::Delete { id } => cmd_delete(&ledger, &id).await,

        Commands::Stats { trend } => cmd_stats(&ledger, trend).await,

        Commands::Sync => cmd_sync(&ledger).await,

        Commands::Config { action } => match action {
            ConfigAction::Show => cmd_config_show(&ledger).await,
            ConfigAction::Set {
                app_id,
                table,
                enabled,
                access_key,
            } => cmd_config_set(&ledger, app_id, table, enabled, access_key).await,
        },

        Commands::Users { action } => match action {
            UsersAction::List => cmd_users_list(&ledger).await,
            UsersAction::Add {
                username,
                name,
                admin,
            } => cmd_users_add(&ledger, username, name, admin).await,
            UsersAction::Remove { id } => cmd_users_remove(&ledger, &id).await,
        },

        Commands::Login { username } => cmd_login(&ledger, &username).await,

        Commands::Logout => cmd_logout(&ledger).await,

        Commands::Whoami => cmd_whoami(&ledger).await,

        Commands::Completions { .. } => Ok(()),
    }
}

fn today() -> String {
    chrono::Local::now().date_naive().format("%Y-%m-%d").to_string()
}

/// Prompt for a secret without echoing it.
fn prompt_secret(prompt: &str) -> Result<String> {
    rpassword::prompt_password(prompt).context("Failed to read from terminal")
}

/// The logged-in user, if they are an administrator.
async fn require_admin(ledger: &Ledger) -> Result<User> {
    let user = ledger
        .users
        .current_user()
        .await?
        .context("Not logged in; run `coopledger login <username>` first")?;
    if !user.is_admin() {
        anyhow::bail!("User '{}' is not an administrator", user.username);
    }
    Ok(user)
}

fn role_label(role: UserRole) -> &'static str {
    match role {
        UserRole::Admin => "admin",
        UserRole::User => "user",
    }
}

/// Record a day of production and report the push outcome.
async fn cmd_add(ledger: &Ledger, mut input: RecordInput) -> Result<()> {
    if input.responsible.trim().is_empty() {
        if let Some(user) = ledger.users.current_user().await? {
            input.responsible = user.name;
        }
    }

    let created = ledger
        .records
        .create_record(input)
        .await
        .context("Failed to store record")?;
    let record = &created.record;

    println!("Record stored: {}", record.id());
    println!("  Date: {}", record.date());
    println!("  Posture rate: {:.2}%", record.posture_rate());
    println!("  Loss rate: {:.2}%", record.loss_rate());
    println!("  Total feed: {:.2} kg", record.total_feed());

    match &created.remote {
        RemoteOutcome::Synced(row) => println!("  Synced as remote row {}", row),
        RemoteOutcome::Skipped => println!("  Not synced (remote sync disabled or not configured)"),
        RemoteOutcome::Failed(reason) => {
            println!("  Saved locally only; push failed: {}", reason);
            println!("  Run `coopledger sync` to retry.");
        }
    }

    Ok(())
}

/// List records.
async fn cmd_list(ledger: &Ledger, pending: bool, filter: RecordFilter) -> Result<()> {
    let records = if pending {
        ledger.records.unsynced_records().await?
    } else {
        ledger.records.list_records().await?
    };
    let records = filter.apply(&records);

    if records.is_empty() {
        println!("No records.");
        return Ok(());
    }

    println!(
        "{:<10}  {:>6}  {:>6}  {:>6}  {:>8}  {:>7}  {:>8}  {:<6}  {}",
        "DATE", "BIRDS", "EGGS", "BROKEN", "POSTURE%", "LOSS%", "FEED kg", "SYNCED", "ID"
    );
    for r in &records {
        println!(
            "{:<10}  {:>6}  {:>6}  {:>6}  {:>8.2}  {:>7.2}  {:>8.2}  {:<6}  {}",
            r.date().to_string(),
            r.bird_count(),
            r.total_eggs(),
            r.broken_eggs(),
            r.posture_rate(),
            r.loss_rate(),
            r.total_feed(),
            if r.is_synced() { "yes" } else { "no" },
            r.id()
        );
    }

    Ok(())
}

/// Print a period report.
async fn cmd_report(ledger: &Ledger, filter: RecordFilter, csv: bool) -> Result<()> {
    let history = ledger.records.list_records().await?;
    let report = PeriodReport::build(&filter, &history);

    if csv {
        print!("{}", report_csv(&report.records));
        return Ok(());
    }

    let label = |d: Option<RecordDate>| d.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string());
    println!("Production report");
    println!("  Period: {} to {}", label(report.start), label(report.end));
    println!("  Records: {}", report.summary.record_count);
    println!("  Total eggs collected: {}", report.summary.total_eggs);
    println!("  Average flock: {:.0} birds", report.summary.avg_birds);
    println!("  Average posture rate: {:.2}%", report.summary.avg_posture_rate);

    if report.records.is_empty() {
        println!();
        println!("No records in this period.");
        return Ok(());
    }

    println!();
    println!(
        "{:<10}  {:>6}  {:>6}  {:>6}  {:>8}  {:>8}  {}",
        "DATE", "BIRDS", "EGGS", "BROKEN", "FEED kg", "POSTURE%", "RESPONSIBLE"
    );
    for r in &report.records {
        println!(
            "{:<10}  {:>6}  {:>6}  {:>6}  {:>8.2}  {:>8.1}  {}",
            r.date().to_string(),
            r.bird_count(),
            r.total_eggs(),
            r.broken_eggs(),
            r.total_feed(),
            r.posture_rate(),
            r.responsible()
        );
    }

    Ok(())
}

/// Report rows as CSV, one line per record.
fn report_csv(records: &[Record]) -> String {
    let mut out = String::from("date,birds,eggs,broken,feed_kg,posture_rate,loss_rate,responsible,notes\n");
    for r in records {
        out.push_str(&format!(
            "{},{},{},{},{:.2},{:.2},{:.2},{},{}\n",
            r.date(),
            r.bird_count(),
            r.total_eggs(),
            r.broken_eggs(),
            r.total_feed(),
            r.posture_rate(),
            r.loss_rate(),
            csv_field(r.responsible()),
            csv_field(r.notes())
        ));
    }
    out
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Delete a record.
async fn cmd_delete(ledger: &Ledger, id: &str) -> Result<()> {
    let id = RecordId::new(id).context("Invalid record id")?;

    if ledger.records.delete_record(&id).await? {
        println!("Record deleted: {}", id);
    } else {
        println!("No record with id {}", id);
    }

    Ok(())
}

/// Show dashboard figures.
async fn cmd_stats(ledger: &Ledger, trend: bool) -> Result<()> {
    let records = ledger.records.list_records().await?;
    let stats = DashboardStats::from_records(&records);
    let pending = records.iter().filter(|r| !r.is_synced()).count();

    println!("Dashboard:");
    println!("  Records: {} ({} pending sync)", stats.record_count, pending);
    println!("  Current flock: {} birds", stats.current_flock);
    println!("  Average posture rate: {:.2}%", stats.avg_posture_rate);
    println!("  Average loss rate: {:.2}%", stats.avg_loss_rate);
    println!("  Total feed: {:.2} kg", stats.total_feed);

    if trend && !records.is_empty() {
        println!();
        println!("{:<10}  {:>8}  {:>7}  {:>8}", "DATE", "POSTURE%", "LOSS%", "FEED kg");
        for point in TrendPoint::series(&records) {
            println!(
                "{:<10}  {:>8.2}  {:>7.2}  {:>8.2}",
                point.date.to_string(),
                point.posture_rate,
                point.loss_rate,
                point.total_feed
            );
        }
    }

    Ok(())
}

/// Push every unsynced record.
async fn cmd_sync(ledger: &Ledger) -> Result<()> {
    let coordinator = SyncCoordinator::new(ledger.records.clone(), ledger.remote.clone());
    let report = coordinator
        .push_pending()
        .await
        .context("Sync could not start")?;

    if report.attempted == 0 {
        println!("Nothing to sync.");
        return Ok(());
    }

    println!(
        "Sync finished: {} of {} records pushed ({} failed) in {:.1}s",
        report.succeeded,
        report.attempted,
        report.failed,
        report.duration.as_secs_f64()
    );
    for (id, reason) in &report.failures {
        println!("  {}: {}", id, reason);
    }

    if !report.is_complete() {
        anyhow::bail!("{} records could not be pushed", report.failed);
    }
    Ok(())
}

/// Print the remote sync configuration.
async fn cmd_config_show(ledger: &Ledger) -> Result<()> {
    let config = ledger.records.remote_config().await?;

    println!("Remote sync:");
    println!(
        "  Application id: {}",
        if config.app_id.is_empty() { "(not set)" } else { config.app_id.as_str() }
    );
    println!(
        "  Access key: {}",
        if config.access_key.is_empty() { "(not set)" } else { "(set)" }
    );
    println!("  Table: {}", config.table_name);
    println!("  Enabled: {}", config.enabled);
    println!("  API base: {}", ledger.remote.settings().base_url);
    if config.enabled && !config.has_credentials() {
        println!("  New records will not be pushed until credentials are set.");
    }

    Ok(())
}

/// Update the remote sync configuration.
async fn cmd_config_set(
    ledger: &Ledger,
    app_id: Option<String>,
    table: Option<String>,
    enabled: Option<bool>,
    prompt_key: bool,
) -> Result<()> {
    require_admin(ledger).await?;

    let mut config = ledger.records.remote_config().await?;
    if let Some(app_id) = app_id {
        config.app_id = app_id.trim().to_string();
    }
    if let Some(table) = table {
        if table.trim().is_empty() {
            anyhow::bail!("Table name cannot be empty");
        }
        config.table_name = table;
    }
    if let Some(enabled) = enabled {
        config.enabled = enabled;
    }
    if prompt_key {
        config.access_key = AccessKey::new(prompt_secret("Access key: ")?.trim());
    }

    ledger
        .records
        .set_remote_config(&config)
        .await
        .context("Failed to save configuration")?;

    info!("Remote configuration updated");
    println!("Configuration saved.");
    Ok(())
}

/// List users.
async fn cmd_users_list(ledger: &Ledger) -> Result<()> {
    require_admin(ledger).await?;

    let users = ledger.users.list_users().await?;
    println!("{:<38}  {:<16}  {:<6}  {}", "ID", "USERNAME", "ROLE", "NAME");
    for user in &users {
        println!(
            "{:<38}  {:<16}  {:<6}  {}",
            user.id,
            user.username,
            role_label(user.role),
            user.name
        );
    }

    Ok(())
}

/// Add a user.
async fn cmd_users_add(ledger: &Ledger, username: String, name: String, admin: bool) -> Result<()> {
    require_admin(ledger).await?;

    let password = prompt_secret("Password for new user: ")?;
    let confirm = prompt_secret("Confirm password: ")?;

    if password != confirm {
        anyhow::bail!("Passwords do not match");
    }

    let role = if admin { UserRole::Admin } else { UserRole::User };
    let user = ledger
        .users
        .add_user(NewUser {
            username,
            name,
            password,
            role,
        })
        .await
        .context("Failed to add user")?;

    println!("User added: {} ({})", user.username, user.id);
    Ok(())
}

/// Remove a user.
async fn cmd_users_remove(ledger: &Ledger, id: &str) -> Result<()> {
    let current = require_admin(ledger).await?;
    if current.id == id {
        anyhow::bail!("Cannot remove the logged-in user");
    }

    if ledger
        .users
        .delete_user(id)
        .await
        .context("Failed to remove user")?
    {
        println!("User removed: {}", id);
    } else {
        println!("No user with id {}", id);
    }

    Ok(())
}

/// Start a session.
async fn cmd_login(ledger: &Ledger, username: &str) -> Result<()> {
    let password = prompt_secret("Password: ")?;
    let user = ledger
        .users
        .login(username, &password)
        .await
        .context("Login failed")?;

    println!("Logged in as {} ({})", user.name, role_label(user.role));
    Ok(())
}

/// End the session.
async fn cmd_logout(ledger: &Ledger) -> Result<()> {
    ledger.users.logout().await?;
    println!("Logged out.");
    Ok(())
}

/// Show the current user.
async fn cmd_whoami(ledger: &Ledger) -> Result<()> {
    match ledger.users.current_user().await? {
        Some(user) => println!("{} ({}, {})", user.name, user.username, role_label(user.role)),
        None => println!("Not logged in."),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_add_with_defaults() {
        let cli = Cli::try_parse_from([
            "coopledger", "add", "--birds", "100", "--eggs", "90", "--feed-am", "2", "--feed-pm", "1.5",
        ])
        .unwrap();

        match cli.command {
            Commands::Add {
                date,
                broken,
                responsible,
                ..
            } => {
                assert!(date.is_none());
                assert_eq!(broken, 0);
                assert!(responsible.is_none());
            }
            _ => panic!("expected add"),
        }
        assert_eq!(cli.timeout_secs, 30);
    }

    #[test]
    fn test_parse_global_options_after_subcommand() {
        let cli = Cli::try_parse_from([
            "coopledger", "sync", "--data-dir", "/tmp/ledger", "--api-base", "http://localhost:8080",
        ])
        .unwrap();
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/ledger")));
        assert_eq!(cli.api_base.as_deref(), Some("http://localhost:8080"));
    }

    #[test]
    fn test_parse_list_filters() {
        let cli = Cli::try_parse_from([
            "coopledger", "list", "--from", "2024-05-01", "--to", "2024-05-31", "--search", "ana",
        ])
        .unwrap();

        match cli.command {
            Commands::List { filter, .. } => {
                let filter = filter.to_filter().unwrap();
                assert_eq!(filter.from, Some(RecordDate::parse("2024-05-01").unwrap()));
                assert_eq!(filter.to, Some(RecordDate::parse("2024-05-31").unwrap()));
                assert_eq!(filter.search.as_deref(), Some("ana"));
            }
            _ => panic!("expected list"),
        }
    }

    #[test]
    fn test_last_days_conflicts_with_explicit_range() {
        assert!(Cli::try_parse_from(["coopledger", "report", "--last-days", "7", "--from", "2024-05-01"])
            .is_err());

        let cli = Cli::try_parse_from(["coopledger", "report", "--last-days", "7", "--csv"]).unwrap();
        match cli.command {
            Commands::Report { filter, csv } => {
                assert!(csv);
                let filter = filter.to_filter().unwrap();
                assert_eq!(filter.to.map(|d| d.to_string()), Some(today()));
                assert!(filter.from.is_some());
            }
            _ => panic!("expected report"),
        }
    }

    #[test]
    fn test_invalid_filter_date() {
        let cli = Cli::try_parse_from(["coopledger", "list", "--from", "01/05/2024"]).unwrap();
        match cli.command {
            Commands::List { filter, .. } => assert!(filter.to_filter().is_err()),
            _ => panic!("expected list"),
        }
    }

    #[test]
    fn test_csv_field_quoting() {
        assert_eq!(csv_field("Ana"), "Ana");
        assert_eq!(csv_field("chuva, frio"), "\"chuva, frio\"");
        assert_eq!(csv_field("o \"galo\""), "\"o \"\"galo\"\"\"");
    }

    #[test]
    fn test_today_format() {
        assert!(coopledger_common::RecordDate::parse(&today()).is_ok());
    }
}
