use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use portal::cities::{CitiesView, Notice, ROWS_PER_PAGE_OPTIONS, Severity};
use portal::config::{ConfigError, PortalConfig, Timeouts};
use portal::session::guard::{GuardDecision, guard_protected};
use portal::session::sign_in::SignInForm;
use portal::storage::FileStorage;
use portal::{AppContext, ApiError, Navigator};
use serde_json::{Value, json};
use tracing::Level;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("request failed: {0}")]
    Api(#[from] ApiError),
    #[error("not signed in; run `portal login` first")]
    NotSignedIn,
    #[error("{0}")]
    Rejected(String),
    #[error("no city with id {0}")]
    UnknownCity(u64),
    #[error("rows per page must be one of {ROWS_PER_PAGE_OPTIONS:?}, got {0}")]
    InvalidRowsPerPage(usize),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "portal", about = "Study-abroad portal dashboard CLI")]
struct Cli {
    #[arg(long, env = "PORTAL_API_BASE_URL", default_value = portal::config::DEFAULT_API_BASE_URL)]
    base_url: String,

    #[arg(long, env = "PORTAL_STATE_FILE", default_value = "portal-state.json", help = "Where credentials persist between runs")]
    state_file: PathBuf,

    #[arg(long, env = "PORTAL_REQUEST_TIMEOUT_SECS", default_value_t = portal::config::DEFAULT_REQUEST_TIMEOUT_SECS, value_parser = clap::value_parser!(u64).range(1..))]
    request_timeout_secs: u64,

    #[arg(long, env = "PORTAL_CONNECT_TIMEOUT_SECS", default_value_t = portal::config::DEFAULT_CONNECT_TIMEOUT_SECS, value_parser = clap::value_parser!(u64).range(1..))]
    connect_timeout_secs: u64,

    #[arg(long, env = "PORTAL_SIGN_IN_PATH", default_value = portal::config::DEFAULT_SIGN_IN_PATH)]
    sign_in_path: String,

    #[arg(short, long, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Login {
        #[arg(long)]
        username: String,
        #[arg(long, env = "PORTAL_PASSWORD", hide_env_values = true)]
        password: String,
    },
    Logout,
    Whoami,
    Cities(CitiesCommand),
}

#[derive(Args, Debug)]
struct CitiesCommand {
    #[command(subcommand)]
    command: CitiesSubcommand,
}

#[derive(Subcommand, Debug)]
enum CitiesSubcommand {
    List {
        #[arg(long, default_value = "")]
        filter: String,
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u64).range(1..), help = "1-based page number")]
        page: u64,
        #[arg(long, default_value_t = portal::cities::DEFAULT_ROWS_PER_PAGE)]
        rows_per_page: usize,
    },
    Add {
        name: String,
    },
    Rename {
        id: u64,
        name: String,
    },
    Delete {
        id: u64,
    },
}

/// The terminal has no router; a redirect to sign-in becomes a hint.
struct TerminalNavigator;

impl Navigator for TerminalNavigator {
    fn redirect(&self, path: &str) {
        tracing::debug!(%path, "redirect requested");
        eprintln!("signed out ({path}); run `portal login` to sign in again");
    }
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::WARN })
        .init();

    let mut config = PortalConfig::new(&cli.base_url)?.with_sign_in_path(&cli.sign_in_path)?;
    config.timeouts = Timeouts { request_secs: cli.request_timeout_secs, connect_secs: cli.connect_timeout_secs };

    let storage = Arc::new(FileStorage::new(cli.state_file));
    let ctx = AppContext::new(config, storage, Arc::new(TerminalNavigator))?;

    match cli.command {
        Command::Login { username, password } => run_login(&ctx, username, password).await,
        Command::Logout => {
            ctx.session.logout();
            Ok(())
        }
        Command::Whoami => run_whoami(&ctx).await,
        Command::Cities(cities) => run_cities(&ctx, cities).await,
    }
}

async fn run_login(ctx: &AppContext, username: String, password: String) -> Result<(), CliError> {
    let form = SignInForm::new(username, password);
    form.submit(&ctx.session).await.map_err(CliError::Rejected)?;
    let user = ctx.session.user().ok_or(CliError::NotSignedIn)?;
    println!("signed in as {}", user.display_name());
    Ok(())
}

async fn run_whoami(ctx: &AppContext) -> Result<(), CliError> {
    require_session(ctx).await?;
    let user = ctx.session.user().ok_or(CliError::NotSignedIn)?;
    print_json(&serde_json::to_value(user)?)
}

async fn run_cities(ctx: &AppContext, cities: CitiesCommand) -> Result<(), CliError> {
    require_session(ctx).await?;
    let mut view = ctx.cities_view();
    if let Some(notice) = view.load().await {
        return report(&notice);
    }

    match cities.command {
        CitiesSubcommand::List { filter, page, rows_per_page } => {
            if !ROWS_PER_PAGE_OPTIONS.contains(&rows_per_page) {
                return Err(CliError::InvalidRowsPerPage(rows_per_page));
            }
            view.table.set_rows_per_page(rows_per_page);
            view.table.set_page(usize::try_from(page - 1).unwrap_or(usize::MAX));
            view.set_filter(filter);
            print_page(&view)
        }
        CitiesSubcommand::Add { name } => {
            view.city_name = name;
            let notice = view.add_city().await;
            report(&notice)
        }
        CitiesSubcommand::Rename { id, name } => {
            if !view.begin_edit(id) {
                return Err(CliError::UnknownCity(id));
            }
            view.set_edit_name(name);
            match view.save_edit().await {
                Some(notice) => report(&notice),
                None => Ok(()),
            }
        }
        CitiesSubcommand::Delete { id } => {
            if !view.cities.iter().any(|c| c.id == id) {
                return Err(CliError::UnknownCity(id));
            }
            view.request_delete(id);
            match view.confirm_delete().await {
                Some(notice) => report(&notice),
                None => Ok(()),
            }
        }
    }
}

/// Reconcile the stored session and refuse to continue when signed out.
async fn require_session(ctx: &AppContext) -> Result<(), CliError> {
    ctx.session.check_auth().await;
    match guard_protected(&ctx.session.snapshot()) {
        GuardDecision::Allow => Ok(()),
        GuardDecision::Pending | GuardDecision::Redirect(_) => Err(CliError::NotSignedIn),
    }
}

fn print_page(view: &CitiesView) -> Result<(), CliError> {
    if view.not_found() {
        eprintln!("no cities match {:?}", view.filter_name);
        return Ok(());
    }
    let total = view.filtered().len();
    let rows: Vec<Value> = view
        .page_rows()
        .into_iter()
        .map(|row| json!({ "serial": row.serial, "id": row.city.id, "name": row.city.name }))
        .collect();
    print_json(&json!({
        "page": view.table.page + 1,
        "pages": view.table.page_count(total),
        "total": total,
        "rows": rows,
    }))
}

/// Success notices go to stderr; anything else fails the command.
fn report(notice: &Notice) -> Result<(), CliError> {
    if matches!(notice.severity, Severity::Error | Severity::Warning) {
        return Err(CliError::Rejected(notice.message.clone()));
    }
    eprintln!("{notice}");
    Ok(())
}

fn print_json(value: &Value) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
