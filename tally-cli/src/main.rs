use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::io::{self, Write};
use tally_client::{
    auth, Dashboard, DashboardEvent, ExpenseApi, FetchOutcome, Gateway, Registration, Session,
};
use tally_core::{today_in, Category, CategoryFilter, QueryFilter};
use tracing::warn;
use tracing_subscriber::{fmt, EnvFilter};

mod config;
mod render;
mod state;

use config::Config;

const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("TALLY_BUILD_SHA"), ")");

#[derive(Parser, Debug)]
#[command(name = "tally", version = VERSION, about = "Expense tracker client")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create an account (does not sign in)
    Register {
        #[arg(long)]
        username: String,

        #[arg(long)]
        email: String,

        /// Prompted for when omitted
        #[arg(long)]
        password: Option<String>,
    },

    /// Sign in and store tokens in ~/.tally/session.json
    Login {
        #[arg(long)]
        username: String,

        /// Prompted for when omitted
        #[arg(long)]
        password: Option<String>,
    },

    /// Blacklist the refresh token and forget the local session
    Logout,

    /// Show the signed-in user
    Whoami,

    /// List expenses for a date range (default: this month so far)
    List {
        /// Start date, YYYY-MM-DD
        #[arg(long)]
        from: Option<NaiveDate>,

        /// End date, YYYY-MM-DD
        #[arg(long)]
        to: Option<NaiveDate>,

        /// Food, Bills, Fuel, Entertainment, Other or All
        #[arg(long, default_value = "All")]
        category: CategoryFilter,

        #[arg(long, default_value_t = 1)]
        page: u32,

        /// Also draw the all-time category chart
        #[arg(long, default_value_t = false)]
        chart: bool,
    },

    /// All-time spending by category
    Summary,

    /// Record a new expense
    Add {
        #[arg(long)]
        description: String,

        /// e.g. 12.5 (sent as 12.50)
        #[arg(long)]
        amount: String,

        #[arg(long, default_value = "Food")]
        category: Category,

        /// Defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Config file helpers
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Write ~/.tally/config.toml with defaults
    Init,
    /// Print the effective config
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Register {
            username,
            email,
            password,
        } => {
            let cfg = config::load_config()?;
            let password = password_or_prompt(password)?;
            let gateway = Gateway::new(&cfg.api.base_url);
            let registration = Registration {
                username,
                email,
                password,
            };
            if let Err(e) = auth::register(&gateway, &registration).await {
                bail!("{e}");
            }
            println!("Account created. Next: tally login --username {}", registration.username);
        }

        Command::Login { username, password } => {
            let cfg = config::load_config()?;
            let password = password_or_prompt(password)?;
            let mut store = state::open_session()?;
            let gateway = Gateway::new(&cfg.api.base_url);
            if let Err(e) = auth::login(&gateway, &mut store, &username, &password).await {
                bail!("{e}");
            }
            println!("Signed in as {username}");
        }

        Command::Logout => {
            let cfg = config::load_config()?;
            match state::open_session() {
                Ok(mut store) => {
                    let gateway = Gateway::for_session(&cfg.api.base_url, store.current());
                    store.logout(&gateway).await?;
                }
                Err(e) => {
                    warn!("discarding unreadable session: {e:#}");
                    state::discard_session()?;
                }
            }
            println!("Signed out");
        }

        Command::Whoami => {
            let store = state::open_session()?;
            match store.current() {
                Some(s) => println!("{}", s.identity.username),
                None => println!("Not signed in"),
            }
        }

        Command::List {
            from,
            to,
            category,
            page,
            chart,
        } => {
            let cfg = config::load_config()?;
            list(&cfg, from, to, category, page, chart).await?;
        }

        Command::Summary => {
            let cfg = config::load_config()?;
            let gateway = signed_in_gateway(&cfg)?;
            let entries = gateway
                .expense_summary()
                .await
                .context("Error fetching data")?
                .into_entries()
                .unwrap_or_default();
            println!("Spending by category\n");
            print!("{}", render::summary_chart(&entries, &cfg.display.currency_prefix));
        }

        Command::Add {
            description,
            amount,
            category,
            date,
        } => {
            let cfg = config::load_config()?;
            add(&cfg, description, amount, category, date).await?;
        }

        Command::Config { command } => match command {
            ConfigCommand::Init => config::init_config()?,
            ConfigCommand::Show => {
                let cfg = config::load_config()?;
                print!("{}", toml::to_string_pretty(&cfg).context("serialize config")?);
            }
        },
    }

    Ok(())
}

fn prompt_secret(label: &str) -> Result<String> {
    print!("{}: ", label);
    io::stdout().flush().ok();
    let mut s = String::new();
    io::stdin().read_line(&mut s)?;
    Ok(s.trim().to_string())
}

fn password_or_prompt(password: Option<String>) -> Result<String> {
    match password {
        Some(p) => Ok(p),
        None => prompt_secret("Password"),
    }
}

/// The stored session. Requests still go out when signed out; the server
/// answers 401.
fn stored_session() -> Result<Option<Session>> {
    let store = state::open_session()?;
    if store.current().is_none() {
        warn!("not signed in; run `tally login --username <name>` first");
    }
    Ok(store.current().cloned())
}

fn signed_in_gateway(cfg: &Config) -> Result<Gateway> {
    Ok(Gateway::for_session(&cfg.api.base_url, stored_session()?.as_ref()))
}

fn open_dashboard(cfg: &Config, today: NaiveDate) -> Result<Dashboard<Gateway>> {
    let session = stored_session()?;
    let mut dash = Dashboard::new(
        Gateway::new(&cfg.api.base_url),
        QueryFilter::month_to_date(today),
        today,
    );
    dash.set_session(session.as_ref());
    Ok(dash)
}

fn today(cfg: &Config) -> Result<NaiveDate> {
    today_in(&cfg.display.timezone).context("display.timezone in config.toml")
}

async fn list(
    cfg: &Config,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    category: CategoryFilter,
    page: u32,
    chart: bool,
) -> Result<()> {
    let today = today(cfg)?;
    let mut dash = open_dashboard(cfg, today)?;
    if let Some(from) = from {
        dash.set_start_date(from);
    }
    if let Some(to) = to {
        dash.set_end_date(to);
    }
    dash.set_category(category);
    // after the filter edits, which would otherwise reset it
    dash.set_page(page)?;
    dash.dispatch(DashboardEvent::Refresh);

    show_dashboard(cfg, &mut dash, chart).await
}

async fn add(
    cfg: &Config,
    description: String,
    amount: String,
    category: Category,
    date: Option<NaiveDate>,
) -> Result<()> {
    let today = today(cfg)?;
    let mut dash = open_dashboard(cfg, today)?;
    {
        let draft = dash.draft_mut();
        draft.description = description;
        draft.amount = amount;
        draft.category = category;
        draft.date = date.unwrap_or(today);
    }

    let submitted = match dash.submit().await {
        Ok(s) => s,
        Err(e) => bail!("{e}"),
    };
    match &submitted.record {
        Some(record) => println!(
            "Added #{} {} ({})",
            record.id,
            record.description,
            render::money(&cfg.display.currency_prefix, record.amount)
        ),
        None => println!("Added (idempotency key {})", submitted.idempotency_key),
    }
    println!();

    show_dashboard(cfg, &mut dash, false).await
}

async fn show_dashboard<A: ExpenseApi>(cfg: &Config, dash: &mut Dashboard<A>, chart: bool) -> Result<()> {
    let prefix = &cfg.display.currency_prefix;

    match dash.run_pending().await {
        Some(FetchOutcome::Loaded) | None => {}
        Some(FetchOutcome::Rejected(e)) => bail!("{e}"),
        Some(FetchOutcome::Failed(msg)) => bail!("Error fetching data: {msg}"),
        Some(outcome @ (FetchOutcome::PageReset | FetchOutcome::Stale)) => {
            bail!("fetch did not settle: {outcome:?}")
        }
    }

    let c = dash.coordinator();
    print!("{}", render::header(c.filter(), c.page(), prefix));
    println!();
    print!("{}", render::expense_table(c.page(), prefix));
    println!("{}", render::pagination(c.filter(), c.page()));

    if chart {
        println!("\nSpending by category (all time)\n");
        print!("{}", render::summary_chart(c.summary(), prefix));
    }
    Ok(())
}
