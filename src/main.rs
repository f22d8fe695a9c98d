use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::sync::Arc;
use tracing::info;

use xwatch::config::Config;
use xwatch::db::{self, Database};
use xwatch::output::message::format_subscription_list;
use xwatch::output::terminal;
use xwatch::sink::{console, webhook, SinkRegistry};
use xwatch::subscriptions::{self, Requester};
use xwatch::timeline::client::HttpTimelineClient;
use xwatch::timeline::{SharedTimeline, TimelineSource};
use xwatch::watch::{scheduler, Dispatcher, Poller};

/// xwatch: forward new posts from watched accounts to chat channels.
///
/// Polls each watched account's recent posts on a timer, picks out the ones
/// newer than the last seen, and sends them to every channel that asked.
#[derive(Parser)]
#[command(name = "xwatch", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Watch an account in a channel (or update an existing watch)
    Watch {
        /// Account handle, with or without the leading @
        handle: String,

        /// Only forward posts matching this case-insensitive regex
        filter: Option<String>,

        /// Chat platform the channel lives on (console, webhook)
        #[arg(long, default_value = console::PLATFORM)]
        platform: String,

        /// Channel to deliver to
        #[arg(long)]
        channel: String,

        /// Bot identity that delivers to the channel
        #[arg(long, default_value = "default")]
        bot: String,

        /// Who asked for the subscription
        #[arg(long, default_value = "cli")]
        user: String,
    },

    /// Stop watching an account in a channel
    Unwatch {
        handle: String,

        #[arg(long, default_value = console::PLATFORM)]
        platform: String,

        #[arg(long)]
        channel: String,
    },

    /// List the accounts watched in a channel
    List {
        #[arg(long, default_value = console::PLATFORM)]
        platform: String,

        #[arg(long)]
        channel: String,

        /// Print the markdown table a chat channel would receive
        #[arg(long)]
        markdown: bool,
    },

    /// Run a single poll cycle now
    Poll,

    /// Poll on the configured interval until interrupted
    Run,

    /// Show system status (subscriptions, last poll cycle)
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if missing)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("xwatch=info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init => {
            info!("Initializing xwatch database...");
            let config = Config::load()?;
            let db = db::initialize_sqlite(&config.db_path)?;
            let table_count = db.table_count().await?;
            println!("Database initialized at: {}", config.db_path);
            println!("Tables created: {table_count}");
            println!("\nxwatch is ready. Set XWATCH_AUTH_KEY in your .env file,");
            println!("then run: xwatch watch <handle> --channel <name>");
        }

        Commands::Watch {
            handle,
            filter,
            platform,
            channel,
            bot,
            user,
        } => {
            let config = Config::load()?;
            config.require_credential()?;
            let db = db::open_sqlite(&config.db_path)?;
            let timeline = shared_timeline(&config);

            let requester = Requester {
                platform,
                channel_id: channel,
                user_id: user,
                bot_id: bot,
            };
            let outcome =
                subscriptions::watch(db.as_ref(), &timeline, &handle, filter.as_deref(), &requester)
                    .await?;
            terminal::display_watch_outcome(&outcome);
        }

        Commands::Unwatch {
            handle,
            platform,
            channel,
        } => {
            let config = Config::load()?;
            let db = db::open_sqlite(&config.db_path)?;
            let timeline = shared_timeline(&config);

            let outcome =
                subscriptions::unwatch(db.as_ref(), &timeline, &handle, &platform, &channel)
                    .await?;
            terminal::display_unwatch_outcome(&outcome_handle(&handle), &outcome);
        }

        Commands::List {
            platform,
            channel,
            markdown,
        } => {
            let config = Config::load()?;
            let db = db::open_sqlite(&config.db_path)?;
            let subs = subscriptions::list(db.as_ref(), &platform, &channel).await?;
            if markdown {
                println!("{}", format_subscription_list(&subs));
            } else {
                terminal::display_subscriptions(&platform, &channel, &subs);
            }
        }

        Commands::Poll => {
            let config = Config::load()?;
            config.require_credential()?;
            let poller = build_poller(&config)?;
            match scheduler::run_and_record(&poller).await {
                Some(outcome) => terminal::display_cycle_outcome(&outcome),
                None => anyhow::bail!("Poll cycle failed; see the log above"),
            }
        }

        Commands::Run => {
            let config = Config::load()?;
            config.require_credential()?;
            let poller = Arc::new(build_poller(&config)?);

            println!(
                "{}",
                format!(
                    "Polling every {} minute(s). Press Ctrl-C to stop.",
                    config.interval_minutes
                )
                .bold()
            );
            scheduler::run(poller, config.interval(), async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!(error = %e, "Failed to listen for Ctrl-C");
                    std::future::pending::<()>().await;
                }
            })
            .await?;
        }

        Commands::Status => {
            let config = Config::load()?;
            if !xwatch::status::is_initialized(&config.db_path) {
                println!("Database: not initialized");
                println!("\nRun `xwatch init` to set up the database.");
                return Ok(());
            }
            let db = db::open_sqlite(&config.db_path)?;
            xwatch::status::show(&db, &config.db_path).await?;
        }
    }

    Ok(())
}

/// A lazily-built HTTP client shared by everything in this process.
fn shared_timeline(config: &Config) -> Arc<SharedTimeline> {
    let api_url = config.api_url.clone();
    let auth_key = config.auth_key.clone();
    Arc::new(SharedTimeline::new(move || {
        let client = HttpTimelineClient::new(&api_url, &auth_key)?;
        Ok(Arc::new(client) as Arc<dyn TimelineSource>)
    }))
}

fn build_sinks(config: &Config) -> Result<SinkRegistry> {
    let mut sinks = SinkRegistry::new();
    sinks.register(console::PLATFORM, Arc::new(console::ConsoleSink));
    if let Some(url) = &config.webhook_url {
        sinks.register(webhook::PLATFORM, Arc::new(webhook::WebhookSink::new(url)?));
    }
    info!(platforms = ?sinks.platforms(), "Message sinks ready");
    Ok(sinks)
}

fn build_poller(config: &Config) -> Result<Poller> {
    let db: Arc<dyn Database> = db::open_sqlite(&config.db_path)?;
    let dispatcher = Dispatcher::new(
        build_sinks(config)?,
        config.send_delay,
        config.render_options(),
    );
    Ok(Poller::new(
        db,
        shared_timeline(config),
        dispatcher,
        config.poll_settings(),
    ))
}

fn outcome_handle(raw: &str) -> String {
    subscriptions::normalize_handle(raw).unwrap_or_else(|_| raw.trim().to_string())
}
