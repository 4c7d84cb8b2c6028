use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use sports_aggregator::config::{AppConfig, DEFAULT_CONFIG_PATH};
use sports_aggregator::db::{Storage, Store};
use sports_aggregator::feed::{FeedService, NewsFilter};
use sports_aggregator::monitoring::health::{self, HealthState};
use sports_aggregator::monitoring::logger;
use sports_aggregator::polls::models::{NewUser, Side};
use sports_aggregator::polls::PollService;

#[derive(Parser)]
#[command(name = "sports-aggregator", about = "Live sports feed and prediction polls")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the refresh loops and the health endpoint until interrupted.
    Serve,
    /// Print current live and upcoming events.
    Scores {
        #[arg(long)]
        sport: Option<String>,
        #[arg(long, conflicts_with = "sport")]
        team: Option<String>,
    },
    /// Print current news.
    News {
        #[arg(long)]
        sport: Option<String>,
        #[arg(long, conflicts_with = "sport")]
        team: Option<String>,
    },
    /// Print trending topics.
    Trending,
    /// Print predicted winners for upcoming games.
    Previews,
    Teams {
        #[arg(long)]
        league: Option<String>,
    },
    Players {
        #[arg(long)]
        league: Option<String>,
    },
    /// Create or fetch today's polls and print them.
    Polls,
    /// Run one resolution sweep.
    Resolve,
    /// Register a user.
    AddUser {
        #[arg(long)]
        external_id: String,
        #[arg(long)]
        username: String,
        #[arg(long, value_delimiter = ',')]
        teams: Vec<String>,
    },
    /// Submit a prediction ("home" or "away").
    Predict {
        #[arg(long)]
        user: i64,
        #[arg(long)]
        poll: i64,
        #[arg(long)]
        side: Side,
    },
    /// Credit or debit a user's points by hand.
    AdjustPoints {
        #[arg(long)]
        user: i64,
        #[arg(long, allow_hyphen_values = true)]
        delta: i64,
    },
    /// Print a user's prediction history.
    History {
        #[arg(long)]
        user: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let (config, secrets) = AppConfig::load(&cli.config)?;

    logger::init_logging(&config.monitoring)?;

    let feed = Arc::new(FeedService::new(&config, &secrets)?);
    let store: Arc<dyn Storage> = Arc::new(Store::new(&config.database.path).await?);
    let polls = Arc::new(PollService::new(store.clone(), feed.clone(), config.polls.clone()));

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, feed, polls).await,
        Command::Scores { sport, team } => match team {
            Some(team) => print_json(&feed.fetch_team_events(&team).await),
            None => print_json(&feed.fetch_live_events(sport.as_deref()).await),
        },
        Command::News { sport, team } => {
            let filter = match (sport, team) {
                (Some(sport), _) => NewsFilter::Sport(sport),
                (None, Some(team)) => NewsFilter::Team(team),
                (None, None) => NewsFilter::All,
            };
            print_json(&feed.fetch_news(&filter).await)
        }
        Command::Trending => print_json(&feed.trending_topics().await),
        Command::Previews => print_json(&feed.game_previews().await),
        Command::Teams { league } => print_json(&feed.fetch_teams(league.as_deref()).await),
        Command::Players { league } => print_json(&feed.fetch_players(league.as_deref()).await),
        Command::Polls => print_json(&polls.create_or_get_daily_polls().await?),
        Command::Resolve => print_json(&polls.resolve_pending_polls().await?),
        Command::AddUser {
            external_id,
            username,
            teams,
        } => {
            let user = store
                .create_user(&NewUser {
                    external_id,
                    username,
                    favorite_teams: teams,
                    favorite_players: Vec::new(),
                })
                .await?;
            print_json(&user)
        }
        Command::Predict { user, poll, side } => {
            let prediction = polls.submit_prediction(user, poll, side).await?;
            print_json(&prediction)
        }
        Command::AdjustPoints { user, delta } => match store.add_points(user, delta).await? {
            Some(updated) => {
                info!(user_id = user, delta, points = updated.points, "Points adjusted");
                print_json(&updated)
            }
            None => anyhow::bail!("user {user} not found"),
        },
        Command::History { user } => print_json(&polls.user_predictions(user).await?),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).context("Failed to render output")?);
    Ok(())
}

/// Three independent refresh loops plus the health endpoint.
async fn serve(config: AppConfig, feed: Arc<FeedService>, polls: Arc<PollService>) -> Result<()> {
    info!(
        scores_interval_s = config.service.scores_interval_seconds,
        news_interval_s = config.service.news_interval_seconds,
        polls_interval_s = config.service.polls_interval_seconds,
        "Sports aggregator starting"
    );

    let health_state = HealthState::new();
    let health_handle =
        match health::spawn_health_server(health_state.clone(), &config.service.health_bind, config.service.health_port)
            .await
        {
            Ok((_, handle)) => Some(handle),
            Err(e) => {
                warn!(error = %e, "Health server unavailable, continuing without it");
                None
            }
        };

    let mut loops: Vec<JoinHandle<()>> = Vec::new();

    {
        let feed = feed.clone();
        let health = health_state.clone();
        loops.push(spawn_loop("scores", config.service.scores_interval_seconds, move || {
            let feed = feed.clone();
            let health = health.clone();
            async move {
                let outcome = feed.live_events(None).await;
                health
                    .record_run("scores", outcome.records.len(), Some(outcome.stage.as_str()))
                    .await;
            }
        }));
    }

    {
        let feed = feed.clone();
        let health = health_state.clone();
        loops.push(spawn_loop("news", config.service.news_interval_seconds, move || {
            let feed = feed.clone();
            let health = health.clone();
            async move {
                let outcome = feed.news(&NewsFilter::All).await;
                health
                    .record_run("news", outcome.records.len(), Some(outcome.stage.as_str()))
                    .await;
            }
        }));
    }

    {
        let health = health_state.clone();
        loops.push(spawn_loop("polls", config.service.polls_interval_seconds, move || {
            let polls = polls.clone();
            let health = health.clone();
            async move {
                let cycle = async {
                    polls.create_or_get_daily_polls().await?;
                    polls.resolve_pending_polls().await
                };
                match cycle.await {
                    Ok(summary) => health.record_run("polls", summary.checked, None).await,
                    Err(e) => {
                        error!(error = %e, "Poll cycle failed");
                        health.record_failure("polls", &e).await;
                    }
                }
            }
        }));
    }

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutdown requested");

    for handle in loops {
        handle.abort();
    }
    if let Some(handle) = health_handle {
        handle.abort();
    }

    Ok(())
}

/// Run `tick` every `interval_seconds`; a slow tick delays only its own loop.
fn spawn_loop<F, Fut>(name: &'static str, interval_seconds: u64, mut tick: F) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_seconds.max(1)));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let started = std::time::Instant::now();
            tick().await;
            info!(loop_name = name, duration_ms = started.elapsed().as_millis() as u64, "Refresh cycle done");
        }
    })
}
