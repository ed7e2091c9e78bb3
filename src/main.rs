mod assist;
mod config;
mod context;
mod error;
mod event;
mod handler;
mod helper;
mod heuristic;
mod llm;
mod logging;
mod persistent_state;
mod plugin;
mod profile;
mod questions;
mod scoring;
mod session;
mod volatile_state;
mod web;

use anyhow::anyhow;
use context::Shared;
use serenity::all::{CreateMessage, GatewayIntents, Http};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// Escalating delays between gateway reconnect attempts.  Once the
/// schedule is exhausted the process exits so a supervisor can restart it.
const RECONNECT_SCHEDULE_SECONDS: &[u64] = &[20, 60, 120, 300];

const SWEEP_INTERVAL: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = crate::config::Config::load().await?;

    if cfg.general.startup_delay_seconds > 0 {
        log_internal!(
            "Waiting {}s before connecting",
            cfg.general.startup_delay_seconds
        );
        tokio::time::sleep(Duration::from_secs(cfg.general.startup_delay_seconds)).await;
    }

    // A bad question file is fatal at startup; verification cannot run
    // without a validated bank.
    let questions = crate::questions::QuestionBank::load(&cfg.questions_path()?).await?;
    let pstate = crate::persistent_state::PersistentState::load_or_default(&cfg.state_path()?).await;
    let scoring = crate::scoring::ScoringContext::new(
        cfg.verification.cache_capacity,
        cfg.ai.daily_call_limit,
    );

    let token = cfg.general.discord_token.clone();
    let web_port = cfg.web.port;
    let shared = Arc::new(Shared {
        cfg: RwLock::new(cfg),
        pstate: RwLock::new(pstate),
        vstate: RwLock::new(crate::volatile_state::VolatileState::new(questions)),
        scoring: RwLock::new(scoring),
    });

    // Things we want discord to tell us about.
    let intents = GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::DIRECT_MESSAGE_REACTIONS
        | GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MEMBERS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::GUILD_MESSAGE_REACTIONS
        | GatewayIntents::MESSAGE_CONTENT;

    let mut client = serenity::Client::builder(&token, intents)
        .event_handler(handler::Handler::new(shared.clone()))
        .await?;

    {
        let shared = shared.clone();
        tokio::spawn(async move {
            if let Err(e) = web::serve(shared, web_port).await {
                log_warn!("Web server error: {}", e);
            }
        });
    }
    tokio::spawn(session_sweeper(shared.clone(), client.http.clone()));

    // The gateway start is retried on an escalating schedule; rate-limited
    // connects usually clear within a few minutes.
    let mut attempt = 0;
    loop {
        match client.start().await {
            Ok(()) => return Ok(()),
            Err(e) => {
                if attempt >= RECONNECT_SCHEDULE_SECONDS.len() {
                    return Err(anyhow!(
                        "Giving up after {} failed gateway connection attempts: {}",
                        attempt + 1,
                        e
                    ));
                }
                let delay = RECONNECT_SCHEDULE_SECONDS[attempt];
                attempt += 1;
                log_warn!("Gateway connection failed ({}), retrying in {}s", e, delay);
                tokio::time::sleep(Duration::from_secs(delay)).await;
            }
        }
    }
}

/// Abandons sessions whose answer deadline has passed and notifies the
/// member and the admins.  An AI call already in flight for a session is
/// unaffected; it completes and populates the cache.
async fn session_sweeper(shared: Arc<Shared>, http: Arc<Http>) {
    let mut interval = tokio::time::interval(SWEEP_INTERVAL);
    loop {
        interval.tick().await;

        let expired = shared
            .vstate
            .write()
            .await
            .sessions
            .expire_due(Instant::now());
        if expired.is_empty() {
            continue;
        }

        let admin_channel = shared.pstate.read().await.guild.admin_channel_id;
        for (user_id, username) in expired {
            log_event!("Verification timed out for {}", username);

            if let Ok(user) = user_id.to_user(&http).await {
                let _ = user
                    .dm(
                        &http,
                        CreateMessage::new().content(
                            "Your verification timed out. 🙏 When you are ready, use the \
                             `verify` command in the server to try again.",
                        ),
                    )
                    .await;
            }
            if let Some(channel) = admin_channel {
                let _ = channel
                    .say(
                        &http,
                        format!(
                            "⏰ Verification for **{}** timed out; no role assigned. \
                             They can restart with the verify command.",
                            username
                        ),
                    )
                    .await;
            }
        }
    }
}
