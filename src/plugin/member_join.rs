use crate::{
    event::*,
    helper::UserHelper,
    log_event, log_warn,
    plugin::*,
    profile::{self, ProfileSnapshot},
    questions::{QuestionTemplate, Tier},
    session::VerificationSession,
};
use anyhow::Result;
use chrono::Utc;
use serenity::all::{Member, Mentionable};
use std::time::Duration;
use tokio::time::Instant;

/// Starts the DM verification flow when a member joins the target guild.
pub struct MemberJoin;

#[serenity::async_trait]
impl Plugin for MemberJoin {
    fn name(&self) -> &'static str {
        "member_join"
    }

    async fn usage(&self, _ctx: &Context) -> Option<String> {
        None
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        let Event::MemberJoin(member) = event else {
            return Ok(EventHandled::No);
        };

        if member.user.bot {
            return Ok(EventHandled::No);
        }
        if member.guild_id.get() != ctx.cfg.read().await.general.server_id {
            return Ok(EventHandled::No);
        }

        start_verification(ctx, member).await?;
        Ok(EventHandled::Yes)
    }
}

/// Kick off (or restart) verification for a member.  Shared with the
/// manual `verify` command.
pub(crate) async fn start_verification(ctx: &Context<'_>, member: &Member) -> Result<()> {
    let guild = ctx.pstate.read().await.guild.clone();
    if !guild.is_configured() {
        log_warn!(
            "Not configured yet, skipping verification for {}; run the setup command first",
            member.user.name
        );
        return Ok(());
    }

    // Profile pass: how much do we trust this account on sight?
    let snapshot = ProfileSnapshot::from_member(member);
    let suspicion = profile::score_profile(&snapshot, Utc::now());
    let tier = Tier::from_suspicion(suspicion.score);
    log_event!(
        "{} joined, suspicion {}/4, {} tier questions",
        member.user.name,
        suspicion.score,
        tier,
    );

    // Pick questions out of the current pool snapshot.  The session
    // keeps its picks even if the bank is reloaded mid-flight.
    let picked = {
        let pools = ctx.vstate.read().await.questions.snapshot();
        let mut rng = rand::thread_rng();
        pools.select(tier, &mut rng)?
    };

    {
        let mut pstate = ctx.pstate.write().await;
        for question in &picked {
            pstate.question_usage.record(&question.id);
        }
    }
    persist_state(ctx).await;

    let timeout = question_timeout(ctx).await;
    let mut session = VerificationSession::new(
        member.user.id,
        member.user.name.clone(),
        suspicion.clone(),
        picked,
    );
    let first = session.begin(Instant::now(), timeout).cloned();
    let total = session.total_questions();
    ctx.vstate.write().await.sessions.insert(session);

    // DM the welcome and the first question.
    let guild_name = ctx
        .cache
        .guild(member.guild_id)
        .map(|g| g.name.clone())
        .unwrap_or_else(|| "the community".to_string());
    let welcome = welcome_text(&guild_name, total, timeout);
    let dm_result = match first {
        Some(question) => {
            let first_question = question_text(1, total, &question);
            match member.user.dm_text(ctx, &welcome).await {
                Ok(()) => member.user.dm_text(ctx, &first_question).await,
                Err(e) => Err(e),
            }
        }
        None => Ok(()),
    };

    if let Err(e) = dm_result {
        log_warn!("Could not DM {}: {}", member.user.name, e);
        ctx.vstate.write().await.sessions.abandon(member.user.id);

        // Point the member at the fallback channel instead.
        let fallback = guild
            .dm_questions_channel_id
            .or(guild.verification_channel_id);
        if let Some(channel) = fallback {
            channel
                .say(
                    ctx.cache_http,
                    format!(
                        "{}, please enable direct messages from server members and try the \
                         `verify` command to complete verification.",
                        member.mention()
                    ),
                )
                .await?;
        }
        if let Some(admin) = guild.admin_channel_id {
            admin
                .say(
                    ctx.cache_http,
                    format!(
                        "⚠️ Could not DM {} for verification; fallback instructions posted.",
                        member.user.name
                    ),
                )
                .await?;
        }
        return Ok(());
    }

    // Public announcement plus a detailed breakdown for admins.
    if let Some(channel) = guild.verification_channel_id {
        channel
            .say(
                ctx.cache_http,
                format!(
                    "📩 {} has joined and verification questions were sent to their DMs.",
                    member.mention()
                ),
            )
            .await?;
    }
    if let Some(admin) = guild.admin_channel_id {
        let mut detail = format!(
            "🔍 Verification started for **{}**\nSuspicion: {}/4 ({} tier questions)\n",
            member.user.name, suspicion.score, tier
        );
        for reason in &suspicion.reasons {
            detail.push_str(&format!("- {}\n", reason));
        }
        admin.say(ctx.cache_http, detail).await?;
    }

    Ok(())
}

pub(crate) async fn question_timeout(ctx: &Context<'_>) -> Duration {
    Duration::from_secs(ctx.cfg.read().await.verification.question_timeout_seconds)
}

/// Best-effort save of the persistent state; a dead store only warns.
pub(crate) async fn persist_state(ctx: &Context<'_>) {
    let path = match ctx.cfg.read().await.state_path() {
        Ok(path) => path,
        Err(e) => {
            log_warn!("Could not resolve state path: {}", e);
            return;
        }
    };
    let pstate = ctx.pstate.read().await;
    if let Err(e) = pstate.save(&path).await {
        log_warn!("Could not persist state: {}", e);
    }
}

fn welcome_text(guild_name: &str, total: usize, timeout: Duration) -> String {
    format!(
        "Hare Krishna, and welcome to **{guild_name}**! 🙏\n\
         To join the community we would love to know a bit about you. I will ask \
         {total} short questions about your spiritual journey. Just type naturally; \
         we care about your heart, not perfect writing. Please answer each question \
         within {} minutes.",
        timeout.as_secs() / 60
    )
}

pub(crate) fn question_text(number: usize, total: usize, question: &QuestionTemplate) -> String {
    format!(
        "**Question {number} of {total}:** {}\n\nType your answer below and send it.",
        question.question
    )
}
