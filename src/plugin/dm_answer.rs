use crate::{
    event::*,
    heuristic::AnswerSet,
    llm::{AiClient, Refine},
    log_event, log_warn,
    persistent_state::GuildConfig,
    plugin::member_join::{question_text, question_timeout},
    plugin::*,
    profile::SuspicionResult,
    scoring::{self, FinalScore, RoleDecision, ScoreStage},
};
use anyhow::Result;
use serenity::all::{GuildId, Mentionable, Message};
use tokio::time::Instant;

/// Advances a verification session when its member answers in DM, and
/// runs the scoring pipeline once the last answer arrives.
pub struct DmAnswer;

enum Advance {
    NextQuestion(String),
    Score {
        answers: AnswerSet,
        suspicion: SuspicionResult,
        username: String,
    },
}

#[serenity::async_trait]
impl Plugin for DmAnswer {
    fn name(&self) -> &'static str {
        "dm_answer"
    }

    async fn usage(&self, _ctx: &Context) -> Option<String> {
        None
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        let Event::Message(msg) = event else {
            return Ok(EventHandled::No);
        };
        if msg.author.bot || msg.guild_id.is_some() {
            return Ok(EventHandled::No);
        }

        let timeout = question_timeout(ctx).await;
        let advance = {
            let mut vstate = ctx.vstate.write().await;
            let Some(session) = vstate.sessions.get_mut(msg.author.id) else {
                return Ok(EventHandled::No);
            };
            if !session.is_awaiting_answer() {
                return Ok(EventHandled::No);
            }
            let total = session.total_questions();
            match session.record_answer(&msg.content, Instant::now(), timeout) {
                Some(crate::session::SessionAdvance::NextQuestion { number, question }) => {
                    log_event!(
                        "{} answered question {}/{}",
                        session.username,
                        number - 1,
                        total,
                    );
                    Advance::NextQuestion(question_text(number, total, &question))
                }
                Some(crate::session::SessionAdvance::ReadyToScore) => {
                    log_event!("{} answered the final question, scoring", session.username);
                    Advance::Score {
                        answers: session.answers().clone(),
                        suspicion: session.suspicion.clone(),
                        username: session.username.clone(),
                    }
                }
                None => return Ok(EventHandled::No),
            }
        };

        match advance {
            Advance::NextQuestion(text) => {
                msg.channel_id.say(ctx.cache_http, text).await?;
            }
            Advance::Score {
                answers,
                suspicion,
                username,
            } => {
                finish_session(ctx, msg, answers, suspicion, username).await?;
            }
        }

        Ok(EventHandled::Yes)
    }
}

async fn finish_session(
    ctx: &Context<'_>,
    msg: &Message,
    answers: AnswerSet,
    suspicion: SuspicionResult,
    username: String,
) -> Result<()> {
    // The volatile-state lock is not held anywhere across this call;
    // the orchestrator manages the scoring context itself.
    let (band, ai_client) = {
        let cfg = ctx.cfg.read().await;
        (cfg.threshold_band(), AiClient::from_config(&cfg.ai))
    };
    let refiner = ai_client.as_ref().map(|client| client as &dyn Refine);
    let result = scoring::score_verification(&answers, &suspicion, band, ctx.scoring, refiner).await;
    let role = RoleDecision::from_score(result.score);

    log_event!(
        "{} scored {}/10 ({}) -> {}",
        username,
        result.score,
        match result.stage {
            ScoreStage::Heuristic => "heuristic",
            ScoreStage::AiRefined => "AI refined",
        },
        role,
    );

    {
        let mut vstate = ctx.vstate.write().await;
        if let Some(session) = vstate.sessions.get_mut(msg.author.id) {
            session.complete(role);
        }
        vstate.sessions.note_completed();
    }

    let guild = ctx.pstate.read().await.guild.clone();
    let server_id = ctx.cfg.read().await.general.server_id;

    assign_role(ctx, msg, role, &guild, server_id).await;
    msg.channel_id.say(ctx.cache_http, thank_you_text(role)).await?;
    announce(ctx, msg, role, &result, &guild, &username, &answers).await?;

    Ok(())
}

async fn assign_role(
    ctx: &Context<'_>,
    msg: &Message,
    role: RoleDecision,
    guild: &GuildConfig,
    server_id: u64,
) {
    let role_id = match role {
        RoleDecision::Devotee => guild.devotee_role_id,
        RoleDecision::Seeker => guild.seeker_role_id,
        RoleDecision::None => None,
    };
    let Some(role_id) = role_id else {
        return;
    };

    let guild_id = GuildId::new(server_id);
    let member = match guild_id.member(ctx.cache_http, msg.author.id).await {
        Ok(member) => member,
        Err(e) => {
            log_warn!("Could not fetch member for role assignment: {}", e);
            return;
        }
    };
    if let Err(e) = member.add_role(ctx.http, role_id).await {
        log_warn!("Could not assign role to {}: {}", member.user.name, e);
        return;
    }

    // Verified members get a welcome in the community channel.
    if let Some(channel) = guild.welcome_channel_id {
        let _ = channel
            .say(
                ctx.cache_http,
                format!(
                    "Hare Krishna, welcome {}! May your journey here be enriched with \
                     devotee association. 🌸",
                    member.mention()
                ),
            )
            .await;
    }
}

async fn announce(
    ctx: &Context<'_>,
    msg: &Message,
    role: RoleDecision,
    result: &FinalScore,
    guild: &GuildConfig,
    username: &str,
    answers: &AnswerSet,
) -> Result<()> {
    if let Some(channel) = guild.verification_channel_id {
        let text = match role {
            RoleDecision::Devotee => format!(
                "✅ {} has been welcomed as a **Devotee**! 🌸",
                msg.author.mention()
            ),
            RoleDecision::Seeker => format!(
                "🌱 {} has joined as a **Seeker**. Welcome to the community!",
                msg.author.mention()
            ),
            RoleDecision::None => format!(
                "📋 {} has completed verification and is awaiting moderator review.",
                msg.author.mention()
            ),
        };
        channel.say(ctx.cache_http, text).await?;
    }

    if let Some(log_channel) = guild.log_channel_id {
        let _ = log_channel
            .say(
                ctx.cache_http,
                format!(
                    "Verification completed: {} scored {}/10 -> {}",
                    username, result.score, role
                ),
            )
            .await;
    }

    let Some(admin) = guild.admin_channel_id else {
        return Ok(());
    };
    let mut report = format!(
        "📊 Verification result for **{}**\nScore: {}/10 ({}, heuristic was {}) -> {}\n",
        username,
        result.score,
        match result.stage {
            ScoreStage::Heuristic => "heuristic only",
            ScoreStage::AiRefined => "AI refined",
        },
        match result.confidence {
            crate::heuristic::Confidence::Clear => "clear",
            crate::heuristic::Confidence::Borderline => "borderline",
        },
        role,
    );
    if !result.reasons.is_empty() {
        report.push_str(&format!("Signals: {}\n", result.reasons.join("; ")));
    }
    for (i, answer) in answers.answers().iter().enumerate() {
        report.push_str(&format!(
            "Q{}: {}\nA{}: {}\n",
            i + 1,
            truncate(&answer.question, 100),
            i + 1,
            truncate(&answer.text, 200),
        ));
    }
    admin.say(ctx.cache_http, truncate(&report, 1900)).await?;
    Ok(())
}

fn thank_you_text(role: RoleDecision) -> String {
    match role {
        RoleDecision::Devotee => "Thank you for sharing your journey! 🙏 You have been \
            welcomed as a **Devotee**. Feel free to explore all channels, and may Krishna's \
            blessings be with you."
            .to_string(),
        RoleDecision::Seeker => "Thank you for your sincere answers! 🌱 You have been \
            welcomed as a **Seeker**. Explore our beginner-friendly channels and ask \
            anything; every sincere seeker is welcome here."
            .to_string(),
        RoleDecision::None => "Thank you for completing the questions! 🙏 Our moderators \
            will review your verification and reach out soon. We appreciate your patience."
            .to_string(),
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max).collect();
        format!("{cut}…")
    }
}
