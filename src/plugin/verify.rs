use crate::helper::{parse_user_mention, MessageHelper};
use crate::plugin::member_join::start_verification;
use crate::{event::*, plugin::*};
use anyhow::Result;
use serenity::all::{GuildId, Message, UserId};

/// Manual verification triggers: the `verify` command for members whose
/// flow failed, `verifyfor` for admins, and the 🔄 reaction restart.
pub struct Verify;

#[serenity::async_trait]
impl Plugin for Verify {
    fn name(&self) -> &'static str {
        "verify"
    }

    async fn usage(&self, ctx: &Context) -> Option<String> {
        let prefix = &ctx.cfg.read().await.general.command_prefix;
        Some(format!(
            "{prefix}verify - restart your own verification\n\
             {prefix}verifyfor @user - restart verification for a user (admin only)"
        ))
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        if let Event::ReactionAdd(reaction) = event {
            if reaction.emoji.unicode_eq("🔄") {
                if let Some(user_id) = reaction.user_id {
                    return restart_reaction(ctx, user_id).await;
                }
            }
            return Ok(EventHandled::No);
        }

        if let Some((msg, _)) = event.is_bot_cmd(ctx, "verify").await {
            return verify_self(ctx, msg).await;
        }

        if let Some((msg, args)) = event.is_bot_cmd(ctx, "verifyfor").await {
            return verify_for(ctx, msg, &args).await;
        }

        Ok(EventHandled::No)
    }
}

async fn target_guild(ctx: &Context<'_>) -> GuildId {
    GuildId::new(ctx.cfg.read().await.general.server_id)
}

/// Whether the user may (re)start a verification session right now.
async fn can_restart(ctx: &Context<'_>, user_id: UserId) -> bool {
    let vstate = ctx.vstate.read().await;
    match vstate.sessions.get(user_id) {
        Some(session) => session.restartable(),
        None => true,
    }
}

async fn restart_for(ctx: &Context<'_>, user_id: UserId) -> Result<()> {
    let guild_id = target_guild(ctx).await;
    let member = guild_id.member(ctx.cache_http, user_id).await?;
    let _ = ctx.vstate.write().await.sessions.remove(user_id);
    start_verification(ctx, &member).await
}

async fn verify_self(ctx: &Context<'_>, msg: &Message) -> Result<EventHandled> {
    let server_id = ctx.cfg.read().await.general.server_id;
    if msg.guild_id.map(|id| id.get()) != Some(server_id) {
        return Ok(EventHandled::No);
    }

    if !can_restart(ctx, msg.author.id).await {
        msg.reply(
            ctx.cache_http,
            "Your verification is already in progress; check your DMs. 🙏",
        )
        .await?;
        return Ok(EventHandled::Yes);
    }

    restart_for(ctx, msg.author.id).await?;
    msg.reply(ctx.cache_http, "Verification started, check your DMs! 🙏")
        .await?;
    Ok(EventHandled::Yes)
}

async fn verify_for(ctx: &Context<'_>, msg: &Message, args: &[&str]) -> Result<EventHandled> {
    if !msg.is_from_admin(ctx).await {
        msg.reply(
            ctx.cache_http,
            "Only administrators can restart verification for another member.",
        )
        .await?;
        return Ok(EventHandled::Yes);
    }

    let Some(target) = args.first().and_then(|a| parse_user_mention(a)) else {
        msg.reply(ctx.cache_http, "Usage: verifyfor @user").await?;
        return Ok(EventHandled::Yes);
    };

    restart_for(ctx, target).await?;
    msg.reply(ctx.cache_http, format!("Verification restarted for <@{target}>."))
        .await?;
    Ok(EventHandled::Yes)
}

/// A member whose session was abandoned or rejected can react with 🔄 to
/// try again.
async fn restart_reaction(ctx: &Context<'_>, user_id: UserId) -> Result<EventHandled> {
    if !can_restart(ctx, user_id).await {
        return Ok(EventHandled::No);
    }
    // Only restart for users who actually have a finished session.
    if ctx.vstate.read().await.sessions.get(user_id).is_none() {
        return Ok(EventHandled::No);
    }

    let guild_id = target_guild(ctx).await;
    let member = guild_id.member(ctx.cache_http, user_id).await?;
    if member.user.bot {
        return Ok(EventHandled::No);
    }
    let _ = ctx.vstate.write().await.sessions.remove(user_id);
    start_verification(ctx, &member).await?;
    Ok(EventHandled::Yes)
}
