//! Miscellaneous convenience methods

use crate::context::Context;
use anyhow::Result;
use serenity::all::{ChannelId, CreateMessage, RoleId, UserId};

#[serenity::async_trait]
pub trait MessageHelper {
    async fn is_from_admin(&self, ctx: &Context) -> bool;
}

#[serenity::async_trait]
impl MessageHelper for serenity::all::Message {
    /// Whether the author holds the Administrator permission in the
    /// guild the message was sent in.  DMs are never admin context.
    async fn is_from_admin(&self, ctx: &Context) -> bool {
        let Some(guild_id) = self.guild_id else {
            return false;
        };
        let Ok(member) = guild_id.member(ctx.cache_http, self.author.id).await else {
            return false;
        };
        let Some(guild) = guild_id.to_guild_cached(ctx.cache) else {
            return false;
        };
        guild.member_permissions(&member).administrator()
    }
}

#[serenity::async_trait]
pub trait UserHelper {
    async fn dm_text(&self, ctx: &Context, text: &str) -> Result<()>;
}

#[serenity::async_trait]
impl UserHelper for serenity::all::User {
    async fn dm_text(&self, ctx: &Context, text: &str) -> Result<()> {
        self.dm(ctx.cache_http, CreateMessage::new().content(text))
            .await?;
        Ok(())
    }
}

/// Parse a `<@&123>` role mention token.
pub fn parse_role_mention(token: &str) -> Option<RoleId> {
    let id = token.strip_prefix("<@&")?.strip_suffix('>')?;
    id.parse::<u64>().ok().filter(|id| *id != 0).map(RoleId::new)
}

/// Parse a `<#123>` channel mention token.
pub fn parse_channel_mention(token: &str) -> Option<ChannelId> {
    let id = token.strip_prefix("<#")?.strip_suffix('>')?;
    id.parse::<u64>()
        .ok()
        .filter(|id| *id != 0)
        .map(ChannelId::new)
}

/// Parse a `<@123>` or `<@!123>` user mention token.
pub fn parse_user_mention(token: &str) -> Option<UserId> {
    let id = token
        .strip_prefix("<@!")
        .or_else(|| token.strip_prefix("<@"))?
        .strip_suffix('>')?;
    id.parse::<u64>().ok().filter(|id| *id != 0).map(UserId::new)
}
