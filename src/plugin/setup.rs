use crate::helper::{parse_channel_mention, parse_role_mention, MessageHelper};
use crate::plugin::member_join::persist_state;
use crate::{event::*, log_event, plugin::*};
use anyhow::Result;

/// Admin command writing the persisted guild configuration.
pub struct Setup;

#[serenity::async_trait]
impl Plugin for Setup {
    fn name(&self) -> &'static str {
        "setup"
    }

    async fn usage(&self, ctx: &Context) -> Option<String> {
        let prefix = &ctx.cfg.read().await.general.command_prefix;
        Some(format!(
            "{}{} @devotee @seeker #verification #admin [#dm-fallback] [#log] [#welcome] \
             - configure verification (admin only)",
            prefix,
            self.name()
        ))
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        let Some((msg, args)) = event.is_bot_cmd(ctx, self.name()).await else {
            return Ok(EventHandled::No);
        };

        let server_id = ctx.cfg.read().await.general.server_id;
        if msg.guild_id.map(|id| id.get()) != Some(server_id) {
            msg.reply(ctx.cache_http, "This bot is not configured for this server.")
                .await?;
            return Ok(EventHandled::Yes);
        }
        if !msg.is_from_admin(ctx).await {
            msg.reply(ctx.cache_http, "Only administrators can configure the bot.")
                .await?;
            return Ok(EventHandled::Yes);
        }

        // Two role mentions then two to five channel mentions, in order.
        let parsed = (|| {
            let devotee = parse_role_mention(args.first()?)?;
            let seeker = parse_role_mention(args.get(1)?)?;
            let verification = parse_channel_mention(args.get(2)?)?;
            let admin = parse_channel_mention(args.get(3)?)?;
            let dm_fallback = args.get(4).and_then(|a| parse_channel_mention(a));
            let log = args.get(5).and_then(|a| parse_channel_mention(a));
            let welcome = args.get(6).and_then(|a| parse_channel_mention(a));
            Some((devotee, seeker, verification, admin, dm_fallback, log, welcome))
        })();

        let Some((devotee, seeker, verification, admin, dm_fallback, log, welcome)) = parsed
        else {
            let usage = self.usage(ctx).await.unwrap_or_default();
            msg.reply(
                ctx.cache_http,
                format!("Missing or malformed arguments.\nUsage: {usage}"),
            )
            .await?;
            return Ok(EventHandled::Yes);
        };

        {
            let mut pstate = ctx.pstate.write().await;
            pstate.guild.devotee_role_id = Some(devotee);
            pstate.guild.seeker_role_id = Some(seeker);
            pstate.guild.verification_channel_id = Some(verification);
            pstate.guild.admin_channel_id = Some(admin);
            pstate.guild.dm_questions_channel_id = dm_fallback;
            pstate.guild.log_channel_id = log;
            pstate.guild.welcome_channel_id = welcome;
        }
        persist_state(ctx).await;
        log_event!("Guild configuration updated by {}", msg.author.name);

        let mut summary = format!(
            "✅ Verification configured!\n\
             Devotee role (score 8-10): <@&{devotee}>\n\
             Seeker role (score 5-7): <@&{seeker}>\n\
             Announcements: <#{verification}>\n\
             Admin reports: <#{admin}>\n"
        );
        if let Some(channel) = dm_fallback {
            summary.push_str(&format!("DM fallback: <#{channel}>\n"));
        }
        if let Some(channel) = log {
            summary.push_str(&format!("Activity log: <#{channel}>\n"));
        }
        if let Some(channel) = welcome {
            summary.push_str(&format!("Welcome messages: <#{channel}>\n"));
        }
        summary.push_str("New members will now be questioned via DM when they join.");
        msg.reply(ctx.cache_http, summary).await?;

        Ok(EventHandled::Yes)
    }
}
