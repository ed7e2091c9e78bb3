use crate::helper::MessageHelper;
use crate::{event::*, plugin::*};
use anyhow::Result;

/// Question bank statistics: pool sizes and how often questions get asked.
pub struct Stats;

#[serenity::async_trait]
impl Plugin for Stats {
    fn name(&self) -> &'static str {
        "qstats"
    }

    async fn usage(&self, ctx: &Context) -> Option<String> {
        let prefix = &ctx.cfg.read().await.general.command_prefix;
        Some(format!(
            "{}{} - question bank statistics (admin only)",
            prefix,
            self.name()
        ))
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        let Some((msg, _)) = event.is_bot_cmd(ctx, self.name()).await else {
            return Ok(EventHandled::No);
        };
        if !msg.is_from_admin(ctx).await {
            msg.reply(ctx.cache_http, "Only administrators can view question statistics.")
                .await?;
            return Ok(EventHandled::Yes);
        }

        let counts = ctx.vstate.read().await.questions.counts();
        let top = ctx.pstate.read().await.question_usage.top(5);

        let mut reply = format!(
            "📊 Question bank\n\
             Entry: {} | Reflective: {} | Psychological: {} trusted, {} medium, {} high\n",
            counts.entry, counts.reflective, counts.trusted, counts.medium, counts.high
        );
        if top.is_empty() {
            reply.push_str("No questions issued yet.");
        } else {
            reply.push_str("Most issued:\n");
            for (id, count) in top {
                reply.push_str(&format!("- {id}: {count}\n"));
            }
        }
        msg.reply(ctx.cache_http, reply).await?;

        Ok(EventHandled::Yes)
    }
}
