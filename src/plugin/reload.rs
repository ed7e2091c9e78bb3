use crate::helper::MessageHelper;
use crate::{event::*, log_event, plugin::*};
use anyhow::Result;
use std::borrow::Cow;

/// Admin commands reloading the question bank and the AI configuration.
pub struct Reload;

#[serenity::async_trait]
impl Plugin for Reload {
    fn name(&self) -> &'static str {
        "reload"
    }

    async fn usage(&self, ctx: &Context) -> Option<String> {
        let prefix = &ctx.cfg.read().await.general.command_prefix;
        Some(format!(
            "{prefix}reload - reload the question bank (admin only)\n\
             {prefix}reloadai - reload AI configuration (admin only)"
        ))
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        if let Some((msg, _)) = event.is_bot_cmd(ctx, "reload").await {
            if !msg.is_from_admin(ctx).await {
                msg.reply(ctx.cache_http, "Only administrators can reload the question bank.")
                    .await?;
                return Ok(EventHandled::Yes);
            }

            let result = ctx.vstate.write().await.questions.reload().await;
            let response = match result {
                Ok(counts) => {
                    log_event!("Question bank reloaded by {}", msg.author.name);
                    Cow::Owned(format!(
                        "🔄 Question bank reloaded.\n\
                         Entry: {} | Reflective: {} | Psychological: {} trusted, {} medium, {} high",
                        counts.entry, counts.reflective, counts.trusted, counts.medium, counts.high
                    ))
                }
                Err(e) => Cow::Owned(format!(
                    "❌ Question bank reload failed: {e}\n\
                     Check the JSON file; the previous question pool remains active."
                )),
            };
            msg.reply(ctx.cache_http, response).await?;
            return Ok(EventHandled::Yes);
        }

        if let Some((msg, _)) = event.is_bot_cmd(ctx, "reloadai").await {
            if !msg.is_from_admin(ctx).await {
                msg.reply(ctx.cache_http, "Only administrators can reload the AI configuration.")
                    .await?;
                return Ok(EventHandled::Yes);
            }

            let reload_result = {
                let mut cfg = ctx.cfg.write().await;
                cfg.reload().await
            };
            let response = match reload_result {
                Ok(()) => {
                    let cfg = ctx.cfg.read().await;
                    // The live limiter keeps its count; only the ceiling moves.
                    ctx.scoring
                        .write()
                        .await
                        .limiter
                        .set_daily_limit(cfg.ai.daily_call_limit);
                    log_event!("AI configuration reloaded by {}", msg.author.name);
                    Cow::Owned(format!(
                        "🤖 AI configuration reloaded (model `{}`, daily limit {}).",
                        cfg.ai.model_name, cfg.ai.daily_call_limit
                    ))
                }
                Err(e) => Cow::Owned(format!(
                    "❌ AI configuration reload failed: {e}\nThe previous configuration remains active."
                )),
            };
            msg.reply(ctx.cache_http, response).await?;
            return Ok(EventHandled::Yes);
        }

        Ok(EventHandled::No)
    }
}
