use crate::{event::*, log_event, logging::*, plugin::*};
use anyhow::Result;
use std::borrow::Cow;

/// Prints debug information about event to stdout
pub struct Debug;

#[serenity::async_trait]
impl Plugin for Debug {
    fn name(&self) -> &'static str {
        "debug"
    }

    async fn usage(&self, _ctx: &Context) -> Option<String> {
        None
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        match event {
            Event::Ready(ready) => {
                log_event!(
                    "Connected to {} server(s) as {}",
                    ready.guilds.len(),
                    ctx.cache.current_user().color(),
                );
            }
            Event::Message(msg) => {
                log_event!(
                    "{}{}{}{}{}{} {}",
                    msg.guild_id.color(ctx.http).await,
                    Glue {}.color(),
                    msg.channel_id.color(ctx.http).await,
                    Glue {}.color(),
                    msg.author.color(),
                    Glue {}.color(),
                    msg.content,
                );
            }
            Event::MemberJoin(member) => {
                log_event!(
                    "{}{}{} joined",
                    Some(member.guild_id).color(ctx.http).await,
                    Glue {}.color(),
                    member.user.color(),
                );
            }
            Event::ReactionAdd(reaction) => {
                let emoji = match &reaction.emoji {
                    serenity::all::ReactionType::Custom {
                        animated: _,
                        id: _,
                        name,
                    } => name.clone().unwrap_or("<unknown-emoji>".to_owned()),
                    serenity::all::ReactionType::Unicode(s) => s.clone(),
                    _ => "<unknown-emoji>".to_owned(),
                };

                let user = match reaction.user_id {
                    Some(user_id) => Cow::Owned(user_id.color(ctx.http).await),
                    None => Cow::Borrowed("<unknown-user>"),
                };

                log_event!("{} reacted with \"{}\"", user, emoji);
            }
        }

        Ok(EventHandled::No)
    }
}
