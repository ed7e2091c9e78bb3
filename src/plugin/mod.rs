pub use crate::context::Context;
use crate::event::EventHandled;
use anyhow::Result;

mod debug;
mod dm_answer;
mod help;
mod member_join;
mod reload;
mod setup;
mod stats;
mod verify;

#[serenity::async_trait]
pub trait Plugin: Sync + Send {
    /// Plugin name.  Used for debug
    fn name(&self) -> &'static str;
    /// Help message line.  None if no help message
    async fn usage(&self, ctx: &Context) -> Option<String>;
    /// Potentially handle event.  Returns:
    /// - Ok(EventHandled::Yes) if the event has been handled and no other plugin should attempt to
    /// handle it
    /// - Ok(EventHandled::No) if another plugin should attempt to handle the event
    /// - Err if an error occurred
    async fn handle(&self, ctx: &Context, event: &crate::event::Event) -> Result<EventHandled>;
}

/// Ordered list of available plugins
pub fn plugins() -> Vec<Box<dyn Plugin>> {
    use crate::plugin::*;

    vec![
        // Core bot operations
        Box::new(debug::Debug),
        Box::new(help::Help),
        // Admin commands
        Box::new(setup::Setup),
        Box::new(reload::Reload),
        Box::new(stats::Stats),
        Box::new(verify::Verify),
        // Verification flow.  dm_answer consumes any other direct
        // message from a member with an open session.
        // Keep last.
        Box::new(member_join::MemberJoin),
        Box::new(dm_answer::DmAnswer),
    ]
}
