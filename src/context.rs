use crate::{
    config::Config, persistent_state::PersistentState, scoring::ScoringContext,
    volatile_state::VolatileState,
};
use std::sync::Arc;
use tokio::sync::RwLock;

/// State shared by the gateway handler, the web server, and the session
/// sweeper.  The scoring context lives here, injected rather than
/// global, so tests can build their own.
pub struct Shared {
    pub cfg: RwLock<Config>,
    pub pstate: RwLock<PersistentState>,
    pub vstate: RwLock<VolatileState>,
    pub scoring: RwLock<ScoringContext>,
}

impl Shared {
    pub fn ctx<'a>(&'a self, discord_ctx: &'a serenity::all::Context) -> Context<'a> {
        Context {
            cfg: &self.cfg,
            pstate: &self.pstate,
            vstate: &self.vstate,
            scoring: &self.scoring,
            cache: &discord_ctx.cache,
            http: &discord_ctx.http,
            cache_http: discord_ctx,
        }
    }
}

/// Collection of data that is shared across events
pub struct Context<'a> {
    // Mandirbot's own context types
    pub cfg: &'a RwLock<Config>,
    pub pstate: &'a RwLock<PersistentState>,
    pub vstate: &'a RwLock<VolatileState>,
    pub scoring: &'a RwLock<ScoringContext>,
    // Discord/Serenity context types
    pub cache: &'a Arc<serenity::all::Cache>,
    pub http: &'a Arc<serenity::all::Http>,
    pub cache_http: &'a CacheHttp,
}

/// Many Serenity functions take a `impl CacheHttp` in order to first check the cache if the item
/// is available and fall back to an http request otherwise.  The most readily available type that
/// impl's this is named very differently in a way that could be confusing, and so we alias it.
pub type CacheHttp = serenity::all::Context;
