//! Bot identity: who the access token belongs to, and profile edits.

use crate::client::{Client, Endpoint};
use crate::context::Context;
use crate::error::Result;
use crate::types::{BotInfo, BotPatch};

/// Facade for the `me` endpoints.
#[derive(Debug, Clone, Copy)]
pub struct Bots<'a> {
    client: &'a Client,
}

impl<'a> Bots<'a> {
    pub(crate) fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// Returns the current bot: identifier, name, avatar and commands.
    pub fn get_bot(&self, ctx: &Context) -> Result<BotInfo> {
        self.client.call(ctx, Endpoint::get("me"))
    }

    /// Edits the current bot. Only the fields set in `patch` change.
    pub fn patch_bot(&self, ctx: &Context, patch: &BotPatch) -> Result<BotInfo> {
        self.client.call(ctx, Endpoint::patch("me").json(patch)?)
    }
}
