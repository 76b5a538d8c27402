//! WebHook subscriptions.

use crate::client::{Client, Endpoint, Query};
use crate::context::Context;
use crate::error::Result;
use crate::types::{SimpleQueryResult, SubscriptionList, SubscriptionRequest};

/// Facade for the `subscriptions` endpoints.
#[derive(Debug, Clone, Copy)]
pub struct Subscriptions<'a> {
    client: &'a Client,
}

impl<'a> Subscriptions<'a> {
    pub(crate) fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub fn get_subscriptions(&self, ctx: &Context) -> Result<SubscriptionList> {
        self.client.call(ctx, Endpoint::get("subscriptions"))
    }

    /// Registers a WebHook URL that will receive the bot's updates.
    pub fn subscribe(
        &self,
        ctx: &Context,
        request: &SubscriptionRequest,
    ) -> Result<SimpleQueryResult> {
        self.client
            .call(ctx, Endpoint::post("subscriptions").json(request)?)
    }

    pub fn unsubscribe(&self, ctx: &Context, url: &str) -> Result<SimpleQueryResult> {
        let mut query = Query::new();
        query.set("url", url);
        self.client
            .call(ctx, Endpoint::delete("subscriptions").query(query))
    }
}
