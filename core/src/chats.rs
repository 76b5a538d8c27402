//! Chats the bot participates in, their members and chat-level actions.
//!
//! List operations take `count` and `marker`; either is left out of the
//! request when it is zero or negative so the server applies its default.
//! Pass the `marker` of one page to fetch the next.

use crate::client::{Client, Endpoint, Query};
use crate::context::Context;
use crate::error::Result;
use crate::types::{
    ActionRequestBody, Chat, ChatList, ChatMember, ChatMembersList, ChatPatch, PinMessageBody,
    PinnedMessage, SenderAction, SimpleQueryResult, UserIdsList,
};

/// Facade for the `chats` endpoints.
#[derive(Debug, Clone, Copy)]
pub struct Chats<'a> {
    client: &'a Client,
}

impl<'a> Chats<'a> {
    pub(crate) fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// Returns one page of the chats the bot participates in.
    pub fn get_chats(&self, ctx: &Context, count: i64, marker: i64) -> Result<ChatList> {
        let endpoint = Endpoint::get("chats").query(page(count, marker));
        self.client.call(ctx, endpoint)
    }

    pub fn get_chat(&self, ctx: &Context, chat_id: i64) -> Result<Chat> {
        self.client.call(ctx, Endpoint::get(format!("chats/{chat_id}")))
    }

    /// Edits chat info: title, icon, pinned message. Only `Some` fields change.
    pub fn edit_chat(&self, ctx: &Context, chat_id: i64, patch: &ChatPatch) -> Result<Chat> {
        let endpoint = Endpoint::patch(format!("chats/{chat_id}")).json(patch)?;
        self.client.call(ctx, endpoint)
    }

    /// Returns the bot's own membership in the chat.
    pub fn get_chat_membership(&self, ctx: &Context, chat_id: i64) -> Result<ChatMember> {
        self.client
            .call(ctx, Endpoint::get(format!("chats/{chat_id}/members/me")))
    }

    pub fn get_chat_members(
        &self,
        ctx: &Context,
        chat_id: i64,
        count: i64,
        marker: i64,
    ) -> Result<ChatMembersList> {
        let endpoint =
            Endpoint::get(format!("chats/{chat_id}/members")).query(page(count, marker));
        self.client.call(ctx, endpoint)
    }

    pub fn get_chat_admins(&self, ctx: &Context, chat_id: i64) -> Result<ChatMembersList> {
        self.client
            .call(ctx, Endpoint::get(format!("chats/{chat_id}/members/admins")))
    }

    /// Adds members to the chat. May require additional permissions.
    pub fn add_members(
        &self,
        ctx: &Context,
        chat_id: i64,
        users: &UserIdsList,
    ) -> Result<SimpleQueryResult> {
        let endpoint = Endpoint::post(format!("chats/{chat_id}/members")).json(users)?;
        self.client.call(ctx, endpoint)
    }

    /// Removes a member from the chat. May require additional permissions.
    pub fn remove_member(
        &self,
        ctx: &Context,
        chat_id: i64,
        user_id: i64,
    ) -> Result<SimpleQueryResult> {
        let mut query = Query::new();
        query.set("user_id", user_id);
        let endpoint = Endpoint::delete(format!("chats/{chat_id}/members")).query(query);
        self.client.call(ctx, endpoint)
    }

    /// Removes the bot itself from the chat.
    pub fn leave_chat(&self, ctx: &Context, chat_id: i64) -> Result<SimpleQueryResult> {
        self.client
            .call(ctx, Endpoint::delete(format!("chats/{chat_id}/members/me")))
    }

    /// Shows a transient action, e.g. a typing indicator, to chat participants.
    pub fn send_action(
        &self,
        ctx: &Context,
        chat_id: i64,
        action: SenderAction,
    ) -> Result<SimpleQueryResult> {
        let endpoint =
            Endpoint::post(format!("chats/{chat_id}/actions")).json(&ActionRequestBody { action })?;
        self.client.call(ctx, endpoint)
    }

    pub fn get_pinned_message(&self, ctx: &Context, chat_id: i64) -> Result<PinnedMessage> {
        self.client.call(ctx, Endpoint::get(format!("chats/{chat_id}/pin")))
    }

    pub fn pin_message(
        &self,
        ctx: &Context,
        chat_id: i64,
        body: &PinMessageBody,
    ) -> Result<SimpleQueryResult> {
        let endpoint = Endpoint::put(format!("chats/{chat_id}/pin")).json(body)?;
        self.client.call(ctx, endpoint)
    }

    pub fn unpin_message(&self, ctx: &Context, chat_id: i64) -> Result<SimpleQueryResult> {
        self.client
            .call(ctx, Endpoint::delete(format!("chats/{chat_id}/pin")))
    }
}

fn page(count: i64, marker: i64) -> Query {
    let mut query = Query::new();
    query.set_positive("count", count).set_positive("marker", marker);
    query
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_omits_non_positive_values() {
        let query = page(2, 0);
        assert_eq!(query.get("count"), Some("2"));
        assert!(!query.contains("marker"));

        let query = page(-1, -1);
        assert!(query.is_empty());

        let query = page(50, 1_700_000_000_123);
        assert_eq!(query.get("count"), Some("50"));
        assert_eq!(query.get("marker"), Some("1700000000123"));
    }
}
