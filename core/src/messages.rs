//! Sending, reading, editing and deleting messages.

use crate::client::{Client, Endpoint, Query};
use crate::context::Context;
use crate::error::Result;
use crate::types::{
    CallbackAnswer, Message, MessageList, NewMessageBody, SendMessageResult, SimpleQueryResult,
};

/// Target of a new message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    Chat(i64),
    User(i64),
}

/// Filter for `Messages::get_messages`.
///
/// `chat_id` is sent whenever it is non-zero; group chat ids are negative.
/// `from`, `to` and `count` at or below zero are not sent. `from` and `to`
/// are unix timestamps in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageQuery {
    pub chat_id: i64,
    pub message_ids: Vec<String>,
    pub from: i64,
    pub to: i64,
    pub count: i64,
}

impl MessageQuery {
    pub fn chat(chat_id: i64) -> Self {
        Self {
            chat_id,
            ..Self::default()
        }
    }

    fn to_query(&self) -> Query {
        let mut query = Query::new();
        if self.chat_id != 0 {
            query.set("chat_id", self.chat_id);
        }
        if !self.message_ids.is_empty() {
            query.set("message_ids", self.message_ids.join(","));
        }
        query
            .set_positive("from", self.from)
            .set_positive("to", self.to)
            .set_positive("count", self.count);
        query
    }
}

/// Facade for the `messages` and `answers` endpoints.
#[derive(Debug, Clone, Copy)]
pub struct Messages<'a> {
    client: &'a Client,
}

impl<'a> Messages<'a> {
    pub(crate) fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// Returns messages of a chat, or the listed messages by id.
    pub fn get_messages(&self, ctx: &Context, filter: &MessageQuery) -> Result<MessageList> {
        self.client
            .call(ctx, Endpoint::get("messages").query(filter.to_query()))
    }

    /// Returns one message by id. The id is sent as a single path segment.
    pub fn get_message(&self, ctx: &Context, message_id: &str) -> Result<Message> {
        self.client
            .call(ctx, Endpoint::get("messages").segment(message_id))
    }

    pub fn send_message(
        &self,
        ctx: &Context,
        recipient: Recipient,
        body: &NewMessageBody,
    ) -> Result<SendMessageResult> {
        let mut query = Query::new();
        match recipient {
            Recipient::Chat(chat_id) => query.set("chat_id", chat_id),
            Recipient::User(user_id) => query.set("user_id", user_id),
        };
        let endpoint = Endpoint::post("messages").query(query).json(body)?;
        self.client.call(ctx, endpoint)
    }

    /// Replaces the content of a message the bot sent earlier.
    pub fn edit_message(
        &self,
        ctx: &Context,
        message_id: &str,
        body: &NewMessageBody,
    ) -> Result<SimpleQueryResult> {
        let endpoint = Endpoint::put("messages")
            .query(message_query(message_id))
            .json(body)?;
        self.client.call(ctx, endpoint)
    }

    pub fn delete_message(&self, ctx: &Context, message_id: &str) -> Result<SimpleQueryResult> {
        let endpoint = Endpoint::delete("messages").query(message_query(message_id));
        self.client.call(ctx, endpoint)
    }

    /// Answers a callback button press with a new message and/or a notification.
    pub fn answer_callback(
        &self,
        ctx: &Context,
        callback_id: &str,
        answer: &CallbackAnswer,
    ) -> Result<SimpleQueryResult> {
        let mut query = Query::new();
        query.set("callback_id", callback_id);
        let endpoint = Endpoint::post("answers").query(query).json(answer)?;
        self.client.call(ctx, endpoint)
    }
}

fn message_query(message_id: &str) -> Query {
    let mut query = Query::new();
    query.set("message_id", message_id);
    query
}
