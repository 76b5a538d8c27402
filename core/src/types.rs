//! Wire DTOs for the bot API.
//!
//! # Design
//! Response types derive `Default` and mark every field `#[serde(default)]`
//! so that fields the server omits decode to their zero value instead of
//! failing the call. Patch and request types skip `None` fields when
//! serializing: omitted fields stay untouched on the server.
//!
//! String-valued enums carry an `Unknown` catch-all so that values added to
//! the API later do not turn into decode errors.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Users and bots
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct User {
    pub user_id: i64,
    pub first_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub is_bot: bool,
    pub last_activity_time: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserWithPhoto {
    #[serde(flatten)]
    pub user: User,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_avatar_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotCommand {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// The bot identified by the access token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotInfo {
    #[serde(flatten)]
    pub profile: UserWithPhoto,
    pub commands: Vec<BotCommand>,
}

impl BotInfo {
    pub fn user_id(&self) -> i64 {
        self.profile.user.user_id
    }

    pub fn first_name(&self) -> &str {
        &self.profile.user.first_name
    }
}

/// Image reference: either an already hosted URL or an upload token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoAttachmentRequestPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// Partial update of the bot profile. Only `Some` fields are sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commands: Option<Vec<BotCommand>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo: Option<PhotoAttachmentRequestPayload>,
}

// ---------------------------------------------------------------------------
// Chats
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatType {
    Dialog,
    #[default]
    Chat,
    Channel,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatStatus {
    #[default]
    Active,
    Removed,
    Left,
    Closed,
    Suspended,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Image {
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Chat {
    pub chat_id: i64,
    #[serde(rename = "type")]
    pub kind: ChatType,
    pub status: ChatStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<Image>,
    pub last_event_time: i64,
    pub participants_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<i64>,
    pub is_public: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dialog_with_user: Option<UserWithPhoto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub messages_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pinned_message: Option<Box<Message>>,
}

/// One page of chats. `marker` is `None` on the last page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatList {
    pub chats: Vec<Chat>,
    pub marker: Option<i64>,
}

/// Partial update of chat metadata. Only `Some` fields are sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<PhotoAttachmentRequestPayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notify: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatAdminPermission {
    ReadAllMessages,
    AddRemoveMembers,
    AddAdmins,
    ChangeChatInfo,
    PinMessage,
    Write,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatMember {
    #[serde(flatten)]
    pub profile: UserWithPhoto,
    pub last_access_time: i64,
    pub is_owner: bool,
    pub is_admin: bool,
    pub join_time: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Vec<ChatAdminPermission>>,
}

impl ChatMember {
    pub fn user_id(&self) -> i64 {
        self.profile.user.user_id
    }
}

/// One page of chat members. `marker` is `None` on the last page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatMembersList {
    pub members: Vec<ChatMember>,
    pub marker: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdsList {
    pub user_ids: Vec<i64>,
}

impl From<Vec<i64>> for UserIdsList {
    fn from(user_ids: Vec<i64>) -> Self {
        Self { user_ids }
    }
}

/// Transient status shown to chat participants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SenderAction {
    TypingOn,
    SendingPhoto,
    SendingVideo,
    SendingAudio,
    SendingFile,
    MarkSeen,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRequestBody {
    pub action: SenderAction,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinMessageBody {
    pub message_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notify: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PinnedMessage {
    pub message: Option<Message>,
}

/// Outcome of an operation that returns no resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimpleQueryResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// Attachment as delivered by the server; `payload` depends on `kind`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Attachment {
    #[serde(rename = "type")]
    pub kind: String,
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageBody {
    pub mid: String,
    pub seq: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageRecipient {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<i64>,
    pub chat_type: ChatType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageStat {
    pub views: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Message {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender: Option<User>,
    pub recipient: MessageRecipient,
    pub timestamp: i64,
    pub body: MessageBody,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stat: Option<MessageStat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageList {
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SendMessageResult {
    pub message: Message,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextFormat {
    Markdown,
    Html,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageLinkType {
    Forward,
    Reply,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMessageLink {
    #[serde(rename = "type")]
    pub kind: MessageLinkType,
    pub mid: String,
}

/// Attachment to send, e.g. a file previously uploaded through `Uploads`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachmentRequest {
    #[serde(rename = "type")]
    pub kind: String,
    pub payload: serde_json::Value,
}

impl AttachmentRequest {
    /// Attachment referencing an upload result.
    pub fn uploaded(kind: UploadType, info: &UploadedInfo) -> Self {
        let payload = match (&info.token, &info.photos) {
            (_, Some(photos)) => serde_json::json!({ "photos": photos }),
            (Some(token), None) => serde_json::json!({ "token": token }),
            (None, None) => serde_json::Value::Object(Default::default()),
        };
        Self {
            kind: kind.as_str().to_string(),
            payload,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewMessageBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<AttachmentRequest>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<NewMessageLink>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notify: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<TextFormat>,
}

impl NewMessageBody {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }
}

/// Reply to a callback button press.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallbackAnswer {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<NewMessageBody>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification: Option<String>,
}

// ---------------------------------------------------------------------------
// Subscriptions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Subscription {
    pub url: String,
    pub time: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_types: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscriptionList {
    pub subscriptions: Vec<Subscription>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionRequest {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_types: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

// ---------------------------------------------------------------------------
// Uploads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadType {
    Image,
    Video,
    Audio,
    File,
}

impl UploadType {
    pub fn as_str(self) -> &'static str {
        match self {
            UploadType::Image => "image",
            UploadType::Video => "video",
            UploadType::Audio => "audio",
            UploadType::File => "file",
        }
    }
}

/// Where to send the file. Audio and video endpoints come with their token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadEndpoint {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhotoToken {
    pub token: String,
}

/// Result of an upload, ready to be referenced from `AttachmentRequest`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadedInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photos: Option<HashMap<String, PhotoToken>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bot_info_from_minimal_json() {
        let bot: BotInfo = serde_json::from_str(r#"{"user_id":1,"first_name":"Bot"}"#).unwrap();
        assert_eq!(bot.user_id(), 1);
        assert_eq!(bot.first_name(), "Bot");
        assert!(bot.commands.is_empty());
    }

    #[test]
    fn bot_patch_omits_unset_fields() {
        let patch = BotPatch {
            description: Some("helps".to_string()),
            ..BotPatch::default()
        };
        let json = serde_json::to_value(&patch).unwrap();
        assert_eq!(json, serde_json::json!({"description": "helps"}));
    }

    #[test]
    fn unknown_enum_values_decode() {
        let chat: Chat =
            serde_json::from_str(r#"{"chat_id":5,"type":"supergroup","status":"archived"}"#)
                .unwrap();
        assert_eq!(chat.kind, ChatType::Unknown);
        assert_eq!(chat.status, ChatStatus::Unknown);
    }

    #[test]
    fn chat_list_without_marker_is_last_page() {
        let list: ChatList =
            serde_json::from_str(r#"{"chats":[{"chat_id":10,"type":"dialog"}],"marker":null}"#)
                .unwrap();
        assert_eq!(list.chats[0].kind, ChatType::Dialog);
        assert!(list.marker.is_none());
    }

    #[test]
    fn chat_member_flattens_user_fields() {
        let member: ChatMember = serde_json::from_str(
            r#"{"user_id":5,"first_name":"Ann","is_admin":true,"permissions":["write","pin_message"]}"#,
        )
        .unwrap();
        assert_eq!(member.user_id(), 5);
        assert!(member.is_admin);
        assert_eq!(
            member.permissions,
            Some(vec![ChatAdminPermission::Write, ChatAdminPermission::PinMessage])
        );
    }

    #[test]
    fn sender_action_wire_names() {
        let body = ActionRequestBody {
            action: SenderAction::TypingOn,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({"action": "typing_on"})
        );
    }

    #[test]
    fn uploaded_attachment_uses_token_or_photos() {
        let info = UploadedInfo {
            token: Some("t1".to_string()),
            ..UploadedInfo::default()
        };
        let attachment = AttachmentRequest::uploaded(UploadType::File, &info);
        assert_eq!(attachment.kind, "file");
        assert_eq!(attachment.payload, serde_json::json!({"token": "t1"}));

        let mut photos = HashMap::new();
        photos.insert("p".to_string(), PhotoToken { token: "pt".to_string() });
        let info = UploadedInfo {
            photos: Some(photos),
            ..UploadedInfo::default()
        };
        let attachment = AttachmentRequest::uploaded(UploadType::Image, &info);
        assert_eq!(
            attachment.payload,
            serde_json::json!({"photos": {"p": {"token": "pt"}}})
        );
    }
}
