//! In-memory mock of the Max bot API.
//!
//! Serves the same routes as the real service over seeded state so clients
//! can be exercised end to end without network access or a real token.
//! Every route except the pre-signed upload URL requires the configured
//! token, either as the `access_token` query parameter or as the
//! `Authorization` header.
//!
//! Seeded state: bot `1` ("Bot"); chats `10` (group with members 1, 5, 6, 7),
//! `11` (group), `12` (dialog) and `13` (channel); chat `99` exists but the
//! bot has no access to it and every request for it answers 403.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::{debug, info};

pub const DEFAULT_TOKEN: &str = "test-token";
pub const BOT_USER_ID: i64 = 1;
pub const RESTRICTED_CHAT_ID: i64 = 99;

const DEFAULT_PAGE_SIZE: usize = 50;
const BASE_TIMESTAMP: i64 = 1_700_000_000_000;
const SENDER_ACTIONS: &[&str] = &[
    "typing_on",
    "sending_photo",
    "sending_video",
    "sending_audio",
    "sending_file",
    "mark_seen",
];

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize, Deserialize)]
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

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BotCommand {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Bot {
    #[serde(flatten)]
    pub user: User,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub commands: Vec<BotCommand>,
}

#[derive(Deserialize)]
pub struct BotPatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub description: Option<String>,
    pub commands: Option<Vec<BotCommand>>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Member {
    #[serde(flatten)]
    pub user: User,
    pub last_access_time: i64,
    pub is_owner: bool,
    pub is_admin: bool,
    pub join_time: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Vec<String>>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Chat {
    pub chat_id: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<Value>,
    pub last_event_time: i64,
    pub participants_count: i64,
    pub is_public: bool,
}

#[derive(Deserialize)]
pub struct ChatPatch {
    pub title: Option<String>,
    pub icon: Option<Value>,
    pub pin: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub sender: User,
    pub recipient: Value,
    pub timestamp: i64,
    pub body: Value,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Subscription {
    pub url: String,
    pub time: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_types: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Deserialize)]
pub struct Page {
    pub count: Option<i64>,
    pub marker: Option<i64>,
}

/// Error response in the service's `{"code","message"}` shape.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not.found", message)
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "proto.payload", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "code": self.code, "message": self.message }));
        (self.status, body).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

struct ChatRecord {
    chat: Chat,
    members: BTreeMap<i64, Member>,
    pinned: Option<String>,
}

pub struct Store {
    bot: Bot,
    chats: BTreeMap<i64, ChatRecord>,
    messages: BTreeMap<String, Message>,
    subscriptions: Vec<Subscription>,
    seq: i64,
}

pub type Db = Arc<RwLock<Store>>;

#[derive(Clone)]
pub struct AppState {
    token: Arc<str>,
    db: Db,
}

fn user(user_id: i64, first_name: &str, is_bot: bool) -> User {
    User {
        user_id,
        first_name: first_name.to_string(),
        last_name: None,
        username: None,
        is_bot,
        last_activity_time: BASE_TIMESTAMP,
    }
}

fn member(user: User, is_owner: bool, is_admin: bool) -> Member {
    Member {
        user,
        last_access_time: BASE_TIMESTAMP,
        is_owner,
        is_admin,
        join_time: BASE_TIMESTAMP,
        permissions: is_admin.then(|| vec!["write".to_string(), "pin_message".to_string()]),
    }
}

fn chat_record(chat_id: i64, kind: &str, title: &str, members: Vec<Member>) -> (i64, ChatRecord) {
    let members: BTreeMap<i64, Member> = members.into_iter().map(|m| (m.user.user_id, m)).collect();
    let chat = Chat {
        chat_id,
        kind: kind.to_string(),
        status: "active".to_string(),
        title: Some(title.to_string()),
        icon: None,
        last_event_time: BASE_TIMESTAMP,
        participants_count: members.len() as i64,
        is_public: false,
    };
    (
        chat_id,
        ChatRecord {
            chat,
            members,
            pinned: None,
        },
    )
}

impl Store {
    /// Seeded state described in the crate docs.
    pub fn seeded() -> Self {
        let bot_user = User {
            username: Some("mock_bot".to_string()),
            ..user(BOT_USER_ID, "Bot", true)
        };
        let bot_member = || member(bot_user.clone(), false, true);
        let chats = [
            chat_record(
                10,
                "chat",
                "General",
                vec![
                    bot_member(),
                    member(user(5, "Ann", false), true, true),
                    member(user(6, "Bob", false), false, false),
                    member(user(7, "Cid", false), false, false),
                ],
            ),
            chat_record(
                11,
                "chat",
                "Random",
                vec![bot_member(), member(user(5, "Ann", false), true, true)],
            ),
            chat_record(
                12,
                "dialog",
                "Ann",
                vec![bot_member(), member(user(5, "Ann", false), false, false)],
            ),
            chat_record(13, "channel", "News", vec![bot_member()]),
            chat_record(
                RESTRICTED_CHAT_ID,
                "chat",
                "Restricted",
                vec![member(user(8, "Dee", false), true, true)],
            ),
        ];
        Self {
            bot: Bot {
                user: bot_user.clone(),
                description: None,
                commands: Vec::new(),
            },
            chats: chats.into_iter().collect(),
            messages: BTreeMap::new(),
            subscriptions: Vec::new(),
            seq: 0,
        }
    }

    fn next_seq(&mut self) -> i64 {
        self.seq += 1;
        self.seq
    }

    fn chat(&self, chat_id: i64) -> Result<&ChatRecord, ApiError> {
        check_access(chat_id)?;
        self.chats
            .get(&chat_id)
            .ok_or_else(|| ApiError::not_found(format!("Chat {chat_id} not found")))
    }

    fn chat_mut(&mut self, chat_id: i64) -> Result<&mut ChatRecord, ApiError> {
        check_access(chat_id)?;
        self.chats
            .get_mut(&chat_id)
            .ok_or_else(|| ApiError::not_found(format!("Chat {chat_id} not found")))
    }
}

fn check_access(chat_id: i64) -> Result<(), ApiError> {
    if chat_id == RESTRICTED_CHAT_ID {
        return Err(ApiError::new(StatusCode::FORBIDDEN, "FORBIDDEN", "no access"));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn app() -> Router {
    app_with_token(DEFAULT_TOKEN)
}

pub fn app_with_token(token: &str) -> Router {
    let state = AppState {
        token: Arc::from(token),
        db: Arc::new(RwLock::new(Store::seeded())),
    };

    let api = Router::new()
        .route("/me", get(get_bot).patch(patch_bot))
        .route("/chats", get(list_chats))
        .route("/chats/{id}", get(get_chat).patch(edit_chat))
        .route(
            "/chats/{id}/members",
            get(list_members).post(add_members).delete(remove_member),
        )
        .route("/chats/{id}/members/me", get(get_membership).delete(leave_chat))
        .route("/chats/{id}/members/admins", get(list_admins))
        .route("/chats/{id}/actions", post(send_action))
        .route("/chats/{id}/pin", get(get_pin).put(pin_message).delete(unpin_message))
        .route(
            "/messages",
            get(list_messages)
                .post(send_message)
                .put(edit_message)
                .delete(delete_message),
        )
        .route("/messages/{mid}", get(get_message))
        .route("/answers", post(answer_callback))
        .route(
            "/subscriptions",
            get(list_subscriptions)
                .post(subscribe)
                .delete(unsubscribe),
        )
        .route("/uploads", post(get_upload_url))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_token));

    Router::new()
        .merge(api)
        .route("/upload/{kind}", post(receive_upload))
        .with_state(state)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

pub async fn run_with_token(listener: TcpListener, token: &str) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with_token(token)).await
}

async fn require_token(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Response {
    let from_query = params.get("access_token").map(String::as_str);
    let from_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    let token = from_query.or(from_header);
    if token != Some(&*state.token) {
        debug!(path = %request.uri().path(), "rejecting request without valid token");
        return ApiError::new(
            StatusCode::UNAUTHORIZED,
            "verify.token",
            "Invalid access_token",
        )
        .into_response();
    }
    next.run(request).await
}

/// Applies `count`/`marker` pagination to an id-ordered map. The marker is
/// the first id of the next page.
fn paginate<T: Clone>(items: &BTreeMap<i64, T>, page: &Page) -> (Vec<T>, Option<i64>) {
    let count = match page.count {
        Some(count) if count > 0 => count as usize,
        _ => DEFAULT_PAGE_SIZE,
    };
    let start = page.marker.filter(|marker| *marker > 0).unwrap_or(i64::MIN);
    let mut iter = items.range(start..);
    let taken: Vec<T> = iter.by_ref().take(count).map(|(_, v)| v.clone()).collect();
    let marker = iter.next().map(|(id, _)| *id);
    (taken, marker)
}

fn success() -> Json<Value> {
    Json(json!({ "success": true }))
}

fn required<'a>(params: &'a HashMap<String, String>, key: &str) -> Result<&'a str, ApiError> {
    params
        .get(key)
        .map(String::as_str)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ApiError::bad_request(format!("Missing required parameter: {key}")))
}

fn required_id(params: &HashMap<String, String>, key: &str) -> Result<i64, ApiError> {
    required(params, key)?
        .parse()
        .map_err(|_| ApiError::bad_request(format!("Invalid parameter: {key}")))
}

// ---------------------------------------------------------------------------
// Bot
// ---------------------------------------------------------------------------

async fn get_bot(State(state): State<AppState>) -> Json<Bot> {
    Json(state.db.read().await.bot.clone())
}

async fn patch_bot(State(state): State<AppState>, Json(patch): Json<BotPatch>) -> Json<Bot> {
    let mut db = state.db.write().await;
    let bot = &mut db.bot;
    if let Some(first_name) = patch.first_name {
        bot.user.first_name = first_name;
    }
    if let Some(last_name) = patch.last_name {
        bot.user.last_name = Some(last_name);
    }
    if let Some(description) = patch.description {
        bot.description = Some(description);
    }
    if let Some(commands) = patch.commands {
        bot.commands = commands;
    }
    Json(bot.clone())
}

// ---------------------------------------------------------------------------
// Chats
// ---------------------------------------------------------------------------

async fn list_chats(State(state): State<AppState>, Query(page): Query<Page>) -> Json<Value> {
    let db = state.db.read().await;
    let visible: BTreeMap<i64, Chat> = db
        .chats
        .iter()
        .filter(|(_, record)| record.members.contains_key(&BOT_USER_ID))
        .map(|(id, record)| (*id, record.chat.clone()))
        .collect();
    let (chats, marker) = paginate(&visible, &page);
    Json(json!({ "chats": chats, "marker": marker }))
}

async fn get_chat(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Chat> {
    let db = state.db.read().await;
    Ok(Json(db.chat(id)?.chat.clone()))
}

async fn edit_chat(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(patch): Json<ChatPatch>,
) -> ApiResult<Chat> {
    let mut db = state.db.write().await;
    let record = db.chat_mut(id)?;
    if let Some(title) = patch.title {
        record.chat.title = Some(title);
    }
    if let Some(icon) = patch.icon {
        record.chat.icon = Some(icon);
    }
    if let Some(pin) = patch.pin {
        record.pinned = Some(pin);
    }
    Ok(Json(record.chat.clone()))
}

async fn list_members(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(page): Query<Page>,
) -> Result<Json<Value>, ApiError> {
    let db = state.db.read().await;
    let (members, marker) = paginate(&db.chat(id)?.members, &page);
    Ok(Json(json!({ "members": members, "marker": marker })))
}

async fn list_admins(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let db = state.db.read().await;
    let admins: Vec<Member> = db
        .chat(id)?
        .members
        .values()
        .filter(|m| m.is_admin)
        .cloned()
        .collect();
    Ok(Json(json!({ "members": admins })))
}

async fn get_membership(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Member> {
    let db = state.db.read().await;
    db.chat(id)?
        .members
        .get(&BOT_USER_ID)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Bot is not a member of chat {id}")))
}

#[derive(Deserialize)]
struct UserIds {
    user_ids: Vec<i64>,
}

async fn add_members(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<UserIds>,
) -> Result<Json<Value>, ApiError> {
    if body.user_ids.is_empty() {
        return Err(ApiError::bad_request("user_ids must not be empty"));
    }
    let mut db = state.db.write().await;
    let record = db.chat_mut(id)?;
    for user_id in body.user_ids {
        record
            .members
            .entry(user_id)
            .or_insert_with(|| member(user(user_id, &format!("User {user_id}"), false), false, false));
    }
    record.chat.participants_count = record.members.len() as i64;
    Ok(success())
}

async fn remove_member(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Value>, ApiError> {
    let user_id = required_id(&params, "user_id")?;
    let mut db = state.db.write().await;
    let record = db.chat_mut(id)?;
    record
        .members
        .remove(&user_id)
        .ok_or_else(|| ApiError::not_found(format!("User {user_id} is not a member of chat {id}")))?;
    record.chat.participants_count = record.members.len() as i64;
    Ok(success())
}

async fn leave_chat(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let mut db = state.db.write().await;
    let record = db.chat_mut(id)?;
    if record.members.remove(&BOT_USER_ID).is_none() {
        return Err(ApiError::not_found(format!("Bot is not a member of chat {id}")));
    }
    record.chat.participants_count = record.members.len() as i64;
    Ok(success())
}

#[derive(Deserialize)]
struct ActionBody {
    action: String,
}

async fn send_action(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<ActionBody>,
) -> Result<Json<Value>, ApiError> {
    state.db.read().await.chat(id)?;
    if !SENDER_ACTIONS.contains(&body.action.as_str()) {
        return Err(ApiError::bad_request(format!("Unknown action: {}", body.action)));
    }
    Ok(success())
}

async fn get_pin(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<Value>, ApiError> {
    let db = state.db.read().await;
    let pinned = db.chat(id)?.pinned.clone();
    let message = pinned.and_then(|mid| db.messages.get(&mid).cloned());
    Ok(Json(json!({ "message": message })))
}

#[derive(Deserialize)]
struct PinBody {
    message_id: String,
}

async fn pin_message(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<PinBody>,
) -> Result<Json<Value>, ApiError> {
    let mut db = state.db.write().await;
    if !db.messages.contains_key(&body.message_id) {
        return Err(ApiError::not_found(format!("Message {} not found", body.message_id)));
    }
    db.chat_mut(id)?.pinned = Some(body.message_id);
    Ok(success())
}

async fn unpin_message(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let mut db = state.db.write().await;
    db.chat_mut(id)?.pinned = None;
    Ok(success())
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct NewMessage {
    text: Option<String>,
    #[serde(default)]
    attachments: Vec<Value>,
}

async fn list_messages(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Value>, ApiError> {
    let db = state.db.read().await;
    let messages: Vec<Message> = if let Some(ids) = params.get("message_ids") {
        ids.split(',')
            .filter_map(|mid| db.messages.get(mid).cloned())
            .collect()
    } else {
        let chat_id = required_id(&params, "chat_id")?;
        db.chat(chat_id)?;
        let count = params
            .get("count")
            .and_then(|count| count.parse::<usize>().ok())
            .filter(|count| *count > 0)
            .unwrap_or(DEFAULT_PAGE_SIZE);
        db.messages
            .values()
            .filter(|m| m.recipient["chat_id"] == json!(chat_id))
            .rev()
            .take(count)
            .cloned()
            .collect()
    };
    Ok(Json(json!({ "messages": messages })))
}

async fn get_message(
    State(state): State<AppState>,
    Path(mid): Path<String>,
) -> ApiResult<Message> {
    let db = state.db.read().await;
    db.messages
        .get(&mid)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Message {mid} not found")))
}

async fn send_message(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    Json(body): Json<NewMessage>,
) -> Result<Json<Value>, ApiError> {
    if body.text.is_none() && body.attachments.is_empty() {
        return Err(ApiError::bad_request("Message must have text or attachments"));
    }
    let mut db = state.db.write().await;
    let recipient = match (params.get("chat_id"), params.get("user_id")) {
        (Some(_), _) => {
            let chat_id = required_id(&params, "chat_id")?;
            let kind = db.chat(chat_id)?.chat.kind.clone();
            json!({ "chat_id": chat_id, "chat_type": kind })
        }
        (None, Some(_)) => {
            let user_id = required_id(&params, "user_id")?;
            json!({ "chat_type": "dialog", "user_id": user_id })
        }
        (None, None) => return Err(ApiError::bad_request("Missing chat_id or user_id")),
    };
    let seq = db.next_seq();
    let mid = format!("mid.{seq:016}");
    let message = Message {
        sender: db.bot.user.clone(),
        recipient,
        timestamp: BASE_TIMESTAMP + seq,
        body: json!({
            "mid": mid,
            "seq": seq,
            "text": body.text,
            "attachments": body.attachments,
        }),
    };
    db.messages.insert(mid, message.clone());
    Ok(Json(json!({ "message": message })))
}

async fn edit_message(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    Json(body): Json<NewMessage>,
) -> Result<Json<Value>, ApiError> {
    let mid = required(&params, "message_id")?;
    let mut db = state.db.write().await;
    let message = db
        .messages
        .get_mut(mid)
        .ok_or_else(|| ApiError::not_found(format!("Message {mid} not found")))?;
    if let Some(text) = body.text {
        message.body["text"] = json!(text);
    }
    if !body.attachments.is_empty() {
        message.body["attachments"] = json!(body.attachments);
    }
    Ok(success())
}

async fn delete_message(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Value>, ApiError> {
    let mid = required(&params, "message_id")?;
    let mut db = state.db.write().await;
    db.messages
        .remove(mid)
        .ok_or_else(|| ApiError::not_found(format!("Message {mid} not found")))?;
    Ok(success())
}

async fn answer_callback(
    Query(params): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    required(&params, "callback_id")?;
    if body.get("message").is_none() && body.get("notification").is_none() {
        return Err(ApiError::bad_request("Answer must have message or notification"));
    }
    Ok(success())
}

// ---------------------------------------------------------------------------
// Subscriptions
// ---------------------------------------------------------------------------

async fn list_subscriptions(State(state): State<AppState>) -> Json<Value> {
    let db = state.db.read().await;
    Json(json!({ "subscriptions": db.subscriptions }))
}

#[derive(Deserialize)]
struct SubscriptionBody {
    url: String,
    update_types: Option<Vec<String>>,
    version: Option<String>,
}

async fn subscribe(
    State(state): State<AppState>,
    Json(body): Json<SubscriptionBody>,
) -> Result<Json<Value>, ApiError> {
    if !body.url.starts_with("https://") {
        return Err(ApiError::bad_request("WebHook URL must use https"));
    }
    let mut db = state.db.write().await;
    let time = BASE_TIMESTAMP + db.next_seq();
    db.subscriptions.retain(|s| s.url != body.url);
    db.subscriptions.push(Subscription {
        url: body.url,
        time,
        update_types: body.update_types,
        version: body.version,
    });
    Ok(success())
}

async fn unsubscribe(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Value>, ApiError> {
    let url = required(&params, "url")?;
    let mut db = state.db.write().await;
    let before = db.subscriptions.len();
    db.subscriptions.retain(|s| s.url != url);
    if db.subscriptions.len() == before {
        return Ok(Json(json!({ "success": false, "message": "Subscription not found" })));
    }
    Ok(success())
}

// ---------------------------------------------------------------------------
// Uploads
// ---------------------------------------------------------------------------

async fn get_upload_url(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let kind = required(&params, "type")?;
    if !["image", "video", "audio", "file"].contains(&kind) {
        return Err(ApiError::bad_request(format!("Unknown upload type: {kind}")));
    }
    let host = headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("localhost");
    let seq = state.db.write().await.next_seq();
    let url = format!("http://{host}/upload/{kind}?sig={seq}");
    let body = match kind {
        "video" | "audio" => json!({ "url": url, "token": format!("{kind}-token-{seq}") }),
        _ => json!({ "url": url }),
    };
    Ok(Json(body))
}

async fn receive_upload(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    required(&params, "sig")?;
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    if !content_type.starts_with("multipart/form-data; boundary=") {
        return Err(ApiError::bad_request("Expected multipart/form-data"));
    }
    if !contains(&body, b"name=\"data\"") {
        return Err(ApiError::bad_request("Missing data part"));
    }
    let seq = state.db.write().await.next_seq();
    info!(kind = %kind, bytes = body.len(), "received upload");
    let response = match kind.as_str() {
        "image" => json!({ "photos": { "photo": { "token": format!("photo-token-{seq}") } } }),
        "file" => json!({ "token": format!("file-token-{seq}"), "file_id": seq }),
        _ => json!({}),
    };
    Ok(Json(response))
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}
