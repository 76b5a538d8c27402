//! Blocking client for the Max messaging-bot HTTP API.
//!
//! # Overview
//! Every operation maps onto exactly one REST endpoint: the facade builds an
//! `Endpoint`, `Client` performs one authenticated HTTP call through a
//! `Transport`, and the JSON response is decoded into a typed result.
//!
//! ```no_run
//! use maxbot::{Client, Config, Context};
//!
//! # fn main() -> maxbot::Result<()> {
//! let client = Client::new(Config::from_env()?)?;
//! let ctx = Context::background();
//! let bot = client.bots().get_bot(&ctx)?;
//! let page = client.chats().get_chats(&ctx, 20, 0)?;
//! println!("{} is in {} chats", bot.first_name(), page.chats.len());
//! # Ok(())
//! # }
//! ```
//!
//! # Design
//! - `Client` holds immutable configuration and an `Arc<dyn Transport>`; it
//!   is `Clone + Send + Sync`, and facades borrow it.
//! - Resource groups (`Bots`, `Chats`, `Messages`, `Subscriptions`,
//!   `Uploads`) are independent modules over the same dispatch primitive.
//! - The response body is an owned stream released on drop, so it is closed
//!   on every exit path.
//! - No retries, no caching. `Error::is_retryable` tells callers which
//!   failures are worth repeating.

pub mod bots;
pub mod chats;
pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod http;
pub mod messages;
pub mod multipart;
pub mod subscriptions;
pub mod transport;
pub mod types;
pub mod uploads;

pub use bots::Bots;
pub use chats::Chats;
pub use client::{Client, Endpoint, Payload, Query};
pub use config::{AuthPlacement, Config};
pub use context::{CancelToken, Context};
pub use error::{Error, Result};
pub use http::{HttpMethod, HttpRequest, HttpResponse, ResponseBody, Transport};
pub use messages::{MessageQuery, Messages, Recipient};
pub use multipart::Form;
pub use subscriptions::Subscriptions;
pub use transport::UreqTransport;
pub use types::*;
pub use uploads::Uploads;
