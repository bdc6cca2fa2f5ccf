//! Request routing
//!
//! | Method | Path                | Result                                   |
//! |--------|---------------------|------------------------------------------|
//! | POST   | `/api/messages`     | broadcast body, `204`                    |
//! | GET    | `/api/messages`     | long poll: `200` + message, or `204`     |
//! | GET    | `/api/room/details` | `{"serverIP": ..., "port": ...}`         |
//! | GET    | anything else       | static file (login page without `?u=`)   |

use std::net::SocketAddr;
use std::sync::Arc;

use serde::Serialize;

use crate::net;
use crate::registry::{Message, SubscriberHandle};
use crate::relay::Broadcaster;

use super::assets::StaticFiles;
use super::http::{Method, Request, Response, Status};

pub const MESSAGES_PATH: &str = "/api/messages";
pub const ROOM_DETAILS_PATH: &str = "/api/room/details";

const INDEX_PAGE: &str = "index.html";
const LOGIN_PAGE: &str = "login.html";

/// What the connection should do next
#[derive(Debug)]
pub enum Action {
    /// Send this response now
    Respond(Response),
    /// Park on this registration, then answer with [`Router::poll_response`]
    LongPoll(SubscriberHandle),
}

#[derive(Serialize)]
struct RoomDetails {
    #[serde(rename = "serverIP")]
    server_ip: String,
    port: u16,
}

/// Dispatches requests to the relay and the static files
pub struct Router {
    broadcaster: Arc<Broadcaster>,
    assets: StaticFiles,
    advertised_address: Option<String>,
    port: u16,
}

impl Router {
    pub fn new(
        broadcaster: Arc<Broadcaster>,
        assets: StaticFiles,
        advertised_address: Option<String>,
        port: u16,
    ) -> Self {
        Self {
            broadcaster,
            assets,
            advertised_address,
            port,
        }
    }

    pub fn broadcaster(&self) -> &Arc<Broadcaster> {
        &self.broadcaster
    }

    /// Handle one request
    pub async fn route(&self, req: &Request, peer: SocketAddr) -> Action {
        match req.path.as_str() {
            MESSAGES_PATH => match req.method {
                Method::Post => {
                    tracing::debug!(peer = %peer, bytes = req.body.len(), "Message received");
                    self.broadcaster.publish(req.body.clone());
                    Action::Respond(Response::no_content())
                }
                Method::Get => Action::LongPoll(self.broadcaster.subscribe()),
                _ => Action::Respond(method_not_allowed("GET, POST")),
            },
            ROOM_DETAILS_PATH => match req.method {
                Method::Get => {
                    tracing::debug!(peer = %peer, "Room details requested");
                    Action::Respond(self.room_details().await)
                }
                _ => Action::Respond(method_not_allowed("GET")),
            },
            _ => match req.method {
                Method::Get => Action::Respond(self.static_file(req, peer).await),
                _ => Action::Respond(method_not_allowed("GET")),
            },
        }
    }

    /// Response for a finished long poll
    pub fn poll_response(message: Option<Message>) -> Response {
        match message {
            Some(message) => Response::ok("text/plain; charset=utf-8", message.into_bytes()),
            None => Response::no_content(),
        }
    }

    async fn room_details(&self) -> Response {
        let server_ip = match self.advertised_address.as_deref() {
            Some(addr) if !net::is_unspecified(addr) => addr.to_string(),
            _ => net::local_ip().await,
        };

        Response::json(&RoomDetails {
            server_ip,
            port: self.port,
        })
    }

    async fn static_file(&self, req: &Request, peer: SocketAddr) -> Response {
        let requested = match StaticFiles::normalize(req.path.trim_start_matches('/')) {
            Some(name) if name.is_empty() => INDEX_PAGE.to_string(),
            Some(name) => name,
            None => return Response::text(Status::NOT_FOUND, "Not Found"),
        };

        let name = match req.query_param("u") {
            Some(username) => {
                tracing::info!(peer = %peer, username = %username, "Connected with username");
                self.broadcaster.announce_join(username);
                requested.as_str()
            }
            None if requested == INDEX_PAGE => {
                tracing::debug!(peer = %peer, "No username; serving login page");
                LOGIN_PAGE
            }
            None => requested.as_str(),
        };

        match self.assets.load(name).await {
            Some(asset) => Response::ok(asset.content_type, asset.body),
            None => Response::text(Status::NOT_FOUND, "Not Found"),
        }
    }
}

fn method_not_allowed(allow: &str) -> Response {
    Response::text(Status::METHOD_NOT_ALLOWED, "Method Not Allowed").header("Allow", allow)
}
