use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use reqwest::blocking::{Client as HttpClient, Response};
use reqwest::header::{AUTHORIZATION, USER_AGENT};
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://api.cast.example/v1/";

/// Supplies the bearer token persisted by the sign-in flow. `Ok(None)` means
/// the operator is signed out.
pub trait TokenProvider: Send + Sync {
    fn token(&self) -> Result<Option<String>>;
}

/// How a request treats the stored bearer token. The remote API is uneven
/// here: user and role endpoints reject anonymous calls, image and comment
/// endpoints accept them, and the livestream listing ignores auth entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Auth {
    Required,
    Optional,
    None,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("api: missing auth token")]
    MissingToken,
    #[error("api: unauthorized")]
    Unauthorized,
    #[error("api: forbidden")]
    Forbidden,
    #[error("api: not found")]
    NotFound,
    #[error("api: rate limited: {0}")]
    RateLimited(String),
    #[error("api: unexpected status {status}: {body}")]
    Status { status: StatusCode, body: String },
}

#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub user_agent: String,
    pub base_url: Option<String>,
    pub timeout: Option<Duration>,
    pub http_client: Option<HttpClient>,
}

pub struct Client {
    token_provider: Arc<dyn TokenProvider>,
    http: HttpClient,
    user_agent: String,
    base_url: Url,
}

impl Client {
    pub fn new(token_provider: Arc<dyn TokenProvider>, config: ClientConfig) -> Result<Self> {
        if config.user_agent.trim().is_empty() {
            bail!("cast client user agent required");
        }
        let base = config
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let base_url = Url::parse(&base)?;
        let http = match config.http_client {
            Some(client) => client,
            None => HttpClient::builder()
                .timeout(config.timeout.unwrap_or(Duration::from_secs(20)))
                .build()?,
        };

        Ok(Client {
            token_provider,
            http,
            user_agent: config.user_agent,
            base_url,
        })
    }

    pub fn list_images(&self) -> Result<Vec<ImageSummary>> {
        let resp = self.request(Method::GET, "images", Auth::Optional, &[], None)?;
        let envelope: DataEnvelope<Vec<ImageSummary>> = resp.json()?;
        Ok(envelope.data.unwrap_or_default())
    }

    pub fn image_detail(&self, id: &str) -> Result<Option<ImageDetail>> {
        let path = format!("images/{}", id);
        let resp = self.request(Method::GET, &path, Auth::Optional, &[], None)?;
        let envelope: DataEnvelope<ImageDetail> = resp.json()?;
        Ok(envelope.data)
    }

    /// Lists comments for a post. The endpoint answers 404 when a post has no
    /// comments yet, and sometimes returns a lone object instead of a list;
    /// both shapes normalize to a plain vector.
    pub fn comments(&self, post_id: &str) -> Result<Vec<CommentItem>> {
        let params = [("postId", post_id.to_string())];
        let resp = match self.request(Method::GET, "comments", Auth::Optional, &params, None) {
            Ok(resp) => resp,
            Err(err) => {
                if matches!(err.downcast_ref::<ApiError>(), Some(ApiError::NotFound)) {
                    warn!(post_id, "no comments found for post");
                    return Ok(Vec::new());
                }
                return Err(err);
            }
        };
        let envelope: DataEnvelope<OneOrMany<CommentItem>> = resp.json()?;
        Ok(match envelope.data {
            Some(OneOrMany::Many(items)) => items,
            Some(OneOrMany::One(item)) => vec![item],
            None => Vec::new(),
        })
    }

    pub fn post_comment(&self, post_id: &str, text: &str, user_id: &str) -> Result<()> {
        if text.trim().is_empty() {
            bail!("cast: comment text is required");
        }
        let path = format!("comments/{}", post_id);
        let body = json!({ "text": text, "userId": user_id });
        self.request(Method::POST, &path, Auth::Optional, &[], Some(body))?;
        Ok(())
    }

    /// Removal is only acknowledged by a bare 200; any other 2xx means the
    /// comment was not actually deleted upstream.
    pub fn delete_comment(&self, comment_id: &str) -> Result<()> {
        let path = format!("comments/{}", comment_id);
        let resp = self.request(Method::DELETE, &path, Auth::Optional, &[], None)?;
        expect_ok(resp)
    }

    pub fn list_users(&self) -> Result<Vec<UserRecord>> {
        let resp = self.request(Method::GET, "users", Auth::Required, &[], None)?;
        let envelope: ResultEnvelope<Vec<UserRecord>> = resp.json()?;
        Ok(envelope.result.unwrap_or_default())
    }

    pub fn delete_user(&self, id: i64) -> Result<()> {
        let path = format!("users/{}", id);
        let resp = self.request(Method::DELETE, &path, Auth::Required, &[], None)?;
        expect_ok(resp)
    }

    pub fn list_rooms(&self) -> Result<Vec<RoomRecord>> {
        let resp = self.request(Method::GET, "livestreams", Auth::None, &[], None)?;
        let rooms: Vec<RoomRecord> = resp.json()?;
        Ok(rooms)
    }

    pub fn list_roles(&self) -> Result<Vec<RoleRecord>> {
        let resp = self.request(Method::GET, "roles", Auth::Required, &[], None)?;
        let envelope: ResultEnvelope<Vec<RoleRecord>> = resp.json()?;
        Ok(envelope.result.unwrap_or_default())
    }

    pub fn create_role(&self, role: &CreateRole) -> Result<()> {
        if role.name.trim().is_empty() {
            bail!("cast: role name is required");
        }
        let body = serde_json::to_value(role).context("cast: encode role")?;
        self.request(Method::POST, "roles", Auth::Required, &[], Some(body))?;
        Ok(())
    }

    pub fn assign_role(&self, user_id: i64, role: &str) -> Result<()> {
        if role.trim().is_empty() {
            bail!("cast: role name is required");
        }
        let path = format!("users/{}/roles", user_id);
        let body = json!({ "role": role });
        self.request(Method::PUT, &path, Auth::Required, &[], Some(body))?;
        Ok(())
    }

    fn request(
        &self,
        method: Method,
        path: &str,
        auth: Auth,
        params: &[(&str, String)],
        body: Option<serde_json::Value>,
    ) -> Result<Response> {
        let token = self.resolve_token(auth)?;

        let mut url = self.base_url.join(path)?;
        if !params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in params {
                pairs.append_pair(k, v);
            }
        }

        let mut req = self.http.request(method, url);
        req = req.header(USER_AGENT, self.user_agent.clone());
        if let Some(token) = token {
            req = req.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        if let Some(body) = body {
            req = req.json(&body);
        }

        let resp = req.send()?;
        if resp.status().is_success() {
            Ok(resp)
        } else {
            let status = resp.status();
            let body = resp.text().unwrap_or_default();
            match status.as_u16() {
                401 => Err(ApiError::Unauthorized.into()),
                403 => Err(ApiError::Forbidden.into()),
                404 => Err(ApiError::NotFound.into()),
                429 => Err(ApiError::RateLimited(body).into()),
                _ => Err(ApiError::Status { status, body }.into()),
            }
        }
    }

    /// Required auth fails locally, before any request leaves the process,
    /// when no token is stored. Optional auth degrades to an anonymous call.
    fn resolve_token(&self, auth: Auth) -> Result<Option<String>> {
        match auth {
            Auth::None => Ok(None),
            Auth::Required => match self.token_provider.token()? {
                Some(token) => Ok(Some(token)),
                None => Err(ApiError::MissingToken.into()),
            },
            Auth::Optional => Ok(self.token_provider.token().unwrap_or_else(|err| {
                warn!("token lookup failed, sending anonymous request: {err:#}");
                None
            })),
        }
    }
}

fn expect_ok(resp: Response) -> Result<()> {
    let status = resp.status();
    if status == StatusCode::OK {
        Ok(())
    } else {
        let body = resp.text().unwrap_or_default();
        Err(ApiError::Status { status, body }.into())
    }
}

#[derive(Debug, Clone, Deserialize)]
struct DataEnvelope<T> {
    data: Option<T>,
}

#[derive(Debug, Clone, Deserialize)]
struct ResultEnvelope<T> {
    result: Option<T>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageSummary {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
    pub creator_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageDetail {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub creator: Option<Creator>,
}

impl ImageDetail {
    pub fn creator_name(&self) -> Option<&str> {
        self.creator.as_ref().and_then(|c| c.name.as_deref())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Creator {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentItem {
    pub id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub user: Option<CommentAuthor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentAuthor {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub roles: Vec<RoleRef>,
}

impl UserRecord {
    pub fn is_active(&self) -> bool {
        self.roles.iter().any(|role| role.name == "active")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleRef {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomRecord {
    pub id: i64,
    pub room_name: String,
    pub status: String,
    #[serde(default)]
    pub max_participants: i64,
    #[serde(default)]
    pub thumbnail: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub streamer_id: i64,
    pub category_id: i64,
}

/// Presentation shape for a livestream room, as the dashboard renders it.
#[derive(Debug, Clone)]
pub struct Livestream {
    pub id: i64,
    pub title: String,
    pub is_active: bool,
    pub thumbnail_url: String,
    pub started_at: DateTime<Utc>,
    pub streamer_id: i64,
    pub category_id: i64,
    pub max_participants: i64,
}

impl From<RoomRecord> for Livestream {
    fn from(room: RoomRecord) -> Self {
        Livestream {
            id: room.id,
            title: room.room_name,
            is_active: room.status == "active",
            thumbnail_url: room.thumbnail,
            started_at: room.created_at,
            streamer_id: room.streamer_id,
            category_id: room.category_id,
            max_participants: room.max_participants,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleRecord {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Permission {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRole {
    pub name: String,
    pub description: String,
    pub permissions: Vec<String>,
}
