use anyhow::{Context, Result};
use chrono::{Duration as ChronoDuration, Utc};
use rand::Rng;
use std::sync::Arc;

use crate::aggregate::DetailSource;
use crate::api::{
    self, CommentItem, CreateRole, Creator, ImageDetail, ImageSummary, RoleRecord, RoleRef,
    RoomRecord, UserRecord,
};

pub trait PostService: Send + Sync {
    fn list_images(&self) -> Result<Vec<ImageSummary>>;
    fn image_detail(&self, id: &str) -> Result<Option<ImageDetail>>;
    fn comments(&self, post_id: &str) -> Result<Vec<CommentItem>>;
    fn comment_count(&self, post_id: &str) -> Result<u64>;
    fn post_comment(&self, post_id: &str, text: &str, user_id: &str) -> Result<()>;
    fn delete_comment(&self, comment_id: &str) -> Result<()>;
}

pub trait UserService: Send + Sync {
    fn list_users(&self) -> Result<Vec<UserRecord>>;
    fn delete_user(&self, id: i64) -> Result<()>;
}

pub trait LivestreamService: Send + Sync {
    fn list_rooms(&self) -> Result<Vec<RoomRecord>>;
}

pub trait RoleService: Send + Sync {
    fn list_roles(&self) -> Result<Vec<RoleRecord>>;
    fn create_role(&self, role: &CreateRole) -> Result<()>;
    fn assign_role(&self, user_id: i64, role: &str) -> Result<()>;
}

pub struct ApiPostService {
    client: Arc<api::Client>,
}

impl ApiPostService {
    pub fn new(client: Arc<api::Client>) -> Self {
        Self { client }
    }
}

impl PostService for ApiPostService {
    fn list_images(&self) -> Result<Vec<ImageSummary>> {
        self.client.list_images().context("fetch image listing")
    }

    fn image_detail(&self, id: &str) -> Result<Option<ImageDetail>> {
        self.client.image_detail(id).context("fetch image detail")
    }

    fn comments(&self, post_id: &str) -> Result<Vec<CommentItem>> {
        self.client.comments(post_id).context("fetch comments")
    }

    fn comment_count(&self, post_id: &str) -> Result<u64> {
        Ok(self.comments(post_id)?.len() as u64)
    }

    fn post_comment(&self, post_id: &str, text: &str, user_id: &str) -> Result<()> {
        self.client
            .post_comment(post_id, text, user_id)
            .context("post comment")
    }

    fn delete_comment(&self, comment_id: &str) -> Result<()> {
        self.client
            .delete_comment(comment_id)
            .context("delete comment")
    }
}

impl DetailSource for ApiPostService {
    fn detail(&self, id: &str) -> Result<Option<ImageDetail>> {
        self.image_detail(id)
    }

    fn comment_count(&self, id: &str) -> Result<u64> {
        PostService::comment_count(self, id)
    }
}

pub struct ApiUserService {
    client: Arc<api::Client>,
}

impl ApiUserService {
    pub fn new(client: Arc<api::Client>) -> Self {
        Self { client }
    }
}

impl UserService for ApiUserService {
    fn list_users(&self) -> Result<Vec<UserRecord>> {
        self.client.list_users().context("fetch user listing")
    }

    fn delete_user(&self, id: i64) -> Result<()> {
        self.client.delete_user(id).context("delete user")
    }
}

pub struct ApiLivestreamService {
    client: Arc<api::Client>,
}

impl ApiLivestreamService {
    pub fn new(client: Arc<api::Client>) -> Self {
        Self { client }
    }
}

impl LivestreamService for ApiLivestreamService {
    fn list_rooms(&self) -> Result<Vec<RoomRecord>> {
        self.client.list_rooms().context("fetch livestream rooms")
    }
}

pub struct ApiRoleService {
    client: Arc<api::Client>,
}

impl ApiRoleService {
    pub fn new(client: Arc<api::Client>) -> Self {
        Self { client }
    }
}

impl RoleService for ApiRoleService {
    fn list_roles(&self) -> Result<Vec<RoleRecord>> {
        self.client.list_roles().context("fetch role listing")
    }

    fn create_role(&self, role: &CreateRole) -> Result<()> {
        self.client.create_role(role).context("create role")
    }

    fn assign_role(&self, user_id: i64, role: &str) -> Result<()> {
        self.client
            .assign_role(user_id, role)
            .context("assign role")
    }
}

// Offline sample data, for browsing the dashboard without an API endpoint
// configured.

const FIRST_NAMES: [&str; 8] = [
    "John", "Jane", "Robert", "Sarah", "Michael", "Emma", "David", "Olivia",
];

#[derive(Default)]
pub struct MockPostService;

impl PostService for MockPostService {
    fn list_images(&self) -> Result<Vec<ImageSummary>> {
        let mut rng = rand::thread_rng();
        Ok((1..=24)
            .map(|i| ImageSummary {
                id: format!("post-{i}"),
                title: format!("Post Title {i}"),
                url: (i % 3 == 0).then(|| format!("https://picsum.photos/id/{i}/500/300")),
                creator_id: format!("user-{}", rng.gen_range(1..=8)),
            })
            .collect())
    }

    fn image_detail(&self, id: &str) -> Result<Option<ImageDetail>> {
        let index = id
            .rsplit('-')
            .next()
            .and_then(|n| n.parse::<usize>().ok())
            .unwrap_or(0);
        Ok(Some(ImageDetail {
            id: id.to_string(),
            title: format!("Post Title {index}"),
            url: format!("https://picsum.photos/id/{index}/500/300"),
            creator: Some(Creator {
                name: Some(format!("Channel{}", index % 8 + 1)),
            }),
        }))
    }

    fn comments(&self, post_id: &str) -> Result<Vec<CommentItem>> {
        Ok(vec![CommentItem {
            id: format!("c-{post_id}-1"),
            text: "Sample comment provided for offline browsing.".into(),
            user_id: Some("user-1".into()),
            user: Some(api::CommentAuthor {
                name: Some("Channel1".into()),
                email: None,
            }),
        }])
    }

    fn comment_count(&self, post_id: &str) -> Result<u64> {
        Ok(self.comments(post_id)?.len() as u64)
    }

    fn post_comment(&self, _post_id: &str, _text: &str, _user_id: &str) -> Result<()> {
        Ok(())
    }

    fn delete_comment(&self, _comment_id: &str) -> Result<()> {
        Ok(())
    }
}

impl DetailSource for MockPostService {
    fn detail(&self, id: &str) -> Result<Option<ImageDetail>> {
        self.image_detail(id)
    }

    fn comment_count(&self, id: &str) -> Result<u64> {
        PostService::comment_count(self, id)
    }
}

#[derive(Default)]
pub struct MockUserService;

impl UserService for MockUserService {
    fn list_users(&self) -> Result<Vec<UserRecord>> {
        Ok((1..=8)
            .map(|i| UserRecord {
                id: i,
                username: format!("{}{}", FIRST_NAMES[(i as usize - 1) % 8], i),
                roles: if i % 4 == 0 {
                    vec![RoleRef { name: "USER".into() }]
                } else {
                    vec![
                        RoleRef {
                            name: "USER".into(),
                        },
                        RoleRef {
                            name: "active".into(),
                        },
                    ]
                },
            })
            .collect())
    }

    fn delete_user(&self, _id: i64) -> Result<()> {
        Ok(())
    }
}

#[derive(Default)]
pub struct MockLivestreamService;

impl LivestreamService for MockLivestreamService {
    fn list_rooms(&self) -> Result<Vec<RoomRecord>> {
        let mut rng = rand::thread_rng();
        let now = Utc::now();
        Ok((1..=12)
            .map(|i| {
                let started = now - ChronoDuration::days(rng.gen_range(0..7));
                let status = if i % 5 == 0 { "active" } else { "ended" };
                RoomRecord {
                    id: i,
                    room_name: format!("Livestream Title {i}"),
                    status: status.into(),
                    max_participants: 500,
                    thumbnail: format!("https://picsum.photos/id/{}/500/300", i + 30),
                    created_at: started,
                    updated_at: started,
                    streamer_id: (i % 8) + 1,
                    category_id: (i % 3) + 1,
                }
            })
            .collect())
    }
}

#[derive(Default)]
pub struct MockRoleService;

impl RoleService for MockRoleService {
    fn list_roles(&self) -> Result<Vec<RoleRecord>> {
        Ok(vec![
            RoleRecord {
                name: "ADMIN".into(),
                description: "Full moderation access".into(),
                permissions: vec![],
            },
            RoleRecord {
                name: "MOD".into(),
                description: "Can mute and report".into(),
                permissions: vec![],
            },
            RoleRecord {
                name: "USER".into(),
                description: "Default role".into(),
                permissions: vec![],
            },
        ])
    }

    fn create_role(&self, _role: &CreateRole) -> Result<()> {
        Ok(())
    }

    fn assign_role(&self, _user_id: i64, _role: &str) -> Result<()> {
        Ok(())
    }
}
