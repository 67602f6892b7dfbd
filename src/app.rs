use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::info;

use crate::aggregate::{DetailAggregator, DetailSource};
use crate::api;
use crate::auth;
use crate::config;
use crate::data::{
    self, ApiLivestreamService, ApiPostService, ApiRoleService, ApiUserService, LivestreamService,
    PostService, RoleService, UserService,
};
use crate::loader::CollectionLoader;
use crate::stats::DashboardStats;
use crate::storage;
use crate::view;

const LOAD_TIMEOUT: Duration = Duration::from_secs(60);

struct Services {
    posts: Arc<dyn PostService>,
    users: Arc<dyn UserService>,
    streams: Arc<dyn LivestreamService>,
    roles: Arc<dyn RoleService>,
    detail_source: Arc<dyn DetailSource>,
}

pub fn run() -> Result<()> {
    let cfg = config::load(config::LoadOptions::default()).context("load config")?;
    let store = Arc::new(
        storage::Store::open(storage::Options {
            path: cfg.storage.path.clone(),
        })
        .context("open storage")?,
    );

    let services = build_services(&cfg, store.clone())?;

    let mut users = CollectionLoader::new();
    {
        let svc = services.users.clone();
        users.activate(move || svc.list_users());
    }
    let mut posts = CollectionLoader::new();
    {
        let svc = services.posts.clone();
        posts.activate(move || svc.list_images());
    }
    let mut streams = CollectionLoader::new();
    {
        let svc = services.streams.clone();
        streams.activate(move || {
            svc.list_rooms()
                .map(|rooms| rooms.into_iter().map(api::Livestream::from).collect())
        });
    }

    users.wait_idle(LOAD_TIMEOUT);
    posts.wait_idle(LOAD_TIMEOUT);
    streams.wait_idle(LOAD_TIMEOUT);

    let mut aggregator = DetailAggregator::new(services.detail_source.clone(), cfg.fetch.workers);
    let ids = view::distinct_ids(posts.items());
    aggregator.reconcile(&ids);
    aggregator.wait_idle(LOAD_TIMEOUT);

    let stats = DashboardStats::compute(
        users.items(),
        posts.items(),
        streams.items(),
        Utc::now().date_naive(),
    );
    print_dashboard(&stats);

    if users.failed() {
        println!("\nFailed to load users. Check your token and try again.");
    }

    let rows = view::post_rows(
        posts.items(),
        aggregator.details(),
        aggregator.comment_counts(),
        aggregator.loading(),
    );
    print_posts(&rows);
    print_streams(streams.items());

    Ok(())
}

fn build_services(cfg: &config::Config, store: Arc<storage::Store>) -> Result<Services> {
    if cfg.api.base_url.trim().is_empty() {
        info!("no api base url configured; using sample data");
        let posts = Arc::new(data::MockPostService);
        return Ok(Services {
            posts: posts.clone(),
            users: Arc::new(data::MockUserService),
            streams: Arc::new(data::MockLivestreamService),
            roles: Arc::new(data::MockRoleService),
            detail_source: posts,
        });
    }

    let provider = Arc::new(auth::StoreTokenProvider::new(store));
    let client = Arc::new(api::Client::new(
        provider,
        api::ClientConfig {
            user_agent: cfg.api.user_agent.clone(),
            base_url: Some(cfg.api.base_url.clone()),
            timeout: Some(cfg.api.timeout),
            http_client: None,
        },
    )?);
    let posts = Arc::new(ApiPostService::new(client.clone()));
    Ok(Services {
        posts: posts.clone(),
        users: Arc::new(ApiUserService::new(client.clone())),
        streams: Arc::new(ApiLivestreamService::new(client.clone())),
        roles: Arc::new(ApiRoleService::new(client)),
        detail_source: posts,
    })
}

/// One-shot moderation actions driven from the command line.
pub enum Moderation {
    DeleteUser(i64),
    DeleteComment(String),
    PostComment {
        post_id: String,
        text: String,
        user_id: String,
    },
    AssignRole {
        user_id: i64,
        role: String,
    },
    CreateRole {
        name: String,
        description: String,
        permissions: Vec<String>,
    },
    ListRoles,
}

pub fn moderate(action: Moderation) -> Result<()> {
    let cfg = config::load(config::LoadOptions::default()).context("load config")?;
    let store = Arc::new(
        storage::Store::open(storage::Options {
            path: cfg.storage.path.clone(),
        })
        .context("open storage")?,
    );
    let services = build_services(&cfg, store)?;

    match action {
        Moderation::DeleteUser(id) => {
            services.users.delete_user(id)?;
            println!("User {id} deleted.");
        }
        Moderation::DeleteComment(id) => {
            services.posts.delete_comment(&id)?;
            println!("Comment {id} deleted.");
        }
        Moderation::PostComment {
            post_id,
            text,
            user_id,
        } => {
            services.posts.post_comment(&post_id, &text, &user_id)?;
            println!("Comment posted on {post_id}.");
        }
        Moderation::AssignRole { user_id, role } => {
            services.roles.assign_role(user_id, &role)?;
            println!("Role {role} assigned to user {user_id}.");
        }
        Moderation::CreateRole {
            name,
            description,
            permissions,
        } => {
            services.roles.create_role(&api::CreateRole {
                name: name.clone(),
                description,
                permissions,
            })?;
            println!("Role {name} created.");
        }
        Moderation::ListRoles => {
            let roles = services.roles.list_roles()?;
            if roles.is_empty() {
                println!("No roles defined.");
            }
            for role in roles {
                println!("  {:<12} {}", role.name, role.description);
            }
        }
    }
    Ok(())
}

fn print_dashboard(stats: &DashboardStats) {
    println!("Dashboard");
    println!(
        "  Users        {:>6}   ({} active)",
        stats.total_users, stats.active_users
    );
    println!(
        "  Livestreams  {:>6}   ({} currently live)",
        stats.total_livestreams, stats.active_livestreams
    );
    println!("  Posts        {:>6}", stats.total_posts);

    if stats.livestreams_per_day.iter().any(|day| day.count > 0) {
        println!("\n  Livestreams, last 7 days:");
        for day in &stats.livestreams_per_day {
            println!("    {}  {}", day.date, "#".repeat(day.count as usize));
        }
    }
}

fn print_posts(rows: &[view::PostRow]) {
    if rows.is_empty() {
        println!("\nNo posts found.");
        return;
    }
    println!("\nPosts");
    for row in rows {
        let comments = row
            .comment_count
            .map(|count| count.to_string())
            .unwrap_or_else(|| "-".into());
        println!(
            "  {:<12} {:<40} by {:<20} comments: {}",
            row.summary.id, row.summary.title, row.creator, comments
        );
    }
}

fn print_streams(streams: &[api::Livestream]) {
    if streams.is_empty() {
        return;
    }
    println!("\nLivestreams");
    for stream in streams {
        let state = if stream.is_active { "LIVE" } else { "ended" };
        println!(
            "  {:<6} {:<40} {} since {}",
            stream.id,
            stream.title,
            state,
            stream.started_at.format("%Y-%m-%d %H:%M")
        );
    }
}
