use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::api::{ImageDetail, ImageSummary, Livestream, UserRecord};

/// Collapses duplicate post ids before they reach the detail aggregator,
/// preserving first-seen order.
pub fn distinct_ids(summaries: &[ImageSummary]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut ids = Vec::new();
    for summary in summaries {
        if seen.insert(summary.id.as_str()) {
            ids.push(summary.id.clone());
        }
    }
    ids
}

/// Creator column for a joined post row. While details are still loading a
/// missing entry shows a placeholder; once loading settles it falls back to
/// the raw creator id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreatorLabel {
    Name(String),
    Pending,
    Unresolved(String),
}

impl fmt::Display for CreatorLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CreatorLabel::Name(name) => f.pad(name),
            CreatorLabel::Pending => f.pad("loading..."),
            CreatorLabel::Unresolved(id) => f.pad(id),
        }
    }
}

/// One presentation-ready post: summary joined with whatever detail data has
/// arrived so far.
#[derive(Debug, Clone)]
pub struct PostRow {
    pub summary: ImageSummary,
    pub detail: Option<ImageDetail>,
    pub comment_count: Option<u64>,
    pub creator: CreatorLabel,
}

pub fn post_rows(
    summaries: &[ImageSummary],
    details: &HashMap<String, ImageDetail>,
    comment_counts: &HashMap<String, u64>,
    loading: bool,
) -> Vec<PostRow> {
    summaries
        .iter()
        .map(|summary| {
            let detail = details.get(&summary.id).cloned();
            let creator = match detail.as_ref().and_then(|d| d.creator_name()) {
                Some(name) => CreatorLabel::Name(name.to_string()),
                None if loading => CreatorLabel::Pending,
                None => CreatorLabel::Unresolved(summary.creator_id.clone()),
            };
            PostRow {
                detail,
                comment_count: comment_counts.get(&summary.id).copied(),
                creator,
                summary: summary.clone(),
            }
        })
        .collect()
}

pub fn filter_posts(posts: &[ImageSummary], term: &str) -> Vec<ImageSummary> {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return posts.to_vec();
    }
    posts
        .iter()
        .filter(|post| post.title.to_lowercase().contains(&term))
        .cloned()
        .collect()
}

pub fn filter_streams(streams: &[Livestream], term: &str) -> Vec<Livestream> {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return streams.to_vec();
    }
    streams
        .iter()
        .filter(|stream| stream.title.to_lowercase().contains(&term))
        .cloned()
        .collect()
}

pub fn filter_users(users: &[UserRecord], term: &str) -> Vec<UserRecord> {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return users.to_vec();
    }
    users
        .iter()
        .filter(|user| user.username.to_lowercase().contains(&term))
        .cloned()
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PostTab {
    #[default]
    All,
    WithImage,
    TextOnly,
}

impl PostTab {
    pub fn matches(&self, post: &ImageSummary) -> bool {
        match self {
            PostTab::All => true,
            PostTab::WithImage => post.url.is_some(),
            PostTab::TextOnly => post.url.is_none(),
        }
    }
}

pub fn posts_in_tab(posts: &[ImageSummary], tab: PostTab) -> Vec<ImageSummary> {
    posts
        .iter()
        .filter(|post| tab.matches(post))
        .cloned()
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamTab {
    #[default]
    All,
    Live,
    Ended,
}

impl StreamTab {
    pub fn matches(&self, stream: &Livestream) -> bool {
        match self {
            StreamTab::All => true,
            StreamTab::Live => stream.is_active,
            StreamTab::Ended => !stream.is_active,
        }
    }
}

pub fn streams_in_tab(streams: &[Livestream], tab: StreamTab) -> Vec<Livestream> {
    streams
        .iter()
        .filter(|stream| tab.matches(stream))
        .cloned()
        .collect()
}

pub fn posts_by_creator(posts: &[ImageSummary], creator_id: &str) -> Vec<ImageSummary> {
    posts
        .iter()
        .filter(|post| post.creator_id == creator_id)
        .cloned()
        .collect()
}

pub fn streams_by_streamer(streams: &[Livestream], streamer_id: i64) -> Vec<Livestream> {
    streams
        .iter()
        .filter(|stream| stream.streamer_id == streamer_id)
        .cloned()
        .collect()
}
