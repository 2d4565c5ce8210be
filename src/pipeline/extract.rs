//! Project reference extraction from a search page.

use std::collections::{BTreeMap, HashSet};

use crate::models::{PostId, ProjectId, ProjectPattern, SearchResponse};

/// Post ids per project found on one page.
pub type ProjectBatch = BTreeMap<ProjectId, Vec<PostId>>;

/// Map each project referenced on the page to the ids of the posts that
/// referenced it.
///
/// Reposts and posts from handles outside `allowlist` (lowercase) are ignored.
/// A post tagging the same project twice contributes its id twice.
pub fn extract(
    response: &SearchResponse,
    allowlist: &HashSet<String>,
    pattern: &ProjectPattern,
) -> ProjectBatch {
    let mut projects = ProjectBatch::new();

    for post in &response.posts {
        if post.is_repost {
            continue;
        }
        if !allowlist.contains(&post.author.to_lowercase()) {
            continue;
        }

        for hashtag in &post.hashtags {
            if let Some(project) = pattern.project_of(hashtag) {
                projects.entry(project).or_default().push(post.id);
            }
        }
    }

    projects
}
