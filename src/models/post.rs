//! Post and search payload structures.

use serde::{Deserialize, Serialize};

/// Upstream post identifier.
pub type PostId = u64;

/// A post as seen in one search result page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub author: String,
    pub is_repost: bool,
    pub hashtags: Vec<String>,
}

/// One page of search results.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Posts, newest first
    pub posts: Vec<Post>,

    /// `search_metadata.max_id`: highest id covered by this page
    pub next_cursor_hint: PostId,

    /// Page size that was asked for
    pub requested_count: usize,
}

impl SearchResponse {
    /// A page is full when it returned as many posts as were requested.
    pub fn is_full_page(&self) -> bool {
        self.requested_count > 0 && self.posts.len() == self.requested_count
    }

    /// Id of the oldest post on the page.
    pub fn last_post_id(&self) -> Option<PostId> {
        self.posts.last().map(|p| p.id)
    }
}

/// Parameters of one search request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub text: String,
    pub count: usize,
    pub result_type: &'static str,
    pub since_id: Option<PostId>,
    pub max_id: Option<PostId>,
}

impl SearchQuery {
    /// First page of a cycle, bounded below by the cursor when one is set.
    pub fn recent(text: impl Into<String>, count: usize, cursor: PostId) -> Self {
        Self {
            text: text.into(),
            count,
            result_type: "recent",
            since_id: (cursor > 0).then_some(cursor),
            max_id: None,
        }
    }

    /// Follow-up page strictly older than `last_id`.
    ///
    /// Returns `None` when `last_id` is 0 and no older page can exist.
    pub fn next_page(&self, last_id: PostId) -> Option<Self> {
        let max_id = last_id.checked_sub(1)?;
        Some(Self {
            text: self.text.clone(),
            count: self.count,
            result_type: self.result_type,
            since_id: None,
            max_id: Some(max_id),
        })
    }

    /// Query string pairs in the order the API documents them.
    pub fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("q", self.text.clone()),
            ("count", self.count.to_string()),
            ("result_type", self.result_type.to_string()),
        ];
        if let Some(since_id) = self.since_id {
            params.push(("since_id", since_id.to_string()));
        }
        if let Some(max_id) = self.max_id {
            params.push(("max_id", max_id.to_string()));
        }
        params
    }
}

// --- Wire format (search/tweets.json) ---

/// Raw search payload.
#[derive(Debug, Deserialize)]
pub struct RawSearchResponse {
    pub statuses: Vec<RawStatus>,
    pub search_metadata: RawSearchMetadata,
}

#[derive(Debug, Deserialize)]
pub struct RawSearchMetadata {
    #[serde(default)]
    pub max_id: PostId,
}

#[derive(Debug, Deserialize)]
pub struct RawStatus {
    pub id: PostId,
    pub user: RawUser,
    #[serde(default)]
    pub entities: RawEntities,
    #[serde(default)]
    pub retweeted_status: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct RawUser {
    pub screen_name: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct RawEntities {
    #[serde(default)]
    pub hashtags: Vec<RawHashtag>,
}

#[derive(Debug, Deserialize)]
pub struct RawHashtag {
    pub text: String,
}

impl From<RawStatus> for Post {
    fn from(raw: RawStatus) -> Self {
        Self {
            id: raw.id,
            author: raw.user.screen_name,
            is_repost: raw.retweeted_status.is_some(),
            hashtags: raw.entities.hashtags.into_iter().map(|h| h.text).collect(),
        }
    }
}

impl RawSearchResponse {
    /// Convert into the domain page, remembering the requested page size.
    pub fn into_response(self, requested_count: usize) -> SearchResponse {
        SearchResponse {
            posts: self.statuses.into_iter().map(Post::from).collect(),
            next_cursor_hint: self.search_metadata.max_id,
            requested_count,
        }
    }
}
