//! Paginated fetcher for archived VOD chat over the public GraphQL
//! endpoint. Comments come back in playback order; offsets become the
//! message timestamps, so a replay drives the pipeline in stream time.

use crate::error::VodError;
use crate::http::{default_agent, retry_delay, should_retry};
use crate::types::ChatMessage;
use serde::Deserialize;
use serde_json::json;
use std::thread;
use std::time::Duration;

const GQL_URL: &str = "https://gql.twitch.tv/gql";
pub const DEFAULT_CLIENT_ID: &str = "kd1unb4b3q4t58fwlpcbzcbnm76a8fp";

const OPERATION_NAME: &str = "VideoCommentsByOffsetOrCursor";
const PERSISTED_QUERY_HASH: &str =
    "b70a3591ff0f4e0313d126c6a1502d79a1c02baebb288227c582044aa76adf6a";

/// Hard cap on the cursor walk.
const MAX_PAGES: usize = 50_000;
const MAX_CONSECUTIVE_ERRORS: usize = 10;
/// Courtesy delay between pages.
const PAGE_DELAY: Duration = Duration::from_millis(100);

pub struct VodChat {
    agent: ureq::Agent,
    client_id: String,
}

impl VodChat {
    pub fn new() -> Self {
        Self::with_client_id(DEFAULT_CLIENT_ID)
    }

    pub fn with_client_id(client_id: &str) -> Self {
        Self {
            agent: default_agent(),
            client_id: client_id.to_string(),
        }
    }

    /// Fetch all comments for `video_id` in playback order. `progress`
    /// is invoked with the running message count after each page.
    pub fn fetch(
        &self,
        video_id: u64,
        mut progress: Option<&mut dyn FnMut(usize)>,
    ) -> Result<Vec<ChatMessage>, VodError> {
        let mut messages = Vec::new();
        let mut cursor: Option<String> = None;
        let mut consecutive_errors = 0usize;

        for page_index in 0..MAX_PAGES {
            let body = request_body(video_id, cursor.as_deref());
            let response = self
                .agent
                .post(GQL_URL)
                .header("Client-ID", self.client_id.as_str())
                .send_json(&body);

            let raw = match response {
                Ok(response) => response
                    .into_body()
                    .read_to_string()
                    .map_err(|err| VodError::Network(format!("{err}")))?,
                Err(err) => {
                    if !should_retry(&err) {
                        return Err(VodError::Network(err.to_string()));
                    }
                    consecutive_errors += 1;
                    if consecutive_errors > MAX_CONSECUTIVE_ERRORS {
                        return Err(VodError::TooManyErrors(err.to_string()));
                    }
                    tracing::warn!(
                        error = %err,
                        attempt = consecutive_errors,
                        "VOD page fetch failed; backing off"
                    );
                    thread::sleep(retry_delay(consecutive_errors));
                    continue;
                }
            };
            consecutive_errors = 0;

            let page = parse_page(&raw, video_id)?;
            messages.extend(page.messages);
            tracing::debug!(page_index, total = messages.len(), "VOD page fetched");
            if let Some(progress) = progress.as_deref_mut() {
                progress(messages.len());
            }

            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
            thread::sleep(PAGE_DELAY);
        }

        Ok(messages)
    }
}

impl Default for VodChat {
    fn default() -> Self {
        Self::new()
    }
}

fn request_body(video_id: u64, cursor: Option<&str>) -> serde_json::Value {
    let variables = match cursor {
        Some(cursor) => json!({ "videoID": video_id.to_string(), "cursor": cursor }),
        None => json!({ "videoID": video_id.to_string(), "contentOffsetSeconds": 0 }),
    };
    json!({
        "operationName": OPERATION_NAME,
        "variables": variables,
        "extensions": {
            "persistedQuery": { "version": 1, "sha256Hash": PERSISTED_QUERY_HASH }
        },
    })
}

struct VodPage {
    messages: Vec<ChatMessage>,
    /// Cursor for the next page; `None` ends the walk.
    next_cursor: Option<String>,
}

#[derive(Deserialize)]
struct GqlResponse {
    data: Option<GqlData>,
    errors: Option<Vec<GqlError>>,
}

#[derive(Deserialize)]
struct GqlError {
    message: String,
}

#[derive(Deserialize)]
struct GqlData {
    video: Option<GqlVideo>,
}

#[derive(Deserialize)]
struct GqlVideo {
    comments: Option<GqlComments>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GqlComments {
    edges: Vec<GqlEdge>,
    page_info: Option<GqlPageInfo>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GqlPageInfo {
    has_next_page: bool,
}

#[derive(Deserialize)]
struct GqlEdge {
    cursor: Option<String>,
    node: Option<GqlNode>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GqlNode {
    #[serde(default)]
    content_offset_seconds: f64,
    commenter: Option<GqlCommenter>,
    message: Option<GqlMessage>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GqlCommenter {
    display_name: Option<String>,
}

#[derive(Deserialize)]
struct GqlMessage {
    fragments: Option<Vec<GqlFragment>>,
}

#[derive(Deserialize)]
struct GqlFragment {
    text: Option<String>,
}

fn parse_page(raw: &str, video_id: u64) -> Result<VodPage, VodError> {
    let response: GqlResponse =
        serde_json::from_str(raw).map_err(|err| VodError::InvalidResponse(err.to_string()))?;

    if let Some(first) = response.errors.as_ref().and_then(|errors| errors.first()) {
        return Err(VodError::GraphQl(first.message.clone()));
    }

    let data = response
        .data
        .ok_or_else(|| VodError::InvalidResponse("no data in response".into()))?;
    let video = data.video.ok_or(VodError::VideoNotFound(video_id))?;

    let comments = match video.comments {
        Some(comments) if !comments.edges.is_empty() => comments,
        _ => {
            return Ok(VodPage {
                messages: Vec::new(),
                next_cursor: None,
            });
        }
    };

    let has_next_page = comments
        .page_info
        .as_ref()
        .is_some_and(|info| info.has_next_page);
    let next_cursor = if has_next_page {
        comments.edges.last().and_then(|edge| edge.cursor.clone())
    } else {
        None
    };

    let mut messages = Vec::new();
    for edge in comments.edges {
        let Some(node) = edge.node else { continue };
        let username = node
            .commenter
            .and_then(|commenter| commenter.display_name)
            .unwrap_or_default();
        let content: String = node
            .message
            .and_then(|message| message.fragments)
            .map(|fragments| {
                fragments
                    .into_iter()
                    .filter_map(|fragment| fragment.text)
                    .collect()
            })
            .unwrap_or_default();
        if username.is_empty() && content.is_empty() {
            continue;
        }
        messages.push(ChatMessage {
            timestamp_ms: (node.content_offset_seconds * 1_000.0) as i64,
            username,
            content,
        });
    }

    Ok(VodPage {
        messages,
        next_cursor,
    })
}
