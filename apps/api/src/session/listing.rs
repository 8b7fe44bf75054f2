//! Session Listing: lightweight list entries for a user's interview history.
//! The turn ledger is left out of list views; callers fetch details per session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::session::errors::SessionError;
use crate::session::model::InterviewSession;
use crate::session::store::{PageRequest, SessionStore};

pub const MAX_PAGE_SIZE: u32 = 100;

fn default_page_size() -> u32 {
    10
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub pagination: bool,
    #[serde(default)]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub size: u32,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            pagination: false,
            page: 0,
            size: default_page_size(),
        }
    }
}

impl ListQuery {
    fn page_request(&self) -> Result<Option<PageRequest>, SessionError> {
        if !self.pagination {
            return Ok(None);
        }
        if self.size == 0 || self.size > MAX_PAGE_SIZE {
            return Err(SessionError::Validation(format!(
                "size must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        Ok(Some(PageRequest {
            page: self.page,
            size: self.size,
        }))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub session_id: Uuid,
    pub language: String,
    pub start_time: DateTime<Utc>,
    pub experience_level: String,
}

impl From<InterviewSession> for SessionSummary {
    fn from(session: InterviewSession) -> Self {
        Self {
            session_id: session.id,
            language: session.language,
            start_time: session.start_time,
            experience_level: session.experience_level,
        }
    }
}

/// Sessions of `user_id`, newest first, windowed at the store when `query.pagination` is set.
pub async fn list_sessions(
    store: &dyn SessionStore,
    user_id: &str,
    query: ListQuery,
) -> Result<Vec<SessionSummary>, SessionError> {
    let page = query.page_request()?;
    let sessions = store.list_by_user(user_id, page).await?;
    Ok(sessions.into_iter().map(SessionSummary::from).collect())
}
