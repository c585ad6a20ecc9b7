//! 요청별 신원 확인 (투표자 쿠키 + 소유자 세션)

use crate::protocol::{RoomUrlName, Username, VoterId};
use crate::state::AppState;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap, HeaderName},
};
use std::convert::Infallible;
use std::sync::Arc;

const VOTER_COOKIE: &str = "voterId";
const SESSION_COOKIE: &str = "session";
const VOTER_COOKIE_MAX_AGE_SECS: u64 = 365 * 24 * 60 * 60;

/// 요청자의 신원
#[derive(Debug, Clone)]
pub struct Identity {
    pub voter_id: VoterId,
    pub user: Option<Username>,
    /// 이번 요청에서 투표자 ID를 새로 발급했는지
    issued_voter_id: bool,
}

impl Identity {
    pub fn from_headers(headers: &HeaderMap, state: &AppState) -> Self {
        let existing = cookie_value(headers, VOTER_COOKIE).and_then(VoterId::parse);
        let user = cookie_value(headers, SESSION_COOKIE)
            .and_then(|token| state.directory.session_user(token));

        Self {
            voter_id: existing.unwrap_or_default(),
            user,
            issued_voter_id: existing.is_none(),
        }
    }

    pub fn is_owner_of(&self, state: &AppState, room: &RoomUrlName) -> bool {
        self.user
            .as_ref()
            .map(|user| state.directory.is_owner(user, room))
            .unwrap_or(false)
    }

    /// 새로 발급한 투표자 ID가 있으면 `Set-Cookie` 헤더
    pub fn set_cookie(&self) -> Option<[(HeaderName, String); 1]> {
        self.issued_voter_id.then(|| {
            [(
                header::SET_COOKIE,
                format!(
                    "{}={}; HttpOnly; Path=/; Max-Age={}",
                    VOTER_COOKIE, self.voter_id, VOTER_COOKIE_MAX_AGE_SECS
                ),
            )]
        })
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for Identity {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        Ok(Self::from_headers(&parts.headers, state))
    }
}

/// `Cookie` 헤더에서 이름으로 값 추출
fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|raw| raw.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
}
