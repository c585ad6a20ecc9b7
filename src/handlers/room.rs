//! 방 상태 조회

use crate::error::VotingError;
use crate::identity::Identity;
use crate::protocol::{CurrentStats, CurrentVote, GuestRoomEvent, RoomUrlName, VoteSummary, VoterId};
use crate::state::AppState;
use serde::Serialize;

/// 상태 메시지 (같은 입력이면 항상 같은 결과)
pub fn status_message(is_open: bool, current_vote: Option<&CurrentVote>) -> String {
    if let Some(vote) = current_vote {
        return format!("Vote requested: {}", vote.question_text);
    }
    if is_open {
        return "Voting session started.".to_string();
    }
    "Waiting for host to start voting session.".to_string()
}

/// 현재 방 상태를 게스트 이벤트로 계산
pub fn current_status(state: &AppState, room: &RoomUrlName) -> GuestRoomEvent {
    let is_open = state.directory.is_room_open(room).unwrap_or(false);
    let current_vote = state.stats.current_vote(room);

    GuestRoomEvent {
        status_message: status_message(is_open, current_vote.as_ref()),
        is_open,
        current_vote,
    }
}

/// 방 첫 화면용 상태
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub room_name: String,
    pub room_url_name: RoomUrlName,
    pub status_message: String,
    pub user_is_owner: bool,
    pub is_open: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_vote: Option<CurrentVote>,
    /// 실시간 집계 (소유자에게만)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<CurrentStats>,
    pub has_already_voted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_vote_summary: Option<VoteSummary>,
    pub voter_id: VoterId,
}

pub fn room_snapshot(
    state: &AppState,
    room: &RoomUrlName,
    identity: &Identity,
) -> Result<RoomSnapshot, VotingError> {
    let room_name = state
        .directory
        .room_name(room)
        .ok_or(VotingError::RoomNotFound)?;
    let status = current_status(state, room);
    let has_already_voted = status
        .current_vote
        .as_ref()
        .map(|vote| vote.has_voted(&identity.voter_id))
        .unwrap_or(false);
    let user_is_owner = identity.is_owner_of(state, room);

    Ok(RoomSnapshot {
        room_name,
        room_url_name: room.clone(),
        status_message: status.status_message,
        user_is_owner,
        is_open: status.is_open,
        current_vote: status.current_vote,
        stats: user_is_owner.then(|| state.stats.stats(room)),
        has_already_voted,
        previous_vote_summary: state.stats.previous_summary(room),
        voter_id: identity.voter_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_message_prefers_active_vote() {
        let vote = CurrentVote::new("Is the sky blue?");
        assert_eq!(
            status_message(true, Some(&vote)),
            "Vote requested: Is the sky blue?"
        );
        assert_eq!(
            status_message(false, Some(&vote)),
            "Vote requested: Is the sky blue?"
        );
        assert_eq!(status_message(true, None), "Voting session started.");
        assert_eq!(
            status_message(false, None),
            "Waiting for host to start voting session."
        );
    }
}
