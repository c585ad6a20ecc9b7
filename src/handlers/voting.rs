//! 투표 상태 머신
//!
//! 방 상태: 닫힘 → 열림(대기) ⇄ 열림(투표 중).
//! 모든 검증은 상태 변경 전에 끝나며, 거부되면 아무것도 발행하지 않는다.

use crate::error::VotingError;
use crate::handlers::room::status_message;
use crate::identity::Identity;
use crate::protocol::{
    CurrentVote, GuestRoomEvent, RoomUrlName, Username, VoteChoice, VoteId, VoteSummary, VoterId,
};
use crate::state::AppState;
use crate::stats::VoteCast;

/// 로그인 + 방 존재 + 소유자 확인
fn require_owner<'a>(
    state: &AppState,
    room: &RoomUrlName,
    actor: &'a Identity,
) -> Result<&'a Username, VotingError> {
    let user = actor.user.as_ref().ok_or(VotingError::NotLoggedIn)?;
    if state.directory.room_name(room).is_none() {
        return Err(VotingError::RoomNotFound);
    }
    if !state.directory.is_owner(user, room) {
        tracing::warn!(room = %room, user = %user, "Non-owner attempted owner action");
        return Err(VotingError::NotOwner);
    }
    Ok(user)
}

/// 방 생성 (로그인한 사용자만)
pub fn create_room(
    state: &AppState,
    actor: &Identity,
    name: &str,
) -> Result<RoomUrlName, VotingError> {
    let user = actor.user.as_ref().ok_or(VotingError::NotLoggedIn)?;
    let room = state.directory.create_room(name, user);
    tracing::info!(room = %room, user = %user, name = %name, "Room created");
    Ok(room)
}

/// 방 열기: 닫힘 → 열림(대기)
pub fn open_room(state: &AppState, room: &RoomUrlName, actor: &Identity) -> Result<(), VotingError> {
    let user = require_owner(state, room, actor)?;
    if !state.directory.open_room(room, user) {
        return Err(VotingError::NotOwner);
    }

    let current_vote = state.stats.current_vote(room);
    state.bus.publish_guest_event(
        room,
        GuestRoomEvent {
            status_message: status_message(true, current_vote.as_ref()),
            is_open: true,
            current_vote,
        },
    );

    tracing::info!(room = %room, user = %user, "Room opened");
    Ok(())
}

/// 투표 요청: 열림(대기) → 열림(투표 중)
///
/// 게스트 채널에는 이전 요약 삭제 이벤트, 새 투표 이벤트 순서로 두 개가 나간다.
pub fn request_vote(
    state: &AppState,
    room: &RoomUrlName,
    actor: &Identity,
    question: &str,
) -> Result<CurrentVote, VotingError> {
    require_owner(state, room, actor)?;
    if state.directory.is_room_open(room) != Some(true) {
        return Err(VotingError::RoomNotOpen);
    }
    if state.stats.current_vote(room).is_some() {
        return Err(VotingError::VoteInProgress);
    }

    state.stats.clear_previous_summary(room);
    state.bus.publish_previous_summary(room, None);

    let vote = CurrentVote::new(question);
    if !state.stats.set_current_vote(room, vote.clone()) {
        return Err(VotingError::VoteInProgress);
    }
    state.bus.publish_guest_event(
        room,
        GuestRoomEvent {
            status_message: status_message(true, Some(&vote)),
            is_open: true,
            current_vote: Some(vote.clone()),
        },
    );
    state.bus.publish_host_stats(room, state.stats.stats(room));

    tracing::info!(room = %room, vote_id = %vote.vote_id, question = %question, "Vote requested");
    Ok(vote)
}

/// 투표 등록 (열림(투표 중)에서만)
pub fn cast_vote(
    state: &AppState,
    room: &RoomUrlName,
    voter_id: VoterId,
    choice: VoteChoice,
) -> Result<(), VotingError> {
    if state.directory.room_name(room).is_none() {
        return Err(VotingError::RoomNotFound);
    }

    match state.stats.register_vote_cast(room, voter_id, choice) {
        VoteCast::Accepted => {}
        VoteCast::NoActiveVote => {
            tracing::warn!(room = %room, voter = %voter_id, "Vote cast without active vote");
            return Err(VotingError::NoActiveVote);
        }
        VoteCast::AlreadyVoted => {
            tracing::warn!(room = %room, voter = %voter_id, "Duplicate vote rejected");
            return Err(VotingError::AlreadyVoted);
        }
    }

    state.bus.publish_host_stats(room, state.stats.stats(room));
    state.bus.replay_last_guest_event(room);

    tracing::info!(room = %room, voter = %voter_id, choice = ?choice, "Vote cast");
    Ok(())
}

/// 투표 종료: 열림(투표 중) → 열림(대기)
pub fn end_vote(
    state: &AppState,
    room: &RoomUrlName,
    actor: &Identity,
    vote_id: VoteId,
) -> Result<VoteSummary, VotingError> {
    require_owner(state, room, actor)?;

    let active = state
        .stats
        .current_vote(room)
        .ok_or(VotingError::NoActiveVote)?;
    if active.vote_id != vote_id {
        tracing::warn!(room = %room, vote_id = %vote_id, "Stale end-vote rejected");
        return Err(VotingError::VoteIdMismatch);
    }

    let summary = state
        .stats
        .end_vote(room)
        .ok_or(VotingError::NoActiveVote)?;
    let is_open = state.directory.is_room_open(room).unwrap_or(false);

    state.bus.publish_guest_event(
        room,
        GuestRoomEvent {
            status_message: status_message(is_open, None),
            is_open,
            current_vote: None,
        },
    );
    state.bus.publish_previous_summary(room, Some(summary.clone()));
    state.bus.publish_host_stats(room, state.stats.stats(room));

    tracing::info!(
        room = %room,
        vote_id = %vote_id,
        outcome = ?summary.outcome,
        total_votes = summary.stats.total_votes,
        "Vote ended"
    );
    Ok(summary)
}
