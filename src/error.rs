//! 투표 액션 거부 사유

use thiserror::Error;

/// 상태 변경 액션이 거부된 이유
///
/// 거부는 항상 상태 변경 전에 결정되며, 부분적으로 적용된 변경은 없다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum VotingError {
    #[error("room not found")]
    RoomNotFound,
    #[error("you need to be logged in to perform this action")]
    NotLoggedIn,
    #[error("only the room owner can perform this action")]
    NotOwner,
    #[error("room is not open")]
    RoomNotOpen,
    #[error("a vote is already in progress")]
    VoteInProgress,
    #[error("no vote is in progress")]
    NoActiveVote,
    #[error("vote id does not match the active vote")]
    VoteIdMismatch,
    #[error("this voter already voted")]
    AlreadyVoted,
    #[error("vote is not valid")]
    InvalidChoice,
    #[error("missing form field `{0}`")]
    MissingField(&'static str),
    #[error("room in form does not match the url")]
    RoomMismatch,
}

impl VotingError {
    /// 리다이렉트 쿼리(`?error=`)에 실리는 코드
    pub fn code(&self) -> &'static str {
        match self {
            Self::RoomNotFound => "room-not-found",
            Self::NotLoggedIn => "not-logged-in",
            Self::NotOwner => "not-owner",
            Self::RoomNotOpen => "room-not-open",
            Self::VoteInProgress => "vote-in-progress",
            Self::NoActiveVote => "no-active-vote",
            Self::VoteIdMismatch => "vote-id-doesnt-match",
            Self::AlreadyVoted => "already-voted",
            Self::InvalidChoice => "vote-not-valid",
            Self::MissingField(_) => "missing-field",
            Self::RoomMismatch => "room-combination-not-valid",
        }
    }
}
