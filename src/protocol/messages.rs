//! 방 이벤트 스트림 메시지 및 식별자 정의

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// 방 URL 이름 (URL-safe slug)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomUrlName(String);

impl RoomUrlName {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into().trim().to_string())
    }

    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 방 페이지 경로 (세그먼트는 퍼센트 인코딩되어 항상 유효한 헤더 값)
    pub fn path(&self) -> String {
        format!("/room/{}", urlencoding::encode(&self.0))
    }
}

impl fmt::Display for RoomUrlName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 브라우저별 투표자 ID (쿠키에 저장)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VoterId(Uuid);

impl VoterId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(value: &str) -> Option<Self> {
        Uuid::parse_str(value.trim()).ok().map(Self)
    }
}

impl Default for VoterId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for VoterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 투표 ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VoteId(Uuid);

impl VoteId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(value: &str) -> Option<Self> {
        Uuid::parse_str(value.trim()).ok().map(Self)
    }
}

impl Default for VoteId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for VoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 방 소유자 계정 이름
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Username(String);

impl Username {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 투표 선택지
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteChoice {
    For,
    Against,
    Abstain,
}

impl FromStr for VoteChoice {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "for" => Ok(Self::For),
            "against" => Ok(Self::Against),
            "abstain" => Ok(Self::Abstain),
            _ => Err(()),
        }
    }
}

/// 진행 중인 투표
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentVote {
    pub question_text: String,
    pub vote_id: VoteId,
    pub already_voted: Vec<VoterId>,
}

impl CurrentVote {
    pub fn new(question_text: impl Into<String>) -> Self {
        Self {
            question_text: question_text.into(),
            vote_id: VoteId::new(),
            already_voted: Vec::new(),
        }
    }

    pub fn has_voted(&self, voter_id: &VoterId) -> bool {
        self.already_voted.contains(voter_id)
    }
}

/// 방별 실시간 집계
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentStats {
    pub total_guests: usize,
    pub voted_for: usize,
    pub voted_against: usize,
    pub abstained: usize,
    pub total_votes: usize,
    pub question: String,
}

impl CurrentStats {
    /// 투표 카운터만 0으로 되돌림 (접속 인원은 유지)
    pub fn reset_tally(&mut self) {
        self.voted_for = 0;
        self.voted_against = 0;
        self.abstained = 0;
        self.total_votes = 0;
        self.question.clear();
    }

    pub fn record(&mut self, choice: VoteChoice) {
        match choice {
            VoteChoice::For => self.voted_for += 1,
            VoteChoice::Against => self.voted_against += 1,
            VoteChoice::Abstain => self.abstained += 1,
        }
        self.total_votes += 1;
    }
}

/// 종료된 투표의 결과 분류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoteOutcome {
    Accepted,
    Rejected,
    Tied,
}

impl VoteOutcome {
    pub fn classify(stats: &CurrentStats) -> Self {
        use std::cmp::Ordering;

        match stats.voted_for.cmp(&stats.voted_against) {
            Ordering::Greater => Self::Accepted,
            Ordering::Less => Self::Rejected,
            Ordering::Equal => Self::Tied,
        }
    }
}

/// 이전 투표 요약 (다음 투표 요청 시 삭제)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteSummary {
    #[serde(flatten)]
    pub stats: CurrentStats,
    pub outcome: VoteOutcome,
}

impl VoteSummary {
    pub fn freeze(stats: CurrentStats) -> Self {
        let outcome = VoteOutcome::classify(&stats);
        Self { stats, outcome }
    }
}

/// 게스트 채널 상태 이벤트
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestRoomEvent {
    pub status_message: String,
    pub is_open: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_vote: Option<CurrentVote>,
}

/// 호스트 전용 집계 이벤트
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostRoomStats {
    pub current_stats: CurrentStats,
}

/// 이전 투표 요약 이벤트 (`None`이면 요약 삭제 신호)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviousVoteSummary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_vote_summary: Option<VoteSummary>,
}

/// 서버 → 클라이언트 메시지 (`data: <json>\n\n` 프레임 하나에 하나씩)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RoomEvent {
    #[serde(rename = "GUEST_ROOM_EVENT")]
    GuestRoomEvent(GuestRoomEvent),
    #[serde(rename = "HOST_ROOM_STATS")]
    HostRoomStats(HostRoomStats),
    #[serde(rename = "PREVIOUS_VOTE_SUMMARY")]
    PreviousVoteSummary(PreviousVoteSummary),
}

impl From<GuestRoomEvent> for RoomEvent {
    fn from(event: GuestRoomEvent) -> Self {
        Self::GuestRoomEvent(event)
    }
}
