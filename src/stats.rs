//! 방별 투표 상태 저장소
//!
//! 진행 중인 투표, 집계, 이전 투표 요약, 접속 게스트 집합을 메모리에만 보관한다.
//! 프로세스가 재시작되면 모두 사라진다.

use crate::protocol::{CurrentStats, CurrentVote, RoomUrlName, VoteChoice, VoteSummary, VoterId};
use dashmap::DashMap;
use std::collections::HashSet;

/// 투표 등록 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteCast {
    Accepted,
    NoActiveVote,
    AlreadyVoted,
}

impl VoteCast {
    #[cfg(test)]
    pub fn accepted(self) -> bool {
        matches!(self, Self::Accepted)
    }
}

/// 한 방의 투표 상태
#[derive(Debug, Default)]
struct RoomVoting {
    current_vote: Option<CurrentVote>,
    stats: Option<CurrentStats>,
    previous_summary: Option<VoteSummary>,
    guests: HashSet<VoterId>,
}

impl RoomVoting {
    /// 집계를 처음 접근할 때 0으로 초기화
    fn stats_mut(&mut self) -> &mut CurrentStats {
        let question = self
            .current_vote
            .as_ref()
            .map(|vote| vote.question_text.clone())
            .unwrap_or_default();
        self.stats.get_or_insert_with(|| CurrentStats {
            question,
            ..Default::default()
        })
    }

    fn sync_guest_count(&mut self) {
        let total = self.guests.len();
        self.stats_mut().total_guests = total;
    }
}

/// 방 통계 저장소
///
/// 모든 메서드는 동기 함수이며 반환값은 복사본이다. 같은 방에 대한 변경은
/// 해당 엔트리의 락 안에서 끝나므로 중복 확인과 카운터 증가 사이에 끼어들 수 없다.
#[derive(Default)]
pub struct RoomStatsStore {
    rooms: DashMap<RoomUrlName, RoomVoting>,
}

impl RoomStatsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_vote(&self, room: &RoomUrlName) -> Option<CurrentVote> {
        self.rooms.get(room)?.current_vote.clone()
    }

    /// 새 투표 설치. 이미 진행 중이면 아무것도 바꾸지 않고 `false`
    pub fn set_current_vote(&self, room: &RoomUrlName, vote: CurrentVote) -> bool {
        let mut entry = self.rooms.entry(room.clone()).or_default();
        if entry.current_vote.is_some() {
            return false;
        }
        entry.stats_mut().question = vote.question_text.clone();
        entry.current_vote = Some(vote);
        true
    }

    /// 투표 등록 (중복 확인 + 카운터 증가를 하나의 락 구간에서 처리)
    pub fn register_vote_cast(
        &self,
        room: &RoomUrlName,
        voter_id: VoterId,
        choice: VoteChoice,
    ) -> VoteCast {
        let Some(mut entry) = self.rooms.get_mut(room) else {
            return VoteCast::NoActiveVote;
        };
        let room_voting = &mut *entry;

        let Some(vote) = room_voting.current_vote.as_mut() else {
            return VoteCast::NoActiveVote;
        };
        if vote.has_voted(&voter_id) {
            return VoteCast::AlreadyVoted;
        }
        vote.already_voted.push(voter_id);
        room_voting.stats_mut().record(choice);
        VoteCast::Accepted
    }

    /// 진행 중인 투표를 요약으로 확정하고 집계를 초기화
    pub fn end_vote(&self, room: &RoomUrlName) -> Option<VoteSummary> {
        let mut entry = self.rooms.get_mut(room)?;
        let vote = entry.current_vote.take()?;

        let stats = entry.stats_mut();
        let mut frozen = stats.clone();
        if frozen.question.is_empty() {
            frozen.question = vote.question_text;
        }
        stats.reset_tally();

        let summary = VoteSummary::freeze(frozen);
        entry.previous_summary = Some(summary.clone());
        Some(summary)
    }

    pub fn previous_summary(&self, room: &RoomUrlName) -> Option<VoteSummary> {
        self.rooms.get(room)?.previous_summary.clone()
    }

    pub fn clear_previous_summary(&self, room: &RoomUrlName) {
        if let Some(mut entry) = self.rooms.get_mut(room) {
            entry.previous_summary = None;
        }
    }

    /// 게스트 추가 후 갱신된 집계 반환 (중복 추가 무해)
    pub fn add_guest(&self, room: &RoomUrlName, voter_id: VoterId) -> CurrentStats {
        let mut entry = self.rooms.entry(room.clone()).or_default();
        entry.guests.insert(voter_id);
        entry.sync_guest_count();
        entry.stats_mut().clone()
    }

    /// 게스트 제거. 방 집계가 아직 없으면 `None` (정리 순서 보호)
    pub fn remove_guest(&self, room: &RoomUrlName, voter_id: &VoterId) -> Option<CurrentStats> {
        let mut entry = self.rooms.get_mut(room)?;
        entry.stats.as_ref()?;
        entry.guests.remove(voter_id);
        entry.sync_guest_count();
        entry.stats.clone()
    }

    /// 방 집계 조회 (처음 조회 시 0으로 초기화)
    pub fn stats(&self, room: &RoomUrlName) -> CurrentStats {
        let mut entry = self.rooms.entry(room.clone()).or_default();
        entry.stats_mut().clone()
    }
}
