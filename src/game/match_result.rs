//! Match result and team ranking
//!
//! Computes the winner when a match ends, either because one team is left or
//! because the game-end countdown ran out.

use serde::{Deserialize, Serialize};

use crate::game::state::{Arena, Phase};
use crate::game::team::TeamColor;

/// Match result information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    /// Sole surviving team, None on a draw
    pub winner: Option<TeamColor>,
    pub reason: MatchEndReason,
    pub rankings: Vec<TeamRanking>,
}

/// Team ranking in match results
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamRanking {
    pub team: TeamColor,
    pub rank: u32,
    pub alive: bool,
    pub bed_intact: bool,
    pub members: usize,
}

/// Reason why match ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchEndReason {
    /// Only one team remaining
    LastTeamStanding,
    /// Game-end countdown reached zero
    TimeLimit,
}

/// Determine match result from arena state
pub fn determine_result(arena: &Arena, reason: MatchEndReason) -> MatchResult {
    let mut rankings: Vec<TeamRanking> = arena
        .teams
        .iter()
        .map(|t| TeamRanking {
            team: t.color,
            rank: 0,
            alive: t.is_alive(),
            bed_intact: !t.bed_destroyed,
            members: t.size(),
        })
        .collect();

    // Sort by: alive (desc), bed intact (desc), members (desc), color for stability
    rankings.sort_by(|a, b| {
        b.alive
            .cmp(&a.alive)
            .then_with(|| b.bed_intact.cmp(&a.bed_intact))
            .then_with(|| b.members.cmp(&a.members))
            .then_with(|| a.team.cmp(&b.team))
    });

    for (i, ranking) in rankings.iter_mut().enumerate() {
        ranking.rank = (i + 1) as u32;
    }

    let alive: Vec<TeamColor> = rankings.iter().filter(|r| r.alive).map(|r| r.team).collect();
    let winner = match alive.as_slice() {
        [only] => Some(*only),
        _ => None,
    };

    MatchResult {
        winner,
        reason,
        rankings,
    }
}

/// Check if the match should end early
pub fn check_match_end(arena: &Arena) -> Option<MatchEndReason> {
    if arena.phase() != Phase::Playing {
        return None;
    }

    if arena.alive_teams().count() <= 1 {
        return Some(MatchEndReason::LastTeamStanding);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::tests::{playing_arena, test_config};

    #[test]
    fn test_no_winner_while_two_teams_alive() {
        let (arena, _, _) = playing_arena(test_config());
        let result = determine_result(&arena, MatchEndReason::TimeLimit);
        assert!(result.winner.is_none());
        assert_eq!(result.rankings.len(), 2);
        assert_eq!(check_match_end(&arena), None);
    }

    #[test]
    fn test_last_team_standing() {
        let (mut arena, red, _) = playing_arena(test_config());
        arena.destroy_all_beds();
        arena.final_kill(red);

        assert_eq!(check_match_end(&arena), Some(MatchEndReason::LastTeamStanding));
        let result = determine_result(&arena, MatchEndReason::LastTeamStanding);
        assert_eq!(result.winner, Some(TeamColor::Blue));
        assert_eq!(result.rankings[0].team, TeamColor::Blue);
        assert_eq!(result.rankings[0].rank, 1);
        assert!(!result.rankings[1].alive);
    }

    #[test]
    fn test_bed_breaks_ties() {
        let (mut arena, _, _) = playing_arena(test_config());
        arena.team_mut(TeamColor::Red).unwrap().bed_destroyed = true;

        let result = determine_result(&arena, MatchEndReason::TimeLimit);
        assert_eq!(result.rankings[0].team, TeamColor::Blue);
        assert!(result.winner.is_none());
    }
}
