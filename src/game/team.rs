//! Teams and their rosters

use serde::{Deserialize, Serialize};

use crate::game::generator::GeneratorId;
use crate::game::state::PlayerId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TeamColor {
    Red,
    Blue,
    Green,
    Yellow,
    Aqua,
    White,
    Pink,
    Gray,
}

impl TeamColor {
    pub fn display_name(&self) -> &'static str {
        match self {
            TeamColor::Red => "Red",
            TeamColor::Blue => "Blue",
            TeamColor::Green => "Green",
            TeamColor::Yellow => "Yellow",
            TeamColor::Aqua => "Aqua",
            TeamColor::White => "White",
            TeamColor::Pink => "Pink",
            TeamColor::Gray => "Gray",
        }
    }
}

impl std::fmt::Display for TeamColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

impl std::str::FromStr for TeamColor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "red" => Ok(TeamColor::Red),
            "blue" => Ok(TeamColor::Blue),
            "green" => Ok(TeamColor::Green),
            "yellow" => Ok(TeamColor::Yellow),
            "aqua" => Ok(TeamColor::Aqua),
            "white" => Ok(TeamColor::White),
            "pink" => Ok(TeamColor::Pink),
            "gray" | "grey" => Ok(TeamColor::Gray),
            other => Err(format!("unknown team color '{}'", other)),
        }
    }
}

/// One team inside an arena
#[derive(Debug, Clone, PartialEq)]
pub struct Team {
    pub color: TeamColor,
    pub display_name: String,
    pub members: Vec<PlayerId>,
    pub bed_destroyed: bool,
    pub eliminated: bool,
    /// Hostile entities this team gets at sudden death
    pub dragons: u32,
    pub generators: Vec<GeneratorId>,
}

impl Team {
    pub fn new(color: TeamColor, dragons: u32) -> Self {
        Self {
            color,
            display_name: color.display_name().to_string(),
            members: Vec::new(),
            bed_destroyed: false,
            eliminated: false,
            dragons,
            generators: Vec::new(),
        }
    }

    pub fn size(&self) -> usize {
        self.members.len()
    }

    pub fn is_member(&self, player: PlayerId) -> bool {
        self.members.contains(&player)
    }

    /// Still in the match: not eliminated and at least one member
    pub fn is_alive(&self) -> bool {
        !self.eliminated && !self.members.is_empty()
    }

    pub fn add_member(&mut self, player: PlayerId) {
        if !self.is_member(player) {
            self.members.push(player);
        }
    }

    pub fn remove_member(&mut self, player: PlayerId) -> bool {
        let before = self.members.len();
        self.members.retain(|m| *m != player);
        self.members.len() != before
    }

    /// Mark eliminated if the bed is gone and nobody is left. Returns true the
    /// first time this happens.
    pub fn check_eliminated(&mut self) -> bool {
        if !self.eliminated && self.bed_destroyed && self.members.is_empty() {
            self.eliminated = true;
            return true;
        }
        false
    }

    /// Restore for a new match, keeping generators
    pub fn reset(&mut self, dragons: u32) {
        self.members.clear();
        self.bed_destroyed = false;
        self.eliminated = false;
        self.dragons = dragons;
    }
}
