//! Participation team destinations
//!
//! Every team topic has the form `/topic/participations/{id}/team` with an
//! optional `/{subpath}` suffix. These helpers build such topics, pull the
//! participation id back out of them, and classify the inbound `send`
//! destinations clients use to talk to the team service.

use teamsync_shared::ParticipationId;

const PREFIX: &str = "/topic/participations/";
const TEAM: &str = "/team";

pub const MODELING_SUBMISSIONS: &str = "/modeling-submissions";
pub const TEXT_SUBMISSIONS: &str = "/text-submissions";

/// Team root topic of a participation
pub fn team_destination(participation_id: ParticipationId) -> String {
    team_destination_with_path(participation_id, "")
}

/// Team topic of a participation with `path` appended, e.g. `/text-submissions`
pub fn team_destination_with_path(participation_id: ParticipationId, path: &str) -> String {
    format!("{}{}{}{}", PREFIX, participation_id, TEAM, path)
}

/// Extract the participation id from any team destination
///
/// Returns `None` for destinations outside the participation team namespace.
pub fn participation_id_from_destination(destination: &str) -> Option<ParticipationId> {
    let rest = destination.strip_prefix(PREFIX)?;
    let digits_end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
    if digits_end == 0 {
        return None;
    }

    let (digits, tail) = rest.split_at(digits_end);
    let tail = tail.strip_prefix(TEAM)?;
    if !(tail.is_empty() || tail.starts_with('/')) {
        return None;
    }

    digits.parse().ok().map(ParticipationId)
}

/// Whether the destination is handled by the participation team service
pub fn is_participation_team_destination(destination: &str) -> bool {
    participation_id_from_destination(destination).is_some()
}

/// Whether the destination is exactly the team root topic (the presence topic)
pub fn is_team_root(destination: &str) -> bool {
    participation_id_from_destination(destination)
        .map(|id| team_destination(id) == destination)
        .unwrap_or(false)
}

/// Inbound message destinations of the team service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeamRoute {
    /// Re-send the online team members list
    Trigger(ParticipationId),
    /// The sender started typing
    Typing(ParticipationId),
    /// The sender pushes an updated modeling submission
    ModelingUpdate(ParticipationId),
    /// The sender pushes an updated text submission
    TextUpdate(ParticipationId),
}

impl TeamRoute {
    pub fn parse(destination: &str) -> Option<Self> {
        let id = participation_id_from_destination(destination)?;
        let root = team_destination(id);
        let path = destination.strip_prefix(root.as_str())?;

        match path {
            "/trigger" => Some(TeamRoute::Trigger(id)),
            "/typing" => Some(TeamRoute::Typing(id)),
            "/modeling-submissions/update" => Some(TeamRoute::ModelingUpdate(id)),
            "/text-submissions/update" => Some(TeamRoute::TextUpdate(id)),
            _ => None,
        }
    }
}
