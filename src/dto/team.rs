//! DTO definitions for the squad roster surface.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::{Team, TeamMember, TeamRole},
    dto::{common::CacheMeta, format_timestamp},
};

/// One membership inside a team.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TeamMemberView {
    pub user_id: Uuid,
    pub role: TeamRole,
    pub joined_at: String,
}

impl From<TeamMember> for TeamMemberView {
    fn from(member: TeamMember) -> Self {
        Self {
            user_id: member.user_id,
            role: member.role,
            joined_at: format_timestamp(member.joined_at),
        }
    }
}

/// Public projection of a team with its members embedded.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TeamView {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    pub captain_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub is_active: bool,
    pub members: Vec<TeamMemberView>,
    pub member_count: usize,
    pub has_open_slot: bool,
    pub total_tournaments: u32,
    pub tournaments_won: u32,
    pub total_earnings: i64,
    pub created_at: String,
}

impl From<Team> for TeamView {
    fn from(team: Team) -> Self {
        let member_count = team.members.len();
        let has_open_slot = team.has_open_slot();
        Self {
            id: team.id,
            name: team.name,
            tag: team.tag,
            captain_id: team.captain_id,
            description: team.description,
            is_active: team.is_active,
            members: team.members.into_iter().map(Into::into).collect(),
            member_count,
            has_open_slot,
            total_tournaments: team.total_tournaments,
            tournaments_won: team.tournaments_won,
            total_earnings: team.total_earnings,
            created_at: format_timestamp(team.created_at),
        }
    }
}

/// Every active team.
#[derive(Debug, Serialize, ToSchema)]
pub struct TeamListResponse {
    pub teams: Vec<TeamView>,
    pub meta: CacheMeta,
}

/// One team by id.
#[derive(Debug, Serialize, ToSchema)]
pub struct TeamDetailResponse {
    pub team: TeamView,
    pub meta: CacheMeta,
}

/// Payload creating a team; the creator becomes captain.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateTeamRequest {
    #[validate(length(min = 1, max = 50))]
    pub name: String,
    #[validate(length(min = 1, max = 10))]
    pub tag: Option<String>,
    #[validate(length(max = 200))]
    pub description: Option<String>,
    pub captain_id: Uuid,
}

/// Payload joining an existing team.
#[derive(Debug, Deserialize, ToSchema)]
pub struct JoinTeamRequest {
    pub user_id: Uuid,
}

/// Payload leaving a team.
#[derive(Debug, Deserialize, ToSchema)]
pub struct LeaveTeamRequest {
    pub user_id: Uuid,
}

/// Sparse team metadata update.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct UpdateTeamRequest {
    #[validate(length(min = 1, max = 50))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 10))]
    pub tag: Option<String>,
    #[validate(length(max = 200))]
    pub description: Option<String>,
}

/// Payload handing the captain seat to another member.
#[derive(Debug, Deserialize, ToSchema)]
pub struct TransferCaptaincyRequest {
    pub new_captain_id: Uuid,
}
