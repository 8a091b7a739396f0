use db::models::{
    cleaner::{Cleaner, CleanerStatus, CleanerWithUser},
    team::Team,
};
use serde::Serialize;
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::info;
use ts_rs::TS;

#[derive(Debug, Error)]
pub enum TeamError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("{0}")]
    Validation(String),
    #[error("only the team leader can manage members")]
    NotLeader,
    #[error("cleaner not found")]
    CleanerNotFound,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct TeamOverview {
    pub team: Team,
    pub members: Vec<CleanerWithUser>,
    pub is_leader: bool,
}

/// The caller's team with its members, if the caller belongs to one.
pub async fn team_overview(pool: &SqlitePool, cleaner: &Cleaner) -> Result<Option<TeamOverview>, TeamError> {
    let Some(team_id) = cleaner.team_id else {
        return Ok(None);
    };
    let Some(team) = Team::find_by_id(pool, team_id).await? else {
        return Ok(None);
    };
    let members = Cleaner::find_team_members(pool, team.id).await?;
    Ok(Some(TeamOverview {
        is_leader: team.leader_id == cleaner.id,
        team,
        members,
    }))
}

pub async fn create_team(pool: &SqlitePool, leader: &Cleaner, name: &str) -> Result<Team, TeamError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(TeamError::Validation("team name is required".to_string()));
    }
    if leader.status != CleanerStatus::Active {
        return Err(TeamError::Validation("only active cleaners can lead a team".to_string()));
    }
    if leader.team_id.is_some() {
        return Err(TeamError::Validation("already a member of a team".to_string()));
    }

    let team = Team::create(pool, name, leader.id).await?;
    info!(team_id = %team.id, leader_id = %leader.id, "Team created");
    Ok(team)
}

/// Add the cleaner with `member_slug` to the team led by `leader`.
pub async fn add_member(pool: &SqlitePool, leader: &Cleaner, member_slug: &str) -> Result<Cleaner, TeamError> {
    let team = Team::find_by_leader_id(pool, leader.id)
        .await?
        .ok_or(TeamError::NotLeader)?;
    let member = Cleaner::find_by_slug(pool, member_slug.trim())
        .await?
        .ok_or(TeamError::CleanerNotFound)?;

    if member.status != CleanerStatus::Active {
        return Err(TeamError::Validation("only active cleaners can join a team".to_string()));
    }
    match member.team_id {
        Some(id) if id == team.id => return Ok(member),
        Some(_) => return Err(TeamError::Validation("cleaner already belongs to another team".to_string())),
        None => {}
    }

    Cleaner::set_team(pool, member.id, Some(team.id)).await?;
    info!(team_id = %team.id, member_id = %member.id, "Team member added");
    Ok(Cleaner {
        team_id: Some(team.id),
        ..member
    })
}
