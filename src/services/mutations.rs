//! Mutation coordination: guard against the cached view, write through the
//! data service, then invalidate exactly the keys the write touched.
//!
//! Guards here exist to refuse early with a friendly message; the data
//! service stays the authority and its refusals pass through verbatim.

use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::{
    dao::models::{
        Balance, DepositDecision, NewDeposit, NewResult, NewTeam, NewTeamMember, PrizeDistribution,
        Registration, RegistrationCall, ReviewVerdict, Settlement, Team, TeamRole, Tournament,
        TournamentDeletion, TournamentStatus, TeamUpdate, WithdrawalCall, WithdrawalSettlement,
    },
    dto::{
        common::ActionResponse,
        sse::ServerEvent,
        team::{CreateTeamRequest, JoinTeamRequest, LeaveTeamRequest, TeamView, TransferCaptaincyRequest, UpdateTeamRequest},
        tournament::{
            DeleteTournamentRequest, DeleteTournamentResponse, DistributePrizesRequest,
            DistributePrizesResponse, PostResultsRequest, RegisterRequest, RegisterResponse,
        },
        wallet::{
            ApproveWithdrawalRequest, CancelWithdrawalRequest, CreateDepositRequest,
            CreateWithdrawalRequest, DepositReviewRequest, DepositView,
        },
    },
    error::ServiceError,
    services::status,
    state::{SharedState, key::QueryKey},
};

/// Serve `key` from the cache and decode it, for guard checks.
async fn guard_read<T: serde::de::DeserializeOwned>(
    state: &SharedState,
    key: QueryKey,
) -> Result<T, ServiceError> {
    let value = state.cache().fetch(&key).await?;
    serde_json::from_value(value.data)
        .map_err(|err| ServiceError::Internal(format!("undecodable snapshot for {key}: {err}")))
}

fn notify(state: &SharedState, user_id: Uuid, message: &str) {
    if let Ok(event) = ServerEvent::json("notice".to_string(), &ActionResponse::new(message)) {
        state.sessions().notify_user(user_id, &event);
    }
}

// -- tournaments -----------------------------------------------------------

/// Claim a slot in an upcoming tournament.
pub async fn register_for_tournament(
    state: &SharedState,
    tournament_id: Uuid,
    request: RegisterRequest,
) -> Result<RegisterResponse, ServiceError> {
    let tournament: Option<Tournament> =
        guard_read(state, QueryKey::TournamentDetail { tournament_id }).await?;
    let tournament = tournament
        .ok_or_else(|| ServiceError::NotFound(format!("no tournament {tournament_id}")))?;

    let effective = status::effective_status(
        tournament.status,
        tournament.start_date,
        tournament.winner_present(),
        OffsetDateTime::now_utc(),
    );
    if effective != TournamentStatus::Upcoming {
        return Err(ServiceError::InvalidState(
            "registration closed, the tournament has already started".to_string(),
        ));
    }
    if tournament.slots_remaining() == 0 {
        return Err(ServiceError::InvalidState(
            "tournament slots are full".to_string(),
        ));
    }
    let slots: Vec<Registration> =
        guard_read(state, QueryKey::TournamentRegistrations { tournament_id }).await?;
    if slots.iter().any(|slot| slot.user_id == request.user_id) {
        return Err(ServiceError::InvalidState(
            "user is already registered for this tournament".to_string(),
        ));
    }

    let user_id = request.user_id;
    let outcome = state
        .backend()
        .register_for_tournament(RegistrationCall {
            tournament_id,
            user_id,
            in_game_name: request.in_game_name,
            team_roster: request.team_roster,
        })
        .await?;

    info!(%tournament_id, %user_id, slot = ?outcome.slot_number, "registration accepted");
    state.cache().invalidate_and_refresh(&[
        QueryKey::Tournaments,
        QueryKey::TournamentDetail { tournament_id },
        QueryKey::TournamentRegistrations { tournament_id },
        QueryKey::UserRegistrations { user_id },
        QueryKey::Balance { user_id },
    ]);
    notify(state, user_id, "Tournament registration confirmed");

    Ok(RegisterResponse {
        slot_number: outcome.slot_number,
        balance: outcome.balance,
        message: "Registered successfully".to_string(),
    })
}

/// Remove a tournament and refund every entry fee.
///
/// Refunds touch wallets this gateway cannot enumerate, so every mounted
/// user-scoped wallet key is refreshed.
pub async fn delete_tournament(
    state: &SharedState,
    tournament_id: Uuid,
    request: DeleteTournamentRequest,
) -> Result<DeleteTournamentResponse, ServiceError> {
    let outcome = state
        .backend()
        .delete_tournament(TournamentDeletion {
            tournament_id,
            deleted_by: request.deleted_by,
        })
        .await?;

    info!(%tournament_id, refunds = outcome.refunds_issued, "tournament deleted");
    state.cache().invalidate_and_refresh(&[
        QueryKey::Tournaments,
        QueryKey::TournamentDetail { tournament_id },
        QueryKey::TournamentRegistrations { tournament_id },
    ]);
    state.cache().invalidate_where(|key| {
        matches!(
            key,
            QueryKey::Balance { .. } | QueryKey::UserRegistrations { .. }
        )
    });

    Ok(DeleteTournamentResponse {
        message: outcome
            .message
            .unwrap_or_else(|| "Tournament deleted and entry fees refunded".to_string()),
        refunds_issued: outcome.refunds_issued,
    })
}

/// Replace the posted results of a tournament.
pub async fn post_results(
    state: &SharedState,
    tournament_id: Uuid,
    request: PostResultsRequest,
) -> Result<ActionResponse, ServiceError> {
    let rows: Vec<NewResult> = request
        .results
        .into_iter()
        .map(|entry| NewResult {
            user_id: entry.user_id,
            rank: entry.rank,
            kills: entry.kills,
            prize_amount: entry.prize_amount,
        })
        .collect();
    state.backend().replace_results(tournament_id, rows).await?;

    state.cache().invalidate_and_refresh(&[
        QueryKey::TournamentDetail { tournament_id },
        QueryKey::TournamentRegistrations { tournament_id },
    ]);
    Ok(ActionResponse::new("Results posted"))
}

/// Credit prize money to the ranked players of a tournament.
pub async fn distribute_prizes(
    state: &SharedState,
    tournament_id: Uuid,
    request: DistributePrizesRequest,
) -> Result<DistributePrizesResponse, ServiceError> {
    let outcome = state
        .backend()
        .distribute_prizes(PrizeDistribution {
            tournament_id,
            admin_id: request.admin_id,
        })
        .await?;

    info!(%tournament_id, total = outcome.total_distributed, "prizes distributed");
    state.cache().invalidate_and_refresh(&[
        QueryKey::Tournaments,
        QueryKey::TournamentDetail { tournament_id },
    ]);
    // Prize credits land in wallets named by result rows, not by the caller.
    state.cache().invalidate_where(|key| {
        matches!(
            key,
            QueryKey::Balance { .. } | QueryKey::Transactions { .. }
        )
    });

    Ok(DistributePrizesResponse {
        total_distributed: outcome.total_distributed,
        message: "Prizes distributed".to_string(),
    })
}

// -- wallet ----------------------------------------------------------------

/// File a deposit request for review.
pub async fn create_deposit(
    state: &SharedState,
    request: CreateDepositRequest,
) -> Result<DepositView, ServiceError> {
    let user_id = request.user_id;
    let deposit = state
        .backend()
        .insert_deposit(NewDeposit {
            user_id,
            amount: request.amount,
            utr_number: request.utr_number,
            screenshot_url: request.screenshot_url,
        })
        .await?;

    state.cache().invalidate_and_refresh(&[
        QueryKey::Deposits { user_id },
        QueryKey::PendingCounts,
    ]);
    Ok(DepositView::from(deposit))
}

/// File a withdrawal request, refusing amounts beyond the last known balance.
pub async fn create_withdrawal(
    state: &SharedState,
    request: CreateWithdrawalRequest,
) -> Result<ActionResponse, ServiceError> {
    let user_id = request.user_id;
    let balance: Option<Balance> = guard_read(state, QueryKey::Balance { user_id }).await?;
    let available = balance.map(|row| row.amount).unwrap_or(0);
    if request.amount > available {
        return Err(ServiceError::InvalidState(format!(
            "withdrawal of {} exceeds the available balance of {available}",
            request.amount
        )));
    }

    state
        .backend()
        .create_withdrawal(WithdrawalCall {
            user_id,
            amount: request.amount,
            upi_id: request.upi_id,
        })
        .await?;

    state.cache().invalidate_and_refresh(&[
        QueryKey::Withdrawals { user_id },
        QueryKey::Balance { user_id },
        QueryKey::PendingCounts,
    ]);
    Ok(ActionResponse::new("Withdrawal request submitted"))
}

/// Privileged verdict on a pending deposit.
pub async fn review_deposit(
    state: &SharedState,
    deposit_id: Uuid,
    verdict: ReviewVerdict,
    request: DepositReviewRequest,
) -> Result<ActionResponse, ServiceError> {
    let user_id = request.user_id;
    state
        .backend()
        .decide_deposit(DepositDecision {
            deposit_id,
            user_id,
            reviewed_by: request.reviewed_by,
            verdict,
            reviewer_notes: request.reviewer_notes,
        })
        .await?;

    info!(%deposit_id, %user_id, ?verdict, "deposit reviewed");
    state.cache().invalidate_and_refresh(&[
        QueryKey::Deposits { user_id },
        QueryKey::Balance { user_id },
        QueryKey::Transactions { user_id },
        QueryKey::PendingCounts,
    ]);
    Ok(ActionResponse::new(match verdict {
        ReviewVerdict::Approve => "Deposit approved",
        ReviewVerdict::Reject => "Deposit rejected",
    }))
}

/// Privileged approval of a pending withdrawal, recording the payout UTR.
pub async fn approve_withdrawal(
    state: &SharedState,
    withdrawal_id: Uuid,
    request: ApproveWithdrawalRequest,
) -> Result<ActionResponse, ServiceError> {
    settle_withdrawal(
        state,
        withdrawal_id,
        request.user_id,
        request.reviewed_by,
        Settlement::Approve {
            payout_utr: request.payout_utr,
        },
    )
    .await?;
    Ok(ActionResponse::new("Withdrawal approved"))
}

/// Privileged cancellation of a pending withdrawal; the hold is refunded.
pub async fn cancel_withdrawal(
    state: &SharedState,
    withdrawal_id: Uuid,
    request: CancelWithdrawalRequest,
) -> Result<ActionResponse, ServiceError> {
    settle_withdrawal(
        state,
        withdrawal_id,
        request.user_id,
        request.reviewed_by,
        Settlement::Cancel {
            reason: request.reason,
        },
    )
    .await?;
    Ok(ActionResponse::new("Withdrawal cancelled and refunded"))
}

async fn settle_withdrawal(
    state: &SharedState,
    withdrawal_id: Uuid,
    user_id: Uuid,
    reviewed_by: Uuid,
    settlement: Settlement,
) -> Result<(), ServiceError> {
    state
        .backend()
        .settle_withdrawal(WithdrawalSettlement {
            withdrawal_id,
            user_id,
            reviewed_by,
            settlement,
        })
        .await?;

    info!(%withdrawal_id, %user_id, "withdrawal settled");
    state.cache().invalidate_and_refresh(&[
        QueryKey::Withdrawals { user_id },
        QueryKey::Balance { user_id },
        QueryKey::Transactions { user_id },
        QueryKey::PendingCounts,
    ]);
    Ok(())
}

// -- teams -----------------------------------------------------------------

/// Create a team and seat the creator as captain.
pub async fn create_team(
    state: &SharedState,
    request: CreateTeamRequest,
) -> Result<TeamView, ServiceError> {
    let captain_id = request.captain_id;
    let team = state
        .backend()
        .insert_team(NewTeam {
            name: request.name,
            tag: request.tag,
            description: request.description,
            captain_id,
        })
        .await?;
    state
        .backend()
        .insert_team_member(NewTeamMember {
            team_id: team.id,
            user_id: captain_id,
            role: TeamRole::Captain,
        })
        .await?;

    info!(team_id = %team.id, %captain_id, "team created");
    state
        .cache()
        .invalidate_and_refresh(&[QueryKey::Teams, QueryKey::TeamDetail { team_id: team.id }]);

    let team = state
        .backend()
        .fetch_team(team.id)
        .await?
        .unwrap_or(team);
    Ok(TeamView::from(team))
}

async fn current_team(state: &SharedState, team_id: Uuid) -> Result<Team, ServiceError> {
    let team: Option<Team> = guard_read(state, QueryKey::TeamDetail { team_id }).await?;
    team.ok_or_else(|| ServiceError::NotFound(format!("no team {team_id}")))
}

/// Join an active team with an open slot.
pub async fn join_team(
    state: &SharedState,
    team_id: Uuid,
    request: JoinTeamRequest,
) -> Result<ActionResponse, ServiceError> {
    let team = current_team(state, team_id).await?;
    if !team.is_active {
        return Err(ServiceError::InvalidState(
            "team has been disbanded".to_string(),
        ));
    }
    if !team.has_open_slot() {
        return Err(ServiceError::InvalidState("team is full".to_string()));
    }
    if team
        .members
        .iter()
        .any(|member| member.user_id == request.user_id)
    {
        return Err(ServiceError::InvalidState(
            "user is already a member of this team".to_string(),
        ));
    }

    state
        .backend()
        .insert_team_member(NewTeamMember {
            team_id,
            user_id: request.user_id,
            role: TeamRole::Member,
        })
        .await?;

    state
        .cache()
        .invalidate_and_refresh(&[QueryKey::Teams, QueryKey::TeamDetail { team_id }]);
    Ok(ActionResponse::new("Joined team"))
}

/// Leave a team. The captain has to hand the seat over first.
pub async fn leave_team(
    state: &SharedState,
    team_id: Uuid,
    request: LeaveTeamRequest,
) -> Result<ActionResponse, ServiceError> {
    let team = current_team(state, team_id).await?;
    if !team
        .members
        .iter()
        .any(|member| member.user_id == request.user_id)
    {
        return Err(ServiceError::NotFound(
            "user is not a member of this team".to_string(),
        ));
    }
    if team.captain_id == request.user_id {
        return Err(ServiceError::InvalidState(
            "captain must transfer captaincy before leaving".to_string(),
        ));
    }

    state
        .backend()
        .delete_team_member(team_id, request.user_id)
        .await?;

    state
        .cache()
        .invalidate_and_refresh(&[QueryKey::Teams, QueryKey::TeamDetail { team_id }]);
    Ok(ActionResponse::new("Left team"))
}

/// Update team metadata; absent fields stay untouched.
pub async fn update_team(
    state: &SharedState,
    team_id: Uuid,
    request: UpdateTeamRequest,
) -> Result<TeamView, ServiceError> {
    current_team(state, team_id).await?;
    state
        .backend()
        .update_team(
            team_id,
            TeamUpdate {
                name: request.name,
                tag: request.tag,
                description: request.description,
            },
        )
        .await?;

    state
        .cache()
        .invalidate_and_refresh(&[QueryKey::Teams, QueryKey::TeamDetail { team_id }]);

    let team = state
        .backend()
        .fetch_team(team_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("no team {team_id}")))?;
    Ok(TeamView::from(team))
}

/// Hand the captain seat to another member.
pub async fn transfer_captaincy(
    state: &SharedState,
    team_id: Uuid,
    request: TransferCaptaincyRequest,
) -> Result<ActionResponse, ServiceError> {
    let team = current_team(state, team_id).await?;
    let new_captain = request.new_captain_id;
    if !team.members.iter().any(|member| member.user_id == new_captain) {
        return Err(ServiceError::InvalidState(
            "new captain must already be a team member".to_string(),
        ));
    }
    if team.captain_id == new_captain {
        return Err(ServiceError::InvalidState(
            "user is already the captain".to_string(),
        ));
    }

    let old_captain = team.captain_id;
    state.backend().set_team_captain(team_id, new_captain).await?;
    state
        .backend()
        .update_member_role(team_id, new_captain, TeamRole::Captain)
        .await?;
    state
        .backend()
        .update_member_role(team_id, old_captain, TeamRole::Member)
        .await?;

    info!(%team_id, %new_captain, "captaincy transferred");
    state
        .cache()
        .invalidate_and_refresh(&[QueryKey::Teams, QueryKey::TeamDetail { team_id }]);
    Ok(ActionResponse::new("Captaincy transferred"))
}

/// Disband a team; the roster stays readable but inactive.
pub async fn deactivate_team(
    state: &SharedState,
    team_id: Uuid,
) -> Result<ActionResponse, ServiceError> {
    current_team(state, team_id).await?;
    state.backend().deactivate_team(team_id).await?;

    info!(%team_id, "team deactivated");
    state
        .cache()
        .invalidate_and_refresh(&[QueryKey::Teams, QueryKey::TeamDetail { team_id }]);
    Ok(ActionResponse::new("Team deactivated"))
}
