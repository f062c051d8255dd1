//! In-memory [`ArenaBackend`] used by cache and service tests.
//!
//! Rows live in mutex-guarded vectors and the procedures reproduce the
//! upstream semantics closely enough for behavioral tests: slot claiming
//! checks balances and capacity, reviews move money, deletion refunds fees.
//! Knobs allow inducing transient failures, rejections and slow reads.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::future::BoxFuture;
use time::OffsetDateTime;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::dao::backend::{
    ArenaBackend, BackendError, BackendResult, ChangeFeed, FeedSubscription,
};
use crate::dao::models::{
    ActivityEntry, Balance, ChangeEvent, Deposit, DepositDecision, DepositStatus, FeedGroup,
    NewDeposit, NewResult, NewTeam, NewTeamMember, PendingCounts, PrizeDistribution, PrizeOutcome,
    Registration, RegistrationActivity, RegistrationCall, RegistrationOutcome, ReviewVerdict,
    Settlement, Team, TeamMember, TeamRole, TeamUpdate, Tournament, TournamentDeletion,
    TournamentDeletionOutcome, TournamentStatus, TransactionKind, TransactionRecord, Withdrawal,
    WithdrawalCall, WithdrawalSettlement, WithdrawalStatus, merge_activity,
};

#[derive(Default)]
struct MemoryInner {
    tournaments: Mutex<Vec<Tournament>>,
    registrations: Mutex<Vec<Registration>>,
    balances: Mutex<HashMap<Uuid, Balance>>,
    deposits: Mutex<Vec<Deposit>>,
    withdrawals: Mutex<Vec<Withdrawal>>,
    transactions: Mutex<Vec<TransactionRecord>>,
    teams: Mutex<Vec<Team>>,
    results: Mutex<HashMap<Uuid, Vec<NewResult>>>,
    status_writes: Mutex<Vec<(Uuid, TournamentStatus)>>,
    read_calls: AtomicUsize,
    write_calls: AtomicUsize,
    read_delay: Mutex<Option<Duration>>,
    read_failure: Mutex<Option<String>>,
    fail_next_read: AtomicBool,
    reject_next_registration: Mutex<Option<String>>,
    failing_status_writes: Mutex<Vec<Uuid>>,
}

/// Shareable in-memory backend.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    inner: Arc<MemoryInner>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    // -- seeded state ------------------------------------------------------

    pub fn tournaments(&self) -> MutexGuard<'_, Vec<Tournament>> {
        self.inner.tournaments.lock().unwrap()
    }

    pub fn registrations(&self) -> MutexGuard<'_, Vec<Registration>> {
        self.inner.registrations.lock().unwrap()
    }

    pub fn balances(&self) -> MutexGuard<'_, HashMap<Uuid, Balance>> {
        self.inner.balances.lock().unwrap()
    }

    pub fn deposits(&self) -> MutexGuard<'_, Vec<Deposit>> {
        self.inner.deposits.lock().unwrap()
    }

    pub fn withdrawals(&self) -> MutexGuard<'_, Vec<Withdrawal>> {
        self.inner.withdrawals.lock().unwrap()
    }

    pub fn transactions(&self) -> MutexGuard<'_, Vec<TransactionRecord>> {
        self.inner.transactions.lock().unwrap()
    }

    pub fn teams(&self) -> MutexGuard<'_, Vec<Team>> {
        self.inner.teams.lock().unwrap()
    }

    /// Status writes observed so far, in call order.
    pub fn status_writes(&self) -> Vec<(Uuid, TournamentStatus)> {
        self.inner.status_writes.lock().unwrap().clone()
    }

    // -- knobs -------------------------------------------------------------

    /// How many read calls (including failed ones) were attempted.
    pub fn read_call_count(&self) -> usize {
        self.inner.read_calls.load(Ordering::SeqCst)
    }

    /// How many write calls were attempted.
    pub fn write_call_count(&self) -> usize {
        self.inner.write_calls.load(Ordering::SeqCst)
    }

    /// Delay every read by `delay`, to widen race windows under test.
    pub fn set_read_delay(&self, delay: Duration) {
        *self.inner.read_delay.lock().unwrap() = Some(delay);
    }

    /// Make every read fail with a transient error until restored.
    pub fn fail_reads(&self, message: &str) {
        *self.inner.read_failure.lock().unwrap() = Some(message.to_string());
    }

    /// Make only the next read fail with a transient error.
    pub fn fail_next_read(&self) {
        self.inner.fail_next_read.store(true, Ordering::SeqCst);
    }

    pub fn restore_reads(&self) {
        *self.inner.read_failure.lock().unwrap() = None;
    }

    /// Make the next registration procedure refuse with `message`.
    pub fn reject_next_registration(&self, message: &str) {
        *self.inner.reject_next_registration.lock().unwrap() = Some(message.to_string());
    }

    /// Make status writes for `id` fail with a transient error.
    pub fn fail_status_writes_for(&self, id: Uuid) {
        self.inner.failing_status_writes.lock().unwrap().push(id);
    }

    // -- internals ---------------------------------------------------------

    async fn read_gate(&self) -> BackendResult<()> {
        let delay = *self.inner.read_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.inner.read_calls.fetch_add(1, Ordering::SeqCst);

        if self.inner.fail_next_read.swap(false, Ordering::SeqCst) {
            return Err(BackendError::Unavailable {
                message: "induced one-shot read failure".to_string(),
            });
        }
        if let Some(message) = self.inner.read_failure.lock().unwrap().clone() {
            return Err(BackendError::Unavailable { message });
        }
        Ok(())
    }

    fn write_gate(&self) {
        self.inner.write_calls.fetch_add(1, Ordering::SeqCst);
    }

    fn credit(&self, user_id: Uuid, amount: i64) {
        let mut balances = self.inner.balances.lock().unwrap();
        let entry = balances.entry(user_id).or_insert_with(|| Balance {
            user_id,
            amount: 0,
            updated_at: OffsetDateTime::now_utc(),
        });
        entry.amount += amount;
        entry.updated_at = OffsetDateTime::now_utc();
    }

    fn record_transaction(&self, user_id: Uuid, kind: TransactionKind, amount: i64, text: &str) {
        self.inner
            .transactions
            .lock()
            .unwrap()
            .push(TransactionRecord {
                id: Uuid::new_v4(),
                user_id,
                kind,
                amount,
                description: text.to_string(),
                created_at: OffsetDateTime::now_utc(),
            });
    }
}

impl ArenaBackend for MemoryBackend {
    fn list_tournaments(
        &self,
        status: Option<TournamentStatus>,
    ) -> BoxFuture<'static, BackendResult<Vec<Tournament>>> {
        let backend = self.clone();
        Box::pin(async move {
            backend.read_gate().await?;
            let mut rows: Vec<Tournament> = backend
                .tournaments()
                .iter()
                .filter(|row| status.is_none_or(|wanted| row.status == wanted))
                .cloned()
                .collect();
            rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(rows)
        })
    }

    fn fetch_tournament(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, BackendResult<Option<Tournament>>> {
        let backend = self.clone();
        Box::pin(async move {
            backend.read_gate().await?;
            Ok(backend.tournaments().iter().find(|row| row.id == id).cloned())
        })
    }

    fn update_tournament_status(
        &self,
        id: Uuid,
        status: TournamentStatus,
    ) -> BoxFuture<'static, BackendResult<()>> {
        let backend = self.clone();
        Box::pin(async move {
            backend.write_gate();
            if backend
                .inner
                .failing_status_writes
                .lock()
                .unwrap()
                .contains(&id)
            {
                return Err(BackendError::Unavailable {
                    message: "induced status write failure".to_string(),
                });
            }
            backend.inner.status_writes.lock().unwrap().push((id, status));
            let mut tournaments = backend.tournaments();
            if let Some(row) = tournaments.iter_mut().find(|row| row.id == id) {
                row.status = status;
                row.updated_at = OffsetDateTime::now_utc();
            }
            Ok(())
        })
    }

    fn list_registrations(
        &self,
        tournament_id: Uuid,
    ) -> BoxFuture<'static, BackendResult<Vec<Registration>>> {
        let backend = self.clone();
        Box::pin(async move {
            backend.read_gate().await?;
            let mut rows: Vec<Registration> = backend
                .registrations()
                .iter()
                .filter(|row| row.tournament_id == tournament_id)
                .cloned()
                .collect();
            rows.sort_by_key(|row| row.slot_number);
            Ok(rows)
        })
    }

    fn list_user_registrations(
        &self,
        user_id: Uuid,
    ) -> BoxFuture<'static, BackendResult<Vec<Registration>>> {
        let backend = self.clone();
        Box::pin(async move {
            backend.read_gate().await?;
            let mut rows: Vec<Registration> = backend
                .registrations()
                .iter()
                .filter(|row| row.user_id == user_id)
                .cloned()
                .collect();
            rows.sort_by(|a, b| b.registered_at.cmp(&a.registered_at));
            Ok(rows)
        })
    }

    fn fetch_balance(&self, user_id: Uuid) -> BoxFuture<'static, BackendResult<Option<Balance>>> {
        let backend = self.clone();
        Box::pin(async move {
            backend.read_gate().await?;
            Ok(backend.balances().get(&user_id).cloned())
        })
    }

    fn list_deposits(&self, user_id: Uuid) -> BoxFuture<'static, BackendResult<Vec<Deposit>>> {
        let backend = self.clone();
        Box::pin(async move {
            backend.read_gate().await?;
            let mut rows: Vec<Deposit> = backend
                .deposits()
                .iter()
                .filter(|row| row.user_id == user_id)
                .cloned()
                .collect();
            rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(rows)
        })
    }

    fn list_withdrawals(
        &self,
        user_id: Uuid,
    ) -> BoxFuture<'static, BackendResult<Vec<Withdrawal>>> {
        let backend = self.clone();
        Box::pin(async move {
            backend.read_gate().await?;
            let mut rows: Vec<Withdrawal> = backend
                .withdrawals()
                .iter()
                .filter(|row| row.user_id == user_id)
                .cloned()
                .collect();
            rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(rows)
        })
    }

    fn list_transactions(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> BoxFuture<'static, BackendResult<Vec<TransactionRecord>>> {
        let backend = self.clone();
        Box::pin(async move {
            backend.read_gate().await?;
            let mut rows: Vec<TransactionRecord> = backend
                .transactions()
                .iter()
                .filter(|row| row.user_id == user_id)
                .cloned()
                .collect();
            rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            rows.truncate(limit);
            Ok(rows)
        })
    }

    fn recent_activity(
        &self,
        user_id: Uuid,
    ) -> BoxFuture<'static, BackendResult<Vec<ActivityEntry>>> {
        let backend = self.clone();
        Box::pin(async move {
            backend.read_gate().await?;
            let mut transactions: Vec<TransactionRecord> = backend
                .transactions()
                .iter()
                .filter(|row| row.user_id == user_id)
                .cloned()
                .collect();
            transactions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            transactions.truncate(5);

            let registrations: Vec<RegistrationActivity> = {
                let tournaments = backend.tournaments();
                backend
                    .registrations()
                    .iter()
                    .filter(|row| row.user_id == user_id)
                    .filter_map(|row| {
                        let tournament =
                            tournaments.iter().find(|t| t.id == row.tournament_id)?;
                        Some(RegistrationActivity {
                            registration_id: row.id,
                            tournament_name: tournament.name.clone(),
                            entry_fee: tournament.entry_fee,
                            registered_at: row.registered_at,
                        })
                    })
                    .collect()
            };

            Ok(merge_activity(&transactions, &registrations))
        })
    }

    fn count_pending(&self) -> BoxFuture<'static, BackendResult<PendingCounts>> {
        let backend = self.clone();
        Box::pin(async move {
            backend.read_gate().await?;
            let deposits = backend
                .deposits()
                .iter()
                .filter(|row| row.status == DepositStatus::Pending)
                .count() as u64;
            let withdrawals = backend
                .withdrawals()
                .iter()
                .filter(|row| row.status == WithdrawalStatus::Pending)
                .count() as u64;
            Ok(PendingCounts::new(deposits, withdrawals))
        })
    }

    fn list_teams(&self) -> BoxFuture<'static, BackendResult<Vec<Team>>> {
        let backend = self.clone();
        Box::pin(async move {
            backend.read_gate().await?;
            Ok(backend
                .teams()
                .iter()
                .filter(|team| team.is_active)
                .cloned()
                .collect())
        })
    }

    fn fetch_team(&self, id: Uuid) -> BoxFuture<'static, BackendResult<Option<Team>>> {
        let backend = self.clone();
        Box::pin(async move {
            backend.read_gate().await?;
            Ok(backend.teams().iter().find(|team| team.id == id).cloned())
        })
    }

    fn register_for_tournament(
        &self,
        call: RegistrationCall,
    ) -> BoxFuture<'static, BackendResult<RegistrationOutcome>> {
        let backend = self.clone();
        Box::pin(async move {
            backend.write_gate();
            if let Some(message) = backend.inner.reject_next_registration.lock().unwrap().take()
            {
                return Err(BackendError::Rejected { message });
            }

            let (entry_fee, slot_number, tournament_name) = {
                let mut tournaments = backend.tournaments();
                let Some(tournament) =
                    tournaments.iter_mut().find(|row| row.id == call.tournament_id)
                else {
                    return Err(BackendError::Rejected {
                        message: "Tournament not found".to_string(),
                    });
                };
                if tournament.slots_remaining() == 0 {
                    return Err(BackendError::Rejected {
                        message: "Tournament slots are full".to_string(),
                    });
                }
                tournament.filled_slots += 1;
                (
                    tournament.entry_fee,
                    tournament.filled_slots,
                    tournament.name.clone(),
                )
            };

            let balance_after = {
                let mut balances = backend.balances();
                let Some(balance) = balances.get_mut(&call.user_id) else {
                    return Err(BackendError::Rejected {
                        message: "Insufficient balance".to_string(),
                    });
                };
                if balance.amount < entry_fee {
                    return Err(BackendError::Rejected {
                        message: "Insufficient balance".to_string(),
                    });
                }
                balance.amount -= entry_fee;
                balance.amount
            };

            backend.registrations().push(Registration {
                id: Uuid::new_v4(),
                tournament_id: call.tournament_id,
                user_id: call.user_id,
                slot_number,
                in_game_name: call.in_game_name,
                team_roster: call.team_roster,
                registered_at: OffsetDateTime::now_utc(),
                rank: None,
                prize_amount: None,
            });
            backend.record_transaction(
                call.user_id,
                TransactionKind::EntryFee,
                entry_fee,
                &format!("Entry fee for {tournament_name}"),
            );

            Ok(RegistrationOutcome {
                slot_number: Some(slot_number),
                balance: Some(balance_after),
            })
        })
    }

    fn insert_deposit(&self, deposit: NewDeposit) -> BoxFuture<'static, BackendResult<Deposit>> {
        let backend = self.clone();
        Box::pin(async move {
            backend.write_gate();
            let row = Deposit {
                id: Uuid::new_v4(),
                user_id: deposit.user_id,
                amount: deposit.amount,
                utr_number: deposit.utr_number,
                screenshot_url: deposit.screenshot_url,
                status: DepositStatus::Pending,
                reviewer_notes: None,
                created_at: OffsetDateTime::now_utc(),
            };
            backend.deposits().push(row.clone());
            Ok(row)
        })
    }

    fn create_withdrawal(&self, call: WithdrawalCall) -> BoxFuture<'static, BackendResult<()>> {
        let backend = self.clone();
        Box::pin(async move {
            backend.write_gate();
            backend.withdrawals().push(Withdrawal {
                id: Uuid::new_v4(),
                user_id: call.user_id,
                amount: call.amount,
                upi_id: call.upi_id,
                status: WithdrawalStatus::Pending,
                payout_utr: None,
                cancellation_reason: None,
                created_at: OffsetDateTime::now_utc(),
            });
            Ok(())
        })
    }

    fn decide_deposit(
        &self,
        decision: DepositDecision,
    ) -> BoxFuture<'static, BackendResult<()>> {
        let backend = self.clone();
        Box::pin(async move {
            backend.write_gate();
            let amount = {
                let mut deposits = backend.deposits();
                let Some(row) = deposits.iter_mut().find(|row| row.id == decision.deposit_id)
                else {
                    return Err(BackendError::Rejected {
                        message: "Deposit not found".to_string(),
                    });
                };
                row.status = match decision.verdict {
                    ReviewVerdict::Approve => DepositStatus::Approved,
                    ReviewVerdict::Reject => DepositStatus::Rejected,
                };
                row.reviewer_notes = decision.reviewer_notes.clone();
                row.amount
            };
            if decision.verdict == ReviewVerdict::Approve {
                backend.credit(decision.user_id, amount);
                backend.record_transaction(
                    decision.user_id,
                    TransactionKind::Deposit,
                    amount,
                    "Deposit approved",
                );
            }
            Ok(())
        })
    }

    fn settle_withdrawal(
        &self,
        settlement: WithdrawalSettlement,
    ) -> BoxFuture<'static, BackendResult<()>> {
        let backend = self.clone();
        Box::pin(async move {
            backend.write_gate();
            let amount = {
                let mut withdrawals = backend.withdrawals();
                let Some(row) = withdrawals
                    .iter_mut()
                    .find(|row| row.id == settlement.withdrawal_id)
                else {
                    return Err(BackendError::Rejected {
                        message: "Withdrawal not found".to_string(),
                    });
                };
                match &settlement.settlement {
                    Settlement::Approve { payout_utr } => {
                        row.status = WithdrawalStatus::Approved;
                        row.payout_utr = Some(payout_utr.clone());
                    }
                    Settlement::Cancel { reason } => {
                        row.status = WithdrawalStatus::Cancelled;
                        row.cancellation_reason = Some(reason.clone());
                    }
                }
                row.amount
            };
            if let Settlement::Approve { .. } = settlement.settlement {
                backend.credit(settlement.user_id, -amount);
                backend.record_transaction(
                    settlement.user_id,
                    TransactionKind::Withdrawal,
                    amount,
                    "Withdrawal paid out",
                );
            }
            Ok(())
        })
    }

    fn delete_tournament(
        &self,
        deletion: TournamentDeletion,
    ) -> BoxFuture<'static, BackendResult<TournamentDeletionOutcome>> {
        let backend = self.clone();
        Box::pin(async move {
            backend.write_gate();
            let entry_fee = {
                let mut tournaments = backend.tournaments();
                let Some(position) = tournaments
                    .iter()
                    .position(|row| row.id == deletion.tournament_id)
                else {
                    return Err(BackendError::Rejected {
                        message: "Tournament not found".to_string(),
                    });
                };
                tournaments.remove(position).entry_fee
            };

            let refunded: Vec<Uuid> = {
                let mut registrations = backend.registrations();
                let refunded = registrations
                    .iter()
                    .filter(|row| row.tournament_id == deletion.tournament_id)
                    .map(|row| row.user_id)
                    .collect();
                registrations.retain(|row| row.tournament_id != deletion.tournament_id);
                refunded
            };
            for user_id in &refunded {
                backend.credit(*user_id, entry_fee);
                backend.record_transaction(
                    *user_id,
                    TransactionKind::Refund,
                    entry_fee,
                    "Tournament cancelled, entry fee refunded",
                );
            }

            Ok(TournamentDeletionOutcome {
                message: Some("Tournament deleted and entry fees refunded".to_string()),
                refunds_issued: refunded.len() as u32,
            })
        })
    }

    fn replace_results(
        &self,
        tournament_id: Uuid,
        results: Vec<NewResult>,
    ) -> BoxFuture<'static, BackendResult<()>> {
        let backend = self.clone();
        Box::pin(async move {
            backend.write_gate();
            backend.inner.results.lock().unwrap().insert(tournament_id, results);
            Ok(())
        })
    }

    fn distribute_prizes(
        &self,
        distribution: PrizeDistribution,
    ) -> BoxFuture<'static, BackendResult<PrizeOutcome>> {
        let backend = self.clone();
        Box::pin(async move {
            backend.write_gate();
            let results = backend
                .inner
                .results
                .lock()
                .unwrap()
                .get(&distribution.tournament_id)
                .cloned()
                .unwrap_or_default();

            let mut total = 0;
            for result in &results {
                if result.prize_amount > 0 {
                    backend.credit(result.user_id, result.prize_amount);
                    backend.record_transaction(
                        result.user_id,
                        TransactionKind::Prize,
                        result.prize_amount,
                        "Tournament prize",
                    );
                    total += result.prize_amount;
                }
                let mut registrations = backend.registrations();
                if let Some(row) = registrations.iter_mut().find(|row| {
                    row.tournament_id == distribution.tournament_id
                        && row.user_id == result.user_id
                }) {
                    row.rank = Some(result.rank);
                    row.prize_amount = Some(result.prize_amount);
                }
            }

            Ok(PrizeOutcome {
                total_distributed: total,
            })
        })
    }

    fn insert_team(&self, team: NewTeam) -> BoxFuture<'static, BackendResult<Team>> {
        let backend = self.clone();
        Box::pin(async move {
            backend.write_gate();
            let row = Team {
                id: Uuid::new_v4(),
                name: team.name,
                tag: team.tag,
                captain_id: team.captain_id,
                description: team.description,
                is_active: true,
                members: Vec::new(),
                total_tournaments: 0,
                tournaments_won: 0,
                total_earnings: 0,
                created_at: OffsetDateTime::now_utc(),
            };
            backend.teams().push(row.clone());
            Ok(row)
        })
    }

    fn insert_team_member(
        &self,
        member: NewTeamMember,
    ) -> BoxFuture<'static, BackendResult<()>> {
        let backend = self.clone();
        Box::pin(async move {
            backend.write_gate();
            let mut teams = backend.teams();
            if let Some(team) = teams.iter_mut().find(|team| team.id == member.team_id) {
                team.members.push(TeamMember {
                    user_id: member.user_id,
                    role: member.role,
                    joined_at: OffsetDateTime::now_utc(),
                });
            }
            Ok(())
        })
    }

    fn delete_team_member(
        &self,
        team_id: Uuid,
        user_id: Uuid,
    ) -> BoxFuture<'static, BackendResult<()>> {
        let backend = self.clone();
        Box::pin(async move {
            backend.write_gate();
            let mut teams = backend.teams();
            if let Some(team) = teams.iter_mut().find(|team| team.id == team_id) {
                team.members.retain(|member| member.user_id != user_id);
            }
            Ok(())
        })
    }

    fn update_member_role(
        &self,
        team_id: Uuid,
        user_id: Uuid,
        role: TeamRole,
    ) -> BoxFuture<'static, BackendResult<()>> {
        let backend = self.clone();
        Box::pin(async move {
            backend.write_gate();
            let mut teams = backend.teams();
            if let Some(team) = teams.iter_mut().find(|team| team.id == team_id) {
                if let Some(member) = team
                    .members
                    .iter_mut()
                    .find(|member| member.user_id == user_id)
                {
                    member.role = role;
                }
            }
            Ok(())
        })
    }

    fn set_team_captain(
        &self,
        team_id: Uuid,
        user_id: Uuid,
    ) -> BoxFuture<'static, BackendResult<()>> {
        let backend = self.clone();
        Box::pin(async move {
            backend.write_gate();
            let mut teams = backend.teams();
            if let Some(team) = teams.iter_mut().find(|team| team.id == team_id) {
                team.captain_id = user_id;
            }
            Ok(())
        })
    }

    fn update_team(
        &self,
        team_id: Uuid,
        update: TeamUpdate,
    ) -> BoxFuture<'static, BackendResult<()>> {
        let backend = self.clone();
        Box::pin(async move {
            backend.write_gate();
            let mut teams = backend.teams();
            if let Some(team) = teams.iter_mut().find(|team| team.id == team_id) {
                if let Some(name) = update.name {
                    team.name = name;
                }
                if let Some(tag) = update.tag {
                    team.tag = Some(tag);
                }
                if let Some(description) = update.description {
                    team.description = Some(description);
                }
            }
            Ok(())
        })
    }

    fn deactivate_team(&self, team_id: Uuid) -> BoxFuture<'static, BackendResult<()>> {
        let backend = self.clone();
        Box::pin(async move {
            backend.write_gate();
            let mut teams = backend.teams();
            if let Some(team) = teams.iter_mut().find(|team| team.id == team_id) {
                team.is_active = false;
            }
            Ok(())
        })
    }
}

#[derive(Default)]
struct MemoryFeedInner {
    attempts: AtomicUsize,
    refuse: AtomicBool,
    senders: Mutex<Vec<(FeedGroup, mpsc::Sender<ChangeEvent>)>>,
}

/// Scripted [`ChangeFeed`] double.
///
/// Subscribe attempts are counted and can be refused; accepted subscriptions
/// are backed by a channel the test pushes events into. Dropping the stored
/// senders simulates a connection loss.
#[derive(Clone, Default)]
pub struct MemoryFeed {
    inner: Arc<MemoryFeedInner>,
}

impl MemoryFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refuse_subscriptions(&self) {
        self.inner.refuse.store(true, Ordering::SeqCst);
    }

    pub fn allow_subscriptions(&self) {
        self.inner.refuse.store(false, Ordering::SeqCst);
    }

    pub fn subscribe_attempts(&self) -> usize {
        self.inner.attempts.load(Ordering::SeqCst)
    }

    /// Push one event into the most recent subscription of `group`.
    pub async fn push(&self, group: FeedGroup, event: ChangeEvent) {
        let sender = self
            .inner
            .senders
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(g, _)| *g == group)
            .map(|(_, tx)| tx.clone());
        if let Some(sender) = sender {
            let _ = sender.send(event).await;
        }
    }

    /// Drop every live subscription, closing their channels.
    pub fn drop_connections(&self) {
        self.inner.senders.lock().unwrap().clear();
    }
}

impl ChangeFeed for MemoryFeed {
    fn subscribe(
        &self,
        group: FeedGroup,
    ) -> BoxFuture<'static, BackendResult<FeedSubscription>> {
        let feed = self.clone();
        Box::pin(async move {
            feed.inner.attempts.fetch_add(1, Ordering::SeqCst);
            if feed.inner.refuse.load(Ordering::SeqCst) {
                return Err(BackendError::feed_closed("induced subscribe refusal"));
            }
            let (tx, rx) = mpsc::channel(16);
            feed.inner.senders.lock().unwrap().push((group, tx));
            Ok(FeedSubscription::new(rx, None))
        })
    }
}

// -- fixtures shared by the test modules -----------------------------------

pub fn tournament_fixture(
    name: &str,
    status: TournamentStatus,
    starts_in: time::Duration,
) -> Tournament {
    let now = OffsetDateTime::now_utc();
    Tournament {
        id: Uuid::new_v4(),
        name: name.to_string(),
        entry_fee: 50,
        total_slots: 48,
        filled_slots: 0,
        start_date: now + starts_in,
        status,
        winner: None,
        created_by: None,
        room_id: None,
        created_at: now - time::Duration::hours(2),
        updated_at: now - time::Duration::hours(2),
    }
}

pub fn balance_fixture(user_id: Uuid, amount: i64) -> Balance {
    Balance {
        user_id,
        amount,
        updated_at: OffsetDateTime::now_utc(),
    }
}

pub fn deposit_fixture(user_id: Uuid, status: DepositStatus) -> Deposit {
    Deposit {
        id: Uuid::new_v4(),
        user_id,
        amount: 500,
        utr_number: "123456789012".to_string(),
        screenshot_url: "uploads/proof.png".to_string(),
        status,
        reviewer_notes: None,
        created_at: OffsetDateTime::now_utc(),
    }
}

pub fn withdrawal_fixture(user_id: Uuid, status: WithdrawalStatus) -> Withdrawal {
    Withdrawal {
        id: Uuid::new_v4(),
        user_id,
        amount: 300,
        upi_id: "player@upi".to_string(),
        status,
        payout_utr: None,
        cancellation_reason: None,
        created_at: OffsetDateTime::now_utc(),
    }
}

pub fn registration_fixture(tournament_id: Uuid, user_id: Uuid, slot: u32) -> Registration {
    Registration {
        id: Uuid::new_v4(),
        tournament_id,
        user_id,
        slot_number: slot,
        in_game_name: format!("player-{slot}"),
        team_roster: Vec::new(),
        registered_at: OffsetDateTime::now_utc(),
        rank: None,
        prize_amount: None,
    }
}

pub fn team_fixture(name: &str, captain_id: Uuid) -> Team {
    let now = OffsetDateTime::now_utc();
    Team {
        id: Uuid::new_v4(),
        name: name.to_string(),
        tag: None,
        captain_id,
        description: None,
        is_active: true,
        members: vec![TeamMember {
            user_id: captain_id,
            role: TeamRole::Captain,
            joined_at: now,
        }],
        total_tournaments: 0,
        tournaments_won: 0,
        total_earnings: 0,
        created_at: now,
    }
}
