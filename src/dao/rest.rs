//! HTTP implementation of [`ArenaBackend`] against the arena data service's
//! PostgREST-style API: table endpoints for rows, `/rpc/` endpoints for the
//! atomic procedures.

use std::time::Duration;

use futures::future::BoxFuture;
use reqwest::header::CONTENT_RANGE;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::dao::backend::{ArenaBackend, BackendError, BackendResult};
use crate::dao::models::{
    ActivityEntry, Balance, Deposit, DepositDecision, NewDeposit, NewResult, NewTeam,
    NewTeamMember, PendingCounts, PrizeDistribution, PrizeOutcome, Registration,
    RegistrationActivity, RegistrationCall, RegistrationOutcome, RegistrationRow, ReviewVerdict,
    Settlement, Team, TeamRole, TeamUpdate, Tournament, TournamentDeletion,
    TournamentDeletionOutcome, TournamentRow, TournamentStatus, TransactionRecord, Withdrawal,
    WithdrawalCall, WithdrawalSettlement, merge_activity, roster_to_wire,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// How many transactions and registrations feed the merged activity list.
const ACTIVITY_FETCH_LIMIT: usize = 5;

/// Error shape the data service uses for refused requests.
#[derive(Debug, serde::Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// REST client for the arena data service.
#[derive(Clone)]
pub struct RestBackend {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl RestBackend {
    /// Build a client for the service at `base_url`.
    ///
    /// `api_key`, when set, is sent both as the `apikey` header and as a
    /// bearer token, which is what the hosted flavor of the API expects.
    pub fn new(base_url: &str, api_key: Option<&str>) -> BackendResult<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|source| BackendError::ClientBuilder { source })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.map(str::to_string),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.base_url, path);
        let mut builder = self.client.request(method, url);
        if let Some(key) = &self.api_key {
            builder = builder.header("apikey", key).bearer_auth(key);
        }
        builder
    }

    async fn get_rows<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> BackendResult<Vec<T>> {
        let response = self
            .request(Method::GET, path)
            .query(query)
            .send()
            .await
            .map_err(|source| BackendError::RequestSend {
                path: path.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::OK => {
                response
                    .json::<Vec<T>>()
                    .await
                    .map_err(|source| BackendError::DecodeResponse {
                        path: path.to_string(),
                        source,
                    })
            }
            status => Err(BackendError::RequestStatus {
                path: path.to_string(),
                status,
            }),
        }
    }

    async fn get_optional<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> BackendResult<Option<T>> {
        let mut query = query.to_vec();
        query.push(("limit", "1".to_string()));
        let mut rows = self.get_rows::<T>(path, &query).await?;
        Ok(rows.drain(..).next())
    }

    async fn insert_returning<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> BackendResult<T> {
        let response = self
            .request(Method::POST, path)
            .header("Prefer", "return=representation")
            .json(body)
            .send()
            .await
            .map_err(|source| BackendError::RequestSend {
                path: path.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::CREATED | StatusCode::OK => {
                let mut rows = response.json::<Vec<T>>().await.map_err(|source| {
                    BackendError::DecodeResponse {
                        path: path.to_string(),
                        source,
                    }
                })?;
                rows.drain(..).next().ok_or_else(|| BackendError::RequestStatus {
                    path: path.to_string(),
                    status: StatusCode::NO_CONTENT,
                })
            }
            status => Err(self.refusal_or_status(path, status, response).await),
        }
    }

    async fn insert<B: Serialize>(&self, path: &str, body: &B) -> BackendResult<()> {
        let response = self
            .request(Method::POST, path)
            .header("Prefer", "return=minimal")
            .json(body)
            .send()
            .await
            .map_err(|source| BackendError::RequestSend {
                path: path.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::CREATED | StatusCode::OK | StatusCode::NO_CONTENT => Ok(()),
            status => Err(self.refusal_or_status(path, status, response).await),
        }
    }

    async fn patch<B: Serialize>(
        &self,
        path: &str,
        query: &[(&str, String)],
        body: &B,
    ) -> BackendResult<()> {
        let response = self
            .request(Method::PATCH, path)
            .query(query)
            .header("Prefer", "return=minimal")
            .json(body)
            .send()
            .await
            .map_err(|source| BackendError::RequestSend {
                path: path.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::OK | StatusCode::NO_CONTENT => Ok(()),
            status => Err(self.refusal_or_status(path, status, response).await),
        }
    }

    async fn delete(&self, path: &str, query: &[(&str, String)]) -> BackendResult<()> {
        let response = self
            .request(Method::DELETE, path)
            .query(query)
            .send()
            .await
            .map_err(|source| BackendError::RequestSend {
                path: path.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::OK | StatusCode::NO_CONTENT => Ok(()),
            status => Err(BackendError::RequestStatus {
                path: path.to_string(),
                status,
            }),
        }
    }

    async fn count(&self, path: &str, query: &[(&str, String)]) -> BackendResult<u64> {
        let response = self
            .request(Method::HEAD, path)
            .query(query)
            .header("Prefer", "count=exact")
            .send()
            .await
            .map_err(|source| BackendError::RequestSend {
                path: path.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::OK | StatusCode::PARTIAL_CONTENT | StatusCode::NO_CONTENT => response
                .headers()
                .get(CONTENT_RANGE)
                .and_then(|header| header.to_str().ok())
                .and_then(parse_exact_count)
                .ok_or_else(|| BackendError::MissingCount {
                    path: path.to_string(),
                }),
            status => Err(BackendError::RequestStatus {
                path: path.to_string(),
                status,
            }),
        }
    }

    /// Invoke an atomic procedure and unwrap its outcome envelope.
    async fn call_procedure(&self, name: &str, args: Value) -> BackendResult<Value> {
        let path = format!("rpc/{name}");
        let response = self
            .request(Method::POST, &path)
            .json(&args)
            .send()
            .await
            .map_err(|source| BackendError::RequestSend {
                path: path.clone(),
                source,
            })?;

        match response.status() {
            StatusCode::OK => {
                let payload =
                    response
                        .json::<Value>()
                        .await
                        .map_err(|source| BackendError::DecodeResponse {
                            path: path.clone(),
                            source,
                        })?;
                procedure_outcome(payload)
            }
            status => Err(self.refusal_or_status(&path, status, response).await),
        }
    }

    /// Refused writes carry the service's own message; surface it unchanged
    /// so callers can show it verbatim. Anything else is a status error.
    async fn refusal_or_status(
        &self,
        path: &str,
        status: StatusCode,
        response: reqwest::Response,
    ) -> BackendError {
        if status == StatusCode::BAD_REQUEST || status == StatusCode::CONFLICT {
            if let Ok(body) = response.json::<ApiErrorBody>().await {
                return BackendError::Rejected {
                    message: body.message,
                };
            }
        }
        BackendError::RequestStatus {
            path: path.to_string(),
            status,
        }
    }
}

/// Unwrap the `{success, error, ...}` envelope the procedures answer with.
///
/// `success: false` means the procedure ran and refused; its `error` text is
/// the user-facing message and must not be rephrased.
fn procedure_outcome(payload: Value) -> BackendResult<Value> {
    let refused = payload
        .get("success")
        .and_then(Value::as_bool)
        .is_some_and(|success| !success);

    if refused {
        let message = payload
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("The request was refused")
            .to_string();
        return Err(BackendError::Rejected { message });
    }

    Ok(payload)
}

/// Extract the total from a `Content-Range: 0-24/3573` header.
fn parse_exact_count(header: &str) -> Option<u64> {
    header.rsplit('/').next()?.trim().parse().ok()
}

fn decode_payload<T: DeserializeOwned>(payload: Value) -> BackendResult<T> {
    serde_json::from_value(payload).map_err(|source| BackendError::DeserializeValue { source })
}

impl ArenaBackend for RestBackend {
    fn list_tournaments(
        &self,
        status: Option<TournamentStatus>,
    ) -> BoxFuture<'static, BackendResult<Vec<Tournament>>> {
        let backend = self.clone();
        Box::pin(async move {
            let mut query = vec![
                ("select", "*".to_string()),
                ("order", "created_at.desc".to_string()),
            ];
            if let Some(status) = status {
                query.push(("status", format!("eq.{}", status.as_str())));
            }
            let rows = backend.get_rows::<TournamentRow>("tournaments", &query).await?;
            Ok(rows.into_iter().map(Tournament::from).collect())
        })
    }

    fn fetch_tournament(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, BackendResult<Option<Tournament>>> {
        let backend = self.clone();
        Box::pin(async move {
            let query = vec![("id", format!("eq.{id}"))];
            let row = backend
                .get_optional::<TournamentRow>("tournaments", &query)
                .await?;
            Ok(row.map(Tournament::from))
        })
    }

    fn update_tournament_status(
        &self,
        id: Uuid,
        status: TournamentStatus,
    ) -> BoxFuture<'static, BackendResult<()>> {
        let backend = self.clone();
        Box::pin(async move {
            let query = vec![("id", format!("eq.{id}"))];
            backend
                .patch("tournaments", &query, &json!({ "status": status.as_str() }))
                .await
        })
    }

    fn list_registrations(
        &self,
        tournament_id: Uuid,
    ) -> BoxFuture<'static, BackendResult<Vec<Registration>>> {
        let backend = self.clone();
        Box::pin(async move {
            let query = vec![
                ("tournament_id", format!("eq.{tournament_id}")),
                ("order", "slot_number.asc".to_string()),
            ];
            let rows = backend
                .get_rows::<RegistrationRow>("tournament_registrations", &query)
                .await?;
            Ok(rows.into_iter().map(Registration::from).collect())
        })
    }

    fn list_user_registrations(
        &self,
        user_id: Uuid,
    ) -> BoxFuture<'static, BackendResult<Vec<Registration>>> {
        let backend = self.clone();
        Box::pin(async move {
            let query = vec![
                ("user_id", format!("eq.{user_id}")),
                ("order", "registered_at.desc".to_string()),
            ];
            let rows = backend
                .get_rows::<RegistrationRow>("tournament_registrations", &query)
                .await?;
            Ok(rows.into_iter().map(Registration::from).collect())
        })
    }

    fn fetch_balance(&self, user_id: Uuid) -> BoxFuture<'static, BackendResult<Option<Balance>>> {
        let backend = self.clone();
        Box::pin(async move {
            let query = vec![("user_id", format!("eq.{user_id}"))];
            backend.get_optional::<Balance>("user_balances", &query).await
        })
    }

    fn list_deposits(&self, user_id: Uuid) -> BoxFuture<'static, BackendResult<Vec<Deposit>>> {
        let backend = self.clone();
        Box::pin(async move {
            let query = vec![
                ("user_id", format!("eq.{user_id}")),
                ("order", "created_at.desc".to_string()),
            ];
            backend.get_rows::<Deposit>("deposits", &query).await
        })
    }

    fn list_withdrawals(
        &self,
        user_id: Uuid,
    ) -> BoxFuture<'static, BackendResult<Vec<Withdrawal>>> {
        let backend = self.clone();
        Box::pin(async move {
            let query = vec![
                ("user_id", format!("eq.{user_id}")),
                ("order", "created_at.desc".to_string()),
            ];
            backend.get_rows::<Withdrawal>("withdrawals", &query).await
        })
    }

    fn list_transactions(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> BoxFuture<'static, BackendResult<Vec<TransactionRecord>>> {
        let backend = self.clone();
        Box::pin(async move {
            let query = vec![
                ("user_id", format!("eq.{user_id}")),
                ("order", "created_at.desc".to_string()),
                ("limit", limit.to_string()),
            ];
            backend.get_rows::<TransactionRecord>("transactions", &query).await
        })
    }

    fn recent_activity(
        &self,
        user_id: Uuid,
    ) -> BoxFuture<'static, BackendResult<Vec<ActivityEntry>>> {
        let backend = self.clone();
        Box::pin(async move {
            let transactions = backend
                .get_rows::<TransactionRecord>(
                    "transactions",
                    &[
                        ("user_id", format!("eq.{user_id}")),
                        ("order", "created_at.desc".to_string()),
                        ("limit", ACTIVITY_FETCH_LIMIT.to_string()),
                    ],
                )
                .await?;

            #[derive(serde::Deserialize)]
            struct JoinedRegistration {
                id: Uuid,
                #[serde(with = "time::serde::rfc3339")]
                registered_at: time::OffsetDateTime,
                tournaments: Option<JoinedTournament>,
            }
            #[derive(serde::Deserialize)]
            struct JoinedTournament {
                name: String,
                #[serde(default)]
                entry_fee: i64,
            }

            let joined = backend
                .get_rows::<JoinedRegistration>(
                    "tournament_registrations",
                    &[
                        (
                            "select",
                            "id,registered_at,tournaments(name,entry_fee)".to_string(),
                        ),
                        ("user_id", format!("eq.{user_id}")),
                        ("order", "registered_at.desc".to_string()),
                        ("limit", ACTIVITY_FETCH_LIMIT.to_string()),
                    ],
                )
                .await?;

            let registrations: Vec<RegistrationActivity> = joined
                .into_iter()
                .filter_map(|row| {
                    let tournament = row.tournaments?;
                    Some(RegistrationActivity {
                        registration_id: row.id,
                        tournament_name: tournament.name,
                        entry_fee: tournament.entry_fee,
                        registered_at: row.registered_at,
                    })
                })
                .collect();

            Ok(merge_activity(&transactions, &registrations))
        })
    }

    fn count_pending(&self) -> BoxFuture<'static, BackendResult<PendingCounts>> {
        let backend = self.clone();
        Box::pin(async move {
            let pending = ("status", "eq.pending".to_string());
            let deposits = backend.count("deposits", &[pending.clone()]).await?;
            let withdrawals = backend.count("withdrawals", &[pending]).await?;
            Ok(PendingCounts::new(deposits, withdrawals))
        })
    }

    fn list_teams(&self) -> BoxFuture<'static, BackendResult<Vec<Team>>> {
        let backend = self.clone();
        Box::pin(async move {
            let query = vec![
                (
                    "select",
                    "*,members:team_members(user_id,role,joined_at)".to_string(),
                ),
                ("is_active", "eq.true".to_string()),
                ("order", "created_at.desc".to_string()),
            ];
            backend.get_rows::<Team>("teams", &query).await
        })
    }

    fn fetch_team(&self, id: Uuid) -> BoxFuture<'static, BackendResult<Option<Team>>> {
        let backend = self.clone();
        Box::pin(async move {
            let query = vec![
                (
                    "select",
                    "*,members:team_members(user_id,role,joined_at)".to_string(),
                ),
                ("id", format!("eq.{id}")),
            ];
            backend.get_optional::<Team>("teams", &query).await
        })
    }

    fn register_for_tournament(
        &self,
        call: RegistrationCall,
    ) -> BoxFuture<'static, BackendResult<RegistrationOutcome>> {
        let backend = self.clone();
        Box::pin(async move {
            let args = json!({
                "p_tournament_id": call.tournament_id,
                "p_user_id": call.user_id,
                "p_in_game_name": call.in_game_name,
                "p_friend_in_game_name": roster_to_wire(&call.team_roster),
            });
            let payload = backend.call_procedure("register_for_tournament", args).await?;
            decode_payload(payload)
        })
    }

    fn insert_deposit(&self, deposit: NewDeposit) -> BoxFuture<'static, BackendResult<Deposit>> {
        let backend = self.clone();
        Box::pin(async move { backend.insert_returning("deposits", &deposit).await })
    }

    fn create_withdrawal(&self, call: WithdrawalCall) -> BoxFuture<'static, BackendResult<()>> {
        let backend = self.clone();
        Box::pin(async move { backend.insert("withdrawals", &call).await })
    }

    fn decide_deposit(
        &self,
        decision: DepositDecision,
    ) -> BoxFuture<'static, BackendResult<()>> {
        let backend = self.clone();
        Box::pin(async move {
            let name = match decision.verdict {
                ReviewVerdict::Approve => "approve_deposit",
                ReviewVerdict::Reject => "reject_deposit",
            };
            let args = json!({
                "p_deposit_id": decision.deposit_id,
                "p_boss_id": decision.reviewed_by,
                "p_boss_notes": decision.reviewer_notes,
            });
            backend.call_procedure(name, args).await?;
            Ok(())
        })
    }

    fn settle_withdrawal(
        &self,
        settlement: WithdrawalSettlement,
    ) -> BoxFuture<'static, BackendResult<()>> {
        let backend = self.clone();
        Box::pin(async move {
            let (name, args) = match settlement.settlement {
                Settlement::Approve { payout_utr } => (
                    "approve_withdrawal",
                    json!({
                        "p_withdrawal_id": settlement.withdrawal_id,
                        "p_boss_id": settlement.reviewed_by,
                        "p_payout_utr": payout_utr,
                    }),
                ),
                Settlement::Cancel { reason } => (
                    "cancel_withdrawal",
                    json!({
                        "p_withdrawal_id": settlement.withdrawal_id,
                        "p_boss_id": settlement.reviewed_by,
                        "p_cancellation_reason": reason,
                    }),
                ),
            };
            backend.call_procedure(name, args).await?;
            Ok(())
        })
    }

    fn delete_tournament(
        &self,
        deletion: TournamentDeletion,
    ) -> BoxFuture<'static, BackendResult<TournamentDeletionOutcome>> {
        let backend = self.clone();
        Box::pin(async move {
            let args = json!({
                "p_tournament_id": deletion.tournament_id,
                "p_deleted_by": deletion.deleted_by,
            });
            let payload = backend
                .call_procedure("delete_tournament_with_refund", args)
                .await?;
            decode_payload(payload)
        })
    }

    fn replace_results(
        &self,
        tournament_id: Uuid,
        results: Vec<NewResult>,
    ) -> BoxFuture<'static, BackendResult<()>> {
        let backend = self.clone();
        Box::pin(async move {
            let query = vec![("tournament_id", format!("eq.{tournament_id}"))];
            backend.delete("tournament_results", &query).await?;

            if results.is_empty() {
                return Ok(());
            }
            let rows: Vec<Value> = results
                .iter()
                .map(|result| {
                    json!({
                        "tournament_id": tournament_id,
                        "user_id": result.user_id,
                        "rank": result.rank,
                        "kills": result.kills,
                        "prize_amount": result.prize_amount,
                    })
                })
                .collect();
            backend.insert("tournament_results", &rows).await
        })
    }

    fn distribute_prizes(
        &self,
        distribution: PrizeDistribution,
    ) -> BoxFuture<'static, BackendResult<PrizeOutcome>> {
        let backend = self.clone();
        Box::pin(async move {
            let args = json!({
                "p_tournament_id": distribution.tournament_id,
                "p_admin_id": distribution.admin_id,
            });
            let payload = backend
                .call_procedure("distribute_tournament_prizes", args)
                .await?;
            decode_payload(payload)
        })
    }

    fn insert_team(&self, team: NewTeam) -> BoxFuture<'static, BackendResult<Team>> {
        let backend = self.clone();
        Box::pin(async move { backend.insert_returning("teams", &team).await })
    }

    fn insert_team_member(
        &self,
        member: NewTeamMember,
    ) -> BoxFuture<'static, BackendResult<()>> {
        let backend = self.clone();
        Box::pin(async move { backend.insert("team_members", &member).await })
    }

    fn delete_team_member(
        &self,
        team_id: Uuid,
        user_id: Uuid,
    ) -> BoxFuture<'static, BackendResult<()>> {
        let backend = self.clone();
        Box::pin(async move {
            let query = vec![
                ("team_id", format!("eq.{team_id}")),
                ("user_id", format!("eq.{user_id}")),
            ];
            backend.delete("team_members", &query).await
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
            let query = vec![
                ("team_id", format!("eq.{team_id}")),
                ("user_id", format!("eq.{user_id}")),
            ];
            backend.patch("team_members", &query, &json!({ "role": role })).await
        })
    }

    fn set_team_captain(
        &self,
        team_id: Uuid,
        user_id: Uuid,
    ) -> BoxFuture<'static, BackendResult<()>> {
        let backend = self.clone();
        Box::pin(async move {
            let query = vec![("id", format!("eq.{team_id}"))];
            backend
                .patch("teams", &query, &json!({ "captain_id": user_id }))
                .await
        })
    }

    fn update_team(
        &self,
        team_id: Uuid,
        update: TeamUpdate,
    ) -> BoxFuture<'static, BackendResult<()>> {
        let backend = self.clone();
        Box::pin(async move {
            let query = vec![("id", format!("eq.{team_id}"))];
            backend.patch("teams", &query, &update).await
        })
    }

    fn deactivate_team(&self, team_id: Uuid) -> BoxFuture<'static, BackendResult<()>> {
        let backend = self.clone();
        Box::pin(async move {
            let query = vec![("id", format!("eq.{team_id}"))];
            backend
                .patch("teams", &query, &json!({ "is_active": false }))
                .await
        })
    }
}
