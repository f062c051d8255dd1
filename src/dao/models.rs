//! Domain rows exchanged with the remote arena data service, plus the
//! decode-boundary normalizations that paper over legacy wire quirks.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::skip_serializing_none;
use time::OffsetDateTime;
use utoipa::ToSchema;
use uuid::Uuid;

/// Stored lifecycle status of a tournament.
///
/// This is the status as persisted upstream. The status actually shown to
/// consumers is derived from it together with the clock and winner presence
/// (see `services::status`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TournamentStatus {
    Upcoming,
    Active,
    Completed,
    Cancelled,
}

impl TournamentStatus {
    /// Wire spelling used in query filters and status writes.
    pub fn as_str(&self) -> &'static str {
        match self {
            TournamentStatus::Upcoming => "upcoming",
            TournamentStatus::Active => "active",
            TournamentStatus::Completed => "completed",
            TournamentStatus::Cancelled => "cancelled",
        }
    }
}

/// Collapsed winner reference.
///
/// The upstream schema grew three interchangeable winner columns over time
/// (`winner_id`, `winner_user_id`, `winner_details`). They all mean the same
/// thing, "a winner exists", so rows are collapsed into this single optional
/// value at the decode boundary and the three columns never escape the dao.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct WinnerRef {
    /// Winning user when one of the id columns was populated.
    pub user_id: Option<Uuid>,
    /// Free-form winner description from the legacy details column.
    pub details: Option<String>,
}

/// Collapse the three legacy winner columns into one optional reference.
///
/// Any populated column counts as "winner exists". An empty or whitespace
/// details string does not.
pub fn winner_from_parts(
    winner_id: Option<Uuid>,
    winner_user_id: Option<Uuid>,
    winner_details: Option<String>,
) -> Option<WinnerRef> {
    let details = winner_details.filter(|text| !text.trim().is_empty());
    let user_id = winner_id.or(winner_user_id);

    if user_id.is_none() && details.is_none() {
        return None;
    }

    Some(WinnerRef { user_id, details })
}

/// Tournament row after decode-boundary normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tournament {
    pub id: Uuid,
    pub name: String,
    /// Entry fee in rupees, deducted upstream at registration time.
    pub entry_fee: i64,
    pub total_slots: u32,
    pub filled_slots: u32,
    #[serde(with = "time::serde::rfc3339")]
    pub start_date: OffsetDateTime,
    pub status: TournamentStatus,
    pub winner: Option<WinnerRef>,
    pub created_by: Option<Uuid>,
    /// Custom room shared with registered players once the match is set up.
    pub room_id: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Tournament {
    /// Whether any winner attribute is populated.
    pub fn winner_present(&self) -> bool {
        self.winner.is_some()
    }

    /// Seats still open for registration.
    pub fn slots_remaining(&self) -> u32 {
        self.total_slots.saturating_sub(self.filled_slots)
    }
}

/// Raw tournament row as the upstream service serializes it.
#[derive(Debug, Deserialize)]
pub struct TournamentRow {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub entry_fee: i64,
    #[serde(default)]
    pub total_slots: u32,
    #[serde(default)]
    pub filled_slots: u32,
    #[serde(with = "time::serde::rfc3339")]
    pub start_date: OffsetDateTime,
    pub status: TournamentStatus,
    #[serde(default)]
    pub winner_id: Option<Uuid>,
    #[serde(default)]
    pub winner_user_id: Option<Uuid>,
    #[serde(default)]
    pub winner_details: Option<String>,
    #[serde(default)]
    pub created_by: Option<Uuid>,
    #[serde(default)]
    pub room_id: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<TournamentRow> for Tournament {
    fn from(row: TournamentRow) -> Self {
        let winner = winner_from_parts(row.winner_id, row.winner_user_id, row.winner_details);
        Self {
            id: row.id,
            name: row.name,
            entry_fee: row.entry_fee,
            total_slots: row.total_slots,
            filled_slots: row.filled_slots,
            start_date: row.start_date,
            status: row.status,
            winner,
            created_by: row.created_by,
            room_id: row.room_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Normalize the legacy roster column into a plain member list.
///
/// The upstream column is a text field that historically held either a bare
/// team-mate name or a JSON array of names. Either shape decodes to a list
/// here; empty and null entries are dropped. Serialization back out always
/// emits a JSON array, even for a single member.
pub fn roster_from_wire(raw: Option<&str>) -> Vec<String> {
    let Some(raw) = raw else {
        return Vec::new();
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(trimmed) {
        return items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(name) if !name.trim().is_empty() => Some(name),
                _ => None,
            })
            .collect();
    }

    // Not a JSON array: the whole field is a single member name.
    vec![trimmed.to_string()]
}

/// Encode a roster for a write against the legacy text column.
///
/// Always a JSON array, even for one member; `None` when the roster is empty
/// so solo registrations keep a null column.
pub fn roster_to_wire(roster: &[String]) -> Option<String> {
    if roster.is_empty() {
        return None;
    }
    serde_json::to_string(roster).ok()
}

/// One claimed slot in a tournament.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Registration {
    pub id: Uuid,
    pub tournament_id: Uuid,
    pub user_id: Uuid,
    pub slot_number: u32,
    pub in_game_name: String,
    /// Team mates named alongside the registrant. Empty means solo.
    pub team_roster: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub registered_at: OffsetDateTime,
    /// Final placement, set once results are posted.
    pub rank: Option<u32>,
    /// Prize credited for this slot, set once results are posted.
    pub prize_amount: Option<i64>,
}

/// Raw registration row with the dual-format roster column.
#[derive(Debug, Deserialize)]
pub struct RegistrationRow {
    pub id: Uuid,
    pub tournament_id: Uuid,
    pub user_id: Uuid,
    pub slot_number: u32,
    pub in_game_name: String,
    #[serde(default)]
    pub friend_in_game_name: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub registered_at: OffsetDateTime,
    #[serde(default)]
    pub rank: Option<u32>,
    #[serde(default)]
    pub prize_amount: Option<i64>,
}

impl From<RegistrationRow> for Registration {
    fn from(row: RegistrationRow) -> Self {
        let team_roster = roster_from_wire(row.friend_in_game_name.as_deref());
        Self {
            id: row.id,
            tournament_id: row.tournament_id,
            user_id: row.user_id,
            slot_number: row.slot_number,
            in_game_name: row.in_game_name,
            team_roster,
            registered_at: row.registered_at,
            rank: row.rank,
            prize_amount: row.prize_amount,
        }
    }
}

/// Wallet balance for one user. The value is owned upstream; this service
/// only displays it and invalidates its cached copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    pub user_id: Uuid,
    pub amount: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Review state of a deposit request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DepositStatus {
    Pending,
    Approved,
    Rejected,
}

/// Deposit request awaiting or past review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deposit {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: i64,
    pub utr_number: String,
    /// Opaque reference to the payment-proof upload.
    pub screenshot_url: String,
    pub status: DepositStatus,
    pub reviewer_notes: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Settlement state of a withdrawal request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum WithdrawalStatus {
    Pending,
    Approved,
    Cancelled,
}

/// Withdrawal request awaiting or past settlement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Withdrawal {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: i64,
    pub upi_id: String,
    pub status: WithdrawalStatus,
    pub payout_utr: Option<String>,
    pub cancellation_reason: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Kind of ledger movement recorded upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Deposit,
    Withdrawal,
    EntryFee,
    Prize,
    Refund,
}

/// One immutable ledger entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub amount: i64,
    pub description: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Role of a member inside a team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TeamRole {
    Captain,
    Member,
}

/// Membership record inside a [`Team`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamMember {
    pub user_id: Uuid,
    pub role: TeamRole,
    #[serde(with = "time::serde::rfc3339")]
    pub joined_at: OffsetDateTime,
}

/// Persistent squad with its members embedded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub id: Uuid,
    pub name: String,
    pub tag: Option<String>,
    pub captain_id: Uuid,
    pub description: Option<String>,
    pub is_active: bool,
    #[serde(default)]
    pub members: Vec<TeamMember>,
    #[serde(default)]
    pub total_tournaments: u32,
    #[serde(default)]
    pub tournaments_won: u32,
    #[serde(default)]
    pub total_earnings: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Team {
    /// Teams are capped at four members including the captain.
    pub const MAX_MEMBERS: usize = 4;

    /// Whether another member can still join.
    pub fn has_open_slot(&self) -> bool {
        self.members.len() < Self::MAX_MEMBERS
    }
}

/// Exact counts of requests awaiting review, for the privileged dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingCounts {
    pub pending_deposits: u64,
    pub pending_withdrawals: u64,
    pub total: u64,
}

impl PendingCounts {
    pub fn new(pending_deposits: u64, pending_withdrawals: u64) -> Self {
        Self {
            pending_deposits,
            pending_withdrawals,
            total: pending_deposits + pending_withdrawals,
        }
    }
}

/// Classifies an [`ActivityEntry`] for display grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Payment,
    Tournament,
}

/// Flattened recent-activity item shown on the dashboard feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub id: Uuid,
    pub kind: ActivityKind,
    pub title: String,
    pub detail: String,
    #[serde(with = "time::serde::rfc3339")]
    pub occurred_at: OffsetDateTime,
}

/// Registration joined with the tournament facts the activity feed needs.
#[derive(Debug, Clone)]
pub struct RegistrationActivity {
    pub registration_id: Uuid,
    pub tournament_name: String,
    pub entry_fee: i64,
    pub registered_at: OffsetDateTime,
}

/// Number of entries the merged activity feed is capped at.
pub const ACTIVITY_FEED_CAP: usize = 10;

/// Merge recent transactions and registrations into one feed, newest first,
/// capped at [`ACTIVITY_FEED_CAP`] entries.
pub fn merge_activity(
    transactions: &[TransactionRecord],
    registrations: &[RegistrationActivity],
) -> Vec<ActivityEntry> {
    let mut entries = Vec::with_capacity(transactions.len() + registrations.len());

    for txn in transactions {
        let kind = match txn.kind {
            TransactionKind::Deposit | TransactionKind::Withdrawal => ActivityKind::Payment,
            _ => ActivityKind::Tournament,
        };
        entries.push(ActivityEntry {
            id: txn.id,
            kind,
            title: txn.description.clone(),
            detail: format!("Amount: ₹{}", txn.amount),
            occurred_at: txn.created_at,
        });
    }

    for reg in registrations {
        entries.push(ActivityEntry {
            id: reg.registration_id,
            kind: ActivityKind::Tournament,
            title: "Tournament Joined".to_string(),
            detail: format!("{} - Entry: ₹{}", reg.tournament_name, reg.entry_fee),
            occurred_at: reg.registered_at,
        });
    }

    entries.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
    entries.truncate(ACTIVITY_FEED_CAP);
    entries
}

// ---------------------------------------------------------------------------
// Write and procedure payloads
// ---------------------------------------------------------------------------

/// Arguments for the atomic slot-claiming registration procedure.
#[derive(Debug, Clone)]
pub struct RegistrationCall {
    pub tournament_id: Uuid,
    pub user_id: Uuid,
    pub in_game_name: String,
    pub team_roster: Vec<String>,
}

/// Successful outcome of the registration procedure.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistrationOutcome {
    pub slot_number: Option<u32>,
    /// Balance after the entry fee deduction, when the procedure reports it.
    pub balance: Option<i64>,
}

/// New deposit request to insert.
#[derive(Debug, Clone, Serialize)]
pub struct NewDeposit {
    pub user_id: Uuid,
    pub amount: i64,
    pub utr_number: String,
    pub screenshot_url: String,
}

/// New withdrawal request to insert.
#[derive(Debug, Clone, Serialize)]
pub struct WithdrawalCall {
    pub user_id: Uuid,
    pub amount: i64,
    pub upi_id: String,
}

/// Review verdict for a pending deposit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewVerdict {
    Approve,
    Reject,
}

/// Privileged decision on a pending deposit.
#[derive(Debug, Clone)]
pub struct DepositDecision {
    pub deposit_id: Uuid,
    /// Owner of the deposit, used to target cache invalidation.
    pub user_id: Uuid,
    /// Reviewer issuing the verdict, recorded upstream.
    pub reviewed_by: Uuid,
    pub verdict: ReviewVerdict,
    pub reviewer_notes: Option<String>,
}

/// How a pending withdrawal is settled.
#[derive(Debug, Clone)]
pub enum Settlement {
    /// Pay out and record the bank reference.
    Approve { payout_utr: String },
    /// Refuse and refund, with the reason shown to the user.
    Cancel { reason: String },
}

/// Privileged settlement of a pending withdrawal.
#[derive(Debug, Clone)]
pub struct WithdrawalSettlement {
    pub withdrawal_id: Uuid,
    /// Owner of the withdrawal, used to target cache invalidation.
    pub user_id: Uuid,
    /// Reviewer issuing the settlement, recorded upstream.
    pub reviewed_by: Uuid,
    pub settlement: Settlement,
}

/// Privileged tournament removal with automatic entry-fee refunds.
#[derive(Debug, Clone)]
pub struct TournamentDeletion {
    pub tournament_id: Uuid,
    pub deleted_by: Uuid,
}

/// Outcome of a tournament deletion.
#[derive(Debug, Clone, Deserialize)]
pub struct TournamentDeletionOutcome {
    pub message: Option<String>,
    #[serde(default)]
    pub refunds_issued: u32,
}

/// One posted result row for a tournament slot.
#[derive(Debug, Clone, Serialize)]
pub struct NewResult {
    pub user_id: Uuid,
    pub rank: u32,
    pub kills: u32,
    pub prize_amount: i64,
}

/// Arguments for the atomic prize distribution procedure.
#[derive(Debug, Clone)]
pub struct PrizeDistribution {
    pub tournament_id: Uuid,
    pub admin_id: Uuid,
}

/// Outcome of prize distribution.
#[derive(Debug, Clone, Deserialize)]
pub struct PrizeOutcome {
    #[serde(default)]
    pub total_distributed: i64,
}

/// New team to create. The captain is added as the first member.
#[derive(Debug, Clone, Serialize)]
pub struct NewTeam {
    pub name: String,
    pub tag: Option<String>,
    pub description: Option<String>,
    pub captain_id: Uuid,
}

/// New membership row.
#[derive(Debug, Clone, Serialize)]
pub struct NewTeamMember {
    pub team_id: Uuid,
    pub user_id: Uuid,
    pub role: TeamRole,
}

/// Sparse team metadata update; absent fields are left untouched.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize)]
pub struct TeamUpdate {
    pub name: Option<String>,
    pub tag: Option<String>,
    pub description: Option<String>,
}

// ---------------------------------------------------------------------------
// Change feed
// ---------------------------------------------------------------------------

/// Kind of row change reported by the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Insert => "insert",
            ChangeKind::Update => "update",
            ChangeKind::Delete => "delete",
        }
    }
}

/// Tables the feed is subscribed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeedTable {
    Tournaments,
    TournamentRegistrations,
    Balances,
    Deposits,
    Withdrawals,
}

impl FeedTable {
    /// Wire table name used in subscribe frames and event routing.
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedTable::Tournaments => "tournaments",
            FeedTable::TournamentRegistrations => "tournament_registrations",
            FeedTable::Balances => "user_balances",
            FeedTable::Deposits => "deposits",
            FeedTable::Withdrawals => "withdrawals",
        }
    }

    /// Reverse mapping from the wire table name.
    pub fn from_wire(name: &str) -> Option<Self> {
        match name {
            "tournaments" => Some(FeedTable::Tournaments),
            "tournament_registrations" => Some(FeedTable::TournamentRegistrations),
            "user_balances" => Some(FeedTable::Balances),
            "deposits" => Some(FeedTable::Deposits),
            "withdrawals" => Some(FeedTable::Withdrawals),
            _ => None,
        }
    }
}

/// Listener groups, each owning one feed connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeedGroup {
    /// Tournament rows and their registrations.
    Tournaments,
    /// Wallet balances for every user this gateway serves.
    Balances,
    /// Deposit and withdrawal reviews.
    Payments,
}

impl FeedGroup {
    pub const ALL: [FeedGroup; 3] = [
        FeedGroup::Tournaments,
        FeedGroup::Balances,
        FeedGroup::Payments,
    ];

    /// Tables covered by this group's subscription.
    pub fn tables(&self) -> &'static [FeedTable] {
        match self {
            FeedGroup::Tournaments => {
                &[FeedTable::Tournaments, FeedTable::TournamentRegistrations]
            }
            FeedGroup::Balances => &[FeedTable::Balances],
            FeedGroup::Payments => &[FeedTable::Deposits, FeedTable::Withdrawals],
        }
    }

    /// Human-readable label used in logs and the health payload.
    pub fn label(&self) -> &'static str {
        match self {
            FeedGroup::Tournaments => "tournaments",
            FeedGroup::Balances => "balances",
            FeedGroup::Payments => "payments",
        }
    }
}

/// One row-change notification.
///
/// Payloads are kept as raw JSON: the feed is best-effort and possibly out of
/// order, so consumers treat events as "something changed, refetch truth"
/// rather than trusting field values, with the narrow exception of the winner
/// transition and payment status transitions that drive one-shot effects.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub table: FeedTable,
    pub before: Option<Value>,
    pub after: Option<Value>,
}

impl ChangeEvent {
    /// Row id from the new payload, falling back to the old one on deletes.
    pub fn row_id(&self) -> Option<Uuid> {
        Self::id_of(self.after.as_ref()).or_else(|| Self::id_of(self.before.as_ref()))
    }

    /// Owning user id from the payload, when the table carries one.
    pub fn user_id(&self) -> Option<Uuid> {
        Self::field_uuid(self.after.as_ref(), "user_id")
            .or_else(|| Self::field_uuid(self.before.as_ref(), "user_id"))
    }

    /// Referenced tournament id, for registration rows.
    pub fn tournament_id(&self) -> Option<Uuid> {
        Self::field_uuid(self.after.as_ref(), "tournament_id")
            .or_else(|| Self::field_uuid(self.before.as_ref(), "tournament_id"))
    }

    fn id_of(payload: Option<&Value>) -> Option<Uuid> {
        Self::field_uuid(payload, "id")
    }

    fn field_uuid(payload: Option<&Value>, field: &str) -> Option<Uuid> {
        payload?
            .get(field)?
            .as_str()
            .and_then(|raw| Uuid::parse_str(raw).ok())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use time::macros::datetime;

    use super::*;

    #[test]
    fn winner_collapse_accepts_any_legacy_column() {
        let id = Uuid::new_v4();

        let by_id = winner_from_parts(Some(id), None, None).unwrap();
        assert_eq!(by_id.user_id, Some(id));

        let by_user_id = winner_from_parts(None, Some(id), None).unwrap();
        assert_eq!(by_user_id.user_id, Some(id));

        let by_details = winner_from_parts(None, None, Some("TeamAlpha".into())).unwrap();
        assert_eq!(by_details.user_id, None);
        assert_eq!(by_details.details.as_deref(), Some("TeamAlpha"));

        assert!(winner_from_parts(None, None, None).is_none());
        assert!(winner_from_parts(None, None, Some("   ".into())).is_none());
    }

    #[test]
    fn tournament_row_collapses_winner_columns() {
        let row: TournamentRow = serde_json::from_value(json!({
            "id": "8c3a1f64-2b1e-4f55-9a74-0d6f8a21c111",
            "name": "Evening Scrims",
            "entry_fee": 50,
            "total_slots": 48,
            "filled_slots": 12,
            "start_date": "2026-08-25T18:00:00Z",
            "status": "active",
            "winner_user_id": "11f1ab10-9f6e-4f8e-b2f6-3cf1d2f400aa",
            "created_at": "2026-08-20T10:00:00Z",
            "updated_at": "2026-08-25T17:55:00Z"
        }))
        .unwrap();

        let tournament = Tournament::from(row);
        assert!(tournament.winner_present());
        assert_eq!(tournament.slots_remaining(), 36);
    }

    #[test]
    fn roster_decodes_json_array_format() {
        let roster = roster_from_wire(Some(r#"["Ace","Blaze","Cipher"]"#));
        assert_eq!(roster, vec!["Ace", "Blaze", "Cipher"]);
    }

    #[test]
    fn roster_decodes_legacy_bare_name() {
        assert_eq!(roster_from_wire(Some("SoloFriend")), vec!["SoloFriend"]);
    }

    #[test]
    fn roster_drops_null_and_empty_members() {
        let roster = roster_from_wire(Some(r#"["Ace", null, "", "Cipher"]"#));
        assert_eq!(roster, vec!["Ace", "Cipher"]);
    }

    #[test]
    fn roster_is_empty_for_null_or_blank_column() {
        assert!(roster_from_wire(None).is_empty());
        assert!(roster_from_wire(Some("")).is_empty());
        assert!(roster_from_wire(Some("  ")).is_empty());
    }

    #[test]
    fn roster_round_trips_through_wire_as_array() {
        let single = roster_to_wire(&["Ace".to_string()]).unwrap();
        assert_eq!(single, r#"["Ace"]"#);
        assert_eq!(roster_from_wire(Some(&single)), vec!["Ace"]);

        assert!(roster_to_wire(&[]).is_none());
    }

    #[test]
    fn activity_merge_is_newest_first_and_capped() {
        let base = datetime!(2026-08-25 12:00 UTC);
        let transactions: Vec<TransactionRecord> = (0..7)
            .map(|i| TransactionRecord {
                id: Uuid::new_v4(),
                user_id: Uuid::new_v4(),
                kind: TransactionKind::Deposit,
                amount: 100 + i,
                description: format!("Deposit #{i}"),
                created_at: base + time::Duration::minutes(i),
            })
            .collect();
        let registrations: Vec<RegistrationActivity> = (0..7)
            .map(|i| RegistrationActivity {
                registration_id: Uuid::new_v4(),
                tournament_name: format!("Cup {i}"),
                entry_fee: 25,
                registered_at: base + time::Duration::minutes(i) + time::Duration::seconds(30),
            })
            .collect();

        let feed = merge_activity(&transactions, &registrations);
        assert_eq!(feed.len(), ACTIVITY_FEED_CAP);
        for pair in feed.windows(2) {
            assert!(pair[0].occurred_at >= pair[1].occurred_at);
        }
        // The most recent item is the last registration.
        assert_eq!(feed[0].title, "Tournament Joined");
        assert_eq!(feed[0].detail, "Cup 6 - Entry: ₹25");
    }

    #[test]
    fn activity_classifies_payment_and_tournament_kinds() {
        let txn = TransactionRecord {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            kind: TransactionKind::Prize,
            amount: 500,
            description: "Prize payout".into(),
            created_at: datetime!(2026-08-25 12:00 UTC),
        };
        let feed = merge_activity(std::slice::from_ref(&txn), &[]);
        assert_eq!(feed[0].kind, ActivityKind::Tournament);

        let txn = TransactionRecord {
            kind: TransactionKind::Withdrawal,
            ..txn
        };
        let feed = merge_activity(&[txn], &[]);
        assert_eq!(feed[0].kind, ActivityKind::Payment);
    }

    #[test]
    fn change_event_extracts_row_and_user_ids() {
        let event = ChangeEvent {
            kind: ChangeKind::Update,
            table: FeedTable::Deposits,
            before: None,
            after: Some(json!({
                "id": "8c3a1f64-2b1e-4f55-9a74-0d6f8a21c111",
                "user_id": "11f1ab10-9f6e-4f8e-b2f6-3cf1d2f400aa",
                "status": "approved"
            })),
        };
        assert_eq!(
            event.row_id().unwrap().to_string(),
            "8c3a1f64-2b1e-4f55-9a74-0d6f8a21c111"
        );
        assert_eq!(
            event.user_id().unwrap().to_string(),
            "11f1ab10-9f6e-4f8e-b2f6-3cf1d2f400aa"
        );
    }

    #[test]
    fn transaction_kind_uses_snake_case_wire_names() {
        let parsed: TransactionKind = serde_json::from_str("\"entry_fee\"").unwrap();
        assert_eq!(parsed, TransactionKind::EntryFee);
        assert_eq!(
            serde_json::to_string(&TournamentStatus::Upcoming).unwrap(),
            "\"upcoming\""
        );
    }
}
