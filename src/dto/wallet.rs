//! DTO definitions for the wallet, review and activity surfaces.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::{
        ActivityEntry, ActivityKind, Balance, Deposit, DepositStatus, TransactionKind,
        TransactionRecord, Withdrawal, WithdrawalStatus,
    },
    dto::{
        common::CacheMeta,
        format_timestamp,
        validation::{validate_upi, validate_utr},
    },
};

/// Wallet balance of one user.
#[derive(Debug, Serialize, ToSchema)]
pub struct BalanceResponse {
    pub user_id: Uuid,
    pub amount: i64,
    pub updated_at: String,
    pub meta: CacheMeta,
}

impl BalanceResponse {
    /// Shape a balance row; a missing row reads as zero.
    pub fn shaped(user_id: Uuid, balance: Option<Balance>, meta: CacheMeta) -> Self {
        match balance {
            Some(balance) => Self {
                user_id: balance.user_id,
                amount: balance.amount,
                updated_at: format_timestamp(balance.updated_at),
                meta,
            },
            None => Self {
                user_id,
                amount: 0,
                updated_at: meta.fetched_at.clone(),
                meta,
            },
        }
    }
}

/// One deposit request.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DepositView {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: i64,
    pub utr_number: String,
    pub screenshot_url: String,
    pub status: DepositStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewer_notes: Option<String>,
    pub created_at: String,
}

impl From<Deposit> for DepositView {
    fn from(deposit: Deposit) -> Self {
        Self {
            id: deposit.id,
            user_id: deposit.user_id,
            amount: deposit.amount,
            utr_number: deposit.utr_number,
            screenshot_url: deposit.screenshot_url,
            status: deposit.status,
            reviewer_notes: deposit.reviewer_notes,
            created_at: format_timestamp(deposit.created_at),
        }
    }
}

/// Deposit requests of one user, newest first.
#[derive(Debug, Serialize, ToSchema)]
pub struct DepositListResponse {
    pub deposits: Vec<DepositView>,
    pub meta: CacheMeta,
}

/// One withdrawal request.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WithdrawalView {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: i64,
    pub upi_id: String,
    pub status: WithdrawalStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payout_utr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancellation_reason: Option<String>,
    pub created_at: String,
}

impl From<Withdrawal> for WithdrawalView {
    fn from(withdrawal: Withdrawal) -> Self {
        Self {
            id: withdrawal.id,
            user_id: withdrawal.user_id,
            amount: withdrawal.amount,
            upi_id: withdrawal.upi_id,
            status: withdrawal.status,
            payout_utr: withdrawal.payout_utr,
            cancellation_reason: withdrawal.cancellation_reason,
            created_at: format_timestamp(withdrawal.created_at),
        }
    }
}

/// Withdrawal requests of one user, newest first.
#[derive(Debug, Serialize, ToSchema)]
pub struct WithdrawalListResponse {
    pub withdrawals: Vec<WithdrawalView>,
    pub meta: CacheMeta,
}

/// One ledger entry.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TransactionView {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub amount: i64,
    pub description: String,
    pub created_at: String,
}

impl From<TransactionRecord> for TransactionView {
    fn from(txn: TransactionRecord) -> Self {
        Self {
            id: txn.id,
            kind: txn.kind,
            amount: txn.amount,
            description: txn.description,
            created_at: format_timestamp(txn.created_at),
        }
    }
}

/// Ledger of one user, newest first.
#[derive(Debug, Serialize, ToSchema)]
pub struct TransactionListResponse {
    pub transactions: Vec<TransactionView>,
    pub meta: CacheMeta,
}

/// Counts of requests awaiting privileged review.
#[derive(Debug, Serialize, ToSchema)]
pub struct PendingCountsResponse {
    pub pending_deposits: u64,
    pub pending_withdrawals: u64,
    pub total: u64,
    pub meta: CacheMeta,
}

/// One merged activity item.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ActivityView {
    pub id: Uuid,
    pub kind: ActivityKind,
    pub title: String,
    pub detail: String,
    pub occurred_at: String,
}

impl From<ActivityEntry> for ActivityView {
    fn from(entry: ActivityEntry) -> Self {
        Self {
            id: entry.id,
            kind: entry.kind,
            title: entry.title,
            detail: entry.detail,
            occurred_at: format_timestamp(entry.occurred_at),
        }
    }
}

/// Merged recent activity of one user, newest first, capped at ten.
#[derive(Debug, Serialize, ToSchema)]
pub struct ActivityListResponse {
    pub activities: Vec<ActivityView>,
    pub meta: CacheMeta,
}

/// New deposit request.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateDepositRequest {
    pub user_id: Uuid,
    #[validate(range(min = 1))]
    pub amount: i64,
    #[validate(custom(function = "validate_utr"))]
    pub utr_number: String,
    /// Opaque reference to the payment-proof upload.
    #[validate(length(min = 1))]
    pub screenshot_url: String,
}

/// New withdrawal request. The minimum payout is 100.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateWithdrawalRequest {
    pub user_id: Uuid,
    #[validate(range(min = 100))]
    pub amount: i64,
    #[validate(custom(function = "validate_upi"))]
    pub upi_id: String,
}

/// Privileged verdict on a pending deposit.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct DepositReviewRequest {
    /// Owner of the deposit; targets the cache invalidation.
    pub user_id: Uuid,
    /// Reviewer issuing the verdict.
    pub reviewed_by: Uuid,
    #[validate(length(max = 200))]
    pub reviewer_notes: Option<String>,
}

/// Privileged approval of a pending withdrawal.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct ApproveWithdrawalRequest {
    /// Owner of the withdrawal; targets the cache invalidation.
    pub user_id: Uuid,
    /// Reviewer issuing the approval.
    pub reviewed_by: Uuid,
    #[validate(custom(function = "validate_utr"))]
    pub payout_utr: String,
}

/// Privileged cancellation of a pending withdrawal.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CancelWithdrawalRequest {
    /// Owner of the withdrawal; targets the cache invalidation.
    pub user_id: Uuid,
    /// Reviewer issuing the cancellation.
    pub reviewed_by: Uuid,
    /// Reason shown to the user alongside the refund remark.
    #[validate(length(min = 1, max = 200))]
    pub reason: String,
}
