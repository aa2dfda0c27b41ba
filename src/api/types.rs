use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Borrowing, Member, MembershipPolicy, MembershipTier, Reservation};

// ============================================================================
// Requests
// ============================================================================

/// 会員登録リクエスト（POST /members）
#[derive(Debug, Deserialize)]
pub struct EnrollMemberRequest {
    pub name: String,
    pub email: String,
    /// STUDENT / FACULTY / REGULAR / PREMIUM（大文字小文字を区別しない）
    pub tier: String,
}

/// 会員情報の変更リクエスト（PUT /members/:id）
#[derive(Debug, Deserialize)]
pub struct UpdateMemberRequest {
    pub name: String,
    pub email: String,
}

/// 会員種別変更リクエスト（PUT /members/:id/tier）
#[derive(Debug, Deserialize)]
pub struct ChangeTierRequest {
    pub tier: String,
}

/// 罰金の加算・精算リクエスト
#[derive(Debug, Deserialize)]
pub struct FineRequest {
    pub amount: Decimal,
}

/// 会員一覧のクエリパラメータ
#[derive(Debug, Default, Deserialize)]
pub struct ListMembersQuery {
    /// 氏名・メールアドレスの部分一致
    pub q: Option<String>,
    /// 会員種別でフィルタリング
    pub tier: Option<String>,
    /// 有効・無効でフィルタリング
    pub active: Option<bool>,
}

/// 貸出リクエスト（POST /borrowings）
#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub member_id: Uuid,
    pub book_id: Uuid,
}

/// 予約リクエスト（POST /reservations）
#[derive(Debug, Deserialize)]
pub struct ReserveRequest {
    pub member_id: Uuid,
    pub book_id: Uuid,
}

// ============================================================================
// Responses
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct MemberResponse {
    pub member_id: Uuid,
    pub member_number: String,
    pub name: String,
    pub email: String,
    pub tier: String,
    pub membership_start: DateTime<Utc>,
    pub membership_end: DateTime<Utc>,
    pub active: bool,
    pub fine_balance: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Member> for MemberResponse {
    fn from(member: Member) -> Self {
        Self {
            member_id: member.id.value(),
            member_number: member.member_number,
            name: member.name,
            email: member.email,
            tier: member.tier.as_str().to_string(),
            membership_start: member.membership_start,
            membership_end: member.membership_end,
            active: member.active,
            fine_balance: member.fine_balance.value(),
            created_at: member.created_at,
            updated_at: member.updated_at,
        }
    }
}

/// 会員種別の一覧（GET /members/membership-types）
#[derive(Debug, Serialize, Deserialize)]
pub struct MembershipTypeResponse {
    pub tier: String,
    pub display_name: String,
    pub duration_years: u32,
    pub borrowing_limit: u32,
    pub daily_fine_rate: Decimal,
}

impl From<(MembershipTier, MembershipPolicy)> for MembershipTypeResponse {
    fn from((tier, policy): (MembershipTier, MembershipPolicy)) -> Self {
        Self {
            tier: tier.as_str().to_string(),
            display_name: tier.display_name().to_string(),
            duration_years: policy.duration_years,
            borrowing_limit: policy.borrowing_limit,
            daily_fine_rate: policy.daily_fine_rate,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BorrowingResponse {
    pub borrowing_id: Uuid,
    pub borrowing_number: String,
    pub member_id: Uuid,
    pub book_id: Uuid,
    pub borrow_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    pub status: String,
    pub fine_accrued: Decimal,
}

impl From<Borrowing> for BorrowingResponse {
    fn from(borrowing: Borrowing) -> Self {
        Self {
            borrowing_id: borrowing.id.value(),
            borrowing_number: borrowing.borrowing_number,
            member_id: borrowing.member_id.value(),
            book_id: borrowing.book_id.value(),
            borrow_date: borrowing.borrow_date,
            due_date: borrowing.due_date,
            return_date: borrowing.return_date,
            status: borrowing.status.as_str().to_string(),
            fine_accrued: borrowing.fine_accrued.value(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReservationResponse {
    pub reservation_id: Uuid,
    pub reservation_number: String,
    pub member_id: Uuid,
    pub book_id: Uuid,
    pub reservation_date: DateTime<Utc>,
    pub status: String,
    pub borrowing_id: Option<Uuid>,
}

impl From<Reservation> for ReservationResponse {
    fn from(reservation: Reservation) -> Self {
        Self {
            reservation_id: reservation.id.value(),
            reservation_number: reservation.reservation_number,
            member_id: reservation.member_id.value(),
            book_id: reservation.book_id.value(),
            reservation_date: reservation.reservation_date,
            status: reservation.status.as_str().to_string(),
            borrowing_id: reservation.borrowing_id.map(|id| id.value()),
        }
    }
}

/// 延滞検出バッチの結果（POST /borrowings/overdue-sweep）
#[derive(Debug, Serialize, Deserialize)]
pub struct OverdueSweepResponse {
    pub flagged: usize,
}

/// エラーレスポンス
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
        }
    }
}
