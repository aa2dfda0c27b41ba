use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{AmountError, BookId, BorrowingId, FineAmount, MemberId, ReturnBookError};

/// 貸出ステータス
///
/// OVERDUEは導出値。保存された値はキャッシュにすぎず、
/// 真の状態は常に`status_of`で計算する。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BorrowingStatus {
    /// 貸出中
    Active,
    /// 延滞中
    Overdue,
    /// 返却済み
    Returned,
}

impl BorrowingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BorrowingStatus::Active => "ACTIVE",
            BorrowingStatus::Overdue => "OVERDUE",
            BorrowingStatus::Returned => "RETURNED",
        }
    }
}

impl std::str::FromStr for BorrowingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ACTIVE" => Ok(BorrowingStatus::Active),
            "OVERDUE" => Ok(BorrowingStatus::Overdue),
            "RETURNED" => Ok(BorrowingStatus::Returned),
            _ => Err(format!("Invalid borrowing status: {}", s)),
        }
    }
}

/// Borrowing集約 - 1冊の書籍の1回の貸出
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Borrowing {
    // 識別子
    pub id: BorrowingId,
    pub borrowing_number: String,

    // 他の集約への参照（IDのみ）
    pub member_id: MemberId,
    pub book_id: BookId,

    // 貸出管理の責務
    pub borrow_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    pub status: BorrowingStatus,
    pub fine_accrued: FineAmount,

    pub updated_at: DateTime<Utc>,
}

impl Borrowing {
    /// 未返却か（ACTIVEまたはOVERDUE）
    pub fn is_open(&self) -> bool {
        self.return_date.is_none()
    }
}

/// 純粋関数：書籍を貸し出す
///
/// 返却期限 = 貸出日時 + 貸出期間。状態はACTIVE、罰金0。
pub fn checkout(
    borrowing_number: String,
    member_id: MemberId,
    book_id: BookId,
    loan_period: Duration,
    now: DateTime<Utc>,
) -> Borrowing {
    Borrowing {
        id: BorrowingId::new(),
        borrowing_number,
        member_id,
        book_id,
        borrow_date: now,
        due_date: now + loan_period,
        return_date: None,
        status: BorrowingStatus::Active,
        fine_accrued: FineAmount::ZERO,
        updated_at: now,
    }
}

/// 純粋関数：現在の状態を導出する
pub fn status_of(borrowing: &Borrowing, now: DateTime<Utc>) -> BorrowingStatus {
    if borrowing.return_date.is_some() {
        BorrowingStatus::Returned
    } else if now > borrowing.due_date {
        BorrowingStatus::Overdue
    } else {
        BorrowingStatus::Active
    }
}

/// 純粋関数：延滞日数
///
/// 期限を過ぎて経過した「丸1日」の数（切り捨て）。期限ちょうどは0。
pub fn overdue_days(due_date: DateTime<Utc>, at: DateTime<Utc>) -> i64 {
    (at - due_date).num_days().max(0)
}

/// 純粋関数：延滞料金 = 延滞日数 × 日額
///
/// # エラー
/// 日額が負なら`AmountError::Negative`、積が範囲を超えれば`AmountError::Overflow`
pub fn compute_fine(
    overdue_days: i64,
    daily_fine_rate: Decimal,
) -> Result<FineAmount, AmountError> {
    let fine = Decimal::from(overdue_days.max(0))
        .checked_mul(daily_fine_rate)
        .ok_or(AmountError::Overflow)?;
    FineAmount::try_from(fine)
}

/// 純粋関数：書籍を返却する
///
/// ビジネスルール：
/// - 返却済みは再返却不可（二重課金しない）
/// - 延滞していれば延滞日数 × 日額を罰金として記録
///
/// 副作用なし。返却済みのBorrowingを返す。会員への課金は呼び出し側の責務。
pub fn return_book(
    borrowing: &Borrowing,
    daily_fine_rate: Decimal,
    now: DateTime<Utc>,
) -> Result<Borrowing, ReturnBookError> {
    if !borrowing.is_open() || borrowing.status == BorrowingStatus::Returned {
        return Err(ReturnBookError::AlreadyReturned);
    }

    let fine_accrued = compute_fine(overdue_days(borrowing.due_date, now), daily_fine_rate)
        .map_err(ReturnBookError::InvalidFine)?;

    Ok(Borrowing {
        return_date: Some(now),
        status: BorrowingStatus::Returned,
        fine_accrued,
        updated_at: now,
        ..borrowing.clone()
    })
}

/// 純粋関数：延滞状態をキャッシュする
///
/// 保存済みがACTIVEで、現在時刻が期限を過ぎている場合のみ`Some`。
pub fn mark_overdue(borrowing: &Borrowing, now: DateTime<Utc>) -> Option<Borrowing> {
    if borrowing.status != BorrowingStatus::Active
        || status_of(borrowing, now) != BorrowingStatus::Overdue
    {
        return None;
    }

    Some(Borrowing {
        status: BorrowingStatus::Overdue,
        updated_at: now,
        ..borrowing.clone()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_borrowing(now: DateTime<Utc>) -> Borrowing {
        checkout(
            "BRW-000001".to_string(),
            MemberId::new(),
            BookId::new(),
            Duration::days(14),
            now,
        )
    }

    // checkout() のテスト
    #[test]
    fn test_checkout_sets_due_date_from_loan_period() {
        let now = Utc::now();
        let borrowing = open_borrowing(now);

        assert_eq!(borrowing.borrow_date, now);
        assert_eq!(borrowing.due_date, now + Duration::days(14));
        assert_eq!(borrowing.status, BorrowingStatus::Active);
        assert!(borrowing.fine_accrued.is_zero());
        assert!(borrowing.is_open());
    }

    // status_of() のテスト
    #[test]
    fn test_status_of_active_before_due_date() {
        let now = Utc::now();
        let borrowing = open_borrowing(now);
        assert_eq!(
            status_of(&borrowing, now + Duration::days(7)),
            BorrowingStatus::Active
        );
    }

    #[test]
    fn test_status_of_active_exactly_at_due_date() {
        let now = Utc::now();
        let borrowing = open_borrowing(now);
        assert_eq!(status_of(&borrowing, borrowing.due_date), BorrowingStatus::Active);
    }

    #[test]
    fn test_status_of_overdue_after_due_date() {
        let now = Utc::now();
        let borrowing = open_borrowing(now);
        assert_eq!(
            status_of(&borrowing, borrowing.due_date + Duration::seconds(1)),
            BorrowingStatus::Overdue
        );
    }

    #[test]
    fn test_status_of_ignores_stale_stored_status() {
        let now = Utc::now();
        let mut borrowing = open_borrowing(now);
        borrowing.status = BorrowingStatus::Overdue;

        // 保存値がOVERDUEでも期限内ならACTIVE
        assert_eq!(status_of(&borrowing, now), BorrowingStatus::Active);
    }

    #[test]
    fn test_status_of_returned() {
        let now = Utc::now();
        let borrowing = open_borrowing(now);
        let returned = return_book(&borrowing, Decimal::ONE, now + Duration::days(30)).unwrap();
        assert_eq!(
            status_of(&returned, now + Duration::days(60)),
            BorrowingStatus::Returned
        );
    }

    // overdue_days() / compute_fine() のテスト
    #[test]
    fn test_overdue_days_floors_partial_days() {
        let due = Utc::now();
        assert_eq!(overdue_days(due, due), 0);
        assert_eq!(overdue_days(due, due - Duration::days(2)), 0);
        assert_eq!(overdue_days(due, due + Duration::hours(23)), 0);
        assert_eq!(overdue_days(due, due + Duration::hours(60)), 2);
        assert_eq!(overdue_days(due, due + Duration::days(3)), 3);
    }

    #[test]
    fn test_compute_fine() {
        assert_eq!(
            compute_fine(3, Decimal::new(100, 2)).unwrap().value(),
            Decimal::new(300, 2)
        );
        assert_eq!(
            compute_fine(10, Decimal::new(50, 2)).unwrap().value(),
            Decimal::new(500, 2)
        );
        assert!(compute_fine(0, Decimal::new(50, 2)).unwrap().is_zero());
    }

    #[test]
    fn test_compute_fine_rejects_overflow_and_negative_rate() {
        assert_eq!(
            compute_fine(i64::MAX, Decimal::MAX).unwrap_err(),
            AmountError::Overflow
        );
        assert!(matches!(
            compute_fine(2, Decimal::new(-50, 2)),
            Err(AmountError::Negative(_))
        ));
    }

    // return_book() のテスト
    #[test]
    fn test_return_book_three_days_late() {
        let now = Utc::now();
        let borrowing = open_borrowing(now);
        let returned_at = borrowing.due_date + Duration::days(3);

        let returned = return_book(&borrowing, Decimal::new(100, 2), returned_at).unwrap();

        assert_eq!(returned.fine_accrued.value(), Decimal::new(300, 2));
        assert_eq!(returned.return_date, Some(returned_at));
        assert_eq!(returned.status, BorrowingStatus::Returned);
    }

    #[test]
    fn test_return_book_on_due_date_accrues_nothing() {
        let now = Utc::now();
        let borrowing = open_borrowing(now);

        let returned = return_book(&borrowing, Decimal::new(100, 2), borrowing.due_date).unwrap();

        assert!(returned.fine_accrued.is_zero());
    }

    #[test]
    fn test_return_book_fails_when_already_returned() {
        let now = Utc::now();
        let borrowing = open_borrowing(now);
        let returned = return_book(&borrowing, Decimal::ONE, now + Duration::days(1)).unwrap();

        // 2回目の返却は失敗
        let result = return_book(&returned, Decimal::ONE, now + Duration::days(40));
        assert_eq!(result.unwrap_err(), ReturnBookError::AlreadyReturned);
    }

    #[test]
    fn test_return_book_from_cached_overdue() {
        let now = Utc::now();
        let borrowing = open_borrowing(now);
        let overdue = mark_overdue(&borrowing, borrowing.due_date + Duration::days(1)).unwrap();

        let returned =
            return_book(&overdue, Decimal::new(25, 2), overdue.due_date + Duration::days(4))
                .unwrap();

        assert_eq!(returned.status, BorrowingStatus::Returned);
        assert_eq!(returned.fine_accrued.value(), Decimal::new(100, 2));
    }

    // mark_overdue() のテスト
    #[test]
    fn test_mark_overdue_only_after_due_date() {
        let now = Utc::now();
        let borrowing = open_borrowing(now);

        assert!(mark_overdue(&borrowing, now + Duration::days(1)).is_none());

        let overdue = mark_overdue(&borrowing, now + Duration::days(15)).unwrap();
        assert_eq!(overdue.status, BorrowingStatus::Overdue);

        // 既にキャッシュ済みなら何もしない
        assert!(mark_overdue(&overdue, now + Duration::days(16)).is_none());
    }

    #[test]
    fn test_status_parse_round_trip() {
        for status in [
            BorrowingStatus::Active,
            BorrowingStatus::Overdue,
            BorrowingStatus::Returned,
        ] {
            assert_eq!(status.as_str().parse::<BorrowingStatus>(), Ok(status));
        }
        assert!("lost".parse::<BorrowingStatus>().is_err());
    }
}
