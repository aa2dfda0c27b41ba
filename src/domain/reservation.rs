use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{BookId, BorrowingId, MemberId, ReservationId, ReservationTransitionError};

/// 予約ステータス
///
/// PENDING → RECEIVED / CANCELLED。終端状態からは戻らない。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationStatus {
    Pending,
    Received,
    Cancelled,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Pending => "PENDING",
            ReservationStatus::Received => "RECEIVED",
            ReservationStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ReservationStatus::Pending)
    }
}

/// Reservation集約 - 取り置きの予約
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: ReservationId,
    pub reservation_number: String,

    pub member_id: MemberId,
    pub book_id: BookId,

    pub reservation_date: DateTime<Utc>,
    pub status: ReservationStatus,
    /// 受け取り時に作成された貸出
    pub borrowing_id: Option<BorrowingId>,

    pub updated_at: DateTime<Utc>,
}

/// 純粋関数：予約する
pub fn reserve(
    reservation_number: String,
    member_id: MemberId,
    book_id: BookId,
    now: DateTime<Utc>,
) -> Reservation {
    Reservation {
        id: ReservationId::new(),
        reservation_number,
        member_id,
        book_id,
        reservation_date: now,
        status: ReservationStatus::Pending,
        borrowing_id: None,
        updated_at: now,
    }
}

fn ensure_pending(reservation: &Reservation) -> Result<(), ReservationTransitionError> {
    if reservation.status.is_terminal() {
        return Err(ReservationTransitionError {
            current: reservation.status,
        });
    }
    Ok(())
}

/// 純粋関数：取り置き本の受け取り
///
/// PENDINGのみ受け付ける。作成された貸出を紐付ける。
pub fn mark_received(
    reservation: &Reservation,
    borrowing_id: BorrowingId,
    now: DateTime<Utc>,
) -> Result<Reservation, ReservationTransitionError> {
    ensure_pending(reservation)?;

    Ok(Reservation {
        status: ReservationStatus::Received,
        borrowing_id: Some(borrowing_id),
        updated_at: now,
        ..reservation.clone()
    })
}

/// 純粋関数：予約の取り消し
pub fn cancel(
    reservation: &Reservation,
    now: DateTime<Utc>,
) -> Result<Reservation, ReservationTransitionError> {
    ensure_pending(reservation)?;

    Ok(Reservation {
        status: ReservationStatus::Cancelled,
        updated_at: now,
        ..reservation.clone()
    })
}

/// 受け取り可能か（事前検証用）
pub fn can_receive(reservation: &Reservation) -> Result<(), ReservationTransitionError> {
    ensure_pending(reservation)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending() -> Reservation {
        reserve(
            "RSV-000001".to_string(),
            MemberId::new(),
            BookId::new(),
            Utc::now(),
        )
    }

    #[test]
    fn test_reserve_creates_pending() {
        let reservation = pending();
        assert_eq!(reservation.status, ReservationStatus::Pending);
        assert!(reservation.borrowing_id.is_none());
    }

    #[test]
    fn test_mark_received_links_borrowing() {
        let reservation = pending();
        let borrowing_id = BorrowingId::new();

        let received = mark_received(&reservation, borrowing_id, Utc::now()).unwrap();

        assert_eq!(received.status, ReservationStatus::Received);
        assert_eq!(received.borrowing_id, Some(borrowing_id));
    }

    #[test]
    fn test_cancel_pending() {
        let cancelled = cancel(&pending(), Utc::now()).unwrap();
        assert_eq!(cancelled.status, ReservationStatus::Cancelled);
    }

    #[test]
    fn test_terminal_states_are_not_reopened() {
        let now = Utc::now();
        let received = mark_received(&pending(), BorrowingId::new(), now).unwrap();
        let cancelled = cancel(&pending(), now).unwrap();

        assert_eq!(
            cancel(&received, now).unwrap_err(),
            ReservationTransitionError {
                current: ReservationStatus::Received
            }
        );
        assert_eq!(
            mark_received(&cancelled, BorrowingId::new(), now).unwrap_err(),
            ReservationTransitionError {
                current: ReservationStatus::Cancelled
            }
        );
        assert!(mark_received(&received, BorrowingId::new(), now).is_err());
        assert!(cancel(&cancelled, now).is_err());
    }

    #[test]
    fn test_can_receive_only_pending() {
        let now = Utc::now();
        assert!(can_receive(&pending()).is_ok());
        assert!(can_receive(&cancel(&pending(), now).unwrap()).is_err());
    }
}
