use crate::domain::{
    self, BookId, Borrowing, IdentifierKind, Member, MemberId, Reservation, ReservationId,
    reservation::can_receive,
};
use crate::ports::CollectionKind;
use tracing::{error, info, warn};

use super::borrowing_service::{checkout_locked, release_copy_or_log};
use super::dependencies::ServiceDependencies;
use super::errors::{LendingError, Result};
use super::identifier_generator::next_identifier;
use super::repository;

/// 書籍を予約する
///
/// 同時に持てる予約数に上限はない。
///
/// # エラー
/// - NotFound: 会員が存在しない
#[tracing::instrument(skip(deps))]
pub async fn reserve(
    deps: &ServiceDependencies,
    member_id: MemberId,
    book_id: BookId,
) -> Result<Reservation> {
    repository::require::<Member>(deps.store.as_ref(), member_id.value()).await?;

    let reservation_number = next_identifier(deps, IdentifierKind::Reservation).await?;
    let reservation =
        domain::reservation::reserve(reservation_number, member_id, book_id, deps.clock.now());

    let saved = repository::insert(deps.store.as_ref(), reservation).await?;

    info!(
        reservation_id = %saved.entity.id,
        reservation_number = %saved.entity.reservation_number,
        %member_id,
        %book_id,
        "book reserved"
    );
    Ok(saved.entity)
}

/// 取り置き本を受け取る
///
/// 予約をRECEIVEDにし、同時に貸出を作成する。
///
/// - 貸出に失敗した場合、予約はPENDINGのままエラーを返す
/// - 貸出後に予約の保存が失敗した場合、貸出を削除して複本を戻す
///
/// # エラー
/// - NotFound: 予約が存在しない
/// - InvalidState: PENDINGではない
/// - 貸出のエラー（MemberInactive, BorrowingLimitExceeded, BookUnavailable など）
#[tracing::instrument(skip(deps))]
pub async fn mark_received(
    deps: &ServiceDependencies,
    reservation_id: ReservationId,
) -> Result<Reservation> {
    let id = reservation_id.value();

    let peek = repository::require::<Reservation>(deps.store.as_ref(), id).await?;
    can_receive(&peek.entity).map_err(|err| LendingError::invalid_reservation_state(id, err))?;

    let member_id = peek.entity.member_id;
    let _guard = deps.locks.acquire(member_id).await;

    // ロック取得までに取り消されていないか読み直す
    let current = repository::require::<Reservation>(deps.store.as_ref(), id).await?;
    can_receive(&current.entity).map_err(|err| LendingError::invalid_reservation_state(id, err))?;

    let borrowing = checkout_locked(deps, member_id, current.entity.book_id).await?;

    let received =
        match domain::reservation::mark_received(&current.entity, borrowing.id, deps.clock.now()) {
            Ok(received) => received,
            Err(err) => {
                compensate_checkout(deps, &borrowing).await;
                return Err(LendingError::invalid_reservation_state(id, err));
            }
        };

    let saved = match repository::update(deps.store.as_ref(), &current, received).await {
        Ok(saved) => saved.entity,
        Err(err) => {
            compensate_checkout(deps, &borrowing).await;
            return Err(err.into());
        }
    };

    info!(
        %reservation_id,
        borrowing_id = %borrowing.id,
        %member_id,
        "reservation received"
    );
    Ok(saved)
}

/// 予約を取り消す
///
/// # エラー
/// - NotFound: 予約が存在しない
/// - InvalidState: PENDINGではない
#[tracing::instrument(skip(deps))]
pub async fn cancel(deps: &ServiceDependencies, reservation_id: ReservationId) -> Result<Reservation> {
    let id = reservation_id.value();

    let peek = repository::require::<Reservation>(deps.store.as_ref(), id).await?;
    let _guard = deps.locks.acquire(peek.entity.member_id).await;

    let current = repository::require::<Reservation>(deps.store.as_ref(), id).await?;
    let cancelled = domain::reservation::cancel(&current.entity, deps.clock.now()).map_err(|err| {
        warn!(%reservation_id, status = err.current.as_str(), "cancel rejected");
        LendingError::invalid_reservation_state(id, err)
    })?;

    let saved = repository::update(deps.store.as_ref(), &current, cancelled).await?;

    info!(%reservation_id, "reservation cancelled");
    Ok(saved.entity)
}

pub async fn get_reservation(
    deps: &ServiceDependencies,
    reservation_id: ReservationId,
) -> Result<Reservation> {
    Ok(
        repository::require::<Reservation>(deps.store.as_ref(), reservation_id.value())
            .await?
            .entity,
    )
}

/// 会員の予約一覧（予約日時順）
pub async fn list_reservations_for_member(
    deps: &ServiceDependencies,
    member_id: MemberId,
) -> Result<Vec<Reservation>> {
    repository::require::<Member>(deps.store.as_ref(), member_id.value()).await?;

    let mut reservations: Vec<Reservation> =
        repository::find_by(deps.store.as_ref(), "member_id", member_id).await?;
    reservations.sort_by(|a, b| {
        a.reservation_date
            .cmp(&b.reservation_date)
            .then_with(|| a.reservation_number.cmp(&b.reservation_number))
    });
    Ok(reservations)
}

/// 受け取り処理の補償：作成した貸出を取り消し、複本を戻す
async fn compensate_checkout(deps: &ServiceDependencies, borrowing: &Borrowing) {
    match deps
        .store
        .delete(CollectionKind::Borrowing, borrowing.id.value())
        .await
    {
        Ok(_) => {
            warn!(borrowing_id = %borrowing.id, "borrowing rolled back after reservation update failed");
        }
        Err(err) => {
            error!(borrowing_id = %borrowing.id, error = %err, "failed to roll back borrowing");
        }
    }
    release_copy_or_log(deps, borrowing.book_id).await;
}
