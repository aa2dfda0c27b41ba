use crate::domain::{
    self, BookId, Borrowing, BorrowingId, IdentifierKind, Member, MemberId, borrowing::status_of,
};
use crate::ports::StoreError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{debug, error, info, warn};

use super::dependencies::ServiceDependencies;
use super::errors::{LendingError, Result};
use super::identifier_generator::next_identifier;
use super::member_service::{open_loan_count, update_member};
use super::repository::{self, Versioned};

/// 保存済みのステータスを現在時刻から導出し直す
fn with_derived_status(borrowing: Borrowing, now: DateTime<Utc>) -> Borrowing {
    Borrowing {
        status: status_of(&borrowing, now),
        ..borrowing
    }
}

/// 書籍を貸し出す
///
/// ビジネスルール：
/// - 会員が存在し、有効であること
/// - 貸出中の冊数が種別の上限未満であること
/// - 貸出可能な複本があること
///
/// 同じ会員への貸出・返却は会員ロックで直列化されるため、
/// 上限チェックと貸出作成の間に別の貸出が割り込むことはない。
///
/// # エラー
/// - NotFound: 会員が存在しない
/// - MemberInactive: 会員が無効
/// - BorrowingLimitExceeded: 上限に達している
/// - BookUnavailable: 複本がない
#[tracing::instrument(skip(deps))]
pub async fn checkout(
    deps: &ServiceDependencies,
    member_id: MemberId,
    book_id: BookId,
) -> Result<Borrowing> {
    let _guard = deps.locks.acquire(member_id).await;
    checkout_locked(deps, member_id, book_id).await
}

/// 会員ロックを取得済みの前提で貸し出す
///
/// 予約の受け取りからも呼ばれる。
pub(super) async fn checkout_locked(
    deps: &ServiceDependencies,
    member_id: MemberId,
    book_id: BookId,
) -> Result<Borrowing> {
    // 1. 会員の存在確認
    let member = repository::require::<Member>(deps.store.as_ref(), member_id.value())
        .await?
        .entity;

    // 2. 会員の有効性確認
    if !member.active {
        warn!(%member_id, "checkout rejected: member inactive");
        return Err(LendingError::MemberInactive { member_id });
    }

    // 3. 貸出上限確認
    let policy = member.policy();
    let open = open_loan_count(deps, member_id).await?;
    if open >= policy.borrowing_limit as usize {
        warn!(
            %member_id,
            open,
            limit = policy.borrowing_limit,
            "checkout rejected: borrowing limit reached"
        );
        return Err(LendingError::BorrowingLimitExceeded {
            member_id,
            limit: policy.borrowing_limit,
        });
    }

    // 4. 書籍の貸出可能性確認
    let available = deps
        .books
        .has_available_copy(book_id)
        .await
        .map_err(LendingError::BookService)?;
    if !available {
        warn!(%book_id, "checkout rejected: no copy available");
        return Err(LendingError::BookUnavailable { book_id });
    }

    // 5. 貸出番号の採番
    let borrowing_number = next_identifier(deps, IdentifierKind::Borrowing).await?;

    // 6. 複本の確保
    if let Err(err) = deps.books.reserve_copy(book_id).await {
        warn!(%book_id, error = %err, "checkout rejected: copy could not be reserved");
        return Err(LendingError::BookUnavailable { book_id });
    }

    // 7. ドメイン層の純粋関数を呼び出し
    let borrowing = domain::borrowing::checkout(
        borrowing_number,
        member_id,
        book_id,
        policy.loan_period(deps.settings.loan_window_days),
        deps.clock.now(),
    );

    // 8. 保存。失敗したら確保した複本を戻す
    let saved = match repository::insert(deps.store.as_ref(), borrowing).await {
        Ok(saved) => saved.entity,
        Err(err) => {
            release_copy_or_log(deps, book_id).await;
            return Err(err.into());
        }
    };

    info!(
        borrowing_id = %saved.id,
        borrowing_number = %saved.borrowing_number,
        %member_id,
        %book_id,
        due_date = %saved.due_date,
        "book checked out"
    );
    Ok(saved)
}

/// 書籍を返却する
///
/// ビジネスルール：
/// - 返却済みの貸出は再返却できない（罰金は1度しか課さない）
/// - 延滞日数 × 会員種別の日額を罰金として会員に加算する
///
/// 処理順：
/// 1. 複本を戻す
/// 2. 罰金があれば会員に加算（失敗したら複本を確保し直す）
/// 3. 貸出を返却済みとして保存（失敗したら罰金を取り消し、複本を確保し直す）
///
/// どこで失敗しても貸出は未返却のまま残るため、呼び出し側は再試行できる。
///
/// # エラー
/// - NotFound: 貸出が存在しない
/// - AlreadyReturned: 返却済み
#[tracing::instrument(skip(deps))]
pub async fn return_book(deps: &ServiceDependencies, borrowing_id: BorrowingId) -> Result<Borrowing> {
    let peek = repository::require::<Borrowing>(deps.store.as_ref(), borrowing_id.value()).await?;
    if !peek.entity.is_open() {
        return Err(LendingError::AlreadyReturned { borrowing_id });
    }

    let member_id = peek.entity.member_id;
    let book_id = peek.entity.book_id;
    let _guard = deps.locks.acquire(member_id).await;

    let member = repository::require::<Member>(deps.store.as_ref(), member_id.value())
        .await?
        .entity;
    let daily_fine_rate = member.policy().daily_fine_rate;
    let now = deps.clock.now();

    // ロック取得までに返却されていないか確認し、罰金を確定させる
    let current =
        repository::require::<Borrowing>(deps.store.as_ref(), borrowing_id.value()).await?;
    let fine = domain::borrowing::return_book(&current.entity, daily_fine_rate, now)
        .map_err(|err| LendingError::from_return(borrowing_id, err))?
        .fine_accrued
        .value();

    // 1. 複本を戻す
    deps.books
        .release_copy(book_id)
        .await
        .map_err(LendingError::BookService)?;

    // 2. 罰金の加算
    if !fine.is_zero() {
        if let Err(err) = update_member(deps, member_id, |member, now| {
            Ok(domain::member::assess_fine(member, fine, now)?)
        })
        .await
        {
            warn!(
                %borrowing_id,
                %member_id,
                %fine,
                error = %err,
                "return aborted: fine could not be assessed"
            );
            reserve_copy_or_log(deps, book_id).await;
            return Err(err);
        }
    }

    // 3. 返却済みとして保存
    let returned = match save_returned(deps, current, daily_fine_rate, now).await {
        Ok(returned) => returned,
        Err(err) => {
            if !fine.is_zero() {
                refund_fine_or_log(deps, member_id, borrowing_id, fine).await;
            }
            reserve_copy_or_log(deps, book_id).await;
            return Err(err);
        }
    };

    info!(
        %borrowing_id,
        %member_id,
        %book_id,
        fine = %returned.fine_accrued.value(),
        "book returned"
    );
    Ok(returned)
}

/// 貸出を返却済みとして保存する
///
/// 延滞検知バッチとの競合は読み直して再試行する。返却期限は変わらないので
/// 再計算しても罰金額は同じ。
async fn save_returned(
    deps: &ServiceDependencies,
    mut current: Versioned<Borrowing>,
    daily_fine_rate: Decimal,
    now: DateTime<Utc>,
) -> Result<Borrowing> {
    let borrowing_id = current.entity.id;
    let max_attempts = deps.settings.max_write_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        let returned = domain::borrowing::return_book(&current.entity, daily_fine_rate, now)
            .map_err(|err| LendingError::from_return(borrowing_id, err))?;

        match repository::update(deps.store.as_ref(), &current, returned).await {
            Ok(saved) => return Ok(saved.entity),
            Err(StoreError::VersionConflict { .. }) if attempt < max_attempts => {
                debug!(%borrowing_id, attempt, "borrowing version conflict, retrying");
                current =
                    repository::require::<Borrowing>(deps.store.as_ref(), borrowing_id.value())
                        .await?;
            }
            Err(err) => return Err(err.into()),
        }
    }
}

/// 返却を中断したときに加算済みの罰金を取り消す
async fn refund_fine_or_log(
    deps: &ServiceDependencies,
    member_id: MemberId,
    borrowing_id: BorrowingId,
    fine: Decimal,
) {
    if let Err(err) = update_member(deps, member_id, |member, now| {
        Ok(domain::member::settle_fine(member, fine, now)?)
    })
    .await
    {
        error!(
            %borrowing_id,
            %member_id,
            %fine,
            error = %err,
            "return aborted but assessed fine could not be refunded"
        );
    }
}

pub async fn get_borrowing(
    deps: &ServiceDependencies,
    borrowing_id: BorrowingId,
) -> Result<Borrowing> {
    let borrowing = repository::require::<Borrowing>(deps.store.as_ref(), borrowing_id.value())
        .await?
        .entity;
    Ok(with_derived_status(borrowing, deps.clock.now()))
}

/// 会員の貸出履歴（貸出日時順、ステータスは導出値）
pub async fn list_borrowings_for_member(
    deps: &ServiceDependencies,
    member_id: MemberId,
) -> Result<Vec<Borrowing>> {
    repository::require::<Member>(deps.store.as_ref(), member_id.value()).await?;

    let now = deps.clock.now();
    let mut borrowings: Vec<Borrowing> =
        repository::find_by(deps.store.as_ref(), "member_id", member_id).await?;
    borrowings.sort_by(|a, b| {
        a.borrow_date
            .cmp(&b.borrow_date)
            .then_with(|| a.borrowing_number.cmp(&b.borrowing_number))
    });

    Ok(borrowings
        .into_iter()
        .map(|borrowing| with_derived_status(borrowing, now))
        .collect())
}

pub(super) async fn release_copy_or_log(deps: &ServiceDependencies, book_id: BookId) {
    if let Err(err) = deps.books.release_copy(book_id).await {
        error!(%book_id, error = %err, "failed to release book copy");
    }
}

async fn reserve_copy_or_log(deps: &ServiceDependencies, book_id: BookId) {
    if let Err(err) = deps.books.reserve_copy(book_id).await {
        error!(%book_id, error = %err, "failed to re-reserve book copy");
    }
}
