use crate::domain::{
    self, Borrowing, IdentifierKind, Member, MemberId, MembershipTier, member::normalize_email,
};
use crate::ports::{CollectionKind, StoreError};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashSet;
use tracing::{debug, info, warn};

use super::dependencies::ServiceDependencies;
use super::errors::{LendingError, Result};
use super::identifier_generator::next_identifier;
use super::repository;

/// 会員を登録する
///
/// ビジネスルール：
/// - 氏名は空白不可、メールアドレスは`@`を含むこと
/// - メールアドレスは正規化（trim・小文字化）した上で一意
/// - 会員期間 = 登録日時から種別ごとの年数
///
/// # エラー
/// - Validation: 入力値が不正
/// - DuplicateEmail: 登録済みのメールアドレス（事前確認、およびストレージの一意制約違反から変換）
#[tracing::instrument(skip(deps))]
pub async fn enroll(
    deps: &ServiceDependencies,
    name: &str,
    email: &str,
    tier: MembershipTier,
) -> Result<Member> {
    // 1. 入力値の検証
    let email = validate_profile(name, email)?;

    // 2. メールアドレスの重複確認
    if repository::exists_by(deps.store.as_ref(), CollectionKind::Member, "email", &email).await? {
        warn!(%email, "email already registered");
        return Err(LendingError::DuplicateEmail { email });
    }

    // 3. 会員番号の採番とドメイン層での生成
    let member_number = next_identifier(deps, IdentifierKind::Member).await?;
    let member = domain::member::enroll(member_number, name, &email, tier, deps.clock.now());

    // 4. 保存（事前確認と保存の間に同じメールが登録された場合も一意制約で弾かれる）
    let saved = repository::insert(deps.store.as_ref(), member)
        .await
        .map_err(|err| match err {
            StoreError::UniqueViolation { ref field, .. } if field == "email" => {
                LendingError::DuplicateEmail {
                    email: email.clone(),
                }
            }
            other => other.into(),
        })?;

    info!(
        member_id = %saved.entity.id,
        member_number = %saved.entity.member_number,
        tier = %saved.entity.tier,
        "member enrolled"
    );
    Ok(saved.entity)
}

/// 氏名とメールアドレスを検証し、正規化したメールアドレスを返す
fn validate_profile(name: &str, email: &str) -> Result<String> {
    if name.trim().is_empty() {
        return Err(LendingError::Validation("name must not be blank".to_string()));
    }
    let email = normalize_email(email);
    if !email.contains('@') {
        return Err(LendingError::Validation(format!(
            "email is not valid: {email}"
        )));
    }
    Ok(email)
}

/// 氏名とメールアドレスを変更する
///
/// # エラー
/// - Validation: 入力値が不正
/// - NotFound: 会員が存在しない
/// - DuplicateEmail: 別の会員が使っているメールアドレス
#[tracing::instrument(skip(deps))]
pub async fn update_member_profile(
    deps: &ServiceDependencies,
    member_id: MemberId,
    name: &str,
    email: &str,
) -> Result<Member> {
    let email = validate_profile(name, email)?;
    let _guard = deps.locks.acquire(member_id).await;

    let taken = find_member_by_email(deps, &email)
        .await?
        .is_some_and(|owner| owner.id != member_id);
    if taken {
        warn!(%email, %member_id, "email already registered to another member");
        return Err(LendingError::DuplicateEmail { email });
    }

    let member = update_member(deps, member_id, |member, now| {
        Ok(domain::member::update_profile(member, name, &email, now))
    })
    .await
    .map_err(|err| match err {
        LendingError::Store(StoreError::UniqueViolation { ref field, .. }) if field == "email" => {
            LendingError::DuplicateEmail {
                email: email.clone(),
            }
        }
        other => other,
    })?;

    info!(member_id = %member.id, "member profile updated");
    Ok(member)
}

pub async fn get_member(deps: &ServiceDependencies, member_id: MemberId) -> Result<Member> {
    Ok(repository::require::<Member>(deps.store.as_ref(), member_id.value())
        .await?
        .entity)
}

/// メールアドレスで会員を探す（正規化してから比較）
pub async fn find_member_by_email(
    deps: &ServiceDependencies,
    email: &str,
) -> Result<Option<Member>> {
    let members: Vec<Member> =
        repository::find_by(deps.store.as_ref(), "email", normalize_email(email)).await?;
    Ok(members.into_iter().next())
}

/// 氏名またはメールアドレスの部分一致で検索する
///
/// 大文字小文字は区別しない。空の検索語は全会員を返す。
/// 結果は会員番号順。
pub async fn search_members(deps: &ServiceDependencies, term: &str) -> Result<Vec<Member>> {
    let term = term.trim();

    let mut members: Vec<Member> = if term.is_empty() {
        repository::load_all::<Member>(deps.store.as_ref())
            .await?
            .into_iter()
            .map(|versioned| versioned.entity)
            .collect()
    } else {
        let by_name: Vec<Member> = repository::search_by(deps.store.as_ref(), "name", term).await?;
        let by_email: Vec<Member> =
            repository::search_by(deps.store.as_ref(), "email", term).await?;

        let mut seen = HashSet::new();
        by_name
            .into_iter()
            .chain(by_email)
            .filter(|member| seen.insert(member.id))
            .collect()
    };

    members.sort_by(|a, b| a.member_number.cmp(&b.member_number));
    Ok(members)
}

pub async fn members_by_tier(
    deps: &ServiceDependencies,
    tier: MembershipTier,
) -> Result<Vec<Member>> {
    let mut members: Vec<Member> =
        repository::find_by(deps.store.as_ref(), "tier", tier).await?;
    members.sort_by(|a, b| a.member_number.cmp(&b.member_number));
    Ok(members)
}

/// 有効な会員（会員番号順）
pub async fn active_members(deps: &ServiceDependencies) -> Result<Vec<Member>> {
    let mut members: Vec<Member> = repository::find_by(deps.store.as_ref(), "active", true).await?;
    members.sort_by(|a, b| a.member_number.cmp(&b.member_number));
    Ok(members)
}

/// 会員種別を変更する
///
/// 終了日時は既存の開始日時から再計算する。
#[tracing::instrument(skip(deps))]
pub async fn change_tier(
    deps: &ServiceDependencies,
    member_id: MemberId,
    tier: MembershipTier,
) -> Result<Member> {
    let _guard = deps.locks.acquire(member_id).await;
    let member = update_member(deps, member_id, |member, now| {
        Ok(domain::member::change_tier(member, tier, now))
    })
    .await?;

    info!(member_id = %member.id, tier = %member.tier, "membership tier changed");
    Ok(member)
}

/// 罰金を加算する
///
/// # エラー
/// - InvalidAmount: 負の金額
#[tracing::instrument(skip(deps))]
pub async fn assess_fine(
    deps: &ServiceDependencies,
    member_id: MemberId,
    amount: Decimal,
) -> Result<Member> {
    let _guard = deps.locks.acquire(member_id).await;
    let member = update_member(deps, member_id, |member, now| {
        Ok(domain::member::assess_fine(member, amount, now)?)
    })
    .await?;

    info!(
        member_id = %member.id,
        %amount,
        balance = %member.fine_balance.value(),
        "fine assessed"
    );
    Ok(member)
}

/// 罰金を精算する
///
/// # エラー
/// - InvalidAmount: 負の金額、または残高を超える金額
#[tracing::instrument(skip(deps))]
pub async fn settle_fine(
    deps: &ServiceDependencies,
    member_id: MemberId,
    amount: Decimal,
) -> Result<Member> {
    let _guard = deps.locks.acquire(member_id).await;
    let member = update_member(deps, member_id, |member, now| {
        Ok(domain::member::settle_fine(member, amount, now)?)
    })
    .await?;

    info!(
        member_id = %member.id,
        %amount,
        balance = %member.fine_balance.value(),
        "fine settled"
    );
    Ok(member)
}

/// 会員を無効化する
///
/// 貸出中の本があっても無効化できる。無効な会員は新規の貸出・受け取りができない。
#[tracing::instrument(skip(deps))]
pub async fn deactivate(deps: &ServiceDependencies, member_id: MemberId) -> Result<Member> {
    let _guard = deps.locks.acquire(member_id).await;
    let member = update_member(deps, member_id, |member, now| {
        Ok(domain::member::deactivate(member, now))
    })
    .await?;

    info!(member_id = %member.id, "member deactivated");
    Ok(member)
}

#[tracing::instrument(skip(deps))]
pub async fn reactivate(deps: &ServiceDependencies, member_id: MemberId) -> Result<Member> {
    let _guard = deps.locks.acquire(member_id).await;
    let member = update_member(deps, member_id, |member, now| {
        Ok(domain::member::reactivate(member, now))
    })
    .await?;

    info!(member_id = %member.id, "member reactivated");
    Ok(member)
}

/// 貸出中（ACTIVE + OVERDUE）の冊数
pub async fn current_loan_count(deps: &ServiceDependencies, member_id: MemberId) -> Result<usize> {
    repository::require::<Member>(deps.store.as_ref(), member_id.value()).await?;
    open_loan_count(deps, member_id).await
}

/// 会員を削除する
///
/// 未返却の貸出がある会員は削除できない。
///
/// # エラー
/// - NotFound: 会員が存在しない
/// - InvalidState: 未返却の貸出がある
#[tracing::instrument(skip(deps))]
pub async fn delete_member(deps: &ServiceDependencies, member_id: MemberId) -> Result<()> {
    let _guard = deps.locks.acquire(member_id).await;

    repository::require::<Member>(deps.store.as_ref(), member_id.value()).await?;

    let open = open_loan_count(deps, member_id).await?;
    if open > 0 {
        warn!(%member_id, open, "member still has open borrowings");
        return Err(LendingError::InvalidState {
            entity: CollectionKind::Member,
            id: member_id.value(),
            status: "HAS_OPEN_BORROWINGS".to_string(),
        });
    }

    if !deps
        .store
        .delete(CollectionKind::Member, member_id.value())
        .await?
    {
        return Err(LendingError::not_found(
            CollectionKind::Member,
            member_id.value(),
        ));
    }

    info!(%member_id, "member deleted");
    Ok(())
}

/// 返却日が未設定の貸出を数える（存在確認はしない）
pub(super) async fn open_loan_count(
    deps: &ServiceDependencies,
    member_id: MemberId,
) -> Result<usize> {
    let borrowings: Vec<Borrowing> =
        repository::find_by(deps.store.as_ref(), "member_id", member_id).await?;
    Ok(borrowings.iter().filter(|b| b.is_open()).count())
}

/// 会員のread-modify-write
///
/// 呼び出し側が会員ロックを保持していること。
/// 読み込み時のversionを条件に書き込み、競合した場合は読み直して
/// `max_write_attempts`回まで再試行する。上書き保存はしない。
pub(super) async fn update_member<F>(
    deps: &ServiceDependencies,
    member_id: MemberId,
    mut apply: F,
) -> Result<Member>
where
    F: FnMut(&Member, DateTime<Utc>) -> Result<Member> + Send,
{
    let max_attempts = deps.settings.max_write_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        let current = repository::require::<Member>(deps.store.as_ref(), member_id.value()).await?;
        let updated = apply(&current.entity, deps.clock.now())?;

        match repository::update(deps.store.as_ref(), &current, updated).await {
            Ok(saved) => return Ok(saved.entity),
            Err(StoreError::VersionConflict { .. }) if attempt < max_attempts => {
                debug!(%member_id, attempt, "member version conflict, retrying");
            }
            Err(err) => return Err(err.into()),
        }
    }
}
