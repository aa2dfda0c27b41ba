use crate::domain::{IdentifierKind, format_identifier};

use super::dependencies::ServiceDependencies;
use super::errors::Result;

/// 業務番号を採番する
///
/// 連番ソースのアトミックな採番に任せるので、並行呼び出しでも重複しない。
/// 例: `BRW-000042`
pub async fn next_identifier(deps: &ServiceDependencies, kind: IdentifierKind) -> Result<String> {
    let sequence = deps.sequences.next_value(kind).await?;
    Ok(format_identifier(kind, sequence))
}
