use serde::{Deserialize, Serialize};

/// 業務番号の桁数（ゼロ埋め）
pub const IDENTIFIER_WIDTH: usize = 6;

/// 業務番号の種類
///
/// ストレージの主キーとは独立した、監査用の連番。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierKind {
    Member,
    Borrowing,
    Reservation,
}

impl IdentifierKind {
    pub const ALL: [IdentifierKind; 3] = [
        IdentifierKind::Member,
        IdentifierKind::Borrowing,
        IdentifierKind::Reservation,
    ];

    pub fn prefix(&self) -> &'static str {
        match self {
            IdentifierKind::Member => "MEM",
            IdentifierKind::Borrowing => "BRW",
            IdentifierKind::Reservation => "RSV",
        }
    }

    /// シーケンス名（永続化キー）
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentifierKind::Member => "member",
            IdentifierKind::Borrowing => "borrowing",
            IdentifierKind::Reservation => "reservation",
        }
    }
}

/// 純粋関数：連番を業務番号に整形する
///
/// 例: `(Borrowing, 42)` → `BRW-000042`
pub fn format_identifier(kind: IdentifierKind, sequence: u64) -> String {
    format!("{}-{:0width$}", kind.prefix(), sequence, width = IDENTIFIER_WIDTH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_identifier_pads_sequence() {
        assert_eq!(format_identifier(IdentifierKind::Member, 1), "MEM-000001");
        assert_eq!(format_identifier(IdentifierKind::Borrowing, 42), "BRW-000042");
        assert_eq!(
            format_identifier(IdentifierKind::Reservation, 999_999),
            "RSV-999999"
        );
    }

    #[test]
    fn test_format_identifier_grows_past_width() {
        assert_eq!(
            format_identifier(IdentifierKind::Member, 1_234_567),
            "MEM-1234567"
        );
    }

    #[test]
    fn test_prefixes_are_distinct() {
        let mut prefixes: Vec<_> = IdentifierKind::ALL.iter().map(|k| k.prefix()).collect();
        prefixes.sort();
        prefixes.dedup();
        assert_eq!(prefixes.len(), IdentifierKind::ALL.len());
    }
}
