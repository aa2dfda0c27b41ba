use crate::domain::value_objects::BookId;
use async_trait::async_trait;

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// 蔵書の在庫ポート
///
/// 貸出コンテキストとカタログコンテキストの境界を維持する。
/// 貸出コンテキストはBookIDと「貸せる冊数があるか」だけを知る。
#[async_trait]
pub trait BookAvailability: Send + Sync {
    /// 貸出可能な複本があるか確認する
    async fn has_available_copy(&self, book_id: BookId) -> Result<bool>;

    /// 複本を1冊確保する
    ///
    /// 在庫がなければエラーを返す。
    async fn reserve_copy(&self, book_id: BookId) -> Result<()>;

    /// 確保した複本を戻す
    ///
    /// 返却時、または貸出作成の補償処理で呼ばれる。
    async fn release_copy(&self, book_id: BookId) -> Result<()>;
}
