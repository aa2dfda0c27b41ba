use crate::domain::value_objects::BookId;
use crate::ports::book_availability::{BookAvailability as BookAvailabilityTrait, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// BookAvailabilityのモック実装
///
/// 書籍ごとの在庫冊数を保持し、状態を持ったテストをサポート。
/// 未登録の書籍は`default_copies`冊（既定は0）の在庫として扱う。
pub struct BookAvailability {
    copies: Mutex<HashMap<BookId, u32>>,
    default_copies: u32,
}

impl BookAvailability {
    pub fn new() -> Self {
        Self::with_default_copies(0)
    }

    /// 未登録の書籍にも`default_copies`冊の在庫があるものとする
    pub fn with_default_copies(default_copies: u32) -> Self {
        Self {
            copies: Mutex::new(HashMap::new()),
            default_copies,
        }
    }

    /// テスト用に貸出可能な複本を登録
    pub fn add_copies(&self, book_id: BookId, count: u32) {
        let mut copies = self.copies.lock().unwrap_or_else(|e| e.into_inner());
        *copies.entry(book_id).or_insert(self.default_copies) += count;
    }

    /// 現在の在庫冊数
    pub fn available_copies(&self, book_id: BookId) -> u32 {
        let copies = self.copies.lock().unwrap_or_else(|e| e.into_inner());
        copies.get(&book_id).copied().unwrap_or(self.default_copies)
    }
}

impl Default for BookAvailability {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BookAvailabilityTrait for BookAvailability {
    async fn has_available_copy(&self, book_id: BookId) -> Result<bool> {
        Ok(self.available_copies(book_id) > 0)
    }

    /// 在庫を1冊減らす（在庫0ならエラー）
    async fn reserve_copy(&self, book_id: BookId) -> Result<()> {
        let mut copies = self.copies.lock().map_err(|_| "inventory lock poisoned")?;
        let count = copies.entry(book_id).or_insert(self.default_copies);
        if *count == 0 {
            return Err(format!("no available copy of book {}", book_id).into());
        }
        *count -= 1;
        Ok(())
    }

    async fn release_copy(&self, book_id: BookId) -> Result<()> {
        let mut copies = self.copies.lock().map_err(|_| "inventory lock poisoned")?;
        *copies.entry(book_id).or_insert(self.default_copies) += 1;
        Ok(())
    }
}
