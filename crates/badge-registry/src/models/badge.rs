//! 徽章记录模型

use serde::{Deserialize, Serialize};

use super::document::{Document, string_array_field};
use crate::error::StoreError;

/// 授予名单字段名
pub const AWARDS_FIELD: &str = "awards";

/// 序列化后的徽章 ID 键，文档中的同名字段不进入 `extra`
const BADGE_ID_KEY: &str = "badgeId";

/// 徽章记录
///
/// 以 badge_id 为键保存在文档存储中；`awards` 为已获得该徽章的用户 ID 集合，
/// 文档中的其他字段原样保留在 `extra` 中。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BadgeRecord {
    pub badge_id: String,
    pub awards: Vec<String>,
    #[serde(flatten)]
    pub extra: Document,
}

impl BadgeRecord {
    /// 从存储文档解析徽章记录
    ///
    /// 缺少 `awards` 字段视为尚无授予记录；`awards` 不是字符串数组时返回格式错误。
    /// 文档自带的 `badgeId` 字段被丢弃，以存储键为准。
    pub fn from_document(
        collection: &str,
        badge_id: &str,
        mut document: Document,
    ) -> Result<Self, StoreError> {
        let awards = string_array_field(&document, AWARDS_FIELD)
            .map_err(|reason| StoreError::malformed(collection, badge_id, reason))?;
        document.remove(AWARDS_FIELD);
        document.remove(BADGE_ID_KEY);

        Ok(Self {
            badge_id: badge_id.to_string(),
            awards,
            extra: document,
        })
    }

    /// 用户是否已获得该徽章
    pub fn has_award(&self, uid: &str) -> bool {
        self.awards.iter().any(|awarded| awarded == uid)
    }

    /// 已获得该徽章的用户数
    pub fn award_count(&self) -> usize {
        self.awards.len()
    }
}
