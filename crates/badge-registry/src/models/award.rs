//! 徽章授予结果

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::store::UnionOutcome;

/// 授予状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AwardStatus {
    /// 徽章记录此前不存在，本次创建并授予
    CreatedAndAwarded,
    /// 用户已在授予名单中，未做任何写入
    AlreadyAwarded,
    /// 徽章记录已存在，本次将用户并入授予名单
    Awarded,
}

impl AwardStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreatedAndAwarded => "created_and_awarded",
            Self::AlreadyAwarded => "already_awarded",
            Self::Awarded => "awarded",
        }
    }
}

impl fmt::Display for AwardStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<UnionOutcome> for AwardStatus {
    fn from(outcome: UnionOutcome) -> Self {
        match outcome {
            UnionOutcome::Created => Self::CreatedAndAwarded,
            UnionOutcome::Added => Self::Awarded,
            UnionOutcome::AlreadyPresent => Self::AlreadyAwarded,
        }
    }
}

/// 授予结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwardResult {
    pub badge_id: String,
    pub uid: String,
    /// 仅在本次调用创建了徽章记录时为 true
    pub created: bool,
    /// 仅在用户此前已获得该徽章时为 true
    pub already_awarded: bool,
    pub status: AwardStatus,
}

impl AwardResult {
    pub fn new(badge_id: impl Into<String>, uid: impl Into<String>, status: AwardStatus) -> Self {
        Self {
            badge_id: badge_id.into(),
            uid: uid.into(),
            created: status == AwardStatus::CreatedAndAwarded,
            already_awarded: status == AwardStatus::AlreadyAwarded,
            status,
        }
    }

    /// 本次调用是否写入了存储
    pub fn is_write(&self) -> bool {
        self.status != AwardStatus::AlreadyAwarded
    }
}
