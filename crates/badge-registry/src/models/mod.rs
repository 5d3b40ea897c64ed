//! 领域模型定义

mod award;
mod badge;
pub mod document;

pub use award::{AwardResult, AwardStatus};
pub use badge::{AWARDS_FIELD, BadgeRecord};
pub use document::Document;
