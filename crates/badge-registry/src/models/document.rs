//! 文档模型
//!
//! 文档存储中的每条记录都是一个 JSON 对象，数组字段按集合语义使用：
//! 元素按写入顺序保存，同一个值最多出现一次（精确字符串比较，不做大小写或空白归一化）。

use serde_json::{Map, Value};

/// 存储中的文档
pub type Document = Map<String, Value>;

/// 构造只包含一个单元素数组字段的新文档
pub fn single_element_document(field: &str, value: &str) -> Document {
    let mut document = Document::new();
    document.insert(
        field.to_string(),
        Value::Array(vec![Value::String(value.to_string())]),
    );
    document
}

/// 判断数组字段中是否已包含给定值
///
/// 字段缺失视为空数组；字段不是字符串数组时返回格式错误描述。
pub fn array_field_contains(
    document: &Document,
    field: &str,
    value: &str,
) -> std::result::Result<bool, String> {
    match document.get(field) {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Array(items)) => {
            let mut found = false;
            for item in items {
                match item {
                    Value::String(s) => found |= s == value,
                    other => return Err(format!("{} 包含非字符串元素: {}", field, other)),
                }
            }
            Ok(found)
        }
        Some(other) => Err(format!("{} 不是数组: {}", field, other)),
    }
}

/// 以集合并的方式向数组字段追加值
///
/// 返回 true 表示发生了追加，false 表示值已存在、文档未变化。
pub fn union_array_field(
    document: &mut Document,
    field: &str,
    value: &str,
) -> std::result::Result<bool, String> {
    if array_field_contains(document, field, value)? {
        return Ok(false);
    }

    match document.get_mut(field) {
        Some(Value::Array(items)) => items.push(Value::String(value.to_string())),
        _ => {
            document.insert(
                field.to_string(),
                Value::Array(vec![Value::String(value.to_string())]),
            );
        }
    }
    Ok(true)
}

/// 读取字符串数组字段，字段缺失时返回空列表
pub fn string_array_field(
    document: &Document,
    field: &str,
) -> std::result::Result<Vec<String>, String> {
    match document.get(field) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.clone()),
                other => Err(format!("{} 包含非字符串元素: {}", field, other)),
            })
            .collect(),
        Some(other) => Err(format!("{} 不是数组: {}", field, other)),
    }
}
