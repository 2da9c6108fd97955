//! 宿主应答的尽力而为解析。
//!
//! 宿主以 JSON 文本回传应答，字段缺失或类型不符在这里统一转换为 [`PayloadError`]；
//! 调用方负责记录日志并回退到默认行为。

use serde_json::Value;

use scanlink_core::Payload;

use crate::error::PayloadError;

/// 解析顶层 JSON 对象。
pub fn parse_object(text: &str) -> Result<Payload, PayloadError> {
    match serde_json::from_str::<Value>(text)? {
        Value::Object(object) => Ok(object),
        _ => Err(PayloadError::NotAnObject),
    }
}

/// 读取可选的字符串字段；类型不符时视为缺失。
pub fn optional_str<'a>(object: &'a Payload, field: &str) -> Option<&'a str> {
    object.get(field).and_then(Value::as_str)
}

/// 读取必需的字符串字段。
pub fn required_str<'a>(object: &'a Payload, field: &'static str) -> Result<&'a str, PayloadError> {
    match object.get(field) {
        None | Some(Value::Null) => Err(PayloadError::MissingField { field }),
        Some(Value::String(value)) => Ok(value),
        Some(_) => Err(PayloadError::InvalidField {
            field,
            expected: "a string",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_object_payload_is_rejected() {
        assert!(matches!(parse_object("[1, 2]"), Err(PayloadError::NotAnObject)));
        assert!(matches!(parse_object("{oops"), Err(PayloadError::Malformed(_))));
    }

    #[test]
    fn string_fields_are_read_leniently() {
        let object = parse_object(r#"{"barcodeId": "A-EAN13", "count": 3, "highlight": null}"#)
            .expect("合法对象应解析成功");
        assert_eq!(optional_str(&object, "barcodeId"), Some("A-EAN13"));
        assert_eq!(optional_str(&object, "count"), None, "类型不符时视为缺失");
        assert!(matches!(
            required_str(&object, "count"),
            Err(PayloadError::InvalidField { field: "count", .. })
        ));
        assert!(matches!(
            required_str(&object, "requestId"),
            Err(PayloadError::MissingField { field: "requestId" })
        ));
    }
}
