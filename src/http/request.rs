//! Request normalization.
//!
//! # Responsibilities
//! - Flatten query parameters, headers and the body into one key space
//! - Extract the client IP behind proxies
//!
//! # Key Space
//! ```text
//! ?aaa=bbb                      → query_aaa
//! X-Request-Id: 1               → header_x_request_id
//! {"hello":"world"} / form body → hello
//! text/plain body               → text
//! ```
//!
//! # Design Decisions
//! - Insertion order is query → headers → body; later writes win
//! - A field with one value flattens to a bare string, otherwise to an array
//! - Entries written before a body error are kept, not rolled back

use std::collections::BTreeMap;
use std::net::SocketAddr;

use axum::http::{header, HeaderMap, Uri};
use serde_json::{Map, Value};

/// Prefix of keys produced from query parameters.
pub const QUERY_PREFIX: &str = "query_";
/// Prefix of keys produced from headers.
pub const HEADER_PREFIX: &str = "header_";
/// Key holding a plain-text body.
pub const TEXT_KEY: &str = "text";

/// The flattened view of a request.
pub type FlatMap = Map<String, Value>;

/// Errors raised while normalizing a request body.
#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    #[error("unsupported content type: {0:?}")]
    UnsupportedContentType(String),
    #[error("malformed json body: {0}")]
    MalformedJson(#[from] serde_json::Error),
    #[error("json body is not an object")]
    NotAnObject,
    #[error("failed to read body: {0}")]
    Body(String),
}

/// Collapse a multi-valued field: one value becomes a bare string,
/// anything else stays an ordered array.
pub fn flatten_values(mut values: Vec<String>) -> Value {
    if values.len() == 1 {
        Value::String(values.remove(0))
    } else {
        Value::Array(values.into_iter().map(Value::String).collect())
    }
}

/// Group `key=value` pairs by key, keeping per-key value order.
fn group_pairs(input: &[u8]) -> BTreeMap<String, Vec<String>> {
    let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (k, v) in form_urlencoded::parse(input) {
        grouped.entry(k.into_owned()).or_default().push(v.into_owned());
    }
    grouped
}

/// `Content-Type` → `content_type`.
pub fn header_key(name: &str) -> String {
    let mut key = String::with_capacity(HEADER_PREFIX.len() + name.len());
    key.push_str(HEADER_PREFIX);
    key.extend(
        name.chars()
            .map(|c| if c == '-' { '_' } else { c.to_ascii_lowercase() }),
    );
    key
}

/// Body families the normalizer understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyKind {
    Json,
    Form,
    Text,
}

/// Dispatch on `type/subtype` only; parameters never affect the family.
fn body_kind(content_type: &str) -> Option<BodyKind> {
    let essence = content_type.split(';').next()?.trim().to_ascii_lowercase();
    let mime: mime::Mime = essence.parse().ok()?;
    if mime.type_() == mime::APPLICATION && mime.subtype() == mime::JSON {
        Some(BodyKind::Json)
    } else if mime.type_() == mime::APPLICATION && mime.subtype() == mime::WWW_FORM_URLENCODED {
        Some(BodyKind::Form)
    } else if mime.type_() == mime::TEXT {
        Some(BodyKind::Text)
    } else {
        None
    }
}

/// Flatten a request into `target`.
///
/// `target` is extended in place; pre-seeded entries survive unless a
/// request field overwrites them. On error the query and header entries
/// already inserted are left in place.
pub fn flatten_request(
    target: &mut FlatMap,
    uri: &Uri,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<(), NormalizeError> {
    if let Some(query) = uri.query() {
        for (key, values) in group_pairs(query.as_bytes()) {
            target.insert(format!("{QUERY_PREFIX}{key}"), flatten_values(values));
        }
    }

    for name in headers.keys() {
        let values = headers
            .get_all(name)
            .iter()
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
            .collect();
        target.insert(header_key(name.as_str()), flatten_values(values));
    }

    if body.is_empty() {
        return Ok(());
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
        .unwrap_or_default();

    match body_kind(&content_type) {
        Some(BodyKind::Json) => {
            let Value::Object(fields) = serde_json::from_slice::<Value>(body)? else {
                return Err(NormalizeError::NotAnObject);
            };
            target.extend(fields);
        }
        Some(BodyKind::Form) => {
            for (key, values) in group_pairs(body) {
                target.insert(key, flatten_values(values));
            }
        }
        Some(BodyKind::Text) => {
            target.insert(
                TEXT_KEY.to_string(),
                Value::String(String::from_utf8_lossy(body).into_owned()),
            );
        }
        None => return Err(NormalizeError::UnsupportedContentType(content_type)),
    }

    Ok(())
}

/// Client IP: the right-most non-empty `X-Forwarded-For` entry,
/// else the peer address.
pub fn extract_client_ip(headers: &HeaderMap, remote: Option<SocketAddr>) -> Option<String> {
    let forwarded = headers
        .get_all("x-forwarded-for")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .last();

    match forwarded {
        Some(ip) => Some(ip.to_string()),
        None => remote.map(|addr| addr.ip().to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use serde_json::json;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.append(*k, HeaderValue::from_static(*v));
        }
        map
    }

    fn flatten(
        uri: &str,
        pairs: &[(&'static str, &'static str)],
        body: &str,
    ) -> (FlatMap, Result<(), NormalizeError>) {
        let uri: Uri = uri.parse().unwrap();
        let mut map = FlatMap::new();
        let res = flatten_request(&mut map, &uri, &headers(pairs), body.as_bytes());
        (map, res)
    }

    #[test]
    fn test_flatten_values() {
        assert_eq!(flatten_values(vec!["a".into()]), json!("a"));
        assert_eq!(flatten_values(vec!["1".into(), "2".into()]), json!(["1", "2"]));
    }

    #[test]
    fn test_get_with_query() {
        let (map, res) = flatten("https://example.com/get?aaa=bbb", &[], "");
        res.unwrap();
        assert_eq!(Value::Object(map), json!({"query_aaa": "bbb"}));
    }

    #[test]
    fn test_json_body() {
        let (map, res) = flatten(
            "https://example.com/post?aaa=bbb",
            &[("content-type", "application/json;charset=utf-8")],
            r#"{"hello":"world"}"#,
        );
        res.unwrap();
        assert_eq!(
            Value::Object(map),
            json!({
                "query_aaa": "bbb",
                "header_content_type": "application/json;charset=utf-8",
                "hello": "world",
            })
        );
    }

    #[test]
    fn test_json_keeps_native_types() {
        let (map, res) = flatten(
            "/post",
            &[("content-type", "application/json")],
            r#"{"n":1.5,"b":true,"z":null,"nested":{"a":[1,2]}}"#,
        );
        res.unwrap();
        assert_eq!(map["n"], json!(1.5));
        assert_eq!(map["b"], json!(true));
        assert_eq!(map["z"], Value::Null);
        assert_eq!(map["nested"], json!({"a": [1, 2]}));
    }

    #[test]
    fn test_form_body() {
        let (map, res) = flatten(
            "https://example.com/post?aaa=bbb",
            &[("content-type", "application/x-www-form-urlencoded;charset=utf-8")],
            "hello=world&multi=1&multi=2",
        );
        res.unwrap();
        assert_eq!(map["hello"], json!("world"));
        assert_eq!(map["multi"], json!(["1", "2"]));
        assert_eq!(map["query_aaa"], json!("bbb"));
        assert_eq!(
            map["header_content_type"],
            json!("application/x-www-form-urlencoded;charset=utf-8")
        );
    }

    #[test]
    fn test_text_body() {
        let (map, res) = flatten(
            "https://example.com/post?aaa=bbb",
            &[("content-type", "text/plain;charset=utf-8")],
            "hello=world",
        );
        res.unwrap();
        assert_eq!(
            Value::Object(map),
            json!({
                "query_aaa": "bbb",
                "header_content_type": "text/plain;charset=utf-8",
                "text": "hello=world",
            })
        );
    }

    #[test]
    fn test_unsupported_content_type_keeps_partial_map() {
        let (map, res) = flatten(
            "https://example.com/post?aaa=bbb",
            &[("content-type", "application/x-custom")],
            "hello=world",
        );
        assert!(matches!(res, Err(NormalizeError::UnsupportedContentType(ref ct)) if ct == "application/x-custom"));
        assert_eq!(map["query_aaa"], json!("bbb"));
        assert_eq!(map["header_content_type"], json!("application/x-custom"));
        assert!(!map.contains_key("hello"));
    }

    #[test]
    fn test_body_without_content_type_fails() {
        let (_, res) = flatten("/post", &[], "hello");
        assert!(matches!(res, Err(NormalizeError::UnsupportedContentType(_))));
    }

    #[test]
    fn test_content_type_without_body_is_fine() {
        let (map, res) = flatten("/post", &[("content-type", "application/x-custom")], "");
        res.unwrap();
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_content_type_parameters_do_not_affect_dispatch() {
        for content_type in [
            "application/json; charset",
            "application/json;;charset=utf-8",
            "APPLICATION/JSON ; charset=utf-8",
        ] {
            let (map, res) = flatten("/post", &[("content-type", content_type)], r#"{"hello":"world"}"#);
            assert!(res.is_ok(), "{content_type}: {res:?}");
            assert_eq!(map["hello"], json!("world"));
        }

        for content_type in [
            "text/plain; charset",
            "text/plain;charset=\"utf-8",
            "text/plain;;charset=utf-8",
        ] {
            let (map, res) = flatten("/post", &[("content-type", content_type)], "hello");
            assert!(res.is_ok(), "{content_type}: {res:?}");
            assert_eq!(map[TEXT_KEY], json!("hello"));
        }

        let (map, res) = flatten(
            "/post",
            &[("content-type", "application/x-www-form-urlencoded; charset")],
            "hello=world",
        );
        assert!(res.is_ok());
        assert_eq!(map["hello"], json!("world"));
    }

    #[test]
    fn test_repeated_query_and_header() {
        let (map, res) = flatten(
            "/get?a=1&a=2&a=3&b=x",
            &[("x-tag", "one"), ("x-tag", "two")],
            "",
        );
        res.unwrap();
        assert_eq!(map["query_a"], json!(["1", "2", "3"]));
        assert_eq!(map["query_b"], json!("x"));
        assert_eq!(map["header_x_tag"], json!(["one", "two"]));
    }

    #[test]
    fn test_preseeded_entries_survive() {
        let uri: Uri = "/get?a=1".parse().unwrap();
        let mut map = FlatMap::new();
        map.insert("route".into(), json!("/get"));
        flatten_request(&mut map, &uri, &HeaderMap::new(), b"").unwrap();
        assert_eq!(map["route"], json!("/get"));
        assert_eq!(map["query_a"], json!("1"));
    }

    #[test]
    fn test_malformed_json() {
        let (_, res) = flatten("/post", &[("content-type", "application/json")], "{");
        assert!(matches!(res, Err(NormalizeError::MalformedJson(_))));

        let (_, res) = flatten("/post", &[("content-type", "application/json")], "[1]");
        assert!(matches!(res, Err(NormalizeError::NotAnObject)));
    }

    #[test]
    fn test_header_key() {
        assert_eq!(header_key("Content-Type"), "header_content_type");
        assert_eq!(header_key("x-forwarded-for"), "header_x_forwarded_for");
    }

    #[test]
    fn test_extract_client_ip() {
        let remote: SocketAddr = "80.80.80.80:14443".parse().unwrap();

        let h = headers(&[("x-forwarded-for", "10.10.10.10, 80.12.23.44")]);
        assert_eq!(extract_client_ip(&h, None).as_deref(), Some("80.12.23.44"));
        assert_eq!(extract_client_ip(&h, Some(remote)).as_deref(), Some("80.12.23.44"));

        let h = headers(&[("x-forwarded-for", ", ")]);
        assert_eq!(extract_client_ip(&h, Some(remote)).as_deref(), Some("80.80.80.80"));

        assert_eq!(extract_client_ip(&HeaderMap::new(), None), None);
    }
}
