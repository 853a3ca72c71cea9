//! Conversion between hyper messages and engine messages.
//!
//! Request bodies are decoded by media type: form-urlencoded bodies become
//! form fields, `multipart/form-data` bodies become parts, JSON is parsed
//! strictly and anything else is guessed from its shape.

use super::types::build_response_with_headers;
use crate::document::parse_query_string;
use crate::http::{media_type, HttpRequest, HttpResponse, MultipartPart};
use crate::value::Value;
use bytes::Bytes;
use http_body_util::Full;
use hyper::http::request::Parts;
use hyper::{Response, StatusCode};
use indexmap::IndexMap;

/// Build an engine request from the request head and its collected body
pub fn to_stub_request(parts: &Parts, body: &[u8]) -> HttpRequest {
    let mut request = HttpRequest::new(parts.method.as_str(), parts.uri.path());
    if let Some(query) = parts.uri.query() {
        request.query = parse_query_string(query);
    }
    request.headers = parts
        .headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();

    let content_type = request.header("content-type").map(str::to_string);
    parse_body(&mut request, content_type.as_deref(), body);
    request
}

/// Decode `body` into the request according to its content type
pub fn parse_body(request: &mut HttpRequest, content_type: Option<&str>, body: &[u8]) {
    if body.is_empty() {
        return;
    }
    let text = String::from_utf8_lossy(body);
    match content_type.map(media_type).as_deref() {
        Some("application/x-www-form-urlencoded") => {
            request.form_fields = parse_query_string(&text);
        }
        Some("multipart/form-data") => {
            let boundary = content_type.and_then(boundary);
            match boundary {
                Some(boundary) => request.multipart = parse_multipart(body, &boundary),
                None => request.body = Value::String(text.into_owned()),
            }
        }
        Some(json) if json == "application/json" || json.ends_with("+json") => {
            request.body = Value::parse_json(&text).unwrap_or_else(|_| Value::String(text.into_owned()));
        }
        _ => request.body = Value::parse_payload(&text),
    }
}

fn boundary(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.trim().split_once('=')?;
        key.eq_ignore_ascii_case("boundary")
            .then(|| value.trim_matches('"').to_string())
    })
}

/// Split on the boundary at the byte level so binary file parts survive
fn parse_multipart(body: &[u8], boundary: &str) -> Vec<MultipartPart> {
    let delimiter = format!("--{boundary}").into_bytes();
    let mut chunks = Vec::new();
    let mut rest = body;
    while let Some(at) = find(rest, &delimiter) {
        chunks.push(&rest[..at]);
        rest = &rest[at + delimiter.len()..];
    }
    chunks.push(rest);
    chunks
        .into_iter()
        .skip(1)
        .take_while(|chunk| !chunk.starts_with(b"--"))
        .filter_map(parse_part)
        .collect()
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return None;
    }
    haystack.windows(needle.len()).position(|window| window == needle)
}

fn parse_part(chunk: &[u8]) -> Option<MultipartPart> {
    let chunk = chunk.strip_prefix(b"\r\n").unwrap_or(chunk);
    let split = find(chunk, b"\r\n\r\n")?;
    let head = String::from_utf8_lossy(&chunk[..split]);
    let content = &chunk[split + 4..];
    let content = content.strip_suffix(b"\r\n").unwrap_or(content);

    let headers: IndexMap<String, String> = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
        .collect();
    let disposition = headers.get("content-disposition")?;
    let name = disposition_param(disposition, "name")?;
    let content_type = headers.get("content-type").cloned();

    Some(match disposition_param(disposition, "filename") {
        Some(filename) => MultipartPart::File {
            name,
            filename,
            content_type,
            content: content.to_vec(),
        },
        None => MultipartPart::Content {
            name,
            content: String::from_utf8_lossy(content).into_owned(),
            content_type,
        },
    })
}

fn disposition_param(disposition: &str, key: &str) -> Option<String> {
    disposition.split(';').skip(1).find_map(|param| {
        let (k, v) = param.trim().split_once('=')?;
        (k.trim() == key).then(|| v.trim().trim_matches('"').to_string())
    })
}

/// Encode an engine response, adding the Content-Type implied by its body
pub fn to_hyper_response(response: &HttpResponse) -> Response<Full<Bytes>> {
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut headers: Vec<(String, String)> = response
        .headers
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    if response.header("content-type").is_none() {
        if let Some(content_type) = response.content_type() {
            headers.push(("Content-Type".to_string(), content_type));
        }
    }
    build_response_with_headers(status, headers, response.body_text())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::Request;
    use serde_json::json;

    fn request(builder: hyper::http::request::Builder, body: &str) -> HttpRequest {
        let (parts, ()) = builder.body(()).unwrap().into_parts();
        to_stub_request(&parts, body.as_bytes())
    }

    #[test]
    fn test_json_request() {
        let req = request(
            Request::post("/orders?expand=true&tag=a%20b").header("Content-Type", "application/json"),
            r#"{"item": "pen", "qty": 2}"#,
        );
        assert_eq!(req.method, "POST");
        assert_eq!(req.path, "/orders");
        assert_eq!(req.query["expand"], "true");
        assert_eq!(req.query["tag"], "a b");
        assert_eq!(req.body, Value::from_json(json!({"item": "pen", "qty": 2})));
    }

    #[test]
    fn test_form_request() {
        let req = request(
            Request::post("/login").header("content-type", "application/x-www-form-urlencoded"),
            "user=ann&remember=true",
        );
        assert_eq!(req.form_fields["user"], "ann");
        assert_eq!(req.body, Value::Empty);
    }

    #[test]
    fn test_multipart_keeps_binary_file_bytes() {
        let payload: &[u8] = &[0x89, b'P', b'N', b'G', 0xff, 0x00, 0xfe, b'\r', b'\n', 0x80];
        let mut body = Vec::new();
        body.extend_from_slice(b"--XYZ\r\nContent-Disposition: form-data; name=\"title\"\r\n\r\nLogo\r\n");
        body.extend_from_slice(
            b"--XYZ\r\nContent-Disposition: form-data; name=\"img\"; filename=\"logo.png\"\r\n\
              Content-Type: image/png\r\n\r\n",
        );
        body.extend_from_slice(payload);
        body.extend_from_slice(b"\r\n--XYZ--\r\n");

        let (parts, ()) = Request::post("/upload")
            .header("Content-Type", "multipart/form-data; boundary=XYZ")
            .body(())
            .unwrap()
            .into_parts();
        let req = to_stub_request(&parts, &body);
        assert_eq!(req.multipart.len(), 2);
        match &req.multipart[1] {
            MultipartPart::File { filename, content, .. } => {
                assert_eq!(filename, "logo.png");
                assert_eq!(content.as_slice(), payload);
            }
            other => panic!("unexpected part {other:?}"),
        }
    }

    #[test]
    fn test_multipart_request() {
        let body = "--XYZ\r\n\
            Content-Disposition: form-data; name=\"title\"\r\n\r\n\
            Report\r\n\
            --XYZ\r\n\
            Content-Disposition: form-data; name=\"doc\"; filename=\"r.csv\"\r\n\
            Content-Type: text/csv\r\n\r\n\
            a,b\r\n\
            --XYZ--\r\n";
        let req = request(
            Request::post("/upload").header("Content-Type", "multipart/form-data; boundary=XYZ"),
            body,
        );
        assert_eq!(req.multipart.len(), 2);
        assert_eq!(
            req.multipart[0],
            MultipartPart::Content {
                name: "title".to_string(),
                content: "Report".to_string(),
                content_type: None,
            }
        );
        match &req.multipart[1] {
            MultipartPart::File { filename, content_type, content, .. } => {
                assert_eq!(filename, "r.csv");
                assert_eq!(content_type.as_deref(), Some("text/csv"));
                assert_eq!(content, b"a,b");
            }
            other => panic!("unexpected part {other:?}"),
        }
    }

    #[test]
    fn test_text_and_xml_bodies() {
        let text = request(Request::post("/echo"), "hello");
        assert_eq!(text.body, Value::string("hello"));

        let xml = request(Request::post("/echo").header("Content-Type", "text/xml"), "<a>1</a>");
        assert!(matches!(xml.body, Value::Xml(_)));
    }

    #[test]
    fn test_response_gets_implied_content_type() {
        let response = to_hyper_response(&HttpResponse::ok(Value::from_json(json!({"id": 1}))));
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get("content-type").unwrap(), "application/json");

        let explicit = HttpResponse::new(201)
            .with_header("Content-Type", "application/vnd.x+json")
            .with_body(Value::from_json(json!([])));
        let response = to_hyper_response(&explicit);
        assert_eq!(response.headers().get_all("content-type").iter().count(), 1);
    }
}
