//! Plain-text rendering of a failed match.

use crate::hoverfly::MatchError;
use crate::model::RequestDetails;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use std::collections::BTreeMap;

/// The request block of a miss report.
#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct RequestBlock<'a> {
    path: &'a str,
    method: &'a str,
    destination: &'a str,
    scheme: &'a str,
    query: &'a BTreeMap<String, Vec<String>>,
    body: &'a str,
    headers: &'a BTreeMap<String, Vec<String>>,
}

fn pretty<T: Serialize>(value: &T) -> String {
    let mut out = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(b"    "));
    match value.serialize(&mut serializer) {
        Ok(()) => String::from_utf8(out).unwrap_or_default(),
        Err(_) => String::new(),
    }
}

/// Heading shared by every error the proxy reports.
pub(crate) fn error_heading(context: &str, error: &str) -> String {
    format!("Hoverfly Error!\n\nThere was an error when {context}\n\nGot error: {error}")
}

/// Body of the `502` returned when no pair matches `request`.
pub fn render_miss(request: &RequestDetails, error: &MatchError) -> String {
    let block = RequestBlock {
        path: &request.path,
        method: &request.method,
        destination: &request.destination,
        scheme: &request.scheme,
        query: &request.query,
        body: &request.body,
        headers: &request.headers,
    };

    let mut out = error_heading("matching", &error.to_string());
    out.push_str("\n\nThe following request was made, but was not matched by Hoverfly:\n\n");
    out.push_str(&pretty(&block));
    out.push_str("\n\nWhilst Hoverfly has the following state:\n\n");
    out.push_str(&pretty(&error.state));

    if let Some(closest) = &error.closest_miss {
        out.push_str("\n\nThe matcher which came closest was:\n\n");
        out.push_str(&pretty(&closest.request_matcher));
        out.push_str("\n\nBut it did not match on the following fields:\n\n");
        out.push_str(&format!("[{}]", closest.missed_fields.join(" ")));
        out.push_str("\n\nWhich if hit would have given the following response:\n\n");
        out.push_str(&pretty(&closest.response));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ClosestMiss, MatcherView, RequestMatcherView, ResponseView};

    fn request() -> RequestDetails {
        RequestDetails {
            path: "/closest-miss".to_string(),
            method: "GET".to_string(),
            destination: "destination.com".to_string(),
            scheme: "http".to_string(),
            headers: BTreeMap::from([(
                "Accept-Encoding".to_string(),
                vec!["gzip".to_string()],
            )]),
            ..RequestDetails::default()
        }
    }

    #[test]
    fn test_render_without_closest_miss() {
        let error = MatchError {
            closest_miss: None,
            state: BTreeMap::new(),
        };
        let expected = r#"Hoverfly Error!

There was an error when matching

Got error: Could not find a match for request, create or record a valid matcher first!

The following request was made, but was not matched by Hoverfly:

{
    "Path": "/closest-miss",
    "Method": "GET",
    "Destination": "destination.com",
    "Scheme": "http",
    "Query": {},
    "Body": "",
    "Headers": {
        "Accept-Encoding": [
            "gzip"
        ]
    }
}

Whilst Hoverfly has the following state:

{}"#;
        assert_eq!(render_miss(&request(), &error), expected);
    }

    #[test]
    fn test_render_with_closest_miss() {
        let error = MatchError {
            closest_miss: Some(ClosestMiss {
                request_matcher: RequestMatcherView {
                    path: Some(vec![MatcherView::new("exact", "/closest-miss")]),
                    destination: Some(vec![MatcherView::new("exact", "destination.com")]),
                    body: Some(vec![MatcherView::new("exact", "body")]),
                    ..RequestMatcherView::default()
                },
                response: ResponseView {
                    status: 200,
                    ..ResponseView::default()
                },
                missed_fields: vec!["body".to_string()],
                state: BTreeMap::new(),
            }),
            state: BTreeMap::new(),
        };

        let rendered = render_miss(&request(), &error);
        let tail = r#"The matcher which came closest was:

{
    "path": [
        {
            "matcher": "exact",
            "value": "/closest-miss"
        }
    ],
    "destination": [
        {
            "matcher": "exact",
            "value": "destination.com"
        }
    ],
    "body": [
        {
            "matcher": "exact",
            "value": "body"
        }
    ]
}

But it did not match on the following fields:

[body]

Which if hit would have given the following response:

{
    "status": 200,
    "body": "",
    "encodedBody": false,
    "templated": false
}"#;
        assert!(rendered.ends_with(tail), "{rendered}");
    }
}
