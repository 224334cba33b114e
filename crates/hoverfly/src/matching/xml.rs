//! XML matchers: `xml`, `xmlpartial` and `xpath`.

use regex::Regex;
use std::sync::OnceLock;
use sxd_document::dom::{ChildOfElement, ChildOfRoot, Element};
use sxd_document::parser;

static BETWEEN_TAGS: OnceLock<Regex> = OnceLock::new();

fn between_tags() -> &'static Regex {
    BETWEEN_TAGS.get_or_init(|| Regex::new(r">\s+<").expect("static regex is valid"))
}

/// Whitespace-insensitive form of an XML document, or `None` when the text
/// does not parse.
pub fn canonical(text: &str) -> Option<String> {
    let trimmed = text.trim();
    parser::parse(trimmed).ok()?;
    Some(between_tags().replace_all(trimmed, "><").into_owned())
}

/// Whether the `expected` fragment appears somewhere in `actual`.
///
/// An element matches when names agree, the expected attributes are a
/// subset of the actual ones, any expected text is equal and every expected
/// child element matches some actual child.
pub fn partial(expected: &str, actual: &str) -> bool {
    let (Ok(expected), Ok(actual)) = (parser::parse(expected.trim()), parser::parse(actual.trim()))
    else {
        return false;
    };
    let (Some(expected_root), Some(actual_root)) = (
        root_element(&expected.as_document()),
        root_element(&actual.as_document()),
    ) else {
        return false;
    };
    contains_anywhere(actual_root, expected_root)
}

fn root_element<'d>(document: &sxd_document::dom::Document<'d>) -> Option<Element<'d>> {
    document.root().children().into_iter().find_map(|child| match child {
        ChildOfRoot::Element(element) => Some(element),
        _ => None,
    })
}

fn child_elements<'d>(element: Element<'d>) -> Vec<Element<'d>> {
    element
        .children()
        .into_iter()
        .filter_map(|child| match child {
            ChildOfElement::Element(e) => Some(e),
            _ => None,
        })
        .collect()
}

fn text_of(element: Element<'_>) -> String {
    element
        .children()
        .into_iter()
        .filter_map(|child| match child {
            ChildOfElement::Text(t) => Some(t.text().to_string()),
            _ => None,
        })
        .collect::<String>()
        .trim()
        .to_string()
}

fn contains_anywhere(actual: Element<'_>, expected: Element<'_>) -> bool {
    element_matches(actual, expected)
        || child_elements(actual)
            .into_iter()
            .any(|child| contains_anywhere(child, expected))
}

fn element_matches(actual: Element<'_>, expected: Element<'_>) -> bool {
    if actual.name().local_part() != expected.name().local_part() {
        return false;
    }
    let attributes_match = expected.attributes().iter().all(|attr| {
        actual.attributes().iter().any(|a| {
            a.name().local_part() == attr.name().local_part() && a.value() == attr.value()
        })
    });
    if !attributes_match {
        return false;
    }
    let expected_text = text_of(expected);
    if !expected_text.is_empty() && expected_text != text_of(actual) {
        return false;
    }
    let actual_children = child_elements(actual);
    child_elements(expected)
        .into_iter()
        .all(|e| actual_children.iter().any(|a| element_matches(*a, e)))
}

/// Evaluate an XPath expression over `body`.
///
/// Returns `None` for invalid XML, an invalid expression, an empty node set
/// or a `false` result; otherwise the string value of the result.
pub fn extract_xpath(body: &str, path: &str) -> Option<String> {
    use sxd_xpath::{evaluate_xpath, Value};

    let package = parser::parse(body.trim()).ok()?;
    let document = package.as_document();

    match evaluate_xpath(&document, path).ok()? {
        Value::String(s) => Some(s),
        Value::Number(n) if n.is_nan() => None,
        Value::Number(n) => {
            if n.fract() == 0.0 {
                Some(format!("{}", n as i64))
            } else {
                Some(n.to_string())
            }
        }
        Value::Boolean(true) => Some("true".to_string()),
        Value::Boolean(false) => None,
        Value::Nodeset(nodes) => nodes
            .document_order_first()
            .map(|node| node.string_value()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_ignores_indentation() {
        let pretty = "<root>\n    <item id=\"1\">a</item>\n</root>";
        assert_eq!(
            canonical(pretty).as_deref(),
            Some("<root><item id=\"1\">a</item></root>")
        );
        assert!(canonical("<unclosed>").is_none());
    }

    #[test]
    fn test_partial_matches_subtree() {
        let actual = r#"<order id="9"><customer><name>Ann</name><tier>gold</tier></customer></order>"#;
        assert!(partial("<customer><name>Ann</name></customer>", actual));
        assert!(partial(r#"<order id="9"/>"#, actual));
        assert!(!partial("<customer><name>Bob</name></customer>", actual));
        assert!(!partial(r#"<order id="10"/>"#, actual));
        assert!(!partial("<customer/>", "not xml"));
    }

    #[test]
    fn test_xpath_simple_element() {
        let xml = "<root><name>John</name></root>";
        assert_eq!(extract_xpath(xml, "/root/name"), Some("John".to_string()));
    }

    #[test]
    fn test_xpath_attribute() {
        let xml = r#"<root><user id="123"/></root>"#;
        assert_eq!(
            extract_xpath(xml, "/root/user/@id"),
            Some("123".to_string())
        );
    }

    #[test]
    fn test_xpath_count_and_boolean() {
        let xml = "<root><a/><a/></root>";
        assert_eq!(extract_xpath(xml, "count(/root/a)"), Some("2".to_string()));
        assert_eq!(
            extract_xpath(xml, "count(/root/a) = 2"),
            Some("true".to_string())
        );
        assert!(extract_xpath(xml, "count(/root/a) = 3").is_none());
    }

    #[test]
    fn test_xpath_no_match_or_invalid_xml() {
        assert!(extract_xpath("<root/>", "/root/missing").is_none());
        assert!(extract_xpath("<<not xml", "/root").is_none());
    }
}
