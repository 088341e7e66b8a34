//! Candidate assertions and their XPath rendering.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::dom::DomTree;
use crate::model::AssertResult;

/// A query over a frame's DOM, evaluated against a recorded tree or rendered as XPath.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Assertion {
    /// `count(/HTML/BODY/UL/LI)`
    Count { path: String },
    /// `count(/HTML/BODY/DIV[@class="slider"])`
    CountWithAttributes {
        path: String,
        attributes: BTreeMap<String, String>,
    },
    /// `string(/HTML/BODY/H1)`
    StringValue { path: String },
    /// `count(//H1[text()="Page 1"])`
    CountText { tag: String, text: String },
}

impl Assertion {
    /// XPath form of the assertion; also the key it is stored under.
    pub fn query(&self) -> String {
        match self {
            Assertion::Count { path } => format!("count({path})"),
            Assertion::CountWithAttributes { path, attributes } => {
                let predicates: String = attributes
                    .iter()
                    .map(|(name, value)| format!("[@{name}={}]", xpath_literal(value)))
                    .collect();
                format!("count({path}{predicates})")
            }
            Assertion::StringValue { path } => format!("string({path})"),
            Assertion::CountText { tag, text } => {
                format!("count(//{tag}[text()={}])", xpath_literal(text))
            }
        }
    }

    pub fn evaluate(&self, tree: &DomTree) -> AssertResult {
        match self {
            Assertion::Count { path } => AssertResult::Count(
                tree.elements()
                    .iter()
                    .filter(|(_, element_path)| element_path == path)
                    .count() as u64,
            ),
            Assertion::CountWithAttributes { path, attributes } => AssertResult::Count(
                tree.elements()
                    .iter()
                    .filter(|(node, element_path)| {
                        element_path == path
                            && attributes
                                .iter()
                                .all(|(name, value)| node.attributes.get(name) == Some(value))
                    })
                    .count() as u64,
            ),
            Assertion::StringValue { path } => AssertResult::Text(
                tree.elements()
                    .iter()
                    .find(|(_, element_path)| element_path == path)
                    .map(|(node, _)| tree.text_content(node.id))
                    .unwrap_or_default(),
            ),
            Assertion::CountText { tag, text } => AssertResult::Count(
                tree.elements()
                    .iter()
                    .filter(|(node, _)| {
                        node.tag.as_deref() == Some(tag.as_str())
                            && tree.child_texts(node.id).any(|child| child == text.as_str())
                    })
                    .count() as u64,
            ),
        }
    }
}

/// Quotes `value` as an XPath string literal.
pub fn xpath_literal(value: &str) -> String {
    if !value.contains('"') {
        return format!("\"{value}\"");
    }
    if !value.contains('\'') {
        return format!("'{value}'");
    }
    let parts: Vec<String> = value
        .split('"')
        .map(|part| format!("\"{part}\""))
        .collect();
    format!("concat({})", parts.join(", '\"', "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_queries() {
        let attributes: BTreeMap<String, String> = [
            ("style".to_string(), "width: 100%;".to_string()),
            ("class".to_string(), "slider".to_string()),
        ]
        .into_iter()
        .collect();
        let cases = [
            (
                Assertion::Count {
                    path: "/HTML/BODY/UL/LI".into(),
                },
                "count(/HTML/BODY/UL/LI)",
            ),
            (
                Assertion::CountWithAttributes {
                    path: "/HTML/BODY/DIV".into(),
                    attributes,
                },
                r#"count(/HTML/BODY/DIV[@class="slider"][@style="width: 100%;"])"#,
            ),
            (
                Assertion::StringValue {
                    path: "/HTML/BODY/H1".into(),
                },
                "string(/HTML/BODY/H1)",
            ),
            (
                Assertion::CountText {
                    tag: "H1".into(),
                    text: "Page 1".into(),
                },
                r#"count(//H1[text()="Page 1"])"#,
            ),
        ];
        for (assertion, query) in cases {
            assert_eq!(assertion.query(), query);
        }
    }

    #[test]
    fn quotes_awkward_literals() {
        assert_eq!(xpath_literal("plain"), r#""plain""#);
        assert_eq!(xpath_literal(r#"say "hi""#), r#"'say "hi"'"#);
        assert_eq!(
            xpath_literal(r#"it's "x""#),
            r#"concat("it's ", '"', "x", '"', "")"#
        );
    }
}
