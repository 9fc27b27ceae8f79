//! Table-of-contents documents published next to each documentation folder.
//!
//! A `toc.json` looks like `{"items": [{"href": ..., "toc_title": ..., "children": [...]}]}`
//! but nesting is irregular: children may sit under any field, either as a single
//! object or as an array of objects. Parsing flattens that into [`TocNode`].

use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TocNode {
    /// A node carrying both a link and a display title.
    Page {
        href: String,
        title: String,
        children: Vec<TocNode>,
    },
    /// A grouping node, or any node missing its link or its title.
    Group {
        title: Option<String>,
        children: Vec<TocNode>,
    },
}

impl TocNode {
    /// Converts a JSON object into a node. Non-object values yield `None`.
    pub fn from_json(value: &Value) -> Option<Self> {
        let object = value.as_object()?;

        let mut children = Vec::new();
        for field in object.values() {
            match field {
                Value::Object(_) => children.extend(Self::from_json(field)),
                Value::Array(items) => children.extend(items.iter().filter_map(Self::from_json)),
                _ => {}
            }
        }

        let href = object.get("href").and_then(Value::as_str);
        let title = object.get("toc_title").and_then(Value::as_str);
        Some(match (href, title) {
            (Some(href), Some(title)) => Self::Page {
                href: href.to_owned(),
                title: title.to_owned(),
                children,
            },
            _ => Self::Group {
                title: title.map(str::to_owned),
                children,
            },
        })
    }

    pub fn title(&self) -> Option<&str> {
        match self {
            Self::Page { title, .. } => Some(title.as_str()),
            Self::Group { title, .. } => title.as_deref(),
        }
    }

    pub fn href(&self) -> Option<&str> {
        match self {
            Self::Page { href, .. } => Some(href.as_str()),
            Self::Group { .. } => None,
        }
    }

    pub fn children(&self) -> &[TocNode] {
        match self {
            Self::Page { children, .. } | Self::Group { children, .. } => children,
        }
    }

    /// Title of the first node linking to `key`, searching depth-first in pre-order.
    pub fn resolve_title(&self, key: &str) -> Option<&str> {
        if let Self::Page { href, title, .. } = self
            && href == key
        {
            return Some(title.as_str());
        }
        self.children()
            .iter()
            .find_map(|child| child.resolve_title(key))
    }
}

/// A fetched `toc.json`, kept raw for the content index snapshot.
#[derive(Debug, Clone)]
pub struct TocDocument {
    raw: Value,
    root: Option<TocNode>,
}

impl TocDocument {
    pub fn from_json(raw: Value) -> Self {
        let root = raw
            .get("items")
            .and_then(Value::as_array)
            .and_then(|items| items.first())
            .and_then(TocNode::from_json);
        Self { raw, root }
    }

    /// Placeholder recorded for folders that publish no TOC.
    pub fn empty() -> Self {
        Self::from_json(serde_json::json!({ "items": [{}] }))
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn top_title(&self) -> Option<&str> {
        self.root.as_ref().and_then(TocNode::title)
    }

    pub fn top_href(&self) -> Option<&str> {
        self.root.as_ref().and_then(TocNode::href)
    }

    pub fn resolve_title(&self, key: &str) -> Option<&str> {
        self.root.as_ref()?.resolve_title(key)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn sample_toc() -> TocDocument {
        TocDocument::from_json(json!({
            "items": [{
                "href": "about-the-shell",
                "toc_title": "Windows Shell",
                "children": [
                    {
                        "toc_title": "Shell Reference",
                        "children": [
                            { "href": "shell-functions", "toc_title": "Shell Functions" },
                            { "href": "dup", "toc_title": "First Duplicate" }
                        ]
                    },
                    { "href": "dup", "toc_title": "Second Duplicate" }
                ],
                "extra": { "href": "nested-object", "toc_title": "Nested Object" }
            }]
        }))
    }

    #[test]
    fn resolves_nested_titles() {
        let toc = sample_toc();
        assert_eq!(toc.resolve_title("about-the-shell"), Some("Windows Shell"));
        assert_eq!(toc.resolve_title("shell-functions"), Some("Shell Functions"));
        assert_eq!(toc.resolve_title("nested-object"), Some("Nested Object"));
    }

    #[test]
    fn first_match_in_preorder_wins() {
        let toc = sample_toc();
        assert_eq!(toc.resolve_title("dup"), Some("First Duplicate"));
    }

    #[test]
    fn missing_key_is_not_found() {
        let toc = sample_toc();
        assert_eq!(toc.resolve_title("does-not-exist"), None);
        assert_eq!(TocDocument::empty().resolve_title("anything"), None);
    }

    #[test]
    fn exposes_top_level_link() {
        let toc = sample_toc();
        assert_eq!(toc.top_title(), Some("Windows Shell"));
        assert_eq!(toc.top_href(), Some("about-the-shell"));
    }

    #[test]
    fn node_without_title_is_a_group() {
        let node = TocNode::from_json(&json!({
            "href": "untitled",
            "items": [{ "href": "child", "toc_title": "Child" }]
        }))
        .expect("object parses");

        assert!(matches!(node, TocNode::Group { title: None, .. }));
        assert_eq!(node.resolve_title("untitled"), None);
        assert_eq!(node.resolve_title("child"), Some("Child"));
    }

    #[test]
    fn scalar_values_are_not_nodes() {
        assert_eq!(TocNode::from_json(&json!("text")), None);
        assert_eq!(TocNode::from_json(&json!([1, 2])), None);
    }
}
