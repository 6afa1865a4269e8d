//! XPath subset parsing for the finder registry (spec.md §4.4)

use crate::elasto_error;
use crate::error::{ElastoErrorKind, ElastoResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Name(String),
    Wildcard,
}

#[derive(Debug, Clone)]
pub struct XPath {
    pub absolute: bool,
    pub steps: Vec<(Segment, Option<usize>)>,
    /// `Some(name)` if the last step is `elem[@name]`: the element still
    /// contributes a step to `steps`, but the finder fires on the
    /// attribute's text rather than the element's.
    pub attr: Option<String>,
}

enum Step<'a> {
    Plain(&'a str, Option<usize>),
    Attr(&'a str, &'a str),
}

impl XPath {
    /// Parses `/a/b[0]/*`, `./a[@name]`, etc. (spec.md §4.4's supported subset).
    pub fn parse(s: &str) -> ElastoResult<Self> {
        let (absolute, body) = if let Some(rest) = s.strip_prefix("./") {
            (false, rest)
        } else if let Some(rest) = s.strip_prefix('/') {
            (true, rest)
        } else {
            return Err(elasto_error!(ElastoErrorKind::InvalidArgument, "xpath must be absolute or start with './': {s}"));
        };

        let mut steps = Vec::new();
        let mut attr = None;
        let parts: Vec<&str> = body.split('/').filter(|p| !p.is_empty()).collect();

        for (i, part) in parts.iter().enumerate() {
            let is_last = i + 1 == parts.len();
            match parse_step(part)? {
                Step::Attr(name, attr_name) => {
                    if !is_last {
                        return Err(elasto_error!(ElastoErrorKind::InvalidArgument, "[@attr] step must be last: {s}"));
                    }
                    steps.push((to_segment(name), None));
                    attr = Some(attr_name.to_owned());
                }
                Step::Plain(name, index) => steps.push((to_segment(name), index)),
            }
        }

        Ok(Self { absolute, steps, attr })
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.steps.len()
    }
}

fn to_segment(name: &str) -> Segment {
    if name == "*" { Segment::Wildcard } else { Segment::Name(name.to_owned()) }
}

/// Splits one `/`-delimited xpath component into a [`Step`]:
/// `name`, `name[idx]`, or `name[@attr]`.
fn parse_step(part: &str) -> ElastoResult<Step<'_>> {
    let Some(open) = part.find('[') else {
        return Ok(Step::Plain(part, None));
    };
    if !part.ends_with(']') {
        return Err(elasto_error!(ElastoErrorKind::InvalidArgument, "unterminated bracket in xpath step: {part}"));
    }
    let name = &part[..open];
    let inner = &part[open + 1..part.len() - 1];
    if name.is_empty() {
        return Err(elasto_error!(ElastoErrorKind::InvalidArgument, "missing name before bracket: {part}"));
    }
    if let Some(attr_name) = inner.strip_prefix('@') {
        if attr_name.is_empty() {
            return Err(elasto_error!(ElastoErrorKind::InvalidArgument, "empty attribute name: {part}"));
        }
        return Ok(Step::Attr(name, attr_name));
    }
    let idx: usize =
        inner.parse().map_err(|_| elasto_error!(ElastoErrorKind::InvalidArgument, "invalid index in xpath step: {part}"))?;
    Ok(Step::Plain(name, Some(idx)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_absolute_path() {
        let p = XPath::parse("/a/b").unwrap();
        assert!(p.absolute);
        assert_eq!(p.steps, vec![(Segment::Name("a".into()), None), (Segment::Name("b".into()), None)]);
    }

    #[test]
    fn parses_relative_path() {
        let p = XPath::parse("./a").unwrap();
        assert!(!p.absolute);
        assert_eq!(p.steps, vec![(Segment::Name("a".into()), None)]);
    }

    #[test]
    fn parses_wildcard() {
        let p = XPath::parse("/a/*").unwrap();
        assert_eq!(p.steps[1].0, Segment::Wildcard);
    }

    #[test]
    fn parses_index() {
        let p = XPath::parse("/a/b[2]").unwrap();
        assert_eq!(p.steps[1], (Segment::Name("b".into()), Some(2)));
    }

    #[test]
    fn parses_attribute_selector() {
        let p = XPath::parse("/a/b[@name]").unwrap();
        assert_eq!(p.attr.as_deref(), Some("name"));
        assert_eq!(p.steps.len(), 2);
        assert_eq!(p.steps[1].0, Segment::Name("b".into()));
    }

    #[test]
    fn rejects_attr_step_not_last() {
        assert!(XPath::parse("/a[@x]/b").is_err());
    }

    #[test]
    fn rejects_missing_root_marker() {
        assert!(XPath::parse("a/b").is_err());
    }
}
