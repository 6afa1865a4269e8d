//! Streaming XML decoding via a finder registry (spec.md §4.4).
//!
//! Callers register "wants" against an [`XPath`] before parsing; [`XmlDoc::parse`]
//! drives a single pass over the document and fills in each matching finder's
//! [`Out`] cell as it goes. A want whose path resolves more than once keeps the
//! last value encountered in document order. `path_cb` wants additionally let a
//! callback register finders relative to the element that triggered it, scoped
//! to that element's subtree.

mod out;
mod path;

pub use out::Out;
pub use path::{Segment, XPath};

use crate::elasto_error;
use crate::error::{ElastoErrorKind, ElastoResult};
use quick_xml::Reader;
use quick_xml::events::Event;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
struct StackEntry {
    name: String,
    index: usize,
}

enum Consumer {
    Str(Out<String>),
    I32(Out<i32>),
    I64(Out<i64>),
    U64(Out<u64>),
    Bool(Out<bool>),
    Base64(Out<Vec<u8>>),
    Cb(Box<dyn FnMut(&str) -> ElastoResult<()>>),
    PathCb(Box<dyn FnMut(&mut Registrar<'_>, &str) -> ElastoResult<()>>),
}

impl Consumer {
    fn apply(&mut self, text: &str) -> ElastoResult<()> {
        match self {
            Self::Str(out) => out.set(text.to_owned()),
            Self::I32(out) => {
                out.set(text.parse().map_err(|_| elasto_error!(ElastoErrorKind::CorruptResponse, "not an i32: {text}"))?);
            }
            Self::I64(out) => {
                out.set(text.parse().map_err(|_| elasto_error!(ElastoErrorKind::CorruptResponse, "not an i64: {text}"))?);
            }
            Self::U64(out) => {
                out.set(text.parse().map_err(|_| elasto_error!(ElastoErrorKind::CorruptResponse, "not a u64: {text}"))?);
            }
            Self::Bool(out) => {
                let v = match text {
                    "true" => true,
                    "false" => false,
                    other => return Err(elasto_error!(ElastoErrorKind::CorruptResponse, "not a bool: {other}")),
                };
                out.set(v);
            }
            Self::Base64(out) => {
                let decoded = base64_simd::STANDARD
                    .decode_to_vec(text.as_bytes())
                    .map_err(|e| elasto_error!(ElastoErrorKind::CorruptResponse, "invalid base64: {e}"))?;
                out.set(decoded);
            }
            Self::Cb(cb) => cb(text)?,
            Self::PathCb(_) => unreachable!("path-cb finders fire on element open, not text"),
        }
        Ok(())
    }
}

struct Finder {
    pattern: XPath,
    base: Vec<StackEntry>,
    required: bool,
    consumer: Consumer,
    fired: bool,
}

impl Finder {
    fn matches(&self, stack: &[StackEntry]) -> bool {
        if stack.len() != self.base.len() + self.pattern.steps.len() {
            return false;
        }
        if stack[..self.base.len()] != self.base[..] {
            return false;
        }
        stack[self.base.len()..].iter().zip(&self.pattern.steps).all(|(entry, (seg, idx))| {
            let name_ok = match seg {
                Segment::Name(n) => &entry.name == n,
                Segment::Wildcard => true,
            };
            name_ok && idx.is_none_or(|i| entry.index == i)
        })
    }
}

/// Passed to a `path_cb` finder so it can register finders relative to the
/// element that triggered it (spec.md §4.4). Those finders are live only for
/// the duration of that element's subtree.
pub struct Registrar<'a> {
    base: &'a [StackEntry],
    added: &'a mut Vec<Finder>,
}

impl Registrar<'_> {
    fn push(&mut self, path: &str, required: bool, consumer: Consumer) -> ElastoResult<()> {
        let pattern = XPath::parse(path)?;
        if pattern.absolute {
            return Err(elasto_error!(ElastoErrorKind::InvalidArgument, "finders registered from a path-cb must be relative: {path}"));
        }
        self.added.push(Finder { pattern, base: self.base.to_vec(), required, consumer, fired: false });
        Ok(())
    }

    pub fn want_str(&mut self, path: &str, required: bool) -> ElastoResult<Out<String>> {
        let out = Out::new();
        self.push(path, required, Consumer::Str(out.clone()))?;
        Ok(out)
    }

    pub fn want_i32(&mut self, path: &str, required: bool) -> ElastoResult<Out<i32>> {
        let out = Out::new();
        self.push(path, required, Consumer::I32(out.clone()))?;
        Ok(out)
    }

    pub fn want_i64(&mut self, path: &str, required: bool) -> ElastoResult<Out<i64>> {
        let out = Out::new();
        self.push(path, required, Consumer::I64(out.clone()))?;
        Ok(out)
    }

    pub fn want_u64(&mut self, path: &str, required: bool) -> ElastoResult<Out<u64>> {
        let out = Out::new();
        self.push(path, required, Consumer::U64(out.clone()))?;
        Ok(out)
    }

    pub fn want_bool(&mut self, path: &str, required: bool) -> ElastoResult<Out<bool>> {
        let out = Out::new();
        self.push(path, required, Consumer::Bool(out.clone()))?;
        Ok(out)
    }

    pub fn want_base64(&mut self, path: &str, required: bool) -> ElastoResult<Out<Vec<u8>>> {
        let out = Out::new();
        self.push(path, required, Consumer::Base64(out.clone()))?;
        Ok(out)
    }
}

/// A registry of XML "wants" plus the single-pass parser that fills them in.
#[derive(Default)]
pub struct XmlDoc {
    finders: Vec<Finder>,
}

impl XmlDoc {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn push_top(&mut self, path: &str, required: bool, consumer: Consumer) -> ElastoResult<()> {
        let pattern = XPath::parse(path)?;
        self.finders.push(Finder { pattern, base: Vec::new(), required, consumer, fired: false });
        Ok(())
    }

    pub fn want_str(&mut self, path: &str, required: bool) -> ElastoResult<Out<String>> {
        let out = Out::new();
        self.push_top(path, required, Consumer::Str(out.clone()))?;
        Ok(out)
    }

    pub fn want_i32(&mut self, path: &str, required: bool) -> ElastoResult<Out<i32>> {
        let out = Out::new();
        self.push_top(path, required, Consumer::I32(out.clone()))?;
        Ok(out)
    }

    pub fn want_i64(&mut self, path: &str, required: bool) -> ElastoResult<Out<i64>> {
        let out = Out::new();
        self.push_top(path, required, Consumer::I64(out.clone()))?;
        Ok(out)
    }

    pub fn want_u64(&mut self, path: &str, required: bool) -> ElastoResult<Out<u64>> {
        let out = Out::new();
        self.push_top(path, required, Consumer::U64(out.clone()))?;
        Ok(out)
    }

    pub fn want_bool(&mut self, path: &str, required: bool) -> ElastoResult<Out<bool>> {
        let out = Out::new();
        self.push_top(path, required, Consumer::Bool(out.clone()))?;
        Ok(out)
    }

    pub fn want_base64(&mut self, path: &str, required: bool) -> ElastoResult<Out<Vec<u8>>> {
        let out = Out::new();
        self.push_top(path, required, Consumer::Base64(out.clone()))?;
        Ok(out)
    }

    pub fn want_cb(&mut self, path: &str, required: bool, cb: impl FnMut(&str) -> ElastoResult<()> + 'static) -> ElastoResult<()> {
        self.push_top(path, required, Consumer::Cb(Box::new(cb)))
    }

    /// Registers a finder that fires when `path`'s element opens, receiving
    /// the fully-indexed path (e.g. `/out[0]/in[1]/`) and a [`Registrar`] for
    /// adding finders scoped to that element's subtree.
    pub fn want_path_cb(
        &mut self,
        path: &str,
        required: bool,
        cb: impl FnMut(&mut Registrar<'_>, &str) -> ElastoResult<()> + 'static,
    ) -> ElastoResult<()> {
        self.push_top(path, required, Consumer::PathCb(Box::new(cb)))
    }

    /// Runs a single streaming pass over `xml`, firing every registered
    /// finder as its path resolves. Errors if a `required` finder never
    /// fires, or on malformed XML.
    pub fn parse(mut self, xml: &[u8]) -> ElastoResult<()> {
        let mut reader = Reader::from_reader(xml);
        reader.config_mut().trim_text(true);

        let mut buf = Vec::new();
        let mut stack: Vec<StackEntry> = Vec::new();
        let mut counters: Vec<HashMap<String, usize>> = vec![HashMap::new()];
        let mut text_buf = String::new();

        loop {
            let event =
                reader.read_event_into(&mut buf).map_err(|e| elasto_error!(ElastoErrorKind::CorruptResponse, "malformed xml: {e}"))?;
            match event {
                Event::Eof => break,
                Event::Start(e) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    push_element(&mut stack, &mut counters, name);
                    text_buf.clear();
                    self.fire_on_open(&stack, Some(&e))?;
                }
                Event::Empty(e) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    push_element(&mut stack, &mut counters, name);
                    text_buf.clear();
                    self.fire_on_open(&stack, Some(&e))?;
                    self.fire_on_close(&stack, "")?;
                    counters.pop();
                    stack.pop();
                }
                Event::End(_) => {
                    self.fire_on_close(&stack, text_buf.trim())?;
                    counters.pop();
                    stack.pop();
                }
                Event::Text(e) => {
                    let txt = e.unescape().map_err(|err| elasto_error!(ElastoErrorKind::CorruptResponse, "bad xml text: {err}"))?;
                    text_buf.push_str(&txt);
                }
                Event::CData(e) => {
                    text_buf.push_str(&String::from_utf8_lossy(e.into_inner().as_ref()));
                }
                _ => {}
            }
            buf.clear();
        }

        for finder in &self.finders {
            if finder.base.is_empty() && finder.required && !finder.fired {
                return Err(elasto_error!(ElastoErrorKind::CorruptResponse, "required xml path never matched"));
            }
        }
        Ok(())
    }

    fn fire_on_open(&mut self, stack: &[StackEntry], tag: Option<&quick_xml::events::BytesStart<'_>>) -> ElastoResult<()> {
        let mut added = Vec::new();
        for finder in &mut self.finders {
            if !finder.matches(stack) {
                continue;
            }
            match &mut finder.consumer {
                Consumer::PathCb(cb) => {
                    let path = render_path(stack);
                    let mut registrar = Registrar { base: stack, added: &mut added };
                    cb(&mut registrar, &path)?;
                    finder.fired = true;
                }
                _ if finder.pattern.attr.is_some() => {
                    let Some(tag) = tag else { continue };
                    let attr_name = finder.pattern.attr.as_deref().unwrap_or_default();
                    let value = find_attr(tag, attr_name)?;
                    if let Some(value) = value {
                        finder.consumer.apply(&value)?;
                        finder.fired = true;
                    }
                }
                _ => {}
            }
        }
        self.finders.extend(added);
        Ok(())
    }

    fn fire_on_close(&mut self, stack: &[StackEntry], text: &str) -> ElastoResult<()> {
        for finder in &mut self.finders {
            if finder.pattern.attr.is_some() || matches!(finder.consumer, Consumer::PathCb(_)) {
                continue;
            }
            if finder.matches(stack) {
                finder.consumer.apply(text)?;
                finder.fired = true;
            }
        }

        let mut err = None;
        self.finders.retain(|f| {
            let out_of_scope = !f.base.is_empty() && f.base.len() == stack.len();
            if out_of_scope && f.required && !f.fired && err.is_none() {
                err = Some(elasto_error!(ElastoErrorKind::CorruptResponse, "required relative xml path never matched"));
            }
            !out_of_scope
        });
        if let Some(e) = err {
            return Err(e);
        }
        Ok(())
    }
}

fn push_element(stack: &mut Vec<StackEntry>, counters: &mut Vec<HashMap<String, usize>>, name: String) {
    let index = {
        let top = counters.last_mut().expect("root counter frame always present");
        let slot = top.entry(name.clone()).or_insert(0);
        let idx = *slot;
        *slot += 1;
        idx
    };
    stack.push(StackEntry { name, index });
    counters.push(HashMap::new());
}

fn render_path(stack: &[StackEntry]) -> String {
    let mut s = String::new();
    for entry in stack {
        s.push('/');
        s.push_str(&entry.name);
        s.push('[');
        s.push_str(&entry.index.to_string());
        s.push(']');
    }
    s.push('/');
    s
}

fn find_attr(tag: &quick_xml::events::BytesStart<'_>, name: &str) -> ElastoResult<Option<String>> {
    for attr in tag.attributes() {
        let attr = attr.map_err(|e| elasto_error!(ElastoErrorKind::CorruptResponse, "malformed xml attribute: {e}"))?;
        if attr.key.as_ref() == name.as_bytes() {
            let value = attr.unescape_value().map_err(|e| elasto_error!(ElastoErrorKind::CorruptResponse, "bad attribute value: {e}"))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn str_basic() {
        let xml = b"<outer><inner1><str>val</str></inner1><str>blah</str></outer>";
        let mut doc = XmlDoc::new();
        let val = doc.want_str("/outer/inner1/str", true).unwrap();
        doc.parse(xml).unwrap();
        assert_eq!(val.get().as_deref(), Some("val"));
    }

    #[test]
    fn str_duplicate_path_keeps_last() {
        let xml = b"<outer><dup><str>val</str></dup><dup><str>blah</str></dup></outer>";
        let mut doc = XmlDoc::new();
        let val = doc.want_str("/outer/dup/str", true).unwrap();
        doc.parse(xml).unwrap();
        assert_eq!(val.get().as_deref(), Some("blah"));
    }

    #[test]
    fn two_str_one_optional() {
        let xml = b"<outer><inner1><str>val</str></inner1><str>blah</str></outer>";
        let mut doc = XmlDoc::new();
        let val1 = doc.want_str("/outer/inner1/str", true).unwrap();
        let val2 = doc.want_str("/outer/str", false).unwrap();
        doc.parse(xml).unwrap();
        assert_eq!(val1.get().as_deref(), Some("val"));
        assert_eq!(val2.get().as_deref(), Some("blah"));
    }

    #[test]
    fn numeric_basic() {
        let xml = b"<outer><num>100</num><inner1><neg>-100</neg></inner1><huge>18446744073709551615</huge></outer>";
        let mut doc = XmlDoc::new();
        let v1 = doc.want_i32("/outer/num", true).unwrap();
        let v2 = doc.want_i64("/outer/inner1/neg", true).unwrap();
        let v3 = doc.want_u64("/outer/huge", true).unwrap();
        doc.parse(xml).unwrap();
        assert_eq!(v1.get(), Some(100));
        assert_eq!(v2.get(), Some(-100));
        assert_eq!(v3.get(), Some(18_446_744_073_709_551_615));
    }

    #[test]
    fn bool_basic() {
        let xml = b"<outer><inner1><bool>true</bool></inner1><next>false</next></outer>";
        let mut doc = XmlDoc::new();
        let v1 = doc.want_bool("/outer/inner1/bool", true).unwrap();
        let v2 = doc.want_bool("/outer/next", true).unwrap();
        doc.parse(xml).unwrap();
        assert_eq!(v1.get(), Some(true));
        assert_eq!(v2.get(), Some(false));
    }

    #[test]
    fn base64_basic() {
        let xml = b"<outer><Label1>dGhpcyBpcyBhIGxhYmVs</Label1><Label2>aXN0Z3Q=</Label2></outer>";
        let mut doc = XmlDoc::new();
        let v1 = doc.want_base64("/outer/Label1", true).unwrap();
        let v2 = doc.want_base64("/outer/Label2", true).unwrap();
        doc.parse(xml).unwrap();
        assert_eq!(v1.get().as_deref(), Some(b"this is a label".as_slice()));
        assert_eq!(v2.get().as_deref(), Some(b"istgt".as_slice()));
    }

    #[test]
    fn cb_basic() {
        let xml = b"<outer><inner1><str>val</str></inner1></outer>";
        let got = Rc::new(RefCell::new(None));
        let got2 = Rc::clone(&got);
        let mut doc = XmlDoc::new();
        doc.want_cb("/outer/inner1/str", true, move |v| {
            *got2.borrow_mut() = Some(format!("got: {v}"));
            Ok(())
        })
        .unwrap();
        doc.parse(xml).unwrap();
        assert_eq!(got.borrow().as_deref(), Some("got: val"));
    }

    #[test]
    fn path_cb_fires_once_with_indexed_path() {
        let xml = b"<outer><inner1><str>val</str></inner1></outer>";
        let calls = Rc::new(RefCell::new(0));
        let calls2 = Rc::clone(&calls);
        let mut doc = XmlDoc::new();
        doc.want_path_cb("/outer/inner1", false, move |_reg, path| {
            assert_eq!(path, "/outer[0]/inner1[0]/");
            *calls2.borrow_mut() += 1;
            Ok(())
        })
        .unwrap();
        doc.parse(xml).unwrap();
        assert_eq!(*calls.borrow(), 1);
    }

    #[test]
    fn path_cb_multi_registers_relative_finders() {
        let xml = b"<out><in><str>val0</str></in><in><str>val1</str></in><in><str>val2</str></in></out>";
        let vals = Rc::new(RefCell::new(Vec::new()));
        let vals2 = Rc::clone(&vals);
        let mut doc = XmlDoc::new();
        doc.want_path_cb("/out/in", false, move |reg, _path| {
            let out = reg.want_str("./str", true)?;
            let vals3 = Rc::clone(&vals2);
            // the Out cell is read back lazily; stash a getter closure isn't
            // needed here since Out is Clone and cheap to move into a Vec.
            vals3.borrow_mut().push(out);
            Ok(())
        })
        .unwrap();
        doc.parse(xml).unwrap();
        let vals = vals.borrow();
        assert_eq!(vals.len(), 3);
        assert_eq!(vals[0].get().as_deref(), Some("val0"));
        assert_eq!(vals[1].get().as_deref(), Some("val1"));
        assert_eq!(vals[2].get().as_deref(), Some("val2"));
    }

    #[test]
    fn attribute_selector_on_publish_settings() {
        let xml = br#"<?xml version="1.0" encoding="utf-8"?>
<PublishData><PublishProfile PublishMethod="AzureServiceManagementAPI" Url="https://management.core.windows.net/">
<Subscription Id="55555555-4444-3333-2222-111111111111" Name="3-Month Free Trial" /></PublishProfile></PublishData>"#;
        let mut doc = XmlDoc::new();
        let id = doc.want_str("/PublishData/PublishProfile/Subscription[@Id]", true).unwrap();
        let name = doc.want_str("/PublishData/PublishProfile/Subscription[@Name]", true).unwrap();
        doc.parse(xml).unwrap();
        assert_eq!(id.get().as_deref(), Some("55555555-4444-3333-2222-111111111111"));
        assert_eq!(name.get().as_deref(), Some("3-Month Free Trial"));
    }

    #[test]
    fn missing_required_path_errors() {
        let xml = b"<outer></outer>";
        let mut doc = XmlDoc::new();
        doc.want_str("/outer/missing", true).unwrap();
        assert!(doc.parse(xml).is_err());
    }
}
