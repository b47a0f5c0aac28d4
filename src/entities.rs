//! Character reference decoding for attribute values.
//!
//! html5ever already knows the full named-entity table and the attribute
//! value decoding rules, so the value is parsed as an attribute of a tiny
//! document and read back from the DOM.

use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use markup5ever_rcdom::{Handle, NodeData, RcDom};

const PROBE_ATTR: &str = "data-v";

pub fn decode_entities(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }
    let probe = format!("<p {}=\"{}\"></p>", PROBE_ATTR, raw.replace('"', "&quot;"));
    let dom = match parse_document(RcDom::default(), Default::default())
        .from_utf8()
        .read_from(&mut probe.as_bytes())
    {
        Ok(dom) => dom,
        Err(e) => {
            log::warn!("entity decoding fell back to raw text: {}", e);
            return raw.to_string();
        }
    };
    find_probe_value(&dom.document).unwrap_or_else(|| raw.to_string())
}

fn find_probe_value(handle: &Handle) -> Option<String> {
    if let NodeData::Element { name, attrs, .. } = &handle.data {
        if &*name.local == "p" {
            return attrs
                .borrow()
                .iter()
                .find(|attr| &*attr.name.local == PROBE_ATTR)
                .map(|attr| attr.value.to_string());
        }
    }
    handle
        .children
        .borrow()
        .iter()
        .find_map(find_probe_value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_named_and_numeric_references() {
        assert_eq!(decode_entities("a &amp; b"), "a & b");
        assert_eq!(decode_entities("&lt;&#62;&#x41;"), "<>A");
        assert_eq!(decode_entities("&quot;x&quot;"), "\"x\"");
    }

    #[test]
    fn test_plain_and_malformed_text_pass_through() {
        assert_eq!(decode_entities("plain"), "plain");
        assert_eq!(decode_entities("say \"hi\""), "say \"hi\"");
        assert_eq!(decode_entities("a & b"), "a & b");
    }
}
