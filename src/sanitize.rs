use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::Regex;

pub const SVG_NAMESPACE: &str = "http://www.w3.org/2000/svg";

static FENCE_OPEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*(?:```|~~~)[A-Za-z0-9_+.-]*[ \t\r]*").unwrap());
static FENCE_CLOSE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)[ \t]*(?:```|~~~)[ \t\r]*$").unwrap());
static PROLOG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<\?xml.*?\?>").unwrap());
static DOCTYPE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<!DOCTYPE(?:[^\[>]*\[.*?\])?[^>]*>").unwrap());
static EMPTY_XMLNS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\s+xmlns\s*=\s*(?:""|'')"#).unwrap());
static SVG_OPEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<svg(?:\s|>|/)").unwrap());
static XMLNS_ATTR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\sxmlns\s*=").unwrap());
static VIEWBOX_ATTR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\sviewBox\s*=").unwrap());
static TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<(/?)([A-Za-z_][\w:.-]*)(?:\s[^>]*)?/?>").unwrap());

/// Strip markdown fences, prolog, doctype and known model quirks from a raw reply.
pub fn sanitize(raw: &str) -> String {
    let mut current = raw.to_string();
    loop {
        let next = sanitize_pass(&current);
        if next == current {
            return next;
        }
        current = next;
    }
}

fn sanitize_pass(input: &str) -> String {
    let text = FENCE_OPEN_RE.replace_all(input, "");
    let text = FENCE_CLOSE_RE.replace_all(&text, "");
    let text = PROLOG_RE.replace_all(&text, "");
    let text = DOCTYPE_RE.replace_all(&text, "");
    let text = EMPTY_XMLNS_RE.replace_all(&text, "");
    text.replace("&nbsp;", " ").trim().to_string()
}

/// Make sure the fragment is a single `<svg>` element with a namespace and a viewBox.
pub fn repair(fragment: &str, width: u32, height: u32) -> String {
    let text = fragment.trim();
    let Some(start) = SVG_OPEN_RE.find(text).map(|m| m.start()) else {
        return format!(
            "<svg xmlns=\"{SVG_NAMESPACE}\" width=\"{width}\" height=\"{height}\" viewBox=\"0 0 {width} {height}\">{text}</svg>"
        );
    };

    let mut svg = match text.rfind("</svg>") {
        Some(end) if end > start && !root_self_closes(&text[start..]) => {
            text[start..end + "</svg>".len()].to_string()
        }
        _ => close_truncated(&text[start..]),
    };

    let Some(tag_end) = opening_tag_end(&svg) else {
        // Opening tag never closes; nothing left worth keeping.
        return format!(
            "<svg xmlns=\"{SVG_NAMESPACE}\" width=\"{width}\" height=\"{height}\" viewBox=\"0 0 {width} {height}\"></svg>"
        );
    };

    if !XMLNS_ATTR_RE.is_match(&svg[..tag_end]) {
        svg.insert_str(4, &format!(" xmlns=\"{SVG_NAMESPACE}\""));
    }

    if let Some(tag_end) = opening_tag_end(&svg) {
        let opening = &svg[..tag_end];
        if !VIEWBOX_ATTR_RE.is_match(opening) {
            let insert_at = if opening.ends_with('/') { tag_end - 1 } else { tag_end };
            let insert_at = trim_back(&svg, insert_at);
            svg.insert_str(insert_at, &format!(" viewBox=\"0 0 {width} {height}\""));
        }
    }

    svg
}

fn root_self_closes(text: &str) -> bool {
    opening_tag_end(text).is_some_and(|end| text[..end].ends_with('/'))
}

fn close_truncated(text: &str) -> String {
    let Some(end) = opening_tag_end(text) else {
        return text.to_string();
    };
    // A self-closed root is reopened so anything after it becomes its content.
    let reopened: Cow<str> = if text[..end].ends_with('/') {
        Cow::Owned(format!("{}>{}", text[..end - 1].trim_end(), &text[end + 1..]))
    } else {
        Cow::Borrowed(text)
    };
    let Some(end) = opening_tag_end(&reopened) else {
        return reopened.into_owned();
    };

    // Drop a tag that was cut off before its closing `>`.
    let mut body: &str = &reopened;
    if let Some(lt) = body.rfind('<') {
        if lt > end && !body[lt..].contains('>') {
            body = body[..lt].trim_end();
        }
    }

    let mut open: Vec<&str> = Vec::new();
    for caps in TAG_RE.captures_iter(body) {
        let name = caps.get(2).map_or("", |m| m.as_str());
        if caps[0].ends_with("/>") {
            continue;
        }
        if caps[1].is_empty() {
            open.push(name);
        } else if let Some(pos) = open.iter().rposition(|tag| *tag == name) {
            open.truncate(pos);
        }
    }

    let mut closed = body.to_string();
    for tag in open.iter().rev() {
        closed.push_str("</");
        closed.push_str(tag);
        closed.push('>');
    }
    closed
}

/// Byte offset of the `>` closing the first tag, skipping quoted attribute values.
fn opening_tag_end(text: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (idx, ch) in text.char_indices() {
        match quote {
            Some(q) if ch == q => quote = None,
            Some(_) => {}
            None if ch == '"' || ch == '\'' => quote = Some(ch),
            None if ch == '>' => return Some(idx),
            None => {}
        }
    }
    None
}

fn trim_back(text: &str, mut idx: usize) -> usize {
    let bytes = text.as_bytes();
    while idx > 4 && bytes[idx - 1].is_ascii_whitespace() {
        idx -= 1;
    }
    idx
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 10 10"><rect width="5" height="5"/></svg>"#;

    #[test]
    fn strips_fences_with_and_without_language() {
        assert_eq!(sanitize("```svg\n<svg></svg>\n```"), "<svg></svg>");
        assert_eq!(sanitize("```\n<svg></svg>\n```\n"), "<svg></svg>");
        assert_eq!(sanitize("```xml<svg></svg>```"), "<svg></svg>");
    }

    #[test]
    fn strips_prolog_and_doctype() {
        let raw = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<!DOCTYPE svg PUBLIC \"-//W3C//DTD SVG 1.1//EN\" \"http://www.w3.org/Graphics/SVG/1.1/DTD/svg11.dtd\">\n<svg></svg>";
        assert_eq!(sanitize(raw), "<svg></svg>");
        let with_subset = "<!DOCTYPE svg [ <!ENTITY a \"b\"> ]><svg></svg>";
        assert_eq!(sanitize(with_subset), "<svg></svg>");
    }

    #[test]
    fn removes_empty_namespace_and_nbsp() {
        let raw = r#"<svg><text xmlns="">a&nbsp;b</text></svg>"#;
        assert_eq!(sanitize(raw), "<svg><text>a b</text></svg>");
    }

    #[test]
    fn sanitize_is_idempotent() {
        let samples = [
            "```svg\n<?xml version=\"1.0\"?>\n<svg xmlns=\"\"><rect/></svg>\n```",
            "Here you go:\n```\n<svg></svg>\n```\nEnjoy!",
            "  plain text  ",
            "``````",
            "<?xml <?xml version=\"1.0\"?> ?><svg/>",
            MINIMAL,
        ];
        for sample in samples {
            let once = sanitize(sample);
            assert_eq!(sanitize(&once), once, "input: {sample:?}");
        }
    }

    #[test]
    fn repair_inserts_namespace_then_viewbox() {
        let repaired = repair(r#"<svg><circle r="50" fill="red"/></svg>"#, 200, 200);
        assert_eq!(
            repaired,
            r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 200 200"><circle r="50" fill="red"/></svg>"#
        );
    }

    #[test]
    fn repair_keeps_existing_attributes() {
        let input = r#"<svg width="50" viewBox="0 0 50 50"><g/></svg>"#;
        assert_eq!(
            repair(input, 400, 400),
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="50" viewBox="0 0 50 50"><g/></svg>"#
        );
        let nested = r#"<svg xmlns="http://www.w3.org/2000/svg"><symbol viewBox="0 0 1 1"/></svg>"#;
        assert!(repair(nested, 10, 20).starts_with(
            r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 10 20">"#
        ));
    }

    #[test]
    fn repair_extracts_embedded_svg() {
        let input = "Sure! Here is your image:\n<svg><rect/></svg>\nLet me know if you need changes.";
        assert_eq!(
            repair(input, 100, 100),
            r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 100 100"><rect/></svg>"#
        );
    }

    #[test]
    fn repair_wraps_plain_text() {
        let repaired = repair("I cannot draw that.", 300, 150);
        assert_eq!(
            repaired,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="300" height="150" viewBox="0 0 300 150">I cannot draw that.</svg>"#
        );
    }

    #[test]
    fn repair_closes_truncated_svg() {
        assert_eq!(
            repair(r#"<svg viewBox="0 0 5 5"><rect/>"#, 5, 5),
            r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 5 5"><rect/></svg>"#
        );
        assert_eq!(
            repair("<svg/>", 5, 5),
            r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 5 5"></svg>"#
        );
    }

    #[test]
    fn repair_reopens_self_closed_root_with_content() {
        let expected = r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 5 5"><rect/></svg>"#;
        assert_eq!(repair("<svg/><rect/>", 5, 5), expected);
        assert_eq!(repair("<svg /><rect/></svg>", 5, 5), expected);
    }

    #[test]
    fn repair_closes_open_groups_and_drops_cut_tag() {
        let cut = r#"<svg viewBox="0 0 9 9"><g fill="none"><path d="M0 0"/><path d="M1"#;
        assert_eq!(
            repair(cut, 9, 9),
            r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 9 9"><g fill="none"><path d="M0 0"/></g></svg>"#
        );
        let text_open = "<svg><text>Hel";
        assert_eq!(
            repair(text_open, 9, 9),
            r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 9 9"><text>Hel</text></svg>"#
        );
    }

    #[test]
    fn repair_always_has_namespace_and_viewbox() {
        let inputs = ["", "hello", "<svg", "<svg>", "<svg/><rect/>", "<g/></svg>", "<svg a='>'><g/>", MINIMAL];
        for input in inputs {
            let out = repair(&sanitize(input), 64, 32);
            assert!(out.starts_with("<svg"), "{input:?} -> {out}");
            assert!(out.ends_with("</svg>"), "{input:?} -> {out}");
            assert!(out.contains("xmlns=\"http://www.w3.org/2000/svg\""), "{input:?} -> {out}");
            assert!(out.contains("viewBox="), "{input:?} -> {out}");
        }
    }

    #[test]
    fn minimal_fragment_round_trips() {
        let padded = format!("\n  {MINIMAL}  \n");
        assert_eq!(repair(&sanitize(&padded), 10, 10), MINIMAL);
    }

    #[test]
    fn red_circle_scenario() {
        let raw = "```svg\n<svg><circle r=\"50\" fill=\"red\"/></svg>\n```";
        assert_eq!(
            repair(&sanitize(raw), 200, 200),
            r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 200 200"><circle r="50" fill="red"/></svg>"#
        );
    }
}
