use std::collections::HashSet;

use roxmltree::Document as XmlDocument;

use crate::error::{GenerateError, Result, truncate_chars};
use crate::request::ContextElement;
use crate::sanitize::SVG_NAMESPACE;

const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";
const INKSCAPE_NAMESPACE: &str = "http://www.inkscape.org/namespaces/inkscape";
const SODIPODI_NAMESPACE: &str = "http://sodipodi.sourceforge.net/DTD/sodipodi-0.dtd";
const XLINK_NAMESPACE: &str = "http://www.w3.org/1999/xlink";

const DEFAULT_CANVAS: (f64, f64) = (1000.0, 1000.0);

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Element {
    pub tag: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Set an attribute, replacing an existing value in place.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(key, _)| *key == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name, value)),
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.get("id")
    }

    pub fn push(&mut self, child: Element) {
        self.children.push(Node::Element(child));
    }

    pub fn push_text(&mut self, text: impl Into<String>) {
        self.children.push(Node::Text(text.into()));
    }

    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(element) => Some(element),
            Node::Text(_) => None,
        })
    }

    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out
    }

    /// Depth-first walk over this element and all descendants.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a Element)) {
        visit(self);
        for child in self.elements() {
            child.walk(visit);
        }
    }

    pub fn find_by_id(&self, id: &str) -> Option<&Element> {
        if self.id() == Some(id) {
            return Some(self);
        }
        self.elements().find_map(|child| child.find_by_id(id))
    }

    /// Style lookup: presentation attribute first, then the inline `style` declaration.
    pub fn style_value(&self, property: &str) -> Option<String> {
        if let Some(value) = self.get(property) {
            return Some(value.trim().to_string());
        }
        self.get("style")?.split(';').find_map(|decl| {
            let (key, value) = decl.split_once(':')?;
            (key.trim() == property).then(|| value.trim().to_string())
        })
    }

    pub fn to_svg_string(&self) -> String {
        let mut out = String::new();
        write_element(self, &mut out);
        out
    }
}

fn collect_text(element: &Element, out: &mut String) {
    for child in &element.children {
        match child {
            Node::Text(text) => out.push_str(text),
            Node::Element(child) => collect_text(child, out),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        BoundingBox {
            x,
            y,
            width: self.right().max(other.right()) - x,
            height: self.bottom().max(other.bottom()) - y,
        }
    }
}

/// What the merger needs from the document it writes into.
pub trait HostDocument {
    fn canvas_size(&self) -> (f64, f64);

    fn selection_bounds(&self) -> Option<BoundingBox>;

    fn unique_id(&mut self, prefix: &str) -> String;

    fn contains_id(&self, id: &str) -> bool;

    fn append_to_layer(&mut self, node: Element);

    fn append_to_defs(&mut self, node: Element);
}

#[derive(Debug, Clone)]
pub struct SvgDocument {
    root: Element,
    layer_path: Vec<usize>,
    selection: Vec<String>,
    ids: HashSet<String>,
}

impl SvgDocument {
    pub fn parse(input: &str) -> Result<Self> {
        let options = roxmltree::ParsingOptions {
            allow_dtd: true,
            ..roxmltree::ParsingOptions::default()
        };
        let doc = XmlDocument::parse_with_options(input, options)
            .map_err(|err| GenerateError::Document(format!("invalid SVG document: {err}")))?;
        let root_node = doc.root_element();
        if root_node.tag_name().name() != "svg" {
            return Err(GenerateError::Document(format!(
                "expected <svg> root element, found <{}>",
                root_node.tag_name().name()
            )));
        }
        let mut root = convert_host_node(root_node);
        for ns in root_node.namespaces() {
            let key = match ns.name() {
                Some(prefix) if prefix == "xml" => continue,
                Some(prefix) => format!("xmlns:{prefix}"),
                None => "xmlns".to_string(),
            };
            if root.get(&key).is_none() {
                root.attributes.insert(0, (key, ns.uri().to_string()));
            }
        }
        if root.get("xmlns").is_none() {
            root.attributes
                .insert(0, ("xmlns".to_string(), SVG_NAMESPACE.to_string()));
        }
        Ok(Self::from_root(root))
    }

    /// Empty drawing with a single layer, the way a fresh editor document looks.
    pub fn blank(width: u32, height: u32) -> Self {
        let mut root = Element::new("svg");
        root.set("xmlns", SVG_NAMESPACE);
        root.set("xmlns:inkscape", INKSCAPE_NAMESPACE);
        root.set("width", width.to_string());
        root.set("height", height.to_string());
        root.set("viewBox", format!("0 0 {width} {height}"));
        let mut layer = Element::new("g");
        layer.set("id", "layer1");
        layer.set("inkscape:groupmode", "layer");
        layer.set("inkscape:label", "Layer 1");
        root.push(layer);
        Self::from_root(root)
    }

    fn from_root(root: Element) -> Self {
        let mut ids = HashSet::new();
        root.walk(&mut |element| {
            if let Some(id) = element.id() {
                ids.insert(id.to_string());
            }
        });
        let layer_path = find_last_layer(&root, &mut Vec::new()).unwrap_or_default();
        Self {
            root,
            layer_path,
            selection: Vec::new(),
            ids,
        }
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    pub fn current_layer(&self) -> &Element {
        let mut element = &self.root;
        for idx in &self.layer_path {
            element = nth_element(element, *idx);
        }
        element
    }

    fn current_layer_mut(&mut self) -> &mut Element {
        let mut element = &mut self.root;
        for idx in &self.layer_path {
            element = nth_element_mut(element, *idx);
        }
        element
    }

    pub fn defs(&self) -> Option<&Element> {
        self.root.elements().find(|child| child.tag == "defs")
    }

    fn defs_mut(&mut self) -> &mut Element {
        let position = self.root.children.iter().position(
            |node| matches!(node, Node::Element(element) if element.tag == "defs"),
        );
        let position = match position {
            Some(position) => position,
            None => {
                self.root.children.insert(0, Node::Element(Element::new("defs")));
                // Every element index along the layer path shifts by one at the root.
                if let Some(first) = self.layer_path.first_mut() {
                    *first += 1;
                }
                0
            }
        };
        match &mut self.root.children[position] {
            Node::Element(element) => element,
            Node::Text(_) => unreachable!("defs position always points at an element"),
        }
    }

    /// Record the selected element ids; unknown ids are returned.
    pub fn select(&mut self, ids: &[String]) -> Vec<String> {
        let (known, unknown): (Vec<String>, Vec<String>) =
            ids.iter().cloned().partition(|id| self.ids.contains(id));
        self.selection = known;
        unknown
    }

    pub fn selected(&self) -> Vec<&Element> {
        self.selection
            .iter()
            .filter_map(|id| self.root.find_by_id(id))
            .collect()
    }

    pub fn describe_selection(&self) -> Vec<ContextElement> {
        self.selected().into_iter().map(describe_element).collect()
    }

    pub fn to_svg_string(&self) -> String {
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"no\"?>\n{}\n",
            self.root.to_svg_string()
        )
    }

    fn register_ids(&mut self, element: &Element) {
        let mut found = Vec::new();
        element.walk(&mut |el| {
            if let Some(id) = el.id() {
                found.push(id.to_string());
            }
        });
        self.ids.extend(found);
    }
}

impl HostDocument for SvgDocument {
    /// Canvas extent in user units, so the viewBox wins over `width`/`height`.
    fn canvas_size(&self) -> (f64, f64) {
        if let Some(vb) = self.root.get("viewBox").and_then(parse_view_box) {
            return (vb.width, vb.height);
        }
        let width = self.root.get("width").and_then(parse_length);
        let height = self.root.get("height").and_then(parse_length);
        match (width, height) {
            (Some(width), Some(height)) => (width, height),
            _ => DEFAULT_CANVAS,
        }
    }

    fn selection_bounds(&self) -> Option<BoundingBox> {
        self.selected()
            .into_iter()
            .filter_map(element_bounds)
            .reduce(|acc, bbox| acc.union(&bbox))
    }

    fn unique_id(&mut self, prefix: &str) -> String {
        let mut n = 1;
        loop {
            let candidate = format!("{prefix}-{n}");
            if !self.ids.contains(&candidate) {
                self.ids.insert(candidate.clone());
                return candidate;
            }
            n += 1;
        }
    }

    fn contains_id(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    fn append_to_layer(&mut self, node: Element) {
        self.register_ids(&node);
        self.current_layer_mut().push(node);
    }

    fn append_to_defs(&mut self, node: Element) {
        self.register_ids(&node);
        self.defs_mut().push(node);
    }
}

fn nth_element(element: &Element, idx: usize) -> &Element {
    match &element.children[idx] {
        Node::Element(child) => child,
        Node::Text(_) => unreachable!("layer path only indexes elements"),
    }
}

fn nth_element_mut(element: &mut Element, idx: usize) -> &mut Element {
    match element.children[idx] {
        Node::Element(ref mut child) => child,
        Node::Text(_) => unreachable!("layer path only indexes elements"),
    }
}

fn find_last_layer(element: &Element, path: &mut Vec<usize>) -> Option<Vec<usize>> {
    let mut found = None;
    for (idx, child) in element.children.iter().enumerate() {
        let Node::Element(child) = child else {
            continue;
        };
        if child.tag != "g" {
            continue;
        }
        path.push(idx);
        if child.get("inkscape:groupmode") == Some("layer") {
            found = Some(path.clone());
        }
        if let Some(nested) = find_last_layer(child, path) {
            found = Some(nested);
        }
        path.pop();
    }
    found
}

fn convert_host_node(node: roxmltree::Node) -> Element {
    let mut element = Element::new(qualified_name(
        node,
        node.tag_name().namespace(),
        node.tag_name().name(),
    ));
    for attr in node.attributes() {
        let key = qualified_name(node, attr.namespace(), attr.name());
        element.attributes.push((key, attr.value().to_string()));
    }
    for child in node.children() {
        if child.is_element() {
            element.push(convert_host_node(child));
        } else if child.is_text() {
            if let Some(text) = child.text() {
                element.push_text(text);
            }
        }
    }
    element
}

fn qualified_name(node: roxmltree::Node, namespace: Option<&str>, local: &str) -> String {
    let Some(uri) = namespace else {
        return local.to_string();
    };
    if uri == SVG_NAMESPACE {
        return local.to_string();
    }
    let prefix = match uri {
        XML_NAMESPACE => Some("xml"),
        XLINK_NAMESPACE => Some("xlink"),
        INKSCAPE_NAMESPACE => Some("inkscape"),
        SODIPODI_NAMESPACE => Some("sodipodi"),
        _ => node.lookup_prefix(uri),
    };
    match prefix {
        Some(prefix) => format!("{prefix}:{local}"),
        None => local.to_string(),
    }
}

/// Parse a length such as `210mm` or `400px`, ignoring the unit.
pub fn parse_length(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    let end = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-' || c == '+' || c == 'e'))
        .unwrap_or(trimmed.len());
    if trimmed[end..].starts_with('%') {
        return None;
    }
    trimmed[..end].parse::<f64>().ok().filter(|v| v.is_finite())
}

pub fn parse_view_box(value: &str) -> Option<BoundingBox> {
    let numbers: Vec<f64> = value
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|part| !part.is_empty())
        .map(|part| part.parse::<f64>())
        .collect::<std::result::Result<_, _>>()
        .ok()?;
    match numbers.as_slice() {
        [x, y, width, height] if *width > 0.0 && *height > 0.0 => Some(BoundingBox {
            x: *x,
            y: *y,
            width: *width,
            height: *height,
        }),
        _ => None,
    }
}

fn number(element: &Element, name: &str) -> f64 {
    element.get(name).and_then(parse_length).unwrap_or(0.0)
}

/// Untransformed geometry of the simple shapes; groups union their children.
pub fn element_bounds(element: &Element) -> Option<BoundingBox> {
    match element.tag.as_str() {
        "rect" | "image" | "use" | "svg" | "foreignObject" => {
            let width = number(element, "width");
            let height = number(element, "height");
            (width > 0.0 && height > 0.0).then(|| BoundingBox {
                x: number(element, "x"),
                y: number(element, "y"),
                width,
                height,
            })
        }
        "circle" => {
            let r = number(element, "r");
            (r > 0.0).then(|| BoundingBox {
                x: number(element, "cx") - r,
                y: number(element, "cy") - r,
                width: r * 2.0,
                height: r * 2.0,
            })
        }
        "ellipse" => {
            let rx = number(element, "rx");
            let ry = number(element, "ry");
            (rx > 0.0 && ry > 0.0).then(|| BoundingBox {
                x: number(element, "cx") - rx,
                y: number(element, "cy") - ry,
                width: rx * 2.0,
                height: ry * 2.0,
            })
        }
        "line" => {
            let (x1, y1) = (number(element, "x1"), number(element, "y1"));
            let (x2, y2) = (number(element, "x2"), number(element, "y2"));
            Some(BoundingBox {
                x: x1.min(x2),
                y: y1.min(y2),
                width: (x2 - x1).abs(),
                height: (y2 - y1).abs(),
            })
        }
        "g" | "a" => element
            .elements()
            .filter_map(element_bounds)
            .reduce(|acc, bbox| acc.union(&bbox)),
        _ => None,
    }
}

fn describe_element(element: &Element) -> ContextElement {
    let fill = element
        .style_value("fill")
        .filter(|fill| !matches!(fill.as_str(), "black" | "#000" | "#000000" | ""));
    let stroke = element
        .style_value("stroke")
        .filter(|stroke| !matches!(stroke.as_str(), "none" | ""));
    let size = match element.tag.as_str() {
        "circle" => element.get("r").map(|r| format!("r={r}")),
        "ellipse" => match (element.get("rx"), element.get("ry")) {
            (Some(rx), Some(ry)) => Some(format!("rx={rx} ry={ry}")),
            _ => None,
        },
        "line" => element_bounds(element).map(|b| format!("{}x{}", b.width, b.height)),
        _ => match (element.get("width"), element.get("height")) {
            (Some(w), Some(h)) => Some(format!("{w}x{h}")),
            _ => None,
        },
    };
    let text = Some(element.text_content())
        .map(|text| text.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|text| !text.is_empty())
        .map(|text| truncate_chars(&text, 50));
    ContextElement {
        tag: element.tag.clone(),
        fill,
        stroke,
        size,
        text,
    }
}

fn write_element(element: &Element, out: &mut String) {
    out.push('<');
    out.push_str(&element.tag);
    for (key, value) in &element.attributes {
        out.push(' ');
        out.push_str(key);
        out.push_str("=\"");
        out.push_str(&escape_attr(value));
        out.push('"');
    }
    if element.children.is_empty() {
        out.push_str("/>");
        return;
    }
    out.push('>');
    for child in &element.children {
        match child {
            Node::Element(child) => write_element(child, out),
            Node::Text(text) => out.push_str(&escape_text(text)),
        }
    }
    out.push_str("</");
    out.push_str(&element.tag);
    out.push('>');
}

fn escape_text(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attr(input: &str) -> String {
    escape_text(input).replace('"', "&quot;")
}
