use std::collections::{HashMap, HashSet};
use std::fmt;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use roxmltree::Document as XmlDocument;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::document::{BoundingBox, Element, HostDocument, Node};
use crate::error::{GenerateError, Result, truncate_chars};
use crate::sanitize::SVG_NAMESPACE;

/// Horizontal gap between neighbouring variations and between a selection and new artwork.
pub const PLACEMENT_GAP: f64 = 20.0;

const EXCERPT_CHARS: usize = 500;
const TITLE_CHARS: usize = 100;

static URL_REF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"url\(\s*['"]?#([^)'"\s]+)['"]?\s*\)"#).unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Placement {
    Origin,
    #[default]
    Center,
    BesideSelection,
}

impl Placement {
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "origin" | "top-left" => Some(Self::Origin),
            "center" | "centre" => Some(Self::Center),
            "beside-selection" | "selection" | "beside" => Some(Self::BesideSelection),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergeOptions {
    pub placement: Placement,
    pub width: u32,
    pub height: u32,
    pub variation: usize,
    pub group: bool,
    pub group_name: Option<String>,
    pub accessibility: bool,
    pub intent: String,
    pub provenance: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportWarning {
    pub tag: String,
    pub reason: String,
}

impl fmt::Display for ImportWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "could not import <{}>: {}", self.tag, self.reason)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MergeResult {
    /// Ids of the attached container groups, or of the top-level nodes when ungrouped.
    pub node_ids: Vec<String>,
    pub position: (f64, f64),
    pub imported: usize,
    pub definitions: usize,
    pub warnings: Vec<ImportWarning>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChildPolicy {
    /// Descriptive and animation children only.
    Shape,
    Container,
    /// Character data plus text-content children.
    Text,
    Gradient,
    /// Character data only.
    CharacterData,
    /// Generic fallback for SVG tags outside the table.
    Passthrough,
}

const ELEMENT_TABLE: &[(&str, ChildPolicy)] = &[
    ("rect", ChildPolicy::Shape),
    ("circle", ChildPolicy::Shape),
    ("ellipse", ChildPolicy::Shape),
    ("line", ChildPolicy::Shape),
    ("polyline", ChildPolicy::Shape),
    ("polygon", ChildPolicy::Shape),
    ("path", ChildPolicy::Shape),
    ("image", ChildPolicy::Shape),
    ("use", ChildPolicy::Shape),
    ("stop", ChildPolicy::Shape),
    ("g", ChildPolicy::Container),
    ("a", ChildPolicy::Container),
    ("defs", ChildPolicy::Container),
    ("clipPath", ChildPolicy::Container),
    ("mask", ChildPolicy::Container),
    ("symbol", ChildPolicy::Container),
    ("marker", ChildPolicy::Container),
    ("pattern", ChildPolicy::Container),
    ("filter", ChildPolicy::Container),
    ("switch", ChildPolicy::Container),
    ("text", ChildPolicy::Text),
    ("tspan", ChildPolicy::Text),
    ("textPath", ChildPolicy::Text),
    ("linearGradient", ChildPolicy::Gradient),
    ("radialGradient", ChildPolicy::Gradient),
    ("title", ChildPolicy::CharacterData),
    ("desc", ChildPolicy::CharacterData),
    ("style", ChildPolicy::CharacterData),
];

const DESCRIPTIVE: [&str; 3] = ["title", "desc", "metadata"];
const ANIMATION: [&str; 4] = ["animate", "animateTransform", "animateMotion", "set"];
const TEXT_CONTENT: [&str; 3] = ["tspan", "textPath", "a"];
const BLOCKED: [&str; 3] = ["script", "foreignObject", "iframe"];

impl ChildPolicy {
    fn lookup(tag: &str) -> Self {
        ELEMENT_TABLE
            .iter()
            .find(|(name, _)| *name == tag)
            .map(|(_, policy)| *policy)
            .unwrap_or(ChildPolicy::Passthrough)
    }

    fn permits(self, child: &str) -> bool {
        let animated = || DESCRIPTIVE.contains(&child) || ANIMATION.contains(&child);
        match self {
            ChildPolicy::Container | ChildPolicy::Passthrough => true,
            ChildPolicy::Shape => animated(),
            ChildPolicy::Text => TEXT_CONTENT.contains(&child) || animated(),
            ChildPolicy::Gradient => child == "stop" || animated(),
            ChildPolicy::CharacterData => false,
        }
    }

    fn keeps_text(self) -> bool {
        matches!(
            self,
            ChildPolicy::Text | ChildPolicy::CharacterData | ChildPolicy::Passthrough
        )
    }
}

/// Where variation `index` lands on the host canvas.
pub fn placement_position(
    policy: Placement,
    canvas: (f64, f64),
    selection: Option<BoundingBox>,
    width: u32,
    height: u32,
    index: usize,
) -> (f64, f64) {
    let (width, height) = (f64::from(width), f64::from(height));
    let centered = ((canvas.0 - width) / 2.0, (canvas.1 - height) / 2.0);
    let (x, y) = match (policy, selection) {
        (Placement::Origin, _) => (0.0, 0.0),
        (Placement::Center, _) | (Placement::BesideSelection, None) => centered,
        (Placement::BesideSelection, Some(bbox)) => (bbox.right() + PLACEMENT_GAP, bbox.y),
    };
    (x + index as f64 * (width + PLACEMENT_GAP), y)
}

/// Graft a sanitized fragment into `host`.
pub fn merge(
    fragment: &str,
    host: &mut dyn HostDocument,
    options: &MergeOptions,
) -> Result<MergeResult> {
    let doc = XmlDocument::parse(fragment).map_err(|err| GenerateError::FragmentParse {
        message: err.to_string(),
        excerpt: truncate_chars(fragment, EXCERPT_CHARS),
    })?;
    let root = doc.root_element();

    let position = placement_position(
        options.placement,
        host.canvas_size(),
        host.selection_bounds(),
        options.width,
        options.height,
        options.variation,
    );

    let mut importer = Importer::new(plan_id_renames(root, host));
    let top: Vec<Element> = importer
        .import_children(host, root, ChildPolicy::Container)
        .into_iter()
        .filter_map(|node| match node {
            Node::Element(element) => Some(element),
            Node::Text(_) => None,
        })
        .collect();
    if top.is_empty() {
        importer.warn("svg", "the generated SVG contains no drawable elements");
    }

    let mut defined = HashSet::new();
    for element in &top {
        element.walk(&mut |el| {
            if let Some(id) = el.id() {
                defined.insert(id.to_string());
            }
        });
    }
    for element in &top {
        importer.check_references(host, element, &defined);
    }

    let (x, y) = position;
    let translate = format!("translate({x}, {y})");
    let mut node_ids = Vec::new();

    if options.group && !top.is_empty() {
        let id = group_id(host, options);
        let mut group = Element::new("g");
        group.set("id", id.clone());
        group.set("transform", translate);
        if options.accessibility {
            let mut title = Element::new("title");
            title.push_text(truncate_chars(options.intent.trim(), TITLE_CHARS));
            group.push(title);
            let mut desc = Element::new("desc");
            desc.push_text(options.provenance.clone());
            group.push(desc);
        }
        for element in top {
            group.push(element);
        }
        host.append_to_layer(group);
        node_ids.push(id);
    } else {
        for mut element in top {
            let transform = match element.get("transform") {
                Some(existing) if !existing.trim().is_empty() => {
                    format!("{translate} {}", existing.trim())
                }
                _ => translate.clone(),
            };
            element.set("transform", transform);
            let id = match element.id() {
                Some(id) => id.to_string(),
                None => {
                    let id = host.unique_id(&element.tag);
                    element.set("id", id.clone());
                    id
                }
            };
            node_ids.push(id);
            host.append_to_layer(element);
        }
    }

    debug!(
        imported = importer.imported,
        definitions = importer.definitions,
        warnings = importer.warnings.len(),
        "merged generated SVG"
    );

    Ok(MergeResult {
        node_ids,
        position,
        imported: importer.imported,
        definitions: importer.definitions,
        warnings: importer.warnings,
    })
}

fn group_id(host: &mut dyn HostDocument, options: &MergeOptions) -> String {
    let requested = options
        .group_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty());
    match requested {
        Some(name) => {
            let candidate = if options.variation == 0 {
                name.to_string()
            } else {
                format!("{name}-{}", options.variation + 1)
            };
            if host.contains_id(&candidate) {
                host.unique_id(&candidate)
            } else {
                candidate
            }
        }
        None => host.unique_id("ai-generated"),
    }
}

/// Fragment ids that clash with the host (or repeat inside the fragment) get fresh names.
fn plan_id_renames(root: roxmltree::Node, host: &mut dyn HostDocument) -> HashMap<String, String> {
    let ids: Vec<&str> = root
        .descendants()
        .filter(|n| n.is_element())
        .filter_map(|n| n.attribute("id"))
        .collect();
    let fragment_ids: HashSet<&str> = ids.iter().copied().collect();

    let mut renames = HashMap::new();
    let mut seen = HashSet::new();
    for id in ids {
        let clashes = host.contains_id(id) || !seen.insert(id);
        if clashes && !renames.contains_key(id) {
            // unique_id reserves each candidate, so taken names are never offered twice
            let fresh = loop {
                let candidate = host.unique_id(id);
                if !fragment_ids.contains(candidate.as_str()) {
                    break candidate;
                }
            };
            renames.insert(id.to_string(), fresh);
        }
    }
    renames
}

fn is_unsafe_attribute(name: &str, value: &str) -> bool {
    let name = name.to_ascii_lowercase();
    if name.starts_with("on") {
        return true;
    }
    name == "href"
        && value
            .trim_start()
            .to_ascii_lowercase()
            .starts_with("javascript:")
}

fn references(element: &Element) -> Vec<String> {
    let mut refs = Vec::new();
    for (key, value) in &element.attributes {
        for caps in URL_REF_RE.captures_iter(value) {
            refs.push(caps[1].to_string());
        }
        if key == "href" {
            if let Some(id) = value.trim().strip_prefix('#') {
                refs.push(id.to_string());
            }
        }
    }
    refs
}

struct Importer {
    renames: HashMap<String, String>,
    warnings: Vec<ImportWarning>,
    imported: usize,
    definitions: usize,
}

impl Importer {
    fn new(renames: HashMap<String, String>) -> Self {
        Self {
            renames,
            warnings: Vec::new(),
            imported: 0,
            definitions: 0,
        }
    }

    fn warn(&mut self, tag: &str, reason: impl Into<String>) {
        let warning = ImportWarning {
            tag: tag.to_string(),
            reason: reason.into(),
        };
        warn!("{warning}");
        self.warnings.push(warning);
    }

    /// Import the children of `parent` in source order, moving every `<defs>` to the host first.
    fn import_children(
        &mut self,
        host: &mut dyn HostDocument,
        parent: roxmltree::Node,
        policy: ChildPolicy,
    ) -> Vec<Node> {
        let parent_tag = parent.tag_name().name();
        let hoists_defs = policy.permits("defs");
        if hoists_defs {
            for defs in parent.children().filter(|n| is_svg_element(n, "defs")) {
                self.import_definitions(host, defs);
            }
        }

        let mut imported = Vec::new();
        for child in parent.children() {
            if child.is_text() {
                let text = child.text().unwrap_or_default();
                let keep = match policy {
                    ChildPolicy::Text => true,
                    _ => policy.keeps_text() && !text.trim().is_empty(),
                };
                if keep {
                    imported.push(Node::Text(text.to_string()));
                }
                continue;
            }
            if !child.is_element() || (hoists_defs && is_svg_element(&child, "defs")) {
                continue;
            }
            let tag = child.tag_name().name();
            if !policy.permits(tag) {
                self.warn(tag, format!("not allowed inside <{parent_tag}>"));
                continue;
            }
            if let Some(element) = self.import_element(host, child) {
                imported.push(Node::Element(element));
            }
        }
        imported
    }

    fn import_definitions(&mut self, host: &mut dyn HostDocument, defs: roxmltree::Node) {
        for child in defs.children().filter(|n| n.is_element()) {
            if is_svg_element(&child, "defs") {
                self.import_definitions(host, child);
                continue;
            }
            if let Some(element) = self.import_element(host, child) {
                host.append_to_defs(element);
                self.definitions += 1;
            }
        }
    }

    fn import_element(
        &mut self,
        host: &mut dyn HostDocument,
        node: roxmltree::Node,
    ) -> Option<Element> {
        let tag = node.tag_name().name();
        if let Some(uri) = node.tag_name().namespace() {
            if uri != SVG_NAMESPACE {
                self.warn(tag, format!("element from foreign namespace {uri}"));
                return None;
            }
        }
        if BLOCKED.contains(&tag) {
            self.warn(tag, "element type is not allowed in generated artwork");
            return None;
        }

        let policy = ChildPolicy::lookup(tag);
        if policy == ChildPolicy::Passthrough {
            debug!(tag, "importing unrecognized element generically");
        }

        let mut element = Element::new(tag);
        for attr in node.attributes() {
            let name = attr.name();
            let value = attr.value();
            if is_unsafe_attribute(name, value) {
                debug!(tag, attribute = name, "dropping unsafe attribute");
                continue;
            }
            element.set(name, self.rewrite_value(name, value));
        }

        element.children = self.import_children(host, node, policy);
        self.imported += 1;
        Some(element)
    }

    fn rewrite_value(&self, name: &str, value: &str) -> String {
        if self.renames.is_empty() {
            return value.to_string();
        }
        if name == "id" {
            return self.renames.get(value).cloned().unwrap_or_else(|| value.to_string());
        }
        if name == "href" {
            if let Some(new_id) = value.trim().strip_prefix('#').and_then(|id| self.renames.get(id)) {
                return format!("#{new_id}");
            }
        }
        URL_REF_RE
            .replace_all(value, |caps: &Captures| match self.renames.get(&caps[1]) {
                Some(new_id) => format!("url(#{new_id})"),
                None => caps[0].to_string(),
            })
            .into_owned()
    }

    fn check_references(
        &mut self,
        host: &dyn HostDocument,
        element: &Element,
        defined: &HashSet<String>,
    ) {
        let mut missing = Vec::new();
        element.walk(&mut |el| {
            for id in references(el) {
                if !defined.contains(&id) && !host.contains_id(&id) {
                    missing.push((el.tag.clone(), id));
                }
            }
        });
        for (tag, id) in missing {
            self.warn(&tag, format!("reference to #{id} cannot be resolved"));
        }
    }
}

fn is_svg_element(node: &roxmltree::Node, name: &str) -> bool {
    node.is_element()
        && node.tag_name().name() == name
        && node
            .tag_name()
            .namespace()
            .is_none_or(|uri| uri == SVG_NAMESPACE)
}
