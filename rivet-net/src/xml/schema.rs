// rivet-net/src/xml/schema.rs
//! A compiled subset of W3C XML Schema.
//!
//! Supported: global and local element declarations (`name`, `ref`, `type`),
//! named and anonymous complex types, `sequence` / `choice` / `all` nesting,
//! `minOccurs` / `maxOccurs`, `any`, `attribute` (with `use="required"`),
//! `anyAttribute`, `simpleContent` and `complexContent` extensions. Child order
//! is not checked; anything else in the schema is ignored.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::io::{BufReader, Read};

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::debug;

use super::engine::EngineError;
use super::handler::{Attributes, Severity};

#[derive(Debug, Clone, Default)]
struct ContentType {
    children: BTreeMap<String, ChildRule>,
    any_children: bool,
    attributes: BTreeMap<String, bool>,
    any_attribute: bool,
    text_allowed: bool,
}

impl ContentType {
    fn simple() -> Self {
        Self {
            text_allowed: true,
            ..Default::default()
        }
    }

    fn any() -> Self {
        Self {
            any_children: true,
            any_attribute: true,
            text_allowed: true,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct ChildRule {
    element: usize,
    min: u32,
    max: Option<u32>,
}

#[derive(Debug, Default)]
pub struct SchemaRules {
    /// Content type of each declared element.
    elements: Vec<usize>,
    types: Vec<ContentType>,
    roots: HashMap<String, usize>,
}

impl SchemaRules {
    pub fn compile(schema: &mut dyn Read) -> Result<Self, EngineError> {
        let root = read_tree(schema)?;
        if root.local != "schema" {
            return Err(EngineError::InvalidSchema(format!(
                "expected a schema document, found <{}>",
                root.local
            )));
        }

        let mut compiler = Compiler::new(&root)?;
        let mut names: Vec<&str> = compiler.global_elements.keys().copied().collect();
        names.sort_unstable();
        for name in names {
            let id = compiler.global_element(name)?;
            compiler.rules.roots.insert(name.to_string(), id);
        }
        debug!(
            "Compiled schema with {} root element(s)",
            compiler.rules.roots.len()
        );
        Ok(compiler.rules)
    }

    pub fn is_root(&self, name: &str) -> bool {
        self.roots.contains_key(name)
    }
}

/// Minimal element tree of the schema document, prefixes stripped.
#[derive(Debug, Default)]
struct XsdNode {
    local: String,
    attrs: HashMap<String, String>,
    children: Vec<XsdNode>,
}

impl XsdNode {
    fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }
}

fn invalid(reason: impl fmt::Display) -> EngineError {
    EngineError::InvalidSchema(reason.to_string())
}

fn read_tree(schema: &mut dyn Read) -> Result<XsdNode, EngineError> {
    let mut reader = Reader::from_reader(BufReader::new(schema));
    reader.config_mut().trim_text(true);

    let mut stack: Vec<XsdNode> = Vec::new();
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf).map_err(invalid)? {
            Event::Start(e) => stack.push(node_from(&e)?),
            Event::Empty(e) => {
                let node = node_from(&e)?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(node),
                    None => return Ok(node),
                }
            }
            Event::End(_) => {
                let node = stack.pop().ok_or_else(|| invalid("unbalanced end tag"))?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(node),
                    None => return Ok(node),
                }
            }
            Event::Eof => return Err(invalid("schema document ended before its root closed")),
            _ => {}
        }
        buf.clear();
    }
}

fn node_from(start: &BytesStart<'_>) -> Result<XsdNode, EngineError> {
    let mut attrs = HashMap::new();
    for attr in start.attributes() {
        let attr = attr.map_err(invalid)?;
        let value = attr.unescape_value().map_err(invalid)?;
        attrs.insert(
            String::from_utf8_lossy(attr.key.as_ref()).into_owned(),
            value.into_owned(),
        );
    }
    Ok(XsdNode {
        local: String::from_utf8_lossy(start.local_name().as_ref()).into_owned(),
        attrs,
        children: Vec::new(),
    })
}

fn local_part(qname: &str) -> &str {
    qname.rsplit_once(':').map_or(qname, |(_, local)| local)
}

fn parse_occurs(node: &XsdNode, name: &str) -> Result<Option<u32>, EngineError> {
    match node.attr(name) {
        None => Ok(Some(1)),
        Some("unbounded") => Ok(None),
        Some(raw) => raw.trim().parse::<u32>().map(Some).map_err(|e| {
            EngineError::InvalidSchema(format!("invalid {name} '{raw}': {e}"))
        }),
    }
}

#[derive(Debug, Clone, Copy)]
struct Particle {
    required: bool,
    repeatable: bool,
}

struct Compiler<'a> {
    global_elements: HashMap<&'a str, &'a XsdNode>,
    global_types: HashMap<&'a str, &'a XsdNode>,
    element_ids: HashMap<&'a str, usize>,
    type_ids: HashMap<&'a str, usize>,
    rules: SchemaRules,
}

impl<'a> Compiler<'a> {
    fn new(root: &'a XsdNode) -> Result<Self, EngineError> {
        let mut global_elements = HashMap::new();
        let mut global_types = HashMap::new();
        for child in &root.children {
            let target = match child.local.as_str() {
                "element" => &mut global_elements,
                "complexType" => &mut global_types,
                _ => continue,
            };
            let name = child.attr("name").ok_or_else(|| {
                EngineError::InvalidSchema(format!("global <{}> without a name", child.local))
            })?;
            target.insert(name, child);
        }
        Ok(Self {
            global_elements,
            global_types,
            element_ids: HashMap::new(),
            type_ids: HashMap::new(),
            rules: SchemaRules::default(),
        })
    }

    fn global_element(&mut self, name: &str) -> Result<usize, EngineError> {
        if let Some(&id) = self.element_ids.get(name) {
            return Ok(id);
        }
        let (&key, &node) = self.global_elements.get_key_value(name).ok_or_else(|| {
            EngineError::InvalidSchema(format!("reference to undeclared element '{name}'"))
        })?;
        // Reserve the slot first so recursive references resolve to it.
        let id = self.push_element();
        self.element_ids.insert(key, id);
        let content = self.element_content(node)?;
        self.rules.elements[id] = content;
        Ok(id)
    }

    fn push_element(&mut self) -> usize {
        self.rules.elements.push(0);
        self.rules.elements.len() - 1
    }

    fn push_type(&mut self, content: ContentType) -> usize {
        self.rules.types.push(content);
        self.rules.types.len() - 1
    }

    fn element_content(&mut self, node: &'a XsdNode) -> Result<usize, EngineError> {
        if let Some(type_name) = node.attr("type") {
            return self.named_type(type_name);
        }
        for child in &node.children {
            match child.local.as_str() {
                "complexType" => {
                    let content = self.complex_type(child)?;
                    return Ok(self.push_type(content));
                }
                "simpleType" => return Ok(self.push_type(ContentType::simple())),
                _ => {}
            }
        }
        Ok(self.push_type(ContentType::any()))
    }

    /// Named complex types are compiled once; every other type name is
    /// treated as text-only.
    fn named_type(&mut self, qname: &str) -> Result<usize, EngineError> {
        let local = local_part(qname);
        if let Some(&id) = self.type_ids.get(local) {
            return Ok(id);
        }
        let Some((&key, &node)) = self.global_types.get_key_value(local) else {
            return Ok(self.push_type(ContentType::simple()));
        };
        let id = self.push_type(ContentType::default());
        self.type_ids.insert(key, id);
        let content = self.complex_type(node)?;
        self.rules.types[id] = content;
        Ok(id)
    }

    fn complex_type(&mut self, node: &'a XsdNode) -> Result<ContentType, EngineError> {
        let mut content = ContentType {
            text_allowed: node.attr("mixed") == Some("true"),
            ..Default::default()
        };
        for child in &node.children {
            match child.local.as_str() {
                "simpleContent" => {
                    content.text_allowed = true;
                    for derivation in &child.children {
                        self.apply_body(derivation, &mut content)?;
                    }
                }
                "complexContent" => {
                    for derivation in &child.children {
                        if let Some(base) = derivation.attr("base") {
                            let base_id = self.named_type(base)?;
                            let inherited = self.rules.types[base_id].clone();
                            merge(&mut content, inherited);
                        }
                        self.apply_body(derivation, &mut content)?;
                    }
                }
                _ => {}
            }
        }
        self.apply_body(node, &mut content)?;
        Ok(content)
    }

    fn apply_body(
        &mut self,
        node: &'a XsdNode,
        content: &mut ContentType,
    ) -> Result<(), EngineError> {
        for child in &node.children {
            match child.local.as_str() {
                "sequence" | "choice" | "all" => self.collect_particles(
                    child,
                    content,
                    Particle {
                        required: true,
                        repeatable: false,
                    },
                )?,
                "attribute" => add_attribute(child, content),
                "anyAttribute" => content.any_attribute = true,
                _ => {}
            }
        }
        Ok(())
    }

    fn collect_particles(
        &mut self,
        group: &'a XsdNode,
        content: &mut ContentType,
        outer: Particle,
    ) -> Result<(), EngineError> {
        let min = parse_occurs(group, "minOccurs")?.unwrap_or(1);
        let max = parse_occurs(group, "maxOccurs")?;
        let here = Particle {
            required: outer.required && min > 0 && group.local != "choice",
            repeatable: outer.repeatable || max != Some(1),
        };
        for child in &group.children {
            match child.local.as_str() {
                "element" => self.add_child(child, content, here)?,
                "sequence" | "choice" | "all" => self.collect_particles(child, content, here)?,
                "any" => content.any_children = true,
                _ => {}
            }
        }
        Ok(())
    }

    fn add_child(
        &mut self,
        node: &'a XsdNode,
        content: &mut ContentType,
        particle: Particle,
    ) -> Result<(), EngineError> {
        let min = parse_occurs(node, "minOccurs")?.unwrap_or(1);
        let max = parse_occurs(node, "maxOccurs")?;
        let (name, element) = if let Some(reference) = node.attr("ref") {
            let name = local_part(reference);
            (name.to_string(), self.global_element(name)?)
        } else {
            let name = node.attr("name").ok_or_else(|| {
                EngineError::InvalidSchema("local <element> without name or ref".to_string())
            })?;
            let id = self.push_element();
            let element_type = self.element_content(node)?;
            self.rules.elements[id] = element_type;
            (name.to_string(), id)
        };

        let rule = ChildRule {
            element,
            min: if particle.required { min } else { 0 },
            max: if particle.repeatable { None } else { max },
        };
        content
            .children
            .entry(name)
            .and_modify(|existing| {
                existing.min = 0;
                existing.max = None;
            })
            .or_insert(rule);
        Ok(())
    }
}

fn add_attribute(node: &XsdNode, content: &mut ContentType) {
    let Some(name) = node.attr("name").or_else(|| node.attr("ref").map(local_part)) else {
        return;
    };
    match node.attr("use") {
        Some("prohibited") => {}
        other => {
            content
                .attributes
                .insert(name.to_string(), other == Some("required"));
        }
    }
}

fn merge(into: &mut ContentType, base: ContentType) {
    into.children.extend(base.children);
    into.attributes.extend(base.attributes);
    into.any_children |= base.any_children;
    into.any_attribute |= base.any_attribute;
    into.text_allowed |= base.text_allowed;
}

#[derive(Debug)]
struct Frame {
    name: String,
    content: Option<usize>,
    counts: HashMap<String, u32>,
}

/// Checks one document against compiled rules, event by event.
#[derive(Debug)]
pub(crate) struct Validator<'r> {
    rules: &'r SchemaRules,
    stack: Vec<Frame>,
}

pub(crate) type Findings = Vec<(Severity, String)>;

impl<'r> Validator<'r> {
    pub(crate) fn new(rules: &'r SchemaRules) -> Self {
        Self {
            rules,
            stack: Vec::new(),
        }
    }

    pub(crate) fn start_element(&mut self, name: &str, attributes: &Attributes) -> Findings {
        let mut findings = Findings::new();
        let declared = match self.stack.last_mut() {
            None => {
                let root = self.rules.roots.get(name).copied();
                if root.is_none() {
                    findings.push((
                        Severity::Error,
                        format!("Cannot find the declaration of element '{name}'."),
                    ));
                }
                root
            }
            Some(parent) => match parent.content {
                None => None,
                Some(type_id) => {
                    let parent_type = &self.rules.types[type_id];
                    match parent_type.children.get(name) {
                        Some(rule) => {
                            let count = parent.counts.entry(name.to_string()).or_insert(0);
                            *count += 1;
                            if rule.max.is_some_and(|max| *count > max) {
                                findings.push((
                                    Severity::Error,
                                    format!(
                                        "Element '{name}' occurs more often than allowed in '{}'.",
                                        parent.name
                                    ),
                                ));
                            }
                            Some(rule.element)
                        }
                        None if parent_type.any_children => None,
                        None => {
                            findings.push((
                                Severity::Error,
                                format!(
                                    "Invalid content: element '{name}' is not allowed in '{}'.",
                                    parent.name
                                ),
                            ));
                            None
                        }
                    }
                }
            },
        };

        let content = declared.map(|id| self.rules.elements[id]);
        if let Some(type_id) = content {
            self.check_attributes(name, &self.rules.types[type_id], attributes, &mut findings);
        }
        self.stack.push(Frame {
            name: name.to_string(),
            content,
            counts: HashMap::new(),
        });
        findings
    }

    fn check_attributes(
        &self,
        element: &str,
        content: &ContentType,
        attributes: &Attributes,
        findings: &mut Findings,
    ) {
        for (name, _) in attributes.iter() {
            if is_infrastructure_attribute(name) {
                continue;
            }
            if !content.any_attribute && !content.attributes.contains_key(name) {
                findings.push((
                    Severity::Warning,
                    format!("Attribute '{name}' is not declared for element '{element}'."),
                ));
            }
        }
        for (name, &required) in &content.attributes {
            if required && attributes.get(name).is_none() {
                findings.push((
                    Severity::Error,
                    format!("Attribute '{name}' must appear on element '{element}'."),
                ));
            }
        }
    }

    pub(crate) fn characters(&mut self, text: &str) -> Findings {
        let mut findings = Findings::new();
        if let Some(Frame {
            name,
            content: Some(type_id),
            ..
        }) = self.stack.last()
        {
            if !self.rules.types[*type_id].text_allowed && !text.trim().is_empty() {
                findings.push((
                    Severity::Error,
                    format!("Element '{name}' cannot have character content."),
                ));
            }
        }
        findings
    }

    pub(crate) fn end_element(&mut self) -> Findings {
        let mut findings = Findings::new();
        let Some(frame) = self.stack.pop() else {
            return findings;
        };
        if let Some(type_id) = frame.content {
            for (child, rule) in &self.rules.types[type_id].children {
                let seen = frame.counts.get(child).copied().unwrap_or(0);
                if seen < rule.min {
                    findings.push((
                        Severity::Error,
                        format!(
                            "Element '{}' is incomplete: expected child '{child}' ({} of {}).",
                            frame.name, seen, rule.min
                        ),
                    ));
                }
            }
        }
        findings
    }
}

fn is_infrastructure_attribute(name: &str) -> bool {
    name == "xmlns" || name.starts_with("xmlns:") || name.starts_with("xsi:")
}
