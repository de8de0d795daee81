// ── Generic XML Tree ───────────────────────────────────────────
//
// Element tree built on quick-xml. Names are stored without namespace
// prefixes; attributes are kept apart from child elements.
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum XmlError {
    #[error("XML inválido na posição {position}: {message}")]
    Syntax { position: usize, message: String },
    #[error("Elemento '{0}' não foi fechado")]
    Unclosed(String),
    #[error("Documento XML sem elemento raiz")]
    NoRoot,
    #[error("Conteúdo inesperado fora do elemento raiz: {0}")]
    TrailingContent(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct XmlNode {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
    pub text: String,
}

impl XmlNode {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Every child with the given name. A lone element and a repeated one
    /// come out the same way, so callers never branch on list-vs-singleton.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlNode> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    pub fn path(&self, segments: &[&str]) -> Option<&XmlNode> {
        segments
            .iter()
            .try_fold(self, |node, segment| node.child(segment))
    }

    /// Trimmed text of a direct child, or "" when absent.
    pub fn text_of(&self, name: &str) -> &str {
        self.child(name).map(|c| c.text.trim()).unwrap_or("")
    }

    /// Like `text_of` but `None` for missing or blank children.
    pub fn opt_text(&self, name: &str) -> Option<&str> {
        Some(self.text_of(name)).filter(|t| !t.is_empty())
    }

    pub fn has_elements(&self) -> bool {
        !self.children.is_empty()
    }

    /// First child that is itself a structured element.
    pub fn first_structured_child(&self) -> Option<&XmlNode> {
        self.children.iter().find(|c| c.has_elements())
    }
}

fn local_name(raw: &[u8]) -> String {
    let name = String::from_utf8_lossy(raw);
    match name.rsplit_once(':') {
        Some((_, local)) => local.to_string(),
        None => name.into_owned(),
    }
}

fn open_node(start: &BytesStart<'_>, position: usize) -> Result<XmlNode, XmlError> {
    let mut node = XmlNode {
        name: local_name(start.name().as_ref()),
        ..Default::default()
    };
    for attr in start.attributes() {
        let attr = attr.map_err(|e| XmlError::Syntax {
            position,
            message: e.to_string(),
        })?;
        let key = local_name(attr.key.as_ref());
        let value = attr
            .unescape_value()
            .map_err(|e| XmlError::Syntax {
                position,
                message: e.to_string(),
            })?
            .into_owned();
        node.attributes.push((key, value));
    }
    Ok(node)
}

fn attach(stack: &mut [XmlNode], root: &mut Option<XmlNode>, node: XmlNode) -> Result<(), XmlError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None if root.is_none() => *root = Some(node),
        None => return Err(XmlError::TrailingContent(format!("<{}>", node.name))),
    }
    Ok(())
}

pub fn parse(xml: &str) -> Result<XmlNode, XmlError> {
    let mut reader = Reader::from_str(xml.trim_start_matches('\u{feff}'));
    reader.trim_text(true);

    let mut stack: Vec<XmlNode> = Vec::new();
    let mut root: Option<XmlNode> = None;

    loop {
        let position = reader.buffer_position();
        let syntax = |message: String| XmlError::Syntax { position, message };
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                if stack.is_empty() && root.is_some() {
                    return Err(XmlError::TrailingContent(local_name(e.name().as_ref())));
                }
                stack.push(open_node(&e, position)?);
            }
            Ok(Event::Empty(e)) => {
                let node = open_node(&e, position)?;
                attach(&mut stack, &mut root, node)?;
            }
            Ok(Event::End(_)) => {
                let node = stack
                    .pop()
                    .ok_or_else(|| syntax("fechamento sem abertura".into()))?;
                attach(&mut stack, &mut root, node)?;
            }
            Ok(Event::Text(t)) => {
                let text = t.unescape().map_err(|e| syntax(e.to_string()))?;
                match stack.last_mut() {
                    Some(node) => node.text.push_str(&text),
                    None if text.trim().is_empty() => {}
                    None => return Err(XmlError::TrailingContent(text.into_owned())),
                }
            }
            Ok(Event::CData(c)) => {
                if let Some(node) = stack.last_mut() {
                    node.text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(syntax(e.to_string())),
        }
    }

    if let Some(open) = stack.pop() {
        return Err(XmlError::Unclosed(open.name));
    }
    root.ok_or(XmlError::NoRoot)
}
