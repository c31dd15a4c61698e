use crate::host::{Host, NodeId};

// A single inline declaration: "overflow: hidden"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub name: String,
    pub value: String,
}

// input: "color: red; font-size: 12px;"
// output: [Declaration { name: "color", value: "red" }, Declaration { name: "font-size", value: "12px" }]
pub fn parse_declarations(input: &str) -> Vec<Declaration> {
    input
        .split(';')
        .filter_map(|pair| {
            let (n, v) = pair.split_once(':')?;
            let name = n.trim().to_ascii_lowercase();
            if name.is_empty() {
                return None;
            }
            let value = v.trim().to_string();
            Some(Declaration { name, value })
        })
        .collect()
}

pub fn serialize(declarations: &[Declaration]) -> String {
    declarations
        .iter()
        .map(|d| format!("{}: {};", d.name, d.value))
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn property<H: Host + ?Sized>(host: &H, node: NodeId, name: &str) -> Option<String> {
    let inline = host.attribute(node, "style")?;
    parse_declarations(&inline)
        .into_iter()
        .rev()
        .find(|d| d.name.eq_ignore_ascii_case(name))
        .map(|d| d.value)
}

/// Sets one property and keeps the others. An empty value removes it, the
/// same way assigning `""` to a style property does in the browser.
pub fn set_property<H: Host + ?Sized>(host: &mut H, node: NodeId, name: &str, value: &str) {
    let inline = host.attribute(node, "style").unwrap_or_default();
    let mut declarations: Vec<Declaration> = parse_declarations(&inline)
        .into_iter()
        .filter(|d| !d.name.eq_ignore_ascii_case(name))
        .collect();
    if !value.is_empty() {
        declarations.push(Declaration {
            name: name.to_ascii_lowercase(),
            value: value.to_string(),
        });
    }
    if declarations.is_empty() {
        host.remove_attribute(node, "style");
    } else {
        host.set_attribute(node, "style", &serialize(&declarations));
    }
}

/// Replaces the whole inline style, like assigning `cssText`.
pub fn set_css_text<H, V>(host: &mut H, node: NodeId, declarations: &[(&str, V)])
where
    H: Host + ?Sized,
    V: AsRef<str>,
{
    let declarations: Vec<Declaration> = declarations
        .iter()
        .map(|(name, value)| Declaration {
            name: name.to_string(),
            value: value.as_ref().to_string(),
        })
        .collect();
    if declarations.is_empty() {
        host.remove_attribute(node, "style");
    } else {
        host.set_attribute(node, "style", &serialize(&declarations));
    }
}

pub fn clear<H: Host + ?Sized>(host: &mut H, node: NodeId) {
    if host.attribute(node, "style").is_some() {
        host.remove_attribute(node, "style");
    }
}

pub fn is_hidden<H: Host + ?Sized>(host: &H, node: NodeId) -> bool {
    property(host, node, "display").as_deref() == Some("none")
}
