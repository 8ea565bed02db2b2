//! Serialize resolved [`VNode`] trees to HTML markup

use crate::vdom::VNode;

/// Options for HTML output
#[derive(Debug, Clone)]
pub struct HtmlOptions {
    /// Put each element on its own indented line
    pub pretty: bool,
    /// Indentation string
    pub indent: String,
}

impl Default for HtmlOptions {
    fn default() -> Self {
        Self {
            pretty: false,
            indent: "  ".to_string(),
        }
    }
}

impl HtmlOptions {
    pub fn pretty() -> Self {
        Self {
            pretty: true,
            ..Self::default()
        }
    }
}

struct Context<'a> {
    options: &'a HtmlOptions,
    depth: usize,
    buffer: String,
}

impl<'a> Context<'a> {
    fn new(options: &'a HtmlOptions) -> Self {
        Self {
            options,
            depth: 0,
            buffer: String::new(),
        }
    }

    fn add(&mut self, text: &str) {
        self.buffer.push_str(text);
    }

    /// Append text with markup characters escaped; `"` only inside attribute values
    fn add_escaped(&mut self, text: &str, in_attribute: bool) {
        for ch in text.chars() {
            match ch {
                '&' => self.buffer.push_str("&amp;"),
                '<' => self.buffer.push_str("&lt;"),
                '>' => self.buffer.push_str("&gt;"),
                '"' if in_attribute => self.buffer.push_str("&quot;"),
                _ => self.buffer.push(ch),
            }
        }
    }

    fn add_indent(&mut self) {
        for _ in 0..self.depth {
            self.buffer.push_str(&self.options.indent);
        }
    }

    fn start_line(&mut self) {
        if self.options.pretty {
            self.add_indent();
        }
    }

    fn end_line(&mut self) {
        if self.options.pretty {
            self.add("\n");
        }
    }
}

/// Render a node to HTML
pub fn render_html(node: &VNode, options: &HtmlOptions) -> String {
    let mut ctx = Context::new(options);
    write_node(node, &mut ctx);
    ctx.buffer
}

/// Render an optional root; a missing root renders as an empty string
pub fn render_root(root: Option<&VNode>, options: &HtmlOptions) -> String {
    root.map(|node| render_html(node, options)).unwrap_or_default()
}

fn write_node(node: &VNode, ctx: &mut Context<'_>) {
    match node {
        VNode::Element {
            tag,
            attributes,
            children,
        } => write_element(tag, attributes.iter(), children, ctx),
        VNode::Text { content } => {
            ctx.start_line();
            ctx.add_escaped(content, false);
            ctx.end_line();
        }
        VNode::Fragment { children } => {
            for child in children {
                write_node(child, ctx);
            }
        }
    }
}

fn write_element<'n>(
    tag: &str,
    attributes: impl Iterator<Item = (&'n String, &'n String)>,
    children: &[VNode],
    ctx: &mut Context<'_>,
) {
    ctx.start_line();
    ctx.add(&format!("<{}", tag));
    for (name, value) in attributes {
        ctx.add(&format!(" {}=\"", name));
        ctx.add_escaped(value, true);
        ctx.add("\"");
    }

    if children.is_empty() && is_void_element(tag) {
        ctx.add(" />");
        ctx.end_line();
        return;
    }

    ctx.add(">");

    if !children.is_empty() {
        ctx.end_line();
        ctx.depth += 1;
        for child in children {
            write_node(child, ctx);
        }
        ctx.depth -= 1;
        ctx.start_line();
    }

    ctx.add(&format!("</{}>", tag));
    ctx.end_line();
}

/// Elements that never have content and are written as `<tag />`
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

fn is_void_element(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}
