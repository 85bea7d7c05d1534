//! Context-aware escaping and the markup tracking it needs.

use serde_json::Value as Json;

/// Replacement emitted for values rejected by the URL filter.
pub const FILTERED_URL: &str = "#ZgotmplZ";
/// Replacement emitted for values unsafe in their context.
pub const FILTERED_VALUE: &str = "ZgotmplZ";

const URL_ATTRIBUTES: [&str; 6] = ["href", "src", "action", "formaction", "poster", "cite"];
const SAFE_SCHEMES: [&str; 3] = ["http", "https", "mailto"];
const SCRIPT_END: &str = "</script";
const STYLE_END: &str = "</style";

/// Escape the characters that are special in HTML text and quoted attributes.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            '+' => out.push_str("&#43;"),
            '\0' => out.push('\u{FFFD}'),
            c => out.push(c),
        }
    }
    out
}

/// Escape a value written into an unquoted attribute. Anything that could
/// end the value or start another attribute becomes a numeric reference.
/// An empty value is replaced so the next attribute is not swallowed.
pub fn escape_unquoted_attr(input: &str) -> String {
    if input.is_empty() {
        return FILTERED_VALUE.to_string();
    }
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' | '\'' | '+' | '=' | '`' | ' ' | '\t' | '\n' | '\r' | '\u{0B}' | '\u{0C}' => {
                out.push_str(&format!("&#{};", c as u32))
            }
            '\0' => out.push_str("&#xfffd;"),
            c => out.push(c),
        }
    }
    out
}

/// Encode a value as a JavaScript expression: JSON, with the characters
/// that could close the script element or start markup escaped. Padded with
/// spaces when it starts or ends like an identifier so it cannot merge with
/// neighbouring tokens.
pub fn escape_js_value(value: &Json) -> String {
    let encoded = value.to_string();
    let mut out = String::with_capacity(encoded.len() + 2);
    for c in encoded.chars() {
        match c {
            '<' => out.push_str("\\u003c"),
            '>' => out.push_str("\\u003e"),
            '&' => out.push_str("\\u0026"),
            '+' => out.push_str("\\u002b"),
            '\'' => out.push_str("\\u0027"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            c => out.push(c),
        }
    }

    let ident = |c: Option<char>| c.is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '$');
    if ident(out.chars().next()) || ident(out.chars().last()) {
        out = format!(" {} ", out);
    }
    out
}

/// Escape text written inside a JavaScript string or template literal.
pub fn escape_js_string(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\u0022"),
            '\'' => out.push_str("\\u0027"),
            '`' => out.push_str("\\u0060"),
            '$' => out.push_str("\\u0024"),
            '<' => out.push_str("\\u003c"),
            '>' => out.push_str("\\u003e"),
            '&' => out.push_str("\\u0026"),
            '+' => out.push_str("\\u002b"),
            '/' => out.push_str("\\/"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out
}

/// Pass a CSS value through when it cannot leave its declaration, otherwise
/// replace it with [`FILTERED_VALUE`].
pub fn filter_css_value(input: &str) -> String {
    let lower = input.to_ascii_lowercase();
    let unsafe_char = input.chars().any(|c| {
        matches!(
            c,
            '\0' | '"' | '\'' | '(' | ')' | '/' | ';' | '@' | '[' | '\\' | ']' | '`' | '{' | '}'
                | '<' | '>' | '&'
        )
    });
    if unsafe_char || lower.contains("expression") || lower.contains("mozbinding") {
        FILTERED_VALUE.to_string()
    } else {
        input.to_string()
    }
}

/// Whether a URL may be placed at the start of a URL-valued attribute.
/// Relative URLs pass; absolute ones only with an allowed scheme.
pub fn is_safe_url(url: &str) -> bool {
    let url = url.trim_start();
    let Some(colon) = url.find(':') else {
        return true;
    };
    if url[..colon].contains(['/', '?', '#']) {
        return true;
    }
    let scheme = &url[..colon];
    SAFE_SCHEMES
        .iter()
        .any(|safe| scheme.eq_ignore_ascii_case(safe))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Text,
    TagOpen,
    TagName,
    /// `<!...>` and `</...>`, skipped to the closing `>`.
    Declaration,
    InTag,
    AttrName,
    AfterAttrName,
    BeforeValue,
    Value(Quote),
    Script(Js),
    Style,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Quote {
    Double,
    Single,
    Unquoted,
}

/// Position inside script source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Js {
    Code,
    /// After a `/` that may open a comment.
    Slash,
    Str { quote: char, escaped: bool },
    LineComment,
    BlockComment { star: bool },
}

/// What an attribute value holds, derived from the attribute name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrKind {
    Plain,
    Url,
    /// `on*` event handlers.
    Script,
    Style,
}

/// Where the next emitted value lands inside the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Context {
    Text,
    /// Inside an attribute value. `at_start` when nothing has been written
    /// into the value yet.
    Attribute {
        kind: AttrKind,
        quoted: bool,
        at_start: bool,
    },
    /// Inside a `<script>` element.
    Script { in_string: bool },
    /// Inside a `<style>` element.
    Style,
}

/// Incremental scanner over emitted HTML, tracking tags and attributes.
#[derive(Debug, Clone)]
pub struct MarkupTracker {
    state: State,
    tag_name: String,
    attr_name: String,
    value_started: bool,
    /// Lowercased tail of raw text, to find the closing tag.
    raw_tail: String,
}

impl Default for MarkupTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkupTracker {
    pub fn new() -> Self {
        Self {
            state: State::Text,
            tag_name: String::new(),
            attr_name: String::new(),
            value_started: false,
            raw_tail: String::new(),
        }
    }

    pub fn context(&self) -> Context {
        match self.state {
            State::BeforeValue => Context::Attribute {
                kind: self.attr_kind(),
                quoted: false,
                at_start: true,
            },
            State::Value(quote) => Context::Attribute {
                kind: self.attr_kind(),
                quoted: quote != Quote::Unquoted,
                at_start: !self.value_started,
            },
            State::Script(js) => Context::Script {
                in_string: matches!(js, Js::Str { .. }),
            },
            State::Style => Context::Style,
            _ => Context::Text,
        }
    }

    fn attr_kind(&self) -> AttrKind {
        let name = self.attr_name.to_ascii_lowercase();
        if URL_ATTRIBUTES.contains(&name.as_str()) {
            AttrKind::Url
        } else if name == "style" {
            AttrKind::Style
        } else if name.len() > 2 && name.starts_with("on") {
            AttrKind::Script
        } else {
            AttrKind::Plain
        }
    }

    pub fn feed(&mut self, chunk: &str) {
        for c in chunk.chars() {
            self.step(c);
        }
    }

    fn step(&mut self, c: char) {
        let state = self.state;
        self.state = match state {
            State::Text => {
                if c == '<' {
                    State::TagOpen
                } else {
                    State::Text
                }
            }
            State::TagOpen => match c {
                c if c.is_ascii_alphabetic() => {
                    self.tag_name.clear();
                    self.tag_name.push(c.to_ascii_lowercase());
                    State::TagName
                }
                '!' | '/' | '?' => State::Declaration,
                '<' => State::TagOpen,
                _ => State::Text,
            },
            State::TagName => match c {
                '>' => self.close_tag(),
                c if c.is_whitespace() || c == '/' => State::InTag,
                c => {
                    self.tag_name.push(c.to_ascii_lowercase());
                    State::TagName
                }
            },
            State::Declaration => {
                if c == '>' {
                    State::Text
                } else {
                    State::Declaration
                }
            }
            State::InTag => match c {
                '>' => self.close_tag(),
                c if c.is_whitespace() || c == '/' => State::InTag,
                c => self.start_attribute(c),
            },
            State::AttrName => match c {
                '>' => self.close_tag(),
                '=' => State::BeforeValue,
                c if c.is_whitespace() => State::AfterAttrName,
                c => {
                    self.attr_name.push(c);
                    State::AttrName
                }
            },
            State::AfterAttrName => match c {
                '>' => self.close_tag(),
                '=' => State::BeforeValue,
                c if c.is_whitespace() => State::AfterAttrName,
                c => self.start_attribute(c),
            },
            State::BeforeValue => match c {
                '>' => self.close_tag(),
                '"' => self.start_value(Quote::Double),
                '\'' => self.start_value(Quote::Single),
                c if c.is_whitespace() => State::BeforeValue,
                _ => {
                    self.value_started = true;
                    State::Value(Quote::Unquoted)
                }
            },
            State::Value(quote) => match (quote, c) {
                (Quote::Double, '"') | (Quote::Single, '\'') => State::InTag,
                (Quote::Unquoted, '>') => self.close_tag(),
                (Quote::Unquoted, c) if c.is_whitespace() => State::InTag,
                _ => {
                    self.value_started = true;
                    State::Value(quote)
                }
            },
            State::Script(js) => {
                if self.ends_raw_text(c, SCRIPT_END) {
                    State::Declaration
                } else {
                    State::Script(step_js(js, c))
                }
            }
            State::Style => {
                if self.ends_raw_text(c, STYLE_END) {
                    State::Declaration
                } else {
                    State::Style
                }
            }
        };
    }

    /// `>` of a start tag; `script` and `style` switch to raw text.
    fn close_tag(&mut self) -> State {
        self.raw_tail.clear();
        match self.tag_name.as_str() {
            "script" => State::Script(Js::Code),
            "style" => State::Style,
            _ => State::Text,
        }
    }

    fn ends_raw_text(&mut self, c: char, end_tag: &str) -> bool {
        self.raw_tail.push(c.to_ascii_lowercase());
        if self.raw_tail.len() > end_tag.len() {
            let mut cut = self.raw_tail.len() - end_tag.len();
            while !self.raw_tail.is_char_boundary(cut) {
                cut += 1;
            }
            self.raw_tail.replace_range(..cut, "");
        }
        self.raw_tail == end_tag
    }

    fn start_attribute(&mut self, first: char) -> State {
        self.attr_name.clear();
        self.attr_name.push(first);
        self.value_started = false;
        State::AttrName
    }

    fn start_value(&mut self, quote: Quote) -> State {
        self.value_started = false;
        State::Value(quote)
    }
}

fn step_js(js: Js, c: char) -> Js {
    match js {
        Js::Code => match c {
            '"' | '\'' | '`' => Js::Str {
                quote: c,
                escaped: false,
            },
            '/' => Js::Slash,
            _ => Js::Code,
        },
        Js::Slash => match c {
            '/' => Js::LineComment,
            '*' => Js::BlockComment { star: false },
            c => step_js(Js::Code, c),
        },
        Js::Str {
            quote,
            escaped: true,
        } => Js::Str {
            quote,
            escaped: false,
        },
        Js::Str { quote, .. } => match c {
            '\\' => Js::Str {
                quote,
                escaped: true,
            },
            c if c == quote => Js::Code,
            '\n' if quote != '`' => Js::Code,
            _ => Js::Str {
                quote,
                escaped: false,
            },
        },
        Js::LineComment => {
            if c == '\n' {
                Js::Code
            } else {
                Js::LineComment
            }
        }
        Js::BlockComment { star } => match c {
            '/' if star => Js::Code,
            '*' => Js::BlockComment { star: true },
            _ => Js::BlockComment { star: false },
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context_after(html: &str) -> Context {
        let mut tracker = MarkupTracker::new();
        tracker.feed(html);
        tracker.context()
    }

    fn attribute(kind: AttrKind, quoted: bool, at_start: bool) -> Context {
        Context::Attribute {
            kind,
            quoted,
            at_start,
        }
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<b>"Tom" & 'Jerry'</b>"#),
            "&lt;b&gt;&#34;Tom&#34; &amp; &#39;Jerry&#39;&lt;/b&gt;"
        );
        assert_eq!(escape_html("1+1"), "1&#43;1");
        assert_eq!(escape_html("plain text"), "plain text");
    }

    #[test]
    fn test_escape_unquoted_attr() {
        assert_eq!(
            escape_unquoted_attr("x onmouseover=alert(1)"),
            "x&#32;onmouseover&#61;alert(1)"
        );
        assert_eq!(escape_unquoted_attr("a`b\tc>"), "a&#96;b&#9;c&gt;");
        assert_eq!(escape_unquoted_attr(""), FILTERED_VALUE);
    }

    #[test]
    fn test_escape_js() {
        assert_eq!(
            escape_js_value(&json!("a+b \"q\"")),
            r#""a\u002bb \"q\"""#
        );
        assert_eq!(
            escape_js_value(&json!({"tag": "</script>"})),
            r#"{"tag":"\u003c/script\u003e"}"#
        );
        assert_eq!(escape_js_value(&json!(-1)), " -1 ");
        assert_eq!(escape_js_value(&json!(null)), " null ");
        assert_eq!(
            escape_js_string("it's \"${x}\"\n</b>"),
            r#"it\u0027s \u0022\u0024{x}\u0022\n\u003c\/b\u003e"#
        );
    }

    #[test]
    fn test_filter_css_value() {
        assert_eq!(filter_css_value("#ff0000"), "#ff0000");
        assert_eq!(filter_css_value("12px solid"), "12px solid");
        assert_eq!(filter_css_value("red; background: url(x)"), FILTERED_VALUE);
        assert_eq!(filter_css_value("Expression"), FILTERED_VALUE);
        assert_eq!(filter_css_value("</style>"), FILTERED_VALUE);
    }

    #[test]
    fn test_safe_url() {
        assert!(is_safe_url("https://app.tixgo.com/login"));
        assert!(is_safe_url("/relative/path?a=b:c"));
        assert!(is_safe_url("MAILTO:ops@tixgo.com"));
        assert!(!is_safe_url("javascript:alert(1)"));
        assert!(!is_safe_url(" data:text/html,hi"));
    }

    #[test]
    fn test_tracker_contexts() {
        assert_eq!(context_after("<p>Hello "), Context::Text);
        assert_eq!(
            context_after(r#"<a href=""#),
            attribute(AttrKind::Url, true, true)
        );
        assert_eq!(
            context_after(r#"<a class="x" HREF="/base/"#),
            attribute(AttrKind::Url, true, false)
        );
        assert_eq!(
            context_after(r#"<a title=""#),
            attribute(AttrKind::Plain, true, true)
        );
        assert_eq!(context_after(r#"<a href="/x">"#), Context::Text);
        assert_eq!(
            context_after(r#"<!-- note --><img src='"#),
            attribute(AttrKind::Url, true, true)
        );
        assert_eq!(context_after("1 < 2 and "), Context::Text);
    }

    #[test]
    fn test_tracker_unquoted_and_handler_attributes() {
        assert_eq!(
            context_after("<a title="),
            attribute(AttrKind::Plain, false, true)
        );
        assert_eq!(
            context_after("<a title=x"),
            attribute(AttrKind::Plain, false, false)
        );
        assert_eq!(context_after("<a title=x>"), Context::Text);
        assert_eq!(
            context_after(r#"<button onClick="go("#),
            attribute(AttrKind::Script, true, false)
        );
        assert_eq!(
            context_after(r#"<p style="color: "#),
            attribute(AttrKind::Style, true, false)
        );
    }

    #[test]
    fn test_tracker_raw_text_elements() {
        assert_eq!(
            context_after("<script>var x = "),
            Context::Script { in_string: false }
        );
        assert_eq!(
            context_after(r#"<script type="module">var s = "a\"b "#),
            Context::Script { in_string: true }
        );
        assert_eq!(
            context_after("<script>// don't\nvar t = `x"),
            Context::Script { in_string: true }
        );
        assert_eq!(
            context_after("<script>/* it's */ f("),
            Context::Script { in_string: false }
        );
        assert_eq!(
            context_after("<script>var s = '<p>';</SCRIPT><p>"),
            Context::Text
        );
        assert_eq!(context_after("<style>p { color: "), Context::Style);
        assert_eq!(context_after("<style>p {}</style> "), Context::Text);
        assert_eq!(context_after("<scripts>"), Context::Text);
    }
}
