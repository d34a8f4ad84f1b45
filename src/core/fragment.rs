//! Purpose: Recover the text of the first `<pre>` element from an HTML page.
//! Exports: `FragmentExtractor`, `extract_pre`.
//! Role: Minimal streaming tag/text consumer used when the raw endpoint serves HTML.
//! Invariants: Text inside the container is kept verbatim (no whitespace normalization).
//! Invariants: Only the first container element is honored; recording stops at its end tag.
//! Invariants: A document without the container yields an empty string, never an error.
use std::borrow::Cow;

const CONTAINER_TAG: &str = "pre";
const RAW_TEXT_ELEMENTS: [&str; 2] = ["script", "style"];
const MAX_ENTITY_LEN: usize = 32;

/// HTML 4 named character references plus `&apos;`, sorted by name.
const NAMED_REFERENCES: [(&str, char); 253] = [
    ("AElig", '\u{c6}'), ("Aacute", '\u{c1}'), ("Acirc", '\u{c2}'), ("Agrave", '\u{c0}'),
    ("Alpha", '\u{391}'), ("Aring", '\u{c5}'), ("Atilde", '\u{c3}'), ("Auml", '\u{c4}'),
    ("Beta", '\u{392}'), ("Ccedil", '\u{c7}'), ("Chi", '\u{3a7}'), ("Dagger", '\u{2021}'),
    ("Delta", '\u{394}'), ("ETH", '\u{d0}'), ("Eacute", '\u{c9}'), ("Ecirc", '\u{ca}'),
    ("Egrave", '\u{c8}'), ("Epsilon", '\u{395}'), ("Eta", '\u{397}'), ("Euml", '\u{cb}'),
    ("Gamma", '\u{393}'), ("Iacute", '\u{cd}'), ("Icirc", '\u{ce}'), ("Igrave", '\u{cc}'),
    ("Iota", '\u{399}'), ("Iuml", '\u{cf}'), ("Kappa", '\u{39a}'), ("Lambda", '\u{39b}'),
    ("Mu", '\u{39c}'), ("Ntilde", '\u{d1}'), ("Nu", '\u{39d}'), ("OElig", '\u{152}'),
    ("Oacute", '\u{d3}'), ("Ocirc", '\u{d4}'), ("Ograve", '\u{d2}'), ("Omega", '\u{3a9}'),
    ("Omicron", '\u{39f}'), ("Oslash", '\u{d8}'), ("Otilde", '\u{d5}'), ("Ouml", '\u{d6}'),
    ("Phi", '\u{3a6}'), ("Pi", '\u{3a0}'), ("Prime", '\u{2033}'), ("Psi", '\u{3a8}'),
    ("Rho", '\u{3a1}'), ("Scaron", '\u{160}'), ("Sigma", '\u{3a3}'), ("THORN", '\u{de}'),
    ("Tau", '\u{3a4}'), ("Theta", '\u{398}'), ("Uacute", '\u{da}'), ("Ucirc", '\u{db}'),
    ("Ugrave", '\u{d9}'), ("Upsilon", '\u{3a5}'), ("Uuml", '\u{dc}'), ("Xi", '\u{39e}'),
    ("Yacute", '\u{dd}'), ("Yuml", '\u{178}'), ("Zeta", '\u{396}'), ("aacute", '\u{e1}'),
    ("acirc", '\u{e2}'), ("acute", '\u{b4}'), ("aelig", '\u{e6}'), ("agrave", '\u{e0}'),
    ("alefsym", '\u{2135}'), ("alpha", '\u{3b1}'), ("amp", '\u{26}'), ("and", '\u{2227}'),
    ("ang", '\u{2220}'), ("apos", '\u{27}'), ("aring", '\u{e5}'), ("asymp", '\u{2248}'),
    ("atilde", '\u{e3}'), ("auml", '\u{e4}'), ("bdquo", '\u{201e}'), ("beta", '\u{3b2}'),
    ("brvbar", '\u{a6}'), ("bull", '\u{2022}'), ("cap", '\u{2229}'), ("ccedil", '\u{e7}'),
    ("cedil", '\u{b8}'), ("cent", '\u{a2}'), ("chi", '\u{3c7}'), ("circ", '\u{2c6}'),
    ("clubs", '\u{2663}'), ("cong", '\u{2245}'), ("copy", '\u{a9}'), ("crarr", '\u{21b5}'),
    ("cup", '\u{222a}'), ("curren", '\u{a4}'), ("dArr", '\u{21d3}'), ("dagger", '\u{2020}'),
    ("darr", '\u{2193}'), ("deg", '\u{b0}'), ("delta", '\u{3b4}'), ("diams", '\u{2666}'),
    ("divide", '\u{f7}'), ("eacute", '\u{e9}'), ("ecirc", '\u{ea}'), ("egrave", '\u{e8}'),
    ("empty", '\u{2205}'), ("emsp", '\u{2003}'), ("ensp", '\u{2002}'), ("epsilon", '\u{3b5}'),
    ("equiv", '\u{2261}'), ("eta", '\u{3b7}'), ("eth", '\u{f0}'), ("euml", '\u{eb}'),
    ("euro", '\u{20ac}'), ("exist", '\u{2203}'), ("fnof", '\u{192}'), ("forall", '\u{2200}'),
    ("frac12", '\u{bd}'), ("frac14", '\u{bc}'), ("frac34", '\u{be}'), ("frasl", '\u{2044}'),
    ("gamma", '\u{3b3}'), ("ge", '\u{2265}'), ("gt", '\u{3e}'), ("hArr", '\u{21d4}'),
    ("harr", '\u{2194}'), ("hearts", '\u{2665}'), ("hellip", '\u{2026}'), ("iacute", '\u{ed}'),
    ("icirc", '\u{ee}'), ("iexcl", '\u{a1}'), ("igrave", '\u{ec}'), ("image", '\u{2111}'),
    ("infin", '\u{221e}'), ("int", '\u{222b}'), ("iota", '\u{3b9}'), ("iquest", '\u{bf}'),
    ("isin", '\u{2208}'), ("iuml", '\u{ef}'), ("kappa", '\u{3ba}'), ("lArr", '\u{21d0}'),
    ("lambda", '\u{3bb}'), ("lang", '\u{2329}'), ("laquo", '\u{ab}'), ("larr", '\u{2190}'),
    ("lceil", '\u{2308}'), ("ldquo", '\u{201c}'), ("le", '\u{2264}'), ("lfloor", '\u{230a}'),
    ("lowast", '\u{2217}'), ("loz", '\u{25ca}'), ("lrm", '\u{200e}'), ("lsaquo", '\u{2039}'),
    ("lsquo", '\u{2018}'), ("lt", '\u{3c}'), ("macr", '\u{af}'), ("mdash", '\u{2014}'),
    ("micro", '\u{b5}'), ("middot", '\u{b7}'), ("minus", '\u{2212}'), ("mu", '\u{3bc}'),
    ("nabla", '\u{2207}'), ("nbsp", '\u{a0}'), ("ndash", '\u{2013}'), ("ne", '\u{2260}'),
    ("ni", '\u{220b}'), ("not", '\u{ac}'), ("notin", '\u{2209}'), ("nsub", '\u{2284}'),
    ("ntilde", '\u{f1}'), ("nu", '\u{3bd}'), ("oacute", '\u{f3}'), ("ocirc", '\u{f4}'),
    ("oelig", '\u{153}'), ("ograve", '\u{f2}'), ("oline", '\u{203e}'), ("omega", '\u{3c9}'),
    ("omicron", '\u{3bf}'), ("oplus", '\u{2295}'), ("or", '\u{2228}'), ("ordf", '\u{aa}'),
    ("ordm", '\u{ba}'), ("oslash", '\u{f8}'), ("otilde", '\u{f5}'), ("otimes", '\u{2297}'),
    ("ouml", '\u{f6}'), ("para", '\u{b6}'), ("part", '\u{2202}'), ("permil", '\u{2030}'),
    ("perp", '\u{22a5}'), ("phi", '\u{3c6}'), ("pi", '\u{3c0}'), ("piv", '\u{3d6}'),
    ("plusmn", '\u{b1}'), ("pound", '\u{a3}'), ("prime", '\u{2032}'), ("prod", '\u{220f}'),
    ("prop", '\u{221d}'), ("psi", '\u{3c8}'), ("quot", '\u{22}'), ("rArr", '\u{21d2}'),
    ("radic", '\u{221a}'), ("rang", '\u{232a}'), ("raquo", '\u{bb}'), ("rarr", '\u{2192}'),
    ("rceil", '\u{2309}'), ("rdquo", '\u{201d}'), ("real", '\u{211c}'), ("reg", '\u{ae}'),
    ("rfloor", '\u{230b}'), ("rho", '\u{3c1}'), ("rlm", '\u{200f}'), ("rsaquo", '\u{203a}'),
    ("rsquo", '\u{2019}'), ("sbquo", '\u{201a}'), ("scaron", '\u{161}'), ("sdot", '\u{22c5}'),
    ("sect", '\u{a7}'), ("shy", '\u{ad}'), ("sigma", '\u{3c3}'), ("sigmaf", '\u{3c2}'),
    ("sim", '\u{223c}'), ("spades", '\u{2660}'), ("sub", '\u{2282}'), ("sube", '\u{2286}'),
    ("sum", '\u{2211}'), ("sup", '\u{2283}'), ("sup1", '\u{b9}'), ("sup2", '\u{b2}'),
    ("sup3", '\u{b3}'), ("supe", '\u{2287}'), ("szlig", '\u{df}'), ("tau", '\u{3c4}'),
    ("there4", '\u{2234}'), ("theta", '\u{3b8}'), ("thetasym", '\u{3d1}'),
    ("thinsp", '\u{2009}'), ("thorn", '\u{fe}'), ("tilde", '\u{2dc}'), ("times", '\u{d7}'),
    ("trade", '\u{2122}'), ("uArr", '\u{21d1}'), ("uacute", '\u{fa}'), ("uarr", '\u{2191}'),
    ("ucirc", '\u{fb}'), ("ugrave", '\u{f9}'), ("uml", '\u{a8}'), ("upsih", '\u{3d2}'),
    ("upsilon", '\u{3c5}'), ("uuml", '\u{fc}'), ("weierp", '\u{2118}'), ("xi", '\u{3be}'),
    ("yacute", '\u{fd}'), ("yen", '\u{a5}'), ("yuml", '\u{ff}'), ("zeta", '\u{3b6}'),
    ("zwj", '\u{200d}'), ("zwnj", '\u{200c}'),
];

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum State {
    Outside,
    Recording,
    Done,
}

#[derive(Debug, Eq, PartialEq)]
enum Markup {
    /// More input is needed to classify the markup.
    Incomplete,
    /// `<` that does not open a tag.
    Literal,
    /// Comment, doctype, or processing instruction of the given byte length.
    Skip(usize),
    Start {
        name: String,
        len: usize,
        self_closing: bool,
    },
    End {
        name: String,
        len: usize,
    },
}

/// Incremental extractor; feed chunks in document order, then call `finish`.
#[derive(Debug)]
pub struct FragmentExtractor {
    tag: String,
    state: State,
    pending: String,
    raw_text: Option<String>,
    text: String,
}

impl Default for FragmentExtractor {
    fn default() -> Self {
        Self::new(CONTAINER_TAG)
    }
}

impl FragmentExtractor {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            state: State::Outside,
            pending: String::new(),
            raw_text: None,
            text: String::new(),
        }
    }

    pub fn feed(&mut self, chunk: &str) {
        if self.state == State::Done {
            return;
        }
        self.pending.push_str(chunk);
        self.process(false);
    }

    /// Flushes buffered input and returns the accumulated text.
    pub fn finish(mut self) -> String {
        if self.state != State::Done {
            self.process(true);
        }
        self.text
    }

    fn process(&mut self, eof: bool) {
        let input = std::mem::take(&mut self.pending);
        let mut pos = 0;
        while pos < input.len() && self.state != State::Done {
            let rest = &input[pos..];

            if let Some(name) = &self.raw_text {
                let closing = format!("</{name}");
                match find_ignore_case(rest, &closing) {
                    Some(idx) => {
                        pos += idx;
                        self.raw_text = None;
                        continue;
                    }
                    None if eof => {
                        pos = input.len();
                        break;
                    }
                    None => {
                        // Keep enough of the tail to match a split end tag.
                        let keep = closing.len().min(rest.len());
                        pos += floor_char_boundary(rest, rest.len() - keep);
                        break;
                    }
                }
            }

            match rest.find('<') {
                Some(0) => match scan_markup(rest) {
                    Markup::Incomplete => {
                        if eof {
                            self.push_text(rest);
                            pos = input.len();
                        }
                        break;
                    }
                    Markup::Literal => {
                        self.push_text("<");
                        pos += 1;
                    }
                    Markup::Skip(len) => pos += len,
                    Markup::Start {
                        name,
                        len,
                        self_closing,
                    } => {
                        self.start_tag(&name, self_closing);
                        pos += len;
                    }
                    Markup::End { name, len } => {
                        self.end_tag(&name);
                        pos += len;
                    }
                },
                Some(idx) => {
                    self.push_text(&rest[..idx]);
                    pos += idx;
                }
                None => {
                    let keep_from = if eof {
                        rest.len()
                    } else {
                        partial_entity_start(rest).unwrap_or(rest.len())
                    };
                    self.push_text(&rest[..keep_from]);
                    pos += keep_from;
                    break;
                }
            }
        }
        if self.state == State::Done {
            return;
        }
        self.pending = input[pos..].to_string();
    }

    fn start_tag(&mut self, name: &str, self_closing: bool) {
        if name == self.tag && self.state == State::Outside {
            self.state = if self_closing {
                State::Done
            } else {
                State::Recording
            };
            return;
        }
        if !self_closing && RAW_TEXT_ELEMENTS.contains(&name) {
            self.raw_text = Some(name.to_string());
        }
    }

    fn end_tag(&mut self, name: &str) {
        if name == self.tag && self.state == State::Recording {
            self.state = State::Done;
        }
    }

    fn push_text(&mut self, data: &str) {
        if self.state == State::Recording && !data.is_empty() {
            self.text.push_str(&decode_entities(data));
        }
    }
}

/// Extracts the text of the first `<pre>` element in `html`.
pub fn extract_pre(html: &str) -> String {
    let mut extractor = FragmentExtractor::default();
    extractor.feed(html);
    extractor.finish()
}

/// Whether a body looks like an HTML document rather than plain text.
pub fn looks_like_html(body: &str) -> bool {
    let head = body.trim_start();
    let head = &head[..floor_char_boundary(head, head.len().min(16))];
    let head = head.to_ascii_lowercase();
    head.starts_with("<!doctype html") || head.starts_with("<html")
}

fn scan_markup(rest: &str) -> Markup {
    let bytes = rest.as_bytes();
    let Some(&next) = bytes.get(1) else {
        return Markup::Incomplete;
    };
    match next {
        b'!' => {
            if rest.starts_with("<!--") {
                return match rest[4..].find("-->") {
                    Some(idx) => Markup::Skip(4 + idx + 3),
                    None => Markup::Incomplete,
                };
            }
            if "<!--".starts_with(rest) {
                return Markup::Incomplete;
            }
            skip_to_gt(rest)
        }
        b'?' => skip_to_gt(rest),
        b'/' => {
            let name = tag_name(&rest[2..]);
            if name.is_empty() {
                return if rest.len() == 2 {
                    Markup::Incomplete
                } else {
                    skip_to_gt(rest)
                };
            }
            match rest.find('>') {
                Some(idx) => Markup::End {
                    name,
                    len: idx + 1,
                },
                None => Markup::Incomplete,
            }
        }
        b if b.is_ascii_alphabetic() => {
            let name = tag_name(&rest[1..]);
            match find_tag_end(rest, 1 + name.len()) {
                Some(idx) => Markup::Start {
                    self_closing: rest[..idx].ends_with('/'),
                    name,
                    len: idx + 1,
                },
                None => Markup::Incomplete,
            }
        }
        _ => Markup::Literal,
    }
}

fn skip_to_gt(rest: &str) -> Markup {
    match rest.find('>') {
        Some(idx) => Markup::Skip(idx + 1),
        None => Markup::Incomplete,
    }
}

fn tag_name(input: &str) -> String {
    let mut chars = input.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {}
        _ => return String::new(),
    }
    input
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == ':')
        .collect::<String>()
        .to_ascii_lowercase()
}

/// Index of the `>` closing a start tag, skipping quoted attribute values.
fn find_tag_end(rest: &str, from: usize) -> Option<usize> {
    let mut quote: Option<u8> = None;
    for (idx, &byte) in rest.as_bytes().iter().enumerate().skip(from) {
        match (quote, byte) {
            (Some(q), b) if b == q => quote = None,
            (Some(_), _) => {}
            (None, b'"') | (None, b'\'') => quote = Some(byte),
            (None, b'>') => return Some(idx),
            _ => {}
        }
    }
    None
}

fn find_ignore_case(haystack: &str, needle: &str) -> Option<usize> {
    let needle = needle.as_bytes();
    haystack
        .as_bytes()
        .windows(needle.len())
        .position(|window| window.eq_ignore_ascii_case(needle))
}

fn floor_char_boundary(s: &str, mut idx: usize) -> usize {
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

/// Start of a trailing `&...` that may be completed by the next chunk.
fn partial_entity_start(text: &str) -> Option<usize> {
    let idx = text.rfind('&')?;
    let tail = &text[idx..];
    if tail.contains(';') || tail.len() > MAX_ENTITY_LEN {
        return None;
    }
    Some(idx)
}

fn decode_entities(text: &str) -> Cow<'_, str> {
    if !text.contains('&') {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(idx) = rest.find('&') {
        out.push_str(&rest[..idx]);
        rest = &rest[idx..];
        match decode_entity(rest) {
            Some((ch, len)) => {
                out.push(ch);
                rest = &rest[len..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

/// Decodes one reference at the start of `input` (which begins with `&`).
fn decode_entity(input: &str) -> Option<(char, usize)> {
    let body = &input[1..];
    if let Some(numeric) = body.strip_prefix('#') {
        let (digits, radix, prefix) = match numeric.strip_prefix(['x', 'X']) {
            Some(hex) => (hex, 16, 2),
            None => (numeric, 10, 1),
        };
        let len = digits
            .bytes()
            .take_while(|b| b.is_ascii_digit() || (radix == 16 && b.is_ascii_hexdigit()))
            .count();
        if len == 0 {
            return None;
        }
        let value = u32::from_str_radix(&digits[..len], radix).ok();
        let ch = value
            .filter(|v| *v != 0)
            .and_then(char::from_u32)
            .unwrap_or('\u{FFFD}');
        let terminator = usize::from(digits[len..].starts_with(';'));
        return Some((ch, 1 + prefix + len + terminator));
    }

    let len = body.bytes().take_while(u8::is_ascii_alphanumeric).count();
    if len == 0 || !body[len..].starts_with(';') {
        return None;
    }
    let name = &body[..len];
    let idx = NAMED_REFERENCES
        .binary_search_by(|(candidate, _)| candidate.cmp(&name))
        .ok()?;
    Some((NAMED_REFERENCES[idx].1, 1 + len + 1))
}
