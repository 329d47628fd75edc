use crate::tag::{Tag, MAX_ID_DIGITS, TAG_SEPARATOR};

/// Preferred separator between tag and payload
pub const PAYLOAD_DELIMITER: &str = ",,";

/// Fallback separator when the double delimiter is absent
pub const PAYLOAD_DELIMITER_SHORT: char = ',';

/// One message unit carried by a transport
///
/// Only text frames take part in the tag grammar; binary frames pass
/// through the system but never parse to a tag or payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
}

/// Result of interpreting a frame against the wire grammar
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parsed {
    /// A tag was found. `data` is `None` when the frame carries no payload
    /// (liveness probes and similar).
    Match { tag: Tag, data: Option<String> },
    NoMatch,
}

impl Frame {
    /// Format an outbound request as `<id>.--<inc>,,<payload>`
    pub fn request(tag: &Tag, payload: &str) -> Self {
        Frame::Text(format!("{}{}{}", tag, PAYLOAD_DELIMITER, payload))
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Frame::Text(text) => Some(text),
            Frame::Binary(_) => None,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Frame::Text(text) => text.len(),
            Frame::Binary(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// First tag found at the start of any line
    pub fn tag(&self) -> Option<Tag> {
        self.as_text().and_then(find_tag)
    }

    /// Text after the first `,,`, else after the first `,`
    ///
    /// An empty remainder counts as no payload.
    pub fn payload(&self) -> Option<&str> {
        self.as_text().and_then(find_payload)
    }

    pub fn parse(&self) -> Parsed {
        match self.tag() {
            Some(tag) => Parsed::Match {
                tag,
                data: self.payload().map(str::to_owned),
            },
            None => Parsed::NoMatch,
        }
    }
}

impl From<String> for Frame {
    fn from(text: String) -> Self {
        Frame::Text(text)
    }
}

impl From<&str> for Frame {
    fn from(text: &str) -> Self {
        Frame::Text(text.to_owned())
    }
}

impl From<Vec<u8>> for Frame {
    fn from(bytes: Vec<u8>) -> Self {
        Frame::Binary(bytes)
    }
}

impl Parsed {
    /// True only for a frame tagged exactly `tag` that also carries data
    pub fn correlates_with(&self, tag: &Tag) -> bool {
        matches!(self, Parsed::Match { tag: found, data: Some(_) } if found == tag)
    }

    pub fn into_data(self) -> Option<String> {
        match self {
            Parsed::Match { data, .. } => data,
            Parsed::NoMatch => None,
        }
    }
}

fn is_line_break(c: char) -> bool {
    matches!(c, '\n' | '\r' | '\u{2028}' | '\u{2029}')
}

fn find_tag(text: &str) -> Option<Tag> {
    text.split(is_line_break).find_map(tag_at_line_start)
}

fn tag_at_line_start(line: &str) -> Option<Tag> {
    let id_len = leading_digits(line);
    if id_len == 0 || id_len > MAX_ID_DIGITS {
        return None;
    }

    let (id, rest) = line.split_at(id_len);
    let rest = rest.strip_prefix(TAG_SEPARATOR)?;

    let inc_len = leading_digits(rest);
    if inc_len == 0 {
        return None;
    }

    Tag::from_digits(id, &rest[..inc_len]).ok()
}

fn leading_digits(s: &str) -> usize {
    s.bytes().take_while(u8::is_ascii_digit).count()
}

fn find_payload(text: &str) -> Option<&str> {
    let rest = match text.find(PAYLOAD_DELIMITER) {
        Some(at) => &text[at + PAYLOAD_DELIMITER.len()..],
        None => {
            let at = text.find(PAYLOAD_DELIMITER_SHORT)?;
            &text[at + PAYLOAD_DELIMITER_SHORT.len_utf8()..]
        }
    };
    (!rest.is_empty()).then_some(rest)
}
