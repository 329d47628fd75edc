use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Separator between the id and increment halves of a tag
pub const TAG_SEPARATOR: &str = ".--";

/// Longest id the wire grammar accepts
pub const MAX_ID_DIGITS: usize = 4;

/// Request/response pairing key
///
/// Both halves are kept as the digit strings seen on the wire, and two tags
/// are equal only if both strings are identical (`1.--05` is not `1.--5`).
/// Arithmetic happens only when deriving a new outbound tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "TagParts")]
pub struct Tag {
    id: String,
    inc: String,
}

#[derive(Deserialize)]
struct TagParts {
    id: String,
    inc: String,
}

impl TryFrom<TagParts> for Tag {
    type Error = Error;

    fn try_from(parts: TagParts) -> Result<Self> {
        Self::from_digits(parts.id, parts.inc)
    }
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

impl Tag {
    /// Build a tag from a numeric increment
    pub fn new(id: impl Into<String>, inc: u64) -> Result<Self> {
        Self::from_digits(id, inc.to_string())
    }

    /// Build a tag from its wire digits, validating that `id` is 1 to 4
    /// ASCII digits and `inc` is a non-empty digit run
    pub fn from_digits(id: impl Into<String>, inc: impl Into<String>) -> Result<Self> {
        let id = id.into();
        let inc = inc.into();
        if id.len() > MAX_ID_DIGITS || !is_digits(&id) {
            return Err(Error::InvalidTag(format!(
                "id must be 1-{} digits, got {:?}",
                MAX_ID_DIGITS, id
            )));
        }
        if !is_digits(&inc) {
            return Err(Error::InvalidTag(format!("increment must be digits, got {:?}", inc)));
        }
        Ok(Self { id, inc })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Increment digits exactly as carried on the wire
    pub fn inc(&self) -> &str {
        &self.inc
    }

    /// The tag a new outbound request should use
    pub fn next(&self) -> Self {
        self.advanced(1)
    }

    /// Same id, increment moved forward by `offset`
    ///
    /// The result is canonical decimal: leading zeros are dropped.
    pub fn advanced(&self, offset: u64) -> Self {
        Self {
            id: self.id.clone(),
            inc: add_decimal(&self.inc, offset),
        }
    }
}

/// `digits + offset` in base ten, for digit runs of any length
fn add_decimal(digits: &str, offset: u64) -> String {
    let mut carry = offset;
    let mut out: Vec<u8> = Vec::with_capacity(digits.len() + 1);

    for b in digits.bytes().rev() {
        let sum = u64::from(b - b'0') + carry % 10;
        carry = carry / 10 + sum / 10;
        out.push(b'0' + (sum % 10) as u8);
    }
    while carry > 0 {
        out.push(b'0' + (carry % 10) as u8);
        carry /= 10;
    }
    while out.len() > 1 && out.last() == Some(&b'0') {
        out.pop();
    }
    out.reverse();

    out.into_iter().map(char::from).collect()
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.id, TAG_SEPARATOR, self.inc)
    }
}

impl FromStr for Tag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (id, inc) = s
            .split_once(TAG_SEPARATOR)
            .ok_or_else(|| Error::InvalidTag(format!("missing separator in {:?}", s)))?;
        Self::from_digits(id, inc)
    }
}
