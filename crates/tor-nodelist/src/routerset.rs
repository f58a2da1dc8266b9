//! Relay identity tokens, and operator-configured sets of relays.
//!
//! Operators refer to relays with a small token language: a bare
//! nickname, a `$`-prefixed hex identity, or a hex identity with an
//! attached nickname (`$hex=name` binds through the consensus, `$hex~name`
//! merely asserts the relay's own nickname).  The same tokens appear in
//! declared relay families and in configuration lists such as
//! `EntryNodes`.

use crate::types::keys::RsaIdentity;
use serde::Deserialize;
use std::str::FromStr;

/// The longest allowed relay nickname, in characters.
pub const MAX_NICKNAME_LEN: usize = 19;

/// A single parsed relay-identity token.
#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum RelayToken {
    /// A bare nickname.
    Nickname(String),
    /// A hex identity, with or without a leading `$`.
    Id(RsaIdentity),
    /// A hex identity with an attached nickname.
    IdWithNickname {
        /// The identity given in hex.
        id: RsaIdentity,
        /// The attached nickname.
        nickname: String,
        /// True for the `=` form, which additionally requires the
        /// consensus to bind this nickname to this identity.
        must_be_named: bool,
    },
}

impl RelayToken {
    /// Try to parse `s` as a relay-identity token.
    ///
    /// Returns None if `s` is not in any recognized form.
    pub fn parse(s: &str) -> Option<RelayToken> {
        let body = s.strip_prefix('$').unwrap_or(s);
        if let Some(id) = RsaIdentity::from_hex(body) {
            return Some(RelayToken::Id(id));
        }
        if body.len() > 40 {
            if !body.is_char_boundary(40) {
                return None;
            }
            let (hex, rest) = body.split_at(40);
            if let Some(id) = RsaIdentity::from_hex(hex) {
                let must_be_named = match rest.as_bytes()[0] {
                    b'=' => true,
                    b'~' => false,
                    _ => return None,
                };
                let nickname = &rest[1..];
                if !nickname_ok(nickname) {
                    return None;
                }
                return Some(RelayToken::IdWithNickname {
                    id,
                    nickname: nickname.to_string(),
                    must_be_named,
                });
            }
            return None;
        }
        // Tokens that begin with '$' must be hex forms.
        if s.starts_with('$') || !nickname_ok(s) {
            return None;
        }
        Some(RelayToken::Nickname(s.to_string()))
    }

    /// Return true if this token matches a relay with the given identity
    /// and nickname.
    ///
    /// `is_named` must be true if the current consensus binds the relay's
    /// nickname to its identity.
    pub fn matches(&self, identity: &RsaIdentity, nickname: Option<&str>, is_named: bool) -> bool {
        match self {
            RelayToken::Nickname(name) => {
                nickname.is_some_and(|n| n.eq_ignore_ascii_case(name))
            }
            RelayToken::Id(id) => id == identity,
            RelayToken::IdWithNickname {
                id,
                nickname: name,
                must_be_named,
            } => {
                if id != identity {
                    return false;
                }
                match nickname {
                    Some(n) if n.eq_ignore_ascii_case(name) => !must_be_named || is_named,
                    _ => false,
                }
            }
        }
    }
}

/// Return true if `name` is a plausible relay nickname.
fn nickname_ok(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_NICKNAME_LEN
        && name.bytes().all(|b| b.is_ascii_alphanumeric())
}

/// An operator-configured set of relays, as used for `EntryNodes`,
/// `ExitNodes`, excluded exits, and declared node families.
///
/// Only the token forms are supported here; matching by country or
/// address mask is the policy layer's business.
#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize)]
#[serde(try_from = "Vec<String>")]
pub struct RouterSet {
    /// The parsed member tokens.
    tokens: Vec<RelayToken>,
}

impl RouterSet {
    /// Return a new empty set.
    pub fn new() -> Self {
        RouterSet::default()
    }
    /// Return true if this set has no members.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
    /// Return the member tokens of this set.
    pub fn tokens(&self) -> &[RelayToken] {
        &self.tokens[..]
    }
    /// Return true if any token in this set matches a relay with the
    /// given identity and nickname.
    pub fn contains(&self, identity: &RsaIdentity, nickname: Option<&str>, is_named: bool) -> bool {
        self.tokens
            .iter()
            .any(|t| t.matches(identity, nickname, is_named))
    }
}

impl FromStr for RouterSet {
    type Err = crate::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut tokens = Vec::new();
        for item in s.split(|c: char| c == ',' || c.is_whitespace()) {
            if item.is_empty() {
                continue;
            }
            tokens.push(RelayToken::parse(item).ok_or(crate::Error::BadSyntax("relay token"))?);
        }
        Ok(RouterSet { tokens })
    }
}

impl TryFrom<Vec<String>> for RouterSet {
    type Error = crate::Error;
    fn try_from(items: Vec<String>) -> Result<Self, Self::Error> {
        let mut tokens = Vec::new();
        for item in items {
            tokens.push(RelayToken::parse(&item).ok_or(crate::Error::BadSyntax("relay token"))?);
        }
        Ok(RouterSet { tokens })
    }
}

#[cfg(test)]
mod test {
    #![allow(clippy::unwrap_used)]
    use super::*;

    /// Hex string for the identity `[0x11; 20]`.
    const HEX_17: &str = "1111111111111111111111111111111111111111";

    #[test]
    fn parse_forms() {
        let id: RsaIdentity = [0x11; 20].into();
        assert_eq!(RelayToken::parse("fred"), Some(RelayToken::Nickname("fred".into())));
        assert_eq!(RelayToken::parse(HEX_17), Some(RelayToken::Id(id)));
        assert_eq!(
            RelayToken::parse(&format!("${}", HEX_17)),
            Some(RelayToken::Id(id))
        );
        assert_eq!(
            RelayToken::parse(&format!("${}=fred", HEX_17)),
            Some(RelayToken::IdWithNickname {
                id,
                nickname: "fred".into(),
                must_be_named: true
            })
        );
        assert_eq!(
            RelayToken::parse(&format!("${}~fred", HEX_17)),
            Some(RelayToken::IdWithNickname {
                id,
                nickname: "fred".into(),
                must_be_named: false
            })
        );
        assert_eq!(RelayToken::parse(""), None);
        assert_eq!(RelayToken::parse("$zeke"), None);
        assert_eq!(RelayToken::parse(&format!("${}!fred", HEX_17)), None);
        assert_eq!(RelayToken::parse("much-too-long-for-a-nickname"), None);
    }

    #[test]
    fn token_matching() {
        let id: RsaIdentity = [0x11; 20].into();
        let other: RsaIdentity = [0x22; 20].into();

        let tok = RelayToken::parse("fred").unwrap();
        assert!(tok.matches(&id, Some("FRED"), false));
        assert!(!tok.matches(&id, Some("frederick"), false));
        assert!(!tok.matches(&id, None, false));

        let tok = RelayToken::parse(&format!("${}", HEX_17)).unwrap();
        assert!(tok.matches(&id, None, false));
        assert!(!tok.matches(&other, Some("fred"), true));

        let tok = RelayToken::parse(&format!("${}=fred", HEX_17)).unwrap();
        assert!(tok.matches(&id, Some("fred"), true));
        assert!(!tok.matches(&id, Some("fred"), false));

        let tok = RelayToken::parse(&format!("${}~fred", HEX_17)).unwrap();
        assert!(tok.matches(&id, Some("fred"), false));
        assert!(!tok.matches(&id, Some("bob"), false));
    }

    #[test]
    fn set_parsing() {
        let set: RouterSet = format!("fred, ${}  barney", HEX_17).parse().unwrap();
        assert_eq!(set.tokens().len(), 3);
        assert!(set.contains(&[0x11; 20].into(), None, false));
        assert!(set.contains(&[9; 20].into(), Some("Barney"), false));
        assert!(!set.contains(&[9; 20].into(), Some("wilma"), false));
        assert!("not a nickname!!".parse::<RouterSet>().is_err());
        assert!(RouterSet::new().is_empty());
    }

    #[test]
    fn set_deserialize() {
        let set: RouterSet =
            serde_json::from_str(&format!(r#"["fred", "${}"]"#, HEX_17)).unwrap();
        assert_eq!(set.tokens().len(), 2);
        assert!(serde_json::from_str::<RouterSet>(r#"["!!"]"#).is_err());
    }
}
