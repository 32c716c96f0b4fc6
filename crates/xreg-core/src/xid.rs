//! `xid` path identities and the `self` URLs derived from them.
//!
//! An xid is the path of an entity relative to the registry root. It always
//! begins with `/`; joining a base URL with an xid yields the entity's
//! `self` link (see spec §3 invariant 1).

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Characters allowed in an xid path segment, per spec §4.1.
fn is_allowed_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '~' | ':' | '@' | '-')
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidEntity {
    #[error("id '{0}' contains characters outside [A-Za-z0-9._~:@-]")]
    IllegalIdCharacters(String),
    #[error("xid '{0}' must start with '/'")]
    MissingLeadingSlash(String),
}

/// A validated xid: `/`-rooted path identity of an entity within a registry.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Xid(String);

impl Xid {
    /// The registry root xid, `/`.
    pub fn root() -> Self {
        Xid("/".to_string())
    }

    /// Construct an xid from an already-composed path. Validates the
    /// leading slash and every path segment's character set.
    pub fn parse(path: impl Into<String>) -> Result<Self, InvalidEntity> {
        let path = path.into();
        if !path.starts_with('/') {
            return Err(InvalidEntity::MissingLeadingSlash(path));
        }
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            validate_id_segment(segment)?;
        }
        Ok(Xid(path))
    }

    /// Append one path segment (an entity id) to a parent xid.
    pub fn child(parent: &Xid, segment: &str) -> Result<Self, InvalidEntity> {
        validate_id_segment(segment)?;
        let mut path = parent.0.clone();
        if !path.ends_with('/') {
            path.push('/');
        }
        path.push_str(segment);
        Ok(Xid(path))
    }

    /// Append a literal, already-validated static path component (e.g.
    /// `"versions"`, `"meta"`) that is not itself an entity id.
    pub fn child_literal(parent: &Xid, literal: &str) -> Self {
        let mut path = parent.0.clone();
        if !path.ends_with('/') {
            path.push('/');
        }
        path.push_str(literal);
        Xid(path)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Xid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn validate_id_segment(segment: &str) -> Result<(), InvalidEntity> {
    if segment.is_empty() || !segment.chars().all(is_allowed_char) {
        return Err(InvalidEntity::IllegalIdCharacters(segment.to_string()));
    }
    Ok(())
}

/// Builds an absolute `self` URL by joining a base URL with an xid.
pub fn self_url(base_url: &str, xid: &Xid) -> String {
    let base = base_url.trim_end_matches('/');
    if xid.as_str() == "/" {
        return base.to_string();
    }
    format!("{base}{}", xid.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_is_slash() {
        assert_eq!(Xid::root().as_str(), "/");
    }

    #[test]
    fn rejects_missing_leading_slash() {
        assert!(matches!(
            Xid::parse("noderegistries"),
            Err(InvalidEntity::MissingLeadingSlash(_))
        ));
    }

    #[test]
    fn rejects_illegal_characters() {
        let root = Xid::root();
        assert!(Xid::child(&root, "bad id!").is_err());
        assert!(Xid::child(&root, "@scope/pkg").is_err());
    }

    #[test]
    fn child_appends_segment() {
        let root = Xid::root();
        let groups = Xid::child(&root, "noderegistries").unwrap();
        assert_eq!(groups.as_str(), "/noderegistries");
        let group = Xid::child(&groups, "npmjs.org").unwrap();
        assert_eq!(group.as_str(), "/noderegistries/npmjs.org");
    }

    #[test]
    fn self_url_joins_base_and_xid() {
        let xid = Xid::parse("/noderegistries/npmjs.org").unwrap();
        assert_eq!(
            self_url("https://bridge.example.com/", &xid),
            "https://bridge.example.com/noderegistries/npmjs.org"
        );
    }

    #[test]
    fn self_url_root_is_bare_base() {
        assert_eq!(self_url("https://bridge.example.com", &Xid::root()), "https://bridge.example.com");
    }
}
