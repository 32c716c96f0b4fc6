//! `inline` parameter parsing (spec §4.3). The expansion itself — attaching
//! nested collections to a parent entity's JSON body — is wired by
//! `xreg-adapter` since it needs access to concrete child collections; this
//! module is the shared, adapter-agnostic parsing/decision logic.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InlineSpec {
    /// No `inline` parameter supplied.
    None,
    /// `inline=*` — all nested collections, to the default depth.
    All,
    /// A comma-separated list of attribute names, e.g. `inline=versions,meta`.
    Names(Vec<String>),
}

/// Parse the `inline` query parameter. An integer value is accepted as a
/// depth override applied uniformly (spec §4.3); this parser reports it
/// alongside the name/`*` selection rather than folding it in, since depth
/// and selection are independent axes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inline {
    pub spec: InlineSpec,
    pub depth: u32,
}

pub const DEFAULT_INLINE_DEPTH: u32 = 1;

pub fn parse_inline(raw: Option<&str>) -> Inline {
    let Some(raw) = raw else {
        return Inline {
            spec: InlineSpec::None,
            depth: DEFAULT_INLINE_DEPTH,
        };
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return Inline {
            spec: InlineSpec::None,
            depth: DEFAULT_INLINE_DEPTH,
        };
    }
    if raw == "*" {
        return Inline {
            spec: InlineSpec::All,
            depth: DEFAULT_INLINE_DEPTH,
        };
    }
    if let Ok(depth) = raw.parse::<u32>() {
        return Inline {
            spec: InlineSpec::All,
            depth,
        };
    }
    let names = raw
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    Inline {
        spec: InlineSpec::Names(names),
        depth: DEFAULT_INLINE_DEPTH,
    }
}

impl Inline {
    /// Whether `name` should be inlined. Unrecognized inline names are
    /// silently ignored by the caller (it simply never asks about a name it
    /// doesn't expose), so this only needs to answer for names the caller
    /// actually supports.
    pub fn wants(&self, name: &str) -> bool {
        match &self.spec {
            InlineSpec::None => false,
            InlineSpec::All => true,
            InlineSpec::Names(names) => names.iter().any(|n| n == name || n == "*"),
        }
    }

    pub fn is_active(&self) -> bool {
        !matches!(self.spec, InlineSpec::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_param_means_none() {
        assert_eq!(parse_inline(None).spec, InlineSpec::None);
    }

    #[test]
    fn star_means_all() {
        assert_eq!(parse_inline(Some("*")).spec, InlineSpec::All);
    }

    #[test]
    fn integer_is_depth_with_all_selection() {
        let inline = parse_inline(Some("2"));
        assert_eq!(inline.spec, InlineSpec::All);
        assert_eq!(inline.depth, 2);
    }

    #[test]
    fn comma_list_of_names() {
        let inline = parse_inline(Some("versions,meta"));
        assert!(inline.wants("versions"));
        assert!(inline.wants("meta"));
        assert!(!inline.wants("labels"));
    }

    #[test]
    fn default_depth_is_one() {
        assert_eq!(parse_inline(Some("versions")).depth, DEFAULT_INLINE_DEPTH);
    }
}
