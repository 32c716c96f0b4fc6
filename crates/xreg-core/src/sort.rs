//! Sort parameter parsing and comparator construction (spec §4.3).

use std::cmp::Ordering;

use thiserror::Error;

use crate::attr::{Filterable, Sortable};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub attribute: String,
    pub direction: SortDirection,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unparseable sort expression '{0}'")]
pub struct SortParseError(pub String);

/// Parse a single `sort` query parameter: `attribute[=asc|=desc]`.
pub fn parse_sort(value: &str) -> Result<SortSpec, SortParseError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(SortParseError(value.to_string()));
    }
    let (attribute, direction) = match value.split_once('=') {
        Some((attr, dir)) => {
            let direction = match dir.to_lowercase().as_str() {
                "asc" => SortDirection::Asc,
                "desc" => SortDirection::Desc,
                _ => return Err(SortParseError(value.to_string())),
            };
            (attr.trim().to_string(), direction)
        }
        None => (value.to_string(), SortDirection::Asc),
    };
    if attribute.is_empty() {
        return Err(SortParseError(value.to_string()));
    }
    Ok(SortSpec {
        attribute,
        direction,
    })
}

/// Compare two items by the sort spec, falling back to ascending `xid` for
/// ties (spec §4.3 and §8 invariant 5).
pub fn compare<T: Filterable + Sortable>(a: &T, b: &T, spec: &SortSpec) -> Ordering {
    let attr_a = a.attr(&spec.attribute);
    let attr_b = b.attr(&spec.attribute);
    let ordering = match (attr_a, attr_b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => {
            let numeric = x.as_number().zip(y.as_number());
            if let Some((nx, ny)) = numeric {
                nx.partial_cmp(&ny).unwrap_or(Ordering::Equal)
            } else {
                x.as_display_string()
                    .to_lowercase()
                    .cmp(&y.as_display_string().to_lowercase())
            }
        }
    };
    let directed = match spec.direction {
        SortDirection::Asc => ordering,
        SortDirection::Desc => ordering.reverse(),
    };
    if directed == Ordering::Equal {
        a.xid().cmp(b.xid())
    } else {
        directed
    }
}

/// Sort items in place per `spec`, or leave input order (already
/// lexicographic by name from the name-index phase) when `spec` is absent.
pub fn sort_items<T: Filterable + Sortable>(items: &mut [T], spec: Option<&SortSpec>) {
    if let Some(spec) = spec {
        items.sort_by(|a, b| compare(a, b, spec));
    } else {
        items.sort_by(|a, b| a.xid().cmp(b.xid()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attr::AttrValue;
    use crate::xid::Xid;

    struct Item {
        xid: Xid,
        name: &'static str,
    }
    impl Filterable for Item {
        fn attr(&self, path: &str) -> Option<AttrValue> {
            match path {
                "name" => Some(AttrValue::Str(self.name.to_string())),
                _ => None,
            }
        }
    }
    impl Sortable for Item {
        fn xid(&self) -> &Xid {
            &self.xid
        }
    }

    #[test]
    fn default_direction_is_ascending() {
        let spec = parse_sort("name").unwrap();
        assert_eq!(spec.direction, SortDirection::Asc);
    }

    #[test]
    fn explicit_descending() {
        let spec = parse_sort("name=desc").unwrap();
        assert_eq!(spec.direction, SortDirection::Desc);
    }

    #[test]
    fn rejects_bad_direction() {
        assert!(parse_sort("name=sideways").is_err());
    }

    #[test]
    fn ties_break_by_xid_ascending() {
        let mut items = vec![
            Item {
                xid: Xid::parse("/packages/b").unwrap(),
                name: "same",
            },
            Item {
                xid: Xid::parse("/packages/a").unwrap(),
                name: "same",
            },
        ];
        let spec = parse_sort("name").unwrap();
        sort_items(&mut items, Some(&spec));
        assert_eq!(items[0].xid.as_str(), "/packages/a");
        assert_eq!(items[1].xid.as_str(), "/packages/b");
    }
}
