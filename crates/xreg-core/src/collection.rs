//! The public `applyCollection` contract (spec §4.3): the single pure
//! function every collection endpoint calls to filter, sort, paginate, and
//! build `Link` headers.

use crate::attr::{Filterable, Sortable};
use crate::filter::{self, FilterParseError, OrBranch};
use crate::pagination::{self, PageRequest};
use crate::problem::{ProblemDetails, ProblemKind};
use crate::sort::{self, SortParseError, SortSpec};

#[derive(Debug, Clone, Default)]
pub struct CollectionRequest {
    /// Raw `filter` query values, one per repetition of the parameter.
    pub filters: Vec<String>,
    pub sort: Option<String>,
    pub limit: Option<u64>,
    pub offset: u64,
    /// `?epoch=` query parameter (spec §6): when set, only entities whose
    /// `epoch` equals this value survive the attribute phase.
    pub epoch: Option<u64>,
    /// Path (plus any non-pagination query params) used as the base for
    /// `Link` header construction and as the problem-details `instance`.
    pub instance: String,
}

#[derive(Debug, Clone)]
pub struct CollectionOptions {
    pub max_limit: u64,
    /// Whether this adapter is name-indexed and therefore requires at least
    /// one filter branch to constrain `name` (spec §4.3 mandatory name
    /// constraint).
    pub requires_name_constraint: bool,
}

impl Default for CollectionOptions {
    fn default() -> Self {
        CollectionOptions {
            max_limit: 100,
            requires_name_constraint: false,
        }
    }
}

pub struct CollectionResult<T> {
    pub page: Vec<T>,
    pub total: usize,
    pub link_header: Option<String>,
    /// Set when the mandatory name constraint was missing; callers should
    /// surface this as the optional `X-xRegistry-Notice` header (spec §7).
    pub notice: Option<String>,
}

const MISSING_NAME_NOTICE: &str =
    "no filter constrained the 'name' attribute; returning an empty collection to avoid an unbounded index scan";

/// Parse every `filter=` value into its OR-branch list, surfacing the first
/// parse failure as a `bad-request` problem per spec §7.
fn parse_branches(
    values: &[String],
    instance: &str,
) -> Result<Vec<OrBranch>, ProblemDetails> {
    values
        .iter()
        .map(|v| filter::parse_filter_value(v))
        .collect::<Result<Vec<_>, FilterParseError>>()
        .map_err(|e| {
            ProblemDetails::new(
                ProblemKind::BadRequest,
                format!("unparseable filter expression at offset {}", e.offset),
                instance,
            )
        })
}

fn parse_sort_spec(raw: Option<&str>, instance: &str) -> Result<Option<SortSpec>, ProblemDetails> {
    match raw {
        None => Ok(None),
        Some(v) => sort::parse_sort(v).map(Some).map_err(|SortParseError(bad)| {
            ProblemDetails::new(
                ProblemKind::BadRequest,
                format!("unparseable sort expression '{bad}'"),
                instance,
            )
        }),
    }
}

/// Apply filter, sort, and pagination to `items`, returning the page plus
/// `Link` header and total count. This is the one function every adapter's
/// collection handler calls.
pub fn apply_collection<T: Filterable + Sortable + Clone>(
    items: Vec<T>,
    req: &CollectionRequest,
    opts: &CollectionOptions,
) -> Result<CollectionResult<T>, ProblemDetails> {
    let branches = parse_branches(&req.filters, &req.instance)?;
    let sort_spec = parse_sort_spec(req.sort.as_deref(), &req.instance)?;

    if opts.requires_name_constraint
        && !branches.iter().any(filter::branch_constrains_name)
    {
        return Ok(CollectionResult {
            page: Vec::new(),
            total: 0,
            link_header: None,
            notice: Some(MISSING_NAME_NOTICE.to_string()),
        });
    }

    let mut filtered: Vec<T> = items
        .into_iter()
        .filter(|item| filter::eval_branches(&branches, item))
        .filter(|item| match req.epoch {
            None => true,
            Some(wanted) => item
                .attr("epoch")
                .and_then(|a| a.as_number())
                .map(|n| n as u64 == wanted)
                .unwrap_or(false),
        })
        .collect();

    sort::sort_items(&mut filtered, sort_spec.as_ref());

    let limit = req.limit.map(|l| l.min(opts.max_limit));
    let page_req = PageRequest {
        limit,
        offset: req.offset,
    };
    let bounds = pagination::slice_bounds(filtered.len(), &page_req);
    let total = filtered.len();
    let page: Vec<T> = filtered[bounds.start..bounds.end].to_vec();
    let link_header = pagination::build_link_header(&req.instance, &page_req, total);

    Ok(CollectionResult {
        page,
        total,
        link_header,
        notice: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attr::AttrValue;
    use crate::xid::Xid;

    #[derive(Clone)]
    struct Item {
        xid: Xid,
        name: String,
        epoch: u64,
    }
    impl Filterable for Item {
        fn attr(&self, path: &str) -> Option<AttrValue> {
            match path {
                "name" => Some(AttrValue::Str(self.name.clone())),
                "epoch" => Some(AttrValue::Number(self.epoch as f64)),
                _ => None,
            }
        }
    }
    impl Sortable for Item {
        fn xid(&self) -> &Xid {
            &self.xid
        }
    }

    fn item(name: &str) -> Item {
        Item {
            xid: Xid::parse(format!("/packages/{name}")).unwrap(),
            name: name.to_string(),
            epoch: 1,
        }
    }

    #[test]
    fn s2_wildcard_or_filter() {
        let items = vec![
            item("express"),
            item("expressive"),
            item("fastify"),
            item("react"),
        ];
        let req = CollectionRequest {
            filters: vec!["name=express*".into(), "name=fastify".into()],
            instance: "/noderegistries/npmjs.org/packages".into(),
            ..Default::default()
        };
        let opts = CollectionOptions {
            requires_name_constraint: true,
            ..Default::default()
        };
        let result = apply_collection(items, &req, &opts).unwrap();
        let names: Vec<&str> = result.page.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["express", "expressive", "fastify"]);
    }

    #[test]
    fn s4_missing_name_filter_is_empty_not_error() {
        let items = vec![item("express")];
        let req = CollectionRequest {
            filters: vec!["description=foo".into()],
            instance: "/pythonregistries/pypi.org/packages".into(),
            ..Default::default()
        };
        let opts = CollectionOptions {
            requires_name_constraint: true,
            ..Default::default()
        };
        let result = apply_collection(items, &req, &opts).unwrap();
        assert_eq!(result.total, 0);
        assert!(result.page.is_empty());
        assert!(result.link_header.is_none());
        assert!(result.notice.is_some());
    }

    #[test]
    fn wildcard_name_only_is_nonempty_and_not_an_error() {
        let items = vec![item("express"), item("fastify")];
        let req = CollectionRequest {
            filters: vec!["name=*".into()],
            instance: "/x".into(),
            ..Default::default()
        };
        let opts = CollectionOptions {
            requires_name_constraint: true,
            ..Default::default()
        };
        let result = apply_collection(items, &req, &opts).unwrap();
        assert_eq!(result.total, 2);
    }

    #[test]
    fn s3_pagination_totals() {
        let items: Vec<Item> = (0..125).map(|i| item(&format!("pkg{i:03}"))).collect();
        let req = CollectionRequest {
            filters: vec!["name=pkg*".into()],
            instance: "/packages".into(),
            limit: Some(50),
            offset: 50,
            ..Default::default()
        };
        let opts = CollectionOptions {
            requires_name_constraint: true,
            ..Default::default()
        };
        let result = apply_collection(items, &req, &opts).unwrap();
        assert_eq!(result.page.len(), 50);
        assert_eq!(result.total, 125);
        assert!(result.link_header.unwrap().contains("rel=\"last\""));
    }

    #[test]
    fn epoch_param_filters_to_matching_entities_only() {
        let mut items = vec![item("express"), item("fastify")];
        items[1].epoch = 2;
        let req = CollectionRequest {
            filters: vec!["name=express".into(), "name=fastify".into()],
            instance: "/packages".into(),
            epoch: Some(2),
            ..Default::default()
        };
        let result = apply_collection(items, &req, &CollectionOptions::default()).unwrap();
        assert_eq!(result.total, 1);
        assert_eq!(result.page[0].name, "fastify");
    }

    #[test]
    fn bad_request_on_unparseable_filter() {
        let req = CollectionRequest {
            filters: vec!["<<invalid>>".into()],
            instance: "/noderegistries/npmjs.org/packages".into(),
            ..Default::default()
        };
        let err = apply_collection(Vec::<Item>::new(), &req, &CollectionOptions::default())
            .unwrap_err();
        assert_eq!(err.kind(), ProblemKind::BadRequest);
        assert_eq!(err.instance, "/noderegistries/npmjs.org/packages");
    }
}
