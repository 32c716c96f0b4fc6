//! Offset/limit pagination and RFC 5988 `Link` header construction
//! (spec §4.3).

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: Option<u64>,
    pub offset: u64,
}

impl Default for PageRequest {
    fn default() -> Self {
        PageRequest {
            limit: None,
            offset: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageResult {
    pub start: usize,
    pub end: usize,
    pub total: usize,
}

/// Slice `[offset, offset+limit)` out of an already-sorted, already-filtered
/// set of `total` items. An out-of-range offset yields an empty page, not an
/// error (spec §4.3, §8 boundary behaviors).
pub fn slice_bounds(total: usize, req: &PageRequest) -> PageResult {
    let offset = req.offset as usize;
    if offset >= total {
        return PageResult {
            start: total,
            end: total,
            total,
        };
    }
    let end = match req.limit {
        Some(limit) => (offset + limit as usize).min(total),
        None => total,
    };
    PageResult {
        start: offset,
        end,
        total,
    }
}

/// Build the RFC 5988 `Link` header value for a page, or `None` when no
/// `limit` was supplied (spec §4.3: "If limit is absent, no pagination
/// links are emitted").
pub fn build_link_header(base_path_and_query: &str, req: &PageRequest, total: usize) -> Option<String> {
    let limit = req.limit?;
    let offset = req.offset;
    let mut links = Vec::new();

    let link_for = |offset: u64| -> String {
        replace_or_append_params(base_path_and_query, offset, limit)
    };

    links.push(format!(
        "<{}>; rel=\"first\"; count={total}",
        link_for(0)
    ));

    if offset > 0 {
        let prev_offset = offset.saturating_sub(limit);
        links.push(format!(
            "<{}>; rel=\"prev\"; count={total}",
            link_for(prev_offset)
        ));
    }

    let next_offset = offset + limit;
    if (next_offset as usize) < total {
        links.push(format!(
            "<{}>; rel=\"next\"; count={total}",
            link_for(next_offset)
        ));
    }

    let last_offset = last_page_offset(total, limit);
    links.push(format!(
        "<{}>; rel=\"last\"; count={total}",
        link_for(last_offset)
    ));

    Some(links.join(", "))
}

fn last_page_offset(total: usize, limit: u64) -> u64 {
    if total == 0 || limit == 0 {
        return 0;
    }
    let limit = limit as usize;
    let pages = (total - 1) / limit;
    (pages * limit) as u64
}

fn replace_or_append_params(base: &str, offset: u64, limit: u64) -> String {
    let (path, query) = match base.split_once('?') {
        Some((p, q)) => (p.to_string(), q.to_string()),
        None => (base.to_string(), String::new()),
    };
    let mut kept: Vec<String> = query
        .split('&')
        .filter(|kv| !kv.is_empty() && !kv.starts_with("offset=") && !kv.starts_with("limit="))
        .map(|s| s.to_string())
        .collect();
    kept.push(format!("limit={limit}"));
    kept.push(format!("offset={offset}"));
    format!("{path}?{}", kept.join("&"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_beyond_total_is_empty_page() {
        let page = slice_bounds(10, &PageRequest { limit: Some(5), offset: 100 });
        assert_eq!(page.start, page.end);
    }

    #[test]
    fn no_limit_returns_everything() {
        let page = slice_bounds(10, &PageRequest { limit: None, offset: 0 });
        assert_eq!((page.start, page.end), (0, 10));
    }

    #[test]
    fn no_limit_emits_no_link_header() {
        assert!(build_link_header("/packages", &PageRequest { limit: None, offset: 0 }, 10).is_none());
    }

    #[test]
    fn s3_pagination_link_set() {
        let req = PageRequest {
            limit: Some(50),
            offset: 50,
        };
        let page = slice_bounds(125, &req);
        assert_eq!(page.end - page.start, 50);
        let link = build_link_header("/packages", &req, 125).unwrap();
        assert!(link.contains("rel=\"first\""));
        assert!(link.contains("rel=\"prev\""));
        assert!(link.contains("rel=\"next\""));
        assert!(link.contains("rel=\"last\""));
        assert!(link.contains("offset=100"));
        for rel_link in link.split(", ") {
            assert!(rel_link.contains("count=125"));
        }
    }

    #[test]
    fn first_page_omits_prev() {
        let req = PageRequest { limit: Some(50), offset: 0 };
        let link = build_link_header("/packages", &req, 125).unwrap();
        assert!(!link.contains("rel=\"prev\""));
        assert!(link.contains("rel=\"next\""));
    }

    #[test]
    fn last_page_omits_next() {
        let req = PageRequest { limit: Some(50), offset: 100 };
        let link = build_link_header("/packages", &req, 125).unwrap();
        assert!(!link.contains("rel=\"next\""));
        assert!(link.contains("rel=\"prev\""));
    }
}
