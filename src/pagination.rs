//! Limit/offset pagination with JSON:API top-level links
//!
//! [`LimitOffsetPagination`] slices a collection by the `page[limit]` and
//! `page[offset]` query parameters and derives the `self`/`next`/`prev`/
//! `last` links from the request URL. Links are rebuilt from the request
//! URL itself, so unrelated query parameters survive untouched.

use serde::Serialize;
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Query parameter naming the page size.
pub const LIMIT_PARAM: &str = "page[limit]";
/// Query parameter naming the slice start.
pub const OFFSET_PARAM: &str = "page[offset]";

#[derive(Debug, Error)]
pub enum PaginationError {
	#[error("invalid request url: {0}")]
	Url(#[from] url::ParseError),
}

/// Top-level `links` member of a paginated collection document.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PaginationLinks {
	#[serde(rename = "self")]
	pub self_link: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub next: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub prev: Option<String>,
	pub last: String,
}

/// One page of a sliced collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<'a, T> {
	pub items: &'a [T],
	pub links: PaginationLinks,
	pub count: usize,
	pub limit: usize,
	pub offset: usize,
}

/// Limit/offset pagination strategy.
///
/// # Examples
///
/// ```
/// use jsonapi_serializers::pagination::LimitOffsetPagination;
///
/// let pagination = LimitOffsetPagination::new(5);
/// let items: Vec<i64> = (0..12).collect();
/// let page = pagination
///     .paginate(&items, "https://api.test/cities/?page[offset]=5")
///     .unwrap();
/// assert_eq!(page.items, &[5, 6, 7, 8, 9]);
/// assert_eq!(page.links.last, "https://api.test/cities/?page[offset]=10");
/// ```
#[derive(Debug, Clone)]
pub struct LimitOffsetPagination {
	default_limit: usize,
	max_limit: Option<usize>,
}

impl LimitOffsetPagination {
	pub fn new(default_limit: usize) -> Self {
		Self {
			default_limit,
			max_limit: None,
		}
	}

	/// Cap client-supplied limits at `max_limit`.
	pub fn with_max_limit(mut self, max_limit: usize) -> Self {
		self.max_limit = Some(max_limit);
		self
	}

	/// Slice `items` according to the request URL's page parameters.
	///
	/// A missing or non-positive `page[limit]` falls back to the default;
	/// a missing or malformed `page[offset]` is treated as zero. An offset
	/// past the end yields an empty page, not an error.
	pub fn paginate<'a, T>(
		&self,
		items: &'a [T],
		request_url: &str,
	) -> Result<Page<'a, T>, PaginationError> {
		let url = Url::parse(request_url)?;
		let count = items.len();
		let limit = self.requested_limit(&url);
		let offset = requested_offset(&url);

		let start = offset.min(count);
		let end = offset.saturating_add(limit).min(count);
		debug!(count, limit, offset, "paginated collection");

		let links = self.build_links(&url, count, limit, offset);
		Ok(Page {
			items: &items[start..end],
			links,
			count,
			limit,
			offset,
		})
	}

	fn requested_limit(&self, url: &Url) -> usize {
		let requested = query_param(url, LIMIT_PARAM)
			.and_then(|raw| raw.parse::<i64>().ok())
			.filter(|limit| *limit > 0)
			.map(|limit| limit as usize)
			.unwrap_or(self.default_limit);
		match self.max_limit {
			Some(max) => requested.min(max),
			None => requested,
		}
	}

	fn build_links(&self, url: &Url, count: usize, limit: usize, offset: usize) -> PaginationLinks {
		let next = match offset.checked_add(limit) {
			Some(next_offset) if next_offset < count => {
				Some(with_offset(url, Some(next_offset), limit, self.default_limit))
			}
			_ => None,
		};
		let prev = if offset > 0 {
			let prev_offset = offset.saturating_sub(limit);
			let param = if prev_offset > 0 { Some(prev_offset) } else { None };
			Some(with_offset(url, param, limit, self.default_limit))
		} else {
			None
		};
		// Offset of the last page: the greatest multiple of `limit` below
		// `count`, or `count` itself when it divides evenly.
		let last_offset = if limit > 0 { count / limit * limit } else { 0 };
		let last = with_offset(url, Some(last_offset), limit, self.default_limit);
		PaginationLinks {
			self_link: unescape_brackets(url.as_str()),
			next,
			prev,
			last,
		}
	}
}

fn requested_offset(url: &Url) -> usize {
	query_param(url, OFFSET_PARAM)
		.and_then(|raw| raw.parse::<i64>().ok())
		.filter(|offset| *offset >= 0)
		.map(|offset| offset as usize)
		.unwrap_or(0)
}

fn query_param(url: &Url, name: &str) -> Option<String> {
	url.query_pairs()
		.find(|(key, _)| key == name)
		.map(|(_, value)| value.into_owned())
}

/// Rebuild the request URL with the given page parameters. The offset is
/// dropped entirely when pointing at the first page, and the limit is
/// dropped when it equals the default, so links stay canonical.
fn with_offset(url: &Url, offset: Option<usize>, limit: usize, default_limit: usize) -> String {
	let mut rebuilt = url.clone();
	{
		let pairs: Vec<(String, String)> = url
			.query_pairs()
			.filter(|(key, _)| key != LIMIT_PARAM && key != OFFSET_PARAM)
			.map(|(key, value)| (key.into_owned(), value.into_owned()))
			.collect();
		let mut query = rebuilt.query_pairs_mut();
		query.clear();
		for (key, value) in &pairs {
			query.append_pair(key, value);
		}
		if limit != default_limit {
			query.append_pair(LIMIT_PARAM, &limit.to_string());
		}
		if let Some(offset) = offset {
			query.append_pair(OFFSET_PARAM, &offset.to_string());
		}
	}
	if rebuilt.query() == Some("") {
		rebuilt.set_query(None);
	}
	unescape_brackets(rebuilt.as_str())
}

/// `Url` percent-encodes `[` and `]`; the wire format keeps them literal.
fn unescape_brackets(url: &str) -> String {
	url.replace("%5B", "[").replace("%5D", "]")
}
