//! Pagination for Jira collection endpoints.
//!
//! Jira exposes two pagination protocols. Older endpoints address pages by
//! a numeric `startAt` offset and report the total count upfront; the
//! current search endpoints instead return an opaque `nextPageToken`
//! cursor with each page. The offset address space is stable, which
//! permits fetching the remaining pages concurrently once the total is
//! known. A token cursor depends on the previous response, so token-based
//! searches are strictly sequential; do not parallelize them.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::stream::{self, StreamExt};
use serde::Deserialize;

use crate::error::{JiraError, Result};

/// Default page size when a request does not specify one.
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Concurrent page fetches for offset-based searches.
const PARALLEL_PAGE_FETCHES: usize = 3;

/// A page of results from an offset-paginated endpoint.
///
/// Depending on the endpoint the items arrive under `issues` or `values`;
/// [`OffsetPage::items`] hides the difference. `isLast` is not always
/// present on these responses, so it is inferred from `total`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OffsetPage<T> {
    /// Total number of items across all pages.
    #[serde(default)]
    pub total: u64,
    /// Page size the server actually applied.
    #[serde(default)]
    pub max_results: u64,
    /// Index of the first item on this page.
    #[serde(default)]
    pub start_at: u64,
    #[serde(default)]
    issues: Option<Vec<T>>,
    #[serde(default)]
    values: Option<Vec<T>>,
}

impl<T> OffsetPage<T> {
    /// The items on this page.
    pub fn items(&self) -> &[T] {
        self.issues
            .as_deref()
            .or(self.values.as_deref())
            .unwrap_or(&[])
    }

    /// Consume the page, returning its items.
    #[must_use]
    pub fn into_items(self) -> Vec<T> {
        self.issues.or(self.values).unwrap_or_default()
    }

    /// Number of items on this page.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items().len()
    }

    /// Returns true if this page has no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items().is_empty()
    }

    /// Whether this page is the last one, inferred from `total`.
    #[must_use]
    pub fn is_last(&self) -> bool {
        self.start_at + self.len() as u64 >= self.total
    }
}

/// A page of results from a token-paginated endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPage<T> {
    /// Whether the server declared this the last page. Authoritative when
    /// present; absent means "look at the token".
    #[serde(default)]
    pub is_last: bool,
    /// Cursor for the next page; absent or empty when no further pages
    /// exist.
    #[serde(default)]
    pub next_page_token: Option<String>,
    #[serde(default)]
    issues: Option<Vec<T>>,
    #[serde(default)]
    values: Option<Vec<T>>,
}

impl<T> TokenPage<T> {
    /// The items on this page.
    pub fn items(&self) -> &[T] {
        self.issues
            .as_deref()
            .or(self.values.as_deref())
            .unwrap_or(&[])
    }

    /// Consume the page, returning its items.
    #[must_use]
    pub fn into_items(self) -> Vec<T> {
        self.issues.or(self.values).unwrap_or_default()
    }
}

/// A search request that advances through token-paginated results.
///
/// Implementations own the immutable query (JQL, filters) and the mutable
/// pagination state that the engine updates between iterations.
pub trait TokenPagedRequest {
    /// Clamp the page size to `default` when unset or zero.
    fn normalize_page_size(&mut self, default: u32);

    /// Record the cursor returned by the previous page.
    ///
    /// # Errors
    ///
    /// Implementations that address pages numerically may fail when the
    /// server hands back a cursor they cannot interpret.
    fn apply_page_token(&mut self, token: &str) -> Result<()>;
}

/// Filtering and early-exit options for a search.
///
/// With no predicate every item is collected. With a predicate only
/// matching items are collected, and `first_match` additionally stops the
/// search as soon as one match is found.
pub struct SearchFilter<'a, T> {
    predicate: Option<Box<dyn Fn(&T) -> bool + Send + Sync + 'a>>,
    break_on_first_match: bool,
}

impl<'a, T> SearchFilter<'a, T> {
    /// Collect every item.
    #[must_use]
    pub fn all() -> Self {
        Self {
            predicate: None,
            break_on_first_match: false,
        }
    }

    /// Collect items matching `predicate`, visiting every page.
    pub fn matching(predicate: impl Fn(&T) -> bool + Send + Sync + 'a) -> Self {
        Self {
            predicate: Some(Box::new(predicate)),
            break_on_first_match: false,
        }
    }

    /// Collect items matching `predicate`, stopping at the first match.
    ///
    /// During a concurrent offset search, pages already in flight when the
    /// match lands may still contribute extra matching items to the
    /// result. This is inherent to the fan-out and callers must not rely
    /// on receiving exactly one item.
    pub fn first_match(predicate: impl Fn(&T) -> bool + Send + Sync + 'a) -> Self {
        Self {
            predicate: Some(Box::new(predicate)),
            break_on_first_match: true,
        }
    }

    fn matches(&self, item: &T) -> bool {
        self.predicate.as_ref().map_or(true, |p| p(item))
    }

    fn should_break(&self) -> bool {
        self.break_on_first_match && self.predicate.is_some()
    }
}

impl<T> Default for SearchFilter<'_, T> {
    fn default() -> Self {
        Self::all()
    }
}

/// Fetch all pages of a token-paginated search.
///
/// Runs `fetch` with the current request state, collects (optionally
/// filtered) items, and follows `nextPageToken` until the server declares
/// the last page or stops returning a token. Results preserve server
/// order. Any page failure aborts the whole search.
pub async fn search_all_paged<T, Q, F, Fut>(
    mut request: Q,
    mut fetch: F,
    filter: SearchFilter<'_, T>,
    default_page_size: u32,
) -> Result<Vec<T>>
where
    Q: TokenPagedRequest + Clone,
    F: FnMut(Q) -> Fut,
    Fut: Future<Output = Result<TokenPage<T>>>,
{
    let mut results = Vec::new();
    request.normalize_page_size(if default_page_size == 0 {
        DEFAULT_PAGE_SIZE
    } else {
        default_page_size
    });

    loop {
        let page = fetch(request.clone()).await?;
        let is_last = page.is_last;
        let token = page.next_page_token.clone();

        for item in page.into_items() {
            if filter.matches(&item) {
                results.push(item);
                if filter.should_break() {
                    return Ok(results);
                }
            }
        }

        match token {
            Some(token) if !is_last && !token.is_empty() => request.apply_page_token(&token)?,
            _ => break,
        }
    }

    Ok(results)
}

/// Fetch all pages of an offset-paginated search.
///
/// The first page is fetched synchronously; when it reports more items
/// than it carries, the remaining pages are fetched with a bounded
/// fan-out of [`PARALLEL_PAGE_FETCHES`] workers, each addressing its own
/// `startAt`. A shared cancellation flag stops workers from dispatching
/// new pages once an early-exit match is found; pages already in flight
/// still land, so early-exit results may carry extra items. First-page
/// order is preserved, the relative order of later pages is not.
///
/// `fetch` receives `(start_at, max_results)`.
pub async fn search_all_offset<T, F, Fut>(
    fetch: F,
    filter: SearchFilter<'_, T>,
    page_size: u32,
) -> Result<Vec<T>>
where
    F: Fn(u64, u32) -> Fut + Clone,
    Fut: Future<Output = Result<OffsetPage<T>>>,
{
    let page_size = if page_size == 0 {
        DEFAULT_PAGE_SIZE
    } else {
        page_size
    };

    let first = fetch(0, page_size).await?;
    let total = first.total;
    let first_len = first.len() as u64;
    // Prefer the page size the server actually applied when computing
    // offsets; it may cap the requested one.
    let size = if first.max_results > 0 {
        first.max_results
    } else {
        u64::from(page_size)
    };

    let mut collected = Vec::new();
    for item in first.into_items() {
        if filter.matches(&item) {
            collected.push(item);
            if filter.should_break() {
                return Ok(collected);
            }
        }
    }

    if total <= first_len {
        return Ok(collected);
    }

    let total_pages = total.div_ceil(size);
    let results = tokio::sync::Mutex::new(collected);
    let cancelled = AtomicBool::new(false);

    {
        let jobs = (1..total_pages).map(|page_index| {
            let fetch = fetch.clone();
            let results = &results;
            let cancelled = &cancelled;
            let filter = &filter;
            let start_at = page_index * size;
            async move {
                if cancelled.load(Ordering::Acquire) {
                    return Ok(());
                }
                tracing::debug!(
                    page = page_index,
                    total_pages,
                    start_at,
                    "fetching search page"
                );
                let page = fetch(start_at, size as u32).await?;

                let mut matched = Vec::new();
                for item in page.into_items() {
                    if filter.matches(&item) {
                        matched.push(item);
                    }
                }
                if !matched.is_empty() {
                    if filter.should_break() {
                        cancelled.store(true, Ordering::Release);
                    }
                    results.lock().await.append(&mut matched);
                }
                Ok::<(), JiraError>(())
            }
        });

        let mut pages = stream::iter(jobs).buffer_unordered(PARALLEL_PAGE_FETCHES);
        while let Some(outcome) = pages.next().await {
            outcome?;
        }
    }

    Ok(results.into_inner())
}

/// Count the results of an offset-paginated search without fetching them.
///
/// Requests a single item and returns the server-reported total.
pub async fn search_count<T, F, Fut>(fetch: F) -> Result<u64>
where
    F: FnOnce(u64, u32) -> Fut,
    Fut: Future<Output = Result<OffsetPage<T>>>,
{
    let page = fetch(0, 1).await?;
    Ok(page.total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    fn offset_page(total: u64, start_at: u64, items: Vec<u64>) -> OffsetPage<u64> {
        serde_json::from_value(json!({
            "total": total,
            "maxResults": 50,
            "startAt": start_at,
            "values": items,
        }))
        .unwrap()
    }

    #[test]
    fn test_offset_page_prefers_issues_over_values() {
        let page: OffsetPage<u64> = serde_json::from_value(json!({
            "total": 2,
            "issues": [1],
            "values": [2, 3],
        }))
        .unwrap();
        assert_eq!(page.items(), &[1]);
    }

    #[test]
    fn test_offset_page_is_last_inferred_from_total() {
        assert!(offset_page(3, 0, vec![1, 2, 3]).is_last());
        assert!(!offset_page(10, 0, vec![1, 2, 3]).is_last());
        assert!(offset_page(10, 7, vec![1, 2, 3]).is_last());
    }

    #[test]
    fn test_token_page_defaults() {
        let page: TokenPage<u64> = serde_json::from_value(json!({ "issues": [1, 2] })).unwrap();
        assert!(!page.is_last);
        assert!(page.next_page_token.is_none());
        assert_eq!(page.items(), &[1, 2]);
    }

    /// Offset fetcher serving a fixed dataset in pages, counting calls.
    fn dataset_fetch(
        total: u64,
        calls: Arc<AtomicUsize>,
    ) -> impl Fn(u64, u32) -> futures::future::Ready<Result<OffsetPage<u64>>> + Clone {
        move |start_at, max_results| {
            calls.fetch_add(1, Ordering::SeqCst);
            let end = (start_at + u64::from(max_results)).min(total);
            let items: Vec<u64> = (start_at..end).collect();
            futures::future::ready(Ok(offset_page(total, start_at, items)))
        }
    }

    #[tokio::test]
    async fn test_offset_single_page_fetches_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let results = search_all_offset(dataset_fetch(10, calls.clone()), SearchFilter::all(), 50)
            .await
            .unwrap();
        assert_eq!(results.len(), 10);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_offset_three_pages_cover_total() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut results =
            search_all_offset(dataset_fetch(120, calls.clone()), SearchFilter::all(), 50)
                .await
                .unwrap();
        // 1 synchronous first page + 2 parallel fetches
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(results.len(), 120);
        results.sort_unstable();
        assert_eq!(results, (0..120).collect::<Vec<u64>>());
    }

    #[tokio::test]
    async fn test_offset_first_page_order_is_preserved() {
        let calls = Arc::new(AtomicUsize::new(0));
        let results = search_all_offset(dataset_fetch(40, calls.clone()), SearchFilter::all(), 50)
            .await
            .unwrap();
        assert_eq!(results, (0..40).collect::<Vec<u64>>());
    }

    #[tokio::test]
    async fn test_offset_predicate_collects_all_matches() {
        let calls = Arc::new(AtomicUsize::new(0));
        let results = search_all_offset(
            dataset_fetch(120, calls.clone()),
            SearchFilter::matching(|n: &u64| n % 2 == 0),
            50,
        )
        .await
        .unwrap();
        assert_eq!(results.len(), 60);
        assert!(results.iter().all(|n| n % 2 == 0));
    }

    #[tokio::test]
    async fn test_offset_break_on_first_match_in_first_page() {
        let calls = Arc::new(AtomicUsize::new(0));
        let results = search_all_offset(
            dataset_fetch(120, calls.clone()),
            SearchFilter::first_match(|n: &u64| *n == 7),
            50,
        )
        .await
        .unwrap();
        assert_eq!(results, vec![7]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_offset_break_on_first_match_in_later_page() {
        let calls = Arc::new(AtomicUsize::new(0));
        let results = search_all_offset(
            dataset_fetch(500, calls.clone()),
            SearchFilter::first_match(|n: &u64| *n >= 60),
            50,
        )
        .await
        .unwrap();
        // In-flight pages may add extra matches after cancellation; the
        // guarantee is at least one match and nothing non-matching.
        assert!(!results.is_empty());
        assert!(results.iter().all(|n| *n >= 60));
        assert!(calls.load(Ordering::SeqCst) <= 10);
    }

    #[tokio::test]
    async fn test_offset_error_aborts_search() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let fetch = move |start_at: u64, _max: u32| {
            counter.fetch_add(1, Ordering::SeqCst);
            futures::future::ready(if start_at >= 100 {
                Err(JiraError::ApiError {
                    message: "boom".to_string(),
                    status_code: Some(500),
                })
            } else {
                Ok(offset_page(200, start_at, (start_at..start_at + 50).collect()))
            })
        };
        let result = search_all_offset(fetch, SearchFilter::<u64>::all(), 50).await;
        assert!(result.is_err());
    }

    #[derive(Debug, Clone, Default)]
    struct FakeRequest {
        max_results: Option<u32>,
        next_page_token: Option<String>,
    }

    impl TokenPagedRequest for FakeRequest {
        fn normalize_page_size(&mut self, default: u32) {
            if self.max_results.map_or(true, |m| m == 0) {
                self.max_results = Some(default);
            }
        }

        fn apply_page_token(&mut self, token: &str) -> Result<()> {
            self.next_page_token = Some(token.to_string());
            Ok(())
        }
    }

    fn token_page(items: Vec<u64>, next: Option<&str>, is_last: bool) -> TokenPage<u64> {
        serde_json::from_value(json!({
            "isLast": is_last,
            "nextPageToken": next,
            "issues": items,
        }))
        .unwrap()
    }

    /// Token fetcher serving three chained pages.
    fn chained_fetch(
        calls: Arc<AtomicUsize>,
    ) -> impl FnMut(FakeRequest) -> futures::future::Ready<Result<TokenPage<u64>>> {
        move |request| {
            calls.fetch_add(1, Ordering::SeqCst);
            let page = match request.next_page_token.as_deref() {
                None => token_page(vec![1, 2], Some("t1"), false),
                Some("t1") => token_page(vec![3, 4], Some("t2"), false),
                Some("t2") => token_page(vec![5], None, true),
                Some(other) => panic!("unexpected token {other}"),
            };
            futures::future::ready(Ok(page))
        }
    }

    #[tokio::test]
    async fn test_token_search_visits_every_page_in_order() {
        let calls = Arc::new(AtomicUsize::new(0));
        let results = search_all_paged(
            FakeRequest::default(),
            chained_fetch(calls.clone()),
            SearchFilter::all(),
            50,
        )
        .await
        .unwrap();
        assert_eq!(results, vec![1, 2, 3, 4, 5]);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_token_search_normalizes_page_size() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::new(std::sync::Mutex::new(None));
        let seen_in = seen.clone();
        let counter = calls.clone();
        let fetch = move |request: FakeRequest| {
            counter.fetch_add(1, Ordering::SeqCst);
            *seen_in.lock().unwrap() = request.max_results;
            futures::future::ready(Ok(token_page(vec![1], None, true)))
        };
        search_all_paged(FakeRequest::default(), fetch, SearchFilter::all(), 50)
            .await
            .unwrap();
        assert_eq!(*seen.lock().unwrap(), Some(50));
    }

    #[tokio::test]
    async fn test_token_search_stops_on_first_match() {
        let calls = Arc::new(AtomicUsize::new(0));
        let results = search_all_paged(
            FakeRequest::default(),
            chained_fetch(calls.clone()),
            SearchFilter::first_match(|n: &u64| *n == 2),
            50,
        )
        .await
        .unwrap();
        assert_eq!(results, vec![2]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_token_search_empty_token_terminates() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let fetch = move |_request: FakeRequest| {
            counter.fetch_add(1, Ordering::SeqCst);
            futures::future::ready(Ok(token_page(vec![9], Some(""), false)))
        };
        let results = search_all_paged(FakeRequest::default(), fetch, SearchFilter::all(), 50)
            .await
            .unwrap();
        assert_eq!(results, vec![9]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_search_count_requests_single_item() {
        let seen = Arc::new(std::sync::Mutex::new((0_u64, 0_u32)));
        let seen_in = seen.clone();
        let fetch = move |start_at, max_results| {
            *seen_in.lock().unwrap() = (start_at, max_results);
            futures::future::ready(Ok(offset_page(42, 0, vec![1])))
        };
        let total = search_count(fetch).await.unwrap();
        assert_eq!(total, 42);
        assert_eq!(*seen.lock().unwrap(), (0, 1));
    }
}
