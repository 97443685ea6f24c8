//! Cursor-following list retrieval
//!
//! Graph list endpoints return a `value` array and, while more results exist,
//! an `@odata.nextLink` URL. [`fetch_all`] follows those links until the
//! server stops sending one and returns the complete result set, or the
//! first error with nothing partial.

use crate::error::Result;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

/// Largest `$top` accepted by the directory endpoints
pub const MAX_PAGE_SIZE: u32 = 999;

/// Generic paginated response from Graph API
#[derive(Debug, Deserialize)]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
    #[serde(rename = "@odata.nextLink", default)]
    pub next_link: Option<String>,
    #[serde(rename = "@odata.count", default)]
    pub count: Option<i64>,
}

/// Anything that can fetch one page of raw JSON items
#[async_trait]
pub trait PageSource: Send + Sync {
    /// `url` is relative to the API base for the first page, absolute for nextLinks
    async fn get_page(&self, url: &str, eventual_consistency: bool) -> Result<Page<Value>>;
}

/// Typed list query over a directory collection
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    resource: String,
    filter: Option<String>,
    select: Vec<String>,
    order_by: Option<String>,
    top: Option<u32>,
    eventual_consistency: bool,
}

impl ListQuery {
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            ..Default::default()
        }
    }

    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn select(mut self, fields: &[&str]) -> Self {
        self.select = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn order_by(mut self, order_by: impl Into<String>) -> Self {
        self.order_by = Some(order_by.into());
        self
    }

    /// Page size, capped at [`MAX_PAGE_SIZE`]
    pub fn top(mut self, top: u32) -> Self {
        self.top = Some(top.clamp(1, MAX_PAGE_SIZE));
        self
    }

    /// Mark as an advanced query (`ConsistencyLevel: eventual` + `$count=true`)
    pub fn eventual_consistency(mut self) -> Self {
        self.eventual_consistency = true;
        self
    }

    pub fn filter_expression(&self) -> Option<&str> {
        self.filter.as_deref()
    }

    pub fn is_eventual(&self) -> bool {
        self.eventual_consistency
    }

    /// Relative request URL; `$filter` and `$orderby` values are percent-encoded
    pub fn to_endpoint(&self) -> String {
        let mut params: Vec<String> = Vec::new();

        if let Some(ref filter) = self.filter {
            params.push(format!("$filter={}", urlencoding::encode(filter)));
        }

        if !self.select.is_empty() {
            params.push(format!("$select={}", self.select.join(",")));
        }

        if let Some(ref order_by) = self.order_by {
            params.push(format!("$orderby={}", urlencoding::encode(order_by)));
        }

        if let Some(top) = self.top {
            params.push(format!("$top={}", top));
        }

        if self.eventual_consistency {
            params.push("$count=true".to_string());
        }

        if params.is_empty() {
            self.resource.clone()
        } else {
            format!("{}?{}", self.resource, params.join("&"))
        }
    }
}

/// Escape a value for use inside a single-quoted OData string literal
pub fn odata_literal(value: &str) -> String {
    value.replace('\'', "''")
}

/// Fetch all pages of a list query, in page order
pub async fn fetch_all<T, S>(source: &S, query: &ListQuery) -> Result<Vec<T>>
where
    T: DeserializeOwned,
    S: PageSource + ?Sized,
{
    let mut all_items: Vec<T> = Vec::new();
    let mut next_url = Some(query.to_endpoint());
    let mut pages = 0usize;

    while let Some(url) = next_url.take() {
        let page = source.get_page(&url, query.is_eventual()).await?;
        pages += 1;

        let received = page.value.len();
        for item in page.value {
            all_items.push(serde_json::from_value(item)?);
        }

        match page.next_link {
            Some(_) if received == 0 => {
                warn!(
                    "Page {} of '{}' returned a continuation link but no items; treating as end of results",
                    pages, query.resource
                );
            }
            Some(link) if link == url => {
                warn!(
                    "Continuation link for '{}' repeats the current page; stopping",
                    query.resource
                );
            }
            Some(link) => next_url = Some(link),
            None => {}
        }
    }

    debug!(
        resource = %query.resource,
        pages,
        items = all_items.len(),
        "listing complete"
    );

    Ok(all_items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppVaultError;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Serves queued pages and records the URLs it was asked for
    struct ScriptedPages {
        pages: Mutex<VecDeque<Result<Page<Value>>>>,
        requested: Mutex<Vec<(String, bool)>>,
    }

    impl ScriptedPages {
        fn new(pages: Vec<Result<Page<Value>>>) -> Self {
            Self {
                pages: Mutex::new(pages.into()),
                requested: Mutex::new(Vec::new()),
            }
        }

        fn requested(&self) -> Vec<(String, bool)> {
            self.requested.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PageSource for ScriptedPages {
        async fn get_page(&self, url: &str, eventual: bool) -> Result<Page<Value>> {
            self.requested
                .lock()
                .unwrap()
                .push((url.to_string(), eventual));
            self.pages
                .lock()
                .unwrap()
                .pop_front()
                .expect("no more scripted pages")
        }
    }

    fn page(ids: &[&str], next: Option<&str>) -> Result<Page<Value>> {
        Ok(Page {
            value: ids.iter().map(|id| json!({ "id": id })).collect(),
            next_link: next.map(str::to_string),
            count: None,
        })
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Item {
        id: String,
    }

    fn ids(items: &[Item]) -> Vec<&str> {
        items.iter().map(|i| i.id.as_str()).collect()
    }

    #[test]
    fn test_query_string_building() {
        let query = ListQuery::new("applications")
            .filter("startswith(displayName,'Payroll')")
            .select(&["id", "appId", "displayName"])
            .top(5000)
            .eventual_consistency();

        assert_eq!(
            query.to_endpoint(),
            "applications?$filter=startswith%28displayName%2C%27Payroll%27%29&$select=id,appId,displayName&$top=999&$count=true"
        );
        assert_eq!(ListQuery::new("users").to_endpoint(), "users");
    }

    #[test]
    fn test_filter_reserved_characters_are_encoded() {
        for name in ["C++ Tools", "R&D Portal", "Build #7"] {
            let query = ListQuery::new("applications")
                .filter(format!("displayName eq '{}'", odata_literal(name)));
            let endpoint = query.to_endpoint();
            let (_, raw) = endpoint.split_once("?$filter=").unwrap();

            assert!(
                !raw.contains(|c| matches!(c, '+' | '&' | '#' | ' ')),
                "{endpoint}"
            );
            assert_eq!(
                urlencoding::decode(raw).unwrap(),
                format!("displayName eq '{}'", name)
            );
        }
    }

    #[test]
    fn test_odata_literal_escapes_quotes() {
        assert_eq!(odata_literal("O'Brien's app"), "O''Brien''s app");
    }

    #[tokio::test]
    async fn test_returns_union_of_pages_in_order() {
        let source = ScriptedPages::new(vec![
            page(&["a", "b"], Some("https://graph/next-1")),
            page(&["c"], Some("https://graph/next-2")),
            page(&["d", "e"], None),
        ]);
        let query = ListQuery::new("applications").top(2).eventual_consistency();

        let items: Vec<Item> = fetch_all(&source, &query).await.unwrap();

        assert_eq!(ids(&items), vec!["a", "b", "c", "d", "e"]);
        let requested = source.requested();
        assert_eq!(requested.len(), 3);
        assert_eq!(requested[0].0, "applications?$top=2&$count=true");
        assert_eq!(requested[1].0, "https://graph/next-1");
        assert_eq!(requested[2].0, "https://graph/next-2");
        assert!(requested.iter().all(|(_, eventual)| *eventual));
    }

    #[tokio::test]
    async fn test_empty_page_with_cursor_terminates() {
        let source = ScriptedPages::new(vec![
            page(&["a"], Some("https://graph/next-1")),
            page(&[], Some("https://graph/next-2")),
            // Would be served if the fetcher kept following the cursor
            page(&["never"], None),
        ]);

        let items: Vec<Item> = fetch_all(&source, &ListQuery::new("applications"))
            .await
            .unwrap();

        assert_eq!(ids(&items), vec!["a"]);
        assert_eq!(source.requested().len(), 2);
    }

    #[tokio::test]
    async fn test_self_referencing_cursor_terminates() {
        let source = ScriptedPages::new(vec![
            page(&["a"], Some("https://graph/loop")),
            page(&["b"], Some("https://graph/loop")),
        ]);

        let items: Vec<Item> = fetch_all(&source, &ListQuery::new("applications"))
            .await
            .unwrap();

        assert_eq!(ids(&items), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_page_error_discards_partial_results() {
        let source = ScriptedPages::new(vec![
            page(&["a", "b"], Some("https://graph/next-1")),
            Err(AppVaultError::GraphApi {
                status: 503,
                message: "unavailable".into(),
            }),
        ]);

        let result: Result<Vec<Item>> = fetch_all(&source, &ListQuery::new("applications")).await;

        assert!(matches!(
            result,
            Err(AppVaultError::GraphApi { status: 503, .. })
        ));
    }
}
