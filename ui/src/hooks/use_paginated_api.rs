use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use payloads::{Envelope, Filters, PaginatedResponse, Pagination, error_message};
use serde_json::Value;
use tokio::sync::watch;

use super::{ErrorCallback, SuccessCallback, sequence::RequestSequence};

type PageOperation<T> = Arc<
    dyn Fn(u32, Filters) -> BoxFuture<'static, Result<PaginatedResponse<T>, String>>
        + Send
        + Sync,
>;

/// State of a paginated list request.
#[derive(Debug, Clone, PartialEq)]
pub struct PaginatedState<T> {
    /// Items of the last successful page. Kept when a later request fails.
    pub data: Vec<T>,
    pub loading: bool,
    pub error: Option<String>,
    /// Only set after a successful response.
    pub pagination: Option<Pagination>,
    /// The page most recently requested through `go_to_page` or
    /// `update_filters`, updated before the response arrives.
    pub current_page: u32,
    pub filters: Filters,
}

impl<T> Default for PaginatedState<T> {
    fn default() -> Self {
        Self {
            data: Vec::new(),
            loading: false,
            error: None,
            pagination: None,
            current_page: 1,
            filters: Filters::new(),
        }
    }
}

pub struct PaginatedOptions<T> {
    pub immediate: bool,
    /// Sent as `limit` with every request.
    pub page_size: u32,
    pub on_success: Option<SuccessCallback<Vec<T>>>,
    pub on_error: Option<ErrorCallback>,
}

impl<T> Default for PaginatedOptions<T> {
    fn default() -> Self {
        Self {
            immediate: true,
            page_size: 10,
            on_success: None,
            on_error: None,
        }
    }
}

impl<T> PaginatedOptions<T> {
    pub fn immediate(mut self, immediate: bool) -> Self {
        self.immediate = immediate;
        self
    }

    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn on_success(
        mut self,
        callback: impl Fn(Option<&Vec<T>>) + Send + Sync + 'static,
    ) -> Self {
        self.on_success = Some(Arc::new(callback));
        self
    }

    pub fn on_error(
        mut self,
        callback: impl Fn(&str) + Send + Sync + 'static,
    ) -> Self {
        self.on_error = Some(Arc::new(callback));
        self
    }
}

struct Inner<T> {
    operation: PageOperation<T>,
    state: watch::Sender<PaginatedState<T>>,
    sequence: RequestSequence,
    page_size: u32,
    on_success: Option<SuccessCallback<Vec<T>>>,
    on_error: Option<ErrorCallback>,
}

/// Controller returned by [`use_paginated_api`].
pub struct PaginatedHook<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for PaginatedHook<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

/// Request controller for list endpoints.
///
/// `operation` receives the page to load and the active filters, always
/// including `limit` set to the configured page size.
pub fn use_paginated_api<T, F, Fut, Err>(
    operation: F,
    options: PaginatedOptions<T>,
) -> PaginatedHook<T>
where
    T: Clone + Send + Sync + 'static,
    F: Fn(u32, Filters) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<PaginatedResponse<T>, Err>> + Send + 'static,
    Err: Display + 'static,
{
    let operation: PageOperation<T> = Arc::new(move |page, filters| {
        let request = operation(page, filters);
        async move { request.await.map_err(error_message) }.boxed()
    });
    let (state, _) = watch::channel(PaginatedState::default());
    let hook = PaginatedHook {
        inner: Arc::new(Inner {
            operation,
            state,
            sequence: RequestSequence::default(),
            page_size: options.page_size,
            on_success: options.on_success,
            on_error: options.on_error,
        }),
    };
    if options.immediate {
        let token = hook.begin();
        let spawned = hook.clone();
        tokio::spawn(async move {
            spawned.run(token, 1, Filters::new()).await;
        });
    }
    hook
}

impl<T> PaginatedHook<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn state(&self) -> PaginatedState<T> {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PaginatedState<T>> {
        self.inner.state.subscribe()
    }

    /// Load `page` with `filters` without touching `current_page` or the
    /// stored filters.
    pub async fn execute(&self, page: u32, filters: Filters) {
        let token = self.begin();
        self.run(token, page, filters).await;
    }

    pub async fn go_to_page(&self, page: u32) {
        let mut filters = Filters::new();
        let token = self.begin_with(|state| {
            state.current_page = page;
            filters = state.filters.clone();
        });
        self.run(token, page, filters).await;
    }

    /// Replace the filters (no merge) and load the first page.
    pub async fn update_filters(&self, filters: Filters) {
        let token = self.begin_with(|state| {
            state.current_page = 1;
            state.filters = filters.clone();
        });
        self.run(token, 1, filters).await;
    }

    /// Reload the current page with the current filters.
    pub async fn refresh(&self) {
        let mut request = (1, Filters::new());
        let token = self.begin_with(|state| {
            request = (state.current_page, state.filters.clone());
        });
        self.run(token, request.0, request.1).await;
    }

    /// Clear the list, page and filters. A request in flight is discarded.
    pub fn reset(&self) {
        self.inner.state.send_modify(|state| {
            self.inner.sequence.invalidate();
            *state = PaginatedState::default();
        });
    }

    fn begin(&self) -> u64 {
        self.begin_with(|_| {})
    }

    fn begin_with(&self, update: impl FnOnce(&mut PaginatedState<T>)) -> u64 {
        let mut token = 0;
        self.inner.state.send_modify(|state| {
            update(state);
            token = self.inner.sequence.next();
            state.loading = true;
            state.error = None;
        });
        token
    }

    async fn run(&self, token: u64, page: u32, mut filters: Filters) {
        filters.insert("limit".into(), Value::from(self.inner.page_size));

        match (self.inner.operation)(page, filters)
            .await
            .and_then(Envelope::settle)
        {
            Ok(response) => {
                let response = response.unwrap_or_else(|| PaginatedResponse {
                    success: true,
                    data: None,
                    error: None,
                    pagination: None,
                });
                let applied = self.settle(token, |state| {
                    state.data = response.items().to_vec();
                    state.pagination = response.pagination;
                    state.loading = false;
                    state.error = None;
                });
                if applied && let Some(on_success) = &self.inner.on_success {
                    on_success(response.data.as_ref());
                }
            }
            Err(error) => {
                let applied = self.settle(token, |state| {
                    state.loading = false;
                    state.error = Some(error.clone());
                });
                if applied && let Some(on_error) = &self.inner.on_error {
                    on_error(&error);
                }
            }
        }
    }

    fn settle(&self, token: u64, update: impl FnOnce(&mut PaginatedState<T>)) -> bool {
        let applied = self.inner.state.send_if_modified(|state| {
            if !self.inner.sequence.is_current(token) {
                return false;
            }
            update(state);
            true
        });
        if !applied {
            tracing::debug!(token, "discarding superseded page");
        }
        applied
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;
    use std::sync::Mutex;
    use std::time::Duration;

    use serde_json::json;

    use super::*;

    type Calls = Arc<Mutex<Vec<(u32, Filters)>>>;

    fn filters(value: Value) -> Filters {
        match value {
            Value::Object(map) => map,
            _ => panic!("filters must be an object"),
        }
    }

    fn pagination(current: u32) -> Pagination {
        Pagination {
            current,
            pages: 5,
            count: 2,
            total: 50,
        }
    }

    fn recording_hook(
        options: PaginatedOptions<u32>,
    ) -> (PaginatedHook<u32>, Calls) {
        let calls = Calls::default();
        let recorded = calls.clone();
        let hook = use_paginated_api(
            move |page, filters| {
                recorded.lock().unwrap().push((page, filters));
                async move {
                    Ok::<_, Infallible>(PaginatedResponse::page(
                        vec![page * 10, page * 10 + 1],
                        pagination(page),
                    ))
                }
            },
            options,
        );
        (hook, calls)
    }

    #[tokio::test]
    async fn immediate_hook_loads_first_page() {
        let (hook, calls) = recording_hook(PaginatedOptions::default());
        assert!(hook.state().loading);

        let state = hook
            .subscribe()
            .wait_for(|state| !state.loading)
            .await
            .unwrap()
            .clone();
        assert_eq!(state.data, vec![10, 11]);
        assert_eq!(state.pagination, Some(pagination(1)));
        assert_eq!(
            *calls.lock().unwrap(),
            vec![(1, filters(json!({ "limit": 10 })))]
        );
    }

    #[tokio::test]
    async fn go_to_page_requests_page_with_limit() {
        let (hook, calls) =
            recording_hook(PaginatedOptions::default().immediate(false));

        hook.go_to_page(3).await;

        assert_eq!(
            *calls.lock().unwrap(),
            vec![(3, filters(json!({ "limit": 10 })))]
        );
        let state = hook.state();
        assert_eq!(state.current_page, 3);
        assert_eq!(state.data, vec![30, 31]);
    }

    #[tokio::test]
    async fn update_filters_replaces_filters_and_restarts_at_first_page() {
        let (hook, calls) = recording_hook(
            PaginatedOptions::default().immediate(false).page_size(25),
        );
        hook.go_to_page(4).await;
        hook.update_filters(filters(json!({ "status": "active" }))).await;
        hook.update_filters(filters(json!({ "x": 1 }))).await;

        let calls = calls.lock().unwrap();
        assert_eq!(calls[2], (1, filters(json!({ "x": 1, "limit": 25 }))));
        let state = hook.state();
        assert_eq!(state.current_page, 1);
        assert_eq!(state.filters, filters(json!({ "x": 1 })));
    }

    #[tokio::test]
    async fn refresh_uses_current_page_and_filters() {
        let (hook, calls) =
            recording_hook(PaginatedOptions::default().immediate(false));
        hook.update_filters(filters(json!({ "year": 2024 }))).await;
        hook.go_to_page(2).await;
        hook.refresh().await;

        assert_eq!(
            calls.lock().unwrap().last(),
            Some(&(2, filters(json!({ "year": 2024, "limit": 10 }))))
        );
    }

    #[tokio::test]
    async fn failure_keeps_previous_page() {
        let fail = Arc::new(Mutex::new(false));
        let errors = Arc::new(Mutex::new(Vec::new()));
        let seen = errors.clone();
        let hook = use_paginated_api(
            {
                let fail = fail.clone();
                move |page, _filters| {
                    let fail = *fail.lock().unwrap();
                    async move {
                        if fail {
                            Err(std::io::Error::other("Network error"))
                        } else {
                            Ok(PaginatedResponse::page(vec![page], pagination(page)))
                        }
                    }
                }
            },
            PaginatedOptions::default()
                .immediate(false)
                .on_error(move |error| seen.lock().unwrap().push(error.to_string())),
        );

        hook.go_to_page(2).await;
        *fail.lock().unwrap() = true;
        hook.refresh().await;

        let state = hook.state();
        assert_eq!(state.data, vec![2]);
        assert_eq!(state.pagination, Some(pagination(2)));
        assert_eq!(state.error.as_deref(), Some("Network error"));
        assert!(!state.loading);
        assert_eq!(*errors.lock().unwrap(), vec!["Network error".to_string()]);
    }

    #[tokio::test]
    async fn backend_failure_uses_reported_message() {
        let hook = use_paginated_api(
            |_, _| async {
                Ok::<_, Infallible>(PaginatedResponse::<u32>::failure("Bad filter"))
            },
            PaginatedOptions::default().immediate(false),
        );
        hook.refresh().await;
        let state = hook.state();
        assert_eq!(state.error.as_deref(), Some("Bad filter"));
        assert!(state.data.is_empty());
        assert_eq!(state.pagination, None);
    }

    #[tokio::test]
    async fn success_callback_receives_items() {
        let received = Arc::new(Mutex::new(None));
        let seen = received.clone();
        let (hook, _) = recording_hook(
            PaginatedOptions::default()
                .immediate(false)
                .on_success(move |items| *seen.lock().unwrap() = items.cloned()),
        );
        hook.go_to_page(1).await;
        assert_eq!(*received.lock().unwrap(), Some(vec![10, 11]));
    }

    #[tokio::test]
    async fn reset_clears_list_and_controls() {
        let (hook, _) =
            recording_hook(PaginatedOptions::default().immediate(false));
        hook.update_filters(filters(json!({ "x": 1 }))).await;
        hook.go_to_page(3).await;

        hook.reset();

        assert_eq!(hook.state(), PaginatedState::default());
    }

    #[tokio::test]
    async fn reset_discards_page_in_flight() {
        let hook = use_paginated_api(
            |page, _| async move {
                tokio::time::sleep(Duration::from_millis(30)).await;
                Ok::<_, Infallible>(PaginatedResponse::page(vec![page], pagination(page)))
            },
            PaginatedOptions::default().immediate(false),
        );

        tokio::join!(hook.go_to_page(2), async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            hook.reset();
        });

        assert_eq!(hook.state(), PaginatedState::default());
    }
}
