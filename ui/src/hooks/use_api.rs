use std::fmt::Display;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use futures::future::{BoxFuture, FutureExt};
use payloads::{Envelope, error_message};
use tokio::sync::watch;

use super::{
    ErrorCallback, RequestState, SuccessCallback, sequence::RequestSequence,
};

type Operation<E> =
    Arc<dyn Fn() -> BoxFuture<'static, Result<E, String>> + Send + Sync>;

fn boxed_operation<E, F, Fut, Err>(operation: F) -> Operation<E>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<E, Err>> + Send + 'static,
    Err: Display + 'static,
{
    Arc::new(move || {
        let request = operation();
        async move { request.await.map_err(error_message) }.boxed()
    })
}

/// Options for [`use_api`].
pub struct ApiOptions<T, D = ()> {
    /// Execute on construction and whenever the dependencies change.
    pub immediate: bool,
    pub on_success: Option<SuccessCallback<T>>,
    pub on_error: Option<ErrorCallback>,
    /// Compared with `==` by [`ApiHook::set_dependencies`].
    pub dependencies: D,
}

impl<T> Default for ApiOptions<T, ()> {
    fn default() -> Self {
        Self {
            immediate: true,
            on_success: None,
            on_error: None,
            dependencies: (),
        }
    }
}

impl<T, D> ApiOptions<T, D> {
    pub fn immediate(mut self, immediate: bool) -> Self {
        self.immediate = immediate;
        self
    }

    pub fn on_success(
        mut self,
        callback: impl Fn(Option<&T>) + Send + Sync + 'static,
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

    pub fn dependencies<D2>(self, dependencies: D2) -> ApiOptions<T, D2> {
        ApiOptions {
            immediate: self.immediate,
            on_success: self.on_success,
            on_error: self.on_error,
            dependencies,
        }
    }
}

struct Inner<E: Envelope, D> {
    /// Always the closure most recently handed to the controller.
    operation: Mutex<Operation<E>>,
    state: watch::Sender<RequestState<E::Data>>,
    sequence: RequestSequence,
    immediate: bool,
    dependencies: Mutex<D>,
    on_success: Option<SuccessCallback<E::Data>>,
    on_error: Option<ErrorCallback>,
}

/// Controller returned by [`use_api`]. Clones share the same request.
pub struct ApiHook<E: Envelope, D = ()> {
    inner: Arc<Inner<E, D>>,
}

impl<E: Envelope, D> Clone for ApiHook<E, D> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

/// Generic request controller.
///
/// Runs `operation`, which returns a response envelope, and exposes the
/// settled data or error message. A plain [`payloads::ApiResponse`] settles
/// to its inner data, while a [`payloads::PaginatedResponse`] settles to the
/// whole envelope (see [`Envelope`]).
///
/// With `immediate` set (the default) the state starts out loading and the
/// first execution is spawned on the current Tokio runtime, so this must then
/// be called from within one.
///
/// # Example
///
/// ```no_run
/// # async fn example(client: std::sync::Arc<payloads::APIClient>) {
/// use ui::hooks::{ApiOptions, use_api};
///
/// let tournament_id = payloads::TournamentId::from("507f1f77bcf86cd799439011");
/// let tournament = use_api(
///     move || {
///         let client = client.clone();
///         let tournament_id = tournament_id.clone();
///         async move { client.get_tournament(&tournament_id).await }
///     },
///     ApiOptions::default(),
/// );
/// let settled = tournament
///     .subscribe()
///     .wait_for(|state| !state.loading)
///     .await
///     .map(|state| state.clone());
/// # }
/// ```
pub fn use_api<E, D, F, Fut, Err>(
    operation: F,
    options: ApiOptions<E::Data, D>,
) -> ApiHook<E, D>
where
    E: Envelope + Send + 'static,
    E::Data: Clone + Send + Sync + 'static,
    D: PartialEq + Send + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<E, Err>> + Send + 'static,
    Err: Display + 'static,
{
    let (state, _) = watch::channel(RequestState::idle());
    let hook = ApiHook {
        inner: Arc::new(Inner {
            operation: Mutex::new(boxed_operation(operation)),
            state,
            sequence: RequestSequence::default(),
            immediate: options.immediate,
            dependencies: Mutex::new(options.dependencies),
            on_success: options.on_success,
            on_error: options.on_error,
        }),
    };
    if options.immediate {
        hook.spawn_execute();
    }
    hook
}

impl<E, D> ApiHook<E, D>
where
    E: Envelope + Send + 'static,
    E::Data: Clone + Send + Sync + 'static,
    D: PartialEq + Send + 'static,
{
    /// Snapshot of the current state.
    pub fn state(&self) -> RequestState<E::Data> {
        self.inner.state.borrow().clone()
    }

    /// Receiver notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<RequestState<E::Data>> {
        self.inner.state.subscribe()
    }

    /// Run the operation once and settle the state with its outcome. Failures
    /// are recorded in the state, never returned.
    pub async fn execute(&self) {
        let token = self.begin();
        self.run(token).await;
    }

    /// Return to the idle state. A request still in flight is discarded when
    /// it settles.
    pub fn reset(&self) {
        self.inner.state.send_modify(|state| {
            self.inner.sequence.invalidate();
            *state = RequestState::idle();
        });
    }

    /// Replace the operation. Later executions call the new closure; nothing
    /// is executed by the replacement itself.
    pub fn set_operation<F, Fut, Err>(&self, operation: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<E, Err>> + Send + 'static,
        Err: Display + 'static,
    {
        *self
            .inner
            .operation
            .lock()
            .unwrap_or_else(PoisonError::into_inner) =
            boxed_operation(operation);
    }

    /// Store new dependencies. When they differ from the previous ones and
    /// the controller is `immediate`, an execution is spawned. Returns
    /// whether that happened.
    pub fn set_dependencies(&self, dependencies: D) -> bool {
        let changed = {
            let mut current = self
                .inner
                .dependencies
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if *current == dependencies {
                false
            } else {
                *current = dependencies;
                true
            }
        };
        if changed && self.inner.immediate {
            self.spawn_execute();
            true
        } else {
            false
        }
    }

    fn spawn_execute(&self) {
        // loading is published before the task starts
        let token = self.begin();
        let hook = self.clone();
        tokio::spawn(async move { hook.run(token).await });
    }

    fn begin(&self) -> u64 {
        let mut token = 0;
        self.inner.state.send_modify(|state| {
            token = self.inner.sequence.next();
            state.loading = true;
            state.error = None;
        });
        token
    }

    async fn run(&self, token: u64) {
        let operation = self
            .inner
            .operation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        match operation().await.and_then(Envelope::settle) {
            Ok(data) => {
                if self.settle(token, RequestState::succeeded(data.clone()))
                    && let Some(on_success) = &self.inner.on_success
                {
                    on_success(data.as_ref());
                }
            }
            Err(error) => {
                if self.settle(token, RequestState::failed(error.clone()))
                    && let Some(on_error) = &self.inner.on_error
                {
                    on_error(&error);
                }
            }
        }
    }

    /// Publish `settled` if `token` is still the latest execution.
    fn settle(&self, token: u64, settled: RequestState<E::Data>) -> bool {
        let applied = self.inner.state.send_if_modified(|state| {
            if !self.inner.sequence.is_current(token) {
                return false;
            }
            *state = settled;
            true
        });
        if !applied {
            tracing::debug!(token, "discarding superseded response");
        }
        applied
    }
}
