use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use payloads::{ApiResponse, Envelope, error_message};
use tokio::sync::watch;

use super::{
    ErrorCallback, RequestState, SuccessCallback, sequence::RequestSequence,
};

type MutationFn<V, T> = Arc<
    dyn Fn(V) -> BoxFuture<'static, Result<ApiResponse<T>, String>> + Send + Sync,
>;

pub struct MutationOptions<T> {
    pub on_success: Option<SuccessCallback<T>>,
    pub on_error: Option<ErrorCallback>,
}

impl<T> Default for MutationOptions<T> {
    fn default() -> Self {
        Self {
            on_success: None,
            on_error: None,
        }
    }
}

impl<T> MutationOptions<T> {
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
}

struct Inner<V, T> {
    mutation: MutationFn<V, T>,
    state: watch::Sender<RequestState<T>>,
    sequence: RequestSequence,
    on_success: Option<SuccessCallback<T>>,
    on_error: Option<ErrorCallback>,
}

/// Controller returned by [`use_mutation`].
pub struct MutationHook<V, T> {
    inner: Arc<Inner<V, T>>,
}

impl<V, T> Clone for MutationHook<V, T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

/// Controller for create/update/delete calls. Nothing runs until
/// [`MutationHook::mutate`] is called.
pub fn use_mutation<V, T, F, Fut, Err>(
    mutation: F,
    options: MutationOptions<T>,
) -> MutationHook<V, T>
where
    V: Send + 'static,
    T: Clone + Send + Sync + 'static,
    F: Fn(V) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ApiResponse<T>, Err>> + Send + 'static,
    Err: Display + 'static,
{
    let mutation: MutationFn<V, T> = Arc::new(move |variables| {
        let request = mutation(variables);
        async move { request.await.map_err(error_message) }.boxed()
    });
    let (state, _) = watch::channel(RequestState::idle());
    MutationHook {
        inner: Arc::new(Inner {
            mutation,
            state,
            sequence: RequestSequence::default(),
            on_success: options.on_success,
            on_error: options.on_error,
        }),
    }
}

impl<V, T> MutationHook<V, T>
where
    V: Send + 'static,
    T: Clone + Send + Sync + 'static,
{
    pub fn state(&self) -> RequestState<T> {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<RequestState<T>> {
        self.inner.state.subscribe()
    }

    /// Run the mutation with `variables`. Any previous data or error is
    /// cleared while it runs.
    pub async fn mutate(&self, variables: V) {
        let mut token = 0;
        self.inner.state.send_modify(|state| {
            token = self.inner.sequence.next();
            *state = RequestState::pending();
        });

        match (self.inner.mutation)(variables)
            .await
            .and_then(Envelope::settle)
        {
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

    pub fn reset(&self) {
        self.inner.state.send_modify(|state| {
            self.inner.sequence.invalidate();
            *state = RequestState::idle();
        });
    }

    fn settle(&self, token: u64, settled: RequestState<T>) -> bool {
        let applied = self.inner.state.send_if_modified(|state| {
            if !self.inner.sequence.is_current(token) {
                return false;
            }
            *state = settled;
            true
        });
        if !applied {
            tracing::debug!(token, "discarding superseded mutation result");
        }
        applied
    }
}
