//! Values that are either available now or produced by a future.
//!
//! Copyright (c) 2025 Posit, PBC
//!
//! Resolution is synchronous for filesystem resolvers and asynchronous for
//! bundler resolvers. The importer has to mirror whichever the resolver did,
//! so the two cases travel together in one type instead of boxing every
//! filesystem lookup in a future.

use futures::FutureExt;
use futures::future::BoxFuture;

/// A value that is ready now or will be produced by a future.
pub enum MaybeDeferred<T> {
    Ready(T),
    Deferred(BoxFuture<'static, T>),
}

impl<T: Send + 'static> MaybeDeferred<T> {
    /// Wrap a future.
    pub fn deferred<F>(future: F) -> Self
    where
        F: Future<Output = T> + Send + 'static,
    {
        MaybeDeferred::Deferred(future.boxed())
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self, MaybeDeferred::Deferred(_))
    }

    /// Apply `f` to the value, keeping it ready or deferred as it was.
    pub fn map<U, F>(self, f: F) -> MaybeDeferred<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        match self {
            MaybeDeferred::Ready(value) => MaybeDeferred::Ready(f(value)),
            MaybeDeferred::Deferred(future) => MaybeDeferred::Deferred(future.map(f).boxed()),
        }
    }

    /// Block the current thread until the value is available.
    pub fn wait(self) -> T {
        match self {
            MaybeDeferred::Ready(value) => value,
            MaybeDeferred::Deferred(future) => pollster::block_on(future),
        }
    }

    /// Convert into a future, regardless of form.
    pub fn into_boxed_future(self) -> BoxFuture<'static, T> {
        match self {
            MaybeDeferred::Ready(value) => futures::future::ready(value).boxed(),
            MaybeDeferred::Deferred(future) => future,
        }
    }
}

impl<T> std::fmt::Debug for MaybeDeferred<T>
where
    T: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MaybeDeferred::Ready(value) => f.debug_tuple("Ready").field(value).finish(),
            MaybeDeferred::Deferred(_) => f.write_str("Deferred(<future>)"),
        }
    }
}
