//! Type-erased action handlers
//!
//! Every typed action or closure is wrapped into a [`Handler`] that takes raw
//! JSON parameters. The wrapper decodes them into the handler's parameter type
//! and passes only what its capability allows.

use crate::actions::schema::normalize_params;
use crate::actions::{Action, ActionResult, BrowserAction, Capability, PageAction, PageContext};
use crate::browser::BrowserHandle;
use crate::error::{AgentError, FieldViolation, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

#[async_trait]
trait DynHandler: Send + Sync {
    async fn call(&self, action: &str, params: Value, page: &PageContext) -> Result<ActionResult>;
}

/// Callable body of a registered action
#[derive(Clone)]
pub struct Handler {
    capability: Capability,
    inner: Arc<dyn DynHandler>,
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler").field("capability", &self.capability).finish()
    }
}

impl Handler {
    pub fn capability(&self) -> Capability {
        self.capability
    }

    /// Decode `params` and run the handler. `page` must hold an index that is
    /// current for the page when the capability is [`Capability::PageIndex`].
    pub async fn invoke(&self, action: &str, params: Value, page: &PageContext) -> Result<ActionResult> {
        self.inner.call(action, normalize_params(params), page).await
    }

    pub fn from_action<A: Action>(action: A) -> Self {
        Self {
            capability: Capability::None,
            inner: Arc::new(TypedAction(action)),
        }
    }

    pub fn from_browser_action<A: BrowserAction>(action: A) -> Self {
        Self {
            capability: Capability::Browser,
            inner: Arc::new(TypedBrowserAction(action)),
        }
    }

    pub fn from_page_action<A: PageAction>(action: A) -> Self {
        Self {
            capability: Capability::PageIndex,
            inner: Arc::new(TypedPageAction(action)),
        }
    }

    /// Closure receiving only its parameters
    pub fn from_fn<P, R, F, Fut>(f: F) -> Self
    where
        P: DeserializeOwned + Send + 'static,
        R: Into<ActionResult> + Send + 'static,
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R>> + Send + 'static,
    {
        Self {
            capability: Capability::None,
            inner: Arc::new(FnHandler {
                f,
                _params: PhantomData,
            }),
        }
    }

    /// Closure receiving its parameters and the run's browser
    pub fn from_browser_fn<P, R, F, Fut>(f: F) -> Self
    where
        P: DeserializeOwned + Send + 'static,
        R: Into<ActionResult> + Send + 'static,
        F: Fn(P, BrowserHandle) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R>> + Send + 'static,
    {
        Self {
            capability: Capability::Browser,
            inner: Arc::new(BrowserFnHandler {
                f,
                _params: PhantomData,
            }),
        }
    }

    /// Closure receiving its parameters and the current page index
    pub fn from_page_fn<P, R, F, Fut>(f: F) -> Self
    where
        P: DeserializeOwned + Send + 'static,
        R: Into<ActionResult> + Send + 'static,
        F: Fn(P, PageContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R>> + Send + 'static,
    {
        Self {
            capability: Capability::PageIndex,
            inner: Arc::new(PageFnHandler {
                f,
                _params: PhantomData,
            }),
        }
    }
}

/// Decode parameters, mapping serde's message onto the offending field
pub(crate) fn decode<P: DeserializeOwned>(action: &str, params: Value) -> Result<P> {
    serde_json::from_value(params).map_err(|e| {
        let message = e.to_string();
        AgentError::Validation {
            action: action.to_string(),
            fields: vec![FieldViolation::new(offending_field(&message), message)],
        }
    })
}

fn offending_field(message: &str) -> String {
    // serde reports "missing field `x`" and "unknown field `x`, expected ..."
    message
        .split('`')
        .nth(1)
        .filter(|_| message.starts_with("missing field") || message.starts_with("unknown field"))
        .unwrap_or("<params>")
        .to_string()
}

struct TypedAction<A>(A);

#[async_trait]
impl<A: Action> DynHandler for TypedAction<A> {
    async fn call(&self, action: &str, params: Value, _page: &PageContext) -> Result<ActionResult> {
        let params = decode::<A::Params>(action, params)?;
        self.0.execute_typed(params).await
    }
}

struct TypedBrowserAction<A>(A);

#[async_trait]
impl<A: BrowserAction> DynHandler for TypedBrowserAction<A> {
    async fn call(&self, action: &str, params: Value, page: &PageContext) -> Result<ActionResult> {
        let params = decode::<A::Params>(action, params)?;
        self.0.execute_typed(params, page.browser()).await
    }
}

struct TypedPageAction<A>(A);

#[async_trait]
impl<A: PageAction> DynHandler for TypedPageAction<A> {
    async fn call(&self, action: &str, params: Value, page: &PageContext) -> Result<ActionResult> {
        let params = decode::<A::Params>(action, params)?;
        self.0.execute_typed(params, page).await
    }
}

struct FnHandler<P, F> {
    f: F,
    _params: PhantomData<fn() -> P>,
}

#[async_trait]
impl<P, R, F, Fut> DynHandler for FnHandler<P, F>
where
    P: DeserializeOwned + Send + 'static,
    R: Into<ActionResult> + Send + 'static,
    F: Fn(P) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R>> + Send + 'static,
{
    async fn call(&self, action: &str, params: Value, _page: &PageContext) -> Result<ActionResult> {
        let params = decode::<P>(action, params)?;
        (self.f)(params).await.map(Into::into)
    }
}

struct BrowserFnHandler<P, F> {
    f: F,
    _params: PhantomData<fn() -> P>,
}

#[async_trait]
impl<P, R, F, Fut> DynHandler for BrowserFnHandler<P, F>
where
    P: DeserializeOwned + Send + 'static,
    R: Into<ActionResult> + Send + 'static,
    F: Fn(P, BrowserHandle) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R>> + Send + 'static,
{
    async fn call(&self, action: &str, params: Value, page: &PageContext) -> Result<ActionResult> {
        let params = decode::<P>(action, params)?;
        (self.f)(params, Arc::clone(page.browser())).await.map(Into::into)
    }
}

struct PageFnHandler<P, F> {
    f: F,
    _params: PhantomData<fn() -> P>,
}

#[async_trait]
impl<P, R, F, Fut> DynHandler for PageFnHandler<P, F>
where
    P: DeserializeOwned + Send + 'static,
    R: Into<ActionResult> + Send + 'static,
    F: Fn(P, PageContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R>> + Send + 'static,
{
    async fn call(&self, action: &str, params: Value, page: &PageContext) -> Result<ActionResult> {
        let params = decode::<P>(action, params)?;
        (self.f)(params, page.clone()).await.map(Into::into)
    }
}
