//! Interceptor chains.
//!
//! Interceptors are cross-cutting hooks configured to run around every
//! publish and consume operation, in the manner of middleware. A chain is an
//! ordered list of entries; each entry is keyed by the interceptor's type
//! and carries a factory so that every invocation runs on a fresh instance
//! (no shared interceptor state across invocations).
//!
//! Invocation is continuation-passing: each interceptor receives the context
//! and a [`Next`] continuation. Running the continuation executes the rest
//! of the chain and finally the terminal operation; an interceptor that
//! never runs its continuation short-circuits the chain and its own return
//! value becomes the chain's result. `Next` is consumed by value, so it can
//! be run at most once.
//!
//! ```
//! use courier_core::interceptor::{Chain, Interceptor, Next};
//! use courier_core::CourierError;
//!
//! struct Stamp;
//!
//! impl Interceptor<Vec<&'static str>, i32> for Stamp {
//!     fn call(
//!         &self,
//!         ctx: &mut Vec<&'static str>,
//!         next: Next<'_, Vec<&'static str>, i32>,
//!     ) -> Result<i32, CourierError> {
//!         ctx.push("before");
//!         let result = next.run(ctx)?;
//!         ctx.push("after");
//!         Ok(result)
//!     }
//! }
//!
//! let mut chain = Chain::new();
//! chain.add(|| Stamp);
//! let mut log = Vec::new();
//! let result = chain.invoke(&mut log, |_| Ok(7)).unwrap();
//! assert_eq!(result, 7);
//! assert_eq!(log, vec!["before", "after"]);
//! ```

use crate::error::CourierError;
use std::any::{type_name, TypeId};
use std::sync::Arc;

/// A cross-cutting hook invoked around a pipeline operation.
pub trait Interceptor<C, R>: 'static {
    /// Run the interceptor.
    ///
    /// `next.run(ctx)` executes the remainder of the chain. Skipping it
    /// short-circuits: neither later interceptors nor the terminal run, and
    /// this call's return value becomes the chain result.
    ///
    /// # Errors
    ///
    /// Any error propagates to the pipeline unchanged.
    fn call(&self, ctx: &mut C, next: Next<'_, C, R>) -> Result<R, CourierError>;
}

/// Continuation over the remainder of a chain.
///
/// Consumed by value: an interceptor can run it at most once.
pub struct Next<'a, C, R> {
    rest: &'a [Box<dyn Interceptor<C, R>>],
    terminal: &'a mut dyn FnMut(&mut C) -> Result<R, CourierError>,
}

// The trait object requires `'static` context and result types, so every
// impl over them carries the same bounds.
impl<C: 'static, R: 'static> Next<'_, C, R> {
    /// Run the next interceptor, or the terminal if this is the last one.
    ///
    /// # Errors
    ///
    /// Propagates whatever the rest of the chain returns.
    pub fn run(self, ctx: &mut C) -> Result<R, CourierError> {
        match self.rest.split_first() {
            Some((head, tail)) => head.call(
                ctx,
                Next {
                    rest: tail,
                    terminal: self.terminal,
                },
            ),
            None => (self.terminal)(ctx),
        }
    }
}

type Factory<C, R> = Arc<dyn Fn() -> Box<dyn Interceptor<C, R>> + Send + Sync>;

/// A chain entry: an interceptor type plus the factory that instantiates it.
pub struct Entry<C, R> {
    id: TypeId,
    name: &'static str,
    factory: Factory<C, R>,
}

impl<C: 'static, R: 'static> Entry<C, R> {
    fn new<I, F>(factory: F) -> Self
    where
        I: Interceptor<C, R>,
        F: Fn() -> I + Send + Sync + 'static,
    {
        Self {
            id: TypeId::of::<I>(),
            name: type_name::<I>(),
            factory: Arc::new(move || Box::new(factory())),
        }
    }

    /// The interceptor type name, for diagnostics.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    fn instantiate(&self) -> Box<dyn Interceptor<C, R>> {
        (self.factory)()
    }
}

impl<C: 'static, R: 'static> Clone for Entry<C, R> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            name: self.name,
            factory: Arc::clone(&self.factory),
        }
    }
}

/// An ordered interceptor chain.
pub struct Chain<C, R> {
    entries: Vec<Entry<C, R>>,
}

impl<C: 'static, R: 'static> Default for Chain<C, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: 'static, R: 'static> Chain<C, R> {
    /// Create an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the chain has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether an interceptor of type `I` is in the chain.
    #[must_use]
    pub fn exists<I: 'static>(&self) -> bool {
        self.position_of(TypeId::of::<I>()).is_some()
    }

    /// Current position of interceptor type `I`, if present.
    #[must_use]
    pub fn position<I: 'static>(&self) -> Option<usize> {
        self.position_of(TypeId::of::<I>())
    }

    /// Interceptor type names in chain order, for diagnostics.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.entries.iter().map(Entry::name).collect()
    }

    fn position_of(&self, id: TypeId) -> Option<usize> {
        self.entries.iter().position(|entry| entry.id == id)
    }

    /// Remove the interceptor of type `I`, if present.
    pub fn remove<I: 'static>(&mut self) {
        self.entries.retain(|entry| entry.id != TypeId::of::<I>());
    }

    /// Remove all entries.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Append an interceptor at the end of the chain. If the type is
    /// already present, its old entry is removed first.
    pub fn add<I, F>(&mut self, factory: F)
    where
        I: Interceptor<C, R>,
        F: Fn() -> I + Send + Sync + 'static,
    {
        self.remove::<I>();
        self.entries.push(Entry::new(factory));
    }

    /// Insert an interceptor at the start of the chain. Same dedup rule as
    /// [`Chain::add`].
    pub fn prepend<I, F>(&mut self, factory: F)
    where
        I: Interceptor<C, R>,
        F: Fn() -> I + Send + Sync + 'static,
    {
        self.remove::<I>();
        self.entries.insert(0, Entry::new(factory));
    }

    /// Insert interceptor `I` immediately before `Anchor`.
    ///
    /// When `I` is already in the chain, its existing entry is moved
    /// (keeping the originally supplied factory). When `Anchor` is absent,
    /// the entry lands at the start.
    pub fn insert_before<Anchor, I, F>(&mut self, factory: F)
    where
        Anchor: 'static,
        I: Interceptor<C, R>,
        F: Fn() -> I + Send + Sync + 'static,
    {
        let entry = match self.position::<I>() {
            Some(i) => self.entries.remove(i),
            None => Entry::new(factory),
        };
        let at = self.position_of(TypeId::of::<Anchor>()).unwrap_or(0);
        self.entries.insert(at, entry);
    }

    /// Insert interceptor `I` immediately after `Anchor`.
    ///
    /// Same reuse rule as [`Chain::insert_before`]. When `Anchor` is
    /// absent, the entry lands at the end.
    pub fn insert_after<Anchor, I, F>(&mut self, factory: F)
    where
        Anchor: 'static,
        I: Interceptor<C, R>,
        F: Fn() -> I + Send + Sync + 'static,
    {
        let entry = match self.position::<I>() {
            Some(i) => self.entries.remove(i),
            None => Entry::new(factory),
        };
        let at = self
            .position_of(TypeId::of::<Anchor>())
            .map_or(self.entries.len(), |i| i + 1);
        self.entries.insert(at, entry);
    }

    /// Invoke the chain around a terminal operation.
    ///
    /// An empty chain calls the terminal directly. Otherwise every entry is
    /// instantiated fresh for this invocation and traversed in order; the
    /// terminal runs when the last interceptor runs its continuation.
    ///
    /// # Errors
    ///
    /// Propagates any error from an interceptor or the terminal.
    pub fn invoke<F>(&self, ctx: &mut C, terminal: F) -> Result<R, CourierError>
    where
        F: FnOnce(&mut C) -> Result<R, CourierError>,
    {
        let mut terminal = Some(terminal);
        let mut terminal = move |ctx: &mut C| match terminal.take() {
            Some(f) => f(ctx),
            None => Err(CourierError::Internal("terminal invoked twice".into())),
        };

        if self.entries.is_empty() {
            return terminal(ctx);
        }

        let instances: Vec<Box<dyn Interceptor<C, R>>> =
            self.entries.iter().map(Entry::instantiate).collect();

        Next {
            rest: &instances,
            terminal: &mut terminal,
        }
        .run(ctx)
    }
}
