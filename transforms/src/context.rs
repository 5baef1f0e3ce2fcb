//! Scoped pass configuration.
//!
//! A [`PassContext`] carries the options every pass may consult. Entering a
//! context pushes it onto a per-thread stack for the lifetime of the returned
//! guard; [`PassContext::current`] reads the innermost one.
//!
//! ```
//! use kiln_dtype::DType;
//! use kiln_transforms::PassContext;
//!
//! let ctx = PassContext::builder().precision(DType::Float16).build();
//! {
//!     let _guard = ctx.enter();
//!     assert_eq!(PassContext::current().precision(), Some(DType::Float16));
//! }
//! assert_eq!(PassContext::current().precision(), None);
//! ```

use std::cell::RefCell;
use std::marker::PhantomData;
use std::sync::Arc;

use bon::bon;
use kiln_dtype::DType;
use snafu::ensure;

use crate::error::{ConflictingParallelKSnafu, Result};
use crate::instrument::PassInstrument;

/// How reductions may be split along an extra parallel dimension.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[derive(strum::Display, strum::EnumString, strum::EnumIter)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ParallelK {
    /// Never split reductions.
    Disabled,
    /// Pick one split factor heuristically.
    #[default]
    Default,
    /// Record every candidate factor for a downstream tuner.
    Search,
}

impl ParallelK {
    /// Mode from the pair of boolean switches used on command lines.
    pub fn from_flags(disabled: bool, search: bool) -> Result<Self> {
        ensure!(!(disabled && search), ConflictingParallelKSnafu);
        Ok(match (disabled, search) {
            (true, _) => Self::Disabled,
            (_, true) => Self::Search,
            _ => Self::Default,
        })
    }
}

/// Options consulted by passes during one `optimize` run.
#[derive(Clone, Default, derive_more::Debug)]
pub struct PassContext {
    precision: Option<DType>,
    reduce_precision: Option<DType>,
    parallel_k: ParallelK,
    #[debug(skip)]
    instruments: Vec<Arc<dyn PassInstrument>>,
}

#[bon]
impl PassContext {
    #[builder]
    pub fn new(
        precision: Option<DType>,
        reduce_precision: Option<DType>,
        #[builder(default)] parallel_k: ParallelK,
        #[builder(default)] instruments: Vec<Arc<dyn PassInstrument>>,
    ) -> Self {
        Self { precision, reduce_precision, parallel_k, instruments }
    }
}

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<PassContext>> = RefCell::default();
}

impl PassContext {
    /// Type intermediate tensor values are narrowed to.
    pub fn precision(&self) -> Option<DType> {
        self.precision
    }

    /// Type of reduction accumulators.
    pub fn reduce_precision(&self) -> Option<DType> {
        self.reduce_precision
    }

    pub fn parallel_k(&self) -> ParallelK {
        self.parallel_k
    }

    pub fn instruments(&self) -> &[Arc<dyn PassInstrument>] {
        &self.instruments
    }

    /// Copy of this context with `instrument` appended.
    pub fn with_instrument(&self, instrument: Arc<dyn PassInstrument>) -> Self {
        let mut ctx = self.clone();
        ctx.instruments.push(instrument);
        ctx
    }

    /// Make this context current on this thread until the guard is dropped.
    pub fn enter(&self) -> PassContextGuard {
        let depth = CONTEXT_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            stack.push(self.clone());
            stack.len()
        });
        PassContextGuard { depth, _not_send: PhantomData }
    }

    /// Innermost entered context on this thread, or the default context.
    pub fn current() -> Self {
        CONTEXT_STACK.with(|stack| stack.borrow().last().cloned().unwrap_or_default())
    }

    /// Number of contexts entered on this thread.
    pub fn depth() -> usize {
        CONTEXT_STACK.with(|stack| stack.borrow().len())
    }
}

/// Keeps a [`PassContext`] current; leaving scope restores the previous one.
#[must_use = "the context is exited as soon as the guard is dropped"]
pub struct PassContextGuard {
    depth: usize,
    // Tied to the thread whose stack it pushed onto.
    _not_send: PhantomData<*const ()>,
}

impl Drop for PassContextGuard {
    fn drop(&mut self) {
        CONTEXT_STACK.with(|stack| stack.borrow_mut().truncate(self.depth - 1));
    }
}
