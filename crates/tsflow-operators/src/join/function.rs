//! Adapter around the user's two-argument row combiner.
//!
//! The external compiler turns `(left, right) => record` into a `RowFnCompiler`.
//! This module specializes it per partition against the concrete left and
//! right column layouts, and memoizes the compiled function by layout.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tsflow_core::hash::{hash_serde, Hash256};
use tsflow_core::prelude::{Error, Field, Record, Result};

/// Ambient evaluation context handed to every row function call.
///
/// Carries a cancellation flag that functions may observe. The merge loop
/// itself never checks it.
#[derive(Debug, Clone, Default)]
pub struct EvalContext {
    cancelled: Arc<AtomicBool>,
}

impl EvalContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal cancellation to every clone of this context.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// `Err` once the context has been cancelled.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Eval("evaluation cancelled".into()))
        } else {
            Ok(())
        }
    }
}

/// A row function specialized for one pair of input layouts.
pub trait RowFn: Send + Sync {
    fn eval(&self, ctx: &EvalContext, left: &Record, right: &Record) -> Result<Record>;
}

impl<F> RowFn for F
where
    F: Fn(&EvalContext, &Record, &Record) -> Result<Record> + Send + Sync,
{
    fn eval(&self, ctx: &EvalContext, left: &Record, right: &Record) -> Result<Record> {
        self(ctx, left, right)
    }
}

/// Produces a `RowFn` for concrete left/right column layouts.
pub trait RowFnCompiler: Send + Sync {
    fn compile(&self, left: &[Field], right: &[Field]) -> Result<Arc<dyn RowFn>>;
}

/// Compiler for a function that is already resolved and does not depend on
/// the input layouts.
pub struct FnCompiler {
    f: Arc<dyn RowFn>,
}

impl FnCompiler {
    pub fn new(f: impl RowFn + 'static) -> Self {
        Self { f: Arc::new(f) }
    }
}

impl RowFnCompiler for FnCompiler {
    fn compile(&self, _left: &[Field], _right: &[Field]) -> Result<Arc<dyn RowFn>> {
        Ok(Arc::clone(&self.f))
    }
}

/// The join function with its per-layout compilation cache.
pub struct JoinFn {
    compiler: Box<dyn RowFnCompiler>,
    compiled: HashMap<Hash256, Arc<dyn RowFn>>,
}

impl JoinFn {
    pub fn new(compiler: impl RowFnCompiler + 'static) -> Self {
        Self {
            compiler: Box::new(compiler),
            compiled: HashMap::new(),
        }
    }

    /// Wrap a plain closure `(ctx, left, right) -> record`.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&EvalContext, &Record, &Record) -> Result<Record> + Send + Sync + 'static,
    {
        Self::new(FnCompiler::new(f))
    }

    /// Specialize the function for one partition's layouts.
    ///
    /// Compilation happens once per distinct pair of layouts.
    pub fn prepare(&mut self, left: &[Field], right: &[Field]) -> Result<PreparedJoinFn> {
        let layout = hash_serde(&(left, right))?;
        if let Some(f) = self.compiled.get(&layout) {
            return Ok(PreparedJoinFn {
                f: Arc::clone(f),
                layout,
            });
        }
        let f = self.compiler.compile(left, right)?;
        #[cfg(feature = "tracing")]
        tracing::debug!(
            layout = layout.short(),
            left_cols = left.len(),
            right_cols = right.len(),
            "compiled join function"
        );
        self.compiled.insert(layout, Arc::clone(&f));
        Ok(PreparedJoinFn { f, layout })
    }

    /// Number of distinct layouts compiled so far.
    pub fn compiled_layouts(&self) -> usize {
        self.compiled.len()
    }
}

/// A join function specialized for one partition. Only obtainable through
/// `JoinFn::prepare`.
#[derive(Clone)]
pub struct PreparedJoinFn {
    f: Arc<dyn RowFn>,
    layout: Hash256,
}

impl PreparedJoinFn {
    /// Errors raised by the function are returned as-is.
    pub fn eval(&self, ctx: &EvalContext, left: &Record, right: &Record) -> Result<Record> {
        self.f.eval(ctx, left, right)
    }

    pub fn layout(&self) -> Hash256 {
        self.layout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use tsflow_core::prelude::{DataType, Scalar};

    struct CountingCompiler {
        compiles: Arc<AtomicUsize>,
    }

    impl RowFnCompiler for CountingCompiler {
        fn compile(&self, _left: &[Field], _right: &[Field]) -> Result<Arc<dyn RowFn>> {
            self.compiles.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(
                |_: &EvalContext, l: &Record, _: &Record| -> Result<Record> { Ok(l.clone()) },
            ))
        }
    }

    #[test]
    fn compiles_once_per_layout() {
        let compiles = Arc::new(AtomicUsize::new(0));
        let mut f = JoinFn::new(CountingCompiler {
            compiles: Arc::clone(&compiles),
        });
        let a = vec![Field::new("_time", DataType::Time)];
        let b = vec![
            Field::new("_time", DataType::Time),
            Field::new("v", DataType::Float64),
        ];

        let p1 = f.prepare(&a, &b).unwrap();
        let p2 = f.prepare(&a, &b).unwrap();
        assert_eq!(p1.layout(), p2.layout());
        assert_eq!(compiles.load(Ordering::SeqCst), 1);

        f.prepare(&b, &a).unwrap();
        assert_eq!(compiles.load(Ordering::SeqCst), 2);
        assert_eq!(f.compiled_layouts(), 2);
    }

    #[test]
    fn eval_errors_pass_through() {
        let mut f = JoinFn::from_fn(|_, _, _| Err(Error::Eval("boom".into())));
        let p = f.prepare(&[], &[]).unwrap();
        let err = p
            .eval(&EvalContext::new(), &Record::new(), &Record::new())
            .unwrap_err();
        assert_eq!(err.to_string(), "evaluation error: boom");
    }

    #[test]
    fn cancellation_is_shared_between_clones() {
        let ctx = EvalContext::new();
        let seen = ctx.clone();
        let mut f = JoinFn::from_fn(|ctx, l, _| {
            ctx.check()?;
            Ok(l.clone())
        });
        let p = f.prepare(&[], &[]).unwrap();
        let mut rec = Record::new();
        rec.set("v", Scalar::I64(1)).unwrap();
        assert!(p.eval(&seen, &rec, &Record::new()).is_ok());
        ctx.cancel();
        assert!(p.eval(&seen, &rec, &Record::new()).is_err());
    }
}
