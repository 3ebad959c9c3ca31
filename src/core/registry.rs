//! Run-scoped name→holder registry.
//!
//! Each file name maps to one live holder for the lifetime of a run. Handles
//! are shared `Rc<RefCell<_>>` values; the registry keeps a type-erased copy
//! for lookup and another for teardown.

use std::any::{type_name, Any};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use tracing::{debug, warn};

use super::holder::Holder;
use crate::matrix::{Matrix, MatrixLoader};
use crate::mdoc::MDocument;
use crate::table::{InputOptions, InputReader, OutputOptions, OutputWriter};
use crate::util::{Element, Error, Result};

/// Shared handle to a registered holder.
pub type Handle<H> = Rc<RefCell<H>>;

struct Entry {
    name: String,
    any: Rc<dyn Any>,
    holder: Rc<RefCell<dyn Holder>>,
}

#[derive(Default)]
struct Inner {
    /// Creation order.
    entries: Vec<Entry>,
    index: HashMap<String, usize>,
}

/// Outcome of [`Registry::close`].
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TeardownReport {
    /// Holders closed without error.
    pub closed: usize,
    /// `(name, message)` for each holder whose close failed.
    pub failures: Vec<(String, String)>,
}

impl TeardownReport {
    #[inline]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Turn recorded failures into [`Error::Teardown`].
    pub fn into_result(self) -> Result<()> {
        if self.failures.is_empty() {
            Ok(())
        } else {
            Err(Error::Teardown(self.failures))
        }
    }
}

/// Owns every holder created during one run.
///
/// Lookups are idempotent by name. Creation may call back into the registry
/// (a holder built from inside another holder's constructor); no borrow is
/// held while a constructor runs.
#[derive(Default)]
pub struct Registry {
    inner: RefCell<Inner>,
    closed: Cell<bool>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the holder bound to `name`, creating it with `create` on first use.
    pub fn holder<H: Holder>(
        &self,
        name: impl AsRef<str>,
        create: impl FnOnce() -> H,
    ) -> Result<Handle<H>> {
        let name = name.as_ref();
        if let Some(found) = self.lookup::<H>(name)? {
            return Ok(found);
        }
        if self.closed.get() {
            return Err(Error::Closed(name.to_string()));
        }

        let created: Handle<H> = Rc::new(RefCell::new(create()));

        let existing = {
            let mut inner = self.inner.borrow_mut();
            match inner.index.get(name) {
                Some(&i) => Some(Rc::clone(&inner.entries[i].any)),
                None => {
                    let any: Rc<dyn Any> = created.clone();
                    let holder: Rc<RefCell<dyn Holder>> = created.clone();
                    let slot = inner.entries.len();
                    inner.entries.push(Entry { name: name.to_string(), any, holder });
                    inner.index.insert(name.to_string(), slot);
                    None
                }
            }
        };

        match existing {
            // Bound by a reentrant call while `create` ran; first one wins.
            // The duplicate is dropped with no borrow held, so its own
            // teardown may use the registry. Side effects of building it
            // (such as truncating a shared output path) have already happened.
            Some(any) => {
                debug!(holder = name, "discarding duplicate created during reentrant lookup");
                drop(created);
                downcast::<H>(name, &any)
            }
            None => {
                debug!(holder = name, kind = type_name::<H>(), "registered");
                Ok(created)
            }
        }
    }

    /// Existing holder bound to `name`, if any.
    pub fn lookup<H: Holder>(&self, name: &str) -> Result<Option<Handle<H>>> {
        let inner = self.inner.borrow();
        match inner.index.get(name) {
            Some(&i) => downcast::<H>(name, &inner.entries[i].any).map(Some),
            None => Ok(None),
        }
    }

    /// Matrix loaded from `name`. Unreadable files yield the 1×1 zero matrix.
    pub fn matrix<T: Element>(&self, name: &str, exponent: i32) -> Result<Handle<Matrix<T>>> {
        self.holder(name, || MatrixLoader::load::<T>(name, exponent))
    }

    /// Tabular input from `name`. Options only apply on first use.
    pub fn input(&self, name: &str, options: InputOptions) -> Result<Handle<InputReader>> {
        self.holder(name, || InputReader::open_or_empty(name, options))
    }

    /// Tabular output to `name`. Options only apply on first use.
    pub fn output(&self, name: &str, options: OutputOptions) -> Result<Handle<OutputWriter>> {
        self.holder(name, || OutputWriter::create_or_discard(name, options))
    }

    /// M document from `name`. Unreadable files read as an empty document.
    pub fn mfile(&self, name: &str) -> Result<Handle<MDocument>> {
        self.holder(name, || MDocument::open_or_empty(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.borrow().index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registered names in creation order.
    pub fn names(&self) -> Vec<String> {
        self.inner.borrow().entries.iter().map(|e| e.name.clone()).collect()
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed.get()
    }

    /// Close every holder in reverse creation order.
    ///
    /// Failures are logged and collected, never propagated; teardown always
    /// visits every holder. Later calls find nothing left to close.
    pub fn close(&self) -> TeardownReport {
        self.closed.set(true);
        let entries = {
            let mut inner = self.inner.borrow_mut();
            inner.index.clear();
            std::mem::take(&mut inner.entries)
        };

        let mut report = TeardownReport::default();
        for entry in entries.into_iter().rev() {
            let result = match entry.holder.try_borrow_mut() {
                Ok(mut holder) => holder.close(),
                Err(_) => Err(Error::other("holder still borrowed at teardown")),
            };
            match result {
                Ok(()) => report.closed += 1,
                Err(e) => {
                    warn!(holder = %entry.name, error = %e, "close failed during teardown");
                    report.failures.push((entry.name, e.to_string()));
                }
            }
        }
        debug!(closed = report.closed, failed = report.failures.len(), "registry torn down");
        report
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        if !self.closed.get() {
            self.close();
        }
    }
}

fn downcast<H: Holder>(name: &str, any: &Rc<dyn Any>) -> Result<Handle<H>> {
    Rc::clone(any)
        .downcast::<RefCell<H>>()
        .map_err(|_| Error::HolderTypeMismatch {
            name: name.to_string(),
            expected: type_name::<H>(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    type Log = Rc<RefCell<Vec<String>>>;

    struct Recorder {
        id: &'static str,
        log: Log,
        fail: bool,
    }

    impl Recorder {
        fn new(id: &'static str, log: &Log) -> Self {
            Self { id, log: log.clone(), fail: false }
        }
    }

    impl Holder for Recorder {
        fn close(&mut self) -> Result<()> {
            self.log.borrow_mut().push(self.id.to_string());
            if self.fail {
                Err(Error::other(format!("{} refused", self.id)))
            } else {
                Ok(())
            }
        }
    }

    struct Other;
    impl Holder for Other {}

    #[test]
    fn test_idempotent_lookup() {
        let log = Log::default();
        let registry = Registry::new();
        let a = registry.holder("a", || Recorder::new("a", &log)).unwrap();
        let again = registry.holder("a", || Recorder::new("x", &log)).unwrap();
        assert!(Rc::ptr_eq(&a, &again));
        assert_eq!(again.borrow().id, "a");

        let b = registry.holder("b", || Recorder::new("b", &log)).unwrap();
        assert!(!Rc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.names(), vec!["a", "b"]);
    }

    #[test]
    fn test_type_mismatch() {
        let log = Log::default();
        let registry = Registry::new();
        registry.holder("a", || Recorder::new("a", &log)).unwrap();
        match registry.holder("a", || Other) {
            Err(Error::HolderTypeMismatch { name, .. }) => assert_eq!(name, "a"),
            _ => panic!("expected type mismatch"),
        }
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_reentrant_create() {
        let log = Log::default();
        let registry = Registry::new();
        let outer = registry
            .holder("outer", || {
                registry.holder("inner", || Recorder::new("inner", &log)).unwrap();
                Recorder::new("outer", &log)
            })
            .unwrap();
        assert_eq!(outer.borrow().id, "outer");
        assert_eq!(registry.names(), vec!["inner", "outer"]);
    }

    #[test]
    fn test_reentrant_same_name_first_wins() {
        let log = Log::default();
        let registry = Registry::new();
        let got = registry
            .holder("a", || {
                registry.holder("a", || Recorder::new("first", &log)).unwrap();
                Recorder::new("second", &log)
            })
            .unwrap();
        assert_eq!(got.borrow().id, "first");
        assert_eq!(registry.len(), 1);
    }

    /// Looks the registry up from its destructor.
    struct Watcher {
        registry: std::rc::Weak<Registry>,
        seen: Rc<Cell<Option<bool>>>,
    }

    impl Holder for Watcher {}

    impl Drop for Watcher {
        fn drop(&mut self) {
            if let Some(registry) = self.registry.upgrade() {
                self.seen.set(Some(registry.contains("a")));
            }
        }
    }

    #[test]
    fn test_discarded_duplicate_dropped_without_borrow() {
        let registry = Rc::new(Registry::new());
        let seen = Rc::new(Cell::new(None));
        let weak = Rc::downgrade(&registry);
        let got = registry
            .holder("a", || {
                registry
                    .holder("a", || Watcher { registry: std::rc::Weak::new(), seen: Rc::default() })
                    .unwrap();
                Watcher { registry: weak.clone(), seen: seen.clone() }
            })
            .unwrap();
        assert_eq!(seen.get(), Some(true));
        let again = registry.lookup::<Watcher>("a").unwrap().unwrap();
        assert!(Rc::ptr_eq(&got, &again));
    }

    #[test]
    fn test_teardown_reverse_order_and_failures() {
        let log = Log::default();
        let registry = Registry::new();
        registry.holder("a", || Recorder::new("a", &log)).unwrap();
        registry
            .holder("b", || Recorder { fail: true, ..Recorder::new("b", &log) })
            .unwrap();
        registry.holder("c", || Recorder::new("c", &log)).unwrap();

        let report = registry.close();
        assert_eq!(*log.borrow(), vec!["c", "b", "a"]);
        assert_eq!(report.closed, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0, "b");
        assert!(matches!(report.into_result(), Err(Error::Teardown(_))));

        assert!(registry.is_closed());
        assert!(registry.is_empty());
        assert!(matches!(
            registry.holder("d", || Recorder::new("d", &log)),
            Err(Error::Closed(_))
        ));
        assert!(registry.close().is_clean());
    }

    #[test]
    fn test_teardown_with_outstanding_borrow() {
        let log = Log::default();
        let registry = Registry::new();
        let a = registry.holder("a", || Recorder::new("a", &log)).unwrap();
        let _guard = a.borrow_mut();
        let report = registry.close();
        assert_eq!(report.closed, 0);
        assert_eq!(report.failures.len(), 1);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_drop_closes() {
        let log = Log::default();
        {
            let registry = Registry::new();
            registry.holder("a", || Recorder::new("a", &log)).unwrap();
        }
        assert_eq!(*log.borrow(), vec!["a"]);
    }

    #[test]
    fn test_matrix_helper_missing_file() {
        let registry = Registry::new();
        let m = registry.matrix::<f64>("no/such/matrix.txt", 0).unwrap();
        assert_eq!((m.borrow().rows(), m.borrow().columns()), (1, 1));
        let again = registry.matrix::<f64>("no/such/matrix.txt", 0).unwrap();
        assert!(Rc::ptr_eq(&m, &again));
        assert!(registry.matrix::<i32>("no/such/matrix.txt", 10).is_err());
    }

    #[test]
    fn test_mfile_helper_shares_names() {
        let registry = Registry::new();
        let doc = registry.mfile("no/such/params.n2a").unwrap();
        assert!(doc.borrow().root().is_empty());
        let again = registry.mfile("no/such/params.n2a").unwrap();
        assert!(Rc::ptr_eq(&doc, &again));
        assert!(matches!(
            registry.matrix::<f64>("no/such/params.n2a", 0),
            Err(Error::HolderTypeMismatch { .. })
        ));
    }
}
