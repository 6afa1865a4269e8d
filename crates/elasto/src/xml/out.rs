//! Shared output cell for finder results (spec.md §4.4).

use std::cell::RefCell;
use std::rc::Rc;

/// A handle a finder writes its decoded value into. Cloning shares the
/// same cell, so callers keep a handle after registering a finder and
/// read it back once [`super::XmlDoc::parse`] returns.
#[derive(Debug)]
pub struct Out<T>(Rc<RefCell<Option<T>>>);

impl<T> Clone for Out<T> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<T> Default for Out<T> {
    fn default() -> Self {
        Self(Rc::new(RefCell::new(None)))
    }
}

impl<T: Clone> Out<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self) -> Option<T> {
        self.0.borrow().clone()
    }

    #[must_use]
    pub fn is_present(&self) -> bool {
        self.0.borrow().is_some()
    }

    pub(super) fn set(&self, value: T) {
        *self.0.borrow_mut() = Some(value);
    }
}
