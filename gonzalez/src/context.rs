use std::borrow::Cow;
use std::fmt;

#[cfg(all(feature = "interning", feature = "mt"))]
use std::sync::{Mutex, MutexGuard, Weak};
#[cfg(all(feature = "interning", not(feature = "mt")))]
use std::cell::{RefCell, RefMut};
#[cfg(all(feature = "interning", not(feature = "mt")))]
use std::rc::Weak;

#[cfg(not(feature = "mt"))]
use std::rc::Rc;
#[cfg(feature = "mt")]
use std::sync::Arc;

use crate::strings;

/// Wrapper pointer around interned strings
///
/// In builds with the `mt` feature, this is an [`Arc`]. In non-`mt` builds,
/// this is a [`std::rc::Rc`].
#[cfg(feature = "mt")]
pub type RcPtr<T> = Arc<T>;
/// Wrapper pointer around interned strings
///
/// In builds with the `mt` feature, this is a [`std::sync::Arc`].
/// In non-`mt` builds, this is a [`Rc`].
#[cfg(not(feature = "mt"))]
pub type RcPtr<T> = Rc<T>;

#[cfg(feature = "interning")]
type CDataWeakSet = weak_table::WeakHashSet<Weak<strings::CData>>;

/**
# Shared interning context for parsers

This context allows parsers to share data. This is useful in cases where many
parsers are used in the same application, and all of them encountering
similar data, most notably namespace URIs.

Interned strings are held through weak pointers; when the last parse which
referenced a string ends, the string is released. Nothing outlives its users
(the `string-interning` option of the parser maps to using or not using a
shared context).

Even though the context is internally mutable, it can safely be shared with
an immutable reference between parsers. If the crate is built with the `mt`
feature, the Context is Send and Sync, otherwise it is neither.
*/
pub struct Context {
	#[cfg(all(feature = "interning", feature = "mt"))]
	interned: Mutex<CDataWeakSet>,
	#[cfg(all(feature = "interning", not(feature = "mt")))]
	interned: RefCell<CDataWeakSet>,
}

impl Context {
	#[cfg(all(feature = "interning", feature = "mt"))]
	fn wrap_set(set: CDataWeakSet) -> Mutex<CDataWeakSet> {
		Mutex::new(set)
	}

	#[cfg(all(feature = "interning", not(feature = "mt")))]
	fn wrap_set(set: CDataWeakSet) -> RefCell<CDataWeakSet> {
		RefCell::new(set)
	}

	/// Create a new context
	pub fn new() -> Context {
		Context {
			#[cfg(feature = "interning")]
			interned: Self::wrap_set(weak_table::WeakHashSet::new()),
		}
	}

	#[cfg(all(feature = "interning", feature = "mt"))]
	fn lock_set<'a>(&'a self) -> MutexGuard<'a, CDataWeakSet> {
		self.interned.lock().unwrap()
	}

	#[cfg(all(feature = "interning", not(feature = "mt")))]
	fn lock_set<'a>(&'a self) -> RefMut<'a, CDataWeakSet> {
		self.interned.borrow_mut()
	}

	/// Intern a piece of text
	///
	/// The given cdata is interned in the context and a refcounted pointer
	/// is returned. When the last reference to that pointer expires, the
	/// string will be lazily removed from the internal storage.
	///
	/// The optimal course is taken depending on whether the Cow is borrowed
	/// or owned.
	pub fn intern_cdata<'a, T: Into<Cow<'a, strings::CDataStr>>>(
		&self,
		s: T,
	) -> RcPtr<strings::CData> {
		let s = s.into();
		#[cfg(feature = "interning")]
		{
			let mut interned = self.lock_set();
			return match interned.get(&*s) {
				Some(ptr) => ptr,
				None => {
					let ptr = RcPtr::new(s.into_owned());
					interned.insert(ptr.clone());
					ptr
				}
			};
		}
		#[cfg(not(feature = "interning"))]
		RcPtr::new(s.into_owned())
	}

	/// Remove all unreferenced strings from storage and shrink the storage
	/// to fit the requirements.
	pub fn release_temporaries(&self) {
		#[cfg(feature = "interning")]
		{
			let mut interned = self.lock_set();
			interned.remove_expired();
			interned.shrink_to_fit();
		}
	}
}

impl fmt::Debug for Context {
	fn fmt<'f>(&self, f: &'f mut fmt::Formatter) -> fmt::Result {
		f.debug_struct("Context").finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::convert::TryInto;

	#[test]
	fn intern_returns_equal_strings() {
		let ctx = Context::new();
		let c1: strings::CData = "urn:example".try_into().unwrap();
		let p1 = ctx.intern_cdata(Cow::Owned(c1.clone()));
		let p2 = ctx.intern_cdata(Cow::Owned(c1));
		assert_eq!(&*p1, &*p2);
		#[cfg(feature = "interning")]
		assert!(RcPtr::ptr_eq(&p1, &p2));
	}
}
