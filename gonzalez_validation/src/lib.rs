/*!
# Validator functions for XML-related strings

This is a supplementary crate for [`gonzalez`](https://docs.rs/gonzalez). It
holds the character classifiers for XML 1.0 and XML 1.1 as well as functions
to validate entire names and character data runs. It is factored out of the
main crate so that the classifiers can be reused without pulling in the
parser.
*/
use std::fmt;

pub mod selectors;

use selectors::CharSelector;

/**
# XML specification version

The version governs which characters are acceptable in character data and
character references. Names are identical in both versions.
*/
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharClasses {
	/// Character productions of XML 1.0 (fifth edition)
	Xml10,
	/// Character productions of XML 1.1 (second edition)
	Xml11,
}

impl CharClasses {
	/// Return true if `c` may occur in character data of a document of this
	/// version, after all references have been expanded.
	pub fn is_char(self, c: char) -> bool {
		match self {
			Self::Xml10 => !selectors::CLASS_XML_NONCHAR.select(c),
			Self::Xml11 => {
				selectors::contained_in_ranges(c, selectors::VALID_XML11_CHAR_RANGES)
			}
		}
	}

	/// Return true if `c` may be the target of a character reference.
	///
	/// In XML 1.1, the restricted C0/C1 controls are only writable through
	/// references, so this is a larger set than what may appear literally.
	pub fn is_char_ref_target(self, c: char) -> bool {
		// NUL is excluded in both versions.
		self.is_char(c)
	}

	/// Return true if `c` may occur *literally* (outside a reference).
	pub fn is_literal_char(self, c: char) -> bool {
		match self {
			Self::Xml10 => self.is_char(c),
			Self::Xml11 => self.is_char(c) && !selectors::CLASS_XML11_RESTRICTED.select(c),
		}
	}
}

/**
Error condition from validating an XML string.
*/
#[derive(Debug, Clone)]
pub enum Error {
	/// A Name or NCName was empty.
	EmptyName,
	/// An invalid character was encountered.
	///
	/// This variant contains the character as data.
	InvalidChar(char),
}

impl fmt::Display for Error {
	fn fmt<'f>(&self, f: &'f mut fmt::Formatter) -> fmt::Result {
		match self {
			Self::EmptyName => f.write_str("Name and NCName must not be empty"),
			Self::InvalidChar(c) => write!(f, "character U+{:04x} is not allowed", *c as u32),
		}
	}
}

impl std::error::Error for Error {}

/// Single pass over a name candidate, position-aware: the first character
/// is held against the NameStartChar production, everything after it
/// against NameChar. Returns the offending character, if any.
fn first_invalid_name_char(s: &str, forbid_colon: bool) -> Option<char> {
	s.char_indices().find_map(|(i, ch)| {
		if forbid_colon && ch == ':' {
			return Some(ch);
		}
		let class = if i == 0 {
			&selectors::CLASS_XML_NAMESTART
		} else {
			&selectors::CLASS_XML_NAME
		};
		if class.select(ch) {
			None
		} else {
			Some(ch)
		}
	})
}

/**
Check whether a str is a valid XML Name

# Example

```rust
use gonzalez_validation::{validate_name, Error};

assert!(validate_name("foobar").is_ok());
assert!(validate_name("foo:bar").is_ok());
assert!(matches!(validate_name("foo bar"), Err(Error::InvalidChar(' '))));
assert!(matches!(validate_name(""), Err(Error::EmptyName)));
```
*/
pub fn validate_name(s: &str) -> Result<(), Error> {
	if s.is_empty() {
		return Err(Error::EmptyName);
	}
	match first_invalid_name_char(s, false) {
		Some(ch) => Err(Error::InvalidChar(ch)),
		None => Ok(()),
	}
}

/**
Check whether a str is a valid XML Name, without colons.

# Example

```rust
use gonzalez_validation::{validate_ncname, Error};

assert!(validate_ncname("foobar").is_ok());
assert!(matches!(validate_ncname("foo:bar"), Err(Error::InvalidChar(':'))));
assert!(matches!(validate_ncname(""), Err(Error::EmptyName)));
```
*/
pub fn validate_ncname(s: &str) -> Result<(), Error> {
	if s.is_empty() {
		return Err(Error::EmptyName);
	}
	match first_invalid_name_char(s, true) {
		Some(ch) => Err(Error::InvalidChar(ch)),
		None => Ok(()),
	}
}

/**
Check whether a str consists only of characters acceptable under the given
XML version's Char production, in a single pass.
*/
pub fn validate_chars(classes: CharClasses, s: &str) -> Result<(), Error> {
	match s.chars().find(|&ch| !classes.is_char(ch)) {
		Some(ch) => Err(Error::InvalidChar(ch)),
		None => Ok(()),
	}
}

/**
Check whether a str is valid XML 1.0 character data

# Example

```rust
use gonzalez_validation::{validate_cdata, Error};

assert!(validate_cdata("foo bar baz <fnord!>").is_ok());
assert!(matches!(validate_cdata("\x01"), Err(Error::InvalidChar('\x01'))));
```
*/
pub fn validate_cdata(s: &str) -> Result<(), Error> {
	validate_chars(CharClasses::Xml10, s)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_cdata_smoketest() {
		assert!(validate_cdata("foo bar baz http://<xyz>").is_ok());
		assert!(validate_cdata("\u{ffff}").is_err());
	}

	#[test]
	fn test_name_smoketest() {
		assert!(validate_name("foobar").is_ok());
		assert!(validate_name("foo:bar").is_ok());
		assert!(validate_name("").is_err());
		assert!(validate_name("foo bar baz http://<xyz>").is_err());
		assert!(validate_name("\u{ffff}").is_err());
	}

	#[test]
	fn test_ncname_smoketest() {
		assert!(validate_ncname("foobar").is_ok());
		assert!(validate_ncname("foo:bar").is_err());
		assert!(validate_ncname("").is_err());
		assert!(validate_ncname("foo bar baz http://<xyz>").is_err());
		assert!(validate_ncname("\u{ffff}").is_err());
	}

	#[test]
	fn test_validate_chars_is_version_aware() {
		assert!(validate_chars(CharClasses::Xml10, "\x01").is_err());
		assert!(validate_chars(CharClasses::Xml11, "\x01").is_ok());
		assert!(validate_chars(CharClasses::Xml11, "\x00").is_err());
	}

	#[test]
	fn test_version_literal_chars() {
		assert!(CharClasses::Xml10.is_literal_char('a'));
		assert!(!CharClasses::Xml10.is_literal_char('\x01'));
		assert!(!CharClasses::Xml11.is_literal_char('\x01'));
		assert!(CharClasses::Xml11.is_char_ref_target('\x01'));
		assert!(!CharClasses::Xml10.is_char_ref_target('\x01'));
		assert!(!CharClasses::Xml11.is_char_ref_target('\x00'));
	}
}
