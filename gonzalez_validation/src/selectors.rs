/*!
# Codepoint classes for XML 1.0 and XML 1.1

The tables in this module encode the character productions of the two XML
recommendations. They are implementation details of `gonzalez` and
`gonzalez_validation` and should not be relied upon by user code.
*/
use std::fmt;

/**
# Predicate trait for matching chars
*/
pub trait CharSelector {
	/// Return true if the given char is selected by the selector
	fn select(&self, c: char) -> bool;
}

/// Selects all chars
#[derive(Debug, Copy, Clone)]
pub struct AllChars();

impl CharSelector for char {
	fn select(&self, c: char) -> bool {
		*self == c
	}
}

impl CharSelector for &'_ [char] {
	fn select(&self, c: char) -> bool {
		for r in self.iter() {
			if *r == c {
				return true;
			}
		}
		false
	}
}

impl CharSelector for AllChars {
	fn select(&self, _c: char) -> bool {
		true
	}
}

/// Selects all chars from a range (including both ends, because some of the
/// edge points are not valid `char`s in Rust)
pub struct CodepointRange(pub char, pub char);

impl CodepointRange {
	pub fn contains(&self, c: char) -> bool {
		(self.0 <= c) && (c <= self.1)
	}
}

/// Selects all chars from any of the contained ranges
#[derive(Copy)]
pub struct CodepointRanges(pub &'static [CodepointRange]);

impl CharSelector for CodepointRange {
	fn select(&self, c: char) -> bool {
		self.contains(c)
	}
}

impl CharSelector for CodepointRanges {
	fn select(&self, c: char) -> bool {
		contained_in_ranges(c, self.0)
	}
}

pub fn contained_in_ranges(c: char, rs: &[CodepointRange]) -> bool {
	for r in rs.iter() {
		if r.contains(c) {
			return true;
		}
	}
	false
}

impl fmt::Debug for CodepointRanges {
	fn fmt<'f>(&self, f: &'f mut fmt::Formatter) -> fmt::Result {
		write!(f, "CodepointRanges(<{} ranges>)", self.0.len())
	}
}

impl Clone for CodepointRanges {
	fn clone(&self) -> Self {
		CodepointRanges(self.0)
	}
}

impl PartialEq for CodepointRanges {
	fn eq(&self, other: &CodepointRanges) -> bool {
		std::ptr::eq(&self.0, &other.0)
	}
}

/// Valid codepoints for character data (XML 1.0 § 2.2 [2])
pub const VALID_XML10_CHAR_RANGES: &'static [CodepointRange] = &[
	CodepointRange('\x09', '\x0a'),
	CodepointRange('\x0d', '\x0d'),
	CodepointRange('\u{0020}', '\u{d7ff}'),
	CodepointRange('\u{e000}', '\u{fffd}'),
	CodepointRange('\u{10000}', '\u{10ffff}'),
];

/// Invalid codepoints for character data (XML 1.0 § 2.2 [2])
///
/// Note that values which are not valid Rust characters (the surrogate
/// block) are not included in these ranges.
pub const INVALID_XML10_CHAR_RANGES: &'static [CodepointRange] = &[
	CodepointRange('\x00', '\x08'),
	CodepointRange('\x0b', '\x0c'),
	CodepointRange('\x0e', '\x1f'),
	CodepointRange('\u{fffe}', '\u{ffff}'),
];

/// Valid codepoints for character data (XML 1.1 § 2.2 [2])
///
/// XML 1.1 admits the C0 controls (except NUL) which XML 1.0 forbids; most
/// of them are only writable as character references, but after reference
/// expansion they are legal document characters.
pub const VALID_XML11_CHAR_RANGES: &'static [CodepointRange] = &[
	CodepointRange('\x01', '\u{d7ff}'),
	CodepointRange('\u{e000}', '\u{fffd}'),
	CodepointRange('\u{10000}', '\u{10ffff}'),
];

/// Codepoints which XML 1.1 § 2.2 [2a] restricts to character references.
pub const RESTRICTED_XML11_CHAR_RANGES: &'static [CodepointRange] = &[
	CodepointRange('\x01', '\x08'),
	CodepointRange('\x0b', '\x0c'),
	CodepointRange('\x0e', '\x1f'),
	CodepointRange('\u{7f}', '\u{84}'),
	CodepointRange('\u{86}', '\u{9f}'),
];

const VALID_XML_NAME_START_RANGES: &'static [CodepointRange] = &[
	CodepointRange(':', ':'),
	CodepointRange('A', 'Z'),
	CodepointRange('_', '_'),
	CodepointRange('a', 'z'),
	CodepointRange('\u{c0}', '\u{d6}'),
	CodepointRange('\u{d8}', '\u{f6}'),
	CodepointRange('\u{f8}', '\u{2ff}'),
	CodepointRange('\u{370}', '\u{37d}'),
	CodepointRange('\u{37f}', '\u{1fff}'),
	CodepointRange('\u{200c}', '\u{200d}'),
	CodepointRange('\u{2070}', '\u{218f}'),
	CodepointRange('\u{2c00}', '\u{2fef}'),
	CodepointRange('\u{3001}', '\u{d7ff}'),
	CodepointRange('\u{f900}', '\u{fdcf}'),
	CodepointRange('\u{10000}', '\u{effff}'),
];

const VALID_XML_NAME_RANGES: &'static [CodepointRange] = &[
	CodepointRange(':', ':'),
	CodepointRange('-', '-'),
	CodepointRange('.', '.'),
	CodepointRange('A', 'Z'),
	CodepointRange('_', '_'),
	CodepointRange('0', '9'),
	CodepointRange('a', 'z'),
	CodepointRange('\u{b7}', '\u{b7}'),
	CodepointRange('\u{c0}', '\u{d6}'),
	CodepointRange('\u{d8}', '\u{f6}'),
	CodepointRange('\u{f8}', '\u{2ff}'),
	CodepointRange('\u{300}', '\u{36f}'),
	CodepointRange('\u{370}', '\u{37d}'),
	CodepointRange('\u{37f}', '\u{1fff}'),
	CodepointRange('\u{200c}', '\u{200d}'),
	CodepointRange('\u{203f}', '\u{2040}'),
	CodepointRange('\u{2070}', '\u{218f}'),
	CodepointRange('\u{2c00}', '\u{2fef}'),
	CodepointRange('\u{3001}', '\u{d7ff}'),
	CodepointRange('\u{f900}', '\u{fdcf}'),
	CodepointRange('\u{10000}', '\u{effff}'),
];

/// Valid non-first characters for an XML Name (XML 1.0 § 2.3 [4a])
///
/// The production is byte-for-byte identical in XML 1.1.
pub static CLASS_XML_NAME: CodepointRanges = CodepointRanges(VALID_XML_NAME_RANGES);

/// Valid first characters for an XML Name (XML 1.0 § 2.3 [4])
pub static CLASS_XML_NAMESTART: CodepointRanges = CodepointRanges(VALID_XML_NAME_START_RANGES);

/// Codepoints which may never occur in XML 1.0 character data
pub static CLASS_XML_NONCHAR: CodepointRanges = CodepointRanges(INVALID_XML10_CHAR_RANGES);

/// Codepoints which XML 1.1 only admits through character references
pub static CLASS_XML11_RESTRICTED: CodepointRanges =
	CodepointRanges(RESTRICTED_XML11_CHAR_RANGES);

/// XML whitespace (XML 1.0 § 2.3 [3])
pub static CLASS_XML_SPACE: &'static [char] = &[' ', '\t', '\r', '\n'];

/// Return true if the char is an XML whitespace character.
pub fn is_xml_space(c: char) -> bool {
	CLASS_XML_SPACE.select(c)
}

/// Return true if the char is an ASCII decimal digit.
pub fn is_decimal_digit(c: char) -> bool {
	('0'..='9').contains(&c)
}

/// Return true if the char is an ASCII hexadecimal digit.
pub fn is_hexadecimal_digit(c: char) -> bool {
	('0'..='9').contains(&c) || ('a'..='f').contains(&c) || ('A'..='F').contains(&c)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn char10_inclusion_and_exclusion_are_equivalent() {
		let excluder = CodepointRanges(INVALID_XML10_CHAR_RANGES);
		let includer = CodepointRanges(VALID_XML10_CHAR_RANGES);
		for cp in 0x0..=0x10ffffu32 {
			if let Some(ch) = std::char::from_u32(cp) {
				if !includer.select(ch) != excluder.select(ch) {
					panic!("char tables disagree about U+{:x}", cp)
				}
			}
		}
	}

	#[test]
	fn char11_admits_c0_controls_but_not_nul() {
		let includer = CodepointRanges(VALID_XML11_CHAR_RANGES);
		assert!(!includer.select('\x00'));
		assert!(includer.select('\x01'));
		assert!(includer.select('\x0b'));
		assert!(includer.select('\u{85}'));
	}

	#[test]
	fn char11_restricted_is_subset_of_valid() {
		let includer = CodepointRanges(VALID_XML11_CHAR_RANGES);
		let restricted = CodepointRanges(RESTRICTED_XML11_CHAR_RANGES);
		for cp in 0x0..=0x10ffffu32 {
			if let Some(ch) = std::char::from_u32(cp) {
				if restricted.select(ch) {
					assert!(includer.select(ch), "U+{:x} restricted but not valid", cp);
				}
			}
		}
	}

	#[test]
	fn namestart_is_subset_of_name() {
		for cp in 0x0..=0x10ffffu32 {
			if let Some(ch) = std::char::from_u32(cp) {
				if CLASS_XML_NAMESTART.select(ch) {
					assert!(CLASS_XML_NAME.select(ch), "U+{:x} in NameStart but not Name", cp);
				}
			}
		}
	}

	#[test]
	fn digit_classifiers() {
		assert!(is_decimal_digit('7'));
		assert!(!is_decimal_digit('a'));
		assert!(is_hexadecimal_digit('a'));
		assert!(is_hexadecimal_digit('F'));
		assert!(!is_hexadecimal_digit('g'));
	}
}
