/*!
# Byte-level character classes for the tokenizer

The hot paths of the lexer work on raw UTF-8 bytes. These classes are coarse
on purpose: every multi-byte UTF-8 sequence is let through and fine-grained
codepoint checking happens when a token is materialized (see
[`crate::strings`]).
*/

pub trait ByteSelect {
	fn select(&self, b: u8) -> bool;
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct ByteRange(u8, u8);

impl ByteSelect for ByteRange {
	fn select(&self, b: u8) -> bool {
		self.0 <= b && b <= self.1
	}
}

impl ByteSelect for u8 {
	fn select(&self, b: u8) -> bool {
		b == *self
	}
}

impl ByteSelect for &'_ [u8] {
	fn select(&self, b: u8) -> bool {
		self.contains(&b)
	}
}

pub struct AnyByte();

impl ByteSelect for AnyByte {
	fn select(&self, _b: u8) -> bool {
		true
	}
}

impl ByteSelect for &'_ [ByteRange] {
	fn select(&self, b: u8) -> bool {
		for r in *self {
			if r.select(b) {
				return true;
			}
		}
		false
	}
}

pub static CLASS_XML_NAMESTART_BYTE: &'static [ByteRange] = &[
	ByteRange(b':', b':'),
	ByteRange(b'A', b'Z'),
	ByteRange(b'_', b'_'),
	ByteRange(b'a', b'z'),
	// and now essentially all utf8 start bytes
	ByteRange(b'\xc3', b'\xf7'),
];

pub static CLASS_XML_NAME_BYTE: &'static [ByteRange] = &[
	ByteRange(b':', b':'),
	ByteRange(b'-', b'-'),
	ByteRange(b'.', b'.'),
	ByteRange(b'A', b'Z'),
	ByteRange(b'_', b'_'),
	ByteRange(b'0', b'9'),
	ByteRange(b'a', b'z'),
	ByteRange(b'\x80', b'\xff'),
];

/// Bytes which may start an invalid (control) character in any XML version.
pub static CLASS_XML_MAY_NONCHAR_BYTE: &'static [ByteRange] = &[
	ByteRange(b'\x00', b'\x08'),
	ByteRange(b'\x0b', b'\x0c'),
	ByteRange(b'\x0e', b'\x1f'),
];

/// Valid bytes for character data minus delimiters (XML 1.0 § 2.4 [14])
///
/// The following bytes are excluded:
///
/// - `'\r'`, because it gets folded into a line feed (`\n`) on input
/// - `'&'`, because it may start an entity or character reference
/// - `'<'`, because it may start an element or CDATA section
/// - `']'`, because it may end a CDATA section and the sequence `]]>` is not
///   allowed verbatimly in character data
pub static CLASS_XML_TEXT_DELIMITED_BYTE: &'static [ByteRange] = &[
	ByteRange(b'\x09', b'\x0a'),
	ByteRange(b'\x20', b'\x25'), // excludes &
	ByteRange(b'\x27', b'\x3b'), // excludes <
	ByteRange(b'\x3d', b'\x5c'), // excludes ]
	ByteRange(b'\x5e', b'\xff'),
];

// XML 1.0 § 2.4 [14], but inside a CDATA section
pub static CLASS_XML_CDATA_SECTION_DELIMITED_BYTE: &'static [ByteRange] = &[
	ByteRange(b'\x09', b'\x0a'),
	// excluding CR as that gets folded to LF
	ByteRange(b'\x20', b'\x5c'), // excludes ]
	ByteRange(b'\x5e', b'\xff'),
];

/// XML whitespace
pub static CLASS_XML_SPACE_BYTE: &'static [u8] = b" \t\r\n";

// XML 1.0 § 2.3 [10]
pub const CLASS_XML_ATT_APOS_DELIMITED_BYTE: &'static [ByteRange] = &[
	// exclude all whitespace except normal space because those get
	// converted into spaces
	ByteRange(b'\x20', b'\x25'), // excludes &, '
	ByteRange(b'\x28', b'\x3b'), // excludes <
	ByteRange(b'\x3d', b'\xff'),
];

// XML 1.0 § 2.3 [10]
pub const CLASS_XML_ATT_QUOT_DELIMITED_BYTE: &'static [ByteRange] = &[
	// exclude all whitespace except normal space because those get
	// converted into spaces
	ByteRange(b'\x20', b'\x21'), // excludes "
	ByteRange(b'\x23', b'\x25'), // excludes &
	ByteRange(b'\x27', b'\x3b'), // excludes <
	ByteRange(b'\x3d', b'\xff'),
];

/// Attribute value bytes while reading from an entity-expansion frame.
///
/// The value delimiter is data inside a replacement (XML 1.0 § 4.4.5), so
/// only `<` (well-formedness error) and whitespace (normalization) remain
/// special. `&` cannot occur in replacement text parts at all.
pub const CLASS_XML_ATT_ENTITY_DELIMITED_BYTE: &'static [ByteRange] = &[
	ByteRange(b'\x20', b'\x3b'), // excludes <
	ByteRange(b'\x3d', b'\xff'),
];

/// Comment body bytes (XML 1.0 § 2.5); `-` and CR are the delimiters.
pub static CLASS_XML_COMMENT_DELIMITED_BYTE: &'static [ByteRange] = &[
	ByteRange(b'\x09', b'\x0a'),
	ByteRange(b'\x20', b'\x2c'), // excludes -
	ByteRange(b'\x2e', b'\xff'),
];

/// Processing instruction body bytes (XML 1.0 § 2.6); `?` and CR delimit.
pub static CLASS_XML_PI_DELIMITED_BYTE: &'static [ByteRange] = &[
	ByteRange(b'\x09', b'\x0a'),
	ByteRange(b'\x20', b'\x3e'), // excludes ?
	ByteRange(b'\x40', b'\xff'),
];

/// System literal delimited by `"` (XML 1.0 § 2.3 [11])
pub static CLASS_XML_SYSTEM_QUOT_DELIMITED_BYTE: &'static [ByteRange] = &[
	ByteRange(b'\x09', b'\x0a'),
	ByteRange(b'\x20', b'\x21'),
	ByteRange(b'\x23', b'\xff'),
];

/// System literal delimited by `'` (XML 1.0 § 2.3 [11])
pub static CLASS_XML_SYSTEM_APOS_DELIMITED_BYTE: &'static [ByteRange] = &[
	ByteRange(b'\x09', b'\x0a'),
	ByteRange(b'\x20', b'\x26'),
	ByteRange(b'\x28', b'\xff'),
];

/// Public identifier literal delimited by `"` (XML 1.0 § 2.3 [13])
pub static CLASS_XML_PUBID_QUOT_DELIMITED_BYTE: &'static [ByteRange] = &[
	ByteRange(b'\x0a', b'\x0a'),
	ByteRange(b'\x0d', b'\x0d'),
	ByteRange(b'\x20', b'\x21'),
	ByteRange(b'\x23', b'\x25'),
	ByteRange(b'\x27', b'\x3b'),
	ByteRange(b'\x3d', b'\x3d'),
	ByteRange(b'\x3f', b'\x5a'),
	ByteRange(b'\x5f', b'\x5f'),
	ByteRange(b'\x61', b'\x7a'),
];

/// Public identifier literal delimited by `'` (XML 1.0 § 2.3 [13])
pub static CLASS_XML_PUBID_APOS_DELIMITED_BYTE: &'static [ByteRange] = &[
	ByteRange(b'\x0a', b'\x0a'),
	ByteRange(b'\x0d', b'\x0d'),
	ByteRange(b'\x20', b'\x21'),
	ByteRange(b'\x23', b'\x25'),
	ByteRange(b'\x28', b'\x3b'),
	ByteRange(b'\x3d', b'\x3d'),
	ByteRange(b'\x3f', b'\x5a'),
	ByteRange(b'\x5f', b'\x5f'),
	ByteRange(b'\x61', b'\x7a'),
];

/// Entity value delimited by `"` (XML 1.0 § 2.3 [9]); `%` and `&` start
/// references, CR is folded.
pub static CLASS_XML_ENTITY_VALUE_QUOT_DELIMITED_BYTE: &'static [ByteRange] = &[
	ByteRange(b'\x09', b'\x0a'),
	ByteRange(b'\x20', b'\x21'),
	ByteRange(b'\x23', b'\x24'),
	ByteRange(b'\x27', b'\xff'),
];

/// Entity value delimited by `'` (XML 1.0 § 2.3 [9])
pub static CLASS_XML_ENTITY_VALUE_APOS_DELIMITED_BYTE: &'static [ByteRange] = &[
	ByteRange(b'\x09', b'\x0a'),
	ByteRange(b'\x20', b'\x24'),
	ByteRange(b'\x28', b'\xff'),
];

/// Raw element content specification (everything up to the closing `>`);
/// `%` may start a parameter-entity reference, CR is folded.
pub static CLASS_XML_CONTENTSPEC_DELIMITED_BYTE: &'static [ByteRange] = &[
	ByteRange(b'\x09', b'\x0a'),
	ByteRange(b'\x20', b'\x24'),
	ByteRange(b'\x26', b'\x3d'), // excludes >
	ByteRange(b'\x3f', b'\xff'),
];

/// ASCII upper-case letters, for declaration keywords.
pub static CLASS_UPPER_ALPHA_BYTE: ByteRange = ByteRange(b'A', b'Z');

/// Valid XML decimal characters (for character references)
pub static CLASS_XML_DECIMAL_DIGIT_BYTE: ByteRange = ByteRange(b'0', b'9');

/// Valid XML hexadecimal characters (for character references)
pub static CLASS_XML_HEXADECIMAL_DIGIT_BYTE: &'static [ByteRange] = &[
	CLASS_XML_DECIMAL_DIGIT_BYTE,
	ByteRange(b'a', b'f'),
	ByteRange(b'A', b'F'),
];
