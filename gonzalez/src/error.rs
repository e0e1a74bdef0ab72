/*!
# Error types

This module holds the error types returned by the various functions of this
crate. XPath compilation errors live in [`crate::xpath::error`]; everything
the XML side can report is here.
*/
use std::error;
use std::fmt;
use std::io;
use std::ops::Deref;
use std::result::Result as StdResult;
use std::sync::Arc;

use gonzalez_validation::Error as ValidationError;

pub use crate::errctx::*;

/// Violation of a well-formedness constraint or the XML grammar.
#[derive(Debug, Clone, PartialEq, Copy)]
pub enum WFError {
	/// End-of-file encountered during a construct where more data was
	/// expected.
	///
	/// The contents are implementation details.
	InvalidEof(&'static str),

	/// Unicode codepoint which is not allowed in the document encountered.
	///
	/// The contents are implementation details.
	InvalidChar(&'static str, u32, bool),

	/// Unicode codepoint which was not expected at that point in the
	/// grammar.
	///
	/// The contents are implementation details.
	UnexpectedChar(&'static str, char, Option<&'static [&'static str]>),

	/// Byte which was not expected at that point in the grammar.
	///
	/// The contents are implementation details.
	UnexpectedByte(&'static str, u8, Option<&'static [&'static str]>),

	/// Generalized invalid syntactic construct which does not fit into any
	/// of the other categories.
	///
	/// The contents are implementation details.
	InvalidSyntax(&'static str),

	/// Token was not expected by the parser at that point in the grammar.
	///
	/// The contents are implementation details.
	UnexpectedToken(&'static str, &'static str, Option<&'static [&'static str]>),

	/// Attribute was declared multiple times in the same element.
	///
	/// **Note:** This will also be emitted for namespaced attributes which
	/// resolve to the same `(uri, localname)` pair after prefix resolution,
	/// even though that is technically a namespace-well-formedness
	/// constraint.
	DuplicateAttribute,

	/// Ending tag name does not match opening tag.
	ElementMismatch,

	/// Element was closed in a different entity-expansion frame than the one
	/// which opened it.
	EntityNestingMismatch,

	/// The string `--` occurred inside a comment.
	DoubleHyphenInComment,

	/// A processing instruction target matched `xml` case-insensitively.
	ReservedPITarget,

	/// The literal sequence `]]>` occurred in character data.
	CDataEndInContent,

	/// `<` occurred in an attribute value.
	UnescapedLtInAttribute,
}

impl error::Error for WFError {}

impl ErrorWithContext for WFError {
	fn with_context(self, ctx: &'static str) -> WFError {
		match self {
			WFError::InvalidEof(_) => WFError::InvalidEof(ctx),
			WFError::InvalidChar(_, cp, fromref) => WFError::InvalidChar(ctx, cp, fromref),
			WFError::UnexpectedChar(_, ch, alt) => WFError::UnexpectedChar(ctx, ch, alt),
			WFError::UnexpectedByte(_, b, alt) => WFError::UnexpectedByte(ctx, b, alt),
			WFError::UnexpectedToken(_, tok, alt) => WFError::UnexpectedToken(ctx, tok, alt),
			other => other,
		}
	}
}

fn write_alternatives(f: &mut fmt::Formatter, opts: &[&'static str]) -> fmt::Result {
	f.write_str(" (expected ")?;
	if opts.len() == 1 {
		f.write_str(opts[0])?;
	} else {
		f.write_str("one of: ")?;
		for (i, opt) in opts.iter().enumerate() {
			if i > 0 {
				f.write_str(", ")?;
			}
			f.write_str(*opt)?;
		}
	}
	f.write_str(")")
}

impl fmt::Display for WFError {
	fn fmt<'f>(&self, f: &'f mut fmt::Formatter) -> fmt::Result {
		match self {
			WFError::InvalidEof(ctx) => write!(f, "invalid eof {}", ctx),
			WFError::InvalidChar(ctx, cp, false) => {
				write!(f, "invalid codepoint U+{:x} {}", cp, ctx)
			}
			WFError::InvalidChar(ctx, cp, true) => write!(
				f,
				"character reference expanded to invalid codepoint U+{:x} {}",
				cp, ctx
			),
			WFError::UnexpectedChar(ctx, ch, Some(opts)) if opts.len() > 0 => {
				write!(f, "U+{:x} not allowed {}", *ch as u32, ctx)?;
				write_alternatives(f, opts)
			}
			WFError::UnexpectedByte(ctx, b, Some(opts)) if opts.len() > 0 => {
				write!(f, "0x{:x} not allowed {}", *b, ctx)?;
				write_alternatives(f, opts)
			}
			WFError::UnexpectedChar(ctx, ch, _) => {
				write!(f, "U+{:x} not allowed {}", *ch as u32, ctx)
			}
			WFError::UnexpectedByte(ctx, b, _) => write!(f, "0x{:x} not allowed {}", *b, ctx),
			WFError::InvalidSyntax(msg) => write!(f, "invalid syntax: {}", msg),
			WFError::UnexpectedToken(ctx, tok, Some(opts)) if opts.len() > 0 => {
				write!(f, "unexpected {} token {}", tok, ctx)?;
				write_alternatives(f, opts)
			}
			WFError::UnexpectedToken(ctx, tok, _) => write!(f, "unexpected {} token {}", tok, ctx),
			WFError::DuplicateAttribute => f.write_str("duplicate attribute"),
			WFError::ElementMismatch => f.write_str("start and end tag do not match"),
			WFError::EntityNestingMismatch => {
				f.write_str("element not closed in the entity which opened it")
			}
			WFError::DoubleHyphenInComment => f.write_str("'--' not allowed inside comment"),
			WFError::ReservedPITarget => {
				f.write_str("processing instruction target must not match 'xml'")
			}
			WFError::CDataEndInContent => f.write_str("unescaped ']]>' forbidden in text"),
			WFError::UnescapedLtInAttribute => {
				f.write_str("'<' not allowed in attribute value")
			}
		}
	}
}

impl From<ValidationError> for WFError {
	fn from(other: ValidationError) -> Self {
		match other {
			ValidationError::EmptyName => Self::InvalidSyntax("Name must have at least one Char"),
			ValidationError::InvalidChar(ch) => Self::UnexpectedChar(ERRCTX_UNKNOWN, ch, None),
		}
	}
}

/// Violation of a namespace-well-formedness constraint or the Namespaces in
/// XML 1.0 grammar.
#[derive(Debug, Clone, PartialEq)]
pub enum NWFError {
	/// More than one colon encountered in a name.
	///
	/// The contents are implementation details.
	MultiColonName(&'static str),

	/// One side of the colon in a name was empty.
	///
	/// The contents are implementation details.
	EmptyNamePart(&'static str),

	/// Use of an undeclared namespace prefix.
	///
	/// The contents are implementation details.
	UndeclaredNamespacePrefix(&'static str),

	/// Attempt to redefine a reserved namespace prefix.
	ReservedNamespacePrefix,

	/// Attempt to bind a reserved namespace name to another prefix.
	ReservedNamespaceName,

	/// Local name does not conform to Name production (invalid start char)
	InvalidLocalName(&'static str),

	/// Declared namespace URI is empty
	EmptyNamespaceUri,
}

impl error::Error for NWFError {}

impl ErrorWithContext for NWFError {
	fn with_context(self, ctx: &'static str) -> NWFError {
		match self {
			Self::MultiColonName(_) => Self::MultiColonName(ctx),
			Self::EmptyNamePart(_) => Self::EmptyNamePart(ctx),
			Self::UndeclaredNamespacePrefix(_) => Self::UndeclaredNamespacePrefix(ctx),
			Self::InvalidLocalName(_) => Self::InvalidLocalName(ctx),
			other => other,
		}
	}
}

impl fmt::Display for NWFError {
	fn fmt<'f>(&self, f: &'f mut fmt::Formatter) -> fmt::Result {
		match self {
			Self::MultiColonName(ctx) => write!(f, "more than one colon {} name", ctx),
			Self::EmptyNamePart(ctx) => {
				write!(f, "empty string on one side of the colon {} name", ctx)
			}
			Self::UndeclaredNamespacePrefix(ctx) => {
				write!(f, "use of undeclared namespace prefix {} name", ctx)
			}
			Self::ReservedNamespacePrefix => f.write_str("reserved namespace prefix"),
			Self::ReservedNamespaceName => f.write_str("reserved namespace name"),
			Self::InvalidLocalName(ctx) => write!(f, "local name is invalid {} name", ctx),
			Self::EmptyNamespaceUri => write!(f, "namespace URI is empty"),
		}
	}
}

/// Violation of an entity constraint.
///
/// All of these are fatal; the document cannot be processed any further once
/// one of them has been detected.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityError {
	/// Reference to an entity which has not been declared.
	Undeclared(&'static str),

	/// An entity directly or indirectly references itself.
	///
	/// Carries the name which was found a second time on the expansion
	/// stack.
	Cycle(String),

	/// Expansion exceeded the configured nesting depth limit.
	DepthLimitExceeded,

	/// Expansion produced more characters than the configured limit.
	ExpansionLimitExceeded,

	/// Reference to an external entity while external entity processing is
	/// disabled, in a context where skipping is not permitted.
	ExternalForbidden(&'static str),

	/// Reference to an unparsed (NDATA) entity outside of an ENTITY/ENTITIES
	/// attribute value.
	UnparsedReference(&'static str),

	/// A parameter-entity reference occurred outside the DTD.
	ParameterEntityOutsideDtd,
}

impl error::Error for EntityError {}

impl fmt::Display for EntityError {
	fn fmt<'f>(&self, f: &'f mut fmt::Formatter) -> fmt::Result {
		match self {
			Self::Undeclared(ctx) => write!(f, "reference to undeclared entity {}", ctx),
			Self::Cycle(name) => write!(f, "circular reference to entity '{}'", name),
			Self::DepthLimitExceeded => f.write_str("entity expansion too deep"),
			Self::ExpansionLimitExceeded => {
				f.write_str("entity expansion exceeded size limit")
			}
			Self::ExternalForbidden(ctx) => {
				write!(f, "external entity reference forbidden {}", ctx)
			}
			Self::UnparsedReference(ctx) => {
				write!(f, "unparsed entity referenced as content {}", ctx)
			}
			Self::ParameterEntityOutsideDtd => {
				f.write_str("parameter-entity reference outside DTD")
			}
		}
	}
}

/// [`std::sync::Arc`]-based wrapper around [`std::io::Error`] to allow
/// cloning.
#[derive(Clone)]
pub struct IOErrorWrapper(Arc<io::Error>);

impl IOErrorWrapper {
	fn wrap(e: io::Error) -> IOErrorWrapper {
		IOErrorWrapper(Arc::new(e))
	}
}

impl fmt::Debug for IOErrorWrapper {
	fn fmt<'f>(&self, f: &'f mut fmt::Formatter) -> fmt::Result {
		fmt::Debug::fmt(&**self, f)
	}
}

impl fmt::Display for IOErrorWrapper {
	fn fmt<'f>(&self, f: &'f mut fmt::Formatter) -> fmt::Result {
		fmt::Display::fmt(&**self, f)
	}
}

impl PartialEq for IOErrorWrapper {
	fn eq(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.0, &other.0)
	}
}

impl AsRef<io::Error> for IOErrorWrapper {
	fn as_ref(&self) -> &io::Error {
		&*self.0
	}
}

impl Deref for IOErrorWrapper {
	type Target = io::Error;

	fn deref(&self) -> &io::Error {
		&*self.0
	}
}

impl std::borrow::Borrow<io::Error> for IOErrorWrapper {
	fn borrow(&self) -> &io::Error {
		&*self.0
	}
}

/// Error returned by a [`ContentHandler`](crate::parser::ContentHandler)
/// callback to abort the parse.
///
/// The message is application-defined and carried through unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerError(pub String);

impl fmt::Display for HandlerError {
	fn fmt<'f>(&self, f: &'f mut fmt::Formatter) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl error::Error for HandlerError {}

impl From<&str> for HandlerError {
	fn from(other: &str) -> Self {
		HandlerError(other.into())
	}
}

impl From<String> for HandlerError {
	fn from(other: String) -> Self {
		HandlerError(other)
	}
}

/// Error types which may be returned from the parser or lexer.
///
/// With the exception of [`Error::IO`], all errors are fatal and will be
/// returned indefinitely from the parser or lexer after the first encounter.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
	/// An I/O error was encountered during lexing.
	///
	/// I/O errors are not fatal and may be retried. This is especially
	/// important for (but not limited to)
	/// [`std::io::ErrorKind::WouldBlock`] errors.
	///
	/// **Note:** When an unexpected end-of-file situation is encountered
	/// during parsing or lexing, that is signalled using
	/// [`Error::NotWellFormed`] instead of a
	/// [`std::io::ErrorKind::UnexpectedEof`] error.
	IO(IOErrorWrapper),

	/// An invalid UTF-8 byte was encountered during decoding.
	InvalidUtf8Byte(u8),

	/// An invalid Unicode scalar value was encountered during decoding.
	InvalidChar(u32),

	/// A violation of the XML grammar or a well-formedness constraint was
	/// encountered during parsing or lexing.
	NotWellFormed(WFError),

	/// A violation of the Namespaces in XML 1.0 grammar or a
	/// namespace-well-formedness constraint was encountered during parsing.
	NotNamespaceWellFormed(NWFError),

	/// A violation of an entity constraint was encountered.
	Entity(EntityError),

	/// A limit was exceeded.
	///
	/// The string indicates which limit and should not be interpreted by
	/// user code.
	LimitExceeded(&'static str),

	/// A handler callback requested termination of the parse.
	Handler(HandlerError),
}

pub type Result<T> = StdResult<T, Error>;

pub(crate) trait ErrorWithContext {
	fn with_context(self, ctx: &'static str) -> Self;
}

pub(crate) fn add_context<T, E: ErrorWithContext>(
	r: StdResult<T, E>,
	ctx: &'static str,
) -> StdResult<T, E> {
	r.map_err(|e| e.with_context(ctx))
}

impl Error {
	pub fn io(e: io::Error) -> Error {
		Error::IO(IOErrorWrapper::wrap(e))
	}

	pub(crate) fn wfeof(ctx: &'static str) -> Error {
		Error::NotWellFormed(WFError::InvalidEof(ctx))
	}
}

impl ErrorWithContext for Error {
	fn with_context(self, ctx: &'static str) -> Self {
		match self {
			Self::NotWellFormed(wf) => Self::NotWellFormed(wf.with_context(ctx)),
			Self::NotNamespaceWellFormed(nwf) => {
				Self::NotNamespaceWellFormed(nwf.with_context(ctx))
			}
			other => other,
		}
	}
}

impl From<io::Error> for Error {
	fn from(e: io::Error) -> Error {
		Error::io(e)
	}
}

impl From<WFError> for Error {
	fn from(e: WFError) -> Error {
		Error::NotWellFormed(e)
	}
}

impl From<NWFError> for Error {
	fn from(e: NWFError) -> Error {
		Error::NotNamespaceWellFormed(e)
	}
}

impl From<EntityError> for Error {
	fn from(e: EntityError) -> Error {
		Error::Entity(e)
	}
}

impl From<HandlerError> for Error {
	fn from(e: HandlerError) -> Error {
		Error::Handler(e)
	}
}

impl From<ValidationError> for Error {
	fn from(e: ValidationError) -> Error {
		let wf: WFError = e.into();
		wf.into()
	}
}

impl fmt::Display for Error {
	fn fmt<'f>(&self, f: &'f mut fmt::Formatter) -> fmt::Result {
		match self {
			Error::NotWellFormed(e) => write!(f, "not-well-formed: {}", e),
			Error::NotNamespaceWellFormed(e) => write!(f, "not namespace-well-formed: {}", e),
			Error::Entity(e) => write!(f, "entity error: {}", e),
			Error::LimitExceeded(msg) => write!(f, "limit exceeded: {}", msg),
			Error::InvalidUtf8Byte(b) => write!(f, "invalid utf-8 byte: \\x{:02x}", b),
			Error::InvalidChar(ch) => write!(f, "invalid char: U+{:08x}", ch),
			Error::IO(e) => write!(f, "I/O error: {}", e),
			Error::Handler(e) => write!(f, "aborted by handler: {}", e),
		}
	}
}

impl error::Error for Error {
	fn source(&self) -> Option<&(dyn error::Error + 'static)> {
		match self {
			Error::IO(e) => Some(&**e),
			Error::NotWellFormed(e) => Some(e),
			Error::NotNamespaceWellFormed(e) => Some(e),
			Error::Entity(e) => Some(e),
			Error::Handler(e) => Some(e),
			Error::LimitExceeded(_) | Error::InvalidUtf8Byte(_) | Error::InvalidChar(_) => None,
		}
	}
}
