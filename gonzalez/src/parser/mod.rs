/*!
# Event parsers on top of the token stream

The parser half of the pipeline consists of two layers:

- [`RawParser`] consumes [`Token`]s and produces [`RawEvent`]s. It enforces
  document structure (prolog, one root element, balanced tags, epilog) but
  does not know about namespaces.
- [`NamespaceResolver`] consumes [`RawEvent`]s and produces
  [`ResolvedEvent`]s with expanded namespace names and checked attribute
  uniqueness.

The [`sax`] module provides a callback frontend over the resolved events.

   [`RawParser`]: raw::RawParser
   [`RawEvent`]: raw::RawEvent
   [`NamespaceResolver`]: namespaces::NamespaceResolver
   [`ResolvedEvent`]: namespaces::ResolvedEvent
*/
use std::io;

use crate::error::Result;
use crate::lexer::{Lexer, Token};

pub mod namespaces;
pub mod raw;
pub mod sax;

pub use namespaces::{NamespaceName, NamespaceResolver, Parser, ResolvedEvent, ResolvedQName};
pub use raw::{RawEvent, RawParser, RawQName};
pub use sax::{Attribute, ContentHandler, ErrorHandler, SaxDriver};

use crate::strings::CDataStr;

/**
# XML version number

Both XML 1.0 and XML 1.1 documents are accepted; the version only changes
which characters may appear in character data and character references.
*/
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XmlVersion {
	/// XML Version 1.0
	V1_0,
	/// XML Version 1.1
	V1_1,
}

/// XML core namespace URI (for the `xml:` prefix)
pub const XMLNS_XML: &'static CDataStr =
	unsafe { std::mem::transmute("http://www.w3.org/XML/1998/namespace") };
/// XML namespace URI (for the `xmlns:` prefix)
pub const XMLNS_XMLNS: &'static CDataStr =
	unsafe { std::mem::transmute("http://www.w3.org/2000/xmlns/") };

/// Carry measurement information about the event
///
/// In contrast to tokens (cf. [`crate::lexer::TokenMetrics`]), events are
/// always consecutive; because events may span multiple tokens, only the
/// length is accounted, not the start/end positions.
///
/// Event length overflows are reported as
/// [`Error::LimitExceeded`](crate::Error::LimitExceeded) errors.
#[derive(Copy, Debug, Clone, PartialEq, Eq)]
pub struct EventMetrics {
	pub(super) len: usize,
}

impl EventMetrics {
	/// Get the number of bytes used to generate this event.
	pub fn len(&self) -> usize {
		self.len
	}

	/// Create new event metrics
	pub const fn new(len: usize) -> EventMetrics {
		EventMetrics { len }
	}
}

pub static ZERO_METRICS: EventMetrics = EventMetrics::new(0);

/**
# Read individual tokens from a source

Analogously to [`std::io::Read`] and intended as a wrapper around
[`crate::Lexer`], this trait provides individual tokens.
*/
pub trait TokenRead {
	/// Return a single token from the source.
	///
	/// If the EOF has been reached without errors, None is returned.
	///
	/// Lexer errors and I/O errors from the underlying data source are
	/// passed through.
	fn read(&mut self) -> Result<Option<Token>>;
}

/// Wrapper around [`Lexer`](crate::Lexer) and [`std::io::BufRead`] to
/// provide a [`TokenRead`].
pub struct LexerAdapter<R: io::BufRead> {
	lexer: Lexer,
	src: R,
}

impl<R: io::BufRead> LexerAdapter<R> {
	/// Wraps a lexer and a byte source
	pub fn new(lexer: Lexer, src: R) -> Self {
		Self { lexer, src }
	}

	/// Consume self and return the wrapped lexer and byte source.
	pub fn into_inner(self) -> (Lexer, R) {
		(self.lexer, self.src)
	}

	/// Return a reference to the byte source
	pub fn get_ref(&self) -> &R {
		&self.src
	}

	/// Return a mutable reference to the byte source
	pub fn get_mut(&mut self) -> &mut R {
		&mut self.src
	}

	/// Return a reference to the lexer
	pub fn get_lexer(&self) -> &Lexer {
		&self.lexer
	}

	/// Return a mutable reference to the lexer
	pub fn get_lexer_mut(&mut self) -> &mut Lexer {
		&mut self.lexer
	}
}

impl<R: io::BufRead> TokenRead for LexerAdapter<R> {
	fn read(&mut self) -> Result<Option<Token>> {
		self.lexer.lex(&mut self.src)
	}
}

/**
Trait for parser-like structs.
*/
pub trait Parse {
	type Output;

	/// Parse a single event using tokens from `r`.
	///
	/// If the end of file has been reached after a document accepted by the
	/// parser, `None` is returned. Otherwise, if the document is still
	/// acceptable the next XML event is returned.
	///
	/// If the document violates a constraint, such as the XML grammar or
	/// namespacing rules, the corresponding error is returned.
	///
	/// Errors from the token source (such as I/O errors) are forwarded.
	fn parse<R: TokenRead>(&mut self, r: &mut R) -> Result<Option<Self::Output>>;

	/// Release all temporary buffers or other ephemeral allocations
	///
	/// This is sensible to call when it is expected that no more data will
	/// be processed by the parser for a while and the memory is better used
	/// elsewhere.
	fn release_temporaries(&mut self);
}

/**
Trait for things which can be constructed with a
[`Context`](crate::context::Context).
*/
pub trait WithContext {
	/// Create a new instance using the given shared context.
	fn with_context(ctx: crate::context::RcPtr<crate::context::Context>) -> Self;
}

/// An opened external input source, as returned by an
/// [`EntityResolver`].
pub struct InputSource {
	/// The resolved (absolutized) system identifier.
	pub system_id: crate::strings::CData,
	/// The opened byte stream.
	pub reader: Box<dyn io::Read>,
}

impl std::fmt::Debug for InputSource {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		f.debug_struct("InputSource")
			.field("system_id", &self.system_id)
			.finish()
	}
}

/**
# Resolver for external entities

The parser itself never fetches external resources; external entity
references in content are reported as skipped. Applications which opt into
external entities (see [`ParserOptions::external_general_entities`])
provide this capability and drive the returned sources through a parser of
their own choosing.

Returning `Ok(None)` means "skip this entity".
*/
pub trait EntityResolver {
	fn resolve(
		&mut self,
		public_id: Option<&CDataStr>,
		system_id: &CDataStr,
	) -> Result<Option<InputSource>>;
}

/// The default resolver: skips everything.
pub struct NullEntityResolver;

impl EntityResolver for NullEntityResolver {
	fn resolve(
		&mut self,
		_public_id: Option<&CDataStr>,
		_system_id: &CDataStr,
	) -> Result<Option<InputSource>> {
		Ok(None)
	}
}

/**
# Parser feature flags

These correspond to the classic SAX feature URIs where one exists.
*/
#[derive(Debug, Clone, PartialEq)]
pub struct ParserOptions {
	/// Resolve and report namespaces (`namespaces`, default on).
	pub namespaces: bool,

	/// Also report `xmlns*` attributes (`namespace-prefixes`, default
	/// off).
	pub namespace_prefixes: bool,

	/// Accept the flag for DTD validation. There is no validation engine
	/// behind it; the flag only controls whether validation-level problems
	/// are reported to the error handler as warnings.
	pub validation: bool,

	/// Allow resolution of external general entities (default off). The
	/// parser itself never fetches anything; with this flag off, external
	/// general entity references in content are reported via
	/// `skipped_entity`.
	pub external_general_entities: bool,

	/// Allow resolution of external parameter entities (default off).
	pub external_parameter_entities: bool,

	/// Resolve system identifiers in declarations against
	/// [`ParserOptions::base_uri`] before reporting them (default on).
	/// Resolution is lexical only, nothing is fetched; without a base URI
	/// the identifiers pass through unchanged.
	pub resolve_dtd_uris: bool,

	/// Base URI of the document, used for system-identifier resolution.
	pub base_uri: Option<String>,

	/// Intern namespace URIs in a shared [`Context`] (`string-interning`,
	/// default on). When disabled, every namespace name is a fresh
	/// allocation and nothing is kept in the context.
	///
	///    [`Context`]: crate::context::Context
	pub string_interning: bool,

	/// Accept documents declaring `version="1.1"` (default on).
	pub xml_1_1: bool,
}

impl Default for ParserOptions {
	fn default() -> Self {
		Self {
			namespaces: true,
			namespace_prefixes: false,
			validation: false,
			external_general_entities: false,
			external_parameter_entities: false,
			resolve_dtd_uris: true,
			base_uri: None,
			string_interning: true,
			xml_1_1: true,
		}
	}
}

/**
Trait for parsers which can be constructed from [`ParserOptions`].

This is what lets the drivers build any of the parser layers with one
set of options (see
[`PushDriver::with_options`](crate::driver::PushDriver::with_options)).
*/
pub trait WithOptions {
	/// Create a new instance honoring the given options.
	fn with_options(opts: ParserOptions) -> Self;
}

impl WithOptions for Parser {
	fn with_options(opts: ParserOptions) -> Self {
		Parser::with_options(opts)
	}
}

impl WithOptions for RawParser {
	fn with_options(opts: ParserOptions) -> Self {
		RawParser::with_options(opts)
	}
}
