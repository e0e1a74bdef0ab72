/*!
# Streaming XML lexer

The lexer is a byte-driven state machine. It is fed byte buffers
incrementally and emits one [`Token`] at a time. When a token cannot be
completed from the bytes available, all partial state (the current machine
state, the scratchpad with partial token data and the entity-expansion
stack) is retained and lexing resumes exactly where it stopped on the next
buffer.

No recursion is used anywhere; nesting (entity expansion, the internal
subset, element structure) is represented by explicit state and explicit
stacks.
*/
use std::collections::HashMap;
use std::convert::TryInto;
use std::fmt;
use std::io;
use std::io::Read;

pub mod dtd;
pub mod entities;
mod ranges;
mod read;

use gonzalez_validation::CharClasses;

use crate::context::RcPtr;
use crate::errctx::*;
use crate::error::{EntityError, Error as CrateError, ErrorWithContext, NWFError, Result as CrateResult, WFError};
use crate::parser::EntityResolver;
use crate::strings::*;

use dtd::{AttDef, AttDefault, AttType, AttlistDecl, NotationDecl};
use entities::{
	predefined_entity, EntityDecl, EntityPart, EntityTable, EntityValue, ExpansionStack,
	ExternalId, FrameContext, FrameInput,
};
use ranges::*;
use read::Endbyte;

/// Carry information about where in the stream the token was observed
///
/// Tokens are not necessarily consecutive. Specifically, it is possible that
/// some whitespace is ignored and not converted into tokens between tokens
/// inside element headers and footers as well as in the document prolog.
///
/// Tokens which are generated from entity-expansion frames all carry the
/// position of the reference which triggered the expansion.
#[derive(Copy, Debug, Clone, PartialEq, Eq)]
pub struct TokenMetrics {
	start: usize,
	end: usize,
}

impl TokenMetrics {
	/// Get the length of the token, taking a potential counter overflow
	/// into account.
	pub fn len(&self) -> usize {
		self.end.wrapping_sub(self.start)
	}

	/// Start byte in the stream.
	///
	/// Note that this is a "dumb" counter of size [`usize`] which may wrap
	/// around on some architectures with sufficiently long-running streams.
	pub fn start(&self) -> usize {
		self.start
	}

	/// End byte of the token in the stream (exclusive).
	pub fn end(&self) -> usize {
		self.end
	}

	// for use in parser unit tests
	#[cfg(test)]
	pub(crate) const fn new(start: usize, end: usize) -> TokenMetrics {
		TokenMetrics { start, end }
	}
}

/**
A single XML token

Tokens are emitted by the lexer after processing bits of XML. Tokens do not
map one-to-one to concepts in the XML specification; they are modelled so
that the content parser on top can process them without back-tracking.

A fatal lexical error is not a token: it is the error return of
[`Lexer::lex()`], after which the lexer refuses further work. The end of
file is the `Ok(None)` return.
*/
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
	/// A freestanding (i.e. not the element name) XML `Name`.
	///
	/// Only emitted inside the XML declaration and element headers and
	/// footers.
	Name(TokenMetrics, Name),

	/// An equal sign, inside the XML declaration or an element header.
	Eq(TokenMetrics),

	/// An attribute value.
	///
	/// The delimiters are not included. References are fully expanded and
	/// whitespace is normalized to spaces (the first normalization pass of
	/// XML 1.0 § 3.3.3; the attribute-type-aware second pass happens in the
	/// content parser).
	AttributeValue(TokenMetrics, CData),

	/// The `?>` sequence closing the XML declaration.
	XmlDeclEnd(TokenMetrics),

	/// The `/>` sequence.
	ElementHeadClose(TokenMetrics),

	/// The `>` sequence closing an element header or footer.
	ElementHFEnd(TokenMetrics),

	/// The `<?xml` sequence.
	XmlDeclStart(TokenMetrics),

	/// The `<` sequence, followed by the element name.
	ElementHeadStart(TokenMetrics, Name),

	/// The `</` sequence, followed by the element name.
	ElementFootStart(TokenMetrics, Name),

	/// A piece of character data inside an element.
	///
	/// Character and predefined-entity references in the middle of a text
	/// run are expanded into the run; a single consecutive run of character
	/// data may nevertheless be split over multiple tokens (token length
	/// limits, buffer boundaries, CDATA delimiters).
	Text(TokenMetrics, CData),

	/// The `<![CDATA[` sequence.
	///
	/// The section body is emitted as [`Token::Text`]; the delimiters exist
	/// so that consumers which care (lexical handlers) can tell the two
	/// apart.
	CDataStart(TokenMetrics),

	/// The `]]>` sequence closing a CDATA section.
	CDataEnd(TokenMetrics),

	/// A complete comment; the delimiters are not included in the data.
	Comment(TokenMetrics, CData),

	/// A processing instruction target.
	PITarget(TokenMetrics, Name),

	/// The data of a processing instruction, up to but excluding the `?>`.
	///
	/// Always emitted after a [`Token::PITarget`], even if the instruction
	/// has no data; it doubles as the end-of-instruction marker.
	PIData(TokenMetrics, CData),

	/// A character reference in content, already decoded.
	CharRef(TokenMetrics, char),

	/// A reference to one of the five predefined entities in content.
	PredefEntityRef(TokenMetrics, Name),

	/// A reference to a general entity which the lexer did not expand
	/// (external entities, or entities which may have been declared in an
	/// unread part of the DTD).
	GeneralEntityRef(TokenMetrics, Name),

	/// A reference to a parameter entity which the lexer did not expand.
	ParameterEntityRef(TokenMetrics, Name),

	/// An entity expansion began in content; the contained tokens follow
	/// until the matching [`Token::EntityEnd`].
	///
	/// Character data is not split by these markers: a text token may sit
	/// on either side of the boundary and consumers which only care about
	/// character content can ignore them entirely.
	EntityStart(TokenMetrics, Name),

	/// The innermost open entity expansion in content ended.
	EntityEnd(TokenMetrics),

	/// The document type name (`<!DOCTYPE name`).
	DoctypeName(TokenMetrics, Name),

	/// The public identifier of the document type declaration.
	DoctypePublicId(TokenMetrics, CData),

	/// The system identifier of the document type declaration.
	DoctypeSystemId(TokenMetrics, CData),

	/// The `[` opening the internal subset.
	DoctypeIntSubsetStart(TokenMetrics),

	/// The `]` closing the internal subset.
	DoctypeIntSubsetEnd(TokenMetrics),

	/// The `>` closing the document type declaration.
	DoctypeEnd(TokenMetrics),

	/// A complete entity declaration from the internal subset.
	EntityDecl(TokenMetrics, EntityDecl),

	/// An element declaration: name and raw content specification.
	ElementDecl(TokenMetrics, Name, CData),

	/// A complete attribute-list declaration.
	AttlistDecl(TokenMetrics, AttlistDecl),

	/// A complete notation declaration.
	NotationDecl(TokenMetrics, NotationDecl),
}

impl Token {
	pub const NAME_NAME: &'static str = "Name";
	pub const NAME_EQ: &'static str = "'='";
	pub const NAME_ATTRIBUTEVALUE: &'static str = "AttValue";
	pub const NAME_XMLDECLEND: &'static str = "'?>'";
	pub const NAME_ELEMENTHEADCLOSE: &'static str = "'/>'";
	pub const NAME_ELEMENTHFEND: &'static str = "'>'";
	pub const NAME_XMLDECLSTART: &'static str = "'<?xml'";
	pub const NAME_ELEMENTHEADSTART: &'static str = "'<'";
	pub const NAME_ELEMENTFOOTSTART: &'static str = "'</'";
	pub const NAME_TEXT: &'static str = "Text";
	pub const NAME_CDATASTART: &'static str = "'<![CDATA['";
	pub const NAME_CDATAEND: &'static str = "']]>'";
	pub const NAME_COMMENT: &'static str = "Comment";
	pub const NAME_PITARGET: &'static str = "PITarget";
	pub const NAME_PIDATA: &'static str = "PIData";
	pub const NAME_CHARREF: &'static str = "CharRef";
	pub const NAME_PREDEFENTITYREF: &'static str = "PredefEntityRef";
	pub const NAME_GENERALENTITYREF: &'static str = "EntityRef";
	pub const NAME_PARAMETERENTITYREF: &'static str = "PERef";
	pub const NAME_ENTITYSTART: &'static str = "EntityStart";
	pub const NAME_ENTITYEND: &'static str = "EntityEnd";
	pub const NAME_DOCTYPENAME: &'static str = "'<!DOCTYPE'";
	pub const NAME_DOCTYPEPUBLICID: &'static str = "PublicID";
	pub const NAME_DOCTYPESYSTEMID: &'static str = "SystemID";
	pub const NAME_DOCTYPEINTSUBSETSTART: &'static str = "'['";
	pub const NAME_DOCTYPEINTSUBSETEND: &'static str = "']'";
	pub const NAME_DOCTYPEEND: &'static str = "'>' (doctype)";
	pub const NAME_ENTITYDECL: &'static str = "'<!ENTITY'";
	pub const NAME_ELEMENTDECL: &'static str = "'<!ELEMENT'";
	pub const NAME_ATTLISTDECL: &'static str = "'<!ATTLIST'";
	pub const NAME_NOTATIONDECL: &'static str = "'<!NOTATION'";

	/// Return a static string describing the token type.
	///
	/// This is intended for error messages.
	pub fn name(&self) -> &'static str {
		match self {
			Self::Name(..) => Self::NAME_NAME,
			Self::Eq(..) => Self::NAME_EQ,
			Self::AttributeValue(..) => Self::NAME_ATTRIBUTEVALUE,
			Self::XmlDeclEnd(..) => Self::NAME_XMLDECLEND,
			Self::ElementHeadClose(..) => Self::NAME_ELEMENTHEADCLOSE,
			Self::ElementHFEnd(..) => Self::NAME_ELEMENTHFEND,
			Self::XmlDeclStart(..) => Self::NAME_XMLDECLSTART,
			Self::ElementHeadStart(..) => Self::NAME_ELEMENTHEADSTART,
			Self::ElementFootStart(..) => Self::NAME_ELEMENTFOOTSTART,
			Self::Text(..) => Self::NAME_TEXT,
			Self::CDataStart(..) => Self::NAME_CDATASTART,
			Self::CDataEnd(..) => Self::NAME_CDATAEND,
			Self::Comment(..) => Self::NAME_COMMENT,
			Self::PITarget(..) => Self::NAME_PITARGET,
			Self::PIData(..) => Self::NAME_PIDATA,
			Self::CharRef(..) => Self::NAME_CHARREF,
			Self::PredefEntityRef(..) => Self::NAME_PREDEFENTITYREF,
			Self::GeneralEntityRef(..) => Self::NAME_GENERALENTITYREF,
			Self::ParameterEntityRef(..) => Self::NAME_PARAMETERENTITYREF,
			Self::EntityStart(..) => Self::NAME_ENTITYSTART,
			Self::EntityEnd(..) => Self::NAME_ENTITYEND,
			Self::DoctypeName(..) => Self::NAME_DOCTYPENAME,
			Self::DoctypePublicId(..) => Self::NAME_DOCTYPEPUBLICID,
			Self::DoctypeSystemId(..) => Self::NAME_DOCTYPESYSTEMID,
			Self::DoctypeIntSubsetStart(..) => Self::NAME_DOCTYPEINTSUBSETSTART,
			Self::DoctypeIntSubsetEnd(..) => Self::NAME_DOCTYPEINTSUBSETEND,
			Self::DoctypeEnd(..) => Self::NAME_DOCTYPEEND,
			Self::EntityDecl(..) => Self::NAME_ENTITYDECL,
			Self::ElementDecl(..) => Self::NAME_ELEMENTDECL,
			Self::AttlistDecl(..) => Self::NAME_ATTLISTDECL,
			Self::NotationDecl(..) => Self::NAME_NOTATIONDECL,
		}
	}

	/// Return a reference to this tokens [`TokenMetrics`].
	pub fn metrics(&self) -> &TokenMetrics {
		match self {
			Self::Name(m, ..) => m,
			Self::Eq(m) => m,
			Self::AttributeValue(m, ..) => m,
			Self::XmlDeclEnd(m) => m,
			Self::ElementHeadClose(m) => m,
			Self::ElementHFEnd(m) => m,
			Self::XmlDeclStart(m) => m,
			Self::ElementHeadStart(m, ..) => m,
			Self::ElementFootStart(m, ..) => m,
			Self::Text(m, ..) => m,
			Self::CDataStart(m) => m,
			Self::CDataEnd(m) => m,
			Self::Comment(m, ..) => m,
			Self::PITarget(m, ..) => m,
			Self::PIData(m, ..) => m,
			Self::CharRef(m, ..) => m,
			Self::PredefEntityRef(m, ..) => m,
			Self::GeneralEntityRef(m, ..) => m,
			Self::ParameterEntityRef(m, ..) => m,
			Self::EntityStart(m, ..) => m,
			Self::EntityEnd(m) => m,
			Self::DoctypeName(m, ..) => m,
			Self::DoctypePublicId(m, ..) => m,
			Self::DoctypeSystemId(m, ..) => m,
			Self::DoctypeIntSubsetStart(m) => m,
			Self::DoctypeIntSubsetEnd(m) => m,
			Self::DoctypeEnd(m) => m,
			Self::EntityDecl(m, ..) => m,
			Self::ElementDecl(m, ..) => m,
			Self::AttlistDecl(m, ..) => m,
			Self::NotationDecl(m, ..) => m,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum CharRefRadix {
	Decimal,
	Hexadecimal,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum RefKind {
	Entity,
	Char(CharRefRadix),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ElementState {
	Start,
	/// Only used after `<?xml`
	SpaceRequired,
	Blank,
	Name,
	Eq,
	Close,
	/// Delimiter, alphabet and whether we just read a CR, because of the
	/// mess which is CRLF -> LF normalization.
	AttributeValue(u8, &'static [ByteRange], bool),
	/// Encountered `?`
	MaybeXmlDeclEnd,
	/// Encountered `/`
	MaybeHeadClose,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ElementKind {
	/// standard XML element head e.g. `<foo>`
	Header,
	/// standard XML element foot e.g. `</foo>`
	Footer,
	/// XML declaration e.g. `<?xml version='1.0'?>`
	XmlDecl,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum MaybeElementState {
	Initial,
	/// Encountered `<!`
	Bang,
	/// Accumulating the keyword after `<!` (only DOCTYPE can appear here)
	BangKeyword,
	/// Number of correct CDATA section start characters
	CDataSectionStart(usize),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ContentState {
	Initial,
	/// Within a CDATA section
	CDataSection,
	/// Encountered `<`
	MaybeElement(MaybeElementState),
	/// only whitespace allowed, e.g. between `?>` and `<`
	Whitespace,
	/// `]]>` sequence, either within cdata (true) or not (false);
	/// if not within cdata, encountering this sequence is illegal
	MaybeCDataEnd(bool, usize),
	/// `\r` read, we need to look ahead by one char to see if it is a `\n`
	/// before substituting; bool indicates whether we are in a CDATA
	/// section
	MaybeCRLF(bool),
}

/// Where to continue after a comment or processing instruction.
#[derive(Debug, Clone, Copy, PartialEq)]
enum MiscReturn {
	Content,
	IntSubset,
}

impl MiscReturn {
	fn to_state(self) -> State {
		match self {
			Self::Content => State::Content(ContentState::Initial),
			Self::IntSubset => State::Doctype(DoctypeState::IntSubset),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum CommentState {
	/// Expecting the second `-` of the opener
	Start,
	Body,
	/// CR seen in body
	MaybeCRLF,
	/// Number of consecutive `-` seen (1 or 2)
	MaybeEnd(usize),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum PiState {
	/// Lexing the target name; `decl_allowed` is true iff the instruction
	/// opened at the very beginning of the stream (where `<?xml` is the XML
	/// declaration instead).
	Target { decl_allowed: bool },
	/// Whitespace between target and data
	AfterTarget,
	Body,
	MaybeCRLF,
	/// `?` seen in body
	MaybeEnd,
}

/// Which declaration an external identifier belongs to.
#[derive(Debug, Clone, Copy, PartialEq)]
enum ExtIdOwner {
	Doctype,
	Entity { parameter: bool },
	Notation,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum DoctypeState {
	/// `<!DOCTYPE` matched; skip whitespace, then the name starts
	Start,
	Name,
	/// After the doctype name: external id, `[` or `>`
	AfterName,
	/// Accumulating `SYSTEM` / `PUBLIC`
	ExtIdKeyword(ExtIdOwner),
	PublicLiteralStart(ExtIdOwner),
	PublicLiteral(ExtIdOwner, u8),
	SystemLiteralStart(ExtIdOwner),
	SystemLiteral(ExtIdOwner, u8),
	/// Doctype-level: after the external id, `[` or `>`
	AfterExternalId,
	/// Between `[` and `]`
	IntSubset,
	/// `<` seen in the internal subset
	SubsetMarkupStart,
	/// `<!` seen in the internal subset
	SubsetBang,
	/// Accumulating ENTITY / ELEMENT / ATTLIST / NOTATION
	SubsetKeyword,
	/// `%` seen at subset level: parameter entity reference
	SubsetPERef,

	EntityDeclStart,
	/// `%` seen after `<!ENTITY`: require whitespace, then the name
	EntityDeclParamMarker,
	EntityName { parameter: bool },
	EntityAfterName { parameter: bool },
	EntityValue { parameter: bool, delim: u8, after_cr: bool },
	/// `&` inside an entity value; scratchpads are swapped
	EntityValueRef { parameter: bool, delim: u8, kind: RefKind },
	EntityAfterValue { parameter: bool },
	EntityAfterExtId { parameter: bool },
	/// Accumulating `NDATA`
	EntityNdataKeyword,
	EntityNdataName,
	EntityAfterNdata,

	ElementDeclStart,
	ElementDeclName,
	/// Raw content specification, up to `>`
	ElementDeclContent,
	/// CR seen in the content specification
	ElementDeclContentCRLF,

	AttlistStart,
	AttlistElemName,
	/// Before an attribute definition or `>`
	AttlistScan,
	AttlistAttName,
	AttlistAfterAttName,
	AttlistTypeKeyword,
	/// After `NOTATION`: whitespace, then `(`
	AttlistNotationStart,
	AttlistEnum { notation: bool },
	AttlistEnumName { notation: bool },
	AttlistEnumAfterName { notation: bool },
	AttlistAfterType,
	/// After `#`: accumulating REQUIRED / IMPLIED / FIXED
	AttlistDefaultKeyword,
	/// After `#FIXED`: whitespace, then the quoted value
	AttlistFixedValueStart,
	AttlistDefaultValue { delim: u8, fixed: bool, after_cr: bool },
	AttlistDefaultValueRef { delim: u8, fixed: bool, kind: RefKind },

	NotationDeclStart,
	NotationDeclName,
	NotationAfterName,
	/// After the public literal of a notation: optional system literal or `>`
	NotationAfterPublic,
	NotationEnd,

	/// `]` consumed; whitespace, then `>`
	CloseOuter,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum RefReturnState {
	AttributeValue(ElementKind, u8, &'static [ByteRange]),
	Text,
}

impl RefReturnState {
	fn to_state(self) -> State {
		match self {
			Self::AttributeValue(kind, delim, selector) => State::Element {
				kind,
				state: ElementState::AttributeValue(delim, selector, false),
			},
			Self::Text => State::Content(ContentState::Initial),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum State {
	Content(ContentState),
	Element {
		kind: ElementKind,
		state: ElementState,
	},

	/// encountered `&`
	Reference {
		ctx: &'static str,
		ret: RefReturnState,
		kind: RefKind,
	},

	Comment {
		ret: MiscReturn,
		state: CommentState,
	},

	Pi {
		ret: MiscReturn,
		state: PiState,
	},

	Doctype(DoctypeState),

	Eof,
}

// longest text-based entity is 4 chars
// longest valid decimal entity is 7 chars, longest hexadecimal 6.
const MAX_REFERENCE_LENGTH: usize = 8usize;

const TOK_XML_CDATA_START: &'static [u8] = b"<![CDATA[";
const TOK_XML_CDATA_END: &'static [u8] = b"]]>";

const KW_DOCTYPE: &'static [u8] = b"DOCTYPE";
const KW_ENTITY: &'static [u8] = b"ENTITY";
const KW_ELEMENT: &'static [u8] = b"ELEMENT";
const KW_ATTLIST: &'static [u8] = b"ATTLIST";
const KW_NOTATION: &'static [u8] = b"NOTATION";
const KW_SYSTEM: &'static [u8] = b"SYSTEM";
const KW_PUBLIC: &'static [u8] = b"PUBLIC";
const KW_NDATA: &'static [u8] = b"NDATA";

/// Hold options to configure a [`Lexer`].
///
/// See also [`Lexer::with_options()`].
#[derive(Debug, Clone, PartialEq, Copy)]
pub struct LexerOptions {
	/// Maximum number of bytes which can form a token.
	///
	/// This exists to limit the memory use of the Lexer for tokens where
	/// the data needs to be buffered in memory (most notably
	/// [`Token::Text`] and [`Token::AttributeValue`]).
	///
	/// If token data exceeds this limit, it depends on the token type
	/// whether a partial token is emitted or the lexing fails with
	/// [`Error::LimitExceeded`](crate::Error::LimitExceeded): Text tokens
	/// are split and emitted in parts (and lexing continues), all other
	/// tokens exceeding this limit will cause an error.
	pub max_token_length: usize,

	/// Maximum nesting depth of entity expansions.
	pub max_entity_depth: usize,

	/// Maximum number of replacement characters a single top-level entity
	/// reference may produce, over all nested expansions.
	pub max_entity_expansion: usize,

	/// Whether internal general entities are expanded when referenced.
	///
	/// When disabled, references are reported as
	/// [`Token::GeneralEntityRef`] in content and are an error in attribute
	/// values.
	pub expand_general_entities: bool,

	/// Whether external general entities may be fetched through the
	/// configured [`EntityResolver`] and expanded in content.
	///
	/// With this off (the default), or with no resolver configured,
	/// external references in content are reported as
	/// [`Token::GeneralEntityRef`] so the consumer can skip them.
	pub external_general_entities: bool,

	/// Whether external parameter entities may be fetched through the
	/// configured [`EntityResolver`] and expanded in the internal subset.
	///
	/// With this off (the default), or with no resolver configured, the
	/// reference is reported as [`Token::ParameterEntityRef`] and the
	/// entity table is marked incomplete.
	pub external_parameter_entities: bool,

	/// Whether documents declaring `version="1.1"` switch the lexer to the
	/// XML 1.1 character classes.
	pub accept_xml_1_1: bool,
}

impl LexerOptions {
	/// Set the [`LexerOptions::max_token_length`] value.
	pub fn max_token_length(mut self, v: usize) -> LexerOptions {
		self.max_token_length = v;
		self
	}

	/// Set the [`LexerOptions::max_entity_depth`] value.
	pub fn max_entity_depth(mut self, v: usize) -> LexerOptions {
		self.max_entity_depth = v;
		self
	}

	/// Set the [`LexerOptions::max_entity_expansion`] value.
	pub fn max_entity_expansion(mut self, v: usize) -> LexerOptions {
		self.max_entity_expansion = v;
		self
	}

	/// Set the [`LexerOptions::expand_general_entities`] value.
	pub fn expand_general_entities(mut self, v: bool) -> LexerOptions {
		self.expand_general_entities = v;
		self
	}

	/// Set the [`LexerOptions::external_general_entities`] value.
	pub fn external_general_entities(mut self, v: bool) -> LexerOptions {
		self.external_general_entities = v;
		self
	}

	/// Set the [`LexerOptions::external_parameter_entities`] value.
	pub fn external_parameter_entities(mut self, v: bool) -> LexerOptions {
		self.external_parameter_entities = v;
		self
	}

	/// Set the [`LexerOptions::accept_xml_1_1`] value.
	pub fn accept_xml_1_1(mut self, v: bool) -> LexerOptions {
		self.accept_xml_1_1 = v;
		self
	}
}

impl Default for LexerOptions {
	/// Constructs default lexer options.
	///
	/// The defaults are implementation-defined and should not be relied
	/// upon.
	fn default() -> Self {
		Self {
			max_token_length: 8192,
			max_entity_depth: 20,
			max_entity_expansion: 1 << 20,
			expand_general_entities: true,
			external_general_entities: false,
			external_parameter_entities: false,
			accept_xml_1_1: true,
		}
	}
}

fn add_context<T>(r: Result<T>, ctx: &'static str) -> Result<T> {
	r.map_err(|e| e.with_context(ctx))
}

fn handle_eof<T>(v: Option<T>, ctx: &'static str) -> Result<T> {
	v.ok_or_else(|| Error::wfeof(ctx))
}

struct ST(State, Option<Token>);

impl ST {
	fn splice<'a>(self, st: &'a mut State) -> Option<Token> {
		*st = self.0;
		self.1
	}
}

#[derive(Debug, Clone, PartialEq)]
enum Error {
	EndOfBuffer,
	Fatal(CrateError),
}

impl Error {
	fn wfeof(ctx: &'static str) -> Error {
		Error::Fatal(CrateError::NotWellFormed(WFError::InvalidEof(ctx)))
	}

	fn utf8err(src: &[u8], e: &std::str::Utf8Error) -> Error {
		Error::Fatal(CrateError::InvalidUtf8Byte(src[e.valid_up_to()]))
	}
}

impl ErrorWithContext for Error {
	fn with_context(self, ctx: &'static str) -> Self {
		match self {
			Self::EndOfBuffer => Self::EndOfBuffer,
			Self::Fatal(e) => Self::Fatal(e.with_context(ctx)),
		}
	}
}

impl From<WFError> for Error {
	fn from(other: WFError) -> Self {
		Self::Fatal(CrateError::NotWellFormed(other))
	}
}

impl From<NWFError> for Error {
	fn from(other: NWFError) -> Self {
		Self::Fatal(CrateError::NotNamespaceWellFormed(other))
	}
}

impl From<EntityError> for Error {
	fn from(other: EntityError) -> Self {
		Self::Fatal(CrateError::Entity(other))
	}
}

impl From<CrateError> for Error {
	fn from(other: CrateError) -> Self {
		Self::Fatal(other)
	}
}

impl From<Error> for CrateError {
	fn from(other: Error) -> Self {
		match other {
			Error::EndOfBuffer => {
				io::Error::new(io::ErrorKind::WouldBlock, "end of current buffer reached")
					.into()
			}
			Error::Fatal(e) => e,
		}
	}
}

type Result<T> = std::result::Result<T, Error>;

/// Scratch space for the declaration currently being lexed.
#[derive(Default)]
struct DtdScratch {
	/// Name of the entity / element / attlist / notation declaration.
	name: Option<Name>,
	/// Parts of the entity value accumulated so far.
	value_parts: Vec<EntityPart>,
	public_id: Option<CData>,
	system_id: Option<CData>,
	/// Attlist: definitions completed so far.
	att_defs: Vec<AttDef>,
	/// Attlist: name of the attribute currently being defined.
	att_name: Option<Name>,
	/// Attlist: type of the attribute currently being defined.
	att_type: Option<AttType>,
	/// Enumeration tokens of the attribute type currently being defined
	/// (Nmtokens, hence not `Name`s).
	tokens: Vec<CData>,
	/// Notation name of an unparsed entity declaration.
	ndata: Option<Name>,
}

impl DtdScratch {
	fn clear(&mut self) {
		*self = Self::default();
	}
}

/**
# Streaming XML lexer

The lexer is fed bytes through [`Lexer::lex()`] or [`Lexer::lex_bytes()`]
and returns tokens as they are completed. See the [module documentation]
for the suspension behaviour.

   [module documentation]: self
*/
pub struct Lexer {
	state: State,
	scratchpad: Vec<u8>,
	swap: Vec<u8>,
	ctr: usize,
	last_token_end: usize,
	opts: LexerOptions,
	char_classes: CharClasses,
	entities: EntityTable,
	expansion: ExpansionStack,
	/// Resolver for external entities; consulted only when the respective
	/// option is enabled.
	resolver: Option<Box<dyn EntityResolver>>,
	/// Replacement values of already fetched external entities, keyed by
	/// system identifier.
	external_cache: HashMap<CData, RcPtr<EntityValue>>,
	/// Expansion depth at which each currently open element started.
	element_depths: Vec<usize>,
	/// True while reading from an expansion frame; freezes the position
	/// counter and inhibits EOF detection.
	in_expansion: bool,
	/// Token that must be emitted before any further lexing.
	pending: Option<Token>,
	dtd: DtdScratch,
	/// Last name seen inside the XML declaration, for version switching.
	xmldecl_name: Option<Name>,
	/// Encoding name from the XML declaration, for the decoding layer.
	declared_encoding: Option<CData>,
	/// keep the scratchpad and state for debugging
	#[cfg(debug_assertions)]
	prev_state: (Vec<u8>, State),
	err: Option<CrateError>,
	has_eof: bool,
}

impl Lexer {
	/// Construct a new Lexer based on [`LexerOptions::default()`].
	pub fn new() -> Self {
		Self::with_options(LexerOptions::default())
	}

	/// Construct a new Lexer with the given options.
	pub fn with_options(opts: LexerOptions) -> Self {
		Self {
			state: State::Content(ContentState::Whitespace),
			scratchpad: Vec::new(),
			swap: Vec::new(),
			ctr: 0,
			last_token_end: 0,
			char_classes: CharClasses::Xml10,
			entities: EntityTable::new(),
			expansion: ExpansionStack::new(opts.max_entity_depth, opts.max_entity_expansion),
			resolver: None,
			external_cache: HashMap::new(),
			element_depths: Vec::new(),
			in_expansion: false,
			pending: None,
			dtd: DtdScratch::default(),
			xmldecl_name: None,
			declared_encoding: None,
			opts,
			#[cfg(debug_assertions)]
			prev_state: (Vec::new(), State::Content(ContentState::Whitespace)),
			err: None,
			has_eof: false,
		}
	}

	/// Access the entity table collected from the internal subset.
	pub fn entities(&self) -> &EntityTable {
		&self.entities
	}

	/// The encoding name from the XML declaration, once it has been lexed.
	pub fn declared_encoding(&self) -> Option<&CDataStr> {
		self.declared_encoding.as_deref()
	}

	/// Install a resolver for external entities.
	///
	/// The resolver is only consulted when
	/// [`LexerOptions::external_general_entities`] or
	/// [`LexerOptions::external_parameter_entities`] is enabled; without
	/// one, enabled external entities are skipped.
	pub fn set_entity_resolver(&mut self, resolver: Box<dyn EntityResolver>) {
		self.resolver = Some(resolver);
	}

	fn demote_eof(&self, ep: Endbyte) -> Result<Endbyte> {
		match ep {
			Endbyte::Eof => {
				if self.has_eof && !self.in_expansion {
					Ok(Endbyte::Eof)
				} else {
					Err(Error::EndOfBuffer)
				}
			}
			other => Ok(other),
		}
	}

	fn token_length_error() -> Error {
		Error::Fatal(CrateError::LimitExceeded("long name, value or reference"))
	}

	fn eat_whitespace_metrics(&mut self, without: usize) {
		self.last_token_end = self.ctr.wrapping_sub(without);
	}

	#[inline]
	fn prep_scratchpad(&mut self) {
		if self.scratchpad.capacity() < self.opts.max_token_length {
			self.scratchpad
				.reserve_exact(self.opts.max_token_length - self.scratchpad.capacity())
		}
	}

	fn read_validated<B: ByteSelect>(
		&mut self,
		r: &mut &[u8],
		selector: &B,
		limit: usize,
	) -> Result<Endbyte> {
		let remaining = match limit.checked_sub(self.scratchpad.len()) {
			None => return Ok(Endbyte::Limit),
			Some(v) => v,
		};
		let old_len = self.scratchpad.len();
		self.prep_scratchpad();
		let ep = read::read_validated_bytes(r, selector, remaining, &mut self.scratchpad);
		if !self.in_expansion {
			self.ctr = self.ctr.wrapping_add(self.scratchpad.len() - old_len);
			if let Endbyte::Delimiter(_) = ep {
				self.ctr = self.ctr.wrapping_add(1);
			}
		}
		self.demote_eof(ep)
	}

	#[inline]
	fn read_single(&mut self, r: &mut &[u8]) -> Result<Option<u8>> {
		match r.split_first() {
			Some((v, tail)) => {
				if !self.in_expansion {
					self.ctr = self.ctr.wrapping_add(1);
				}
				*r = tail;
				Ok(Some(*v))
			}
			None => {
				if self.has_eof && !self.in_expansion {
					Ok(None)
				} else {
					Err(Error::EndOfBuffer)
				}
			}
		}
	}

	#[inline]
	fn skip_matching<B: ByteSelect>(
		&mut self,
		r: &mut &[u8],
		selector: &B,
	) -> (usize, Result<Endbyte>) {
		let (nread, ep) = read::skip_matching_bytes(r, selector);
		if !self.in_expansion {
			self.ctr = self.ctr.wrapping_add(nread);
		}
		match self.demote_eof(ep) {
			Ok(ep) => {
				if let Endbyte::Delimiter(_) = ep {
					if !self.in_expansion {
						self.ctr = self.ctr.wrapping_add(1)
					}
				};
				(nread, Ok(ep))
			}
			Err(e) => (nread, Err(e)),
		}
	}

	fn drop_scratchpad(&mut self) {
		self.scratchpad.clear();
	}

	fn swap_scratchpad(&mut self) {
		std::mem::swap(&mut self.scratchpad, &mut self.swap);
	}

	fn read_swap(&mut self) -> Vec<u8> {
		let mut tmp = Vec::new();
		std::mem::swap(&mut tmp, &mut self.swap);
		tmp
	}

	fn metrics(&mut self, without: usize) -> TokenMetrics {
		let start = self.last_token_end;
		let end = self.ctr.wrapping_sub(without);
		self.last_token_end = end;
		TokenMetrics { start, end }
	}

	fn flush_scratchpad<U, T: FnOnce(&[u8]) -> Result<U>>(&mut self, conv: T) -> Result<U> {
		let result = conv(&self.scratchpad);
		self.scratchpad.clear();
		result
	}

	fn bytes_to_name(bytes: &[u8]) -> Result<Name> {
		let s = std::str::from_utf8(bytes).map_err(|e| Error::utf8err(bytes, &e))?;
		Ok(s.try_into()?)
	}

	fn bytes_to_cdata(bytes: &[u8]) -> Result<CData> {
		let s = std::str::from_utf8(bytes).map_err(|e| Error::utf8err(bytes, &e))?;
		Ok(s.try_into()?)
	}

	fn flush_scratchpad_as_name(&mut self) -> Result<Name> {
		self.flush_scratchpad(Self::bytes_to_name)
	}

	fn flush_scratchpad_as_complete_cdata(&mut self) -> Result<CData> {
		self.flush_scratchpad(Self::bytes_to_cdata)
	}

	fn flush_scratchpad_as_partial_cdata(&mut self) -> Result<CData> {
		let s = match std::str::from_utf8(&self.scratchpad[..]) {
			Ok(s) => s,
			Err(e) => {
				let valid_up_to = e.valid_up_to();
				if valid_up_to == 0 {
					// a truly broken utf-8 sequence
					return Err(Error::Fatal(CrateError::InvalidUtf8Byte(
						self.scratchpad[0],
					)));
				} else {
					// return the valid prefix, the next call deals with the
					// rest
					unsafe { std::str::from_utf8_unchecked(&self.scratchpad[..valid_up_to]) }
				}
			}
		};
		let result: CData = s.try_into()?;
		let to_drop = s.len();
		self.scratchpad.drain(..to_drop);
		Ok(result)
	}

	fn maybe_flush_scratchpad_as_text(&mut self, without: usize) -> Result<Option<Token>> {
		if self.scratchpad.len() == 0 {
			self.eat_whitespace_metrics(without);
			Ok(None)
		} else {
			Ok(Some(Token::Text(
				self.metrics(without),
				self.flush_scratchpad_as_complete_cdata()?,
			)))
		}
	}

	fn flush_limited_scratchpad_as_text(&mut self) -> Result<Option<Token>> {
		if self.scratchpad.len() >= self.opts.max_token_length {
			Ok(Some(Token::Text(
				self.metrics(0),
				self.flush_scratchpad_as_partial_cdata()?,
			)))
		} else {
			Ok(None)
		}
	}

	fn push_char(&mut self, c: char) {
		let mut buf = [0u8; 4];
		let s = c.encode_utf8(&mut buf[..]);
		self.prep_scratchpad();
		self.scratchpad.extend_from_slice(s.as_bytes());
	}

	/// Emit `tok`, letting any pending text go out first.
	fn emit_with_text_flush(&mut self, tok: Token) -> Result<Option<Token>> {
		match self.maybe_flush_scratchpad_as_text(0)? {
			Some(text) => {
				debug_assert!(self.pending.is_none());
				self.pending = Some(tok);
				Ok(Some(text))
			}
			None => Ok(Some(tok)),
		}
	}

	/// Fetch the replacement of an external entity through the configured
	/// resolver. `Ok(None)` means "no resolver" or "resolver skipped it".
	fn fetch_external(&mut self, id: &ExternalId) -> Result<Option<RcPtr<EntityValue>>> {
		if let Some(cached) = self.external_cache.get(&id.system_id) {
			return Ok(Some(cached.clone()));
		}
		let resolver = match self.resolver.as_mut() {
			Some(r) => r,
			None => return Ok(None),
		};
		let source = match resolver.resolve(id.public_id.as_deref(), &id.system_id) {
			Ok(Some(src)) => src,
			Ok(None) => return Ok(None),
			Err(e) => return Err(e.into()),
		};
		let mut text = String::new();
		let mut reader = source.reader;
		if let Err(e) = reader.read_to_string(&mut text) {
			return Err(Error::Fatal(CrateError::io(e)));
		}
		let text = strip_text_declaration(text);
		let value = RcPtr::new(EntityValue {
			parts: vec![EntityPart::Text(text)],
		});
		self.external_cache
			.insert(id.system_id.clone(), value.clone());
		Ok(Some(value))
	}

	fn resolve_char_reference(&self, s: &str, radix: CharRefRadix) -> Result<char> {
		let radix = match radix {
			CharRefRadix::Decimal => 10,
			CharRefRadix::Hexadecimal => 16,
		};
		// cannot fail because the string is validated against the alphabet
		// and limited in length by the lexer
		let codepoint = u32::from_str_radix(s, radix).unwrap();
		let ch = match std::char::from_u32(codepoint) {
			Some(ch) => ch,
			None => {
				return Err(Error::Fatal(CrateError::NotWellFormed(WFError::InvalidChar(
					ERRCTX_UNKNOWN,
					codepoint,
					true,
				))))
			}
		};
		if self.char_classes.is_char_ref_target(ch) {
			Ok(ch)
		} else {
			Err(Error::Fatal(CrateError::NotWellFormed(WFError::InvalidChar(
				ERRCTX_UNKNOWN,
				codepoint,
				true,
			))))
		}
	}

	/// Interpret a character found inside a text section.
	///
	/// If no interpretation can be found, an Ok result but no next state is
	/// returned; the caller decides whether the byte is data or an error.
	fn lex_posttext_char(&mut self, b: u8) -> Result<Option<ST>> {
		match b {
			b'<' => Ok(Some(ST(
				State::Content(ContentState::MaybeElement(MaybeElementState::Initial)),
				self.maybe_flush_scratchpad_as_text(1)?, // 1 == len("<")
			))),
			// begin of forbidden CDATA section end sequence (XML 1.0 § 2.4)
			b']' => Ok(Some(ST(
				State::Content(ContentState::MaybeCDataEnd(false, 1)),
				// no flush here to avoid needless reallocations on false
				// alarm
				None,
			))),
			b'&' => {
				// The scratchpad is swapped because the reference name needs
				// a buffer of its own; the pending text is flushed first so
				// the swap holds nothing of value.
				let tok = self.maybe_flush_scratchpad_as_text(1)?; // 1 == len("&")
				self.swap_scratchpad();
				Ok(Some(ST(
					State::Reference {
						ctx: ERRCTX_TEXT,
						ret: RefReturnState::Text,
						kind: RefKind::Entity,
					},
					tok,
				)))
			}
			b'\r' => Ok(Some(ST(
				State::Content(ContentState::MaybeCRLF(false)),
				None,
			))),
			_ => Ok(None),
		}
	}

	fn lex_resume_text(&mut self, b: u8) -> Result<ST> {
		match self.lex_posttext_char(b)? {
			// special delimiter char -> state transition
			Some(st) => Ok(st),
			// no special char -> check if it is possibly valid text
			None => {
				if CLASS_XML_MAY_NONCHAR_BYTE.select(b) {
					Err(Error::Fatal(CrateError::NotWellFormed(WFError::InvalidChar(
						ERRCTX_TEXT,
						b as u32,
						false,
					))))
				} else {
					self.prep_scratchpad();
					self.scratchpad.push(b);
					Ok(ST(State::Content(ContentState::Initial), None))
				}
			}
		}
	}

	fn lex_maybe_element(&mut self, state: MaybeElementState, r: &mut &[u8]) -> Result<ST> {
		match state {
			MaybeElementState::Initial => match self.read_single(r)? {
				Some(b'?') => {
					// `<?xml` can only be the XML declaration at the very
					// beginning of the stream
					let decl_allowed = self.ctr == 2;
					self.drop_scratchpad();
					Ok(ST(
						State::Pi {
							ret: MiscReturn::Content,
							state: PiState::Target { decl_allowed },
						},
						None,
					))
				}
				Some(b'!') => {
					self.drop_scratchpad();
					Ok(ST(
						State::Content(ContentState::MaybeElement(MaybeElementState::Bang)),
						None,
					))
				}
				Some(b'/') => {
					self.drop_scratchpad();
					Ok(ST(
						State::Element {
							kind: ElementKind::Footer,
							state: ElementState::Start,
						},
						None,
					))
				}
				Some(b) => {
					if CLASS_XML_NAMESTART_BYTE.select(b) {
						// add the first character to the scratchpad, because
						// read_single does not do that
						self.prep_scratchpad();
						self.scratchpad.push(b);
						Ok(ST(
							State::Element {
								kind: ElementKind::Header,
								state: ElementState::Start,
							},
							None,
						))
					} else {
						self.drop_scratchpad();
						Err(Error::Fatal(CrateError::NotWellFormed(
							WFError::UnexpectedByte(ERRCTX_NAMESTART, b, None),
						)))
					}
				}
				None => Err(Error::wfeof(ERRCTX_ELEMENT)),
			},
			MaybeElementState::Bang => match handle_eof(self.read_single(r)?, ERRCTX_ELEMENT)? {
				b'-' => Ok(ST(
					State::Comment {
						ret: MiscReturn::Content,
						state: CommentState::Start,
					},
					None,
				)),
				b'[' => Ok(ST(
					State::Content(ContentState::MaybeElement(
						MaybeElementState::CDataSectionStart(3),
					)),
					None,
				)),
				b if CLASS_UPPER_ALPHA_BYTE.select(b) => {
					self.prep_scratchpad();
					self.scratchpad.push(b);
					Ok(ST(
						State::Content(ContentState::MaybeElement(
							MaybeElementState::BangKeyword,
						)),
						None,
					))
				}
				b => Err(Error::Fatal(CrateError::NotWellFormed(
					WFError::UnexpectedByte(
						ERRCTX_ELEMENT,
						b,
						Some(&["-", "[", "DOCTYPE"]),
					),
				))),
			},
			MaybeElementState::BangKeyword => {
				match self.read_validated(r, &CLASS_UPPER_ALPHA_BYTE, KW_DOCTYPE.len() + 1)? {
					Endbyte::Eof => Err(Error::wfeof(ERRCTX_DOCTYPE)),
					Endbyte::Limit => Err(Error::Fatal(CrateError::NotWellFormed(
						WFError::InvalidSyntax("unknown declaration keyword"),
					))),
					Endbyte::Delimiter(b) => {
						if self.scratchpad != KW_DOCTYPE {
							return Err(Error::Fatal(CrateError::NotWellFormed(
								WFError::InvalidSyntax("unknown declaration keyword"),
							)));
						}
						if !CLASS_XML_SPACE_BYTE.select(b) {
							return Err(Error::Fatal(CrateError::NotWellFormed(
								WFError::UnexpectedByte(ERRCTX_DOCTYPE, b, Some(&["space"])),
							)));
						}
						self.drop_scratchpad();
						Ok(ST(State::Doctype(DoctypeState::Start), None))
					}
				}
			}
			MaybeElementState::CDataSectionStart(i) => {
				debug_assert!(i < TOK_XML_CDATA_START.len());
				let b = handle_eof(self.read_single(r)?, ERRCTX_CDATA_SECTION_START)?;
				if b != TOK_XML_CDATA_START[i] {
					return Err(Error::Fatal(CrateError::NotWellFormed(
						WFError::InvalidSyntax("malformed cdata section start"),
					)));
				}
				let next = i + 1;
				if next == TOK_XML_CDATA_START.len() {
					self.drop_scratchpad();
					Ok(ST(
						State::Content(ContentState::CDataSection),
						Some(Token::CDataStart(self.metrics(0))),
					))
				} else {
					Ok(ST(
						State::Content(ContentState::MaybeElement(
							MaybeElementState::CDataSectionStart(next),
						)),
						None,
					))
				}
			}
		}
	}

	fn lex_maybe_cdata_end(&mut self, in_cdata: bool, nend: usize, r: &mut &[u8]) -> Result<ST> {
		debug_assert!(nend < TOK_XML_CDATA_END.len());
		let ctx = if in_cdata {
			ERRCTX_CDATA_SECTION
		} else {
			ERRCTX_TEXT
		};
		let b = handle_eof(self.read_single(r)?, ctx)?;
		let expected = TOK_XML_CDATA_END[nend];
		if b == expected {
			match nend {
				1 => Ok(ST(
					State::Content(ContentState::MaybeCDataEnd(in_cdata, 2)),
					None,
				)),
				// ]]> read completely
				2 => {
					if !in_cdata {
						Err(WFError::CDataEndInContent.into())
					} else {
						// the body, if any, is flushed without the 3 bytes
						// of the delimiter, which belong to the CDataEnd
						// token
						let st = State::Content(ContentState::Initial);
						match self.maybe_flush_scratchpad_as_text(3)? {
							Some(text) => {
								debug_assert!(self.pending.is_none());
								self.pending = Some(Token::CDataEnd(self.metrics(0)));
								Ok(ST(st, Some(text)))
							}
							None => Ok(ST(st, Some(Token::CDataEnd(self.metrics(0))))),
						}
					}
				}
				_ => unreachable!("invalid cdata end state"),
			}
		} else if b == b']' {
			// this may still be a `]]]]>`-style sequence; the previously
			// found ] moves to the scratchpad and we stay in this state
			self.prep_scratchpad();
			self.scratchpad.push(b']');
			Ok(ST(
				State::Content(ContentState::MaybeCDataEnd(in_cdata, nend)),
				self.flush_limited_scratchpad_as_text()?,
			))
		} else {
			// sequence was broken
			self.prep_scratchpad();
			self.scratchpad.extend_from_slice(&TOK_XML_CDATA_END[..nend]);
			if in_cdata {
				if CLASS_XML_MAY_NONCHAR_BYTE.select(b) {
					Err(Error::Fatal(CrateError::NotWellFormed(WFError::InvalidChar(
						ERRCTX_CDATA_SECTION,
						b as u32,
						false,
					))))
				} else {
					// no need for prep, we pushed above already
					self.scratchpad.push(b);
					Ok(ST(
						State::Content(ContentState::CDataSection),
						self.flush_limited_scratchpad_as_text()?,
					))
				}
			} else {
				self.lex_resume_text(b)
			}
		}
	}

	fn lex_content(&mut self, state: ContentState, r: &mut &[u8]) -> Result<ST> {
		match state {
			ContentState::MaybeElement(substate) => self.lex_maybe_element(substate, r),
			ContentState::MaybeCDataEnd(in_cdata, nend) => {
				self.lex_maybe_cdata_end(in_cdata, nend, r)
			}

			ContentState::MaybeCRLF(in_cdata) => {
				let b = handle_eof(self.read_single(r)?, ERRCTX_TEXT)?;
				match b {
					b'\n' => {
						// CRLF, only insert the \n
						self.prep_scratchpad();
						self.scratchpad.push(b'\n');
						Ok(ST(
							if in_cdata {
								State::Content(ContentState::CDataSection)
							} else {
								State::Content(ContentState::Initial)
							},
							None,
						))
					}
					b'\r' => {
						// double CR; the first gets folded to LF, the second
						// may still be followed by an LF
						self.prep_scratchpad();
						self.scratchpad.push(b'\n');
						Ok(ST(State::Content(ContentState::MaybeCRLF(in_cdata)), None))
					}
					b => {
						// lone CR folds to LF, then the byte is processed
						// normally
						self.prep_scratchpad();
						self.scratchpad.push(b'\n');
						if in_cdata {
							if b == b']' {
								Ok(ST(
									State::Content(ContentState::MaybeCDataEnd(true, 1)),
									None,
								))
							} else if !CLASS_XML_MAY_NONCHAR_BYTE.select(b) {
								self.scratchpad.push(b);
								Ok(ST(State::Content(ContentState::CDataSection), None))
							} else {
								Err(Error::Fatal(CrateError::NotWellFormed(
									WFError::InvalidChar(
										ERRCTX_CDATA_SECTION,
										b as u32,
										false,
									),
								)))
							}
						} else {
							self.lex_resume_text(b)
						}
					}
				}
			}

			// read until the next delimiter
			ContentState::Initial => match self.read_validated(
				r,
				&CLASS_XML_TEXT_DELIMITED_BYTE,
				self.opts.max_token_length,
			)? {
				Endbyte::Eof => Ok(ST(State::Eof, self.maybe_flush_scratchpad_as_text(0)?)),
				Endbyte::Limit => Ok(ST(
					State::Content(ContentState::Initial),
					self.maybe_flush_scratchpad_as_text(0)?,
				)),
				Endbyte::Delimiter(b) => match self.lex_posttext_char(b)? {
					Some(st) => Ok(st),
					// not a "special" char but not text either -> error
					None => Err(Error::Fatal(CrateError::NotWellFormed(WFError::InvalidChar(
						ERRCTX_TEXT,
						b as u32,
						false,
					)))),
				},
			},
			ContentState::CDataSection => match self.read_validated(
				r,
				&CLASS_XML_CDATA_SECTION_DELIMITED_BYTE,
				self.opts.max_token_length,
			)? {
				Endbyte::Eof => Err(Error::wfeof(ERRCTX_CDATA_SECTION)),
				Endbyte::Limit => Ok(ST(
					State::Content(ContentState::CDataSection),
					self.maybe_flush_scratchpad_as_text(0)?,
				)),
				Endbyte::Delimiter(b) => match b {
					b']' => Ok(ST(
						State::Content(ContentState::MaybeCDataEnd(true, 1)),
						None,
					)),
					b'\r' => Ok(ST(State::Content(ContentState::MaybeCRLF(true)), None)),
					_ => Err(Error::Fatal(CrateError::NotWellFormed(WFError::InvalidChar(
						ERRCTX_CDATA_SECTION,
						b as u32,
						false,
					)))),
				},
			},
			ContentState::Whitespace => match self.skip_matching(r, &CLASS_XML_SPACE_BYTE) {
				(_, Ok(Endbyte::Eof)) | (_, Ok(Endbyte::Limit)) => Ok(ST(State::Eof, None)),
				(_, Ok(Endbyte::Delimiter(b))) => match b {
					// the skipped whitespace is attributed to whatever
					// markup follows
					b'<' => Ok(ST(
						State::Content(ContentState::MaybeElement(MaybeElementState::Initial)),
						None,
					)),
					_ => Err(Error::Fatal(CrateError::NotWellFormed(
						WFError::UnexpectedByte(ERRCTX_DOCBEGIN, b, Some(&["Spaces", "<"])),
					))),
				},
				(_, Err(e)) => Err(e),
			},
		}
	}

	fn lex_element_postblank(&mut self, kind: ElementKind, b: u8) -> Result<ElementState> {
		match b {
			b' ' | b'\t' | b'\r' | b'\n' => Ok(ElementState::Blank),
			b'"' => Ok(ElementState::AttributeValue(
				b'"',
				&CLASS_XML_ATT_QUOT_DELIMITED_BYTE,
				false,
			)),
			b'\'' => Ok(ElementState::AttributeValue(
				b'\'',
				&CLASS_XML_ATT_APOS_DELIMITED_BYTE,
				false,
			)),
			b'=' => Ok(ElementState::Eq),
			b'>' => match kind {
				ElementKind::Footer | ElementKind::Header => Ok(ElementState::Close),
				ElementKind::XmlDecl => Err(Error::Fatal(CrateError::NotWellFormed(
					WFError::UnexpectedChar(ERRCTX_XML_DECL, '>', Some(&["?"])),
				))),
			},
			b'?' => match kind {
				ElementKind::XmlDecl => Ok(ElementState::MaybeXmlDeclEnd),
				_ => Err(Error::Fatal(CrateError::NotWellFormed(
					WFError::UnexpectedChar(ERRCTX_ELEMENT, '?', None),
				))),
			},
			b'/' => match kind {
				ElementKind::Header => Ok(ElementState::MaybeHeadClose),
				ElementKind::Footer => Err(Error::Fatal(CrateError::NotWellFormed(
					WFError::UnexpectedChar(ERRCTX_ELEMENT_FOOT, '/', None),
				))),
				ElementKind::XmlDecl => Err(Error::Fatal(CrateError::NotWellFormed(
					WFError::UnexpectedChar(ERRCTX_XML_DECL, '/', None),
				))),
			},
			b if CLASS_XML_NAMESTART_BYTE.select(b) => {
				// write the char to scratchpad because it's needed
				self.prep_scratchpad();
				self.scratchpad.push(b);
				Ok(ElementState::Name)
			}
			_ => Err(Error::Fatal(CrateError::NotWellFormed(WFError::UnexpectedByte(
				match kind {
					ElementKind::XmlDecl => ERRCTX_XML_DECL,
					_ => ERRCTX_ELEMENT,
				},
				b,
				Some(&["whitespace", "\"", "'", "=", ">", "?", "/", "start of name"]),
			)))),
		}
	}

	fn lex_attval_next(
		&mut self,
		delim: u8,
		selector: &'static [ByteRange],
		b: u8,
		element_kind: ElementKind,
	) -> Result<ST> {
		match b {
			b'<' => Err(WFError::UnescapedLtInAttribute.into()),
			b'&' => {
				// must swap scratchpad here to avoid clobbering the
				// attribute value during entity read
				self.swap_scratchpad();
				Ok(ST(
					State::Reference {
						ctx: ERRCTX_ATTVAL,
						ret: RefReturnState::AttributeValue(element_kind, delim, selector),
						kind: RefKind::Entity,
					},
					None,
				))
			}
			b'\t' | b'\n' => {
				self.prep_scratchpad();
				self.scratchpad.push(b' ');
				Ok(ST(
					State::Element {
						kind: element_kind,
						state: ElementState::AttributeValue(delim, selector, false),
					},
					None,
				))
			}
			b'\r' => Ok(ST(
				State::Element {
					kind: element_kind,
					state: ElementState::AttributeValue(delim, selector, true),
				},
				None,
			)),
			d if d == delim && !self.in_expansion => Ok(ST(
				State::Element {
					kind: element_kind,
					// require whitespace after the attribute as the grammar
					// demands
					state: ElementState::SpaceRequired,
				},
				Some(Token::AttributeValue(
					self.metrics(0),
					self.flush_scratchpad_as_complete_cdata()?,
				)),
			)),
			other => {
				if CLASS_XML_MAY_NONCHAR_BYTE.select(other) {
					Err(Error::Fatal(CrateError::NotWellFormed(WFError::InvalidChar(
						ERRCTX_ATTVAL,
						other as u32,
						false,
					))))
				} else {
					// inside an expansion frame the value delimiter is data
					self.prep_scratchpad();
					self.scratchpad.push(other);
					Ok(ST(
						State::Element {
							kind: element_kind,
							state: ElementState::AttributeValue(delim, selector, false),
						},
						None,
					))
				}
			}
		}
	}

	fn lex_element(&mut self, kind: ElementKind, state: ElementState, r: &mut &[u8]) -> Result<ST> {
		match state {
			ElementState::Start | ElementState::Name => {
				if self.scratchpad.len() == 0 {
					// the first char must match CLASS_XML_NAMESTART, not
					// just CLASS_XML_NAME
					let b = handle_eof(self.read_single(r)?, ERRCTX_NAME)?;
					if !CLASS_XML_NAMESTART_BYTE.select(b) {
						Err(Error::Fatal(CrateError::NotWellFormed(
							WFError::UnexpectedByte(ERRCTX_NAME, b, None),
						)))
					} else {
						self.prep_scratchpad();
						self.scratchpad.push(b);
						// continue in the same state; read_validated takes
						// care of the rest
						Ok(ST(State::Element { kind, state }, None))
					}
				} else {
					match self.read_validated(r, &CLASS_XML_NAME_BYTE, self.opts.max_token_length)? {
						Endbyte::Eof => Err(Error::wfeof(ERRCTX_NAME)),
						Endbyte::Limit => Err(Self::token_length_error()),
						Endbyte::Delimiter(ch) => {
							let next_state = self.lex_element_postblank(kind, ch)?;
							let name = self.flush_scratchpad_as_name()?;
							let metrics = self.metrics(1);
							let tok = if state == ElementState::Name {
								if kind == ElementKind::XmlDecl {
									self.xmldecl_name = Some(name.clone());
								}
								Token::Name(metrics, name)
							} else {
								match kind {
									ElementKind::Header => {
										self.element_depths.push(self.expansion.depth());
										Token::ElementHeadStart(metrics, name)
									}
									ElementKind::Footer => {
										self.check_element_depth()?;
										Token::ElementFootStart(metrics, name)
									}
									ElementKind::XmlDecl => unreachable!("xml decl has no name"),
								}
							};
							Ok(ST(
								State::Element {
									kind,
									state: next_state,
								},
								Some(tok),
							))
						}
					}
				}
			}
			ElementState::SpaceRequired | ElementState::Blank => {
				match self.skip_matching(r, &CLASS_XML_SPACE_BYTE) {
					(_, Ok(Endbyte::Eof)) | (_, Ok(Endbyte::Limit)) => {
						Err(Error::wfeof(ERRCTX_ELEMENT))
					}
					(nmatching, Err(Error::EndOfBuffer))
						if nmatching > 0 && state == ElementState::SpaceRequired =>
					{
						// transition from SpaceRequired to Blank after a
						// single space, to stay resilient against chunking
						Ok(ST(
							State::Element {
								kind,
								state: ElementState::Blank,
							},
							None,
						))
					}
					(nmatching, Ok(Endbyte::Delimiter(b))) => {
						self.eat_whitespace_metrics(1);
						let next_state = self.lex_element_postblank(kind, b)?;
						if next_state == ElementState::Name
							&& state == ElementState::SpaceRequired
							&& nmatching == 0
						{
							Err(Error::Fatal(CrateError::NotWellFormed(
								WFError::InvalidSyntax("space required before attribute names"),
							)))
						} else {
							Ok(ST(
								State::Element {
									kind,
									state: next_state,
								},
								None,
							))
						}
					}
					(_, Err(e)) => Err(e),
				}
			}
			// XML 1.0 § 2.3 [10] AttValue
			ElementState::AttributeValue(delim, selector, false) => {
				// inside an expansion frame the delimiter is data; only `<`
				// and whitespace remain special
				let effective: &'static [ByteRange] = if self.in_expansion {
					&CLASS_XML_ATT_ENTITY_DELIMITED_BYTE
				} else {
					selector
				};
				match self.read_validated(r, &effective, self.opts.max_token_length)? {
					Endbyte::Eof => Err(Error::wfeof(ERRCTX_ATTVAL)),
					Endbyte::Limit => Err(Self::token_length_error()),
					Endbyte::Delimiter(b) => self.lex_attval_next(delim, selector, b, kind),
				}
			}
			// CRLF normalization for attributes; cannot reuse the content
			// mechanism because the delimiter and selector must be carried
			ElementState::AttributeValue(delim, selector, true) => {
				let b = handle_eof(self.read_single(r)?, ERRCTX_ATTVAL)?;
				if b == b'\r' {
					self.prep_scratchpad();
					self.scratchpad.push(b' ');
					Ok(ST(
						State::Element {
							kind,
							state: ElementState::AttributeValue(delim, selector, true),
						},
						None,
					))
				} else if b == b'\n' {
					self.prep_scratchpad();
					self.scratchpad.push(b' ');
					Ok(ST(
						State::Element {
							kind,
							state: ElementState::AttributeValue(delim, selector, false),
						},
						None,
					))
				} else {
					// lone CR: became a space, reprocess the byte
					self.prep_scratchpad();
					self.scratchpad.push(b' ');
					self.lex_attval_next(delim, selector, b, kind)
				}
			}
			ElementState::MaybeXmlDeclEnd => match self.read_single(r)? {
				Some(b) if b == b'>' => {
					self.drop_scratchpad();
					Ok(ST(
						State::Content(ContentState::Whitespace),
						Some(Token::XmlDeclEnd(self.metrics(0))),
					))
				}
				Some(b) => Err(Error::Fatal(CrateError::NotWellFormed(
					WFError::UnexpectedByte(ERRCTX_XML_DECL_END, b, Some(&[">"])),
				))),
				None => Err(Error::wfeof(ERRCTX_XML_DECL_END)),
			},
			ElementState::MaybeHeadClose => match self.read_single(r)? {
				Some(b) if b == b'>' => {
					self.drop_scratchpad();
					// the element closes right away; pop its depth record
					self.check_element_depth()?;
					Ok(ST(
						State::Content(ContentState::Initial),
						Some(Token::ElementHeadClose(self.metrics(0))),
					))
				}
				Some(b) => Err(Error::Fatal(CrateError::NotWellFormed(
					WFError::UnexpectedByte(ERRCTX_ELEMENT_CLOSE, b, Some(&[">"])),
				))),
				None => Err(Error::wfeof(ERRCTX_ELEMENT_CLOSE)),
			},
			// do NOT read anything here; this state is entered when another
			// state has read a '='.
			ElementState::Eq => Ok(ST(
				State::Element {
					kind,
					state: ElementState::Blank,
				},
				Some(Token::Eq(self.metrics(0))),
			)),
			// like with Eq, no read here
			ElementState::Close => Ok(ST(
				State::Content(ContentState::Initial),
				Some(Token::ElementHFEnd(self.metrics(0))),
			)),
		}
	}

	/// Pop one element depth record and verify it matches the current
	/// expansion depth.
	fn check_element_depth(&mut self) -> Result<()> {
		match self.element_depths.pop() {
			Some(d) if d == self.expansion.depth() => Ok(()),
			Some(_) => Err(WFError::EntityNestingMismatch.into()),
			// surplus closing tags are caught by the parser; nothing to
			// verify here
			None => Ok(()),
		}
	}

	fn lex_comment(&mut self, ret: MiscReturn, state: CommentState, r: &mut &[u8]) -> Result<ST> {
		match state {
			CommentState::Start => {
				let b = handle_eof(self.read_single(r)?, ERRCTX_COMMENT)?;
				if b != b'-' {
					return Err(Error::Fatal(CrateError::NotWellFormed(
						WFError::UnexpectedByte(ERRCTX_COMMENT, b, Some(&["-"])),
					)));
				}
				Ok(ST(
					State::Comment {
						ret,
						state: CommentState::Body,
					},
					None,
				))
			}
			CommentState::Body => match self.read_validated(
				r,
				&CLASS_XML_COMMENT_DELIMITED_BYTE,
				self.opts.max_token_length,
			)? {
				Endbyte::Eof => Err(Error::wfeof(ERRCTX_COMMENT)),
				Endbyte::Limit => Err(Self::token_length_error()),
				Endbyte::Delimiter(b'-') => Ok(ST(
					State::Comment {
						ret,
						state: CommentState::MaybeEnd(1),
					},
					None,
				)),
				Endbyte::Delimiter(b'\r') => Ok(ST(
					State::Comment {
						ret,
						state: CommentState::MaybeCRLF,
					},
					None,
				)),
				Endbyte::Delimiter(b) => Err(Error::Fatal(CrateError::NotWellFormed(
					WFError::InvalidChar(ERRCTX_COMMENT, b as u32, false),
				))),
			},
			CommentState::MaybeCRLF => {
				let b = handle_eof(self.read_single(r)?, ERRCTX_COMMENT)?;
				self.prep_scratchpad();
				self.scratchpad.push(b'\n');
				match b {
					b'\n' => Ok(ST(
						State::Comment {
							ret,
							state: CommentState::Body,
						},
						None,
					)),
					b'\r' => Ok(ST(
						State::Comment {
							ret,
							state: CommentState::MaybeCRLF,
						},
						None,
					)),
					b'-' => Ok(ST(
						State::Comment {
							ret,
							state: CommentState::MaybeEnd(1),
						},
						None,
					)),
					b if !CLASS_XML_MAY_NONCHAR_BYTE.select(b) => {
						self.scratchpad.push(b);
						Ok(ST(
							State::Comment {
								ret,
								state: CommentState::Body,
							},
							None,
						))
					}
					b => Err(Error::Fatal(CrateError::NotWellFormed(WFError::InvalidChar(
						ERRCTX_COMMENT,
						b as u32,
						false,
					)))),
				}
			}
			CommentState::MaybeEnd(1) => {
				let b = handle_eof(self.read_single(r)?, ERRCTX_COMMENT)?;
				match b {
					b'-' => Ok(ST(
						State::Comment {
							ret,
							state: CommentState::MaybeEnd(2),
						},
						None,
					)),
					b'\r' => {
						self.prep_scratchpad();
						self.scratchpad.push(b'-');
						Ok(ST(
							State::Comment {
								ret,
								state: CommentState::MaybeCRLF,
							},
							None,
						))
					}
					b if !CLASS_XML_MAY_NONCHAR_BYTE.select(b) => {
						self.prep_scratchpad();
						self.scratchpad.push(b'-');
						self.scratchpad.push(b);
						Ok(ST(
							State::Comment {
								ret,
								state: CommentState::Body,
							},
							None,
						))
					}
					b => Err(Error::Fatal(CrateError::NotWellFormed(WFError::InvalidChar(
						ERRCTX_COMMENT,
						b as u32,
						false,
					)))),
				}
			}
			CommentState::MaybeEnd(_) => {
				let b = handle_eof(self.read_single(r)?, ERRCTX_COMMENT)?;
				if b == b'>' {
					let data = self.flush_scratchpad_as_complete_cdata()?;
					Ok(ST(
						ret.to_state(),
						Some(Token::Comment(self.metrics(0), data)),
					))
				} else {
					// `--` inside a comment body
					Err(WFError::DoubleHyphenInComment.into())
				}
			}
		}
	}

	fn lex_pi(&mut self, ret: MiscReturn, state: PiState, r: &mut &[u8]) -> Result<ST> {
		match state {
			PiState::Target { decl_allowed } => {
				if self.scratchpad.len() == 0 {
					let b = handle_eof(self.read_single(r)?, ERRCTX_PI_TARGET)?;
					if !CLASS_XML_NAMESTART_BYTE.select(b) {
						return Err(Error::Fatal(CrateError::NotWellFormed(
							WFError::UnexpectedByte(ERRCTX_PI_TARGET, b, None),
						)));
					}
					self.prep_scratchpad();
					self.scratchpad.push(b);
					return Ok(ST(
						State::Pi {
							ret,
							state: PiState::Target { decl_allowed },
						},
						None,
					));
				}
				match self.read_validated(r, &CLASS_XML_NAME_BYTE, self.opts.max_token_length)? {
					Endbyte::Eof => Err(Error::wfeof(ERRCTX_PI_TARGET)),
					Endbyte::Limit => Err(Self::token_length_error()),
					Endbyte::Delimiter(b) => {
						let next = match b {
							b' ' | b'\t' | b'\r' | b'\n' => PiState::AfterTarget,
							b'?' => PiState::MaybeEnd,
							other => {
								return Err(Error::Fatal(CrateError::NotWellFormed(
									WFError::UnexpectedByte(
										ERRCTX_PI_TARGET,
										other,
										Some(&["whitespace", "?"]),
									),
								)))
							}
						};
						if self.scratchpad == b"xml" {
							// the XML declaration, only valid as the very
							// first bytes of the stream
							if decl_allowed && ret == MiscReturn::Content {
								self.drop_scratchpad();
								if next == PiState::MaybeEnd {
									return Err(Error::Fatal(CrateError::NotWellFormed(
										WFError::InvalidSyntax(
											"'<?xml' must be followed by version attribute",
										),
									)));
								}
								return Ok(ST(
									State::Element {
										kind: ElementKind::XmlDecl,
										state: ElementState::Blank,
									},
									Some(Token::XmlDeclStart(self.metrics(1))),
								));
							}
							return Err(WFError::ReservedPITarget.into());
						}
						if self.scratchpad.eq_ignore_ascii_case(b"xml") {
							return Err(WFError::ReservedPITarget.into());
						}
						let name = self.flush_scratchpad_as_name()?;
						Ok(ST(
							State::Pi { ret, state: next },
							Some(Token::PITarget(self.metrics(1), name)),
						))
					}
				}
			}
			PiState::AfterTarget => match self.skip_matching(r, &CLASS_XML_SPACE_BYTE) {
				(_, Ok(Endbyte::Eof)) | (_, Ok(Endbyte::Limit)) => Err(Error::wfeof(ERRCTX_PI)),
				(_, Ok(Endbyte::Delimiter(b))) => {
					self.eat_whitespace_metrics(1);
					match b {
						b'?' => Ok(ST(
							State::Pi {
								ret,
								state: PiState::MaybeEnd,
							},
							None,
						)),
						b'\r' => Ok(ST(
							State::Pi {
								ret,
								state: PiState::MaybeCRLF,
							},
							None,
						)),
						b if !CLASS_XML_MAY_NONCHAR_BYTE.select(b) => {
							self.prep_scratchpad();
							self.scratchpad.push(b);
							Ok(ST(
								State::Pi {
									ret,
									state: PiState::Body,
								},
								None,
							))
						}
						b => Err(Error::Fatal(CrateError::NotWellFormed(
							WFError::InvalidChar(ERRCTX_PI, b as u32, false),
						))),
					}
				}
				(_, Err(e)) => Err(e),
			},
			PiState::Body => match self.read_validated(
				r,
				&CLASS_XML_PI_DELIMITED_BYTE,
				self.opts.max_token_length,
			)? {
				Endbyte::Eof => Err(Error::wfeof(ERRCTX_PI)),
				Endbyte::Limit => Err(Self::token_length_error()),
				Endbyte::Delimiter(b'?') => Ok(ST(
					State::Pi {
						ret,
						state: PiState::MaybeEnd,
					},
					None,
				)),
				Endbyte::Delimiter(b'\r') => Ok(ST(
					State::Pi {
						ret,
						state: PiState::MaybeCRLF,
					},
					None,
				)),
				Endbyte::Delimiter(b) => Err(Error::Fatal(CrateError::NotWellFormed(
					WFError::InvalidChar(ERRCTX_PI, b as u32, false),
				))),
			},
			PiState::MaybeCRLF => {
				let b = handle_eof(self.read_single(r)?, ERRCTX_PI)?;
				self.prep_scratchpad();
				self.scratchpad.push(b'\n');
				match b {
					b'\n' => Ok(ST(
						State::Pi {
							ret,
							state: PiState::Body,
						},
						None,
					)),
					b'\r' => Ok(ST(
						State::Pi {
							ret,
							state: PiState::MaybeCRLF,
						},
						None,
					)),
					b'?' => Ok(ST(
						State::Pi {
							ret,
							state: PiState::MaybeEnd,
						},
						None,
					)),
					b if !CLASS_XML_MAY_NONCHAR_BYTE.select(b) => {
						self.scratchpad.push(b);
						Ok(ST(
							State::Pi {
								ret,
								state: PiState::Body,
							},
							None,
						))
					}
					b => Err(Error::Fatal(CrateError::NotWellFormed(WFError::InvalidChar(
						ERRCTX_PI,
						b as u32,
						false,
					)))),
				}
			}
			PiState::MaybeEnd => {
				let b = handle_eof(self.read_single(r)?, ERRCTX_PI)?;
				match b {
					b'>' => {
						let data = self.flush_scratchpad_as_complete_cdata()?;
						Ok(ST(
							ret.to_state(),
							Some(Token::PIData(self.metrics(0), data)),
						))
					}
					b'?' => {
						self.prep_scratchpad();
						self.scratchpad.push(b'?');
						Ok(ST(
							State::Pi {
								ret,
								state: PiState::MaybeEnd,
							},
							None,
						))
					}
					b'\r' => {
						self.prep_scratchpad();
						self.scratchpad.push(b'?');
						Ok(ST(
							State::Pi {
								ret,
								state: PiState::MaybeCRLF,
							},
							None,
						))
					}
					b if !CLASS_XML_MAY_NONCHAR_BYTE.select(b) => {
						self.prep_scratchpad();
						self.scratchpad.push(b'?');
						self.scratchpad.push(b);
						Ok(ST(
							State::Pi {
								ret,
								state: PiState::Body,
							},
							None,
						))
					}
					b => Err(Error::Fatal(CrateError::NotWellFormed(WFError::InvalidChar(
						ERRCTX_PI,
						b as u32,
						false,
					)))),
				}
			}
		}
	}

	fn lex_reference(
		&mut self,
		ctx: &'static str,
		ret: RefReturnState,
		kind: RefKind,
		r: &mut &[u8],
	) -> Result<ST> {
		let result = match kind {
			RefKind::Entity => self.read_validated(r, &CLASS_XML_NAME_BYTE, MAX_REFERENCE_LENGTH)?,
			RefKind::Char(CharRefRadix::Decimal) => {
				self.read_validated(r, &CLASS_XML_DECIMAL_DIGIT_BYTE, MAX_REFERENCE_LENGTH)?
			}
			RefKind::Char(CharRefRadix::Hexadecimal) => {
				self.read_validated(r, &CLASS_XML_HEXADECIMAL_DIGIT_BYTE, MAX_REFERENCE_LENGTH)?
			}
		};
		let b = match result {
			Endbyte::Eof => return Err(Error::wfeof(ERRCTX_REF)),
			Endbyte::Limit => return Err(EntityError::Undeclared(ctx).into()),
			Endbyte::Delimiter(b) => b,
		};
		match b {
			b'#' if self.scratchpad.len() == 0 && kind == RefKind::Entity => {
				return Ok(ST(
					State::Reference {
						ctx,
						ret,
						kind: RefKind::Char(CharRefRadix::Decimal),
					},
					None,
				))
			}
			b'x' if self.scratchpad.len() == 0
				&& kind == RefKind::Char(CharRefRadix::Decimal) =>
			{
				return Ok(ST(
					State::Reference {
						ctx,
						ret,
						kind: RefKind::Char(CharRefRadix::Hexadecimal),
					},
					None,
				))
			}
			b';' => {
				if self.scratchpad.len() == 0 {
					return Err(Error::Fatal(CrateError::NotWellFormed(
						WFError::InvalidSyntax("empty reference"),
					)));
				}
				// return to main scratchpad; the reference is now in swap
				self.swap_scratchpad();
				let refbytes = self.read_swap();
				match kind {
					RefKind::Char(radix) => {
						// safe: the digit classes are plain ascii
						let digits = unsafe { std::str::from_utf8_unchecked(&refbytes[..]) };
						let ch = add_context(self.resolve_char_reference(digits, radix), ctx)?;
						match ret {
							RefReturnState::Text => Ok(ST(
								ret.to_state(),
								Some(Token::CharRef(self.metrics(0), ch)),
							)),
							RefReturnState::AttributeValue(..) => {
								self.push_char(ch);
								Ok(ST(ret.to_state(), None))
							}
						}
					}
					RefKind::Entity => {
						let name = add_context(Self::bytes_to_name(&refbytes), ctx)?;
						self.lex_resolved_entity_ref(ctx, ret, name)
					}
				}
			}
			c => Err(Error::Fatal(CrateError::NotWellFormed(WFError::UnexpectedByte(
				ERRCTX_REF,
				c,
				Some(&[";"]),
			)))),
		}
	}

	/// Decide what happens for a completed general entity reference.
	fn lex_resolved_entity_ref(
		&mut self,
		ctx: &'static str,
		ret: RefReturnState,
		name: Name,
	) -> Result<ST> {
		if let Some(ch) = predefined_entity(&name) {
			return match ret {
				RefReturnState::Text => Ok(ST(
					ret.to_state(),
					Some(Token::PredefEntityRef(self.metrics(0), name)),
				)),
				RefReturnState::AttributeValue(..) => {
					self.push_char(ch);
					Ok(ST(ret.to_state(), None))
				}
			};
		}
		let decl = match self.entities.get_general(&name) {
			Some(decl) => decl.clone(),
			None => {
				return match ret {
					RefReturnState::Text if !self.entities.is_complete() => {
						// the entity may be declared in a part of the DTD we
						// never read; the consumer decides what to do
						Ok(ST(
							ret.to_state(),
							Some(Token::GeneralEntityRef(self.metrics(0), name)),
						))
					}
					_ => Err(EntityError::Undeclared(ctx).into()),
				}
			}
		};
		match &*decl {
			EntityDecl::Internal { value, .. } => {
				if !self.opts.expand_general_entities {
					return match ret {
						RefReturnState::Text => Ok(ST(
							ret.to_state(),
							Some(Token::GeneralEntityRef(self.metrics(0), name)),
						)),
						RefReturnState::AttributeValue(..) => {
							Err(EntityError::Undeclared(ctx).into())
						}
					};
				}
				match ret {
					RefReturnState::Text => {
						let tok = Token::EntityStart(self.metrics(0), name.clone());
						self.expansion
							.push(name, value.clone(), FrameContext::Content)?;
						Ok(ST(ret.to_state(), Some(tok)))
					}
					RefReturnState::AttributeValue(..) => {
						self.expansion
							.push(name, value.clone(), FrameContext::AttributeValue)?;
						Ok(ST(ret.to_state(), None))
					}
				}
			}
			EntityDecl::ExternalParsed { id, .. } => match ret {
				RefReturnState::Text => {
					if self.opts.external_general_entities {
						if let Some(value) = self.fetch_external(id)? {
							let tok = Token::EntityStart(self.metrics(0), name.clone());
							self.expansion.push(name, value, FrameContext::Content)?;
							return Ok(ST(ret.to_state(), Some(tok)));
						}
					}
					// not fetched; the consumer reports the entity as
					// skipped
					Ok(ST(
						ret.to_state(),
						Some(Token::GeneralEntityRef(self.metrics(0), name)),
					))
				}
				RefReturnState::AttributeValue(..) => {
					Err(EntityError::ExternalForbidden(ERRCTX_ATTVAL).into())
				}
			},
			EntityDecl::ExternalUnparsed { .. } => {
				Err(EntityError::UnparsedReference(ctx).into())
			}
		}
	}

	/// Dispatch a nested reference part encountered inside an expansion
	/// frame.
	fn expand_part_ref(&mut self, name: Name) -> Result<Option<Token>> {
		let in_attribute = matches!(
			self.state,
			State::Element {
				state: ElementState::AttributeValue(..),
				..
			}
		);
		if !in_attribute && !matches!(self.state, State::Content(_)) {
			return Err(Error::Fatal(CrateError::NotWellFormed(WFError::InvalidSyntax(
				"entity reference not allowed here",
			))));
		}
		if let Some(ch) = predefined_entity(&name) {
			self.push_char(ch);
			return Ok(None);
		}
		let decl = match self.entities.get_general(&name) {
			Some(decl) => decl.clone(),
			None => {
				if !self.entities.is_complete() && !in_attribute {
					let tok = Token::GeneralEntityRef(self.metrics(0), name);
					return self.emit_with_text_flush(tok);
				}
				return Err(EntityError::Undeclared(ERRCTX_REF).into());
			}
		};
		match &*decl {
			EntityDecl::Internal { value, .. } => {
				if in_attribute {
					self.expansion
						.push(name, value.clone(), FrameContext::AttributeValue)?;
					Ok(None)
				} else {
					let tok = Token::EntityStart(self.metrics(0), name.clone());
					self.expansion
						.push(name, value.clone(), FrameContext::Content)?;
					self.emit_with_text_flush(tok)
				}
			}
			EntityDecl::ExternalParsed { id, .. } => {
				if in_attribute {
					return Err(EntityError::ExternalForbidden(ERRCTX_ATTVAL).into());
				}
				if self.opts.external_general_entities {
					if let Some(value) = self.fetch_external(id)? {
						let tok = Token::EntityStart(self.metrics(0), name.clone());
						self.expansion.push(name, value, FrameContext::Content)?;
						return self.emit_with_text_flush(tok);
					}
				}
				let tok = Token::GeneralEntityRef(self.metrics(0), name);
				self.emit_with_text_flush(tok)
			}
			EntityDecl::ExternalUnparsed { .. } => {
				Err(EntityError::UnparsedReference(ERRCTX_REF).into())
			}
		}
	}

	fn dispatch_state(&mut self, r: &mut &[u8]) -> Result<ST> {
		match self.state {
			State::Content(substate) => self.lex_content(substate, r),
			State::Element {
				kind,
				state: substate,
			} => self.lex_element(kind, substate, r),
			State::Reference { ctx, ret, kind } => self.lex_reference(ctx, ret, kind, r),
			State::Comment { ret, state } => self.lex_comment(ret, state, r),
			State::Pi { ret, state } => self.lex_pi(ret, state, r),
			State::Doctype(substate) => self.lex_doctype(substate, r),
			State::Eof => unreachable!("dispatch on eof state"),
		}
	}

	fn lex_bytes_raw(&mut self, r: &mut &[u8]) -> Result<Option<Token>> {
		if let Some(e) = self.err.as_ref() {
			return Err(Error::Fatal(e.clone()));
		}

		loop {
			if let Some(tok) = self.pending.take() {
				return Ok(Some(tok));
			}
			if let State::Eof = self.state {
				return Ok(None);
			}

			// entity-expansion frames take precedence over the caller's
			// buffer
			let stresult = if self.expansion.is_active() {
				match self.expansion.next_input().unwrap() {
					FrameInput::Exhausted(_) => {
						let fctx = self.expansion.pop();
						// verify no element opened inside the popped frame
						// remains open
						if let Some(d) = self.element_depths.last() {
							if *d > self.expansion.depth() {
								let e: Error = WFError::EntityNestingMismatch.into();
								return self.cache_error(e);
							}
						}
						if fctx == FrameContext::Content {
							// the boundary is observable; text gathered so
							// far goes out ahead of it
							let tok = Token::EntityEnd(self.metrics(0));
							match self.emit_with_text_flush(tok) {
								Ok(tok) => return Ok(tok),
								Err(e) => return self.cache_error(e),
							}
						}
						continue;
					}
					FrameInput::Ref(name) => {
						self.expansion.skip_part();
						match self.expand_part_ref(name) {
							Ok(Some(tok)) => return Ok(Some(tok)),
							Ok(None) => continue,
							Err(e) => return self.cache_error(e),
						}
					}
					FrameInput::Text(value, part, pos) => {
						let text = match &value.parts[part] {
							EntityPart::Text(t) => t,
							_ => unreachable!("non-text part dispatched as text"),
						};
						// the dispatch may push nested frames; remember
						// which frame the bytes belong to
						let fidx = self.expansion.top_index();
						let mut er: &[u8] = &text.as_bytes()[pos..];
						let before = er.len();
						self.in_expansion = true;
						let res = self.dispatch_state(&mut er);
						self.in_expansion = false;
						let consumed = before - er.len();
						if consumed > 0 {
							self.expansion.advance_frame(fidx, consumed);
						}
						match res {
							// end of this chunk; the expansion stack moves
							// forward on the next iteration
							Err(Error::EndOfBuffer) => continue,
							other => other,
						}
					}
				}
			} else {
				self.dispatch_state(r)
			};

			let st = match stresult {
				Err(Error::EndOfBuffer) => {
					// I/O errors are not cached
					return Err(Error::EndOfBuffer);
				}
				Err(e) => return self.cache_error(e),
				Ok(st) => st,
			};
			match st.splice(&mut self.state) {
				Some(tok) => {
					self.postprocess_token(&tok);
					#[cfg(debug_assertions)]
					{
						// preserve the state for infinite loop detection
						self.prev_state = (self.scratchpad.clone(), self.state);
					}
					return Ok(Some(tok));
				}
				None => (),
			};
			#[cfg(debug_assertions)]
			{
				// we did not leave the loop; assert that the state has
				// actually changed
				if !self.expansion.is_active()
					&& self.prev_state.0 == self.scratchpad
					&& self.prev_state.1 == self.state
				{
					panic!(
						"state has not changed in the last iteration: {:?} {:?}",
						self, self.scratchpad
					)
				} else {
					self.prev_state = (self.scratchpad.clone(), self.state)
				}
			}
		}
	}

	fn cache_error(&mut self, e: Error) -> Result<Option<Token>> {
		match e {
			Error::EndOfBuffer => Err(Error::EndOfBuffer),
			Error::Fatal(f) => {
				self.err = Some(f.clone());
				Err(Error::Fatal(f))
			}
		}
	}

	/// Watch the XML declaration for `version="1.1"`.
	fn postprocess_token(&mut self, tok: &Token) {
		if let State::Element {
			kind: ElementKind::XmlDecl,
			..
		} = self.state
		{
			if let Token::AttributeValue(_, v) = tok {
				if let Some(name) = self.xmldecl_name.as_ref() {
					if name == "version" && v == "1.1" && self.opts.accept_xml_1_1 {
						self.char_classes = CharClasses::Xml11;
					} else if name == "encoding" {
						self.declared_encoding = Some(v.clone());
					}
				}
			}
		}
	}

	/// Lex bytes from the buffer, advancing the slice for any byte
	/// consumed, until either an error occurs, a valid token is produced or
	/// the buffer is at its end.
	///
	/// **Note:** The lexer keeps some internal state which may cause a
	/// token to be emitted even for an empty buffer! That means that even
	/// if your backend currently has no more data available, you should
	/// call `lex_bytes` with a corresponding empty buffer and eof flag
	/// until you receive a non-token result.
	///
	/// # End-of-file handling
	///
	/// If `at_eof` is false, the end of the buffer is treated as a
	/// temporary situation and a [`std::io::ErrorKind::WouldBlock`] I/O
	/// error is returned when it is reached. Otherwise, the end of the
	/// buffer is treated as the end of file.
	///
	/// # Return value
	///
	/// Returns `None` if a valid end of file is reached, a token if a
	/// valid token is encountered or an error otherwise.
	#[inline]
	pub fn lex_bytes(&mut self, r: &mut &[u8], at_eof: bool) -> CrateResult<Option<Token>> {
		self.has_eof = at_eof;
		Ok(self.lex_bytes_raw(r)?)
	}

	/// Lex bytes from the reader until either an error occurs, a valid
	/// token is produced or a valid end-of-file situation is encountered.
	///
	/// This requires a [`std::io::BufRead`] for performance reasons. This
	/// function will issue exactly one call to the `fill_buf()` method of
	/// the reader.
	///
	/// # I/O error handling
	///
	/// Any I/O error except WouldBlock is passed back to the caller without
	/// invoking the lexer, so it can be retried. If the reader returns
	/// [`std::io::ErrorKind::WouldBlock`], the lexer *is* invoked, as even
	/// an empty buffer may emit a token in some edge cases (most notably at
	/// the end of a closing element tag).
	///
	/// # Return value
	///
	/// Returns `None` if a valid end of file is reached, a token if a
	/// valid token is encountered or an error otherwise.
	pub fn lex<R: io::BufRead + ?Sized>(&mut self, r: &mut R) -> CrateResult<Option<Token>> {
		let (mut buf, eof): (&[u8], bool) = match r.fill_buf() {
			Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
				// pretend we had an empty buffer, but without the eof flag;
				// worst case it is converted to a WouldBlock again
				(&[], false)
			}
			Err(e) => return Err(e.into()),
			Ok(b) => (b, b.len() == 0),
		};
		let orig_len = buf.len();
		let result = self.lex_bytes(&mut buf, eof);
		let new_len = buf.len();
		r.consume(orig_len - new_len);
		result
	}

	/// Release all temporary buffers
	///
	/// This is sensible to call when it is expected that no more data will
	/// be processed by the lexer for a while and the memory is better used
	/// elsewhere.
	pub fn release_temporaries(&mut self) {
		self.scratchpad.shrink_to_fit();
		self.swap.shrink_to_fit();
	}
}

impl fmt::Debug for Lexer {
	fn fmt<'f>(&self, f: &'f mut fmt::Formatter) -> fmt::Result {
		f.debug_struct("Lexer").field("state", &self.state).finish()
	}
}

/// Remove the text declaration from the front of a fetched external
/// entity (XML 1.0 § 4.3.1); it must not be part of the replacement text.
fn strip_text_declaration(text: String) -> String {
	if text.starts_with("<?xml")
		&& text[5..].starts_with(|c: char| c.is_ascii_whitespace())
	{
		if let Some(end) = text.find("?>") {
			return text[end + 2..].to_string();
		}
	}
	text
}

mod doctype;

#[cfg(test)]
mod tests;
