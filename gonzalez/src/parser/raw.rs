/*!
# Structural XML parser, sans namespacing
*/
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::collections::VecDeque;
use std::convert::TryInto;
use std::fmt;

use crate::errctx::*;
use crate::error::*;
use crate::lexer::dtd::{AttType, AttlistDecl, ContentSpec, NotationDecl};
use crate::lexer::entities::{predefined_entity, EntityDecl, ExternalId};
use crate::lexer::{Token, TokenMetrics};
use crate::strings::*;

use super::{EventMetrics, Parse, ParserOptions, TokenRead, XmlVersion};

/// Pair of an optional namespace prefix and a localpart, commonly used in
/// element and attribute names.
pub type RawQName = (Option<NCName>, NCName);

/**
# Logical XML document parts

The term *Event* is borrowed from SAX terminology. Each [`RawEvent`] refers
to a logical bit of the XML document which has been parsed.

Note that observing a [`RawEvent`] **does not imply that the document has
been namespace-well-formed** up to this point. See
[`NamespaceResolver`](super::NamespaceResolver).

## Document event sequence

A well-formed document generates, in this order:

1. Zero or one [`Self::XmlDeclaration`]
2. Any number of [`Self::Comment`] and [`Self::ProcessingInstruction`]
3. Zero or one doctype group: [`Self::DoctypeStart`], any number of
   declaration events, [`Self::DoctypeEnd`]
4. One *element sequence*, with more misc events around it

An *element sequence* consists of [`Self::ElementHeadOpen`], zero or more
[`Self::Attribute`], [`Self::ElementHeadClose`], mixed content (text, CDATA
delimiters, nested element sequences, comments, instructions), and a final
[`Self::ElementFoot`].
*/
#[derive(Clone, PartialEq, Debug)]
pub enum RawEvent {
	/// The XML declaration.
	XmlDeclaration(
		EventMetrics,
		/// XML version number
		XmlVersion,
		/// Declared encoding name, if any
		Option<CData>,
		/// Declared standalone flag, if any
		Option<bool>,
	),

	/// The document type declaration opened; carries name, public id and
	/// system id.
	DoctypeStart(EventMetrics, Name, Option<CData>, Option<CData>),

	/// An entity declaration from the internal subset.
	EntityDecl(EventMetrics, EntityDecl),

	/// An element declaration: name and raw content specification.
	ElementDecl(EventMetrics, Name, CData),

	/// An attribute-list declaration.
	AttlistDecl(EventMetrics, AttlistDecl),

	/// A notation declaration.
	NotationDecl(EventMetrics, NotationDecl),

	/// The document type declaration ended.
	DoctypeEnd(EventMetrics),

	/// Start of an XML element header
	ElementHeadOpen(
		EventMetrics,
		/// Prefix/localpart pair of the element.
		RawQName,
	),

	/// Attribute key/value pair
	///
	/// Note that in raw events, XML namespace declarations are just
	/// attributes, as no namespace resolution takes place.
	Attribute(
		EventMetrics,
		/// Prefix/localpart pair of the attribute name.
		RawQName,
		/// Normalized attribute value
		CData,
	),

	/// End of an XML element header
	ElementHeadClose(EventMetrics),

	/// The end of an XML element.
	///
	/// The parser enforces proper nesting of the elements, so no additional
	/// information is required.
	ElementFoot(EventMetrics),

	/// Text character data.
	///
	/// **Note:** Multiple consecutive `Text` events may be emitted for long
	/// sections of text or because of implementation details in the
	/// processing.
	Text(EventMetrics, CData),

	/// Character data which consists only of whitespace inside an element
	/// whose declared content model permits no character data.
	IgnorableWhitespace(EventMetrics, CData),

	/// Start of a CDATA section; the contained character data is reported
	/// as [`Self::Text`].
	CDataStart(EventMetrics),

	/// End of a CDATA section.
	CDataEnd(EventMetrics),

	/// A comment.
	Comment(EventMetrics, CData),

	/// A processing instruction: target and data.
	ProcessingInstruction(EventMetrics, Name, CData),

	/// An entity reference which was not expanded. Parameter entities are
	/// reported with a `%` prepended to the name, following the SAX
	/// convention.
	SkippedEntity(EventMetrics, CData),

	/// An entity expansion began in content. Everything up to the
	/// matching [`Self::EntityEnd`] originates from the entity's
	/// replacement.
	EntityStart(EventMetrics, Name),

	/// The innermost open entity expansion ended.
	EntityEnd(EventMetrics),
}

impl RawEvent {
	/// Return the [`EventMetrics`] of the event
	pub fn metrics(&self) -> &EventMetrics {
		match self {
			Self::XmlDeclaration(m, ..) => m,
			Self::DoctypeStart(m, ..) => m,
			Self::EntityDecl(m, ..) => m,
			Self::ElementDecl(m, ..) => m,
			Self::AttlistDecl(m, ..) => m,
			Self::NotationDecl(m, ..) => m,
			Self::DoctypeEnd(m) => m,
			Self::ElementHeadOpen(m, ..) => m,
			Self::Attribute(m, ..) => m,
			Self::ElementHeadClose(m) => m,
			Self::ElementFoot(m) => m,
			Self::Text(m, ..) => m,
			Self::IgnorableWhitespace(m, ..) => m,
			Self::CDataStart(m) => m,
			Self::CDataEnd(m) => m,
			Self::Comment(m, ..) => m,
			Self::ProcessingInstruction(m, ..) => m,
			Self::SkippedEntity(m, ..) => m,
			Self::EntityStart(m, ..) => m,
			Self::EntityEnd(m) => m,
		}
	}
}

#[derive(Clone, Copy, PartialEq, Debug)]
enum DeclSt {
	VersionName,
	VersionEq,
	VersionValue,
	EncodingName,
	EncodingEq,
	EncodingValue,
	StandaloneName,
	StandaloneEq,
	StandaloneValue,
	Close,
}

#[derive(Clone, Copy, PartialEq, Debug)]
enum ElementSt {
	AttrName,
	AttrEq,
	AttrValue,
}

#[derive(Clone, Copy, PartialEq, Debug)]
enum DocSt {
	Element(ElementSt),
	CData,
	CDataSection,
	ElementFoot,
}

#[derive(Clone, Copy, PartialEq, Debug)]
enum DoctypeSt {
	/// Collecting name / public id / system id
	Pending,
	InSubset,
	/// `]` seen, waiting for the final `>`
	AwaitEnd,
}

#[derive(Clone, Copy, PartialEq, Debug)]
enum State {
	/// Very beginning of the document; the XML declaration is still
	/// possible.
	Initial,
	Decl {
		substate: DeclSt,
	},
	/// Misc* before the root element.
	Prolog,
	Doctype(DoctypeSt),
	Document(DocSt),
	End,
	Eof,
}

struct DoctypeScratch {
	name: Option<Name>,
	public_id: Option<CData>,
	system_id: Option<CData>,
}

struct DeclScratch {
	version: Option<XmlVersion>,
	encoding: Option<CData>,
	standalone: Option<bool>,
}

/**
# Structural, logical XML parser

The [`RawParser`] converts [`crate::lexer::Token`]s into [`RawEvent`]s.

It is a low-level interface which expects to be driven from a [`TokenRead`]
source. It enforces document structure and element nesting, but leaves
namespace handling to the
[`NamespaceResolver`](super::NamespaceResolver).
*/
pub struct RawParser {
	state: State,
	opts: ParserOptions,
	element_stack: Vec<Name>,
	/// Raw name and split name of the attribute currently being collected.
	attribute_scratchpad: Option<(Name, RawQName)>,
	doctype: DoctypeScratch,
	decl: DeclScratch,
	pi_target: Option<Name>,
	had_doctype: bool,
	/// Attribute types from `<!ATTLIST>`, for the type-aware value
	/// normalization pass.
	att_types: HashMap<(Name, Name), AttType>,
	/// Content model classes from `<!ELEMENT>`, for whitespace
	/// classification.
	content_models: HashMap<Name, ContentSpec>,
	/// end position of the last token processed in the event
	event_last_token_end: Option<usize>,
	/// current length of the event
	event_length: usize,
	/// Internal queue for events which will be returned from the current
	/// and potentially future calls to `parse()`.
	///
	/// In contrast to the Lexer, the RawParser may come into situations
	/// where multiple events need to be pushed from a single token, which
	/// is why the queue exists as a buffer.
	eventq: VecDeque<RawEvent>,
	err: Option<Box<Error>>,
}

impl Default for RawParser {
	fn default() -> Self {
		Self::new()
	}
}

impl RawParser {
	/// Create a new parser with default options
	pub fn new() -> Self {
		Self::with_options(ParserOptions::default())
	}

	/// Create a new parser with the given options
	pub fn with_options(opts: ParserOptions) -> Self {
		Self {
			state: State::Initial,
			opts,
			element_stack: Vec::new(),
			attribute_scratchpad: None,
			doctype: DoctypeScratch {
				name: None,
				public_id: None,
				system_id: None,
			},
			decl: DeclScratch {
				version: None,
				encoding: None,
				standalone: None,
			},
			pi_target: None,
			had_doctype: false,
			att_types: HashMap::new(),
			content_models: HashMap::new(),
			event_last_token_end: None,
			event_length: 0,
			eventq: VecDeque::new(),
			err: None,
		}
	}

	fn start_event(&mut self, tm: &TokenMetrics) {
		debug_assert!(self.event_last_token_end.is_none());
		self.event_last_token_end = Some(tm.end());
		self.event_length = tm.len();
	}

	fn account_token(&mut self, tm: &TokenMetrics) -> Result<usize> {
		let last_end = self.event_last_token_end.unwrap();
		self.event_length = self
			.event_length
			.checked_add(tm.len() + tm.start().saturating_sub(last_end))
			.ok_or(Error::LimitExceeded("event too long"))?;
		self.event_last_token_end = Some(tm.end());
		Ok(self.event_length)
	}

	fn finish_event(&mut self) -> EventMetrics {
		debug_assert!(self.event_last_token_end.is_some());
		let len = self.event_length;
		self.event_last_token_end = None;
		self.event_length = 0;
		EventMetrics { len }
	}

	fn fixed_event(&self, len: usize) -> EventMetrics {
		debug_assert!(self.event_last_token_end.is_none());
		EventMetrics { len }
	}

	fn read_token<'r, R: TokenRead>(&mut self, r: &'r mut R) -> Result<Option<Token>> {
		if self.event_last_token_end.is_none() {
			return r.read();
		}
		match r.read()? {
			Some(tok) => {
				self.account_token(tok.metrics())?;
				Ok(Some(tok))
			}
			None => Ok(None),
		}
	}

	/// Emit an event into the event queue.
	fn emit_event(&mut self, ev: RawEvent) {
		self.eventq.push_back(ev);
	}

	/// Poison the parser, making it return the same error for all
	/// eternity.
	fn poison(&mut self, e: Error) {
		self.err = Some(Box::new(e))
	}

	/// Check if the parser is poisoned and return the corresponding error.
	fn check_poison(&self) -> Result<()> {
		if let Some(e) = self.err.as_ref() {
			Err((**e).clone())
		} else {
			Ok(())
		}
	}

	/// Initialize the element scratchpad for further processing.
	///
	/// May fail if the name is not namespace-well-formed.
	fn start_processing_element(&mut self, name: Name) -> Result<RawEvent> {
		self.element_stack.push(name.clone());
		let (prefix, localname) = add_context(name.split_name(), ERRCTX_ELEMENT)?;
		Ok(RawEvent::ElementHeadOpen(
			self.finish_event(),
			(prefix, localname),
		))
	}

	/// Pop an element off the stack and emit the corresponding ElementFoot
	/// event.
	fn pop_element(&mut self, em: EventMetrics) -> Result<State> {
		self.emit_event(RawEvent::ElementFoot(em));
		debug_assert!(self.element_stack.len() > 0);
		self.element_stack.pop();
		if self.element_stack.len() == 0 {
			Ok(State::End)
		} else {
			Ok(State::Document(DocSt::CData))
		}
	}

	/// Handle a misc token (comment or processing instruction) which is
	/// valid in many states. Returns `None` if the token is not a misc
	/// token.
	fn handle_misc_token(&mut self, tok: &Token, ret: State) -> Result<Option<State>> {
		match tok {
			Token::Comment(tm, data) => {
				if self.event_last_token_end.is_none() {
					self.start_event(tm);
				}
				let em = self.finish_event();
				self.emit_event(RawEvent::Comment(em, data.clone()));
				Ok(Some(ret))
			}
			Token::PITarget(tm, name) => {
				if self.event_last_token_end.is_none() {
					self.start_event(tm);
				}
				self.pi_target = Some(name.clone());
				Ok(Some(ret))
			}
			Token::PIData(_, data) => {
				let target = self.pi_target.take().ok_or(Error::NotWellFormed(
					WFError::UnexpectedToken(ERRCTX_PI, Token::NAME_PIDATA, None),
				))?;
				let em = self.finish_event();
				self.emit_event(RawEvent::ProcessingInstruction(em, target, data.clone()));
				Ok(Some(ret))
			}
			_ => Ok(None),
		}
	}

	/// Initial parser state.
	fn parse_initial<'r, R: TokenRead>(&mut self, r: &'r mut R) -> Result<State> {
		match self.read_token(r)? {
			Some(Token::XmlDeclStart(tm)) => {
				self.start_event(&tm);
				Ok(State::Decl {
					substate: DeclSt::VersionName,
				})
			}
			Some(tok) => self.parse_prolog_token(tok),
			None => Err(Error::wfeof(ERRCTX_DOCBEGIN)),
		}
	}

	/// XML declaration state.
	fn parse_decl<'r, R: TokenRead>(&mut self, state: DeclSt, r: &'r mut R) -> Result<State> {
		match self.read_token(r)? {
			None => Err(Error::wfeof(ERRCTX_XML_DECL)),
			Some(Token::Name(_, name)) => match state {
				DeclSt::VersionName => {
					if name == "version" {
						Ok(State::Decl {
							substate: DeclSt::VersionEq,
						})
					} else {
						Err(Error::NotWellFormed(WFError::InvalidSyntax(
							"'<?xml' must be followed by version attribute",
						)))
					}
				}
				DeclSt::EncodingName => {
					if name == "encoding" {
						Ok(State::Decl {
							substate: DeclSt::EncodingEq,
						})
					} else if name == "standalone" {
						Ok(State::Decl {
							substate: DeclSt::StandaloneEq,
						})
					} else {
						Err(Error::NotWellFormed(WFError::InvalidSyntax(
							"'version' attribute must be followed by '?>', 'encoding' or 'standalone'",
						)))
					}
				}
				DeclSt::StandaloneName => {
					if name == "standalone" {
						Ok(State::Decl {
							substate: DeclSt::StandaloneEq,
						})
					} else {
						Err(Error::NotWellFormed(WFError::InvalidSyntax(
							"'encoding' attribute must be followed by '?>' or 'standalone'",
						)))
					}
				}
				_ => Err(Error::NotWellFormed(WFError::UnexpectedToken(
					ERRCTX_XML_DECL,
					Token::NAME_NAME,
					None,
				))),
			},
			Some(Token::Eq(_)) => Ok(State::Decl {
				substate: match state {
					DeclSt::VersionEq => Ok(DeclSt::VersionValue),
					DeclSt::EncodingEq => Ok(DeclSt::EncodingValue),
					DeclSt::StandaloneEq => Ok(DeclSt::StandaloneValue),
					_ => Err(Error::NotWellFormed(WFError::UnexpectedToken(
						ERRCTX_XML_DECL,
						Token::NAME_EQ,
						None,
					))),
				}?,
			}),
			Some(Token::AttributeValue(_, v)) => match state {
				DeclSt::VersionValue => {
					if v == "1.0" {
						self.decl.version = Some(XmlVersion::V1_0);
						Ok(State::Decl {
							substate: DeclSt::EncodingName,
						})
					} else if v == "1.1" && self.opts.xml_1_1 {
						self.decl.version = Some(XmlVersion::V1_1);
						Ok(State::Decl {
							substate: DeclSt::EncodingName,
						})
					} else {
						Err(Error::NotWellFormed(WFError::InvalidSyntax(
							"unsupported XML version",
						)))
					}
				}
				DeclSt::EncodingValue => {
					self.decl.encoding = Some(v);
					Ok(State::Decl {
						substate: DeclSt::StandaloneName,
					})
				}
				DeclSt::StandaloneValue => {
					let flag = if v.eq_ignore_ascii_case("yes") {
						true
					} else if v.eq_ignore_ascii_case("no") {
						false
					} else {
						return Err(Error::NotWellFormed(WFError::InvalidSyntax(
							"standalone must be 'yes' or 'no'",
						)));
					};
					self.decl.standalone = Some(flag);
					Ok(State::Decl {
						substate: DeclSt::Close,
					})
				}
				_ => Err(Error::NotWellFormed(WFError::UnexpectedToken(
					ERRCTX_XML_DECL,
					Token::NAME_ATTRIBUTEVALUE,
					None,
				))),
			},
			Some(Token::XmlDeclEnd(_)) => match state {
				DeclSt::EncodingName | DeclSt::StandaloneName | DeclSt::Close => {
					let em = self.finish_event();
					let version = self.decl.version.unwrap();
					let encoding = self.decl.encoding.take();
					let standalone = self.decl.standalone.take();
					self.emit_event(RawEvent::XmlDeclaration(em, version, encoding, standalone));
					Ok(State::Prolog)
				}
				_ => Err(Error::NotWellFormed(WFError::UnexpectedToken(
					ERRCTX_XML_DECL,
					Token::NAME_XMLDECLEND,
					None,
				))),
			},
			Some(other) => Err(Error::NotWellFormed(WFError::UnexpectedToken(
				ERRCTX_XML_DECL,
				other.name(),
				None,
			))),
		}
	}

	/// Handle a token in prolog position (either before or after the
	/// doctype).
	fn parse_prolog_token(&mut self, tok: Token) -> Result<State> {
		if self.event_last_token_end.is_none() {
			self.start_event(tok.metrics());
		}
		if let Some(st) = self.handle_misc_token(&tok, State::Prolog)? {
			return Ok(st);
		}
		match tok {
			Token::DoctypeName(_, name) => {
				if self.had_doctype {
					return Err(Error::NotWellFormed(WFError::UnexpectedToken(
						ERRCTX_DOCTYPE,
						Token::NAME_DOCTYPENAME,
						None,
					)));
				}
				self.had_doctype = true;
				self.doctype.name = Some(name);
				Ok(State::Doctype(DoctypeSt::Pending))
			}
			Token::ElementHeadStart(tm, name) => {
				let ev = self.start_processing_element(name)?;
				self.emit_event(ev);
				// the event for the attribute name or for the closing
				// symbol starts here, to account for whitespace between
				// the two
				self.start_event(&tm);
				self.event_length = 0;
				Ok(State::Document(DocSt::Element(ElementSt::AttrName)))
			}
			Token::Text(_, s)
				if s.as_bytes()
					.iter()
					.all(|&c| c == b' ' || c == b'\t' || c == b'\n' || c == b'\r') =>
			{
				// whitespace between prolog markup; not reported
				self.event_last_token_end = None;
				self.event_length = 0;
				Ok(State::Prolog)
			}
			tok => Err(Error::NotWellFormed(WFError::UnexpectedToken(
				ERRCTX_DOCBEGIN,
				tok.name(),
				Some(&[
					Token::NAME_ELEMENTHEADSTART,
					Token::NAME_DOCTYPENAME,
					Token::NAME_COMMENT,
					Token::NAME_PITARGET,
				]),
			))),
		}
	}

	/// Document type declaration states.
	fn parse_doctype<'r, R: TokenRead>(&mut self, state: DoctypeSt, r: &'r mut R) -> Result<State> {
		let tok = match self.read_token(r)? {
			Some(tok) => tok,
			None => return Err(Error::wfeof(ERRCTX_DOCTYPE)),
		};
		if self.event_last_token_end.is_none() {
			self.start_event(tok.metrics());
		}
		match state {
			DoctypeSt::Pending => match tok {
				Token::DoctypePublicId(_, p) => {
					self.doctype.public_id = Some(p);
					Ok(State::Doctype(DoctypeSt::Pending))
				}
				Token::DoctypeSystemId(_, s) => {
					self.doctype.system_id = Some(s);
					Ok(State::Doctype(DoctypeSt::Pending))
				}
				Token::DoctypeIntSubsetStart(_) => {
					self.emit_doctype_start()?;
					Ok(State::Doctype(DoctypeSt::InSubset))
				}
				Token::DoctypeEnd(_) => {
					self.emit_doctype_start()?;
					self.emit_event(RawEvent::DoctypeEnd(self.fixed_event(0)));
					Ok(State::Prolog)
				}
				tok => Err(Error::NotWellFormed(WFError::UnexpectedToken(
					ERRCTX_DOCTYPE,
					tok.name(),
					None,
				))),
			},
			DoctypeSt::InSubset => {
				if let Some(st) = self.handle_misc_token(&tok, State::Doctype(DoctypeSt::InSubset))? {
					return Ok(st);
				}
				match tok {
					Token::EntityDecl(_, decl) => {
						let decl = self.resolve_decl_uris(decl);
						let em = self.finish_event();
						self.emit_event(RawEvent::EntityDecl(em, decl));
						Ok(State::Doctype(DoctypeSt::InSubset))
					}
					Token::ElementDecl(_, name, raw) => {
						self.content_models
							.entry(name.clone())
							.or_insert_with(|| ContentSpec::classify(&raw));
						let em = self.finish_event();
						self.emit_event(RawEvent::ElementDecl(em, name, raw));
						Ok(State::Doctype(DoctypeSt::InSubset))
					}
					Token::AttlistDecl(_, decl) => {
						for def in decl.defs.iter() {
							match self
								.att_types
								.entry((decl.element.clone(), def.name.clone()))
							{
								Entry::Occupied(_) => (),
								Entry::Vacant(e) => {
									e.insert(def.ty.clone());
								}
							}
						}
						let em = self.finish_event();
						self.emit_event(RawEvent::AttlistDecl(em, decl));
						Ok(State::Doctype(DoctypeSt::InSubset))
					}
					Token::NotationDecl(_, mut decl) => {
						decl.system_id =
							decl.system_id.map(|s| self.resolve_system_id(s));
						let em = self.finish_event();
						self.emit_event(RawEvent::NotationDecl(em, decl));
						Ok(State::Doctype(DoctypeSt::InSubset))
					}
					Token::ParameterEntityRef(_, name) => {
						let em = self.finish_event();
						let mut skipped = String::with_capacity(name.len() + 1);
						skipped.push('%');
						skipped.push_str(&name);
						// safe: '%' plus a Name is valid character data
						let skipped =
							unsafe { CData::from_string_unchecked(skipped) };
						self.emit_event(RawEvent::SkippedEntity(em, skipped));
						Ok(State::Doctype(DoctypeSt::InSubset))
					}
					Token::DoctypeIntSubsetEnd(_) => Ok(State::Doctype(DoctypeSt::AwaitEnd)),
					tok => Err(Error::NotWellFormed(WFError::UnexpectedToken(
						ERRCTX_INT_SUBSET,
						tok.name(),
						None,
					))),
				}
			}
			DoctypeSt::AwaitEnd => match tok {
				Token::DoctypeEnd(_) => {
					let em = self.finish_event();
					self.emit_event(RawEvent::DoctypeEnd(em));
					Ok(State::Prolog)
				}
				tok => Err(Error::NotWellFormed(WFError::UnexpectedToken(
					ERRCTX_DOCTYPE,
					tok.name(),
					Some(&[Token::NAME_DOCTYPEEND]),
				))),
			},
		}
	}

	fn emit_doctype_start(&mut self) -> Result<()> {
		let name = self.doctype.name.take().unwrap();
		let public_id = self.doctype.public_id.take();
		let system_id = self
			.doctype
			.system_id
			.take()
			.map(|s| self.resolve_system_id(s));
		let em = self.finish_event();
		self.emit_event(RawEvent::DoctypeStart(em, name, public_id, system_id));
		Ok(())
	}

	/// Resolve a system identifier against the configured base URI
	/// (lexically only, nothing is fetched). Absolute identifiers and
	/// identifiers without a usable base pass through unchanged.
	fn resolve_system_id(&self, sysid: CData) -> CData {
		if !self.opts.resolve_dtd_uris {
			return sysid;
		}
		let base = match self.opts.base_uri.as_deref() {
			Some(b) if !b.is_empty() => b,
			_ => return sysid,
		};
		if let Some((scheme, _)) = sysid.split_once(':') {
			let absolute = !scheme.is_empty()
				&& scheme
					.chars()
					.all(|c| c.is_ascii_alphanumeric() || "+-.".contains(c));
			if absolute {
				return sysid;
			}
		}
		let joined = if sysid.starts_with('/') {
			// authority-relative: keep scheme and authority of the base
			let root = base
				.find("://")
				.map(|i| i + 3)
				.and_then(|i| base[i..].find('/').map(|j| i + j));
			match root {
				Some(root) => format!("{}{}", &base[..root], sysid.as_str()),
				None => return sysid,
			}
		} else {
			match base.rfind('/') {
				Some(i) => format!("{}{}", &base[..=i], sysid.as_str()),
				None => return sysid,
			}
		};
		joined.try_into().unwrap_or(sysid)
	}

	fn resolve_external_id(&self, id: ExternalId) -> ExternalId {
		ExternalId {
			public_id: id.public_id,
			system_id: self.resolve_system_id(id.system_id),
		}
	}

	/// Apply system-identifier resolution to a declaration before it is
	/// reported.
	fn resolve_decl_uris(&self, decl: EntityDecl) -> EntityDecl {
		match decl {
			EntityDecl::ExternalParsed {
				name,
				parameter,
				id,
			} => EntityDecl::ExternalParsed {
				name,
				parameter,
				id: self.resolve_external_id(id),
			},
			EntityDecl::ExternalUnparsed { name, id, notation } => {
				EntityDecl::ExternalUnparsed {
					name,
					id: self.resolve_external_id(id),
					notation,
				}
			}
			internal => internal,
		}
	}

	/// Finalize a single attribute and return the event.
	fn finalize_attribute(&mut self, val: CData) -> Result<RawEvent> {
		let (raw_name, (prefix, localpart)) = self.attribute_scratchpad.take().unwrap();
		if let Some(prefix) = prefix.as_ref() {
			if prefix == "xmlns" {
				// Namespaces for XML 1.0
				// Namespace constraint: Reserved Prefixes and Namespace
				// Names
				if localpart == "xml" {
					if val != super::XMLNS_XML {
						return Err(Error::NotNamespaceWellFormed(
							NWFError::ReservedNamespacePrefix,
						));
					}
				} else {
					if val == super::XMLNS_XML {
						return Err(Error::NotNamespaceWellFormed(
							NWFError::ReservedNamespaceName,
						));
					}
				}
				// Namespace constraint: No Prefix Undeclaring
				if val.len() == 0 {
					return Err(Error::NotNamespaceWellFormed(NWFError::EmptyNamespaceUri));
				}
			}
		}
		let val = self.normalize_attribute_value(&raw_name, val);
		Ok(RawEvent::Attribute(
			self.finish_event(),
			(prefix, localpart),
			val,
		))
	}

	/// Apply the attribute-type aware normalization pass (XML 1.0
	/// § 3.3.3): for non-CDATA attributes, runs of spaces collapse to one
	/// and leading/trailing spaces are dropped.
	fn normalize_attribute_value(&self, raw_name: &Name, val: CData) -> CData {
		let element = match self.element_stack.last() {
			Some(e) => e,
			None => return val,
		};
		let tokenized = match self
			.att_types
			.get(&(element.clone(), raw_name.clone()))
		{
			Some(ty) => ty.is_tokenized(),
			None => false,
		};
		if !tokenized {
			return val;
		}
		let collapsed = val
			.as_str()
			.split(' ')
			.filter(|s| !s.is_empty())
			.collect::<Vec<_>>()
			.join(" ");
		if collapsed == val.as_str() {
			val
		} else {
			// safe: removing spaces cannot introduce invalid chars
			unsafe { CData::from_string_unchecked(collapsed) }
		}
	}

	/// Element header state
	fn parse_element<'r, R: TokenRead>(&mut self, state: ElementSt, r: &'r mut R) -> Result<State> {
		match self.read_token(r)? {
			None => Err(Error::wfeof(ERRCTX_ELEMENT)),
			Some(Token::ElementHFEnd(_)) => match state {
				ElementSt::AttrName => {
					let em = self.finish_event();
					self.emit_event(RawEvent::ElementHeadClose(em));
					Ok(State::Document(DocSt::CData))
				}
				_ => Err(Error::NotWellFormed(WFError::UnexpectedToken(
					ERRCTX_ELEMENT,
					Token::NAME_ELEMENTHFEND,
					None,
				))),
			},
			Some(Token::ElementHeadClose(_)) => match state {
				ElementSt::AttrName => {
					let em = self.finish_event();
					self.emit_event(RawEvent::ElementHeadClose(em));
					Ok(self.pop_element(self.fixed_event(0))?)
				}
				_ => Err(Error::NotWellFormed(WFError::UnexpectedToken(
					ERRCTX_ELEMENT,
					Token::NAME_ELEMENTHEADCLOSE,
					None,
				))),
			},
			Some(Token::Name(_, name)) => match state {
				ElementSt::AttrName => {
					let raw = name.clone();
					let (prefix, localname) = add_context(name.split_name(), ERRCTX_ATTNAME)?;
					if let Some(prefix) = prefix.as_ref() {
						if prefix == "xmlns" && localname == "xmlns" {
							return Err(Error::NotNamespaceWellFormed(
								NWFError::ReservedNamespacePrefix,
							));
						}
					}
					self.attribute_scratchpad = Some((raw, (prefix, localname)));
					Ok(State::Document(DocSt::Element(ElementSt::AttrEq)))
				}
				_ => Err(Error::NotWellFormed(WFError::UnexpectedToken(
					ERRCTX_ELEMENT,
					Token::NAME_NAME,
					None,
				))),
			},
			Some(Token::Eq(_)) => match state {
				ElementSt::AttrEq => Ok(State::Document(DocSt::Element(ElementSt::AttrValue))),
				_ => Err(Error::NotWellFormed(WFError::UnexpectedToken(
					ERRCTX_ELEMENT,
					Token::NAME_EQ,
					None,
				))),
			},
			Some(Token::AttributeValue(tm, val)) => match state {
				ElementSt::AttrValue => {
					let ev = self.finalize_attribute(val)?;
					self.emit_event(ev);
					// the event for further attribute names or the closing
					// symbol starts here
					self.start_event(&tm);
					self.event_length = 0;
					Ok(State::Document(DocSt::Element(ElementSt::AttrName)))
				}
				_ => Err(Error::NotWellFormed(WFError::UnexpectedToken(
					ERRCTX_ELEMENT,
					Token::NAME_ATTRIBUTEVALUE,
					None,
				))),
			},
			Some(tok) => Err(Error::NotWellFormed(WFError::UnexpectedToken(
				ERRCTX_ELEMENT,
				tok.name(),
				None,
			))),
		}
	}

	/// Emit a text event, classifying whitespace if the content model of
	/// the enclosing element says character data cannot appear in it.
	fn emit_text(&mut self, em: EventMetrics, data: CData, in_cdata: bool) {
		let ignorable = !in_cdata
			&& data
				.as_bytes()
				.iter()
				.all(|&c| c == b' ' || c == b'\t' || c == b'\n' || c == b'\r')
			&& match self
				.element_stack
				.last()
				.and_then(|e| self.content_models.get(e))
				.copied()
			{
				Some(ContentSpec::Children) | Some(ContentSpec::Empty) => true,
				_ => false,
			};
		if ignorable {
			self.emit_event(RawEvent::IgnorableWhitespace(em, data));
		} else {
			self.emit_event(RawEvent::Text(em, data));
		}
	}

	/// Document content state
	fn parse_document<'r, R: TokenRead>(&mut self, state: DocSt, r: &'r mut R) -> Result<State> {
		match state {
			DocSt::Element(substate) => self.parse_element(substate, r),
			DocSt::CData => {
				let tok = match self.read_token(r)? {
					Some(tok) => tok,
					None => return Err(Error::wfeof(ERRCTX_TEXT)),
				};
				if self.event_last_token_end.is_none() {
					self.start_event(tok.metrics());
				}
				if let Some(st) = self.handle_misc_token(&tok, State::Document(DocSt::CData))? {
					return Ok(st);
				}
				match tok {
					Token::Text(_, s) => {
						let em = self.finish_event();
						self.emit_text(em, s, false);
						Ok(State::Document(DocSt::CData))
					}
					Token::CharRef(_, ch) => {
						let em = self.finish_event();
						let mut buf = [0u8; 4];
						let s: CData = (ch.encode_utf8(&mut buf[..]) as &str).try_into()?;
						self.emit_event(RawEvent::Text(em, s));
						Ok(State::Document(DocSt::CData))
					}
					Token::PredefEntityRef(_, name) => {
						let em = self.finish_event();
						let ch = predefined_entity(&name).expect("predefined entity");
						let mut buf = [0u8; 4];
						let s: CData = (ch.encode_utf8(&mut buf[..]) as &str).try_into()?;
						self.emit_event(RawEvent::Text(em, s));
						Ok(State::Document(DocSt::CData))
					}
					Token::GeneralEntityRef(_, name) => {
						let em = self.finish_event();
						self.emit_event(RawEvent::SkippedEntity(em, name.into()));
						Ok(State::Document(DocSt::CData))
					}
					Token::EntityStart(_, name) => {
						let em = self.finish_event();
						self.emit_event(RawEvent::EntityStart(em, name));
						Ok(State::Document(DocSt::CData))
					}
					Token::EntityEnd(_) => {
						let em = self.finish_event();
						self.emit_event(RawEvent::EntityEnd(em));
						Ok(State::Document(DocSt::CData))
					}
					Token::CDataStart(_) => {
						let em = self.finish_event();
						self.emit_event(RawEvent::CDataStart(em));
						Ok(State::Document(DocSt::CDataSection))
					}
					Token::ElementHeadStart(tm, name) => {
						let ev = self.start_processing_element(name)?;
						self.emit_event(ev);
						self.start_event(&tm);
						self.event_length = 0;
						Ok(State::Document(DocSt::Element(ElementSt::AttrName)))
					}
					Token::ElementFootStart(_, name) => {
						if self.element_stack[self.element_stack.len() - 1] != name {
							Err(Error::NotWellFormed(WFError::ElementMismatch))
						} else {
							Ok(State::Document(DocSt::ElementFoot))
						}
					}
					tok => Err(Error::NotWellFormed(WFError::UnexpectedToken(
						ERRCTX_TEXT,
						tok.name(),
						Some(&[
							Token::NAME_TEXT,
							Token::NAME_ELEMENTHEADSTART,
							Token::NAME_ELEMENTFOOTSTART,
						]),
					))),
				}
			}
			DocSt::CDataSection => {
				let tok = match self.read_token(r)? {
					Some(tok) => tok,
					None => return Err(Error::wfeof(ERRCTX_CDATA_SECTION)),
				};
				if self.event_last_token_end.is_none() {
					self.start_event(tok.metrics());
				}
				match tok {
					Token::Text(_, s) => {
						let em = self.finish_event();
						self.emit_text(em, s, true);
						Ok(State::Document(DocSt::CDataSection))
					}
					Token::CDataEnd(_) => {
						let em = self.finish_event();
						self.emit_event(RawEvent::CDataEnd(em));
						Ok(State::Document(DocSt::CData))
					}
					tok => Err(Error::NotWellFormed(WFError::UnexpectedToken(
						ERRCTX_CDATA_SECTION,
						tok.name(),
						Some(&[Token::NAME_TEXT, Token::NAME_CDATAEND]),
					))),
				}
			}
			DocSt::ElementFoot => match self.read_token(r)? {
				Some(Token::ElementHFEnd(_)) => {
					let em = self.finish_event();
					self.pop_element(em)
				}
				Some(other) => Err(Error::NotWellFormed(WFError::UnexpectedToken(
					ERRCTX_ELEMENT_FOOT,
					other.name(),
					Some(&[Token::NAME_ELEMENTHFEND]),
				))),
				None => Err(Error::wfeof(ERRCTX_ELEMENT_FOOT)),
			},
		}
	}

	/// Epilog state: only misc content is allowed after the root element.
	fn parse_end<'r, R: TokenRead>(&mut self, r: &'r mut R) -> Result<State> {
		let tok = match self.read_token(r)? {
			Some(tok) => tok,
			None => return Ok(State::Eof),
		};
		if self.event_last_token_end.is_none() {
			self.start_event(tok.metrics());
		}
		if let Some(st) = self.handle_misc_token(&tok, State::End)? {
			return Ok(st);
		}
		match tok {
			// whitespace after the root element is explicitly allowed
			Token::Text(_, s)
				if s.as_bytes()
					.iter()
					.all(|&c| c == b' ' || c == b'\t' || c == b'\n' || c == b'\r') =>
			{
				self.event_last_token_end = None;
				self.event_length = 0;
				Ok(State::End)
			}
			tok => Err(Error::NotWellFormed(WFError::UnexpectedToken(
				ERRCTX_DOCEND,
				tok.name(),
				Some(&["end-of-file"]),
			))),
		}
	}
}

impl Parse for RawParser {
	type Output = RawEvent;

	fn parse<'r, R: TokenRead>(&mut self, r: &'r mut R) -> Result<Option<Self::Output>> {
		self.check_poison()?;
		loop {
			if self.eventq.len() > 0 {
				return Ok(Some(self.eventq.pop_front().unwrap()));
			}

			let result = match self.state {
				State::Initial => self.parse_initial(r),
				State::Decl { substate } => self.parse_decl(substate, r),
				State::Prolog => match self.read_token(r)? {
					Some(tok) => self.parse_prolog_token(tok),
					None => Err(Error::wfeof(ERRCTX_DOCBEGIN)),
				},
				State::Doctype(substate) => self.parse_doctype(substate, r),
				State::Document(substate) => self.parse_document(substate, r),
				State::End => self.parse_end(r),
				State::Eof => return Ok(None),
			};
			self.state = match result {
				Ok(st) => st,
				// pass through I/O errors without poisoning the parser
				Err(Error::IO(ioerr)) => return Err(Error::IO(ioerr)),
				// poison the parser for everything else to avoid emitting
				// illegal data
				Err(other) => {
					self.poison(other.clone());
					return Err(other);
				}
			};
		}
	}

	fn release_temporaries(&mut self) {
		self.eventq.shrink_to_fit();
		self.element_stack.shrink_to_fit();
	}
}

impl fmt::Debug for RawParser {
	fn fmt<'f>(&self, f: &'f mut fmt::Formatter) -> fmt::Result {
		f.debug_struct("RawParser")
			.field("state", &self.state)
			.finish()
	}
}

#[cfg(test)]
mod tests;
