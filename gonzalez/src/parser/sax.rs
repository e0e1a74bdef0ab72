/*!
# SAX-style callback interface

[`SaxDriver`] pulls [`ResolvedEvent`]s from a [`Parse`] implementation and
dispatches them to a [`ContentHandler`]. The capability set mirrors the
SAX2 `ContentHandler`/`LexicalHandler`/`DeclHandler` interfaces, folded
into one trait with no-op defaults.

Consecutive text events are coalesced into a single `characters` callback,
so entity expansion and CDATA sections inside one text run do not fragment
the data the handler sees.
*/
use crate::error::{HandlerError, Result};
use crate::lexer::dtd::{AttlistDecl, NotationDecl};
use crate::lexer::entities::EntityDecl;
use crate::strings::*;

use super::namespaces::{NamespaceName, ResolvedEvent, ResolvedQName};
use super::{Parse, TokenRead, XmlVersion};

/// Result type of handler callbacks.
///
/// Returning an error aborts the parse after the current event; the
/// error is surfaced to the caller as
/// [`Error::Handler`](crate::Error::Handler).
pub type CallbackResult = std::result::Result<(), HandlerError>;

/// A single resolved attribute, as passed to
/// [`ContentHandler::start_element`].
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
	/// Namespace URI, if the attribute name was prefixed.
	pub uri: Option<NamespaceName>,
	/// Local part of the attribute name.
	pub local_name: NCName,
	/// Normalized attribute value.
	pub value: CData,
}

/**
# Receiver for document content events

All methods have no-op default implementations; implement what you need.

The `start_prefix_mapping`/`end_prefix_mapping` calls bracket the
`start_element`/`end_element` calls of the element carrying the
declarations, in declaration order (and reverse order for the end calls).
*/
pub trait ContentHandler {
	fn start_document(&mut self) -> CallbackResult {
		Ok(())
	}

	fn end_document(&mut self) -> CallbackResult {
		Ok(())
	}

	fn xml_declaration(
		&mut self,
		_version: XmlVersion,
		_encoding: Option<&CDataStr>,
		_standalone: Option<bool>,
	) -> CallbackResult {
		Ok(())
	}

	fn start_element(
		&mut self,
		_name: &ResolvedQName,
		_attributes: &[Attribute],
	) -> CallbackResult {
		Ok(())
	}

	fn end_element(&mut self, _name: &ResolvedQName) -> CallbackResult {
		Ok(())
	}

	fn characters(&mut self, _text: &CDataStr) -> CallbackResult {
		Ok(())
	}

	fn ignorable_whitespace(&mut self, _text: &CDataStr) -> CallbackResult {
		Ok(())
	}

	fn processing_instruction(&mut self, _target: &NameStr, _data: &CDataStr) -> CallbackResult {
		Ok(())
	}

	fn comment(&mut self, _text: &CDataStr) -> CallbackResult {
		Ok(())
	}

	fn start_prefix_mapping(
		&mut self,
		_prefix: Option<&NCNameStr>,
		_uri: &CDataStr,
	) -> CallbackResult {
		Ok(())
	}

	fn end_prefix_mapping(&mut self, _prefix: Option<&NCNameStr>) -> CallbackResult {
		Ok(())
	}

	fn skipped_entity(&mut self, _name: &CDataStr) -> CallbackResult {
		Ok(())
	}

	/// An entity expansion began in content.
	///
	/// Character data is coalesced *across* entity boundaries, so the
	/// `characters` call covering an expansion may be delivered after the
	/// matching [`ContentHandler::end_entity`].
	fn start_entity(&mut self, _name: &NameStr) -> CallbackResult {
		Ok(())
	}

	/// The entity expansion opened by the matching
	/// [`ContentHandler::start_entity`] ended.
	fn end_entity(&mut self, _name: &NameStr) -> CallbackResult {
		Ok(())
	}

	fn start_cdata(&mut self) -> CallbackResult {
		Ok(())
	}

	fn end_cdata(&mut self) -> CallbackResult {
		Ok(())
	}

	fn start_dtd(
		&mut self,
		_name: &NameStr,
		_public_id: Option<&CDataStr>,
		_system_id: Option<&CDataStr>,
	) -> CallbackResult {
		Ok(())
	}

	fn end_dtd(&mut self) -> CallbackResult {
		Ok(())
	}

	fn entity_decl(&mut self, _decl: &EntityDecl) -> CallbackResult {
		Ok(())
	}

	fn element_decl(&mut self, _name: &NameStr, _model: &CDataStr) -> CallbackResult {
		Ok(())
	}

	fn attlist_decl(&mut self, _decl: &AttlistDecl) -> CallbackResult {
		Ok(())
	}

	fn notation_decl(&mut self, _decl: &NotationDecl) -> CallbackResult {
		Ok(())
	}
}

/**
# Receiver for recoverable problems

Fatal errors terminate the parse and are returned from the driving
functions directly; this channel exists for validation-level findings,
which do not stop processing.
*/
pub trait ErrorHandler {
	/// A condition which is not an error, but may be of interest.
	fn warning(&mut self, _message: &str) -> CallbackResult {
		Ok(())
	}

	/// A recoverable (validity) error.
	fn error(&mut self, _message: &str) -> CallbackResult {
		Ok(())
	}
}

/// Error handler which ignores everything.
pub struct NullErrorHandler;

impl ErrorHandler for NullErrorHandler {}

/**
# Dispatch resolved events to a [`ContentHandler`]

The driver owns the parser and the handler. Feed it tokens through any
[`TokenRead`] by calling [`SaxDriver::drive`].
*/
pub struct SaxDriver<P, H> {
	parser: P,
	handler: H,
	/// Coalescing buffer for character data.
	text: String,
	element_stack: Vec<ResolvedQName>,
	ns_stack: Vec<Vec<(Option<NCName>, NamespaceName)>>,
	/// Names of the entity expansions currently open, for the
	/// `end_entity` callback.
	entity_stack: Vec<Name>,
	started: bool,
}

impl<P: Parse<Output = ResolvedEvent>, H: ContentHandler> SaxDriver<P, H> {
	pub fn new(parser: P, handler: H) -> Self {
		Self {
			parser,
			handler,
			text: String::new(),
			element_stack: Vec::new(),
			ns_stack: Vec::new(),
			entity_stack: Vec::new(),
			started: false,
		}
	}

	/// Consume the driver and hand back the handler.
	pub fn into_handler(self) -> H {
		self.handler
	}

	/// Access the handler.
	pub fn handler(&self) -> &H {
		&self.handler
	}

	/// Access the handler, mutably.
	pub fn handler_mut(&mut self) -> &mut H {
		&mut self.handler
	}

	fn flush_text(&mut self) -> Result<()> {
		if self.text.is_empty() {
			return Ok(());
		}
		let buf = std::mem::take(&mut self.text);
		// safe: the buffer only ever aggregates CData contents
		let cdata = unsafe { CData::from_string_unchecked(buf) };
		self.handler.characters(&cdata)?;
		Ok(())
	}

	fn dispatch(&mut self, ev: ResolvedEvent) -> Result<()> {
		match ev {
			ResolvedEvent::Text(_, t) => {
				self.text.push_str(&t);
				Ok(())
			}
			// entity boundaries do not flush the buffer, so character
			// data stays in one piece across them
			ResolvedEvent::EntityStart(_, name) => {
				self.handler.start_entity(&name)?;
				self.entity_stack.push(name);
				Ok(())
			}
			ResolvedEvent::EntityEnd(_) => {
				let name = self
					.entity_stack
					.pop()
					.expect("entity end without matching start");
				self.handler.end_entity(&name)?;
				Ok(())
			}
			ev => {
				self.flush_text()?;
				self.dispatch_nontext(ev)
			}
		}
	}

	fn dispatch_nontext(&mut self, ev: ResolvedEvent) -> Result<()> {
		match ev {
			ResolvedEvent::Text(..)
			| ResolvedEvent::EntityStart(..)
			| ResolvedEvent::EntityEnd(..) => {
				unreachable!("buffered event in non-text dispatch")
			}
			ResolvedEvent::XmlDeclaration(_, version, encoding, standalone) => {
				self.handler.xml_declaration(
					version,
					encoding.as_deref(),
					standalone,
				)?;
				Ok(())
			}
			ResolvedEvent::DoctypeStart(_, name, public, system) => {
				self.handler
					.start_dtd(&name, public.as_deref(), system.as_deref())?;
				Ok(())
			}
			ResolvedEvent::EntityDecl(_, decl) => {
				self.handler.entity_decl(&decl)?;
				Ok(())
			}
			ResolvedEvent::ElementDecl(_, name, model) => {
				self.handler.element_decl(&name, &model)?;
				Ok(())
			}
			ResolvedEvent::AttlistDecl(_, decl) => {
				self.handler.attlist_decl(&decl)?;
				Ok(())
			}
			ResolvedEvent::NotationDecl(_, decl) => {
				self.handler.notation_decl(&decl)?;
				Ok(())
			}
			ResolvedEvent::DoctypeEnd(_) => {
				self.handler.end_dtd()?;
				Ok(())
			}
			ResolvedEvent::StartElement(_, qname, attributes, nsdecl) => {
				for (prefix, uri) in nsdecl.iter() {
					self.handler
						.start_prefix_mapping(prefix.as_deref(), uri)?;
				}
				let attributes: Vec<Attribute> = attributes
					.into_iter()
					.map(|((uri, local_name), value)| Attribute {
						uri,
						local_name,
						value,
					})
					.collect();
				self.handler.start_element(&qname, &attributes)?;
				self.element_stack.push(qname);
				self.ns_stack.push(nsdecl);
				Ok(())
			}
			ResolvedEvent::EndElement(_) => {
				let qname = self
					.element_stack
					.pop()
					.expect("end element without matching start");
				let nsdecl = self.ns_stack.pop().expect("namespace stack exhausted");
				self.handler.end_element(&qname)?;
				for (prefix, _) in nsdecl.iter().rev() {
					self.handler.end_prefix_mapping(prefix.as_deref())?;
				}
				Ok(())
			}
			ResolvedEvent::IgnorableWhitespace(_, t) => {
				self.handler.ignorable_whitespace(&t)?;
				Ok(())
			}
			ResolvedEvent::CDataStart(_) => {
				self.handler.start_cdata()?;
				Ok(())
			}
			ResolvedEvent::CDataEnd(_) => {
				self.handler.end_cdata()?;
				Ok(())
			}
			ResolvedEvent::Comment(_, t) => {
				self.handler.comment(&t)?;
				Ok(())
			}
			ResolvedEvent::ProcessingInstruction(_, target, data) => {
				self.handler.processing_instruction(&target, &data)?;
				Ok(())
			}
			ResolvedEvent::SkippedEntity(_, name) => {
				self.handler.skipped_entity(&name)?;
				Ok(())
			}
		}
	}

	/// Pull events from `r` and dispatch them until the end of the
	/// document or an error.
	///
	/// I/O errors (most importantly WouldBlock) are returned and may be
	/// retried; all other errors are final. A handler error aborts the
	/// parse after the event which produced it.
	pub fn drive<R: TokenRead>(&mut self, r: &mut R) -> Result<()> {
		if !self.started {
			self.handler.start_document()?;
			self.started = true;
		}
		loop {
			match self.parser.parse(r) {
				Ok(Some(ev)) => self.dispatch(ev)?,
				Ok(None) => {
					self.flush_text()?;
					self.handler.end_document()?;
					return Ok(());
				}
				Err(e) => return Err(e),
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::Error;
	use crate::lexer::Lexer;
	use crate::parser::{LexerAdapter, Parser};
	use std::io;

	/// Records every callback as a readable line, for sequence assertions.
	#[derive(Default)]
	struct Recorder {
		log: Vec<String>,
		fail_on_characters: bool,
	}

	impl ContentHandler for Recorder {
		fn start_document(&mut self) -> CallbackResult {
			self.log.push("startDocument".into());
			Ok(())
		}

		fn end_document(&mut self) -> CallbackResult {
			self.log.push("endDocument".into());
			Ok(())
		}

		fn start_element(
			&mut self,
			name: &ResolvedQName,
			attributes: &[Attribute],
		) -> CallbackResult {
			let mut entry = format!("startElement({}", name.1);
			if let Some(uri) = name.0.as_ref() {
				entry.push_str(&format!(" {{{}}}", uri));
			}
			for attr in attributes {
				entry.push_str(&format!(" {}='{}'", attr.local_name, attr.value));
			}
			entry.push(')');
			self.log.push(entry);
			Ok(())
		}

		fn end_element(&mut self, name: &ResolvedQName) -> CallbackResult {
			self.log.push(format!("endElement({})", name.1));
			Ok(())
		}

		fn characters(&mut self, text: &CDataStr) -> CallbackResult {
			if self.fail_on_characters {
				return Err("no text allowed".into());
			}
			self.log.push(format!("characters({})", text));
			Ok(())
		}

		fn ignorable_whitespace(&mut self, _text: &CDataStr) -> CallbackResult {
			self.log.push("ignorableWhitespace".into());
			Ok(())
		}

		fn start_prefix_mapping(
			&mut self,
			prefix: Option<&NCNameStr>,
			uri: &CDataStr,
		) -> CallbackResult {
			self.log.push(format!(
				"startPrefixMapping({},{})",
				prefix.map(|p| p.as_ref()).unwrap_or(""),
				uri
			));
			Ok(())
		}

		fn end_prefix_mapping(&mut self, prefix: Option<&NCNameStr>) -> CallbackResult {
			self.log.push(format!(
				"endPrefixMapping({})",
				prefix.map(|p| p.as_ref()).unwrap_or("")
			));
			Ok(())
		}

		fn skipped_entity(&mut self, name: &CDataStr) -> CallbackResult {
			self.log.push(format!("skippedEntity({})", name));
			Ok(())
		}

		fn start_cdata(&mut self) -> CallbackResult {
			self.log.push("startCDATA".into());
			Ok(())
		}

		fn end_cdata(&mut self) -> CallbackResult {
			self.log.push("endCDATA".into());
			Ok(())
		}

		fn comment(&mut self, text: &CDataStr) -> CallbackResult {
			self.log.push(format!("comment({})", text));
			Ok(())
		}

		fn processing_instruction(
			&mut self,
			target: &NameStr,
			data: &CDataStr,
		) -> CallbackResult {
			self.log.push(format!("pi({},{})", target, data));
			Ok(())
		}

		fn start_dtd(
			&mut self,
			name: &NameStr,
			_public_id: Option<&CDataStr>,
			_system_id: Option<&CDataStr>,
		) -> CallbackResult {
			self.log.push(format!("startDTD({})", name));
			Ok(())
		}

		fn end_dtd(&mut self) -> CallbackResult {
			self.log.push("endDTD".into());
			Ok(())
		}
	}

	fn run(doc: &[u8]) -> Result<Vec<String>> {
		run_with(doc, Recorder::default())
	}

	fn run_with(doc: &[u8], handler: Recorder) -> Result<Vec<String>> {
		let mut adapter = LexerAdapter::new(Lexer::new(), io::BufReader::new(doc));
		let mut driver = SaxDriver::new(Parser::new(), handler);
		driver.drive(&mut adapter)?;
		Ok(driver.into_handler().log)
	}

	#[test]
	fn sax_simple_document() {
		let log = run(b"<r><c>text</c></r>").unwrap();
		assert_eq!(
			log,
			vec![
				"startDocument",
				"startElement(r)",
				"startElement(c)",
				"characters(text)",
				"endElement(c)",
				"endElement(r)",
				"endDocument",
			]
		);
	}

	#[test]
	fn sax_entity_roundtrip_in_content() {
		// entity expansion merges into a single characters() call
		let log = run(
			b"<?xml version='1.0'?><!DOCTYPE r [<!ENTITY inner \"INNER\"><!ENTITY outer \"before &inner; after\">]><r>&outer;</r>",
		)
		.unwrap();
		let interesting: Vec<&String> = log
			.iter()
			.filter(|l| !l.starts_with("startDTD") && !l.starts_with("endDTD"))
			.collect();
		assert_eq!(
			interesting,
			vec![
				"startDocument",
				"startElement(r)",
				"characters(before INNER after)",
				"endElement(r)",
				"endDocument",
			]
		);
	}

	#[test]
	fn sax_namespace_resolution() {
		let log = run(b"<r xmlns:a=\"u1\" xmlns:b=\"u1\"><a:x/><b:x/></r>").unwrap();
		assert_eq!(
			log,
			vec![
				"startDocument",
				"startPrefixMapping(a,u1)",
				"startPrefixMapping(b,u1)",
				"startElement(r)",
				"startElement(x {u1})",
				"endElement(x)",
				"startElement(x {u1})",
				"endElement(x)",
				"endElement(r)",
				"endPrefixMapping(b)",
				"endPrefixMapping(a)",
				"endDocument",
			]
		);
	}

	#[test]
	fn sax_cdata_brackets_characters() {
		let log = run(b"<r>a<![CDATA[b]]>c</r>").unwrap();
		assert_eq!(
			log,
			vec![
				"startDocument",
				"startElement(r)",
				"characters(a)",
				"startCDATA",
				"characters(b)",
				"endCDATA",
				"characters(c)",
				"endElement(r)",
				"endDocument",
			]
		);
	}

	#[test]
	fn sax_skipped_entity_for_external_reference() {
		let log =
			run(b"<!DOCTYPE r [<!ENTITY x SYSTEM 'other.txt'>]><r>&x;</r>").unwrap();
		assert!(log.iter().any(|l| l == "skippedEntity(x)"));
	}

	/// Records entity boundaries alongside character data.
	#[derive(Default)]
	struct EntityRecorder {
		log: Vec<String>,
	}

	impl ContentHandler for EntityRecorder {
		fn characters(&mut self, text: &CDataStr) -> CallbackResult {
			self.log.push(format!("characters({})", text));
			Ok(())
		}

		fn start_entity(&mut self, name: &NameStr) -> CallbackResult {
			self.log.push(format!("startEntity({})", name));
			Ok(())
		}

		fn end_entity(&mut self, name: &NameStr) -> CallbackResult {
			self.log.push(format!("endEntity({})", name));
			Ok(())
		}
	}

	#[test]
	fn sax_entity_boundaries_are_observable() {
		let doc: &[u8] = b"<!DOCTYPE r [<!ENTITY inner \"INNER\"><!ENTITY outer \"before &inner; after\">]><r>&outer;</r>";
		let mut adapter = LexerAdapter::new(Lexer::new(), io::BufReader::new(doc));
		let mut driver = SaxDriver::new(Parser::new(), EntityRecorder::default());
		driver.drive(&mut adapter).unwrap();
		let log = driver.into_handler().log;
		assert_eq!(
			log,
			vec![
				"startEntity(outer)",
				"startEntity(inner)",
				"endEntity(inner)",
				"endEntity(outer)",
				// character data is coalesced across the boundaries
				"characters(before INNER after)",
			]
		);
	}

	#[test]
	fn sax_handler_error_aborts_parse() {
		let mut handler = Recorder::default();
		handler.fail_on_characters = true;
		let err = run_with(b"<r>boom<c/></r>", handler).err().unwrap();
		assert!(matches!(err, Error::Handler(_)));
	}

	#[test]
	fn sax_comments_and_pis() {
		let log = run(b"<!--pre--><r><?go now?></r>").unwrap();
		assert_eq!(
			log,
			vec![
				"startDocument",
				"comment(pre)",
				"startElement(r)",
				"pi(go,now)",
				"endElement(r)",
				"endDocument",
			]
		);
	}
}
