/*!
# Namespace resolution on top of the raw event stream
*/
use std::borrow::Cow;
use std::collections::HashMap;
use std::collections::HashSet;
use std::convert::TryInto;
use std::fmt;

use crate::context;
use crate::context::RcPtr;
use crate::errctx;
use crate::error::{add_context, Error, NWFError, Result, WFError};
use crate::lexer::dtd::{AttlistDecl, NotationDecl};
use crate::lexer::entities::EntityDecl;
use crate::strings::*;

use super::raw::{RawEvent, RawParser, RawQName};
use super::{EventMetrics, Parse, ParserOptions, TokenRead, WithContext, XmlVersion, XMLNS_XML};

/// Shared namespace URI
pub type NamespaceName = RcPtr<CData>;

/// Pair of an optional namespace name (URI) and a localpart, commonly used
/// in element and attribute names.
pub type ResolvedQName = (Option<NamespaceName>, NCName);

/**
# High-level, logical XML document parts

In contrast to the [`RawEvent`], observing a [`ResolvedEvent`] guarantees
that the document has been well-formed and namespace-well-formed up to this
point.

Attributes and namespace declarations are reported in source order.
*/
#[derive(Clone, PartialEq, Debug)]
pub enum ResolvedEvent {
	/// The XML declaration.
	XmlDeclaration(EventMetrics, XmlVersion, Option<CData>, Option<bool>),

	/// Start of the document type declaration.
	DoctypeStart(EventMetrics, Name, Option<CData>, Option<CData>),

	/// An entity declaration from the internal subset.
	EntityDecl(EventMetrics, EntityDecl),

	/// An element declaration from the internal subset.
	ElementDecl(EventMetrics, Name, CData),

	/// An attribute-list declaration from the internal subset.
	AttlistDecl(EventMetrics, AttlistDecl),

	/// A notation declaration from the internal subset.
	NotationDecl(EventMetrics, NotationDecl),

	/// End of the document type declaration.
	DoctypeEnd(EventMetrics),

	/// The start of an XML element.
	StartElement(
		EventMetrics,
		/// The namespace URI / localpart pair of the element.
		ResolvedQName,
		/// Attributes declared on the element, in source order, without
		/// namespace declarations (unless `namespace_prefixes` is set).
		Vec<(ResolvedQName, CData)>,
		/// Namespace declarations on this element, in source order. `None`
		/// as prefix denotes the default namespace; an empty URI undeclares
		/// it.
		Vec<(Option<NCName>, NamespaceName)>,
	),

	/// The end of an XML element.
	///
	/// The parser enforces that start/end pairs are correctly nested.
	EndElement(EventMetrics),

	/// Text character data.
	///
	/// **Note:** Multiple consecutive `Text` events may be emitted for
	/// long sections of text or because of implementation details in the
	/// processing.
	Text(EventMetrics, CData),

	/// Whitespace inside an element with element-only declared content.
	IgnorableWhitespace(EventMetrics, CData),

	/// Start of a CDATA section.
	CDataStart(EventMetrics),

	/// End of a CDATA section.
	CDataEnd(EventMetrics),

	/// A comment.
	Comment(EventMetrics, CData),

	/// A processing instruction.
	ProcessingInstruction(EventMetrics, Name, CData),

	/// An entity reference which was not expanded.
	SkippedEntity(EventMetrics, CData),

	/// An entity expansion began in content.
	EntityStart(EventMetrics, Name),

	/// The innermost open entity expansion ended.
	EntityEnd(EventMetrics),
}

impl ResolvedEvent {
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
			Self::StartElement(m, ..) => m,
			Self::EndElement(m) => m,
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

enum State {
	Initial,
	Element,
}

struct ElementScratchpad {
	phyqname: RawQName,
	attributes: Vec<(RawQName, CData)>,
	/// Namespace declarations in source order; `None` = default namespace.
	nsdecl: Vec<(Option<NCName>, NamespaceName)>,
}

impl ElementScratchpad {
	fn new(phyqname: RawQName) -> Self {
		Self {
			phyqname,
			attributes: Vec::new(),
			nsdecl: Vec::new(),
		}
	}
}

/**
# Namespace/Attribute resolver

This struct implements the resolution logic to convert namespace prefixes
into namespace names (URIs), as described in Namespaces for XML 1.0. It
takes [`RawEvent`] structs and combines/converts them into
[`ResolvedEvent`] structs.

When the `namespaces` option is disabled, prefixes are split but not
resolved and no declaredness checks happen; attribute uniqueness is then
checked on the raw names.
*/
pub struct NamespaceResolver {
	ctx: RcPtr<context::Context>,
	opts: ParserOptions,
	fixed_xml_namespace: NamespaceName,
	xmlns_namespace: NamespaceName,
	namespace_stack: Vec<(Option<NamespaceName>, HashMap<NCName, NamespaceName>)>,
	scratchpad: Option<ElementScratchpad>,
	event_length_accum: usize,
	state: State,
	poison: Option<Error>,
}

impl NamespaceResolver {
	/// Create a new namespace resolver with its own (unshared)
	/// [`context::Context`].
	pub fn new() -> Self {
		Self::with_options(ParserOptions::default())
	}

	/// Create a new namespace resolver with the given options.
	pub fn with_options(opts: ParserOptions) -> Self {
		Self::with_context_and_options(RcPtr::new(context::Context::new()), opts)
	}

	/// Create a new namespace resolver with the given context and options.
	pub fn with_context_and_options(
		ctx: RcPtr<context::Context>,
		opts: ParserOptions,
	) -> Self {
		let fixed_xml_namespace = ctx.intern_cdata(Cow::Borrowed(XMLNS_XML));
		let xmlns_namespace = ctx.intern_cdata(Cow::Borrowed(super::XMLNS_XMLNS));
		Self {
			ctx,
			opts,
			fixed_xml_namespace,
			xmlns_namespace,
			namespace_stack: Vec::new(),
			scratchpad: None,
			event_length_accum: 0,
			state: State::Initial,
			poison: None,
		}
	}

	fn check_poison(&self) -> Result<()> {
		if let Some(poison) = self.poison.as_ref() {
			return Err(poison.clone());
		}
		Ok(())
	}

	fn start_element(&mut self, phyqn: RawQName) -> Result<()> {
		debug_assert!(self.scratchpad.is_none());
		if let Some(prefix) = phyqn.0.as_ref() {
			if prefix == "xmlns" {
				return Err(Error::NotNamespaceWellFormed(
					NWFError::ReservedNamespacePrefix,
				));
			}
		}
		self.scratchpad = Some(ElementScratchpad::new(phyqn));
		Ok(())
	}

	fn push_attribute(&mut self, phyqn: RawQName, value: CData) -> Result<()> {
		if !self.opts.namespaces {
			self.scratchpad
				.as_mut()
				.unwrap()
				.attributes
				.push((phyqn, value));
			return Ok(());
		}
		let is_prefix_decl = matches!(phyqn.0.as_ref(), Some(p) if p == "xmlns");
		let is_default_decl = phyqn.0.is_none() && phyqn.1 == "xmlns";
		if is_prefix_decl || is_default_decl {
			let uri = self.make_namespace_name(value);
			let scratchpad = self.scratchpad.as_mut().unwrap();
			let prefix = if is_prefix_decl {
				Some(phyqn.1.clone())
			} else {
				None
			};
			// XML 1.0 Well-formedness constraint: Unique Att Spec
			if scratchpad.nsdecl.iter().any(|(p, _)| *p == prefix) {
				return Err(Error::NotWellFormed(WFError::DuplicateAttribute));
			}
			scratchpad.nsdecl.push((prefix, uri));
			return Ok(());
		}
		self.scratchpad
			.as_mut()
			.unwrap()
			.attributes
			.push((phyqn, value));
		Ok(())
	}

	/// Turn a declared URI into a shared [`NamespaceName`], going through
	/// the interning context only when the `string_interning` option asks
	/// for it.
	fn make_namespace_name(&self, value: CData) -> NamespaceName {
		if self.opts.string_interning {
			self.ctx.intern_cdata(value)
		} else {
			RcPtr::new(value)
		}
	}

	fn lookup_prefix<'x>(&self, prefix: Option<&'x str>) -> Result<Option<NamespaceName>> {
		match prefix {
			None => {
				for (default_decl, _) in self.namespace_stack.iter().rev() {
					if let Some(nsuri) = default_decl.as_ref() {
						if nsuri.len() > 0 {
							return Ok(Some(nsuri.clone()));
						} else {
							return Ok(None);
						}
					}
				}
				Ok(None)
			}
			Some(prefix) => {
				if prefix == "xml" {
					return Ok(Some(self.fixed_xml_namespace.clone()));
				}
				for (_, decls) in self.namespace_stack.iter().rev() {
					if let Some(nsuri) = decls.get(prefix) {
						return Ok(Some(nsuri.clone()));
					}
				}
				// Namespaces for XML 1.0
				// Namespace constraint: Prefix Declared
				Err(Error::NotNamespaceWellFormed(
					NWFError::UndeclaredNamespacePrefix(errctx::ERRCTX_UNKNOWN),
				))
			}
		}
	}

	fn finish_element(&mut self) -> Result<ResolvedEvent> {
		let ElementScratchpad {
			phyqname,
			attributes: phyattributes,
			nsdecl,
		} = self.scratchpad.take().unwrap();
		let len = self.event_length_accum;
		self.event_length_accum = 0;

		// the element's own declarations are in scope for its own name and
		// its attributes, so the frame is pushed first
		let mut default_decl = None;
		let mut decl_map = HashMap::with_capacity(nsdecl.len());
		for (prefix, uri) in nsdecl.iter() {
			match prefix {
				None => default_decl = Some(uri.clone()),
				Some(p) => {
					decl_map.insert(p.clone(), uri.clone());
				}
			}
		}
		self.namespace_stack.push((default_decl, decl_map));

		let mut attributes = Vec::with_capacity(phyattributes.len());
		let mut seen: HashSet<ResolvedQName> = HashSet::with_capacity(phyattributes.len());
		let mut seen_raw: HashSet<Name> = HashSet::new();
		for (phyqn, value) in phyattributes.into_iter() {
			if !self.opts.namespaces {
				let raw = match phyqn.0.as_ref() {
					Some(p) => p.clone().add_suffix(&phyqn.1),
					None => phyqn.1.clone().as_name(),
				};
				// XML 1.0 Well-formedness constraint: Unique Att Spec
				if !seen_raw.insert(raw) {
					return Err(Error::NotWellFormed(WFError::DuplicateAttribute));
				}
				attributes.push(((None, phyqn.1), value));
				continue;
			}
			let nsuri = match phyqn.0 {
				// attributes without prefix are in no namespace, the
				// default namespace does not apply to them
				Some(prefix) => add_context(
					self.lookup_prefix(Some(&prefix)),
					errctx::ERRCTX_ATTNAME,
				)?,
				None => None,
			};
			let qn = (nsuri, phyqn.1);
			// XML 1.0 Well-formedness constraint: Unique Att Spec
			// Namespaces in XML 1.0 Namespace constraint: Attributes Unique
			// The two violations cannot be distinguished at this point
			// anymore, and the difference is in most cases irrelevant.
			if !seen.insert(qn.clone()) {
				return Err(Error::NotWellFormed(WFError::DuplicateAttribute));
			}
			attributes.push((qn, value));
		}

		if self.opts.namespace_prefixes {
			for (prefix, uri) in nsdecl.iter() {
				let local = match prefix {
					Some(p) => p.clone(),
					// the default declaration is reported under the
					// reserved name itself
					None => "xmlns".try_into().unwrap(),
				};
				attributes.push((
					(Some(self.xmlns_namespace.clone()), local),
					(**uri).clone(),
				));
			}
		}

		let qname = if self.opts.namespaces {
			(
				add_context(
					self.lookup_prefix(phyqname.0.as_ref().map(|x| x.as_str())),
					errctx::ERRCTX_NAME,
				)?,
				phyqname.1,
			)
		} else {
			(None, phyqname.1)
		};
		Ok(ResolvedEvent::StartElement(
			EventMetrics { len },
			qname,
			attributes,
			nsdecl,
		))
	}

	fn process_event(&mut self, ev: RawEvent) -> Result<Option<ResolvedEvent>> {
		// returning Ok(None) does not signal EOF here, but "read more"
		match ev {
			RawEvent::ElementHeadOpen(_, phyqn) => match self.state {
				State::Initial => {
					self.state = State::Element;
					self.start_element(phyqn)?;
					Ok(None)
				}
				_ => unreachable!("element head inside element head"),
			},
			RawEvent::Attribute(_, phyqn, value) => match self.state {
				State::Element => {
					self.push_attribute(phyqn, value)?;
					Ok(None)
				}
				_ => unreachable!("attribute outside element head"),
			},
			RawEvent::ElementHeadClose(_) => match self.state {
				State::Element => {
					let ev = self.finish_element()?;
					self.state = State::Initial;
					Ok(Some(ev))
				}
				_ => unreachable!("element head close outside element head"),
			},
			RawEvent::ElementFoot(em) => {
				self.namespace_stack.pop();
				Ok(Some(ResolvedEvent::EndElement(em)))
			}
			RawEvent::XmlDeclaration(em, v, enc, sa) => {
				self.event_length_accum = 0;
				Ok(Some(ResolvedEvent::XmlDeclaration(em, v, enc, sa)))
			}
			RawEvent::DoctypeStart(em, name, public, system) => {
				self.event_length_accum = 0;
				Ok(Some(ResolvedEvent::DoctypeStart(em, name, public, system)))
			}
			RawEvent::EntityDecl(em, decl) => {
				self.event_length_accum = 0;
				Ok(Some(ResolvedEvent::EntityDecl(em, decl)))
			}
			RawEvent::ElementDecl(em, name, raw) => {
				self.event_length_accum = 0;
				Ok(Some(ResolvedEvent::ElementDecl(em, name, raw)))
			}
			RawEvent::AttlistDecl(em, decl) => {
				self.event_length_accum = 0;
				Ok(Some(ResolvedEvent::AttlistDecl(em, decl)))
			}
			RawEvent::NotationDecl(em, decl) => {
				self.event_length_accum = 0;
				Ok(Some(ResolvedEvent::NotationDecl(em, decl)))
			}
			RawEvent::DoctypeEnd(em) => {
				self.event_length_accum = 0;
				Ok(Some(ResolvedEvent::DoctypeEnd(em)))
			}
			RawEvent::Text(em, v) => {
				self.event_length_accum = 0;
				Ok(Some(ResolvedEvent::Text(em, v)))
			}
			RawEvent::IgnorableWhitespace(em, v) => {
				self.event_length_accum = 0;
				Ok(Some(ResolvedEvent::IgnorableWhitespace(em, v)))
			}
			RawEvent::CDataStart(em) => {
				self.event_length_accum = 0;
				Ok(Some(ResolvedEvent::CDataStart(em)))
			}
			RawEvent::CDataEnd(em) => {
				self.event_length_accum = 0;
				Ok(Some(ResolvedEvent::CDataEnd(em)))
			}
			RawEvent::Comment(em, v) => {
				self.event_length_accum = 0;
				Ok(Some(ResolvedEvent::Comment(em, v)))
			}
			RawEvent::ProcessingInstruction(em, target, data) => {
				self.event_length_accum = 0;
				Ok(Some(ResolvedEvent::ProcessingInstruction(em, target, data)))
			}
			RawEvent::SkippedEntity(em, name) => {
				self.event_length_accum = 0;
				Ok(Some(ResolvedEvent::SkippedEntity(em, name)))
			}
			RawEvent::EntityStart(em, name) => {
				self.event_length_accum = 0;
				Ok(Some(ResolvedEvent::EntityStart(em, name)))
			}
			RawEvent::EntityEnd(em) => {
				self.event_length_accum = 0;
				Ok(Some(ResolvedEvent::EntityEnd(em)))
			}
		}
	}

	/// Read [`RawEvent`] structs from the given function until either an
	/// error occurs or a valid [`ResolvedEvent`] can be emitted.
	///
	/// If the [`NamespaceResolver`] detects an error (such as a duplicate
	/// attribute), that error will henceforth be returned whenever this
	/// function is called; the `NamespaceResolver` is then poisoned.
	///
	/// Errors from `f` are forwarded, but do not poison the
	/// [`NamespaceResolver`].
	pub fn next<F: FnMut() -> Result<Option<RawEvent>>>(
		&mut self,
		mut f: F,
	) -> Result<Option<ResolvedEvent>> {
		self.check_poison()?;
		loop {
			let pev = match f() {
				Ok(None) => return Ok(None),
				Err(e) => return Err(e),
				Ok(Some(pev)) => pev,
			};
			self.event_length_accum += pev.metrics().len();
			match self.process_event(pev) {
				Err(e) => {
					self.poison = Some(e.clone());
					return Err(e);
				}
				Ok(Some(v)) => return Ok(Some(v)),
				// None does not signal EOF here, but "read more"
				Ok(None) => (),
			}
		}
	}

	/// Access the inner context
	pub fn context(&self) -> &RcPtr<context::Context> {
		&self.ctx
	}
}

impl fmt::Debug for NamespaceResolver {
	fn fmt<'f>(&self, f: &'f mut fmt::Formatter) -> fmt::Result {
		f.debug_struct("NamespaceResolver")
			.field("depth", &self.namespace_stack.len())
			.finish()
	}
}

/**
# Full parser: tokens to resolved events

Combines a [`RawParser`] and a [`NamespaceResolver`] into a single
[`Parse`] implementation which produces [`ResolvedEvent`]s.
*/
pub struct Parser {
	raw: RawParser,
	resolver: NamespaceResolver,
}

impl Parser {
	/// Create a parser with default options and its own context.
	pub fn new() -> Self {
		Self::with_options(ParserOptions::default())
	}

	/// Create a parser with the given options.
	pub fn with_options(opts: ParserOptions) -> Self {
		Self {
			raw: RawParser::with_options(opts.clone()),
			resolver: NamespaceResolver::with_options(opts),
		}
	}

	/// Access the shared interning context.
	pub fn context(&self) -> &RcPtr<context::Context> {
		self.resolver.context()
	}
}

impl Default for Parser {
	fn default() -> Self {
		Self::new()
	}
}

impl WithContext for Parser {
	fn with_context(ctx: RcPtr<context::Context>) -> Self {
		Self {
			raw: RawParser::new(),
			resolver: NamespaceResolver::with_context_and_options(
				ctx,
				ParserOptions::default(),
			),
		}
	}
}

impl Parse for Parser {
	type Output = ResolvedEvent;

	fn parse<R: TokenRead>(&mut self, r: &mut R) -> Result<Option<Self::Output>> {
		let raw = &mut self.raw;
		self.resolver.next(|| raw.parse(r))
	}

	fn release_temporaries(&mut self) {
		self.raw.release_temporaries();
		self.resolver.namespace_stack.shrink_to_fit();
	}
}

impl fmt::Debug for Parser {
	fn fmt<'f>(&self, f: &'f mut fmt::Formatter) -> fmt::Result {
		f.debug_struct("Parser").field("raw", &self.raw).finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::parser::ZERO_METRICS;

	const DM: EventMetrics = ZERO_METRICS;

	fn name(s: &str) -> Name {
		s.try_into().unwrap()
	}

	fn ncname(s: &str) -> NCName {
		s.try_into().unwrap()
	}

	fn cdata(s: &str) -> CData {
		s.try_into().unwrap()
	}

	fn resolve_all(evs: Vec<RawEvent>) -> (Vec<ResolvedEvent>, Result<()>) {
		resolve_all_with(evs, ParserOptions::default())
	}

	fn resolve_all_with(
		mut evs: Vec<RawEvent>,
		opts: ParserOptions,
	) -> (Vec<ResolvedEvent>, Result<()>) {
		let mut nsr = NamespaceResolver::with_options(opts);
		let mut out = Vec::new();
		let mut iter = evs.drain(..);
		loop {
			match nsr.next(|| Ok(iter.next())) {
				Err(err) => return (out, Err(err)),
				Ok(Some(ev)) => out.push(ev),
				Ok(None) => return (out, Ok(())),
			}
		}
	}

	fn element(
		name_s: &str,
		attrs: Vec<(&str, &str)>,
	) -> Vec<RawEvent> {
		let mut evs = vec![RawEvent::ElementHeadOpen(
			DM,
			(None, ncname(name_s)),
		)];
		for (k, v) in attrs {
			let nm = name(k);
			let (prefix, local) = nm.split_name().unwrap();
			evs.push(RawEvent::Attribute(DM, (prefix, local), cdata(v)));
		}
		evs.push(RawEvent::ElementHeadClose(DM));
		evs.push(RawEvent::ElementFoot(DM));
		evs
	}

	#[test]
	fn namespace_resolver_aggregates_attributes_in_order() {
		let (evs, r) = resolve_all(element("root", vec![("a1", "v1"), ("a2", "v2")]));
		r.unwrap();
		match &evs[0] {
			ResolvedEvent::StartElement(_, (nsuri, localpart), attrs, nsdecl) => {
				assert!(nsuri.is_none());
				assert_eq!(localpart, "root");
				assert_eq!(attrs.len(), 2);
				assert_eq!(attrs[0].0 .1, "a1");
				assert_eq!(attrs[0].1, "v1");
				assert_eq!(attrs[1].0 .1, "a2");
				assert_eq!(attrs[1].1, "v2");
				assert!(nsdecl.is_empty());
			}
			other => panic!("unexpected event: {:?}", other),
		}
		assert!(matches!(&evs[1], ResolvedEvent::EndElement(_)));
	}

	#[test]
	fn namespace_resolver_resolves_prefixes() {
		let (evs, r) = resolve_all(vec![
			RawEvent::ElementHeadOpen(DM, (Some(ncname("a")), ncname("x"))),
			RawEvent::Attribute(
				DM,
				(Some(ncname("xmlns")), ncname("a")),
				cdata("urn:foo"),
			),
			RawEvent::ElementHeadClose(DM),
			RawEvent::ElementFoot(DM),
		]);
		r.unwrap();
		match &evs[0] {
			ResolvedEvent::StartElement(_, (nsuri, localpart), _, nsdecl) => {
				assert_eq!(&***nsuri.as_ref().unwrap(), "urn:foo");
				assert_eq!(localpart, "x");
				assert_eq!(nsdecl.len(), 1);
				assert_eq!(nsdecl[0].0.as_ref().unwrap(), "a");
				assert_eq!(&**nsdecl[0].1, "urn:foo");
			}
			other => panic!("unexpected event: {:?}", other),
		}
	}

	#[test]
	fn namespace_resolver_applies_default_namespace_to_elements_only() {
		let (evs, r) = resolve_all(vec![
			RawEvent::ElementHeadOpen(DM, (None, ncname("root"))),
			RawEvent::Attribute(DM, (None, ncname("xmlns")), cdata("urn:default")),
			RawEvent::Attribute(DM, (None, ncname("plain")), cdata("v")),
			RawEvent::ElementHeadClose(DM),
			RawEvent::ElementFoot(DM),
		]);
		r.unwrap();
		match &evs[0] {
			ResolvedEvent::StartElement(_, (nsuri, _), attrs, _) => {
				assert_eq!(&***nsuri.as_ref().unwrap(), "urn:default");
				// the unprefixed attribute gets no namespace
				assert!(attrs[0].0 .0.is_none());
			}
			other => panic!("unexpected event: {:?}", other),
		}
	}

	#[test]
	fn namespace_resolver_inherits_bindings_to_children() {
		let (evs, r) = resolve_all(vec![
			RawEvent::ElementHeadOpen(DM, (None, ncname("root"))),
			RawEvent::Attribute(
				DM,
				(Some(ncname("xmlns")), ncname("p")),
				cdata("urn:p"),
			),
			RawEvent::ElementHeadClose(DM),
			RawEvent::ElementHeadOpen(DM, (Some(ncname("p")), ncname("child"))),
			RawEvent::ElementHeadClose(DM),
			RawEvent::ElementFoot(DM),
			RawEvent::ElementFoot(DM),
		]);
		r.unwrap();
		match &evs[1] {
			ResolvedEvent::StartElement(_, (nsuri, localpart), ..) => {
				assert_eq!(&***nsuri.as_ref().unwrap(), "urn:p");
				assert_eq!(localpart, "child");
			}
			other => panic!("unexpected event: {:?}", other),
		}
	}

	#[test]
	fn namespace_resolver_rejects_undeclared_prefix() {
		let (_, r) = resolve_all(vec![
			RawEvent::ElementHeadOpen(DM, (Some(ncname("nope")), ncname("x"))),
			RawEvent::ElementHeadClose(DM),
			RawEvent::ElementFoot(DM),
		]);
		assert!(matches!(
			r.err().unwrap(),
			Error::NotNamespaceWellFormed(NWFError::UndeclaredNamespacePrefix(_))
		));
	}

	#[test]
	fn namespace_resolver_rejects_duplicate_attribute_name() {
		let (_, r) = resolve_all(element("root", vec![("a", "1"), ("a", "2")]));
		assert!(matches!(
			r.err().unwrap(),
			Error::NotWellFormed(WFError::DuplicateAttribute)
		));
	}

	#[test]
	fn namespace_resolver_rejects_duplicate_after_prefix_expansion() {
		// different prefixes bound to the same URI, same localname
		let (_, r) = resolve_all(vec![
			RawEvent::ElementHeadOpen(DM, (None, ncname("root"))),
			RawEvent::Attribute(
				DM,
				(Some(ncname("xmlns")), ncname("a")),
				cdata("urn:same"),
			),
			RawEvent::Attribute(
				DM,
				(Some(ncname("xmlns")), ncname("b")),
				cdata("urn:same"),
			),
			RawEvent::Attribute(DM, (Some(ncname("a")), ncname("x")), cdata("1")),
			RawEvent::Attribute(DM, (Some(ncname("b")), ncname("x")), cdata("2")),
			RawEvent::ElementHeadClose(DM),
			RawEvent::ElementFoot(DM),
		]);
		assert!(matches!(
			r.err().unwrap(),
			Error::NotWellFormed(WFError::DuplicateAttribute)
		));
	}

	#[test]
	fn namespace_resolver_xml_prefix_is_predeclared() {
		let (evs, r) = resolve_all(vec![
			RawEvent::ElementHeadOpen(DM, (None, ncname("root"))),
			RawEvent::Attribute(
				DM,
				(Some(ncname("xml")), ncname("lang")),
				cdata("en"),
			),
			RawEvent::ElementHeadClose(DM),
			RawEvent::ElementFoot(DM),
		]);
		r.unwrap();
		match &evs[0] {
			ResolvedEvent::StartElement(_, _, attrs, _) => {
				assert_eq!(
					&***attrs[0].0 .0.as_ref().unwrap(),
					"http://www.w3.org/XML/1998/namespace"
				);
			}
			other => panic!("unexpected event: {:?}", other),
		}
	}

	#[test]
	fn namespace_resolver_reports_xmlns_attrs_with_namespace_prefixes() {
		let opts = ParserOptions {
			namespace_prefixes: true,
			..ParserOptions::default()
		};
		let (evs, r) = resolve_all_with(
			vec![
				RawEvent::ElementHeadOpen(DM, (None, ncname("root"))),
				RawEvent::Attribute(
					DM,
					(Some(ncname("xmlns")), ncname("p")),
					cdata("urn:p"),
				),
				RawEvent::ElementHeadClose(DM),
				RawEvent::ElementFoot(DM),
			],
			opts,
		);
		r.unwrap();
		match &evs[0] {
			ResolvedEvent::StartElement(_, _, attrs, _) => {
				assert_eq!(attrs.len(), 1);
				assert_eq!(attrs[0].0 .1, "p");
				assert_eq!(attrs[0].1, "urn:p");
			}
			other => panic!("unexpected event: {:?}", other),
		}
	}

	#[test]
	fn namespace_resolver_undeclares_default_namespace() {
		let (evs, r) = resolve_all(vec![
			RawEvent::ElementHeadOpen(DM, (None, ncname("root"))),
			RawEvent::Attribute(DM, (None, ncname("xmlns")), cdata("urn:default")),
			RawEvent::ElementHeadClose(DM),
			RawEvent::ElementHeadOpen(DM, (None, ncname("child"))),
			RawEvent::Attribute(DM, (None, ncname("xmlns")), cdata("")),
			RawEvent::ElementHeadClose(DM),
			RawEvent::ElementFoot(DM),
			RawEvent::ElementFoot(DM),
		]);
		r.unwrap();
		match &evs[1] {
			ResolvedEvent::StartElement(_, (nsuri, _), ..) => {
				assert!(nsuri.is_none());
			}
			other => panic!("unexpected event: {:?}", other),
		}
	}

	#[cfg(feature = "interning")]
	#[test]
	fn namespace_resolver_honors_string_interning_flag() {
		let decls = vec![
			RawEvent::ElementHeadOpen(DM, (None, ncname("root"))),
			RawEvent::Attribute(
				DM,
				(Some(ncname("xmlns")), ncname("a")),
				cdata("urn:same"),
			),
			RawEvent::Attribute(
				DM,
				(Some(ncname("xmlns")), ncname("b")),
				cdata("urn:same"),
			),
			RawEvent::ElementHeadClose(DM),
			RawEvent::ElementFoot(DM),
		];
		let (evs, r) = resolve_all(decls.clone());
		r.unwrap();
		match &evs[0] {
			ResolvedEvent::StartElement(_, _, _, nsdecl) => {
				assert!(RcPtr::ptr_eq(&nsdecl[0].1, &nsdecl[1].1));
			}
			other => panic!("unexpected event: {:?}", other),
		}
		let opts = ParserOptions {
			string_interning: false,
			..ParserOptions::default()
		};
		let (evs, r) = resolve_all_with(decls, opts);
		r.unwrap();
		match &evs[0] {
			ResolvedEvent::StartElement(_, _, _, nsdecl) => {
				assert_eq!(&*nsdecl[0].1, &*nsdecl[1].1);
				assert!(!RcPtr::ptr_eq(&nsdecl[0].1, &nsdecl[1].1));
			}
			other => panic!("unexpected event: {:?}", other),
		}
	}

	#[test]
	fn namespace_resolver_passes_text_through() {
		let (evs, r) = resolve_all(vec![
			RawEvent::ElementHeadOpen(DM, (None, ncname("root"))),
			RawEvent::ElementHeadClose(DM),
			RawEvent::Text(EventMetrics::new(5), cdata("Hello")),
			RawEvent::ElementFoot(DM),
		]);
		r.unwrap();
		assert!(matches!(&evs[1], ResolvedEvent::Text(em, t) if t == "Hello" && em.len() == 5));
	}
}
