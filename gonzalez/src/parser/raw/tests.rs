use super::*;
use crate::lexer::TokenMetrics;
use std::convert::TryInto;
use std::io;

const DM: TokenMetrics = TokenMetrics::new(0, 0);

struct TokenSliceReader<'x> {
	base: &'x [Token],
	offset: usize,
}

struct SometimesBlockingTokenSliceReader<'x> {
	base: &'x [Token],
	offset: usize,
	has_blocked: bool,
}

trait TokenSliceWrapper<'x> {
	fn new(src: &'x [Token]) -> Self;
}

impl<'x> TokenSliceWrapper<'x> for TokenSliceReader<'x> {
	fn new(src: &'x [Token]) -> TokenSliceReader<'x> {
		TokenSliceReader {
			base: src,
			offset: 0,
		}
	}
}

impl<'x> TokenSliceWrapper<'x> for SometimesBlockingTokenSliceReader<'x> {
	fn new(src: &'x [Token]) -> SometimesBlockingTokenSliceReader<'x> {
		SometimesBlockingTokenSliceReader {
			base: src,
			offset: 0,
			has_blocked: false,
		}
	}
}

impl<'x> TokenRead for TokenSliceReader<'x> {
	fn read(&mut self) -> Result<Option<Token>> {
		match self.base.get(self.offset) {
			Some(x) => {
				self.offset += 1;
				Ok(Some(x.clone()))
			}
			None => Ok(None),
		}
	}
}

impl<'x> TokenRead for SometimesBlockingTokenSliceReader<'x> {
	fn read(&mut self) -> Result<Option<Token>> {
		if !self.has_blocked {
			self.has_blocked = true;
			return Err(Error::io(io::Error::new(
				io::ErrorKind::WouldBlock,
				"noise",
			)));
		}
		match self.base.get(self.offset) {
			Some(x) => {
				self.has_blocked = false;
				self.offset += 1;
				Ok(Some(x.clone()))
			}
			None => Ok(None),
		}
	}
}

fn parse_custom<'t, T: TokenSliceWrapper<'t> + TokenRead>(
	src: &'t [Token],
) -> (Vec<RawEvent>, Result<()>) {
	let mut sink = Vec::new();
	let mut reader = T::new(src);
	let mut parser = RawParser::new();
	loop {
		match parser.parse(&mut reader) {
			Ok(Some(ev)) => sink.push(ev),
			Ok(None) => return (sink, Ok(())),
			Err(Error::IO(_)) => (),
			Err(e) => return (sink, Err(e)),
		}
	}
}

fn parse(src: &[Token]) -> (Vec<RawEvent>, Result<()>) {
	parse_custom::<TokenSliceReader>(src)
}

fn parse_with(src: &[Token], opts: ParserOptions) -> (Vec<RawEvent>, Result<()>) {
	let mut sink = Vec::new();
	let mut reader = TokenSliceReader::new(src);
	let mut parser = RawParser::with_options(opts);
	loop {
		match parser.parse(&mut reader) {
			Ok(Some(ev)) => sink.push(ev),
			Ok(None) => return (sink, Ok(())),
			Err(e) => return (sink, Err(e)),
		}
	}
}

fn parse_err(src: &[Token]) -> Option<Error> {
	let (_, r) = parse(src);
	r.err()
}

fn name(s: &str) -> Name {
	s.try_into().unwrap()
}

fn cdata(s: &str) -> CData {
	s.try_into().unwrap()
}

fn root_tokens() -> Vec<Token> {
	vec![
		Token::ElementHeadStart(DM, name("root")),
		Token::ElementHFEnd(DM),
		Token::ElementFootStart(DM, name("root")),
		Token::ElementHFEnd(DM),
	]
}

#[test]
fn parser_parse_xml_declaration() {
	let (evs, r) = parse(&[
		Token::XmlDeclStart(TokenMetrics::new(0, 1)),
		Token::Name(TokenMetrics::new(2, 3), name("version")),
		Token::Eq(TokenMetrics::new(3, 4)),
		Token::AttributeValue(TokenMetrics::new(4, 5), cdata("1.0")),
		Token::XmlDeclEnd(TokenMetrics::new(6, 7)),
	]);
	match &evs[0] {
		RawEvent::XmlDeclaration(em, XmlVersion::V1_0, None, None) => {
			assert_eq!(em.len(), 7);
		}
		other => panic!("unexpected event: {:?}", other),
	}
	assert!(matches!(
		r.err().unwrap(),
		Error::NotWellFormed(WFError::InvalidEof(_))
	));
}

#[test]
fn parser_parse_xml_declaration_with_encoding_and_standalone() {
	let mut toks = vec![
		Token::XmlDeclStart(DM),
		Token::Name(DM, name("version")),
		Token::Eq(DM),
		Token::AttributeValue(DM, cdata("1.0")),
		Token::Name(DM, name("encoding")),
		Token::Eq(DM),
		Token::AttributeValue(DM, cdata("UTF-8")),
		Token::Name(DM, name("standalone")),
		Token::Eq(DM),
		Token::AttributeValue(DM, cdata("yes")),
		Token::XmlDeclEnd(DM),
	];
	toks.extend(root_tokens());
	let (evs, r) = parse(&toks);
	r.unwrap();
	match &evs[0] {
		RawEvent::XmlDeclaration(_, XmlVersion::V1_0, Some(enc), Some(true)) => {
			assert_eq!(enc, "UTF-8");
		}
		other => panic!("unexpected event: {:?}", other),
	}
}

#[test]
fn parser_parse_xml_11_declaration() {
	let mut toks = vec![
		Token::XmlDeclStart(DM),
		Token::Name(DM, name("version")),
		Token::Eq(DM),
		Token::AttributeValue(DM, cdata("1.1")),
		Token::XmlDeclEnd(DM),
	];
	toks.extend(root_tokens());
	let (evs, r) = parse(&toks);
	r.unwrap();
	assert!(matches!(
		&evs[0],
		RawEvent::XmlDeclaration(_, XmlVersion::V1_1, None, None)
	));
}

#[test]
fn parser_parse_stepwise() {
	let toks = root_tokens();
	let (evs, r) = parse_custom::<SometimesBlockingTokenSliceReader>(&toks);
	r.unwrap();
	assert!(matches!(
		&evs[0],
		RawEvent::ElementHeadOpen(_, (None, nm)) if nm == "root"
	));
}

#[test]
fn parser_parse_element_with_attributes() {
	let (evs, r) = parse(&[
		Token::ElementHeadStart(DM, name("root")),
		Token::Name(DM, name("a")),
		Token::Eq(DM),
		Token::AttributeValue(DM, cdata("v")),
		Token::Name(DM, name("ns:b")),
		Token::Eq(DM),
		Token::AttributeValue(DM, cdata("w")),
		Token::ElementHeadClose(DM),
	]);
	r.unwrap();
	let mut iter = evs.iter();
	assert!(matches!(
		iter.next().unwrap(),
		RawEvent::ElementHeadOpen(_, (None, nm)) if nm == "root"
	));
	assert!(matches!(
		iter.next().unwrap(),
		RawEvent::Attribute(_, (None, nm), v) if nm == "a" && v == "v"
	));
	match iter.next().unwrap() {
		RawEvent::Attribute(_, (Some(prefix), nm), v) => {
			assert_eq!(prefix, "ns");
			assert_eq!(nm, "b");
			assert_eq!(v, "w");
		}
		other => panic!("unexpected event: {:?}", other),
	}
	assert!(matches!(iter.next().unwrap(), RawEvent::ElementHeadClose(_)));
	assert!(matches!(iter.next().unwrap(), RawEvent::ElementFoot(_)));
}

#[test]
fn parser_rejects_mismatched_end_tag() {
	let err = parse_err(&[
		Token::ElementHeadStart(DM, name("root")),
		Token::ElementHFEnd(DM),
		Token::ElementFootStart(DM, name("wrong")),
		Token::ElementHFEnd(DM),
	])
	.unwrap();
	assert!(matches!(
		err,
		Error::NotWellFormed(WFError::ElementMismatch)
	));
}

#[test]
fn parser_converts_references_to_text() {
	let (evs, r) = parse(&[
		Token::ElementHeadStart(DM, name("root")),
		Token::ElementHFEnd(DM),
		Token::Text(DM, cdata("a")),
		Token::CharRef(DM, '<'),
		Token::PredefEntityRef(DM, name("amp")),
		Token::ElementFootStart(DM, name("root")),
		Token::ElementHFEnd(DM),
	]);
	r.unwrap();
	let texts: Vec<String> = evs
		.iter()
		.filter_map(|ev| match ev {
			RawEvent::Text(_, t) => Some(t.to_string()),
			_ => None,
		})
		.collect();
	assert_eq!(texts.join(""), "a<&");
}

#[test]
fn parser_reports_skipped_entity() {
	let (evs, r) = parse(&[
		Token::ElementHeadStart(DM, name("root")),
		Token::ElementHFEnd(DM),
		Token::GeneralEntityRef(DM, name("unknown")),
		Token::ElementFootStart(DM, name("root")),
		Token::ElementHFEnd(DM),
	]);
	r.unwrap();
	assert!(evs
		.iter()
		.any(|ev| matches!(ev, RawEvent::SkippedEntity(_, nm) if nm == "unknown")));
}

#[test]
fn parser_passes_cdata_delimiters() {
	let (evs, r) = parse(&[
		Token::ElementHeadStart(DM, name("root")),
		Token::ElementHFEnd(DM),
		Token::CDataStart(DM),
		Token::Text(DM, cdata("raw")),
		Token::CDataEnd(DM),
		Token::ElementFootStart(DM, name("root")),
		Token::ElementHFEnd(DM),
	]);
	r.unwrap();
	let mut iter = evs.iter().skip(2);
	assert!(matches!(iter.next().unwrap(), RawEvent::CDataStart(_)));
	assert!(matches!(iter.next().unwrap(), RawEvent::Text(_, t) if t == "raw"));
	assert!(matches!(iter.next().unwrap(), RawEvent::CDataEnd(_)));
}

#[test]
fn parser_rejects_text_in_prolog() {
	let err = parse_err(&[Token::Text(DM, cdata("stray"))]).unwrap();
	assert!(matches!(
		err,
		Error::NotWellFormed(WFError::UnexpectedToken(..))
	));
}

#[test]
fn parser_accepts_whitespace_in_prolog_and_epilog() {
	let (evs, r) = parse(&[
		Token::Text(DM, cdata("\n\t ")),
		Token::ElementHeadStart(DM, name("root")),
		Token::ElementHFEnd(DM),
		Token::ElementFootStart(DM, name("root")),
		Token::ElementHFEnd(DM),
		Token::Text(DM, cdata(" \n")),
	]);
	r.unwrap();
	assert!(!evs.iter().any(|ev| matches!(ev, RawEvent::Text(..))));
}

#[test]
fn parser_rejects_content_after_root() {
	let err = parse_err(&[
		Token::ElementHeadStart(DM, name("root")),
		Token::ElementHFEnd(DM),
		Token::ElementFootStart(DM, name("root")),
		Token::ElementHFEnd(DM),
		Token::ElementHeadStart(DM, name("second")),
	])
	.unwrap();
	assert!(matches!(
		err,
		Error::NotWellFormed(WFError::UnexpectedToken(ERRCTX_DOCEND, ..))
	));
}

#[test]
fn parser_emits_doctype_events() {
	let mut toks = vec![
		Token::DoctypeName(DM, name("root")),
		Token::DoctypeSystemId(DM, cdata("root.dtd")),
		Token::DoctypeIntSubsetStart(DM),
		Token::EntityDecl(
			DM,
			EntityDecl::Internal {
				name: name("e"),
				parameter: false,
				value: crate::context::RcPtr::new(crate::lexer::entities::EntityValue {
					parts: vec![crate::lexer::entities::EntityPart::Text("x".to_string())],
				}),
			},
		),
		Token::DoctypeIntSubsetEnd(DM),
		Token::DoctypeEnd(DM),
	];
	toks.extend(root_tokens());
	let (evs, r) = parse(&toks);
	r.unwrap();
	let mut iter = evs.iter();
	match iter.next().unwrap() {
		RawEvent::DoctypeStart(_, nm, public, system) => {
			assert_eq!(nm, "root");
			assert!(public.is_none());
			assert_eq!(system.as_ref().unwrap(), "root.dtd");
		}
		other => panic!("unexpected event: {:?}", other),
	}
	assert!(matches!(iter.next().unwrap(), RawEvent::EntityDecl(..)));
	assert!(matches!(iter.next().unwrap(), RawEvent::DoctypeEnd(_)));
}

#[test]
fn parser_resolves_dtd_uris_against_base() {
	let opts = ParserOptions {
		base_uri: Some("http://example.com/docs/doc.xml".to_string()),
		..ParserOptions::default()
	};
	let mut toks = vec![
		Token::DoctypeName(DM, name("root")),
		Token::DoctypeSystemId(DM, cdata("dtd/root.dtd")),
		Token::DoctypeIntSubsetStart(DM),
		Token::EntityDecl(
			DM,
			EntityDecl::ExternalParsed {
				name: name("e"),
				parameter: false,
				id: crate::lexer::entities::ExternalId {
					public_id: None,
					system_id: cdata("chunk.xml"),
				},
			},
		),
		Token::DoctypeIntSubsetEnd(DM),
		Token::DoctypeEnd(DM),
	];
	toks.extend(root_tokens());
	let (evs, r) = parse_with(&toks, opts);
	r.unwrap();
	match &evs[0] {
		RawEvent::DoctypeStart(_, _, _, system) => {
			assert_eq!(
				system.as_ref().unwrap(),
				"http://example.com/docs/dtd/root.dtd"
			);
		}
		other => panic!("unexpected event: {:?}", other),
	}
	match &evs[1] {
		RawEvent::EntityDecl(_, EntityDecl::ExternalParsed { id, .. }) => {
			assert_eq!(id.system_id, "http://example.com/docs/chunk.xml");
		}
		other => panic!("unexpected event: {:?}", other),
	}
}

#[test]
fn parser_leaves_absolute_dtd_uris_alone() {
	let opts = ParserOptions {
		base_uri: Some("http://example.com/docs/doc.xml".to_string()),
		..ParserOptions::default()
	};
	let mut toks = vec![
		Token::DoctypeName(DM, name("root")),
		Token::DoctypeSystemId(DM, cdata("https://other.example/x.dtd")),
		Token::DoctypeEnd(DM),
	];
	toks.extend(root_tokens());
	let (evs, r) = parse_with(&toks, opts);
	r.unwrap();
	assert!(matches!(
		&evs[0],
		RawEvent::DoctypeStart(_, _, _, Some(s)) if s == "https://other.example/x.dtd"
	));
}

#[test]
fn parser_passes_entity_boundaries_through() {
	let (evs, r) = parse(&[
		Token::ElementHeadStart(DM, name("root")),
		Token::ElementHFEnd(DM),
		Token::EntityStart(DM, name("e")),
		Token::Text(DM, cdata("inner")),
		Token::EntityEnd(DM),
		Token::ElementFootStart(DM, name("root")),
		Token::ElementHFEnd(DM),
	]);
	r.unwrap();
	assert!(evs
		.iter()
		.any(|ev| matches!(ev, RawEvent::EntityStart(_, n) if n == "e")));
	assert!(evs.iter().any(|ev| matches!(ev, RawEvent::EntityEnd(_))));
}

#[test]
fn parser_rejects_second_doctype() {
	let err = parse_err(&[
		Token::DoctypeName(DM, name("a")),
		Token::DoctypeEnd(DM),
		Token::DoctypeName(DM, name("b")),
	])
	.unwrap();
	assert!(matches!(
		err,
		Error::NotWellFormed(WFError::UnexpectedToken(..))
	));
}

#[test]
fn parser_applies_tokenized_attribute_normalization() {
	let mut toks = vec![
		Token::DoctypeName(DM, name("root")),
		Token::DoctypeIntSubsetStart(DM),
		Token::AttlistDecl(
			DM,
			AttlistDecl {
				element: name("root"),
				defs: vec![crate::lexer::dtd::AttDef {
					name: name("ids"),
					ty: AttType::IdRefs,
					default: crate::lexer::dtd::AttDefault::Implied,
				}],
			},
		),
		Token::DoctypeIntSubsetEnd(DM),
		Token::DoctypeEnd(DM),
		Token::ElementHeadStart(DM, name("root")),
		Token::Name(DM, name("ids")),
		Token::Eq(DM),
		Token::AttributeValue(DM, cdata("  a   b  ")),
		Token::Name(DM, name("plain")),
		Token::Eq(DM),
		Token::AttributeValue(DM, cdata("  a   b  ")),
		Token::ElementHeadClose(DM),
	];
	let (evs, r) = parse(&toks);
	r.unwrap();
	let values: Vec<(String, String)> = evs
		.iter()
		.filter_map(|ev| match ev {
			RawEvent::Attribute(_, (_, nm), v) => Some((nm.to_string(), v.to_string())),
			_ => None,
		})
		.collect();
	assert_eq!(values[0], ("ids".to_string(), "a b".to_string()));
	assert_eq!(values[1], ("plain".to_string(), "  a   b  ".to_string()));
}

#[test]
fn parser_classifies_ignorable_whitespace() {
	let toks = vec![
		Token::DoctypeName(DM, name("root")),
		Token::DoctypeIntSubsetStart(DM),
		Token::ElementDecl(DM, name("root"), cdata("(child)")),
		Token::DoctypeIntSubsetEnd(DM),
		Token::DoctypeEnd(DM),
		Token::ElementHeadStart(DM, name("root")),
		Token::ElementHFEnd(DM),
		Token::Text(DM, cdata("\n  ")),
		Token::ElementHeadStart(DM, name("child")),
		Token::ElementHFEnd(DM),
		Token::Text(DM, cdata("data")),
		Token::ElementFootStart(DM, name("child")),
		Token::ElementHFEnd(DM),
		Token::Text(DM, cdata("\n")),
		Token::ElementFootStart(DM, name("root")),
		Token::ElementHFEnd(DM),
	];
	let (evs, r) = parse(&toks);
	r.unwrap();
	let ignorable: Vec<String> = evs
		.iter()
		.filter_map(|ev| match ev {
			RawEvent::IgnorableWhitespace(_, t) => Some(t.to_string()),
			_ => None,
		})
		.collect();
	assert_eq!(ignorable, vec!["\n  ".to_string(), "\n".to_string()]);
	assert!(evs
		.iter()
		.any(|ev| matches!(ev, RawEvent::Text(_, t) if t == "data")));
}

#[test]
fn parser_reports_comments_and_pis_in_content() {
	let (evs, r) = parse(&[
		Token::ElementHeadStart(DM, name("root")),
		Token::ElementHFEnd(DM),
		Token::Comment(DM, cdata("note")),
		Token::PITarget(DM, name("proc")),
		Token::PIData(DM, cdata("inst")),
		Token::ElementFootStart(DM, name("root")),
		Token::ElementHFEnd(DM),
	]);
	r.unwrap();
	assert!(evs
		.iter()
		.any(|ev| matches!(ev, RawEvent::Comment(_, c) if c == "note")));
	assert!(evs.iter().any(
		|ev| matches!(ev, RawEvent::ProcessingInstruction(_, t, d) if t == "proc" && d == "inst")
	));
}
