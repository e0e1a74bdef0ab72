use super::*;
use crate::bufq::BufferQueue;
use crate::error::Error as CrateError;
use std::io;

/// Stream tokens to the sink until the end of stream is reached.
fn stream_to_sink<'r, 's, 'l, R: io::BufRead>(
	l: &'l mut Lexer,
	r: &'r mut R,
	s: &'s mut Vec<Token>,
) -> CrateResult<()> {
	loop {
		match l.lex(r) {
			Ok(Some(tok)) => s.push(tok),
			Ok(None) => break,
			Err(e) => return Err(e),
		}
	}
	Ok(())
}

fn lex(data: &[u8]) -> (Vec<Token>, CrateResult<()>) {
	let mut buff = io::BufReader::new(data);
	let mut lexer = Lexer::new();
	let mut sink = Vec::new();
	let result = stream_to_sink(&mut lexer, &mut buff, &mut sink);
	(sink, result)
}

fn lex_chunked(data: &[&[u8]]) -> (Vec<Token>, CrateResult<()>) {
	let mut buff = BufferQueue::new();
	let mut lexer = Lexer::new();
	let mut sink = Vec::new();
	for chunk in data.iter() {
		buff.push(chunk.to_vec());
		match stream_to_sink(&mut lexer, &mut buff, &mut sink) {
			Ok(()) => panic!("unexpected end of tokens"),
			Err(CrateError::IO(ioerr)) if ioerr.kind() == io::ErrorKind::WouldBlock => (),
			Err(e) => return (sink, Err(e)),
		}
	}
	buff.push_eof();
	let result = stream_to_sink(&mut lexer, &mut buff, &mut sink);
	(sink, result)
}

fn lex_err(data: &[u8]) -> Option<CrateError> {
	let (_, r) = lex(data);
	r.err()
}

fn collect_texts<'x, T: Iterator<Item = &'x Token>>(iter: &'x mut T) -> (String, Option<&'x Token>) {
	let mut texts: Vec<String> = Vec::new();
	let mut token: Option<&'x Token> = None;
	for tok in iter {
		match tok {
			Token::Text(_, t) => texts.push(t.to_string()),
			// expansion boundaries interleave with text without
			// splitting the logical run
			Token::EntityStart(..) | Token::EntityEnd(_) => (),
			other => {
				token = Some(other);
				break;
			}
		}
	}
	(texts.join(""), token)
}

#[test]
fn lexer_lex_xml_decl_start() {
	let (toks, _) = lex(b"<?xml version='1.0'?><r/>");
	assert_eq!(toks[0], Token::XmlDeclStart(TokenMetrics::new(0, 5)));
}

#[test]
fn lexer_lex_xml_decl_complete() {
	let (toks, r) = lex(b"<?xml version=\"1.0\" encoding='utf-8'?><r/>");
	r.unwrap();
	assert_eq!(toks[0], Token::XmlDeclStart(TokenMetrics::new(0, 5)));
	assert_eq!(
		toks[1],
		Token::Name(TokenMetrics::new(6, 13), "version".try_into().unwrap())
	);
	assert_eq!(toks[2], Token::Eq(TokenMetrics::new(13, 14)));
	assert_eq!(
		toks[3],
		Token::AttributeValue(TokenMetrics::new(14, 19), "1.0".try_into().unwrap())
	);
	assert_eq!(
		toks[4],
		Token::Name(TokenMetrics::new(20, 28), "encoding".try_into().unwrap())
	);
	assert_eq!(toks[5], Token::Eq(TokenMetrics::new(28, 29)));
	assert_eq!(
		toks[6],
		Token::AttributeValue(TokenMetrics::new(29, 36), "utf-8".try_into().unwrap())
	);
	assert_eq!(toks[7], Token::XmlDeclEnd(TokenMetrics::new(36, 38)));
}

#[test]
fn lexer_lex_xml_decl_without_version_is_rejected() {
	assert!(lex_err(b"<?xml?><r/>").is_some());
}

#[test]
fn lexer_lex_element_noattr_empty() {
	let (toks, r) = lex(b"<element/>");
	r.unwrap();
	assert_eq!(
		toks[0],
		Token::ElementHeadStart(TokenMetrics::new(0, 8), "element".try_into().unwrap())
	);
	assert_eq!(toks[1], Token::ElementHeadClose(TokenMetrics::new(8, 10)));
}

#[test]
fn lexer_lex_element_noattr_empty_explicit() {
	let (toks, r) = lex(b"<element></element>");
	r.unwrap();
	assert_eq!(
		toks[0],
		Token::ElementHeadStart(TokenMetrics::new(0, 8), "element".try_into().unwrap())
	);
	assert_eq!(toks[1], Token::ElementHFEnd(TokenMetrics::new(8, 9)));
	assert_eq!(
		toks[2],
		Token::ElementFootStart(TokenMetrics::new(9, 18), "element".try_into().unwrap())
	);
	assert_eq!(toks[3], Token::ElementHFEnd(TokenMetrics::new(18, 19)));
}

#[test]
fn lexer_lex_element_attributes() {
	let (toks, r) = lex(b"<element x='foo' y=\"bar\" xmlns:abc='fnord'>");
	r.unwrap();
	let mut iter = toks.iter();
	assert!(matches!(iter.next().unwrap(), Token::ElementHeadStart(_, nm) if nm == "element"));
	assert!(matches!(iter.next().unwrap(), Token::Name(_, nm) if nm == "x"));
	assert!(matches!(iter.next().unwrap(), Token::Eq(_)));
	assert!(matches!(iter.next().unwrap(), Token::AttributeValue(_, v) if v == "foo"));
	assert!(matches!(iter.next().unwrap(), Token::Name(_, nm) if nm == "y"));
	assert!(matches!(iter.next().unwrap(), Token::Eq(_)));
	assert!(matches!(iter.next().unwrap(), Token::AttributeValue(_, v) if v == "bar"));
	assert!(matches!(iter.next().unwrap(), Token::Name(_, nm) if nm == "xmlns:abc"));
	assert!(matches!(iter.next().unwrap(), Token::Eq(_)));
	assert!(matches!(iter.next().unwrap(), Token::AttributeValue(_, v) if v == "fnord"));
	assert!(matches!(iter.next().unwrap(), Token::ElementHFEnd(_)));
}

#[test]
fn lexer_lex_attribute_value_normalizes_whitespace() {
	let (toks, r) = lex(b"<e a='x\ty\nz\r\nw'/>");
	r.unwrap();
	assert!(toks
		.iter()
		.any(|t| matches!(t, Token::AttributeValue(_, v) if v == "x y z w")));
}

#[test]
fn lexer_lex_attribute_value_rejects_lt() {
	let err = lex_err(b"<e a='<'/>").unwrap();
	assert!(matches!(
		err,
		CrateError::NotWellFormed(WFError::UnescapedLtInAttribute)
	));
}

#[test]
fn lexer_lex_text() {
	let (toks, r) = lex(b"<root>Hello World!</root>");
	r.unwrap();
	assert_eq!(
		toks[2],
		Token::Text(TokenMetrics::new(6, 18), "Hello World!".try_into().unwrap())
	);
}

#[test]
fn lexer_lex_text_folds_crlf() {
	let (toks, r) = lex(b"<root>a\r\nb\rc</root>");
	r.unwrap();
	let mut iter = toks.iter().skip(2);
	let (text, _) = collect_texts(&mut iter);
	assert_eq!(text, "a\nb\nc");
}

#[test]
fn lexer_lex_predefined_entity_in_text() {
	let (toks, r) = lex(b"<root>&amp;</root>");
	r.unwrap();
	assert!(matches!(&toks[2], Token::PredefEntityRef(_, nm) if nm == "amp"));
}

#[test]
fn lexer_lex_decimal_charref() {
	let (toks, r) = lex(b"<root>&#60;</root>");
	r.unwrap();
	assert!(matches!(&toks[2], Token::CharRef(_, '<')));
}

#[test]
fn lexer_lex_hexadecimal_charref() {
	let (toks, r) = lex(b"<root>&#x3e;</root>");
	r.unwrap();
	assert!(matches!(&toks[2], Token::CharRef(_, '>')));
}

#[test]
fn lexer_lex_rejects_invalid_charref() {
	assert!(lex_err(b"<root>&#x00;</root>").is_some());
}

#[test]
fn lexer_lex_attribute_references_are_expanded_inline() {
	let (toks, r) = lex(b"<e a='&amp;&#x41;'/>");
	r.unwrap();
	assert!(toks
		.iter()
		.any(|t| matches!(t, Token::AttributeValue(_, v) if v == "&A")));
}

#[test]
fn lexer_lex_cdata_section() {
	let (toks, r) = lex(b"<root><![CDATA[<example foo=\"bar\"/>]]></root>");
	r.unwrap();
	let mut iter = toks.iter();
	iter.next().unwrap(); // head start
	iter.next().unwrap(); // >
	assert!(matches!(iter.next().unwrap(), Token::CDataStart(_)));
	assert!(matches!(iter.next().unwrap(), Token::Text(_, t) if t == "<example foo=\"bar\"/>"));
	assert!(matches!(iter.next().unwrap(), Token::CDataEnd(_)));
	assert!(matches!(iter.next().unwrap(), Token::ElementFootStart(_, nm) if nm == "root"));
}

#[test]
fn lexer_lex_cdata_section_with_embedded_brackets() {
	let (toks, r) = lex(b"<root><![CDATA[a]]b]]]></root>");
	r.unwrap();
	let mut iter = toks.iter().skip(3);
	let (text, tok) = collect_texts(&mut iter);
	assert_eq!(text, "a]]b]");
	assert!(matches!(tok.unwrap(), Token::CDataEnd(_)));
}

#[test]
fn lexer_lex_rejects_cdata_end_in_text() {
	let err = lex_err(b"<root>foo]]>bar</root>").unwrap();
	assert!(matches!(
		err,
		CrateError::NotWellFormed(WFError::CDataEndInContent)
	));
}

#[test]
fn lexer_lex_comment() {
	let (toks, r) = lex(b"<root><!-- a - comment --></root>");
	r.unwrap();
	assert!(matches!(&toks[2], Token::Comment(_, c) if c == " a - comment "));
}

#[test]
fn lexer_lex_comment_in_prolog() {
	let (toks, r) = lex(b"<!--hi--><root/>");
	r.unwrap();
	assert!(matches!(&toks[0], Token::Comment(_, c) if c == "hi"));
	assert!(matches!(&toks[1], Token::ElementHeadStart(_, nm) if nm == "root"));
}

#[test]
fn lexer_lex_rejects_double_hyphen_in_comment() {
	let err = lex_err(b"<!-- a -- b --><root/>").unwrap();
	assert!(matches!(
		err,
		CrateError::NotWellFormed(WFError::DoubleHyphenInComment)
	));
}

#[test]
fn lexer_lex_pi() {
	let (toks, r) = lex(b"<?stylesheet href='x'?><root/>");
	r.unwrap();
	assert!(matches!(&toks[0], Token::PITarget(_, t) if t == "stylesheet"));
	assert!(matches!(&toks[1], Token::PIData(_, d) if d == "href='x'"));
}

#[test]
fn lexer_lex_pi_without_data() {
	let (toks, r) = lex(b"<root><?break?></root>");
	r.unwrap();
	assert!(matches!(&toks[2], Token::PITarget(_, t) if t == "break"));
	assert!(matches!(&toks[3], Token::PIData(_, d) if d == ""));
}

#[test]
fn lexer_lex_pi_with_question_marks_in_data() {
	let (toks, r) = lex(b"<root><?p a?b??></root>");
	r.unwrap();
	assert!(matches!(&toks[3], Token::PIData(_, d) if d == "a?b?"));
}

#[test]
fn lexer_lex_rejects_reserved_pi_target() {
	let err = lex_err(b"<root><?xml version='1.0'?></root>").unwrap();
	assert!(matches!(
		err,
		CrateError::NotWellFormed(WFError::ReservedPITarget)
	));
}

#[test]
fn lexer_lex_doctype_with_system_id() {
	let (toks, r) = lex(b"<!DOCTYPE html SYSTEM \"http://example.com/x.dtd\"><html/>");
	r.unwrap();
	assert!(matches!(&toks[0], Token::DoctypeName(_, nm) if nm == "html"));
	assert!(
		matches!(&toks[1], Token::DoctypeSystemId(_, s) if s == "http://example.com/x.dtd")
	);
	assert!(matches!(&toks[2], Token::DoctypeEnd(_)));
}

#[test]
fn lexer_lex_doctype_with_public_id() {
	let (toks, r) = lex(
		b"<!DOCTYPE html PUBLIC \"-//W3C//DTD XHTML 1.0//EN\" 'http://x/y.dtd'><html/>",
	);
	r.unwrap();
	assert!(matches!(&toks[1], Token::DoctypePublicId(_, p) if p == "-//W3C//DTD XHTML 1.0//EN"));
	assert!(matches!(&toks[2], Token::DoctypeSystemId(_, s) if s == "http://x/y.dtd"));
}

#[test]
fn lexer_lex_doctype_internal_subset_entity_decl() {
	let (toks, r) = lex(b"<!DOCTYPE r [<!ENTITY e \"text\">]><r/>");
	r.unwrap();
	let mut iter = toks.iter();
	assert!(matches!(iter.next().unwrap(), Token::DoctypeName(_, nm) if nm == "r"));
	assert!(matches!(iter.next().unwrap(), Token::DoctypeIntSubsetStart(_)));
	match iter.next().unwrap() {
		Token::EntityDecl(_, EntityDecl::Internal { name, value, .. }) => {
			assert_eq!(name, "e");
			assert_eq!(value.parts, vec![EntityPart::Text("text".to_string())]);
		}
		other => panic!("unexpected token: {:?}", other),
	}
	assert!(matches!(iter.next().unwrap(), Token::DoctypeIntSubsetEnd(_)));
	assert!(matches!(iter.next().unwrap(), Token::DoctypeEnd(_)));
}

#[test]
fn lexer_lex_entity_decl_with_charref_resolved_at_declaration() {
	let (toks, r) = lex(b"<!DOCTYPE r [<!ENTITY e \"a&#65;b\">]><r/>");
	r.unwrap();
	let decl = toks
		.iter()
		.find_map(|t| match t {
			Token::EntityDecl(_, d) => Some(d.clone()),
			_ => None,
		})
		.unwrap();
	match decl {
		EntityDecl::Internal { value, .. } => {
			assert_eq!(value.parts, vec![EntityPart::Text("aAb".to_string())]);
		}
		other => panic!("unexpected decl: {:?}", other),
	}
}

#[test]
fn lexer_lex_entity_decl_keeps_general_refs_as_parts() {
	let (toks, r) = lex(b"<!DOCTYPE r [<!ENTITY o \"x &i; y\">]><r/>");
	r.unwrap();
	let decl = toks
		.iter()
		.find_map(|t| match t {
			Token::EntityDecl(_, d) => Some(d.clone()),
			_ => None,
		})
		.unwrap();
	match decl {
		EntityDecl::Internal { value, .. } => {
			assert_eq!(
				value.parts,
				vec![
					EntityPart::Text("x ".to_string()),
					EntityPart::Ref("i".try_into().unwrap()),
					EntityPart::Text(" y".to_string()),
				]
			);
		}
		other => panic!("unexpected decl: {:?}", other),
	}
}

#[test]
fn lexer_lex_unparsed_entity_decl() {
	let (toks, r) =
		lex(b"<!DOCTYPE r [<!NOTATION gif SYSTEM 'g'><!ENTITY pic SYSTEM \"p.gif\" NDATA gif>]><r/>");
	r.unwrap();
	let decl = toks
		.iter()
		.find_map(|t| match t {
			Token::EntityDecl(_, d) => Some(d.clone()),
			_ => None,
		})
		.unwrap();
	match decl {
		EntityDecl::ExternalUnparsed { name, id, notation } => {
			assert_eq!(name, "pic");
			assert_eq!(id.system_id, "p.gif");
			assert_eq!(notation, "gif");
		}
		other => panic!("unexpected decl: {:?}", other),
	}
}

#[test]
fn lexer_lex_element_and_attlist_decls() {
	let (toks, r) = lex(
		b"<!DOCTYPE r [<!ELEMENT r (a, b?)><!ATTLIST r id ID #REQUIRED lang CDATA 'en'>]><r/>",
	);
	r.unwrap();
	assert!(toks
		.iter()
		.any(|t| matches!(t, Token::ElementDecl(_, nm, raw) if nm == "r" && raw == "(a, b?)")));
	let attlist = toks
		.iter()
		.find_map(|t| match t {
			Token::AttlistDecl(_, d) => Some(d.clone()),
			_ => None,
		})
		.unwrap();
	assert_eq!(attlist.element, "r");
	assert_eq!(attlist.defs.len(), 2);
	assert_eq!(attlist.defs[0].name, "id");
	assert_eq!(attlist.defs[0].ty, AttType::Id);
	assert_eq!(attlist.defs[0].default, AttDefault::Required);
	assert_eq!(attlist.defs[1].name, "lang");
	assert_eq!(attlist.defs[1].ty, AttType::Cdata);
	assert_eq!(
		attlist.defs[1].default,
		AttDefault::Value("en".try_into().unwrap())
	);
}

#[test]
fn lexer_lex_attlist_enumeration() {
	let (toks, r) = lex(b"<!DOCTYPE r [<!ATTLIST r c (red | green | blue) 'red'>]><r/>");
	r.unwrap();
	let attlist = toks
		.iter()
		.find_map(|t| match t {
			Token::AttlistDecl(_, d) => Some(d.clone()),
			_ => None,
		})
		.unwrap();
	match &attlist.defs[0].ty {
		AttType::Enumeration(toks) => {
			assert_eq!(toks.len(), 3);
			assert_eq!(toks[0], "red");
			assert_eq!(toks[2], "blue");
		}
		other => panic!("unexpected type: {:?}", other),
	}
}

#[test]
fn lexer_expands_entity_in_content() {
	let (toks, r) = lex(b"<!DOCTYPE r [<!ENTITY e \"REPL\">]><r>x&e;y</r>");
	r.unwrap();
	let mut iter = toks.iter().skip_while(|t| !matches!(t, Token::ElementHFEnd(_)));
	iter.next().unwrap();
	let (text, tok) = collect_texts(&mut iter);
	assert_eq!(text, "xREPLy");
	assert!(matches!(tok.unwrap(), Token::ElementFootStart(_, nm) if nm == "r"));
}

#[test]
fn lexer_brackets_content_expansions_with_boundary_tokens() {
	let (toks, r) = lex(b"<!DOCTYPE r [<!ENTITY e \"REPL\">]><r>x&e;y</r>");
	r.unwrap();
	let interesting: Vec<&Token> = toks
		.iter()
		.skip_while(|t| !matches!(t, Token::ElementHFEnd(_)))
		.skip(1)
		.take_while(|t| !matches!(t, Token::ElementFootStart(..)))
		.collect();
	assert!(matches!(interesting[0], Token::Text(_, t) if t == "x"));
	assert!(matches!(interesting[1], Token::EntityStart(_, n) if n == "e"));
	assert!(matches!(interesting[2], Token::Text(_, t) if t == "REPL"));
	assert!(matches!(interesting[3], Token::EntityEnd(_)));
	assert!(matches!(interesting[4], Token::Text(_, t) if t == "y"));
	assert_eq!(interesting.len(), 5);
}

#[test]
fn lexer_attribute_expansions_emit_no_boundary_tokens() {
	let (toks, r) = lex(b"<!DOCTYPE r [<!ENTITY e \"val\">]><r a='x&e;y'/>");
	r.unwrap();
	assert!(!toks
		.iter()
		.any(|t| matches!(t, Token::EntityStart(..) | Token::EntityEnd(_))));
}

#[test]
fn lexer_expands_nested_entities_in_content() {
	let (toks, r) = lex(
		b"<!DOCTYPE r [<!ENTITY inner \"INNER\"><!ENTITY outer \"before &inner; after\">]><r>&outer;</r>",
	);
	r.unwrap();
	let mut iter = toks.iter().skip_while(|t| !matches!(t, Token::ElementHFEnd(_)));
	iter.next().unwrap();
	let (text, _) = collect_texts(&mut iter);
	assert_eq!(text, "before INNER after");
}

#[test]
fn lexer_expands_entity_with_markup() {
	let (toks, r) = lex(b"<!DOCTYPE r [<!ENTITY e \"<b>bold</b>\">]><r>&e;</r>");
	r.unwrap();
	assert!(toks
		.iter()
		.any(|t| matches!(t, Token::ElementHeadStart(_, nm) if nm == "b")));
	assert!(toks.iter().any(|t| matches!(t, Token::Text(_, x) if x == "bold")));
}

#[test]
fn lexer_rejects_element_spanning_entity_boundary() {
	let err = lex_err(b"<!DOCTYPE r [<!ENTITY e \"<b>\">]><r>&e;</b></r>").unwrap();
	assert!(matches!(
		err,
		CrateError::NotWellFormed(WFError::EntityNestingMismatch)
	));
}

#[test]
fn lexer_expands_entity_in_attribute_value() {
	let (toks, r) = lex(b"<!DOCTYPE r [<!ENTITY e \"val\">]><r a='x&e;y'/>");
	r.unwrap();
	assert!(toks
		.iter()
		.any(|t| matches!(t, Token::AttributeValue(_, v) if v == "xvaly")));
}

#[test]
fn lexer_attribute_entity_expansion_does_not_end_at_quote() {
	// a quote inside replacement text is data, not a delimiter
	let (toks, r) = lex(b"<!DOCTYPE r [<!ENTITY q \"'\">]><r a='x&q;y'/>");
	r.unwrap();
	assert!(toks
		.iter()
		.any(|t| matches!(t, Token::AttributeValue(_, v) if v == "x'y")));
}

#[test]
fn lexer_rejects_entity_cycle() {
	let err = lex_err(
		b"<!DOCTYPE r [<!ENTITY a \"&b;\"><!ENTITY b \"&a;\">]><r>&a;</r>",
	)
	.unwrap();
	assert!(matches!(err, CrateError::Entity(EntityError::Cycle(_))));
}

#[test]
fn lexer_rejects_direct_entity_cycle_in_attribute() {
	let err = lex_err(b"<!DOCTYPE r [<!ENTITY a \"&a;\">]><r x='&a;'/>").unwrap();
	assert!(matches!(err, CrateError::Entity(EntityError::Cycle(_))));
}

#[test]
fn lexer_rejects_undeclared_entity_without_dtd() {
	let err = lex_err(b"<r>&nope;</r>").unwrap();
	assert!(matches!(err, CrateError::Entity(EntityError::Undeclared(_))));
}

#[test]
fn lexer_reports_unexpanded_ref_when_table_incomplete() {
	let (toks, r) = lex(b"<!DOCTYPE r SYSTEM 'ext.dtd'><r>&maybe;</r>");
	r.unwrap();
	assert!(toks
		.iter()
		.any(|t| matches!(t, Token::GeneralEntityRef(_, nm) if nm == "maybe")));
}

#[test]
fn lexer_rejects_external_entity_in_attribute() {
	let err =
		lex_err(b"<!DOCTYPE r [<!ENTITY x SYSTEM 'x.txt'>]><r a='&x;'/>").unwrap();
	assert!(matches!(
		err,
		CrateError::Entity(EntityError::ExternalForbidden(_))
	));
}

#[test]
fn lexer_reports_external_entity_in_content() {
	let (toks, r) = lex(b"<!DOCTYPE r [<!ENTITY x SYSTEM 'x.txt'>]><r>&x;</r>");
	r.unwrap();
	assert!(toks
		.iter()
		.any(|t| matches!(t, Token::GeneralEntityRef(_, nm) if nm == "x")));
}

#[test]
fn lexer_rejects_unparsed_entity_reference_in_content() {
	let err = lex_err(
		b"<!DOCTYPE r [<!NOTATION n SYSTEM 'x'><!ENTITY u SYSTEM 'y' NDATA n>]><r>&u;</r>",
	)
	.unwrap();
	assert!(matches!(
		err,
		CrateError::Entity(EntityError::UnparsedReference(_))
	));
}

#[test]
fn lexer_enforces_expansion_depth_limit() {
	let mut doc = Vec::new();
	doc.extend_from_slice(b"<!DOCTYPE r [");
	doc.extend_from_slice(b"<!ENTITY e0 \"x\">");
	for i in 1..30 {
		doc.extend_from_slice(
			format!("<!ENTITY e{} \"&e{};\">", i, i - 1).as_bytes(),
		);
	}
	doc.extend_from_slice(b"]><r>&e29;</r>");
	let err = lex_err(&doc).unwrap();
	assert!(matches!(
		err,
		CrateError::Entity(EntityError::DepthLimitExceeded)
	));
}

#[test]
fn lexer_enforces_expansion_size_limit() {
	// classic amplification: each level multiplies by 10
	let mut doc = Vec::new();
	doc.extend_from_slice(b"<!DOCTYPE r [");
	doc.extend_from_slice(b"<!ENTITY a \"aaaaaaaaaa\">");
	for (prev, cur) in [("a", "b"), ("b", "c"), ("c", "d"), ("d", "e"), ("e", "f"), ("f", "g")] {
		let refs = format!("&{};", prev).repeat(10);
		doc.extend_from_slice(format!("<!ENTITY {} \"{}\">", cur, refs).as_bytes());
	}
	doc.extend_from_slice(b"]><r>&g;</r>");
	let err = lex_err(&doc).unwrap();
	assert!(matches!(
		err,
		CrateError::Entity(EntityError::ExpansionLimitExceeded)
	));
}

#[test]
fn lexer_parameter_entity_expansion_in_subset() {
	let (toks, r) = lex(
		b"<!DOCTYPE r [<!ENTITY % decls '<!ENTITY e \"text\">'>%decls;]><r>&e;</r>",
	);
	r.unwrap();
	// the declaration spliced in by the parameter entity must be effective
	let mut iter = toks.iter().skip_while(|t| !matches!(t, Token::ElementHFEnd(_)));
	iter.next().unwrap();
	let (text, _) = collect_texts(&mut iter);
	assert_eq!(text, "text");
}

#[test]
fn lexer_rejects_pe_ref_in_internal_subset_declaration() {
	let err = lex_err(
		b"<!DOCTYPE r [<!ENTITY % p 'x'><!ENTITY e \"%p;\">]><r/>",
	)
	.unwrap();
	assert!(matches!(
		err,
		CrateError::NotWellFormed(WFError::InvalidSyntax(_))
	));
}

#[test]
fn lexer_xml_1_1_charref_accepted() {
	let (toks, r) = lex(b"<?xml version='1.1'?><r>&#x1;</r>");
	r.unwrap();
	assert!(toks.iter().any(|t| matches!(t, Token::CharRef(_, '\x01'))));
}

#[test]
fn lexer_xml_1_0_rejects_c0_charref() {
	assert!(lex_err(b"<?xml version='1.0'?><r>&#x1;</r>").is_some());
}

#[test]
fn lexer_chunked_input_produces_identical_tokens() {
	let doc: &[u8] =
		b"<?xml version='1.0'?><!DOCTYPE r [<!ENTITY e 'x'>]><r a='1'>t&e;<c><![CDATA[d]]></c></r>";
	let (oneshot, r1) = lex(doc);
	r1.unwrap();
	// single-byte chunks
	let chunks: Vec<&[u8]> = doc.chunks(1).collect();
	let (chunked, r2) = lex_chunked(&chunks);
	r2.unwrap();
	assert_eq!(oneshot, chunked);
	// odd-sized chunks
	let chunks: Vec<&[u8]> = doc.chunks(7).collect();
	let (chunked, r3) = lex_chunked(&chunks);
	r3.unwrap();
	assert_eq!(oneshot, chunked);
}

#[test]
fn lexer_poisons_after_error() {
	let mut buff = io::BufReader::new(&b"<root><root"[..]);
	let mut lexer = Lexer::new();
	let mut sink = Vec::new();
	let e1 = stream_to_sink(&mut lexer, &mut buff, &mut sink)
		.err()
		.unwrap();
	let mut buff2 = io::BufReader::new(&b"<good/>"[..]);
	let e2 = stream_to_sink(&mut lexer, &mut buff2, &mut sink)
		.err()
		.unwrap();
	assert_eq!(e1, e2);
}

#[test]
fn lexer_whitespace_only_after_root_is_accepted() {
	let (toks, r) = lex(b"<r/>\n\t ");
	r.unwrap();
	// trailing whitespace shows up as text; the parser rejects anything
	// beyond whitespace there
	for tok in toks.iter() {
		if let Token::Text(_, t) = tok {
			assert!(t.as_str().chars().all(|c| c.is_ascii_whitespace()));
		}
	}
}
