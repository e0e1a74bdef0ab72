/*!
# XPath 3.1 expression compiler

This module turns XPath expression strings into immutable abstract syntax
trees. Evaluation is a separate concern for the consumer of the AST; the
compiler guarantees that accepted expressions are grammatical and that
namespace prefixes were resolved where a resolver was supplied.

```
use gonzalez::xpath;

let expr = xpath::compile("/a/b[@id eq 'x']/c", None).unwrap();
assert_eq!(expr.source(), "/a/b[@id eq 'x']/c");
```

The parser is an iterative Pratt parser: its nesting state lives on an
explicit heap stack, so arbitrarily deep expressions cannot exhaust the
native call stack (see [`parser`]).
*/

pub mod ast;
pub mod error;
mod lexer;
mod parser;
mod token;

pub use ast::Expr;
pub use error::{Result, XPathError};
pub use parser::PrefixResolver;
pub use token::{Axis, Keyword, KindTestKind, Token};

/**
# A compiled XPath expression

Holds the original source string and the root of the AST. The value is
immutable and may be shared freely across threads for evaluation.
*/
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
	source: String,
	root: Expr,
}

impl Expression {
	/// The original expression text.
	pub fn source(&self) -> &str {
		&self.source
	}

	/// The root of the abstract syntax tree.
	pub fn root(&self) -> &Expr {
		&self.root
	}
}

impl std::fmt::Display for Expression {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		self.root.fmt(f)
	}
}

/// Compile an expression.
///
/// On failure, a [`XPathError`] carrying the error code and the character
/// offset into `expr` is returned; no partial AST is ever produced.
pub fn compile(expr: &str, resolver: Option<&dyn PrefixResolver>) -> Result<Expression> {
	let parser = parser::Parser::new(expr, resolver)?;
	let root = parser.parse()?;
	Ok(Expression {
		source: expr.to_string(),
		root,
	})
}

#[cfg(test)]
mod tests {
	use super::ast::*;
	use super::*;

	fn parse(expr: &str) -> Expr {
		compile(expr, None)
			.unwrap_or_else(|e| panic!("{} failed: {}", expr, e))
			.root()
			.clone()
	}

	fn parse_err(expr: &str) -> XPathError {
		match compile(expr, None) {
			Ok(e) => panic!("{} unexpectedly parsed: {:?}", expr, e.root()),
			Err(e) => e,
		}
	}

	fn num(n: f64) -> Expr {
		Expr::Literal(Literal::Number(n))
	}

	fn string(s: &str) -> Expr {
		Expr::Literal(Literal::String(s.into()))
	}

	fn child_step(name: &str) -> Expr {
		Expr::Step {
			axis: Axis::Child,
			node_test: NodeTest::Name(NameTest::Name(EQName::local(name))),
			predicates: Vec::new(),
		}
	}

	fn call(name: &str, args: Vec<Expr>) -> Expr {
		Expr::FunctionCall {
			name: EQName::local(name),
			args,
		}
	}

	#[test]
	fn parse_literals() {
		assert_eq!(parse("42"), num(42.0));
		assert_eq!(parse("'x'"), string("x"));
	}

	#[test]
	fn parse_context_item() {
		assert_eq!(parse("."), Expr::ContextItem);
	}

	#[test]
	fn parse_variable() {
		assert_eq!(parse("$x"), Expr::VariableRef(EQName::local("x")));
	}

	#[test]
	fn parse_function_nesting() {
		// scenario: contains(string(number(.)), 'foo')
		let e = parse("contains(string(number(.)), 'foo')");
		assert_eq!(
			e,
			call(
				"contains",
				vec![
					call("string", vec![call("number", vec![Expr::ContextItem])]),
					string("foo"),
				]
			)
		);
	}

	#[test]
	fn parse_pratt_precedence() {
		// scenario: 1 + 2 * 3 = 7
		let e = parse("1 + 2 * 3 = 7");
		assert_eq!(
			e,
			Expr::Binary {
				op: BinaryOp::GeneralEq,
				left: Box::new(Expr::Binary {
					op: BinaryOp::Add,
					left: Box::new(num(1.0)),
					right: Box::new(Expr::Binary {
						op: BinaryOp::Multiply,
						left: Box::new(num(2.0)),
						right: Box::new(num(3.0)),
					}),
				}),
				right: Box::new(num(7.0)),
			}
		);
	}

	#[test]
	fn parse_left_associative_operators() {
		let e = parse("10 - 4 - 3");
		assert_eq!(
			e,
			Expr::Binary {
				op: BinaryOp::Subtract,
				left: Box::new(Expr::Binary {
					op: BinaryOp::Subtract,
					left: Box::new(num(10.0)),
					right: Box::new(num(4.0)),
				}),
				right: Box::new(num(3.0)),
			}
		);
	}

	#[test]
	fn parse_predicate_stacking() {
		// scenario: /a/b[@id='x'][position()=1]/c
		let e = parse("/a/b[@id='x'][position()=1]/c");
		match e {
			Expr::LocationPath { absolute, steps } => {
				assert!(absolute);
				assert_eq!(steps.len(), 3);
				assert_eq!(steps[0], child_step("a"));
				match &steps[1] {
					Expr::Step {
						axis: Axis::Child,
						node_test: NodeTest::Name(NameTest::Name(n)),
						predicates,
					} => {
						assert_eq!(n.local, "b");
						assert_eq!(predicates.len(), 2);
						assert!(matches!(
							&predicates[0],
							Expr::Binary {
								op: BinaryOp::GeneralEq,
								..
							}
						));
						assert!(matches!(
							&predicates[1],
							Expr::Binary {
								op: BinaryOp::GeneralEq,
								..
							}
						));
					}
					other => panic!("unexpected step: {:?}", other),
				}
				assert_eq!(steps[2], child_step("c"));
			}
			other => panic!("unexpected expr: {:?}", other),
		}
	}

	#[test]
	fn parse_leading_double_slash_expands() {
		let e = parse("//b");
		match e {
			Expr::LocationPath { absolute, steps } => {
				assert!(absolute);
				assert_eq!(steps.len(), 2);
				assert!(matches!(
					&steps[0],
					Expr::Step {
						axis: Axis::DescendantOrSelf,
						node_test: NodeTest::Kind(KindTest::AnyNode),
						..
					}
				));
				assert_eq!(steps[1], child_step("b"));
			}
			other => panic!("unexpected expr: {:?}", other),
		}
	}

	#[test]
	fn parse_abbreviations() {
		assert_eq!(
			parse(".."),
			Expr::Step {
				axis: Axis::Parent,
				node_test: NodeTest::Kind(KindTest::AnyNode),
				predicates: Vec::new(),
			}
		);
		assert_eq!(
			parse("@id"),
			Expr::Step {
				axis: Axis::Attribute,
				node_test: NodeTest::Name(NameTest::Name(EQName::local("id"))),
				predicates: Vec::new(),
			}
		);
	}

	#[test]
	fn parse_axes_and_kind_tests() {
		let e = parse("ancestor-or-self::node()/child::text()");
		match e {
			Expr::LocationPath { absolute, steps } => {
				assert!(!absolute);
				assert!(matches!(
					&steps[0],
					Expr::Step {
						axis: Axis::AncestorOrSelf,
						node_test: NodeTest::Kind(KindTest::AnyNode),
						..
					}
				));
				assert!(matches!(
					&steps[1],
					Expr::Step {
						axis: Axis::Child,
						node_test: NodeTest::Kind(KindTest::Text),
						..
					}
				));
			}
			other => panic!("unexpected expr: {:?}", other),
		}
	}

	#[test]
	fn parse_union_and_sequence() {
		let e = parse("a | b, c");
		match e {
			Expr::Sequence(items) => {
				assert_eq!(items.len(), 2);
				assert!(matches!(
					&items[0],
					Expr::Binary {
						op: BinaryOp::Union,
						..
					}
				));
			}
			other => panic!("unexpected expr: {:?}", other),
		}
	}

	#[test]
	fn parse_if_then_else() {
		let e = parse("if ($x) then 1 else 2 + 3");
		match e {
			Expr::If {
				condition,
				then,
				else_,
			} => {
				assert_eq!(*condition, Expr::VariableRef(EQName::local("x")));
				assert_eq!(*then, num(1.0));
				// the else branch extends as far as possible
				assert!(matches!(
					*else_,
					Expr::Binary {
						op: BinaryOp::Add,
						..
					}
				));
			}
			other => panic!("unexpected expr: {:?}", other),
		}
	}

	#[test]
	fn parse_for_expression() {
		let e = parse("for $x in 1 to 3, $y in $x return $x + $y");
		match e {
			Expr::For { bindings, body } => {
				assert_eq!(bindings.len(), 2);
				assert_eq!(bindings[0].var, EQName::local("x"));
				assert!(matches!(
					&bindings[0].value,
					Expr::Binary {
						op: BinaryOp::Range,
						..
					}
				));
				assert_eq!(bindings[1].var, EQName::local("y"));
				assert!(matches!(
					*body,
					Expr::Binary {
						op: BinaryOp::Add,
						..
					}
				));
			}
			other => panic!("unexpected expr: {:?}", other),
		}
	}

	#[test]
	fn parse_let_expression() {
		let e = parse("let $x := 2 return $x * $x");
		assert!(matches!(e, Expr::Let { .. }));
	}

	#[test]
	fn parse_quantified_expressions() {
		assert!(matches!(
			parse("some $x in (1, 2) satisfies $x = 2"),
			Expr::Quantified {
				quantifier: Quantifier::Some,
				..
			}
		));
		assert!(matches!(
			parse("every $x in (1, 2) satisfies $x > 0"),
			Expr::Quantified {
				quantifier: Quantifier::Every,
				..
			}
		));
	}

	#[test]
	fn parse_keywords_as_names() {
		// `if`, `for`, `div` are ordinary names in operand position
		assert_eq!(parse("$if"), Expr::VariableRef(EQName::local("if")));
		assert_eq!(parse("div"), child_step("div"));
		let e = parse("for $for in for return $for");
		match e {
			Expr::For { bindings, .. } => {
				assert_eq!(bindings[0].var, EQName::local("for"));
				assert_eq!(bindings[0].value, child_step("for"));
			}
			other => panic!("unexpected expr: {:?}", other),
		}
	}

	#[test]
	fn parse_instance_of() {
		let e = parse("1 + $x instance of xs:integer");
		// instance-of binds tighter than additive
		match e {
			Expr::Binary {
				op: BinaryOp::Add,
				right,
				..
			} => match *right {
				Expr::TypeExpr {
					op: TypeOp::InstanceOf,
					ref ty,
					..
				} => {
					assert_eq!(
						*ty,
						SequenceType::Item {
							item: ItemType::Atomic(EQName {
								prefix: Some("xs".into()),
								local: "integer".into(),
								uri: None,
							}),
							occurrence: Occurrence::One,
						}
					);
				}
				ref other => panic!("unexpected rhs: {:?}", other),
			},
			other => panic!("unexpected expr: {:?}", other),
		}
	}

	#[test]
	fn parse_cast_requires_atomic_type() {
		assert!(matches!(
			parse("$x cast as xs:integer?"),
			Expr::TypeExpr {
				op: TypeOp::CastAs,
				..
			}
		));
		parse_err("$x cast as node()");
	}

	#[test]
	fn parse_treat_with_complex_type() {
		let e = parse("$x treat as map(xs:string, item()*)+");
		match e {
			Expr::TypeExpr {
				op: TypeOp::TreatAs,
				ty:
					SequenceType::Item {
						item: ItemType::MapTest(Some(_)),
						occurrence: Occurrence::OneOrMore,
					},
				..
			} => (),
			other => panic!("unexpected expr: {:?}", other),
		}
	}

	#[test]
	fn parse_function_type_nesting() {
		let e = parse("$f instance of function(xs:integer) as function(*)*");
		match e {
			Expr::TypeExpr {
				ty:
					SequenceType::Item {
						item: ItemType::FunctionTest(Some((params, ret))),
						..
					},
				..
			} => {
				assert_eq!(params.len(), 1);
				assert!(matches!(
					*ret,
					SequenceType::Item {
						item: ItemType::FunctionTest(None),
						occurrence: Occurrence::ZeroOrMore,
					}
				));
			}
			other => panic!("unexpected expr: {:?}", other),
		}
	}

	#[test]
	fn parse_map_constructor() {
		let e = parse("map { 'a' : 1, 'b' : 2 }");
		match e {
			Expr::MapConstructor { entries } => {
				assert_eq!(entries.len(), 2);
				assert_eq!(entries[0].0, string("a"));
				assert_eq!(entries[0].1, num(1.0));
			}
			other => panic!("unexpected expr: {:?}", other),
		}
		assert_eq!(
			parse("map {}"),
			Expr::MapConstructor {
				entries: Vec::new()
			}
		);
	}

	#[test]
	fn parse_map_constructor_with_expression_keys() {
		let e = parse("map { concat('a', 'b') : 1 + 2 }");
		match e {
			Expr::MapConstructor { entries } => {
				assert!(matches!(&entries[0].0, Expr::FunctionCall { .. }));
				assert!(matches!(&entries[0].1, Expr::Binary { .. }));
			}
			other => panic!("unexpected expr: {:?}", other),
		}
	}

	#[test]
	fn parse_array_constructors() {
		assert_eq!(
			parse("[1, 2]"),
			Expr::ArrayConstructor {
				members: vec![num(1.0), num(2.0)]
			}
		);
		assert_eq!(
			parse("array { 1, 2 }"),
			Expr::ArrayConstructor {
				members: vec![num(1.0), num(2.0)]
			}
		);
		assert_eq!(
			parse("[]"),
			Expr::ArrayConstructor {
				members: Vec::new()
			}
		);
	}

	#[test]
	fn parse_lookups() {
		assert_eq!(
			parse("?name"),
			Expr::Lookup {
				base: None,
				key: LookupKey::Name("name".into()),
			}
		);
		let e = parse("$m?key?2");
		match e {
			Expr::Lookup { base, key } => {
				assert_eq!(key, LookupKey::Integer(2));
				assert!(matches!(
					base.as_deref(),
					Some(Expr::Lookup {
						key: LookupKey::Name(_),
						..
					})
				));
			}
			other => panic!("unexpected expr: {:?}", other),
		}
		assert!(matches!(
			parse("$m?*"),
			Expr::Lookup {
				key: LookupKey::Wildcard,
				..
			}
		));
		assert!(matches!(
			parse("$m?($k)"),
			Expr::Lookup {
				key: LookupKey::Expr(_),
				..
			}
		));
	}

	#[test]
	fn parse_named_function_ref_and_placeholder() {
		assert_eq!(
			parse("concat#2"),
			Expr::NamedFunctionRef {
				name: EQName::local("concat"),
				arity: 2,
			}
		);
		let e = parse("substring(?, 2)");
		match e {
			Expr::FunctionCall { args, .. } => {
				assert_eq!(args[0], Expr::ArgumentPlaceholder);
				assert_eq!(args[1], num(2.0));
			}
			other => panic!("unexpected expr: {:?}", other),
		}
	}

	#[test]
	fn parse_inline_function_and_dynamic_call() {
		let e = parse("function($x as xs:integer) as xs:integer { $x + 1 }(41)");
		match e {
			Expr::DynamicCall { base, args } => {
				assert_eq!(args.len(), 1);
				match *base {
					Expr::InlineFunction {
						ref params,
						ref return_type,
						..
					} => {
						assert_eq!(params.len(), 1);
						assert!(params[0].ty.is_some());
						assert!(return_type.is_some());
					}
					ref other => panic!("unexpected base: {:?}", other),
				}
			}
			other => panic!("unexpected expr: {:?}", other),
		}
	}

	#[test]
	fn parse_dynamic_call_on_variable() {
		let e = parse("$f(1, 2)");
		assert!(matches!(e, Expr::DynamicCall { ref args, .. } if args.len() == 2));
	}

	#[test]
	fn parse_path_over_function_result() {
		let e = parse("doc('x.xml')/a");
		match e {
			Expr::PathExpr { filter, path } => {
				assert!(matches!(*filter, Expr::FunctionCall { .. }));
				assert!(matches!(*path, Expr::LocationPath { absolute: false, .. }));
			}
			other => panic!("unexpected expr: {:?}", other),
		}
	}

	#[test]
	fn parse_unary_minus() {
		let e = parse("--2");
		assert_eq!(
			e,
			Expr::Unary {
				operand: Box::new(num(2.0)),
				negations: 2,
			}
		);
		// unary binds looser than a path
		let e = parse("-a/b");
		match e {
			Expr::Unary { operand, negations } => {
				assert_eq!(negations, 1);
				assert!(matches!(*operand, Expr::LocationPath { .. }));
			}
			other => panic!("unexpected expr: {:?}", other),
		}
	}

	#[test]
	fn parse_deeply_nested_parens_without_stack_overflow() {
		// heap frames, not native call frames
		let depth = 10_000;
		let mut expr = String::with_capacity(depth * 2 + 1);
		for _ in 0..depth {
			expr.push('(');
		}
		expr.push('1');
		for _ in 0..depth {
			expr.push(')');
		}
		assert_eq!(parse(&expr), num(1.0));
	}

	#[test]
	fn parse_deep_path_without_stack_overflow() {
		let depth = 10_000;
		let mut expr = String::from("a");
		for _ in 0..depth {
			expr.push_str("/a");
		}
		match parse(&expr) {
			Expr::LocationPath { steps, .. } => assert_eq!(steps.len(), depth + 1),
			other => panic!("unexpected expr: {:?}", other),
		}
	}

	#[test]
	fn parse_wildcards() {
		assert_eq!(
			parse("*"),
			Expr::Step {
				axis: Axis::Child,
				node_test: NodeTest::Name(NameTest::Any),
				predicates: Vec::new(),
			}
		);
		assert!(matches!(
			parse("*:local"),
			Expr::Step {
				node_test: NodeTest::Name(NameTest::LocalWildcard { .. }),
				..
			}
		));
		assert!(matches!(
			parse("pre:*"),
			Expr::Step {
				node_test: NodeTest::Name(NameTest::NamespaceWildcard { .. }),
				..
			}
		));
	}

	#[test]
	fn parse_uri_qualified_names() {
		let e = parse("Q{urn:x}local");
		assert!(matches!(
			e,
			Expr::Step {
				node_test: NodeTest::Name(NameTest::Name(EQName {
					uri: Some(_),
					..
				})),
				..
			}
		));
	}

	#[test]
	fn resolver_resolves_prefixes() {
		let bindings: &[(&str, &str)] = &[("pre", "urn:pre")];
		let e = compile("pre:x", Some(&bindings)).unwrap();
		match e.root() {
			Expr::Step {
				node_test: NodeTest::Name(NameTest::Name(n)),
				..
			} => {
				assert_eq!(n.uri.as_deref(), Some("urn:pre"));
			}
			other => panic!("unexpected expr: {:?}", other),
		}
	}

	#[test]
	fn resolver_reports_unknown_prefix() {
		let bindings: &[(&str, &str)] = &[("pre", "urn:pre")];
		let err = compile("nope:x", Some(&bindings)).err().unwrap();
		assert_eq!(err.code(), error::XPST0081);
	}

	#[test]
	fn unresolved_prefix_is_retained_without_resolver() {
		let e = parse("nope:x");
		match e {
			Expr::Step {
				node_test: NodeTest::Name(NameTest::Name(n)),
				..
			} => {
				assert_eq!(n.prefix.as_deref(), Some("nope"));
				assert!(n.uri.is_none());
			}
			other => panic!("unexpected expr: {:?}", other),
		}
	}

	#[test]
	fn syntax_errors_carry_offsets() {
		let err = parse_err("1 + ");
		assert_eq!(err.code(), error::XPST0003);
		assert_eq!(err.offset(), 4);
		let err = parse_err("f(1,, 2)");
		assert!(err.offset() > 0);
	}

	#[test]
	fn error_tokens_are_reported() {
		parse_err("1 ~ 2");
		parse_err("'unterminated");
		parse_err("a[");
		parse_err("map { 'a' }");
	}

	#[test]
	fn pretty_printed_ast_reparses_equivalently() {
		for expr in [
			"1 + 2 * 3 = 7",
			"/a/b[@id = 'x'][position() = 1]/c",
			"contains(string(number(.)), 'foo')",
			"for $x in 1 to 3 return $x * 2",
			"if ($c) then 'a' else 'b'",
			"map { 'k' : [1, 2] }",
			"some $x in (1, 2) satisfies $x eq 2",
			"-a/b | c",
			"$m?key?2",
		] {
			let first = parse(expr);
			let printed = first.to_string();
			let second = compile(&printed, None)
				.unwrap_or_else(|e| panic!("reparse of `{}` failed: {}", printed, e));
			// the canonical form parenthesizes everything, so a second
			// round trip is a fixed point
			assert_eq!(
				second.root().to_string(),
				printed,
				"round trip diverged for {}",
				expr
			);
		}
	}
}
