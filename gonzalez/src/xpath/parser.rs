/*!
# Iterative Pratt parser for XPath

The parser never recurses on the grammar. Nesting is represented by an
explicit stack of [`Frame`]s; operator precedence is handled with the
classic two-stack Pratt scheme (an operand stack and an
`(operator, precedence)` stack per frame). The working set for arbitrarily
deep expressions is heap frames, never native call frames.

Each frame carries a [`ContextType`] (what kind of syntactic hole it
fills), a [`ParseState`] (where in the operand/operator cycle it is) and a
[`Completion`] (what to build when the frame's expression is complete).
*/
use super::ast::*;
use super::error::{Result, XPathError};
use super::lexer::Lexer;
use super::token::{Axis, Keyword, KindTestKind, Token};

/// Collaborator interface for resolving namespace prefixes at compile
/// time.
///
/// When resolution fails and a resolver is present, compilation reports a
/// static error (`XPST0081`); without a resolver, prefixes are retained in
/// the AST for later binding.
pub trait PrefixResolver {
	/// Resolve a namespace prefix to a URI.
	fn resolve(&self, prefix: &str) -> Option<String>;

	/// The `xpath-default-namespace` for unprefixed element name tests.
	/// Unprefixed attribute names never use it.
	fn default_element_namespace(&self) -> Option<String> {
		None
	}
}

/// Resolver over plain pairs, mostly for tests and simple callers.
impl<'a, 'b, 'c> PrefixResolver for &'a [(&'b str, &'c str)] {
	fn resolve(&self, prefix: &str) -> Option<String> {
		self.iter()
			.find(|(p, _)| *p == prefix)
			.map(|(_, u)| u.to_string())
	}
}

/// What kind of syntactic hole a frame fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContextType {
	TopLevel,
	FunctionArg,
	Predicate,
	Parenthesized,
	Sequence,
}

/// Where in the operand/operator cycle a frame is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
	NeedOperand,
	HaveOperand,
	PathContinuation,
	BuildingFunction,
	BuildingFilter,
}

/// Variants of binding expressions sharing the clause machinery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BindKind {
	For,
	Let,
	Some,
	Every,
}

/// What to build when a frame's expression is complete, and how to hand
/// it to the parent frame.
#[derive(Debug)]
enum Completion {
	/// The whole expression; completes at end of input.
	Root,
	/// `( … )`; the result becomes the parent's postfix base.
	Paren,
	/// Argument list of a call. `name` for static calls, `base` for
	/// dynamic ones.
	Args {
		name: Option<EQName>,
		base: Option<Expr>,
	},
	/// `[ … ]`; attaches to the parent's postfix base.
	Predicate,
	/// `if ( … )`
	IfCondition,
	IfThen {
		condition: Expr,
	},
	IfElse {
		condition: Expr,
		then: Expr,
	},
	/// Value of the current binding of a for/let/some/every.
	BindingValue {
		kind: BindKind,
		bindings: Vec<Binding>,
		var: EQName,
	},
	/// Body after return/satisfies.
	Body {
		kind: BindKind,
		bindings: Vec<Binding>,
	},
	/// Key position inside `map { … }`.
	MapKey {
		entries: Vec<(Expr, Expr)>,
	},
	/// Value position inside `map { … }`.
	MapValue {
		entries: Vec<(Expr, Expr)>,
		key: Expr,
	},
	/// `[ … ]` square array constructor member list.
	SquareArray,
	/// `array { … }`
	CurlyArray,
	/// Body of an inline function.
	FnBody {
		params: Vec<Param>,
		return_type: Option<SequenceType>,
	},
	/// Parenthesized lookup key `?( … )`.
	LookupKey {
		base: Option<Expr>,
	},
}

/// One heap-allocated parsing context.
struct Frame {
	ctx: ContextType,
	state: ParseState,
	/// Pratt operand stack.
	operands: Vec<Expr>,
	/// Pratt operator stack with precedences.
	operators: Vec<(BinaryOp, u8)>,
	/// Postfix base currently being extended (filter/lookup/call).
	filter_base: Option<Expr>,
	/// Unary sign bookkeeping for the operand being built.
	negations: u32,
	has_unary: bool,
	/// Path assembly.
	absolute: bool,
	in_path: bool,
	steps: Vec<Expr>,
	/// Accumulator for argument lists / sequences / array members.
	items: Vec<Expr>,
	completion: Completion,
}

impl Frame {
	fn new(ctx: ContextType, completion: Completion) -> Self {
		Self {
			ctx,
			state: ParseState::NeedOperand,
			operands: Vec::new(),
			operators: Vec::new(),
			filter_base: None,
			negations: 0,
			has_unary: false,
			absolute: false,
			in_path: false,
			steps: Vec::new(),
			items: Vec::new(),
			completion,
		}
	}
}

const PREC_OR: u8 = 1;
const PREC_AND: u8 = 2;
const PREC_COMPARISON: u8 = 3;
const PREC_RANGE: u8 = 4;
const PREC_ADDITIVE: u8 = 5;
const PREC_MULTIPLICATIVE: u8 = 6;
const PREC_UNION: u8 = 7;
const PREC_INTERSECT: u8 = 8;
const PREC_TYPE: u8 = 9;

fn binary_op(tok: &Token) -> Option<(BinaryOp, u8)> {
	Some(match tok {
		Token::Keyword(Keyword::Or) => (BinaryOp::Or, PREC_OR),
		Token::Keyword(Keyword::And) => (BinaryOp::And, PREC_AND),
		Token::Equals => (BinaryOp::GeneralEq, PREC_COMPARISON),
		Token::NotEquals => (BinaryOp::GeneralNe, PREC_COMPARISON),
		Token::LessThan => (BinaryOp::GeneralLt, PREC_COMPARISON),
		Token::LessEquals => (BinaryOp::GeneralLe, PREC_COMPARISON),
		Token::GreaterThan => (BinaryOp::GeneralGt, PREC_COMPARISON),
		Token::GreaterEquals => (BinaryOp::GeneralGe, PREC_COMPARISON),
		Token::Keyword(Keyword::Eq) => (BinaryOp::ValueEq, PREC_COMPARISON),
		Token::Keyword(Keyword::Ne) => (BinaryOp::ValueNe, PREC_COMPARISON),
		Token::Keyword(Keyword::Lt) => (BinaryOp::ValueLt, PREC_COMPARISON),
		Token::Keyword(Keyword::Le) => (BinaryOp::ValueLe, PREC_COMPARISON),
		Token::Keyword(Keyword::Gt) => (BinaryOp::ValueGt, PREC_COMPARISON),
		Token::Keyword(Keyword::Ge) => (BinaryOp::ValueGe, PREC_COMPARISON),
		Token::Keyword(Keyword::Is) => (BinaryOp::Is, PREC_COMPARISON),
		Token::Keyword(Keyword::To) => (BinaryOp::Range, PREC_RANGE),
		Token::Plus => (BinaryOp::Add, PREC_ADDITIVE),
		Token::Minus => (BinaryOp::Subtract, PREC_ADDITIVE),
		Token::Multiply => (BinaryOp::Multiply, PREC_MULTIPLICATIVE),
		Token::Keyword(Keyword::Div) => (BinaryOp::Divide, PREC_MULTIPLICATIVE),
		Token::Keyword(Keyword::IDiv) => (BinaryOp::IntegerDivide, PREC_MULTIPLICATIVE),
		Token::Keyword(Keyword::Mod) => (BinaryOp::Modulo, PREC_MULTIPLICATIVE),
		Token::Bar | Token::Keyword(Keyword::Union) => (BinaryOp::Union, PREC_UNION),
		Token::Keyword(Keyword::Intersect) => (BinaryOp::Intersect, PREC_INTERSECT),
		Token::Keyword(Keyword::Except) => (BinaryOp::Except, PREC_INTERSECT),
		_ => return None,
	})
}

fn type_op(tok: &Token) -> Option<(TypeOp, Keyword)> {
	Some(match tok {
		Token::Keyword(Keyword::Instance) => (TypeOp::InstanceOf, Keyword::Of),
		Token::Keyword(Keyword::Cast) => (TypeOp::CastAs, Keyword::As),
		Token::Keyword(Keyword::Castable) => (TypeOp::CastableAs, Keyword::As),
		Token::Keyword(Keyword::Treat) => (TypeOp::TreatAs, Keyword::As),
		_ => return None,
	})
}

pub(super) struct Parser<'r> {
	lexer: Lexer,
	resolver: Option<&'r dyn PrefixResolver>,
	stack: Vec<Frame>,
}

impl<'r> Parser<'r> {
	pub(super) fn new(expr: &str, resolver: Option<&'r dyn PrefixResolver>) -> Result<Self> {
		Ok(Self {
			lexer: Lexer::new(expr)?,
			resolver,
			stack: Vec::new(),
		})
	}

	fn top(&mut self) -> &mut Frame {
		self.stack.last_mut().expect("empty context stack")
	}

	fn err_here(&self, message: impl Into<String>) -> XPathError {
		XPathError::syntax(self.lexer.token_start(), message)
	}

	fn unexpected(&self, what: &str) -> XPathError {
		self.err_here(format!(
			"unexpected {}, expected {}",
			self.lexer.current().describe(),
			what
		))
	}

	fn advance(&mut self) -> Result<()> {
		self.lexer.advance()
	}

	fn expect(&mut self, tok: &Token, what: &str) -> Result<()> {
		if self.lexer.current() == tok {
			self.advance()
		} else {
			Err(self.unexpected(what))
		}
	}

	fn resolve_prefix(&self, prefix: &str) -> Result<Option<String>> {
		match self.resolver {
			None => Ok(None),
			Some(r) => match r.resolve(prefix) {
				Some(uri) => Ok(Some(uri)),
				None => Err(XPathError::undeclared_prefix(
					self.lexer.token_start(),
					prefix,
				)),
			},
		}
	}

	fn default_element_namespace(&self) -> Option<String> {
		self.resolver.and_then(|r| r.default_element_namespace())
	}

	/// The single public entry point: parse the whole expression.
	pub(super) fn parse(mut self) -> Result<Expr> {
		self.stack
			.push(Frame::new(ContextType::TopLevel, Completion::Root));
		loop {
			match self.top().state {
				ParseState::NeedOperand => self.need_operand()?,
				ParseState::PathContinuation => self.path_continuation()?,
				ParseState::BuildingFunction => self.building_function()?,
				ParseState::BuildingFilter => self.building_filter()?,
				ParseState::HaveOperand => {
					if let Some(result) = self.have_operand()? {
						return Ok(result);
					}
				}
			}
		}
	}

	/// Install a postfix base and move to PATH_CONTINUATION.
	fn set_base(&mut self, e: Expr) {
		let f = self.top();
		debug_assert!(f.filter_base.is_none());
		f.filter_base = Some(e);
		f.state = ParseState::PathContinuation;
	}

	/// Push a finished operand (applying unary signs) and move to
	/// HAVE_OPERAND.
	fn push_operand(&mut self, e: Expr) {
		let f = self.top();
		let e = if f.has_unary {
			Expr::Unary {
				operand: Box::new(e),
				negations: f.negations,
			}
		} else {
			e
		};
		f.negations = 0;
		f.has_unary = false;
		f.operands.push(e);
		f.state = ParseState::HaveOperand;
	}

	/// Fold the current segment (path or plain operand) into an operand.
	fn finalize_segment(&mut self) -> Result<()> {
		let f = self.top();
		let base = f.filter_base.take();
		if !f.in_path {
			let e = base.expect("finalize without operand");
			self.push_operand(e);
			return Ok(());
		}
		if let Some(b) = base {
			f.steps.push(b);
		}
		let absolute = f.absolute;
		let steps = std::mem::take(&mut f.steps);
		f.in_path = false;
		f.absolute = false;
		let expr = if absolute || steps.first().map(|s| s.is_step_like()).unwrap_or(true) {
			Expr::LocationPath { absolute, steps }
		} else {
			let mut it = steps.into_iter();
			let head = it.next().unwrap();
			Expr::PathExpr {
				filter: Box::new(head),
				path: Box::new(Expr::LocationPath {
					absolute: false,
					steps: it.collect(),
				}),
			}
		};
		self.push_operand(expr);
		Ok(())
	}

	/// The `descendant-or-self::node()` step `//` abbreviates.
	fn descendant_or_self_step() -> Expr {
		Expr::Step {
			axis: Axis::DescendantOrSelf,
			node_test: NodeTest::Kind(KindTest::AnyNode),
			predicates: Vec::new(),
		}
	}

	fn token_starts_step(&self) -> bool {
		match self.lexer.current() {
			Token::NCName(_)
			| Token::URIQName { .. }
			| Token::Star
			| Token::SuffixWildcard(_)
			| Token::At
			| Token::Axis(_)
			| Token::Dot
			| Token::DotDot
			| Token::Dollar
			| Token::LParen => true,
			Token::KindTest(k) => !matches!(
				k,
				KindTestKind::EmptySequence
					| KindTestKind::Item
					| KindTestKind::Function
					| KindTestKind::Map
					| KindTestKind::Array
			),
			_ => false,
		}
	}

	// ------------------------------------------------------------------
	// NEED_OPERAND
	// ------------------------------------------------------------------

	fn need_operand(&mut self) -> Result<()> {
		// unary signs
		loop {
			match self.lexer.current() {
				Token::Minus => {
					let f = self.top();
					f.negations += 1;
					f.has_unary = true;
					self.advance()?;
				}
				Token::Plus => {
					self.top().has_unary = true;
					self.advance()?;
				}
				_ => break,
			}
		}
		let tok = self.lexer.current().clone();
		match tok {
			Token::NumberLiteral(n) => {
				self.advance()?;
				self.set_base(Expr::Literal(Literal::Number(n)));
				Ok(())
			}
			Token::StringLiteral(s) => {
				self.advance()?;
				self.set_base(Expr::Literal(Literal::String(s)));
				Ok(())
			}
			Token::Dollar => {
				self.advance()?;
				let name = self.parse_eqname("variable name")?;
				self.set_base(Expr::VariableRef(name));
				Ok(())
			}
			Token::Dot => {
				self.advance()?;
				self.set_base(Expr::ContextItem);
				Ok(())
			}
			Token::DotDot => {
				self.advance()?;
				self.set_base(Expr::Step {
					axis: Axis::Parent,
					node_test: NodeTest::Kind(KindTest::AnyNode),
					predicates: Vec::new(),
				});
				Ok(())
			}
			Token::Slash | Token::DoubleSlash => {
				let double = tok == Token::DoubleSlash;
				{
					let f = self.top();
					if f.in_path || f.filter_base.is_some() {
						return Err(self.err_here("unexpected path separator"));
					}
					f.in_path = true;
					f.absolute = true;
					if double {
						f.steps.push(Self::descendant_or_self_step());
					}
				}
				self.advance()?;
				if !self.token_starts_step() {
					if double {
						return Err(self.unexpected("a step after '//'"));
					}
					self.finalize_segment()?;
				}
				Ok(())
			}
			Token::At => {
				self.advance()?;
				let nt = self.parse_node_test(Axis::Attribute)?;
				self.set_base(Expr::Step {
					axis: Axis::Attribute,
					node_test: nt,
					predicates: Vec::new(),
				});
				Ok(())
			}
			Token::Axis(axis) => {
				self.advance()?;
				let nt = self.parse_node_test(axis)?;
				self.set_base(Expr::Step {
					axis,
					node_test: nt,
					predicates: Vec::new(),
				});
				Ok(())
			}
			Token::Star => {
				self.advance()?;
				self.set_base(Expr::Step {
					axis: Axis::Child,
					node_test: NodeTest::Name(NameTest::Any),
					predicates: Vec::new(),
				});
				Ok(())
			}
			Token::SuffixWildcard(local) => {
				self.advance()?;
				self.set_base(Expr::Step {
					axis: Axis::Child,
					node_test: NodeTest::Name(NameTest::LocalWildcard { local }),
					predicates: Vec::new(),
				});
				Ok(())
			}
			Token::KindTest(KindTestKind::Function) => {
				self.advance()?;
				self.parse_inline_function()
			}
			Token::KindTest(
				KindTestKind::EmptySequence
				| KindTestKind::Item
				| KindTestKind::Map
				| KindTestKind::Array,
			) => Err(self.err_here("type test not allowed here")),
			Token::KindTest(kind) => {
				self.advance()?;
				let kt = self.parse_kind_test_body(kind)?;
				let axis = match kind {
					KindTestKind::Attribute | KindTestKind::SchemaAttribute => Axis::Attribute,
					_ => Axis::Child,
				};
				self.set_base(Expr::Step {
					axis,
					node_test: NodeTest::Kind(kt),
					predicates: Vec::new(),
				});
				Ok(())
			}
			Token::NCName(name) => self.operand_name(name),
			Token::URIQName { uri, local } => {
				self.advance()?;
				let name = EQName {
					prefix: None,
					local,
					uri: Some(uri),
				};
				match self.lexer.current() {
					Token::LParen => {
						self.advance()?;
						self.begin_call(Some(name), None)
					}
					Token::Hash => {
						self.advance()?;
						let arity = self.parse_arity()?;
						self.set_base(Expr::NamedFunctionRef { name, arity });
						Ok(())
					}
					_ => {
						self.set_base(Expr::Step {
							axis: Axis::Child,
							node_test: NodeTest::Name(NameTest::Name(name)),
							predicates: Vec::new(),
						});
						Ok(())
					}
				}
			}
			Token::LParen => {
				self.advance()?;
				if self.lexer.current() == &Token::RParen {
					self.advance()?;
					self.set_base(Expr::Sequence(Vec::new()));
					Ok(())
				} else {
					self.stack
						.push(Frame::new(ContextType::Parenthesized, Completion::Paren));
					Ok(())
				}
			}
			Token::LBracket => {
				self.advance()?;
				if self.lexer.current() == &Token::RBracket {
					self.advance()?;
					self.set_base(Expr::ArrayConstructor {
						members: Vec::new(),
					});
					Ok(())
				} else {
					self.stack
						.push(Frame::new(ContextType::Sequence, Completion::SquareArray));
					Ok(())
				}
			}
			Token::Question => self.unary_lookup_or_placeholder(),
			other => Err(XPathError::syntax(
				self.lexer.token_start(),
				format!("expected an expression, found {}", other.describe()),
			)),
		}
	}

	/// `?` in operand position: unary lookup if a key specifier follows,
	/// argument placeholder inside an argument list otherwise (the rule
	/// is a single-token peek).
	fn unary_lookup_or_placeholder(&mut self) -> Result<()> {
		let next = self.lexer.peek()?;
		match next {
			Token::NCName(_) | Token::NumberLiteral(_) | Token::Star | Token::LParen => {
				self.advance()?;
				self.parse_lookup(None)
			}
			_ => {
				let in_args = matches!(
					self.top().completion,
					Completion::Args { .. }
				);
				if in_args && matches!(next, Token::Comma | Token::RParen | Token::Eof) {
					self.advance()?;
					// placeholders take no postfix operations
					self.push_operand(Expr::ArgumentPlaceholder);
					Ok(())
				} else {
					Err(self.unexpected("a lookup key or argument list delimiter"))
				}
			}
		}
	}

	/// Parse the key specifier after `?`; `base` is the postfix base
	/// (None for the unary form).
	fn parse_lookup(&mut self, base: Option<Expr>) -> Result<()> {
		match self.lexer.current().clone() {
			Token::NCName(n) => {
				self.advance()?;
				self.set_base(Expr::Lookup {
					base: base.map(Box::new),
					key: LookupKey::Name(n),
				});
				Ok(())
			}
			Token::NumberLiteral(n) => {
				if n.fract() != 0.0 || n < 0.0 {
					return Err(self.err_here("lookup key must be a non-negative integer"));
				}
				self.advance()?;
				self.set_base(Expr::Lookup {
					base: base.map(Box::new),
					key: LookupKey::Integer(n as u64),
				});
				Ok(())
			}
			Token::Star => {
				self.advance()?;
				self.set_base(Expr::Lookup {
					base: base.map(Box::new),
					key: LookupKey::Wildcard,
				});
				Ok(())
			}
			Token::LParen => {
				self.advance()?;
				self.stack.push(Frame::new(
					ContextType::Parenthesized,
					Completion::LookupKey { base },
				));
				Ok(())
			}
			_ => Err(self.unexpected("a lookup key")),
		}
	}

	/// Dispatch a plain NCName in operand position.
	fn operand_name(&mut self, name: String) -> Result<()> {
		let name_start = self.lexer.token_start();
		let name_chars = name.chars().count();
		let next = self.lexer.peek()?;
		match (name.as_str(), &next) {
			("if", Token::LParen) => {
				self.advance()?;
				self.advance()?;
				self.stack.push(Frame::new(
					ContextType::Parenthesized,
					Completion::IfCondition,
				));
				return Ok(());
			}
			("for", Token::Dollar) => {
				self.advance()?;
				return self.parse_binding_head(BindKind::For, Vec::new());
			}
			("let", Token::Dollar) => {
				self.advance()?;
				return self.parse_binding_head(BindKind::Let, Vec::new());
			}
			("some", Token::Dollar) => {
				self.advance()?;
				return self.parse_binding_head(BindKind::Some, Vec::new());
			}
			("every", Token::Dollar) => {
				self.advance()?;
				return self.parse_binding_head(BindKind::Every, Vec::new());
			}
			("map", Token::LBrace) => {
				self.advance()?;
				self.advance()?;
				if self.lexer.current() == &Token::RBrace {
					self.advance()?;
					self.set_base(Expr::MapConstructor {
						entries: Vec::new(),
					});
				} else {
					self.stack.push(Frame::new(
						ContextType::Parenthesized,
						Completion::MapKey {
							entries: Vec::new(),
						},
					));
				}
				return Ok(());
			}
			("array", Token::LBrace) => {
				self.advance()?;
				self.advance()?;
				if self.lexer.current() == &Token::RBrace {
					self.advance()?;
					self.set_base(Expr::ArrayConstructor {
						members: Vec::new(),
					});
				} else {
					self.stack.push(Frame::new(
						ContextType::Parenthesized,
						Completion::CurlyArray,
					));
				}
				return Ok(());
			}
			_ => (),
		}
		match next {
			Token::LParen => {
				// unprefixed function call
				self.advance()?;
				self.advance()?;
				self.begin_call(
					Some(EQName {
						prefix: None,
						local: name,
						uri: None,
					}),
					None,
				)
			}
			Token::Hash => {
				self.advance()?;
				self.advance()?;
				let arity = self.parse_arity()?;
				self.set_base(Expr::NamedFunctionRef {
					name: EQName {
						prefix: None,
						local: name,
						uri: None,
					},
					arity,
				});
				Ok(())
			}
			Token::Colon => {
				self.advance()?;
				// the colon must be glued to the prefix
				if self.lexer.token_start() != name_start + name_chars {
					return Err(self.err_here("':' must follow the prefix directly"));
				}
				self.prefixed_operand(name)
			}
			_ => {
				// a plain element name test
				self.advance()?;
				let uri = self.default_element_namespace();
				self.set_base(Expr::Step {
					axis: Axis::Child,
					node_test: NodeTest::Name(NameTest::Name(EQName {
						prefix: None,
						local: name,
						uri,
					})),
					predicates: Vec::new(),
				});
				Ok(())
			}
		}
	}

	/// After `prefix:` — a function call, a named function reference, a
	/// namespace wildcard or a prefixed name test.
	fn prefixed_operand(&mut self, prefix: String) -> Result<()> {
		let colon_start = self.lexer.token_start();
		self.advance()?;
		match self.lexer.current().clone() {
			Token::Star => {
				if self.lexer.token_start() != colon_start + 1 {
					return Err(self.err_here("wildcard must follow ':' directly"));
				}
				self.advance()?;
				let uri = self.resolve_prefix(&prefix)?;
				self.set_base(Expr::Step {
					axis: Axis::Child,
					node_test: NodeTest::Name(NameTest::NamespaceWildcard { prefix, uri }),
					predicates: Vec::new(),
				});
				Ok(())
			}
			Token::NCName(local) => {
				if self.lexer.token_start() != colon_start + 1 {
					return Err(self.err_here("local name must follow ':' directly"));
				}
				let uri = self.resolve_prefix(&prefix)?;
				let name = EQName {
					prefix: Some(prefix),
					local,
					uri,
				};
				self.advance()?;
				match self.lexer.current() {
					Token::LParen => {
						self.advance()?;
						self.begin_call(Some(name), None)
					}
					Token::Hash => {
						self.advance()?;
						let arity = self.parse_arity()?;
						self.set_base(Expr::NamedFunctionRef { name, arity });
						Ok(())
					}
					_ => {
						self.set_base(Expr::Step {
							axis: Axis::Child,
							node_test: NodeTest::Name(NameTest::Name(name)),
							predicates: Vec::new(),
						});
						Ok(())
					}
				}
			}
			_ => Err(self.unexpected("a local name or '*' after the prefix")),
		}
	}

	/// Open an argument-list frame; the opening parenthesis has been
	/// consumed.
	fn begin_call(&mut self, name: Option<EQName>, base: Option<Expr>) -> Result<()> {
		if self.lexer.current() == &Token::RParen {
			self.advance()?;
			let call = match (name, base) {
				(Some(name), None) => Expr::FunctionCall {
					name,
					args: Vec::new(),
				},
				(None, Some(base)) => Expr::DynamicCall {
					base: Box::new(base),
					args: Vec::new(),
				},
				_ => unreachable!("call with both or neither of name/base"),
			};
			self.set_base(call);
			return Ok(());
		}
		self.stack.push(Frame::new(
			ContextType::FunctionArg,
			Completion::Args { name, base },
		));
		Ok(())
	}

	/// The integer after `name#`.
	fn parse_arity(&mut self) -> Result<usize> {
		match self.lexer.current().clone() {
			Token::NumberLiteral(n) if n.fract() == 0.0 && n >= 0.0 => {
				self.advance()?;
				Ok(n as usize)
			}
			_ => Err(self.unexpected("a function arity")),
		}
	}

	/// `$v in …` / `$v := …` head of a binding clause; the introducing
	/// keyword has been consumed.
	fn parse_binding_head(&mut self, kind: BindKind, bindings: Vec<Binding>) -> Result<()> {
		self.expect(&Token::Dollar, "'$'")?;
		let var = self.parse_eqname("variable name")?;
		match kind {
			BindKind::Let => self.expect(&Token::Assign, "':='")?,
			_ => match self.lexer.current() {
				Token::Keyword(Keyword::In) => self.advance()?,
				_ => return Err(self.unexpected("'in'")),
			},
		}
		self.stack.push(Frame::new(
			ContextType::TopLevel,
			Completion::BindingValue {
				kind,
				bindings,
				var,
			},
		));
		Ok(())
	}

	/// A (possibly prefixed) name; keywords are acceptable as names here.
	fn parse_eqname(&mut self, what: &str) -> Result<EQName> {
		let (name, name_start, name_chars) = match self.lexer.current().clone() {
			Token::NCName(n) => {
				let start = self.lexer.token_start();
				let chars = n.chars().count();
				self.advance()?;
				(n, start, chars)
			}
			Token::Keyword(kw) => {
				let start = self.lexer.token_start();
				let n = kw.name().to_string();
				let chars = n.chars().count();
				self.advance()?;
				(n, start, chars)
			}
			Token::URIQName { uri, local } => {
				self.advance()?;
				return Ok(EQName {
					prefix: None,
					local,
					uri: Some(uri),
				});
			}
			_ => return Err(self.unexpected(what)),
		};
		if self.lexer.current() == &Token::Colon
			&& self.lexer.token_start() == name_start + name_chars
		{
			self.advance()?;
			let local = match self.lexer.current().clone() {
				Token::NCName(l) => l,
				_ => return Err(self.unexpected("a local name")),
			};
			self.advance()?;
			let uri = self.resolve_prefix(&name)?;
			return Ok(EQName {
				prefix: Some(name),
				local,
				uri,
			});
		}
		Ok(EQName {
			prefix: None,
			local: name,
			uri: None,
		})
	}

	/// The node test after an axis or `@`.
	fn parse_node_test(&mut self, axis: Axis) -> Result<NodeTest> {
		match self.lexer.current().clone() {
			Token::Star => {
				self.advance()?;
				Ok(NodeTest::Name(NameTest::Any))
			}
			Token::SuffixWildcard(local) => {
				self.advance()?;
				Ok(NodeTest::Name(NameTest::LocalWildcard { local }))
			}
			Token::URIQName { uri, local } => {
				self.advance()?;
				Ok(NodeTest::Name(NameTest::Name(EQName {
					prefix: None,
					local,
					uri: Some(uri),
				})))
			}
			Token::KindTest(
				kind @ (KindTestKind::Node
				| KindTestKind::Text
				| KindTestKind::Comment
				| KindTestKind::ProcessingInstruction
				| KindTestKind::DocumentNode
				| KindTestKind::Element
				| KindTestKind::Attribute
				| KindTestKind::SchemaElement
				| KindTestKind::SchemaAttribute
				| KindTestKind::NamespaceNode),
			) => {
				self.advance()?;
				Ok(NodeTest::Kind(self.parse_kind_test_body(kind)?))
			}
			Token::NCName(name) => {
				let name_start = self.lexer.token_start();
				let name_chars = name.chars().count();
				self.advance()?;
				if self.lexer.current() == &Token::Colon
					&& self.lexer.token_start() == name_start + name_chars
				{
					self.advance()?;
					match self.lexer.current().clone() {
						Token::Star => {
							self.advance()?;
							let uri = self.resolve_prefix(&name)?;
							Ok(NodeTest::Name(NameTest::NamespaceWildcard {
								prefix: name,
								uri,
							}))
						}
						Token::NCName(local) => {
							self.advance()?;
							let uri = self.resolve_prefix(&name)?;
							Ok(NodeTest::Name(NameTest::Name(EQName {
								prefix: Some(name),
								local,
								uri,
							})))
						}
						_ => Err(self.unexpected("a local name or '*'")),
					}
				} else {
					// the default element namespace does not apply to
					// attribute names
					let uri = if axis == Axis::Attribute || axis == Axis::Namespace {
						None
					} else {
						self.default_element_namespace()
					};
					Ok(NodeTest::Name(NameTest::Name(EQName {
						prefix: None,
						local: name,
						uri,
					})))
				}
			}
			_ => Err(self.unexpected("a node test")),
		}
	}

	/// The body of a kind test; the opening parenthesis has been
	/// consumed by the lexer.
	fn parse_kind_test_body(&mut self, kind: KindTestKind) -> Result<KindTest> {
		let kt = match kind {
			KindTestKind::Node => KindTest::AnyNode,
			KindTestKind::Text => KindTest::Text,
			KindTestKind::Comment => KindTest::Comment,
			KindTestKind::NamespaceNode => KindTest::NamespaceNode,
			KindTestKind::ProcessingInstruction => {
				let target = match self.lexer.current().clone() {
					Token::NCName(n) => {
						self.advance()?;
						Some(n)
					}
					Token::StringLiteral(s) => {
						self.advance()?;
						Some(s)
					}
					_ => None,
				};
				KindTest::ProcessingInstruction(target)
			}
			KindTestKind::DocumentNode => {
				// only an element or schema-element test may nest here;
				// the grammar bounds the depth at one
				let inner = match self.lexer.current().clone() {
					Token::KindTest(inner @ (KindTestKind::Element | KindTestKind::SchemaElement)) => {
						self.advance()?;
						Some(Box::new(self.parse_kind_test_body(inner)?))
					}
					_ => None,
				};
				KindTest::DocumentNode(inner)
			}
			KindTestKind::Element | KindTestKind::Attribute => {
				let mut name = None;
				let mut type_name = None;
				if self.lexer.current() != &Token::RParen {
					name = Some(match self.lexer.current().clone() {
						Token::Star => {
							self.advance()?;
							NameTest::Any
						}
						_ => {
							let n = self.parse_eqname("a name or '*'")?;
							NameTest::Name(n)
						}
					});
					if self.lexer.current() == &Token::Comma {
						self.advance()?;
						type_name = Some(self.parse_eqname("a type name")?);
						// an optional '?' marks nilled elements as
						// acceptable; it does not change the name
						if self.lexer.current() == &Token::Question {
							self.advance()?;
						}
					}
				}
				if kind == KindTestKind::Element {
					KindTest::Element { name, type_name }
				} else {
					KindTest::Attribute { name, type_name }
				}
			}
			KindTestKind::SchemaElement => {
				let n = self.parse_eqname("an element declaration name")?;
				KindTest::SchemaElement(n)
			}
			KindTestKind::SchemaAttribute => {
				let n = self.parse_eqname("an attribute declaration name")?;
				KindTest::SchemaAttribute(n)
			}
			KindTestKind::EmptySequence
			| KindTestKind::Item
			| KindTestKind::Function
			| KindTestKind::Map
			| KindTestKind::Array => {
				return Err(self.err_here("item type not allowed as node test"))
			}
		};
		self.expect(&Token::RParen, "')'")?;
		Ok(kt)
	}

	/// `function(` in operand position: an inline function.
	fn parse_inline_function(&mut self) -> Result<()> {
		let mut params = Vec::new();
		if self.lexer.current() != &Token::RParen {
			loop {
				self.expect(&Token::Dollar, "'$'")?;
				let name = self.parse_eqname("parameter name")?;
				let ty = match self.lexer.current() {
					Token::Keyword(Keyword::As) => {
						self.advance()?;
						Some(self.parse_sequence_type()?)
					}
					_ => None,
				};
				params.push(Param { name, ty });
				match self.lexer.current() {
					Token::Comma => self.advance()?,
					Token::RParen => break,
					_ => return Err(self.unexpected("',' or ')'")),
				}
			}
		}
		self.expect(&Token::RParen, "')'")?;
		let return_type = match self.lexer.current() {
			Token::Keyword(Keyword::As) => {
				self.advance()?;
				Some(self.parse_sequence_type()?)
			}
			_ => None,
		};
		self.expect(&Token::LBrace, "'{'")?;
		if self.lexer.current() == &Token::RBrace {
			self.advance()?;
			self.set_base(Expr::InlineFunction {
				params,
				return_type,
				body: Box::new(Expr::Sequence(Vec::new())),
			});
			return Ok(());
		}
		self.stack.push(Frame::new(
			ContextType::Parenthesized,
			Completion::FnBody {
				params,
				return_type,
			},
		));
		Ok(())
	}

	// ------------------------------------------------------------------
	// PATH_CONTINUATION / BUILDING_*
	// ------------------------------------------------------------------

	fn path_continuation(&mut self) -> Result<()> {
		match self.lexer.current().clone() {
			Token::LBracket => {
				self.top().state = ParseState::BuildingFilter;
				Ok(())
			}
			Token::Question => {
				self.advance()?;
				let base = self.top().filter_base.take();
				self.parse_lookup(base)
			}
			Token::LParen => {
				// a dynamic call; steps cannot be called
				let permits = !matches!(
					self.top().filter_base,
					Some(Expr::Step { .. }) | None
				);
				if !permits {
					return Err(self.err_here("this expression cannot be called"));
				}
				self.top().state = ParseState::BuildingFunction;
				Ok(())
			}
			Token::Slash | Token::DoubleSlash => {
				let double = self.lexer.current() == &Token::DoubleSlash;
				{
					let f = self.top();
					let seg = f.filter_base.take().expect("path continuation base");
					f.steps.push(seg);
					f.in_path = true;
					if double {
						f.steps.push(Self::descendant_or_self_step());
					}
					f.state = ParseState::NeedOperand;
				}
				self.advance()?;
				Ok(())
			}
			_ => self.finalize_segment(),
		}
	}

	fn building_function(&mut self) -> Result<()> {
		// `(` of a dynamic call
		self.expect(&Token::LParen, "'('")?;
		let base = self.top().filter_base.take().expect("dynamic call base");
		self.top().state = ParseState::PathContinuation;
		self.begin_call(None, Some(base))
	}

	fn building_filter(&mut self) -> Result<()> {
		self.expect(&Token::LBracket, "'['")?;
		self.top().state = ParseState::PathContinuation;
		self.stack
			.push(Frame::new(ContextType::Predicate, Completion::Predicate));
		Ok(())
	}

	// ------------------------------------------------------------------
	// HAVE_OPERAND
	// ------------------------------------------------------------------

	fn reduce_while(&mut self, prec: u8) {
		let f = self.top();
		while let Some((op, p)) = f.operators.last().copied() {
			if p < prec {
				break;
			}
			f.operators.pop();
			let right = f.operands.pop().expect("missing right operand");
			let left = f.operands.pop().expect("missing left operand");
			f.operands.push(Expr::Binary {
				op,
				left: Box::new(left),
				right: Box::new(right),
			});
		}
	}

	fn reduce_all(&mut self) {
		self.reduce_while(0);
	}

	fn have_operand(&mut self) -> Result<Option<Expr>> {
		let tok = self.lexer.current().clone();
		if let Some((op, follower)) = type_op(&tok) {
			// reduce anything of equal or higher precedence, then wrap
			// the operand in the type operation
			self.reduce_while(PREC_TYPE);
			self.advance()?;
			match self.lexer.current() {
				Token::Keyword(kw) if *kw == follower => self.advance()?,
				_ => {
					return Err(self.unexpected(match follower {
						Keyword::Of => "'of'",
						_ => "'as'",
					}))
				}
			}
			let ty = self.parse_sequence_type()?;
			if matches!(op, TypeOp::CastAs | TypeOp::CastableAs) {
				// cast targets are single atomic types
				match &ty {
					SequenceType::Item {
						item: ItemType::Atomic(_),
						occurrence: Occurrence::One,
					}
					| SequenceType::Item {
						item: ItemType::Atomic(_),
						occurrence: Occurrence::Optional,
					} => (),
					_ => {
						return Err(self.err_here("cast target must be an atomic type"))
					}
				}
			}
			let f = self.top();
			let operand = f.operands.pop().expect("missing type operand");
			f.operands.push(Expr::TypeExpr {
				op,
				operand: Box::new(operand),
				ty,
			});
			return Ok(None);
		}
		if let Some((op, prec)) = binary_op(&tok) {
			self.reduce_while(prec);
			self.top().operators.push((op, prec));
			self.advance()?;
			self.top().state = ParseState::NeedOperand;
			return Ok(None);
		}
		self.reduce_all();
		self.complete_context()
	}

	fn take_operand(&mut self) -> Expr {
		let f = self.top();
		debug_assert!(f.operators.is_empty());
		debug_assert_eq!(f.operands.len(), 1);
		f.operands.pop().expect("missing operand")
	}

	/// Hand the finished expression of a popped frame to the parent as a
	/// postfix base.
	fn deliver_base(&mut self, e: Expr) {
		let f = self.top();
		debug_assert!(f.filter_base.is_none());
		f.filter_base = Some(e);
		f.state = ParseState::PathContinuation;
	}

	/// Hand the finished expression of a popped frame to the parent as a
	/// complete operand (no postfix operations).
	fn deliver_operand(&mut self, e: Expr) -> Result<()> {
		if self.top().in_path {
			return Err(self.err_here("this expression cannot be used as a path step"));
		}
		self.push_operand(e);
		Ok(())
	}

	/// The "no operator follows" transition: finish the current context.
	fn complete_context(&mut self) -> Result<Option<Expr>> {
		let tok = self.lexer.current().clone();
		let operand = self.take_operand();
		let frame = self.stack.pop().expect("empty context stack");
		let Frame {
			completion,
			mut items,
			ctx,
			..
		} = frame;
		match completion {
			Completion::Root => match tok {
				Token::Comma => {
					items.push(operand);
					let mut f = Frame::new(ContextType::Sequence, Completion::Root);
					f.items = items;
					self.stack.push(f);
					self.advance()?;
					Ok(None)
				}
				Token::Eof => {
					if items.is_empty() {
						Ok(Some(operand))
					} else {
						items.push(operand);
						Ok(Some(Expr::Sequence(items)))
					}
				}
				_ => Err(self.unexpected(if ctx == ContextType::Sequence {
					"',' or end of expression"
				} else {
					"an operator or end of expression"
				})),
			},
			Completion::Paren => match tok {
				Token::Comma => {
					items.push(operand);
					let mut f = Frame::new(ContextType::Sequence, Completion::Paren);
					f.items = items;
					self.stack.push(f);
					self.advance()?;
					Ok(None)
				}
				Token::RParen => {
					self.advance()?;
					let e = if items.is_empty() {
						operand
					} else {
						items.push(operand);
						Expr::Sequence(items)
					};
					self.deliver_base(e);
					Ok(None)
				}
				_ => Err(self.unexpected("',' or ')'")),
			},
			Completion::Args { name, base } => match tok {
				Token::Comma => {
					items.push(operand);
					let mut f = Frame::new(
						ContextType::FunctionArg,
						Completion::Args { name, base },
					);
					f.items = items;
					self.stack.push(f);
					self.advance()?;
					Ok(None)
				}
				Token::RParen => {
					self.advance()?;
					items.push(operand);
					let call = match (name, base) {
						(Some(name), None) => Expr::FunctionCall { name, args: items },
						(None, Some(base)) => Expr::DynamicCall {
							base: Box::new(base),
							args: items,
						},
						_ => unreachable!("call with both or neither of name/base"),
					};
					self.deliver_base(call);
					Ok(None)
				}
				_ => Err(self.unexpected("',' or ')'")),
			},
			Completion::Predicate => match tok {
				Token::RBracket => {
					self.advance()?;
					let parent = self.top();
					let attached = match parent.filter_base.take() {
						Some(Expr::Step {
							axis,
							node_test,
							mut predicates,
						}) => {
							predicates.push(operand);
							Expr::Step {
								axis,
								node_test,
								predicates,
							}
						}
						Some(Expr::FilterExpr {
							base,
							mut predicates,
						}) => {
							predicates.push(operand);
							Expr::FilterExpr { base, predicates }
						}
						Some(other) => Expr::FilterExpr {
							base: Box::new(other),
							predicates: vec![operand],
						},
						None => unreachable!("predicate without base"),
					};
					parent.filter_base = Some(attached);
					parent.state = ParseState::PathContinuation;
					Ok(None)
				}
				_ => Err(self.unexpected("']'")),
			},
			Completion::IfCondition => match tok {
				Token::RParen => {
					self.advance()?;
					match self.lexer.current() {
						Token::Keyword(Keyword::Then) => self.advance()?,
						_ => return Err(self.unexpected("'then'")),
					}
					self.stack.push(Frame::new(
						ContextType::TopLevel,
						Completion::IfThen { condition: operand },
					));
					Ok(None)
				}
				_ => Err(self.unexpected("')'")),
			},
			Completion::IfThen { condition } => match tok {
				Token::Keyword(Keyword::Else) => {
					self.advance()?;
					self.stack.push(Frame::new(
						ContextType::TopLevel,
						Completion::IfElse {
							condition,
							then: operand,
						},
					));
					Ok(None)
				}
				_ => Err(self.unexpected("'else'")),
			},
			Completion::IfElse { condition, then } => {
				// the boundary token stays current for the parent
				let e = Expr::If {
					condition: Box::new(condition),
					then: Box::new(then),
					else_: Box::new(operand),
				};
				self.deliver_operand(e)?;
				Ok(None)
			}
			Completion::BindingValue {
				kind,
				mut bindings,
				var,
			} => {
				bindings.push(Binding {
					var,
					value: operand,
				});
				match tok {
					Token::Comma => {
						self.advance()?;
						self.parse_binding_head(kind, bindings)?;
						Ok(None)
					}
					Token::Keyword(Keyword::Return)
						if matches!(kind, BindKind::For | BindKind::Let) =>
					{
						self.advance()?;
						self.stack.push(Frame::new(
							ContextType::TopLevel,
							Completion::Body { kind, bindings },
						));
						Ok(None)
					}
					Token::Keyword(Keyword::Satisfies)
						if matches!(kind, BindKind::Some | BindKind::Every) =>
					{
						self.advance()?;
						self.stack.push(Frame::new(
							ContextType::TopLevel,
							Completion::Body { kind, bindings },
						));
						Ok(None)
					}
					_ => Err(self.unexpected(match kind {
						BindKind::For | BindKind::Let => "',' or 'return'",
						BindKind::Some | BindKind::Every => "',' or 'satisfies'",
					})),
				}
			}
			Completion::Body { kind, bindings } => {
				let body = Box::new(operand);
				let e = match kind {
					BindKind::For => Expr::For { bindings, body },
					BindKind::Let => Expr::Let { bindings, body },
					BindKind::Some => Expr::Quantified {
						quantifier: Quantifier::Some,
						bindings,
						body,
					},
					BindKind::Every => Expr::Quantified {
						quantifier: Quantifier::Every,
						bindings,
						body,
					},
				};
				self.deliver_operand(e)?;
				Ok(None)
			}
			Completion::MapKey { entries } => match tok {
				Token::Colon => {
					self.advance()?;
					self.stack.push(Frame::new(
						ContextType::Parenthesized,
						Completion::MapValue {
							entries,
							key: operand,
						},
					));
					Ok(None)
				}
				_ => Err(self.unexpected("':'")),
			},
			Completion::MapValue { mut entries, key } => {
				entries.push((key, operand));
				match tok {
					Token::Comma => {
						self.advance()?;
						self.stack.push(Frame::new(
							ContextType::Parenthesized,
							Completion::MapKey { entries },
						));
						Ok(None)
					}
					Token::RBrace => {
						self.advance()?;
						self.deliver_base(Expr::MapConstructor { entries });
						Ok(None)
					}
					_ => Err(self.unexpected("',' or '}'")),
				}
			}
			Completion::SquareArray => match tok {
				Token::Comma => {
					items.push(operand);
					let mut f = Frame::new(ContextType::Sequence, Completion::SquareArray);
					f.items = items;
					self.stack.push(f);
					self.advance()?;
					Ok(None)
				}
				Token::RBracket => {
					self.advance()?;
					items.push(operand);
					self.deliver_base(Expr::ArrayConstructor { members: items });
					Ok(None)
				}
				_ => Err(self.unexpected("',' or ']'")),
			},
			Completion::CurlyArray => match tok {
				Token::Comma => {
					items.push(operand);
					let mut f = Frame::new(ContextType::Sequence, Completion::CurlyArray);
					f.items = items;
					self.stack.push(f);
					self.advance()?;
					Ok(None)
				}
				Token::RBrace => {
					self.advance()?;
					items.push(operand);
					self.deliver_base(Expr::ArrayConstructor { members: items });
					Ok(None)
				}
				_ => Err(self.unexpected("',' or '}'")),
			},
			Completion::FnBody {
				params,
				return_type,
			} => match tok {
				Token::RBrace => {
					self.advance()?;
					self.deliver_base(Expr::InlineFunction {
						params,
						return_type,
						body: Box::new(operand),
					});
					Ok(None)
				}
				_ => Err(self.unexpected("'}'")),
			},
			Completion::LookupKey { base } => match tok {
				Token::RParen => {
					self.advance()?;
					self.deliver_base(Expr::Lookup {
						base: base.map(Box::new),
						key: LookupKey::Expr(Box::new(operand)),
					});
					Ok(None)
				}
				_ => Err(self.unexpected("')'")),
			},
		}
	}

	// ------------------------------------------------------------------
	// Sequence types
	// ------------------------------------------------------------------

	/// Parse a SequenceType with an explicit stack for the nested type
	/// forms (`map(K, V)`, `array(T)`, `function(…) as T`).
	fn parse_sequence_type(&mut self) -> Result<SequenceType> {
		enum TFrame {
			Map { key: EQName },
			Array,
			FnParams { params: Vec<SequenceType> },
			FnReturn { params: Vec<SequenceType> },
		}
		let mut tstack: Vec<TFrame> = Vec::new();
		'produce: loop {
			// produce one sequence type, possibly opening nested frames
			let mut produced: SequenceType = loop {
				match self.lexer.current().clone() {
					Token::KindTest(KindTestKind::EmptySequence) => {
						self.advance()?;
						self.expect(&Token::RParen, "')'")?;
						break SequenceType::Empty;
					}
					Token::KindTest(KindTestKind::Item) => {
						self.advance()?;
						self.expect(&Token::RParen, "')'")?;
						let occurrence = self.parse_occurrence()?;
						break SequenceType::Item {
							item: ItemType::AnyItem,
							occurrence,
						};
					}
					Token::KindTest(KindTestKind::Function) => {
						self.advance()?;
						if self.lexer.current() == &Token::Star {
							self.advance()?;
							self.expect(&Token::RParen, "')'")?;
							let occurrence = self.parse_occurrence()?;
							break SequenceType::Item {
								item: ItemType::FunctionTest(None),
								occurrence,
							};
						}
						if self.lexer.current() == &Token::RParen {
							self.advance()?;
							match self.lexer.current() {
								Token::Keyword(Keyword::As) => self.advance()?,
								_ => return Err(self.unexpected("'as'")),
							}
							tstack.push(TFrame::FnReturn { params: Vec::new() });
							continue;
						}
						tstack.push(TFrame::FnParams { params: Vec::new() });
						continue;
					}
					Token::KindTest(KindTestKind::Map) => {
						self.advance()?;
						if self.lexer.current() == &Token::Star {
							self.advance()?;
							self.expect(&Token::RParen, "')'")?;
							let occurrence = self.parse_occurrence()?;
							break SequenceType::Item {
								item: ItemType::MapTest(None),
								occurrence,
							};
						}
						let key = self.parse_eqname("a key type")?;
						self.expect(&Token::Comma, "','")?;
						tstack.push(TFrame::Map { key });
						continue;
					}
					Token::KindTest(KindTestKind::Array) => {
						self.advance()?;
						if self.lexer.current() == &Token::Star {
							self.advance()?;
							self.expect(&Token::RParen, "')'")?;
							let occurrence = self.parse_occurrence()?;
							break SequenceType::Item {
								item: ItemType::ArrayTest(None),
								occurrence,
							};
						}
						tstack.push(TFrame::Array);
						continue;
					}
					Token::KindTest(kind) => {
						self.advance()?;
						let kt = self.parse_kind_test_body(kind)?;
						let occurrence = self.parse_occurrence()?;
						break SequenceType::Item {
							item: ItemType::Kind(kt),
							occurrence,
						};
					}
					Token::NCName(_) | Token::Keyword(_) | Token::URIQName { .. } => {
						let name = self.parse_eqname("a type name")?;
						let occurrence = self.parse_occurrence()?;
						break SequenceType::Item {
							item: ItemType::Atomic(name),
							occurrence,
						};
					}
					_ => return Err(self.unexpected("a sequence type")),
				}
			};
			// fold the produced type into the pending frames
			loop {
				match tstack.pop() {
					None => return Ok(produced),
					Some(TFrame::Map { key }) => {
						self.expect(&Token::RParen, "')'")?;
						let occurrence = self.parse_occurrence()?;
						produced = SequenceType::Item {
							item: ItemType::MapTest(Some((key, Box::new(produced)))),
							occurrence,
						};
					}
					Some(TFrame::Array) => {
						self.expect(&Token::RParen, "')'")?;
						let occurrence = self.parse_occurrence()?;
						produced = SequenceType::Item {
							item: ItemType::ArrayTest(Some(Box::new(produced))),
							occurrence,
						};
					}
					Some(TFrame::FnParams { mut params }) => {
						params.push(produced);
						match self.lexer.current() {
							Token::Comma => {
								self.advance()?;
								tstack.push(TFrame::FnParams { params });
								continue 'produce;
							}
							Token::RParen => {
								self.advance()?;
								match self.lexer.current() {
									Token::Keyword(Keyword::As) => self.advance()?,
									_ => return Err(self.unexpected("'as'")),
								}
								tstack.push(TFrame::FnReturn { params });
								continue 'produce;
							}
							_ => return Err(self.unexpected("',' or ')'")),
						}
					}
					Some(TFrame::FnReturn { params }) => {
						let occurrence = self.parse_occurrence()?;
						produced = SequenceType::Item {
							item: ItemType::FunctionTest(Some((params, Box::new(produced)))),
							occurrence,
						};
					}
				}
			}
		}
	}

	/// An optional occurrence indicator; the tokens arrive as the
	/// operator-context spellings of `?`, `*` and `+`.
	fn parse_occurrence(&mut self) -> Result<Occurrence> {
		let occ = match self.lexer.current() {
			Token::Question => Occurrence::Optional,
			Token::Multiply => Occurrence::ZeroOrMore,
			Token::Plus => Occurrence::OneOrMore,
			_ => return Ok(Occurrence::One),
		};
		self.advance()?;
		Ok(occ)
	}
}
