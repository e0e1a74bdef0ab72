/*!
# Abstract syntax of XPath expressions

The AST is a closed sum. Nodes own their children by value; after
construction the tree is immutable and may be shared freely (all types are
`Send + Sync`).

[`Expr`] implements [`std::fmt::Display`] producing a canonical,
fully-parenthesized rendition which parses back to an equivalent tree.
*/
use std::fmt;

pub use super::token::Axis;

/// An expanded qualified name as it occurs in the AST.
///
/// When a resolver was available at compile time, `uri` carries the
/// resolved namespace; otherwise the prefix is retained for late binding.
#[derive(Debug, Clone, PartialEq)]
pub struct EQName {
	pub prefix: Option<String>,
	pub local: String,
	pub uri: Option<String>,
}

impl EQName {
	pub fn local(local: impl Into<String>) -> Self {
		Self {
			prefix: None,
			local: local.into(),
			uri: None,
		}
	}
}

impl fmt::Display for EQName {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		if let Some(uri) = self.uri.as_ref() {
			return write!(f, "Q{{{}}}{}", uri, self.local);
		}
		if let Some(prefix) = self.prefix.as_ref() {
			return write!(f, "{}:{}", prefix, self.local);
		}
		f.write_str(&self.local)
	}
}

/// A literal value.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
	String(String),
	Number(f64),
}

/// The name part of a node test.
#[derive(Debug, Clone, PartialEq)]
pub enum NameTest {
	/// `*`
	Any,
	/// `name` or `prefix:name` or `Q{uri}name`
	Name(EQName),
	/// `prefix:*`
	NamespaceWildcard { prefix: String, uri: Option<String> },
	/// `*:local`
	LocalWildcard { local: String },
}

impl fmt::Display for NameTest {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Self::Any => f.write_str("*"),
			Self::Name(n) => n.fmt(f),
			Self::NamespaceWildcard { prefix, uri } => match uri {
				Some(uri) => write!(f, "Q{{{}}}*", uri),
				None => write!(f, "{}:*", prefix),
			},
			Self::LocalWildcard { local } => write!(f, "*:{}", local),
		}
	}
}

/// A node-kind test.
#[derive(Debug, Clone, PartialEq)]
pub enum KindTest {
	AnyNode,
	Text,
	Comment,
	/// `processing-instruction()` with optional target
	ProcessingInstruction(Option<String>),
	/// `document-node()` with optional element test
	DocumentNode(Option<Box<KindTest>>),
	/// `element()` / `element(name)` / `element(name, type)`
	Element {
		name: Option<NameTest>,
		type_name: Option<EQName>,
	},
	/// `attribute()` / `attribute(name)` / `attribute(name, type)`
	Attribute {
		name: Option<NameTest>,
		type_name: Option<EQName>,
	},
	SchemaElement(EQName),
	SchemaAttribute(EQName),
	NamespaceNode,
}

impl fmt::Display for KindTest {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Self::AnyNode => f.write_str("node()"),
			Self::Text => f.write_str("text()"),
			Self::Comment => f.write_str("comment()"),
			Self::ProcessingInstruction(None) => f.write_str("processing-instruction()"),
			Self::ProcessingInstruction(Some(t)) => {
				write!(f, "processing-instruction({})", t)
			}
			Self::DocumentNode(None) => f.write_str("document-node()"),
			Self::DocumentNode(Some(inner)) => write!(f, "document-node({})", inner),
			Self::Element { name, type_name } => {
				f.write_str("element(")?;
				if let Some(name) = name {
					name.fmt(f)?;
					if let Some(ty) = type_name {
						write!(f, ", {}", ty)?;
					}
				}
				f.write_str(")")
			}
			Self::Attribute { name, type_name } => {
				f.write_str("attribute(")?;
				if let Some(name) = name {
					name.fmt(f)?;
					if let Some(ty) = type_name {
						write!(f, ", {}", ty)?;
					}
				}
				f.write_str(")")
			}
			Self::SchemaElement(n) => write!(f, "schema-element({})", n),
			Self::SchemaAttribute(n) => write!(f, "schema-attribute({})", n),
			Self::NamespaceNode => f.write_str("namespace-node()"),
		}
	}
}

/// The test of a step: by name or by kind.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeTest {
	Name(NameTest),
	Kind(KindTest),
}

impl fmt::Display for NodeTest {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Self::Name(nt) => nt.fmt(f),
			Self::Kind(kt) => kt.fmt(f),
		}
	}
}

/// Occurrence indicator of a sequence type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occurrence {
	One,
	Optional,
	ZeroOrMore,
	OneOrMore,
}

impl Occurrence {
	fn suffix(&self) -> &'static str {
		match self {
			Self::One => "",
			Self::Optional => "?",
			Self::ZeroOrMore => "*",
			Self::OneOrMore => "+",
		}
	}
}

/// An item type, as used inside a [`SequenceType`].
#[derive(Debug, Clone, PartialEq)]
pub enum ItemType {
	/// `item()`
	AnyItem,
	/// A named (atomic or union) type
	Atomic(EQName),
	/// A node kind test
	Kind(KindTest),
	/// `function(*)` or `function(types...) as type`
	FunctionTest(Option<(Vec<SequenceType>, Box<SequenceType>)>),
	/// `map(*)` or `map(key-type, value-type)`
	MapTest(Option<(EQName, Box<SequenceType>)>),
	/// `array(*)` or `array(type)`
	ArrayTest(Option<Box<SequenceType>>),
}

impl fmt::Display for ItemType {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Self::AnyItem => f.write_str("item()"),
			Self::Atomic(n) => n.fmt(f),
			Self::Kind(k) => k.fmt(f),
			Self::FunctionTest(None) => f.write_str("function(*)"),
			Self::FunctionTest(Some((params, ret))) => {
				f.write_str("function(")?;
				for (i, p) in params.iter().enumerate() {
					if i > 0 {
						f.write_str(", ")?;
					}
					p.fmt(f)?;
				}
				write!(f, ") as {}", ret)
			}
			Self::MapTest(None) => f.write_str("map(*)"),
			Self::MapTest(Some((k, v))) => write!(f, "map({}, {})", k, v),
			Self::ArrayTest(None) => f.write_str("array(*)"),
			Self::ArrayTest(Some(t)) => write!(f, "array({})", t),
		}
	}
}

/// A sequence type (XPath 3.1 § 2.5.3).
#[derive(Debug, Clone, PartialEq)]
pub enum SequenceType {
	/// `empty-sequence()`
	Empty,
	Item {
		item: ItemType,
		occurrence: Occurrence,
	},
}

impl fmt::Display for SequenceType {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Self::Empty => f.write_str("empty-sequence()"),
			Self::Item { item, occurrence } => {
				write!(f, "{}{}", item, occurrence.suffix())
			}
		}
	}
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
	Or,
	And,
	// general comparisons
	GeneralEq,
	GeneralNe,
	GeneralLt,
	GeneralLe,
	GeneralGt,
	GeneralGe,
	// value comparisons
	ValueEq,
	ValueNe,
	ValueLt,
	ValueLe,
	ValueGt,
	ValueGe,
	// node comparison
	Is,
	Range,
	Add,
	Subtract,
	Multiply,
	Divide,
	IntegerDivide,
	Modulo,
	Union,
	Intersect,
	Except,
}

impl BinaryOp {
	pub fn symbol(&self) -> &'static str {
		match self {
			Self::Or => "or",
			Self::And => "and",
			Self::GeneralEq => "=",
			Self::GeneralNe => "!=",
			Self::GeneralLt => "<",
			Self::GeneralLe => "<=",
			Self::GeneralGt => ">",
			Self::GeneralGe => ">=",
			Self::ValueEq => "eq",
			Self::ValueNe => "ne",
			Self::ValueLt => "lt",
			Self::ValueLe => "le",
			Self::ValueGt => "gt",
			Self::ValueGe => "ge",
			Self::Is => "is",
			Self::Range => "to",
			Self::Add => "+",
			Self::Subtract => "-",
			Self::Multiply => "*",
			Self::Divide => "div",
			Self::IntegerDivide => "idiv",
			Self::Modulo => "mod",
			Self::Union => "|",
			Self::Intersect => "intersect",
			Self::Except => "except",
		}
	}
}

/// Type-operation kinds (`instance of` etc.).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeOp {
	InstanceOf,
	CastAs,
	CastableAs,
	TreatAs,
}

impl TypeOp {
	pub fn symbol(&self) -> &'static str {
		match self {
			Self::InstanceOf => "instance of",
			Self::CastAs => "cast as",
			Self::CastableAs => "castable as",
			Self::TreatAs => "treat as",
		}
	}
}

/// Quantifier of a quantified expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantifier {
	Some,
	Every,
}

/// One `$var in expr` / `$var := expr` binding.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
	pub var: EQName,
	pub value: Expr,
}

/// A parameter of an inline function.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
	pub name: EQName,
	pub ty: Option<SequenceType>,
}

/// A lookup key (`?key`, `?2`, `?*`, `?(expr)`).
#[derive(Debug, Clone, PartialEq)]
pub enum LookupKey {
	Name(String),
	Integer(u64),
	Wildcard,
	Expr(Box<Expr>),
}

impl fmt::Display for LookupKey {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Self::Name(n) => f.write_str(n),
			Self::Integer(i) => write!(f, "{}", i),
			Self::Wildcard => f.write_str("*"),
			Self::Expr(e) => write!(f, "({})", e),
		}
	}
}

/**
# XPath expression tree

The closed sum over all expression forms. See the module documentation for
the sharing guarantees.
*/
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
	Literal(Literal),
	VariableRef(EQName),
	/// `.`
	ContextItem,
	/// A path; steps are [`Expr::Step`], possibly wrapped in
	/// [`Expr::FilterExpr`], or arbitrary expressions for non-step
	/// segments.
	LocationPath {
		absolute: bool,
		steps: Vec<Expr>,
	},
	/// A single step.
	Step {
		axis: Axis,
		node_test: NodeTest,
		predicates: Vec<Expr>,
	},
	/// A non-step primary followed by a relative path.
	PathExpr {
		filter: Box<Expr>,
		path: Box<Expr>,
	},
	/// A primary expression with predicates.
	FilterExpr {
		base: Box<Expr>,
		predicates: Vec<Expr>,
	},
	Binary {
		op: BinaryOp,
		left: Box<Expr>,
		right: Box<Expr>,
	},
	/// Unary `-` (and `+`, which contributes no negations).
	Unary {
		operand: Box<Expr>,
		negations: u32,
	},
	FunctionCall {
		name: EQName,
		args: Vec<Expr>,
	},
	/// `name#arity`
	NamedFunctionRef {
		name: EQName,
		arity: usize,
	},
	InlineFunction {
		params: Vec<Param>,
		return_type: Option<SequenceType>,
		body: Box<Expr>,
	},
	/// `base(args)` where base is itself an expression
	DynamicCall {
		base: Box<Expr>,
		args: Vec<Expr>,
	},
	/// `?` in an argument list (partial application)
	ArgumentPlaceholder,
	/// `base?key` (postfix) or `?key` (unary, base = None)
	Lookup {
		base: Option<Box<Expr>>,
		key: LookupKey,
	},
	MapConstructor {
		entries: Vec<(Expr, Expr)>,
	},
	ArrayConstructor {
		members: Vec<Expr>,
	},
	If {
		condition: Box<Expr>,
		then: Box<Expr>,
		else_: Box<Expr>,
	},
	For {
		bindings: Vec<Binding>,
		body: Box<Expr>,
	},
	Let {
		bindings: Vec<Binding>,
		body: Box<Expr>,
	},
	Quantified {
		quantifier: Quantifier,
		bindings: Vec<Binding>,
		body: Box<Expr>,
	},
	Sequence(Vec<Expr>),
	TypeExpr {
		op: TypeOp,
		operand: Box<Expr>,
		ty: SequenceType,
	},
}

fn fmt_string_literal(f: &mut fmt::Formatter, s: &str) -> fmt::Result {
	f.write_str("\"")?;
	for ch in s.chars() {
		if ch == '"' {
			f.write_str("\"\"")?;
		} else {
			write!(f, "{}", ch)?;
		}
	}
	f.write_str("\"")
}

fn fmt_bindings(
	f: &mut fmt::Formatter,
	bindings: &[Binding],
	separator: &str,
) -> fmt::Result {
	for (i, b) in bindings.iter().enumerate() {
		if i > 0 {
			f.write_str(", ")?;
		}
		write!(f, "${} {} {}", b.var, separator, b.value)?;
	}
	Ok(())
}

impl fmt::Display for Expr {
	/// Canonical rendition: operator expressions are always
	/// parenthesized, so precedence survives a round trip regardless of
	/// the original spelling.
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Expr::Literal(Literal::String(s)) => fmt_string_literal(f, s),
			Expr::Literal(Literal::Number(n)) => write!(f, "{}", n),
			Expr::VariableRef(name) => write!(f, "${}", name),
			Expr::ContextItem => f.write_str("."),
			Expr::LocationPath { absolute, steps } => {
				if *absolute {
					f.write_str("/")?;
				}
				for (i, step) in steps.iter().enumerate() {
					if i > 0 {
						f.write_str("/")?;
					}
					step.fmt(f)?;
				}
				Ok(())
			}
			Expr::Step {
				axis,
				node_test,
				predicates,
			} => {
				write!(f, "{}::{}", axis, node_test)?;
				for p in predicates {
					write!(f, "[{}]", p)?;
				}
				Ok(())
			}
			Expr::PathExpr { filter, path } => write!(f, "{}/{}", filter, path),
			Expr::FilterExpr { base, predicates } => {
				write!(f, "({})", base)?;
				for p in predicates {
					write!(f, "[{}]", p)?;
				}
				Ok(())
			}
			Expr::Binary { op, left, right } => {
				write!(f, "({} {} {})", left, op.symbol(), right)
			}
			Expr::Unary { operand, negations } => {
				for _ in 0..*negations {
					f.write_str("-")?;
				}
				write!(f, "({})", operand)
			}
			Expr::FunctionCall { name, args } => {
				write!(f, "{}(", name)?;
				for (i, arg) in args.iter().enumerate() {
					if i > 0 {
						f.write_str(", ")?;
					}
					arg.fmt(f)?;
				}
				f.write_str(")")
			}
			Expr::NamedFunctionRef { name, arity } => write!(f, "{}#{}", name, arity),
			Expr::InlineFunction {
				params,
				return_type,
				body,
			} => {
				f.write_str("function(")?;
				for (i, p) in params.iter().enumerate() {
					if i > 0 {
						f.write_str(", ")?;
					}
					write!(f, "${}", p.name)?;
					if let Some(ty) = p.ty.as_ref() {
						write!(f, " as {}", ty)?;
					}
				}
				f.write_str(")")?;
				if let Some(rt) = return_type.as_ref() {
					write!(f, " as {}", rt)?;
				}
				write!(f, " {{ {} }}", body)
			}
			Expr::DynamicCall { base, args } => {
				write!(f, "({})(", base)?;
				for (i, arg) in args.iter().enumerate() {
					if i > 0 {
						f.write_str(", ")?;
					}
					arg.fmt(f)?;
				}
				f.write_str(")")
			}
			Expr::ArgumentPlaceholder => f.write_str("?"),
			Expr::Lookup { base, key } => match base {
				Some(base) => write!(f, "({})?{}", base, key),
				None => write!(f, "?{}", key),
			},
			Expr::MapConstructor { entries } => {
				f.write_str("map { ")?;
				for (i, (k, v)) in entries.iter().enumerate() {
					if i > 0 {
						f.write_str(", ")?;
					}
					write!(f, "{} : {}", k, v)?;
				}
				f.write_str(" }")
			}
			Expr::ArrayConstructor { members } => {
				f.write_str("array { ")?;
				for (i, m) in members.iter().enumerate() {
					if i > 0 {
						f.write_str(", ")?;
					}
					m.fmt(f)?;
				}
				f.write_str(" }")
			}
			Expr::If {
				condition,
				then,
				else_,
			} => write!(f, "if ({}) then {} else {}", condition, then, else_),
			Expr::For { bindings, body } => {
				f.write_str("for ")?;
				fmt_bindings(f, bindings, "in")?;
				write!(f, " return {}", body)
			}
			Expr::Let { bindings, body } => {
				f.write_str("let ")?;
				fmt_bindings(f, bindings, ":=")?;
				write!(f, " return {}", body)
			}
			Expr::Quantified {
				quantifier,
				bindings,
				body,
			} => {
				f.write_str(match quantifier {
					Quantifier::Some => "some ",
					Quantifier::Every => "every ",
				})?;
				fmt_bindings(f, bindings, "in")?;
				write!(f, " satisfies {}", body)
			}
			Expr::Sequence(items) => {
				f.write_str("(")?;
				for (i, item) in items.iter().enumerate() {
					if i > 0 {
						f.write_str(", ")?;
					}
					item.fmt(f)?;
				}
				f.write_str(")")
			}
			Expr::TypeExpr { op, operand, ty } => {
				write!(f, "({} {} {})", operand, op.symbol(), ty)
			}
		}
	}
}

impl Expr {
	/// True if the expression can stand as a path segment without a
	/// wrapping [`Expr::PathExpr`].
	pub(crate) fn is_step_like(&self) -> bool {
		match self {
			Expr::Step { .. } | Expr::ContextItem => true,
			Expr::FilterExpr { base, .. } => base.is_step_like(),
			_ => false,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn display_literals() {
		assert_eq!(
			Expr::Literal(Literal::String("a\"b".into())).to_string(),
			"\"a\"\"b\""
		);
		assert_eq!(Expr::Literal(Literal::Number(2.5)).to_string(), "2.5");
	}

	#[test]
	fn display_step_with_predicates() {
		let e = Expr::Step {
			axis: Axis::Child,
			node_test: NodeTest::Name(NameTest::Name(EQName::local("a"))),
			predicates: vec![Expr::Literal(Literal::Number(1.0))],
		};
		assert_eq!(e.to_string(), "child::a[1]");
	}

	#[test]
	fn display_binary_parenthesizes() {
		let e = Expr::Binary {
			op: BinaryOp::Add,
			left: Box::new(Expr::Literal(Literal::Number(1.0))),
			right: Box::new(Expr::Binary {
				op: BinaryOp::Multiply,
				left: Box::new(Expr::Literal(Literal::Number(2.0))),
				right: Box::new(Expr::Literal(Literal::Number(3.0))),
			}),
		};
		assert_eq!(e.to_string(), "(1 + (2 * 3))");
	}

	#[test]
	fn ast_is_send_and_sync() {
		fn assert_send_sync<T: Send + Sync>() {}
		assert_send_sync::<Expr>();
	}
}
