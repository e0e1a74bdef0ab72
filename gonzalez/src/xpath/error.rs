/*!
# XPath compilation errors

Two kinds are distinguished: syntax errors (the expression does not match
the grammar) and static errors (the expression is grammatical but refers
to something unknown, such as an undeclared namespace prefix). Both carry
the W3C error code and the character offset into the source expression.
*/
use thiserror::Error;

/// Syntax error code (XPath 3.1 § 2.3.1).
pub const XPST0003: &'static str = "XPST0003";
/// Undefined name (variable) in a static context.
pub const XPST0008: &'static str = "XPST0008";
/// Unknown namespace prefix.
pub const XPST0081: &'static str = "XPST0081";
/// Invalid type name reference.
pub const XPST0051: &'static str = "XPST0051";

/// Error returned by [`compile`](crate::xpath::compile).
///
/// No partial AST is ever returned alongside an error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum XPathError {
	/// The expression violates the XPath grammar.
	#[error("{code} syntax error at offset {offset}: {message}")]
	Syntax {
		/// W3C error code (normally [`XPST0003`]).
		code: &'static str,
		/// Character offset into the expression.
		offset: usize,
		message: String,
	},

	/// The expression is grammatical but refers to an unresolvable or
	/// invalid name.
	#[error("{code} static error at offset {offset}: {message}")]
	Static {
		/// W3C error code (e.g. [`XPST0081`]).
		code: &'static str,
		/// Character offset into the expression.
		offset: usize,
		message: String,
	},
}

impl XPathError {
	pub fn syntax(offset: usize, message: impl Into<String>) -> Self {
		Self::Syntax {
			code: XPST0003,
			offset,
			message: message.into(),
		}
	}

	pub fn undeclared_prefix(offset: usize, prefix: &str) -> Self {
		Self::Static {
			code: XPST0081,
			offset,
			message: format!("undeclared namespace prefix '{}'", prefix),
		}
	}

	/// The W3C error code.
	pub fn code(&self) -> &'static str {
		match self {
			Self::Syntax { code, .. } => code,
			Self::Static { code, .. } => code,
		}
	}

	/// The character offset into the source expression.
	pub fn offset(&self) -> usize {
		match self {
			Self::Syntax { offset, .. } => *offset,
			Self::Static { offset, .. } => *offset,
		}
	}
}

pub type Result<T> = std::result::Result<T, XPathError>;
