/*!
# XPath lexer

A deterministic, single-character-lookahead lexer over an in-memory
expression string. Two ambiguities require context tracking:

1. `*` is multiplication after an operand, a wildcard otherwise.
2. Operator keywords (`and`, `div`, `if`, axis names, …) are only
   recognized after an operand; elsewhere they are plain `NCName`s.

The lexer exposes [`Lexer::peek`] (single-token look-ahead) and
[`Lexer::save`]/[`Lexer::restore`] for the parser's speculative
look-past (e.g. `prefix:name(` vs `prefix:*`).

XPath comments `(: … :)` nest; they are skipped with an explicit depth
counter.
*/
use gonzalez_validation::selectors::{CharSelector, CLASS_XML_NAME, CLASS_XML_NAMESTART};

use super::error::{Result, XPathError};
use super::token::{Axis, Keyword, KindTestKind, Token};

fn is_ncname_start(c: char) -> bool {
	c != ':' && CLASS_XML_NAMESTART.select(c)
}

fn is_ncname_char(c: char) -> bool {
	c != ':' && CLASS_XML_NAME.select(c)
}

/// Snapshot of the lexer state, for speculative parsing.
#[derive(Debug, Clone)]
pub struct SavedState {
	pos: usize,
	current: Token,
	token_start: usize,
	operator_context: bool,
}

pub struct Lexer {
	chars: Vec<char>,
	/// Next unread character.
	pos: usize,
	current: Token,
	/// Character offset at which `current` starts.
	token_start: usize,
	/// True if the previously emitted token completed an operand.
	operator_context: bool,
}

impl Lexer {
	pub fn new(expr: &str) -> Result<Self> {
		let mut lexer = Self {
			chars: expr.chars().collect(),
			pos: 0,
			current: Token::Eof,
			token_start: 0,
			operator_context: false,
		};
		lexer.advance()?;
		Ok(lexer)
	}

	/// The current token.
	pub fn current(&self) -> &Token {
		&self.current
	}

	/// Character offset at which the current token starts.
	pub fn token_start(&self) -> usize {
		self.token_start
	}

	/// Take a state-preserving look at the next token.
	pub fn peek(&mut self) -> Result<Token> {
		let saved = self.save();
		let r = self.advance();
		let tok = self.current.clone();
		self.restore(saved);
		r?;
		Ok(tok)
	}

	/// Snapshot the lexer state.
	pub fn save(&self) -> SavedState {
		SavedState {
			pos: self.pos,
			current: self.current.clone(),
			token_start: self.token_start,
			operator_context: self.operator_context,
		}
	}

	/// Return to a previously saved state.
	pub fn restore(&mut self, state: SavedState) {
		self.pos = state.pos;
		self.current = state.current;
		self.token_start = state.token_start;
		self.operator_context = state.operator_context;
	}

	fn peek_char(&self) -> Option<char> {
		self.chars.get(self.pos).copied()
	}

	fn peek_char_at(&self, off: usize) -> Option<char> {
		self.chars.get(self.pos + off).copied()
	}

	fn bump(&mut self) -> Option<char> {
		let c = self.peek_char()?;
		self.pos += 1;
		Some(c)
	}

	fn error(&self, offset: usize, message: impl Into<String>) -> XPathError {
		XPathError::syntax(offset, message)
	}

	/// Skip whitespace and (nested) comments.
	fn skip_ignorable(&mut self) -> Result<()> {
		loop {
			while matches!(self.peek_char(), Some(c) if c.is_whitespace()) {
				self.pos += 1;
			}
			if self.peek_char() == Some('(') && self.peek_char_at(1) == Some(':') {
				let start = self.pos;
				self.pos += 2;
				let mut depth = 1usize;
				while depth > 0 {
					match self.bump() {
						Some('(') if self.peek_char() == Some(':') => {
							self.pos += 1;
							depth += 1;
						}
						Some(':') if self.peek_char() == Some(')') => {
							self.pos += 1;
							depth -= 1;
						}
						Some(_) => (),
						None => {
							return Err(self.error(start, "unterminated comment"));
						}
					}
				}
				continue;
			}
			return Ok(());
		}
	}

	/// Position of the next non-ignorable char, without consuming.
	fn after_ignorable(&mut self) -> Result<usize> {
		let saved = self.pos;
		self.skip_ignorable()?;
		let here = self.pos;
		self.pos = saved;
		Ok(here)
	}

	fn lex_ncname(&mut self) -> String {
		let mut out = String::new();
		while let Some(c) = self.peek_char() {
			if (out.is_empty() && is_ncname_start(c)) || (!out.is_empty() && is_ncname_char(c))
			{
				out.push(c);
				self.pos += 1;
			} else {
				break;
			}
		}
		out
	}

	fn lex_string(&mut self, delim: char) -> Result<Token> {
		let start = self.token_start;
		let mut out = String::new();
		loop {
			match self.bump() {
				Some(c) if c == delim => {
					// a doubled delimiter is an escaped delimiter
					if self.peek_char() == Some(delim) {
						self.pos += 1;
						out.push(delim);
						continue;
					}
					return Ok(Token::StringLiteral(out));
				}
				Some(c) => out.push(c),
				None => return Err(self.error(start, "unterminated string literal")),
			}
		}
	}

	fn lex_number(&mut self) -> Result<Token> {
		let start = self.pos;
		while matches!(self.peek_char(), Some(c) if c.is_ascii_digit()) {
			self.pos += 1;
		}
		if self.peek_char() == Some('.') {
			self.pos += 1;
			while matches!(self.peek_char(), Some(c) if c.is_ascii_digit()) {
				self.pos += 1;
			}
		}
		if matches!(self.peek_char(), Some('e') | Some('E')) {
			// only a well-formed exponent is part of the number
			let mut off = 1;
			if matches!(self.peek_char_at(1), Some('+') | Some('-')) {
				off += 1;
			}
			if matches!(self.peek_char_at(off), Some(c) if c.is_ascii_digit()) {
				self.pos += off;
				while matches!(self.peek_char(), Some(c) if c.is_ascii_digit()) {
					self.pos += 1;
				}
			}
		}
		// a numeric literal must be followed by a delimiter
		if matches!(self.peek_char(), Some(c) if is_ncname_start(c)) {
			return Err(self.error(self.pos, "name character directly after number"));
		}
		let text: String = self.chars[start..self.pos].iter().collect();
		let value: f64 = text
			.parse()
			.map_err(|_| self.error(start, format!("invalid number '{}'", text)))?;
		Ok(Token::NumberLiteral(value))
	}

	fn lex_uri_qualified_name(&mut self) -> Result<Token> {
		// after `Q{`
		let start = self.token_start;
		let mut uri = String::new();
		loop {
			match self.bump() {
				Some('}') => break,
				Some('{') => {
					return Err(self.error(start, "'{' not allowed in namespace uri"))
				}
				Some(c) => uri.push(c),
				None => return Err(self.error(start, "unterminated 'Q{'")),
			}
		}
		let local = self.lex_ncname();
		if local.is_empty() {
			return Err(self.error(self.pos, "local name expected after 'Q{...}'"));
		}
		Ok(Token::URIQName { uri, local })
	}

	/// Dispatch a name lexed at operand position: axis, kind test or plain
	/// NCName.
	fn classify_operand_name(&mut self, name: String) -> Result<Token> {
		// whitespace is permitted between the name and `::` and between a
		// kind-test name and its `(`
		let ahead = self.after_ignorable()?;
		if self.chars.get(ahead) == Some(&':') && self.chars.get(ahead + 1) == Some(&':') {
			let axis = match Axis::from_name(&name) {
				Some(axis) => axis,
				None => {
					return Err(self.error(self.token_start, format!("unknown axis '{}'", name)))
				}
			};
			self.pos = ahead + 2;
			return Ok(Token::Axis(axis));
		}
		if self.chars.get(ahead) == Some(&'(') && self.chars.get(ahead + 1) != Some(&':') {
			if let Some(kind) = KindTestKind::from_name(&name) {
				self.pos = ahead + 1;
				return Ok(Token::KindTest(kind));
			}
		}
		Ok(Token::NCName(name))
	}

	/// Advance to the next token.
	pub fn advance(&mut self) -> Result<()> {
		self.skip_ignorable()?;
		self.token_start = self.pos;
		let c = match self.peek_char() {
			Some(c) => c,
			None => {
				self.current = Token::Eof;
				return Ok(());
			}
		};
		let operator_context = self.operator_context;
		let tok = match c {
			'\'' | '"' => {
				self.pos += 1;
				self.lex_string(c)?
			}
			'0'..='9' => self.lex_number()?,
			'(' => {
				self.pos += 1;
				Token::LParen
			}
			')' => {
				self.pos += 1;
				Token::RParen
			}
			'[' => {
				self.pos += 1;
				Token::LBracket
			}
			']' => {
				self.pos += 1;
				Token::RBracket
			}
			'{' => {
				self.pos += 1;
				Token::LBrace
			}
			'}' => {
				self.pos += 1;
				Token::RBrace
			}
			',' => {
				self.pos += 1;
				Token::Comma
			}
			'@' => {
				self.pos += 1;
				Token::At
			}
			'$' => {
				self.pos += 1;
				Token::Dollar
			}
			'#' => {
				self.pos += 1;
				Token::Hash
			}
			'?' => {
				self.pos += 1;
				Token::Question
			}
			'|' => {
				self.pos += 1;
				Token::Bar
			}
			'+' => {
				self.pos += 1;
				Token::Plus
			}
			'-' => {
				self.pos += 1;
				Token::Minus
			}
			'=' => {
				self.pos += 1;
				Token::Equals
			}
			'!' => {
				if self.peek_char_at(1) == Some('=') {
					self.pos += 2;
					Token::NotEquals
				} else {
					return Err(self.error(self.pos, "unexpected '!'"));
				}
			}
			'<' => {
				if self.peek_char_at(1) == Some('=') {
					self.pos += 2;
					Token::LessEquals
				} else {
					self.pos += 1;
					Token::LessThan
				}
			}
			'>' => {
				if self.peek_char_at(1) == Some('=') {
					self.pos += 2;
					Token::GreaterEquals
				} else {
					self.pos += 1;
					Token::GreaterThan
				}
			}
			'/' => {
				if self.peek_char_at(1) == Some('/') {
					self.pos += 2;
					Token::DoubleSlash
				} else {
					self.pos += 1;
					Token::Slash
				}
			}
			':' => {
				if self.peek_char_at(1) == Some('=') {
					self.pos += 2;
					Token::Assign
				} else {
					self.pos += 1;
					Token::Colon
				}
			}
			'.' => {
				if matches!(self.peek_char_at(1), Some(c) if c.is_ascii_digit()) {
					self.lex_number()?
				} else if self.peek_char_at(1) == Some('.') {
					self.pos += 2;
					Token::DotDot
				} else {
					self.pos += 1;
					Token::Dot
				}
			}
			'*' => {
				if operator_context {
					self.pos += 1;
					Token::Multiply
				} else if self.peek_char_at(1) == Some(':')
					&& matches!(self.peek_char_at(2), Some(c) if is_ncname_start(c))
				{
					// `*:local` is a single symbol, no internal whitespace
					self.pos += 2;
					let local = self.lex_ncname();
					Token::SuffixWildcard(local)
				} else {
					self.pos += 1;
					Token::Star
				}
			}
			'Q' if self.peek_char_at(1) == Some('{') => {
				self.pos += 2;
				self.lex_uri_qualified_name()?
			}
			c if is_ncname_start(c) => {
				let name = self.lex_ncname();
				if operator_context {
					match Keyword::from_name(&name) {
						Some(kw) => Token::Keyword(kw),
						None => Token::NCName(name),
					}
				} else {
					self.classify_operand_name(name)?
				}
			}
			c => {
				return Err(self.error(self.pos, format!("unexpected character '{}'", c)));
			}
		};
		self.operator_context = matches!(
			tok,
			Token::NCName(_)
				| Token::URIQName { .. }
				| Token::NumberLiteral(_)
				| Token::StringLiteral(_)
				| Token::RParen
				| Token::RBracket
				| Token::RBrace
				| Token::Star
				| Token::SuffixWildcard(_)
				| Token::Dot
				| Token::DotDot
		);
		self.current = tok;
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn toks(expr: &str) -> Vec<Token> {
		let mut lexer = Lexer::new(expr).unwrap();
		let mut out = Vec::new();
		loop {
			let tok = lexer.current().clone();
			if tok == Token::Eof {
				return out;
			}
			out.push(tok);
			lexer.advance().unwrap();
		}
	}

	#[test]
	fn lex_simple_path() {
		assert_eq!(
			toks("/a/b"),
			vec![
				Token::Slash,
				Token::NCName("a".into()),
				Token::Slash,
				Token::NCName("b".into()),
			]
		);
	}

	#[test]
	fn lex_star_disambiguation() {
		// first `*` is a wildcard, second is multiplication
		assert_eq!(
			toks("* * 2"),
			vec![Token::Star, Token::Multiply, Token::NumberLiteral(2.0)]
		);
		// after a name, `*` is multiplication
		assert_eq!(
			toks("a * b"),
			vec![
				Token::NCName("a".into()),
				Token::Multiply,
				Token::NCName("b".into()),
			]
		);
		// after `.` as well
		assert_eq!(
			toks(". * 2"),
			vec![Token::Dot, Token::Multiply, Token::NumberLiteral(2.0)]
		);
	}

	#[test]
	fn lex_keywords_only_in_operator_context() {
		assert_eq!(
			toks("div div div"),
			vec![
				Token::NCName("div".into()),
				Token::Keyword(Keyword::Div),
				Token::NCName("div".into()),
			]
		);
	}

	#[test]
	fn lex_axes() {
		assert_eq!(
			toks("child::a/descendant-or-self::node()"),
			vec![
				Token::Axis(Axis::Child),
				Token::NCName("a".into()),
				Token::Slash,
				Token::Axis(Axis::DescendantOrSelf),
				Token::KindTest(KindTestKind::Node),
				Token::RParen,
			]
		);
	}

	#[test]
	fn lex_axis_with_space_before_separator() {
		assert_eq!(
			toks("child :: a"),
			vec![Token::Axis(Axis::Child), Token::NCName("a".into())]
		);
	}

	#[test]
	fn lex_unknown_axis_is_an_error() {
		assert!(Lexer::new("sideways::a").is_err());
	}

	#[test]
	fn lex_kind_tests() {
		assert_eq!(
			toks("text()"),
			vec![Token::KindTest(KindTestKind::Text), Token::RParen]
		);
		// an ordinary function call is not a kind test
		assert_eq!(
			toks("contains("),
			vec![Token::NCName("contains".into()), Token::LParen]
		);
	}

	#[test]
	fn lex_number_forms() {
		assert_eq!(toks("1.5"), vec![Token::NumberLiteral(1.5)]);
		assert_eq!(toks(".5"), vec![Token::NumberLiteral(0.5)]);
		assert_eq!(toks("1e3"), vec![Token::NumberLiteral(1000.0)]);
		assert_eq!(toks("1.5E-1"), vec![Token::NumberLiteral(0.15)]);
	}

	#[test]
	fn lex_string_with_doubled_quotes() {
		assert_eq!(
			toks("'it''s'"),
			vec![Token::StringLiteral("it's".into())]
		);
		assert_eq!(
			toks("\"a\"\"b\""),
			vec![Token::StringLiteral("a\"b".into())]
		);
	}

	#[test]
	fn lex_uri_qualified_name() {
		assert_eq!(
			toks("Q{urn:x}local"),
			vec![Token::URIQName {
				uri: "urn:x".into(),
				local: "local".into(),
			}]
		);
	}

	#[test]
	fn lex_assign_and_colon() {
		assert_eq!(
			toks("a:=b"),
			vec![
				Token::NCName("a".into()),
				Token::Assign,
				Token::NCName("b".into()),
			]
		);
	}

	#[test]
	fn lex_suffix_wildcard() {
		assert_eq!(
			toks("*:local"),
			vec![Token::SuffixWildcard("local".into())]
		);
	}

	#[test]
	fn lex_comments_are_skipped_and_nest() {
		assert_eq!(
			toks("1 (: outer (: inner :) still outer :) + 2"),
			vec![
				Token::NumberLiteral(1.0),
				Token::Plus,
				Token::NumberLiteral(2.0),
			]
		);
	}

	#[test]
	fn lex_unterminated_comment_is_an_error() {
		assert!(Lexer::new("1 (: oops").is_err());
	}

	#[test]
	fn peek_preserves_state() {
		let mut lexer = Lexer::new("a b").unwrap();
		assert_eq!(lexer.current(), &Token::NCName("a".into()));
		assert_eq!(lexer.peek().unwrap(), Token::NCName("b".into()));
		assert_eq!(lexer.current(), &Token::NCName("a".into()));
	}

	#[test]
	fn save_restore_roundtrip() {
		let mut lexer = Lexer::new("a:b(c)").unwrap();
		let saved = lexer.save();
		lexer.advance().unwrap();
		lexer.advance().unwrap();
		lexer.restore(saved);
		assert_eq!(lexer.current(), &Token::NCName("a".into()));
	}

	#[test]
	fn keywords_after_operand_for_flwor() {
		assert_eq!(
			toks("for $x in y return $x"),
			vec![
				Token::NCName("for".into()),
				Token::Dollar,
				Token::NCName("x".into()),
				Token::Keyword(Keyword::In),
				Token::NCName("y".into()),
				Token::Keyword(Keyword::Return),
				Token::Dollar,
				Token::NCName("x".into()),
			]
		);
	}
}
