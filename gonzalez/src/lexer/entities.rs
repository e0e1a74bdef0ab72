/*!
# Entity declarations, the entity table and the expansion stack

The lexer collects entity declarations while lexing the internal subset and
resolves references against them afterwards. Expansion does not use
recursion; instead, a stack of input frames is kept, each frame providing the
replacement of one entity. A reference inside a replacement pushes another
frame. The set of entity names currently on the stack doubles as the cycle
detector.
*/
use std::collections::hash_map::Entry;
use std::collections::HashMap;

use crate::context::RcPtr;
use crate::error::{EntityError, Error, Result};
use crate::strings::{CData, Name};

/// One piece of an internal entity's replacement.
///
/// Replacement text is taken apart once, when the declaration is lexed:
/// character references are resolved to literal text immediately (XML 1.0
/// § 4.4.5), general entity references are kept for expansion at reference
/// time.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityPart {
	/// Literal replacement text.
	Text(String),
	/// A general entity reference (`&name;`) to be expanded when the entity
	/// is referenced.
	Ref(Name),
}

/// Replacement value of an internal entity.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityValue {
	pub parts: Vec<EntityPart>,
}

impl EntityValue {
	pub fn text_len(&self) -> usize {
		self.parts
			.iter()
			.map(|p| match p {
				EntityPart::Text(t) => t.len(),
				EntityPart::Ref(_) => 0,
			})
			.sum()
	}

	/// Build a value consisting of a single literal text part.
	#[cfg(test)]
	pub fn literal(text: &str) -> Self {
		Self {
			parts: vec![EntityPart::Text(text.to_string())],
		}
	}
}

/// An external identifier, as used in entity, notation and document type
/// declarations.
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalId {
	pub public_id: Option<CData>,
	pub system_id: CData,
}

/// A single entity declaration from the DTD.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityDecl {
	/// `<!ENTITY name "value">`
	Internal {
		name: Name,
		parameter: bool,
		value: RcPtr<EntityValue>,
	},
	/// `<!ENTITY name SYSTEM "uri">` (or PUBLIC)
	ExternalParsed {
		name: Name,
		parameter: bool,
		id: ExternalId,
	},
	/// `<!ENTITY name SYSTEM "uri" NDATA notation>`
	ExternalUnparsed {
		name: Name,
		id: ExternalId,
		notation: Name,
	},
}

impl EntityDecl {
	pub fn name(&self) -> &Name {
		match self {
			Self::Internal { name, .. } => name,
			Self::ExternalParsed { name, .. } => name,
			Self::ExternalUnparsed { name, .. } => name,
		}
	}

	pub fn is_parameter(&self) -> bool {
		match self {
			Self::Internal { parameter, .. } => *parameter,
			Self::ExternalParsed { parameter, .. } => *parameter,
			Self::ExternalUnparsed { .. } => false,
		}
	}
}

/// Resolve one of the five predefined entities to its character.
pub fn predefined_entity(name: &str) -> Option<char> {
	match name {
		"amp" => Some('&'),
		"lt" => Some('<'),
		"gt" => Some('>'),
		"apos" => Some('\''),
		"quot" => Some('"'),
		_ => None,
	}
}

/**
# Declared entities of one document

Two separate namespaces exist, one for general and one for parameter
entities. Per XML 1.0 § 4.2, the first declaration of a name is binding and
later declarations are ignored.
*/
pub struct EntityTable {
	general: HashMap<Name, RcPtr<EntityDecl>>,
	parameter: HashMap<Name, RcPtr<EntityDecl>>,
	/// False once an external subset or an unread external parameter entity
	/// may have contained declarations we never saw. Undeclared references
	/// are only a well-formedness error while the table is complete.
	complete: bool,
}

impl EntityTable {
	pub fn new() -> Self {
		Self {
			general: HashMap::new(),
			parameter: HashMap::new(),
			complete: true,
		}
	}

	/// Record that declarations may exist which were not processed.
	pub fn mark_incomplete(&mut self) {
		self.complete = false;
	}

	pub fn is_complete(&self) -> bool {
		self.complete
	}

	/// Insert a declaration; a redeclaration of the same name is silently
	/// ignored (XML 1.0 § 4.2).
	pub fn declare(&mut self, decl: EntityDecl) {
		let map = if decl.is_parameter() {
			&mut self.parameter
		} else {
			&mut self.general
		};
		match map.entry(decl.name().clone()) {
			Entry::Occupied(_) => (),
			Entry::Vacant(e) => {
				e.insert(RcPtr::new(decl));
			}
		}
	}

	pub fn get_general(&self, name: &str) -> Option<&RcPtr<EntityDecl>> {
		self.general.get(name)
	}

	pub fn get_parameter(&self, name: &str) -> Option<&RcPtr<EntityDecl>> {
		self.parameter.get(name)
	}
}

/// Reason a frame was pushed; controls token emission at the boundaries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameContext {
	/// Expansion in element content; bracketed by `EntityStart`/`EntityEnd`
	/// tokens so the parser can track nesting.
	Content,
	/// Expansion inside an attribute value; silent.
	AttributeValue,
	/// Parameter entity expansion inside the internal subset; silent.
	IntSubset,
}

struct Frame {
	name: Name,
	value: RcPtr<EntityValue>,
	context: FrameContext,
	part: usize,
	pos: usize,
}

/**
# Stack of entity-expansion input frames

While at least one frame is active, the lexer reads its input from the top
frame instead of the caller's buffer. Frames are bounded in depth and in the
total number of replacement characters they may contribute to one top-level
expansion; both bounds protect against amplification attacks.
*/
pub struct ExpansionStack {
	frames: Vec<Frame>,
	max_depth: usize,
	max_expansion: usize,
	/// Characters contributed since the stack was last empty.
	expanded: usize,
}

/// What the reader should do next when consulting the expansion stack.
pub enum FrameInput {
	/// Read from this text chunk (cheap clone of the value plus offsets).
	Text(RcPtr<EntityValue>, usize, usize),
	/// The top frame's next part is a nested reference to this entity.
	Ref(Name),
	/// The top frame is exhausted; `pop()` it.
	Exhausted(FrameContext),
}

impl ExpansionStack {
	pub fn new(max_depth: usize, max_expansion: usize) -> Self {
		Self {
			frames: Vec::new(),
			max_depth,
			max_expansion,
			expanded: 0,
		}
	}

	pub fn is_active(&self) -> bool {
		!self.frames.is_empty()
	}

	pub fn depth(&self) -> usize {
		self.frames.len()
	}

	/// Return true if an entity of this name is currently being expanded.
	pub fn is_expanding(&self, name: &str) -> bool {
		self.frames.iter().any(|f| f.name == name)
	}

	/// Push an expansion frame for the given entity.
	///
	/// Fails on cycles, on exceeding the depth limit and on exceeding the
	/// total expansion budget.
	pub fn push(
		&mut self,
		name: Name,
		value: RcPtr<EntityValue>,
		context: FrameContext,
	) -> Result<()> {
		if self.is_expanding(&name) {
			return Err(Error::Entity(EntityError::Cycle(name.as_str().to_string())));
		}
		if self.frames.len() >= self.max_depth {
			return Err(Error::Entity(EntityError::DepthLimitExceeded));
		}
		self.expanded = match self.expanded.checked_add(value.text_len()) {
			None => return Err(Error::Entity(EntityError::ExpansionLimitExceeded)),
			Some(v) => v,
		};
		if self.expanded > self.max_expansion {
			return Err(Error::Entity(EntityError::ExpansionLimitExceeded));
		}
		self.frames.push(Frame {
			name,
			value,
			context,
			part: 0,
			pos: 0,
		});
		Ok(())
	}

	/// Inspect the top frame and describe where the next input comes from.
	///
	/// Returns `None` if no frame is active.
	pub fn next_input(&self) -> Option<FrameInput> {
		let top = self.frames.last()?;
		match top.value.parts.get(top.part) {
			None => Some(FrameInput::Exhausted(top.context)),
			Some(EntityPart::Text(t)) => {
				if top.pos >= t.len() {
					// skip over fully consumed text parts lazily
					Some(FrameInput::Exhausted(top.context))
				} else {
					Some(FrameInput::Text(top.value.clone(), top.part, top.pos))
				}
			}
			Some(EntityPart::Ref(name)) => Some(FrameInput::Ref(name.clone())),
		}
	}

	/// Index of the current top frame, for use with
	/// [`ExpansionStack::advance_frame`].
	pub fn top_index(&self) -> usize {
		debug_assert!(!self.frames.is_empty());
		self.frames.len() - 1
	}

	/// Advance the frame at `idx` by `n` consumed bytes of its current text
	/// part.
	///
	/// The index is taken instead of operating on the top frame because the
	/// consumer may push nested frames while reading from this one.
	pub fn advance_frame(&mut self, idx: usize, n: usize) {
		let frame = &mut self.frames[idx];
		frame.pos += n;
		if let Some(EntityPart::Text(t)) = frame.value.parts.get(frame.part) {
			if frame.pos >= t.len() {
				frame.part += 1;
				frame.pos = 0;
			}
		}
	}

	/// Step over the current (non-text) part of the top frame.
	pub fn skip_part(&mut self) {
		let top = self.frames.last_mut().expect("skip without active frame");
		top.part += 1;
		top.pos = 0;
	}

	/// Pop the top frame. Returns its context.
	///
	/// When the last frame is popped, the expansion budget resets.
	pub fn pop(&mut self) -> FrameContext {
		let frame = self.frames.pop().expect("pop without active frame");
		if self.frames.is_empty() {
			self.expanded = 0;
		}
		frame.context
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::convert::TryInto;

	fn name(s: &str) -> Name {
		s.try_into().unwrap()
	}

	#[test]
	fn predefined_entities_resolve() {
		assert_eq!(predefined_entity("amp"), Some('&'));
		assert_eq!(predefined_entity("lt"), Some('<'));
		assert_eq!(predefined_entity("gt"), Some('>'));
		assert_eq!(predefined_entity("apos"), Some('\''));
		assert_eq!(predefined_entity("quot"), Some('"'));
		assert_eq!(predefined_entity("copy"), None);
	}

	#[test]
	fn table_first_declaration_wins() {
		let mut tbl = EntityTable::new();
		tbl.declare(EntityDecl::Internal {
			name: name("e"),
			parameter: false,
			value: RcPtr::new(EntityValue::literal("first")),
		});
		tbl.declare(EntityDecl::Internal {
			name: name("e"),
			parameter: false,
			value: RcPtr::new(EntityValue::literal("second")),
		});
		match &**tbl.get_general("e").unwrap() {
			EntityDecl::Internal { value, .. } => {
				assert_eq!(value.parts, vec![EntityPart::Text("first".to_string())]);
			}
			other => panic!("unexpected decl: {:?}", other),
		}
	}

	#[test]
	fn table_separates_general_and_parameter_names() {
		let mut tbl = EntityTable::new();
		tbl.declare(EntityDecl::Internal {
			name: name("e"),
			parameter: true,
			value: RcPtr::new(EntityValue::literal("pe")),
		});
		assert!(tbl.get_general("e").is_none());
		assert!(tbl.get_parameter("e").is_some());
	}

	#[test]
	fn stack_detects_cycles() {
		let mut stack = ExpansionStack::new(8, 1024);
		stack
			.push(
				name("a"),
				RcPtr::new(EntityValue::literal("x")),
				FrameContext::Content,
			)
			.unwrap();
		stack
			.push(
				name("b"),
				RcPtr::new(EntityValue::literal("y")),
				FrameContext::Content,
			)
			.unwrap();
		let err = stack
			.push(
				name("a"),
				RcPtr::new(EntityValue::literal("z")),
				FrameContext::Content,
			)
			.err()
			.unwrap();
		assert!(matches!(err, Error::Entity(EntityError::Cycle(_))));
	}

	#[test]
	fn stack_enforces_depth_limit() {
		let mut stack = ExpansionStack::new(2, 1024);
		stack
			.push(
				name("a"),
				RcPtr::new(EntityValue::literal("x")),
				FrameContext::Content,
			)
			.unwrap();
		stack
			.push(
				name("b"),
				RcPtr::new(EntityValue::literal("y")),
				FrameContext::Content,
			)
			.unwrap();
		let err = stack
			.push(
				name("c"),
				RcPtr::new(EntityValue::literal("z")),
				FrameContext::Content,
			)
			.err()
			.unwrap();
		assert!(matches!(err, Error::Entity(EntityError::DepthLimitExceeded)));
	}

	#[test]
	fn stack_enforces_expansion_budget() {
		let mut stack = ExpansionStack::new(8, 4);
		let err = stack
			.push(
				name("a"),
				RcPtr::new(EntityValue::literal("12345")),
				FrameContext::Content,
			)
			.err()
			.unwrap();
		assert!(matches!(
			err,
			Error::Entity(EntityError::ExpansionLimitExceeded)
		));
	}

	#[test]
	fn stack_budget_resets_after_drain() {
		let mut stack = ExpansionStack::new(8, 4);
		stack
			.push(
				name("a"),
				RcPtr::new(EntityValue::literal("123")),
				FrameContext::Content,
			)
			.unwrap();
		stack.advance_frame(stack.top_index(), 3);
		assert!(matches!(
			stack.next_input(),
			Some(FrameInput::Exhausted(FrameContext::Content))
		));
		stack.pop();
		assert!(!stack.is_active());
		// a fresh top-level expansion gets a fresh budget
		stack
			.push(
				name("b"),
				RcPtr::new(EntityValue::literal("123")),
				FrameContext::Content,
			)
			.unwrap();
	}
}
