/*!
# Payload types for declarations from the internal subset

These are carried inside tokens; the content parser re-emits them as events
and keeps the attribute-type information for attribute-value normalization.
*/
use crate::strings::{CData, NCName, Name};

pub use super::entities::ExternalId;

/// Declared type of an attribute (XML 1.0 § 3.3.1).
#[derive(Debug, Clone, PartialEq)]
pub enum AttType {
	Cdata,
	Id,
	IdRef,
	IdRefs,
	Entity,
	Entities,
	NmToken,
	NmTokens,
	/// `NOTATION (a | b)`
	Notation(Vec<Name>),
	/// `(red | green | blue)`
	Enumeration(Vec<NCName>),
}

impl AttType {
	/// Whether values of this type undergo the additional normalization pass
	/// (space collapsing; XML 1.0 § 3.3.3).
	pub fn is_tokenized(&self) -> bool {
		!matches!(self, Self::Cdata)
	}

	/// The SAX-style type string for this attribute type.
	pub fn as_sax_str(&self) -> &'static str {
		match self {
			Self::Cdata => "CDATA",
			Self::Id => "ID",
			Self::IdRef => "IDREF",
			Self::IdRefs => "IDREFS",
			Self::Entity => "ENTITY",
			Self::Entities => "ENTITIES",
			Self::NmToken => "NMTOKEN",
			Self::NmTokens => "NMTOKENS",
			Self::Notation(_) => "NOTATION",
			Self::Enumeration(_) => "NMTOKEN",
		}
	}
}

/// Default-value specification of an attribute (XML 1.0 § 3.3.2).
#[derive(Debug, Clone, PartialEq)]
pub enum AttDefault {
	Required,
	Implied,
	Fixed(CData),
	Value(CData),
}

/// One attribute definition inside an `<!ATTLIST>` declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct AttDef {
	pub name: Name,
	pub ty: AttType,
	pub default: AttDefault,
}

/// A complete `<!ATTLIST>` declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct AttlistDecl {
	pub element: Name,
	pub defs: Vec<AttDef>,
}

/// A `<!NOTATION>` declaration.
///
/// Notations permit a public identifier without a system identifier, which
/// is why this does not reuse [`ExternalId`].
#[derive(Debug, Clone, PartialEq)]
pub struct NotationDecl {
	pub name: Name,
	pub public_id: Option<CData>,
	pub system_id: Option<CData>,
}

/// Broad classification of an `<!ELEMENT>` content specification.
///
/// Only the information needed to classify whitespace is retained; content
/// models are not validated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ContentSpec {
	Empty,
	Any,
	/// Mixed content: `(#PCDATA ...)`
	Mixed,
	/// Element-only content (a children model); whitespace between child
	/// elements is ignorable.
	Children,
}

impl ContentSpec {
	/// Classify a raw content specification string.
	pub fn classify(raw: &str) -> ContentSpec {
		let trimmed = raw.trim();
		match trimmed {
			"EMPTY" => ContentSpec::Empty,
			"ANY" => ContentSpec::Any,
			_ => {
				if trimmed.starts_with('(')
					&& trimmed[1..].trim_start().starts_with("#PCDATA")
				{
					ContentSpec::Mixed
				} else {
					ContentSpec::Children
				}
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn content_spec_classification() {
		assert_eq!(ContentSpec::classify("EMPTY"), ContentSpec::Empty);
		assert_eq!(ContentSpec::classify(" ANY "), ContentSpec::Any);
		assert_eq!(ContentSpec::classify("(#PCDATA)"), ContentSpec::Mixed);
		assert_eq!(
			ContentSpec::classify("( #PCDATA | b )*"),
			ContentSpec::Mixed
		);
		assert_eq!(ContentSpec::classify("(a, b?, c*)"), ContentSpec::Children);
	}

	#[test]
	fn att_type_normalization_classes() {
		assert!(!AttType::Cdata.is_tokenized());
		assert!(AttType::Id.is_tokenized());
		assert!(AttType::Enumeration(vec![]).is_tokenized());
	}
}
