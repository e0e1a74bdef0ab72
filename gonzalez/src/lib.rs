/*!
# gonzalez — streaming XML parsing and XPath compilation

This crate provides two tightly related pieces of machinery:

- A **streaming XML parser**: bytes go in (in arbitrary chunks), SAX-style
  events come out. The tokenizer and the content parser are explicit state
  machines; parsing state survives arbitrary chunk boundaries and no
  recursion is used anywhere, so document structure depth is bounded by
  heap, not by the native stack.
- An **XPath 3.1 expression compiler**: an expression string goes in, an
  immutable, shareable AST comes out (see [`xpath`]). Evaluation is the
  caller's concern.

## XML features

* XML 1.0 and (by declaration) XML 1.1 character rules
* Namespaces, with prefix-mapping events and attribute uniqueness checks
* DOCTYPE with internal subset: entity, element, attlist and notation
  declarations are parsed and reported
* Internal general entities are expanded (in content and attribute
  values), with cycle detection and depth/size limits; entity boundaries
  in content surface as `start_entity`/`end_entity`
* External entities are skipped by default (`skipped_entity`); an
  application-supplied [`EntityResolver`] plus the matching
  [`ParserOptions`] flags opts into fetching and expanding them
* Comments, processing instructions, CDATA sections
* Attribute-value normalization, including the tokenized-type pass driven
  by `<!ATTLIST>` declarations
* Optional transcoding from UTF-16/declared encodings (`encoding`
  feature)

What it deliberately does not do: build a DOM, fetch external resources on
its own, validate against DTD or schema (declarations are surfaced,
nothing more), or run XSLT.

## Example

```
use gonzalez::EventRead;
let doc = b"<?xml version='1.0'?><hello>World!</hello>";
let mut fp = gonzalez::FeedParser::new();
fp.feed(doc.to_vec()).unwrap();
fp.feed_eof().unwrap();
let result = fp.read_all_eof(|ev| {
	println!("got event: {:?}", ev);
});
// true indicates eof
assert_eq!(result.unwrap(), true);
```

## Push- and pull-based usage

The [`FeedParser`] allows to push bits of XML into the parser as they
arrive in the application and process the resulting events as they happen.
If the parser should block while waiting for more data instead, the
[`PullParser`] wraps anything implementing [`std::io::BufRead`].

On top of either, [`SaxDriver`](parser::SaxDriver) dispatches events to a
[`ContentHandler`](parser::ContentHandler).

## Cargo features

| Feature | Effect |
|---|---|
| `interning` (default) | namespace URIs are interned in a shared [`Context`] |
| `encoding` | UTF-16 and declared-encoding input via `encoding_rs` |
| `mt` | shared pointers are `Arc` instead of `Rc` |
*/
#[allow(unused_imports)]
use std::io;

mod bufq;
mod context;
pub mod driver;
pub mod encoding;
mod errctx;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod strings;
pub mod xpath;


#[doc(inline)]
pub use bufq::BufferQueue;
#[doc(inline)]
pub use context::{Context, RcPtr};
#[doc(inline)]
pub use driver::{as_eof_flag, EventRead, FeedParser, PullParser, PushDriver, PullDriver, RawFeedParser};
#[doc(inline)]
pub use error::{Error, Result};
#[doc(inline)]
pub use lexer::{Lexer, LexerOptions};
#[doc(inline)]
pub use parser::{
	Attribute, ContentHandler, EntityResolver, InputSource, NamespaceName,
	NamespaceResolver, Parser, ParserOptions, RawEvent, RawParser, ResolvedEvent,
	ResolvedQName, SaxDriver, WithOptions, XmlVersion, XMLNS_XML,
};
pub use strings::{CData, CDataStr, NCName, NCNameStr, Name, NameStr};

pub const VERSION: &'static str = env!("CARGO_PKG_VERSION");
