//! Lexing of the document type declaration and the internal subset.
//!
//! This is the DTD half of the [`Lexer`] state machine; the states live in
//! [`DoctypeState`] and the shared scratch areas in `DtdScratch`. The same
//! suspension rules apply as everywhere else: any state can be left at a
//! buffer boundary and resumed later.

use std::convert::TryInto;

use super::*;

impl Lexer {
	pub(super) fn lex_doctype(&mut self, state: DoctypeState, r: &mut &[u8]) -> Result<ST> {
		match state {
			DoctypeState::Start => match self.skip_then(r, ERRCTX_DOCTYPE)? {
				b if CLASS_XML_NAMESTART_BYTE.select(b) => {
					self.prep_scratchpad();
					self.scratchpad.push(b);
					Ok(ST(State::Doctype(DoctypeState::Name), None))
				}
				b => Err(unexpected(ERRCTX_DOCTYPE, b, Some(&["start of name"]))),
			},
			DoctypeState::Name => {
				match self.read_validated(r, &CLASS_XML_NAME_BYTE, self.opts.max_token_length)? {
					Endbyte::Eof => Err(Error::wfeof(ERRCTX_DOCTYPE)),
					Endbyte::Limit => Err(Self::token_length_error()),
					Endbyte::Delimiter(b) => {
						let name = self.flush_scratchpad_as_name()?;
						let tok = Token::DoctypeName(self.metrics(1), name);
						match b {
							b' ' | b'\t' | b'\r' | b'\n' => {
								Ok(ST(State::Doctype(DoctypeState::AfterName), Some(tok)))
							}
							b'[' => {
								self.pending = Some(Token::DoctypeIntSubsetStart(self.metrics(0)));
								Ok(ST(State::Doctype(DoctypeState::IntSubset), Some(tok)))
							}
							b'>' => {
								self.pending = Some(Token::DoctypeEnd(self.metrics(0)));
								Ok(ST(State::Content(ContentState::Whitespace), Some(tok)))
							}
							b => Err(unexpected(
								ERRCTX_DOCTYPE,
								b,
								Some(&["space", "[", ">"]),
							)),
						}
					}
				}
			}
			DoctypeState::AfterName => match self.skip_then(r, ERRCTX_DOCTYPE)? {
				b'[' => Ok(ST(
					State::Doctype(DoctypeState::IntSubset),
					Some(Token::DoctypeIntSubsetStart(self.metrics(0))),
				)),
				b'>' => Ok(ST(
					State::Content(ContentState::Whitespace),
					Some(Token::DoctypeEnd(self.metrics(0))),
				)),
				b if CLASS_UPPER_ALPHA_BYTE.select(b) => {
					self.prep_scratchpad();
					self.scratchpad.push(b);
					Ok(ST(
						State::Doctype(DoctypeState::ExtIdKeyword(ExtIdOwner::Doctype)),
						None,
					))
				}
				b => Err(unexpected(
					ERRCTX_DOCTYPE,
					b,
					Some(&["SYSTEM", "PUBLIC", "[", ">"]),
				)),
			},
			DoctypeState::ExtIdKeyword(owner) => {
				match self.read_validated(r, &CLASS_UPPER_ALPHA_BYTE, KW_SYSTEM.len() + 1)? {
					Endbyte::Eof => Err(Error::wfeof(ERRCTX_DOCTYPE)),
					Endbyte::Limit => Err(keyword_error()),
					Endbyte::Delimiter(b) => {
						if !CLASS_XML_SPACE_BYTE.select(b) {
							return Err(unexpected(ERRCTX_DOCTYPE, b, Some(&["space"])));
						}
						let next = if self.scratchpad == KW_SYSTEM {
							DoctypeState::SystemLiteralStart(owner)
						} else if self.scratchpad == KW_PUBLIC {
							DoctypeState::PublicLiteralStart(owner)
						} else {
							return Err(keyword_error());
						};
						self.drop_scratchpad();
						Ok(ST(State::Doctype(next), None))
					}
				}
			}
			DoctypeState::PublicLiteralStart(owner) => match self.skip_then(r, ERRCTX_DOCTYPE)? {
				b @ b'"' | b @ b'\'' => {
					Ok(ST(State::Doctype(DoctypeState::PublicLiteral(owner, b)), None))
				}
				b => Err(unexpected(ERRCTX_DOCTYPE, b, Some(&["\"", "'"]))),
			},
			DoctypeState::PublicLiteral(owner, delim) => {
				let selector: &'static [ByteRange] = if delim == b'"' {
					&CLASS_XML_PUBID_QUOT_DELIMITED_BYTE
				} else {
					&CLASS_XML_PUBID_APOS_DELIMITED_BYTE
				};
				match self.read_validated(r, &selector, self.opts.max_token_length)? {
					Endbyte::Eof => Err(Error::wfeof(ERRCTX_DOCTYPE)),
					Endbyte::Limit => Err(Self::token_length_error()),
					Endbyte::Delimiter(b) if b == delim => {
						let pubid = self.flush_scratchpad_as_complete_cdata()?;
						match owner {
							ExtIdOwner::Doctype => {
								let tok = Token::DoctypePublicId(self.metrics(0), pubid);
								Ok(ST(
									State::Doctype(DoctypeState::SystemLiteralStart(owner)),
									Some(tok),
								))
							}
							ExtIdOwner::Entity { .. } => {
								self.dtd.public_id = Some(pubid);
								Ok(ST(
									State::Doctype(DoctypeState::SystemLiteralStart(owner)),
									None,
								))
							}
							ExtIdOwner::Notation => {
								self.dtd.public_id = Some(pubid);
								Ok(ST(
									State::Doctype(DoctypeState::NotationAfterPublic),
									None,
								))
							}
						}
					}
					Endbyte::Delimiter(b) => Err(Error::Fatal(CrateError::NotWellFormed(
						WFError::InvalidChar(ERRCTX_DOCTYPE, b as u32, false),
					))),
				}
			}
			DoctypeState::SystemLiteralStart(owner) => match self.skip_then(r, ERRCTX_DOCTYPE)? {
				b @ b'"' | b @ b'\'' => {
					Ok(ST(State::Doctype(DoctypeState::SystemLiteral(owner, b)), None))
				}
				b => Err(unexpected(ERRCTX_DOCTYPE, b, Some(&["\"", "'"]))),
			},
			DoctypeState::SystemLiteral(owner, delim) => {
				let selector: &'static [ByteRange] = if delim == b'"' {
					&CLASS_XML_SYSTEM_QUOT_DELIMITED_BYTE
				} else {
					&CLASS_XML_SYSTEM_APOS_DELIMITED_BYTE
				};
				match self.read_validated(r, &selector, self.opts.max_token_length)? {
					Endbyte::Eof => Err(Error::wfeof(ERRCTX_DOCTYPE)),
					Endbyte::Limit => Err(Self::token_length_error()),
					Endbyte::Delimiter(b) if b == delim => {
						let sysid = self.flush_scratchpad_as_complete_cdata()?;
						match owner {
							ExtIdOwner::Doctype => {
								// declarations may exist in the external
								// subset which is never fetched
								self.entities.mark_incomplete();
								let tok = Token::DoctypeSystemId(self.metrics(0), sysid);
								Ok(ST(
									State::Doctype(DoctypeState::AfterExternalId),
									Some(tok),
								))
							}
							ExtIdOwner::Entity { parameter } => {
								self.dtd.system_id = Some(sysid);
								Ok(ST(
									State::Doctype(DoctypeState::EntityAfterExtId { parameter }),
									None,
								))
							}
							ExtIdOwner::Notation => {
								self.dtd.system_id = Some(sysid);
								Ok(ST(State::Doctype(DoctypeState::NotationEnd), None))
							}
						}
					}
					Endbyte::Delimiter(b) => Err(Error::Fatal(CrateError::NotWellFormed(
						WFError::InvalidChar(ERRCTX_DOCTYPE, b as u32, false),
					))),
				}
			}
			DoctypeState::AfterExternalId => match self.skip_then(r, ERRCTX_DOCTYPE)? {
				b'[' => Ok(ST(
					State::Doctype(DoctypeState::IntSubset),
					Some(Token::DoctypeIntSubsetStart(self.metrics(0))),
				)),
				b'>' => Ok(ST(
					State::Content(ContentState::Whitespace),
					Some(Token::DoctypeEnd(self.metrics(0))),
				)),
				b => Err(unexpected(ERRCTX_DOCTYPE, b, Some(&["[", ">"]))),
			},

			DoctypeState::IntSubset => match self.skip_then(r, ERRCTX_INT_SUBSET)? {
				b'<' => Ok(ST(State::Doctype(DoctypeState::SubsetMarkupStart), None)),
				b'%' => Ok(ST(State::Doctype(DoctypeState::SubsetPERef), None)),
				b']' => Ok(ST(
					State::Doctype(DoctypeState::CloseOuter),
					Some(Token::DoctypeIntSubsetEnd(self.metrics(0))),
				)),
				b => Err(unexpected(ERRCTX_INT_SUBSET, b, Some(&["<", "%", "]"]))),
			},
			DoctypeState::SubsetMarkupStart => {
				match handle_eof(self.read_single(r)?, ERRCTX_INT_SUBSET)? {
					b'!' => Ok(ST(State::Doctype(DoctypeState::SubsetBang), None)),
					b'?' => Ok(ST(
						State::Pi {
							ret: MiscReturn::IntSubset,
							state: PiState::Target {
								decl_allowed: false,
							},
						},
						None,
					)),
					b => Err(unexpected(ERRCTX_INT_SUBSET, b, Some(&["!", "?"]))),
				}
			}
			DoctypeState::SubsetBang => {
				match handle_eof(self.read_single(r)?, ERRCTX_INT_SUBSET)? {
					b'-' => Ok(ST(
						State::Comment {
							ret: MiscReturn::IntSubset,
							state: CommentState::Start,
						},
						None,
					)),
					b if CLASS_UPPER_ALPHA_BYTE.select(b) => {
						self.prep_scratchpad();
						self.scratchpad.push(b);
						Ok(ST(State::Doctype(DoctypeState::SubsetKeyword), None))
					}
					b => Err(unexpected(
						ERRCTX_INT_SUBSET,
						b,
						Some(&["--", "ENTITY", "ELEMENT", "ATTLIST", "NOTATION"]),
					)),
				}
			}
			DoctypeState::SubsetKeyword => {
				match self.read_validated(r, &CLASS_UPPER_ALPHA_BYTE, KW_NOTATION.len() + 1)? {
					Endbyte::Eof => Err(Error::wfeof(ERRCTX_INT_SUBSET)),
					Endbyte::Limit => Err(keyword_error()),
					Endbyte::Delimiter(b) => {
						if !CLASS_XML_SPACE_BYTE.select(b) {
							return Err(unexpected(ERRCTX_INT_SUBSET, b, Some(&["space"])));
						}
						let next = if self.scratchpad == KW_ENTITY {
							DoctypeState::EntityDeclStart
						} else if self.scratchpad == KW_ELEMENT {
							DoctypeState::ElementDeclStart
						} else if self.scratchpad == KW_ATTLIST {
							DoctypeState::AttlistStart
						} else if self.scratchpad == KW_NOTATION {
							DoctypeState::NotationDeclStart
						} else {
							return Err(keyword_error());
						};
						self.drop_scratchpad();
						self.dtd.clear();
						Ok(ST(State::Doctype(next), None))
					}
				}
			}
			DoctypeState::SubsetPERef => {
				match self.read_validated(r, &CLASS_XML_NAME_BYTE, self.opts.max_token_length)? {
					Endbyte::Eof => Err(Error::wfeof(ERRCTX_REF)),
					Endbyte::Limit => Err(Self::token_length_error()),
					Endbyte::Delimiter(b';') => {
						let name = self.flush_scratchpad_as_name()?;
						self.resolve_pe_ref(name)
					}
					Endbyte::Delimiter(b) => Err(unexpected(ERRCTX_REF, b, Some(&[";"]))),
				}
			}

			DoctypeState::EntityDeclStart => match self.skip_then(r, ERRCTX_ENTITY_DECL)? {
				b'%' => Ok(ST(State::Doctype(DoctypeState::EntityDeclParamMarker), None)),
				b if CLASS_XML_NAMESTART_BYTE.select(b) => {
					self.prep_scratchpad();
					self.scratchpad.push(b);
					Ok(ST(
						State::Doctype(DoctypeState::EntityName { parameter: false }),
						None,
					))
				}
				b => Err(unexpected(
					ERRCTX_ENTITY_DECL,
					b,
					Some(&["%", "start of name"]),
				)),
			},
			DoctypeState::EntityDeclParamMarker => {
				match handle_eof(self.read_single(r)?, ERRCTX_ENTITY_DECL)? {
					b if CLASS_XML_SPACE_BYTE.select(b) => Ok(ST(
						State::Doctype(DoctypeState::EntityName { parameter: true }),
						None,
					)),
					b => Err(unexpected(ERRCTX_ENTITY_DECL, b, Some(&["space"]))),
				}
			}
			DoctypeState::EntityName { parameter } => {
				if self.scratchpad.len() == 0 {
					match self.skip_then(r, ERRCTX_ENTITY_DECL)? {
						b if CLASS_XML_NAMESTART_BYTE.select(b) => {
							self.prep_scratchpad();
							self.scratchpad.push(b);
							Ok(ST(
								State::Doctype(DoctypeState::EntityName { parameter }),
								None,
							))
						}
						b => Err(unexpected(ERRCTX_ENTITY_DECL, b, Some(&["start of name"]))),
					}
				} else {
					match self.read_validated(r, &CLASS_XML_NAME_BYTE, self.opts.max_token_length)?
					{
						Endbyte::Eof => Err(Error::wfeof(ERRCTX_ENTITY_DECL)),
						Endbyte::Limit => Err(Self::token_length_error()),
						Endbyte::Delimiter(b) if CLASS_XML_SPACE_BYTE.select(b) => {
							let name = self.flush_scratchpad_as_name()?;
							self.dtd.name = Some(name);
							Ok(ST(
								State::Doctype(DoctypeState::EntityAfterName { parameter }),
								None,
							))
						}
						Endbyte::Delimiter(b) => {
							Err(unexpected(ERRCTX_ENTITY_DECL, b, Some(&["space"])))
						}
					}
				}
			}
			DoctypeState::EntityAfterName { parameter } => {
				match self.skip_then(r, ERRCTX_ENTITY_DECL)? {
					b @ b'"' | b @ b'\'' => {
						self.dtd.value_parts.clear();
						Ok(ST(
							State::Doctype(DoctypeState::EntityValue {
								parameter,
								delim: b,
								after_cr: false,
							}),
							None,
						))
					}
					b if CLASS_UPPER_ALPHA_BYTE.select(b) => {
						self.prep_scratchpad();
						self.scratchpad.push(b);
						Ok(ST(
							State::Doctype(DoctypeState::ExtIdKeyword(ExtIdOwner::Entity {
								parameter,
							})),
							None,
						))
					}
					b => Err(unexpected(
						ERRCTX_ENTITY_DECL,
						b,
						Some(&["\"", "'", "SYSTEM", "PUBLIC"]),
					)),
				}
			}
			DoctypeState::EntityValue {
				parameter,
				delim,
				after_cr: false,
			} => {
				let selector: &'static [ByteRange] = if delim == b'"' {
					&CLASS_XML_ENTITY_VALUE_QUOT_DELIMITED_BYTE
				} else {
					&CLASS_XML_ENTITY_VALUE_APOS_DELIMITED_BYTE
				};
				match self.read_validated(r, &selector, self.opts.max_token_length)? {
					Endbyte::Eof => Err(Error::wfeof(ERRCTX_ENTITY_VALUE)),
					Endbyte::Limit => Err(Self::token_length_error()),
					Endbyte::Delimiter(b) => {
						self.entity_value_delimiter(parameter, delim, b)
					}
				}
			}
			DoctypeState::EntityValue {
				parameter,
				delim,
				after_cr: true,
			} => {
				let b = handle_eof(self.read_single(r)?, ERRCTX_ENTITY_VALUE)?;
				self.prep_scratchpad();
				self.scratchpad.push(b'\n');
				match b {
					b'\n' => Ok(ST(
						State::Doctype(DoctypeState::EntityValue {
							parameter,
							delim,
							after_cr: false,
						}),
						None,
					)),
					b'\r' => Ok(ST(
						State::Doctype(DoctypeState::EntityValue {
							parameter,
							delim,
							after_cr: true,
						}),
						None,
					)),
					b => self.entity_value_delimiter(parameter, delim, b),
				}
			}
			DoctypeState::EntityValueRef {
				parameter,
				delim,
				kind,
			} => self.lex_entity_value_ref(parameter, delim, kind, r),
			DoctypeState::EntityAfterValue { parameter } => {
				match self.skip_then(r, ERRCTX_ENTITY_DECL)? {
					b'>' => {
						let name = self.dtd.name.take().expect("entity name");
						let parts = std::mem::take(&mut self.dtd.value_parts);
						let decl = EntityDecl::Internal {
							name,
							parameter,
							value: RcPtr::new(EntityValue { parts }),
						};
						self.entities.declare(decl.clone());
						Ok(ST(
							State::Doctype(DoctypeState::IntSubset),
							Some(Token::EntityDecl(self.metrics(0), decl)),
						))
					}
					b => Err(unexpected(ERRCTX_ENTITY_DECL, b, Some(&[">"]))),
				}
			}
			DoctypeState::EntityAfterExtId { parameter } => {
				match self.skip_then(r, ERRCTX_ENTITY_DECL)? {
					b'>' => {
						let decl = self.build_external_entity(parameter)?;
						self.entities.declare(decl.clone());
						Ok(ST(
							State::Doctype(DoctypeState::IntSubset),
							Some(Token::EntityDecl(self.metrics(0), decl)),
						))
					}
					b'N' if !parameter => {
						self.prep_scratchpad();
						self.scratchpad.push(b'N');
						Ok(ST(State::Doctype(DoctypeState::EntityNdataKeyword), None))
					}
					b => Err(unexpected(ERRCTX_ENTITY_DECL, b, Some(&[">", "NDATA"]))),
				}
			}
			DoctypeState::EntityNdataKeyword => {
				match self.read_validated(r, &CLASS_UPPER_ALPHA_BYTE, KW_NDATA.len() + 1)? {
					Endbyte::Eof => Err(Error::wfeof(ERRCTX_ENTITY_DECL)),
					Endbyte::Limit => Err(keyword_error()),
					Endbyte::Delimiter(b) => {
						if self.scratchpad != KW_NDATA {
							return Err(keyword_error());
						}
						if !CLASS_XML_SPACE_BYTE.select(b) {
							return Err(unexpected(ERRCTX_ENTITY_DECL, b, Some(&["space"])));
						}
						self.drop_scratchpad();
						Ok(ST(State::Doctype(DoctypeState::EntityNdataName), None))
					}
				}
			}
			DoctypeState::EntityNdataName => {
				if self.scratchpad.len() == 0 {
					match self.skip_then(r, ERRCTX_ENTITY_DECL)? {
						b if CLASS_XML_NAMESTART_BYTE.select(b) => {
							self.prep_scratchpad();
							self.scratchpad.push(b);
							Ok(ST(State::Doctype(DoctypeState::EntityNdataName), None))
						}
						b => Err(unexpected(ERRCTX_ENTITY_DECL, b, Some(&["start of name"]))),
					}
				} else {
					match self.read_validated(r, &CLASS_XML_NAME_BYTE, self.opts.max_token_length)?
					{
						Endbyte::Eof => Err(Error::wfeof(ERRCTX_ENTITY_DECL)),
						Endbyte::Limit => Err(Self::token_length_error()),
						Endbyte::Delimiter(b) => {
							let notation = self.flush_scratchpad_as_name()?;
							self.dtd.ndata = Some(notation);
							match b {
								b'>' => {
									let decl = self.build_external_entity(false)?;
									self.entities.declare(decl.clone());
									Ok(ST(
										State::Doctype(DoctypeState::IntSubset),
										Some(Token::EntityDecl(self.metrics(0), decl)),
									))
								}
								b if CLASS_XML_SPACE_BYTE.select(b) => Ok(ST(
									State::Doctype(DoctypeState::EntityAfterNdata),
									None,
								)),
								b => Err(unexpected(
									ERRCTX_ENTITY_DECL,
									b,
									Some(&[">", "space"]),
								)),
							}
						}
					}
				}
			}
			DoctypeState::EntityAfterNdata => match self.skip_then(r, ERRCTX_ENTITY_DECL)? {
				b'>' => {
					let decl = self.build_external_entity(false)?;
					self.entities.declare(decl.clone());
					Ok(ST(
						State::Doctype(DoctypeState::IntSubset),
						Some(Token::EntityDecl(self.metrics(0), decl)),
					))
				}
				b => Err(unexpected(ERRCTX_ENTITY_DECL, b, Some(&[">"]))),
			},

			DoctypeState::ElementDeclStart => match self.skip_then(r, ERRCTX_ELEMENT_DECL)? {
				b if CLASS_XML_NAMESTART_BYTE.select(b) => {
					self.prep_scratchpad();
					self.scratchpad.push(b);
					Ok(ST(State::Doctype(DoctypeState::ElementDeclName), None))
				}
				b => Err(unexpected(ERRCTX_ELEMENT_DECL, b, Some(&["start of name"]))),
			},
			DoctypeState::ElementDeclName => {
				match self.read_validated(r, &CLASS_XML_NAME_BYTE, self.opts.max_token_length)? {
					Endbyte::Eof => Err(Error::wfeof(ERRCTX_ELEMENT_DECL)),
					Endbyte::Limit => Err(Self::token_length_error()),
					Endbyte::Delimiter(b) if CLASS_XML_SPACE_BYTE.select(b) => {
						let name = self.flush_scratchpad_as_name()?;
						self.dtd.name = Some(name);
						Ok(ST(State::Doctype(DoctypeState::ElementDeclContent), None))
					}
					Endbyte::Delimiter(b) => {
						Err(unexpected(ERRCTX_ELEMENT_DECL, b, Some(&["space"])))
					}
				}
			}
			DoctypeState::ElementDeclContent => {
				match self.read_validated(
					r,
					&CLASS_XML_CONTENTSPEC_DELIMITED_BYTE,
					self.opts.max_token_length,
				)? {
					Endbyte::Eof => Err(Error::wfeof(ERRCTX_ELEMENT_DECL)),
					Endbyte::Limit => Err(Self::token_length_error()),
					Endbyte::Delimiter(b'>') => self.finish_element_decl(),
					Endbyte::Delimiter(b'\r') => Ok(ST(
						State::Doctype(DoctypeState::ElementDeclContentCRLF),
						None,
					)),
					Endbyte::Delimiter(b'%') => Err(pe_in_decl_error()),
					Endbyte::Delimiter(b) => Err(Error::Fatal(CrateError::NotWellFormed(
						WFError::InvalidChar(ERRCTX_ELEMENT_DECL, b as u32, false),
					))),
				}
			}
			DoctypeState::ElementDeclContentCRLF => {
				let b = handle_eof(self.read_single(r)?, ERRCTX_ELEMENT_DECL)?;
				self.prep_scratchpad();
				self.scratchpad.push(b'\n');
				match b {
					b'\n' => Ok(ST(State::Doctype(DoctypeState::ElementDeclContent), None)),
					b'\r' => Ok(ST(
						State::Doctype(DoctypeState::ElementDeclContentCRLF),
						None,
					)),
					b'>' => self.finish_element_decl(),
					b'%' => Err(pe_in_decl_error()),
					b if CLASS_XML_CONTENTSPEC_DELIMITED_BYTE.select(b) => {
						self.scratchpad.push(b);
						Ok(ST(State::Doctype(DoctypeState::ElementDeclContent), None))
					}
					b => Err(Error::Fatal(CrateError::NotWellFormed(WFError::InvalidChar(
						ERRCTX_ELEMENT_DECL,
						b as u32,
						false,
					)))),
				}
			}

			DoctypeState::AttlistStart => match self.skip_then(r, ERRCTX_ATTLIST_DECL)? {
				b if CLASS_XML_NAMESTART_BYTE.select(b) => {
					self.prep_scratchpad();
					self.scratchpad.push(b);
					Ok(ST(State::Doctype(DoctypeState::AttlistElemName), None))
				}
				b => Err(unexpected(ERRCTX_ATTLIST_DECL, b, Some(&["start of name"]))),
			},
			DoctypeState::AttlistElemName => {
				match self.read_validated(r, &CLASS_XML_NAME_BYTE, self.opts.max_token_length)? {
					Endbyte::Eof => Err(Error::wfeof(ERRCTX_ATTLIST_DECL)),
					Endbyte::Limit => Err(Self::token_length_error()),
					Endbyte::Delimiter(b) => {
						let name = self.flush_scratchpad_as_name()?;
						self.dtd.name = Some(name);
						match b {
							b'>' => self.finish_attlist(),
							b if CLASS_XML_SPACE_BYTE.select(b) => {
								Ok(ST(State::Doctype(DoctypeState::AttlistScan), None))
							}
							b => Err(unexpected(
								ERRCTX_ATTLIST_DECL,
								b,
								Some(&["space", ">"]),
							)),
						}
					}
				}
			}
			DoctypeState::AttlistScan => match self.skip_then(r, ERRCTX_ATTLIST_DECL)? {
				b'>' => self.finish_attlist(),
				b if CLASS_XML_NAMESTART_BYTE.select(b) => {
					self.prep_scratchpad();
					self.scratchpad.push(b);
					Ok(ST(State::Doctype(DoctypeState::AttlistAttName), None))
				}
				b => Err(unexpected(
					ERRCTX_ATTLIST_DECL,
					b,
					Some(&[">", "start of name"]),
				)),
			},
			DoctypeState::AttlistAttName => {
				match self.read_validated(r, &CLASS_XML_NAME_BYTE, self.opts.max_token_length)? {
					Endbyte::Eof => Err(Error::wfeof(ERRCTX_ATTLIST_DECL)),
					Endbyte::Limit => Err(Self::token_length_error()),
					Endbyte::Delimiter(b) if CLASS_XML_SPACE_BYTE.select(b) => {
						let name = self.flush_scratchpad_as_name()?;
						self.dtd.att_name = Some(name);
						Ok(ST(State::Doctype(DoctypeState::AttlistAfterAttName), None))
					}
					Endbyte::Delimiter(b) => {
						Err(unexpected(ERRCTX_ATTLIST_DECL, b, Some(&["space"])))
					}
				}
			}
			DoctypeState::AttlistAfterAttName => match self.skip_then(r, ERRCTX_ATTLIST_DECL)? {
				b'(' => {
					self.dtd.tokens.clear();
					Ok(ST(
						State::Doctype(DoctypeState::AttlistEnum { notation: false }),
						None,
					))
				}
				b if CLASS_UPPER_ALPHA_BYTE.select(b) => {
					self.prep_scratchpad();
					self.scratchpad.push(b);
					Ok(ST(State::Doctype(DoctypeState::AttlistTypeKeyword), None))
				}
				b => Err(unexpected(
					ERRCTX_ATTLIST_DECL,
					b,
					Some(&["attribute type", "("]),
				)),
			},
			DoctypeState::AttlistTypeKeyword => {
				match self.read_validated(r, &CLASS_UPPER_ALPHA_BYTE, KW_NOTATION.len() + 1)? {
					Endbyte::Eof => Err(Error::wfeof(ERRCTX_ATTLIST_DECL)),
					Endbyte::Limit => Err(keyword_error()),
					Endbyte::Delimiter(b) => {
						if !CLASS_XML_SPACE_BYTE.select(b) {
							return Err(unexpected(ERRCTX_ATTLIST_DECL, b, Some(&["space"])));
						}
						let ty = match &self.scratchpad[..] {
							b"CDATA" => Some(AttType::Cdata),
							b"ID" => Some(AttType::Id),
							b"IDREF" => Some(AttType::IdRef),
							b"IDREFS" => Some(AttType::IdRefs),
							b"ENTITY" => Some(AttType::Entity),
							b"ENTITIES" => Some(AttType::Entities),
							b"NMTOKEN" => Some(AttType::NmToken),
							b"NMTOKENS" => Some(AttType::NmTokens),
							b"NOTATION" => None,
							_ => return Err(keyword_error()),
						};
						self.drop_scratchpad();
						match ty {
							Some(ty) => {
								self.dtd.att_type = Some(ty);
								Ok(ST(State::Doctype(DoctypeState::AttlistAfterType), None))
							}
							None => Ok(ST(
								State::Doctype(DoctypeState::AttlistNotationStart),
								None,
							)),
						}
					}
				}
			}
			DoctypeState::AttlistNotationStart => match self.skip_then(r, ERRCTX_ATTLIST_DECL)? {
				b'(' => {
					self.dtd.tokens.clear();
					Ok(ST(
						State::Doctype(DoctypeState::AttlistEnum { notation: true }),
						None,
					))
				}
				b => Err(unexpected(ERRCTX_ATTLIST_DECL, b, Some(&["("]))),
			},
			DoctypeState::AttlistEnum { notation } => {
				match self.skip_then(r, ERRCTX_ATTLIST_DECL)? {
					b if (notation && CLASS_XML_NAMESTART_BYTE.select(b))
						|| (!notation && CLASS_XML_NAME_BYTE.select(b)) =>
					{
						self.prep_scratchpad();
						self.scratchpad.push(b);
						Ok(ST(
							State::Doctype(DoctypeState::AttlistEnumName { notation }),
							None,
						))
					}
					b => Err(unexpected(ERRCTX_ATTLIST_DECL, b, Some(&["token"]))),
				}
			}
			DoctypeState::AttlistEnumName { notation } => {
				match self.read_validated(r, &CLASS_XML_NAME_BYTE, self.opts.max_token_length)? {
					Endbyte::Eof => Err(Error::wfeof(ERRCTX_ATTLIST_DECL)),
					Endbyte::Limit => Err(Self::token_length_error()),
					Endbyte::Delimiter(b) => {
						let tok = self.flush_scratchpad_as_complete_cdata()?;
						self.dtd.tokens.push(tok);
						match b {
							b'|' => Ok(ST(
								State::Doctype(DoctypeState::AttlistEnum { notation }),
								None,
							)),
							b')' => {
								self.finish_enum_type(notation)?;
								Ok(ST(State::Doctype(DoctypeState::AttlistAfterType), None))
							}
							b if CLASS_XML_SPACE_BYTE.select(b) => Ok(ST(
								State::Doctype(DoctypeState::AttlistEnumAfterName { notation }),
								None,
							)),
							b => Err(unexpected(
								ERRCTX_ATTLIST_DECL,
								b,
								Some(&["|", ")", "space"]),
							)),
						}
					}
				}
			}
			DoctypeState::AttlistEnumAfterName { notation } => {
				match self.skip_then(r, ERRCTX_ATTLIST_DECL)? {
					b'|' => Ok(ST(
						State::Doctype(DoctypeState::AttlistEnum { notation }),
						None,
					)),
					b')' => {
						self.finish_enum_type(notation)?;
						Ok(ST(State::Doctype(DoctypeState::AttlistAfterType), None))
					}
					b => Err(unexpected(ERRCTX_ATTLIST_DECL, b, Some(&["|", ")"]))),
				}
			}
			DoctypeState::AttlistAfterType => match self.skip_then(r, ERRCTX_ATTLIST_DECL)? {
				b'#' => Ok(ST(State::Doctype(DoctypeState::AttlistDefaultKeyword), None)),
				b @ b'"' | b @ b'\'' => Ok(ST(
					State::Doctype(DoctypeState::AttlistDefaultValue {
						delim: b,
						fixed: false,
						after_cr: false,
					}),
					None,
				)),
				b => Err(unexpected(
					ERRCTX_ATTLIST_DECL,
					b,
					Some(&["#", "\"", "'"]),
				)),
			},
			DoctypeState::AttlistDefaultKeyword => {
				match self.read_validated(r, &CLASS_UPPER_ALPHA_BYTE, 9)? {
					Endbyte::Eof => Err(Error::wfeof(ERRCTX_ATTLIST_DECL)),
					Endbyte::Limit => Err(keyword_error()),
					Endbyte::Delimiter(b) => {
						let default = match &self.scratchpad[..] {
							b"REQUIRED" => Some(AttDefault::Required),
							b"IMPLIED" => Some(AttDefault::Implied),
							b"FIXED" => None,
							_ => return Err(keyword_error()),
						};
						self.drop_scratchpad();
						match default {
							Some(default) => {
								self.finish_att_def(default)?;
								match b {
									b'>' => self.finish_attlist(),
									b if CLASS_XML_SPACE_BYTE.select(b) => {
										Ok(ST(State::Doctype(DoctypeState::AttlistScan), None))
									}
									b => Err(unexpected(
										ERRCTX_ATTLIST_DECL,
										b,
										Some(&["space", ">"]),
									)),
								}
							}
							None => {
								if !CLASS_XML_SPACE_BYTE.select(b) {
									return Err(unexpected(
										ERRCTX_ATTLIST_DECL,
										b,
										Some(&["space"]),
									));
								}
								Ok(ST(
									State::Doctype(DoctypeState::AttlistFixedValueStart),
									None,
								))
							}
						}
					}
				}
			}
			DoctypeState::AttlistFixedValueStart => {
				match self.skip_then(r, ERRCTX_ATTLIST_DECL)? {
					b @ b'"' | b @ b'\'' => Ok(ST(
						State::Doctype(DoctypeState::AttlistDefaultValue {
							delim: b,
							fixed: true,
							after_cr: false,
						}),
						None,
					)),
					b => Err(unexpected(ERRCTX_ATTLIST_DECL, b, Some(&["\"", "'"]))),
				}
			}
			DoctypeState::AttlistDefaultValue {
				delim,
				fixed,
				after_cr: false,
			} => {
				let selector: &'static [ByteRange] = if delim == b'"' {
					&CLASS_XML_ATT_QUOT_DELIMITED_BYTE
				} else {
					&CLASS_XML_ATT_APOS_DELIMITED_BYTE
				};
				match self.read_validated(r, &selector, self.opts.max_token_length)? {
					Endbyte::Eof => Err(Error::wfeof(ERRCTX_ATTLIST_DECL)),
					Endbyte::Limit => Err(Self::token_length_error()),
					Endbyte::Delimiter(b) => self.default_value_delimiter(delim, fixed, b),
				}
			}
			DoctypeState::AttlistDefaultValue {
				delim,
				fixed,
				after_cr: true,
			} => {
				let b = handle_eof(self.read_single(r)?, ERRCTX_ATTLIST_DECL)?;
				self.prep_scratchpad();
				self.scratchpad.push(b' ');
				match b {
					b'\n' => Ok(ST(
						State::Doctype(DoctypeState::AttlistDefaultValue {
							delim,
							fixed,
							after_cr: false,
						}),
						None,
					)),
					b'\r' => Ok(ST(
						State::Doctype(DoctypeState::AttlistDefaultValue {
							delim,
							fixed,
							after_cr: true,
						}),
						None,
					)),
					b => self.default_value_delimiter(delim, fixed, b),
				}
			}
			DoctypeState::AttlistDefaultValueRef { delim, fixed, kind } => {
				self.lex_default_value_ref(delim, fixed, kind, r)
			}

			DoctypeState::NotationDeclStart => match self.skip_then(r, ERRCTX_NOTATION_DECL)? {
				b if CLASS_XML_NAMESTART_BYTE.select(b) => {
					self.prep_scratchpad();
					self.scratchpad.push(b);
					Ok(ST(State::Doctype(DoctypeState::NotationDeclName), None))
				}
				b => Err(unexpected(
					ERRCTX_NOTATION_DECL,
					b,
					Some(&["start of name"]),
				)),
			},
			DoctypeState::NotationDeclName => {
				match self.read_validated(r, &CLASS_XML_NAME_BYTE, self.opts.max_token_length)? {
					Endbyte::Eof => Err(Error::wfeof(ERRCTX_NOTATION_DECL)),
					Endbyte::Limit => Err(Self::token_length_error()),
					Endbyte::Delimiter(b) if CLASS_XML_SPACE_BYTE.select(b) => {
						let name = self.flush_scratchpad_as_name()?;
						self.dtd.name = Some(name);
						Ok(ST(State::Doctype(DoctypeState::NotationAfterName), None))
					}
					Endbyte::Delimiter(b) => {
						Err(unexpected(ERRCTX_NOTATION_DECL, b, Some(&["space"])))
					}
				}
			}
			DoctypeState::NotationAfterName => match self.skip_then(r, ERRCTX_NOTATION_DECL)? {
				b if CLASS_UPPER_ALPHA_BYTE.select(b) => {
					self.prep_scratchpad();
					self.scratchpad.push(b);
					Ok(ST(
						State::Doctype(DoctypeState::ExtIdKeyword(ExtIdOwner::Notation)),
						None,
					))
				}
				b => Err(unexpected(
					ERRCTX_NOTATION_DECL,
					b,
					Some(&["SYSTEM", "PUBLIC"]),
				)),
			},
			DoctypeState::NotationAfterPublic => {
				match self.skip_then(r, ERRCTX_NOTATION_DECL)? {
					b'>' => self.finish_notation(),
					b @ b'"' | b @ b'\'' => Ok(ST(
						State::Doctype(DoctypeState::SystemLiteral(ExtIdOwner::Notation, b)),
						None,
					)),
					b => Err(unexpected(
						ERRCTX_NOTATION_DECL,
						b,
						Some(&[">", "\"", "'"]),
					)),
				}
			}
			DoctypeState::NotationEnd => match self.skip_then(r, ERRCTX_NOTATION_DECL)? {
				b'>' => self.finish_notation(),
				b => Err(unexpected(ERRCTX_NOTATION_DECL, b, Some(&[">"]))),
			},

			DoctypeState::CloseOuter => match self.skip_then(r, ERRCTX_DOCTYPE)? {
				b'>' => Ok(ST(
					State::Content(ContentState::Whitespace),
					Some(Token::DoctypeEnd(self.metrics(0))),
				)),
				b => Err(unexpected(ERRCTX_DOCTYPE, b, Some(&[">"]))),
			},
		}
	}

	/// Skip whitespace and hand back the first non-space byte.
	fn skip_then(&mut self, r: &mut &[u8], ctx: &'static str) -> Result<u8> {
		match self.skip_matching(r, &CLASS_XML_SPACE_BYTE) {
			(_, Ok(Endbyte::Eof)) | (_, Ok(Endbyte::Limit)) => Err(Error::wfeof(ctx)),
			(_, Ok(Endbyte::Delimiter(b))) => Ok(b),
			(_, Err(e)) => Err(e),
		}
	}

	/// Handle a delimiter byte inside an entity value.
	fn entity_value_delimiter(&mut self, parameter: bool, delim: u8, b: u8) -> Result<ST> {
		if b == delim {
			if self.scratchpad.len() > 0 {
				let text = self.flush_scratchpad(|bytes| -> Result<String> {
					let s = std::str::from_utf8(bytes)
						.map_err(|e| Error::utf8err(bytes, &e))?;
					Ok(s.to_string())
				})?;
				self.dtd.value_parts.push(EntityPart::Text(text));
			}
			return Ok(ST(
				State::Doctype(DoctypeState::EntityAfterValue { parameter }),
				None,
			));
		}
		match b {
			b'&' => {
				self.swap_scratchpad();
				Ok(ST(
					State::Doctype(DoctypeState::EntityValueRef {
						parameter,
						delim,
						kind: RefKind::Entity,
					}),
					None,
				))
			}
			b'%' => Err(pe_in_decl_error()),
			b'\r' => Ok(ST(
				State::Doctype(DoctypeState::EntityValue {
					parameter,
					delim,
					after_cr: true,
				}),
				None,
			)),
			b if CLASS_XML_MAY_NONCHAR_BYTE.select(b) => {
				Err(Error::Fatal(CrateError::NotWellFormed(WFError::InvalidChar(
					ERRCTX_ENTITY_VALUE,
					b as u32,
					false,
				))))
			}
			// the other quote kind arrives here
			b => {
				self.prep_scratchpad();
				self.scratchpad.push(b);
				Ok(ST(
					State::Doctype(DoctypeState::EntityValue {
						parameter,
						delim,
						after_cr: false,
					}),
					None,
				))
			}
		}
	}

	/// References inside entity values: character references are resolved
	/// immediately, general entity references are bypassed into the stored
	/// parts (XML 1.0 § 4.4.7).
	fn lex_entity_value_ref(
		&mut self,
		parameter: bool,
		delim: u8,
		kind: RefKind,
		r: &mut &[u8],
	) -> Result<ST> {
		match self.lex_ref_body(kind, r)? {
			RefBody::Again(kind) => Ok(ST(
				State::Doctype(DoctypeState::EntityValueRef {
					parameter,
					delim,
					kind,
				}),
				None,
			)),
			RefBody::Char(ch) => {
				self.push_char(ch);
				Ok(ST(
					State::Doctype(DoctypeState::EntityValue {
						parameter,
						delim,
						after_cr: false,
					}),
					None,
				))
			}
			RefBody::Entity(name) => {
				if self.scratchpad.len() > 0 {
					let text = self.flush_scratchpad(|bytes| -> Result<String> {
						let s = std::str::from_utf8(bytes)
							.map_err(|e| Error::utf8err(bytes, &e))?;
						Ok(s.to_string())
					})?;
					self.dtd.value_parts.push(EntityPart::Text(text));
				}
				self.dtd.value_parts.push(EntityPart::Ref(name));
				Ok(ST(
					State::Doctype(DoctypeState::EntityValue {
						parameter,
						delim,
						after_cr: false,
					}),
					None,
				))
			}
		}
	}

	/// References inside attribute default values: only character
	/// references and the predefined entities are supported.
	fn lex_default_value_ref(
		&mut self,
		delim: u8,
		fixed: bool,
		kind: RefKind,
		r: &mut &[u8],
	) -> Result<ST> {
		match self.lex_ref_body(kind, r)? {
			RefBody::Again(kind) => Ok(ST(
				State::Doctype(DoctypeState::AttlistDefaultValueRef { delim, fixed, kind }),
				None,
			)),
			RefBody::Char(ch) => {
				self.push_char(ch);
				Ok(ST(
					State::Doctype(DoctypeState::AttlistDefaultValue {
						delim,
						fixed,
						after_cr: false,
					}),
					None,
				))
			}
			RefBody::Entity(name) => match predefined_entity(&name) {
				Some(ch) => {
					self.push_char(ch);
					Ok(ST(
						State::Doctype(DoctypeState::AttlistDefaultValue {
							delim,
							fixed,
							after_cr: false,
						}),
						None,
					))
				}
				None => Err(Error::Fatal(CrateError::NotWellFormed(WFError::InvalidSyntax(
					"general entity reference in attribute default",
				)))),
			},
		}
	}

	/// Common scanning of a reference body (after `&`), with the scratchpad
	/// swapped so the surrounding literal survives.
	fn lex_ref_body(&mut self, kind: RefKind, r: &mut &[u8]) -> Result<RefBody> {
		let result = match kind {
			RefKind::Entity => self.read_validated(r, &CLASS_XML_NAME_BYTE, MAX_REFERENCE_LENGTH)?,
			RefKind::Char(CharRefRadix::Decimal) => {
				self.read_validated(r, &CLASS_XML_DECIMAL_DIGIT_BYTE, MAX_REFERENCE_LENGTH)?
			}
			RefKind::Char(CharRefRadix::Hexadecimal) => {
				self.read_validated(r, &CLASS_XML_HEXADECIMAL_DIGIT_BYTE, MAX_REFERENCE_LENGTH)?
			}
		};
		let b = match result {
			Endbyte::Eof => return Err(Error::wfeof(ERRCTX_REF)),
			Endbyte::Limit => return Err(EntityError::Undeclared(ERRCTX_REF).into()),
			Endbyte::Delimiter(b) => b,
		};
		match b {
			b'#' if self.scratchpad.len() == 0 && kind == RefKind::Entity => {
				Ok(RefBody::Again(RefKind::Char(CharRefRadix::Decimal)))
			}
			b'x' if self.scratchpad.len() == 0
				&& kind == RefKind::Char(CharRefRadix::Decimal) =>
			{
				Ok(RefBody::Again(RefKind::Char(CharRefRadix::Hexadecimal)))
			}
			b';' => {
				if self.scratchpad.len() == 0 {
					return Err(Error::Fatal(CrateError::NotWellFormed(
						WFError::InvalidSyntax("empty reference"),
					)));
				}
				self.swap_scratchpad();
				let refbytes = self.read_swap();
				match kind {
					RefKind::Char(radix) => {
						let digits = unsafe { std::str::from_utf8_unchecked(&refbytes[..]) };
						let ch = self.resolve_char_reference(digits, radix)?;
						Ok(RefBody::Char(ch))
					}
					RefKind::Entity => Ok(RefBody::Entity(Self::bytes_to_name(&refbytes)?)),
				}
			}
			c => Err(Error::Fatal(CrateError::NotWellFormed(WFError::UnexpectedByte(
				ERRCTX_REF,
				c,
				Some(&[";"]),
			)))),
		}
	}

	/// Resolve a parameter entity reference at subset level.
	fn resolve_pe_ref(&mut self, name: Name) -> Result<ST> {
		let decl = match self.entities.get_parameter(&name) {
			Some(decl) => Some(decl.clone()),
			None => None,
		};
		match decl.as_deref() {
			Some(EntityDecl::Internal { value, .. }) => {
				self.expansion
					.push(name, value.clone(), FrameContext::IntSubset)?;
				Ok(ST(State::Doctype(DoctypeState::IntSubset), None))
			}
			Some(EntityDecl::ExternalParsed { id, .. }) => {
				if self.opts.external_parameter_entities {
					if let Some(value) = self.fetch_external(id)? {
						self.expansion
							.push(name, value, FrameContext::IntSubset)?;
						return Ok(ST(State::Doctype(DoctypeState::IntSubset), None));
					}
				}
				// not fetched; everything it might have declared is
				// unknown from here on
				self.entities.mark_incomplete();
				Ok(ST(
					State::Doctype(DoctypeState::IntSubset),
					Some(Token::ParameterEntityRef(self.metrics(0), name)),
				))
			}
			Some(EntityDecl::ExternalUnparsed { .. }) => {
				Err(EntityError::UnparsedReference(ERRCTX_INT_SUBSET).into())
			}
			None => {
				if self.entities.is_complete() {
					Err(EntityError::Undeclared(ERRCTX_INT_SUBSET).into())
				} else {
					Ok(ST(
						State::Doctype(DoctypeState::IntSubset),
						Some(Token::ParameterEntityRef(self.metrics(0), name)),
					))
				}
			}
		}
	}

	fn build_external_entity(&mut self, parameter: bool) -> Result<EntityDecl> {
		let name = self.dtd.name.take().expect("entity name");
		let system_id = self.dtd.system_id.take().expect("system id");
		let id = ExternalId {
			public_id: self.dtd.public_id.take(),
			system_id,
		};
		match self.dtd.ndata.take() {
			Some(notation) => Ok(EntityDecl::ExternalUnparsed { name, id, notation }),
			None => Ok(EntityDecl::ExternalParsed {
				name,
				parameter,
				id,
			}),
		}
	}

	fn finish_element_decl(&mut self) -> Result<ST> {
		let name = self.dtd.name.take().expect("element decl name");
		let raw = self.flush_scratchpad_as_complete_cdata()?;
		Ok(ST(
			State::Doctype(DoctypeState::IntSubset),
			Some(Token::ElementDecl(self.metrics(0), name, raw)),
		))
	}

	fn finish_enum_type(&mut self, notation: bool) -> Result<()> {
		let tokens = std::mem::take(&mut self.dtd.tokens);
		let ty = if notation {
			let mut names = Vec::with_capacity(tokens.len());
			for tok in tokens {
				let name: Name = tok
					.as_str()
					.try_into()
					.map_err(|e: CrateError| Error::Fatal(e.with_context(ERRCTX_ATTLIST_DECL)))?;
				names.push(name);
			}
			AttType::Notation(names)
		} else {
			let mut names = Vec::with_capacity(tokens.len());
			for tok in tokens {
				let name: NCName = tok
					.as_str()
					.try_into()
					.map_err(|e: CrateError| Error::Fatal(e.with_context(ERRCTX_ATTLIST_DECL)))?;
				names.push(name);
			}
			AttType::Enumeration(names)
		};
		self.dtd.att_type = Some(ty);
		Ok(())
	}

	fn finish_att_def(&mut self, default: AttDefault) -> Result<()> {
		let name = self.dtd.att_name.take().expect("attribute name");
		let ty = self.dtd.att_type.take().expect("attribute type");
		self.dtd.att_defs.push(AttDef { name, ty, default });
		Ok(())
	}

	/// Handle a delimiter byte inside an attribute default value.
	fn default_value_delimiter(&mut self, delim: u8, fixed: bool, b: u8) -> Result<ST> {
		if b == delim {
			let value = self.flush_scratchpad_as_complete_cdata()?;
			let default = if fixed {
				AttDefault::Fixed(value)
			} else {
				AttDefault::Value(value)
			};
			self.finish_att_def(default)?;
			return Ok(ST(State::Doctype(DoctypeState::AttlistScan), None));
		}
		match b {
			b'<' => Err(WFError::UnescapedLtInAttribute.into()),
			b'&' => {
				self.swap_scratchpad();
				Ok(ST(
					State::Doctype(DoctypeState::AttlistDefaultValueRef {
						delim,
						fixed,
						kind: RefKind::Entity,
					}),
					None,
				))
			}
			b'\t' | b'\n' => {
				self.prep_scratchpad();
				self.scratchpad.push(b' ');
				Ok(ST(
					State::Doctype(DoctypeState::AttlistDefaultValue {
						delim,
						fixed,
						after_cr: false,
					}),
					None,
				))
			}
			b'\r' => Ok(ST(
				State::Doctype(DoctypeState::AttlistDefaultValue {
					delim,
					fixed,
					after_cr: true,
				}),
				None,
			)),
			b => Err(Error::Fatal(CrateError::NotWellFormed(WFError::InvalidChar(
				ERRCTX_ATTLIST_DECL,
				b as u32,
				false,
			)))),
		}
	}

	fn finish_attlist(&mut self) -> Result<ST> {
		let element = self.dtd.name.take().expect("attlist element name");
		let defs = std::mem::take(&mut self.dtd.att_defs);
		Ok(ST(
			State::Doctype(DoctypeState::IntSubset),
			Some(Token::AttlistDecl(
				self.metrics(0),
				AttlistDecl { element, defs },
			)),
		))
	}

	fn finish_notation(&mut self) -> Result<ST> {
		let name = self.dtd.name.take().expect("notation name");
		let decl = NotationDecl {
			name,
			public_id: self.dtd.public_id.take(),
			system_id: self.dtd.system_id.take(),
		};
		Ok(ST(
			State::Doctype(DoctypeState::IntSubset),
			Some(Token::NotationDecl(self.metrics(0), decl)),
		))
	}
}

/// Continuation decision for [`Lexer::lex_ref_body`].
enum RefBody {
	Again(RefKind),
	Char(char),
	Entity(Name),
}

fn unexpected(ctx: &'static str, b: u8, alt: Option<&'static [&'static str]>) -> Error {
	Error::Fatal(CrateError::NotWellFormed(WFError::UnexpectedByte(
		ctx, b, alt,
	)))
}

fn keyword_error() -> Error {
	Error::Fatal(CrateError::NotWellFormed(WFError::InvalidSyntax(
		"unknown declaration keyword",
	)))
}

fn pe_in_decl_error() -> Error {
	Error::Fatal(CrateError::NotWellFormed(WFError::InvalidSyntax(
		"parameter-entity reference inside internal-subset declaration",
	)))
}
