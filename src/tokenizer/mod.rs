//! # Tokenizer Module
//!
//! Byte-level lexer that turns a connection's octet stream into HTTP lexical
//! tokens with one-token pushback.
//!
//! ## Overview
//!
//! The tokenizer is the bottom of the message pipeline. It owns a small
//! buffered window over the connection and yields [`Token`]s on demand:
//!
//! - **Identifier**: a run of bytes in 33..=126 excluding the separator set
//!   `()<>@,;:\"/[]?={}`
//! - **Whitespace**: a run of space/tab
//! - **Crlf**: `\r\n`, or a tolerated lone `\n` (a `\r` followed by anything
//!   other than `\n` is an error)
//! - **QuotedString**: `"` .. `"` with backslash escapes
//! - **Separator** / **CtrlChar**: any other byte, one token per byte
//! - **Eof**: end of stream
//!
//! ## Pushback
//!
//! Exactly one token may be pushed back per `next_token` call. Pushing back
//! twice in a row is a programmer error and panics.
//!
//! ## Raw reads
//!
//! Body bytes bypass tokenization through [`Tokenizer::read_raw`], which
//! first drains any already-tokenized-but-unconsumed text so no bytes are
//! lost at the header/body seam.
//!
//! ## Round-trip property
//!
//! Token text is raw bytes, not decoded text. Concatenating the `.text` of
//! every token produced (whitespace and CRLF included) reproduces the input
//! byte-exact, bytes above 0x7f included; the parser relies on this when it
//! re-assembles multi-token fields like request URIs.

mod core;

pub use self::core::{Token, TokenKind, Tokenizer};
