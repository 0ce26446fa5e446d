use crate::error::{Error, FrameError};
use std::io::Read;
use tracing::trace;

/// RFC 2616 separator set; `"` and `\` route through quoted-string handling.
const SEPARATORS: &[u8] = b"()<>@,;:\\\"/[]?={}";

const READ_CHUNK: usize = 1024;

fn is_separator(b: u8) -> bool {
    SEPARATORS.contains(&b)
}

fn is_ident(b: u8) -> bool {
    (33..=126).contains(&b) && !is_separator(b)
}

/// Lexical class of one [`Token`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Run of token characters (header names, method names, URI pieces)
    Identifier,
    /// Run of space/tab
    Whitespace,
    /// Line terminator (`\r\n` or a tolerated lone `\n`)
    Crlf,
    /// Single separator byte from `()<>@,;:\"/[]?={}`
    Separator,
    /// `"`-delimited string with backslash escapes
    QuotedString,
    /// Any other control or non-ASCII byte, one token per byte
    CtrlChar,
    /// End of stream
    Eof,
}

/// One lexical unit produced by the [`Tokenizer`].
///
/// `text` always holds the raw source bytes, quotes and escapes included, so
/// concatenating token texts reproduces the input exactly. Bytes outside
/// ASCII pass through untouched, one [`TokenKind::CtrlChar`] token each.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: Vec<u8>,
}

impl Token {
    fn new(kind: TokenKind, text: Vec<u8>) -> Self {
        Self { kind, text }
    }

    /// The literal byte for separator/control tokens.
    pub fn literal(&self) -> Option<u8> {
        match self.kind {
            TokenKind::Separator | TokenKind::CtrlChar => self.text.first().copied(),
            _ => None,
        }
    }

    /// Quoted-string content with the delimiters stripped and escapes
    /// resolved; other kinds return the raw bytes.
    pub fn unquoted(&self) -> Vec<u8> {
        if self.kind != TokenKind::QuotedString {
            return self.text.clone();
        }
        let inner = &self.text[1..self.text.len() - 1];
        let mut out = Vec::with_capacity(inner.len());
        let mut escaped = false;
        for &b in inner {
            if escaped {
                out.push(b);
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else {
                out.push(b);
            }
        }
        out
    }

    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }
}

/// Streaming lexer over one connection.
///
/// Owned exclusively by the parsing job that created it; the underlying
/// reader's timeout (set by the server before handing the socket over)
/// surfaces as [`Error::Timeout`].
pub struct Tokenizer<R: Read> {
    source: R,
    buf: Vec<u8>,
    pos: usize,
    eof: bool,
    /// Line counter for diagnostics, bumped on every line terminator.
    line: u64,
    /// Most recent token handed out, retained for pushback.
    last: Option<Token>,
    /// Token awaiting re-delivery after a pushback.
    pushed: Option<Token>,
}

impl<R: Read> Tokenizer<R> {
    pub fn new(source: R) -> Self {
        Self {
            source,
            buf: Vec::new(),
            pos: 0,
            eof: false,
            line: 1,
            last: None,
            pushed: None,
        }
    }

    /// Current line number within the message, for diagnostics.
    pub fn line(&self) -> u64 {
        self.line
    }

    /// True once the stream is exhausted and every buffered byte consumed.
    pub fn end_of_data(&self) -> bool {
        self.eof && self.pos >= self.buf.len() && self.pushed.is_none()
    }

    fn fill(&mut self) -> Result<bool, Error> {
        if self.pos < self.buf.len() {
            return Ok(true);
        }
        if self.eof {
            return Ok(false);
        }
        self.buf.clear();
        self.pos = 0;
        let mut chunk = [0u8; READ_CHUNK];
        let n = self.source.read(&mut chunk)?;
        if n == 0 {
            self.eof = true;
            return Ok(false);
        }
        self.buf.extend_from_slice(&chunk[..n]);
        Ok(true)
    }

    fn peek_byte(&mut self) -> Result<Option<u8>, Error> {
        if self.fill()? {
            Ok(Some(self.buf[self.pos]))
        } else {
            Ok(None)
        }
    }

    fn bump(&mut self) -> Result<Option<u8>, Error> {
        let b = self.peek_byte()?;
        if b.is_some() {
            self.pos += 1;
        }
        Ok(b)
    }

    /// Produce the next token, re-delivering a pushed-back token first.
    pub fn next_token(&mut self) -> Result<Token, Error> {
        if let Some(tok) = self.pushed.take() {
            self.last = Some(tok.clone());
            return Ok(tok);
        }
        let tok = self.lex()?;
        self.last = Some(tok.clone());
        Ok(tok)
    }

    /// Undo exactly the last `next_token`.
    ///
    /// # Panics
    ///
    /// Panics when called twice without an intervening `next_token`; that is
    /// a logic bug in the caller, not a recoverable condition.
    pub fn push_back(&mut self) {
        assert!(
            self.pushed.is_none(),
            "push_back called twice without an intervening next_token"
        );
        match self.last.take() {
            Some(tok) => self.pushed = Some(tok),
            None => panic!("push_back with no token outstanding"),
        }
    }

    fn lex(&mut self) -> Result<Token, Error> {
        let first = match self.bump()? {
            Some(b) => b,
            None => return Ok(Token::new(TokenKind::Eof, Vec::new())),
        };
        match first {
            b' ' | b'\t' => {
                let mut text = vec![first];
                while let Some(b @ (b' ' | b'\t')) = self.peek_byte()? {
                    text.push(b);
                    self.pos += 1;
                }
                Ok(Token::new(TokenKind::Whitespace, text))
            }
            b'\r' => match self.peek_byte()? {
                Some(b'\n') => {
                    self.pos += 1;
                    self.line += 1;
                    Ok(Token::new(TokenKind::Crlf, b"\r\n".to_vec()))
                }
                // Lone CR at end of stream is tolerated as a terminator;
                // CR followed by anything else is a framing error.
                None => {
                    self.line += 1;
                    Ok(Token::new(TokenKind::Crlf, b"\r".to_vec()))
                }
                Some(other) => {
                    trace!(line = self.line, byte = other, "bare CR in stream");
                    Err(FrameError::BareCarriageReturn.into())
                }
            },
            b'\n' => {
                self.line += 1;
                Ok(Token::new(TokenKind::Crlf, b"\n".to_vec()))
            }
            b'"' => self.lex_quoted(),
            b if is_ident(b) => {
                let mut text = vec![b];
                while let Some(nb) = self.peek_byte()? {
                    if !is_ident(nb) {
                        break;
                    }
                    text.push(nb);
                    self.pos += 1;
                }
                Ok(Token::new(TokenKind::Identifier, text))
            }
            b if is_separator(b) => Ok(Token::new(TokenKind::Separator, vec![b])),
            b => Ok(Token::new(TokenKind::CtrlChar, vec![b])),
        }
    }

    fn lex_quoted(&mut self) -> Result<Token, Error> {
        let mut text = vec![b'"'];
        loop {
            let b = match self.bump()? {
                Some(b) => b,
                None => return Err(FrameError::UnterminatedQuote.into()),
            };
            text.push(b);
            match b {
                b'"' => return Ok(Token::new(TokenKind::QuotedString, text)),
                b'\\' => match self.bump()? {
                    Some(esc) if (32..=126).contains(&esc) => text.push(esc),
                    _ => return Err(FrameError::UnterminatedQuote.into()),
                },
                _ => {}
            }
        }
    }

    /// Read up to `out.len()` raw bytes, bypassing tokenization.
    ///
    /// A pushed-back token is drained first, then the buffered window, then
    /// the socket. Returns 0 only at end of stream.
    pub fn read_raw(&mut self, out: &mut [u8]) -> Result<usize, Error> {
        if out.is_empty() {
            return Ok(0);
        }
        if let Some(tok) = self.pushed.take() {
            // Splice the un-consumed token bytes back in front of the window.
            let mut rebuilt = tok.text;
            rebuilt.extend_from_slice(&self.buf[self.pos..]);
            self.buf = rebuilt;
            self.pos = 0;
        }
        // A drained pushback invalidates the pushback window.
        self.last = None;
        if self.pos < self.buf.len() {
            let n = out.len().min(self.buf.len() - self.pos);
            out[..n].copy_from_slice(&self.buf[self.pos..self.pos + n]);
            self.pos += n;
            return Ok(n);
        }
        if self.eof {
            return Ok(0);
        }
        let n = self.source.read(out)?;
        if n == 0 {
            self.eof = true;
        }
        Ok(n)
    }

    /// Read exactly `out.len()` raw bytes; `Ok(n)` with `n < out.len()` means
    /// the stream ended early.
    pub fn read_raw_exact(&mut self, out: &mut [u8]) -> Result<usize, Error> {
        let mut filled = 0;
        while filled < out.len() {
            let n = self.read_raw(&mut out[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        Ok(filled)
    }
}
