//! Markup tokenizer.
//!
//! Two logos lexers share the source: `Markup` scans content (tags, text,
//! comments) and morphs into `TagPart` for the inside of an opening tag,
//! morphing back once the tag closes.

use crate::error::{DecodeError, DecodeResult};
use logos::{Lexer, Logos};

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
enum Markup {
    /// `<?xml ...?>`, `<!-- ... -->` and `<!DOCTYPE ...>`
    #[regex(r"<\?([^?]|\?[^>])*\?>")]
    #[regex(r"<!--([^-]|-[^-])*-->")]
    #[regex(r"<![A-Za-z][^>]*>")]
    Ignored,

    #[regex(r"<[A-Za-z_][A-Za-z0-9_.:-]*")]
    OpenTag,

    #[regex(r"</[A-Za-z_][A-Za-z0-9_.:-]*[ \t\r\n]*>")]
    CloseTag,

    #[regex(r"[^<]+")]
    Text,
}

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n]+")]
enum TagPart {
    #[regex(r"[A-Za-z_][A-Za-z0-9_.:-]*")]
    Name,

    #[token("=")]
    Equals,

    #[regex(r#""[^"]*""#)]
    #[regex(r"'[^']*'")]
    Quoted,

    #[token(">")]
    End,

    #[token("/>")]
    SelfClose,
}

/// Attribute with its raw (still escaped) value
#[derive(Debug, Clone, PartialEq)]
pub struct RawAttribute<'src> {
    pub name: &'src str,
    pub raw: &'src str,
    pub pos: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token<'src> {
    Open {
        name: &'src str,
        attributes: Vec<RawAttribute<'src>>,
        self_closing: bool,
        pos: usize,
    },
    Close {
        name: &'src str,
        pos: usize,
    },
    /// Raw (still escaped) text between tags
    Text { raw: &'src str, pos: usize },
}

pub fn tokenize(source: &str) -> DecodeResult<Vec<Token<'_>>> {
    let mut tokens = Vec::new();
    let mut lex = Markup::lexer(source);

    while let Some(result) = lex.next() {
        let pos = lex.span().start;
        let kind = result.map_err(|_| DecodeError::invalid_syntax(pos, "unexpected character"))?;

        match kind {
            Markup::Ignored => {}
            Markup::Text => tokens.push(Token::Text {
                raw: lex.slice(),
                pos,
            }),
            Markup::CloseTag => {
                let name = lex.slice()[2..].trim_end_matches('>').trim_end();
                tokens.push(Token::Close { name, pos });
            }
            Markup::OpenTag => {
                let name = &lex.slice()[1..];
                let mut tag: Lexer<'_, TagPart> = lex.morph();
                let (attributes, self_closing) = read_attributes(&mut tag, pos)?;
                tokens.push(Token::Open {
                    name,
                    attributes,
                    self_closing,
                    pos,
                });
                lex = tag.morph();
            }
        }
    }

    Ok(tokens)
}

fn read_attributes<'src>(
    tag: &mut Lexer<'src, TagPart>,
    start: usize,
) -> DecodeResult<(Vec<RawAttribute<'src>>, bool)> {
    let mut attributes = Vec::new();

    loop {
        match next_part(tag, start)? {
            TagPart::End => return Ok((attributes, false)),
            TagPart::SelfClose => return Ok((attributes, true)),
            TagPart::Name => {
                let name = tag.slice();

                if next_part(tag, start)? != TagPart::Equals {
                    return Err(DecodeError::invalid_syntax(
                        tag.span().start,
                        format!("expected `=` after attribute `{}`", name),
                    ));
                }
                if next_part(tag, start)? != TagPart::Quoted {
                    return Err(DecodeError::invalid_syntax(
                        tag.span().start,
                        format!("expected quoted value for attribute `{}`", name),
                    ));
                }

                let quoted = tag.slice();
                attributes.push(RawAttribute {
                    name,
                    raw: &quoted[1..quoted.len() - 1],
                    pos: tag.span().start + 1,
                });
            }
            other => {
                return Err(DecodeError::invalid_syntax(
                    tag.span().start,
                    format!("unexpected {:?} inside tag", other),
                ))
            }
        }
    }
}

fn next_part(tag: &mut Lexer<'_, TagPart>, start: usize) -> DecodeResult<TagPart> {
    match tag.next() {
        Some(Ok(part)) => Ok(part),
        Some(Err(_)) => Err(DecodeError::invalid_syntax(
            tag.span().start,
            "invalid character inside tag",
        )),
        None => Err(DecodeError::invalid_syntax(start, "unterminated tag")),
    }
}
