//! BibTeX reader built on `nom`.
//!
//! Handles `{...}` and `(...)` delimited blocks, `@string` macros,
//! `@preamble` and `@comment` blocks, braced and quoted values with nested braces, `#` concatenation and `%` line comments.
//! Unparseable blocks are reported with their line number and skipped so the
//! caller sees every problem in one pass.

use nom::{
    IResult,
    branch::alt,
    bytes::complete::take_while1,
    character::complete::{char, multispace0},
    combinator::map,
};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BibEntry {
    pub entry_type: String,
    pub cite_key: String,
    pub fields: Vec<(String, String)>,
    pub line: usize,
}

impl BibEntry {
    /// Case-insensitive field lookup.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BibParseError {
    pub line: usize,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct ParsedBibliography {
    pub entries: Vec<BibEntry>,
    pub errors: Vec<BibParseError>,
}

enum Block {
    Entry(BibEntry),
    StringMacro(String, String),
    Ignored,
}

fn line_of(input: &str, rest: &str) -> usize {
    let offset = input.len() - rest.len();
    input[..offset].matches('\n').count() + 1
}

fn skip_trivia(input: &str) -> &str {
    let mut rest = input;
    loop {
        rest = rest.trim_start();
        if rest.starts_with('%') {
            let end = rest.find('\n').unwrap_or(rest.len());
            rest = &rest[end..];
        } else {
            return rest;
        }
    }
}

pub fn parse_bibliography(input: &str) -> ParsedBibliography {
    let mut out = ParsedBibliography::default();
    let mut strings: HashMap<String, String> = HashMap::new();
    let mut remaining = input;

    loop {
        remaining = skip_trivia(remaining);
        if remaining.is_empty() {
            break;
        }
        if !remaining.starts_with('@') {
            // Free text between entries is a comment in BibTeX.
            match remaining.find('@') {
                Some(pos) => {
                    remaining = &remaining[pos..];
                    continue;
                }
                None => break,
            }
        }

        let line = line_of(input, remaining);
        match parse_block(remaining, &strings) {
            Ok((rest, Block::Entry(mut entry))) => {
                entry.line = line;
                out.entries.push(entry);
                remaining = rest;
            }
            Ok((rest, Block::StringMacro(key, value))) => {
                strings.insert(key.to_lowercase(), value);
                remaining = rest;
            }
            Ok((rest, Block::Ignored)) => remaining = rest,
            Err(_) => {
                out.errors.push(BibParseError {
                    line,
                    message: "failed to parse entry".to_string(),
                });
                match remaining[1..].find('@') {
                    Some(pos) => remaining = &remaining[pos + 1..],
                    None => break,
                }
            }
        }
    }

    out
}

fn parse_block<'a>(input: &'a str, strings: &HashMap<String, String>) -> IResult<&'a str, Block> {
    let (rest, _) = char('@')(input)?;
    let (rest, _) = multispace0(rest)?;
    let (rest, kind) = take_while1(|c: char| c.is_ascii_alphanumeric())(rest)?;
    let (rest, _) = multispace0(rest)?;

    match kind.to_ascii_lowercase().as_str() {
        "comment" => {
            if rest.starts_with('{') {
                let (rest, _) = braced_raw(rest)?;
                Ok((rest, Block::Ignored))
            } else {
                let end = rest.find('\n').unwrap_or(rest.len());
                Ok((&rest[end..], Block::Ignored))
            }
        }
        "preamble" => {
            let (rest, close) = open_delimiter(rest)?;
            let (rest, _) = field_value(rest, strings)?;
            let (rest, _) = multispace0(rest)?;
            let (rest, _) = char(close)(rest)?;
            Ok((rest, Block::Ignored))
        }
        "string" => {
            let (rest, close) = open_delimiter(rest)?;
            let (rest, (key, value)) = field(rest, strings)?;
            let (rest, _) = multispace0(rest)?;
            let (rest, _) = char(close)(rest)?;
            Ok((rest, Block::StringMacro(key, value)))
        }
        _ => {
            let (rest, entry) = entry_body(rest, kind, strings)?;
            Ok((rest, Block::Entry(entry)))
        }
    }
}

/// Blocks are delimited by `{...}` or `(...)`. Returns the closing character.
fn open_delimiter(input: &str) -> IResult<&str, char> {
    map(alt((char('{'), char('('))), |open| match open {
        '(' => ')',
        _ => '}',
    })(input)
}

fn entry_body<'a>(
    input: &'a str,
    kind: &str,
    strings: &HashMap<String, String>,
) -> IResult<&'a str, BibEntry> {
    let (rest, close) = open_delimiter(input)?;
    let (rest, _) = multispace0(rest)?;
    let (rest, cite_key) =
        take_while1(|c: char| c.is_alphanumeric() || "_-:./+".contains(c))(rest)?;
    let (rest, _) = multispace0(rest)?;
    let (mut rest, _) = char(',')(rest)?;

    let mut fields = Vec::new();
    loop {
        let (next, _) = multispace0(rest)?;
        if next.starts_with(close) {
            rest = next;
            break;
        }
        let (next, (key, value)) = field(next, strings)?;
        fields.push((key.to_lowercase(), value));
        let (next, _) = multispace0(next)?;
        rest = next.strip_prefix(',').unwrap_or(next);
    }
    let (rest, _) = char(close)(rest)?;

    Ok((
        rest,
        BibEntry {
            entry_type: kind.to_ascii_lowercase(),
            cite_key: cite_key.to_string(),
            fields,
            line: 0,
        },
    ))
}

fn field<'a>(
    input: &'a str,
    strings: &HashMap<String, String>,
) -> IResult<&'a str, (String, String)> {
    let (rest, _) = multispace0(input)?;
    let (rest, key) = take_while1(|c: char| c.is_ascii_alphanumeric() || "_-:".contains(c))(rest)?;
    let (rest, _) = multispace0(rest)?;
    let (rest, _) = char('=')(rest)?;
    let (rest, value) = field_value(rest, strings)?;
    Ok((rest, (key.to_string(), value)))
}

fn field_value<'a>(input: &'a str, strings: &HashMap<String, String>) -> IResult<&'a str, String> {
    let mut value = String::new();
    let mut remaining = input;

    loop {
        let (rest, _) = multispace0(remaining)?;
        let (rest, part) = alt((
            braced_value,
            quoted_value,
            map(take_while1(|c: char| c.is_ascii_digit()), str::to_string),
            map(
                take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_' || c == '-'),
                |name: &str| {
                    strings
                        .get(&name.to_lowercase())
                        .cloned()
                        .unwrap_or_else(|| name.to_string())
                },
            ),
        ))(rest)?;
        value.push_str(&part);

        let (rest, _) = multispace0(rest)?;
        match rest.strip_prefix('#') {
            Some(next) => remaining = next,
            None => return Ok((rest, value)),
        }
    }
}

fn parse_failure(input: &str) -> nom::Err<nom::error::Error<&str>> {
    nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Char))
}

/// `{...}` including the outer braces, honouring nesting and `\` escapes.
fn braced_raw(input: &str) -> IResult<&str, &str> {
    if !input.starts_with('{') {
        return Err(parse_failure(input));
    }
    let bytes = input.as_bytes();
    let mut depth = 0usize;
    let mut pos = 0usize;
    while pos < bytes.len() {
        match bytes[pos] {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Ok((&input[pos + 1..], &input[..pos + 1]));
                }
            }
            b'\\' => pos += 1,
            _ => {}
        }
        pos += 1;
    }
    Err(parse_failure(input))
}

fn braced_value(input: &str) -> IResult<&str, String> {
    let (rest, raw) = braced_raw(input)?;
    Ok((rest, raw[1..raw.len() - 1].to_string()))
}

fn quoted_value(input: &str) -> IResult<&str, String> {
    let Some(body) = input.strip_prefix('"') else {
        return Err(parse_failure(input));
    };
    let mut depth = 0usize;
    let mut escaped = false;
    for (idx, ch) in body.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' => escaped = true,
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            '"' if depth == 0 => return Ok((&body[idx + 1..], body[..idx].to_string())),
            _ => {}
        }
    }
    Err(parse_failure(input))
}
