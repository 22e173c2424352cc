//! Parse data block definition text into the AST using PEST.
//!
//! Parsing is purely syntactic: type names stay unresolved strings in the
//! tree (see [`crate::resolve`] for substitution), attribute blocks are
//! discarded, and the BEGIN section is collected verbatim.

use crate::ast::*;
use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser as PestParser;

#[derive(PestParser)]
#[grammar = "grammar.pest"]
struct DbParser;

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// Grammar violation: missing terminator, stray token, bad bound.
    #[error("malformed definition at line {line}: {message}")]
    MalformedDefinition { line: usize, message: String },
    /// A bare type keyword outside the fixed S7 enumeration.
    #[error("unsupported type '{keyword}' at line {line}")]
    UnsupportedType { keyword: String, line: usize },
}

fn malformed(line: usize, message: impl Into<String>) -> ParseError {
    ParseError::MalformedDefinition {
        line,
        message: message.into(),
    }
}

fn line_of(pair: &Pair<Rule>) -> usize {
    pair.as_span().start_pos().line_col().0
}

/// Parse definition source into a [`Program`].
pub fn parse(source: &str) -> Result<Program, ParseError> {
    // TIA exports are commonly UTF-8 with a BOM.
    let source = source.strip_prefix('\u{feff}').unwrap_or(source);
    let mut pairs = DbParser::parse(Rule::program, source).map_err(|e| {
        let line = match e.line_col {
            pest::error::LineColLocation::Pos((l, _)) => l,
            pest::error::LineColLocation::Span((l, _), _) => l,
        };
        malformed(line, e.variant.message().into_owned())
    })?;
    let program = pairs.next().ok_or_else(|| malformed(1, "empty parse"))?;
    build_program(program)
}

fn build_program(pair: Pair<Rule>) -> Result<Program, ParseError> {
    let mut types = Vec::new();
    let mut block = None;
    let mut defaults = Vec::new();

    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::type_def => types.push(build_type_def(inner)?),
            Rule::data_block => {
                let (decl, assigns) = build_data_block(inner)?;
                block = Some(decl);
                defaults = assigns;
            }
            _ => {}
        }
    }

    let block = block.ok_or_else(|| malformed(1, "missing DATA_BLOCK"))?;
    Ok(Program {
        types,
        block,
        defaults,
    })
}

fn build_type_def(pair: Pair<Rule>) -> Result<TypeDef, ParseError> {
    let line = line_of(&pair);
    let mut name = String::new();
    let mut version = 0.0;
    let mut body = None;
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::ident => name = ident_text(inner),
            Rule::real => version = inner.as_str().parse().unwrap_or(0.0),
            Rule::struct_def => body = Some(build_struct_members(inner)?),
            _ => {}
        }
    }
    Ok(TypeDef {
        name,
        version,
        body: body.ok_or_else(|| malformed(line, "TYPE without struct body"))?,
    })
}

fn build_data_block(
    pair: Pair<Rule>,
) -> Result<(DataBlockDecl, Vec<DefaultAssignment>), ParseError> {
    let line = line_of(&pair);
    let mut name = String::new();
    let mut version = 0.0;
    let mut non_retain = false;
    let mut body = None;
    let mut defaults = Vec::new();

    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::ident => name = ident_text(inner),
            Rule::real => version = inner.as_str().parse().unwrap_or(0.0),
            Rule::non_retain => non_retain = true,
            Rule::block_body => body = Some(build_block_body(inner)?),
            Rule::begin_block => defaults = build_begin_block(inner),
            _ => {}
        }
    }

    let decl = DataBlockDecl {
        name,
        version,
        non_retain,
        body: body.ok_or_else(|| malformed(line, "DATA_BLOCK without body"))?,
    };
    Ok((decl, defaults))
}

fn build_block_body(pair: Pair<Rule>) -> Result<TypeNode, ParseError> {
    let line = line_of(&pair);
    let inner = pair
        .into_inner()
        .next()
        .ok_or_else(|| malformed(line, "empty block body"))?;
    match inner.as_rule() {
        Rule::var_def => {
            let mut members = Vec::new();
            for el in inner.into_inner() {
                if el.as_rule() == Rule::struct_element {
                    members.push(build_element(el)?);
                }
            }
            Ok(TypeNode::Struct(members))
        }
        Rule::struct_def => Ok(TypeNode::Struct(build_struct_members(inner)?)),
        Rule::quoted_ident => Ok(TypeNode::TypeRef(quoted_text(inner))),
        r => Err(malformed(line, format!("unexpected block body: {:?}", r))),
    }
}

fn build_struct_members(pair: Pair<Rule>) -> Result<Vec<StructMember>, ParseError> {
    let mut members = Vec::new();
    for inner in pair.into_inner() {
        if inner.as_rule() == Rule::struct_element {
            members.push(build_element(inner)?);
        }
    }
    Ok(members)
}

fn build_element(pair: Pair<Rule>) -> Result<StructMember, ParseError> {
    let line = line_of(&pair);
    let mut name = String::new();
    let mut spec = None;
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::ident => {
                if name.is_empty() {
                    name = ident_text(inner);
                }
            }
            Rule::type_spec => spec = Some(build_type_spec(inner)?),
            _ => {}
        }
    }
    let (node, default) = spec.ok_or_else(|| malformed(line, "element without type"))?;
    Ok(StructMember {
        name,
        node,
        default,
    })
}

fn build_type_spec(pair: Pair<Rule>) -> Result<(TypeNode, Option<Literal>), ParseError> {
    let line = line_of(&pair);
    let inner = pair
        .into_inner()
        .next()
        .ok_or_else(|| malformed(line, "empty type spec"))?;
    match inner.as_rule() {
        Rule::struct_def => Ok((TypeNode::Struct(build_struct_members(inner)?), None)),
        Rule::array_spec => Ok((build_array(inner)?, None)),
        Rule::string_spec => {
            let mut node = None;
            let mut default = None;
            for part in inner.into_inner() {
                match part.as_rule() {
                    Rule::string_type => node = Some(build_string_type(part)?),
                    Rule::default_value => default = build_default(part),
                    _ => {}
                }
            }
            Ok((node.ok_or_else(|| malformed(line, "bad String spec"))?, default))
        }
        Rule::ref_spec => {
            let q = inner
                .into_inner()
                .next()
                .ok_or_else(|| malformed(line, "empty type reference"))?;
            Ok((TypeNode::TypeRef(quoted_text(q)), None))
        }
        Rule::prim_spec => {
            let mut node = None;
            let mut default = None;
            for part in inner.into_inner() {
                match part.as_rule() {
                    Rule::type_name => node = Some(build_type_name(part)?),
                    Rule::default_value => default = build_default(part),
                    _ => {}
                }
            }
            Ok((node.ok_or_else(|| malformed(line, "missing type name"))?, default))
        }
        r => Err(malformed(line, format!("unexpected type spec: {:?}", r))),
    }
}

fn build_type_name(pair: Pair<Rule>) -> Result<TypeNode, ParseError> {
    let keyword = pair.as_str();
    if keyword.eq_ignore_ascii_case("dtl") {
        return Ok(TypeNode::Dtl);
    }
    match S7Type::from_keyword(keyword) {
        Some(t) => Ok(TypeNode::Primitive(t)),
        None => Err(ParseError::UnsupportedType {
            keyword: keyword.to_string(),
            line: line_of(&pair),
        }),
    }
}

fn build_string_type(pair: Pair<Rule>) -> Result<TypeNode, ParseError> {
    let line = line_of(&pair);
    // String content area is limited to 254 bytes on the device.
    let mut max: u8 = 254;
    if let Some(n) = pair.into_inner().next() {
        max = n
            .as_str()
            .parse()
            .ok()
            .filter(|m| *m <= 254)
            .ok_or_else(|| malformed(line, "String length must be 0..=254"))?;
    }
    Ok(TypeNode::Primitive(S7Type::S7String(max)))
}

fn build_array(pair: Pair<Rule>) -> Result<TypeNode, ParseError> {
    let line = line_of(&pair);
    let mut bounds = Vec::new();
    let mut element = None;
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::array_bound => bounds.push(build_bound(inner)?),
            Rule::array_elem => element = Some(build_array_elem(inner)?),
            _ => {}
        }
    }
    if bounds.len() != 2 {
        return Err(malformed(line, "array needs lower and upper bound"));
    }
    Ok(TypeNode::Array {
        lower: bounds[0],
        upper: bounds[1],
        element: Box::new(element.ok_or_else(|| malformed(line, "array without element type"))?),
    })
}

fn build_bound(pair: Pair<Rule>) -> Result<i64, ParseError> {
    let line = line_of(&pair);
    let inner = pair
        .into_inner()
        .next()
        .ok_or_else(|| malformed(line, "empty array bound"))?;
    let text = match inner.as_rule() {
        Rule::int => inner.as_str().to_string(),
        Rule::quoted_ident => quoted_text(inner),
        _ => return Err(malformed(line, "bad array bound")),
    };
    // Quoted bounds must still be plain integers; symbolic constants are
    // not resolvable from a definition file alone.
    text.trim()
        .parse()
        .map_err(|_| malformed(line, format!("array bound '{}' is not an integer", text)))
}

fn build_array_elem(pair: Pair<Rule>) -> Result<TypeNode, ParseError> {
    let line = line_of(&pair);
    let inner = pair
        .into_inner()
        .next()
        .ok_or_else(|| malformed(line, "empty array element type"))?;
    match inner.as_rule() {
        Rule::struct_def => Ok(TypeNode::Struct(build_struct_members(inner)?)),
        Rule::string_type => build_string_type(inner),
        Rule::quoted_ident => Ok(TypeNode::TypeRef(quoted_text(inner))),
        Rule::type_name => build_type_name(inner),
        r => Err(malformed(line, format!("unexpected array element: {:?}", r))),
    }
}

fn build_begin_block(pair: Pair<Rule>) -> Vec<DefaultAssignment> {
    let mut out = Vec::new();
    for inner in pair.into_inner() {
        if inner.as_rule() != Rule::default_assign {
            continue;
        }
        let mut path = Vec::new();
        let mut value = None;
        for part in inner.into_inner() {
            match part.as_rule() {
                Rule::assign_path => {
                    for seg in part.into_inner() {
                        if seg.as_rule() == Rule::ident {
                            path.push(ident_text(seg));
                        }
                    }
                }
                Rule::literal => value = Some(build_literal(part)),
                _ => {}
            }
        }
        if let Some(value) = value {
            out.push(DefaultAssignment {
                path: path.join("."),
                value,
            });
        }
    }
    out
}

fn build_default(pair: Pair<Rule>) -> Option<Literal> {
    pair.into_inner()
        .find(|p| p.as_rule() == Rule::literal)
        .map(build_literal)
}

fn build_literal(pair: Pair<Rule>) -> Literal {
    let inner = match pair.into_inner().next() {
        Some(p) => p,
        None => return Literal::Int(0),
    };
    match inner.as_rule() {
        Rule::boolean => Literal::Bool(inner.as_str().eq_ignore_ascii_case("true")),
        Rule::duration => Literal::Duration(inner.as_str().to_string()),
        Rule::hex_lit => {
            let s = inner.as_str();
            let value = s.split_once('#').and_then(|(base, digits)| {
                let base: u32 = base.parse().ok()?;
                if !(2..=36).contains(&base) {
                    return None;
                }
                u64::from_str_radix(digits, base).ok()
            });
            Literal::Hex(value.unwrap_or(0))
        }
        Rule::real => Literal::Real(inner.as_str().parse().unwrap_or(0.0)),
        Rule::int => Literal::Int(inner.as_str().parse().unwrap_or(0)),
        Rule::quoted_ident => Literal::Str(quoted_text(inner)),
        _ => Literal::Int(0),
    }
}

fn ident_text(pair: Pair<Rule>) -> String {
    match pair.into_inner().next() {
        Some(inner) if inner.as_rule() == Rule::quoted_ident => quoted_text(inner),
        Some(inner) => inner.as_str().to_string(),
        None => String::new(),
    }
}

fn quoted_text(pair: Pair<Rule>) -> String {
    pair.into_inner()
        .next()
        .map(|p| p.as_str().to_string())
        .unwrap_or_default()
}
