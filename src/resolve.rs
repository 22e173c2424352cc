//! Flatten the parsed tree into an ordered sequence of primitive fields.
//!
//! Custom type references are substituted recursively, arrays expand into
//! one entry per index, and the DTL built-in expands to its eight fixed
//! sub-fields. Output order is source declaration order; the layout pass
//! depends on it.

use crate::ast::{Program, S7Type, StructMember, TypeNode};
use std::collections::HashMap;

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("unresolved type reference '{0}'")]
    UnresolvedTypeReference(String),
    #[error("TYPE '{0}' references itself, directly or indirectly")]
    CyclicTypeReference(String),
    #[error("duplicate TYPE name: {0}")]
    DuplicateType(String),
    #[error("array bounds {lower}..{upper} are inverted")]
    BadArrayBounds { lower: i64, upper: i64 },
}

/// One step of a field path: a struct member name or an array index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSeg {
    Name(String),
    Index(i64),
}

/// A resolved leaf: full path plus primitive type.
#[derive(Debug, Clone, PartialEq)]
pub struct QualifiedField {
    pub path: Vec<PathSeg>,
    pub ty: S7Type,
}

impl QualifiedField {
    /// Dot-joined path, array indices fused onto the preceding segment
    /// (`Line[1].Sensor`).
    pub fn name(&self) -> String {
        path_name(&self.path)
    }

    /// Path without the final segment. Booleans only share a packed word
    /// while their prefix stays the same.
    pub fn prefix(&self) -> &[PathSeg] {
        &self.path[..self.path.len().saturating_sub(1)]
    }
}

/// Render a path to its flattened field name.
pub fn path_name(path: &[PathSeg]) -> String {
    let mut out = String::new();
    for seg in path {
        match seg {
            PathSeg::Name(n) => {
                if !out.is_empty() {
                    out.push('.');
                }
                out.push_str(n);
            }
            PathSeg::Index(i) => {
                out.push('[');
                out.push_str(&i.to_string());
                out.push(']');
            }
        }
    }
    out
}

// Siemens DTL: eight fixed sub-fields, 12 bytes in total.
const DTL_FIELDS: [(&str, S7Type); 8] = [
    ("YEAR", S7Type::Word),
    ("MONTH", S7Type::Byte),
    ("DAY", S7Type::Byte),
    ("WEEKDAY", S7Type::Byte),
    ("HOUR", S7Type::Byte),
    ("MINUTE", S7Type::Byte),
    ("SECOND", S7Type::Byte),
    ("NANOSECOND", S7Type::DWord),
];

/// Flatten a program's data block into `(path, type)` pairs in declaration
/// order.
pub fn flatten(program: &Program) -> Result<Vec<QualifiedField>, ResolveError> {
    let mut types: HashMap<&str, &[StructMember]> = HashMap::new();
    for t in &program.types {
        if types.insert(t.name.as_str(), t.body.as_slice()).is_some() {
            return Err(ResolveError::DuplicateType(t.name.clone()));
        }
    }

    let mut out = Vec::new();
    let mut path = Vec::new();
    let mut resolving = Vec::new();
    walk(
        &types,
        &program.block.body,
        &mut path,
        &mut resolving,
        &mut out,
    )?;
    Ok(out)
}

fn walk(
    types: &HashMap<&str, &[StructMember]>,
    node: &TypeNode,
    path: &mut Vec<PathSeg>,
    resolving: &mut Vec<String>,
    out: &mut Vec<QualifiedField>,
) -> Result<(), ResolveError> {
    match node {
        TypeNode::Primitive(ty) => out.push(QualifiedField {
            path: path.clone(),
            ty: *ty,
        }),
        TypeNode::Dtl => {
            for (name, ty) in DTL_FIELDS {
                path.push(PathSeg::Name(name.to_string()));
                out.push(QualifiedField {
                    path: path.clone(),
                    ty,
                });
                path.pop();
            }
        }
        TypeNode::Struct(members) => {
            walk_members(types, members, path, resolving, out)?;
        }
        TypeNode::TypeRef(name) => {
            if let Some(body) = types.get(name.as_str()) {
                if resolving.iter().any(|n| n == name) {
                    return Err(ResolveError::CyclicTypeReference(name.clone()));
                }
                resolving.push(name.clone());
                walk_members(types, body, path, resolving, out)?;
                resolving.pop();
            } else if name.eq_ignore_ascii_case("dtl") {
                walk(types, &TypeNode::Dtl, path, resolving, out)?;
            } else if let Some(ty) = S7Type::from_keyword(name) {
                // Quoted references may also name a plain primitive.
                out.push(QualifiedField {
                    path: path.clone(),
                    ty,
                });
            } else {
                return Err(ResolveError::UnresolvedTypeReference(name.clone()));
            }
        }
        TypeNode::Array {
            lower,
            upper,
            element,
        } => {
            if lower > upper {
                return Err(ResolveError::BadArrayBounds {
                    lower: *lower,
                    upper: *upper,
                });
            }
            for i in *lower..=*upper {
                path.push(PathSeg::Index(i));
                walk(types, element, path, resolving, out)?;
                path.pop();
            }
        }
    }
    Ok(())
}

fn walk_members(
    types: &HashMap<&str, &[StructMember]>,
    members: &[StructMember],
    path: &mut Vec<PathSeg>,
    resolving: &mut Vec<String>,
    out: &mut Vec<QualifiedField>,
) -> Result<(), ResolveError> {
    for m in members {
        path.push(PathSeg::Name(m.name.clone()));
        walk(types, &m.node, path, resolving, out)?;
        path.pop();
    }
    Ok(())
}
