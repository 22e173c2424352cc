//! Generate the physical memory layout from the resolved field sequence.
//!
//! Reproduces the controller's non-optimized placement: consecutively
//! declared booleans inside the same enclosing structure share one 16-bit
//! word (16 at most), everything else sits at its natural width. All
//! multi-byte scalars are big-endian on the wire.

use crate::ast::S7Type;
use crate::resolve::{PathSeg, QualifiedField};

/// One placement unit of the layout.
#[derive(Debug, Clone, PartialEq)]
pub enum PhysicalField {
    Scalar {
        name: String,
        ty: S7Type,
        offset: usize,
    },
    /// 1..=16 booleans sharing one 16-bit word; the bit position of each
    /// name is its index in `names`.
    BoolGroup { names: Vec<String>, offset: usize },
}

/// Ordered physical fields plus total byte size. Built once per block and
/// immutable afterwards.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Layout {
    pub fields: Vec<PhysicalField>,
    pub total_size: usize,
}

impl Layout {
    pub fn byte_size(&self) -> usize {
        self.total_size
    }

    /// All flattened field names in declaration order.
    pub fn field_names(&self) -> Vec<&str> {
        let mut out = Vec::new();
        for field in &self.fields {
            match field {
                PhysicalField::Scalar { name, .. } => out.push(name.as_str()),
                PhysicalField::BoolGroup { names, .. } => {
                    out.extend(names.iter().map(String::as_str))
                }
            }
        }
        out
    }
}

/// Lay out the fields starting at byte 0.
pub fn generate(fields: &[QualifiedField]) -> Layout {
    generate_skipping(fields, 0)
}

/// Like [`generate`], but drop the first `skip_levels` name levels when
/// rendering field names (the final segment is always kept). Useful when a
/// wrapper struct level should not show up in field names.
pub fn generate_skipping(fields: &[QualifiedField], skip_levels: usize) -> Layout {
    let mut out = Vec::new();
    let mut cursor = 0usize;
    let mut pending: Vec<String> = Vec::new();
    let mut pending_prefix: Vec<PathSeg> = Vec::new();

    for field in fields {
        let is_bool = field.ty == S7Type::Bool;
        if !pending.is_empty() && (!is_bool || field.prefix() != pending_prefix.as_slice()) {
            flush(&mut out, &mut pending, &mut cursor);
        }
        if is_bool {
            if pending.is_empty() {
                pending_prefix = field.prefix().to_vec();
            }
            pending.push(strip_levels(&field.name(), skip_levels));
            // A full word never absorbs more booleans, even on the same prefix.
            if pending.len() == 16 {
                flush(&mut out, &mut pending, &mut cursor);
            }
        } else {
            out.push(PhysicalField::Scalar {
                name: strip_levels(&field.name(), skip_levels),
                ty: field.ty,
                offset: cursor,
            });
            cursor += field.ty.width();
        }
    }
    flush(&mut out, &mut pending, &mut cursor);

    Layout {
        fields: out,
        total_size: cursor,
    }
}

fn flush(out: &mut Vec<PhysicalField>, pending: &mut Vec<String>, cursor: &mut usize) {
    if pending.is_empty() {
        return;
    }
    out.push(PhysicalField::BoolGroup {
        names: std::mem::take(pending),
        offset: *cursor,
    });
    *cursor += 2;
}

fn strip_levels(name: &str, n: usize) -> String {
    if n == 0 {
        return name.to_string();
    }
    let segs: Vec<&str> = name.split('.').collect();
    let keep = n.min(segs.len() - 1);
    segs[keep..].join(".")
}
