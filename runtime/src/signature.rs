//! Kernel parameter list parsing.
//!
//! The parameter list of the first `__kernel`/`kernel` entry point fixes the
//! binding order. Each parameter is classified by substring on its type part
//! (everything before the trailing identifier):
//!
//! | substring            | effect                          |
//! |----------------------|---------------------------------|
//! | `global` / `local`   | address space                   |
//! | `const`              | constant, read-only             |
//! | `float`, `int`, `long` | element type, first match wins |
//! | `*`                  | buffer instead of scalar        |

use smallvec::SmallVec;
use snafu::{OptionExt, ensure};
use tessera_dtype::{Access, AddrSpace, ArgKind, ElemType};

use crate::error::{Result, SignatureParseSnafu, UnsupportedTypeSnafu};

/// One positional kernel parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArgSlot {
    /// Position in the parameter list.
    pub position: usize,
    pub kind: ArgKind,
    pub elem: ElemType,
    pub addr: AddrSpace,
    /// Declared `const`. Informational apart from the derived access.
    pub constant: bool,
    pub access: Access,
    /// Index among the slots of the same kind and element type.
    pub family_index: usize,
}

impl ArgSlot {
    pub fn is_buffer(&self) -> bool {
        self.kind == ArgKind::Buffer
    }

    pub fn family(&self) -> (ArgKind, ElemType) {
        (self.kind, self.elem)
    }
}

/// Ordered parameter list of a kernel, parsed once at registration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Signature {
    slots: SmallVec<[ArgSlot; 8]>,
}

impl Signature {
    pub fn parse(source: &str) -> Result<Self> {
        let params = parameter_list(source)?;
        let mut slots = SmallVec::new();
        let mut counts = [[0usize; 3]; 2];

        if params.is_empty() || params == "void" {
            return Ok(Self { slots });
        }

        for (position, param) in params.split(',').enumerate() {
            let param = param.trim();
            ensure!(!param.is_empty(), SignatureParseSnafu { reason: format!("empty parameter at position {position}") });

            let ty = type_part(param);
            let elem = classify_elem(ty).context(UnsupportedTypeSnafu { tag: param })?;
            let kind = if param.contains('*') { ArgKind::Buffer } else { ArgKind::Scalar };
            let addr = if ty.contains("global") {
                AddrSpace::Global
            } else if ty.contains("local") {
                AddrSpace::Local
            } else {
                AddrSpace::Private
            };
            let constant = ty.contains("const");
            let access = if constant { Access::ReadOnly } else { Access::ReadWrite };

            let counter = &mut counts[kind as usize][elem.index()];
            let family_index = *counter;
            *counter += 1;

            slots.push(ArgSlot { position, kind, elem, addr, constant, access, family_index });
        }

        tracing::trace!(params = slots.len(), "parsed kernel signature");
        Ok(Self { slots })
    }

    pub fn slots(&self) -> &[ArgSlot] {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Distinct (kind, element) families in order of first appearance.
    pub fn families(&self) -> impl Iterator<Item = (ArgKind, ElemType)> + '_ {
        self.slots.iter().filter(|slot| slot.family_index == 0).map(ArgSlot::family)
    }

    /// Buffer slots in declaration order.
    pub fn buffers(&self) -> impl Iterator<Item = &ArgSlot> {
        self.slots.iter().filter(|slot| slot.is_buffer())
    }
}

/// Text between the entry point's parentheses.
fn parameter_list(source: &str) -> Result<&str> {
    let start = source
        .find("__kernel")
        .or_else(|| find_keyword(source, "kernel"))
        .context(SignatureParseSnafu { reason: "no kernel qualifier" })?;
    let rest = &source[start..];
    let open = rest.find('(').context(SignatureParseSnafu { reason: "no parameter list" })?;

    let mut depth = 0usize;
    for (offset, c) in rest[open..].char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(rest[open + 1..open + offset].trim());
                }
            }
            _ => {}
        }
    }
    SignatureParseSnafu { reason: "unterminated parameter list" }.fail()
}

/// `kernel` as a whole word, so identifiers like `my_kernel` don't match.
fn find_keyword(source: &str, word: &str) -> Option<usize> {
    let is_ident = |c: char| c.is_alphanumeric() || c == '_';
    source.match_indices(word).map(|(i, _)| i).find(|&i| {
        let before = source[..i].chars().next_back().is_none_or(|c| !is_ident(c));
        let after = source[i + word.len()..].chars().next().is_none_or(|c| !is_ident(c));
        before && after
    })
}

/// Strip the trailing parameter name; a lone token is all type.
fn type_part(param: &str) -> &str {
    let ty = param.trim_end_matches(|c: char| c.is_alphanumeric() || c == '_');
    if ty.trim().is_empty() { param } else { ty }
}

fn classify_elem(ty: &str) -> Option<ElemType> {
    if ty.contains("float") {
        Some(ElemType::Float)
    } else if ty.contains("int") {
        Some(ElemType::Int)
    } else if ty.contains("long") {
        Some(ElemType::Long)
    } else {
        None
    }
}
