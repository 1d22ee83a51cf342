use thiserror::Error;

use crate::header::Section;

/// Fatal conditions for a single listing conversion.
///
/// Unknown mnemonics and unbalanced control flow (outside strict mode) are not errors; they are
/// reported through `tracing` and the conversion carries on.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecompileError {
    #[error(
        "malformed {section} declaration on line {line}: expected {expected} fields, found {found}: `{text}`"
    )]
    MalformedDeclaration {
        line: usize,
        section: Section,
        expected: usize,
        found: usize,
        text: String,
    },

    #[error("`{mnemonic}` on line {line} is missing operands (expects {expected})")]
    MissingOperand {
        line: usize,
        mnemonic: String,
        expected: usize,
    },

    #[error("no shader profile token (vs_*, ps_*, gs_*, ds_*, hs_*, cs_*) found in listing")]
    MissingShaderProfile,

    #[error("control flow is unbalanced at end of shader (depth {depth})")]
    UnbalancedControlFlow { depth: i32 },
}

pub type Result<T> = std::result::Result<T, DecompileError>;
