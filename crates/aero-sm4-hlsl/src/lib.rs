//! Reconstructs readable HLSL from Shader Model 4/5 assembly listings.
//!
//! The input is the text the HLSL compiler prints when disassembling SM4/SM5 bytecode: a header
//! of `//` comment lines describing constant buffers, resource bindings and signatures, followed
//! by the flat instruction stream. Conversion runs in three steps:
//!
//! - [`header`] + [`reflection`]: header declarations become named, typed symbols addressable by
//!   register (`v2`, `t0`, `cb0[3].yz`, ...)
//! - [`sm4`]: each instruction is classified and decoded into HLSL statements, with structured
//!   control flow rebuilt from the flat `if`/`loop`/`switch` markers
//! - [`hlsl`]: declarations and the entry point are rendered in a fixed order
//!
//! [`decompile`] runs the whole pipeline for one listing.

pub mod error;
pub mod expr;
pub mod header;
pub mod hlsl;
pub mod lexer;
pub mod reflection;
pub mod sm4;

use tracing::{debug, warn};

pub use error::{DecompileError, Result};
pub use reflection::Reflection;
pub use sm4::ShaderStage;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecompileOptions {
    /// Name of the generated entry-point function.
    pub entry_point: String,
    /// Reject listings whose control flow does not close back to depth 0 instead of emitting
    /// them as-is.
    pub strict_control_flow: bool,
}

impl Default for DecompileOptions {
    fn default() -> Self {
        Self {
            entry_point: "main".to_owned(),
            strict_control_flow: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decompiled {
    pub stage: ShaderStage,
    /// Profile token as written in the listing (`ps_5_0`).
    pub profile: String,
    pub hlsl: String,
    /// Block depth left open at the end of the instruction stream.
    pub final_depth: i32,
}

impl Decompiled {
    /// `<base>_ps.hlsl` style output file name.
    pub fn file_name(&self, base: &str) -> String {
        format!("{base}{}.hlsl", self.stage.file_suffix())
    }
}

/// Converts one assembly listing into an HLSL translation unit.
pub fn decompile(source: &str, options: &DecompileOptions) -> Result<Decompiled> {
    let mut reflection = Reflection::new();
    header::parse_header(source, &mut reflection)?;
    reflection.resolve();

    let program = sm4::decode_program(source, &reflection)?;
    if program.final_depth != 0 {
        if options.strict_control_flow {
            return Err(DecompileError::UnbalancedControlFlow {
                depth: program.final_depth,
            });
        }
        warn!(
            depth = program.final_depth,
            "emitting shader with unbalanced control flow"
        );
    }

    let hlsl = hlsl::emit(&program, reflection.declarations(), &options.entry_point);
    debug!(
        stage = %program.stage,
        statements = program.statements.len(),
        "decompiled listing"
    );
    Ok(Decompiled {
        stage: program.stage,
        profile: program.profile,
        hlsl,
        final_depth: program.final_depth,
    })
}
