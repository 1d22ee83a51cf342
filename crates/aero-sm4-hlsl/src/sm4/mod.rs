//! Instruction stream decoding for SM4/SM5 assembly listings.
//!
//! - [`opcode`] classifies mnemonic tokens.
//! - [`decode`] walks the token stream and turns each instruction into indented HLSL
//!   statements.

pub mod decode;
pub mod opcode;

pub use decode::{decode_program, DecodedProgram};
pub use opcode::{classify, Mnemonic, NumericKind, Opcode};

/// Pipeline stage named by the profile token (`vs_5_0`, `ps_4_1`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Pixel,
    Geometry,
    Domain,
    Hull,
    Compute,
}

impl ShaderStage {
    /// Recognizes a profile token by its two-letter prefix.
    pub fn from_profile(token: &str) -> Option<Self> {
        let stage = match token.get(..3)? {
            "vs_" => Self::Vertex,
            "ps_" => Self::Pixel,
            "gs_" => Self::Geometry,
            "ds_" => Self::Domain,
            "hs_" => Self::Hull,
            "cs_" => Self::Compute,
            _ => return None,
        };
        // `hs_decls` and friends share the prefix; a profile always continues with a digit.
        token[3..]
            .starts_with(|c: char| c.is_ascii_digit())
            .then_some(stage)
    }

    /// Prefix of the generated `XXInput`/`XXOutput` structs.
    pub fn tag(self) -> &'static str {
        match self {
            Self::Vertex => "VS",
            Self::Pixel => "PS",
            Self::Geometry => "GS",
            Self::Domain => "DS",
            Self::Hull => "HS",
            Self::Compute => "CS",
        }
    }

    /// Suffix appended to the output file stem.
    pub fn file_suffix(self) -> &'static str {
        match self {
            Self::Vertex => "_vs",
            Self::Pixel => "_ps",
            Self::Geometry => "_gs",
            Self::Domain => "_ds",
            Self::Hull => "_hs",
            Self::Compute => "_cs",
        }
    }
}

impl std::fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Vertex => "vertex",
            Self::Pixel => "pixel",
            Self::Geometry => "geometry",
            Self::Domain => "domain",
            Self::Hull => "hull",
            Self::Compute => "compute",
        };
        f.write_str(name)
    }
}
