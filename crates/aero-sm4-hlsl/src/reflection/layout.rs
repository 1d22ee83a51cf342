//! Static tables: HLSL numeric type shapes and resource dimension tags.

use bitflags::bitflags;

/// Shape of a numeric HLSL type as laid out in a constant buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeShape {
    /// Total scalar count (`R * C` for matrices).
    pub elements: u32,
    /// Number of 16-byte registers one value occupies.
    pub slots: u32,
}

impl TypeShape {
    pub const SCALAR: Self = Self {
        elements: 1,
        slots: 1,
    };

    /// `float`, `uint3`, `float4x4`, `int2x3`, ... Unknown names (structures) count as one
    /// scalar in one register.
    pub fn parse(type_name: &str, row_major: bool) -> Self {
        let Some((_, dims)) = split_scalar_type(type_name) else {
            return Self::SCALAR;
        };
        if dims.is_empty() {
            return Self::SCALAR;
        }
        match dims.split_once('x') {
            Some((r, c)) => match (parse_dim(r), parse_dim(c)) {
                (Some(rows), Some(cols)) => Self {
                    elements: rows * cols,
                    slots: if row_major { rows } else { cols },
                },
                _ => Self::SCALAR,
            },
            None => match parse_dim(dims) {
                Some(n) => Self {
                    elements: n,
                    slots: 1,
                },
                None => Self::SCALAR,
            },
        }
    }

    /// Components held in each register.
    pub fn per_slot(&self) -> u32 {
        (self.elements / self.slots.max(1)).max(1)
    }
}

fn parse_dim(s: &str) -> Option<u32> {
    s.parse::<u32>().ok().filter(|n| (1..=4).contains(n))
}

const SCALARS: [&str; 10] = [
    "min16float", "min10float", "min16uint", "min16int", "float", "double", "half", "uint",
    "int", "bool",
];

/// `"float4x4"` → `("float", "4x4")`.
pub fn split_scalar_type(type_name: &str) -> Option<(&str, &str)> {
    let scalar = SCALARS.iter().find(|s| type_name.starts_with(**s))?;
    let (head, dims) = type_name.split_at(scalar.len());
    dims.chars()
        .all(|c| c.is_ascii_digit() || c == 'x')
        .then_some((head, dims))
}

/// `SV_Position` → `Position`, `TEXCOORD` → `Texcoord`.
pub fn var_name_for(semantic: &str) -> String {
    let stem = match semantic.find("SV_") {
        Some(at) => &semantic[at + 3..],
        None => semantic,
    };
    let mut out = String::with_capacity(stem.len());
    for (i, c) in stem.chars().enumerate() {
        if i == 0 {
            out.extend(c.to_uppercase());
        } else {
            out.extend(c.to_lowercase());
        }
    }
    out
}

/// Dimension column of the resource bindings table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceDimension {
    Texture1D,
    Texture1DArray,
    Texture2D,
    Texture2DArray,
    Texture2DMS,
    Texture2DMSArray,
    Texture3D,
    TextureCube,
    TextureCubeArray,
    Buffer,
    /// `r/o`: structured or raw read-only buffer.
    ReadOnly,
    /// `r/w`: structured or raw read-write buffer.
    ReadWrite,
    Append,
    Consume,
}

impl ResourceDimension {
    pub fn from_tag(tag: &str) -> Option<Self> {
        let dim = match tag.to_ascii_lowercase().as_str() {
            "1d" => Self::Texture1D,
            "1darray" => Self::Texture1DArray,
            "2d" => Self::Texture2D,
            "2darray" => Self::Texture2DArray,
            "2dms" => Self::Texture2DMS,
            "2dmsarray" => Self::Texture2DMSArray,
            "3d" => Self::Texture3D,
            "cube" => Self::TextureCube,
            "cubearray" => Self::TextureCubeArray,
            "buf" => Self::Buffer,
            "r/o" => Self::ReadOnly,
            "r/w" => Self::ReadWrite,
            "append" => Self::Append,
            "consume" => Self::Consume,
            _ => return None,
        };
        Some(dim)
    }

    /// Name of the read-only HLSL object type.
    pub fn texture_type(self) -> &'static str {
        match self {
            Self::Texture1D => "Texture1D",
            Self::Texture1DArray => "Texture1DArray",
            Self::Texture2D => "Texture2D",
            Self::Texture2DArray => "Texture2DArray",
            Self::Texture2DMS => "Texture2DMS",
            Self::Texture2DMSArray => "Texture2DMSArray",
            Self::Texture3D => "Texture3D",
            Self::TextureCube => "TextureCube",
            Self::TextureCubeArray => "TextureCubeArray",
            Self::Buffer => "Buffer",
            Self::ReadOnly | Self::ReadWrite | Self::Append | Self::Consume => "StructuredBuffer",
        }
    }

    /// Number of addressing coordinates (array layers included).
    pub fn coord_count(self) -> usize {
        match self {
            Self::Texture1D | Self::Buffer => 1,
            Self::Texture1DArray | Self::Texture2D | Self::Texture2DMS => 2,
            Self::Texture2DArray | Self::Texture2DMSArray | Self::Texture3D | Self::TextureCube => 3,
            Self::TextureCubeArray => 4,
            Self::ReadOnly | Self::ReadWrite | Self::Append | Self::Consume => 1,
        }
    }

    /// Number of components of an immediate texel offset.
    pub fn offset_count(self) -> usize {
        match self {
            Self::Texture1D | Self::Texture1DArray => 1,
            Self::Texture3D => 3,
            _ => 2,
        }
    }

    pub fn is_multisampled(self) -> bool {
        matches!(self, Self::Texture2DMS | Self::Texture2DMSArray)
    }

    pub fn helper_kind(self) -> Option<TextureKinds> {
        let kind = match self {
            Self::Texture1D => TextureKinds::TEXTURE_1D,
            Self::Texture1DArray => TextureKinds::TEXTURE_1D_ARRAY,
            Self::Texture2D => TextureKinds::TEXTURE_2D,
            Self::Texture2DArray => TextureKinds::TEXTURE_2D_ARRAY,
            Self::Texture3D => TextureKinds::TEXTURE_3D,
            Self::TextureCube => TextureKinds::TEXTURE_CUBE,
            Self::TextureCubeArray => TextureKinds::TEXTURE_CUBE_ARRAY,
            _ => return None,
        };
        Some(kind)
    }
}

bitflags! {
    /// Texture kinds queried through `resinfo`; each needs its own `GetResourceInfo` overload.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct TextureKinds: u8 {
        const TEXTURE_1D = 1 << 0;
        const TEXTURE_1D_ARRAY = 1 << 1;
        const TEXTURE_2D = 1 << 2;
        const TEXTURE_2D_ARRAY = 1 << 3;
        const TEXTURE_3D = 1 << 4;
        const TEXTURE_CUBE = 1 << 5;
        const TEXTURE_CUBE_ARRAY = 1 << 6;
    }
}

/// Maps the bindings table format column onto an HLSL element type.
pub fn element_format(format: &str) -> String {
    if let Some(rest) = format.strip_prefix("sint") {
        return format!("int{rest}");
    }
    if let Some(rest) = format.strip_prefix("unorm") {
        return format!("unorm float{rest}");
    }
    if let Some(rest) = format.strip_prefix("snorm") {
        return format!("snorm float{rest}");
    }
    match format {
        "mixed" | "" => "float4".to_owned(),
        other => other.to_owned(),
    }
}
