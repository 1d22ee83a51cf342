//! HLSL translation-unit emitter.
//!
//! Declarations come from the resolved reflection tables, the entry-point body from the decoder.
//! The output order is fixed: input/output structs, structures, constant buffers, textures,
//! UAVs, samplers, `GetResourceInfo` helpers, entry point.

use crate::reflection::{Declarations, TextureKinds};
use crate::sm4::{DecodedProgram, ShaderStage};

struct HlslWriter {
    out: String,
    indent: usize,
}

impl HlslWriter {
    fn new() -> Self {
        Self {
            out: String::new(),
            indent: 0,
        }
    }

    fn indent(&mut self) {
        self.indent += 4;
    }

    fn dedent(&mut self) {
        self.indent = self.indent.saturating_sub(4);
    }

    fn line(&mut self, s: &str) {
        if s.is_empty() {
            self.out.push('\n');
            return;
        }
        for _ in 0..self.indent {
            self.out.push(' ');
        }
        self.out.push_str(s);
        self.out.push('\n');
    }

    fn blank(&mut self) {
        self.out.push('\n');
    }

    /// Writes a possibly multi-line declaration at the current indent.
    fn text(&mut self, s: &str) {
        for line in s.split('\n') {
            self.line(line);
        }
    }

    fn finish(self) -> String {
        self.out
    }
}

/// `GetResourceInfo` overload for one texture kind: `float4(width, height|elements,
/// depth|elements, mip levels)`.
struct ResourceInfoHelper {
    kind: TextureKinds,
    texture: &'static str,
    dims: &'static [&'static str],
    result: [&'static str; 3],
}

const RESOURCE_INFO_HELPERS: [ResourceInfoHelper; 7] = [
    ResourceInfoHelper {
        kind: TextureKinds::TEXTURE_1D,
        texture: "Texture1D",
        dims: &["width"],
        result: ["width", "0", "0"],
    },
    ResourceInfoHelper {
        kind: TextureKinds::TEXTURE_1D_ARRAY,
        texture: "Texture1DArray",
        dims: &["width", "elements"],
        result: ["width", "elements", "0"],
    },
    ResourceInfoHelper {
        kind: TextureKinds::TEXTURE_2D,
        texture: "Texture2D",
        dims: &["width", "height"],
        result: ["width", "height", "0"],
    },
    ResourceInfoHelper {
        kind: TextureKinds::TEXTURE_2D_ARRAY,
        texture: "Texture2DArray",
        dims: &["width", "height", "elements"],
        result: ["width", "height", "elements"],
    },
    ResourceInfoHelper {
        kind: TextureKinds::TEXTURE_3D,
        texture: "Texture3D",
        dims: &["width", "height", "depth"],
        result: ["width", "height", "depth"],
    },
    ResourceInfoHelper {
        kind: TextureKinds::TEXTURE_CUBE,
        texture: "TextureCube",
        dims: &["width", "height"],
        result: ["width", "height", "0"],
    },
    ResourceInfoHelper {
        kind: TextureKinds::TEXTURE_CUBE_ARRAY,
        texture: "TextureCubeArray",
        dims: &["width", "height", "elements"],
        result: ["width", "height", "elements"],
    },
];

fn emit_resource_info_helpers(w: &mut HlslWriter, helpers: TextureKinds) {
    for helper in RESOURCE_INFO_HELPERS
        .iter()
        .filter(|h| helpers.contains(h.kind))
    {
        let dims = helper.dims.join(", ");
        w.line(&format!(
            "float4 GetResourceInfo({} tex, uint mip)",
            helper.texture
        ));
        w.line("{");
        w.indent();
        w.line(&format!("uint {dims}, levels;"));
        w.line(&format!("tex.GetDimensions(mip, {dims}, levels);"));
        w.line(&format!("return float4({}, levels);", helper.result.join(", ")));
        w.dedent();
        w.line("}");
        w.blank();
    }
}

fn emit_struct(w: &mut HlslWriter, name: &str, fields: &[String]) {
    w.line(&format!("struct {name}"));
    w.line("{");
    w.indent();
    for field in fields {
        w.line(field);
    }
    w.dedent();
    w.line("};");
    w.blank();
}

fn emit_group(w: &mut HlslWriter, decls: &[String]) {
    if decls.is_empty() {
        return;
    }
    for decl in decls {
        w.text(decl);
        if decl.contains('\n') {
            w.blank();
        }
    }
    if !decls.last().is_some_and(|d| d.contains('\n')) {
        w.blank();
    }
}

/// Renders the whole translation unit.
pub fn emit(program: &DecodedProgram, decls: &Declarations, entry_point: &str) -> String {
    let tag = program.stage.tag();
    let compute = program.stage == ShaderStage::Compute;
    let has_input = !decls.input_fields.is_empty();
    let has_output = !compute && !decls.output_fields.is_empty();

    let mut w = HlslWriter::new();
    w.line(&format!(
        "// Reconstructed from {} assembly by aero-sm4-hlsl.",
        program.profile
    ));
    w.blank();

    if has_input {
        emit_struct(&mut w, &format!("{tag}Input"), &decls.input_fields);
    }
    if has_output {
        emit_struct(&mut w, &format!("{tag}Output"), &decls.output_fields);
    }
    emit_group(&mut w, &decls.structures);
    emit_group(&mut w, &decls.constant_buffers);
    emit_group(&mut w, &decls.textures);
    emit_group(&mut w, &decls.uavs);
    emit_group(&mut w, &decls.samplers);
    emit_resource_info_helpers(&mut w, program.helpers);

    let mut params = Vec::new();
    if has_input {
        params.push(format!("{tag}Input input"));
    }
    params.extend(decls.input_params.iter().cloned());
    params.extend(program.builtin_params.iter().cloned());

    if compute {
        let [x, y, z] = program.thread_group.unwrap_or([1, 1, 1]);
        w.line(&format!("[numthreads({x}, {y}, {z})]"));
    }
    let ret = if has_output {
        format!("{tag}Output")
    } else {
        "void".to_owned()
    };
    w.line(&format!(
        "{ret} {entry_point}({})",
        params.join(",\n    ")
    ));
    w.line("{");
    w.indent();
    if has_output {
        w.line(&format!("{tag}Output output = ({tag}Output)0;"));
    }
    for stmt in &program.statements {
        w.line(stmt);
    }
    if has_output {
        w.line("return output;");
    }
    w.dedent();
    w.line("}");
    w.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn program(stage: ShaderStage, profile: &str, statements: &[&str]) -> DecodedProgram {
        DecodedProgram {
            stage,
            profile: profile.to_owned(),
            statements: statements.iter().map(|s| (*s).to_owned()).collect(),
            helpers: TextureKinds::empty(),
            thread_group: None,
            builtin_params: Vec::new(),
            final_depth: 0,
        }
    }

    #[test]
    fn vertex_shader_layout() {
        let decls = Declarations {
            input_fields: vec!["float4 Position : POSITION;".to_owned()],
            input_params: vec!["uint vertexId : SV_VertexID".to_owned()],
            output_fields: vec!["float4 Position : SV_Position;".to_owned()],
            constant_buffers: vec![
                "cbuffer Globals : register(b0)\n{\n    float4x4                 world;\n};"
                    .to_owned(),
            ],
            ..Declarations::default()
        };
        let out = emit(
            &program(
                ShaderStage::Vertex,
                "vs_4_0",
                &["float4 r0;", "", "output.Position = input.Position;"],
            ),
            &decls,
            "main",
        );
        let expected = "\
// Reconstructed from vs_4_0 assembly by aero-sm4-hlsl.

struct VSInput
{
    float4 Position : POSITION;
};

struct VSOutput
{
    float4 Position : SV_Position;
};

cbuffer Globals : register(b0)
{
    float4x4                 world;
};

VSOutput main(VSInput input,
    uint vertexId : SV_VertexID)
{
    VSOutput output = (VSOutput)0;
    float4 r0;

    output.Position = input.Position;
    return output;
}
";
        assert_eq!(out, expected);
    }

    #[test]
    fn compute_shader_layout() {
        let mut p = program(ShaderStage::Compute, "cs_5_0", &["GroupMemoryBarrier();"]);
        p.thread_group = Some([8, 8, 1]);
        p.builtin_params = vec!["uint3 dispatchId : SV_DispatchThreadID".to_owned()];
        p.helpers = TextureKinds::TEXTURE_2D;
        let decls = Declarations {
            textures: vec!["Texture2D src : register(t0);".to_owned()],
            uavs: vec!["RWTexture2D<float4> dst : register(u0);".to_owned()],
            ..Declarations::default()
        };
        let out = emit(&p, &decls, "CSMain");
        let expected = "\
// Reconstructed from cs_5_0 assembly by aero-sm4-hlsl.

Texture2D src : register(t0);

RWTexture2D<float4> dst : register(u0);

float4 GetResourceInfo(Texture2D tex, uint mip)
{
    uint width, height, levels;
    tex.GetDimensions(mip, width, height, levels);
    return float4(width, height, 0, levels);
}

[numthreads(8, 8, 1)]
void CSMain(uint3 dispatchId : SV_DispatchThreadID)
{
    GroupMemoryBarrier();
}
";
        assert_eq!(out, expected);
    }

    #[test]
    fn stages_without_outputs_return_void() {
        let out = emit(
            &program(
                ShaderStage::Pixel,
                "ps_4_0",
                &["if (r0.x != 0)", "{", "    return;", "}"],
            ),
            &Declarations::default(),
            "main",
        );
        assert!(out.contains("void main()\n{\n"));
        assert!(out.contains("        return;\n"));
        assert!(!out.contains("output"));
    }
}
