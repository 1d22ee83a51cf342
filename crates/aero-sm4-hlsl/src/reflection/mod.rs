//! Reflection resolver.
//!
//! The header parser feeds raw declarations in through the `add_*` methods; [`Reflection::resolve`]
//! then derives every register key (`v2`, `o[0]`, `t3`, `cb0[12]`, `cb0[1].yz`, ...) the decoder
//! can meet, together with the HLSL declaration text for each symbol. After `resolve` the tables
//! are read-only.

mod cast;
pub mod layout;

use std::collections::BTreeMap;

use tracing::debug;

pub use cast::{is_literal, LiteralInfo};
pub use layout::{ResourceDimension, TextureKinds, TypeShape};

use crate::expr::{component_index, split_swizzle, Modifiers, COMPONENTS};
use layout::{element_format, split_scalar_type, var_name_for};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub semantic: String,
    pub semantic_index: u32,
    pub mask: String,
    /// Register number, or a named register such as `oDepth`.
    pub register: String,
    pub system_value: String,
    pub format: String,
    pub used: String,
    pub var_name: String,
}

impl Signature {
    pub fn new(
        semantic: &str,
        semantic_index: u32,
        mask: &str,
        register: &str,
        system_value: &str,
        format: &str,
        used: &str,
    ) -> Self {
        Self {
            semantic: semantic.to_owned(),
            semantic_index,
            mask: mask.to_owned(),
            register: register.to_owned(),
            system_value: system_value.to_owned(),
            format: format.to_owned(),
            used: used.to_owned(),
            var_name: var_name_for(semantic),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Texture,
    Sampler,
    SamplerComparison,
    Uav,
    ConstantBuffer,
    TextureBuffer,
    Other,
}

impl ResourceKind {
    pub fn from_tag(tag: &str) -> Self {
        match tag.to_ascii_lowercase().as_str() {
            "texture" => Self::Texture,
            "sampler" => Self::Sampler,
            "sampler_c" => Self::SamplerComparison,
            "uav" => Self::Uav,
            "cbuffer" => Self::ConstantBuffer,
            "tbuffer" => Self::TextureBuffer,
            _ => Self::Other,
        }
    }
}

/// One row of the resource bindings table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub name: String,
    pub kind: ResourceKind,
    pub format: String,
    pub dimension: String,
    pub bind: String,
    pub count: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MatrixLayout {
    #[default]
    Default,
    RowMajor,
    ColumnMajor,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub type_name: String,
    pub name: String,
    pub offset: u32,
    pub size: u32,
    pub layout: MatrixLayout,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConstantBuffer {
    pub name: String,
    pub variables: Vec<Variable>,
}

impl ConstantBuffer {
    /// Byte size as declared: end of the last variable.
    pub fn size(&self) -> u32 {
        self.variables
            .last()
            .map(|v| v.offset + v.size)
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Structure {
    pub name: String,
    pub members: Vec<Variable>,
}

/// A resolved texture, sampler or UAV register.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceInfo {
    pub name: String,
    pub array_size: u32,
    pub array_index: u32,
    pub register: u32,
    /// Addressing coordinate count.
    pub dim_value: u32,
    /// Access expression: `name` or `name[i]`.
    pub expanded_name: String,
    pub hlsl_type: String,
    pub dimension: ResourceDimension,
    /// HLSL element format (`float4`, `uint`, `struct`, `byte`, ...).
    pub format: String,
    /// Element type of structured buffers.
    pub element_type: Option<String>,
}

/// A resolved constant-buffer register (one per variable, array element and matrix slot).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CBufferEntry {
    pub field: String,
    pub array_element: String,
    /// Corrective selector, only for variables starting past component `x`.
    pub swizzle: String,
    pub slot: u32,
    pub sub_offset: u32,
    /// Components of the variable held in this register.
    pub components: u32,
}

/// Built-in shader inputs that never appear in the signature tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuiltinInput {
    pub register: &'static str,
    pub name: &'static str,
    pub param: &'static str,
}

const BUILTIN_INPUTS: [BuiltinInput; 7] = [
    BuiltinInput {
        register: "vThreadID",
        name: "dispatchId",
        param: "uint3 dispatchId : SV_DispatchThreadID",
    },
    BuiltinInput {
        register: "vThreadGroupID",
        name: "groupId",
        param: "uint3 groupId : SV_GroupID",
    },
    BuiltinInput {
        register: "vThreadIDInGroup",
        name: "groupThreadId",
        param: "uint3 groupThreadId : SV_GroupThreadID",
    },
    BuiltinInput {
        register: "vThreadIDInGroupFlattened",
        name: "groupIndex",
        param: "uint groupIndex : SV_GroupIndex",
    },
    BuiltinInput {
        register: "vGSInstanceID",
        name: "gsInstanceId",
        param: "uint gsInstanceId : SV_GSInstanceID",
    },
    BuiltinInput {
        register: "vOutputControlPointID",
        name: "controlPointId",
        param: "uint controlPointId : SV_OutputControlPointID",
    },
    BuiltinInput {
        register: "vPrim",
        name: "primitiveId",
        param: "uint primitiveId : SV_PrimitiveID",
    },
];

pub fn builtin_input(register: &str) -> Option<&'static BuiltinInput> {
    let base = split_swizzle(register).0;
    BUILTIN_INPUTS
        .iter()
        .find(|b| b.register.eq_ignore_ascii_case(base))
}

/// HLSL text for every declaration the emitter prints, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Declarations {
    pub input_fields: Vec<String>,
    pub input_params: Vec<String>,
    pub output_fields: Vec<String>,
    pub structures: Vec<String>,
    pub constant_buffers: Vec<String>,
    pub textures: Vec<String>,
    pub uavs: Vec<String>,
    pub samplers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum IoTarget {
    Field {
        var_name: String,
        mask: String,
        array_size: u32,
        array_index: u32,
    },
    Param {
        name: String,
        mask: String,
    },
}

#[derive(Debug, Default)]
pub struct Reflection {
    resources: Vec<Resource>,
    inputs: Vec<Signature>,
    outputs: Vec<Signature>,
    constant_buffers: Vec<ConstantBuffer>,
    structures: Vec<Structure>,
    struct_pairs: BTreeMap<String, String>,

    input_map: BTreeMap<String, IoTarget>,
    output_map: BTreeMap<String, IoTarget>,
    textures: BTreeMap<String, ResourceInfo>,
    samplers: BTreeMap<String, ResourceInfo>,
    uavs: BTreeMap<String, ResourceInfo>,
    cbuffer_keys: BTreeMap<String, CBufferEntry>,
    cbuffer_slots: BTreeMap<String, Vec<CBufferEntry>>,
    cbuffer_fields: BTreeMap<String, String>,
    decls: Declarations,
    resolved: bool,
}

impl Reflection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_resource(&mut self, resource: Resource) {
        self.resources.push(resource);
    }

    pub fn add_input_signature(&mut self, signature: Signature) {
        self.inputs.push(signature);
    }

    pub fn add_output_signature(&mut self, signature: Signature) {
        self.outputs.push(signature);
    }

    pub fn add_constant_buffer(&mut self, cbuffer: ConstantBuffer) {
        self.constant_buffers.push(cbuffer);
    }

    /// Structures are deduplicated by name; the first definition wins.
    pub fn add_structure(&mut self, structure: Structure) {
        if self.structures.iter().any(|s| s.name == structure.name) {
            return;
        }
        self.structures.push(structure);
    }

    /// Records the element type of a structured buffer resource.
    pub fn add_uav_struct_pair(&mut self, resource: &str, structure: &str) {
        self.struct_pairs
            .entry(resource.to_owned())
            .or_insert_with(|| structure.to_owned());
    }

    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub fn inputs(&self) -> &[Signature] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[Signature] {
        &self.outputs
    }

    pub fn constant_buffers(&self) -> &[ConstantBuffer] {
        &self.constant_buffers
    }

    pub fn structure(&self, name: &str) -> Option<&Structure> {
        self.structures.iter().find(|s| s.name == name)
    }

    pub fn declarations(&self) -> &Declarations {
        &self.decls
    }

    /// Builds every lookup table. Runs once; later calls are no-ops.
    pub fn resolve(&mut self) {
        if self.resolved {
            debug!("reflection already resolved");
            return;
        }
        self.resolved = true;

        self.resolve_signatures(true);
        self.resolve_signatures(false);
        self.resolve_structures();
        self.resolve_constant_buffers();
        self.resolve_textures();
        self.resolve_uavs();
        self.resolve_samplers();

        debug!(
            inputs = self.input_map.len(),
            outputs = self.output_map.len(),
            textures = self.textures.len(),
            samplers = self.samplers.len(),
            uavs = self.uavs.len(),
            cbuffer_entries = self.cbuffer_keys.len(),
            "reflection resolved"
        );
    }

    fn resolve_signatures(&mut self, is_input: bool) {
        let (sigs, prefix) = if is_input {
            (&self.inputs, 'v')
        } else {
            (&self.outputs, 'o')
        };

        let mut groups: Vec<(&str, Vec<&Signature>)> = Vec::new();
        for sig in sigs {
            match groups.iter_mut().find(|(s, _)| *s == sig.semantic) {
                Some((_, members)) => members.push(sig),
                None => groups.push((&sig.semantic, vec![sig])),
            }
        }

        let mut map = BTreeMap::new();
        let mut fields = Vec::new();
        let mut params = Vec::new();
        for (semantic, members) in groups {
            let first = members[0];
            let array_size = members.len() as u32;
            let ty = io_type(&first.format, &first.mask);

            let param = if is_input {
                input_param(first, &ty)
            } else {
                None
            };
            match param {
                Some((name, decl)) => {
                    params.push(decl);
                    for sig in &members {
                        for key in register_keys(prefix, &sig.register) {
                            map.entry(key).or_insert_with(|| IoTarget::Param {
                                name: name.clone(),
                                mask: sig.mask.clone(),
                            });
                        }
                    }
                }
                None => {
                    let array = if array_size > 1 {
                        format!("[{array_size}]")
                    } else {
                        String::new()
                    };
                    let index = if first.semantic_index != 0 {
                        first.semantic_index.to_string()
                    } else {
                        String::new()
                    };
                    fields.push(format!(
                        "{ty} {}{array} : {semantic}{index};",
                        first.var_name
                    ));
                    for (i, sig) in members.iter().enumerate() {
                        for key in register_keys(prefix, &sig.register) {
                            map.entry(key).or_insert_with(|| IoTarget::Field {
                                var_name: sig.var_name.clone(),
                                mask: sig.mask.clone(),
                                array_size,
                                array_index: i as u32,
                            });
                        }
                    }
                }
            }
        }

        if is_input {
            self.input_map = map;
            self.decls.input_fields = fields;
            self.decls.input_params = params;
        } else {
            self.output_map = map;
            self.decls.output_fields = fields;
        }
    }

    fn resolve_structures(&mut self) {
        for structure in &self.structures {
            let mut text = format!("struct {}\n{{\n", structure.name);
            for member in &structure.members {
                text.push_str(&format!("    {} {};\n", member.type_name, member.name));
            }
            text.push_str("};");
            self.decls.structures.push(text);
        }
    }

    fn resolve_constant_buffers(&mut self) {
        let cbuffers = std::mem::take(&mut self.constant_buffers);
        for cb in &cbuffers {
            let bind = self
                .resources
                .iter()
                .find(|r| r.kind == ResourceKind::ConstantBuffer && r.name == cb.name)
                .map(|r| r.bind.clone());

            let mut text = match &bind {
                Some(bind) => format!(
                    "cbuffer {} : register(b{})\n{{\n",
                    cb.name,
                    register_number(bind)
                ),
                None => format!("cbuffer {}\n{{\n", cb.name),
            };
            for var in &cb.variables {
                let ty = match var.layout {
                    MatrixLayout::RowMajor => format!("row_major {}", var.type_name),
                    _ => var.type_name.clone(),
                };
                text.push_str(&format!("    {ty:<24} {};\n", var.name));
            }
            text.push_str("};");
            self.decls.constant_buffers.push(text);

            for var in &cb.variables {
                let (field, _) = split_array_name(&var.name);
                self.cbuffer_fields
                    .entry(field.to_owned())
                    .or_insert_with(|| var.type_name.clone());
            }

            match &bind {
                Some(bind) => {
                    for var in &cb.variables {
                        self.resolve_variable(bind, var);
                    }
                }
                None => debug!(cbuffer = %cb.name, "constant buffer has no binding; fields stay unresolved"),
            }
        }
        self.constant_buffers = cbuffers;
    }

    fn resolve_variable(&mut self, bind: &str, var: &Variable) {
        let (field, dims) = split_array_name(&var.name);
        let element_count: u32 = dims.iter().product::<u32>().max(1);
        let is_struct = split_scalar_type(&var.type_name).is_none();

        let shape = if is_struct {
            let total_slots = var.size.div_ceil(16).max(1);
            TypeShape {
                elements: 4,
                slots: (total_slots / element_count).max(1),
            }
        } else {
            TypeShape::parse(&var.type_name, var.layout == MatrixLayout::RowMajor)
        };
        let per_slot = shape.per_slot().min(4);
        let base_slot = var.offset / 16;
        let sub = (var.offset % 16) / 4;

        for e in 0..element_count {
            let index_suffix = array_suffix(e, &dims);
            for s in 0..shape.slots {
                let slot = base_slot + e * shape.slots + s;
                let array_element = if shape.slots > 1 && !is_struct {
                    format!("{index_suffix}[{s}]")
                } else {
                    index_suffix.clone()
                };
                let swizzle = if sub != 0 && per_slot <= 3 && s == 0 && e == 0 {
                    let end = (sub + per_slot).min(4) as usize;
                    let letters: String = COMPONENTS[sub as usize..end].iter().collect();
                    format!(".{letters}")
                } else {
                    String::new()
                };
                let entry = CBufferEntry {
                    field: field.to_owned(),
                    array_element,
                    swizzle: swizzle.clone(),
                    slot,
                    sub_offset: sub,
                    components: per_slot,
                };
                self.cbuffer_keys
                    .entry(format!("{bind}[{slot}]{swizzle}"))
                    .or_insert_with(|| entry.clone());
                self.cbuffer_slots
                    .entry(format!("{bind}[{slot}]"))
                    .or_default()
                    .push(entry);
            }
        }
    }

    fn resolve_textures(&mut self) {
        let textures: Vec<Resource> = self
            .resources
            .iter()
            .filter(|r| r.kind == ResourceKind::Texture)
            .cloned()
            .collect();
        for res in &textures {
            let dim =
                ResourceDimension::from_tag(&res.dimension).unwrap_or(ResourceDimension::Texture2D);
            let ty = self.object_type(res, dim, false);
            let (decls, entries) = bind_entries(res, dim, &ty, 't', self.struct_pairs.get(&res.name));
            self.decls.textures.extend(decls);
            for (key, info) in entries {
                self.textures.entry(key).or_insert(info);
            }
        }
    }

    fn resolve_uavs(&mut self) {
        let uavs: Vec<Resource> = self
            .resources
            .iter()
            .filter(|r| r.kind == ResourceKind::Uav)
            .cloned()
            .collect();
        for res in &uavs {
            let dim =
                ResourceDimension::from_tag(&res.dimension).unwrap_or(ResourceDimension::Texture2D);
            let ty = self.object_type(res, dim, true);
            let (decls, entries) = bind_entries(res, dim, &ty, 'u', self.struct_pairs.get(&res.name));
            self.decls.uavs.extend(decls);
            for (key, info) in entries {
                self.uavs.entry(key).or_insert(info);
            }
        }
    }

    fn resolve_samplers(&mut self) {
        let texture_dims: Vec<ResourceDimension> = self
            .resources
            .iter()
            .filter(|r| r.kind == ResourceKind::Texture)
            .map(|r| {
                ResourceDimension::from_tag(&r.dimension).unwrap_or(ResourceDimension::Texture2D)
            })
            .collect();
        let samplers: Vec<Resource> = self
            .resources
            .iter()
            .filter(|r| matches!(r.kind, ResourceKind::Sampler | ResourceKind::SamplerComparison))
            .cloned()
            .collect();
        for (ordinal, res) in samplers.iter().enumerate() {
            let dim = ResourceDimension::from_tag(&res.dimension)
                .or_else(|| texture_dims.get(ordinal).copied())
                .or_else(|| texture_dims.first().copied())
                .unwrap_or(ResourceDimension::Texture2D);
            let ty = if res.kind == ResourceKind::SamplerComparison {
                "SamplerComparisonState"
            } else {
                "SamplerState"
            };
            let (decls, entries) = bind_entries(res, dim, ty, 's', None);
            self.decls.samplers.extend(decls);
            for (key, info) in entries {
                self.samplers.entry(key).or_insert(info);
            }
        }
    }

    fn object_type(&self, res: &Resource, dim: ResourceDimension, rw: bool) -> String {
        let format = element_format(&res.format);
        match dim {
            ResourceDimension::ReadOnly
            | ResourceDimension::ReadWrite
            | ResourceDimension::Append
            | ResourceDimension::Consume => match res.format.as_str() {
                "struct" => {
                    let element = self
                        .struct_pairs
                        .get(&res.name)
                        .map(String::as_str)
                        .unwrap_or("uint");
                    let object = match (dim, rw) {
                        (ResourceDimension::Append, _) => "AppendStructuredBuffer",
                        (ResourceDimension::Consume, _) => "ConsumeStructuredBuffer",
                        (_, true) => "RWStructuredBuffer",
                        (_, false) => "StructuredBuffer",
                    };
                    format!("{object}<{element}>")
                }
                "byte" if rw => "RWByteAddressBuffer".to_owned(),
                "byte" => "ByteAddressBuffer".to_owned(),
                _ if rw => format!("RWBuffer<{format}>"),
                _ => format!("Buffer<{format}>"),
            },
            _ => {
                let base = dim.texture_type();
                if rw {
                    format!("RW{base}<{format}>")
                } else if format != "float4" || dim.is_multisampled() {
                    format!("{base}<{format}>")
                } else {
                    base.to_owned()
                }
            }
        }
    }

    /// Tries every table in the fixed order: input, output, texture, sampler, UAV, constant
    /// buffer.
    pub fn query_name(&self, token: &str) -> Option<String> {
        self.find_input_name(token)
            .or_else(|| self.find_output_name(token))
            .or_else(|| self.find_texture_name(token))
            .or_else(|| self.find_sampler_name(token))
            .or_else(|| self.find_uav_name(token))
            .or_else(|| self.find_constant_buffer_name(token))
    }

    pub fn find_input_name(&self, token: &str) -> Option<String> {
        let m = Modifiers::split(token.trim());
        let (base, letters) = split_swizzle(m.body);
        if let Some(builtin) = builtin_input(base) {
            let mut out = builtin.name.to_owned();
            if let Some(letters) = letters {
                out.push('.');
                out.push_str(letters);
            }
            return Some(m.apply(&out));
        }
        let target = self.input_map.get(base)?;
        Some(m.apply(&io_expr("input", target, letters)))
    }

    pub fn find_output_name(&self, token: &str) -> Option<String> {
        let m = Modifiers::split(token.trim());
        let (base, letters) = split_swizzle(m.body);
        let target = self.output_map.get(base)?;
        Some(m.apply(&io_expr("output", target, letters)))
    }

    pub fn find_texture_name(&self, token: &str) -> Option<String> {
        self.texture(token).map(|info| info.expanded_name.clone())
    }

    pub fn find_sampler_name(&self, token: &str) -> Option<String> {
        self.sampler(token).map(|info| info.expanded_name.clone())
    }

    pub fn find_uav_name(&self, token: &str) -> Option<String> {
        self.uav(token).map(|info| info.expanded_name.clone())
    }

    pub fn find_constant_buffer_name(&self, token: &str) -> Option<String> {
        let m = Modifiers::split(token.trim());
        let (base, letters) = split_swizzle(m.body);

        if let Some(letters) = letters {
            if let Some(entry) = self.cbuffer_keys.get(&format!("{base}.{letters}")) {
                return Some(m.apply(&format!("{}{}", entry.field, entry.array_element)));
            }
        }

        let entries = self.cbuffer_slots.get(base)?;
        let first = letters
            .and_then(|l| l.chars().next())
            .and_then(component_index)
            .unwrap_or(0) as u32;
        let entry = entries
            .iter()
            .find(|e| e.sub_offset <= first && first < e.sub_offset + e.components)
            .or_else(|| entries.iter().find(|e| e.sub_offset == 0))
            .or_else(|| entries.first())?;

        let mut out = format!("{}{}", entry.field, entry.array_element);
        if let Some(letters) = letters {
            let modulus = i64::from(entry.components.max(1));
            out.push('.');
            out.extend(letters.chars().map(|c| {
                let i = i64::from(component_index(c).unwrap_or(0)) - i64::from(entry.sub_offset);
                COMPONENTS[i.rem_euclid(modulus) as usize]
            }));
        }
        Some(m.apply(&out))
    }

    pub fn texture(&self, token: &str) -> Option<&ResourceInfo> {
        self.textures.get(resource_key(token))
    }

    pub fn sampler(&self, token: &str) -> Option<&ResourceInfo> {
        self.samplers.get(resource_key(token))
    }

    pub fn uav(&self, token: &str) -> Option<&ResourceInfo> {
        self.uavs.get(resource_key(token))
    }

    pub fn cbuffer_entry(&self, key: &str) -> Option<&CBufferEntry> {
        self.cbuffer_keys.get(key)
    }

    /// Declared type of a constant-buffer field, by bare field name.
    pub fn cbuffer_field_type(&self, field: &str) -> Option<&str> {
        self.cbuffer_fields.get(field).map(String::as_str)
    }
}

fn resource_key(token: &str) -> &str {
    split_swizzle(Modifiers::split(token.trim()).body).0
}

fn io_expr(root: &str, target: &IoTarget, letters: Option<&str>) -> String {
    let (mut out, mask) = match target {
        IoTarget::Field {
            var_name,
            mask,
            array_size,
            array_index,
        } => {
            let mut out = format!("{root}.{var_name}");
            if *array_size > 1 {
                out.push_str(&format!("[{array_index}]"));
            }
            (out, mask)
        }
        IoTarget::Param { name, mask } => (name.clone(), mask),
    };
    if let Some(letters) = letters {
        let rebased = rebase_on_mask(letters, mask);
        let full: String = COMPONENTS[..mask.len().min(4)].iter().collect();
        if rebased != full || !mask.chars().all(|c| component_index(c).is_some()) {
            out.push('.');
            out.push_str(&rebased);
        }
    }
    out
}

/// Maps register components onto the field's own components (`zw` of mask `zw` → `xy`).
fn rebase_on_mask(letters: &str, mask: &str) -> String {
    letters
        .chars()
        .map(|c| match mask.find(c) {
            Some(pos) if component_index(c).is_some() => COMPONENTS[pos.min(3)],
            _ => c,
        })
        .collect()
}

fn io_type(format: &str, mask: &str) -> String {
    let width = if mask.chars().all(|c| component_index(c).is_some()) {
        mask.len()
    } else {
        0
    };
    match width {
        0 | 1 => format.to_owned(),
        n => format!("{format}{n}"),
    }
}

/// System values routed through entry-point parameters instead of the input struct.
fn input_param(sig: &Signature, ty: &str) -> Option<(String, String)> {
    match sig.system_value.to_ascii_uppercase().as_str() {
        "" | "NONE" | "POS" | "CLIPDST" | "CULLDST" => None,
        "VERTID" => Some((
            "vertexId".to_owned(),
            "uint vertexId : SV_VertexID".to_owned(),
        )),
        "INSTID" => Some((
            "instanceId".to_owned(),
            "uint instanceId : SV_InstanceID".to_owned(),
        )),
        _ => {
            let mut chars = sig.var_name.chars();
            let name: String = match chars.next() {
                Some(c) => c.to_lowercase().chain(chars).collect(),
                None => return None,
            };
            let decl = format!("{ty} {name} : {}", sig.semantic);
            Some((name, decl))
        }
    }
}

fn register_keys(prefix: char, register: &str) -> Vec<String> {
    if !register.is_empty() && register.chars().all(|c| c.is_ascii_digit()) {
        vec![format!("{prefix}{register}"), format!("{prefix}[{register}]")]
    } else {
        vec![register.to_owned()]
    }
}

/// `t12` → 12, `cb3` → 3, `t0,space1` → 0.
pub fn register_number(bind: &str) -> u32 {
    let digits: String = bind
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().unwrap_or(0)
}

/// `lights[2][3]` → (`lights`, [2, 3]).
fn split_array_name(name: &str) -> (&str, Vec<u32>) {
    let Some(open) = name.find('[') else {
        return (name, Vec::new());
    };
    let dims = name[open..]
        .split(|c| c == '[' || c == ']')
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<u32>().ok())
        .collect();
    (&name[..open], dims)
}

fn array_suffix(mut flat: u32, dims: &[u32]) -> String {
    let mut parts = vec![0u32; dims.len()];
    for (i, &d) in dims.iter().enumerate().rev() {
        let d = d.max(1);
        parts[i] = flat % d;
        flat /= d;
    }
    parts.iter().map(|p| format!("[{p}]")).collect()
}

type BoundEntries = (Vec<String>, Vec<(String, ResourceInfo)>);

fn bind_entries(
    res: &Resource,
    dim: ResourceDimension,
    hlsl_type: &str,
    prefix: char,
    element_type: Option<&String>,
) -> BoundEntries {
    let register = register_number(&res.bind);
    let count = res.count.max(1);
    let decl = if count > 1 {
        format!(
            "{hlsl_type} {}[{count}] : register({prefix}{register});",
            res.name
        )
    } else {
        format!("{hlsl_type} {} : register({prefix}{register});", res.name)
    };

    let entries = (0..count)
        .map(|i| {
            let expanded_name = if count > 1 {
                format!("{}[{i}]", res.name)
            } else {
                res.name.clone()
            };
            let info = ResourceInfo {
                name: res.name.clone(),
                array_size: count,
                array_index: i,
                register: register + i,
                dim_value: dim.coord_count() as u32,
                expanded_name,
                hlsl_type: hlsl_type.to_owned(),
                dimension: dim,
                format: element_format(&res.format),
                element_type: element_type.cloned(),
            };
            (format!("{prefix}{}", register + i), info)
        })
        .collect();
    (vec![decl], entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn var(type_name: &str, name: &str, offset: u32, size: u32) -> Variable {
        Variable {
            type_name: type_name.to_owned(),
            name: name.to_owned(),
            offset,
            size,
            layout: MatrixLayout::Default,
        }
    }

    fn resource(name: &str, kind: ResourceKind, format: &str, dim: &str, bind: &str, count: u32) -> Resource {
        Resource {
            name: name.to_owned(),
            kind,
            format: format.to_owned(),
            dimension: dim.to_owned(),
            bind: bind.to_owned(),
            count,
        }
    }

    fn with_cbuffer(variables: Vec<Variable>) -> Reflection {
        let mut r = Reflection::new();
        r.add_resource(resource("Globals", ResourceKind::ConstantBuffer, "NA", "NA", "cb0", 1));
        r.add_constant_buffer(ConstantBuffer {
            name: "Globals".to_owned(),
            variables,
        });
        r.resolve();
        r
    }

    #[test]
    fn matrix_expands_one_entry_per_slot() {
        let r = with_cbuffer(vec![var("float4x4", "worldMatrix", 0, 64)]);
        for s in 0..4 {
            let entry = r.cbuffer_entry(&format!("cb0[{s}]")).expect("matrix slot entry");
            assert_eq!(entry.field, "worldMatrix");
            assert_eq!(entry.array_element, format!("[{s}]"));
            assert_eq!(entry.slot, s);
            assert_eq!(entry.components, 4);
        }
        assert!(r.cbuffer_entry("cb0[4]").is_none());
        assert_eq!(
            r.find_constant_buffer_name("cb0[2].xyzw").as_deref(),
            Some("worldMatrix[2].xyzw")
        );
    }

    #[test]
    fn slot_and_sub_offset_follow_byte_offset() {
        let vars = vec![
            var("float3", "lightDir", 0, 12),
            var("float", "intensity", 12, 4),
            var("float2", "uvScale", 16, 8),
            var("float2", "uvBias", 24, 8),
        ];
        let r = with_cbuffer(vars.clone());
        for v in &vars {
            let slot = v.offset / 16;
            let sub = (v.offset % 16) / 4;
            let entry = r
                .cbuffer_slots
                .get(&format!("cb0[{slot}]"))
                .and_then(|entries| entries.iter().find(|e| e.field == v.name))
                .expect("entry for variable");
            assert_eq!((entry.slot, entry.sub_offset), (slot, sub));
        }
        assert!(r.cbuffer_entry("cb0[0].w").is_some());
        assert!(r.cbuffer_entry("cb0[1].zw").is_some());
    }

    #[test]
    fn packed_constant_lookup() {
        let r = with_cbuffer(vec![
            var("float3", "lightDir", 0, 12),
            var("float", "intensity", 12, 4),
            var("float2", "uvScale", 16, 8),
            var("float2", "uvBias", 24, 8),
        ]);
        assert_eq!(r.query_name("cb0[0].w").as_deref(), Some("intensity"));
        assert_eq!(r.query_name("cb0[0].wwww").as_deref(), Some("intensity.xxxx"));
        assert_eq!(r.query_name("cb0[0].xyzx").as_deref(), Some("lightDir.xyzx"));
        assert_eq!(r.query_name("cb0[1].zw").as_deref(), Some("uvBias"));
        assert_eq!(r.query_name("cb0[1].zwzz").as_deref(), Some("uvBias.xyxx"));
        assert_eq!(r.query_name("-cb0[1].xyxx").as_deref(), Some("-uvScale.xyxx"));
        assert_eq!(r.query_name("cb0[7].x"), None);
    }

    #[test]
    fn arrays_take_one_slot_per_element() {
        let r = with_cbuffer(vec![var("float4", "bones[3]", 32, 48)]);
        assert_eq!(r.query_name("cb0[3].xyzw").as_deref(), Some("bones[1].xyzw"));
        assert_eq!(r.cbuffer_entry("cb0[4]").map(|e| e.array_element.as_str()), Some("[2]"));
    }

    #[test]
    fn cbuffer_declaration_pads_types() {
        let r = with_cbuffer(vec![var("float4", "tint", 0, 16)]);
        assert_eq!(
            r.declarations().constant_buffers,
            vec![format!(
                "cbuffer Globals : register(b0)\n{{\n    float4{} tint;\n}};",
                " ".repeat(18)
            )]
        );
    }

    #[test]
    fn shared_semantics_become_array_fields() {
        let mut r = Reflection::new();
        r.add_input_signature(Signature::new("POSITION", 0, "xyzw", "0", "NONE", "float", "xyzw"));
        r.add_input_signature(Signature::new("TEXCOORD", 0, "xy", "1", "NONE", "float", "xy"));
        r.add_input_signature(Signature::new("TEXCOORD", 1, "xy", "2", "NONE", "float", "xy"));
        r.add_input_signature(Signature::new("SV_VertexID", 0, "x", "3", "VERTID", "uint", "x"));
        r.resolve();

        assert_eq!(
            r.declarations().input_fields,
            vec![
                "float4 Position : POSITION;".to_owned(),
                "float2 Texcoord[2] : TEXCOORD;".to_owned(),
            ]
        );
        assert_eq!(
            r.declarations().input_params,
            vec!["uint vertexId : SV_VertexID".to_owned()]
        );
        assert_eq!(r.query_name("v0.xyzw").as_deref(), Some("input.Position"));
        assert_eq!(r.query_name("v[2].xyxx").as_deref(), Some("input.Texcoord[1].xyxx"));
        assert_eq!(r.query_name("v1.xy").as_deref(), Some("input.Texcoord[0]"));
        assert_eq!(r.query_name("-|v0.w|").as_deref(), Some("-abs(input.Position.w)"));
        assert_eq!(r.query_name("v3.x").as_deref(), Some("vertexId"));
    }

    #[test]
    fn packed_output_rebases_onto_field() {
        let mut r = Reflection::new();
        r.add_output_signature(Signature::new("TEXCOORD", 0, "xy", "1", "NONE", "float", "xy"));
        r.add_output_signature(Signature::new("FOG", 0, "zw", "2", "NONE", "float", "zw"));
        r.add_output_signature(Signature::new("SV_Depth", 0, "N/A", "oDepth", "DEPTH", "float", "YES"));
        r.resolve();
        assert_eq!(r.query_name("o2.zw").as_deref(), Some("output.Fog"));
        assert_eq!(r.query_name("o2.w").as_deref(), Some("output.Fog.y"));
        assert_eq!(r.query_name("oDepth").as_deref(), Some("output.Depth"));
        assert!(r
            .declarations()
            .output_fields
            .contains(&"float Depth : SV_Depth;".to_owned()));
    }

    #[test]
    fn builtins_keep_their_swizzle() {
        let r = Reflection::new();
        assert_eq!(r.query_name("vThreadID.xy").as_deref(), Some("dispatchId.xy"));
        assert_eq!(r.query_name("vThreadIDInGroupFlattened.x").as_deref(), Some("groupIndex.x"));
        assert_eq!(
            builtin_input("vThreadGroupID.x").map(|b| b.param),
            Some("uint3 groupId : SV_GroupID")
        );
    }

    #[test]
    fn texture_arrays_expand_per_register() {
        let mut r = Reflection::new();
        r.add_resource(resource("shadowMaps", ResourceKind::Texture, "float", "2darray", "t2", 3));
        r.add_resource(resource("cmp", ResourceKind::SamplerComparison, "NA", "NA", "s0", 1));
        r.resolve();

        assert_eq!(
            r.declarations().textures,
            vec!["Texture2DArray<float> shadowMaps[3] : register(t2);".to_owned()]
        );
        let info = r.texture("t3.xxxx").expect("second element");
        assert_eq!(info.expanded_name, "shadowMaps[1]");
        assert_eq!(info.register, 3);
        assert_eq!(info.dim_value, 3);
        assert!(r.texture("t5").is_none());

        assert_eq!(
            r.declarations().samplers,
            vec!["SamplerComparisonState cmp : register(s0);".to_owned()]
        );
        assert_eq!(
            r.sampler("s0").map(|s| s.dimension),
            Some(ResourceDimension::Texture2DArray)
        );
    }

    #[test]
    fn structured_uav_uses_paired_element_type() {
        let mut r = Reflection::new();
        r.add_structure(Structure {
            name: "Particle".to_owned(),
            members: vec![var("float3", "position", 0, 12), var("float", "life", 12, 4)],
        });
        r.add_structure(Structure {
            name: "Particle".to_owned(),
            members: Vec::new(),
        });
        r.add_uav_struct_pair("particles", "Particle");
        r.add_resource(resource("particles", ResourceKind::Uav, "struct", "r/w", "u1", 1));
        r.add_resource(resource("counters", ResourceKind::Uav, "byte", "r/w", "u2", 1));
        r.add_resource(resource("heights", ResourceKind::Uav, "float", "2d", "u3", 1));
        r.resolve();

        assert_eq!(
            r.declarations().uavs,
            vec![
                "RWStructuredBuffer<Particle> particles : register(u1);".to_owned(),
                "RWByteAddressBuffer counters : register(u2);".to_owned(),
                "RWTexture2D<float> heights : register(u3);".to_owned(),
            ]
        );
        assert_eq!(
            r.declarations().structures,
            vec!["struct Particle\n{\n    float3 position;\n    float life;\n};".to_owned()]
        );
        assert_eq!(
            r.uav("u1").and_then(|u| u.element_type.as_deref()),
            Some("Particle")
        );
    }
}
