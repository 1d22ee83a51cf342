use crate::expr::{
    is_numeric, parse_constructor, parse_literal_list, split_swizzle, Modifiers, SwizzleInfo,
};

use super::layout::{split_scalar_type, TypeShape};
use super::Reflection;

/// Values of a literal operand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteralInfo {
    pub values: Vec<String>,
    /// Every value is written with a decimal point.
    pub has_point: bool,
}

/// Recognizes a bare number, an `l(...)` list or a numeric constructor made only of numbers.
pub fn is_literal(expr: &str) -> Option<LiteralInfo> {
    let expr = expr.trim();
    let values: Vec<&str> = if is_numeric(expr) {
        vec![expr]
    } else if let Some(values) = parse_literal_list(expr) {
        values
    } else {
        parse_constructor(expr)?.args
    };
    if values.is_empty() || !values.iter().all(|v| is_numeric(v)) {
        return None;
    }
    Some(LiteralInfo {
        has_point: values.iter().all(|v| v.contains('.')),
        values: values.into_iter().map(str::to_owned).collect(),
    })
}

impl Reflection {
    /// Reshapes `expr` so it yields exactly `target.count` components, picking them by
    /// `target.index`.
    ///
    /// Selectors whose length already equals `target.count` are positionally aligned and are
    /// left untouched, so casting an expression to its own shape is a no-op.
    pub fn get_casted_string(&self, expr: &str, target: &SwizzleInfo) -> String {
        let expr = expr.trim();
        let m = Modifiers::split(expr);
        let body = m.body;

        if let Some(values) = parse_literal_list(body) {
            return m.apply(&select_values("float", &values, target));
        }

        if let Some(ctor) = parse_constructor(body) {
            if target.count == 0 {
                return expr.to_owned();
            }
            if ctor.args.len() == 1 {
                let width = ctor.width.unwrap_or(1);
                if width == target.count {
                    return expr.to_owned();
                }
                let arg = ctor.args[0];
                let splat = if target.count == 1 {
                    format!("{}({arg})", ctor.scalar)
                } else {
                    format!("{}{}({arg})", ctor.scalar, target.count)
                };
                return m.apply(&splat);
            }
            return m.apply(&select_values(ctor.scalar, &ctor.args, target));
        }

        if target.count == 0 {
            return expr.to_owned();
        }

        let (base, letters) = split_swizzle(body);

        let field = body
            .split(|c| c == '[' || c == '.')
            .next()
            .unwrap_or(body);
        if let (Some(ty), None) = (self.cbuffer_field_type(field), letters) {
            let shape = TypeShape::parse(ty, false);
            if shape.elements as usize == target.count {
                return expr.to_owned();
            }
            if shape.elements == 1 {
                let scalar = split_scalar_type(ty).map(|(s, _)| s).unwrap_or("float");
                return if target.count == 1 {
                    expr.to_owned()
                } else {
                    m.apply(&format!("{scalar}{}({body})", target.count))
                };
            }
        }

        let Some(letters) = letters else {
            return expr.to_owned();
        };
        let letters: Vec<char> = letters.chars().collect();
        if letters.len() == target.count {
            return expr.to_owned();
        }
        let chosen: String = (0..target.count)
            .map(|i| letters[target.index[i] as usize % letters.len()])
            .collect();
        m.apply(&format!("{base}.{chosen}"))
    }
}

fn select_values(scalar: &str, values: &[&str], target: &SwizzleInfo) -> String {
    if values.is_empty() {
        return format!("{scalar}(0)");
    }
    let chosen: Vec<&str> = if target.count == 0 || values.len() == target.count {
        values.to_vec()
    } else {
        (0..target.count)
            .map(|i| values[target.index[i] as usize % values.len()])
            .collect()
    };
    match chosen.as_slice() {
        [single] => (*single).to_owned(),
        many => format!("{scalar}{}({})", many.len(), many.join(", ")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflection::{ConstantBuffer, MatrixLayout, Resource, ResourceKind, Variable};
    use pretty_assertions::assert_eq;

    fn cast(expr: &str, letters: &str) -> String {
        let target = SwizzleInfo::from_letters(letters).unwrap_or_default();
        Reflection::new().get_casted_string(expr, &target)
    }

    #[test]
    fn literal_lists_select_by_destination_index() {
        assert_eq!(cast("l(1.0, 2.0, 3.0, 4.0)", "xz"), "float2(1.0, 3.0)");
        assert_eq!(cast("l(1.0, 2.0, 3.0, 4.0)", "w"), "4.0");
        assert_eq!(cast("l(0.5)", "xyz"), "float3(0.5, 0.5, 0.5)");
        assert_eq!(cast("l(1, 2)", ""), "float2(1, 2)");
        assert_eq!(cast("l(7)", ""), "7");
    }

    #[test]
    fn constructors_select_or_splat() {
        assert_eq!(cast("float4(a, b, c, d)", "yw"), "float2(b, d)");
        assert_eq!(cast("float4(a, b, c, d)", "xyzw"), "float4(a, b, c, d)");
        assert_eq!(cast("float3(r0.x)", "xy"), "float2(r0.x)");
        assert_eq!(cast("int2(x)", "xy"), "int2(x)");
    }

    #[test]
    fn swizzles_are_rewritten_to_target_width() {
        assert_eq!(cast("r1.xyzw", "xy"), "r1.xy");
        assert_eq!(cast("r1.xxyx", "yw"), "r1.xx");
        assert_eq!(cast("-abs(r2.wzyx)", "x"), "-abs(r2.w)");
        assert_eq!(cast("r3.x", "xyz"), "r3.xxx");
        assert_eq!(cast("input.Position", "xy"), "input.Position");
        assert_eq!(cast("r0.xyzw", ""), "r0.xyzw");
    }

    #[test]
    fn short_selectors_wrap_around() {
        assert_eq!(cast("r0.zw", "xyzw"), "r0.zwzw");
        assert_eq!(cast("r0.zw", "xyz"), "r0.zwz");
        assert_eq!(cast("r0.xyz", "w"), "r0.x");
    }

    #[test]
    fn casting_to_own_shape_is_identity() {
        for expr in [
            "r0.xz",
            "-r1.yzw",
            "abs(input.Color.wzyx)",
            "float2(r0.x, r1.y)",
            "cb0[2].w",
            "r4",
        ] {
            let own = SwizzleInfo::from_expr(expr);
            let once = Reflection::new().get_casted_string(expr, &own);
            assert_eq!(once, expr);
            let twice = Reflection::new().get_casted_string(&once, &own);
            assert_eq!(twice, once);
        }
    }

    #[test]
    fn constant_buffer_fields_cast_by_declared_type() {
        let mut r = Reflection::new();
        r.add_resource(Resource {
            name: "Material".to_owned(),
            kind: ResourceKind::ConstantBuffer,
            format: "NA".to_owned(),
            dimension: "NA".to_owned(),
            bind: "cb1".to_owned(),
            count: 1,
        });
        r.add_constant_buffer(ConstantBuffer {
            name: "Material".to_owned(),
            variables: vec![
                Variable {
                    type_name: "float".to_owned(),
                    name: "roughness".to_owned(),
                    offset: 0,
                    size: 4,
                    layout: MatrixLayout::Default,
                },
                Variable {
                    type_name: "float3".to_owned(),
                    name: "albedo".to_owned(),
                    offset: 16,
                    size: 12,
                    layout: MatrixLayout::Default,
                },
            ],
        });
        r.resolve();

        let xyz = SwizzleInfo::identity(3);
        assert_eq!(r.get_casted_string("roughness", &xyz), "float3(roughness)");
        assert_eq!(r.get_casted_string("-roughness", &xyz), "-float3(roughness)");
        assert_eq!(r.get_casted_string("albedo", &xyz), "albedo");
        assert_eq!(
            r.get_casted_string("albedo.xyzx", &SwizzleInfo::identity(2)),
            "albedo.xy"
        );
    }

    #[test]
    fn swizzled_fields_follow_the_destination_lanes() {
        let mut r = Reflection::new();
        r.add_resource(Resource {
            name: "Globals".to_owned(),
            kind: ResourceKind::ConstantBuffer,
            format: "NA".to_owned(),
            dimension: "NA".to_owned(),
            bind: "cb0".to_owned(),
            count: 1,
        });
        let var = |type_name: &str, name: &str, offset, size| Variable {
            type_name: type_name.to_owned(),
            name: name.to_owned(),
            offset,
            size,
            layout: MatrixLayout::Default,
        };
        r.add_constant_buffer(ConstantBuffer {
            name: "Globals".to_owned(),
            variables: vec![var("float2", "uvScale", 16, 8), var("float3", "albedo", 32, 12)],
        });
        r.resolve();

        let lanes = |letters: &str| SwizzleInfo::from_letters(letters).unwrap_or_default();
        assert_eq!(r.get_casted_string("uvScale.xxxy", &lanes("zw")), "uvScale.xy");
        assert_eq!(r.get_casted_string("albedo.xxyz", &lanes("yzw")), "albedo.xyz");
        assert_eq!(r.get_casted_string("-albedo.xxyz", &lanes("yzw")), "-albedo.xyz");
        assert_eq!(r.get_casted_string("albedo.xyz", &lanes("xyz")), "albedo.xyz");
        assert_eq!(r.get_casted_string("uvScale", &lanes("xy")), "uvScale");
    }

    #[test]
    fn literal_detection() {
        let lit = is_literal("l(1.000000, 0.500000)").expect("literal list");
        assert_eq!(lit.values, ["1.000000", "0.500000"]);
        assert!(lit.has_point);

        let lit = is_literal("uint2(3, 0x10)").expect("integer constructor");
        assert!(!lit.has_point);

        assert_eq!(is_literal("-2").map(|l| l.has_point), Some(false));
        assert!(is_literal("float2(r0.x, 1.0)").is_none());
        assert!(is_literal("r0.x").is_none());
    }
}
