//! Instruction decoder.
//!
//! Walks the token stream after the profile token, classifies each mnemonic once and dispatches
//! it to a handler. Handlers pull operands through [`InstrReader`] and append already indented
//! statements to the [`DecoderContext`].

use tracing::{debug, warn};

use super::opcode::{
    classify, AtomicOp, BinaryOp, Conversion, LogicOp, Mnemonic, NumericKind, Opcode, SampleOp,
    ShiftOp, SyncFlags,
};
use super::ShaderStage;
use crate::error::{DecompileError, Result};
use crate::expr::{
    component_index, parse_constructor, parse_literal_list, split_swizzle, Modifiers,
    SwizzleInfo, COMPONENTS,
};
use crate::lexer::{Lexer, Token};
use crate::reflection::{
    builtin_input, is_literal, Reflection, ResourceDimension, ResourceInfo, TextureKinds,
    TypeShape,
};

/// Everything the emitter needs from the instruction stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedProgram {
    pub stage: ShaderStage,
    pub profile: String,
    /// Entry-point body, one entry per line, indented relative to the function body.
    pub statements: Vec<String>,
    /// Texture kinds queried through `resinfo`.
    pub helpers: TextureKinds,
    /// `dcl_thread_group` dimensions.
    pub thread_group: Option<[u32; 3]>,
    /// Built-in entry parameters declared through `dcl_input`.
    pub builtin_params: Vec<String>,
    /// Block depth left open at the end of the stream; 0 for well-formed input.
    pub final_depth: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Block {
    If,
    Loop,
    Switch,
    Case,
}

#[derive(Debug)]
struct DecoderContext {
    stage: ShaderStage,
    profile: String,
    /// The entry point returns an `XXOutput` struct rather than `void`.
    has_output: bool,
    depth: i32,
    blocks: Vec<Block>,
    thread_group: Option<[u32; 3]>,
    statements: Vec<String>,
    helpers: TextureKinds,
    builtin_params: Vec<String>,
}

impl DecoderContext {
    fn new(stage: ShaderStage, profile: &str, has_output: bool) -> Self {
        Self {
            stage,
            profile: profile.to_owned(),
            has_output,
            depth: 0,
            blocks: Vec::new(),
            thread_group: None,
            statements: Vec::new(),
            helpers: TextureKinds::empty(),
            builtin_params: Vec::new(),
        }
    }

    fn emit(&mut self, stmt: impl AsRef<str>) {
        let stmt = stmt.as_ref();
        if stmt.is_empty() {
            self.statements.push(String::new());
            return;
        }
        let indent = "    ".repeat(self.depth.max(0) as usize);
        self.statements.push(format!("{indent}{stmt}"));
    }

    /// `{ ... }` scope for statements that need temporaries.
    fn emit_block(&mut self, lines: &[String]) {
        self.emit("{");
        for line in lines {
            self.emit(format!("    {line}"));
        }
        self.emit("}");
    }

    fn assign(&mut self, dst: &Dst, rhs: String) {
        if dst.null {
            return;
        }
        self.emit(format!("{} = {rhs};", dst.expr));
    }

    fn open(&mut self, header: String, block: Block) {
        self.emit(header);
        self.emit("{");
        self.depth += 1;
        self.blocks.push(block);
    }

    fn close(&mut self, block: Block) {
        if block == Block::Switch && self.blocks.last() == Some(&Block::Case) {
            self.blocks.pop();
            self.depth -= 1;
        }
        match self.blocks.pop() {
            Some(open) if open == block => {}
            open => warn!(expected = ?block, found = ?open, "mismatched block terminator"),
        }
        self.depth -= 1;
        self.emit("}");
    }

    fn reopen_else(&mut self) {
        if self.blocks.last() != Some(&Block::If) {
            warn!(found = ?self.blocks.last(), "`else` outside of an if block");
        }
        self.depth -= 1;
        self.emit("}");
        self.emit("else");
        self.emit("{");
        self.depth += 1;
    }

    /// Consecutive labels share one level: a label directly after another closes it first.
    fn case_label(&mut self, label: String) {
        if self.blocks.last() == Some(&Block::Case) {
            self.blocks.pop();
            self.depth -= 1;
        }
        self.emit(label);
        self.depth += 1;
        self.blocks.push(Block::Case);
    }

    fn leave_case(&mut self) {
        if self.blocks.last() == Some(&Block::Case) {
            self.blocks.pop();
            self.depth -= 1;
        }
    }

    fn return_statement(&self) -> &'static str {
        if self.has_output {
            "return output;"
        } else {
            "return;"
        }
    }

    fn finish(self) -> DecodedProgram {
        DecodedProgram {
            stage: self.stage,
            profile: self.profile,
            statements: self.statements,
            helpers: self.helpers,
            thread_group: self.thread_group,
            builtin_params: self.builtin_params,
            final_depth: self.depth,
        }
    }
}

/// Scans for the profile token, then decodes every instruction after it.
pub fn decode_program(source: &str, reflection: &Reflection) -> Result<DecodedProgram> {
    let mut lexer = Lexer::new(source);

    let (stage, profile) = loop {
        let tok = lexer.advance().ok_or(DecompileError::MissingShaderProfile)?;
        if let Some(stage) = ShaderStage::from_profile(tok.text) {
            break (stage, tok.text);
        }
    };
    debug!(%stage, profile, "decoding instruction stream");

    let has_output = stage != ShaderStage::Compute && !reflection.outputs().is_empty();
    let mut ctx = DecoderContext::new(stage, profile, has_output);
    while let Some(tok) = lexer.advance() {
        decode_instruction(&mut ctx, &mut lexer, reflection, tok)?;
    }

    if ctx.depth != 0 {
        warn!(depth = ctx.depth, "control flow is unbalanced at end of shader");
    }
    Ok(ctx.finish())
}

fn decode_instruction<'src>(
    ctx: &mut DecoderContext,
    lexer: &mut Lexer<'src>,
    reflection: &Reflection,
    tok: Token<'src>,
) -> Result<()> {
    let Some(mnemonic) = classify(tok.text) else {
        warn!(line = tok.line, mnemonic = tok.text, "unknown instruction; skipping line");
        lexer.skip_line(tok.line);
        return Ok(());
    };

    let mut r = InstrReader::new(lexer, reflection, mnemonic, tok);
    match mnemonic.opcode {
        Opcode::Mov => decode_mov(&mut r, ctx)?,
        Opcode::Movc => decode_movc(&mut r, ctx)?,
        Opcode::Binary { op, .. } => decode_binary(&mut r, ctx, op)?,
        Opcode::Mad { kind } => decode_mad(&mut r, ctx, kind)?,
        Opcode::WideMul { .. } => decode_wide_mul(&mut r, ctx)?,
        Opcode::UDiv => decode_udiv(&mut r, ctx)?,
        Opcode::Negate => decode_negate(&mut r, ctx)?,
        Opcode::Dot { components } => decode_dot(&mut r, ctx, components)?,
        Opcode::Intrinsic { name, args } => decode_intrinsic(&mut r, ctx, name, args)?,
        Opcode::Compare { op, kind } => decode_compare(&mut r, ctx, op.symbol(), kind)?,
        Opcode::Logic(op) => decode_logic(&mut r, ctx, op)?,
        Opcode::Not => decode_not(&mut r, ctx)?,
        Opcode::Shift { op, kind } => decode_shift(&mut r, ctx, op, kind)?,
        Opcode::Convert(conversion) => decode_convert(&mut r, ctx, conversion)?,
        Opcode::SinCos => decode_sincos(&mut r, ctx)?,

        Opcode::If { nonzero } => {
            let cond = r.src(&SwizzleInfo::none())?;
            ctx.open(format!("if ({cond} {} 0)", zero_test(nonzero)), Block::If);
        }
        Opcode::Else => ctx.reopen_else(),
        Opcode::EndIf => ctx.close(Block::If),
        Opcode::Loop => ctx.open("while (true)".to_owned(), Block::Loop),
        Opcode::EndLoop => ctx.close(Block::Loop),
        Opcode::Switch => {
            let selector = r.src(&SwizzleInfo::none())?;
            ctx.open(format!("switch ({})", as_int(&selector)), Block::Switch);
        }
        Opcode::Case => {
            let value = r.operand()?;
            let label = parse_literal_list(&value)
                .and_then(|values| values.first().map(|v| (*v).to_owned()))
                .unwrap_or(value);
            ctx.case_label(format!("case {label}:"));
        }
        Opcode::Default => ctx.case_label("default:".to_owned()),
        Opcode::EndSwitch => ctx.close(Block::Switch),
        Opcode::Break => {
            ctx.emit("break;");
            ctx.leave_case();
        }
        Opcode::BreakC { nonzero } => decode_conditional(&mut r, ctx, nonzero, "break;")?,
        Opcode::Continue => ctx.emit("continue;"),
        Opcode::ContinueC { nonzero } => {
            decode_conditional(&mut r, ctx, nonzero, "continue;")?
        }
        Opcode::Ret => {
            if ctx.depth > 0 {
                let ret = ctx.return_statement();
                ctx.emit(ret);
            }
        }
        Opcode::RetC { nonzero } => {
            let ret = ctx.return_statement();
            decode_conditional(&mut r, ctx, nonzero, ret)?
        }
        Opcode::Discard { nonzero } => decode_conditional(&mut r, ctx, nonzero, "discard;")?,

        Opcode::Sample(op) => decode_sample(&mut r, ctx, op)?,
        Opcode::Gather {
            compare,
            programmable_offset,
        } => decode_gather(&mut r, ctx, compare, programmable_offset)?,
        Opcode::Load { multisample } => decode_ld(&mut r, ctx, multisample)?,
        Opcode::ResInfo => decode_resinfo(&mut r, ctx)?,
        Opcode::Lod => decode_lod(&mut r, ctx)?,
        Opcode::LoadRaw => decode_ld_raw(&mut r, ctx)?,
        Opcode::StoreRaw => decode_store_raw(&mut r, ctx)?,
        Opcode::LoadStructured => decode_ld_structured(&mut r, ctx)?,
        Opcode::StoreStructured => decode_store_structured(&mut r, ctx)?,
        Opcode::LoadUavTyped => decode_ld_uav_typed(&mut r, ctx)?,
        Opcode::StoreUavTyped => decode_store_uav_typed(&mut r, ctx)?,
        Opcode::Atomic { op, immediate } => decode_atomic(&mut r, ctx, op, immediate)?,
        Opcode::Sync(flags) => decode_sync(ctx, flags),

        Opcode::DclTemps => decode_dcl_temps(&mut r, ctx)?,
        Opcode::DclIndexableTemp => decode_dcl_indexable_temp(&mut r, ctx)?,
        Opcode::DclThreadGroup => decode_dcl_thread_group(&mut r, ctx)?,
        Opcode::DclImmediateConstantBuffer => decode_dcl_icb(&mut r, ctx),
        Opcode::DclInput => decode_dcl_input(&mut r, ctx)?,
        Opcode::Declaration | Opcode::Skip => {}
    }
    r.finish();
    Ok(())
}

/// Resolved destination operand.
#[derive(Debug, Clone)]
struct Dst {
    expr: String,
    /// Write mask as printed in the listing.
    info: SwizzleInfo,
    null: bool,
}

impl Dst {
    /// Base expression and per-lane letters for component-wise statements.
    fn lanes(&self) -> Option<(String, Vec<char>)> {
        if self.info.count <= 1 {
            return None;
        }
        let (base, letters) = split_swizzle(&self.expr);
        let letters = match letters {
            Some(letters) => letters.chars().collect(),
            None => COMPONENTS[..self.info.count].to_vec(),
        };
        Some((base.to_owned(), letters))
    }
}

/// A texture, UAV or buffer operand.
#[derive(Debug, Clone)]
struct Bound<'a> {
    name: String,
    letters: Option<String>,
    info: Option<&'a ResourceInfo>,
}

impl Bound<'_> {
    fn dimension(&self) -> ResourceDimension {
        self.info
            .map(|info| info.dimension)
            .unwrap_or(ResourceDimension::Texture2D)
    }

    fn selector(&self) -> &str {
        self.letters.as_deref().unwrap_or("xyzw")
    }

    fn format(&self) -> &str {
        self.info.map(|info| info.format.as_str()).unwrap_or("float4")
    }
}

/// Operand reader for one instruction line.
struct InstrReader<'a, 'src> {
    lexer: &'a mut Lexer<'src>,
    reflection: &'a Reflection,
    mnemonic: Mnemonic,
    token: &'src str,
    line: usize,
    /// `( ... )` groups printed right after the mnemonic.
    groups: Vec<Vec<&'src str>>,
    /// Trailing `_uint`-style token after the groups.
    suffix: Option<&'src str>,
}

impl<'a, 'src> InstrReader<'a, 'src> {
    fn new(
        lexer: &'a mut Lexer<'src>,
        reflection: &'a Reflection,
        mnemonic: Mnemonic,
        tok: Token<'src>,
    ) -> Self {
        let line = tok.line;
        let mut groups = Vec::new();
        while lexer.peek_on_line(line).map(|t| t.text) == Some("(") {
            lexer.next_on_line(line);
            let mut group = Vec::new();
            while let Some(t) = lexer.next_on_line(line) {
                if t.text == ")" {
                    break;
                }
                group.push(t.text);
            }
            groups.push(group);
        }
        let suffix = match lexer.peek_on_line(line) {
            Some(t) if t.text.starts_with('_') => {
                lexer.next_on_line(line);
                Some(t.text)
            }
            _ => None,
        };
        Self {
            lexer,
            reflection,
            mnemonic,
            token: tok.text,
            line,
            groups,
            suffix,
        }
    }

    fn missing(&self) -> DecompileError {
        DecompileError::MissingOperand {
            line: self.line,
            mnemonic: self.token.to_owned(),
            expected: self.mnemonic.opcode.operand_count(),
        }
    }

    /// Re-joins one operand that the lexer split apart (`l(...)`, `[r0.x + 1]`, `|x|`).
    fn next_operand(&mut self) -> Option<String> {
        let first = self.lexer.next_on_line(self.line)?;
        let is_list = matches!(first.text, "l" | "d")
            && self.lexer.peek_on_line(self.line).map(|t| t.text) == Some("(");
        if is_list {
            self.lexer.next_on_line(self.line);
            let mut values = Vec::new();
            while let Some(tok) = self.lexer.next_on_line(self.line) {
                if tok.text == ")" {
                    break;
                }
                values.push(tok.text);
            }
            return Some(format!("l({})", values.join(", ")));
        }

        let mut text = first.text.to_owned();
        while !is_balanced(&text) {
            match self.lexer.next_on_line(self.line) {
                Some(tok) => {
                    text.push(' ');
                    text.push_str(tok.text);
                }
                None => break,
            }
        }
        Some(text)
    }

    fn raw(&mut self) -> Result<String> {
        match self.next_operand() {
            Some(text) => Ok(text),
            None => Err(self.missing()),
        }
    }

    /// Maps a register token onto its HLSL name; unknown registers stay as written.
    fn resolve(&self, raw: &str) -> String {
        if raw.starts_with("l(") {
            return raw.to_owned();
        }
        let text = self.rewrite_indexes(raw);
        match self.reflection.query_name(&text) {
            Some(name) => name,
            None => {
                let m = Modifiers::split(&text);
                m.apply(m.body)
            }
        }
    }

    /// `x0[r1.x + 2]` → `x0[asuint(r1.x) + 2]`.
    fn rewrite_indexes(&self, raw: &str) -> String {
        let mut out = String::with_capacity(raw.len());
        let mut rest = raw;
        while let Some(open) = rest.find('[') {
            let Some(close) = rest[open..].find(']').map(|at| open + at) else {
                break;
            };
            out.push_str(&rest[..=open]);
            let parts: Vec<String> = rest[open + 1..close]
                .split_whitespace()
                .map(|part| {
                    if part.starts_with(|c: char| c.is_ascii_alphabetic()) {
                        let name = self
                            .reflection
                            .query_name(part)
                            .unwrap_or_else(|| part.to_owned());
                        format!("asuint({name})")
                    } else {
                        part.to_owned()
                    }
                })
                .collect();
            out.push_str(&parts.join(" "));
            out.push(']');
            rest = &rest[close + 1..];
        }
        out.push_str(rest);
        out
    }

    fn operand(&mut self) -> Result<String> {
        let raw = self.raw()?;
        Ok(self.resolve(&raw))
    }

    fn cast(&self, expr: &str, target: &SwizzleInfo) -> String {
        self.reflection.get_casted_string(expr, target)
    }

    fn src(&mut self, target: &SwizzleInfo) -> Result<String> {
        let expr = self.operand()?;
        Ok(self.cast(&expr, target))
    }

    fn dst(&mut self) -> Result<Dst> {
        let raw = self.raw()?;
        if raw == "null" {
            return Ok(Dst {
                expr: raw,
                info: SwizzleInfo::none(),
                null: true,
            });
        }
        let info = SwizzleInfo::from_expr(&raw);
        let expr = strip_full(self.resolve(&raw));
        Ok(Dst {
            expr,
            info,
            null: false,
        })
    }

    fn resource(&mut self) -> Result<Bound<'a>> {
        let raw = self.raw()?;
        let (base, letters) = split_swizzle(&raw);
        let reflection = self.reflection;
        let info = reflection.texture(&raw).or_else(|| reflection.uav(&raw));
        let name = match info {
            Some(info) => info.expanded_name.clone(),
            None => {
                warn!(line = self.line, register = base, "resource is not declared in the header");
                base.to_owned()
            }
        };
        Ok(Bound {
            name,
            letters: letters.map(str::to_owned),
            info,
        })
    }

    /// Sampler name plus its selector (the gather channel).
    fn sampler(&mut self) -> Result<(String, Option<String>)> {
        let raw = self.raw()?;
        let (base, letters) = split_swizzle(&raw);
        let name = match self.reflection.sampler(&raw) {
            Some(info) => info.expanded_name.clone(),
            None => {
                warn!(line = self.line, register = base, "sampler is not declared in the header");
                base.to_owned()
            }
        };
        Ok((name, letters.map(str::to_owned)))
    }

    fn saturate(&self, rhs: String) -> String {
        if self.mnemonic.saturate {
            format!("saturate({rhs})")
        } else {
            rhs
        }
    }

    /// Applies the resource selector to `call`, then fits it to the destination.
    fn select(&self, call: &str, resource: &Bound<'_>, dst: &Dst) -> String {
        let selected = format!("{call}.{}", resource.selector());
        strip_full(self.cast(&selected, &dst.info))
    }

    /// `_aoffimmi(u,v,w)` as an `intN` offset argument.
    fn immediate_offset(&self, dim: ResourceDimension) -> Option<String> {
        if !self.mnemonic.offset {
            return None;
        }
        let values = self
            .groups
            .iter()
            .find(|g| !g.is_empty() && g.iter().all(|v| v.parse::<i32>().is_ok()))?;
        let n = dim.offset_count();
        let picked: Vec<&str> = (0..n)
            .map(|i| values.get(i).copied().unwrap_or("0"))
            .collect();
        Some(match picked.as_slice() {
            [single] => (*single).to_owned(),
            many => format!("int{n}({})", many.join(", ")),
        })
    }

    fn uint_result(&self) -> bool {
        self.token.contains("_uint") || self.suffix == Some("_uint")
    }

    /// Reads a `{ { a, b, c, d }, ... }` table that may span several lines.
    fn immediate_rows(&mut self) -> Vec<Vec<&'src str>> {
        let mut rows = Vec::new();
        if self.lexer.peek().map(|t| t.text) != Some("{") {
            return rows;
        }
        let mut depth = 0;
        let mut row = Vec::new();
        while let Some(tok) = self.lexer.advance() {
            match tok.text {
                "{" => depth += 1,
                "}" => {
                    depth -= 1;
                    if depth == 1 {
                        rows.push(std::mem::take(&mut row));
                    }
                    if depth <= 0 {
                        self.line = tok.line;
                        break;
                    }
                }
                value if depth >= 2 => row.push(value),
                _ => {}
            }
        }
        rows
    }

    fn finish(self) {
        self.lexer.skip_line(self.line);
    }
}

fn is_balanced(text: &str) -> bool {
    let opens = text.matches('[').count();
    let closes = text.matches(']').count();
    opens == closes && text.matches('|').count() % 2 == 0
}

fn strip_full(expr: String) -> String {
    match expr.strip_suffix(".xyzw") {
        Some(stripped) => stripped.to_owned(),
        None => expr,
    }
}

fn zero_test(nonzero: bool) -> &'static str {
    if nonzero {
        "!="
    } else {
        "=="
    }
}

/// `func(expr)`, except integer literals which are retyped to `scalar` instead.
fn reinterpret(func: &str, scalar: &str, expr: &str) -> String {
    match is_literal(expr) {
        Some(lit) if !lit.has_point => match parse_constructor(expr) {
            Some(ctor) => {
                let width = ctor.width.map(|w| w.to_string()).unwrap_or_default();
                format!("{scalar}{width}({})", ctor.args.join(", "))
            }
            None => expr.to_owned(),
        },
        _ => format!("{func}({expr})"),
    }
}

fn as_uint(expr: &str) -> String {
    reinterpret("asuint", "uint", expr)
}

fn as_int(expr: &str) -> String {
    reinterpret("asint", "int", expr)
}

fn typed(scalar: &str, count: usize) -> String {
    match count {
        0 => format!("{scalar}4"),
        1 => scalar.to_owned(),
        n => format!("{scalar}{n}"),
    }
}

fn negate(expr: &str) -> String {
    match expr.strip_prefix('-') {
        Some(positive) => positive.to_owned(),
        None => format!("-{expr}"),
    }
}

fn is_integer_type(ty: &str) -> bool {
    ["uint", "int", "min16uint", "min16int"]
        .iter()
        .any(|prefix| ty.starts_with(prefix))
}

/// Component count of a resource element format (`float4` → 4, `uint` → 1).
fn format_width(format: &str) -> usize {
    format
        .chars()
        .last()
        .and_then(|c| c.to_digit(10))
        .map(|d| d as usize)
        .filter(|d| (1..=4).contains(d))
        .unwrap_or(1)
}

fn gradient_count(dim: ResourceDimension) -> usize {
    match dim {
        ResourceDimension::Texture1D | ResourceDimension::Texture1DArray => 1,
        ResourceDimension::Texture3D
        | ResourceDimension::TextureCube
        | ResourceDimension::TextureCubeArray => 3,
        _ => 2,
    }
}

fn shift_letter(c: char, delta: u32) -> char {
    let index = component_index(c).unwrap_or(0) as u32 + delta;
    COMPONENTS[index.min(3) as usize]
}

fn decode_mov(r: &mut InstrReader<'_, '_>, ctx: &mut DecoderContext) -> Result<()> {
    let dst = r.dst()?;
    let src = r.src(&dst.info)?;
    ctx.assign(&dst, r.saturate(src));
    Ok(())
}

fn decode_movc(r: &mut InstrReader<'_, '_>, ctx: &mut DecoderContext) -> Result<()> {
    let dst = r.dst()?;
    let cond = r.operand()?;
    let a = r.operand()?;
    let b = r.operand()?;
    match dst.lanes() {
        None => {
            let rhs = format!(
                "({} != 0) ? {} : {}",
                r.cast(&cond, &dst.info),
                r.cast(&a, &dst.info),
                r.cast(&b, &dst.info)
            );
            ctx.assign(&dst, r.saturate(rhs));
        }
        Some((base, letters)) => {
            for (i, lane) in letters.iter().enumerate() {
                let info = dst.info.lane(i);
                let rhs = format!(
                    "({} != 0) ? {} : {}",
                    r.cast(&cond, &info),
                    r.cast(&a, &info),
                    r.cast(&b, &info)
                );
                ctx.emit(format!("{base}.{lane} = {};", r.saturate(rhs)));
            }
        }
    }
    Ok(())
}

fn decode_binary(
    r: &mut InstrReader<'_, '_>,
    ctx: &mut DecoderContext,
    op: BinaryOp,
) -> Result<()> {
    let dst = r.dst()?;
    let a = r.src(&dst.info)?;
    let b = r.src(&dst.info)?;
    let rhs = match op {
        BinaryOp::Add => match b.strip_prefix('-') {
            Some(subtrahend) => format!("{a} - {subtrahend}"),
            None => format!("{a} + {b}"),
        },
        BinaryOp::Mul => format!("{a} * {b}"),
        BinaryOp::Div => format!("{a} / {b}"),
    };
    ctx.assign(&dst, r.saturate(rhs));
    Ok(())
}

fn decode_mad(
    r: &mut InstrReader<'_, '_>,
    ctx: &mut DecoderContext,
    kind: NumericKind,
) -> Result<()> {
    let dst = r.dst()?;
    let a = r.src(&dst.info)?;
    let b = r.src(&dst.info)?;
    let c = r.src(&dst.info)?;
    let rhs = match kind {
        NumericKind::Float => format!("mad({a}, {b}, {c})"),
        NumericKind::Int | NumericKind::Uint => format!("{a} * {b} + {c}"),
    };
    ctx.assign(&dst, r.saturate(rhs));
    Ok(())
}

/// Only the low half of `imul`/`umul` has an HLSL spelling.
fn decode_wide_mul(r: &mut InstrReader<'_, '_>, ctx: &mut DecoderContext) -> Result<()> {
    let hi = r.dst()?;
    let lo = r.dst()?;
    let target = if lo.null { hi.info } else { lo.info };
    let a = r.src(&target)?;
    let b = r.src(&target)?;
    if !hi.null {
        warn!(line = r.line, "high half of a 64-bit product is not reconstructed");
    }
    ctx.assign(&lo, r.saturate(format!("{a} * {b}")));
    Ok(())
}

fn decode_udiv(r: &mut InstrReader<'_, '_>, ctx: &mut DecoderContext) -> Result<()> {
    let quotient = r.dst()?;
    let remainder = r.dst()?;
    let a = r.operand()?;
    let b = r.operand()?;
    for (dst, op) in [(&quotient, "/"), (&remainder, "%")] {
        if dst.null {
            continue;
        }
        let lhs = as_uint(&r.cast(&a, &dst.info));
        let rhs = as_uint(&r.cast(&b, &dst.info));
        ctx.assign(dst, format!("asfloat({lhs} {op} {rhs})"));
    }
    Ok(())
}

fn decode_negate(r: &mut InstrReader<'_, '_>, ctx: &mut DecoderContext) -> Result<()> {
    let dst = r.dst()?;
    let a = r.src(&dst.info)?;
    let rhs = match is_literal(&a) {
        Some(_) => negate(&a),
        None => format!("asfloat(-asint({a}))"),
    };
    ctx.assign(&dst, rhs);
    Ok(())
}

fn decode_dot(
    r: &mut InstrReader<'_, '_>,
    ctx: &mut DecoderContext,
    components: u8,
) -> Result<()> {
    let dst = r.dst()?;
    let target = SwizzleInfo::identity(components as usize);
    let a = r.src(&target)?;
    let b = r.src(&target)?;
    ctx.assign(&dst, r.saturate(format!("dot({a}, {b})")));
    Ok(())
}

fn decode_intrinsic(
    r: &mut InstrReader<'_, '_>,
    ctx: &mut DecoderContext,
    name: &str,
    args: u8,
) -> Result<()> {
    let dst = r.dst()?;
    let mut values = Vec::with_capacity(args as usize);
    for _ in 0..args {
        values.push(r.src(&dst.info)?);
    }
    ctx.assign(&dst, r.saturate(format!("{name}({})", values.join(", "))));
    Ok(())
}

fn decode_compare(
    r: &mut InstrReader<'_, '_>,
    ctx: &mut DecoderContext,
    symbol: &str,
    kind: NumericKind,
) -> Result<()> {
    let dst = r.dst()?;
    let a = r.operand()?;
    let b = r.operand()?;
    let (one, zero) = kind.bool_values();
    match dst.lanes() {
        None => {
            let lhs = r.cast(&a, &dst.info);
            let rhs = r.cast(&b, &dst.info);
            ctx.assign(&dst, format!("({lhs} {symbol} {rhs}) ? {one} : {zero}"));
        }
        Some((base, letters)) => {
            for (i, lane) in letters.iter().enumerate() {
                let info = dst.info.lane(i);
                let lhs = r.cast(&a, &info);
                let rhs = r.cast(&b, &info);
                ctx.emit(format!(
                    "{base}.{lane} = ({lhs} {symbol} {rhs}) ? {one} : {zero};"
                ));
            }
        }
    }
    Ok(())
}

fn decode_logic(r: &mut InstrReader<'_, '_>, ctx: &mut DecoderContext, op: LogicOp) -> Result<()> {
    let dst = r.dst()?;
    let a = r.src(&dst.info)?;
    let b = r.src(&dst.info)?;
    if dst.null {
        return Ok(());
    }
    let ty = typed("uint", dst.info.count);
    ctx.emit_block(&[
        format!("{ty} lhs_ = {};", as_uint(&a)),
        format!("{ty} rhs_ = {};", as_uint(&b)),
        format!("{} = asfloat(lhs_ {} rhs_);", dst.expr, op.symbol()),
    ]);
    Ok(())
}

fn decode_not(r: &mut InstrReader<'_, '_>, ctx: &mut DecoderContext) -> Result<()> {
    let dst = r.dst()?;
    let a = r.src(&dst.info)?;
    ctx.assign(&dst, format!("asfloat(~{})", as_uint(&a)));
    Ok(())
}

fn decode_shift(
    r: &mut InstrReader<'_, '_>,
    ctx: &mut DecoderContext,
    op: ShiftOp,
    kind: NumericKind,
) -> Result<()> {
    let dst = r.dst()?;
    let a = r.src(&dst.info)?;
    let b = r.src(&dst.info)?;
    let value = match kind {
        NumericKind::Uint => as_uint(&a),
        NumericKind::Int | NumericKind::Float => as_int(&a),
    };
    let symbol = match op {
        ShiftOp::Left => "<<",
        ShiftOp::Right => ">>",
    };
    ctx.assign(&dst, format!("asfloat({value} {symbol} {})", as_uint(&b)));
    Ok(())
}

fn decode_convert(
    r: &mut InstrReader<'_, '_>,
    ctx: &mut DecoderContext,
    conversion: Conversion,
) -> Result<()> {
    let dst = r.dst()?;
    let a = r.src(&dst.info)?;
    let literal = is_literal(&a);
    let rhs = match conversion {
        Conversion::FloatToInt | Conversion::FloatToUint
            if literal.as_ref().is_some_and(|l| l.has_point) =>
        {
            a
        }
        Conversion::IntToFloat | Conversion::UintToFloat
            if literal.as_ref().is_some_and(|l| !l.has_point) =>
        {
            a
        }
        Conversion::FloatToInt => format!("asint({a})"),
        Conversion::FloatToUint => format!("asuint({a})"),
        Conversion::IntToFloat | Conversion::UintToFloat => format!("asfloat({a})"),
    };
    ctx.assign(&dst, r.saturate(rhs));
    Ok(())
}

fn decode_sincos(r: &mut InstrReader<'_, '_>, ctx: &mut DecoderContext) -> Result<()> {
    let sin = r.dst()?;
    let cos = r.dst()?;
    let src = r.operand()?;
    for (dst, func) in [(&sin, "sin"), (&cos, "cos")] {
        if dst.null {
            continue;
        }
        let arg = r.cast(&src, &dst.info);
        ctx.assign(dst, r.saturate(format!("{func}({arg})")));
    }
    Ok(())
}

fn decode_conditional(
    r: &mut InstrReader<'_, '_>,
    ctx: &mut DecoderContext,
    nonzero: bool,
    statement: &str,
) -> Result<()> {
    let cond = r.src(&SwizzleInfo::none())?;
    ctx.emit(format!("if ({cond} {} 0) {statement}", zero_test(nonzero)));
    Ok(())
}

fn decode_sample(
    r: &mut InstrReader<'_, '_>,
    ctx: &mut DecoderContext,
    op: SampleOp,
) -> Result<()> {
    let dst = r.dst()?;
    let coord = r.operand()?;
    let tex = r.resource()?;
    let (sampler, _) = r.sampler()?;
    let dim = tex.dimension();

    let mut args = vec![sampler, r.cast(&coord, &SwizzleInfo::identity(dim.coord_count()))];
    match op {
        SampleOp::Sample => {}
        SampleOp::Level | SampleOp::Bias | SampleOp::Compare | SampleOp::CompareLevelZero => {
            args.push(r.src(&SwizzleInfo::identity(1))?);
        }
        SampleOp::Gradient => {
            let gradient = SwizzleInfo::identity(gradient_count(dim));
            args.push(r.src(&gradient)?);
            args.push(r.src(&gradient)?);
        }
    }
    if let Some(offset) = r.immediate_offset(dim) {
        args.push(offset);
    }

    let call = format!("{}.{}({})", tex.name, op.method(), args.join(", "));
    let rhs = match op {
        SampleOp::Compare | SampleOp::CompareLevelZero => call,
        _ => r.select(&call, &tex, &dst),
    };
    ctx.assign(&dst, r.saturate(rhs));
    Ok(())
}

fn decode_gather(
    r: &mut InstrReader<'_, '_>,
    ctx: &mut DecoderContext,
    compare: bool,
    programmable_offset: bool,
) -> Result<()> {
    let dst = r.dst()?;
    let coord = r.operand()?;
    let offset = if programmable_offset {
        Some(r.operand()?)
    } else {
        None
    };
    let tex = r.resource()?;
    let (sampler, channel) = r.sampler()?;
    let dim = tex.dimension();

    let channel = match channel.as_deref().and_then(|l| l.chars().next()) {
        Some('y') => "Green",
        Some('z') => "Blue",
        Some('w') => "Alpha",
        _ => "",
    };
    let method = format!("Gather{}{channel}", if compare { "Cmp" } else { "" });

    let mut args = vec![sampler, r.cast(&coord, &SwizzleInfo::identity(dim.coord_count()))];
    if compare {
        args.push(r.src(&SwizzleInfo::identity(1))?);
    }
    match offset {
        Some(offset) => {
            let offset = r.cast(&offset, &SwizzleInfo::identity(dim.offset_count()));
            args.push(as_int(&offset));
        }
        None => args.extend(r.immediate_offset(dim)),
    }

    let call = format!("{}.{method}({})", tex.name, args.join(", "));
    ctx.assign(&dst, r.select(&call, &tex, &dst));
    Ok(())
}

fn decode_ld(
    r: &mut InstrReader<'_, '_>,
    ctx: &mut DecoderContext,
    multisample: bool,
) -> Result<()> {
    let dst = r.dst()?;
    let coord = r.operand()?;
    let tex = r.resource()?;
    let dim = tex.dimension();

    let has_mip = !(dim == ResourceDimension::Buffer || dim.is_multisampled());
    let count = (dim.coord_count() + usize::from(has_mip)).min(4);
    let mut args = vec![as_int(&r.cast(&coord, &SwizzleInfo::identity(count)))];
    if multisample {
        args.push(as_int(&r.src(&SwizzleInfo::identity(1))?));
    }
    if let Some(offset) = r.immediate_offset(dim) {
        args.push(offset);
    }

    let call = format!("{}.Load({})", tex.name, args.join(", "));
    ctx.assign(&dst, r.saturate(r.select(&call, &tex, &dst)));
    Ok(())
}

fn decode_resinfo(r: &mut InstrReader<'_, '_>, ctx: &mut DecoderContext) -> Result<()> {
    let dst = r.dst()?;
    let mip = r.src(&SwizzleInfo::identity(1))?;
    let tex = r.resource()?;
    match tex.dimension().helper_kind() {
        Some(kind) => ctx.helpers |= kind,
        None => warn!(
            line = r.line,
            dimension = ?tex.dimension(),
            "resinfo on a resource without a GetResourceInfo overload"
        ),
    }

    let mut call = format!("GetResourceInfo({}, {})", tex.name, as_uint(&mip));
    if r.uint_result() {
        call = format!("asfloat(uint4({call}))");
    }
    ctx.assign(&dst, r.select(&call, &tex, &dst));
    Ok(())
}

fn decode_lod(r: &mut InstrReader<'_, '_>, ctx: &mut DecoderContext) -> Result<()> {
    let dst = r.dst()?;
    let coord = r.operand()?;
    let tex = r.resource()?;
    let (sampler, _) = r.sampler()?;
    let coord = r.cast(&coord, &SwizzleInfo::identity(tex.dimension().coord_count()));
    ctx.assign(
        &dst,
        format!("{}.CalculateLevelOfDetail({sampler}, {coord})", tex.name),
    );
    Ok(())
}

fn raw_method(verb: &str, count: usize) -> String {
    match count {
        0 | 1 => verb.to_owned(),
        n => format!("{verb}{n}"),
    }
}

fn decode_ld_raw(r: &mut InstrReader<'_, '_>, ctx: &mut DecoderContext) -> Result<()> {
    let dst = r.dst()?;
    let offset = as_uint(&r.src(&SwizzleInfo::identity(1))?);
    let buffer = r.resource()?;
    let method = raw_method("Load", dst.info.count);
    ctx.assign(
        &dst,
        r.saturate(format!("asfloat({}.{method}({offset}))", buffer.name)),
    );
    Ok(())
}

fn decode_store_raw(r: &mut InstrReader<'_, '_>, ctx: &mut DecoderContext) -> Result<()> {
    let buffer = r.resource()?;
    let offset = as_uint(&r.src(&SwizzleInfo::identity(1))?);
    let count = buffer.letters.as_ref().map_or(1, |l| l.len());
    let value = as_uint(&r.src(&SwizzleInfo::identity(count))?);
    let method = raw_method("Store", count);
    ctx.emit(format!("{}.{method}({offset}, {value});", buffer.name));
    Ok(())
}

/// Structure member a structured-buffer byte offset lands in.
struct MemberAccess {
    name: String,
    type_name: String,
    /// Components between the member start and the offset.
    delta: u32,
}

fn structured_member(
    reflection: &Reflection,
    buffer: &Bound<'_>,
    offset: &str,
) -> Option<MemberAccess> {
    let element = buffer.info?.element_type.as_deref()?;
    let structure = reflection.structure(element)?;
    let offset: u32 = offset.parse().ok()?;
    let member = structure
        .members
        .iter()
        .filter(|m| m.offset <= offset)
        .last()?;
    Some(MemberAccess {
        name: member.name.clone(),
        type_name: member.type_name.clone(),
        delta: (offset - member.offset) / 4,
    })
}

fn decode_ld_structured(r: &mut InstrReader<'_, '_>, ctx: &mut DecoderContext) -> Result<()> {
    let dst = r.dst()?;
    let index = as_uint(&r.src(&SwizzleInfo::identity(1))?);
    let offset = r.src(&SwizzleInfo::identity(1))?;
    let buffer = r.resource()?;

    let rhs = match structured_member(r.reflection, &buffer, &offset) {
        Some(member) => {
            let access = format!("{}[{index}].{}", buffer.name, member.name);
            let value = if TypeShape::parse(&member.type_name, false).elements == 1 {
                access
            } else {
                let letters: String = buffer
                    .selector()
                    .chars()
                    .map(|c| shift_letter(c, member.delta))
                    .collect();
                strip_full(r.cast(&format!("{access}.{letters}"), &dst.info))
            };
            if is_integer_type(&member.type_name) {
                format!("asfloat({value})")
            } else {
                value
            }
        }
        None => {
            debug!(line = r.line, %offset, "structured load without a member layout");
            r.select(&format!("{}[{index}]", buffer.name), &buffer, &dst)
        }
    };
    ctx.assign(&dst, r.saturate(rhs));
    Ok(())
}

fn decode_store_structured(r: &mut InstrReader<'_, '_>, ctx: &mut DecoderContext) -> Result<()> {
    let buffer = r.resource()?;
    let index = as_uint(&r.src(&SwizzleInfo::identity(1))?);
    let offset = r.src(&SwizzleInfo::identity(1))?;
    let mask = buffer
        .letters
        .as_deref()
        .and_then(SwizzleInfo::from_letters)
        .unwrap_or_else(|| SwizzleInfo::identity(1));
    let value = r.src(&mask)?;

    let (target, value) = match structured_member(r.reflection, &buffer, &offset) {
        Some(member) => {
            let mut target = format!("{}[{index}].{}", buffer.name, member.name);
            if TypeShape::parse(&member.type_name, false).elements > 1 {
                target.push('.');
                target.extend(
                    mask.letters()
                        .chars()
                        .map(|c| shift_letter(c, member.delta)),
                );
            }
            let value = if member.type_name.starts_with("uint") {
                as_uint(&value)
            } else if is_integer_type(&member.type_name) {
                as_int(&value)
            } else {
                value
            };
            (target, value)
        }
        None => {
            debug!(line = r.line, %offset, "structured store without a member layout");
            (format!("{}[{index}]", buffer.name), value)
        }
    };
    ctx.emit(format!("{target} = {value};"));
    Ok(())
}

fn decode_ld_uav_typed(r: &mut InstrReader<'_, '_>, ctx: &mut DecoderContext) -> Result<()> {
    let dst = r.dst()?;
    let coord = r.operand()?;
    let uav = r.resource()?;
    let coord = as_uint(&r.cast(&coord, &SwizzleInfo::identity(uav.dimension().coord_count())));

    let access = format!("{}[{coord}]", uav.name);
    let value = if format_width(uav.format()) > 1 {
        r.select(&access, &uav, &dst)
    } else {
        access
    };
    let rhs = if is_integer_type(uav.format()) {
        format!("asfloat({value})")
    } else {
        value
    };
    ctx.assign(&dst, r.saturate(rhs));
    Ok(())
}

fn decode_store_uav_typed(r: &mut InstrReader<'_, '_>, ctx: &mut DecoderContext) -> Result<()> {
    let uav = r.resource()?;
    let coord = as_uint(&r.src(&SwizzleInfo::identity(uav.dimension().coord_count()))?);
    let width = format_width(uav.format());
    let value = r.src(&SwizzleInfo::identity(width))?;
    let value = if uav.format().starts_with("uint") {
        as_uint(&value)
    } else if is_integer_type(uav.format()) {
        as_int(&value)
    } else {
        value
    };
    ctx.emit(format!("{}[{coord}] = {value};", uav.name));
    Ok(())
}

fn decode_atomic(
    r: &mut InstrReader<'_, '_>,
    ctx: &mut DecoderContext,
    op: AtomicOp,
    immediate: bool,
) -> Result<()> {
    let dst = if immediate { Some(r.dst()?) } else { None };
    let uav = r.resource()?;

    if matches!(op, AtomicOp::Alloc | AtomicOp::Consume) {
        if let Some(dst) = &dst {
            ctx.assign(dst, format!("asfloat({}.{}())", uav.name, op.intrinsic()));
        }
        return Ok(());
    }

    let address = r.operand()?;
    let value_count = match op {
        AtomicOp::CompareStore | AtomicOp::CompareExchange => 2,
        _ => 1,
    };
    let mut args = Vec::with_capacity(value_count + 1);
    for _ in 0..value_count {
        args.push(as_uint(&r.src(&SwizzleInfo::identity(1))?));
    }
    if immediate {
        args.push("original_".to_owned());
    }

    let byte_address = uav.info.is_some_and(|info| info.format == "byte");
    let call = if byte_address {
        let address = as_uint(&r.cast(&address, &SwizzleInfo::identity(1)));
        format!("{}.{}({address}, {})", uav.name, op.intrinsic(), args.join(", "))
    } else {
        let count = uav.dimension().coord_count();
        let address = as_uint(&r.cast(&address, &SwizzleInfo::identity(count)));
        format!(
            "{}({}[{address}], {})",
            op.intrinsic(),
            uav.name,
            args.join(", ")
        )
    };

    match dst {
        Some(dst) => {
            let mut lines = vec!["uint original_;".to_owned(), format!("{call};")];
            if !dst.null {
                lines.push(format!("{} = asfloat(original_);", dst.expr));
            }
            ctx.emit_block(&lines);
        }
        None => ctx.emit(format!("{call};")),
    }
    Ok(())
}

fn decode_sync(ctx: &mut DecoderContext, flags: SyncFlags) {
    ctx.emit(format!("{}();", flags.intrinsic()));
}

fn decode_dcl_temps(r: &mut InstrReader<'_, '_>, ctx: &mut DecoderContext) -> Result<()> {
    let count = r.raw()?;
    let count: u32 = count.parse().unwrap_or_else(|_| {
        warn!(line = r.line, %count, "unreadable temporary register count");
        0
    });
    for i in 0..count {
        ctx.emit(format!("float4 r{i};"));
    }
    ctx.emit("");
    Ok(())
}

fn decode_dcl_indexable_temp(
    r: &mut InstrReader<'_, '_>,
    ctx: &mut DecoderContext,
) -> Result<()> {
    let array = r.raw()?;
    let components = r.raw()?.parse::<usize>().unwrap_or(4).clamp(1, 4);
    ctx.emit(format!("{} {array};", typed("float", components)));
    Ok(())
}

fn decode_dcl_thread_group(r: &mut InstrReader<'_, '_>, ctx: &mut DecoderContext) -> Result<()> {
    let mut dims = [1u32; 3];
    for dim in &mut dims {
        *dim = r.raw()?.parse().unwrap_or(1);
    }
    ctx.thread_group = Some(dims);
    Ok(())
}

fn decode_dcl_icb(r: &mut InstrReader<'_, '_>, ctx: &mut DecoderContext) {
    let rows = r.immediate_rows();
    if rows.is_empty() {
        warn!(line = r.line, "empty immediate constant buffer");
        return;
    }
    ctx.emit(format!("static const float4 icb[{}] =", rows.len()));
    ctx.emit("{");
    let last = rows.len() - 1;
    for (i, row) in rows.iter().enumerate() {
        let values: Vec<&str> = (0..4).map(|c| row.get(c).copied().unwrap_or("0")).collect();
        let separator = if i == last { "" } else { "," };
        ctx.emit(format!("    float4({}){separator}", values.join(", ")));
    }
    ctx.emit("};");
}

fn decode_dcl_input(r: &mut InstrReader<'_, '_>, ctx: &mut DecoderContext) -> Result<()> {
    let register = r.raw()?;
    if let Some(builtin) = builtin_input(&register) {
        if !ctx.builtin_params.iter().any(|p| p == builtin.param) {
            ctx.builtin_params.push(builtin.param.to_owned());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflection::{
        ConstantBuffer, MatrixLayout, Resource, ResourceKind, Signature, Structure, Variable,
    };
    use pretty_assertions::assert_eq;

    fn decode_with(reflection: &Reflection, source: &str) -> DecodedProgram {
        decode_program(source, reflection).expect("decode")
    }

    fn body(source: &str) -> Vec<String> {
        decode_with(&Reflection::new(), &format!("ps_4_0\n{source}")).statements
    }

    fn resource(name: &str, kind: ResourceKind, format: &str, dim: &str, bind: &str) -> Resource {
        Resource {
            name: name.to_owned(),
            kind,
            format: format.to_owned(),
            dimension: dim.to_owned(),
            bind: bind.to_owned(),
            count: 1,
        }
    }

    fn member(type_name: &str, name: &str, offset: u32, size: u32) -> Variable {
        Variable {
            type_name: type_name.to_owned(),
            name: name.to_owned(),
            offset,
            size,
            layout: MatrixLayout::Default,
        }
    }

    #[test]
    fn structured_control_flow() {
        let src = "\
dcl_temps 1
if_nz r0.x
  mov r1.x, r0.y
else
  mov r1.x, l(1.000000)
endif
loop
  breakc_nz r0.z
  add r0.z, r0.z, -r0.w
endloop
ret
";
        let program = decode_with(&Reflection::new(), &format!("ps_4_0\n{src}"));
        assert_eq!(
            program.statements,
            vec![
                "float4 r0;",
                "",
                "if (r0.x != 0)",
                "{",
                "    r1.x = r0.y;",
                "}",
                "else",
                "{",
                "    r1.x = 1.000000;",
                "}",
                "while (true)",
                "{",
                "    if (r0.z != 0) break;",
                "    r0.z = r0.z - r0.w;",
                "}",
            ]
        );
        assert_eq!(program.final_depth, 0);
    }

    #[test]
    fn switch_cases_share_a_level() {
        let src = "\
switch r0.x
case l(0)
case l(1)
  mov r1.x, l(2.000000)
  break
default
  mov r1.x, l(0)
  break
endswitch
";
        assert_eq!(
            body(src),
            vec![
                "switch (asint(r0.x))",
                "{",
                "    case 0:",
                "    case 1:",
                "        r1.x = 2.000000;",
                "        break;",
                "    default:",
                "        r1.x = 0;",
                "        break;",
                "}",
            ]
        );
    }

    fn with_target_output() -> Reflection {
        let mut r = Reflection::new();
        r.add_output_signature(Signature::new("SV_Target", 0, "xyzw", "0", "TARGET", "float", "xyzw"));
        r.resolve();
        r
    }

    #[test]
    fn ret_inside_a_block_returns_output() {
        let r = with_target_output();
        let program = decode_with(&r, "ps_4_0\nif_z r0.x\nret\nendif\nret\n");
        assert_eq!(
            program.statements,
            vec!["if (r0.x == 0)", "{", "    return output;", "}"]
        );
    }

    #[test]
    fn conditional_returns_match_the_entry_signature() {
        let src = "ps_5_0\nretc_nz r0.x\nmov r0.x, r1.x\nret\n";
        assert_eq!(
            decode_with(&with_target_output(), src).statements,
            vec!["if (r0.x != 0) return output;", "r0.x = r1.x;"]
        );
        assert_eq!(
            decode_with(&Reflection::new(), src).statements,
            vec!["if (r0.x != 0) return;", "r0.x = r1.x;"]
        );
        let compute = "cs_5_0\nretc_z r0.x\n";
        assert_eq!(
            decode_with(&with_target_output(), compute).statements,
            vec!["if (r0.x == 0) return;"]
        );
    }

    #[test]
    fn unbalanced_blocks_are_reported() {
        let program = decode_with(&Reflection::new(), "vs_4_0\nif_nz r0.x\nmov r0.x, r1.x\n");
        assert_eq!(program.final_depth, 1);
    }

    #[test]
    fn comparisons_expand_per_lane() {
        assert_eq!(
            body("lt r0.xy, r1.xyxx, l(0.000000, 0.500000, 0.000000, 0.000000)"),
            vec![
                "r0.x = (r1.x < 0.000000) ? 1.0 : 0.0;",
                "r0.y = (r1.y < 0.500000) ? 1.0 : 0.0;",
            ]
        );
        assert_eq!(
            body("ieq r0.x, r1.x, l(3)"),
            vec!["r0.x = (r1.x == 3) ? 1 : 0;"]
        );
        assert_eq!(
            body("movc r0.x, r1.x, r2.x, l(0)"),
            vec!["r0.x = (r1.x != 0) ? r2.x : 0;"]
        );
    }

    #[test]
    fn bitwise_ops_reinterpret() {
        assert_eq!(
            body("and r0.xy, r1.xyxx, l(0x3f800000, 0x3f800000, 0, 0)"),
            vec![
                "{",
                "    uint2 lhs_ = asuint(r1.xy);",
                "    uint2 rhs_ = uint2(0x3f800000, 0x3f800000);",
                "    r0.xy = asfloat(lhs_ & rhs_);",
                "}",
            ]
        );
        assert_eq!(
            body("ushr r0.x, r1.x, l(16)"),
            vec!["r0.x = asfloat(asuint(r1.x) >> 16);"]
        );
        assert!(body("and null, r1.x, l(1)").is_empty());
        assert_eq!(body("ftoi r0.x, r1.x"), vec!["r0.x = asint(r1.x);"]);
        assert_eq!(body("itof r0.x, l(3)"), vec!["r0.x = 3;"]);
    }

    #[test]
    fn arithmetic_forms() {
        assert_eq!(
            body("mul_sat r0.xyz, r1.xyzx, r2.xyzx"),
            vec!["r0.xyz = saturate(r1.xyz * r2.xyz);"]
        );
        assert_eq!(
            body("dp3 r0.x, r1.xyzx, r2.xyzx"),
            vec!["r0.x = dot(r1.xyz, r2.xyz);"]
        );
        assert_eq!(
            body("mad r0.xy, r1.xyxx, r2.xyxx, r3.xyxx"),
            vec!["r0.xy = mad(r1.xy, r2.xy, r3.xy);"]
        );
        assert_eq!(body("rsq r0.x, r0.x"), vec!["r0.x = rsqrt(r0.x);"]);
        assert_eq!(
            body("sincos null, r1.x, r0.x"),
            vec!["r1.x = cos(r0.x);"]
        );
        assert_eq!(
            body("udiv r0.x, null, r1.x, l(3)"),
            vec!["r0.x = asfloat(asuint(r1.x) / 3);"]
        );
    }

    #[test]
    fn constant_buffer_sources_fit_offset_destinations() {
        let mut r = Reflection::new();
        r.add_resource(resource("Globals", ResourceKind::ConstantBuffer, "NA", "NA", "cb0"));
        r.add_constant_buffer(ConstantBuffer {
            name: "Globals".to_owned(),
            variables: vec![member("float2", "uvScale", 16, 8), member("float3", "albedo", 32, 12)],
        });
        r.resolve();
        let program = decode_with(
            &r,
            "ps_4_0\n\
             mul r0.zw, r1.xxxy, cb0[1].xxxy\n\
             mov r0.yzw, cb0[2].xxyz\n",
        );
        assert_eq!(
            program.statements,
            vec!["r0.zw = r1.xy * uvScale.xy;", "r0.yzw = albedo.xyz;"]
        );
    }

    #[test]
    fn dynamic_indexes_are_reinterpreted() {
        assert_eq!(
            body("dcl_indexableTemp x0[4], 4\nmov r0.xyzw, x0[r1.x + 2].xyzw"),
            vec!["float4 x0[4];", "r0 = x0[asuint(r1.x) + 2].xyzw;"]
        );
    }

    #[test]
    fn immediate_constant_buffer_spans_lines() {
        let src = "\
dcl_immediateConstantBuffer { { 1.000000, 0, 0, 0},
                              { 0, 1.000000, 0, 0} }
mov r0.x, l(1.0)
";
        assert_eq!(
            body(src),
            vec![
                "static const float4 icb[2] =",
                "{",
                "    float4(1.000000, 0, 0, 0),",
                "    float4(0, 1.000000, 0, 0)",
                "};",
                "r0.x = 1.0;",
            ]
        );
    }

    #[test]
    fn unknown_mnemonics_skip_their_line() {
        assert_eq!(
            body("frobnicate r0.x, r1.x\nmov r0.x, r1.x"),
            vec!["r0.x = r1.x;"]
        );
    }

    #[test]
    fn short_operand_lists_fail() {
        let err = decode_program("vs_4_0\nadd r0.x, r1.x\n", &Reflection::new()).unwrap_err();
        assert_eq!(
            err,
            DecompileError::MissingOperand {
                line: 2,
                mnemonic: "add".to_owned(),
                expected: 3
            }
        );
        assert_eq!(
            decode_program("mov r0.x, r1.x\n", &Reflection::new()).unwrap_err(),
            DecompileError::MissingShaderProfile
        );
    }

    fn textured() -> Reflection {
        let mut r = Reflection::new();
        r.add_resource(resource("linearSampler", ResourceKind::Sampler, "NA", "NA", "s0"));
        r.add_resource(resource("diffuse", ResourceKind::Texture, "float4", "2d", "t0"));
        r.resolve();
        r
    }

    #[test]
    fn sampling_uses_resolved_names() {
        let r = textured();
        let program = decode_with(
            &r,
            "ps_4_0\n\
             sample r0.xyzw, v1.xyxx, t0.xyzw, s0\n\
             sample_l_aoffimmi(1,-1,0) r1.xy, v1.xyxx, t0.xyzw, s0, l(0.000000)\n\
             gather4 r2.xyzw, v1.xyxx, t0.xyzw, s0.y\n",
        );
        assert_eq!(
            program.statements,
            vec![
                "r0 = diffuse.Sample(linearSampler, v1.xy);",
                "r1.xy = diffuse.SampleLevel(linearSampler, v1.xy, 0.000000, int2(1, -1)).xy;",
                "r2 = diffuse.GatherGreen(linearSampler, v1.xy);",
            ]
        );
    }

    #[test]
    fn texel_loads_and_size_queries() {
        let r = textured();
        let program = decode_with(
            &r,
            "ps_4_0\n\
             ld_indexable(texture2d)(float,float,float,float) r0.xyzw, r1.xyzw, t0.xyzw\n\
             resinfo_indexable(texture2d)(float,float,float,float)_uint r2.xy, l(0), t0.xyzw\n",
        );
        assert_eq!(
            program.statements,
            vec![
                "r0 = diffuse.Load(asint(r1.xyz));",
                "r2.xy = asfloat(uint4(GetResourceInfo(diffuse, 0))).xy;",
            ]
        );
        assert_eq!(program.helpers, TextureKinds::TEXTURE_2D);
    }

    fn compute_reflection() -> Reflection {
        let mut r = Reflection::new();
        r.add_structure(Structure {
            name: "Particle".to_owned(),
            members: vec![member("float3", "position", 0, 12), member("float", "life", 12, 4)],
        });
        r.add_uav_struct_pair("particles", "Particle");
        r.add_resource(resource("particles", ResourceKind::Uav, "struct", "r/w", "u0"));
        r.add_resource(resource("counters", ResourceKind::Uav, "byte", "r/w", "u2"));
        r.resolve();
        r
    }

    #[test]
    fn structured_buffers_access_members() {
        let r = compute_reflection();
        let program = decode_with(
            &r,
            "cs_5_0\n\
             dcl_input vThreadID.x\n\
             dcl_thread_group 64, 1, 1\n\
             ld_structured_indexable(structured_buffer, stride=16)(mixed,mixed,mixed,mixed) r0.x, vThreadID.x, l(12), u0.xxxx\n\
             store_structured u0.xyz, vThreadID.x, l(0), r1.xyzx\n\
             sync_g_t\n\
             ret\n",
        );
        assert_eq!(
            program.statements,
            vec![
                "r0.x = particles[asuint(dispatchId.x)].life;",
                "particles[asuint(dispatchId.x)].position.xyz = r1.xyz;",
                "GroupMemoryBarrierWithGroupSync();",
            ]
        );
        assert_eq!(program.thread_group, Some([64, 1, 1]));
        assert_eq!(
            program.builtin_params,
            vec!["uint3 dispatchId : SV_DispatchThreadID".to_owned()]
        );
        assert_eq!(program.stage, ShaderStage::Compute);
    }

    #[test]
    fn atomics_capture_the_original_value() {
        let r = compute_reflection();
        let program = decode_with(
            &r,
            "cs_5_0\n\
             imm_atomic_iadd r0.x, u2, l(0), l(1)\n\
             atomic_or u2, l(4), r1.x\n",
        );
        assert_eq!(
            program.statements,
            vec![
                "{",
                "    uint original_;",
                "    counters.InterlockedAdd(0, 1, original_);",
                "    r0.x = asfloat(original_);",
                "}",
                "counters.InterlockedOr(4, asuint(r1.x));",
            ]
        );
    }
}
