//! Shape helpers for the textual operand expressions the decoder builds up.
//!
//! Everything here works on plain strings: a resolved operand is just HLSL text such as
//! `-abs(input.Color.xyzx)` or `float3(1.0, 2.0, 3.0)`.

pub const COMPONENTS: [char; 4] = ['x', 'y', 'z', 'w'];

pub fn component_index(c: char) -> Option<u8> {
    match c {
        'x' => Some(0),
        'y' => Some(1),
        'z' => Some(2),
        'w' => Some(3),
        _ => None,
    }
}

/// Component selection of a destination (or any selector-carrying expression).
///
/// `count == 0` means "no swizzle"; otherwise `pattern[..count]` holds the letters and
/// `index[..count]` the matching component numbers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SwizzleInfo {
    pub count: usize,
    pub pattern: [char; 4],
    pub index: [u8; 4],
}

impl SwizzleInfo {
    pub fn none() -> Self {
        Self::default()
    }

    /// `.x`, `.xy`, `.xyz` or `.xyzw`.
    pub fn identity(count: usize) -> Self {
        let count = count.min(4);
        let mut info = Self {
            count,
            ..Self::default()
        };
        for i in 0..count {
            info.pattern[i] = COMPONENTS[i];
            info.index[i] = i as u8;
        }
        info
    }

    pub fn from_letters(letters: &str) -> Option<Self> {
        if letters.is_empty() || letters.len() > 4 {
            return None;
        }
        let mut info = Self::default();
        for (i, c) in letters.chars().enumerate() {
            info.index[i] = component_index(c)?;
            info.pattern[i] = c;
            info.count = i + 1;
        }
        Some(info)
    }

    /// Reads the trailing selector of `expr`.
    ///
    /// Numeric literals and constructors never carry one, and an enclosing `abs(...)` is
    /// looked through.
    pub fn from_expr(expr: &str) -> Self {
        let parts = Modifiers::split(expr.trim());
        let body = parts.body;
        if body.starts_with("l(") || parse_constructor(body).is_some() || is_numeric(body) {
            return Self::none();
        }
        match split_swizzle(body) {
            (_, Some(letters)) => Self::from_letters(letters).unwrap_or_default(),
            (_, None) => Self::none(),
        }
    }

    /// Single-component view of lane `i`.
    pub fn lane(&self, i: usize) -> Self {
        let mut info = Self {
            count: 1,
            ..Self::default()
        };
        info.pattern[0] = self.pattern[i];
        info.index[0] = self.index[i];
        info
    }

    pub fn letters(&self) -> String {
        self.pattern[..self.count].iter().collect()
    }
}

/// Splits `base.xyzw` into the base and a valid trailing selector (1-4 of `xyzw`).
pub fn split_swizzle(expr: &str) -> (&str, Option<&str>) {
    let Some(dot) = expr.rfind('.') else {
        return (expr, None);
    };
    let letters = &expr[dot + 1..];
    let base = &expr[..dot];
    let valid = !base.is_empty()
        && (1..=4).contains(&letters.len())
        && letters.chars().all(|c| component_index(c).is_some());
    if valid {
        (base, Some(letters))
    } else {
        (expr, None)
    }
}

/// Sign and absolute-value wrappers peeled off an operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Modifiers<'a> {
    pub negate: bool,
    pub abs: bool,
    pub body: &'a str,
}

impl<'a> Modifiers<'a> {
    /// Peels a leading `-`, then `|...|` or `abs(...)`.
    pub fn split(expr: &'a str) -> Self {
        let (negate, rest) = match expr.strip_prefix('-') {
            Some(rest) if !rest.is_empty() => (true, rest),
            _ => (false, expr),
        };
        if rest.len() >= 2 && rest.starts_with('|') && rest.ends_with('|') {
            return Self {
                negate,
                abs: true,
                body: &rest[1..rest.len() - 1],
            };
        }
        if let Some(inner) = rest.strip_prefix("abs(") {
            if matching_paren(rest, 3) == Some(rest.len() - 1) {
                return Self {
                    negate,
                    abs: true,
                    body: &inner[..inner.len() - 1],
                };
            }
        }
        Self {
            negate,
            abs: false,
            body: rest,
        }
    }

    pub fn apply(&self, inner: &str) -> String {
        let inner = if self.abs {
            format!("abs({inner})")
        } else {
            inner.to_owned()
        };
        if self.negate {
            format!("-{inner}")
        } else {
            inner
        }
    }
}

/// Index of the `)` closing the `(` at `open`.
pub fn matching_paren(s: &str, open: usize) -> Option<usize> {
    if s.as_bytes().get(open) != Some(&b'(') {
        return None;
    }
    let mut depth = 0usize;
    for (i, b) in s.bytes().enumerate().skip(open) {
        match b {
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Splits on commas that are not nested inside parentheses or brackets.
pub fn split_top_level(args: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, c) in args.char_indices() {
        match c {
            '(' | '[' => depth += 1,
            ')' | ']' => depth -= 1,
            ',' if depth == 0 => {
                out.push(args[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    let last = args[start..].trim();
    if !last.is_empty() || !out.is_empty() {
        out.push(last);
    }
    out
}

const SCALAR_TYPES: [&str; 6] = ["float", "uint", "int", "half", "double", "bool"];

/// A `floatN(...)` / `intN(...)` / `uintN(...)` style constructor covering the whole
/// expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constructor<'a> {
    pub scalar: &'a str,
    pub width: Option<usize>,
    pub args: Vec<&'a str>,
}

pub fn parse_constructor(expr: &str) -> Option<Constructor<'_>> {
    let open = expr.find('(')?;
    let head = &expr[..open];
    let scalar = SCALAR_TYPES.iter().find(|t| head.starts_with(**t))?;
    let digits = &head[scalar.len()..];
    let width = match digits {
        "" => None,
        d if d.len() == 1 => Some(d.parse::<usize>().ok().filter(|n| (1..=4).contains(n))?),
        _ => return None,
    };
    if matching_paren(expr, open) != Some(expr.len() - 1) {
        return None;
    }
    Some(Constructor {
        scalar: &expr[..scalar.len()],
        width,
        args: split_top_level(&expr[open + 1..expr.len() - 1]),
    })
}

/// `l(a, b, ...)` as printed by the disassembler (after the decoder re-joined the tokens).
pub fn parse_literal_list(expr: &str) -> Option<Vec<&str>> {
    let inner = expr.strip_prefix("l(")?.strip_suffix(')')?;
    Some(split_top_level(inner))
}

/// Decimal, float or hex literal with an optional sign.
pub fn is_numeric(s: &str) -> bool {
    let s = s.strip_prefix('-').unwrap_or(s);
    if let Some(hex) = s.strip_prefix("0x") {
        return !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit());
    }
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_digit() => {}
        Some('.') => {}
        _ => return false,
    }
    s.chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-' | 'f'))
        && s.chars().any(|c| c.is_ascii_digit())
}
