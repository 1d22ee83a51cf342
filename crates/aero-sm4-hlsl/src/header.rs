//! Parser for the `//` comment header the disassembler prints ahead of the instructions:
//! buffer definitions, resource bindings and the input/output signatures.

use core::fmt;

use tracing::{debug, trace};

use crate::error::{DecompileError, Result};
use crate::reflection::{
    ConstantBuffer, MatrixLayout, Reflection, Resource, ResourceKind, Signature, Structure,
    Variable,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Definitions,
    Bindings,
    InputSignature,
    OutputSignature,
    /// A recognized section header whose rows are not used (e.g. patch constant signatures).
    Unknown,
}

impl Section {
    /// Classifies a section marker line (comment text without the leading `//`).
    pub fn recognize(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.ends_with("Definitions:") {
            return Some(Self::Definitions);
        }
        if text.ends_with("Bindings:") {
            return Some(Self::Bindings);
        }
        if text.ends_with("signature:") {
            let section = if text.starts_with("Input") {
                Self::InputSignature
            } else if text.starts_with("Output") {
                Self::OutputSignature
            } else {
                Self::Unknown
            };
            return Some(section);
        }
        None
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Definitions => "buffer definition",
            Self::Bindings => "resource binding",
            Self::InputSignature => "input signature",
            Self::OutputSignature => "output signature",
            Self::Unknown => "unknown section",
        };
        f.write_str(name)
    }
}

/// Reads every header section of `source` into `reflection`.
pub fn parse_header(source: &str, reflection: &mut Reflection) -> Result<()> {
    let mut parser = HeaderParser {
        reflection,
        section: None,
        defs: DefinitionState::default(),
    };
    for (idx, raw) in source.lines().enumerate() {
        parser.line(idx + 1, raw)?;
    }
    parser.end_section();
    Ok(())
}

#[derive(Debug, Default)]
struct DefinitionState {
    cbuffer: Option<ConstantBuffer>,
    /// Resource named by an open `Resource bind info for ...` block.
    bind_info: Option<String>,
    structure: Option<Structure>,
    skipping: bool,
}

struct HeaderParser<'r> {
    reflection: &'r mut Reflection,
    section: Option<Section>,
    defs: DefinitionState,
}

impl HeaderParser<'_> {
    fn line(&mut self, line: usize, raw: &str) -> Result<()> {
        let trimmed = raw.trim();
        let Some(text) = trimmed.strip_prefix("//") else {
            if !trimmed.is_empty() {
                self.end_section();
            }
            return Ok(());
        };

        if let Some(section) = Section::recognize(text) {
            self.end_section();
            debug!(%section, line, "entering header section");
            self.section = Some(section);
            return Ok(());
        }

        let Some(section) = self.section else {
            return Ok(());
        };
        if text.trim().is_empty() || text.contains('=') {
            return Ok(());
        }

        match section {
            Section::Definitions => self.definition(line, text),
            Section::Bindings => {
                if is_table_decoration(text) {
                    return Ok(());
                }
                self.binding(line, text)
            }
            Section::InputSignature | Section::OutputSignature => {
                if is_table_decoration(text) {
                    return Ok(());
                }
                self.signature(line, text, section)
            }
            Section::Unknown => Ok(()),
        }
    }

    fn end_section(&mut self) {
        let defs = std::mem::take(&mut self.defs);
        if let Some(cb) = defs.cbuffer {
            debug!(cbuffer = %cb.name, "constant buffer block was not closed");
            self.reflection.add_constant_buffer(cb);
        }
        self.section = None;
    }

    fn definition(&mut self, line: usize, text: &str) -> Result<()> {
        let mut text = text.replace("//", " ");
        let mut layout = MatrixLayout::Default;
        if text.contains("row_major") {
            layout = MatrixLayout::RowMajor;
            text = text.replace("row_major", " ");
        } else if text.contains("column_major") {
            layout = MatrixLayout::ColumnMajor;
            text = text.replace("column_major", " ");
        }
        let text = text.replace(';', "; ");
        let args: Vec<&str> = text.split_whitespace().collect();
        let Some(&head) = args.first() else {
            return Ok(());
        };
        let malformed = |expected: usize| DecompileError::MalformedDeclaration {
            line,
            section: Section::Definitions,
            expected,
            found: args.len(),
            text: text.trim().to_owned(),
        };

        if self.defs.skipping {
            if head == "}" {
                self.defs.skipping = false;
            }
            return Ok(());
        }

        match head {
            "cbuffer" => {
                if args.len() != 2 {
                    return Err(malformed(2));
                }
                self.defs.cbuffer = Some(ConstantBuffer {
                    name: args[1].trim_start_matches('$').to_owned(),
                    variables: Vec::new(),
                });
            }
            "tbuffer" => {
                debug!(line, "skipping tbuffer block");
                self.defs.skipping = true;
            }
            "Resource" if text.trim_start().starts_with("Resource bind info for") => {
                self.defs.bind_info = args.last().map(|s| s.to_string());
            }
            "{" => {}
            "struct" => {
                if args.len() < 2 {
                    return Err(malformed(2));
                }
                self.defs.structure = Some(Structure {
                    name: args[1].to_owned(),
                    members: Vec::new(),
                });
            }
            "}" => {
                if let Some(structure) = self.defs.structure.take() {
                    if !self.close_structure(structure, &args) {
                        return Err(malformed(6));
                    }
                } else if let Some(cb) = self.defs.cbuffer.take() {
                    trace!(cbuffer = %cb.name, size = cb.size(), "constant buffer parsed");
                    self.reflection.add_constant_buffer(cb);
                } else {
                    self.defs.bind_info = None;
                }
            }
            _ => {
                if let Some(structure) = self.defs.structure.as_mut() {
                    if args.len() < 4 {
                        return Err(malformed(4));
                    }
                    structure.members.push(Variable {
                        type_name: head.to_owned(),
                        name: field_name(args[1]),
                        offset: number(args[3]),
                        size: 0,
                        layout,
                    });
                } else if let Some(resource) = self.defs.bind_info.as_deref() {
                    if args.len() >= 2 && field_name(args[1]) == "$Element" {
                        self.reflection.add_uav_struct_pair(resource, head);
                    }
                } else if let Some(cb) = self.defs.cbuffer.as_mut() {
                    if args.len() < 6 {
                        return Err(malformed(6));
                    }
                    cb.variables.push(Variable {
                        type_name: head.to_owned(),
                        name: field_name(args[1]),
                        offset: number(args[3]),
                        size: number(args[5]),
                        layout,
                    });
                }
            }
        }
        Ok(())
    }

    /// `} $Element;` inside a bind-info block, or `} field; Offset: N Size: M` inside a
    /// constant buffer. Returns `false` when the latter lacks its offset and size columns.
    fn close_structure(&mut self, structure: Structure, args: &[&str]) -> bool {
        let name = structure.name.clone();
        self.reflection.add_structure(structure);
        if let Some(resource) = self.defs.bind_info.as_deref() {
            self.reflection.add_uav_struct_pair(resource, &name);
            return true;
        }
        if let Some(cb) = self.defs.cbuffer.as_mut() {
            if args.len() < 6 {
                return false;
            }
            cb.variables.push(Variable {
                type_name: name,
                name: field_name(args[1]),
                offset: number(args[3]),
                size: number(args[5]),
                layout: MatrixLayout::Default,
            });
        }
        true
    }

    fn binding(&mut self, line: usize, text: &str) -> Result<()> {
        let args: Vec<&str> = text.split_whitespace().collect();
        let (name, kind, format, dimension, bind, count) = match args.as_slice() {
            [name, kind, format, dim, bind, count] => (name, kind, format, dim, bind, count),
            [name, kind, format, dim, _id, bind, count, ..] => (name, kind, format, dim, bind, count),
            _ => {
                return Err(DecompileError::MalformedDeclaration {
                    line,
                    section: Section::Bindings,
                    expected: 6,
                    found: args.len(),
                    text: text.trim().to_owned(),
                })
            }
        };
        self.reflection.add_resource(Resource {
            name: name.trim_start_matches('$').to_owned(),
            kind: ResourceKind::from_tag(kind),
            format: (*format).to_owned(),
            dimension: (*dimension).to_owned(),
            bind: (*bind).to_owned(),
            count: count.parse().unwrap_or(1),
        });
        Ok(())
    }

    fn signature(&mut self, line: usize, text: &str, section: Section) -> Result<()> {
        let trimmed = text.trim();
        if trimmed == "no Input" || trimmed == "no Output" {
            return Ok(());
        }
        let args: Vec<&str> = trimmed.split_whitespace().collect();
        if args.len() < 6 {
            return Err(DecompileError::MalformedDeclaration {
                line,
                section,
                expected: 6,
                found: args.len(),
                text: trimmed.to_owned(),
            });
        }
        let signature = Signature::new(
            args[0],
            number(args[1]),
            args[2],
            args[3],
            args[4],
            args[5],
            args.get(6).copied().unwrap_or(""),
        );
        if section == Section::InputSignature {
            self.reflection.add_input_signature(signature);
        } else {
            self.reflection.add_output_signature(signature);
        }
        Ok(())
    }
}

/// Column titles (`Name  Type ...`) and `----` rules under them.
fn is_table_decoration(text: &str) -> bool {
    let text = text.trim_start();
    text.starts_with("Name") || text.starts_with('-')
}

fn field_name(arg: &str) -> String {
    arg.trim_end_matches(';').to_owned()
}

/// Numeric columns read like `atoi`: anything unparsable counts as zero.
fn number(arg: &str) -> u32 {
    arg.parse().unwrap_or(0)
}
