use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use aero_sm4_hlsl::{decompile, DecompileOptions};
use anyhow::{bail, Context};
use clap::Parser;
use tempfile::NamedTempFile;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "sm4-to-hlsl",
    about = "Reconstruct HLSL source from a Shader Model 4/5 assembly listing."
)]
struct Args {
    /// Disassembly listing (fxc /Fc or D3DDisassemble output)
    input: PathBuf,

    /// Output path without extension; the stage suffix and `.hlsl` are appended
    /// (defaults to the input path without its extension)
    #[arg(short, long, value_name = "BASE")]
    output: Option<PathBuf>,

    /// Name of the generated entry-point function
    #[arg(short, long, value_name = "NAME", default_value = "main")]
    entry: String,

    /// Fail when control flow does not close back to the function body
    #[arg(long, action = clap::ArgAction::SetTrue)]
    strict: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run(Args::parse()) {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    if args.entry.trim().is_empty() {
        bail!("entry point name must not be empty");
    }

    let source = fs::read_to_string(&args.input)
        .with_context(|| format!("read {}", args.input.display()))?;
    let options = DecompileOptions {
        entry_point: args.entry.clone(),
        strict_control_flow: args.strict,
    };
    let decompiled = decompile(&source, &options)
        .with_context(|| format!("decompile {}", args.input.display()))?;

    let base = args
        .output
        .clone()
        .unwrap_or_else(|| args.input.with_extension(""));
    let output = output_path(&base, &decompiled.file_name(""));
    write_atomically(&output, decompiled.hlsl.as_bytes())
        .with_context(|| format!("write {}", output.display()))?;

    info!(
        stage = %decompiled.stage,
        profile = %decompiled.profile,
        output = %output.display(),
        "wrote shader"
    );
    if decompiled.final_depth != 0 {
        eprintln!(
            "warning: {} leaves control flow open at depth {}",
            args.input.display(),
            decompiled.final_depth
        );
    }
    Ok(())
}

/// `<base>` + `_ps.hlsl`, keeping the directory of `base`.
fn output_path(base: &Path, suffix: &str) -> PathBuf {
    let mut name = base
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(suffix);
    base.with_file_name(name)
}

/// Writes through a temporary file in the destination directory so a failed conversion never
/// leaves a truncated output behind.
fn write_atomically(path: &Path, contents: &[u8]) -> anyhow::Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir).context("create temporary output file")?;
    tmp.write_all(contents)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|err| err.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_path_appends_the_stage_suffix() {
        assert_eq!(
            output_path(Path::new("shaders/lit"), "_ps.hlsl"),
            PathBuf::from("shaders/lit_ps.hlsl")
        );
        assert_eq!(
            output_path(Path::new("blur.v2"), "_cs.hlsl"),
            PathBuf::from("blur.v2_cs.hlsl")
        );
    }

    #[test]
    fn args_defaults() {
        let args = Args::try_parse_from(["sm4-to-hlsl", "in.asm"]).expect("parse");
        assert_eq!(args.entry, "main");
        assert!(args.output.is_none());
        assert!(!args.strict);

        let args = Args::try_parse_from(["sm4-to-hlsl", "in.asm", "-o", "out/x", "-e", "PSMain", "--strict"])
            .expect("parse");
        assert_eq!(args.output, Some(PathBuf::from("out/x")));
        assert_eq!(args.entry, "PSMain");
        assert!(args.strict);
    }
}
