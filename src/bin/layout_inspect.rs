//! Inspect a layout manifest: print the finalized tree, memory usage and
//! the address range of every field.
//!
//! Usage: layout_inspect <manifest.toml> [--packed | --pow2] [--config <file>] [--json]
use anyhow::{bail, Context, Result};
use field_layout::{LayoutConfig, LayoutManifest, PaddingPolicy};

const USAGE: &str =
    "usage: layout_inspect <manifest.toml> [--packed | --pow2] [--config <file>] [--json]";

struct Args {
    manifest: String,
    config: Option<String>,
    padding: Option<PaddingPolicy>,
    json: bool,
}

fn parse_args() -> Result<Args> {
    let mut manifest = None;
    let mut config = None;
    let mut padding = None;
    let mut json = false;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--packed" => padding = Some(PaddingPolicy::Packed),
            "--pow2" => padding = Some(PaddingPolicy::PowerOfTwoPad),
            "--json" => json = true,
            "--config" => config = Some(args.next().context("--config needs a path")?),
            flag if flag.starts_with("--") => bail!("unknown flag {}", flag),
            path => {
                if manifest.replace(path.to_string()).is_some() {
                    bail!("only one manifest may be given");
                }
            }
        }
    }

    Ok(Args {
        manifest: manifest.context(USAGE)?,
        config,
        padding,
        json,
    })
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = parse_args()?;

    let config = match &args.config {
        Some(path) => LayoutConfig::load(path)?,
        None => LayoutConfig::from_env()?,
    };
    let mut manifest = LayoutManifest::load(&args.manifest)
        .with_context(|| format!("loading manifest {}", args.manifest))?;
    if args.padding.is_some() {
        manifest.padding = args.padding;
    }

    let built = manifest.build_with(config)?;
    let stats = built.tree.stats();

    let mut fields = Vec::with_capacity(built.fields.len());
    for field in &built.fields {
        let shape = field.shape()?;
        let last: Vec<usize> = shape.iter().map(|&extent| extent - 1).collect();
        fields.push(serde_json::json!({
            "name": field.name(),
            "dtype": field.dtype(),
            "shape": shape,
            "first_offset": field.offset(&vec![0; shape.len()])?,
            "last_offset": field.offset(&last)?,
        }));
    }

    if args.json {
        let report = serde_json::json!({
            "tree": built.tree.id(),
            "padding": built.tree.policy(),
            "stats": stats,
            "fields": fields,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{}", built.tree);
    println!("Memory");
    println!("======");
    println!("  total:   {} bytes", stats.total_bytes);
    println!("  used:    {} bytes", stats.used_bytes);
    println!("  padding: {} bytes ({:.1}%)", stats.padding_bytes, stats.padding_ratio() * 100.0);
    println!();
    println!("Fields");
    println!("======");
    for field in &fields {
        println!(
            "  {:<12} {:<4} shape {:<12} offsets {}..={}",
            field["name"].as_str().unwrap_or_default(),
            field["dtype"].as_str().unwrap_or_default(),
            field["shape"].to_string(),
            field["first_offset"],
            field["last_offset"],
        );
    }
    Ok(())
}
