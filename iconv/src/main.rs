//! iconv-compatible character encoding converter.
//!
//! Usage:
//!   iconv -f <from-encoding> -t <to-encoding> [file...]
//!   iconv -l

use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use textcodec::sniff::{self, HtmlCharset};
use textcodec::{Codec, Registry, TextDecoder, TextEncoder};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

const CHUNK: usize = 8 * 1024;

#[derive(Parser, Debug)]
#[command(name = "iconv", version, about = "Convert text from one character encoding to another")]
struct Opts {
    /// Encoding of the input. Defaults to the locale's encoding.
    #[arg(short = 'f', long = "from-code", value_name = "ENCODING")]
    from: Option<String>,

    /// Encoding of the output. Defaults to the locale's encoding.
    #[arg(short = 't', long = "to-code", value_name = "ENCODING")]
    to: Option<String>,

    /// Write to this file instead of stdout.
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    output: Option<PathBuf>,

    /// Exit successfully even if characters had to be replaced.
    #[arg(short = 'c')]
    lossy: bool,

    /// Take the input encoding from a byte order mark or an HTML
    /// `<meta>` charset when one is present.
    #[arg(long)]
    detect: bool,

    /// List every known encoding name and exit.
    #[arg(short = 'l', long = "list")]
    list: bool,

    /// Input files. Reads stdin when none are given.
    files: Vec<PathBuf>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let opts = Opts::parse();
    match run(&opts) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(err) => {
            eprintln!("iconv: {err:#}");
            ExitCode::from(1)
        }
    }
}

/// Returns `false` when characters were replaced and `-c` was not given.
fn run(opts: &Opts) -> Result<bool> {
    let registry = Registry::new();

    if opts.list {
        let mut names = registry.all_names();
        names.sort_by_key(|n| n.to_ascii_lowercase());
        let mut stdout = io::stdout().lock();
        for name in names {
            writeln!(stdout, "{name}")?;
        }
        return Ok(true);
    }

    let from = resolve(&registry, opts.from.as_deref())?;
    let to = resolve(&registry, opts.to.as_deref())?;

    let mut inputs: Vec<Box<dyn Read>> = Vec::new();
    if opts.files.is_empty() {
        inputs.push(Box::new(io::stdin().lock()));
    }
    for path in &opts.files {
        let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
        inputs.push(Box::new(file));
    }

    let output: Box<dyn Write> = match &opts.output {
        Some(path) => {
            Box::new(File::create(path).with_context(|| format!("cannot create {}", path.display()))?)
        }
        None => Box::new(io::stdout().lock()),
    };
    let mut output = BufWriter::new(output);

    let mut decoder: Option<TextDecoder> = None;
    let mut encoder = TextEncoder::new(to);
    let mut buf = vec![0u8; CHUNK];

    for mut input in inputs {
        loop {
            let n = input.read(&mut buf).context("read failed")?;
            if n == 0 {
                break;
            }
            let chunk = &buf[..n];
            let decoder = decoder.get_or_insert_with(|| {
                let codec = if opts.detect {
                    detect(&registry, chunk).unwrap_or_else(|| from.clone())
                } else {
                    from.clone()
                };
                debug!(from = codec.name(), to = encoder.codec().name(), "converting");
                TextDecoder::new(codec)
            });
            let units = decoder.decode(chunk);
            output.write_all(&encoder.encode_utf16(&units))?;
        }
    }

    let mut invalid = 0;
    if let Some(mut decoder) = decoder {
        let units = decoder.finish();
        output.write_all(&encoder.encode_utf16(&units))?;
        invalid += decoder.invalid_chars();
    }
    output.write_all(&encoder.finish())?;
    output.flush().context("write failed")?;

    invalid += encoder.invalid_chars();
    if invalid > 0 {
        warn!(invalid, "input held invalid or unconvertible characters");
        return Ok(opts.lossy);
    }
    Ok(true)
}

fn resolve(registry: &Registry, name: Option<&str>) -> Result<Arc<Codec>> {
    let name = name.unwrap_or("System");
    registry
        .lookup_by_name(name)
        .ok_or_else(|| anyhow!("conversion from or to {name:?} is not supported"))
}

fn detect(registry: &Registry, head: &[u8]) -> Option<Arc<Codec>> {
    match sniff::sniff_html(head) {
        HtmlCharset::Bom(bom) => registry.lookup_by_mib(bom.mib()),
        HtmlCharset::Meta(name) => registry.lookup_by_name(&name),
        HtmlCharset::Undetermined => None,
    }
}
