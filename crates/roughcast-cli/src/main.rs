use futures::executor::block_on;
use roughcast::{Document, FsFetcher, SketchOptions, SourcePolicy};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use url::Url;

#[derive(Debug)]
enum CliError {
    Usage(&'static str),
    Io(std::io::Error),
    Sketch(roughcast::Error),
    BadPath(PathBuf),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Usage(msg) => write!(f, "{msg}"),
            CliError::Io(err) => write!(f, "I/O error: {err}"),
            CliError::Sketch(err) => write!(f, "{err}"),
            CliError::BadPath(path) => write!(f, "Cannot use `{}` as a base URL", path.display()),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<roughcast::Error> for CliError {
    fn from(value: roughcast::Error) -> Self {
        Self::Sketch(value)
    }
}

#[derive(Debug, Clone, Copy)]
struct PolicyArg(SourcePolicy);

impl FromStr for PolicyArg {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hide" => Ok(Self(SourcePolicy::Hide)),
            "remove" => Ok(Self(SourcePolicy::Remove)),
            "provenance" | "by-provenance" => Ok(Self(SourcePolicy::ByProvenance)),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Default)]
struct Args {
    input: Option<String>,
    config: Option<String>,
    policy: Option<SourcePolicy>,
    out: Option<String>,
}

fn usage() -> &'static str {
    "roughcast-cli\n\
\n\
USAGE:\n\
  roughcast-cli [--config <json>] [--policy hide|remove|provenance] [--out <path>] [<path>|-]\n\
\n\
NOTES:\n\
  - Input is an XHTML or SVG document; `<img src=\"*.svg\">` references are inlined relative to it.\n\
  - Only roots carrying `data-sketch` (or inside a container that does) are sketched.\n\
  - The sketched document is written to --out, or stdout when omitted.\n\
  - Set RUST_LOG (e.g. RUST_LOG=roughcast=debug) for diagnostics on stderr.\n"
}

fn parse_args(argv: &[String]) -> Result<Args, CliError> {
    let mut args = Args::default();

    let mut it = argv.iter().skip(1);
    while let Some(a) = it.next() {
        match a.as_str() {
            "--help" | "-h" => return Err(CliError::Usage(usage())),
            "--config" => {
                let Some(path) = it.next() else {
                    return Err(CliError::Usage(usage()));
                };
                args.config = Some(path.clone());
            }
            "--policy" => {
                let Some(policy) = it.next() else {
                    return Err(CliError::Usage(usage()));
                };
                let PolicyArg(policy) = policy
                    .parse::<PolicyArg>()
                    .map_err(|_| CliError::Usage(usage()))?;
                args.policy = Some(policy);
            }
            "--out" => {
                let Some(out) = it.next() else {
                    return Err(CliError::Usage(usage()));
                };
                args.out = Some(out.clone());
            }
            other if other.starts_with("--") => return Err(CliError::Usage(usage())),
            path => {
                if args.input.is_some() {
                    return Err(CliError::Usage(usage()));
                }
                args.input = Some(path.to_string());
            }
        }
    }
    Ok(args)
}

fn read_input(input: Option<&str>) -> Result<String, CliError> {
    match input {
        None | Some("-") => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
        Some(path) => Ok(std::fs::read_to_string(path)?),
    }
}

/// References resolve against the input file, or the working directory for stdin.
fn base_url(input: Option<&str>) -> Result<Url, CliError> {
    match input {
        None | Some("-") => {
            let cwd = std::env::current_dir()?;
            Url::from_directory_path(&cwd).map_err(|()| CliError::BadPath(cwd))
        }
        Some(path) => {
            let abs = std::path::absolute(Path::new(path))?;
            Url::from_file_path(&abs).map_err(|()| CliError::BadPath(abs))
        }
    }
}

fn load_options(args: &Args) -> Result<SketchOptions, CliError> {
    let mut options = match args.config.as_deref() {
        Some(path) => SketchOptions::from_json(&std::fs::read_to_string(path)?)?,
        None => SketchOptions::default(),
    };
    if let Some(policy) = args.policy {
        options = options.with_source_policy(policy);
    }
    Ok(options)
}

fn run(args: Args) -> Result<(), CliError> {
    let options = load_options(&args)?;
    let text = read_input(args.input.as_deref())?;
    let base = base_url(args.input.as_deref())?;
    let document = Document::parse(&text)?;

    let out = block_on(roughcast::sketch_document(
        document,
        &FsFetcher,
        &base,
        options,
    ));
    for (src, err) in &out.acquired.failures {
        tracing::warn!(%src, %err, "diagram reference not inlined");
    }
    let sketched: usize = out.pass.surfaces.iter().map(|s| s.sketched).sum();
    tracing::info!(
        inlined = out.acquired.inlined.len(),
        surfaces = out.pass.surfaces.len(),
        sketched,
        "done"
    );

    let xml = out.document.to_xml();
    match args.out.as_deref() {
        Some(path) => std::fs::write(path, xml)?,
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(xml.as_bytes())?;
            stdout.flush()?;
        }
    }
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = match parse_args(&std::env::args().collect::<Vec<_>>()) {
        Ok(v) => v,
        Err(CliError::Usage(msg)) => {
            eprintln!("{msg}");
            std::process::exit(2);
        }
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = run(args) {
        eprintln!("{err}");
        std::process::exit(1);
    }
}
