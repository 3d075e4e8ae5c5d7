use clap::Parser;
use jp_core::{compile, Program, Val};
use serde_json::Value;
use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::ExitCode;

/// Evaluate a JSONPath expression over JSON documents
///
/// Each input is a sequence of concatenated JSON values (or, with -l, one
/// JSON value per line). For every input value the compiled expression is
/// evaluated and the list of selected values is written to standard output
/// as a JSON array.
#[derive(Parser)]
#[command(version, max_term_width = 80)]
struct Cli {
    /// Read one JSON value per input line, and write each result array on
    /// a single line
    #[arg(short = 'l')]
    lines: bool,

    /// The path expression to evaluate, e.g. $.books[0].title
    pattern: String,

    /// Input files; standard input when none are given
    files: Vec<PathBuf>,
}

fn main() -> ExitCode {
    match real_main() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("jp: {e}");
            ExitCode::from(1)
        }
    }
}

fn real_main() -> Result<(), Failure> {
    env_logger::init();
    let cli = Cli::parse();
    let prog =
        compile(&cli.pattern).map_err(|e| Failure::Pattern(cli.pattern.clone(), e))?;
    log::debug!("program: {prog}");

    let stdout = io::stdout();
    let mut out = io::BufWriter::new(stdout.lock());
    if cli.files.is_empty() {
        let stdin = io::stdin();
        evaluate(&cli, &prog, stdin.lock(), &mut out, None)?;
    } else {
        for file in &cli.files {
            let fd = File::open(file).map_err(|e| Failure::Open(file.clone(), e))?;
            evaluate(&cli, &prog, BufReader::new(fd), &mut out, Some(file))?;
        }
    }
    out.flush().map_err(Failure::Io)
}

fn evaluate(
    cli: &Cli,
    prog: &Program,
    rdr: impl BufRead,
    out: &mut impl Write,
    file: Option<&PathBuf>,
) -> Result<(), Failure> {
    if cli.lines {
        read_lines(prog, rdr, out, file)
    } else {
        read_values(prog, rdr, out, file)
    }
}

/// Run the machine against a sequence of JSON values, across newlines,
/// writing each result set as indented JSON.
fn read_values(
    prog: &Program,
    rdr: impl BufRead,
    out: &mut impl Write,
    file: Option<&PathBuf>,
) -> Result<(), Failure> {
    let at = |off: usize| Context::new(file, off);
    let mut de = serde_json::Deserializer::from_reader(rdr).into_iter::<Value>();
    loop {
        let off = de.byte_offset();
        let root = match de.next() {
            None => return Ok(()),
            Some(Ok(v)) => Val::from(v),
            Some(Err(e)) => return Err(Failure::Decode(at(off), e.to_string())),
        };
        let results = prog
            .eval(&root)
            .map_err(|e| Failure::Eval(at(off), e.to_string()))?;
        let arr = Value::Array(results.iter().map(Value::from).collect());
        serde_json::to_writer_pretty(&mut *out, &arr).map_err(|e| Failure::Io(e.into()))?;
        writeln!(out).map_err(Failure::Io)?;
    }
}

/// Run the machine against one JSON value per line, writing one result
/// line per input line.
fn read_lines(
    prog: &Program,
    rdr: impl BufRead,
    out: &mut impl Write,
    file: Option<&PathBuf>,
) -> Result<(), Failure> {
    let at = |lno: usize| Context::new(file, lno);
    for (i, line) in rdr.lines().enumerate() {
        let lno = i + 1;
        let line = line.map_err(Failure::Io)?;
        let root: Val = serde_json::from_str::<Value>(&line)
            .map_err(|e| Failure::Decode(at(lno), e.to_string()))?
            .into();
        let results = prog
            .eval(&root)
            .map_err(|e| Failure::Eval(at(lno), e.to_string()))?;
        let arr = Value::Array(results.iter().map(Value::from).collect());
        serde_json::to_writer(&mut *out, &arr).map_err(|e| Failure::Io(e.into()))?;
        writeln!(out).map_err(Failure::Io)?;
    }
    Ok(())
}

/// Where in the input something went wrong: a file name, if inputs are
/// files, and a byte offset or line number.
struct Context {
    file: Option<PathBuf>,
    position: usize,
}

impl Context {
    fn new(file: Option<&PathBuf>, position: usize) -> Self {
        Self {
            file: file.cloned(),
            position,
        }
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(file) = &self.file {
            write!(f, "{}:", file.display())?;
        }
        write!(f, "{}", self.position)
    }
}

enum Failure {
    Pattern(String, jp_core::ParseError),
    Open(PathBuf, io::Error),
    Decode(Context, String),
    Eval(Context, String),
    Io(io::Error),
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Failure::Pattern(pat, e) => write!(f, "path {pat:?}: {e}"),
            Failure::Open(file, e) => write!(f, "{}: cannot open: {e}", file.display()),
            Failure::Decode(at, e) => write!(f, "{at}: decoding JSON: {e}"),
            Failure::Eval(at, e) => write!(f, "{at}: evaluation error: {e}"),
            Failure::Io(e) => write!(f, "i/o error: {e}"),
        }
    }
}
