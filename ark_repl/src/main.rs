use std::{fs, path::PathBuf, process::ExitCode};

use anyhow::Context;
use ark::{
    lexer::{LexerError, Span, Token},
    Bytecode, CompileError, Compiler, CompilerOptions, ParseError,
};
use clap::{Args, Parser, Subcommand};
use codesnake::{Block, CodeWidth, Label, LineIndex};
use tracing_subscriber::{fmt, EnvFilter};
use yansi::Paint;

/// Compile Ark programs to bytecode, or poke at them interactively.
#[derive(Parser, Debug)]
#[command(name = "ark", version)]
struct Cli {
    /// More logging, repeat for more. `RUST_LOG` wins when set.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compile a source file into a bytecode image
    Compile {
        input: PathBuf,
        /// Where to write the image, defaults to the input with an `arkc` extension
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[command(flatten)]
        layout: Layout,
    },
    /// List the tables and code of a bytecode image
    Disasm { file: PathBuf },
    /// Show how a source file splits into tokens
    Tokens { file: PathBuf },
    /// Compile lines as they are typed and list the result
    Repl {
        #[command(flatten)]
        layout: Layout,
    },
}

#[derive(Args, Debug, Clone, Copy)]
struct Layout {
    /// End every `begin` block with RET
    #[arg(long)]
    begin_ret: bool,
    /// Emit the extra jumps that keep `if` and `while` from falling through
    #[arg(long)]
    strict_control_flow: bool,
}

impl From<Layout> for CompilerOptions {
    fn from(layout: Layout) -> Self {
        CompilerOptions {
            begin_emits_ret: layout.begin_ret,
            strict_control_flow: layout.strict_control_flow,
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn token_block<'a>(
    idx: &'a LineIndex,
    labels: impl IntoIterator<Item = (Span, Result<Token, LexerError>)>,
) -> Option<Block<&'a str, String>> {
    Block::new(
        idx,
        labels.into_iter().map(|(range, tok)| {
            let text = format!("{tok:?}");
            Label::new(range)
                .with_text(if tok.is_ok() {
                    text.green().to_string()
                } else {
                    text.red().to_string()
                })
                .with_style(move |s| match tok {
                    Ok(Token::Identifier(_)) => s.blue().to_string(),
                    Ok(Token::Number(_)) => s.yellow().to_string(),
                    Ok(Token::String(_)) => s.cyan().to_string(),
                    Ok(_) => s,
                    Err(_) => s.red().to_string(),
                })
        }),
    )
}

fn error_block<'a>(idx: &'a LineIndex, errors: &[ParseError]) -> Option<Block<&'a str, String>> {
    let mut spans = errors
        .iter()
        .filter(|err| !err.span.is_empty())
        .collect::<Vec<_>>();
    spans.sort_by_key(|err| err.span.start);

    // labels in a block may not overlap, an unclosed list can swallow the rest
    let mut end = 0;
    spans.retain(|err| {
        let keep = err.span.start >= end;
        if keep {
            end = err.span.end;
        }
        keep
    });

    Block::new(
        idx,
        spans.into_iter().map(|err| {
            Label::new(err.span.clone())
                .with_text(err.kind.to_string().red().to_string())
                .with_style(|s| s.red().to_string())
        }),
    )
}

fn print_block(block: Block<&str, String>, name: &str) {
    let block = block.map_code(|c| CodeWidth::new(c, c.len()));
    println!("{}[{name}]", block.prologue());
    print!("{block}");
    println!("{}", block.epilogue());
}

fn report_syntax(source: &str, name: &str, errors: &[ParseError]) {
    for err in errors {
        eprintln!("{} {err}", "error:".red().bold());
    }
    let idx = LineIndex::new(source);
    if let Some(block) = error_block(&idx, errors) {
        print_block(block, name);
    }
}

fn show_tokens(source: &str, name: &str) {
    let idx = LineIndex::new(source);

    let mut blocks = vec![];
    let mut line_labels = vec![];
    for (token, span) in Token::lexer(source).spanned() {
        match token {
            Ok(Token::LineEnding) => blocks.push(token_block(&idx, line_labels.drain(..))),
            tok => line_labels.push((span.clone(), tok)),
        }
    }
    if !line_labels.is_empty() {
        blocks.push(token_block(&idx, line_labels.drain(..)));
    }

    for block in blocks.into_iter().flatten() {
        print_block(block, name);
    }
}

/// Compiles `source`, printing diagnostics for anything the reader rejects.
/// `None` means the source had syntax errors.
fn compile_source(
    source: &str,
    name: &str,
    options: CompilerOptions,
) -> anyhow::Result<Option<Vec<u8>>> {
    let mut compiler = Compiler::with_options(options);
    match compiler.feed(source) {
        Ok(()) => {}
        Err(CompileError::Syntax(errors)) => {
            report_syntax(source, name, &errors);
            return Ok(None);
        }
        Err(err) => return Err(err.into()),
    }
    Ok(Some(compiler.compile()?.to_vec()))
}

fn compile(
    input: PathBuf,
    output: Option<PathBuf>,
    options: CompilerOptions,
) -> anyhow::Result<ExitCode> {
    let source = fs::read_to_string(&input)
        .with_context(|| format!("could not read {}", input.display()))?;
    let name = input.display().to_string();

    let Some(bytes) = compile_source(&source, &name, options)? else {
        return Ok(ExitCode::FAILURE);
    };

    let output = output.unwrap_or_else(|| input.with_extension("arkc"));
    fs::write(&output, &bytes)
        .with_context(|| format!("could not write {}", output.display()))?;
    tracing::info!("wrote {} bytes to {}", bytes.len(), output.display());
    Ok(ExitCode::SUCCESS)
}

fn disasm(file: PathBuf) -> anyhow::Result<ExitCode> {
    let bytes = fs::read(&file).with_context(|| format!("could not read {}", file.display()))?;
    let image = Bytecode::decode(&bytes)
        .with_context(|| format!("{} is not an ark image", file.display()))?;
    print!("{image}");
    Ok(ExitCode::SUCCESS)
}

fn tokens(file: PathBuf) -> anyhow::Result<ExitCode> {
    let source =
        fs::read_to_string(&file).with_context(|| format!("could not read {}", file.display()))?;
    show_tokens(&source, &file.display().to_string());
    Ok(ExitCode::SUCCESS)
}

fn repl(options: CompilerOptions) -> anyhow::Result<ExitCode> {
    let mut readline = rustyline::DefaultEditor::new()?;

    while let Ok(input) = readline.readline(">> ") {
        let _ = readline.add_history_entry(input.as_str());

        if let Some(src) = input.strip_prefix(":tokens ") {
            show_tokens(src, "repl");
            continue;
        }

        match compile_source(&input, "repl", options) {
            Ok(Some(bytes)) => match Bytecode::decode(&bytes) {
                Ok(image) => print!("{image}"),
                Err(err) => eprintln!("{} {err}", "error:".red().bold()),
            },
            Ok(None) => {}
            Err(err) => eprintln!("{} {err}", "error:".red().bold()),
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Some(Command::Compile {
            input,
            output,
            layout,
        }) => compile(input, output, layout.into()),
        Some(Command::Disasm { file }) => disasm(file),
        Some(Command::Tokens { file }) => tokens(file),
        Some(Command::Repl { layout }) => repl(layout.into()),
        None => repl(CompilerOptions::default()),
    }
}
