use ark::{compiler::bytecode::Bytecode, lexer::Token, CompileError, Compiler, CompilerOptions};
use datatest_stable::Utf8Path;

#[derive(thiserror::Error, Debug)]
#[error("error(s) occured in datatest at {0}")]
pub struct DatatestError(Box<Utf8Path>);

/// A datatest file is three sections split by `---` lines: expected errors,
/// expected output, and the source. Lines starting with `;` outside the source
/// are notes and are ignored.
struct DatatestFile<'a> {
    errors: Vec<&'a str>,
    output: Vec<&'a str>,
    source: String,
}

fn read_datatest(test_contents: &str) -> DatatestFile {
    #[derive(PartialEq, Eq, Debug, Default)]
    enum Section {
        #[default]
        Error,
        Output,
        Source,
    }

    let mut file = DatatestFile {
        errors: vec![],
        output: vec![],
        source: String::new(),
    };
    let mut section = Section::default();

    for line in test_contents.lines() {
        if section != Section::Source && line.trim_start().starts_with(';') {
            continue;
        }

        match section {
            Section::Error if line.trim_end() == "---" => section = Section::Output,
            Section::Error => file.errors.push(line),
            Section::Output if line.trim_end() == "---" => section = Section::Source,
            Section::Output => file.output.push(line),
            Section::Source => {
                if !file.source.is_empty() {
                    file.source.push('\n');
                }
                file.source.push_str(line);
            }
        }
    }

    file
}

// from https://matklad.github.io/2021/05/31/how-to-test.html
// with DATATEST_EXPECT set, rewrite the file to what we got instead of failing
fn stitch_to_datatest(errors: &[String], output: &str, source: &str) -> String {
    let mut lines = errors.iter().map(String::as_str).collect::<Vec<_>>();
    lines.push("---");
    lines.extend(output.lines());
    lines.push("---");
    lines.extend(source.lines());
    let mut text = lines.join("\n");
    text.push('\n');
    text
}

fn finish(
    path: &Utf8Path,
    expected: &DatatestFile,
    errors: Vec<String>,
    output: String,
) -> datatest_stable::Result<()> {
    if std::env::var("DATATEST_EXPECT").is_ok() {
        std::fs::write(path, stitch_to_datatest(&errors, &output, &expected.source))?;
        return Ok(());
    }

    let mut failed = false;
    let expected_errors = expected.errors.iter().map(|e| e.trim()).collect::<Vec<_>>();
    if expected_errors != errors.iter().map(|e| e.trim()).collect::<Vec<_>>() {
        println!("error in {path}: error mismatch\n\nGot:\n{errors:#?}\n\nExpected:\n{expected_errors:#?}");
        failed = true;
    }

    let expected_output = expected.output.join("\n");
    if expected_output.trim() != output.trim() {
        println!(
            "error in {path}: mismatched output\n\nGot:\n{}\n\nExpected:\n{}",
            output.trim(),
            expected_output.trim()
        );
        failed = true;
    }

    if failed {
        Err(DatatestError(Box::from(path)))?
    } else {
        Ok(())
    }
}

/// Options come from the file name: `*.strict.akd`, `*.ret.akd`.
fn options_for(path: &Utf8Path) -> CompilerOptions {
    let name = path.file_name().unwrap_or_default();
    CompilerOptions {
        begin_emits_ret: name.contains(".ret."),
        strict_control_flow: name.contains(".strict."),
    }
}

fn compiler_test(path: &Utf8Path, contents: String) -> datatest_stable::Result<()> {
    let expected = read_datatest(&contents);

    let mut compiler = Compiler::with_options(options_for(path));
    let result = compiler
        .feed(&expected.source)
        .and_then(|()| compiler.compile().map(<[u8]>::to_vec));

    let (errors, output) = match result {
        Ok(bytes) => (vec![], Bytecode::decode(&bytes)?.to_string()),
        Err(CompileError::Syntax(errors)) => {
            (errors.iter().map(ToString::to_string).collect(), String::new())
        }
        Err(err) => (vec![err.to_string()], String::new()),
    };

    finish(path, &expected, errors, output)
}

fn lexer_test(path: &Utf8Path, contents: String) -> datatest_stable::Result<()> {
    let expected = read_datatest(&contents);

    let mut errors = vec![];
    let mut tokens = vec![];
    for (token, span) in Token::lexer(&expected.source).spanned() {
        match token {
            Ok(tok) => tokens.push(format!("[{span:?}] {tok:?}")),
            Err(err) => errors.push(format!("[{span:?}] {err}")),
        }
    }

    finish(path, &expected, errors, tokens.join("\n"))
}

datatest_stable::harness! {
    compiler_test, "test_data", r"^.*\.akd",
    lexer_test, "test_data", r"^.*\.lxd",
}
