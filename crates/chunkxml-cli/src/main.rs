//! cxml - Parse XML-like documents, search them and dump the result
//!
//! Usage:
//!   cxml [OPTIONS] [?PATTERN...] <DOCUMENT>...
//!
//! Arguments are processed left to right: patterns and dump modes given
//! before a document apply to that document and every later one.

use std::env;
use std::fmt;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process;

use chunkxml_core::{parse_with_recovery, Document, NodeData, NodeId, ParseResult, Parser, Tag, TagForm};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::EnvFilter;

const DEFAULT_CHUNK_SIZE: usize = 95;

fn main() {
    // Logs go to stderr so dumps on stdout stay clean
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("chunkxml_core=warn")),
        )
        .with_writer(io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();

    match run(&args) {
        Ok(()) => {}
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    }
}

fn run(args: &[String]) -> Result<(), String> {
    let config = parse_args(args)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut failed = 0;

    for job in &config.jobs {
        if let Err(e) = process_job(job, &mut out) {
            eprintln!("error: {}", e);
            failed += 1;
        }
    }

    out.flush().map_err(|e| format!("failed to write output: {}", e))?;

    if failed > 0 {
        return Err(format!("{} of {} document(s) failed", failed, config.jobs.len()));
    }
    Ok(())
}

#[derive(Debug)]
struct Config {
    jobs: Vec<Job>,
}

/// One document together with the settings in effect when it was named.
#[derive(Debug, Clone, PartialEq)]
struct Job {
    source: Source,
    patterns: Vec<String>,
    dump: Dump,
    chunk_size: usize,
}

#[derive(Debug, Clone, PartialEq)]
enum Source {
    Literal(String),
    File(PathBuf),
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Literal(_) => write!(f, "<literal>"),
            Source::File(path) => write!(f, "{}", path.display()),
        }
    }
}

fn parse_args(args: &[String]) -> Result<Config, String> {
    let mut patterns = Vec::new();
    let mut dump = Dump::Markup;
    let mut chunk_size = DEFAULT_CHUNK_SIZE;
    let mut jobs = Vec::new();

    let mut i = 1;
    while i < args.len() {
        let arg = &args[i];
        match arg.as_str() {
            "-h" | "--help" => {
                print_help();
                process::exit(0);
            }
            "-V" | "--version" => {
                println!("cxml {}", env!("CARGO_PKG_VERSION"));
                process::exit(0);
            }
            "-" | "--text" => dump = Dump::Text,
            "=" | "--attributes" => dump = Dump::Attributes,
            "--markup" => dump = Dump::Markup,
            "-j" | "--json" => dump = Dump::Json,
            "-c" | "--chunk-size" => {
                i += 1;
                let value = args
                    .get(i)
                    .ok_or_else(|| format!("{} requires a value", arg))?;
                chunk_size = match value.parse::<usize>() {
                    Ok(n) if n > 0 => n,
                    _ => return Err(format!("invalid chunk size: {}", value)),
                };
            }
            _ if arg.starts_with('?') => patterns.push(arg[1..].to_string()),
            _ if arg.starts_with('<') => jobs.push(Job {
                source: Source::Literal(arg.clone()),
                patterns: patterns.clone(),
                dump,
                chunk_size,
            }),
            _ if arg.starts_with('-') => {
                return Err(format!("unknown option: {}", arg));
            }
            _ => jobs.push(Job {
                source: Source::File(PathBuf::from(arg)),
                patterns: patterns.clone(),
                dump,
                chunk_size,
            }),
        }
        i += 1;
    }

    if jobs.is_empty() {
        return Err("no input document specified".to_string());
    }

    Ok(Config { jobs })
}

fn print_help() {
    eprintln!(
        r#"cxml - chunked XML parser and search tool

USAGE:
    cxml [OPTIONS] [?PATTERN...] <DOCUMENT>...

A DOCUMENT starting with '<' is parsed as a literal string; anything else
is a file path, read and parsed in fixed-size chunks. Arguments apply
left to right, so options and patterns affect the documents after them.

OPTIONS:
    ?PATTERN               Dump every element whose key is PATTERN
    -,  --text             Dump the flattened text content
    =,  --attributes       Dump the attribute list
        --markup           Dump markup (default)
    -j, --json             Dump the element tree as JSON
    -c, --chunk-size <N>   File read size in bytes (default 95)
    -h, --help             Print help information
    -V, --version          Print version information

ENVIRONMENT:
    RUST_LOG               Log filter (default: chunkxml_core=warn)

EXAMPLES:
    cxml '<a><b>hi</b></a>'             Echo a literal document
    cxml ?title catalog.xml             Dump every <title> element
    cxml - ?title catalog.xml           Print the text of every title
    cxml = ?book catalog.xml            List the attributes of each book
    cxml -c 1 -j feed.xml               Parse byte by byte, dump as JSON
"#
    );
}

// =============================================================================
// Parsing
// =============================================================================

fn process_job(job: &Job, out: &mut impl Write) -> Result<(), String> {
    let ParseResult { document, error } = match &job.source {
        Source::Literal(text) => parse_with_recovery(text.as_bytes()),
        Source::File(path) => read_chunked(path, job.chunk_size)?,
    };

    if let Some(error) = error {
        let released = document.free();
        debug!(
            elements = released.elements,
            attributes = released.attributes,
            "released partial tree"
        );
        return Err(format!("{}: {}", job.source, error));
    }

    let written = dump_document(&document, job, out);
    document.free();
    written.map_err(|e| format!("failed to write output: {}", e))
}

fn read_chunked(path: &Path, chunk_size: usize) -> Result<ParseResult, String> {
    let mut file =
        File::open(path).map_err(|e| format!("failed to open '{}': {}", path.display(), e))?;

    let mut parser = Parser::new();
    let mut buf = vec![0u8; chunk_size];

    loop {
        let read = match file.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                parser.finish_with_recovery().document.free();
                return Err(format!("failed to read '{}': {}", path.display(), e));
            }
        };
        // A failed feed poisons the parser; finish reports the error
        if parser.feed(&buf[..read]).is_err() {
            break;
        }
    }

    Ok(parser.finish_with_recovery())
}

fn dump_document(doc: &Document, job: &Job, out: &mut impl Write) -> io::Result<()> {
    if job.patterns.is_empty() {
        for id in doc.top_level() {
            job.dump.write(doc, id, out)?;
        }
        return Ok(());
    }

    let Some(root) = doc.root() else {
        return Ok(());
    };
    for pattern in &job.patterns {
        let mut found = doc.find(root, pattern.as_str());
        while let Some(id) = found {
            job.dump.write(doc, id, out)?;
            found = doc.find_next(id, pattern.as_str());
        }
    }
    Ok(())
}

// =============================================================================
// Dump Formats
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dump {
    /// Re-serialized markup.
    Markup,
    /// Flattened text content, one line per element.
    Text,
    /// `key="value"` pairs, one line per element.
    Attributes,
    /// Pretty-printed JSON subtree.
    Json,
}

impl Dump {
    fn write(&self, doc: &Document, id: NodeId, out: &mut impl Write) -> io::Result<()> {
        match self {
            Dump::Markup => {
                write_markup(doc, id, out)?;
                writeln!(out)
            }
            Dump::Text => match doc.content(id) {
                Some(text) => writeln!(out, "{}", text),
                None => Ok(()),
            },
            Dump::Attributes => {
                let attributes = doc[id].attributes();
                if attributes.is_empty() {
                    return Ok(());
                }
                for (i, attribute) in attributes.iter().enumerate() {
                    if i > 0 {
                        out.write_all(b" ")?;
                    }
                    write_attribute(&attribute.key, &attribute.value, out)?;
                }
                writeln!(out)
            }
            Dump::Json => {
                serde_json::to_writer_pretty(&mut *out, &JsonElement::new(doc, id))?;
                writeln!(out)
            }
        }
    }
}

fn write_markup(doc: &Document, id: NodeId, out: &mut impl Write) -> io::Result<()> {
    let element = &doc[id];
    let tag = match &element.data {
        NodeData::Text(text) => return out.write_all(text.as_bytes()),
        NodeData::Tag(tag) => tag,
    };

    if tag.form == TagForm::Passthrough {
        return write_passthrough(tag, out);
    }

    write!(out, "<{}", tag.key)?;
    write_attribute_list(tag, out)?;

    if element.first_child().is_none() {
        return out.write_all(b"/>");
    }

    out.write_all(b">")?;
    for child in doc.children(id) {
        write_markup(doc, child, out)?;
    }
    write!(out, "</{}>", tag.key)
}

fn write_passthrough(tag: &Tag, out: &mut impl Write) -> io::Result<()> {
    if tag.key.starts_with('?') {
        write!(out, "<{}", tag.key)?;
        write_attribute_list(tag, out)?;
        return out.write_all(b"?>");
    }
    if tag.key == "!--" {
        return write!(out, "<!--{}-->", tag.body.as_deref().unwrap_or(""));
    }
    match &tag.body {
        Some(body) => write!(out, "<{} {}>", tag.key, body),
        None => write!(out, "<{}>", tag.key),
    }
}

fn write_attribute_list(tag: &Tag, out: &mut impl Write) -> io::Result<()> {
    for attribute in &tag.attributes {
        out.write_all(b" ")?;
        write_attribute(&attribute.key, &attribute.value, out)?;
    }
    Ok(())
}

fn write_attribute(key: &str, value: &str, out: &mut impl Write) -> io::Result<()> {
    // Values are stored verbatim, so pick the quote the value cannot contain
    let quote = if value.contains('"') { '\'' } else { '"' };
    write!(out, "{}={}{}{}", key, quote, value, quote)
}

// =============================================================================
// JSON Output
// =============================================================================

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum JsonElement<'a> {
    Tag {
        key: &'a str,
        form: &'static str,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        attributes: Vec<JsonAttribute<'a>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        body: Option<&'a str>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        children: Vec<JsonElement<'a>>,
    },
    Text {
        value: &'a str,
    },
}

#[derive(Serialize)]
struct JsonAttribute<'a> {
    key: &'a str,
    value: &'a str,
}

impl<'a> JsonElement<'a> {
    fn new(doc: &'a Document, id: NodeId) -> Self {
        match &doc[id].data {
            NodeData::Text(text) => JsonElement::Text { value: text },
            NodeData::Tag(tag) => JsonElement::Tag {
                key: &tag.key,
                form: match tag.form {
                    TagForm::Open => "open",
                    TagForm::SelfClosing => "self-closing",
                    TagForm::Passthrough => "passthrough",
                },
                attributes: tag
                    .attributes
                    .iter()
                    .map(|a| JsonAttribute {
                        key: &a.key,
                        value: &a.value,
                    })
                    .collect(),
                body: tag.body.as_deref(),
                children: doc
                    .children(id)
                    .map(|child| JsonElement::new(doc, child))
                    .collect(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chunkxml_core::parse;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("cxml")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    fn dump(dump: Dump, input: &str, pattern: Option<&str>) -> String {
        let doc = parse(input.as_bytes()).unwrap();
        let job = Job {
            source: Source::Literal(input.to_string()),
            patterns: pattern.into_iter().map(String::from).collect(),
            dump,
            chunk_size: DEFAULT_CHUNK_SIZE,
        };
        let mut out = Vec::new();
        dump_document(&doc, &job, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_args_apply_left_to_right() {
        let config = parse_args(&args(&["<a/>", "?b", "-", "doc.xml", "=", "<c/>"])).unwrap();
        assert_eq!(config.jobs.len(), 3);

        assert_eq!(config.jobs[0].source, Source::Literal("<a/>".to_string()));
        assert!(config.jobs[0].patterns.is_empty());
        assert_eq!(config.jobs[0].dump, Dump::Markup);

        assert_eq!(config.jobs[1].source, Source::File(PathBuf::from("doc.xml")));
        assert_eq!(config.jobs[1].patterns, ["b"]);
        assert_eq!(config.jobs[1].dump, Dump::Text);

        assert_eq!(config.jobs[2].patterns, ["b"]);
        assert_eq!(config.jobs[2].dump, Dump::Attributes);
    }

    #[test]
    fn test_args_chunk_size() {
        let config = parse_args(&args(&["-c", "7", "doc.xml"])).unwrap();
        assert_eq!(config.jobs[0].chunk_size, 7);

        assert!(parse_args(&args(&["-c", "0", "doc.xml"])).is_err());
        assert!(parse_args(&args(&["-c"])).is_err());
    }

    #[test]
    fn test_args_errors() {
        assert!(parse_args(&args(&[])).is_err());
        assert!(parse_args(&args(&["--bogus", "doc.xml"])).is_err());
    }

    #[test]
    fn test_markup_dump() {
        let input = r#"<?xml version="1.0"?><!-- hi --><a x="1" y='say "no"'><b/>t<c></c></a>"#;
        let output = dump(Dump::Markup, input, None);
        assert_eq!(
            output,
            "<?xml version=\"1.0\"?>\n<!-- hi -->\n<a x=\"1\" y='say \"no\"'><b/>t<c/></a>\n"
        );
    }

    #[test]
    fn test_markup_dump_declaration() {
        let output = dump(Dump::Markup, "<!DOCTYPE note><note/>", None);
        assert_eq!(output, "<!DOCTYPE note>\n<note/>\n");
    }

    #[test]
    fn test_text_dump_with_pattern() {
        let output = dump(Dump::Text, "<a><b>hi</b><b>bye</b><b/></a>", Some("b"));
        assert_eq!(output, "hi\nbye\n");
    }

    #[test]
    fn test_attribute_dump() {
        let output = dump(Dump::Attributes, r#"<a><b k="1" j=2 /><b/></a>"#, Some("b"));
        assert_eq!(output, "k=\"1\" j=\"2\"\n");
    }

    #[test]
    fn test_json_dump() {
        let output = dump(Dump::Json, r#"<a k="v">x<b/></a>"#, None);
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["type"], "tag");
        assert_eq!(value["key"], "a");
        assert_eq!(value["attributes"][0]["value"], "v");
        assert_eq!(value["children"][0]["type"], "text");
        assert_eq!(value["children"][0]["value"], "x");
        assert_eq!(value["children"][1]["form"], "self-closing");
    }

    #[test]
    fn test_failed_literal_is_reported() {
        let job = Job {
            source: Source::Literal("<a><b></a>".to_string()),
            patterns: Vec::new(),
            dump: Dump::Markup,
            chunk_size: DEFAULT_CHUNK_SIZE,
        };
        let mut out = Vec::new();
        let err = process_job(&job, &mut out).unwrap_err();
        assert!(err.contains("expected </b>"), "{}", err);
        assert!(out.is_empty());
    }
}
