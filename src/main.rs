use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use parsefuse::protocol::{io_block_size, ByteOrder, DumpFormat, DEFAULT_CAPACITY};
use parsefuse::render::{renderer, OutputFormat, DEFAULT_LIMIT};
use parsefuse::{abi, Dissector};
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Decode a FUSE traffic dump.
#[derive(Debug, Parser)]
#[command(name = "parsefuse", version)]
struct Cli {
    /// Dump file to read; standard input when omitted or `-`
    input: Option<PathBuf>,

    /// Output file; `-` for standard output
    #[arg(short, long, default_value = "-")]
    output: PathBuf,

    /// Truncate blobs in the output to this many bytes (0: no limit)
    #[arg(long, default_value_t = DEFAULT_LIMIT)]
    lim: usize,

    /// Output format: fmt, json, null or pairup
    #[arg(long, default_value = "fmt")]
    format: OutputFormat,

    /// Byte order of the dump: native, le or be
    #[arg(long, default_value = "native")]
    bytesex: ByteOrder,

    /// Dump format version: 1 or 2
    #[arg(long, default_value = "2")]
    dumpformat: DumpFormat,

    /// Print the compiled FUSE protocol tables and exit
    #[arg(long)]
    showproto: bool,

    /// Print the compiled message shapes and structure layouts and exit
    #[arg(long)]
    showmessages: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries the decoded records.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into()))
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    let result = run(&cli);
    if let Err(e) = &result {
        error!("Error: {:#}", e);
        std::process::exit(1);
    }
    result
}

fn run(cli: &Cli) -> Result<()> {
    let mut out = open_output(&cli.output)?;

    if cli.showproto || cli.showmessages {
        if cli.showproto {
            write_protocol(&mut out)?;
        }
        if cli.showmessages {
            write_messages(&mut out)?;
        }
        out.flush()?;
        return Ok(());
    }

    let (source, capacity) = open_input(cli.input.as_deref())?;
    let dissector = Dissector::builder()
        .byte_order(cli.bytesex)
        .dump_format(cli.dumpformat)
        .buffer_capacity(capacity)
        .build(source);

    let mut render = renderer(cli.format, out, cli.lim);
    for record in dissector {
        let record = record.context("failed to decode dump")?;
        render.render(&record).context("failed to write output")?;
    }
    render.finish()?;
    Ok(())
}

fn open_input(path: Option<&std::path::Path>) -> Result<(Box<dyn Read>, usize)> {
    match path {
        Some(path) if path.as_os_str() != "-" => {
            let file = File::open(path)
                .with_context(|| format!("failed to open {}", path.display()))?;
            let capacity = io_block_size(&file);
            Ok((Box::new(file), capacity))
        }
        _ => Ok((Box::new(io::stdin().lock()), DEFAULT_CAPACITY)),
    }
}

fn open_output(path: &std::path::Path) -> Result<Box<dyn Write>> {
    if path.as_os_str() == "-" {
        return Ok(Box::new(BufWriter::new(io::stdout().lock())));
    }
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    Ok(Box::new(BufWriter::new(file)))
}

fn write_protocol(out: &mut dyn Write) -> io::Result<()> {
    writeln!(
        out,
        "FUSE protocol {}.{}",
        abi::FUSE_KERNEL_VERSION,
        abi::FUSE_KERNEL_MINOR_VERSION
    )?;
    for op in abi::OPCODES {
        let reply = match op.reply {
            Some(_) => "",
            None => " (no reply)",
        };
        writeln!(out, "{:>5} {}{}", op.code, op.name, reply)?;
    }
    for notification in abi::NOTIFICATIONS {
        writeln!(out, "{:>5} {}", notification.code, notification.name)?;
    }
    Ok(())
}

fn write_messages(out: &mut dyn Write) -> io::Result<()> {
    for op in abi::OPCODES {
        writeln!(out, "{}", op.name)?;
        writeln!(out, "  request: {}", abi::describe(op.request))?;
        if let Some(reply) = op.reply {
            writeln!(out, "  reply:   {}", abi::describe(reply))?;
        }
    }
    for notification in abi::NOTIFICATIONS {
        writeln!(out, "{}", notification.name)?;
        writeln!(out, "  body:    {}", abi::describe(notification.body))?;
    }
    writeln!(out)?;
    for layout in abi::layouts() {
        writeln!(out, "{layout}")?;
    }
    Ok(())
}
