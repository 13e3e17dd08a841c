//! Stand-in inference engine speaking the glyphline line protocol.
//!
//! Writes one status line to stdout, then answers every request line on stdin
//! with one response line. Fault-injection flags make it exit, hang or flood
//! stderr so the channel's failure handling can be exercised end to end.
//!
//! Usage:
//!   engine_stub [--mode counter|checksum|constant] [--label TEXT] [FLAGS]

use std::io::{self, BufRead, Write};
use std::thread;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use glyphline::core_modules::framing::parse_request_line;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    /// Answer with 0, 1, 2, ... in request order.
    Counter,
    /// Answer with the sum of the request values, three decimals.
    Checksum,
    /// Answer with `--label` every time.
    Constant,
}

#[derive(Debug, Parser)]
#[command(name = "engine_stub", about = "Scriptable stand-in for the inference engine")]
struct Args {
    #[arg(long, value_enum, default_value = "counter")]
    mode: Mode,

    #[arg(long, default_value = "7")]
    label: String,

    /// Exit with status 3 before writing the status line.
    #[arg(long)]
    exit_before_ack: bool,

    /// Stay alive but never write the status line.
    #[arg(long)]
    silent: bool,

    /// Exit this many milliseconds after the status line, answering nothing.
    #[arg(long)]
    exit_after_ms: Option<u64>,

    /// Read requests but never answer them.
    #[arg(long)]
    hang: bool,

    /// Sleep before every answer.
    #[arg(long, default_value_t = 0)]
    delay_ms: u64,

    /// Bytes of diagnostics written to stderr per request.
    #[arg(long, default_value_t = 0)]
    chatter: usize,

    /// Answer `bad-length` when a request does not hold this many values.
    #[arg(long)]
    expect_len: Option<usize>,
}

fn main() -> io::Result<()> {
    let args = Args::parse();

    if args.exit_before_ack {
        eprintln!("[stub] refusing to start");
        std::process::exit(3);
    }
    eprintln!("[stub] loading model weights");
    if args.silent {
        loop {
            thread::sleep(Duration::from_secs(60));
        }
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    writeln!(out, "Model Ready")?;
    out.flush()?;

    if let Some(ms) = args.exit_after_ms {
        thread::sleep(Duration::from_millis(ms));
        std::process::exit(0);
    }

    let stdin = io::stdin();
    let mut counter: u64 = 0;
    for line in stdin.lock().lines() {
        let line = line?;
        if line == "exit" {
            break;
        }
        if line.is_empty() {
            continue;
        }

        if args.chatter > 0 {
            let mut err = io::stderr().lock();
            let row = "# . # . # . # . # . # . # . # . # . # . # . # . # . # . #\n";
            let mut written = 0;
            while written < args.chatter {
                err.write_all(row.as_bytes())?;
                written += row.len();
            }
            err.flush()?;
        }
        if args.hang {
            continue;
        }
        if args.delay_ms > 0 {
            thread::sleep(Duration::from_millis(args.delay_ms));
        }

        let values = parse_request_line(&line).unwrap_or_default();
        let answer = match args.expect_len {
            Some(len) if values.len() != len => "bad-length".to_string(),
            _ => match args.mode {
                Mode::Counter => counter.to_string(),
                Mode::Checksum => format!("{:.3}", values.iter().map(|&v| v as f64).sum::<f64>()),
                Mode::Constant => args.label.clone(),
            },
        };
        counter += 1;

        writeln!(out, "{answer}")?;
        out.flush()?;
    }

    Ok(())
}
