mod parse;
mod usage;

use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::{ExecutableCommand, QueueableCommand, cursor, terminal};
use libredisx::{Protocol, Redis, Resp, print_json, print_resp};
use parse::{Command, parse_line};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use usage::help;

const HISTORY_CAPACITY: usize = 100;

/// Command-line client for Redis / Valkey servers.
#[derive(Parser, Debug)]
#[command(name = "redisx-cli", version, about, disable_help_flag = true)]
struct Args {
    /// Server hostname
    #[arg(short = 'h', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port (default: 6379)
    #[arg(short, long)]
    port: Option<u16>,

    /// Server connection timeout in seconds (decimals allowed)
    #[arg(short, long)]
    timeout: Option<f64>,

    /// Password to use when connecting to the server
    #[arg(short = 'a', long)]
    pass: Option<String>,

    /// Used to send ACL style 'AUTH username pass'. Needs -a
    #[arg(short, long, requires = "pass")]
    user: Option<String>,

    /// Execute the command N times
    #[arg(short, long, default_value_t = 1)]
    repeat: u32,

    /// With -r, wait <interval> seconds between commands (e.g. -i 0.1)
    #[arg(short, long, default_value_t = 1.0)]
    interval: f64,

    /// Database number
    #[arg(short = 'n', long, default_value_t = 0)]
    db: i64,

    /// Start session in RESP2 protocol mode
    #[arg(short = '2', long)]
    resp2: bool,

    /// Start session in RESP3 protocol mode
    #[arg(short = '3', long, conflicts_with = "resp2")]
    resp3: bool,

    /// Print replies as JSON
    #[arg(long)]
    json: bool,

    /// Log debug messages to stderr
    #[arg(short, long)]
    verbose: bool,

    /// Print help
    #[arg(long, action = ArgAction::Help)]
    help: Option<bool>,

    /// Command and arguments to send. Starts an interactive session if
    /// omitted.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("REDISX_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn configure(args: &Args) -> Result<Redis> {
    let redis = Redis::new(&args.host);

    if let Some(port) = args.port {
        redis.set_port(port)?;
    }
    if let Some(user) = &args.user {
        redis.set_user(user)?;
    }
    if let Some(pass) = &args.pass {
        redis.set_password(pass)?;
    }
    if args.db > 0 {
        redis.select_db(args.db)?;
    }
    if let Some(timeout) = args.timeout.filter(|t| *t > 0.0) {
        redis.set_socket_timeout((1000.0 * timeout).ceil() as i64)?;
    }
    if args.resp2 {
        redis.set_protocol(Protocol::Resp2)?;
    } else if args.resp3 {
        redis.set_protocol(Protocol::Resp3)?;
    }

    Ok(redis)
}

fn print_reply(reply: &Resp, json: bool) {
    if json {
        print_json("REPLY", reply);
    } else {
        print_resp(reply);
    }
}

/// Sends the command given on the command line, possibly repeatedly.
fn run_command(redis: &Redis, args: &Args) -> Result<()> {
    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        ctrlc::set_handler(move || stop.store(true, Ordering::SeqCst))
            .context("failed to install Ctrl-C handler")?;
    }

    for i in 0..args.repeat {
        if i > 0 && args.interval > 0.0 {
            thread::sleep(Duration::from_secs_f64(args.interval));
        }
        if stop.load(Ordering::SeqCst) {
            debug!("interrupted after {i} iterations");
            break;
        }

        match redis.array_request(&args.command) {
            Ok(reply) => print_reply(&reply, args.json),
            Err(e) => eprintln!("ERROR: {e}"),
        }
    }

    Ok(())
}

#[derive(Default, Debug)]
struct History {
    commands: VecDeque<String>,
    /// Position while browsing, 0 being the oldest entry
    current_index: Option<usize>,
}

impl History {
    fn push(&mut self, command: String) {
        self.current_index = None;

        if self.commands.back() == Some(&command) {
            return;
        }
        if self.commands.len() == HISTORY_CAPACITY {
            self.commands.pop_front();
        }
        self.commands.push_back(command);
    }

    fn previous_command(&mut self) -> Option<&String> {
        let index = match self.current_index {
            None => self.commands.len().checked_sub(1)?,
            Some(0) => return None,
            Some(pos) => pos - 1,
        };
        self.current_index = Some(index);
        self.commands.get(index)
    }

    fn next_command(&mut self) -> Option<&String> {
        let pos = self.current_index?;
        if pos + 1 >= self.commands.len() {
            self.current_index = None;
            return None;
        }
        self.current_index = Some(pos + 1);
        self.commands.get(pos + 1)
    }
}

struct TerminalGuard {}

impl TerminalGuard {
    fn new() -> Result<Self> {
        terminal::enable_raw_mode().context("failed to enable raw terminal mode")?;
        Ok(Self {})
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

enum Input {
    Line(String),
    Exit,
}

fn redraw(prompt: &str, line: &str, cursor_pos: usize) -> Result<()> {
    let mut stdout = io::stdout();
    stdout.queue(cursor::MoveToColumn(0))?;
    stdout.queue(terminal::Clear(terminal::ClearType::UntilNewLine))?;
    print!("{prompt}{line}");
    stdout.queue(cursor::MoveToColumn((prompt.chars().count() + cursor_pos) as u16))?;
    stdout.flush()?;
    Ok(())
}

/// Handles user interaction with the terminal.
/// Returns the line entered once `Enter` is pressed.
fn read_line(prompt: &str, history: &mut History) -> Result<Input> {
    let mut line: Vec<char> = Vec::new();
    let mut cursor_pos: usize = 0;

    redraw(prompt, "", 0)?;

    loop {
        let Event::Key(key_event) = event::read()? else {
            continue;
        };
        if key_event.kind != KeyEventKind::Press {
            continue;
        }

        let ctrl = key_event.modifiers.contains(KeyModifiers::CONTROL);

        match key_event.code {
            KeyCode::Char('c') | KeyCode::Char('d') if ctrl => {
                print!("\r\n");
                return Ok(Input::Exit);
            }
            KeyCode::Char('l') if ctrl => {
                io::stdout().execute(terminal::Clear(terminal::ClearType::All))?;
                io::stdout().execute(cursor::MoveTo(0, 0))?;
            }
            KeyCode::Char(c) => {
                line.insert(cursor_pos, c);
                cursor_pos += 1;
            }
            KeyCode::Backspace if cursor_pos > 0 => {
                cursor_pos -= 1;
                line.remove(cursor_pos);
            }
            KeyCode::Delete if cursor_pos < line.len() => {
                line.remove(cursor_pos);
            }
            KeyCode::Left if cursor_pos > 0 => cursor_pos -= 1,
            KeyCode::Right if cursor_pos < line.len() => cursor_pos += 1,
            KeyCode::Home => cursor_pos = 0,
            KeyCode::End => cursor_pos = line.len(),
            KeyCode::Up => {
                if let Some(cmd) = history.previous_command() {
                    line = cmd.chars().collect();
                    cursor_pos = line.len();
                }
            }
            KeyCode::Down => {
                line = history
                    .next_command()
                    .map(|l| l.chars().collect())
                    .unwrap_or_default();
                cursor_pos = line.len();
            }
            KeyCode::Enter => {
                print!("\r\n");
                io::stdout().flush()?;
                return Ok(Input::Line(line.into_iter().collect()));
            }
            KeyCode::Esc => {
                print!("\r\n");
                return Ok(Input::Exit);
            }
            _ => continue,
        }

        let text: String = line.iter().collect();
        redraw(prompt, &text, cursor_pos)?;
    }
}

/// Prints multi-line output while the terminal is in raw mode.
fn print_raw(text: &str) {
    print!("{}\r\n", text.replace('\n', "\r\n"));
}

fn repl(redis: &Redis, args: &Args) -> Result<()> {
    println!("redisx-cli {} connected to {}", libredisx::VERSION, redis.id());
    println!("If stuck try `HELP`");
    println!("To end session `QUIT` or `EXIT`, or press `Esc`");
    println!("Use ↑/↓ arrows for command history");

    let _guard = TerminalGuard::new()?;
    let mut history = History::default();
    let prompt = format!("{}> ", redis.id());

    loop {
        let line = match read_line(&prompt, &mut history)? {
            Input::Line(line) => line,
            Input::Exit => break,
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        history.push(line.to_string());

        match parse_line(line) {
            Command::Help => help(),
            Command::Quit => break,
            Command::Clear => {
                io::stdout().execute(terminal::Clear(terminal::ClearType::All))?;
                io::stdout().execute(cursor::MoveTo(0, 0))?;
            }
            Command::Reconnect => match redis.reconnect(false) {
                Ok(()) => print_raw("OK"),
                Err(e) => print_raw(&format!("ERROR: {e}")),
            },
            Command::ParseError(err) => print_raw(&format!("ERROR: {err}")),
            Command::Request(request) => match redis.array_request(&request) {
                Ok(reply) if args.json => print_raw(&reply.to_json("REPLY")),
                Ok(reply) => print_raw(&reply.pretty()),
                Err(e) => print_raw(&format!("ERROR: {e}")),
            },
        }
    }

    println!("Exiting..\r");
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let redis = configure(&args)?;
    redis
        .connect(false)
        .with_context(|| format!("failed to connect to {}", redis.id()))?;

    let result = if args.command.is_empty() {
        repl(&redis, &args)
    } else {
        run_command(&redis, &args)
    };

    redis.disconnect();
    result
}
