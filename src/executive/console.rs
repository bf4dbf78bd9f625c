//! Socket input console: a line-oriented TCP listener that enqueues
//! commands for the executive. Commands are parsed here but only applied
//! by the stepping thread at tick boundaries.

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;

use crossbeam_channel::Sender;
use log::{info, warn};

use crate::executive::Command;

/// Parse one console line into a command.
///
/// Grammar: `set <property> <value>` | `hold` | `resume` | `holddown` |
/// `quit`.
pub fn parse_line(line: &str) -> Option<Command> {
    let mut parts = line.split_whitespace();
    match parts.next()? {
        "set" => {
            let path = parts.next()?.to_string();
            let value: f64 = parts.next()?.parse().ok()?;
            Some(Command::Set { path, value })
        }
        "hold" => Some(Command::Hold),
        "resume" => Some(Command::Resume),
        "holddown" => Some(Command::HoldDown),
        "quit" => Some(Command::Quit),
        _ => None,
    }
}

fn serve_client(stream: TcpStream, tx: Sender<Command>) {
    let peer = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    info!("console client connected: {}", peer);
    let mut writer = match stream.try_clone() {
        Ok(w) => w,
        Err(_) => return,
    };
    let reader = BufReader::new(stream);
    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(_) => break,
        };
        match parse_line(&line) {
            Some(command) => {
                let quit = matches!(command, Command::Quit);
                if tx.send(command).is_err() {
                    break;
                }
                let _ = writeln!(writer, "ok");
                if quit {
                    break;
                }
            }
            None => {
                let _ = writeln!(writer, "error: unrecognized command");
            }
        }
    }
    info!("console client disconnected: {}", peer);
}

/// Bind the console on `port` (0 picks a free port) and serve clients on a
/// background thread. Returns the bound port.
pub fn spawn(port: u16, tx: Sender<Command>) -> std::io::Result<u16> {
    let listener = TcpListener::bind(("127.0.0.1", port))?;
    let bound = listener.local_addr()?.port();
    info!("input console listening on port {}", bound);
    thread::spawn(move || {
        for stream in listener.incoming() {
            match stream {
                Ok(stream) => serve_client(stream, tx.clone()),
                Err(err) => {
                    warn!("console accept failed: {}", err);
                    break;
                }
            }
        }
    });
    Ok(bound)
}
