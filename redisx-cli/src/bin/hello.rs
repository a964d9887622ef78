//! Connects to a server, sends `PING "Hello World!"` and prints the echo.
//!
//! Usage: `redisx-hello [host]`

use std::process::ExitCode;

use libredisx::{Redis, RespType};

const MESSAGE: &str = "Hello World!";

fn main() -> ExitCode {
    let host = std::env::args().nth(1).unwrap_or_else(|| "127.0.0.1".to_string());
    let redis = Redis::new(&host);

    if let Err(e) = redis.connect(false) {
        eprintln!("ERROR! Could not connect to {host}: {e}");
        return ExitCode::from(1);
    }

    let result = redis
        .request("PING", &[MESSAGE])
        .and_then(|reply| reply.check(Some(RespType::BulkString), 0).map(|_| reply));
    redis.disconnect();

    match result {
        Ok(reply) if reply.as_bytes() == Some(MESSAGE.as_bytes()) => {
            println!("{}", reply.as_text().unwrap_or_default());
            ExitCode::SUCCESS
        }
        Ok(reply) => {
            eprintln!("ERROR! Unexpected response: {}", reply.pretty());
            ExitCode::from(2)
        }
        Err(e) => {
            eprintln!("ERROR! Bad response: {e}");
            ExitCode::from(2)
        }
    }
}
