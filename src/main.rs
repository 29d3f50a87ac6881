mod db;
mod engine;
mod ipc;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

fn main() {
    // The workspace is fixed at startup and the store handle is opened here,
    // once; request handling receives it by injection.
    let Some(workspace) = std::env::args().nth(1).map(PathBuf::from) else {
        eprintln!("usage: academicd <workspace-dir>");
        std::process::exit(2);
    };
    let conn = match db::open_db(&workspace) {
        Ok(conn) => conn,
        Err(e) => {
            eprintln!("failed to open workspace db: {e:?}");
            std::process::exit(1);
        }
    };
    let mut state = ipc::AppState {
        workspace,
        db: conn,
    };

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // Can't reply without id; ignore.
                let _ = writeln!(
                    stdout,
                    "{{\"ok\":false,\"error\":{{\"code\":\"bad_json\",\"message\":\"{}\"}}}}",
                    e
                );
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
}
