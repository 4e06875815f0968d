// src/main.rs

use std::{env, path::PathBuf, process};

use anyhow::Result;

use wavescope::ui;

fn main() -> Result<()> {
    env_logger::init();

    let mut args = env::args().skip(1);
    let track = match args.next() {
        Some(arg) if arg == "-h" || arg == "--help" => {
            eprintln!("usage: wavescope [AUDIO_FILE]");
            process::exit(0);
        }
        Some(arg) => Some(PathBuf::from(arg)),
        None => None,
    };

    ui::run(track)
}
