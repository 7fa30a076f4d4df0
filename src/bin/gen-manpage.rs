//! Man page generator for spishim
//!
//! Writes `spishim.1` plus one page per subcommand (`spishim-write.1`, ...).
//!
//! Usage: cargo run --bin gen-manpage -- [output-dir]

use clap::{Command, CommandFactory};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[allow(dead_code)]
#[path = "../cli.rs"]
mod cli;

fn render(cmd: Command, path: &Path) -> io::Result<()> {
    let mut buffer = Vec::new();
    clap_mangen::Man::new(cmd).render(&mut buffer)?;
    fs::write(path, buffer)
}

/// Render every page into `output_dir`, returning the written paths
fn render_pages(output_dir: &Path) -> io::Result<Vec<PathBuf>> {
    fs::create_dir_all(output_dir)?;

    let cmd = cli::Cli::command();
    let name = cmd.get_name().to_string();
    let mut written = Vec::new();

    for sub in cmd.get_subcommands() {
        let sub_name = format!("{}-{}", name, sub.get_name());
        let path = output_dir.join(format!("{}.1", sub_name));
        render(sub.clone().name(sub_name), &path)?;
        written.push(path);
    }

    let path = output_dir.join(format!("{}.1", name));
    render(cmd, &path)?;
    written.insert(0, path);

    Ok(written)
}

fn main() -> io::Result<()> {
    let output_dir = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("man"));

    for path in render_pages(&output_dir)? {
        println!("Man page generated at: {}", path.display());
    }

    Ok(())
}
