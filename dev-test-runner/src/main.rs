//! Re-runs every fixture under `testdata/` and reports (or rewrites) outputs
//! that no longer match.
use std::path::{Path, PathBuf};

use clap::Parser;
use colored::Colorize;
use gencodec::Config;
use once_cell::sync::Lazy;
use regex::Regex;

static HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\A// Code generated by \S+\. DO NOT EDIT\.\n\npackage \w+\n").expect("header pattern compiles"));

#[derive(Parser, Debug)]
struct Opts {
    /// fixture root
    #[arg(long, default_value = "testdata")]
    root: PathBuf,

    /// only run cases whose name matches this regex
    #[arg(long)]
    filter: Option<Regex>,

    /// overwrite output.go with what is generated now
    #[arg(long)]
    update: bool,
}

enum Verdict {
    Pass,
    Updated,
    Fail(String),
}

fn main() {
    let opts = Opts::parse();
    let cases = match list_cases(&opts.root) {
        Ok(cases) => cases,
        Err(error) => {
            eprintln!("{} can't list {}: {error}", "error:".red().bold(), opts.root.display());
            std::process::exit(2);
        }
    };

    let mut failed = 0;
    let mut ran = 0;
    for dir in cases {
        let name = dir.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
        if let Some(filter) = &opts.filter
            && !filter.is_match(&name)
        {
            continue;
        }
        ran += 1;
        match run_case(&dir, opts.update) {
            Verdict::Pass => println!("{} {name}", "ok".green()),
            Verdict::Updated => println!("{} {name}", "updated".cyan()),
            Verdict::Fail(report) => {
                failed += 1;
                println!("{} {name}\n{report}", "FAIL".red().bold());
            }
        }
    }
    println!("{ran} cases, {failed} failed");
    if failed > 0 {
        std::process::exit(1);
    }
}

fn list_cases(root: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut cases = Vec::new();
    for entry in std::fs::read_dir(root)? {
        let path = entry?.path();
        if path.join("case.json").is_file() {
            cases.push(path);
        }
    }
    cases.sort();
    Ok(cases)
}

fn run_case(dir: &Path, update: bool) -> Verdict {
    let config = match load_case(dir) {
        Ok(config) => config,
        Err(message) => return Verdict::Fail(message),
    };
    let generated = match config.process() {
        Ok(generated) => generated,
        Err(error) => return Verdict::Fail(format!("  generation failed: {error}")),
    };
    if !HEADER.is_match(&generated.code) {
        return Verdict::Fail("  output does not start with the generated-code header".to_string());
    }
    let golden = dir.join("output.go");
    if update {
        return match std::fs::write(&golden, &generated.code) {
            Ok(()) => Verdict::Updated,
            Err(error) => Verdict::Fail(format!("  can't write {}: {error}", golden.display())),
        };
    }
    match std::fs::read_to_string(&golden) {
        Ok(want) if want == generated.code => Verdict::Pass,
        Ok(want) => Verdict::Fail(first_difference(&want, &generated.code)),
        Err(error) => Verdict::Fail(format!("  can't read {}: {error}", golden.display())),
    }
}

fn load_case(dir: &Path) -> Result<Config, String> {
    let path = dir.join("case.json");
    let text = std::fs::read_to_string(&path).map_err(|e| format!("  can't read {}: {e}", path.display()))?;
    let de = &mut serde_json::Deserializer::from_str(&text);
    let mut config: Config = serde_path_to_error::deserialize(de)
        .map_err(|e| format!("  {} at {}: {}", path.display(), e.path(), e.inner()))?;
    config.dir = dir.to_path_buf();
    Ok(config)
}

fn first_difference(want: &str, got: &str) -> String {
    let mut want_lines = want.lines();
    let mut got_lines = got.lines();
    let mut line = 1;
    loop {
        match (want_lines.next(), got_lines.next()) {
            (Some(w), Some(g)) if w == g => line += 1,
            (None, None) => return "  outputs differ only in line endings".to_string(),
            (w, g) => {
                return format!(
                    "  line {line}:\n  {} {}\n  {} {}",
                    "-".red(),
                    w.unwrap_or("<end of file>"),
                    "+".green(),
                    g.unwrap_or("<end of file>"),
                );
            }
        }
    }
}
