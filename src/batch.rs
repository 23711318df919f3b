//! Batch mode: manifests listing many generation requests, run in parallel.
use std::path::{Path, PathBuf};

use rayon::prelude::*;

use crate::emit::SourceFormatter;
use crate::error::Error;
use crate::path_de;
use crate::pipeline::{Config, Generated};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone)]
pub struct Job {
    pub manifest: PathBuf,
    pub config: Config,
}

#[derive(Debug)]
pub struct Outcome {
    pub job: Job,
    pub result: Result<Generated, Error>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

/// Reads one manifest. Relative `dir` and `out` paths are taken relative to
/// the manifest's own directory.
pub fn load_manifest(path: &Path) -> Result<Vec<Job>, Error> {
    let text = std::fs::read_to_string(path).map_err(|source| Error::Io { path: path.to_path_buf(), source })?;
    let configs: Vec<Config> = path_de::from_str_with_path(&text)
        .map_err(|e| Error::Manifest { path: path.to_path_buf(), message: e.to_string() })?;
    let base = path.parent().unwrap_or(Path::new(""));
    Ok(configs
        .into_iter()
        .map(|mut config| {
            config.dir = base.join(&config.dir);
            config.out = config.out.map(|out| if out == Path::new("-") { out } else { base.join(out) });
            Job { manifest: path.to_path_buf(), config }
        })
        .collect())
}

/// Loads every manifest matched by `patterns`.
pub fn load_jobs<I>(patterns: I) -> Result<Vec<Job>, Error>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut jobs = Vec::new();
    for manifest in resolve_file_path_patterns(patterns)? {
        jobs.extend(load_manifest(&manifest)?);
    }
    Ok(jobs)
}

/// Runs all jobs; each one writes its own output. A failing job does not stop
/// the others.
pub fn run(jobs: Vec<Job>, formatter: &dyn SourceFormatter) -> Vec<Outcome> {
    log::info!("running {} jobs", jobs.len());
    jobs.into_par_iter()
        .map(|job| {
            let result = job.config.process_with(formatter).and_then(|generated| {
                generated.write_to(job.config.out.as_deref())?;
                Ok(generated)
            });
            if let Err(error) = &result {
                log::debug!("{} ({}) failed: {error}", job.config.type_name, job.manifest.display());
            }
            Outcome { job, result }
        })
        .collect()
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn resolve_file_path_patterns<I>(patterns: I) -> Result<Vec<PathBuf>, Error>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'['))
    }
    let manifest_error = |pattern: &str, message: String| Error::Manifest { path: PathBuf::from(pattern), message };

    let mut out = Vec::<PathBuf>::new();
    for raw in patterns {
        let pattern = raw.as_ref();
        if has_glob_chars(pattern) {
            let entries = glob::glob(pattern).map_err(|e| manifest_error(pattern, e.to_string()))?;
            let before = out.len();
            for entry in entries {
                out.push(entry.map_err(|e| manifest_error(pattern, e.to_string()))?);
            }
            if out.len() == before {
                return Err(manifest_error(pattern, "glob pattern matched no files".to_string()));
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }
    Ok(out)
}
