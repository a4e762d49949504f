//! Process adapter for the `osm2rdf` converter.
//!
//! Each conversion stages the payload under `{workdir}/input/`, runs the
//! converter (inside Docker or as a local binary) and reads the
//! bzip2-compressed Turtle it leaves under `{workdir}/output/`. Staged files
//! are removed however the conversion ends.

use std::{
    ffi::OsString,
    io::{self, Read},
    process::{Command, Stdio},
    sync::{Mutex, PoisonError},
};

use bzip2::read::BzDecoder;
use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, warn};
use osmsync_core::{ConversionError, Converter, Triples};

const LOG_TARGET: &str = "osmsync::osm2rdf";
const INPUT_DIR: &str = "input";
const OUTPUT_DIR: &str = "output";
const SCRATCH_DIR: &str = "scratch";
const INPUT_FILE: &str = "tmp.osm";
const OUTPUT_FILE: &str = "tmp.osm.ttl.bz2";

/// How the converter is launched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Osm2RdfRunner {
    /// `docker run --rm` with the staging directories mounted.
    Docker {
        /// Image providing the converter entrypoint.
        image: String,
    },
    /// A converter executable on the host.
    Binary {
        /// Path to the executable.
        path: Utf8PathBuf,
    },
}

/// Staging layout below a working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Workdir {
    input: Utf8PathBuf,
    output: Utf8PathBuf,
    scratch: Utf8PathBuf,
}

impl Workdir {
    fn under(root: &Utf8Path) -> Self {
        Self {
            input: root.join(INPUT_DIR),
            output: root.join(OUTPUT_DIR),
            scratch: root.join(SCRATCH_DIR),
        }
    }

    fn input_file(&self) -> Utf8PathBuf {
        self.input.join(INPUT_FILE)
    }

    fn output_file(&self) -> Utf8PathBuf {
        self.output.join(OUTPUT_FILE)
    }
}

/// Removes staged files when dropped.
struct StagingGuard<'a> {
    files: [Utf8PathBuf; 2],
    _writer: std::sync::MutexGuard<'a, ()>,
}

impl Drop for StagingGuard<'_> {
    fn drop(&mut self) {
        for file in &self.files {
            if let Err(err) = osmsync_fs::remove_file_if_exists(file) {
                warn!(target: LOG_TARGET, "failed to remove staged file {file}: {err}");
            }
        }
    }
}

/// [`Converter`] that shells out to `osm2rdf`.
///
/// Only one conversion runs at a time per instance; the staging directories
/// are shared state.
#[derive(Debug)]
pub struct Osm2RdfConverter {
    workdir: Workdir,
    runner: Osm2RdfRunner,
    writer: Mutex<()>,
}

impl Osm2RdfConverter {
    /// Prepare the staging directories below `root`.
    ///
    /// The root is canonicalised so Docker bind mounts receive absolute
    /// paths.
    ///
    /// # Errors
    /// Returns [`ConversionError::Staging`] when a directory cannot be
    /// created or resolved.
    pub fn new(root: &Utf8Path, runner: Osm2RdfRunner) -> Result<Self, ConversionError> {
        let staged = Workdir::under(root);
        for dir in [&staged.input, &staged.output, &staged.scratch] {
            osmsync_fs::ensure_dir(dir).map_err(|source| staging(dir, source))?;
        }
        let absolute = root
            .canonicalize_utf8()
            .map_err(|source| staging(root, source))?;
        Ok(Self {
            workdir: Workdir::under(&absolute),
            runner,
            writer: Mutex::new(()),
        })
    }

    /// Program and arguments for one conversion.
    #[must_use]
    pub fn command_line(&self) -> (OsString, Vec<String>) {
        match &self.runner {
            Osm2RdfRunner::Docker { image } => {
                let mount = |host: &Utf8Path, guest: &str| format!("{host}/:/{guest}/");
                let args = vec![
                    "run".to_owned(),
                    "--rm".to_owned(),
                    "-v".to_owned(),
                    mount(&self.workdir.input, INPUT_DIR),
                    "-v".to_owned(),
                    mount(&self.workdir.output, OUTPUT_DIR),
                    "-v".to_owned(),
                    mount(&self.workdir.scratch, SCRATCH_DIR),
                    image.clone(),
                    format!("/{INPUT_DIR}/{INPUT_FILE}"),
                    "-o".to_owned(),
                    format!("/{OUTPUT_DIR}/{OUTPUT_FILE}"),
                    "-t".to_owned(),
                    format!("/{SCRATCH_DIR}/"),
                ];
                (OsString::from("docker"), args)
            }
            Osm2RdfRunner::Binary { path } => {
                let args = vec![
                    self.workdir.input_file().into_string(),
                    "-o".to_owned(),
                    self.workdir.output_file().into_string(),
                    "-t".to_owned(),
                    format!("{}/", self.workdir.scratch),
                ];
                (OsString::from(path.as_str()), args)
            }
        }
    }

    fn stage<'a>(
        &self,
        writer: std::sync::MutexGuard<'a, ()>,
        payload: &str,
    ) -> Result<StagingGuard<'a>, ConversionError> {
        let input = self.workdir.input_file();
        let output = self.workdir.output_file();
        let guard = StagingGuard {
            files: [input.clone(), output.clone()],
            _writer: writer,
        };
        osmsync_fs::remove_file_if_exists(&output).map_err(|source| staging(&output, source))?;
        osmsync_fs::write_file(&input, payload).map_err(|source| staging(&input, source))?;
        Ok(guard)
    }

    fn run(&self) -> Result<(), ConversionError> {
        let (program, args) = self.command_line();
        debug!(target: LOG_TARGET, "running {} {}", program.to_string_lossy(), args.join(" "));
        let output = Command::new(&program)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| ConversionError::Launch {
                program: program.to_string_lossy().into_owned(),
                source,
            })?;
        if output.status.success() {
            return Ok(());
        }
        debug!(
            target: LOG_TARGET,
            "converter stderr: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
        Err(ConversionError::Exit {
            code: output.status.code(),
        })
    }

    fn read_output(&self) -> Result<String, ConversionError> {
        let path = self.workdir.output_file();
        let compressed = osmsync_fs::read_file(&path).map_err(|source| output(&path, source))?;
        let mut text = String::new();
        BzDecoder::new(compressed.as_slice())
            .read_to_string(&mut text)
            .map_err(|source| output(&path, source))?;
        Ok(text)
    }
}

impl Converter for Osm2RdfConverter {
    fn convert(&self, payload: &str) -> Result<Triples, ConversionError> {
        let writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let _staged = self.stage(writer, payload)?;
        self.run()?;
        Ok(Triples::new(self.read_output()?).strip_headers())
    }
}

fn staging(path: &Utf8Path, source: io::Error) -> ConversionError {
    ConversionError::Staging {
        path: path.to_string(),
        source,
    }
}

fn output(path: &Utf8Path, source: io::Error) -> ConversionError {
    ConversionError::Output {
        path: path.to_string(),
        source,
    }
}
