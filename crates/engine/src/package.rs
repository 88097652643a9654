//! Result packaging: staging command outputs where they can be downloaded.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use cmdbridge_types::{CoercedArguments, DownloadDescriptor};
use cmdbridge_util::sanitize_file_component;
use thiserror::Error;
use tracing::{debug, warn};
use zip::CompressionMethod;
use zip::ZipWriter;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;

use crate::classify::{APPLIANCES, OUT_DIR, OUT_FILE};
use crate::context::SubmissionContext;

/// Directory under the static root that holds staged downloads.
pub const DOWNLOAD_SUBDIR: &str = "tmp";

#[derive(Debug, Error)]
pub enum StagingError {
    #[error("staging I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write archive {path}: {source}")]
    Archive {
        path: PathBuf,
        #[source]
        source: ZipError,
    },
}

impl StagingError {
    fn io(path: &Path) -> impl FnOnce(io::Error) -> Self + '_ {
        move |source| Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Stages `out_dir` and `out_file` outputs under `{static_root}/tmp`.
#[derive(Debug, Clone)]
pub struct Packager {
    static_root: PathBuf,
}

impl Packager {
    pub fn new(static_root: impl Into<PathBuf>) -> Self {
        Self {
            static_root: static_root.into(),
        }
    }

    pub fn download_dir(&self) -> PathBuf {
        self.static_root.join(DOWNLOAD_SUBDIR)
    }

    /// Stages whatever outputs the arguments point at and describes the
    /// resulting download. When both are present the file wins.
    ///
    /// Staging failures are logged and yield no download.
    pub fn package(&self, command: &str, arguments: &CoercedArguments, context: &SubmissionContext) -> Option<DownloadDescriptor> {
        let mut download = None;
        if let Some(out_dir) = arguments.get_str(OUT_DIR) {
            let appliances = arguments.get_list(APPLIANCES).unwrap_or_default();
            download = self
                .archive_directory(Path::new(out_dir), command, appliances, context)
                .inspect_err(|error| warn!(command = %command, error = %error, "failed to archive output directory"))
                .ok();
        }
        if let Some(out_file) = arguments.get_str(OUT_FILE) {
            match self.copy_file(Path::new(out_file)) {
                Ok(Some(staged)) => download = Some(staged),
                Ok(None) => debug!(command = %command, out_file = %out_file, "command produced no output file"),
                Err(error) => warn!(command = %command, error = %error, "failed to stage output file"),
            }
        }
        download
    }

    /// Zips `out_dir` into `{timestamp}-{command}-{appliance}...zip`.
    ///
    /// The archive is written under a `.partial` name and renamed into place
    /// once complete. A failed run removes the partial file.
    pub fn archive_directory(
        &self,
        out_dir: &Path,
        command: &str,
        appliances: &[String],
        context: &SubmissionContext,
    ) -> Result<DownloadDescriptor, StagingError> {
        if !out_dir.is_dir() {
            return Err(StagingError::Io {
                path: out_dir.to_path_buf(),
                source: io::Error::new(io::ErrorKind::NotFound, "output directory does not exist"),
            });
        }
        let filename = archive_name(context.timestamp(), command, appliances);
        let download_dir = self.download_dir();
        fs::create_dir_all(&download_dir).map_err(StagingError::io(&download_dir))?;
        let archive_path = download_dir.join(&filename);
        let partial_path = download_dir.join(format!("{filename}.partial"));

        let entries = match write_archive(&partial_path, out_dir) {
            Ok(entries) => entries,
            Err(error) => {
                if let Err(cleanup) = fs::remove_file(&partial_path) {
                    debug!(path = %partial_path.display(), error = %cleanup, "no partial archive to remove");
                }
                return Err(error);
            }
        };
        if let Err(source) = fs::rename(&partial_path, &archive_path) {
            let _ = fs::remove_file(&partial_path);
            return Err(StagingError::Io {
                path: archive_path,
                source,
            });
        }

        debug!(archive = %archive_path.display(), entries, "archived output directory");
        Ok(download_for(filename))
    }

    /// Copies `out_file` under its own base name, if the command produced it.
    pub fn copy_file(&self, out_file: &Path) -> Result<Option<DownloadDescriptor>, StagingError> {
        if !out_file.is_file() {
            return Ok(None);
        }
        let Some(filename) = out_file.file_name().map(|name| name.to_string_lossy().into_owned()) else {
            return Ok(None);
        };
        let download_dir = self.download_dir();
        fs::create_dir_all(&download_dir).map_err(StagingError::io(&download_dir))?;
        let destination = download_dir.join(&filename);
        fs::copy(out_file, &destination).map_err(StagingError::io(&destination))?;
        debug!(source = %out_file.display(), destination = %destination.display(), "staged output file");
        Ok(Some(download_for(filename)))
    }
}

/// `{timestamp}-{command}-{appliance1}-{appliance2}....zip` with every
/// component reduced to file-name-safe characters.
pub fn archive_name(timestamp: &str, command: &str, appliances: &[String]) -> String {
    let mut name = format!("{timestamp}-{}", sanitize_file_component(command));
    for appliance in appliances {
        name.push('-');
        name.push_str(&sanitize_file_component(appliance));
    }
    name.push_str(".zip");
    name
}

fn download_for(filename: String) -> DownloadDescriptor {
    DownloadDescriptor {
        static_path: format!("{DOWNLOAD_SUBDIR}/{filename}"),
        filename,
    }
}

fn write_archive(archive_path: &Path, out_dir: &Path) -> Result<usize, StagingError> {
    let file = File::create(archive_path).map_err(StagingError::io(archive_path))?;
    let mut writer = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let entries = add_directory(&mut writer, out_dir, out_dir, options).map_err(|source| match source {
        ZipError::Io(source) => StagingError::Io {
            path: out_dir.to_path_buf(),
            source,
        },
        source => StagingError::Archive {
            path: archive_path.to_path_buf(),
            source,
        },
    })?;
    writer.finish().map_err(|source| StagingError::Archive {
        path: archive_path.to_path_buf(),
        source,
    })?;
    Ok(entries)
}

/// Adds every file below `dir` to the archive, named relative to `root`.
fn add_directory(
    writer: &mut ZipWriter<File>,
    root: &Path,
    dir: &Path,
    options: SimpleFileOptions,
) -> Result<usize, ZipError> {
    let mut paths = fs::read_dir(dir)?
        .map(|entry| entry.map(|entry| entry.path()))
        .collect::<Result<Vec<_>, _>>()?;
    paths.sort();

    let mut count = 0;
    for path in paths {
        let relative = path
            .strip_prefix(root)
            .map(|relative| relative.to_string_lossy().replace('\\', "/"))
            .unwrap_or_else(|_| path.to_string_lossy().into_owned());
        if path.is_dir() {
            writer.add_directory(format!("{relative}/"), options)?;
            count += add_directory(writer, root, &path, options)?;
        } else {
            writer.start_file(relative, options)?;
            writer.write_all(&fs::read(&path)?)?;
            count += 1;
        }
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cmdbridge_types::ArgValue;
    use std::io::Read;
    use tempfile::tempdir;
    use uuid::Uuid;
    use zip::ZipArchive;

    fn context() -> SubmissionContext {
        SubmissionContext::with_values("20240101-000000", Uuid::nil())
    }

    #[test]
    fn archive_name_joins_sanitized_appliances() {
        let appliances = vec!["dp1".to_string(), "dp2.example.com".to_string(), "lab/dp3".to_string()];
        assert_eq!(
            archive_name("20240101-000000", "export", &appliances),
            "20240101-000000-export-dp1-dp2.example.com-lab_dp3.zip"
        );
        assert_eq!(archive_name("20240101-000000", "export", &[]), "20240101-000000-export.zip");
    }

    #[test]
    fn directory_outputs_are_zipped_with_relative_entries() {
        let work = tempdir().unwrap();
        let out_dir = work.path().join("out");
        fs::create_dir_all(out_dir.join("dp1")).unwrap();
        fs::write(out_dir.join("dp1").join("export.xml"), "<config/>").unwrap();
        fs::write(out_dir.join("summary.txt"), "1 object").unwrap();

        let mut arguments = CoercedArguments::new();
        arguments.insert("appliances", ArgValue::List(vec!["dp1".into()]));
        arguments.insert("out_dir", ArgValue::Text(out_dir.to_string_lossy().into_owned()));

        let packager = Packager::new(work.path().join("static"));
        let download = packager.package("export", &arguments, &context()).expect("download");
        assert_eq!(download.filename, "20240101-000000-export-dp1.zip");
        assert_eq!(download.static_path, "tmp/20240101-000000-export-dp1.zip");

        let file = File::open(packager.download_dir().join(&download.filename)).unwrap();
        let mut archive = ZipArchive::new(file).unwrap();
        let mut content = String::new();
        archive.by_name("dp1/export.xml").unwrap().read_to_string(&mut content).unwrap();
        assert_eq!(content, "<config/>");
        assert!(archive.by_name("summary.txt").is_ok());
    }

    #[test]
    fn produced_files_are_copied_under_their_base_name() {
        let work = tempdir().unwrap();
        let out_file = work.path().join("20240101-000000-audit.xlsx");
        fs::write(&out_file, b"report").unwrap();

        let mut arguments = CoercedArguments::new();
        arguments.insert("out_file", ArgValue::Text(out_file.to_string_lossy().into_owned()));
        let packager = Packager::new(work.path().join("static"));
        let download = packager.package("audit", &arguments, &context()).expect("download");
        assert_eq!(download.filename, "20240101-000000-audit.xlsx");
        assert_eq!(fs::read(packager.download_dir().join(&download.filename)).unwrap(), b"report");
    }

    #[test]
    fn missing_outputs_yield_no_download() {
        let work = tempdir().unwrap();
        let packager = Packager::new(work.path().join("static"));

        let mut arguments = CoercedArguments::new();
        arguments.insert("out_file", ArgValue::Text(work.path().join("never-written.csv").to_string_lossy().into_owned()));
        assert!(packager.package("audit", &arguments, &context()).is_none());

        let mut arguments = CoercedArguments::new();
        arguments.insert("out_dir", ArgValue::Text(work.path().join("missing").to_string_lossy().into_owned()));
        assert!(packager.package("export", &arguments, &context()).is_none());

        assert!(packager.package("noop", &CoercedArguments::new(), &context()).is_none());
    }

    #[cfg(unix)]
    #[test]
    fn failed_archive_leaves_no_partial_download() {
        let work = tempdir().unwrap();
        let out_dir = work.path().join("out");
        fs::create_dir_all(&out_dir).unwrap();
        fs::write(out_dir.join("a.txt"), "exported").unwrap();
        std::os::unix::fs::symlink(work.path().join("gone.xml"), out_dir.join("b.xml")).unwrap();

        let packager = Packager::new(work.path().join("static"));
        let appliances = vec!["dp1".to_string()];
        let result = packager.archive_directory(&out_dir, "export", &appliances, &context());
        assert!(matches!(result, Err(StagingError::Io { .. })));

        let leftovers: Vec<_> = fs::read_dir(packager.download_dir()).unwrap().collect();
        assert!(leftovers.is_empty(), "{leftovers:?}");
    }
}
