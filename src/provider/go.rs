//! Go modules provider.

use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{read_lockfile, run_package_manager, GatherOptions, GatherSource, LockfileOptions, Provider};
use crate::error::ScanError;
use crate::model::{Dependency, Detection, Ecosystem};
use crate::parser;

#[derive(Debug)]
pub struct GoProvider;

const MANIFEST: &str = "go.mod";
const LOCKFILE: &str = "go.sum";

#[async_trait]
impl Provider for GoProvider {
    fn name(&self) -> &'static str {
        "Go"
    }

    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Go
    }

    fn manifest_filenames(&self) -> &[&'static str] {
        &[MANIFEST]
    }

    fn lockfile_filenames(&self) -> &[&'static str] {
        &[LOCKFILE]
    }

    fn detect(&self, dir: &Path) -> Option<Detection> {
        if dir.join(LOCKFILE).is_file() {
            Some(Detection::new(Ecosystem::Go, self.name(), 1.0))
        } else if dir.join(MANIFEST).is_file() {
            Some(Detection::new(Ecosystem::Go, self.name(), 0.8))
        } else {
            None
        }
    }

    async fn ensure_lockfile(&self, dir: &Path, opts: &LockfileOptions) -> Result<(), ScanError> {
        let present = dir.join(LOCKFILE).is_file();

        let args: &[&str] = if opts.force_refresh {
            &["mod", "tidy"]
        } else if opts.force_validate {
            &["mod", "verify"]
        } else if !present && opts.create_if_missing {
            &["mod", "tidy"]
        } else if present && opts.validate_if_present {
            &["mod", "verify"]
        } else {
            return Ok(());
        };

        run_package_manager("go", args, dir)
    }

    fn gather(
        &self,
        source: &GatherSource,
        opts: &GatherOptions,
    ) -> Result<Vec<Dependency>, ScanError> {
        match source {
            GatherSource::StandaloneLockfile(path) => parse_standalone(path, opts.include_dev),
            GatherSource::Directory(dir) => {
                let sum_path = dir.join(LOCKFILE);
                if sum_path.is_file() {
                    match parse_standalone(&sum_path, opts.include_dev) {
                        Ok(deps) => return Ok(deps),
                        Err(err) => {
                            warn!(path = %sum_path.display(), %err,
                                "go.sum parse failed, falling back to go.mod");
                        }
                    }
                }
                let mod_path = dir.join(MANIFEST);
                if !mod_path.is_file() {
                    return Err(ScanError::ManifestMissing(mod_path));
                }
                debug!(path = %mod_path.display(), "gathering requirements from go.mod");
                let text = std::fs::read_to_string(&mod_path)?;
                parser::go::parse_go_mod(&text, opts.include_dev)
                    .map_err(|err| ScanError::parse(&mod_path, err.to_string()))
            }
        }
    }
}

fn parse_standalone(path: &Path, include_dev: bool) -> Result<Vec<Dependency>, ScanError> {
    let filename = path.file_name().and_then(|f| f.to_str()).unwrap_or("");
    let text = read_lockfile(path)?;
    let result = match filename {
        LOCKFILE => parser::go::parse_go_sum(&text),
        MANIFEST => parser::go::parse_go_mod(&text, include_dev),
        other => {
            return Err(ScanError::parse(
                path,
                format!("unsupported Go file name: {other}"),
            ))
        }
    };
    result.map_err(|err| ScanError::parse(path, err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn gather_prefers_go_sum() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(
            tmp.path().join("go.mod"),
            "module m\n\nrequire a/b v1.0.0\n",
        )
        .unwrap();
        fs::write(
            tmp.path().join("go.sum"),
            "a/b v1.2.3 h1:x=\na/b v1.2.3/go.mod h1:y=\n",
        )
        .unwrap();

        let deps = GoProvider
            .gather(
                &GatherSource::Directory(tmp.path().to_path_buf()),
                &GatherOptions::default(),
            )
            .unwrap();
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].key(), "a/b@1.2.3");
    }

    #[test]
    fn gather_falls_back_to_go_mod() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(
            tmp.path().join("go.mod"),
            "module m\n\nrequire (\n\ta/b v1.2.3\n\tc/d v0.1.0 // indirect\n)\n",
        )
        .unwrap();

        let deps = GoProvider
            .gather(
                &GatherSource::Directory(tmp.path().to_path_buf()),
                &GatherOptions::default(),
            )
            .unwrap();
        let keys: Vec<_> = deps.iter().map(|d| d.key()).collect();
        assert_eq!(keys, vec!["a/b@1.2.3"]);
    }

    #[test]
    fn empty_go_dir_reports_missing_manifest() {
        let tmp = tempfile::tempdir().unwrap();
        let err = GoProvider
            .gather(
                &GatherSource::Directory(tmp.path().to_path_buf()),
                &GatherOptions::default(),
            )
            .unwrap_err();
        assert!(matches!(err, ScanError::ManifestMissing(_)));
    }

    #[test]
    fn standalone_go_sum_parses_directly() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("go.sum");
        fs::write(&path, "a/b v1.2.3 h1:x=\n").unwrap();

        let deps = GoProvider
            .gather(
                &GatherSource::StandaloneLockfile(path),
                &GatherOptions::default(),
            )
            .unwrap();
        assert_eq!(deps[0].ecosystem, Ecosystem::Go);
    }
}
