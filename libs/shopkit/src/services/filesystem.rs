//! Storage locations configured under `resource/fs*`.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::config::Config;
use crate::error::{ContextError, ContextResult};

const SERVICE: &str = "filesystem";
pub const DEFAULT_RESOURCE: &str = "fs";

#[derive(Debug, Clone, Deserialize)]
struct FsResourceConfig {
    #[serde(default = "default_adapter")]
    adapter: String,
    #[serde(default)]
    basedir: Option<String>,
}

fn default_adapter() -> String {
    "Standard".to_string()
}

/// A named storage location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsResource {
    pub name: String,
    pub basedir: PathBuf,
}

impl FsResource {
    /// Path of `relative` inside this resource. Leading separators and
    /// parent components are dropped so the result never leaves `basedir`.
    pub fn path(&self, relative: &str) -> PathBuf {
        relative
            .split(['/', '\\'])
            .filter(|seg| !seg.is_empty() && *seg != "." && *seg != "..")
            .fold(self.basedir.clone(), |p, seg| p.join(seg))
    }
}

pub trait FilesystemManager: Send + Sync {
    /// Resource by name; unknown names resolve to the default resource.
    fn get(&self, name: &str) -> ContextResult<FsResource>;

    fn resource_names(&self) -> Vec<String>;
}

/// Local-disk filesystem manager configured from `resource/fs*`.
#[derive(Debug)]
pub struct LocalFilesystemManager {
    resources: BTreeMap<String, FsResource>,
}

impl LocalFilesystemManager {
    pub fn from_config(cfg: &Config) -> ContextResult<Self> {
        let entries = cfg
            .get("resource")
            .and_then(|v| v.as_object())
            .ok_or_else(|| ContextError::service_unavailable(SERVICE, "no 'resource' section configured"))?;

        let mut resources = BTreeMap::new();
        for (name, raw) in entries {
            if name != DEFAULT_RESOURCE && !name.starts_with("fs-") {
                continue;
            }
            let rc: FsResourceConfig = serde_json::from_value(raw.clone()).map_err(|e| {
                ContextError::service_unavailable(SERVICE, format!("resource '{name}': {e}"))
            })?;
            if !matches!(rc.adapter.to_ascii_lowercase().as_str(), "standard" | "local") {
                return Err(ContextError::service_unavailable(
                    SERVICE,
                    format!("resource '{name}': unsupported adapter '{}'", rc.adapter),
                ));
            }
            let basedir = PathBuf::from(rc.basedir.unwrap_or_else(|| ".".to_string()));
            resources.insert(
                name.clone(),
                FsResource {
                    name: name.clone(),
                    basedir,
                },
            );
        }

        if !resources.contains_key(DEFAULT_RESOURCE) {
            return Err(ContextError::service_unavailable(
                SERVICE,
                "no 'resource/fs' configured",
            ));
        }
        Ok(Self { resources })
    }
}

impl FilesystemManager for LocalFilesystemManager {
    fn get(&self, name: &str) -> ContextResult<FsResource> {
        self.resources
            .get(name)
            .or_else(|| self.resources.get(DEFAULT_RESOURCE))
            .cloned()
            .ok_or_else(|| ContextError::service_unavailable(SERVICE, format!("unknown resource '{name}'")))
    }

    fn resource_names(&self) -> Vec<String> {
        self.resources.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(resource: serde_json::Value) -> Config {
        Config::new("frontend", json!({ "resource": resource }))
    }

    #[test]
    fn resources_and_fallback() {
        let mgr = LocalFilesystemManager::from_config(&config(json!({
            "fs": { "adapter": "Standard", "basedir": "/srv/shop/files" },
            "fs-admin": { "basedir": "/srv/shop/admin" },
            "db": { "adapter": "sqlite" }
        })))
        .unwrap();

        assert_eq!(mgr.resource_names(), vec!["fs", "fs-admin"]);
        assert_eq!(mgr.get("fs-admin").unwrap().basedir, PathBuf::from("/srv/shop/admin"));
        assert_eq!(mgr.get("fs-media").unwrap().name, "fs");
    }

    #[test]
    fn paths_stay_inside_basedir() {
        let res = FsResource {
            name: "fs".into(),
            basedir: PathBuf::from("/srv/files"),
        };
        assert_eq!(res.path("img/a.png"), PathBuf::from("/srv/files/img/a.png"));
        assert_eq!(res.path("/../../etc/passwd"), PathBuf::from("/srv/files/etc/passwd"));
    }

    #[test]
    fn resolved_paths_reach_files_on_disk() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("media")).unwrap();
        std::fs::write(tmp.path().join("media/logo.svg"), "<svg/>").unwrap();

        let mgr = LocalFilesystemManager::from_config(&config(json!({
            "fs": { "adapter": "local", "basedir": tmp.path().to_string_lossy() }
        })))
        .unwrap();

        let path = mgr.get("fs").unwrap().path("../media/logo.svg");
        assert_eq!(std::fs::read_to_string(path).unwrap(), "<svg/>");
    }

    #[test]
    fn missing_or_unsupported_is_unavailable() {
        let err = LocalFilesystemManager::from_config(&config(json!({ "db": {} }))).unwrap_err();
        assert!(matches!(err, ContextError::ServiceUnavailable { service: "filesystem", .. }));

        let err = LocalFilesystemManager::from_config(&config(json!({
            "fs": { "adapter": "S3", "basedir": "bucket" }
        })))
        .unwrap_err();
        assert!(matches!(err, ContextError::ServiceUnavailable { service: "filesystem", .. }));
    }
}
