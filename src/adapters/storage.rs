use crate::domain::model::ServiceName;
use crate::domain::ports::Storage;
use crate::utils::error::Result;
use std::collections::BTreeMap;
use std::io::{ErrorKind, Write};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

const SERVICE_EXTENSION: &str = "txt";
#[cfg(unix)]
const NEW_FILE_MODE: u32 = 0o644;

/// Services as `<root>/<name>.txt` files.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn service_path(&self, service: &ServiceName) -> PathBuf {
        self.root
            .join(format!("{}.{}", service.as_str(), SERVICE_EXTENSION))
    }
}

// tempfile creates 0600 files; keep the mode the service file already had.
fn carry_permissions(temp: &File, target: &Path) -> std::io::Result<()> {
    match std::fs::metadata(target) {
        Ok(meta) => temp.set_permissions(meta.permissions()),
        Err(e) if e.kind() == ErrorKind::NotFound => set_new_file_permissions(temp),
        Err(e) => Err(e),
    }
}

#[cfg(unix)]
fn set_new_file_permissions(file: &File) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(std::fs::Permissions::from_mode(NEW_FILE_MODE))
}

#[cfg(not(unix))]
fn set_new_file_permissions(_file: &File) -> std::io::Result<()> {
    Ok(())
}

impl Storage for LocalStorage {
    async fn list(&self) -> Result<Vec<ServiceName>> {
        tokio::fs::create_dir_all(&self.root).await?;

        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(SERVICE_EXTENSION) {
                continue;
            }
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };

            // 只接受已正規化的檔名，否則查詢時會對不上
            match ServiceName::parse(stem) {
                Ok(name) if name.as_str() == stem => names.push(name),
                _ => tracing::warn!("Skipping unrecognized stock file: {}", path.display()),
            }
        }

        names.sort();
        Ok(names)
    }

    async fn read(&self, service: &ServiceName) -> Result<Option<String>> {
        let path = self.service_path(service);
        tracing::debug!("Reading stock file: {}", path.display());

        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, service: &ServiceName, content: &str) -> Result<()> {
        let root = self.root.clone();
        let target = self.service_path(service);
        let content = content.to_owned();

        // temp file + fsync + rename, so readers see either old or new content
        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            std::fs::create_dir_all(&root)?;
            let mut temp = tempfile::Builder::new()
                .prefix(".stockpile-")
                .suffix(".tmp")
                .tempfile_in(&root)?;
            temp.as_file_mut().write_all(content.as_bytes())?;
            carry_permissions(temp.as_file(), &target)?;
            temp.as_file().sync_all()?;
            temp.persist(&target).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(std::io::Error::other)??;

        Ok(())
    }

    async fn create(&self, service: &ServiceName) -> Result<bool> {
        tokio::fs::create_dir_all(&self.root).await?;

        let created = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(self.service_path(service))
            .await;

        match created {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn remove(&self, service: &ServiceName) -> Result<bool> {
        match tokio::fs::remove_file(self.service_path(service)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// Process-local storage, mainly for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    blobs: Arc<Mutex<BTreeMap<ServiceName, String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn blobs(&self) -> Result<MutexGuard<'_, BTreeMap<ServiceName, String>>> {
        self.blobs
            .lock()
            .map_err(|_| std::io::Error::other("memory storage lock poisoned").into())
    }
}

impl Storage for MemoryStorage {
    async fn list(&self) -> Result<Vec<ServiceName>> {
        Ok(self.blobs()?.keys().cloned().collect())
    }

    async fn read(&self, service: &ServiceName) -> Result<Option<String>> {
        Ok(self.blobs()?.get(service).cloned())
    }

    async fn write(&self, service: &ServiceName, content: &str) -> Result<()> {
        self.blobs()?.insert(service.clone(), content.to_owned());
        Ok(())
    }

    async fn create(&self, service: &ServiceName) -> Result<bool> {
        let mut blobs = self.blobs()?;
        if blobs.contains_key(service) {
            return Ok(false);
        }
        blobs.insert(service.clone(), String::new());
        Ok(true)
    }

    async fn remove(&self, service: &ServiceName) -> Result<bool> {
        Ok(self.blobs()?.remove(service).is_some())
    }
}
