use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::{Arc, RwLock},
};

use aes_gcm::{
    Aes256Gcm,
    aead::{Aead, KeyInit},
};
use thiserror::Error;

use crate::{DataSource, sources_db};

pub type ArcCache = Arc<RwLock<AppCache>>;

const ENCRYPTION_KEY: [u8; 32] = [
    0x3b, 0x91, 0x0e, 0x6d, 0xa4, 0x27, 0xf8, 0x5c, 0x12, 0xc9, 0x7e, 0x40, 0xb3, 0x68, 0x05, 0xda, 0x9f, 0x21, 0x74,
    0xe6, 0x0b, 0x58, 0xcd, 0x33, 0x8a, 0x1f, 0x62, 0xb7, 0x49, 0xee, 0x06, 0x95,
];

const NONCE: [u8; 12] = [0x5e, 0x17, 0xa3, 0x48, 0xd2, 0x0c, 0x91, 0x6b, 0xf4, 0x23, 0x7a, 0xc8];

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("Decryption error: {0}")]
    Decryption(String),

    #[error("数据源不存在: {0}")]
    NotFound(String),
}

/// 加密存储的数据源列表
pub struct AppCache {
    sources: Vec<DataSource>,
    sources_path: PathBuf,
}

impl AppCache {
    /// 打开默认位置（~/.courtside/sources.db）的数据源存储
    pub fn init() -> Result<ArcCache, CacheError> {
        Ok(Arc::new(RwLock::new(Self::open(sources_db())?)))
    }

    pub fn open(sources_path: impl AsRef<Path>) -> Result<Self, CacheError> {
        let sources_path = sources_path.as_ref().to_path_buf();

        let sources = if sources_path.exists() {
            let encrypted = fs::read(&sources_path)?;
            let decrypted = Self::decrypt(&encrypted)?;
            serde_json::from_slice(&decrypted)?
        } else {
            vec![]
        };

        Ok(Self { sources, sources_path })
    }

    pub fn sources(&self) -> &[DataSource] {
        &self.sources
    }

    pub fn source(
        &self,
        id: &str,
    ) -> Result<DataSource, CacheError> {
        self.sources
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .ok_or_else(|| CacheError::NotFound(id.to_string()))
    }

    /// 新增或替换（按 id）数据源并写回磁盘
    pub fn save_source(
        &mut self,
        source: DataSource,
    ) -> Result<(), CacheError> {
        match self.sources.iter_mut().find(|s| s.id == source.id) {
            Some(existing) => *existing = source,
            None => self.sources.push(source),
        }
        self.sources_update()
    }

    pub fn sources_update(&mut self) -> Result<(), CacheError> {
        let json = serde_json::to_vec(&self.sources)?;
        let encrypted = Self::encrypt(&json)?;
        if let Some(parent) = self.sources_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.sources_path, encrypted)?;
        Ok(())
    }

    fn encrypt(data: &[u8]) -> Result<Vec<u8>, CacheError> {
        Aes256Gcm::new(&ENCRYPTION_KEY.into())
            .encrypt(&NONCE.into(), data)
            .map_err(|e| CacheError::Encryption(e.to_string()))
    }

    fn decrypt(data: &[u8]) -> Result<Vec<u8>, CacheError> {
        Aes256Gcm::new(&ENCRYPTION_KEY.into())
            .decrypt(&NONCE.into(), data)
            .map_err(|e| CacheError::Decryption(e.to_string()))
    }
}
