use crate::domain::models::Block;
use crate::infrastructure::block_mapper::decode_blocks;
use crate::infrastructure::error::InfraError;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

pub trait BlockRepository: Send + Sync {
    fn load_blocks(&self) -> Result<Vec<Block>, InfraError>;
    fn replace_all(&self, blocks: &[Block]) -> Result<(), InfraError>;
}

#[derive(Debug, Default)]
pub struct InMemoryBlockRepository {
    blocks: Mutex<Vec<Block>>,
    saves: Mutex<usize>,
}

impl InMemoryBlockRepository {
    pub fn new(blocks: Vec<Block>) -> Self {
        Self {
            blocks: Mutex::new(blocks),
            saves: Mutex::new(0),
        }
    }

    pub fn save_count(&self) -> Result<usize, InfraError> {
        Ok(*lock(&self.saves)?)
    }
}

impl BlockRepository for InMemoryBlockRepository {
    fn load_blocks(&self) -> Result<Vec<Block>, InfraError> {
        Ok(lock(&self.blocks)?.clone())
    }

    fn replace_all(&self, blocks: &[Block]) -> Result<(), InfraError> {
        *lock(&self.blocks)? = blocks.to_vec();
        *lock(&self.saves)? += 1;
        Ok(())
    }
}

#[derive(Debug)]
pub struct JsonFileBlockRepository {
    path: PathBuf,
}

impl JsonFileBlockRepository {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BlockRepository for JsonFileBlockRepository {
    fn load_blocks(&self) -> Result<Vec<Block>, InfraError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let raw = fs::read_to_string(&self.path)?;
        let value: serde_json::Value = serde_json::from_str(&raw)?;
        decode_blocks(&value)
    }

    fn replace_all(&self, blocks: &[Block]) -> Result<(), InfraError> {
        let formatted = serde_json::to_string_pretty(blocks)?;
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, format!("{formatted}\n"))?;
        fs::rename(&staging, &self.path)?;
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, InfraError> {
    mutex
        .lock()
        .map_err(|error| InfraError::Store(format!("block store lock poisoned: {error}")))
}
