use crate::error::{LedgerError, LedgerResult};
use crate::ports::{check_chain_id, check_successor, LedgerFactory, ReadWriter, Reader, Writer};
use parking_lot::{Mutex, RwLock};
use shared_types::{Block, Hash, ZERO_HASH};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

fn io_error(path: &Path, e: std::io::Error) -> LedgerError {
    LedgerError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    }
}

struct FileState {
    height: u64,
    tip: Hash,
}

/// File-backed ledger: one JSON document per block in the chain's directory.
///
/// Each block is written to a temporary file, synced, then renamed into
/// place, so a crash leaves either the whole block or no block.
pub struct FileLedger {
    dir: PathBuf,
    state: RwLock<FileState>,
    write_lock: Mutex<()>,
    height_tx: watch::Sender<u64>,
}

impl FileLedger {
    /// Open (creating if needed) the ledger in `dir`, verifying every block.
    pub fn open<P: AsRef<Path>>(dir: P) -> LedgerResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir).map_err(|e| io_error(&dir, e))?;

        let mut height = 0u64;
        let mut tip = ZERO_HASH;
        loop {
            let path = block_path(&dir, height);
            if !path.exists() {
                break;
            }
            let block = read_block(&path)?;
            check_successor(height, &tip, &block)?;
            tip = block.header.hash();
            height += 1;
        }

        if height > 0 {
            info!(
                "[oc-03] 💾 Opened ledger at {} with {} blocks",
                dir.display(),
                height
            );
        }

        let (height_tx, _) = watch::channel(height);
        Ok(Self {
            dir,
            state: RwLock::new(FileState { height, tip }),
            write_lock: Mutex::new(()),
            height_tx,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

fn block_path(dir: &Path, number: u64) -> PathBuf {
    dir.join(format!("block_{:020}.json", number))
}

fn read_block(path: &Path) -> LedgerResult<Block> {
    let bytes = std::fs::read(path).map_err(|e| io_error(path, e))?;
    serde_json::from_slice(&bytes).map_err(|e| LedgerError::Corrupt {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

fn write_block(path: &Path, block: &Block) -> LedgerResult<()> {
    let bytes = serde_json::to_vec(block).map_err(|e| LedgerError::Corrupt {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    let temp_path = path.with_extension("tmp");
    let mut file = std::fs::File::create(&temp_path).map_err(|e| io_error(&temp_path, e))?;
    file.write_all(&bytes).map_err(|e| io_error(&temp_path, e))?;
    file.sync_all().map_err(|e| io_error(&temp_path, e))?;
    std::fs::rename(&temp_path, path).map_err(|e| io_error(path, e))
}

impl Reader for FileLedger {
    fn height(&self) -> u64 {
        self.state.read().height
    }

    fn tip_hash(&self) -> Hash {
        self.state.read().tip
    }

    fn get_block(&self, number: u64) -> LedgerResult<Block> {
        let height = self.height();
        if number >= height {
            return Err(LedgerError::BlockNotFound { number, height });
        }
        read_block(&block_path(&self.dir, number))
    }

    fn watch_height(&self) -> watch::Receiver<u64> {
        self.height_tx.subscribe()
    }
}

impl Writer for FileLedger {
    fn append(&self, block: Block) -> LedgerResult<()> {
        // Held across the disk write so appends cannot interleave
        let _guard = self.write_lock.lock();
        let (height, tip) = {
            let state = self.state.read();
            (state.height, state.tip)
        };
        check_successor(height, &tip, &block)?;
        write_block(&block_path(&self.dir, height), &block)?;

        {
            let mut state = self.state.write();
            state.height = height + 1;
            state.tip = block.header.hash();
        }
        self.height_tx.send_replace(height + 1);
        Ok(())
    }
}

/// Opens `FileLedger`s under a root directory, one subdirectory per chain.
pub struct FileLedgerFactory {
    root: PathBuf,
    ledgers: RwLock<BTreeMap<String, Arc<FileLedger>>>,
}

impl FileLedgerFactory {
    /// Open every existing chain directory under `root`.
    pub fn new<P: AsRef<Path>>(root: P) -> LedgerResult<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root).map_err(|e| io_error(&root, e))?;

        let mut ledgers = BTreeMap::new();
        let entries = std::fs::read_dir(&root).map_err(|e| io_error(&root, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| io_error(&root, e))?;
            if !entry.path().is_dir() {
                continue;
            }
            let Some(chain_id) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if check_chain_id(&chain_id).is_err() {
                warn!(dir = %entry.path().display(), "[oc-03] Skipping non-chain directory");
                continue;
            }
            let ledger = FileLedger::open(entry.path())?;
            ledgers.insert(chain_id, Arc::new(ledger));
        }

        info!(
            "[oc-03] 📁 Ledger root {} holds {} chains",
            root.display(),
            ledgers.len()
        );
        Ok(Self {
            root,
            ledgers: RwLock::new(ledgers),
        })
    }
}

impl LedgerFactory for FileLedgerFactory {
    fn get_or_create(&self, chain_id: &str) -> LedgerResult<Arc<dyn ReadWriter>> {
        check_chain_id(chain_id)?;
        let mut ledgers = self.ledgers.write();
        if let Some(ledger) = ledgers.get(chain_id) {
            return Ok(ledger.clone());
        }
        let ledger = Arc::new(FileLedger::open(self.root.join(chain_id))?);
        ledgers.insert(chain_id.to_string(), ledger.clone());
        Ok(ledger)
    }

    fn chain_ids(&self) -> Vec<String> {
        self.ledgers.read().keys().cloned().collect()
    }
}
