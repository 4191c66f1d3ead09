// Class-file Manager
//
// Transactional custody of generated class files across a compile run.
// The cycle driver calls `delete` before recompiling a source set,
// `generated` after each merge, and exactly one `complete` on every exit
// path: `true` commits, `false` rolls the file system back.

use flint_core::names::ProductFile;
use std::fs;
use std::path::{Path, PathBuf};

pub trait ClassFileManager {
    /// Takes the given products out of the output, restorably.
    fn delete(&mut self, products: &[ProductFile]);
    /// Registers freshly generated products.
    fn generated(&mut self, products: &[ProductFile]);
    /// Ends the transaction. `success = false` restores deleted files and
    /// removes generated ones.
    fn complete(&mut self, success: bool);
}

/// Manager for callers that handle products themselves.
pub struct NoopClassFileManager;

impl ClassFileManager for NoopClassFileManager {
    fn delete(&mut self, _products: &[ProductFile]) {}
    fn generated(&mut self, _products: &[ProductFile]) {}
    fn complete(&mut self, _success: bool) {}
}

/// Stages deletions in a scratch directory so a failed run can put every
/// file back.
pub struct TransactionalClassFileManager {
    staging_dir: PathBuf,
    moved: Vec<(PathBuf, PathBuf)>,
    generated: Vec<PathBuf>,
    next_index: usize,
}

impl TransactionalClassFileManager {
    pub fn new(staging_dir: impl Into<PathBuf>) -> std::io::Result<TransactionalClassFileManager> {
        let staging_dir = staging_dir.into();
        fs::create_dir_all(&staging_dir)?;
        Ok(TransactionalClassFileManager {
            staging_dir,
            moved: Vec::new(),
            generated: Vec::new(),
            next_index: 0,
        })
    }

    fn stage_path(&mut self, original: &Path) -> PathBuf {
        let file_name = original
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "product".to_string());
        let staged = self.staging_dir.join(format!("{}.{}", self.next_index, file_name));
        self.next_index += 1;
        staged
    }
}

impl ClassFileManager for TransactionalClassFileManager {
    fn delete(&mut self, products: &[ProductFile]) {
        for product in products {
            let original = PathBuf::from(product.as_str());
            if !original.exists() {
                continue;
            }
            let staged = self.stage_path(&original);
            if fs::rename(&original, &staged).is_ok() {
                self.moved.push((original, staged));
            }
        }
    }

    fn generated(&mut self, products: &[ProductFile]) {
        self.generated
            .extend(products.iter().map(|product| PathBuf::from(product.as_str())));
    }

    fn complete(&mut self, success: bool) {
        if !success {
            for generated in self.generated.drain(..) {
                let _ = fs::remove_file(&generated);
            }
            for (original, staged) in self.moved.drain(..) {
                let _ = fs::rename(&staged, &original);
            }
        }
        self.moved.clear();
        self.generated.clear();
        let _ = fs::remove_dir_all(&self.staging_dir);
    }
}
