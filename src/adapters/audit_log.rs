use crate::utils::error::Result;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// 追蹤帳號貼文的原始 JSON，一行一筆，只追加不讀取
#[derive(Debug)]
pub struct AuditLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl AuditLog {
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        tracing::debug!("Audit log opened at {}", path.display());
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 整筆記錄一次寫入，多個 worker 同時寫也不會交錯。
    ///
    /// 沒有換行的 payload (串流的正常情況) 原樣寫入；帶有換行的會把換行拿掉
    /// 接成一行，這時記錄與收到的原文不再逐位元組相同。
    pub async fn append(&self, raw: &str) -> Result<()> {
        let mut record = String::with_capacity(raw.len() + 1);
        if raw.contains(['\n', '\r']) {
            for line in raw.lines() {
                record.push_str(line.trim_end_matches('\r'));
            }
        } else {
            record.push_str(raw);
        }
        record.push('\n');

        let mut file = self.file.lock().await;
        file.write_all(record.as_bytes()).await?;
        Ok(())
    }

    pub async fn flush(&self) -> Result<()> {
        let mut file = self.file.lock().await;
        file.flush().await?;
        file.sync_data().await?;
        Ok(())
    }
}
