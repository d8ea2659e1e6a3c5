//! セッション（チャット/コマンド単位）ごとの実行状態
//!
//! 開始時に登録し、終了時または一定時間操作がなければ破棄する。

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::PipelineError;
use crate::pipeline::RunStage;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl From<i64> for SessionId {
    fn from(chat_id: i64) -> Self {
        Self(chat_id.to_string())
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 1回の実行を識別する番号（同じセッションの前後の実行を区別する）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RunToken(u64);

#[derive(Debug, Clone)]
pub struct SessionEntry {
    pub query: String,
    pub stage: RunStage,
    pub run: RunToken,
    pub started_at: Instant,
    pub last_activity: Instant,
}

impl SessionEntry {
    /// 実行中（開始済みかつ未終了）のエントリはアイドル破棄の対象外
    fn is_in_flight(&self) -> bool {
        self.stage != RunStage::Idle && !self.stage.is_terminal()
    }
}

type SessionMap = HashMap<SessionId, SessionEntry>;

/// 現在のエントリが `run` のものである場合だけ外す
fn release(sessions: &mut SessionMap, id: &SessionId, run: RunToken) -> Option<SessionEntry> {
    match sessions.get(id) {
        Some(entry) if entry.run == run => sessions.remove(id),
        _ => None,
    }
}

/// プロセス全体で共有するセッション表
#[derive(Debug, Clone)]
pub struct SessionRegistry {
    sessions: Arc<Mutex<SessionMap>>,
    next_run: Arc<AtomicU64>,
    idle_ttl: Duration,
}

impl SessionRegistry {
    pub fn new(idle_ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            next_run: Arc::new(AtomicU64::new(1)),
            idle_ttl,
        }
    }

    /// 実行開始。同じセッションで実行中なら拒否
    ///
    /// 返したガードが `finish` されずに破棄された場合もエントリは外れる。
    pub async fn begin(&self, id: &SessionId, query: &str) -> Result<SessionGuard, PipelineError> {
        let mut sessions = self.sessions.lock().await;
        if let Some(entry) = sessions.get(id) {
            if !entry.stage.is_terminal() {
                return Err(PipelineError::SessionBusy(format!(
                    "session {} is already {:?}",
                    id, entry.stage
                )));
            }
        }
        let run = RunToken(self.next_run.fetch_add(1, Ordering::Relaxed));
        let now = Instant::now();
        sessions.insert(
            id.clone(),
            SessionEntry {
                query: query.to_string(),
                stage: RunStage::Idle,
                run,
                started_at: now,
                last_activity: now,
            },
        );
        debug!(session = %id, run = run.0, "session registered");
        Ok(SessionGuard {
            registry: self.clone(),
            id: id.clone(),
            run,
            armed: true,
        })
    }

    pub async fn get(&self, id: &SessionId) -> Option<SessionEntry> {
        self.sessions.lock().await.get(id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }

    /// `idle_ttl` を超えて操作のないセッションを破棄し、件数を返す
    ///
    /// 実行中のエントリは残す。実行の終わりはガード側で外す。
    pub async fn evict_idle(&self) -> usize {
        let now = Instant::now();
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|id, entry| {
            let keep =
                entry.is_in_flight() || now.duration_since(entry.last_activity) < self.idle_ttl;
            if !keep {
                info!(session = %id, stage = ?entry.stage, "evicting idle session");
            }
            keep
        });
        before - sessions.len()
    }

    /// `interval` ごとに `evict_idle` を回すバックグラウンドタスク
    pub fn spawn_sweeper(&self, interval: Duration) -> JoinHandle<()> {
        let registry = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let evicted = registry.evict_idle().await;
                if evicted > 0 {
                    debug!(evicted, "session sweep");
                }
            }
        })
    }
}

/// 1回の実行がセッション枠を占有している間のハンドル
///
/// `finish` か破棄で枠を返す。別の実行に置き換わったエントリには触れない。
#[derive(Debug)]
pub struct SessionGuard {
    registry: SessionRegistry,
    id: SessionId,
    run: RunToken,
    armed: bool,
}

impl SessionGuard {
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn run(&self) -> RunToken {
        self.run
    }

    pub async fn advance(&self, stage: RunStage) {
        let mut sessions = self.registry.sessions.lock().await;
        if let Some(entry) = sessions.get_mut(&self.id) {
            if entry.run == self.run {
                entry.stage = stage;
                entry.last_activity = Instant::now();
            }
        }
    }

    /// 終了時の破棄
    pub async fn finish(mut self) -> Option<SessionEntry> {
        self.armed = false;
        let removed = release(&mut *self.registry.sessions.lock().await, &self.id, self.run);
        if removed.is_some() {
            debug!(session = %self.id, "session evicted");
        }
        removed
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Ok(mut sessions) = self.registry.sessions.try_lock() {
            if release(&mut sessions, &self.id, self.run).is_some() {
                debug!(session = %self.id, "session released on drop");
            }
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let registry = self.registry.clone();
                let id = self.id.clone();
                let run = self.run;
                handle.spawn(async move {
                    release(&mut *registry.sessions.lock().await, &id, run);
                });
            }
            Err(_) => warn!(session = %self.id, "no runtime to release session"),
        }
    }
}
