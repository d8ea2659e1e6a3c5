/// 件数ベースの進捗通知の間引き
///
/// 全体の `step_percent`% 進むごとに1回、最後の1件では必ず通知する。
#[derive(Debug, Clone)]
pub struct ProgressThrottle {
    total: usize,
    step: usize,
    last_reported: usize,
}

impl ProgressThrottle {
    pub fn new(total: usize, step_percent: u8) -> Self {
        let percent = usize::from(step_percent.clamp(1, 100));
        let step = (total * percent).div_ceil(100).max(1);
        Self {
            total,
            step,
            last_reported: 0,
        }
    }

    /// `completed` 件目で通知すべきか（通知する場合は記録も更新する）
    pub fn should_report(&mut self, completed: usize) -> bool {
        if completed <= self.last_reported {
            return false;
        }
        if completed >= self.total || completed - self.last_reported >= self.step {
            self.last_reported = completed;
            return true;
        }
        false
    }

    pub fn step(&self) -> usize {
        self.step
    }
}
