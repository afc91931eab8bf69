//! 确认对话框解释器
//!
//! 向导会依次弹出若干原生对话框，每个对话框的处理方式由一个有序计划决定。
//! 浏览器事件到来时取出计划中的下一个动作，并把处理结果记入台账。

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::{sleep, Instant};

/// 对话框处理动作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogAction {
    /// 取消
    Dismiss,
    /// 确定
    Accept,
}

impl DialogAction {
    pub fn accepts(self) -> bool {
        self == DialogAction::Accept
    }
}

/// 有序的对话框处理计划
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogPlan(Vec<DialogAction>);

impl DialogPlan {
    pub fn new(actions: impl Into<Vec<DialogAction>>) -> Self {
        Self(actions.into())
    }

    /// 零申报向导要求的固定顺序：先取消一次，再确定两次
    pub fn nil_return() -> Self {
        Self::new([DialogAction::Dismiss, DialogAction::Accept, DialogAction::Accept])
    }

    pub fn actions(&self) -> &[DialogAction] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// 已处理的对话框
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandledDialog {
    pub message: String,
    pub action: DialogAction,
    /// 是否在计划之内
    pub planned: bool,
}

/// 按计划逐个消费对话框
#[derive(Debug)]
pub struct DialogInterpreter {
    pending: VecDeque<DialogAction>,
    handled: Vec<HandledDialog>,
}

impl DialogInterpreter {
    pub fn new(plan: DialogPlan) -> Self {
        Self {
            pending: plan.0.into_iter().collect(),
            handled: Vec::new(),
        }
    }

    /// 处理一个新弹出的对话框，返回应执行的动作
    ///
    /// 计划用完后再出现的对话框一律取消并标记为计划外
    pub fn on_dialog(&mut self, message: &str) -> DialogAction {
        let (action, planned) = match self.pending.pop_front() {
            Some(action) => (action, true),
            None => (DialogAction::Dismiss, false),
        };
        self.handled.push(HandledDialog {
            message: message.to_string(),
            action,
            planned,
        });
        action
    }

    pub fn is_complete(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn handled(&self) -> &[HandledDialog] {
        &self.handled
    }
}

/// 跨任务共享的对话框台账
#[derive(Debug, Clone)]
pub struct DialogLedger {
    inner: Arc<Mutex<DialogInterpreter>>,
}

impl DialogLedger {
    pub fn new(plan: DialogPlan) -> Self {
        Self {
            inner: Arc::new(Mutex::new(DialogInterpreter::new(plan))),
        }
    }

    /// 供浏览器事件回调调用
    pub fn on_dialog(&self, message: &str) -> DialogAction {
        self.lock().on_dialog(message)
    }

    pub fn is_complete(&self) -> bool {
        self.lock().is_complete()
    }

    pub fn handled(&self) -> Vec<HandledDialog> {
        self.lock().handled().to_vec()
    }

    /// 已执行的动作序列
    pub fn actions(&self) -> Vec<DialogAction> {
        self.lock().handled().iter().map(|d| d.action).collect()
    }

    /// 等待计划中的对话框全部出现，超时返回 false
    pub async fn wait_complete(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.is_complete() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            sleep(Duration::from_millis(200)).await;
        }
    }

    /// 实际处理结果是否与计划完全一致（无计划外对话框）
    pub fn matches(&self, plan: &DialogPlan) -> bool {
        let guard = self.lock();
        guard.is_complete()
            && guard.handled().iter().all(|d| d.planned)
            && guard.handled().iter().map(|d| d.action).eq(plan.actions().iter().copied())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DialogInterpreter> {
        // 临界区里不会 panic，中毒时直接沿用内部数据
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
