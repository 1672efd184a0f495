//! 論理スタック（awaitチェーン）

use coroscope_target::TargetError;
use std::fmt;

/// 論理スタックフレーム（awaitされているコルーチン1つ分）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    /// 最内フレームを0とする深さ
    pub depth: usize,
    /// 再開アドレス
    pub address: u64,
    pub function_name: String,
    pub file: String,
    pub line: u32,
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{:<3} 0x{:016x} {} at {}:{}",
            self.depth, self.address, self.function_name, self.file, self.line
        )
    }
}

/// ウォークが終了した理由
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// 呼び出し元がない（チェーンの終端）
    EndOfChain,
    /// 読み取り・キャスト・解決のいずれかが失敗した
    Failed(TargetError),
    /// 最大深さに達した
    DepthLimit,
    /// 同じ活性化レコードに再び到達した
    Cycle { address: u64 },
}

/// 論理スタック（awaitチェーン）
#[derive(Debug, Clone)]
pub struct LogicalStack {
    frames: Vec<StackFrame>,
    stop_reason: StopReason,
}

impl LogicalStack {
    /// 新しい論理スタックを作成する
    pub fn new() -> Self {
        Self {
            frames: Vec::new(),
            stop_reason: StopReason::EndOfChain,
        }
    }

    /// フレームを追加する
    pub fn push(&mut self, frame: StackFrame) {
        self.frames.push(frame);
    }

    /// 終了理由を記録する
    pub fn finish(&mut self, reason: StopReason) {
        self.stop_reason = reason;
    }

    /// 全てのフレームを取得する
    pub fn frames(&self) -> &[StackFrame] {
        &self.frames
    }

    /// スタックが空かどうか
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// スタックの深さ
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// ウォークが終了した理由
    pub fn stop_reason(&self) -> &StopReason {
        &self.stop_reason
    }

    /// チェーンの途中で打ち切られたかどうか
    pub fn is_truncated(&self) -> bool {
        self.stop_reason != StopReason::EndOfChain
    }
}

impl Default for LogicalStack {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> IntoIterator for &'a LogicalStack {
    type Item = &'a StackFrame;
    type IntoIter = std::slice::Iter<'a, StackFrame>;

    fn into_iter(self) -> Self::IntoIter {
        self.frames.iter()
    }
}

/// ウォークの結果
#[derive(Debug, Clone)]
pub enum WalkOutcome {
    /// コルーチンの実行中ではない（アンカーフレームがない）
    NotInCoroutine,
    /// 再構築した論理スタック（部分的な場合もある）
    Stack(LogicalStack),
}

impl WalkOutcome {
    /// 論理スタック（コルーチン外ならNone）
    pub fn stack(&self) -> Option<&LogicalStack> {
        match self {
            WalkOutcome::NotInCoroutine => None,
            WalkOutcome::Stack(stack) => Some(stack),
        }
    }

    /// フレーム列（コルーチン外なら空）
    pub fn frames(&self) -> &[StackFrame] {
        self.stack().map(LogicalStack::frames).unwrap_or_default()
    }
}
