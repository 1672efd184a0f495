//! コルーチンフレームウォーカー
//!
//! 物理スタックにはドライバ（resume）しか現れないため、活性化レコードの
//! `caller_` リンクを辿って await チェーンを再構築します。
//!
//! 各ステップは `Result` を返し、最初の失敗でウォークを止めてそれまでの
//! フレームを返します。壊れたチェーンで止まらなくならないよう、最大深さと
//! 循環検出で反復回数を制限します。

use crate::{AwaitableDetector, LogicalStack, StackFrame, StopReason, WalkOutcome};
use coroscope_target::{DebugInfoProvider, PhysicalFrame, Result, ValueAccessor, ValueAccessorExt};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, warn};

/// ウォーク設定
#[derive(Debug, Clone)]
pub struct WalkConfig {
    /// 辿る活性化レコードの最大数
    pub max_depth: usize,
    /// ファイル名をベース名だけにする
    pub basename_only: bool,
}

impl Default for WalkConfig {
    fn default() -> Self {
        Self {
            max_depth: 256,
            basename_only: false,
        }
    }
}

/// コルーチンフレームウォーカー
pub struct FrameWalker<'h, H> {
    host: &'h H,
    detector: AwaitableDetector,
    config: WalkConfig,
}

impl<'h, H> FrameWalker<'h, H>
where
    H: DebugInfoProvider + ValueAccessor,
{
    /// 新しいウォーカーを作成する
    pub fn new(host: &'h H, detector: AwaitableDetector, config: WalkConfig) -> Self {
        Self {
            host,
            detector,
            config,
        }
    }

    /// 現在の論理スタックを再構築する
    ///
    /// ドライバのフレームが物理スタックになければ `WalkOutcome::NotInCoroutine`。
    pub fn walk(&self) -> WalkOutcome {
        let anchor = match self.host.find_matching_frame(self.detector.resume_pattern()) {
            Some(frame) => frame,
            None => {
                debug!("no awaitable resume frame on the physical stack");
                return WalkOutcome::NotInCoroutine;
            }
        };
        debug!(level = anchor.level, function = %anchor.function_name, "found awaitable anchor");

        match self.receiver(&anchor) {
            Ok(record) => WalkOutcome::Stack(self.walk_from(record)),
            Err(e) => {
                warn!(error = %e, "cannot read the awaitable frame of the anchor");
                let mut stack = LogicalStack::new();
                stack.finish(StopReason::Failed(e));
                WalkOutcome::Stack(stack)
            }
        }
    }

    /// 指定した活性化レコードから呼び出し元へ向かって辿る
    pub fn walk_from(&self, record: H::Value) -> LogicalStack {
        let mut stack = LogicalStack::new();
        let mut visited = HashSet::new();
        let mut record = record;

        let reason = loop {
            if stack.depth() >= self.config.max_depth {
                break StopReason::DepthLimit;
            }
            if let Ok(address) = self.host.address_of(&record) {
                if !visited.insert(address) {
                    break StopReason::Cycle { address };
                }
            }

            match self.frame_at(&record, stack.depth()) {
                Ok(frame) => stack.push(frame),
                Err(e) => break StopReason::Failed(e),
            }

            match self.caller(&record) {
                Ok(Some(parent)) => record = parent,
                Ok(None) => break StopReason::EndOfChain,
                Err(e) => break StopReason::Failed(e),
            }
        };

        if reason != StopReason::EndOfChain {
            debug!(frames = stack.depth(), reason = ?reason, "awaitable walk truncated");
        }
        stack.finish(reason);
        stack
    }

    /// アンカーフレームのレシーバ（活性化レコード）を読む
    fn receiver(&self, anchor: &PhysicalFrame) -> Result<H::Value> {
        let this = self.host.frame_variable(anchor, self.detector.receiver())?;
        self.host.dereference(&this)
    }

    /// 活性化レコードの再開アドレス
    ///
    /// コルーチンフレームの先頭ワードには再開関数のアドレスが格納されている。
    fn resume_address(&self, record: &H::Value) -> Result<u64> {
        let coro = self.host.read_field(record, self.detector.coroutine_field())?;
        let handle = self
            .host
            .read_first_field(&coro, &self.detector.handle_fields())?;
        let data = self.host.cast_as(&handle, &self.host.void_pointer_pointer()?)?;
        let first_word = self.host.dereference(&data)?;
        self.host.read_u64(&first_word)
    }

    /// 活性化レコード1つ分のフレームを作る
    fn frame_at(&self, record: &H::Value, depth: usize) -> Result<StackFrame> {
        let address = self.resume_address(record)?;
        let location = self.host.resolve(address)?;

        let file = if self.config.basename_only {
            Path::new(&location.file)
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or(location.file)
        } else {
            location.file
        };

        Ok(StackFrame {
            depth,
            address,
            function_name: location.function_name,
            file,
            line: location.line,
        })
    }

    /// 呼び出し元の活性化レコード（なければNone）
    fn caller(&self, record: &H::Value) -> Result<Option<H::Value>> {
        let caller = self.host.read_field(record, self.detector.caller_field())?;
        if self.host.is_null(&caller)? {
            return Ok(None);
        }
        self.host.dereference(&caller).map(Some)
    }
}
