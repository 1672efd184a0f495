//! 論理スタックの表示

use crate::errors::MSG_NOT_IN_AWAITABLE;
use coroscope_async::{StopReason, WalkOutcome};

/// ウォークの結果を表示用の行にする
///
/// 最内の論理フレームが先頭。コルーチン外であれば案内の1行だけを返します。
/// 読み取りの失敗による打ち切りは、1フレームも読めなかった場合に限り
/// その理由を1行で示します。
pub fn render_backtrace(outcome: &WalkOutcome) -> Vec<String> {
    let stack = match outcome {
        WalkOutcome::NotInCoroutine => return vec![MSG_NOT_IN_AWAITABLE.to_string()],
        WalkOutcome::Stack(stack) => stack,
    };

    let mut lines: Vec<String> = stack.frames().iter().map(ToString::to_string).collect();
    match stack.stop_reason() {
        StopReason::DepthLimit => {
            lines.push(format!("(more frames follow; stopped at depth {})", stack.depth()))
        }
        StopReason::Cycle { address } => lines.push(format!(
            "(awaitable frame 0x{:016x} already listed; chain is cyclic)",
            address
        )),
        StopReason::Failed(e) if stack.is_empty() => {
            lines.push(format!("(cannot read the current awaitable frame: {})", e))
        }
        StopReason::EndOfChain | StopReason::Failed(_) => {}
    }
    lines
}
