//! `io_context::basic_executor_type` のビットフィールドデコーダー
//!
//! このエグゼキュータは `target_` という1ワードに、4バイト境界に揃った
//! `io_context` へのポインタと実行時のフラグビットを詰めて持っています。
//! 残りのフラグは2番目のテンプレート引数として型に埋め込まれ、
//! アロケータはオブジェクト自身の先頭に置かれます。

use coroscope_target::{Result, TargetError, TemplateArgument, ValueAccessor, ValueAccessorExt};
use regex::Regex;
use std::fmt;
use tracing::trace;

/// `target_` からコンテキストポインタを取り出すマスク
pub const CONTEXT_MASK: u64 = 0xffff_ffff_ffff_fffc;
/// `target_` のうち実行時のフラグを表すビット
pub const RUNTIME_BITS: u64 = 0b11;

const BLOCKING_NEVER: u64 = 1;
const RELATIONSHIP_CONTINUATION: u64 = 2;
const OUTSTANDING_WORK_TRACKED: u64 = 4;

/// ブロッキングのプロパティ
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Blocking {
    Never,
    Possibly,
}

/// 投入した処理と呼び出し元との関係
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relationship {
    Continuation,
    Fork,
}

/// 未完了の仕事としてコンテキストに数えられるか
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkTracking {
    Tracked,
    Untracked,
}

impl fmt::Display for Blocking {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Blocking::Never => "never",
            Blocking::Possibly => "possibly",
        })
    }
}

impl fmt::Display for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Relationship::Continuation => "continuation",
            Relationship::Fork => "fork",
        })
    }
}

impl fmt::Display for WorkTracking {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WorkTracking::Tracked => "tracked",
            WorkTracking::Untracked => "untracked",
        })
    }
}

/// 実効的なフラグの集合
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorFlags(pub u64);

impl ExecutorFlags {
    /// 静的なフラグと `target_` の実行時ビットを合わせる
    pub fn combine(static_bits: u64, packed: u64) -> Self {
        Self(static_bits | (packed & RUNTIME_BITS))
    }

    pub fn blocking(self) -> Blocking {
        if self.0 & BLOCKING_NEVER != 0 {
            Blocking::Never
        } else {
            Blocking::Possibly
        }
    }

    pub fn relationship(self) -> Relationship {
        if self.0 & RELATIONSHIP_CONTINUATION != 0 {
            Relationship::Continuation
        } else {
            Relationship::Fork
        }
    }

    pub fn work_tracking(self) -> WorkTracking {
        if self.0 & OUTSTANDING_WORK_TRACKED != 0 {
            WorkTracking::Tracked
        } else {
            WorkTracking::Untracked
        }
    }
}

/// デコードしたエグゼキュータ
#[derive(Debug, Clone)]
pub struct ExecutorDescriptor<V> {
    /// `io_context *` として再解釈した値
    pub context: V,
    pub context_address: u64,
    pub allocator: V,
    pub blocking: Blocking,
    pub relationship: Relationship,
    pub work_tracking: WorkTracking,
}

/// エグゼキュータデコーダー
#[derive(Debug, Clone)]
pub struct ExecutorDecoder {
    /// キャプチャ1が `boost::` 接頭辞、キャプチャ2がコンテキストの型名
    type_pattern: Regex,
    packed_field: String,
}

impl ExecutorDecoder {
    pub fn new() -> crate::Result<Self> {
        Ok(Self {
            type_pattern: Regex::new(r"^((?:boost::)*)(asio::io_context)::basic_executor_type<.*$")?,
            packed_field: "target_".to_string(),
        })
    }

    /// エグゼキュータの型名からコンテキストの型名を求める
    pub fn context_type_name(&self, executor_type: &str) -> Option<String> {
        let caps = self.type_pattern.captures(executor_type)?;
        Some(format!("{}{}", &caps[1], &caps[2]))
    }

    /// エグゼキュータをデコードする
    pub fn decode<H: ValueAccessor>(
        &self,
        host: &H,
        executor: &H::Value,
    ) -> Result<ExecutorDescriptor<H::Value>> {
        let ty = host.type_of(executor);
        let type_name = host.type_name(&ty);
        let context_name =
            self.context_type_name(&type_name)
                .ok_or_else(|| TargetError::TypeMismatch {
                    expected: "io_context executor",
                    found: type_name.clone(),
                })?;

        let packed = host.read_u64(&host.read_field(executor, &self.packed_field)?)?;
        let context_address = packed & CONTEXT_MASK;
        let context_ty = host.lookup_type(&context_name)?;
        let context = host.cast_as(&host.integer(context_address), &host.pointer_to(&context_ty))?;

        let static_bits = match host.template_argument(&ty, 1)? {
            TemplateArgument::Value(bits) => bits,
            TemplateArgument::Type(_) => {
                return Err(TargetError::TypeMismatch {
                    expected: "integral template argument",
                    found: type_name,
                })
            }
        };
        let flags = ExecutorFlags::combine(static_bits, packed);
        trace!(packed = format_args!("0x{:x}", packed), bits = flags.0, "executor bits");

        let allocator_ty = match host.template_argument(&ty, 0)? {
            TemplateArgument::Type(ty) => ty,
            TemplateArgument::Value(_) => {
                return Err(TargetError::TypeMismatch {
                    expected: "allocator type argument",
                    found: type_name,
                })
            }
        };
        let allocator = host.value_at(host.address_of(executor)?, &allocator_ty)?;

        Ok(ExecutorDescriptor {
            context,
            context_address,
            allocator,
            blocking: flags.blocking(),
            relationship: flags.relationship(),
            work_tracking: flags.work_tracking(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_decoding() {
        let flags = ExecutorFlags(0b101);
        assert_eq!(flags.blocking(), Blocking::Never);
        assert_eq!(flags.relationship(), Relationship::Fork);
        assert_eq!(flags.work_tracking(), WorkTracking::Tracked);

        let flags = ExecutorFlags(0b010);
        assert_eq!(flags.blocking(), Blocking::Possibly);
        assert_eq!(flags.relationship(), Relationship::Continuation);
        assert_eq!(flags.work_tracking(), WorkTracking::Untracked);
    }

    #[test]
    fn test_combine_ignores_pointer_bits() {
        // 実行時ビットは下位2ビットのみ
        assert_eq!(ExecutorFlags::combine(0, 0x7f00_1235), ExecutorFlags(0b01));
        assert_eq!(ExecutorFlags::combine(0b100, 0x7f00_1231), ExecutorFlags(0b101));
        assert_eq!(0x7f00_1237 & CONTEXT_MASK, 0x7f00_1234);
    }

    #[test]
    fn test_context_type_name() {
        let decoder = ExecutorDecoder::new().unwrap();
        assert_eq!(
            decoder
                .context_type_name("asio::io_context::basic_executor_type<std::allocator<void>, 4>")
                .as_deref(),
            Some("asio::io_context")
        );
        assert_eq!(
            decoder
                .context_type_name("boost::asio::io_context::basic_executor_type<std::allocator<void>, 0>")
                .as_deref(),
            Some("boost::asio::io_context")
        );
        assert_eq!(decoder.context_type_name("asio::thread_pool::basic_executor_type<>"), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(Blocking::Never.to_string(), "never");
        assert_eq!(Relationship::Fork.to_string(), "fork");
        assert_eq!(WorkTracking::Untracked.to_string(), "untracked");
    }
}
